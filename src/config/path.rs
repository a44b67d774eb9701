//! Module for searching for GunCon 2 config files

use std::path::PathBuf;

/// Name of the configuration file in every search directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Base system fallback path to use if one cannot be found with XDG
const FALLBACK_BASE_PATH: &str = "/usr/share/guncon2";

/// Returns the base path for shipped configuration data
pub fn get_base_path() -> PathBuf {
    let Ok(base_dirs) = xdg::BaseDirectories::with_prefix("guncon2") else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_BASE_PATH);
    };

    // Get the data directories in preference order
    let data_dirs = base_dirs.get_data_dirs();
    for dir in data_dirs {
        if dir.exists() {
            return dir;
        }
    }

    log::warn!("Config base path not found. Using fallback path.");
    PathBuf::from(FALLBACK_BASE_PATH)
}

/// Returns a list of config file locations in load order. The first file that
/// exists wins.
/// E.g. ["./rootfs/usr/share/guncon2/config.yaml", "/etc/guncon2/config.yaml", ...]
pub fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("./rootfs/usr/share/guncon2").join(CONFIG_FILE_NAME),
        PathBuf::from("/etc/guncon2").join(CONFIG_FILE_NAME),
    ];
    if let Ok(base_dirs) = xdg::BaseDirectories::with_prefix("guncon2") {
        paths.push(base_dirs.get_config_home().join(CONFIG_FILE_NAME));
    }
    paths.push(get_base_path().join(CONFIG_FILE_NAME));

    paths
}

/// Returns the path of the first config file that exists
pub fn find_config_file() -> Option<PathBuf> {
    get_config_paths().into_iter().find(|path| {
        log::trace!("Checking {path:?} for config");
        path.is_file()
    })
}
