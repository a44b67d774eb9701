pub mod path;
pub mod watcher;


use std::{
    io,
    path::Path,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents all possible errors loading a [Config]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
}

/// Calibration bounds that cannot be used to scale an axis
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("x calibration range is empty: x_min={min} x_max={max}")]
    InvalidXRange { min: u16, max: u16 },
    #[error("y calibration range is empty: y_min={min} y_max={max}")]
    InvalidYRange { min: u16, max: u16 },
}

/// Default lower x calibration value
pub const DEFAULT_X_MIN: u16 = 80;
/// Default upper x calibration value
pub const DEFAULT_X_MAX: u16 = 734;
/// Default lower y calibration value
pub const DEFAULT_Y_MIN: u16 = 0;
/// Default upper y calibration value
pub const DEFAULT_Y_MAX: u16 = 240;

/// Raw-unit window that is considered "on screen" along with the options that
/// control how aim and trigger are reported. Read once per decoded report.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct CalibrationConfig {
    pub x_min: u16,
    pub x_max: u16,
    pub y_min: u16,
    pub y_max: u16,
    /// Forward raw coordinates instead of scaling them to the output range
    pub raw_mode: bool,
    /// Report an offscreen trigger pull as a separate reload button
    pub offscreen_reload: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            x_min: DEFAULT_X_MIN,
            x_max: DEFAULT_X_MAX,
            y_min: DEFAULT_Y_MIN,
            y_max: DEFAULT_Y_MAX,
            raw_mode: false,
            offscreen_reload: false,
        }
    }
}

impl CalibrationConfig {
    /// Returns true if the x bounds describe a non-empty range
    pub fn x_range_valid(&self) -> bool {
        self.x_max > self.x_min
    }

    /// Returns true if the y bounds describe a non-empty range
    pub fn y_range_valid(&self) -> bool {
        self.y_max > self.y_min
    }

    /// Check that both axes can be scaled. Invalid axes are still usable, but
    /// their coordinates will be passed through without scaling.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !self.x_range_valid() {
            return Err(CalibrationError::InvalidXRange {
                min: self.x_min,
                max: self.x_max,
            });
        }
        if !self.y_range_valid() {
            return Err(CalibrationError::InvalidYRange {
                min: self.y_min,
                max: self.y_max,
            });
        }
        Ok(())
    }
}

/// Layout of the aim coordinates in the input report
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportLayout {
    /// 8-bit vertical coordinate in byte 4
    #[default]
    Standard,
    /// 16-bit little-endian vertical coordinate in bytes 4-5
    Extended,
}

/// How the gun is exposed as virtual input devices
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceLayout {
    /// A pointer device for aim, trigger and reload plus a joystick device for
    /// the remaining buttons and the D-pad.
    #[default]
    Split,
    /// A single device with every capability
    Combined,
}

/// Daemon configuration loaded from YAML
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub version: u32,
    pub report_layout: ReportLayout,
    pub device_layout: DeviceLayout,
    pub calibration: CalibrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            report_layout: ReportLayout::default(),
            device_layout: DeviceLayout::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl Config {
    /// Load a [Config] from the given YAML string
    pub fn from_yaml(content: String) -> Result<Config, LoadError> {
        let config: Config = serde_yaml::from_str(content.as_str())?;
        Ok(config)
    }

    /// Load a [Config] from the given YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Config, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Config::from_yaml(content)
    }

    /// Write the [Config] as YAML to the given file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), LoadError> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }
}

/// Process-wide calibration shared between the config watcher (writer) and
/// every device session (readers). Readers always copy a full snapshot so the
/// bounds and flags used for one report are consistent with each other.
#[derive(Debug, Clone, Default)]
pub struct SharedCalibration {
    inner: Arc<RwLock<CalibrationConfig>>,
}

impl SharedCalibration {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the current calibration
    pub fn snapshot(&self) -> CalibrationConfig {
        match self.inner.read() {
            Ok(config) => *config,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Replace the current calibration. Takes effect on the next decoded report.
    pub fn update(&self, config: CalibrationConfig) {
        if let Err(e) = config.validate() {
            log::warn!("Calibration will pass raw values through: {e}");
        }
        let mut current = match self.inner.write() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = config;
    }
}
