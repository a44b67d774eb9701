use std::env;
use std::error::Error;
use std::process;

use clap::Parser;

use crate::cli::{main_cli, Args, Commands};
use crate::input::manager::{load_config, Manager};

mod cli;
mod config;
mod drivers;
mod input;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();

    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();

    // Handle any one-shot commands
    if !matches!(args.cmd, None | Some(Commands::Run)) {
        if let Err(e) = main_cli(args).await {
            return Err(e.to_string().into());
        }
        return Ok(());
    }

    const VERSION: &str = env!("CARGO_PKG_VERSION");
    log::info!("Starting GunCon 2 driver v{}", VERSION);

    let (config, config_path) = load_config();
    let mut manager = Manager::new(config, config_path);
    if let Err(e) = manager.run().await {
        log::error!("Error running the input manager: {e}");
        return Err(e);
    }

    log::info!("GunCon 2 driver stopped");

    // The inotify watcher threads block forever, so don't wait for them
    process::exit(0);
}
