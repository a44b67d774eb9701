pub mod calibrate;
pub mod devices;

use std::error::Error;

use calibrate::{handle_calibrate, CalibrateArgs};
use clap::{Parser, Subcommand};
use devices::handle_devices;

use crate::input::manager::load_config;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the GunCon 2 driver (default)
    Run,
    /// List attached GunCon 2 devices
    Devices,
    /// Compute calibration bounds from two reference shots
    Calibrate(CalibrateArgs),
    /// Print the effective configuration
    Config,
}

pub async fn main_cli(args: Args) -> Result<(), Box<dyn Error>> {
    let Some(cmd) = args.cmd else {
        return Ok(());
    };

    match cmd {
        Commands::Run => (),
        Commands::Devices => handle_devices()?,
        Commands::Calibrate(args) => handle_calibrate(args)?,
        Commands::Config => {
            let (config, path) = load_config();
            match path {
                Some(path) => println!("# {}", path.display()),
                None => println!("# built-in defaults"),
            }
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}
