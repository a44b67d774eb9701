use std::{error::Error, path::PathBuf};

use clap::Args;

use crate::{
    drivers::guncon2::calibration::{Point, TwoPointCalibration},
    input::manager::load_config,
};

#[derive(Args, Debug, Clone)]
pub struct CalibrateArgs {
    /// Raw gun position of the shot at the centre target, as X,Y
    #[arg(long, value_parser = parse_point)]
    pub center_shot: Point,
    /// Raw gun position of the shot at the top-left target, as X,Y
    #[arg(long, value_parser = parse_point)]
    pub topleft_shot: Point,
    /// Screen position of the centre target in pixels. This must be the
    /// middle of the screen, e.g. 320,240 for a 640x480 display.
    #[arg(long, value_parser = parse_point)]
    pub center_target: Point,
    /// Screen position of the top-left target in pixels, as X,Y
    #[arg(long, value_parser = parse_point)]
    pub topleft_target: Point,
    /// Write the updated config to this file instead of printing it. A running
    /// driver watching this file picks up the change immediately.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Parse a point given as "X,Y"
fn parse_point(value: &str) -> Result<Point, String> {
    let Some((x, y)) = value.split_once(',') else {
        return Err(format!("expected X,Y but got '{value}'"));
    };
    let x = x.trim().parse().map_err(|e| format!("invalid X '{x}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("invalid Y '{y}': {e}"))?;
    Ok(Point::new(x, y))
}

pub fn handle_calibrate(args: CalibrateArgs) -> Result<(), Box<dyn Error>> {
    let calibration = TwoPointCalibration {
        center_shot: args.center_shot,
        topleft_shot: args.topleft_shot,
        center_target: args.center_target,
        topleft_target: args.topleft_target,
    };
    let result = calibration.compute();

    match result.x {
        Ok((min, max)) => eprintln!("X: {min}..{max}"),
        Err(ref e) => eprintln!("X: not calibrated: {e}"),
    }
    match result.y {
        Ok((min, max)) => eprintln!("Y: {min}..{max}"),
        Err(ref e) => eprintln!("Y: not calibrated: {e}"),
    }
    if result.x.is_err() && result.y.is_err() {
        return Err("Calibration failed on both axes".into());
    }

    let (mut config, _) = load_config();
    config.calibration = result.apply(&config.calibration);

    match args.output {
        Some(path) => {
            config.to_yaml_file(&path)?;
            eprintln!("Wrote calibration to {}", path.display());
        }
        None => print!("{}", serde_yaml::to_string(&config)?),
    }

    Ok(())
}
