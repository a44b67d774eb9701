use std::error::Error;

use crate::{
    config::CalibrationConfig,
    drivers::guncon2::calibration::{Dimension, Point, TwoPointCalibration, TwoPointError},
};

/// 1024x512 screen with the second target a quarter of the way in
fn calibration(center_shot: Point, topleft_shot: Point) -> TwoPointCalibration {
    TwoPointCalibration {
        center_shot,
        topleft_shot,
        center_target: Point::new(512, 256),
        topleft_target: Point::new(256, 128),
    }
}

#[tokio::test]
async fn test_two_point_calibration() -> Result<(), Box<dyn Error>> {
    let result = calibration(Point::new(408, 120), Point::new(244, 60)).compute();
    println!("Calibration: {result:?}");

    assert_eq!(result.x, Ok((80, 736)));
    assert_eq!(result.y, Ok((0, 240)));

    let config = result.apply(&CalibrationConfig {
        offscreen_reload: true,
        ..Default::default()
    });
    assert_eq!(config.x_min, 80);
    assert_eq!(config.x_max, 736);
    assert_eq!(config.y_min, 0);
    assert_eq!(config.y_max, 240);
    assert!(config.offscreen_reload);

    Ok(())
}

#[tokio::test]
async fn test_degenerate_targets() -> Result<(), Box<dyn Error>> {
    let mut cal = calibration(Point::new(408, 120), Point::new(244, 60));
    cal.topleft_target = Point::new(512, 128);
    let result = cal.compute();
    assert_eq!(result.x, Err(TwoPointError::DegenerateTargets(Dimension::X)));
    assert_eq!(result.y, Ok((0, 240)));

    // A centre target at zero has no screen size to work from
    cal.center_target = Point::new(0, 0);
    let result = cal.compute();
    assert_eq!(result.x, Err(TwoPointError::DegenerateTargets(Dimension::X)));
    assert_eq!(result.y, Err(TwoPointError::DegenerateTargets(Dimension::Y)));

    Ok(())
}

#[tokio::test]
async fn test_degenerate_shots() -> Result<(), Box<dyn Error>> {
    // Shots on the wrong side of each other
    let result = calibration(Point::new(244, 60), Point::new(408, 120)).compute();
    assert_eq!(result.x, Err(TwoPointError::DegenerateShots(Dimension::X)));
    assert_eq!(result.y, Err(TwoPointError::DegenerateShots(Dimension::Y)));

    Ok(())
}

#[tokio::test]
async fn test_out_of_range() -> Result<(), Box<dyn Error>> {
    // Extrapolating these shots puts the top edge below zero
    let result = calibration(Point::new(408, 10), Point::new(244, 0)).compute();
    assert_eq!(result.x, Ok((80, 736)));
    assert_eq!(
        result.y,
        Err(TwoPointError::OutOfRange {
            axis: Dimension::Y,
            min: -10.0,
            max: 30.0,
        })
    );

    // Failed axes keep their previous bounds
    let config = result.apply(&CalibrationConfig::default());
    assert_eq!((config.x_min, config.x_max), (80, 736));
    assert_eq!((config.y_min, config.y_max), (0, 240));

    Ok(())
}
