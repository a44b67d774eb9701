//! Two-point calibration: the player shoots a target in the middle of the
//! screen and one near the top-left corner. From the two raw shots and the
//! known target positions the raw window covering the whole screen can be
//! extrapolated.
use thiserror::Error;

use crate::config::CalibrationConfig;

/// Possible errors computing calibration bounds
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum TwoPointError {
    #[error("targets on the {0:?} axis must be at different positions")]
    DegenerateTargets(Dimension),
    #[error("shots on the {0:?} axis must be at different positions")]
    DegenerateShots(Dimension),
    #[error("computed {axis:?} range {min}..{max} does not fit the raw coordinate range")]
    OutOfRange { axis: Dimension, min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    X,
    Y,
}

/// A position either in raw gun units or in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::X => f64::from(self.x),
            Dimension::Y => f64::from(self.y),
        }
    }
}

/// Raw shots and screen targets captured during calibration. The centre target
/// must be at the middle of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoPointCalibration {
    pub center_shot: Point,
    pub topleft_shot: Point,
    pub center_target: Point,
    pub topleft_target: Point,
}

/// Per-axis result of a calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub x: Result<(u16, u16), TwoPointError>,
    pub y: Result<(u16, u16), TwoPointError>,
}

impl CalibrationResult {
    /// Apply every axis that calibrated successfully to the given config,
    /// keeping the existing bounds for axes that failed.
    pub fn apply(&self, config: &CalibrationConfig) -> CalibrationConfig {
        let mut config = *config;
        if let Ok((min, max)) = self.x {
            config.x_min = min;
            config.x_max = max;
        }
        if let Ok((min, max)) = self.y {
            config.y_min = min;
            config.y_max = max;
        }
        config
    }
}

impl TwoPointCalibration {
    /// Compute the raw bounds for both axes
    pub fn compute(&self) -> CalibrationResult {
        CalibrationResult {
            x: self.compute_axis(Dimension::X),
            y: self.compute_axis(Dimension::Y),
        }
    }

    fn compute_axis(&self, axis: Dimension) -> Result<(u16, u16), TwoPointError> {
        let center_target = self.center_target.get(axis);
        let topleft_target = self.topleft_target.get(axis);
        let center_shot = self.center_shot.get(axis);
        let topleft_shot = self.topleft_shot.get(axis);

        // Full screen width or height, since the centre target is in the middle
        let screen = center_target * 2.0;
        let fraction = center_target / screen - topleft_target / screen;
        if !fraction.is_finite() || fraction == 0.0 {
            return Err(TwoPointError::DegenerateTargets(axis));
        }

        // Size of the whole screen in raw units, then the raw value at the
        // screen's zero edge.
        let span = (center_shot - topleft_shot) / fraction;
        if span <= 0.0 {
            return Err(TwoPointError::DegenerateShots(axis));
        }
        let zero = center_shot - span / 2.0;

        let min = zero.floor();
        let max = (zero + span).ceil();
        if min < 0.0 || max > f64::from(u16::MAX) {
            return Err(TwoPointError::OutOfRange { axis, min, max });
        }

        Ok((min as u16, max as u16))
    }
}
