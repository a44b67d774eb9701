pub mod calibration;
#[cfg(test)]
pub mod calibration_test;
pub mod driver;
pub mod event;
pub mod hid_report;
#[cfg(test)]
pub mod hid_report_test;
pub mod transport;
