use std::error::Error;

use packed_struct::{
    types::{Integer, SizedInteger},
    PackedStruct,
};

use crate::drivers::guncon2::hid_report::{ModeCommandReport, PackedInputDataReport};

// Trigger held, aim at x=352 y=120
// 0xff 0xdf 0x60 0x01 0x78 0x00
#[tokio::test]
async fn test_unpack_trigger_report() -> Result<(), Box<dyn Error>> {
    let buf = [0xff, 0xdf, 0x60, 0x01, 0x78, 0x00];
    let report = PackedInputDataReport::unpack(&buf)?;
    println!("Report: {report}");

    assert!(!report.trigger, "trigger bit should be cleared");
    assert!(report.start);
    assert!(report.select);
    assert!(report.dpad_left);
    assert!(report.a);
    assert_eq!(report.x.to_primitive(), 352);
    assert_eq!(report.y.to_primitive(), 120);

    Ok(())
}

#[tokio::test]
async fn test_button_bit_positions() -> Result<(), Box<dyn Error>> {
    // Byte 0 bits 7..1: left, down, right, up, A, B, C
    let buf = [0x7f, 0xff, 0x00, 0x00, 0x00, 0x00];
    let report = PackedInputDataReport::unpack(&buf)?;
    assert!(!report.dpad_left);
    assert!(report.dpad_down && report.dpad_right && report.dpad_up);

    let buf = [0xfd, 0xff, 0x00, 0x00, 0x00, 0x00];
    let report = PackedInputDataReport::unpack(&buf)?;
    assert!(!report.c);
    assert!(report.a && report.b);

    // Byte 1 bits 7..5: start, select, trigger
    let buf = [0xff, 0x7f, 0x00, 0x00, 0x00, 0x00];
    let report = PackedInputDataReport::unpack(&buf)?;
    assert!(!report.start);
    assert!(report.select && report.trigger);

    let buf = [0xff, 0xbf, 0x00, 0x00, 0x00, 0x00];
    let report = PackedInputDataReport::unpack(&buf)?;
    assert!(!report.select);
    assert!(report.start && report.trigger);

    Ok(())
}

#[tokio::test]
async fn test_extended_y() -> Result<(), Box<dyn Error>> {
    let buf = [0xff, 0xff, 0x00, 0x00, 0x34, 0x12];
    let report = PackedInputDataReport::unpack(&buf)?;
    assert_eq!(report.y.to_primitive(), 0x1234);

    Ok(())
}

#[tokio::test]
async fn test_default_report() -> Result<(), Box<dyn Error>> {
    let mut report = PackedInputDataReport::default();
    report.x = Integer::from_primitive(734);
    report.y = Integer::from_primitive(240);

    let expected: [u8; 6] = [0xff, 0xff, 0xde, 0x02, 0xf0, 0x00];
    assert_eq!(expected, report.pack()?);

    Ok(())
}

#[tokio::test]
async fn test_mode_command() -> Result<(), Box<dyn Error>> {
    let command = ModeCommandReport::default();
    let expected: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
    assert_eq!(expected, command.pack()?);

    Ok(())
}
