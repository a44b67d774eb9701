//! Wire formats for the Namco GunCon 2.
//!
//! The gun has no report IDs. Input reports are always 6 bytes and every
//! button bit is active-low: a cleared bit means the button is held.
use packed_struct::prelude::*;

/// Size of an input report in bytes
pub const INPUT_REPORT_SIZE: usize = 6;
/// Size of the mode command in bytes
pub const MODE_COMMAND_SIZE: usize = 6;

// Input report
//
// Nothing pressed, aim at x=352 y=120
// 0xff 0xff 0x60 0x01 0x78 0x00
//
// Trigger held, aim at x=352 y=120
// 0xff 0xdf 0x60 0x01 0x78 0x00
//
// Gun pointed away from the screen
// 0xff 0xff 0x00 0x00 0x00 0x00
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "6")]
pub struct PackedInputDataReport {
    // BYTE 0
    #[packed_field(bits = "0")]
    pub dpad_left: bool,
    #[packed_field(bits = "1")]
    pub dpad_down: bool,
    #[packed_field(bits = "2")]
    pub dpad_right: bool,
    #[packed_field(bits = "3")]
    pub dpad_up: bool,
    #[packed_field(bits = "4")]
    pub a: bool,
    #[packed_field(bits = "5")]
    pub b: bool,
    #[packed_field(bits = "6")]
    pub c: bool,
    #[packed_field(bits = "7")]
    pub unk_0: bool,

    // BYTE 1
    #[packed_field(bits = "8")]
    pub start: bool,
    #[packed_field(bits = "9")]
    pub select: bool,
    #[packed_field(bits = "10")]
    pub trigger: bool,
    #[packed_field(bits = "11..=15")]
    pub unk_1: Integer<u8, packed_bits::Bits<5>>,

    // BYTE 2-3
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub x: Integer<u16, packed_bits::Bits<16>>,

    // BYTE 4-5
    // Only byte 4 carries the aim position on the standard layout. Byte 5 is
    // the high byte on the extended layout.
    #[packed_field(bytes = "4..=5", endian = "lsb")]
    pub y: Integer<u16, packed_bits::Bits<16>>,
}

impl Default for PackedInputDataReport {
    /// A report with every button released and the gun aimed at (0, 0)
    fn default() -> Self {
        Self {
            dpad_left: true,
            dpad_down: true,
            dpad_right: true,
            dpad_up: true,
            a: true,
            b: true,
            c: true,
            unk_0: true,
            start: true,
            select: true,
            trigger: true,
            unk_1: Integer::from_primitive(0x1f),
            x: Integer::from_primitive(0),
            y: Integer::from_primitive(0),
        }
    }
}

/// Reporting modes that can be selected with a [ModeCommandReport]
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug, Default)]
pub enum ReportMode {
    /// Continuous reporting at the normal 50Hz rate
    #[default]
    Normal = 1,
}

/// Output report sent once when the device is opened to make the gun stream
/// input reports continuously.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "6")]
pub struct ModeCommandReport {
    #[packed_field(bytes = "0..=4")]
    pub reserved: [u8; 5],
    #[packed_field(bytes = "5", ty = "enum")]
    pub mode: ReportMode,
}

impl Default for ModeCommandReport {
    fn default() -> Self {
        Self {
            reserved: [0; 5],
            mode: ReportMode::default(),
        }
    }
}
