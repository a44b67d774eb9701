use nix::errno::Errno;
use packed_struct::{types::SizedInteger, PackedStruct};

use crate::config::{CalibrationConfig, ReportLayout, SharedCalibration};

use super::{
    event::{AuxButtons, Event, Hat, NormalizedInput},
    hid_report::{PackedInputDataReport, INPUT_REPORT_SIZE},
};

// Hardware ID's
pub const VID: u16 = 0x0b9a;
pub const PID: u16 = 0x016a;

// Output axis ranges for calibrated coordinates
pub const OUTPUT_MAX_X: u16 = 1024;
pub const OUTPUT_MAX_Y: u16 = 255;

/// Completion status of a single interrupt transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Success,
    /// The transfer timed out. The device was most likely unplugged.
    Timeout,
    ConnectionReset,
    NoEntity,
    Shutdown,
    Stall,
    /// The device node is gone
    NoDevice,
    /// Any other failure. Treated as transient.
    Error(Errno),
}

impl From<Errno> for TransferStatus {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::ETIME => TransferStatus::Timeout,
            Errno::ECONNRESET => TransferStatus::ConnectionReset,
            Errno::ENOENT => TransferStatus::NoEntity,
            Errno::ESHUTDOWN => TransferStatus::Shutdown,
            Errno::EPIPE => TransferStatus::Stall,
            Errno::ENODEV => TransferStatus::NoDevice,
            errno => TransferStatus::Error(errno),
        }
    }
}

/// What the transport should do after a transfer has been handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportAction {
    /// Wait for the next report
    Resubmit,
    /// Stop polling; the device is gone or the transfer was killed
    Stop,
}

/// Result of decoding a single completed transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A full report was decoded
    Report(NormalizedInput),
    /// The transfer did not carry a 6 byte report
    MalformedPacket { length: usize },
    /// The transfer failed but the next one may succeed
    TransportTransient(TransferStatus),
    /// The transfer was terminated and polling must stop
    TransportTerminal(TransferStatus),
}

impl DecodeOutcome {
    /// Returns whether the transport should be resubmitted
    pub fn next_action(&self) -> TransportAction {
        match self {
            DecodeOutcome::TransportTerminal(_) => TransportAction::Stop,
            DecodeOutcome::Report(_)
            | DecodeOutcome::MalformedPacket { .. }
            | DecodeOutcome::TransportTransient(_) => TransportAction::Resubmit,
        }
    }

    /// Returns the ordered events to send to the event sink. Only a decoded
    /// report produces events.
    pub fn events(&self) -> Vec<Event> {
        match self {
            DecodeOutcome::Report(input) => input.events(),
            _ => vec![],
        }
    }
}

/// Decode a completed transfer using the given calibration snapshot.
pub fn decode(
    buffer: &[u8],
    status: TransferStatus,
    config: &CalibrationConfig,
    layout: ReportLayout,
) -> DecodeOutcome {
    match status {
        TransferStatus::Success => decode_report(buffer, config, layout),
        TransferStatus::Timeout
        | TransferStatus::ConnectionReset
        | TransferStatus::NoEntity
        | TransferStatus::Shutdown
        | TransferStatus::Stall
        | TransferStatus::NoDevice => DecodeOutcome::TransportTerminal(status),
        TransferStatus::Error(_) => DecodeOutcome::TransportTransient(status),
    }
}

/// Unpack a report and apply the calibration and offscreen policy
fn decode_report(
    buffer: &[u8],
    config: &CalibrationConfig,
    layout: ReportLayout,
) -> DecodeOutcome {
    let Ok(buf) = <&[u8; INPUT_REPORT_SIZE]>::try_from(buffer) else {
        return DecodeOutcome::MalformedPacket {
            length: buffer.len(),
        };
    };
    let report = match PackedInputDataReport::unpack(buf) {
        Ok(report) => report,
        Err(e) => {
            log::debug!("Unable to unpack input report: {e:?}");
            return DecodeOutcome::MalformedPacket {
                length: buffer.len(),
            };
        }
    };

    // Aim and trigger
    let (x, y) = aim_position(&report, layout);
    let trigger = !report.trigger;
    let offscreen = is_offscreen(x, y, config);

    let (trigger, reload) = match (config.offscreen_reload, offscreen) {
        (false, _) => (trigger, None),
        (true, true) => (false, Some(trigger)),
        (true, false) => (trigger, Some(false)),
    };

    // Only update the position if the gun is on screen
    let (x, y) = if offscreen {
        (None, None)
    } else if config.raw_mode {
        (Some(x), Some(y))
    } else {
        let x = scale_axis(x, config.x_min, config.x_max, OUTPUT_MAX_X);
        let y = scale_axis(y, config.y_min, config.y_max, OUTPUT_MAX_Y);
        (Some(x), Some(y))
    };

    let buttons = AuxButtons {
        a: !report.a,
        b: !report.b,
        c: !report.c,
        start: !report.start,
        select: !report.select,
    };

    DecodeOutcome::Report(NormalizedInput {
        x,
        y,
        trigger,
        reload,
        buttons,
        hat: dpad_hat(&report),
    })
}

/// Returns the raw (x, y) aim position for the given report layout
fn aim_position(report: &PackedInputDataReport, layout: ReportLayout) -> (u16, u16) {
    let x = report.x.to_primitive();
    let y = match layout {
        ReportLayout::Standard => report.y.to_primitive() & 0x00ff,
        ReportLayout::Extended => report.y.to_primitive(),
    };
    (x, y)
}

/// Returns true if the raw position is outside the calibrated window. An axis
/// whose calibration range is empty has no window and never counts as
/// offscreen.
pub fn is_offscreen(x: u16, y: u16, config: &CalibrationConfig) -> bool {
    let x_out = config.x_range_valid() && (x < config.x_min || x > config.x_max);
    let y_out = config.y_range_valid() && (y < config.y_min || y > config.y_max);
    x_out || y_out
}

/// Scale a raw coordinate from [min, max] to [0, output_max] with truncating
/// integer division. An empty range passes the raw value through.
pub fn scale_axis(value: u16, min: u16, max: u16, output_max: u16) -> u16 {
    if max <= min {
        return value;
    }
    let offset = u32::from(value.saturating_sub(min));
    let range = u32::from(max - min);
    let scaled = offset * u32::from(output_max) / range;
    u16::try_from(scaled.min(u32::from(output_max))).unwrap_or(output_max)
}

/// Decompose the four D-pad bits into hat axes. Opposing directions held
/// together cancel out.
fn dpad_hat(report: &PackedInputDataReport) -> Hat {
    let mut hat = Hat::default();
    if !report.dpad_left {
        hat.x -= 1;
    }
    if !report.dpad_right {
        hat.x += 1;
    }
    if !report.dpad_up {
        hat.y -= 1;
    }
    if !report.dpad_down {
        hat.y += 1;
    }
    hat
}

/// Report decoder for a single gun. Holds the layout selected for the device
/// and the shared calibration that is read once per report.
#[derive(Debug, Clone)]
pub struct Driver {
    layout: ReportLayout,
    calibration: SharedCalibration,
}

impl Driver {
    pub fn new(layout: ReportLayout, calibration: SharedCalibration) -> Self {
        Self {
            layout,
            calibration,
        }
    }

    /// Decode a completed transfer against the current calibration
    pub fn handle_transfer(&self, buffer: &[u8], status: TransferStatus) -> DecodeOutcome {
        let config = self.calibration.snapshot();
        let outcome = decode(buffer, status, &config, self.layout);
        log::trace!("Decoded {buffer:02x?} ({status:?}): {outcome:?}");
        outcome
    }
}
