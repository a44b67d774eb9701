use std::{
    ffi::{CString, NulError},
    path::Path,
    sync::Mutex,
    time::Duration,
};

use hidapi::{DeviceInfo, HidApi, HidDevice, HidError};
use nix::errno::Errno;
use packed_struct::{PackedStruct, PackingError};
use thiserror::Error;

use super::{
    driver::{TransferStatus, PID, VID},
    hid_report::{ModeCommandReport, MODE_COMMAND_SIZE},
};

/// Possible errors talking to the gun
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("hidapi error: {0}")]
    Hid(#[from] HidError),
    #[error("unable to pack command: {0:?}")]
    Packing(#[from] PackingError),
    #[error("invalid device path: {0}")]
    InvalidPath(#[from] NulError),
    #[error("device '{0}' is not a GunCon 2")]
    NotGunCon(String),
    #[error("short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("unable to start polling: {0}")]
    Io(#[from] std::io::Error),
}

/// A completed interrupt transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    /// Number of bytes written into the buffer
    pub length: usize,
    pub status: TransferStatus,
}

/// Source of interrupt transfers and sink for control commands.
pub trait Transport: Send + Sync + 'static {
    /// Send the mode command that selects the streaming mode
    fn send_control(&self, command: &ModeCommandReport) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next transfer to complete, filling `buf`.
    /// Returns [None] if nothing completed in time.
    fn wait_transfer(&self, buf: &mut [u8], timeout: Duration) -> Option<Transfer>;
}

/// Transport backed by the gun's hidraw node
pub struct HidTransport {
    path: String,
    device: Mutex<HidDevice>,
}

impl HidTransport {
    /// Open the given hidraw path (e.g. /dev/hidraw3)
    pub fn open_path(path: &str) -> Result<Self, TransportError> {
        let cs_path = CString::new(path)?;
        let api = HidApi::new()?;
        let device = api.open_path(&cs_path)?;
        let info = device.get_device_info()?;
        if info.vendor_id() != VID || info.product_id() != PID {
            return Err(TransportError::NotGunCon(path.to_string()));
        }

        Ok(Self {
            path: path.to_string(),
            device: Mutex::new(device),
        })
    }

    /// Returns the hidraw path of the device
    pub fn path(&self) -> &str {
        self.path.as_str()
    }
}

impl Transport for HidTransport {
    fn send_control(&self, command: &ModeCommandReport) -> Result<(), TransportError> {
        // The gun has no report IDs, so hidapi expects a leading zero
        let mut buf = [0; MODE_COMMAND_SIZE + 1];
        buf[1..].copy_from_slice(&command.pack()?);

        let device = match self.device.lock() {
            Ok(device) => device,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = device.write(&buf)?;
        if written < buf.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: buf.len(),
            });
        }

        Ok(())
    }

    fn wait_transfer(&self, buf: &mut [u8], timeout: Duration) -> Option<Transfer> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let device = match self.device.lock() {
            Ok(device) => device,
            Err(poisoned) => poisoned.into_inner(),
        };
        match device.read_timeout(buf, timeout_ms) {
            Ok(0) => None,
            Ok(length) => Some(Transfer {
                length,
                status: TransferStatus::Success,
            }),
            Err(e) => {
                log::debug!("Read from {} failed: {e}", self.path);
                Some(Transfer {
                    length: 0,
                    status: status_from_hid_error(&e, Path::new(&self.path)),
                })
            }
        }
    }
}

/// Map a hidapi read error on the given device node onto a transfer status.
/// A node that no longer exists always means the gun was unplugged.
pub fn status_from_hid_error(error: &HidError, node: &Path) -> TransferStatus {
    if !node.exists() {
        return TransferStatus::NoDevice;
    }
    match error {
        HidError::IoError { error } => error
            .raw_os_error()
            .map(|code| Errno::from_raw(code).into())
            .unwrap_or(TransferStatus::Error(Errno::EIO)),
        // The hidraw backend reports a hangup or ENODEV only as text
        HidError::HidApiError { message }
            if message.contains("disconnected") || message.contains("No such device") =>
        {
            TransferStatus::NoDevice
        }
        _ => TransferStatus::Error(Errno::EIO),
    }
}

/// Returns all attached GunCon 2 hidraw interfaces
pub fn list_devices() -> Result<Vec<DeviceInfo>, TransportError> {
    let api = HidApi::new()?;
    let devices = api
        .device_list()
        .filter(|info| info.vendor_id() == VID && info.product_id() == PID)
        .cloned()
        .collect();

    Ok(devices)
}
