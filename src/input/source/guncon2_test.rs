use std::{
    collections::VecDeque,
    error::Error,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use nix::errno::Errno;
use packed_struct::PackedStruct;

use crate::{
    config::{CalibrationConfig, ReportLayout, SharedCalibration},
    drivers::guncon2::{
        driver::{Driver, TransferStatus},
        event::{Axis, Event},
        hid_report::ModeCommandReport,
        transport::{Transfer, Transport, TransportError},
    },
    input::target::mod_test::RecordingSink,
};

use super::guncon2::{DeviceSession, SessionError, SessionState};

/// Transport that replays queued transfers and records control commands
#[derive(Default)]
pub struct ScriptedTransport {
    transfers: Mutex<VecDeque<(Vec<u8>, TransferStatus)>>,
    commands: Mutex<Vec<[u8; 6]>>,
    pub fail_control: AtomicBool,
    /// Every read fails at once with EIO while set
    pub fail_transfers: AtomicBool,
}

impl ScriptedTransport {
    pub fn push(&self, data: &[u8], status: TransferStatus) {
        self.transfers
            .lock()
            .unwrap()
            .push_back((data.to_vec(), status));
    }

    pub fn push_report(&self, x: u16, y: u8) {
        let [x_lo, x_hi] = x.to_le_bytes();
        self.push(&[0xff, 0xff, x_lo, x_hi, y, 0x00], TransferStatus::Success);
    }

    pub fn commands(&self) -> Vec<[u8; 6]> {
        self.commands.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn send_control(&self, command: &ModeCommandReport) -> Result<(), TransportError> {
        if self.fail_control.load(Ordering::Acquire) {
            return Err(TransportError::ShortWrite {
                written: 0,
                expected: 7,
            });
        }
        self.commands.lock().unwrap().push(command.pack()?);
        Ok(())
    }

    fn wait_transfer(&self, buf: &mut [u8], timeout: Duration) -> Option<Transfer> {
        if self.fail_transfers.load(Ordering::Acquire) {
            return Some(Transfer {
                length: 0,
                status: TransferStatus::Error(Errno::EIO),
            });
        }
        let next = self.transfers.lock().unwrap().pop_front();
        let Some((data, status)) = next else {
            thread::sleep(timeout);
            return None;
        };
        let length = data.len().min(buf.len());
        buf[..length].copy_from_slice(&data[..length]);
        Some(Transfer { length, status })
    }
}

struct Test {
    transport: Arc<ScriptedTransport>,
    calibration: SharedCalibration,
    frames: Arc<Mutex<Vec<Vec<Event>>>>,
    session: DeviceSession<ScriptedTransport, RecordingSink>,
}

impl Test {
    fn new() -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        let calibration = SharedCalibration::new(CalibrationConfig::default());
        let driver = Driver::new(ReportLayout::Standard, calibration.clone());
        let sink = RecordingSink::new();
        let frames = sink.frames();
        let session = DeviceSession::new("test".to_string(), transport.clone(), driver, sink);
        Self {
            transport,
            calibration,
            frames,
            session,
        }
    }

    fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    /// Wait until every queued transfer has been consumed and decoded
    fn drain(&self, frames: usize) -> bool {
        wait_for(|| self.transport.pending() == 0 && self.frame_count() >= frames)
    }
}

pub fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[tokio::test]
async fn test_close_without_open() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.close();
    assert_eq!(test.session.state(), SessionState::Closed);
    assert!(!test.session.is_polling());
    assert!(test.transport.commands().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_open_failure() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.transport.fail_control.store(true, Ordering::Release);

    let result = test.session.open();
    assert!(matches!(result, Err(SessionError::IoError(_))));
    assert_eq!(test.session.state(), SessionState::Closed);
    assert!(!test.session.is_polling());

    // A later attempt can still succeed
    test.transport.fail_control.store(false, Ordering::Release);
    test.session.open()?;
    assert_eq!(test.session.state(), SessionState::Open);
    test.session.close();

    Ok(())
}

#[tokio::test]
async fn test_open_and_close() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.open()?;
    assert_eq!(test.session.state(), SessionState::Open);
    assert!(test.session.is_polling());
    assert_eq!(test.transport.commands(), vec![[0, 0, 0, 0, 0, 1]]);

    test.transport.push_report(352, 120);
    assert!(test.drain(1));
    {
        let frames = test.frames.lock().unwrap();
        println!("Frames: {frames:?}");
        assert_eq!(frames[0][0], Event::Axis(Axis::X, 425));
        assert_eq!(frames[0].last(), Some(&Event::Sync));
    }
    assert_eq!(test.session.stats().reports(), 1);

    // Nothing is decoded once close returns
    test.session.close();
    assert_eq!(test.session.state(), SessionState::Closed);
    assert!(!test.session.is_polling());
    test.transport.push_report(352, 120);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(test.frame_count(), 1);
    assert_eq!(test.transport.pending(), 1);

    Ok(())
}

#[tokio::test]
async fn test_suspend_and_resume() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.open()?;

    test.session.suspend();
    assert_eq!(test.session.state(), SessionState::Open);
    assert!(test.session.is_suspended());
    assert!(!test.session.is_polling());

    test.transport.push_report(352, 120);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(test.frame_count(), 0);

    test.session.resume()?;
    assert!(!test.session.is_suspended());
    assert!(test.session.is_polling());
    assert!(test.drain(1));

    // Resuming does not resend the mode command
    assert_eq!(test.transport.commands().len(), 1);

    test.session.reset_resume()?;
    assert!(test.session.is_polling());
    test.session.close();

    Ok(())
}

#[tokio::test]
async fn test_suspend_closed_session() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.suspend();
    test.session.resume()?;
    assert_eq!(test.session.state(), SessionState::Closed);
    assert!(!test.session.is_polling());

    Ok(())
}

#[tokio::test]
async fn test_reset() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.open()?;

    test.session.pre_reset();
    assert!(!test.session.is_polling());
    assert_eq!(test.session.state(), SessionState::Open);

    test.session.post_reset()?;
    assert!(test.session.is_polling());
    test.transport.push_report(352, 120);
    assert!(test.drain(1));
    test.session.close();

    // Reset of a closed session does not start polling
    test.session.pre_reset();
    test.session.post_reset()?;
    assert!(!test.session.is_polling());

    Ok(())
}

#[tokio::test]
async fn test_terminal_status_stops_polling() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.open()?;

    test.transport.push(&[0xff; 4], TransferStatus::Success);
    test.transport.push(&[], TransferStatus::Error(Errno::EPROTO));
    test.transport.push_report(352, 120);
    test.transport.push(&[], TransferStatus::NoDevice);
    test.transport.push_report(352, 120);

    assert!(wait_for(|| test.session.is_unavailable()));
    assert!(wait_for(|| !test.session.is_polling()));

    // Only the full report produced events and the last transfer was never read
    assert_eq!(test.frame_count(), 1);
    assert_eq!(test.transport.pending(), 1);
    assert_eq!(test.session.stats().malformed_packets(), 1);
    assert_eq!(test.session.stats().transient_errors(), 1);
    assert_eq!(test.session.stats().reports(), 1);

    // The session is still open and polling can be restarted
    assert_eq!(test.session.state(), SessionState::Open);
    test.session.resume()?;
    assert!(!test.session.is_unavailable());
    assert!(test.drain(2));
    test.session.close();

    Ok(())
}

#[tokio::test]
async fn test_calibration_change_between_reports() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.open()?;

    test.transport.push_report(352, 120);
    assert!(test.drain(1));

    test.calibration.update(CalibrationConfig {
        raw_mode: true,
        ..Default::default()
    });
    test.transport.push_report(352, 120);
    assert!(test.drain(2));
    test.session.close();

    let frames = test.frames.lock().unwrap();
    assert_eq!(frames[0][0], Event::Axis(Axis::X, 425));
    assert_eq!(frames[1][0], Event::Axis(Axis::X, 352));

    Ok(())
}

#[tokio::test]
async fn test_transient_errors_are_paced() -> Result<(), Box<dyn Error>> {
    let test = Test::new();
    test.session.open()?;

    // Failed reads return immediately, the session must still back off
    test.transport.fail_transfers.store(true, Ordering::Release);
    thread::sleep(Duration::from_millis(100));
    test.session.close();

    let retries = test.session.stats().transient_errors();
    println!("Retries in 100ms: {retries}");
    assert!(retries >= 1);
    assert!(retries <= 20);
    assert_eq!(test.frame_count(), 0);

    // Reads recover once the transport does
    test.transport.fail_transfers.store(false, Ordering::Release);
    test.session.open()?;
    test.transport.push_report(352, 120);
    assert!(test.drain(1));
    test.session.close();

    Ok(())
}
