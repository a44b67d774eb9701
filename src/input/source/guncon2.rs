use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use thiserror::Error;

use crate::{
    drivers::guncon2::{
        driver::{DecodeOutcome, Driver, TransportAction},
        hid_report::ModeCommandReport,
        transport::{Transport, TransportError},
    },
    input::target::{emit_events, EventSink},
};

/// How long a single transport wait may block before the cancel flag is
/// checked again
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Transfers are read into a buffer larger than a report so oversized packets
/// can be detected
const TRANSFER_BUFFER_SIZE: usize = 64;

/// Only every Nth consecutive transfer failure is logged
const TRANSIENT_LOG_INTERVAL: u64 = 100;

/// Possible errors driving a [DeviceSession]
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("device I/O failed: {0}")]
    IoError(#[from] TransportError),
    #[error("event sink is no longer available")]
    SinkUnavailable,
}

/// Lifecycle state of a [DeviceSession]. Suspension is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Counters updated by the polling thread
#[derive(Debug, Default)]
pub struct SessionStats {
    reports: AtomicU64,
    malformed_packets: AtomicU64,
    transient_errors: AtomicU64,
}

impl SessionStats {
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    pub fn malformed_packets(&self) -> u64 {
        self.malformed_packets.load(Ordering::Relaxed)
    }

    pub fn transient_errors(&self) -> u64 {
        self.transient_errors.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: &DecodeOutcome) {
        let counter = match outcome {
            DecodeOutcome::Report(_) => &self.reports,
            DecodeOutcome::MalformedPacket { .. } => &self.malformed_packets,
            DecodeOutcome::TransportTransient(_) => &self.transient_errors,
            DecodeOutcome::TransportTerminal(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A running polling thread. The thread hands the sink back when it exits.
#[derive(Debug)]
struct Poller<S> {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<S>,
}

#[derive(Debug)]
struct SessionInner<S> {
    state: SessionState,
    suspended: bool,
    poller: Option<Poller<S>>,
    /// Present whenever no poller owns it
    sink: Option<S>,
}

/// One attached gun. Owns the transport, the decoder and the event sink, and
/// serializes every lifecycle transition through a single mutex. The polling
/// thread never takes that mutex, so a transition can always wait for it.
pub struct DeviceSession<T: Transport, S: EventSink> {
    name: String,
    transport: Arc<T>,
    driver: Driver,
    inner: Mutex<SessionInner<S>>,
    unavailable: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
}

impl<T: Transport, S: EventSink> DeviceSession<T, S> {
    pub fn new(name: String, transport: Arc<T>, driver: Driver, sink: S) -> Self {
        Self {
            name,
            transport,
            driver,
            inner: Mutex::new(SessionInner {
                state: SessionState::Closed,
                suspended: false,
                poller: None,
                sink: Some(sink),
            }),
            unavailable: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Returns the name used to identify this session in logs
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    /// Returns true while the polling thread is running
    pub fn is_polling(&self) -> bool {
        self.lock()
            .poller
            .as_ref()
            .is_some_and(|poller| !poller.handle.is_finished())
    }

    /// Returns true once a terminal transfer status stopped polling
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Put the gun into streaming mode and start polling for reports. On
    /// failure the session stays closed.
    pub fn open(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state == SessionState::Open {
            log::debug!("{}: already open", self.name);
            return Ok(());
        }
        inner.state = SessionState::Opening;

        let command = ModeCommandReport::default();
        if let Err(e) = self.transport.send_control(&command) {
            log::error!("{}: failed to send mode command: {e}", self.name);
            inner.state = SessionState::Closed;
            return Err(e.into());
        }
        if let Err(e) = self.start_polling(&mut inner) {
            log::error!("{}: failed to start polling: {e}", self.name);
            inner.state = SessionState::Closed;
            return Err(e);
        }

        inner.state = SessionState::Open;
        inner.suspended = false;
        log::info!("{}: opened", self.name);
        Ok(())
    }

    /// Stop polling and close the session. No report is decoded after this
    /// returns. Closing a session that was never opened is a no-op.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Closed {
            return;
        }
        inner.state = SessionState::Closing;
        self.stop_polling(&mut inner);
        inner.state = SessionState::Closed;
        inner.suspended = false;
        log::info!("{}: closed", self.name);
    }

    /// Stop polling while keeping the session open
    pub fn suspend(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Open {
            self.stop_polling(&mut inner);
        }
        inner.suspended = true;
        log::debug!("{}: suspended", self.name);
    }

    /// Restart polling after a suspend
    pub fn resume(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        inner.suspended = false;
        if inner.state == SessionState::Open {
            self.start_polling(&mut inner)?;
        }
        log::debug!("{}: resumed", self.name);
        Ok(())
    }

    /// Restart polling after the device was reset while suspended
    pub fn reset_resume(&self) -> Result<(), SessionError> {
        self.resume()
    }

    /// Stop polling before the device is reset, whether or not the session
    /// is open
    pub fn pre_reset(&self) {
        let mut inner = self.lock();
        self.stop_polling(&mut inner);
        log::debug!("{}: stopped for reset", self.name);
    }

    /// Restart polling once the device has been reset
    pub fn post_reset(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state == SessionState::Open {
            self.start_polling(&mut inner)?;
        }
        log::debug!("{}: reset complete", self.name);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner<S>> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Spawn the polling thread unless one is already running
    fn start_polling(&self, inner: &mut SessionInner<S>) -> Result<(), SessionError> {
        if let Some(poller) = inner.poller.as_ref() {
            if !poller.handle.is_finished() {
                return Ok(());
            }
            // The previous poller stopped on its own; reclaim the sink
            self.stop_polling(inner);
        }

        let sink = inner.sink.take().ok_or(SessionError::SinkUnavailable)?;
        let cancel = Arc::new(AtomicBool::new(false));
        self.unavailable.store(false, Ordering::Release);

        let context = PollContext {
            name: self.name.clone(),
            transport: self.transport.clone(),
            driver: self.driver.clone(),
            cancel: cancel.clone(),
            unavailable: self.unavailable.clone(),
            stats: self.stats.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("guncon2-{}", self.name))
            .spawn(move || context.run(sink))
            .map_err(TransportError::Io)?;

        inner.poller = Some(Poller { cancel, handle });
        log::debug!("{}: polling started", self.name);
        Ok(())
    }

    /// Cancel the polling thread and wait for it to exit
    fn stop_polling(&self, inner: &mut SessionInner<S>) {
        let Some(poller) = inner.poller.take() else {
            return;
        };
        poller.cancel.store(true, Ordering::Release);
        match poller.handle.join() {
            Ok(sink) => inner.sink = Some(sink),
            Err(_) => log::error!("{}: polling thread panicked", self.name),
        }
        log::debug!("{}: polling stopped", self.name);
    }
}

impl<T: Transport, S: EventSink> Drop for DeviceSession<T, S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Everything the polling thread needs, moved into the thread
struct PollContext<T> {
    name: String,
    transport: Arc<T>,
    driver: Driver,
    cancel: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
}

impl<T: Transport> PollContext<T> {
    /// Decode transfers in completion order until cancelled or the transport
    /// reports a terminal status. Returns the sink so it can be reused.
    fn run<S: EventSink>(self, mut sink: S) -> S {
        let mut buf = [0; TRANSFER_BUFFER_SIZE];
        let mut failures: u64 = 0;
        while !self.cancel.load(Ordering::Acquire) {
            let Some(transfer) = self.transport.wait_transfer(&mut buf, POLL_TIMEOUT) else {
                continue;
            };
            // Transfers that complete after cancellation are dropped
            if self.cancel.load(Ordering::Acquire) {
                break;
            }

            let length = transfer.length.min(buf.len());
            let outcome = self.driver.handle_transfer(&buf[..length], transfer.status);
            self.stats.record(&outcome);
            let transient = matches!(outcome, DecodeOutcome::TransportTransient(_));
            if !transient && failures > 0 {
                log::debug!("{}: recovered after {failures} failed transfers", self.name);
                failures = 0;
            }
            match &outcome {
                DecodeOutcome::Report(_) => (),
                DecodeOutcome::MalformedPacket { length } => {
                    log::debug!("{}: dropping {length} byte packet", self.name);
                }
                DecodeOutcome::TransportTransient(status) => {
                    failures += 1;
                    if failures == 1 || failures % TRANSIENT_LOG_INTERVAL == 0 {
                        log::debug!(
                            "{}: transfer failed ({failures} in a row): {status:?}",
                            self.name
                        );
                    }
                }
                DecodeOutcome::TransportTerminal(status) => {
                    log::info!("{}: transfer terminated: {status:?}", self.name);
                }
            }

            if let Err(e) = emit_events(&mut sink, &outcome.events()) {
                log::warn!("{}: failed to emit events: {e}", self.name);
            }

            if outcome.next_action() == TransportAction::Stop {
                self.unavailable.store(true, Ordering::Release);
                break;
            }

            // A failed read returns at once, so pace the retries
            if transient {
                thread::sleep(POLL_TIMEOUT);
            }
        }
        sink
    }
}
