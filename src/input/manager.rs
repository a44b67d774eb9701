use std::{collections::HashMap, error::Error, path::PathBuf, sync::Arc, time::Duration};

use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc,
};

use crate::{
    config::{
        path::find_config_file,
        watcher::{self, WatchEvent},
        Config, SharedCalibration,
    },
    drivers::guncon2::{
        driver::Driver,
        transport::{self, HidTransport, Transport},
    },
    input::{
        source::guncon2::DeviceSession,
        target::{guncon2::UinputSink, EventSink},
    },
};

const DEV_PATH: &str = "/dev";
const BUFFER_SIZE: usize = 1024;

/// Delay before opening a newly created hidraw node so udev can apply its
/// permissions
const HIDRAW_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Manager commands define all the different ways to interact with [Manager]
/// over a channel. These commands are processed in the `run()` loop and
/// dispatched as they come in.
#[derive(Debug, Clone)]
pub enum Command {
    HIDRawAdded { name: String },
    HIDRawRemoved { name: String },
    ConfigChanged,
    SystemSleep,
    SystemWake,
    DeviceReset,
    Stop,
}

/// Power transitions applied to every session at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Sleep,
    Wake,
    Reset,
}

/// Tracks system sleep so a reset that happens while asleep is finished by
/// the wake that follows it
#[derive(Debug, Default)]
pub struct PowerState {
    asleep: bool,
    reset_while_asleep: bool,
}

impl PowerState {
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Apply the given event to every session
    pub fn apply<'a, T, S>(
        &mut self,
        event: PowerEvent,
        sessions: impl IntoIterator<Item = &'a DeviceSession<T, S>>,
    ) where
        T: Transport + 'a,
        S: EventSink + 'a,
    {
        match event {
            PowerEvent::Sleep => {
                self.asleep = true;
                for session in sessions {
                    session.suspend();
                }
            }
            PowerEvent::Wake => {
                let reset = self.reset_while_asleep;
                self.asleep = false;
                self.reset_while_asleep = false;
                for session in sessions {
                    let result = if reset {
                        session.reset_resume()
                    } else {
                        session.resume()
                    };
                    if let Err(e) = result {
                        log::error!("Unable to resume {}: {e}", session.name());
                    }
                }
            }
            PowerEvent::Reset => {
                if self.asleep {
                    self.reset_while_asleep = true;
                }
                for session in sessions {
                    session.pre_reset();
                    if self.asleep {
                        continue;
                    }
                    if let Err(e) = session.post_reset() {
                        log::error!("Unable to restart {} after reset: {e}", session.name());
                    }
                }
            }
        }
    }
}

type GunSession = DeviceSession<HidTransport, UinputSink>;

/// Discovers attached guns and owns one [DeviceSession] for each of them.
/// Every session reads the same [SharedCalibration], which is replaced
/// whenever the config file changes on disk.
pub struct Manager {
    config: Config,
    config_path: Option<PathBuf>,
    calibration: SharedCalibration,
    /// The transmit side of the [rx] channel used to send [Command] messages
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    /// Mapping of all currently managed guns.
    /// E.g. {"/dev/hidraw3": <DeviceSession>}
    sessions: HashMap<String, GunSession>,
    power: PowerState,
}

impl Manager {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Manager {
        let (tx, rx) = mpsc::channel(BUFFER_SIZE);
        let calibration = SharedCalibration::new(config.calibration);
        Manager {
            config,
            config_path,
            calibration,
            tx,
            rx,
            sessions: HashMap::new(),
            power: PowerState::default(),
        }
    }

    /// Open every attached gun, then listen for [Command] messages until
    /// stopped. All sessions are closed before this returns.
    pub async fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Err(e) = self.config.calibration.validate() {
            log::warn!("Calibration will pass raw values through: {e}");
        }
        self.discover();
        self.watch_devices();
        self.watch_config();
        self.watch_power_signals();

        // Setup CTRL+C handler
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Unable to listen for shutdown signal: {e}");
                return;
            }
            if let Err(e) = tx.send(Command::Stop).await {
                log::error!("Unable to send stop command: {e}");
            }
        });

        // Loop and listen for command events
        while let Some(cmd) = self.rx.recv().await {
            log::debug!("Received command: {cmd:?}");
            match cmd {
                Command::HIDRawAdded { name } => self.on_hidraw_added(name).await,
                Command::HIDRawRemoved { name } => self.on_hidraw_removed(name),
                Command::ConfigChanged => self.reload_config(),
                Command::SystemSleep => self.on_power_event(PowerEvent::Sleep),
                Command::SystemWake => self.on_power_event(PowerEvent::Wake),
                Command::DeviceReset => self.on_power_event(PowerEvent::Reset),
                Command::Stop => break,
            }
        }

        log::info!("Shutting down");
        self.close_all();

        Ok(())
    }

    /// Open a session for every attached gun that does not have one yet
    fn discover(&mut self) {
        let devices = match transport::list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                log::error!("Unable to enumerate hidraw devices: {e}");
                return;
            }
        };

        // Guns whose transfers were terminated are reopened from scratch
        self.sessions.retain(|path, session| {
            let stopped = session.is_unavailable();
            if stopped {
                log::info!("Reopening {path} after its transfers stopped");
            }
            !stopped
        });

        for info in devices {
            let path = info.path().to_string_lossy().to_string();
            if self.sessions.contains_key(&path) {
                continue;
            }
            log::info!("Found GunCon 2 at {path}");
            match self.open_session(path.as_str()) {
                Ok(session) => {
                    // Guns attached while asleep start polling on wake
                    if self.power.is_asleep() {
                        session.suspend();
                    }
                    self.sessions.insert(path, session);
                }
                Err(e) => log::error!("Unable to open GunCon 2 at {path}: {e}"),
            }
        }
    }

    fn open_session(&self, path: &str) -> Result<GunSession, Box<dyn Error>> {
        let transport = Arc::new(HidTransport::open_path(path)?);
        let sink = UinputSink::new(self.config.device_layout, &self.calibration.snapshot())?;
        let driver = Driver::new(self.config.report_layout, self.calibration.clone());
        let session = DeviceSession::new(transport.path().to_string(), transport, driver, sink);
        session.open()?;

        Ok(session)
    }

    /// Called when a hidraw device (e.g. /dev/hidraw0) is added
    async fn on_hidraw_added(&mut self, name: String) {
        log::debug!("HIDRaw added: {name}");
        tokio::time::sleep(HIDRAW_SETTLE_DELAY).await;
        self.discover();
    }

    /// Called when a hidraw device (e.g. /dev/hidraw0) is removed
    fn on_hidraw_removed(&mut self, name: String) {
        log::debug!("HIDRaw removed: {name}");
        let path = format!("{DEV_PATH}/{name}");
        if let Some(session) = self.sessions.remove(&path) {
            session.close();
            let stats = session.stats();
            log::info!(
                "GunCon 2 at {path} removed after {} reports ({} malformed, {} transfer errors)",
                stats.reports(),
                stats.malformed_packets(),
                stats.transient_errors()
            );
        }
    }

    fn on_power_event(&mut self, event: PowerEvent) {
        log::info!("Applying {event:?} to {} guns", self.sessions.len());
        self.power.apply(event, self.sessions.values());
    }

    /// Load the config file again and apply its calibration to every session.
    /// Layout changes only apply to guns attached afterwards.
    fn reload_config(&mut self) {
        let Some(path) = self.config_path.as_ref() else {
            return;
        };
        let config = match Config::from_yaml_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Unable to reload config from {path:?}, keeping current: {e}");
                return;
            }
        };

        if config.report_layout != self.config.report_layout
            || config.device_layout != self.config.device_layout
        {
            log::warn!("Layout changes take effect when a gun is next attached");
        }
        log::info!("Reloaded config from {path:?}: {:?}", config.calibration);
        self.calibration.update(config.calibration);
        self.config = config;
    }

    fn close_all(&mut self) {
        for (_, session) in self.sessions.drain() {
            log::debug!("Closing {} ({:?})", session.name(), session.state());
            session.close();
        }
    }

    /// Starts watching for hidraw nodes that are added and removed
    fn watch_devices(&self) {
        let (watcher_tx, mut watcher_rx) = mpsc::channel(BUFFER_SIZE);
        tokio::task::spawn_blocking(move || {
            log::debug!("Started hidraw watcher thread");
            watcher::watch(DEV_PATH.into(), watcher_tx)
        });

        // Dispatch filesystem watch events to the `run()` loop
        let cmd_tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = watcher_rx.recv().await {
                let cmd = match event {
                    WatchEvent::Modify { name } if name.starts_with("hidraw") => {
                        Command::HIDRawAdded { name }
                    }
                    WatchEvent::Delete { name } if name.starts_with("hidraw") => {
                        Command::HIDRawRemoved { name }
                    }
                    _ => continue,
                };
                if let Err(e) = cmd_tx.send(cmd).await {
                    log::error!("Unable to send command: {e}");
                    return;
                }
            }
        });
    }

    /// Forward SIGUSR1 (sleep), SIGUSR2 (wake) and SIGHUP (reset) to the
    /// `run()` loop. The systemd suspend unit sends the first two.
    fn watch_power_signals(&self) {
        let signals = [
            (SignalKind::user_defined1(), Command::SystemSleep),
            (SignalKind::user_defined2(), Command::SystemWake),
            (SignalKind::hangup(), Command::DeviceReset),
        ];
        for (kind, cmd) in signals {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    log::error!("Unable to listen for {cmd:?} signal: {e}");
                    continue;
                }
            };
            let tx = self.tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if let Err(e) = tx.send(cmd.clone()).await {
                        log::error!("Unable to send command: {e}");
                        return;
                    }
                }
            });
        }
    }

    /// Starts watching the loaded config file for changes
    fn watch_config(&self) {
        let Some(path) = self.config_path.clone() else {
            log::info!("No config file found, hot reload disabled");
            return;
        };
        let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let dir = dir.to_string_lossy().to_string();
        let file_name = file_name.to_string_lossy().to_string();

        let (watcher_tx, mut watcher_rx) = mpsc::channel(BUFFER_SIZE);
        tokio::task::spawn_blocking(move || {
            log::debug!("Started config watcher thread for {dir}");
            watcher::watch(dir, watcher_tx)
        });

        let cmd_tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = watcher_rx.recv().await {
                let WatchEvent::Modify { name } = event else {
                    continue;
                };
                if name != file_name {
                    continue;
                }
                if let Err(e) = cmd_tx.send(Command::ConfigChanged).await {
                    log::error!("Unable to send command: {e}");
                    return;
                }
            }
        });
    }
}

/// Load the first config file found in the search paths, falling back to the
/// defaults if there is none or it cannot be parsed.
pub fn load_config() -> (Config, Option<PathBuf>) {
    let Some(path) = find_config_file() else {
        log::info!("No config file found, using defaults");
        return (Config::default(), None);
    };

    match Config::from_yaml_file(&path) {
        Ok(config) => {
            log::info!("Loaded config from {path:?}");
            (config, Some(path))
        }
        Err(e) => {
            log::error!("Unable to load config from {path:?}, using defaults: {e}");
            (Config::default(), Some(path))
        }
    }
}
