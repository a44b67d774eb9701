use inotify::{EventMask, Inotify, WatchMask};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A file was written or moved into the watched directory
    Modify { name: String },
    /// A file was removed from the watched directory
    Delete { name: String },
}

/// Watch for filesystem changes in the given directory, sending [WatchEvent]
/// to the given channel. Blocks until the receiver is dropped or inotify
/// fails, so this should run on a blocking thread.
pub fn watch(path: String, tx: Sender<WatchEvent>) {
    let mut inotify = match Inotify::init() {
        Ok(inotify) => inotify,
        Err(e) => {
            log::error!("Failed to initialize inotify: {e}");
            return;
        }
    };

    // Editors commonly write a temporary file and rename it into place,
    // so renames count as modifications too.
    let mask = WatchMask::CLOSE_WRITE | WatchMask::MOVED_TO | WatchMask::CREATE | WatchMask::DELETE;
    if let Err(e) = inotify.watches().add(path.clone(), mask) {
        log::error!("Unable to add inotify watcher for path: {path}. Got error {e:?}");
        return;
    }

    // Listen for watch events
    let mut buffer = [0u8; 4096];
    loop {
        let events = match inotify.read_events_blocking(&mut buffer) {
            Ok(events) => events,
            Err(e) => {
                log::error!("Failed to read inotify events: {e}");
                return;
            }
        };

        for event in events {
            let Some(name) = event.name.and_then(|name| name.to_str()) else {
                continue;
            };
            let name = name.to_string();

            let value = if event.mask.contains(EventMask::DELETE) {
                log::debug!("inotify DELETE: {name}");
                WatchEvent::Delete { name }
            } else {
                log::debug!("inotify MODIFY: {name}");
                WatchEvent::Modify { name }
            };

            if let Err(e) = tx.blocking_send(value) {
                log::debug!("Stopping watcher for {path}: {e}");
                return;
            }
        }
    }
}
