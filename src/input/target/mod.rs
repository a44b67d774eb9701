pub mod guncon2;

#[cfg(test)]
pub mod guncon2_test;

#[cfg(test)]
pub mod mod_test;

use thiserror::Error;

use crate::drivers::guncon2::event::{Axis, Button, Event, HatAxis};

/// Possible errors writing to an event sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to write events: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to create virtual device: {0}")]
    Create(String),
}

/// A [EventSink] is anything that accepts input events decoded from a gun.
/// Events are staged by the `report_*` methods and delivered as one batch when
/// [EventSink::sync] is called.
pub trait EventSink: Send + 'static {
    fn report_axis(&mut self, axis: Axis, value: i32);
    fn report_button(&mut self, button: Button, pressed: bool);
    fn report_hat(&mut self, axis: HatAxis, value: i8);
    /// Deliver every staged event as a single frame
    fn sync(&mut self) -> Result<(), SinkError>;
}

/// Forward the given events to the sink in order
pub fn emit_events<S: EventSink + ?Sized>(sink: &mut S, events: &[Event]) -> Result<(), SinkError> {
    for event in events {
        match *event {
            Event::Axis(axis, value) => sink.report_axis(axis, value),
            Event::Button(button, pressed) => sink.report_button(button, pressed),
            Event::Hat(axis, value) => sink.report_hat(axis, value),
            Event::Sync => sink.sync()?,
        }
    }
    Ok(())
}
