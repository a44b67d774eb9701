use std::{
    error::Error,
    sync::{Arc, Mutex},
};

use crate::drivers::guncon2::event::{Axis, Button, Event, HatAxis};

use super::{emit_events, EventSink, SinkError};

/// Sink that records every event it receives. Frames are only committed to
/// the shared log on sync so tests can observe batching.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    staged: Vec<Event>,
    frames: Arc<Mutex<Vec<Vec<Event>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the committed frames that outlives the sink
    pub fn frames(&self) -> Arc<Mutex<Vec<Vec<Event>>>> {
        self.frames.clone()
    }

    /// Returns the number of events staged but not yet synced
    pub fn staged(&self) -> usize {
        self.staged.len()
    }
}

impl EventSink for RecordingSink {
    fn report_axis(&mut self, axis: Axis, value: i32) {
        self.staged.push(Event::Axis(axis, value));
    }

    fn report_button(&mut self, button: Button, pressed: bool) {
        self.staged.push(Event::Button(button, pressed));
    }

    fn report_hat(&mut self, axis: HatAxis, value: i8) {
        self.staged.push(Event::Hat(axis, value));
    }

    fn sync(&mut self) -> Result<(), SinkError> {
        let mut frame = std::mem::take(&mut self.staged);
        frame.push(Event::Sync);
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

#[tokio::test]
async fn test_emit_events() -> Result<(), Box<dyn Error>> {
    let mut sink = RecordingSink::new();
    let events = vec![
        Event::Axis(Axis::X, 512),
        Event::Button(Button::Trigger, true),
        Event::Hat(HatAxis::Y, -1),
    ];

    // Nothing is committed without a sync
    emit_events(&mut sink, &events)?;
    assert_eq!(sink.staged(), 3);
    assert!(sink.frames().lock().unwrap().is_empty());

    emit_events(&mut sink, &[Event::Sync])?;
    assert_eq!(sink.staged(), 0);

    let frames = sink.frames();
    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), 4);
    assert_eq!(frames[0][3], Event::Sync);

    Ok(())
}
