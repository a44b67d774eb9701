/// Absolute aim axes reported by the gun
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

/// Binary inputs reported by the gun
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    /// Trigger pulled while aiming at the screen
    Trigger,
    /// Trigger pulled while aiming away from the screen. Only reported when
    /// offscreen reload is enabled.
    Reload,
    A,
    B,
    C,
    Start,
    Select,
}

impl Button {
    /// Auxiliary buttons in emission order
    pub const AUXILIARY: [Button; 5] = [
        Button::A,
        Button::B,
        Button::C,
        Button::Start,
        Button::Select,
    ];
}

/// D-pad hat axes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HatAxis {
    X,
    Y,
}

/// State of the five auxiliary buttons
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuxButtons {
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub start: bool,
    pub select: bool,
}

impl AuxButtons {
    /// Returns whether the given auxiliary button is held. Trigger and reload
    /// are not auxiliary buttons and always return false.
    pub fn pressed(&self, button: Button) -> bool {
        match button {
            Button::A => self.a,
            Button::B => self.b,
            Button::C => self.c,
            Button::Start => self.start,
            Button::Select => self.select,
            Button::Trigger | Button::Reload => false,
        }
    }
}

/// D-pad state as a pair of hat axes, each in {-1, 0, 1}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hat {
    pub x: i8,
    pub y: i8,
}

/// Decoded contents of a single input report. Aim coordinates are [None]
/// when the position is not forwarded this cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NormalizedInput {
    pub x: Option<u16>,
    pub y: Option<u16>,
    pub trigger: bool,
    /// Only present when offscreen reload is enabled
    pub reload: Option<bool>,
    pub buttons: AuxButtons,
    pub hat: Hat,
}

impl NormalizedInput {
    /// Translate the decoded report into the ordered batch of events for one
    /// report: aim axes, then buttons, then the hat, then a single sync.
    pub fn events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(12);

        // Axis events
        if let Some(x) = self.x {
            events.push(Event::Axis(Axis::X, x.into()));
        }
        if let Some(y) = self.y {
            events.push(Event::Axis(Axis::Y, y.into()));
        }

        // Binary events
        events.push(Event::Button(Button::Trigger, self.trigger));
        if let Some(reload) = self.reload {
            events.push(Event::Button(Button::Reload, reload));
        }
        for button in Button::AUXILIARY {
            events.push(Event::Button(button, self.buttons.pressed(button)));
        }

        // D-pad
        events.push(Event::Hat(HatAxis::X, self.hat.x));
        events.push(Event::Hat(HatAxis::Y, self.hat.y));

        events.push(Event::Sync);
        events
    }
}

/// A single event sent to an event sink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Axis(Axis, i32),
    Button(Button, bool),
    Hat(HatAxis, i8),
    Sync,
}
