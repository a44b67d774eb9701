use std::error::Error;

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventType, InputEvent, InputId, KeyCode,
    PropType, UinputAbsSetup,
};

use crate::{
    config::{CalibrationConfig, DeviceLayout},
    drivers::guncon2::{
        driver::{OUTPUT_MAX_X, OUTPUT_MAX_Y, PID, VID},
        event::{Axis, Button, HatAxis},
    },
};

use super::{EventSink, SinkError};

const POINTER_NAME: &str = "Namco GunCon 2 (pointer)";
const JOYSTICK_NAME: &str = "Namco GunCon 2";
const VERSION: u16 = 0x100;

/// Which of the virtual devices an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Pointer,
    Joystick,
}

/// Virtual device along with the events staged for the next frame
#[derive(Debug)]
struct StagedDevice {
    device: VirtualDevice,
    events: Vec<InputEvent>,
}

impl StagedDevice {
    fn new(device: VirtualDevice) -> Self {
        Self {
            device,
            events: Vec::with_capacity(12),
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.events.is_empty() {
            return Ok(());
        }
        // Emitting a batch also writes the trailing SYN_REPORT
        self.device.emit(self.events.as_slice())?;
        self.events.clear();
        Ok(())
    }
}

/// Event sink backed by uinput. In the split layout aim, trigger and reload go
/// to a pointer device while the remaining buttons and the D-pad go to a
/// joystick device. The combined layout uses one device for everything.
#[derive(Debug)]
pub struct UinputSink {
    pointer: StagedDevice,
    joystick: Option<StagedDevice>,
}

impl UinputSink {
    /// Create the virtual devices for one gun. The axis ranges depend on
    /// whether raw coordinates are forwarded.
    pub fn new(layout: DeviceLayout, calibration: &CalibrationConfig) -> Result<Self, SinkError> {
        let (x_range, y_range) = axis_ranges(calibration);
        let sink = match layout {
            DeviceLayout::Split => {
                let pointer = create_pointer_device(x_range, y_range, false)
                    .map_err(|e| SinkError::Create(e.to_string()))?;
                let joystick =
                    create_joystick_device().map_err(|e| SinkError::Create(e.to_string()))?;
                Self {
                    pointer: StagedDevice::new(pointer),
                    joystick: Some(StagedDevice::new(joystick)),
                }
            }
            DeviceLayout::Combined => {
                let device = create_pointer_device(x_range, y_range, true)
                    .map_err(|e| SinkError::Create(e.to_string()))?;
                Self {
                    pointer: StagedDevice::new(device),
                    joystick: None,
                }
            }
        };
        log::debug!("Created virtual devices with {layout:?} layout");

        Ok(sink)
    }

    fn stage(&mut self, target: Target, event: InputEvent) {
        let device = match (target, self.joystick.as_mut()) {
            (Target::Joystick, Some(joystick)) => joystick,
            _ => &mut self.pointer,
        };
        device.events.push(event);
    }
}

impl EventSink for UinputSink {
    fn report_axis(&mut self, axis: Axis, value: i32) {
        let code = match axis {
            Axis::X => AbsoluteAxisCode::ABS_X,
            Axis::Y => AbsoluteAxisCode::ABS_Y,
        };
        self.stage(
            Target::Pointer,
            InputEvent::new(EventType::ABSOLUTE.0, code.0, value),
        );
    }

    fn report_button(&mut self, button: Button, pressed: bool) {
        let target = match button {
            Button::Trigger | Button::Reload => Target::Pointer,
            _ => Target::Joystick,
        };
        let code = button_code(button);
        self.stage(
            target,
            InputEvent::new(EventType::KEY.0, code.0, pressed as i32),
        );
    }

    fn report_hat(&mut self, axis: HatAxis, value: i8) {
        let code = match axis {
            HatAxis::X => AbsoluteAxisCode::ABS_HAT0X,
            HatAxis::Y => AbsoluteAxisCode::ABS_HAT0Y,
        };
        self.stage(
            Target::Joystick,
            InputEvent::new(EventType::ABSOLUTE.0, code.0, value.into()),
        );
    }

    fn sync(&mut self) -> Result<(), SinkError> {
        self.pointer.flush()?;
        if let Some(joystick) = self.joystick.as_mut() {
            joystick.flush()?;
        }
        Ok(())
    }
}

/// Returns the (min, max) of the aim axes
fn axis_ranges(calibration: &CalibrationConfig) -> ((i32, i32), (i32, i32)) {
    if calibration.raw_mode {
        let x = (calibration.x_min.into(), calibration.x_max.into());
        let y = (calibration.y_min.into(), calibration.y_max.into());
        return (x, y);
    }
    ((0, OUTPUT_MAX_X.into()), (0, OUTPUT_MAX_Y.into()))
}

/// Returns the key code reported for the given button. A and B use the
/// gamepad names for BTN_A and BTN_B.
pub fn button_code(button: Button) -> KeyCode {
    match button {
        Button::Trigger => KeyCode::BTN_LEFT,
        Button::Reload => KeyCode::BTN_RIGHT,
        Button::A => KeyCode::BTN_SOUTH,
        Button::B => KeyCode::BTN_EAST,
        Button::C => KeyCode::BTN_C,
        Button::Start => KeyCode::BTN_START,
        Button::Select => KeyCode::BTN_SELECT,
    }
}

fn input_id() -> InputId {
    InputId::new(BusType(3), VID, PID, VERSION)
}

/// Insert the joystick buttons into the given key set
fn insert_joystick_keys(keys: &mut AttributeSet<KeyCode>) {
    for button in Button::AUXILIARY {
        keys.insert(button_code(button));
    }
}

/// Create the pointer device. When `combined` is set the joystick buttons and
/// hat are added so one device carries every capability.
fn create_pointer_device(
    x_range: (i32, i32),
    y_range: (i32, i32),
    combined: bool,
) -> Result<VirtualDevice, Box<dyn Error>> {
    // Setup Key inputs
    let mut keys = AttributeSet::<KeyCode>::new();
    keys.insert(button_code(Button::Trigger));
    keys.insert(button_code(Button::Reload));
    if combined {
        insert_joystick_keys(&mut keys);
    }

    // Setup ABS inputs
    let x_setup = AbsInfo::new(0, x_range.0, x_range.1, 10, 0, 0);
    let y_setup = AbsInfo::new(0, y_range.0, y_range.1, 3, 0, 0);
    let abs_x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, x_setup);
    let abs_y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, y_setup);

    // Positions map directly onto the screen
    let mut properties = AttributeSet::<PropType>::new();
    properties.insert(PropType::DIRECT);

    let name = if combined { JOYSTICK_NAME } else { POINTER_NAME };
    let mut builder = VirtualDeviceBuilder::new()?
        .name(name)
        .input_id(input_id())
        .with_properties(&properties)?
        .with_keys(&keys)?
        .with_absolute_axis(&abs_x)?
        .with_absolute_axis(&abs_y)?;
    if combined {
        let dpad_setup = AbsInfo::new(0, -1, 1, 0, 0, 0);
        let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, dpad_setup);
        let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, dpad_setup);
        builder = builder
            .with_absolute_axis(&abs_hat0x)?
            .with_absolute_axis(&abs_hat0y)?;
    }
    let device = builder.build()?;

    Ok(device)
}

/// Create the joystick device for the auxiliary buttons and the D-pad
fn create_joystick_device() -> Result<VirtualDevice, Box<dyn Error>> {
    let mut keys = AttributeSet::<KeyCode>::new();
    insert_joystick_keys(&mut keys);

    let dpad_setup = AbsInfo::new(0, -1, 1, 0, 0, 0);
    let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, dpad_setup);
    let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, dpad_setup);

    let device = VirtualDeviceBuilder::new()?
        .name(JOYSTICK_NAME)
        .input_id(input_id())
        .with_keys(&keys)?
        .with_absolute_axis(&abs_hat0x)?
        .with_absolute_axis(&abs_hat0y)?
        .build()?;

    Ok(device)
}
