use std::error::Error;

use crate::drivers::guncon2::event::Button;

use super::guncon2::button_code;

/// Scancodes from linux/input-event-codes.h
#[tokio::test]
async fn test_button_codes() -> Result<(), Box<dyn Error>> {
    let expected = [
        (Button::Trigger, 0x110),
        (Button::Reload, 0x111),
        (Button::A, 0x130),
        (Button::B, 0x131),
        (Button::C, 0x132),
        (Button::Select, 0x13a),
        (Button::Start, 0x13b),
    ];
    for (button, code) in expected {
        assert_eq!(button_code(button).0, code, "{button:?}");
    }

    Ok(())
}
