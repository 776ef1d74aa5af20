//! Button sampling with interval debouncing.
//!
//! Three physical buttons (active-low with internal pull-up):
//!   - MENU     - open / descend / commit, select a device during setup
//!   - NAVIGATE - next entry or next base view
//!   - ACTION   - chronometer start / stop / reset
//!
//! The pins are sampled once per poll. A press registers on the
//! released-to-pressed edge, and only if at least `BUTTON_DEBOUNCE_MS`
//! passed since the previous registered press of the same button.

use heapless::Vec;

use super::input_logic::debounce_elapsed;
use super::Button;
use crate::config::BUTTON_DEBOUNCE_MS;
use crate::io::{Level, Pin, Pins};

const BUTTONS: [(Button, Pin); 3] = [
    (Button::Menu, Pin::MenuButton),
    (Button::Navigate, Pin::NavigateButton),
    (Button::Action, Pin::ActionButton),
];

#[derive(Clone, Copy, Debug, Default)]
struct Track {
    held: bool,
    last_press_ms: Option<u64>,
}

/// Edge detector and debouncer for the three buttons.
#[derive(Clone, Debug, Default)]
pub struct ButtonFilter {
    tracks: [Track; 3],
}

impl ButtonFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample every button and return the presses registered this poll.
    pub fn poll(&mut self, pins: &mut dyn Pins, now_ms: u64) -> Vec<Button, 3> {
        let mut pressed = Vec::new();
        for ((button, pin), track) in BUTTONS.iter().zip(self.tracks.iter_mut()) {
            let held = pins.read_pin(*pin) == Level::Low;
            let edge = held && !track.held;
            track.held = held;

            if edge && debounce_elapsed(track.last_press_ms, now_ms, BUTTON_DEBOUNCE_MS) {
                track.last_press_ms = Some(now_ms);
                debug!("Button: {:?}", button);
                let _ = pressed.push(*button);
            }
        }
        pressed
    }
}
