//! Collaborator interfaces.
//!
//! The state machines never touch hardware directly. The embedded binary
//! implements these traits on top of Embassy drivers; tests implement them
//! with scripted doubles.

use heapless::String;

use crate::clock::ClockTime;
use crate::config::{LCD_COLS, LINE_CAPACITY};

/// One line of text received from the serial link, without terminator.
pub type Line = String<LINE_CAPACITY>;

/// Logic level of a digital line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

/// Digital lines the core reads or drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pin {
    /// Menu button (active-low).
    MenuButton,
    /// Navigate button (active-low).
    NavigateButton,
    /// Chronometer start/stop/reset button (active-low).
    ActionButton,
    /// HC-05 STATE output, high while a link is up.
    Hc05State,
}

/// Digital inputs plus the HC-05 KEY line.
pub trait Pins {
    fn read_pin(&mut self, pin: Pin) -> Level;

    /// Drive the HC-05 KEY line (high = AT mode).
    fn set_key_line(&mut self, level: Level);
}

/// Line-oriented serial link to the HC-05.
pub trait SerialLine {
    /// Send `text` followed by CR LF.
    fn send_line(&mut self, text: &str);

    /// Next complete line, if one has arrived. Never blocks.
    fn try_read_line(&mut self) -> Option<Line>;
}

/// Character display addressed by row and column.
pub trait Display {
    fn write_at(&mut self, row: u8, col: u8, text: &str);
}

/// Typed cells at small integer addresses (EEPROM-like).
pub trait Persistence {
    fn read_int(&self, address: u8) -> i32;
    fn write_int(&mut self, address: u8, value: i32);
    fn read_float(&self, address: u8) -> f32;
    fn write_float(&mut self, address: u8, value: f32);
}

/// GPS sentence decoder.
pub trait GpsDecoder {
    /// Decode a UTC timestamp from one NMEA sentence, if it carries one.
    fn try_decode_timestamp(&mut self, line: &str) -> Option<ClockTime>;
}

/// Everything one poll of the firmware may touch.
pub struct Io<'a> {
    pub pins: &'a mut dyn Pins,
    pub serial: &'a mut dyn SerialLine,
    pub display: &'a mut dyn Display,
    pub store: &'a mut dyn Persistence,
    pub gps: &'a mut dyn GpsDecoder,
}

/// Write `text` over a whole display row, truncated or space-padded to
/// the grid width.
pub fn write_row(display: &mut dyn Display, row: u8, text: &str) {
    let mut padded: String<{ LCD_COLS as usize }> = String::new();
    for c in text.chars() {
        if padded.push(c).is_err() {
            break;
        }
    }
    while padded.push(' ').is_ok() {}
    display.write_at(row, 0, padded.as_str());
}
