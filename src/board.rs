//! nRF52840 implementations of the collaborator traits.
//!
//! Buttons and the HC-05 STATE line are plain inputs sampled on every
//! poll; KEY is a push-pull output. The UART receive side runs in its own
//! task and hands complete lines to the main loop through a channel.

use embassy_nrf::gpio::{Input, Level as GpioLevel, Output};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::{UarteRx, UarteTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::io::{Level, Line, Pin, Pins, SerialLine};

/// Lines received from the HC-05, oldest first.
static RX_LINES: Channel<CriticalSectionRawMutex, Line, 8> = Channel::new();

pub struct BoardPins {
    pub menu: Input<'static>,
    pub navigate: Input<'static>,
    pub action: Input<'static>,
    pub state: Input<'static>,
    pub key: Output<'static>,
}

impl Pins for BoardPins {
    fn read_pin(&mut self, pin: Pin) -> Level {
        let input = match pin {
            Pin::MenuButton => &self.menu,
            Pin::NavigateButton => &self.navigate,
            Pin::ActionButton => &self.action,
            Pin::Hc05State => &self.state,
        };
        if input.is_high() {
            Level::High
        } else {
            Level::Low
        }
    }

    fn set_key_line(&mut self, level: Level) {
        self.key.set_level(match level {
            Level::High => GpioLevel::High,
            Level::Low => GpioLevel::Low,
        });
    }
}

/// Transmit half of the HC-05 link plus the shared receive queue.
pub struct UartLink {
    tx: UarteTx<'static, UARTE0>,
}

impl UartLink {
    pub fn new(tx: UarteTx<'static, UARTE0>) -> Self {
        Self { tx }
    }
}

impl SerialLine for UartLink {
    fn send_line(&mut self, text: &str) {
        let mut framed: heapless::Vec<u8, { crate::config::COMMAND_CAPACITY + 2 }> =
            heapless::Vec::new();
        if framed.extend_from_slice(text.as_bytes()).is_err()
            || framed.extend_from_slice(b"\r\n").is_err()
        {
            warn!("Command too long - not sent");
            return;
        }
        if let Err(e) = self.tx.blocking_write(&framed) {
            error!("UART write error: {:?}", e);
        }
    }

    fn try_read_line(&mut self) -> Option<Line> {
        RX_LINES.try_receive().ok()
    }
}

/// Receive loop: assemble bytes into lines and queue them.
///
/// CR is dropped, LF terminates a line. Empty lines are skipped and lines
/// longer than [`Line`] capacity are discarded whole.
pub async fn uart_reader(mut rx: UarteRx<'static, UARTE0>) -> ! {
    let mut line = Line::new();
    let mut overflowed = false;
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            warn!("UART read error: {:?}", e);
            continue;
        }
        match byte[0] {
            b'\r' => {}
            b'\n' => {
                if !line.is_empty() && !overflowed {
                    if RX_LINES.try_send(core::mem::take(&mut line)).is_err() {
                        warn!("RX queue full - line dropped");
                    }
                }
                line.clear();
                overflowed = false;
            }
            b => {
                if overflowed {
                    continue;
                }
                if !b.is_ascii() || line.push(char::from(b)).is_err() {
                    trace!("Discarding overlong or binary line");
                    overflowed = true;
                }
            }
        }
    }
}
