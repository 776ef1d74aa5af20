//! smartclock - GPS-synchronised clock firmware.
//!
//! Everything that can run without hardware lives in this library: the
//! HC-05 command codec, the connection state machine, the program loop,
//! menu, clock, scheduler and screen composition. The hardware is reached
//! only through the collaborator traits in [`io`].
//!
//! Usage: `cargo test --lib` (host) or `cargo build --release --features embedded`
//! (nRF52840 binary, see `main.rs`).

#![cfg_attr(not(test), no_std)]

// Must come first: the logging macros are used by every module below.
#[macro_use]
mod fmt;

pub mod cells;
pub mod clock;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod gps;
pub mod hc05;
pub mod io;
pub mod locale;
pub mod menu;
pub mod prefs;
pub mod program;
pub mod scheduler;
pub mod ui;

#[cfg(feature = "embedded")]
pub mod board;
#[cfg(feature = "embedded")]
pub mod storage;

pub use error::Error;
pub use program::Firmware;
