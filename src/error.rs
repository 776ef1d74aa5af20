//! Unified error type for smartclock.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

pub use crate::hc05::errors::Hc05Error;

/// Top-level error type used across the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // HC-05
    /// The module rejected a command or answered with something unparsable.
    Protocol(Hc05Error),

    /// No reply within the polling window.
    Timeout,

    /// Inquiry or pairing-list search produced no usable peer.
    NotFound,

    /// The user backed out of the device selection.
    UserAbort,

    /// The module never answered the `AT` probe.
    HardwareAbsent,

    // Storage
    /// Flash read/write/erase failed, or a stored blob was malformed.
    Storage,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

impl Error {
    /// Human-readable text for the display.
    pub fn message(&self) -> &'static str {
        match self {
            Error::Protocol(e) => e.message(),
            Error::Timeout => "No reply",
            Error::NotFound => "No device found",
            Error::UserAbort => "Cancelled",
            Error::HardwareAbsent => "HC-05 not found",
            Error::Storage => "Storage error",
            Error::BufferOverflow => "Buffer overflow",
        }
    }
}

// Convenience conversions

impl From<Hc05Error> for Error {
    fn from(e: Hc05Error) -> Self {
        Error::Protocol(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_show_the_module_message() {
        let e: Error = Hc05Error::new(27).into();
        assert_eq!(e.message(), "Invalid Security Mode entered");
        assert_eq!(Error::Protocol(Hc05Error::new(99)).message(), "Unknown error");
    }

    #[test]
    fn local_errors_have_short_messages() {
        assert_eq!(Error::HardwareAbsent.message(), "HC-05 not found");
        assert!(Error::Timeout.message().len() <= 16);
        assert!(Error::NotFound.message().len() <= 16);
    }
}
