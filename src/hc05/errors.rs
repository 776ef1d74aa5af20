//! HC-05 error codes.
//!
//! The module answers a rejected command with `ERROR:(<hex>)`. Codes 0x00
//! through 0x1C have a fixed meaning; anything else maps to a generic
//! message instead of indexing past the table.

/// Message shown for codes outside the table.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Number of documented error codes.
pub const ERROR_COUNT: usize = 29;

const MESSAGES: [&str; ERROR_COUNT] = [
    "Command Error/Invalid Command",
    "Results in default value",
    "PSKEY write error",
    "Device name is too long (>32 characters)",
    "No device name specified (0 length)",
    "Bluetooth address NAP is too long",
    "Bluetooth address UAP is too long",
    "Bluetooth address LAP is too long",
    "PIO map not specified (0 length)",
    "Invalid PIO port Number entered",
    "Device Class not specified (0 length)",
    "Device Class too long",
    "Inquire Access Code not Specified (0 length)",
    "Inquire Access Code too long",
    "Invalid Inquire Access Code entered",
    "Pairing Password not specified (0 length)",
    "Pairing Password too long (> 16 characters)",
    "Invalid Role entered",
    "Invalid Baud Rate entered",
    "Invalid Stop Bit entered",
    "Invalid Parity Bit entered",
    "No device in the Pairing List",
    "SPP not initialized",
    "SPP already initialized",
    "Invalid Inquiry Mode",
    "Inquiry Timeout occured",
    "Invalid/zero length address entered",
    "Invalid Security Mode entered",
    "Invalid Encryption Mode entered",
];

/// Look up the message for a raw module error code.
pub fn error_message(code: u32) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|idx| MESSAGES.get(idx))
        .copied()
        .unwrap_or(UNKNOWN_ERROR)
}

/// An error reported by the module, identified by its raw code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hc05Error {
    pub code: u32,
}

impl Hc05Error {
    pub const INVALID_COMMAND: Self = Self::new(0x00);
    pub const SPP_ALREADY_INITIALIZED: Self = Self::new(0x17);
    pub const INQUIRY_TIMEOUT: Self = Self::new(0x19);

    pub const fn new(code: u32) -> Self {
        Self { code }
    }

    pub fn message(&self) -> &'static str {
        error_message(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_code_has_its_message() {
        let expected = [
            (0x00, "Command Error/Invalid Command"),
            (0x01, "Results in default value"),
            (0x02, "PSKEY write error"),
            (0x03, "Device name is too long (>32 characters)"),
            (0x04, "No device name specified (0 length)"),
            (0x05, "Bluetooth address NAP is too long"),
            (0x06, "Bluetooth address UAP is too long"),
            (0x07, "Bluetooth address LAP is too long"),
            (0x08, "PIO map not specified (0 length)"),
            (0x09, "Invalid PIO port Number entered"),
            (0x0A, "Device Class not specified (0 length)"),
            (0x0B, "Device Class too long"),
            (0x0C, "Inquire Access Code not Specified (0 length)"),
            (0x0D, "Inquire Access Code too long"),
            (0x0E, "Invalid Inquire Access Code entered"),
            (0x0F, "Pairing Password not specified (0 length)"),
            (0x10, "Pairing Password too long (> 16 characters)"),
            (0x11, "Invalid Role entered"),
            (0x12, "Invalid Baud Rate entered"),
            (0x13, "Invalid Stop Bit entered"),
            (0x14, "Invalid Parity Bit entered"),
            (0x15, "No device in the Pairing List"),
            (0x16, "SPP not initialized"),
            (0x17, "SPP already initialized"),
            (0x18, "Invalid Inquiry Mode"),
            (0x19, "Inquiry Timeout occured"),
            (0x1A, "Invalid/zero length address entered"),
            (0x1B, "Invalid Security Mode entered"),
            (0x1C, "Invalid Encryption Mode entered"),
        ];
        assert_eq!(expected.len(), ERROR_COUNT);
        for (code, message) in expected {
            assert_eq!(error_message(code), message, "code {:#04x}", code);
        }
    }

    #[test]
    fn out_of_range_codes_fall_back() {
        assert_eq!(error_message(29), UNKNOWN_ERROR);
        assert_eq!(error_message(0xFF), UNKNOWN_ERROR);
        assert_eq!(error_message(u32::MAX), UNKNOWN_ERROR);
        assert_eq!(Hc05Error::new(29).message(), UNKNOWN_ERROR);
    }

    #[test]
    fn named_constants_match_table() {
        assert_eq!(Hc05Error::INVALID_COMMAND.message(), "Command Error/Invalid Command");
        assert_eq!(Hc05Error::SPP_ALREADY_INITIALIZED.message(), "SPP already initialized");
        assert_eq!(Hc05Error::INQUIRY_TIMEOUT.message(), "Inquiry Timeout occured");
    }
}
