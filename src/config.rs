//! Application-wide constants and compile-time configuration.
//!
//! All pin roles, timing parameters, protocol constants and persistence
//! addresses live here so they can be tuned in one place.

// HC-05

/// Maximum number of peers kept from one inquiry (also sent as the
/// module's inquiry limit).
pub const MAX_DEVICES: usize = 15;

/// Longest line accepted from the serial link. Longer lines are truncated.
pub const LINE_CAPACITY: usize = 96;

/// Longest command we ever emit (`AT+RNAME?` plus an address).
pub const COMMAND_CAPACITY: usize = 48;

/// Friendly names are truncated to this many bytes.
pub const DEVICE_NAME_CAPACITY: usize = 32;

/// How long to wait for `OK`/`ERROR` after an AT command (ms).
pub const REPLY_TIMEOUT_MS: u64 = 1_500;

/// How long `AT+INQ` may run before we give up on it (ms).
/// The module itself is told 48 x 1.28 s; this leaves headroom.
pub const INQUIRY_TIMEOUT_MS: u64 = 70_000;

/// How long to wait for the STATE line after `AT+LINK` returned `OK` (ms).
pub const LINK_TIMEOUT_MS: u64 = 10_000;

/// Delay between asserting the KEY line and the first command (ms).
pub const MODE_SETTLE_MS: u64 = 800;

/// Same-state retries before demoting to the next-coarser strategy.
pub const MAX_COMMAND_RETRIES: u8 = 3;

/// Failed `AT` probes before the module is declared absent.
pub const MAX_PROBE_ATTEMPTS: u8 = 3;

/// Probe period once the module is declared absent (ms).
pub const ABSENT_RETRY_MS: u64 = 10_000;

/// How long an error message stays on screen before the fallback (ms).
pub const ERROR_HOLD_MS: u64 = 2_000;

/// `AT+INQM` inquiry timeout argument, in units of 1.28 s.
pub const INQUIRY_DURATION_UNITS: u8 = 48;

/// UART baud rate of the HC-05 link (AT and data mode alike).
pub const HC05_BAUD: u32 = 38_400;

// Display

/// Character grid of the display (128x64 panel, 6x10 font).
pub const LCD_ROWS: u8 = 6;
pub const LCD_COLS: u8 = 21;

// GPIO pin assignments (nRF52840-DK defaults)
//
// Peripheral types are picked in `main.rs`. Adjust for your custom PCB.
//
//   Button MENU      -> P0.11
//   Button NAVIGATE  -> P0.12
//   Button ACTION    -> P0.24
//   HC-05 KEY        -> P0.03
//   HC-05 STATE      -> P0.04
//   UART TXD / RXD   -> P0.06 / P0.08
//   I2C SDA / SCL    -> P0.26 / P0.27

/// Main loop period (ms).
pub const POLL_PERIOD_MS: u64 = 10;

// Buttons

/// Minimum interval between two registered presses of one button (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 200;

// Scheduler

/// Maximum simultaneously registered timers.
pub const MAX_TIMERS: usize = 8;

/// Local clock tick period (ms).
pub const TICK_PERIOD_MS: u64 = 1_000;

/// Delay before the first GPS synchronisation (ms).
pub const FIRST_SYNC_DELAY_MS: u64 = 1_000;

/// Chronometer refresh period (ms).
pub const CHRONO_PERIOD_MS: u64 = 50;

// Persistence
//
// Each cell holds one 32-bit value. Erased cells read back as -1.

pub const ADDR_VERSION: u8 = 0;
pub const ADDR_UTC_OFFSET: u8 = 1;
pub const ADDR_LANGUAGE: u8 = 2;
pub const ADDR_DATE_VIEW: u8 = 3;
pub const ADDR_SYNC_FREQUENCY: u8 = 4;
pub const ADDR_BOUND_FLAG: u8 = 5;
pub const ADDR_AUTH_NAP: u8 = 6;
pub const ADDR_AUTH_UAP_LAP: u8 = 7;

/// Number of persisted cells.
pub const PERSISTED_CELLS: usize = 8;

/// Version marker written next to the preferences. A mismatch at boot
/// resets every cell to its default.
pub const FIRMWARE_VERSION: f32 = 1.0;

/// Defaults for a fresh or outdated preference store.
pub const DEFAULT_UTC_OFFSET_HOURS: i8 = 0;
pub const DEFAULT_SYNC_FREQUENCY_MIN: u16 = 30;

/// Accepted UTC offset range (hours).
pub const UTC_OFFSET_MIN: i8 = -12;
pub const UTC_OFFSET_MAX: i8 = 14;

// Flash (embedded only)

/// Flash page index where preference storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for preference storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
