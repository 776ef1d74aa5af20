//! HC-05 Bluetooth serial module.
//!
//! The module is driven over a UART in one of two modes selected by its
//! KEY line:
//!
//! 1. **AT mode** - textual configuration commands (`AT+...`), answered
//!    with `OK`, `ERROR:(<hex>)` or `+NAME:value` lines.
//! 2. **Communication mode** - transparent passthrough; here it carries
//!    the NMEA stream of the paired GPS receiver.
//!
//! This module holds the shared vocabulary: modes, addresses and the
//! discovered-device list. The command codec lives in [`protocol`], the
//! error table in [`errors`].

pub mod errors;
pub mod protocol;

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::config::{DEVICE_NAME_CAPACITY, MAX_DEVICES};
use crate::io::Level;

/// Operating mode of the module, selected by the KEY line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hc05Mode {
    Communication,
    At,
}

impl Hc05Mode {
    /// KEY line level that selects this mode.
    pub fn key_level(self) -> Level {
        match self {
            Hc05Mode::Communication => Level::Low,
            Hc05Mode::At => Level::High,
        }
    }
}

/// `AT+ROLE` argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Slave = 0,
    Master = 1,
    SlaveLoop = 2,
}

/// `AT+CMODE` argument: how the module picks its peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectMode {
    /// Only the address set with `AT+BIND`.
    Bound = 0,
    /// Any address.
    Any = 1,
    SlaveLoop = 2,
}

/// Link state reported on the STATE line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl From<Level> for LinkState {
    fn from(level: Level) -> Self {
        match level {
            Level::High => LinkState::Connected,
            Level::Low => LinkState::Disconnected,
        }
    }
}

/// Mode and link bookkeeping for the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hc05Status {
    pub mode: Hc05Mode,
    pub link: LinkState,
    pub previous_link: LinkState,
}

impl Hc05Status {
    pub const fn new() -> Self {
        Self {
            mode: Hc05Mode::Communication,
            link: LinkState::Disconnected,
            previous_link: LinkState::Disconnected,
        }
    }

    /// Record a fresh STATE sample. Returns `true` when the link just dropped.
    pub fn observe_link(&mut self, link: LinkState) -> bool {
        self.previous_link = self.link;
        self.link = link;
        self.previous_link == LinkState::Connected && self.link == LinkState::Disconnected
    }
}

impl Default for Hc05Status {
    fn default() -> Self {
        Self::new()
    }
}

/// Classic Bluetooth device address, split the way the module prints it:
/// 16-bit NAP, 8-bit UAP, 24-bit LAP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BtAddress {
    pub nap: u16,
    pub uap: u8,
    pub lap: u32,
}

impl BtAddress {
    pub const fn new(nap: u16, uap: u8, lap: u32) -> Self {
        Self {
            nap,
            uap,
            lap: lap & 0x00FF_FFFF,
        }
    }

    /// Parse `NAP:UAP:LAP` (as printed by `+INQ`), `NAP,UAP,LAP`, or the
    /// conventional six-octet `AA:BB:CC:DD:EE:FF` form.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts: Vec<&str, 6> = Vec::new();
        for part in text.trim().split([':', ',']) {
            parts.push(part).ok()?;
        }

        match parts.len() {
            3 => {
                let nap = hex_field(parts[0], 4)? as u16;
                let uap = hex_field(parts[1], 2)? as u8;
                let lap = hex_field(parts[2], 6)?;
                Some(Self::new(nap, uap, lap))
            }
            6 => {
                let mut octets = [0u8; 6];
                for (octet, part) in octets.iter_mut().zip(parts.iter()) {
                    if part.len() != 2 {
                        return None;
                    }
                    *octet = hex_field(part, 2)? as u8;
                }
                let nap = u16::from_be_bytes([octets[0], octets[1]]);
                let lap = u32::from_be_bytes([0, octets[3], octets[4], octets[5]]);
                Some(Self::new(nap, octets[2], lap))
            }
            _ => None,
        }
    }

    /// The comma-separated form `AT+BIND` and `AT+LINK` expect.
    pub fn command_arg(&self) -> String<16> {
        let mut s = String::new();
        let _ = write!(s, "{:04X},{:02X},{:06X}", self.nap, self.uap, self.lap);
        s
    }

    /// Split into the two persisted integer cells.
    pub fn to_cells(&self) -> (i32, i32) {
        let uap_lap = (u32::from(self.uap) << 24) | self.lap;
        (i32::from(self.nap), uap_lap as i32)
    }

    /// Rebuild from persisted cells. Erased cells (-1) yield `None`.
    pub fn from_cells(nap: i32, uap_lap: i32) -> Option<Self> {
        let nap = u16::try_from(nap).ok()?;
        if uap_lap == -1 {
            return None;
        }
        let raw = uap_lap as u32;
        Some(Self::new(nap, (raw >> 24) as u8, raw & 0x00FF_FFFF))
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:02X}:{:06X}", self.nap, self.uap, self.lap)
    }
}

fn hex_field(part: &str, max_digits: usize) -> Option<u32> {
    if part.is_empty() || part.len() > max_digits || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(part, 16).ok()
}

/// Friendly name, truncated to the display-friendly capacity.
pub type DeviceName = String<DEVICE_NAME_CAPACITY>;

/// Build a [`DeviceName`], truncating at a character boundary.
pub fn device_name(text: &str) -> DeviceName {
    let mut name = DeviceName::new();
    for c in text.chars() {
        if name.push(c).is_err() {
            break;
        }
    }
    name
}

/// One peer found by inquiry or listed as recently paired.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceRecord {
    pub address: BtAddress,
    pub name: Option<DeviceName>,
}

impl DeviceRecord {
    pub fn new(address: BtAddress) -> Self {
        Self {
            address,
            name: None,
        }
    }
}

/// Peers collected during one discovery cycle.
///
/// Capacity is fixed at [`MAX_DEVICES`]; once full, further entries are
/// dropped without touching the stored ones. The cursor tracks iteration
/// (name lookup, user selection).
#[derive(Clone, Debug, Default)]
pub struct DeviceList {
    entries: Vec<DeviceRecord, MAX_DEVICES>,
    cursor: usize,
}

impl DeviceList {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
        }
    }

    /// Add a peer. An address already present only refreshes the name.
    /// Returns `false` when the record was dropped because the list is full.
    pub fn push(&mut self, record: DeviceRecord) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|d| d.address == record.address) {
            if record.name.is_some() {
                existing.name = record.name;
            }
            return true;
        }
        self.entries.push(record).is_ok()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceRecord> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.entries.iter()
    }

    pub fn position(&self, address: &BtAddress) -> Option<usize> {
        self.entries.iter().position(|d| d.address == *address)
    }

    pub fn set_name(&mut self, index: usize, name: DeviceName) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.name = Some(name);
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub fn current(&self) -> Option<&DeviceRecord> {
        self.entries.get(self.cursor)
    }
}
