//! AT command encoding and reply decoding.
//!
//! Commands are sent one at a time; the module answers with zero or more
//! `+FIELD:value` lines followed by a terminal `OK`, `FAIL` or
//! `ERROR:(<hex>)`.
//!
//! ```text
//! > AT+ADCN?          > AT+INQ                         > AT+BIND=AABB,CC,DDEEFF
//! < +ADCN:3           < +INQ:98D3:31:FD5C1A,1F00,FFC0  < ERROR:(1B)
//! < OK                < OK
//! ```

use core::fmt::Write;

use heapless::String;

use super::errors::Hc05Error;
use super::{device_name, BtAddress, ConnectMode, DeviceName, Role};
use crate::config::COMMAND_CAPACITY;

/// Commands the firmware issues in AT mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Bare `AT`, used to probe for the module.
    Probe,
    Reset,
    /// Initialise the SPP profile library.
    Init,
    SetRole(Role),
    SetConnectMode(ConnectMode),
    /// Inquiry with RSSI, bounded by device count and duration (x 1.28 s).
    SetInquiryMode { max_devices: u8, duration: u8 },
    Inquire,
    CancelInquiry,
    /// Number of devices in the pairing list.
    CountPaired,
    /// Most recently authenticated device.
    RecentDevice,
    RemoteName(BtAddress),
    Bind(BtAddress),
    Link(BtAddress),
}

impl Command {
    /// Command text without line terminator.
    pub fn encode(&self) -> String<COMMAND_CAPACITY> {
        let mut s = String::new();
        let _ = match self {
            Command::Probe => s.write_str("AT"),
            Command::Reset => s.write_str("AT+RESET"),
            Command::Init => s.write_str("AT+INIT"),
            Command::SetRole(role) => write!(s, "AT+ROLE={}", *role as u8),
            Command::SetConnectMode(mode) => write!(s, "AT+CMODE={}", *mode as u8),
            Command::SetInquiryMode {
                max_devices,
                duration,
            } => write!(s, "AT+INQM=1,{},{}", max_devices, duration),
            Command::Inquire => s.write_str("AT+INQ"),
            Command::CancelInquiry => s.write_str("AT+INQC"),
            Command::CountPaired => s.write_str("AT+ADCN?"),
            Command::RecentDevice => s.write_str("AT+MRAD?"),
            Command::RemoteName(addr) => write!(s, "AT+RNAME?{}", addr.command_arg()),
            Command::Bind(addr) => write!(s, "AT+BIND={}", addr.command_arg()),
            Command::Link(addr) => write!(s, "AT+LINK={}", addr.command_arg()),
        };
        s
    }
}

/// One `+INQ` result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InquiryResult {
    pub address: BtAddress,
    pub class: u32,
    pub rssi: Option<i16>,
}

/// A decoded reply line.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    Ok,
    /// `AT+LINK` could not reach the peer.
    Fail,
    Error(Hc05Error),
    PairedCount(u16),
    RecentDevice(BtAddress),
    Inquiry(InquiryResult),
    RemoteName(DeviceName),
}

impl Reply {
    /// Address carried by a device-listing line.
    pub fn device_address(&self) -> Option<BtAddress> {
        match self {
            Reply::RecentDevice(addr) => Some(*addr),
            Reply::Inquiry(result) => Some(result.address),
            _ => None,
        }
    }
}

/// Decode one line from the module.
///
/// Empty and unrecognised lines decode as error 0 ("Command
/// Error/Invalid Command") so that no reply is ever silently dropped.
pub fn parse_reply(line: &str) -> Reply {
    let line = line.trim();

    if line == "OK" {
        return Reply::Ok;
    }
    if line == "FAIL" {
        return Reply::Fail;
    }
    if let Some(rest) = line.strip_prefix("ERROR") {
        return Reply::Error(parse_error_code(rest).unwrap_or(Hc05Error::INVALID_COMMAND));
    }

    let Some((field, value)) = line.strip_prefix('+').and_then(|l| l.split_once(':')) else {
        return Reply::Error(Hc05Error::INVALID_COMMAND);
    };

    let parsed = match field {
        "ADCN" => value.trim().parse().ok().map(Reply::PairedCount),
        "MRAD" => BtAddress::parse(value).map(Reply::RecentDevice),
        "INQ" => parse_inquiry(value).map(Reply::Inquiry),
        "RNAME" => Some(Reply::RemoteName(device_name(value.trim()))),
        _ => None,
    };
    parsed.unwrap_or(Reply::Error(Hc05Error::INVALID_COMMAND))
}

/// `:(1B)` -> 0x1B. The module prints codes in hex.
fn parse_error_code(rest: &str) -> Option<Hc05Error> {
    let inner = rest
        .trim()
        .strip_prefix(':')?
        .trim()
        .strip_prefix('(')?
        .strip_suffix(')')?;
    u32::from_str_radix(inner.trim(), 16).ok().map(Hc05Error::new)
}

/// `98D3:31:FD5C1A,1F00,FFC0` (RSSI is absent in inquiry mode 0).
fn parse_inquiry(value: &str) -> Option<InquiryResult> {
    let mut fields = value.split(',');
    let address = BtAddress::parse(fields.next()?)?;
    let class = u32::from_str_radix(fields.next()?.trim(), 16).ok()?;
    let rssi = fields
        .next()
        .and_then(|r| u16::from_str_radix(r.trim(), 16).ok())
        .map(|r| r as i16);
    Some(InquiryResult {
        address,
        class,
        rssi,
    })
}
