//! Scenario tests for the connection machine, driven through scripted
//! collaborator doubles.

use std::collections::VecDeque;
use std::string::{String as StdString, ToString};
use std::vec::Vec as StdVec;

use super::*;
use crate::cells::CellStore;
use crate::io::{GpsDecoder, Level, Line, Pins, SerialLine};

// Doubles

#[derive(Default)]
struct FakePins {
    state: Option<Level>,
    key: Option<Level>,
}

impl Pins for FakePins {
    fn read_pin(&mut self, pin: Pin) -> Level {
        match pin {
            Pin::Hc05State => self.state.unwrap_or(Level::Low),
            _ => Level::High,
        }
    }

    fn set_key_line(&mut self, level: Level) {
        self.key = Some(level);
    }
}

/// Answers each command with the lines registered for it, once per
/// registration, in registration order.
#[derive(Default)]
struct ScriptedSerial {
    rules: StdVec<(StdString, StdVec<StdString>)>,
    incoming: VecDeque<StdString>,
    sent: StdVec<StdString>,
}

impl ScriptedSerial {
    fn on(&mut self, command: &str, replies: &[&str]) {
        self.rules.push((
            command.to_string(),
            replies.iter().map(|r| r.to_string()).collect(),
        ));
    }
}

impl SerialLine for ScriptedSerial {
    fn send_line(&mut self, text: &str) {
        self.sent.push(text.to_string());
        if let Some(i) = self.rules.iter().position(|(c, _)| c == text) {
            let (_, replies) = self.rules.remove(i);
            self.incoming.extend(replies);
        }
    }

    fn try_read_line(&mut self) -> Option<Line> {
        let text = self.incoming.pop_front()?;
        let mut line = Line::new();
        let _ = line.push_str(&text);
        Some(line)
    }
}

#[derive(Default)]
struct NullDisplay;

impl crate::io::Display for NullDisplay {
    fn write_at(&mut self, _row: u8, _col: u8, _text: &str) {}
}

/// Any `$GPRMC` line decodes to a fixed timestamp.
#[derive(Default)]
struct FixedGps;

impl GpsDecoder for FixedGps {
    fn try_decode_timestamp(&mut self, line: &str) -> Option<ClockTime> {
        line.starts_with("$GPRMC")
            .then(|| ClockTime::new(2024, 6, 1, 12, 0, 0))
            .flatten()
    }
}

struct Harness {
    pins: FakePins,
    serial: ScriptedSerial,
    display: NullDisplay,
    store: CellStore,
    gps: FixedGps,
    now: u64,
    conn: Connection,
    visited: StdVec<ProgramState>,
}

const STEP_MS: u64 = 100;

impl Harness {
    fn new() -> Self {
        Self {
            pins: FakePins::default(),
            serial: ScriptedSerial::default(),
            display: NullDisplay,
            store: CellStore::new(),
            gps: FixedGps,
            now: 0,
            conn: Connection::new(),
            visited: StdVec::new(),
        }
    }

    fn poll_with(&mut self, button: Option<Button>) -> Step {
        let mut io = Io {
            pins: &mut self.pins,
            serial: &mut self.serial,
            display: &mut self.display,
            store: &mut self.store,
            gps: &mut self.gps,
        };
        let step = self.conn.poll(&mut io, self.now, button);
        if let Some(state) = step.transition {
            self.visited.push(state);
        }
        self.now += STEP_MS;
        step
    }

    fn poll(&mut self) -> Step {
        self.poll_with(None)
    }

    /// Poll until `state` is current, failing after `max_polls`.
    fn run_until(&mut self, state: ProgramState, max_polls: usize) {
        for _ in 0..max_polls {
            if self.conn.state() == state && !self.conn.tracker().changed() {
                return;
            }
            self.poll();
        }
        panic!(
            "never reached {:?}; stuck in {:?}, visited {:?}, sent {:?}",
            state,
            self.conn.state(),
            self.visited,
            self.serial.sent
        );
    }

    fn script_discovery(&mut self, inq_lines: &[&str]) {
        let mut replies: StdVec<&str> = inq_lines.to_vec();
        replies.push("OK");
        self.serial.on("AT", &["OK"]);
        self.serial.on("AT+ADCN?", &["+ADCN:0", "OK"]);
        self.serial.on("AT+CMODE=1", &["OK"]);
        self.serial.on("AT+INIT", &["OK"]);
        self.serial.on("AT+ROLE=1", &["OK"]);
        self.serial.on("AT+INQM=1,15,48", &["OK"]);
        self.serial.on("AT+INQ", &replies);
    }
}

fn gps_address() -> BtAddress {
    BtAddress::parse("AA:BB:CC:DD:EE:FF").unwrap()
}

// Scenarios

#[test]
fn starts_by_raising_key_and_probing_after_settle() {
    let mut h = Harness::new();
    h.serial.on("AT", &["OK"]);
    h.poll();
    assert_eq!(h.pins.key, Some(Level::High));
    assert!(h.serial.sent.is_empty());

    h.run_until(ProgramState::DeviceCountQuery, 20);
    assert_eq!(h.serial.sent.first().map(|s| s.as_str()), Some("AT"));
}

#[test]
fn no_recent_match_falls_back_to_connect_any_then_inquiry() {
    let mut h = Harness::new();
    // Known address, but not bound.
    prefs::remember_pairing(&mut h.store, &BtAddress::new(0x1111, 0x22, 0x333333));
    prefs::unbind(&mut h.store);

    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+ADCN?", &["+ADCN:3", "OK"]);
    h.serial.on(
        "AT+MRAD?",
        &[
            "+MRAD:98D3:31:FD5C1A",
            "+MRAD:98D3:31:FD5C1B",
            "+MRAD:98D3:31:FD5C1C",
            "OK",
        ],
    );
    h.serial.on("AT+CMODE=1", &["OK"]);

    h.run_until(ProgramState::InitiatingInquiry, 60);
    assert_eq!(h.conn.devices().len(), 0, "inquiry starts with a fresh list");

    assert_eq!(
        h.visited,
        [
            ProgramState::DeviceCountQuery,
            ProgramState::CountingRecentDevices,
            ProgramState::CountedRecentDevices,
            ProgramState::SearchAuthenticatedDevice,
            ProgramState::SettingConnectionMode(ConnectMode::Any),
            ProgramState::InitiatingInquiry,
        ]
    );
    assert!(h.serial.sent.iter().any(|s| s == "AT+CMODE=1"));
}

#[test]
fn recognised_recent_device_is_linked_and_persisted() {
    let mut h = Harness::new();
    let known = BtAddress::new(0x98D3, 0x31, 0xFD5C1B);
    prefs::remember_pairing(&mut h.store, &known);
    prefs::unbind(&mut h.store);

    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+ADCN?", &["+ADCN:2", "OK"]);
    h.serial.on(
        "AT+MRAD?",
        &["+MRAD:98D3:31:FD5C1A", "+MRAD:98D3:31:FD5C1B", "OK"],
    );
    h.serial.on("AT+BIND=98D3,31,FD5C1B", &["OK"]);
    h.serial.on("AT+LINK=98D3,31,FD5C1B", &["OK"]);
    h.pins.state = Some(Level::High);

    h.run_until(ProgramState::ListeningNmea, 60);
    assert!(h.visited.contains(&ProgramState::ConnectingRecentDevice));
    assert!(prefs::is_bound(&h.store));
    assert_eq!(prefs::authenticated_address(&h.store), Some(known));
}

#[test]
fn bind_error_27_is_shown_then_returns_to_selection() {
    let mut h = Harness::new();
    h.script_discovery(&["+INQ:AABB:CC:DDEEFF,1F00,FFC0"]);
    h.serial.on("AT+RNAME?AABB,CC,DDEEFF", &["+RNAME:GPS-Mouse", "OK"]);
    h.serial.on("AT+BIND=AABB,CC,DDEEFF", &["ERROR:(1B)"]);

    h.run_until(ProgramState::ConfrontingUser, 80);
    let record = h.conn.devices().get(0).unwrap();
    assert_eq!(record.address, gps_address());
    assert_eq!(record.name.as_ref().map(|n| n.as_str()), Some("GPS-Mouse"));

    h.poll_with(Some(Button::Menu));
    assert_eq!(h.conn.state(), ProgramState::SettingBindAddress);
    h.poll(); // entry: AT+BIND
    h.poll(); // ERROR:(1B)
    assert_eq!(
        h.conn.notice().map(|e| e.message()),
        Some("Invalid Security Mode entered")
    );
    assert_eq!(h.conn.state(), ProgramState::SettingBindAddress);

    h.run_until(ProgramState::ConfrontingUser, 40);
    assert_eq!(h.conn.notice(), None);
}

#[test]
fn selected_device_is_bound_linked_and_remembered() {
    let mut h = Harness::new();
    h.script_discovery(&[
        "+INQ:1111:22:333333,1F00,FFC0",
        "+INQ:AABB:CC:DDEEFF,1F00,FFB0",
    ]);
    h.serial.on("AT+BIND=AABB,CC,DDEEFF", &["OK"]);
    h.serial.on("AT+LINK=AABB,CC,DDEEFF", &["OK"]);

    h.run_until(ProgramState::ConfrontingUser, 200);
    assert_eq!(h.conn.devices().len(), 2);

    h.poll_with(Some(Button::Navigate));
    h.poll_with(Some(Button::Menu));
    h.run_until(ProgramState::ConnectingToDevice, 10);
    h.poll();
    assert_eq!(h.conn.state(), ProgramState::ConnectingToDevice);

    h.pins.state = Some(Level::High);
    h.run_until(ProgramState::ListeningNmea, 10);
    assert_eq!(prefs::authenticated_address(&h.store), Some(gps_address()));
    assert_eq!(h.pins.key, Some(Level::Low));
    assert_eq!(h.serial.sent.last().map(|s| s.as_str()), Some("AT+RESET"));
}

#[test]
fn rescan_entry_restarts_inquiry() {
    let mut h = Harness::new();
    h.script_discovery(&["+INQ:AABB:CC:DDEEFF,1F00,FFC0"]);
    h.run_until(ProgramState::ConfrontingUser, 200);

    h.poll_with(Some(Button::Navigate));
    assert!(h.conn.rescan_selected());
    h.poll_with(Some(Button::Menu));
    assert_eq!(h.conn.notice(), Some(Error::UserAbort));

    h.run_until(ProgramState::InitiatingInquiry, 40);
}

#[test]
fn empty_inquiry_returns_to_device_count() {
    let mut h = Harness::new();
    h.script_discovery(&[]);
    h.run_until(ProgramState::InquiringDevices, 40);
    h.poll();
    h.poll();
    assert_eq!(h.conn.notice(), Some(Error::NotFound));
    h.run_until(ProgramState::DeviceCountQuery, 40);
}

#[test]
fn inquiry_timeout_error_ends_the_inquiry() {
    let mut h = Harness::new();
    h.script_discovery(&["+INQ:AABB:CC:DDEEFF,1F00,FFC0", "ERROR:(19)"]);
    h.run_until(ProgramState::ConfrontingUser, 200);
    assert_eq!(h.conn.devices().len(), 1);
}

#[test]
fn names_wait_for_the_inquiry_cancel_to_be_acknowledged() {
    let mut h = Harness::new();
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+ADCN?", &["+ADCN:0", "OK"]);
    h.serial.on("AT+CMODE=1", &["OK"]);
    h.serial.on("AT+INIT", &["OK"]);
    h.serial.on("AT+ROLE=1", &["OK"]);
    h.serial.on("AT+INQM=1,15,48", &["OK"]);
    // Results, but the module never ends the inquiry by itself.
    h.serial.on(
        "AT+INQ",
        &[
            "+INQ:1111:22:333333,1F00,FFC0",
            "+INQ:AABB:CC:DDEEFF,1F00,FFC0",
        ],
    );
    h.run_until(ProgramState::InquiringDevices, 60);

    let last_sent = |h: &Harness| h.serial.sent.last().cloned();
    for _ in 0..INQUIRY_TIMEOUT_MS / STEP_MS + 2 {
        if last_sent(&h).as_deref() == Some("AT+INQC") {
            break;
        }
        h.poll();
    }
    assert_eq!(last_sent(&h).as_deref(), Some("AT+INQC"));

    // The cancel is acknowledged late; nothing else goes out meanwhile.
    h.poll();
    assert_eq!(last_sent(&h).as_deref(), Some("AT+INQC"));
    h.serial.incoming.push_back("OK".to_string());
    h.poll();
    assert_eq!(last_sent(&h).as_deref(), Some("AT+RNAME?1111,22,333333"));

    h.poll();
    h.serial.incoming.push_back("+RNAME:Alpha".to_string());
    h.serial.incoming.push_back("OK".to_string());
    h.poll();
    assert_eq!(last_sent(&h).as_deref(), Some("AT+RNAME?AABB,CC,DDEEFF"));
    h.serial.incoming.push_back("OK".to_string());
    h.run_until(ProgramState::ConfrontingUser, 5);

    let name = |i: usize| {
        h.conn
            .devices()
            .get(i)
            .and_then(|d| d.name.as_ref().map(|n| n.as_str().to_string()))
    };
    assert_eq!(name(0).as_deref(), Some("Alpha"));
    assert_eq!(name(1), None);
}

#[test]
fn inquiry_keeps_at_most_fifteen_devices() {
    let mut h = Harness::new();
    let lines: StdVec<StdString> = (0..20)
        .map(|i| format!("+INQ:1234:56:{:06X},1F00,FFC0", i))
        .collect();
    let refs: StdVec<&str> = lines.iter().map(|s| s.as_str()).collect();
    h.script_discovery(&refs);

    h.run_until(ProgramState::ConfrontingUser, 400);
    assert_eq!(h.conn.devices().len(), MAX_DEVICES);
    assert_eq!(
        h.conn.devices().get(0).map(|d| d.address),
        Some(BtAddress::new(0x1234, 0x56, 0))
    );
}

#[test]
fn spp_already_initialised_counts_as_success() {
    let mut h = Harness::new();
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+ADCN?", &["+ADCN:0", "OK"]);
    h.serial.on("AT+CMODE=1", &["OK"]);
    h.serial.on("AT+INIT", &["ERROR:(17)"]);
    h.serial.on("AT+ROLE=1", &["OK"]);
    h.serial.on("AT+INQM=1,15,48", &["OK"]);

    h.run_until(ProgramState::InquiringDevices, 60);
    assert_eq!(h.conn.notice(), None);
}

#[test]
fn count_query_errors_retry_then_fall_back_to_inquiry() {
    let mut h = Harness::new();
    h.serial.on("AT", &["OK"]);
    for _ in 0..=MAX_COMMAND_RETRIES {
        h.serial.on("AT+ADCN?", &["ERROR:(0)"]);
    }

    h.run_until(ProgramState::InitiatingInquiry, 200);
    let queries = h.serial.sent.iter().filter(|s| *s == "AT+ADCN?").count();
    assert_eq!(queries, usize::from(MAX_COMMAND_RETRIES) + 1);
    assert!(!h.visited.contains(&ProgramState::CountingRecentDevices));
}

#[test]
fn unrecognised_reply_is_reported_as_error_zero() {
    let mut h = Harness::new();
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+ADCN?", &["garbage"]);
    h.run_until(ProgramState::DeviceCountQuery, 20);
    h.poll();
    h.poll();
    assert_eq!(
        h.conn.notice(),
        Some(Error::Protocol(Hc05Error::INVALID_COMMAND))
    );
}

#[test]
fn silent_module_is_reported_absent_and_probed_forever() {
    let mut h = Harness::new();
    let settle_and_probes = (MODE_SETTLE_MS
        + u64::from(MAX_PROBE_ATTEMPTS) * (REPLY_TIMEOUT_MS + STEP_MS))
        / STEP_MS;
    for _ in 0..settle_and_probes + 2 {
        h.poll();
    }
    assert_eq!(h.conn.notice(), Some(Error::HardwareAbsent));
    assert_eq!(h.conn.state(), ProgramState::InitialCheck);
    let probes = h.serial.sent.len();
    assert_eq!(probes, usize::from(MAX_PROBE_ATTEMPTS));

    // Next probe only after the back-off; the advisory stays up.
    for _ in 0..ABSENT_RETRY_MS / STEP_MS + 1 {
        h.poll();
    }
    assert_eq!(h.serial.sent.len(), probes + 1);
    assert_eq!(h.conn.notice(), Some(Error::HardwareAbsent));

    // The module shows up.
    h.serial.incoming.push_back("OK".to_string());
    h.poll();
    assert_eq!(h.conn.notice(), None);
    assert_eq!(h.conn.state(), ProgramState::DeviceCountQuery);
}

#[test]
fn bound_peer_reconnects_directly() {
    let mut h = Harness::new();
    prefs::remember_pairing(&mut h.store, &gps_address());
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+CMODE=0", &["OK"]);
    h.serial.on("AT+LINK=AABB,CC,DDEEFF", &["OK"]);
    h.pins.state = Some(Level::High);

    h.run_until(ProgramState::ListeningNmea, 40);
    assert_eq!(
        h.visited[..3],
        [
            ProgramState::SettingConnectionMode(ConnectMode::Bound),
            ProgramState::ConnectingToDevice,
            ProgramState::ListeningNmea,
        ]
    );
    assert!(!h.serial.sent.iter().any(|s| s == "AT+INQ"));
}

#[test]
fn link_timeout_falls_back_to_inquiry() {
    let mut h = Harness::new();
    prefs::remember_pairing(&mut h.store, &gps_address());
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+CMODE=0", &["OK"]);
    h.serial.on("AT+LINK=AABB,CC,DDEEFF", &["OK"]);

    h.run_until(ProgramState::ConnectingToDevice, 40);
    for _ in 0..(LINK_TIMEOUT_MS + ERROR_HOLD_MS) / STEP_MS + 4 {
        h.poll();
    }
    assert_eq!(h.conn.state(), ProgramState::InitiatingInquiry);
}

/// Bring a harness into `ListeningNmea` over the bound path.
fn listening() -> Harness {
    let mut h = Harness::new();
    prefs::remember_pairing(&mut h.store, &gps_address());
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+CMODE=0", &["OK"]);
    h.serial.on("AT+LINK=AABB,CC,DDEEFF", &["OK"]);
    h.pins.state = Some(Level::High);
    h.run_until(ProgramState::ListeningNmea, 40);
    h.poll();
    h
}

#[test]
fn disconnect_while_listening_restarts_at_initial_check() {
    let mut h = listening();
    h.pins.state = Some(Level::Low);
    let step = h.poll();
    assert_eq!(step.transition, Some(ProgramState::InitialCheck));
    assert_eq!(h.conn.state(), ProgramState::InitialCheck);

    h.poll();
    assert_eq!(h.pins.key, Some(Level::High));
}

#[test]
fn brief_link_drop_during_module_reset_is_not_a_disconnect() {
    let mut h = Harness::new();
    prefs::remember_pairing(&mut h.store, &gps_address());
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+CMODE=0", &["OK"]);
    h.serial.on("AT+LINK=AABB,CC,DDEEFF", &["OK"]);
    h.pins.state = Some(Level::High);
    h.run_until(ProgramState::ListeningNmea, 40);

    // The module restarts: STATE low until it relinks.
    h.pins.state = Some(Level::Low);
    h.poll();
    h.poll();
    assert_eq!(h.conn.state(), ProgramState::ListeningNmea);

    h.pins.state = Some(Level::High);
    h.poll();
    h.pins.state = Some(Level::Low);
    assert_eq!(h.poll().transition, Some(ProgramState::InitialCheck));
}

#[test]
fn link_not_back_after_module_reset_restarts_setup() {
    let mut h = Harness::new();
    prefs::remember_pairing(&mut h.store, &gps_address());
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+CMODE=0", &["OK"]);
    h.serial.on("AT+LINK=AABB,CC,DDEEFF", &["OK"]);
    h.pins.state = Some(Level::High);
    h.run_until(ProgramState::ListeningNmea, 40);

    h.pins.state = Some(Level::Low);
    for _ in 1..LINK_TIMEOUT_MS / STEP_MS {
        assert_eq!(h.poll().transition, None);
        assert_eq!(h.conn.state(), ProgramState::ListeningNmea);
    }
    assert_eq!(h.poll().transition, Some(ProgramState::InitialCheck));

    h.poll();
    assert_eq!(h.pins.key, Some(Level::High));
}

#[test]
fn nmea_lines_reach_the_decoder() {
    let mut h = listening();
    h.serial.incoming.push_back("$GPGGA,120000.00,,,,,0,00,,,M,,M,,*66".to_string());
    h.serial.incoming.push_back("$GPRMC,120000.00,A,,,,,,,010624,,,A*00".to_string());
    h.serial.incoming.push_back("OK".to_string());

    let step = h.poll();
    assert_eq!(step.nmea_lines, 2);
    assert_eq!(step.fix, ClockTime::new(2024, 6, 1, 12, 0, 0));
    assert_eq!(h.conn.state(), ProgramState::ListeningNmea);
}

#[test]
fn restart_discards_in_flight_inquiry() {
    let mut h = Harness::new();
    h.serial.on("AT", &["OK"]);
    h.serial.on("AT+ADCN?", &["+ADCN:0", "OK"]);
    h.serial.on("AT+CMODE=1", &["OK"]);
    h.serial.on("AT+INIT", &["OK"]);
    h.serial.on("AT+ROLE=1", &["OK"]);
    h.serial.on("AT+INQM=1,15,48", &["OK"]);
    h.serial.on("AT+INQ", &["+INQ:AABB:CC:DDEEFF,1F00,FFC0"]);
    h.run_until(ProgramState::InquiringDevices, 60);
    h.poll();
    h.poll();

    assert_eq!(h.conn.restart(), ProgramState::InitialCheck);
    h.poll();
    assert_eq!(h.conn.devices().len(), 0);
    assert_eq!(h.conn.state(), ProgramState::InitialCheck);
}

#[test]
fn state_tracker_reports_transitions() {
    let mut tracker = StateTracker::new(ProgramState::InitialCheck);
    assert!(tracker.changed());
    tracker.mark_entered();
    assert!(!tracker.changed());

    tracker.set(ProgramState::DeviceCountQuery);
    assert!(tracker.changed());
    assert_eq!(tracker.previous(), ProgramState::InitialCheck);
    assert_eq!(tracker.current(), ProgramState::DeviceCountQuery);
}
