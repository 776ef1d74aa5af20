//! HC-05 connection lifecycle.
//!
//! Drives the module from power-up to a live NMEA stream:
//!
//! ```text
//! InitialCheck ──bound──▶ SettingConnectionMode(Bound) ──▶ ConnectingToDevice ──▶ ListeningNmea
//!      │                                                         ▲
//!      └─▶ DeviceCountQuery ─▶ CountingRecentDevices ─▶ CountedRecentDevices
//!                │                                           │
//!                │            SearchAuthenticatedDevice ◀────┘
//!                │              │ found          │ not found
//!                │              ▼                ▼
//!                │   ConnectingRecentDevice   SettingConnectionMode(Any)
//!                │                                │
//!                └──────────────▶ InitiatingInquiry ─▶ InquiringDevices
//!                                                         │
//!                          SettingBindAddress ◀── ConfrontingUser
//! ```
//!
//! Every step is non-blocking: a command is sent, the machine records what
//! it waits for and a deadline, and later polls consume reply lines. At
//! most one state transition happens per [`Connection::poll`]. Entry
//! actions of a state run on the poll after the transition.
//!
//! Errors never escape. Each one is shown for `ERROR_HOLD_MS`, then the
//! machine either retries the same state (bounded by
//! `MAX_COMMAND_RETRIES`) or falls back to a coarser strategy.

#[cfg(test)]
mod tests;

use crate::clock::ClockTime;
use crate::config::*;
use crate::error::{Error, Hc05Error};
use crate::hc05::protocol::{parse_reply, Command, Reply};
use crate::hc05::{
    BtAddress, ConnectMode, DeviceList, DeviceRecord, Hc05Mode, Hc05Status, LinkState, Role,
};
use crate::io::{Io, Pin};
use crate::prefs;
use crate::ui::input_logic::cycle_next;
use crate::ui::Button;

/// Phase of the program as a whole. Every variant but `ListeningNmea`
/// is a setup phase owned by the connection machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramState {
    /// Enter AT mode, probe the module, read the bound flag.
    InitialCheck,
    /// `AT+ADCN?`: how many peers are in the pairing list.
    DeviceCountQuery,
    /// `AT+MRAD?`: collect recently authenticated peers.
    CountingRecentDevices,
    CountedRecentDevices,
    /// Look for the persisted address among the collected peers.
    SearchAuthenticatedDevice,
    /// `AT+BIND` then `AT+LINK` to the recognised peer.
    ConnectingRecentDevice,
    SettingConnectionMode(ConnectMode),
    /// SPP init, master role, inquiry parameters.
    InitiatingInquiry,
    /// `AT+INQ` running, then friendly-name lookups.
    InquiringDevices,
    /// Waiting for the user to pick a peer.
    ConfrontingUser,
    SettingBindAddress,
    /// `AT+LINK`, then wait for the STATE line.
    ConnectingToDevice,
    /// Communication mode: NMEA lines flow to the GPS decoder.
    ListeningNmea,
}

impl ProgramState {
    pub fn is_setup(&self) -> bool {
        *self != ProgramState::ListeningNmea
    }
}

/// Current and previous state. `changed()` holds from a transition until
/// the entry actions of the new state ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateTracker {
    current: ProgramState,
    previous: ProgramState,
    entered: bool,
}

impl StateTracker {
    pub const fn new(initial: ProgramState) -> Self {
        Self {
            current: initial,
            previous: initial,
            entered: false,
        }
    }

    pub fn current(&self) -> ProgramState {
        self.current
    }

    pub fn previous(&self) -> ProgramState {
        self.previous
    }

    pub fn changed(&self) -> bool {
        !self.entered
    }

    fn set(&mut self, next: ProgramState) {
        self.previous = self.current;
        self.current = next;
        self.entered = false;
    }

    fn mark_entered(&mut self) {
        self.entered = true;
    }
}

/// What to do once an error hold expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum After {
    /// Run the entry actions of the current state again.
    Retry,
    Goto(ProgramState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    /// Entry actions pending.
    Enter,
    /// KEY line raised; the module needs time before it accepts commands.
    Settling { until_ms: u64 },
    /// A command is out; data lines and a terminal reply are expected.
    Awaiting { command: Command, deadline_ms: u64 },
    /// `AT+LINK` accepted; waiting for the STATE line to go high.
    AwaitingLink { deadline_ms: u64 },
    /// An error is on screen.
    Holding { until_ms: u64, then: After },
    /// Probe failed repeatedly; try again at `retry_at_ms`.
    Absent { retry_at_ms: u64 },
    /// Nothing outstanding (waiting for the user, or listening).
    Idle,
}

/// Output of one poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// State entered during this poll.
    pub transition: Option<ProgramState>,
    /// Latest GPS timestamp decoded this poll.
    pub fix: Option<ClockTime>,
    /// NMEA lines received this poll.
    pub nmea_lines: u16,
}

/// The connection state machine.
#[derive(Clone, Debug)]
pub struct Connection {
    state: StateTracker,
    phase: Phase,
    retries: u8,
    probes: u8,
    paired_count: u16,
    naming_index: usize,
    devices: DeviceList,
    target: Option<BtAddress>,
    notice: Option<Error>,
    status: Hc05Status,
}

impl Connection {
    pub const fn new() -> Self {
        Self {
            state: StateTracker::new(ProgramState::InitialCheck),
            phase: Phase::Enter,
            retries: 0,
            probes: 0,
            paired_count: 0,
            naming_index: 0,
            devices: DeviceList::new(),
            target: None,
            notice: None,
            status: Hc05Status::new(),
        }
    }

    pub fn state(&self) -> ProgramState {
        self.state.current()
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.state
    }

    /// Error currently on screen, if any.
    pub fn notice(&self) -> Option<Error> {
        self.notice
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    /// Whether the selection cursor sits on the trailing "Rescan" entry.
    pub fn rescan_selected(&self) -> bool {
        self.devices.cursor() >= self.devices.len()
    }

    pub fn status(&self) -> &Hc05Status {
        &self.status
    }

    /// Peer being bound or linked.
    pub fn target(&self) -> Option<BtAddress> {
        self.target
    }

    /// Drop all in-flight context and start over at `InitialCheck`.
    pub fn restart(&mut self) -> ProgramState {
        self.go(ProgramState::InitialCheck);
        ProgramState::InitialCheck
    }

    /// Advance the machine by at most one transition.
    pub fn poll(&mut self, io: &mut Io<'_>, now_ms: u64, button: Option<Button>) -> Step {
        let mut step = Step::default();
        self.advance(io, now_ms, button, &mut step);
        step
    }

    fn advance(&mut self, io: &mut Io<'_>, now_ms: u64, button: Option<Button>, step: &mut Step) {
        if self.state() == ProgramState::ListeningNmea && !self.state.changed() {
            self.listen(io, now_ms, step);
            return;
        }

        if self.phase == Phase::Enter {
            self.state.mark_entered();
            self.enter(io, now_ms);
            step.transition = self.take_transition();
            return;
        }

        match self.phase {
            Phase::Holding { until_ms, then } => {
                drain(io);
                if now_ms >= until_ms {
                    self.notice = None;
                    match then {
                        After::Retry => {
                            debug!("Retrying {:?} ({})", self.state(), self.retries);
                            self.enter(io, now_ms);
                        }
                        After::Goto(next) => self.go(next),
                    }
                }
            }
            Phase::Settling { until_ms } => {
                drain(io);
                if now_ms >= until_ms {
                    self.send(io, now_ms, Command::Probe);
                }
            }
            Phase::Absent { retry_at_ms } => {
                drain(io);
                if now_ms >= retry_at_ms {
                    self.send(io, now_ms, Command::Probe);
                }
            }
            Phase::AwaitingLink { deadline_ms } => {
                drain(io);
                let link = LinkState::from(io.pins.read_pin(Pin::Hc05State));
                self.status.observe_link(link);
                if link == LinkState::Connected {
                    self.linked(io);
                } else if now_ms >= deadline_ms {
                    self.fail(now_ms, Error::Timeout);
                }
            }
            Phase::Awaiting { command, .. } => {
                while let Some(line) = io.serial.try_read_line() {
                    let reply = parse_reply(line.as_str());
                    trace!("< {:?}", reply);
                    self.on_reply(io, now_ms, command, reply);
                    if self.pending_transition() || !self.awaiting(command) {
                        break;
                    }
                }
                if let Phase::Awaiting {
                    command,
                    deadline_ms,
                } = self.phase
                {
                    if now_ms >= deadline_ms {
                        self.on_timeout(io, now_ms, command);
                    }
                }
            }
            Phase::Idle | Phase::Enter => {
                drain(io);
                if self.state() == ProgramState::ConfrontingUser {
                    if let Some(button) = button {
                        self.confront(now_ms, button);
                    }
                }
            }
        }

        step.transition = self.take_transition();
    }

    // Transitions

    fn go(&mut self, next: ProgramState) {
        info!("{:?} -> {:?}", self.state(), next);
        self.state.set(next);
        self.phase = Phase::Enter;
        self.retries = 0;
    }

    fn pending_transition(&self) -> bool {
        self.state.changed() && self.phase == Phase::Enter
    }

    fn take_transition(&self) -> Option<ProgramState> {
        self.pending_transition().then_some(self.state())
    }

    fn awaiting(&self, command: Command) -> bool {
        matches!(self.phase, Phase::Awaiting { command: c, .. } if c == command)
    }

    /// Entry actions. Also used to retry a state in place.
    fn enter(&mut self, io: &mut Io<'_>, now_ms: u64) {
        match self.state() {
            ProgramState::InitialCheck => {
                self.devices.clear();
                self.target = None;
                self.paired_count = 0;
                self.probes = 0;
                self.status = Hc05Status::new();
                self.status.mode = Hc05Mode::At;
                io.pins.set_key_line(Hc05Mode::At.key_level());
                self.phase = Phase::Settling {
                    until_ms: now_ms + MODE_SETTLE_MS,
                };
            }
            ProgramState::DeviceCountQuery => {
                self.paired_count = 0;
                self.send(io, now_ms, Command::CountPaired);
            }
            ProgramState::CountingRecentDevices => {
                self.devices.clear();
                self.send(io, now_ms, Command::RecentDevice);
            }
            ProgramState::CountedRecentDevices => {
                info!("{} recent device(s) collected", self.devices.len());
                self.go(ProgramState::SearchAuthenticatedDevice);
            }
            ProgramState::SearchAuthenticatedDevice => {
                let known = prefs::authenticated_address(&*io.store)
                    .filter(|addr| self.devices.position(addr).is_some());
                match known {
                    Some(addr) => {
                        info!("Recognised {}", addr);
                        self.target = Some(addr);
                        self.go(ProgramState::ConnectingRecentDevice);
                    }
                    None => self.go(ProgramState::SettingConnectionMode(ConnectMode::Any)),
                }
            }
            ProgramState::ConnectingRecentDevice | ProgramState::SettingBindAddress => {
                match self.target {
                    Some(addr) => self.send(io, now_ms, Command::Bind(addr)),
                    None => self.go(ProgramState::InitiatingInquiry),
                }
            }
            ProgramState::SettingConnectionMode(mode) => {
                self.send(io, now_ms, Command::SetConnectMode(mode));
            }
            ProgramState::InitiatingInquiry => {
                self.devices.clear();
                self.send(io, now_ms, Command::Init);
            }
            ProgramState::InquiringDevices => {
                self.devices.clear();
                self.send(io, now_ms, Command::Inquire);
                self.phase = Phase::Awaiting {
                    command: Command::Inquire,
                    deadline_ms: now_ms + INQUIRY_TIMEOUT_MS,
                };
            }
            ProgramState::ConfrontingUser => {
                self.devices.set_cursor(0);
                self.phase = Phase::Idle;
            }
            ProgramState::ConnectingToDevice => match self.target {
                Some(addr) => self.send(io, now_ms, Command::Link(addr)),
                None => self.go(ProgramState::InitialCheck),
            },
            ProgramState::ListeningNmea => {
                io.pins.set_key_line(Hc05Mode::Communication.key_level());
                io.serial.send_line(Command::Reset.encode().as_str());
                self.status.mode = Hc05Mode::Communication;
                // Only a link seen up in communication mode can drop.
                self.status.link = LinkState::Disconnected;
                self.status.previous_link = LinkState::Disconnected;
                // The reset drops the link; it has to come back in time.
                self.phase = Phase::AwaitingLink {
                    deadline_ms: now_ms + LINK_TIMEOUT_MS,
                };
            }
        }
    }

    fn send(&mut self, io: &mut Io<'_>, now_ms: u64, command: Command) {
        drain(io);
        let text = command.encode();
        debug!("> {}", text.as_str());
        io.serial.send_line(text.as_str());
        self.phase = Phase::Awaiting {
            command,
            deadline_ms: now_ms + REPLY_TIMEOUT_MS,
        };
    }

    // Replies

    fn on_reply(&mut self, io: &mut Io<'_>, now_ms: u64, command: Command, reply: Reply) {
        match (command, reply) {
            (Command::Init, Reply::Error(e)) if e == Hc05Error::SPP_ALREADY_INITIALIZED => {
                self.on_ok(io, now_ms, command);
            }
            (Command::Inquire, Reply::Error(e)) if e == Hc05Error::INQUIRY_TIMEOUT => {
                self.finish_inquiry(io, now_ms);
            }
            (Command::CancelInquiry, Reply::Error(_) | Reply::Fail) => {
                self.finish_inquiry(io, now_ms);
            }
            (Command::RemoteName(_), Reply::Error(_) | Reply::Fail) => {
                self.next_name(io, now_ms);
            }
            (Command::RecentDevice, Reply::Error(_) | Reply::Fail) => {
                self.go(ProgramState::CountedRecentDevices);
            }
            (Command::Probe, Reply::Error(_) | Reply::Fail) => self.probe_failed(io, now_ms),
            (_, Reply::Error(e)) => {
                warn!("HC-05 error {}: {}", e.code, e.message());
                self.fail(now_ms, Error::Protocol(e));
            }
            (_, Reply::Fail) => self.fail(now_ms, Error::NotFound),
            (_, Reply::Ok) => self.on_ok(io, now_ms, command),
            (Command::CountPaired, Reply::PairedCount(count)) => self.paired_count = count,
            (Command::RecentDevice, reply) => {
                if let Some(addr) = reply.device_address() {
                    self.devices.push(DeviceRecord::new(addr));
                    if self.devices.len() >= usize::from(self.paired_count) {
                        self.go(ProgramState::CountedRecentDevices);
                    }
                }
            }
            (Command::Inquire | Command::CancelInquiry, Reply::Inquiry(result)) => {
                if !self.devices.push(DeviceRecord::new(result.address)) {
                    debug!("Device list full - {} dropped", result.address);
                }
            }
            (Command::RemoteName(_), Reply::RemoteName(name)) => {
                self.devices.set_name(self.naming_index, name);
            }
            (_, other) => debug!("Ignoring {:?}", other),
        }
    }

    fn on_ok(&mut self, io: &mut Io<'_>, now_ms: u64, command: Command) {
        match command {
            Command::Probe => {
                self.probes = 0;
                self.notice = None;
                let bound = prefs::is_bound(&*io.store);
                match prefs::authenticated_address(&*io.store).filter(|_| bound) {
                    Some(addr) => {
                        self.target = Some(addr);
                        self.go(ProgramState::SettingConnectionMode(ConnectMode::Bound));
                    }
                    None => self.go(ProgramState::DeviceCountQuery),
                }
            }
            Command::CountPaired => {
                if self.paired_count == 0 {
                    self.go(ProgramState::SettingConnectionMode(ConnectMode::Any));
                } else {
                    self.go(ProgramState::CountingRecentDevices);
                }
            }
            Command::RecentDevice => self.go(ProgramState::CountedRecentDevices),
            Command::SetConnectMode(ConnectMode::Bound) => {
                self.go(ProgramState::ConnectingToDevice)
            }
            Command::SetConnectMode(_) => self.go(ProgramState::InitiatingInquiry),
            Command::Init => self.send(io, now_ms, Command::SetRole(Role::Master)),
            Command::SetRole(_) => self.send(
                io,
                now_ms,
                Command::SetInquiryMode {
                    max_devices: MAX_DEVICES as u8,
                    duration: INQUIRY_DURATION_UNITS,
                },
            ),
            Command::SetInquiryMode { .. } => self.go(ProgramState::InquiringDevices),
            Command::Inquire | Command::CancelInquiry => self.finish_inquiry(io, now_ms),
            Command::RemoteName(_) => self.next_name(io, now_ms),
            Command::Bind(addr) => match self.state() {
                ProgramState::ConnectingRecentDevice => {
                    self.send(io, now_ms, Command::Link(addr))
                }
                _ => self.go(ProgramState::ConnectingToDevice),
            },
            Command::Link(_) => {
                self.phase = Phase::AwaitingLink {
                    deadline_ms: now_ms + LINK_TIMEOUT_MS,
                };
            }
            Command::Reset => self.phase = Phase::Idle,
        }
    }

    fn on_timeout(&mut self, io: &mut Io<'_>, now_ms: u64, command: Command) {
        match command {
            Command::Probe => self.probe_failed(io, now_ms),
            Command::Inquire => {
                warn!("Inquiry timed out");
                // Names are only requested once the module has stopped inquiring.
                self.send(io, now_ms, Command::CancelInquiry);
            }
            Command::CancelInquiry => self.finish_inquiry(io, now_ms),
            Command::RemoteName(_) => self.next_name(io, now_ms),
            Command::RecentDevice => self.go(ProgramState::CountedRecentDevices),
            _ => self.fail(now_ms, Error::Timeout),
        }
    }

    fn probe_failed(&mut self, io: &mut Io<'_>, now_ms: u64) {
        self.probes = self.probes.saturating_add(1);
        if self.probes >= MAX_PROBE_ATTEMPTS {
            if self.notice != Some(Error::HardwareAbsent) {
                error!("HC-05 not responding");
            }
            self.notice = Some(Error::HardwareAbsent);
            self.phase = Phase::Absent {
                retry_at_ms: now_ms + ABSENT_RETRY_MS,
            };
        } else {
            debug!("Probe {} unanswered", self.probes);
            self.send(io, now_ms, Command::Probe);
        }
    }

    fn finish_inquiry(&mut self, io: &mut Io<'_>, now_ms: u64) {
        info!("Inquiry found {} device(s)", self.devices.len());
        if self.devices.is_empty() {
            self.notice = Some(Error::NotFound);
            self.phase = Phase::Holding {
                until_ms: now_ms + ERROR_HOLD_MS,
                then: After::Goto(ProgramState::DeviceCountQuery),
            };
            return;
        }
        self.naming_index = 0;
        self.request_name(io, now_ms);
    }

    fn next_name(&mut self, io: &mut Io<'_>, now_ms: u64) {
        self.naming_index += 1;
        if self.naming_index < self.devices.len() {
            self.request_name(io, now_ms);
        } else {
            self.go(ProgramState::ConfrontingUser);
        }
    }

    fn request_name(&mut self, io: &mut Io<'_>, now_ms: u64) {
        match self.devices.get(self.naming_index) {
            Some(record) => {
                let addr = record.address;
                self.send(io, now_ms, Command::RemoteName(addr));
            }
            None => self.go(ProgramState::ConfrontingUser),
        }
    }

    fn linked(&mut self, io: &mut Io<'_>) {
        if let Some(addr) = self.target {
            // Persist before switching modes so a power loss keeps the peer.
            prefs::remember_pairing(&mut *io.store, &addr);
            info!("Linked to {}", addr);
        }
        self.go(ProgramState::ListeningNmea);
    }

    fn confront(&mut self, now_ms: u64, button: Button) {
        match button {
            Button::Navigate => {
                let entries = self.devices.len() + 1;
                self.devices
                    .set_cursor(cycle_next(self.devices.cursor(), entries));
            }
            Button::Menu => match self.devices.current() {
                Some(record) => {
                    self.target = Some(record.address);
                    self.go(ProgramState::SettingBindAddress);
                }
                None => {
                    info!("Rescan requested");
                    self.notice = Some(Error::UserAbort);
                    self.phase = Phase::Holding {
                        until_ms: now_ms + ERROR_HOLD_MS,
                        then: After::Goto(ProgramState::InitiatingInquiry),
                    };
                }
            },
            Button::Action => {}
        }
    }

    /// Show `error`, then retry or fall back depending on the state.
    fn fail(&mut self, now_ms: u64, error: Error) {
        let (retry, fallback) = recovery(self.state());
        let then = if retry && self.retries < MAX_COMMAND_RETRIES {
            self.retries += 1;
            After::Retry
        } else {
            debug!("{:?} gives up: {:?}", self.state(), fallback);
            After::Goto(fallback)
        };
        self.notice = Some(error);
        self.phase = Phase::Holding {
            until_ms: now_ms + ERROR_HOLD_MS,
            then,
        };
    }

    // Communication mode

    fn listen(&mut self, io: &mut Io<'_>, now_ms: u64, step: &mut Step) {
        let link = LinkState::from(io.pins.read_pin(Pin::Hc05State));
        if self.status.observe_link(link) {
            warn!("Link lost");
            step.transition = Some(self.restart());
            return;
        }
        if let Phase::AwaitingLink { deadline_ms } = self.phase {
            if link == LinkState::Connected {
                self.phase = Phase::Idle;
            } else if now_ms >= deadline_ms {
                warn!("Link not back after reset");
                step.transition = Some(self.restart());
                return;
            }
        }

        while let Some(line) = io.serial.try_read_line() {
            if !line.starts_with('$') {
                trace!("Dropped non-NMEA line");
                continue;
            }
            step.nmea_lines = step.nmea_lines.saturating_add(1);
            if let Some(fix) = io.gps.try_decode_timestamp(line.as_str()) {
                step.fix = Some(fix);
            }
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a failing state retries in place, and where it goes once it
/// gives up.
fn recovery(state: ProgramState) -> (bool, ProgramState) {
    use ProgramState::*;
    match state {
        DeviceCountQuery => (true, InitiatingInquiry),
        SettingConnectionMode(ConnectMode::Bound) => (true, DeviceCountQuery),
        SettingConnectionMode(_) => (true, InitiatingInquiry),
        InitiatingInquiry => (true, InitialCheck),
        CountingRecentDevices | CountedRecentDevices => (false, SearchAuthenticatedDevice),
        SearchAuthenticatedDevice | ConnectingRecentDevice | ConnectingToDevice => {
            (false, InitiatingInquiry)
        }
        InquiringDevices => (false, DeviceCountQuery),
        SettingBindAddress => (false, ConfrontingUser),
        InitialCheck | ConfrontingUser | ListeningNmea => (false, InitialCheck),
    }
}

/// Discard whatever the module sent that nobody waits for.
fn drain(io: &mut Io<'_>) {
    while let Some(_line) = io.serial.try_read_line() {
        trace!("Dropped stale line");
    }
}
