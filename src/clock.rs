//! Local wall clock and stopwatch.
//!
//! The wall clock is ticked once per second by the scheduler and
//! overwritten wholesale whenever a GPS timestamp is applied. Calendar
//! arithmetic (month lengths, leap years, UTC offsets crossing midnight)
//! is delegated to `chrono`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Calendar date and time of day, always a valid instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl ClockTime {
    /// Midnight, 1 January 2000 - the value shown before the first fix.
    pub const EPOCH: ClockTime = ClockTime {
        year: 2000,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Build a timestamp, rejecting impossible dates and times.
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))?.and_hms_opt(
            u32::from(hour),
            u32::from(minute),
            u32::from(second),
        )?;
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    /// Day of week, Monday = 0.
    pub fn weekday(&self) -> u8 {
        self.to_naive()
            .map(|dt| dt.weekday().num_days_from_monday() as u8)
            .unwrap_or(0)
    }

    /// Advance by one second, rolling over minute, hour, day, month and year.
    pub fn tick(&mut self) {
        if let Some(next) = self.shifted(Duration::seconds(1)) {
            *self = next;
        }
    }

    /// This instant moved by a whole number of hours (UTC -> local).
    pub fn with_offset_hours(&self, hours: i8) -> Self {
        self.shifted(Duration::hours(i64::from(hours)))
            .unwrap_or(*self)
    }

    fn shifted(&self, delta: Duration) -> Option<Self> {
        let next = self.to_naive()?.checked_add_signed(delta)?;
        Self::from_naive(&next)
    }

    fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }

    fn from_naive(dt: &NaiveDateTime) -> Option<Self> {
        Some(Self {
            year: u16::try_from(dt.year()).ok()?,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        })
    }
}

impl Default for ClockTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

/// Local wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock {
    now: ClockTime,
    synced: bool,
}

impl WallClock {
    pub const fn new() -> Self {
        Self {
            now: ClockTime::EPOCH,
            synced: false,
        }
    }

    pub fn now(&self) -> ClockTime {
        self.now
    }

    /// Whether a GPS timestamp has been applied since boot.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn tick(&mut self) {
        self.now.tick();
    }

    /// Replace the local time with a GPS (UTC) timestamp shifted by the
    /// user's offset.
    pub fn sync_from_gps(&mut self, utc: ClockTime, offset_hours: i8) {
        self.now = utc.with_offset_hours(offset_hours);
        self.synced = true;
    }
}

/// Stopwatch lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChronoState {
    Init,
    Running,
    Stopped,
}

/// Stopwatch measured against the monotonic millisecond counter.
#[derive(Clone, Copy, Debug)]
pub struct Chronometer {
    state: ChronoState,
    started_at_ms: u64,
    banked_ms: u64,
    elapsed_ms: u64,
}

impl Chronometer {
    pub const fn new() -> Self {
        Self {
            state: ChronoState::Init,
            started_at_ms: 0,
            banked_ms: 0,
            elapsed_ms: 0,
        }
    }

    pub fn state(&self) -> ChronoState {
        self.state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Start from zero, or resume after a stop.
    pub fn start(&mut self, now_ms: u64) {
        if self.state != ChronoState::Running {
            self.started_at_ms = now_ms;
            self.state = ChronoState::Running;
        }
    }

    pub fn stop(&mut self, now_ms: u64) {
        if self.state == ChronoState::Running {
            self.update(now_ms);
            self.banked_ms = self.elapsed_ms;
            self.state = ChronoState::Stopped;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Refresh the elapsed time while running.
    pub fn update(&mut self, now_ms: u64) {
        if self.state == ChronoState::Running {
            self.elapsed_ms = self.banked_ms + now_ms.saturating_sub(self.started_at_ms);
        }
    }

    /// Single-button control: start, then stop, then reset.
    pub fn cycle(&mut self, now_ms: u64) -> ChronoState {
        match self.state {
            ChronoState::Init => self.start(now_ms),
            ChronoState::Running => self.stop(now_ms),
            ChronoState::Stopped => self.reset(),
        }
        self.state
    }
}

impl Default for Chronometer {
    fn default() -> Self {
        Self::new()
    }
}
