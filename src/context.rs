//! All mutable firmware state, owned in one place.
//!
//! Each field has a single writer: the program loop hands the context to
//! the step functions by reference, and the renderer only reads it.

use crate::clock::{ClockTime, Chronometer, WallClock};
use crate::connection::Connection;
use crate::menu::MenuState;
use crate::prefs::UserPreferences;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::ui::buttons::ButtonFilter;
use crate::ui::BaseView;

/// What the GPS stream has delivered so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpsStats {
    /// NMEA sentences received since boot.
    pub lines: u32,
    /// UTC time of the most recent decoded fix.
    pub last_fix: Option<ClockTime>,
}

impl GpsStats {
    pub fn record(&mut self, lines: u16, fix: Option<ClockTime>) {
        self.lines = self.lines.saturating_add(u32::from(lines));
        if fix.is_some() {
            self.last_fix = fix;
        }
    }
}

pub struct SystemContext {
    pub prefs: UserPreferences,
    pub clock: WallClock,
    pub chrono: Chronometer,
    pub menu: MenuState,
    pub connection: Connection,
    pub scheduler: Scheduler,
    pub buttons: ButtonFilter,
    pub view: BaseView,
    pub gps: GpsStats,
    /// Set by the sync timers; the next decoded fix is applied to the clock.
    pub sync_pending: bool,
    /// Display refresh timer, registered only while the stopwatch runs.
    pub chrono_timer: Option<TimerHandle>,
}

impl SystemContext {
    pub fn new(prefs: UserPreferences) -> Self {
        Self {
            prefs,
            clock: WallClock::new(),
            chrono: Chronometer::new(),
            menu: MenuState::new(),
            connection: Connection::new(),
            scheduler: Scheduler::new(),
            buttons: ButtonFilter::new(),
            view: BaseView::default(),
            gps: GpsStats::default(),
            sync_pending: false,
            chrono_timer: None,
        }
    }
}
