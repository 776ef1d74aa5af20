//! Top-level program loop.
//!
//! [`Firmware::poll`] is called from the main loop with the monotonic
//! millisecond count. One poll:
//!
//! 1. samples the buttons,
//! 2. dispatches due timers (clock tick, GPS sync requests, stopwatch),
//! 3. routes button presses to the device selection (setup phases) or to
//!    the menu, base views and stopwatch (listening),
//! 4. advances the connection machine and applies any GPS fix,
//! 5. redraws the display.

use crate::clock::ChronoState;
use crate::config::{CHRONO_PERIOD_MS, FIRST_SYNC_DELAY_MS, TICK_PERIOD_MS};
use crate::connection::ProgramState;
use crate::context::SystemContext;
use crate::io::{Io, Persistence};
use crate::menu::{MenuAction, MenuState, Setting};
use crate::prefs::{self, UserPreferences};
use crate::scheduler::TimerEvent;
use crate::ui::{render, Button};

pub struct Firmware {
    ctx: SystemContext,
}

impl Firmware {
    /// Load preferences and register the periodic timers.
    pub fn new(store: &mut dyn Persistence, now_ms: u64) -> Self {
        let prefs = UserPreferences::load(store);
        let mut ctx = SystemContext::new(prefs);

        let _ = ctx
            .scheduler
            .schedule(now_ms, TICK_PERIOD_MS, true, TimerEvent::Tick);
        let _ = ctx
            .scheduler
            .schedule(now_ms, FIRST_SYNC_DELAY_MS, false, TimerEvent::FirstSync);
        let _ = ctx
            .scheduler
            .schedule(now_ms, prefs.sync_period_ms(), true, TimerEvent::Resync);

        info!("Firmware ready, resync every {} min", prefs.sync_frequency_min);
        Self { ctx }
    }

    pub fn context(&self) -> &SystemContext {
        &self.ctx
    }

    pub fn state(&self) -> ProgramState {
        self.ctx.connection.state()
    }

    pub fn poll(&mut self, io: &mut Io<'_>, now_ms: u64) {
        let presses = self.ctx.buttons.poll(&mut *io.pins, now_ms);

        for event in self.ctx.scheduler.poll(now_ms) {
            self.on_timer(event, now_ms);
        }

        let mut setup_button = None;
        for button in presses {
            if self.state().is_setup() {
                setup_button = setup_button.or(Some(button));
            } else {
                self.on_button(io, button, now_ms);
            }
        }

        let step = self.ctx.connection.poll(io, now_ms, setup_button);
        if let Some(state) = step.transition {
            if state.is_setup() {
                self.ctx.menu = MenuState::new();
            }
        }

        self.ctx.gps.record(step.nmea_lines, step.fix);
        if let Some(fix) = step.fix {
            if self.ctx.sync_pending {
                self.ctx.clock.sync_from_gps(fix, self.ctx.prefs.utc_offset_hours);
                self.ctx.sync_pending = false;
                info!("Clock synchronised from GPS");
            }
        }

        render::render(&self.ctx, &mut *io.display);
    }

    fn on_timer(&mut self, event: TimerEvent, now_ms: u64) {
        match event {
            TimerEvent::Tick => self.ctx.clock.tick(),
            TimerEvent::FirstSync | TimerEvent::Resync => {
                debug!("GPS sync requested");
                self.ctx.sync_pending = true;
            }
            TimerEvent::Chrono => self.ctx.chrono.update(now_ms),
        }
    }

    fn on_button(&mut self, io: &mut Io<'_>, button: Button, now_ms: u64) {
        let ctx = &mut self.ctx;
        match button {
            Button::Menu => {
                if let MenuAction::Committed(setting) =
                    ctx.menu.on_menu_button(&mut ctx.prefs, &mut *io.store)
                {
                    self.apply(io, setting);
                }
            }
            Button::Navigate => {
                if !ctx.menu.on_navigate_button() {
                    ctx.view = ctx.view.next();
                }
            }
            Button::Action => {
                let state = ctx.chrono.cycle(now_ms);
                match (state, ctx.chrono_timer) {
                    (ChronoState::Running, None) => {
                        ctx.chrono_timer =
                            ctx.scheduler
                                .schedule(now_ms, CHRONO_PERIOD_MS, true, TimerEvent::Chrono);
                    }
                    (ChronoState::Running, Some(_)) => {}
                    (_, Some(handle)) => {
                        ctx.scheduler.cancel(handle);
                        ctx.chrono_timer = None;
                    }
                    (_, None) => {}
                }
            }
        }
    }

    fn apply(&mut self, io: &mut Io<'_>, setting: Setting) {
        match setting {
            Setting::Repair => {
                info!("Re-pairing requested");
                prefs::unbind(&mut *io.store);
                self.ctx.connection.restart();
                self.ctx.menu = MenuState::new();
            }
            // Re-apply the offset on the next fix.
            Setting::UtcOffset(_) => self.ctx.sync_pending = true,
            Setting::Language(_) | Setting::DateView(_) => {}
        }
    }
}
