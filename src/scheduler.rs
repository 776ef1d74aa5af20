//! Cooperative timer facade.
//!
//! Timers are polled from the main loop with the current monotonic
//! millisecond count; nothing runs in interrupt context. Instead of
//! storing callbacks, each timer carries a [`TimerEvent`] that the caller
//! dispatches.

use heapless::Vec;

use crate::config::MAX_TIMERS;

/// What a timer means when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerEvent {
    /// Advance the local clock by one second.
    Tick,
    /// First GPS synchronisation after boot.
    FirstSync,
    /// Periodic GPS re-synchronisation.
    Resync,
    /// Stopwatch display refresh.
    Chrono,
}

/// Identifies a registered timer for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(u8);

/// Due time of a one-shot timer that already fired.
const EXPIRED: u64 = u64::MAX;

#[derive(Clone, Copy, Debug)]
struct Timer {
    handle: TimerHandle,
    event: TimerEvent,
    interval_ms: u64,
    due_ms: u64,
    repeating: bool,
}

/// Fixed-capacity timer list.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Vec<Timer, MAX_TIMERS>,
    next_handle: u8,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_handle: 0,
        }
    }

    /// Register a timer that first fires `interval_ms` after `now_ms`.
    /// Returns `None` when every slot is taken.
    pub fn schedule(
        &mut self,
        now_ms: u64,
        interval_ms: u64,
        repeating: bool,
        event: TimerEvent,
    ) -> Option<TimerHandle> {
        let handle = TimerHandle(self.next_handle);
        self.timers
            .push(Timer {
                handle,
                event,
                interval_ms,
                due_ms: now_ms + interval_ms,
                repeating,
            })
            .ok()?;
        self.next_handle = self.next_handle.wrapping_add(1);
        Some(handle)
    }

    /// Remove a timer. Returns `false` if it already fired (one-shot) or
    /// was never registered.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    /// Collect every timer due at `now_ms`, in registration order.
    ///
    /// A timer fires at most once per poll; a repeating timer that fell
    /// behind is re-armed one interval later so it catches up over the
    /// following polls without losing periods.
    pub fn poll(&mut self, now_ms: u64) -> Vec<TimerEvent, MAX_TIMERS> {
        let mut fired = Vec::new();
        for timer in self.timers.iter_mut() {
            if now_ms >= timer.due_ms {
                let _ = fired.push(timer.event);
                timer.due_ms = if timer.repeating {
                    timer.due_ms + timer.interval_ms.max(1)
                } else {
                    EXPIRED
                };
            }
        }
        self.timers.retain(|t| t.due_ms != EXPIRED);
        fired
    }
}
