//! User preferences and pairing memory, read and written through the
//! persistence collaborator.
//!
//! Cell layout (one 32-bit value each, see `config::ADDR_*`):
//!
//! | addr | content                         |
//! |------|---------------------------------|
//! | 0    | firmware version marker (f32)   |
//! | 1    | UTC offset, hours               |
//! | 2    | locale index                    |
//! | 3    | date view index                 |
//! | 4    | resync frequency, minutes       |
//! | 5    | bound flag (1 = bound)          |
//! | 6-7  | last authenticated address      |

use crate::config::*;
use crate::hc05::BtAddress;
use crate::io::Persistence;
use crate::locale::Locale;

/// How the date line is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateView {
    /// `31/12/2024`
    #[default]
    DayMonthYear = 0,
    /// `12/31/2024`
    MonthDayYear = 1,
    /// `2024-12-31`
    YearMonthDay = 2,
}

impl DateView {
    pub const ALL: [DateView; 3] = [
        DateView::DayMonthYear,
        DateView::MonthDayYear,
        DateView::YearMonthDay,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// Pattern shown in the menu.
    pub fn pattern(self) -> &'static str {
        match self {
            DateView::DayMonthYear => "DD/MM/YYYY",
            DateView::MonthDayYear => "MM/DD/YYYY",
            DateView::YearMonthDay => "YYYY-MM-DD",
        }
    }
}

/// Settings the user can change from the menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UserPreferences {
    pub utc_offset_hours: i8,
    pub locale: Locale,
    pub date_view: DateView,
    pub sync_frequency_min: u16,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            locale: Locale::En,
            date_view: DateView::DayMonthYear,
            sync_frequency_min: DEFAULT_SYNC_FREQUENCY_MIN,
        }
    }
}

impl UserPreferences {
    /// Load preferences. A missing or outdated version marker resets the
    /// whole store to defaults first; out-of-range cells fall back to
    /// their default individually.
    pub fn load(store: &mut dyn Persistence) -> Self {
        if store.read_float(ADDR_VERSION) != FIRMWARE_VERSION {
            warn!("Preference store outdated - writing defaults");
            Self::default().save(store);
            forget_pairing(store);
            store.write_float(ADDR_VERSION, FIRMWARE_VERSION);
        }

        let defaults = Self::default();
        let utc_offset_hours = i8::try_from(store.read_int(ADDR_UTC_OFFSET))
            .ok()
            .filter(|h| (UTC_OFFSET_MIN..=UTC_OFFSET_MAX).contains(h))
            .unwrap_or(defaults.utc_offset_hours);
        let locale = Locale::from_index(store.read_int(ADDR_LANGUAGE)).unwrap_or(defaults.locale);
        let date_view =
            DateView::from_index(store.read_int(ADDR_DATE_VIEW)).unwrap_or(defaults.date_view);
        let sync_frequency_min = u16::try_from(store.read_int(ADDR_SYNC_FREQUENCY))
            .ok()
            .filter(|m| *m > 0)
            .unwrap_or(defaults.sync_frequency_min);

        let prefs = Self {
            utc_offset_hours,
            locale,
            date_view,
            sync_frequency_min,
        };
        info!("Preferences loaded: {:?}", prefs);
        prefs
    }

    pub fn save(&self, store: &mut dyn Persistence) {
        store.write_int(ADDR_UTC_OFFSET, i32::from(self.utc_offset_hours));
        store.write_int(ADDR_LANGUAGE, self.locale as i32);
        store.write_int(ADDR_DATE_VIEW, self.date_view as i32);
        store.write_int(ADDR_SYNC_FREQUENCY, i32::from(self.sync_frequency_min));
    }

    /// Resync period in milliseconds.
    pub fn sync_period_ms(&self) -> u64 {
        u64::from(self.sync_frequency_min) * 60_000
    }
}

// Pairing memory

/// Whether a peer was bound by a previous successful connection.
pub fn is_bound(store: &dyn Persistence) -> bool {
    store.read_int(ADDR_BOUND_FLAG) == 1 && authenticated_address(store).is_some()
}

/// Address of the last peer we connected to successfully.
pub fn authenticated_address(store: &dyn Persistence) -> Option<BtAddress> {
    BtAddress::from_cells(
        store.read_int(ADDR_AUTH_NAP),
        store.read_int(ADDR_AUTH_UAP_LAP),
    )
}

/// Persist `address` as authenticated and bound.
pub fn remember_pairing(store: &mut dyn Persistence, address: &BtAddress) {
    let (nap, uap_lap) = address.to_cells();
    store.write_int(ADDR_AUTH_NAP, nap);
    store.write_int(ADDR_AUTH_UAP_LAP, uap_lap);
    store.write_int(ADDR_BOUND_FLAG, 1);
}

/// Clear the bound flag. The address is kept for the recent-device search.
pub fn unbind(store: &mut dyn Persistence) {
    store.write_int(ADDR_BOUND_FLAG, 0);
}

/// Drop every trace of a previous pairing.
pub fn forget_pairing(store: &mut dyn Persistence) {
    store.write_int(ADDR_BOUND_FLAG, 0);
    store.write_int(ADDR_AUTH_NAP, -1);
    store.write_int(ADDR_AUTH_UAP_LAP, -1);
}
