//! User interface: button filtering, base views and screen rendering.
//!
//! ## Components
//!
//! - **Buttons**: three active-low switches (MENU, NAVIGATE, ACTION),
//!   debounced by press interval in [`buttons`]
//! - **Render**: turns the system state into display rows in [`render`]
//! - **Display**: SSD1306 128x64 OLED text grid (embedded only)

pub mod buttons;
#[cfg(feature = "embedded")]
pub mod display;
pub mod input_logic;
pub mod render;

/// Physical button events (after debouncing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    /// Opens the menu, descends, commits. Selects a device during setup.
    Menu,
    /// Next menu entry, next device, or next base view.
    Navigate,
    /// Chronometer start / stop / reset.
    Action,
}

/// Screen shown while the link is up and the menu is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaseView {
    #[default]
    Clock,
    Chronometer,
    GpsData,
}

impl BaseView {
    const ALL: [BaseView; 3] = [BaseView::Clock, BaseView::Chronometer, BaseView::GpsData];

    /// The view after this one, wrapping.
    pub fn next(self) -> Self {
        Self::ALL[input_logic::cycle_next(self as usize, Self::ALL.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_views_cycle() {
        assert_eq!(BaseView::Clock.next(), BaseView::Chronometer);
        assert_eq!(BaseView::Chronometer.next(), BaseView::GpsData);
        assert_eq!(BaseView::GpsData.next(), BaseView::Clock);
    }
}
