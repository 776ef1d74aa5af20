//! Two-level settings menu driven by the menu and navigate buttons.
//!
//! Level 0 lists the settings; level 1 lists the values of the chosen
//! setting. Every level-1 entry is a leaf: pressing the menu button on it
//! commits the value, persists it and closes the menu. `Initialize` and
//! `Version` are leaves already at level 0.

use crate::config::{UTC_OFFSET_MAX, UTC_OFFSET_MIN};
use crate::io::Persistence;
use crate::locale::{Label, Locale};
use crate::prefs::{DateView, UserPreferences};
use crate::ui::input_logic::cycle_next;

/// Top-level menu entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuItem {
    Initialize = 0,
    UtcOffset = 1,
    Language = 2,
    DateView = 3,
    Version = 4,
}

impl MenuItem {
    pub const ALL: [MenuItem; 5] = [
        MenuItem::Initialize,
        MenuItem::UtcOffset,
        MenuItem::Language,
        MenuItem::DateView,
        MenuItem::Version,
    ];

    pub fn label(self) -> Label {
        match self {
            MenuItem::Initialize => Label::Initialize,
            MenuItem::UtcOffset => Label::UtcOffset,
            MenuItem::Language => Label::Language,
            MenuItem::DateView => Label::DateView,
            MenuItem::Version => Label::Version,
        }
    }

    /// Number of level-1 values, 0 for leaves.
    fn value_count(self) -> usize {
        match self {
            MenuItem::UtcOffset => (UTC_OFFSET_MAX - UTC_OFFSET_MIN) as usize + 1,
            MenuItem::Language => Locale::ALL.len(),
            MenuItem::DateView => DateView::ALL.len(),
            MenuItem::Initialize | MenuItem::Version => 0,
        }
    }
}

/// A committed menu choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Setting {
    UtcOffset(i8),
    Language(Locale),
    DateView(DateView),
    /// Forget the bound peer and run the pairing cycle again.
    Repair,
}

/// Outcome of a menu-button press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuAction {
    Opened,
    Descended(MenuItem),
    Committed(Setting),
    Closed,
}

/// Menu cursor. `item` is always below `item_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MenuState {
    active: bool,
    level: u8,
    parent: MenuItem,
    item: usize,
    previous_item: usize,
    item_count: usize,
}

impl MenuState {
    pub const fn new() -> Self {
        Self {
            active: false,
            level: 0,
            parent: MenuItem::Initialize,
            item: 0,
            previous_item: 0,
            item_count: MenuItem::ALL.len(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn item(&self) -> usize {
        self.item
    }

    pub fn previous_item(&self) -> usize {
        self.previous_item
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Setting whose values are listed at level 1.
    pub fn parent(&self) -> MenuItem {
        self.parent
    }

    /// Top-level entry under the cursor (level 0 only).
    pub fn current_root_item(&self) -> Option<MenuItem> {
        (self.level == 0)
            .then(|| MenuItem::ALL.get(self.item).copied())
            .flatten()
    }

    /// Value under the cursor (level 1 only).
    pub fn current_value(&self) -> Option<Setting> {
        (self.level == 1)
            .then(|| value_at(self.parent, self.item))
            .flatten()
    }

    /// Menu button: open, descend, or commit the value under the cursor.
    pub fn on_menu_button(
        &mut self,
        prefs: &mut UserPreferences,
        store: &mut dyn Persistence,
    ) -> MenuAction {
        if !self.active {
            *self = Self::new();
            self.active = true;
            info!("Menu opened");
            return MenuAction::Opened;
        }

        if self.level == 0 {
            let item = MenuItem::ALL[self.item];
            return match item {
                MenuItem::Initialize => {
                    self.close();
                    MenuAction::Committed(Setting::Repair)
                }
                MenuItem::Version => {
                    self.close();
                    MenuAction::Closed
                }
                _ => {
                    self.level = 1;
                    self.parent = item;
                    self.item_count = item.value_count();
                    self.item = current_index(item, prefs).min(self.item_count - 1);
                    self.previous_item = self.item;
                    MenuAction::Descended(item)
                }
            };
        }

        let action = match value_at(self.parent, self.item) {
            Some(setting) => {
                apply(setting, prefs);
                prefs.save(store);
                info!("Menu committed {:?}", setting);
                MenuAction::Committed(setting)
            }
            None => MenuAction::Closed,
        };
        self.close();
        action
    }

    /// Navigate button: move to the next entry of the current level,
    /// wrapping to the first. Does nothing while the menu is closed.
    pub fn on_navigate_button(&mut self) -> bool {
        if !self.active || self.item_count == 0 {
            return false;
        }
        self.previous_item = self.item;
        self.item = cycle_next(self.item, self.item_count);
        true
    }

    fn close(&mut self) {
        *self = Self::new();
    }
}

impl Default for MenuState {
    fn default() -> Self {
        Self::new()
    }
}

/// Level-1 value `index` of `item`.
pub fn value_at(item: MenuItem, index: usize) -> Option<Setting> {
    match item {
        MenuItem::UtcOffset => {
            let offset = i8::try_from(index).ok()?.checked_add(UTC_OFFSET_MIN)?;
            (offset <= UTC_OFFSET_MAX).then_some(Setting::UtcOffset(offset))
        }
        MenuItem::Language => Locale::ALL.get(index).copied().map(Setting::Language),
        MenuItem::DateView => DateView::ALL.get(index).copied().map(Setting::DateView),
        MenuItem::Initialize | MenuItem::Version => None,
    }
}

fn current_index(item: MenuItem, prefs: &UserPreferences) -> usize {
    match item {
        MenuItem::UtcOffset => (prefs.utc_offset_hours - UTC_OFFSET_MIN) as usize,
        MenuItem::Language => prefs.locale as usize,
        MenuItem::DateView => prefs.date_view as usize,
        MenuItem::Initialize | MenuItem::Version => 0,
    }
}

fn apply(setting: Setting, prefs: &mut UserPreferences) {
    match setting {
        Setting::UtcOffset(hours) => prefs.utc_offset_hours = hours,
        Setting::Language(locale) => prefs.locale = locale,
        Setting::DateView(view) => prefs.date_view = view,
        Setting::Repair => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::CellStore;
    use crate::config::{ADDR_LANGUAGE, ADDR_UTC_OFFSET};

    fn fixture() -> (MenuState, UserPreferences, CellStore) {
        (MenuState::new(), UserPreferences::default(), CellStore::new())
    }

    #[test]
    fn navigate_while_inactive_is_a_no_op() {
        let (mut menu, _, _) = fixture();
        let before = menu;
        assert!(!menu.on_navigate_button());
        assert_eq!(menu, before);
    }

    #[test]
    fn menu_button_opens_at_level_zero_item_zero() {
        let (mut menu, mut prefs, mut store) = fixture();
        menu.on_navigate_button();
        assert_eq!(menu.on_menu_button(&mut prefs, &mut store), MenuAction::Opened);
        assert!(menu.is_active());
        assert_eq!(menu.level(), 0);
        assert_eq!(menu.item(), 0);
        assert_eq!(menu.item_count(), 5);
    }

    #[test]
    fn navigate_wraps_item_but_not_level() {
        let (mut menu, mut prefs, mut store) = fixture();
        menu.on_menu_button(&mut prefs, &mut store);
        for expected in [1, 2, 3, 4, 0, 1] {
            assert!(menu.on_navigate_button());
            assert_eq!(menu.item(), expected);
            assert_eq!(menu.level(), 0);
            assert!(menu.item() < menu.item_count());
        }
        assert_eq!(menu.previous_item(), 0);
    }

    #[test]
    fn committing_language_persists_and_closes() {
        let (mut menu, mut prefs, mut store) = fixture();
        menu.on_menu_button(&mut prefs, &mut store);
        menu.on_navigate_button(); // UTC offset
        menu.on_navigate_button(); // Language
        assert_eq!(
            menu.on_menu_button(&mut prefs, &mut store),
            MenuAction::Descended(MenuItem::Language)
        );
        assert_eq!(menu.level(), 1);
        assert_eq!(menu.item_count(), 5);
        assert_eq!(menu.item(), Locale::En as usize);

        menu.on_navigate_button();
        menu.on_navigate_button(); // Es
        assert_eq!(
            menu.on_menu_button(&mut prefs, &mut store),
            MenuAction::Committed(Setting::Language(Locale::Es))
        );
        assert!(!menu.is_active());
        assert_eq!(prefs.locale, Locale::Es);
        assert_eq!(store.read_int(ADDR_LANGUAGE), 2);
    }

    #[test]
    fn utc_offset_values_start_at_current_preference() {
        let (mut menu, mut prefs, mut store) = fixture();
        prefs.utc_offset_hours = 1;
        menu.on_menu_button(&mut prefs, &mut store);
        menu.on_navigate_button();
        menu.on_menu_button(&mut prefs, &mut store);
        assert_eq!(menu.item_count(), 27);
        assert_eq!(menu.current_value(), Some(Setting::UtcOffset(1)));

        menu.on_navigate_button();
        assert_eq!(
            menu.on_menu_button(&mut prefs, &mut store),
            MenuAction::Committed(Setting::UtcOffset(2))
        );
        assert_eq!(store.read_int(ADDR_UTC_OFFSET), 2);
    }

    #[test]
    fn utc_offset_range_bounds() {
        assert_eq!(value_at(MenuItem::UtcOffset, 0), Some(Setting::UtcOffset(-12)));
        assert_eq!(value_at(MenuItem::UtcOffset, 26), Some(Setting::UtcOffset(14)));
        assert_eq!(value_at(MenuItem::UtcOffset, 27), None);
    }

    #[test]
    fn initialize_and_version_are_root_leaves() {
        let (mut menu, mut prefs, mut store) = fixture();
        menu.on_menu_button(&mut prefs, &mut store);
        assert_eq!(menu.current_root_item(), Some(MenuItem::Initialize));
        assert_eq!(
            menu.on_menu_button(&mut prefs, &mut store),
            MenuAction::Committed(Setting::Repair)
        );
        assert!(!menu.is_active());

        menu.on_menu_button(&mut prefs, &mut store);
        for _ in 0..4 {
            menu.on_navigate_button();
        }
        assert_eq!(menu.current_root_item(), Some(MenuItem::Version));
        assert_eq!(menu.on_menu_button(&mut prefs, &mut store), MenuAction::Closed);
        assert!(!menu.is_active());
    }
}
