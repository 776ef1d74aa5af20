//! Screen composition.
//!
//! Everything that ends up on the display is formatted here into fixed
//! rows of `LCD_COLS` characters. The whole grid is rewritten on every
//! poll; the display shim only flushes rows that actually changed.
//!
//! Layout (6 rows):
//!
//! | row | setup               | clock          | menu          |
//! |-----|---------------------|----------------|---------------|
//! | 0   | phase title         | weekday + date | menu title    |
//! | 1-5 | devices / target    | time, offset   | entries       |
//! | 3-5 | error (wrapped)     | sync status    |               |

use core::fmt::Write;

use heapless::{String, Vec};

use super::BaseView;
use crate::clock::{ChronoState, ClockTime};
use crate::config::{FIRMWARE_VERSION, LCD_COLS, LCD_ROWS};
use crate::connection::ProgramState;
use crate::context::SystemContext;
use crate::io::{write_row, Display};
use crate::locale::{self, label, Label, Locale};
use crate::menu::{value_at, MenuItem, MenuState, Setting};
use crate::prefs::DateView;

/// One display row.
pub type Row = String<{ LCD_COLS as usize }>;

/// Rows available for lists below the title.
const LIST_ROWS: usize = LCD_ROWS as usize - 1;

/// First row used for error messages.
const NOTICE_ROW: usize = 3;

/// A full screen.
pub type Screen = [Row; LCD_ROWS as usize];

fn row(text: &str) -> Row {
    let mut r = Row::new();
    push_clipped(&mut r, text);
    r
}

/// Append as much of `text` as still fits on the row.
fn push_clipped(r: &mut Row, text: &str) {
    for c in text.chars() {
        if r.push(c).is_err() {
            break;
        }
    }
}

/// Draw the current screen.
pub fn render(ctx: &SystemContext, display: &mut dyn Display) {
    let screen = compose(ctx);
    for (i, line) in screen.iter().enumerate() {
        write_row(display, i as u8, line.as_str());
    }
}

/// Build the current screen without drawing it.
pub fn compose(ctx: &SystemContext) -> Screen {
    let mut screen: Screen = Default::default();
    let locale = ctx.prefs.locale;

    if ctx.connection.state().is_setup() {
        compose_setup(ctx, locale, &mut screen);
    } else if ctx.menu.is_active() {
        compose_menu(&ctx.menu, ctx, locale, &mut screen);
    } else {
        match ctx.view {
            BaseView::Clock => compose_clock(ctx, locale, &mut screen),
            BaseView::Chronometer => {
                screen[0] = row(label(locale, Label::Chronometer));
                screen[2] = format_elapsed(ctx.chrono.elapsed_ms());
                if ctx.chrono.state() == ChronoState::Running {
                    screen[4] = row(">");
                }
            }
            BaseView::GpsData => {
                screen[0] = row(label(locale, Label::GpsData));
                let _ = write!(screen[2], "{}: {}", label(locale, Label::NmeaLines), ctx.gps.lines);
                screen[3] = match ctx.gps.last_fix {
                    Some(fix) => {
                        let mut r = format_time(&fix);
                        push_clipped(&mut r, " UTC");
                        r
                    }
                    None => row(label(locale, Label::NoFix)),
                };
            }
        }
    }

    if let Some(error) = ctx.connection.notice() {
        for (i, line) in wrap(error.message()).into_iter().enumerate() {
            if let Some(slot) = screen.get_mut(NOTICE_ROW + i) {
                *slot = line;
            }
        }
    }
    screen
}

fn compose_setup(ctx: &SystemContext, locale: Locale, screen: &mut Screen) {
    let conn = &ctx.connection;
    let title = match conn.state() {
        ProgramState::InquiringDevices => Label::Searching,
        ProgramState::ConfrontingUser => Label::Select,
        ProgramState::ConnectingRecentDevice
        | ProgramState::SettingBindAddress
        | ProgramState::ConnectingToDevice => Label::Connecting,
        _ => Label::Waiting,
    };
    screen[0] = row(label(locale, title));

    match conn.state() {
        ProgramState::ConfrontingUser => {
            let devices = conn.devices();
            let entries = devices.len() + 1;
            let cursor = devices.cursor();
            let first = (cursor + 1).saturating_sub(LIST_ROWS);
            for (slot, index) in (first..entries.min(first + LIST_ROWS)).enumerate() {
                let marker = if index == cursor { '>' } else { ' ' };
                let mut r = Row::new();
                let _ = r.push(marker);
                match devices.get(index) {
                    Some(record) => match &record.name {
                        Some(name) if !name.is_empty() => push_clipped(&mut r, name.as_str()),
                        _ => {
                            let _ = write!(r, "{}", record.address);
                        }
                    },
                    None => push_clipped(&mut r, label(locale, Label::Rescan)),
                }
                screen[1 + slot] = r;
            }
        }
        _ => {
            if let Some(target) = conn.target() {
                let _ = write!(screen[1], "{}", target);
            }
        }
    }
}

fn compose_menu(menu: &MenuState, ctx: &SystemContext, locale: Locale, screen: &mut Screen) {
    screen[0] = match menu.level() {
        0 => row(label(locale, Label::Menu)),
        _ => row(label(locale, menu.parent().label())),
    };

    let first = (menu.item() + 1).saturating_sub(LIST_ROWS);
    let last = menu.item_count().min(first + LIST_ROWS);
    for (slot, index) in (first..last).enumerate() {
        let mut r = Row::new();
        let _ = r.push(if index == menu.item() { '>' } else { ' ' });
        if menu.level() == 0 {
            if let Some(item) = MenuItem::ALL.get(index) {
                push_clipped(&mut r, label(locale, item.label()));
                if *item == MenuItem::Version {
                    let _ = write!(r, " {:.1}", FIRMWARE_VERSION);
                }
            }
        } else if let Some(setting) = value_at(menu.parent(), index) {
            push_clipped(&mut r, setting_text(setting).as_str());
            if is_current(setting, ctx) {
                push_clipped(&mut r, " *");
            }
        }
        screen[1 + slot] = r;
    }
}

fn setting_text(setting: Setting) -> Row {
    match setting {
        Setting::UtcOffset(hours) => format_offset(hours),
        Setting::Language(locale) => row(locale.native_name()),
        Setting::DateView(view) => row(view.pattern()),
        Setting::Repair => Row::new(),
    }
}

fn is_current(setting: Setting, ctx: &SystemContext) -> bool {
    match setting {
        Setting::UtcOffset(hours) => hours == ctx.prefs.utc_offset_hours,
        Setting::Language(locale) => locale == ctx.prefs.locale,
        Setting::DateView(view) => view == ctx.prefs.date_view,
        Setting::Repair => false,
    }
}

fn compose_clock(ctx: &SystemContext, locale: Locale, screen: &mut Screen) {
    let now = ctx.clock.now();
    screen[0] = format_date(&now, ctx.prefs.date_view, locale);
    screen[2] = format_time(&now);
    screen[4] = format_offset(ctx.prefs.utc_offset_hours);
    if !ctx.clock.is_synced() {
        screen[5] = row(label(locale, Label::NoFix));
    }
}

/// `Sat 01/06/2024`, laid out per `view`.
pub fn format_date(t: &ClockTime, view: DateView, locale: Locale) -> Row {
    let mut r = row(locale::weekday(locale, t.weekday()));
    let _ = r.push(' ');
    let _ = match view {
        DateView::DayMonthYear => write!(r, "{:02}/{:02}/{:04}", t.day(), t.month(), t.year()),
        DateView::MonthDayYear => write!(r, "{:02}/{:02}/{:04}", t.month(), t.day(), t.year()),
        DateView::YearMonthDay => write!(r, "{:04}-{:02}-{:02}", t.year(), t.month(), t.day()),
    };
    r
}

/// `HH:MM:SS`
pub fn format_time(t: &ClockTime) -> Row {
    let mut r = Row::new();
    let _ = write!(r, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    r
}

/// `MM:SS.cc`, with an hour field once past one hour.
pub fn format_elapsed(ms: u64) -> Row {
    let centis = (ms / 10) % 100;
    let secs = (ms / 1_000) % 60;
    let mins = (ms / 60_000) % 60;
    let hours = ms / 3_600_000;
    let mut r = Row::new();
    let _ = if hours > 0 {
        write!(r, "{}:{:02}:{:02}.{:02}", hours, mins, secs, centis)
    } else {
        write!(r, "{:02}:{:02}.{:02}", mins, secs, centis)
    };
    r
}

/// `UTC+2`, `UTC-5`, `UTC+0`
pub fn format_offset(hours: i8) -> Row {
    let mut r = Row::new();
    let _ = write!(r, "UTC{:+}", hours);
    r
}

/// Greedy word wrap over the rows below [`NOTICE_ROW`]. Words longer than
/// a row are split.
pub fn wrap(text: &str) -> Vec<Row, { LCD_ROWS as usize - NOTICE_ROW }> {
    let mut rows: Vec<Row, { LCD_ROWS as usize - NOTICE_ROW }> = Vec::new();
    let mut current = Row::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if needed > LCD_COLS as usize && !current.is_empty() {
            if rows.push(core::mem::take(&mut current)).is_err() {
                return rows;
            }
        }
        if !current.is_empty() {
            let _ = current.push(' ');
        }
        for c in word.chars() {
            if current.push(c).is_err() {
                if rows.push(core::mem::take(&mut current)).is_err() {
                    return rows;
                }
                let _ = current.push(c);
            }
        }
    }
    if !current.is_empty() {
        let _ = rows.push(current);
    }
    rows
}
