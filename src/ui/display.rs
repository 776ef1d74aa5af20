//! SSD1306 OLED driven as a 21x6 character grid.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use crate::config::{LCD_COLS, LCD_ROWS};

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral.
pub type Driver<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Pixel height of one text row.
const ROW_HEIGHT: i32 = 10;

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .background_color(BinaryColor::Off)
        .build()
}

/// Character cache in front of the panel. Writes land in the cache;
/// [`TextGrid::flush`] redraws the rows that changed.
pub struct TextGrid<I2C> {
    driver: Driver<I2C>,
    cells: [[u8; LCD_COLS as usize]; LCD_ROWS as usize],
    changed: [bool; LCD_ROWS as usize],
}

impl<I2C> TextGrid<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    /// Initialise the SSD1306 and clear the screen.
    pub fn new(i2c: I2C) -> Self {
        let interface = I2CDisplayInterface::new(i2c);
        let mut driver = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        if driver.init().is_err() {
            error!("SSD1306 init failed");
        }
        driver.clear_buffer();
        let _ = driver.flush();
        Self {
            driver,
            cells: [[b' '; LCD_COLS as usize]; LCD_ROWS as usize],
            changed: [false; LCD_ROWS as usize],
        }
    }

    /// Push changed rows to the panel.
    pub fn flush(&mut self) {
        if !self.changed.iter().any(|c| *c) {
            return;
        }
        for (row, cells) in self.cells.iter().enumerate() {
            if !core::mem::take(&mut self.changed[row]) {
                continue;
            }
            // Cells only ever hold ASCII.
            let text = core::str::from_utf8(cells).unwrap_or("");
            let origin = Point::new(0, row as i32 * ROW_HEIGHT);
            let _ = Text::with_baseline(text, origin, text_style(), Baseline::Top)
                .draw(&mut self.driver);
        }
        if self.driver.flush().is_err() {
            warn!("SSD1306 flush failed");
        }
    }
}

impl<I2C> crate::io::Display for TextGrid<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn write_at(&mut self, row: u8, col: u8, text: &str) {
        let Some(cells) = self.cells.get_mut(usize::from(row)) else {
            return;
        };
        for (i, c) in text.chars().enumerate() {
            let Some(cell) = cells.get_mut(usize::from(col) + i) else {
                break;
            };
            let byte = if c.is_ascii() { c as u8 } else { b'?' };
            if *cell != byte {
                *cell = byte;
                self.changed[usize::from(row)] = true;
            }
        }
    }
}
