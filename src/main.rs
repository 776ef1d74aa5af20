//! smartclock firmware entry point.
//!
//! Brings up the SoftDevice (for its flash API), the HC-05 UART, the
//! OLED and the GPIOs, then runs the firmware poll loop at a fixed
//! period. Received UART lines arrive through a separate reader task.

#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::{TWISPI0, UARTE0};
use embassy_nrf::uarte::{self, Uarte, UarteRx};
use embassy_nrf::{bind_interrupts, twim};
use embassy_time::{Duration, Instant, Ticker};
use nrf_softdevice::{Flash, Softdevice};

use smartclock::board::{self, BoardPins, UartLink};
use smartclock::cells::CellStore;
use smartclock::config::{HC05_BAUD, POLL_PERIOD_MS};
use smartclock::gps::NmeaTimestampDecoder;
use smartclock::io::Io;
use smartclock::storage;
use smartclock::ui::display::TextGrid;
use smartclock::Firmware;

use {defmt_rtt as _, nrf_softdevice_s140 as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<UARTE0>;
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<TWISPI0>;
});

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn uart_reader_task(rx: UarteRx<'static, UARTE0>) -> ! {
    board::uart_reader(rx).await
}

fn baudrate(baud: u32) -> uarte::Baudrate {
    match baud {
        9_600 => uarte::Baudrate::BAUD9600,
        19_200 => uarte::Baudrate::BAUD19200,
        57_600 => uarte::Baudrate::BAUD57600,
        115_200 => uarte::Baudrate::BAUD115200,
        _ => uarte::Baudrate::BAUD38400,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("smartclock starting");

    // Peripheral interrupts must stay below the SoftDevice's reserved levels.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::UARTE0_UART0.set_priority(Priority::P3);
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);

    let sd = Softdevice::enable(&nrf_softdevice::Config::default());
    unwrap!(spawner.spawn(softdevice_task(sd)));

    // Preferences
    let mut flash = Flash::take(sd);
    let mut store = CellStore::new();
    if storage::load(&mut flash, &mut store).await.is_err() {
        warn!("Starting with erased preferences");
    }

    // HC-05 link
    let mut uart_config = uarte::Config::default();
    uart_config.baudrate = baudrate(HC05_BAUD);
    let uart = Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart_config);
    let (tx, rx) = uart.split();
    unwrap!(spawner.spawn(uart_reader_task(rx)));
    let mut serial = UartLink::new(tx);

    // Display
    let i2c = twim::Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    let mut display = TextGrid::new(i2c);

    let mut pins = BoardPins {
        menu: Input::new(p.P0_11, Pull::Up),
        navigate: Input::new(p.P0_12, Pull::Up),
        action: Input::new(p.P0_24, Pull::Up),
        state: Input::new(p.P0_04, Pull::None),
        key: Output::new(p.P0_03, Level::Low, OutputDrive::Standard),
    };
    let mut gps = NmeaTimestampDecoder::new();

    let mut firmware = Firmware::new(&mut store, Instant::now().as_millis());
    let mut ticker = Ticker::every(Duration::from_millis(POLL_PERIOD_MS));

    loop {
        {
            let mut io = Io {
                pins: &mut pins,
                serial: &mut serial,
                display: &mut display,
                store: &mut store,
                gps: &mut gps,
            };
            firmware.poll(&mut io, Instant::now().as_millis());
        }
        display.flush();

        if store.is_dirty() && storage::save(&mut flash, &mut store).await.is_err() {
            warn!("Preferences not saved - will retry");
        }

        ticker.next().await;
    }
}
