//! # Workshop System Computer USB bridge
//!
//! Streams the card's outputs from, and its inputs to, a USB-serial host.
//!
//! Core 1 runs the sample tick from the 48 kHz sample-clock interrupt. Core 0
//! owns the USB stack and runs the host link. The two share nothing but the
//! static [`IoCell`].
//!
//! Hold the switch Down for two seconds to reboot into USB update mode.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::convert::Infallible;

use card_bridge::link::HostLink;
use card_bridge::startup;
use card_bridge::{
    card::{CardInputs, CardOutputs},
    Bridge, IoCell, Tick,
};
use critical_section::Mutex;
use defmt_rtt as _;
use panic_probe as _;
use portable_atomic::{AtomicBool, Ordering};
use rp2040_hal as hal;

use hal::multicore::{Multicore, Stack};
use hal::pac;
use hal::pac::interrupt;
use usb_device::bus::UsbBusAllocator;

mod board;
mod usb_port;

use board::{Board, Error};
use usb_port::UsbSerialPort;

/// The linker will place this boot block at the start of our program image. We
/// need this to help the ROM bootloader get our code up and running.
#[link_section = ".boot2"]
#[used]
pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

/// Program metadata for `picotool info`
#[link_section = ".bi_entries"]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 5] = [
    hal::binary_info::rp_program_name!(c"Workshop Computer USB bridge"),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(
        c"Bridges USB serial frames to the audio, CV and pulse jacks"
    ),
    hal::binary_info::rp_program_build_attribute!(),
    hal::binary_info::rp_pico_board!(c"workshop-computer"),
];

/// GPIO 11 is the top right LED; the ROM blinks it while in update mode.
const BOOTLOADER_ACTIVITY_PIN: u32 = 1 << 11;

static IO: IoCell = IoCell::new();

static CORE1_STACK: Stack<4096> = Stack::new();

/// Hands the sample engine from core 0, which builds it, to the sample
/// interrupt on core 1.
static SAMPLE_ENGINE: Mutex<RefCell<Option<Engine>>> = Mutex::new(RefCell::new(None));

/// Raised by the sample interrupt when the boot gesture completes.
static ENTER_BOOTLOADER: AtomicBool = AtomicBool::new(false);

/// Everything the sample interrupt owns.
struct Engine {
    board: Board,
    bridge: Bridge<'static>,
    inputs: CardInputs,
    outputs: CardOutputs,
}

impl Engine {
    #[inline(never)]
    #[link_section = ".data.ramfunc"]
    fn tick(&mut self) -> Tick {
        self.board.clear_sample_interrupt();
        self.board.sample(&mut self.inputs);
        let tick = self.bridge.tick(&self.inputs, &mut self.outputs);
        self.board.apply(&self.outputs);
        tick
    }
}

#[hal::entry]
fn main() -> ! {
    match start() {
        Ok(never) => match never {},
        Err(e) => defmt::panic!("startup failed: {}", e),
    }
}

fn start() -> Result<Infallible, Error> {
    let mut pac = defmt::unwrap!(pac::Peripherals::take());
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    let clocks = board::init_clocks(
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )?;

    let mut sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    // Everything that touches flash is built here, before core 1 runs.
    let board = Board::init(pins, pac.PWM, pac.SPI0, pac.ADC, &mut pac.RESETS, &clocks)?;
    let bridge = Bridge::new(&IO, &startup::BRIDGE);
    defmt::debug_assert!(board::runs_from_ram(Engine::tick as *const () as usize));
    defmt::info!(
        "startup pattern {=str}: {=str}",
        bridge.pattern().name,
        bridge.pattern().description
    );

    critical_section::with(|cs| {
        SAMPLE_ENGINE.borrow_ref_mut(cs).replace(Engine {
            board,
            bridge,
            inputs: CardInputs::default(),
            outputs: CardOutputs::default(),
        });
    });

    let mut mc = Multicore::new(&mut pac.PSM, &mut pac.PPB, &mut sio.fifo);
    let cores = mc.cores();
    let core1 = &mut cores[1];
    let stack = CORE1_STACK.take().ok_or(Error::Core1)?;
    core1
        .spawn(stack, move || core1_task())
        .map_err(|_| Error::Core1)?;

    let usb_bus = UsbBusAllocator::new(hal::usb::UsbBus::new(
        pac.USBCTRL_REGS,
        pac.USBCTRL_DPRAM,
        clocks.usb_clock,
        true,
        &mut pac.RESETS,
    ));
    let port = UsbSerialPort::new(&usb_bus, timer)?;

    HostLink::new(&IO, port).run()
}

fn core1_task() -> ! {
    // Only this core takes the sample interrupt.
    unsafe {
        pac::NVIC::unmask(pac::Interrupt::PWM_IRQ_WRAP);
    }

    loop {
        cortex_m::asm::wfi();
        if ENTER_BOOTLOADER.load(Ordering::Acquire) {
            defmt::warn!("boot gesture complete, entering USB update mode");
            hal::rom_data::reset_to_usb_boot(BOOTLOADER_ACTIVITY_PIN, 0);
        }
    }
}

// The sample path runs from SRAM so a cache miss on core 0 cannot stall it.
#[interrupt]
#[link_section = ".data.ramfunc"]
fn PWM_IRQ_WRAP() {
    // The `#[interrupt]` attribute covertly converts this to `&'static mut Option<Engine>`
    static mut ENGINE: Option<Engine> = None;

    if ENGINE.is_none() {
        critical_section::with(|cs| {
            *ENGINE = SAMPLE_ENGINE.borrow_ref_mut(cs).take();
        });
    }

    let Some(engine) = ENGINE else {
        return;
    };

    match engine.tick() {
        Tick::StartupComplete => defmt::info!("startup complete, bridge live"),
        Tick::EnterBootloader => {
            engine.board.stop_sample_clock();
            pac::NVIC::mask(pac::Interrupt::PWM_IRQ_WRAP);
            ENTER_BOOTLOADER.store(true, Ordering::Release);
        }
        Tick::Running | Tick::Startup | Tick::Holding => {}
    }
}

// End of file
