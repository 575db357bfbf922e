//! Cross-core exchange through the shared I/O cell.
//!
//! Core 1 plays the sample tick: it publishes snapshots as fast as it can and
//! checks every set of targets it loads. Core 0 plays the host link. Every
//! 16-bit value written on either side has equal high and low bytes, so a
//! torn word shows up as a value whose bytes differ.

#![no_std]
#![no_main]
#![cfg(test)]

use defmt_rtt as _; // defmt transport
use defmt_test as _;
use panic_probe as _;
use rp2040_hal as hal;

use card_bridge::card::Switch;
use card_bridge::cell::{IoCell, Snapshot, Targets};
use portable_atomic::{AtomicU32, AtomicU8, Ordering};

/// The linker will place this boot block at the start of our program image. We
/// need this to help the ROM bootloader get our code up and running.
#[link_section = ".boot2"]
#[used]
pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

const XTAL_FREQ_HZ: u32 = 12_000_000u32;

const IDLE: u8 = 0;
const RUN: u8 = 1;
const STOP: u8 = 2;
const STOPPED: u8 = 3;

static IO: IoCell = IoCell::new();
static STATE: AtomicU8 = AtomicU8::new(IDLE);
static PUBLISHED: AtomicU32 = AtomicU32::new(0);
static TORN_TARGETS: AtomicU32 = AtomicU32::new(0);

mod init;

fn pattern(generation: u32) -> i16 {
    let b = generation as u8;
    i16::from_le_bytes([b, b])
}

fn is_pattern(value: i16) -> bool {
    let [lo, hi] = value.to_le_bytes();
    lo == hi
}

fn snapshot(generation: u32) -> Snapshot {
    let p = pattern(generation);
    Snapshot {
        cv: [p, p],
        audio: [p, p],
        knobs: [p as u16; 3],
        pulse: [generation & 1 != 0, generation & 2 != 0],
        switch: Switch::from_bits((generation % 3) as u8),
    }
}

/// One round of the sample side, linked into SRAM the way the firmware's
/// sample path is.
#[inline(never)]
#[link_section = ".data.ramfunc"]
fn exchange(generation: u32) {
    IO.publish_snapshot(&snapshot(generation));
    PUBLISHED.store(generation, Ordering::Relaxed);

    let t = IO.load_targets();
    if !t.audio.into_iter().chain(t.cv).all(is_pattern) {
        TORN_TARGETS.fetch_add(1, Ordering::Relaxed);
    }
}

fn core1_task() {
    let mut generation = 0u32;
    loop {
        match STATE.load(Ordering::Acquire) {
            RUN => {
                generation = generation.wrapping_add(1);
                exchange(generation);
            }
            STOP => STATE.store(STOPPED, Ordering::Release),
            _ => (),
        }
    }
}

/// Take the next snapshot, giving up after `spins` attempts.
fn take(spins: u32) -> Option<Snapshot> {
    (0..spins).find_map(|_| IO.try_take_snapshot())
}

#[defmt_test::tests]
mod tests {
    use super::*;
    use hal::multicore::{Multicore, Stack};
    use hal::pac;

    static CORE1_STACK: Stack<4096> = Stack::new();

    const ROUNDS: u32 = 10_000;

    #[init]
    fn setup() -> () {
        unsafe {
            crate::init::park_core1();
        }
        let mut pac = pac::Peripherals::take().unwrap();
        let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

        let _clocks = hal::clocks::init_clocks_and_plls(
            XTAL_FREQ_HZ,
            pac.XOSC,
            pac.CLOCKS,
            pac.PLL_SYS,
            pac.PLL_USB,
            &mut pac.RESETS,
            &mut watchdog,
        )
        .ok()
        .unwrap();

        let mut sio = hal::Sio::new(pac.SIO);
        let mut mc = Multicore::new(&mut pac.PSM, &mut pac.PPB, &mut sio.fifo);
        let cores = mc.cores();
        let core1 = &mut cores[1];
        core1
            .spawn(CORE1_STACK.take().unwrap(), move || super::core1_task())
            .unwrap();
    }

    #[test]
    fn ramfunc_section_lands_in_sram() {
        let address = super::exchange as *const () as usize;
        defmt::debug!("exchange at {=usize:#x}", address);
        assert!((0x2000_0000..0x2004_2000).contains(&address));
    }

    #[test]
    fn snapshots_and_targets_are_never_torn() {
        STATE.store(RUN, Ordering::Release);

        for round in 0..ROUNDS {
            let s = take(1_000_000).unwrap();
            assert!(s.cv.into_iter().chain(s.audio).all(is_pattern));
            assert!(s.knobs.iter().all(|&k| is_pattern(k as i16)));

            IO.store_targets(&Targets {
                pulse: [round & 1 != 0, false],
                audio: [pattern(round), pattern(round)],
                cv: [pattern(round), pattern(round)],
            });
        }

        assert_eq!(TORN_TARGETS.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn ready_latch_makes_progress() {
        STATE.store(RUN, Ordering::Release);

        let before = PUBLISHED.load(Ordering::Relaxed);
        let taken = (0..ROUNDS).filter(|_| take(1_000_000).is_some()).count() as u32;
        let after = PUBLISHED.load(Ordering::Relaxed);

        assert_eq!(taken, ROUNDS);
        // The first take may consume a snapshot published before `before`
        // was read, and `PUBLISHED` trails the latch by one store.
        assert!(after.wrapping_sub(before) + 2 >= ROUNDS);
    }

    #[test]
    fn latch_stays_clear_once_publishing_stops() {
        STATE.store(STOP, Ordering::Release);
        while STATE.load(Ordering::Acquire) != STOPPED {}

        // At most one snapshot can still be pending.
        let _ = IO.try_take_snapshot();
        assert!(!IO.is_snapshot_ready());
        assert!(IO.try_take_snapshot().is_none());
    }
}
