//! Clean slate for runs started from a debugger.

use rp2040_hal as hal;

use hal::pac;

/// Cycle core 1 through the power-on state machine and free every hardware
/// spinlock, leaving both as a cold boot would. A debugger reload resets
/// neither.
///
/// # Safety
///
/// Must run on core 0 before anything is spawned on core 1.
pub unsafe fn park_core1() {
    let psm = unsafe { &*pac::PSM::PTR };
    force_proc1_off(psm, true);
    force_proc1_off(psm, false);
    unsafe { hal::sio::spinlock_reset() };
}

fn force_proc1_off(psm: &pac::psm::RegisterBlock, off: bool) {
    psm.frce_off().modify(|_, w| w.proc1().bit(off));
    while psm.frce_off().read().proc1().bit() != off {
        cortex_m::asm::nop();
    }
}
