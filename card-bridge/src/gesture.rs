//! Boot gesture
//!
//! Holding the switch Down for two seconds reboots the card into the ROM's
//! USB mass-storage update mode. The left column of LEDs fills from the
//! bottom while the switch is held:
//!
//! | Held for (samples) | LED lit          |
//! |--------------------|------------------|
//! | > 0                | 4, bottom left   |
//! | > [`MIDDLE_AFTER`] | 2, middle left   |
//! | > [`TOP_AFTER`]    | 0, top left      |
//! | ≥ [`TRIGGER_AT`]   | reboot           |
//!
//! While the switch is held the monitor owns the LEDs; the startup animation
//! and the activity LEDs are suppressed.

use crate::card::{CardOutputs, Switch};

/// Samples after which the middle-left LED lights.
pub const MIDDLE_AFTER: u32 = 32_000;

/// Samples after which the top-left LED lights.
pub const TOP_AFTER: u32 = 64_000;

/// Samples after which the gesture triggers (two seconds at 48 kHz).
pub const TRIGGER_AT: u32 = 96_000;

const BOTTOM_LEFT: usize = 4;
const MIDDLE_LEFT: usize = 2;
const TOP_LEFT: usize = 0;

/// State of the gesture after one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    /// The switch is not held down.
    Idle,
    /// The switch was just released before the trigger; the progress LEDs were
    /// cleared.
    Released,
    /// The switch is held down; progress is on the LEDs.
    Holding,
    /// The switch has been held long enough: stop and reboot.
    Triggered,
}

/// Counts how long the switch has been held Down.
#[derive(Debug, Clone, Default)]
pub struct BootGesture {
    hold: u32,
}

impl BootGesture {
    /// A monitor with the switch released.
    pub const fn new() -> Self {
        Self { hold: 0 }
    }

    /// Samples the switch has been held Down for.
    pub fn hold(&self) -> u32 {
        self.hold
    }

    /// Whether the switch is currently held Down.
    pub fn is_held(&self) -> bool {
        self.hold > 0
    }

    /// Account for one sample with the switch in `switch`.
    #[inline]
    pub fn update(&mut self, switch: Switch, outputs: &mut CardOutputs) -> Gesture {
        if switch != Switch::Down {
            let was_held = self.is_held();
            self.hold = 0;
            if was_held {
                outputs.clear_leds();
                return Gesture::Released;
            }
            return Gesture::Idle;
        }

        self.hold = self.hold.saturating_add(1);
        outputs.clear_leds();
        outputs.set_led(BOTTOM_LEFT, true);
        outputs.set_led(MIDDLE_LEFT, self.hold > MIDDLE_AFTER);
        outputs.set_led(TOP_LEFT, self.hold > TOP_AFTER);

        if self.hold >= TRIGGER_AT {
            Gesture::Triggered
        } else {
            Gesture::Holding
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{LED_OFF, LED_ON};

    fn hold_for(gesture: &mut BootGesture, out: &mut CardOutputs, samples: u32) -> Gesture {
        let mut last = Gesture::Idle;
        for _ in 0..samples {
            last = gesture.update(Switch::Down, out);
        }
        last
    }

    #[test]
    fn progress_then_trigger() {
        let mut g = BootGesture::new();
        let mut out = CardOutputs::default();

        assert_eq!(hold_for(&mut g, &mut out, 1), Gesture::Holding);
        assert_eq!(out.leds, [LED_OFF, LED_OFF, LED_OFF, LED_OFF, LED_ON, LED_OFF]);

        hold_for(&mut g, &mut out, MIDDLE_AFTER);
        assert_eq!(out.leds[MIDDLE_LEFT], LED_ON);
        assert_eq!(out.leds[TOP_LEFT], LED_OFF);

        hold_for(&mut g, &mut out, TOP_AFTER - MIDDLE_AFTER);
        assert_eq!(out.leds[TOP_LEFT], LED_ON);

        assert_eq!(
            hold_for(&mut g, &mut out, TRIGGER_AT - TOP_AFTER - 2),
            Gesture::Holding
        );
        assert_eq!(g.hold(), TRIGGER_AT - 1);
        assert_eq!(g.update(Switch::Down, &mut out), Gesture::Triggered);
    }

    #[test]
    fn release_resets_and_clears() {
        let mut g = BootGesture::new();
        let mut out = CardOutputs::default();
        hold_for(&mut g, &mut out, TRIGGER_AT - 1);
        assert_eq!(g.update(Switch::Middle, &mut out), Gesture::Released);
        assert_eq!(g.hold(), 0);
        assert_eq!(out.leds, [LED_OFF; 6]);
        assert_eq!(g.update(Switch::Up, &mut out), Gesture::Idle);
        assert_eq!(hold_for(&mut g, &mut out, 1), Gesture::Holding);
        assert_eq!(g.hold(), 1);
    }
}
