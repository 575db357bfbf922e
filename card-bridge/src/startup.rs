//! Startup LED animation
//!
//! Before the bridge goes live the card plays a 12-step pattern on its six
//! LEDs, one step every [`SAMPLES_PER_STEP`] samples (a quarter second at
//! 48 kHz, three seconds in total). Each step is a 6-bit mask, bit `n`
//! lighting LED `n`:
//!
//! ```text
//! LED 0 1      bit 0 1
//!     2 3          2 3
//!     4 5          4 5
//! ```

use crate::card::CardOutputs;

/// Number of steps in a pattern.
pub const STEP_COUNT: usize = 12;

/// Samples each step is shown for.
pub const SAMPLES_PER_STEP: u32 = 12_000;

/// Total length of the animation in samples.
pub const TOTAL_SAMPLES: u32 = STEP_COUNT as u32 * SAMPLES_PER_STEP;

/// A startup pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pattern {
    /// LED masks, shown in order.
    pub steps: [u8; STEP_COUNT],
    /// Short name.
    pub name: &'static str,
    /// What the pattern is meant to suggest.
    pub description: &'static str,
}

const TOP: u8 = 0b00_0011;
const MID: u8 = 0b00_1100;
const BOT: u8 = 0b11_0000;
const ALL: u8 = 0b11_1111;
const OFF: u8 = 0;

/// Two top-to-bottom cascades, then all LEDs lit while the bridge "locks".
pub const BRIDGE: Pattern = Pattern {
    steps: [
        TOP, MID, BOT, // cascade
        TOP, MID, BOT, // cascade
        ALL, ALL, ALL, ALL, // locked
        OFF, OFF,
    ],
    name: "Bridge",
    description: "USB bridge, data flowing through",
};

/// Result of one animation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// The animation is still playing.
    Playing,
    /// The animation finished on this sample and the LEDs were cleared.
    Complete,
}

/// Plays a [`Pattern`] one sample at a time.
#[derive(Debug, Clone)]
pub struct StartupAnimation {
    pattern: &'static Pattern,
    elapsed: u32,
}

impl StartupAnimation {
    /// An animation that has not started yet.
    pub const fn new(pattern: &'static Pattern) -> Self {
        Self {
            pattern,
            elapsed: 0,
        }
    }

    /// The pattern being played.
    pub fn pattern(&self) -> &'static Pattern {
        self.pattern
    }

    /// Whether the animation has finished.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.elapsed >= TOTAL_SAMPLES
    }

    /// Advance by one sample and draw the current step.
    ///
    /// Returns [`Step::Complete`] exactly once, on the last sample, after
    /// switching every LED off. Calling it again afterwards does nothing.
    #[inline]
    pub fn step(&mut self, outputs: &mut CardOutputs) -> Step {
        if self.is_complete() {
            return Step::Complete;
        }

        let index = (self.elapsed / SAMPLES_PER_STEP) as usize;
        let mask = self.pattern.steps[index];
        for led in 0..outputs.leds.len() {
            outputs.set_led(led, mask & (1 << led) != 0);
        }

        self.elapsed += 1;
        if self.is_complete() {
            outputs.clear_leds();
            Step::Complete
        } else {
            Step::Playing
        }
    }
}
