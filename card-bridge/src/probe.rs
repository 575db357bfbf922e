//! Jack detection through the normalisation probe
//!
//! Every input jack is normalled to the probe pin: with no cable plugged in
//! the input reads whatever the probe drives. The driver toggles the probe
//! with a pseudo-random sequence and reports what each input saw; an input
//! that keeps following the sequence has nothing plugged in.
//!
//! ```
//! use card_bridge::{card::Jack, probe::{NormalisationProbe, PROBE_MATCH_THRESHOLD}};
//!
//! let mut probe = NormalisationProbe::new();
//! for _ in 0..PROBE_MATCH_THRESHOLD {
//!     let level = probe.advance();
//!     // an empty jack echoes the probe
//!     probe.observe(Jack::PulseIn1, level);
//! }
//! assert!(!probe.connections().is_connected(Jack::PulseIn1));
//! ```

use crate::card::{Connections, Jack};

/// Consecutive matching observations after which a jack counts as empty.
pub const PROBE_MATCH_THRESHOLD: u8 = 32;

/// Native analog readings above this count as the probe being high.
pub const PROBE_HIGH_THRESHOLD: i16 = 512;

const LFSR_SEED: u16 = 0xACE1;
const LFSR_TAPS: u16 = 0xB400;

/// Tracks which input jacks have a cable plugged in.
#[derive(Debug, Clone)]
pub struct NormalisationProbe {
    lfsr: u16,
    level: bool,
    matches: [u8; Jack::ALL.len()],
    connected: Connections,
}

impl NormalisationProbe {
    /// A probe that considers every jack connected until shown otherwise.
    pub const fn new() -> Self {
        Self {
            lfsr: LFSR_SEED,
            level: false,
            matches: [0; Jack::ALL.len()],
            connected: Connections::ALL,
        }
    }

    /// Step the sequence and return the level to drive on the probe pin.
    #[inline]
    pub fn advance(&mut self) -> bool {
        let lsb = self.lfsr & 1;
        self.lfsr >>= 1;
        if lsb != 0 {
            self.lfsr ^= LFSR_TAPS;
        }
        self.level = self.lfsr & 1 != 0;
        self.level
    }

    /// Record what `jack` read while the current level was driven.
    #[inline]
    pub fn observe(&mut self, jack: Jack, high: bool) {
        let count = &mut self.matches[jack as usize];
        if high == self.level {
            *count = count.saturating_add(1);
            if *count >= PROBE_MATCH_THRESHOLD {
                self.connected.set(jack, false);
            }
        } else {
            *count = 0;
            self.connected.set(jack, true);
        }
    }

    /// [`observe`](Self::observe) for an analog input in native units.
    #[inline]
    pub fn observe_analog(&mut self, jack: Jack, value: i16) {
        self.observe(jack, value > PROBE_HIGH_THRESHOLD);
    }

    /// Jacks currently believed to have a cable plugged in.
    #[inline]
    pub fn connections(&self) -> Connections {
        self.connected
    }
}

impl Default for NormalisationProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_not_constant() {
        let mut probe = NormalisationProbe::new();
        let highs = (0..64).filter(|_| probe.advance()).count();
        assert!(highs > 8 && highs < 56, "{highs}");
    }

    #[test]
    fn starts_connected() {
        assert_eq!(NormalisationProbe::new().connections(), Connections::ALL);
    }

    #[test]
    fn echo_marks_empty_then_cable_marks_connected() {
        let mut probe = NormalisationProbe::new();
        for n in 1..=PROBE_MATCH_THRESHOLD {
            let level = probe.advance();
            probe.observe_analog(Jack::CvIn2, if level { 2000 } else { 0 });
            assert_eq!(
                probe.connections().is_connected(Jack::CvIn2),
                n < PROBE_MATCH_THRESHOLD
            );
        }
        assert!(probe.connections().is_connected(Jack::CvIn1));

        let level = probe.advance();
        probe.observe(Jack::CvIn2, !level);
        assert!(probe.connections().is_connected(Jack::CvIn2));
    }

    #[test]
    fn jacks_are_tracked_independently() {
        let mut probe = NormalisationProbe::new();
        for _ in 0..PROBE_MATCH_THRESHOLD {
            let level = probe.advance();
            for jack in Jack::ALL {
                probe.observe(jack, if jack == Jack::AudioIn2 { level } else { !level });
            }
        }
        for jack in Jack::ALL {
            assert_eq!(probe.connections().is_connected(jack), jack != Jack::AudioIn2);
        }
    }

    #[test]
    fn steady_signal_stays_connected() {
        let mut probe = NormalisationProbe::new();
        for _ in 0..1000 {
            probe.advance();
            probe.observe(Jack::PulseIn2, true);
        }
        assert!(probe.connections().is_connected(Jack::PulseIn2));
    }
}
