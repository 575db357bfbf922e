//! Shared I/O cell
//!
//! The only state shared between the two cores. Output targets flow from the
//! host link on core 0 to the sample tick on core 1; input snapshots flow the
//! other way. Each direction has exactly one writer and one reader, so every
//! field is a plain atomic word and nobody ever waits.
//!
//! Fields are stored and loaded individually with relaxed ordering. A reader
//! may therefore see a mix of old and new fields, but never half of a field.
//! The `ready` latch is stored with release ordering after the snapshot fields
//! and loaded with acquire ordering before they are read, so a snapshot taken
//! after observing `ready` is at least as new as the one that set it.
//!
//! ```
//! use card_bridge::{card::Switch, cell::{IoCell, Snapshot}};
//!
//! static IO: IoCell = IoCell::new();
//!
//! // core 1, at the decimation rate
//! IO.publish_snapshot(&Snapshot { switch: Switch::Up, ..Snapshot::default() });
//!
//! // core 0, every loop iteration
//! let snapshot = IO.try_take_snapshot().unwrap();
//! assert_eq!(snapshot.switch, Switch::Up);
//! assert!(IO.try_take_snapshot().is_none());
//! ```

use portable_atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU8, Ordering};

use crate::card::{CardInputs, Jack, Knob, Switch};

const PULSE_1: u8 = 0b01;
const PULSE_2: u8 = 0b10;
const SWITCH_SHIFT: u8 = 2;

/// Output targets written by the host link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Targets {
    /// Pulse outputs 1 and 2.
    pub pulse: [bool; 2],
    /// Audio outputs 1 and 2, as received (not clamped).
    pub audio: [i16; 2],
    /// CV outputs 1 and 2, as received (not clamped).
    pub cv: [i16; 2],
}

impl Targets {
    /// Build targets from a host flag byte and the four analog values.
    ///
    /// Only bits 0 and 1 of `flags` are meaningful.
    pub fn from_flags(flags: u8, audio: [i16; 2], cv: [i16; 2]) -> Self {
        Self {
            pulse: [flags & PULSE_1 != 0, flags & PULSE_2 != 0],
            audio,
            cv,
        }
    }

    /// The pulse outputs packed as a host flag byte.
    pub fn flags(&self) -> u8 {
        pulse_bits(self.pulse)
    }
}

/// Input values published by the sample tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    /// CV inputs 1 and 2.
    pub cv: [i16; 2],
    /// Audio inputs 1 and 2.
    pub audio: [i16; 2],
    /// Knobs Main, X and Y.
    pub knobs: [u16; 3],
    /// Pulse inputs 1 and 2.
    pub pulse: [bool; 2],
    /// Switch position.
    pub switch: Switch,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            cv: [0; 2],
            audio: [0; 2],
            knobs: [0; 3],
            pulse: [false; 2],
            switch: Switch::Middle,
        }
    }
}

impl Snapshot {
    /// Capture the inputs of one tick, zeroing every jack without a cable.
    #[inline]
    pub fn capture(inputs: &CardInputs) -> Self {
        let c = inputs.connected;
        let analog = |jack: Jack, value: i16| if c.is_connected(jack) { value } else { 0 };
        let digital = |jack: Jack, value: bool| value && c.is_connected(jack);
        Self {
            cv: [
                analog(Jack::CvIn1, inputs.cv[0]),
                analog(Jack::CvIn2, inputs.cv[1]),
            ],
            audio: [
                analog(Jack::AudioIn1, inputs.audio[0]),
                analog(Jack::AudioIn2, inputs.audio[1]),
            ],
            knobs: [
                inputs.knobs[Knob::Main as usize],
                inputs.knobs[Knob::X as usize],
                inputs.knobs[Knob::Y as usize],
            ],
            pulse: [
                digital(Jack::PulseIn1, inputs.pulse[0]),
                digital(Jack::PulseIn2, inputs.pulse[1]),
            ],
            switch: inputs.switch,
        }
    }

    /// Pulse inputs in bits 0-1 and the switch in bits 2-3.
    pub fn flags(&self) -> u8 {
        pulse_bits(self.pulse) | (self.switch as u8) << SWITCH_SHIFT
    }

    /// Inverse of [`Snapshot::flags`] for the non-numeric fields.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.pulse = [flags & PULSE_1 != 0, flags & PULSE_2 != 0];
        self.switch = Switch::from_bits(flags >> SWITCH_SHIFT);
        self
    }
}

fn pulse_bits(pulse: [bool; 2]) -> u8 {
    (if pulse[0] { PULSE_1 } else { 0 }) | (if pulse[1] { PULSE_2 } else { 0 })
}

/// Process-wide exchange between the host link and the sample tick.
///
/// Create one as a `static` before the second core starts; it is never
/// destroyed.
pub struct IoCell {
    target_flags: AtomicU8,
    target_audio: [AtomicI16; 2],
    target_cv: [AtomicI16; 2],

    input_flags: AtomicU8,
    input_cv: [AtomicI16; 2],
    input_audio: [AtomicI16; 2],
    input_knobs: [AtomicU16; 3],
    ready: AtomicBool,
}

impl IoCell {
    /// An empty cell: all targets zero, no snapshot ready.
    pub const fn new() -> Self {
        Self {
            target_flags: AtomicU8::new(0),
            target_audio: [AtomicI16::new(0), AtomicI16::new(0)],
            target_cv: [AtomicI16::new(0), AtomicI16::new(0)],
            input_flags: AtomicU8::new(0),
            input_cv: [AtomicI16::new(0), AtomicI16::new(0)],
            input_audio: [AtomicI16::new(0), AtomicI16::new(0)],
            input_knobs: [AtomicU16::new(0), AtomicU16::new(0), AtomicU16::new(0)],
            ready: AtomicBool::new(false),
        }
    }

    /// Replace every output target. Called by the host link only.
    ///
    /// The fields are stored one after the other; the sample tick may observe
    /// a combination of old and new values for one tick.
    #[inline]
    pub fn store_targets(&self, targets: &Targets) {
        self.target_flags.store(targets.flags(), Ordering::Relaxed);
        for (cell, value) in self.target_audio.iter().zip(targets.audio) {
            cell.store(value, Ordering::Relaxed);
        }
        for (cell, value) in self.target_cv.iter().zip(targets.cv) {
            cell.store(value, Ordering::Relaxed);
        }
    }

    /// Current output targets. Called by the sample tick only.
    #[inline]
    pub fn load_targets(&self) -> Targets {
        Targets::from_flags(
            self.target_flags.load(Ordering::Relaxed),
            [
                self.target_audio[0].load(Ordering::Relaxed),
                self.target_audio[1].load(Ordering::Relaxed),
            ],
            [
                self.target_cv[0].load(Ordering::Relaxed),
                self.target_cv[1].load(Ordering::Relaxed),
            ],
        )
    }

    /// Store a fresh snapshot and raise the `ready` latch. Called by the
    /// sample tick only.
    #[inline]
    pub fn publish_snapshot(&self, snapshot: &Snapshot) {
        for (cell, value) in self.input_cv.iter().zip(snapshot.cv) {
            cell.store(value, Ordering::Relaxed);
        }
        for (cell, value) in self.input_audio.iter().zip(snapshot.audio) {
            cell.store(value, Ordering::Relaxed);
        }
        for (cell, value) in self.input_knobs.iter().zip(snapshot.knobs) {
            cell.store(value, Ordering::Relaxed);
        }
        self.input_flags.store(snapshot.flags(), Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Whether a snapshot is waiting to be taken.
    #[inline]
    pub fn is_snapshot_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Take a copy of the latest snapshot if one was published since the last
    /// call, clearing the `ready` latch. Called by the host link only.
    ///
    /// The latch is cleared before the copy is made: a publish racing with
    /// the copy re-raises it, and its snapshot is delivered again next time.
    #[inline]
    pub fn try_take_snapshot(&self) -> Option<Snapshot> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        self.ready.store(false, Ordering::Relaxed);

        let snapshot = Snapshot {
            cv: [
                self.input_cv[0].load(Ordering::Relaxed),
                self.input_cv[1].load(Ordering::Relaxed),
            ],
            audio: [
                self.input_audio[0].load(Ordering::Relaxed),
                self.input_audio[1].load(Ordering::Relaxed),
            ],
            knobs: [
                self.input_knobs[0].load(Ordering::Relaxed),
                self.input_knobs[1].load(Ordering::Relaxed),
                self.input_knobs[2].load(Ordering::Relaxed),
            ],
            ..Snapshot::default()
        };
        Some(snapshot.with_flags(self.input_flags.load(Ordering::Relaxed)))
    }
}

impl Default for IoCell {
    fn default() -> Self {
        Self::new()
    }
}
