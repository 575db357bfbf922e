//! Card I/O data model
//!
//! Values use the card's native ranges: audio and CV are signed 12-bit
//! (`-2048..=2047`), knobs are unsigned 12-bit (`0..=4095`) and LED brightness
//! is `0..=4095`.
//!
//! The board driver fills a [`CardInputs`] before every sample tick and applies
//! the [`CardOutputs`] afterwards. The outputs persist across ticks, so a tick
//! that leaves a field alone leaves the peripheral at its last applied value.

/// Smallest native audio/CV sample.
pub const SAMPLE_MIN: i16 = -2048;

/// Largest native audio/CV sample.
pub const SAMPLE_MAX: i16 = 2047;

/// Largest knob reading.
pub const KNOB_MAX: u16 = 4095;

/// Full LED brightness.
pub const LED_ON: u16 = 4095;

/// LED off.
pub const LED_OFF: u16 = 0;

/// Number of LEDs on the card.
///
/// ```text
/// 0 1
/// 2 3
/// 4 5
/// ```
pub const LED_COUNT: usize = 6;

/// Position of the three-way switch.
///
/// The discriminant is the value reported in snapshot flag bits 2-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Switch {
    /// Momentary position, held against a spring.
    Down = 0,
    /// Centre position.
    Middle = 1,
    /// Latching upper position.
    Up = 2,
}

impl Switch {
    /// ADC readings below this are the Down position.
    pub const DOWN_BELOW: u16 = 1000;
    /// ADC readings above this are the Up position.
    pub const UP_ABOVE: u16 = 3000;

    /// Decode the switch from its 12-bit ADC reading on the analog mux.
    #[inline]
    pub fn from_adc(raw: u16) -> Self {
        match raw {
            r if r < Self::DOWN_BELOW => Switch::Down,
            r if r > Self::UP_ABOVE => Switch::Up,
            _ => Switch::Middle,
        }
    }

    /// Decode the two switch bits of a snapshot flag byte.
    ///
    /// The unused encoding `3` reads as [`Switch::Up`].
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Switch::Down,
            1 => Switch::Middle,
            _ => Switch::Up,
        }
    }
}

/// One of the three knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Knob {
    /// The large knob.
    Main = 0,
    /// Small knob X.
    X = 1,
    /// Small knob Y.
    Y = 2,
}

/// An input jack the normalisation probe can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Jack {
    /// Audio input 1.
    AudioIn1 = 0,
    /// Audio input 2.
    AudioIn2 = 1,
    /// CV input 1.
    CvIn1 = 2,
    /// CV input 2.
    CvIn2 = 3,
    /// Pulse input 1.
    PulseIn1 = 4,
    /// Pulse input 2.
    PulseIn2 = 5,
}

impl Jack {
    /// Every probe-able jack.
    pub const ALL: [Jack; 6] = [
        Jack::AudioIn1,
        Jack::AudioIn2,
        Jack::CvIn1,
        Jack::CvIn2,
        Jack::PulseIn1,
        Jack::PulseIn2,
    ];

    const fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// Set of jacks that have a cable plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Connections(u8);

impl Connections {
    /// Every jack connected.
    pub const ALL: Connections = Connections(0b11_1111);

    /// No jack connected.
    pub const NONE: Connections = Connections(0);

    /// Whether `jack` has a cable plugged in.
    pub const fn is_connected(self, jack: Jack) -> bool {
        self.0 & jack.mask() != 0
    }

    /// Mark `jack` as connected or not.
    #[inline]
    pub fn set(&mut self, jack: Jack, connected: bool) {
        if connected {
            self.0 |= jack.mask();
        } else {
            self.0 &= !jack.mask();
        }
    }

    /// Copy of `self` with `jack` updated.
    pub const fn with(self, jack: Jack, connected: bool) -> Self {
        if connected {
            Connections(self.0 | jack.mask())
        } else {
            Connections(self.0 & !jack.mask())
        }
    }
}

impl Default for Connections {
    fn default() -> Self {
        Connections::ALL
    }
}

/// Inputs sampled by the board driver for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CardInputs {
    /// Audio inputs 1 and 2.
    pub audio: [i16; 2],
    /// CV inputs 1 and 2.
    pub cv: [i16; 2],
    /// Knobs, indexed by [`Knob`].
    pub knobs: [u16; 3],
    /// Pulse inputs 1 and 2, `true` while high.
    pub pulse: [bool; 2],
    /// Switch position.
    pub switch: Switch,
    /// Jacks the normalisation probe found a cable in.
    pub connected: Connections,
}

impl Default for CardInputs {
    fn default() -> Self {
        Self {
            audio: [0; 2],
            cv: [0; 2],
            knobs: [0; 3],
            pulse: [false; 2],
            switch: Switch::Middle,
            connected: Connections::ALL,
        }
    }
}

/// Output state the sample tick drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CardOutputs {
    /// Audio outputs 1 and 2, unclamped.
    pub audio: [i16; 2],
    /// CV outputs 1 and 2, unclamped.
    pub cv: [i16; 2],
    /// Pulse outputs 1 and 2.
    pub pulse: [bool; 2],
    /// LED brightness, `0..=4095`.
    pub leds: [u16; LED_COUNT],
}

impl CardOutputs {
    /// Switch every LED off.
    #[inline]
    pub fn clear_leds(&mut self) {
        self.leds = [LED_OFF; LED_COUNT];
    }

    /// Switch one LED fully on or off.
    #[inline]
    pub fn set_led(&mut self, led: usize, on: bool) {
        if let Some(level) = self.leds.get_mut(led) {
            *level = if on { LED_ON } else { LED_OFF };
        }
    }
}

/// Saturate a raw 16-bit target to the native sample range.
#[inline]
pub fn clamp_sample(value: i16) -> i16 {
    value.clamp(SAMPLE_MIN, SAMPLE_MAX)
}

/// Activity LED brightness for an output value: `min(4095, 2·|v|)`.
#[inline]
pub fn activity_level(value: i16) -> u16 {
    let level = 2 * i32::from(value).unsigned_abs();
    level.min(u32::from(LED_ON)) as u16
}

/// Convert a 12-bit reading from an inverting input stage to a native sample.
///
/// The card's analog inputs are inverted before the ADC, so full scale reads
/// as the most negative value.
#[inline]
pub fn sample_from_inverted_adc(raw: u16) -> i16 {
    let centred = 2048 - i32::from(raw.min(KNOB_MAX));
    centred.min(i32::from(SAMPLE_MAX)) as i16
}
