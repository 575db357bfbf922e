//! Sample tick
//!
//! [`Bridge::tick`] runs once per audio sample in the sample-rate interrupt on
//! core 1. In priority order it:
//!
//! 1. lets the [boot gesture](crate::gesture) take over while the switch is
//!    held Down,
//! 2. plays the [startup animation](crate::startup) until it completes,
//! 3. drives the outputs from the latest host targets, sets the activity LEDs
//!    and publishes an input snapshot every `INTERVAL` samples.
//!
//! The tick is bounded, does not allocate and never waits.

use crate::card::{activity_level, CardInputs, CardOutputs};
use crate::cell::{IoCell, Snapshot};
use crate::gesture::{BootGesture, Gesture};
use crate::startup::{Pattern, StartupAnimation, Step};
use crate::INPUT_REPORT_INTERVAL;

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tick {
    /// Outputs were driven from the host targets.
    Running,
    /// The startup animation is playing; outputs were left alone.
    Startup,
    /// The startup animation finished on this tick. Reported exactly once;
    /// the next tick is the first [`Tick::Running`] one.
    StartupComplete,
    /// The switch is held Down; only the progress LEDs were touched.
    Holding,
    /// The boot gesture completed. The sample pipeline must stop and the card
    /// reboot into USB update mode.
    EnterBootloader,
}

/// The per-sample state of the bridge.
///
/// `INTERVAL` is the number of ticks between input snapshots.
pub struct Bridge<'c, const INTERVAL: u32 = INPUT_REPORT_INTERVAL> {
    cell: &'c IoCell,
    gesture: BootGesture,
    startup: StartupAnimation,
    report_counter: u32,
}

impl<'c, const INTERVAL: u32> Bridge<'c, INTERVAL> {
    /// A bridge that will play `pattern` and then exchange data through `cell`.
    pub const fn new(cell: &'c IoCell, pattern: &'static Pattern) -> Self {
        Self {
            cell,
            gesture: BootGesture::new(),
            startup: StartupAnimation::new(pattern),
            report_counter: 0,
        }
    }

    /// Whether the startup animation has finished.
    pub fn is_startup_complete(&self) -> bool {
        self.startup.is_complete()
    }

    /// Whether the switch is being held for the boot gesture.
    pub fn is_switch_held(&self) -> bool {
        self.gesture.is_held()
    }

    /// The startup pattern.
    pub fn pattern(&self) -> &'static Pattern {
        self.startup.pattern()
    }

    /// Run one sample.
    ///
    /// `inputs` holds this sample's readings. `outputs` holds the last applied
    /// output state and is updated in place.
    #[inline]
    pub fn tick(&mut self, inputs: &CardInputs, outputs: &mut CardOutputs) -> Tick {
        match self.gesture.update(inputs.switch, outputs) {
            Gesture::Triggered => return Tick::EnterBootloader,
            Gesture::Holding => return Tick::Holding,
            Gesture::Idle | Gesture::Released => {}
        }

        if !self.startup.is_complete() {
            return match self.startup.step(outputs) {
                Step::Playing => Tick::Startup,
                Step::Complete => Tick::StartupComplete,
            };
        }

        self.process(inputs, outputs);
        Tick::Running
    }

    #[inline]
    fn process(&mut self, inputs: &CardInputs, outputs: &mut CardOutputs) {
        let targets = self.cell.load_targets();
        outputs.audio = targets.audio;
        outputs.cv = targets.cv;
        outputs.pulse = targets.pulse;

        let analog = targets.audio.into_iter().chain(targets.cv);
        for (led, value) in outputs.leds.iter_mut().zip(analog) {
            *led = activity_level(value);
        }

        self.report_counter += 1;
        if self.report_counter >= INTERVAL {
            self.report_counter = 0;
            self.cell.publish_snapshot(&Snapshot::capture(inputs));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Switch;
    use crate::cell::Targets;
    use crate::startup::{BRIDGE, TOTAL_SAMPLES};

    fn skip_startup<const N: u32>(bridge: &mut Bridge<'_, N>, out: &mut CardOutputs) {
        let inputs = CardInputs::default();
        while !bridge.is_startup_complete() {
            bridge.tick(&inputs, out);
        }
    }

    #[test]
    fn startup_complete_reported_once() {
        let cell = IoCell::new();
        let mut bridge: Bridge = Bridge::new(&cell, &BRIDGE);
        let inputs = CardInputs::default();
        let mut out = CardOutputs::default();
        let mut completions = 0;
        for n in 1..=TOTAL_SAMPLES + 10 {
            match bridge.tick(&inputs, &mut out) {
                Tick::StartupComplete => {
                    completions += 1;
                    assert_eq!(n, TOTAL_SAMPLES);
                }
                Tick::Startup => assert!(n < TOTAL_SAMPLES),
                Tick::Running => assert!(n > TOTAL_SAMPLES),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(completions, 1);
    }

    #[test]
    fn drives_outputs_and_leds() {
        let cell = IoCell::new();
        let mut bridge: Bridge = Bridge::new(&cell, &BRIDGE);
        let mut out = CardOutputs::default();
        skip_startup(&mut bridge, &mut out);

        cell.store_targets(&Targets {
            pulse: [false, true],
            audio: [-100, 2047],
            cv: [i16::MIN, 3],
        });
        assert_eq!(bridge.tick(&CardInputs::default(), &mut out), Tick::Running);
        assert_eq!(out.audio, [-100, 2047]);
        assert_eq!(out.cv, [i16::MIN, 3]);
        assert_eq!(out.pulse, [false, true]);
        assert_eq!(out.leds, [200, 4094, 4095, 6, 0, 0]);
    }

    #[test]
    fn snapshot_every_interval() {
        let cell = IoCell::new();
        let mut bridge: Bridge<'_, 4> = Bridge::new(&cell, &BRIDGE);
        let mut out = CardOutputs::default();
        skip_startup(&mut bridge, &mut out);

        let inputs = CardInputs {
            knobs: [7, 8, 9],
            ..CardInputs::default()
        };
        for _ in 0..3 {
            bridge.tick(&inputs, &mut out);
            assert!(!cell.is_snapshot_ready());
        }
        bridge.tick(&inputs, &mut out);
        assert_eq!(cell.try_take_snapshot().map(|s| s.knobs), Some([7, 8, 9]));
    }

    #[test]
    fn held_switch_pauses_startup() {
        let cell = IoCell::new();
        let mut bridge: Bridge = Bridge::new(&cell, &BRIDGE);
        let mut out = CardOutputs::default();
        let held = CardInputs {
            switch: Switch::Down,
            ..CardInputs::default()
        };
        for _ in 0..100 {
            assert_eq!(bridge.tick(&held, &mut out), Tick::Holding);
        }
        assert!(bridge.is_switch_held());
        assert_eq!(bridge.tick(&CardInputs::default(), &mut out), Tick::Startup);
        assert!(!bridge.is_switch_held());
        assert_eq!(bridge.pattern().name, "Bridge");
    }
}
