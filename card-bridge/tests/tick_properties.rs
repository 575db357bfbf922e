//! Property-based tests for the sample tick.

use card_bridge::card::{CardInputs, CardOutputs, Switch};
use card_bridge::cell::{IoCell, Targets};
use card_bridge::gesture::TRIGGER_AT;
use card_bridge::startup::BRIDGE;
use card_bridge::{Bridge, Tick};
use proptest::prelude::*;

fn live_bridge(cell: &IoCell) -> (Bridge<'_>, CardOutputs) {
    let mut bridge: Bridge = Bridge::new(cell, &BRIDGE);
    let mut out = CardOutputs::default();
    let idle = CardInputs::default();
    while !bridge.is_startup_complete() {
        bridge.tick(&idle, &mut out);
    }
    (bridge, out)
}

fn expected_level(v: i16) -> u16 {
    (2 * i32::from(v).unsigned_abs()).min(4095) as u16
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Activity LEDs follow the analog outputs applied on the same tick.
    #[test]
    fn led_brightness_tracks_outputs(
        audio in any::<[i16; 2]>(),
        cv in any::<[i16; 2]>(),
        pulse in any::<[bool; 2]>(),
    ) {
        let cell = IoCell::new();
        let (mut bridge, mut out) = live_bridge(&cell);

        cell.store_targets(&Targets { pulse, audio, cv });
        prop_assert_eq!(bridge.tick(&CardInputs::default(), &mut out), Tick::Running);

        let expected = [
            expected_level(audio[0]),
            expected_level(audio[1]),
            expected_level(cv[0]),
            expected_level(cv[1]),
        ];
        prop_assert_eq!(&out.leds[..4], &expected[..]);
        prop_assert_eq!(out.audio, audio);
        prop_assert_eq!(out.cv, cv);
    }

    /// Releasing the switch before the trigger resets the gesture on the next tick.
    #[test]
    fn early_release_resets_hold(held_for in 1..TRIGGER_AT) {
        let cell = IoCell::new();
        let (mut bridge, mut out) = live_bridge(&cell);
        let down = CardInputs { switch: Switch::Down, ..CardInputs::default() };

        for _ in 0..held_for {
            prop_assert_eq!(bridge.tick(&down, &mut out), Tick::Holding);
        }
        prop_assert!(bridge.is_switch_held());

        prop_assert_eq!(bridge.tick(&CardInputs::default(), &mut out), Tick::Running);
        prop_assert!(!bridge.is_switch_held());

        // A fresh hold has to go the full distance again.
        for _ in 1..TRIGGER_AT {
            prop_assert_eq!(bridge.tick(&down, &mut out), Tick::Holding);
        }
        prop_assert_eq!(bridge.tick(&down, &mut out), Tick::EnterBootloader);
    }
}
