//! Dual-core USB-serial bridge for the Workshop System Computer card
//!
//! The host streams target values for the card's two audio outputs, two CV
//! outputs and two pulse outputs; the card reports its audio/CV/pulse inputs,
//! knobs and switch back. This crate holds everything that does not touch a
//! peripheral register, so it builds and tests on the host as well as on the
//! RP2040:
//!
//! * [`cell`]: the lock-free exchange between the sample interrupt on core 1
//!   and the USB loop on core 0.
//! * [`bridge`]: the per-sample routine run at 48 kHz.
//! * [`gesture`]: the switch-hold that reboots the card into USB update mode.
//! * [`startup`]: the LED animation shown before the bridge goes live.
//! * [`link`]: the cooperative host loop and its [`link::HostPort`] seam.
//! * [`protocol`]: the framed binary wire format.
//! * [`probe`]: jack detection through the normalisation probe.
//! * [`card`]: the I/O data model shared with the board driver.
//!
//! ## Usage
//!
//! ```no_run
//! use card_bridge::{bridge::Bridge, card::{CardInputs, CardOutputs}, cell::IoCell, startup};
//!
//! static IO: IoCell = IoCell::new();
//!
//! let mut bridge: Bridge = Bridge::new(&IO, &startup::BRIDGE);
//! let inputs = CardInputs::default();
//! let mut outputs = CardOutputs::default();
//! // Once per sample, from the sample-rate interrupt:
//! let _tick = bridge.tick(&inputs, &mut outputs);
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod bridge;
pub mod card;
pub mod cell;
pub mod gesture;
pub mod link;
pub mod probe;
pub mod protocol;
pub mod startup;

pub use bridge::{Bridge, Tick};
pub use cell::{IoCell, Snapshot, Targets};

/// Audio sample rate the sample tick is driven at.
pub const SAMPLE_RATE_HZ: u32 = 48_000;

/// Number of sample ticks between two input snapshots (48 gives 1 kHz).
pub const INPUT_REPORT_INTERVAL: u32 = 48;
