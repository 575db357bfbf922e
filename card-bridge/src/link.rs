//! Host link
//!
//! The cooperative loop that runs on core 0, next to the USB stack. Every
//! iteration reads at most one byte from the host with a short timeout, feeds
//! it to the [`FrameParser`] and then forwards the latest input snapshot, if
//! one is ready. With the default decimation this sends about one snapshot
//! per millisecond without starving the read path.

use fugit::MicrosDurationU32;

use crate::cell::IoCell;
use crate::protocol::FrameParser;

/// How long [`HostPort::read_byte`] waits for a byte before giving up.
pub const READ_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::micros(100);

/// Byte-level access to the host.
///
/// The USB-CDC implementation lives in the firmware; tests use an in-memory
/// port.
pub trait HostPort {
    /// Wait up to [`READ_TIMEOUT`] for a byte from the host.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue one byte for the host. Never blocks indefinitely; a byte that
    /// cannot be sent is dropped.
    fn write_byte(&mut self, byte: u8);
}

/// What one [`HostLink::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Activity {
    /// A complete frame arrived and its targets were committed.
    pub targets_committed: bool,
    /// A snapshot frame was written to the port.
    pub snapshot_sent: bool,
}

/// The host side of the bridge.
pub struct HostLink<'c, P> {
    cell: &'c IoCell,
    port: P,
    parser: FrameParser,
}

impl<'c, P: HostPort> HostLink<'c, P> {
    /// A link exchanging data between `port` and `cell`.
    pub fn new(cell: &'c IoCell, port: P) -> Self {
        Self {
            cell,
            port,
            parser: FrameParser::new(),
        }
    }

    /// The underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable access to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port.
    pub fn free(self) -> P {
        self.port
    }

    /// One loop iteration.
    pub fn poll(&mut self) -> Activity {
        let mut activity = Activity::default();

        if let Some(byte) = self.port.read_byte() {
            if let Some(targets) = self.parser.push(byte) {
                #[cfg(feature = "defmt")]
                defmt::trace!("targets {}", targets);
                self.cell.store_targets(&targets);
                activity.targets_committed = true;
            }
        }

        if let Some(snapshot) = self.cell.try_take_snapshot() {
            for byte in snapshot.encode() {
                self.port.write_byte(byte);
            }
            activity.snapshot_sent = true;
        }

        activity
    }

    /// Run the loop forever.
    pub fn run(mut self) -> ! {
        #[cfg(feature = "defmt")]
        defmt::info!("host link running");
        loop {
            self.poll();
        }
    }
}
