//! USB-CDC host port
//!
//! Implements [`HostPort`] on top of `usb-device` and `usbd-serial`. The USB
//! stack has no interrupt handler of its own: it is polled from every
//! `read_byte`/`write_byte` call, so it must live on the core that runs the
//! host link.

use card_bridge::link::{HostPort, READ_TIMEOUT};
use fugit::MicrosDurationU32;
use rp2040_hal as hal;
use usb_device::bus::{UsbBus, UsbBusAllocator};
use usb_device::device::{StringDescriptors, UsbDevice, UsbDeviceBuilder, UsbDeviceState, UsbVidPid};
use usb_device::UsbError;
use usbd_serial::SerialPort;

use crate::board::Error;

/// How long a byte may wait for room in the write buffer before it is dropped.
pub const WRITE_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::millis(1);

/// A CDC-ACM serial port used as the host link.
pub struct UsbSerialPort<'a, B: UsbBus> {
    device: UsbDevice<'a, B>,
    serial: SerialPort<'a, B>,
    timer: hal::Timer,
    open: bool,
    stalled: bool,
}

impl<'a, B: UsbBus> UsbSerialPort<'a, B> {
    /// Register the serial class and the device on `bus`.
    pub fn new(bus: &'a UsbBusAllocator<B>, timer: hal::Timer) -> Result<Self, Error> {
        let serial = SerialPort::new(bus);
        let device = UsbDeviceBuilder::new(bus, UsbVidPid(0x16c0, 0x27dd))
            .strings(&[StringDescriptors::default()
                .manufacturer("Music Thing Modular")
                .product("Workshop Computer USB bridge")
                .serial_number("WSC-BRIDGE")])
            .map_err(|_| Error::UsbStrings)?
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Ok(Self {
            device,
            serial,
            timer,
            open: false,
            stalled: false,
        })
    }

    /// Whether the host has opened the port.
    pub fn is_open(&self) -> bool {
        self.device.state() == UsbDeviceState::Configured && self.serial.dtr()
    }

    fn poll(&mut self) {
        self.device.poll(&mut [&mut self.serial]);

        let open = self.is_open();
        if open != self.open {
            self.open = open;
            self.stalled = false;
            if open {
                defmt::info!("host opened the port");
            } else {
                defmt::info!("host closed the port");
            }
        }
    }

    fn elapsed_since(&self, start: hal::timer::Instant) -> MicrosDurationU32 {
        let micros = self
            .timer
            .get_counter()
            .checked_duration_since(start)
            .map_or(0, |d| d.to_micros());
        MicrosDurationU32::micros(micros.min(u64::from(u32::MAX)) as u32)
    }

    fn try_write(&mut self, byte: u8) -> Result<(), UsbError> {
        match self.serial.write(&[byte]) {
            Ok(0) => Err(UsbError::WouldBlock),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl<B: UsbBus> HostPort for UsbSerialPort<'_, B> {
    fn read_byte(&mut self) -> Option<u8> {
        let start = self.timer.get_counter();
        let mut buf = [0u8; 1];
        loop {
            self.poll();
            if let Ok(1) = self.serial.read(&mut buf) {
                return Some(buf[0]);
            }
            if self.elapsed_since(start) >= READ_TIMEOUT {
                return None;
            }
        }
    }

    fn write_byte(&mut self, byte: u8) {
        self.poll();
        if !self.open {
            return;
        }

        if self.stalled {
            if self.try_write(byte).is_ok() {
                self.stalled = false;
                defmt::debug!("write buffer drained");
            }
            return;
        }

        let start = self.timer.get_counter();
        loop {
            match self.try_write(byte) {
                Ok(()) => return,
                Err(UsbError::WouldBlock) => {}
                Err(e) => {
                    defmt::warn!("usb write failed: {}", e);
                    return;
                }
            }
            if self.elapsed_since(start) >= WRITE_TIMEOUT {
                self.stalled = true;
                defmt::warn!("host is not reading, dropping output");
                return;
            }
            self.poll();
        }
    }
}
