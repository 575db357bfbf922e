//! Workshop System Computer board driver
//!
//! Everything that touches the card's I/O peripherals during a sample tick.
//!
//! | Function            | Pins        | Peripheral                   |
//! |---------------------|-------------|------------------------------|
//! | Audio out 1, 2      | 18, 19, 21  | MCP4822 DAC on SPI0          |
//! | CV out 1, 2         | 23, 22      | PWM slice 3, 11 bit          |
//! | Pulse out 1, 2      | 8, 9        | SIO, inverted                |
//! | Pulse in 1, 2       | 2, 3        | SIO, pulled up, active low   |
//! | LEDs 0..5           | 10..15      | PWM slices 5, 6, 7           |
//! | Audio in 1, 2       | 27, 26      | ADC, inverted                |
//! | Mux address A, B    | 24, 25      | SIO                          |
//! | Mux IO 1, 2         | 28, 29      | ADC                          |
//! | Normalisation probe | 4           | SIO                          |
//!
//! PWM slice 0 is not connected to a pin; it wraps at exactly 48 kHz and its
//! wrap interrupt clocks the sample tick.

use core::ops::Range;

use card_bridge::card::{
    clamp_sample, sample_from_inverted_adc, CardInputs, CardOutputs, Jack, Knob, Switch,
};
use card_bridge::probe::NormalisationProbe;
use card_bridge::SAMPLE_RATE_HZ;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiBus;
use embedded_hal_0_2::adc::OneShot;
use fugit::{HertzU32, RateExtU32};
use rp2040_hal as hal;

use hal::adc::AdcPin;
use hal::clocks::{ClocksManager, InitError};
use hal::gpio::bank0::{Gpio18, Gpio19, Gpio26, Gpio27, Gpio28, Gpio29, Gpio4};
use hal::gpio::{
    DynPinId, FunctionSioInput, FunctionSioOutput, FunctionSpi, Pin, PullDown, PullNone, PullUp,
};
use hal::pac;
use hal::pll::{common_configs::PLL_USB_48MHZ, PLLConfig};
use hal::pwm::{FreeRunning, Pwm0, Pwm3, Pwm5, Pwm6, Pwm7, Slice};
use hal::spi::Enabled;
use hal::Clock;

/// Crystal fitted to the card.
pub const XTAL_FREQ_HZ: u32 = 12_000_000;

/// 144 MHz system clock: 48 kHz is exactly 3000 cycles.
pub const PLL_SYS_144MHZ: PLLConfig = PLLConfig {
    vco_freq: HertzU32::MHz(1440),
    refdiv: 1,
    post_div1: 5,
    post_div2: 2,
};

/// SRAM in the RP2040 address map, including the two 4 KB scratch banks.
const SRAM: Range<usize> = 0x2000_0000..0x2004_2000;

const SAMPLE_CLOCK_TOP: u16 = 2999;
const CV_TOP: u16 = 2047;
const LED_TOP: u16 = 4095;
const DAC_BAUD_MHZ: u32 = 15;

// MCP4822 command bits: channel select, 2x gain, output enabled.
const DAC_CHANNEL_A: u16 = 0x1000;
const DAC_CHANNEL_B: u16 = 0x9000;

/// Things that can go wrong while bringing the card up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Error {
    /// The crystal oscillator did not start.
    Xosc,
    /// A PLL did not lock.
    Pll,
    /// The clock tree could not be configured.
    Clocks,
    /// A pin could not be used as an ADC input.
    AdcPin,
    /// Too many USB string descriptors.
    UsbStrings,
    /// Core 1 did not start.
    Core1,
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        match e {
            InitError::XoscErr(_) => Error::Xosc,
            InitError::PllError(_) => Error::Pll,
            InitError::ClockError(_) => Error::Clocks,
        }
    }
}

/// Run the card from the crystal: 144 MHz system clock, 48 MHz USB clock.
///
/// The watchdog tick is started too; the timer counts in its microseconds.
pub fn init_clocks(
    xosc: pac::XOSC,
    clocks: pac::CLOCKS,
    pll_sys: pac::PLL_SYS,
    pll_usb: pac::PLL_USB,
    resets: &mut pac::RESETS,
    watchdog: &mut hal::Watchdog,
) -> Result<ClocksManager, Error> {
    let xosc = hal::xosc::setup_xosc_blocking(xosc, XTAL_FREQ_HZ.Hz())
        .map_err(InitError::XoscErr)?;
    let xtal = xosc.operating_frequency();
    watchdog.enable_tick_generation((XTAL_FREQ_HZ / 1_000_000) as u8);

    let mut manager = ClocksManager::new(clocks);
    let sys = hal::pll::setup_pll_blocking(pll_sys, xtal, PLL_SYS_144MHZ, &mut manager, resets)
        .map_err(InitError::PllError)?;
    let usb = hal::pll::setup_pll_blocking(pll_usb, xtal, PLL_USB_48MHZ, &mut manager, resets)
        .map_err(InitError::PllError)?;
    manager
        .init_default(&xosc, &sys, &usb)
        .map_err(InitError::ClockError)?;

    let sys_hz = manager.system_clock.freq().to_Hz();
    defmt::debug!(
        "sys clock {} Hz, sample clock {} Hz",
        sys_hz,
        sys_hz / (u32::from(SAMPLE_CLOCK_TOP) + 1)
    );
    Ok(manager)
}

type DacPins = (
    Pin<Gpio19, FunctionSpi, PullDown>,
    Pin<Gpio18, FunctionSpi, PullDown>,
);
type SioOutput = Pin<DynPinId, FunctionSioOutput, PullDown>;
type PulseInput = Pin<DynPinId, FunctionSioInput, PullUp>;
type AnalogIn<I> = AdcPin<Pin<I, FunctionSioInput, PullNone>>;

/// The card's I/O, owned by the sample tick.
pub struct Board {
    sample_clock: Slice<Pwm0, FreeRunning>,
    dac: hal::Spi<Enabled, pac::SPI0, DacPins, 16>,
    dac_cs: SioOutput,
    cv: Slice<Pwm3, FreeRunning>,
    leds: (
        Slice<Pwm5, FreeRunning>,
        Slice<Pwm6, FreeRunning>,
        Slice<Pwm7, FreeRunning>,
    ),
    pulse_out: [SioOutput; 2],
    pulse_in: [PulseInput; 2],
    adc: hal::Adc,
    audio_in: (AnalogIn<Gpio27>, AnalogIn<Gpio26>),
    mux_io: (AnalogIn<Gpio28>, AnalogIn<Gpio29>),
    mux_address: [SioOutput; 2],
    mux_step: u8,
    probe_pin: Pin<Gpio4, FunctionSioOutput, PullDown>,
    probe: NormalisationProbe,
}

impl Board {
    /// Configure every I/O peripheral and start the sample clock.
    ///
    /// The sample clock interrupt is raised but stays masked until a core
    /// unmasks `PWM_IRQ_WRAP` in its NVIC.
    pub fn init(
        pins: hal::gpio::Pins,
        pwm: pac::PWM,
        spi0: pac::SPI0,
        adc: pac::ADC,
        resets: &mut pac::RESETS,
        clocks: &ClocksManager,
    ) -> Result<Self, Error> {
        let slices = hal::pwm::Slices::new(pwm, resets);

        let mut sample_clock = slices.pwm0;
        sample_clock.default_config();
        sample_clock.set_top(SAMPLE_CLOCK_TOP);
        sample_clock.set_div_int(1);
        sample_clock.enable_interrupt();

        let mut cv = slices.pwm3;
        cv.default_config();
        cv.set_top(CV_TOP);
        cv.channel_b.output_to(pins.gpio23);
        cv.channel_a.output_to(pins.gpio22);
        cv.enable();

        let mut leds = (slices.pwm5, slices.pwm6, slices.pwm7);
        leds.0.default_config();
        leds.1.default_config();
        leds.2.default_config();
        leds.0.set_top(LED_TOP);
        leds.1.set_top(LED_TOP);
        leds.2.set_top(LED_TOP);
        leds.0.channel_a.output_to(pins.gpio10);
        leds.0.channel_b.output_to(pins.gpio11);
        leds.1.channel_a.output_to(pins.gpio12);
        leds.1.channel_b.output_to(pins.gpio13);
        leds.2.channel_a.output_to(pins.gpio14);
        leds.2.channel_b.output_to(pins.gpio15);
        leds.0.enable();
        leds.1.enable();
        leds.2.enable();

        let dac_pins: DacPins = (
            pins.gpio19.into_function::<FunctionSpi>(),
            pins.gpio18.into_function::<FunctionSpi>(),
        );
        let dac = hal::Spi::<_, _, _, 16>::new(spi0, dac_pins).init(
            resets,
            clocks.peripheral_clock.freq(),
            DAC_BAUD_MHZ.MHz(),
            embedded_hal::spi::MODE_0,
        );
        let dac_cs = pins
            .gpio21
            .into_push_pull_output_in_state(PinState::High)
            .into_dyn_pin();

        // Pulse outputs are inverted: a high pin is a low jack.
        let pulse_out = [
            pins.gpio8
                .into_push_pull_output_in_state(PinState::High)
                .into_dyn_pin(),
            pins.gpio9
                .into_push_pull_output_in_state(PinState::High)
                .into_dyn_pin(),
        ];
        let pulse_in = [
            pins.gpio2.into_pull_up_input().into_dyn_pin(),
            pins.gpio3.into_pull_up_input().into_dyn_pin(),
        ];

        let adc = hal::Adc::new(adc, resets);
        let audio_in = (
            AdcPin::new(pins.gpio27.into_floating_input()).map_err(|_| Error::AdcPin)?,
            AdcPin::new(pins.gpio26.into_floating_input()).map_err(|_| Error::AdcPin)?,
        );
        let mux_io = (
            AdcPin::new(pins.gpio28.into_floating_input()).map_err(|_| Error::AdcPin)?,
            AdcPin::new(pins.gpio29.into_floating_input()).map_err(|_| Error::AdcPin)?,
        );
        let mux_address = [
            pins.gpio24.into_push_pull_output().into_dyn_pin(),
            pins.gpio25.into_push_pull_output().into_dyn_pin(),
        ];

        let probe_pin = pins.gpio4.into_push_pull_output();

        sample_clock.enable();
        defmt::info!("board ready, sample clock {} Hz", SAMPLE_RATE_HZ);

        Ok(Self {
            sample_clock,
            dac,
            dac_cs,
            cv,
            leds,
            pulse_out,
            pulse_in,
            adc,
            audio_in,
            mux_io,
            mux_address,
            mux_step: 0,
            probe_pin,
            probe: NormalisationProbe::new(),
        })
    }

    /// Acknowledge the sample clock interrupt.
    #[inline]
    pub fn clear_sample_interrupt(&mut self) {
        self.sample_clock.clear_interrupt();
    }

    /// Stop the sample clock for good.
    pub fn stop_sample_clock(&mut self) {
        self.sample_clock.disable_interrupt();
        self.sample_clock.disable();
    }

    #[inline]
    fn read(&mut self, channel: Channel) -> Option<u16> {
        let adc = &mut self.adc;
        let result = match channel {
            Channel::Audio1 => nb::block!(adc.read(&mut self.audio_in.0)),
            Channel::Audio2 => nb::block!(adc.read(&mut self.audio_in.1)),
            Channel::MuxIo1 => nb::block!(adc.read(&mut self.mux_io.0)),
            Channel::MuxIo2 => nb::block!(adc.read(&mut self.mux_io.1)),
        };
        result.ok()
    }

    /// Refresh `inputs` for this tick.
    ///
    /// Audio and pulse inputs are read every tick. The knobs, the CV inputs
    /// and the switch sit behind the analog mux and are read one mux address
    /// per tick, so each of them refreshes at a quarter of the sample rate;
    /// fields not read this tick keep their previous value.
    #[inline(never)]
    #[link_section = ".data.ramfunc"]
    pub fn sample(&mut self, inputs: &mut CardInputs) {
        let step = self.mux_step;

        if let Some(raw) = self.read(Channel::Audio1) {
            inputs.audio[0] = sample_from_inverted_adc(raw);
        }
        if let Some(raw) = self.read(Channel::Audio2) {
            inputs.audio[1] = sample_from_inverted_adc(raw);
        }
        for (level, pin) in inputs.pulse.iter_mut().zip(self.pulse_in.iter_mut()) {
            *level = matches!(pin.is_low(), Ok(true));
        }

        match step {
            0 => {
                if let Some(raw) = self.read(Channel::MuxIo1) {
                    inputs.knobs[Knob::Main as usize] = raw;
                }
                if let Some(raw) = self.read(Channel::MuxIo2) {
                    inputs.cv[0] = sample_from_inverted_adc(raw);
                }
                self.probe.observe_analog(Jack::AudioIn1, inputs.audio[0]);
                self.probe.observe_analog(Jack::AudioIn2, inputs.audio[1]);
                self.probe.observe_analog(Jack::CvIn1, inputs.cv[0]);
                self.probe.observe(Jack::PulseIn1, inputs.pulse[0]);
                self.probe.observe(Jack::PulseIn2, inputs.pulse[1]);
            }
            1 => {
                if let Some(raw) = self.read(Channel::MuxIo1) {
                    inputs.knobs[Knob::X as usize] = raw;
                }
                if let Some(raw) = self.read(Channel::MuxIo2) {
                    inputs.cv[1] = sample_from_inverted_adc(raw);
                }
                self.probe.observe_analog(Jack::CvIn2, inputs.cv[1]);
            }
            2 => {
                if let Some(raw) = self.read(Channel::MuxIo1) {
                    inputs.knobs[Knob::Y as usize] = raw;
                }
            }
            _ => {
                if let Some(raw) = self.read(Channel::MuxIo1) {
                    inputs.switch = Switch::from_adc(raw);
                }
                let level = self.probe.advance();
                let _ = self.probe_pin.set_state(PinState::from(level));
            }
        }
        inputs.connected = self.probe.connections();

        // Select the next address now so the mux settles over a whole tick.
        self.mux_step = (step + 1) % 4;
        let _ = self.mux_address[0].set_state(PinState::from(self.mux_step & 1 != 0));
        let _ = self.mux_address[1].set_state(PinState::from(self.mux_step & 2 != 0));
    }

    /// Drive every output from `outputs`.
    #[inline(never)]
    #[link_section = ".data.ramfunc"]
    pub fn apply(&mut self, outputs: &CardOutputs) {
        self.write_dac(DAC_CHANNEL_A, outputs.audio[0]);
        self.write_dac(DAC_CHANNEL_B, outputs.audio[1]);

        let _ = self.cv.channel_b.set_duty_cycle(cv_duty(outputs.cv[0]));
        let _ = self.cv.channel_a.set_duty_cycle(cv_duty(outputs.cv[1]));

        for (pin, &high) in self.pulse_out.iter_mut().zip(outputs.pulse.iter()) {
            let _ = pin.set_state(PinState::from(!high));
        }

        let [l0, l1, l2, l3, l4, l5] = outputs.leds;
        let _ = self.leds.0.channel_a.set_duty_cycle(l0);
        let _ = self.leds.0.channel_b.set_duty_cycle(l1);
        let _ = self.leds.1.channel_a.set_duty_cycle(l2);
        let _ = self.leds.1.channel_b.set_duty_cycle(l3);
        let _ = self.leds.2.channel_a.set_duty_cycle(l4);
        let _ = self.leds.2.channel_b.set_duty_cycle(l5);
    }

    #[inline]
    fn write_dac(&mut self, channel: u16, value: i16) {
        let _ = self.dac_cs.set_low();
        let _ = self.dac.write(&[channel | dac_code(value)]);
        let _ = self.dac.flush();
        let _ = self.dac_cs.set_high();
    }
}

#[derive(Clone, Copy)]
enum Channel {
    Audio1,
    Audio2,
    MuxIo1,
    MuxIo2,
}

/// 12-bit DAC code for a native sample. The output stage inverts.
#[inline]
fn dac_code(value: i16) -> u16 {
    (2047 - i32::from(clamp_sample(value))) as u16 & 0x0FFF
}

/// 11-bit PWM duty for a native CV sample. The output stage inverts.
#[inline]
fn cv_duty(value: i16) -> u16 {
    let code = (i32::from(clamp_sample(value)) + 2048) as u16;
    (4095 - code) >> 1
}

/// Whether the code at `address` executes from SRAM rather than through XIP.
pub fn runs_from_ram(address: usize) -> bool {
    SRAM.contains(&address)
}
