//! # BH1750 driver and brightness monitor
//! A platform-agnostic, 'no_std' compatible Rust driver for the BH1750 ambient light sensor, including control of the
//! sensor's ADDR pin.
//!
//! The I²C instruction set is based on the following datasheet: [BH1750 datasheet](https://www.mouser.com/datasheet/2/348/bh1750fvi-e-186247.pdf) \
//! The power, reset and measurement mode instructions are implemented and supported.
//!
//! The raw values read from the sensor are converted to lux using the datasheet's fixed scale factor of 1.2.
//!
//! ## Usage
//! The driver talks to the hardware through a [`BusTransport`], which provides an I²C channel and the digital pin
//! wired to the sensor's ADDR input. [`HalTransport`] builds one from any `embedded-hal` I²C bus and output pin.
//!
//! Creating a driver selects the address, opens the channel and puts the sensor into continuous high resolution mode.
//! `get_brightness` then waits for the measurement to settle and returns the latest value in lux.
//!
//! The [`monitor`] module classifies those values into brightness bands and polls the sensor in a loop.
//!
//! ## Example
//! This example uses the `esp-hal` crate to interface with the sensor on an ESP32 microcontroller.
//!
//! ```ignore
//! #![no_std]
//! #![no_main]
//!
//! use esp_backtrace as _;
//! use bh1750_monitor::{BH1750, HalTransport, Monitor};
//! use esp_hal::{
//!     clock::ClockControl,
//!     delay::Delay,
//!     peripherals::Peripherals,
//!     prelude::*,
//!     system::SystemControl,
//!     gpio::{Io, Level, Output}
//! };
//! use esp_hal::i2c::I2C;
//!
//! #[entry]
//! fn main() -> ! {
//!     esp_println::logger::init_logger_from_env();
//!
//!     let peripherals = Peripherals::take();
//!     let system = SystemControl::new(peripherals.SYSTEM);
//!     let clocks = ClockControl::boot_defaults(system.clock_control).freeze();
//!     let delay = Delay::new(&clocks);
//!
//!     let io = Io::new(peripherals.GPIO, peripherals.IO_MUX);
//!
//!     let i2c = I2C::new(
//!         peripherals.I2C0,
//!         io.pins.gpio8,
//!         io.pins.gpio9,
//!         100.kHz(),
//!         &clocks,
//!         None
//!     );
//!     let addr_pin = Output::new(io.pins.gpio17, Level::Low);
//!
//!     let transport = HalTransport::new(1, i2c, 17, addr_pin);
//!     let sensor = BH1750::new(transport, delay, 17, false)
//!         .expect("Failed to set up BH1750");
//!
//!     let mut monitor = Monitor::new(sensor, 1000);
//!     let err = monitor.run(|reading| log::info!("{}", reading.brightness));
//!     panic!("BH1750 failed: {}", err);
//! }
//! ```

#![no_std]
extern crate embedded_hal;

pub mod hal;
pub mod monitor;
pub mod transport;

pub use hal::{HalChannel, HalError, HalTransport};
pub use monitor::{classify, Brightness, Monitor, Reading};
pub use transport::BusTransport;

use core::fmt;

use embedded_hal::delay;
use log::{debug, trace, warn};

pub const STANDARD_ADDRESS_HIGH: u8 = 0x5c;
pub const STANDARD_ADDRESS_LOW: u8 = 0x23;

/// Bus the sensor is opened on unless configured otherwise
pub const DEFAULT_BUS: u8 = 1;
const DEFAULT_CHANNEL_FLAGS: u32 = 0;

/// Time the result register needs after a measurement was triggered before it holds a valid value
pub const SETTLING_TIME_MS: u32 = 140;

const LUX_SCALE_FACTOR: f64 = 1.2;

const POWER_DOWN_INSTRUCTION: u8 = 0b0000_0000;
const POWER_ON_INSTRUCTION: u8 = 0b0000_0001;
const RESET_INSTRUCTION: u8 = 0b0000_0111;

/// Enum representing the possible errors that can occur when using the BH1750 driver
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BH1750Error<E> {
    /// Configuring or driving the address pin failed
    Pin(E),
    /// Opening, closing, reading from or writing to the bus channel failed
    Transport(E),
    /// A raw read was requested with an unsupported byte count
    InvalidReadLength(usize),
    /// The driver has no open channel, a previous address change failed
    ChannelClosed,
}

impl<E: fmt::Debug> fmt::Display for BH1750Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BH1750Error::Pin(err) => write!(f, "address pin error: {:?}", err),
            BH1750Error::Transport(err) => write!(f, "bus error: {:?}", err),
            BH1750Error::InvalidReadLength(count) => write!(f, "cannot read {} bytes", count),
            BH1750Error::ChannelClosed => f.write_str("no open bus channel"),
        }
    }
}

/// Enum representing the possible resolution modes of the sensor
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    High, // 1 lx resolution
    High2, // 0.5 lx resolution
    Low, // 4 lx resolution
}

/// Whether the sensor keeps measuring or powers down after a single measurement
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Measurement {
    Continuous,
    OneShot,
}

/// An operating mode of the sensor
///
/// The driver commands [`Mode::DEFAULT`] (continuous, high resolution) when it is created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mode {
    pub measurement: Measurement,
    pub resolution: Resolution,
}

impl Mode {
    pub const DEFAULT: Mode = Mode::continuous(Resolution::High);

    pub const fn continuous(resolution: Resolution) -> Self {
        return Mode { measurement: Measurement::Continuous, resolution };
    }

    pub const fn one_shot(resolution: Resolution) -> Self {
        return Mode { measurement: Measurement::OneShot, resolution };
    }

    /// The single byte that puts the sensor into this mode
    pub const fn instruction(&self) -> u8 {
        match (self.measurement, self.resolution) {
            (Measurement::Continuous, Resolution::High) => 0b0001_0000,
            (Measurement::Continuous, Resolution::High2) => 0b0001_0001,
            (Measurement::Continuous, Resolution::Low) => 0b0001_0011,
            (Measurement::OneShot, Resolution::High) => 0b0010_0000,
            (Measurement::OneShot, Resolution::High2) => 0b0010_0001,
            (Measurement::OneShot, Resolution::Low) => 0b0010_0011,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        return Mode::DEFAULT;
    }
}

/// Settings for creating a driver and polling it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bus the sensor is connected to
    pub bus: u8,
    /// Digital pin wired to the sensor's ADDR input
    pub address_pin: u8,
    /// Level driven on the ADDR pin, selects between the two addresses
    pub address_high: bool,
    /// Flags passed to the transport when opening a channel
    pub channel_flags: u32,
    /// Time between two samples of the monitor
    pub poll_interval_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        return Config {
            bus: DEFAULT_BUS,
            address_pin: 17,
            address_high: false,
            channel_flags: DEFAULT_CHANNEL_FLAGS,
            poll_interval_ms: 1000,
        };
    }
}

/// The I²C address selected by the given ADDR pin level
pub const fn effective_address(address_high: bool) -> u8 {
    if address_high { STANDARD_ADDRESS_HIGH } else { STANDARD_ADDRESS_LOW }
}

/// Accumulates bytes into an unsigned integer, most significant byte first
///
/// Only the last four bytes contribute to the result.
pub fn accumulate_be(bytes: &[u8]) -> u32 {
    return bytes.iter().fold(0u32, |acc, &byte| acc << 8 | byte as u32);
}

/// Converts the raw result register value to lux
pub fn raw_to_lux(raw: u16) -> f64 {
    return raw as f64 / LUX_SCALE_FACTOR;
}

/// Converts the two bytes of the result register to lux
pub fn convert(data: &[u8; 2]) -> f64 {
    return raw_to_lux(accumulate_be(data) as u16);
}

/// BH1750 driver
///
/// The driver owns exactly one open channel, always opened for the address selected by the current ADDR pin level.
/// The channel is closed when the driver is dropped; errors while closing are logged and otherwise ignored.
///
/// Calls are blocking and not reentrant. Share a driver between threads only behind a mutex.
pub struct BH1750<T: BusTransport, DELAY> {
    transport: T,
    delay: DELAY,
    bus: u8,
    channel_flags: u32,
    address_pin: u8,
    address_high: bool,
    channel: Option<T::Handle>,
    mode: Option<Mode>,
}

impl<T: BusTransport, DELAY: delay::DelayNs> BH1750<T, DELAY> {
    /// Create a new instance of the BH1750 driver on the default bus
    ///
    /// The address pin is driven to the requested level, a channel to the matching address is opened and the sensor
    /// is put into continuous high resolution mode.
    ///
    /// # Arguments
    /// * `transport` - The bus and pin access the sensor is reached through
    /// * `delay` - The delay provider
    /// * `address_pin` - The pin wired to the sensor's ADDR input
    /// * `address_pin_high` - The level to drive the address pin to (This determines the I2C address)
    pub fn new(transport: T, delay: DELAY, address_pin: u8, address_pin_high: bool) -> Result<Self, BH1750Error<T::Error>> {
        return Self::new_on_bus(transport, delay, DEFAULT_BUS, address_pin, address_pin_high);
    }

    /// Create a new instance of the BH1750 driver on a specific bus
    ///
    /// # Arguments
    /// * `transport` - The bus and pin access the sensor is reached through
    /// * `delay` - The delay provider
    /// * `bus` - The bus the sensor is connected to
    /// * `address_pin` - The pin wired to the sensor's ADDR input
    /// * `address_pin_high` - The level to drive the address pin to (This determines the I2C address)
    pub fn new_on_bus(transport: T, delay: DELAY, bus: u8, address_pin: u8, address_pin_high: bool) -> Result<Self, BH1750Error<T::Error>> {
        let config = Config { bus, address_pin, address_high: address_pin_high, ..Config::default() };
        return Self::from_config(transport, delay, &config);
    }

    /// Create a new instance of the BH1750 driver from a [`Config`]
    pub fn from_config(mut transport: T, delay: DELAY, config: &Config) -> Result<Self, BH1750Error<T::Error>> {
        transport.set_pin_output(config.address_pin).map_err(BH1750Error::Pin)?;
        transport.write_pin(config.address_pin, config.address_high).map_err(BH1750Error::Pin)?;

        let address = effective_address(config.address_high);
        let channel = transport
            .open_channel(config.bus, address, config.channel_flags)
            .map_err(BH1750Error::Transport)?;
        debug!("bh1750: opened channel to {:#04x} on bus {}", address, config.bus);

        let mut sensor = Self {
            transport,
            delay,
            bus: config.bus,
            channel_flags: config.channel_flags,
            address_pin: config.address_pin,
            address_high: config.address_high,
            channel: Some(channel),
            mode: None,
        };

        // On failure `sensor` is dropped here, which closes the channel
        sensor.set_mode(Mode::DEFAULT)?;

        return Ok(sensor);
    }

    /// The I²C address selected by the current ADDR pin level
    pub fn address(&self) -> u8 {
        return effective_address(self.address_high);
    }

    pub fn address_select(&self) -> bool {
        return self.address_high;
    }

    pub fn address_pin(&self) -> u8 {
        return self.address_pin;
    }

    /// The last mode successfully commanded, `None` after a power or reset instruction
    pub fn mode(&self) -> Option<Mode> {
        return self.mode;
    }

    /// Whether the driver currently holds an open channel
    pub fn is_open(&self) -> bool {
        return self.channel.is_some();
    }

    /// Switches the sensor to the other address
    ///
    /// The address pin is driven to the new level, the current channel is closed and a channel to the new address
    /// is opened. No mode instruction is sent; the sensor keeps its mode across the address change.
    ///
    /// If closing the old channel or opening the new one fails, the error is returned and the driver is left without a
    /// channel: every further bus operation fails with [`BH1750Error::ChannelClosed`] until a later call succeeds.
    ///
    /// # Arguments
    /// * `address_pin_high` - The new level of the address pin
    pub fn reconfigure_address(&mut self, address_pin_high: bool) -> Result<(), BH1750Error<T::Error>> {
        self.transport.write_pin(self.address_pin, address_pin_high).map_err(BH1750Error::Pin)?;
        self.address_high = address_pin_high;

        if let Some(old) = self.channel.take() {
            self.transport.close_channel(old).map_err(BH1750Error::Transport)?;
        }

        let address = self.address();
        let channel = self
            .transport
            .open_channel(self.bus, address, self.channel_flags)
            .map_err(BH1750Error::Transport)?;
        self.channel = Some(channel);
        debug!("bh1750: reopened channel to {:#04x} on bus {}", address, self.bus);

        return Ok(());
    }

    /// Sends the power down instruction to the sensor
    pub fn power_off(&mut self) -> Result<(), BH1750Error<T::Error>> {
        self.send_instruction(POWER_DOWN_INSTRUCTION)?;
        self.mode = None;
        return Ok(());
    }

    /// Sends the power on instruction to the sensor
    pub fn power_on(&mut self) -> Result<(), BH1750Error<T::Error>> {
        self.send_instruction(POWER_ON_INSTRUCTION)?;
        self.mode = None;
        return Ok(());
    }

    /// Resets the data register of the sensor
    ///
    /// The reset instruction is only accepted while the sensor is powered, so the power on instruction is sent first.
    pub fn reset(&mut self) -> Result<(), BH1750Error<T::Error>> {
        self.power_on()?;
        return self.send_instruction(RESET_INSTRUCTION);
    }

    /// Sends the instruction for the given mode to the sensor
    ///
    /// One-shot modes trigger a single measurement; they have to be commanded again before every further reading.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), BH1750Error<T::Error>> {
        self.send_instruction(mode.instruction())?;
        self.mode = Some(mode);
        return Ok(());
    }

    pub fn continuous_high_res_mode(&mut self) -> Result<(), BH1750Error<T::Error>> {
        return self.set_mode(Mode::continuous(Resolution::High));
    }

    pub fn continuous_high_res2_mode(&mut self) -> Result<(), BH1750Error<T::Error>> {
        return self.set_mode(Mode::continuous(Resolution::High2));
    }

    pub fn continuous_low_res_mode(&mut self) -> Result<(), BH1750Error<T::Error>> {
        return self.set_mode(Mode::continuous(Resolution::Low));
    }

    pub fn one_shot_high_res_mode(&mut self) -> Result<(), BH1750Error<T::Error>> {
        return self.set_mode(Mode::one_shot(Resolution::High));
    }

    pub fn one_shot_high_res2_mode(&mut self) -> Result<(), BH1750Error<T::Error>> {
        return self.set_mode(Mode::one_shot(Resolution::High2));
    }

    pub fn one_shot_low_res_mode(&mut self) -> Result<(), BH1750Error<T::Error>> {
        return self.set_mode(Mode::one_shot(Resolution::Low));
    }

    /// Reads `buffer.len()` raw bytes from the sensor
    ///
    /// A single byte is read with a byte read, anything longer with one multi-byte read.
    /// The buffer contents are unspecified if an error is returned.
    ///
    /// # Arguments
    /// * `buffer` - The buffer to fill, must not be empty
    pub fn read_raw(&mut self, buffer: &mut [u8]) -> Result<(), BH1750Error<T::Error>> {
        if buffer.is_empty() {
            return Err(BH1750Error::InvalidReadLength(0));
        }
        let channel = self.channel.as_ref().ok_or(BH1750Error::ChannelClosed)?;

        if buffer.len() == 1 {
            buffer[0] = self.transport.read_byte(channel).map_err(BH1750Error::Transport)?;
        } else {
            self.transport.read_bytes(channel, buffer).map_err(BH1750Error::Transport)?;
        }
        trace!("bh1750: read {:02x?}", buffer);

        return Ok(());
    }

    /// Gets the current measurement from the sensor in lux
    ///
    /// This function is blocking, it waits for the settling time before reading the result register.
    /// It does not trigger a measurement: in a one-shot mode the mode has to be commanded again beforehand.
    pub fn get_brightness(&mut self) -> Result<f64, BH1750Error<T::Error>> {
        self.delay.delay_ms(SETTLING_TIME_MS);
        let mut data: [u8; 2] = [0; 2];
        self.read_raw(&mut data)?;
        return Ok(convert(&data));
    }

    /// Closes the channel, reporting a failure to do so
    ///
    /// Dropping the driver closes the channel as well, but ignores errors.
    pub fn close(mut self) -> Result<(), BH1750Error<T::Error>> {
        return match self.channel.take() {
            Some(channel) => self.transport.close_channel(channel).map_err(BH1750Error::Transport),
            None => Ok(()),
        };
    }

    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    fn send_instruction(&mut self, instr: u8) -> Result<(), BH1750Error<T::Error>> {
        let channel = self.channel.as_ref().ok_or(BH1750Error::ChannelClosed)?;
        trace!("bh1750: instruction {:#04x}", instr);
        self.transport.write_byte(channel, instr).map_err(BH1750Error::Transport)?;
        return Ok(());
    }
}

impl<T: BusTransport, DELAY> BH1750<T, DELAY> {
    fn release_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(err) = self.transport.close_channel(channel) {
                warn!("bh1750: failed to close channel: {:?}", err);
            }
        }
    }
}

impl<T: BusTransport, DELAY> Drop for BH1750<T, DELAY> {
    fn drop(&mut self) {
        self.release_channel();
    }
}
