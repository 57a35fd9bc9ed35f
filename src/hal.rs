//! [`BusTransport`] on top of the `embedded-hal` traits.
//!
//! An `embedded_hal::i2c::I2c` bus addresses every transfer explicitly, so a channel is nothing
//! more than the 7-bit address it was opened for. The ADDR line is a single owned
//! [`OutputPin`], which is already an output by construction.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::i2c::I2c;

use crate::transport::BusTransport;

/// Enum representing the possible errors of the `embedded-hal` transport
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum HalError<I2CError, PinError> {
    /// I²C error
    I2c(I2CError),
    /// Error driving the address pin
    Pin(PinError),
    /// The pin id does not belong to the address pin this transport owns
    UnknownPin(u8),
    /// The bus id does not belong to the bus this transport owns
    UnknownBus(u8),
    /// The address does not fit into 7 bits
    InvalidAddress(u8),
}

/// An open channel on a [`HalTransport`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HalChannel {
    address: u8,
}

impl HalChannel {
    pub fn address(&self) -> u8 {
        return self.address;
    }
}

pub struct HalTransport<I2C, PIN> {
    i2c: I2C,
    pin: PIN,
    bus: u8,
    pin_id: u8,
}

impl<I2C: I2c, PIN: OutputPin> HalTransport<I2C, PIN> {
    /// Create a new transport
    ///
    /// # Arguments
    /// * `bus` - The id the driver uses to refer to this bus
    /// * `i2c` - The I2C bus the sensor is connected to
    /// * `pin_id` - The id the driver uses to refer to the address pin
    /// * `pin` - The output pin wired to the sensor's ADDR input
    pub fn new(bus: u8, i2c: I2C, pin_id: u8, pin: PIN) -> Self {
        return Self { i2c, pin, bus, pin_id };
    }

    /// Releases the I2C bus and the address pin
    pub fn release(self) -> (I2C, PIN) {
        return (self.i2c, self.pin);
    }

    fn check_pin(&self, pin: u8) -> Result<(), HalError<I2C::Error, PIN::Error>> {
        if pin != self.pin_id {
            return Err(HalError::UnknownPin(pin));
        }
        return Ok(());
    }
}

impl<I2C: I2c, PIN: OutputPin> BusTransport for HalTransport<I2C, PIN> {
    type Handle = HalChannel;
    type Error = HalError<I2C::Error, PIN::Error>;

    fn set_pin_output(&mut self, pin: u8) -> Result<(), Self::Error> {
        return self.check_pin(pin);
    }

    fn write_pin(&mut self, pin: u8, level: bool) -> Result<(), Self::Error> {
        self.check_pin(pin)?;
        return self.pin.set_state(PinState::from(level)).map_err(HalError::Pin);
    }

    fn open_channel(&mut self, bus: u8, address: u8, _flags: u32) -> Result<HalChannel, Self::Error> {
        if bus != self.bus {
            return Err(HalError::UnknownBus(bus));
        }
        if address > 0x7f {
            return Err(HalError::InvalidAddress(address));
        }
        return Ok(HalChannel { address });
    }

    fn close_channel(&mut self, _handle: HalChannel) -> Result<(), Self::Error> {
        return Ok(());
    }

    fn write_byte(&mut self, handle: &HalChannel, byte: u8) -> Result<(), Self::Error> {
        return self.i2c.write(handle.address, &[byte]).map_err(HalError::I2c);
    }

    fn read_byte(&mut self, handle: &HalChannel) -> Result<u8, Self::Error> {
        let mut data: [u8; 1] = [0; 1];
        self.i2c.read(handle.address, &mut data).map_err(HalError::I2c)?;
        return Ok(data[0]);
    }

    fn read_bytes(&mut self, handle: &HalChannel, buffer: &mut [u8]) -> Result<(), Self::Error> {
        return self.i2c.read(handle.address, buffer).map_err(HalError::I2c);
    }
}
