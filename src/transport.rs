//! The bus capability consumed by the driver.
//!
//! A transport owns the two-wire bus and the digital lines next to it. The driver never talks to
//! hardware directly; it acquires a channel handle from the transport, issues commands through it
//! and hands it back when it is done.

use core::fmt::Debug;

/// A two-wire serial bus plus digital pin access
///
/// Channel handles are moved into [`BusTransport::close_channel`], so a handle can only ever be
/// released once.
pub trait BusTransport {
    /// An open channel to a single 7-bit address
    type Handle;
    /// Error reported by every bus or pin operation
    type Error: Debug;

    /// Configures a digital line as an output
    fn set_pin_output(&mut self, pin: u8) -> Result<(), Self::Error>;

    /// Drives a digital line to the given logic level (`true` = high)
    fn write_pin(&mut self, pin: u8, level: bool) -> Result<(), Self::Error>;

    /// Opens a channel to the device at `address` on bus `bus`
    fn open_channel(&mut self, bus: u8, address: u8, flags: u32) -> Result<Self::Handle, Self::Error>;

    /// Releases a channel
    ///
    /// Implementations must not panic here, the driver calls this while unwinding from other
    /// failures.
    fn close_channel(&mut self, handle: Self::Handle) -> Result<(), Self::Error>;

    /// Sends a single command byte without payload
    fn write_byte(&mut self, handle: &Self::Handle, byte: u8) -> Result<(), Self::Error>;

    /// Reads a single byte
    fn read_byte(&mut self, handle: &Self::Handle) -> Result<u8, Self::Error>;

    /// Reads exactly `buffer.len()` bytes
    fn read_bytes(&mut self, handle: &Self::Handle, buffer: &mut [u8]) -> Result<(), Self::Error>;
}
