//! Brightness classification and the polling loop.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::transport::BusTransport;
use crate::{BH1750, BH1750Error, Config};

/// Brightness band of an illuminance value
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Brightness {
    TooDark,   // up to 10 lx
    Dark,      // up to 25 lx
    Medium,    // up to 45 lx
    Bright,    // up to 60 lx
    TooBright, // above 60 lx
}

impl Brightness {
    pub const fn label(&self) -> &'static str {
        match self {
            Brightness::TooDark => "too dark",
            Brightness::Dark => "dark",
            Brightness::Medium => "medium",
            Brightness::Bright => "bright",
            Brightness::TooBright => "too bright",
        }
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps an illuminance in lux to its band, each upper bound belongs to the band below it
pub fn classify(lux: f64) -> Brightness {
    if lux <= 10.0 {
        Brightness::TooDark
    } else if lux <= 25.0 {
        Brightness::Dark
    } else if lux <= 45.0 {
        Brightness::Medium
    } else if lux <= 60.0 {
        Brightness::Bright
    } else {
        Brightness::TooBright
    }
}

/// A single classified sample
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Reading {
    pub lux: f64,
    pub brightness: Brightness,
}

/// Polls a [`BH1750`] on a fixed interval
///
/// The sensor is expected to be in a continuous mode, which it is right after creation.
pub struct Monitor<T: BusTransport, DELAY> {
    sensor: BH1750<T, DELAY>,
    poll_interval_ms: u32,
}

impl<T: BusTransport, DELAY: DelayNs> Monitor<T, DELAY> {
    /// # Arguments
    /// * `sensor` - The sensor to poll
    /// * `poll_interval_ms` - Time to wait between two samples, on top of the sensor's settling time
    pub fn new(sensor: BH1750<T, DELAY>, poll_interval_ms: u32) -> Self {
        return Self { sensor, poll_interval_ms };
    }

    /// Creates the sensor and the monitor from a [`Config`]
    pub fn from_config(transport: T, delay: DELAY, config: &Config) -> Result<Self, BH1750Error<T::Error>> {
        let sensor = BH1750::from_config(transport, delay, config)?;
        return Ok(Self::new(sensor, config.poll_interval_ms));
    }

    pub fn sensor(&mut self) -> &mut BH1750<T, DELAY> {
        return &mut self.sensor;
    }

    pub fn into_inner(self) -> BH1750<T, DELAY> {
        return self.sensor;
    }

    /// Takes one measurement and classifies it
    pub fn poll_once(&mut self) -> Result<Reading, BH1750Error<T::Error>> {
        let lux = self.sensor.get_brightness()?;
        let brightness = classify(lux);
        info!("bh1750: {:.2} lx ({})", lux, brightness);
        return Ok(Reading { lux, brightness });
    }

    /// Polls until the sensor fails, handing every reading to `sink`
    ///
    /// Returns the error that stopped the loop; whether it is fatal is up to the caller.
    pub fn run<F: FnMut(Reading)>(&mut self, mut sink: F) -> BH1750Error<T::Error> {
        loop {
            match self.poll_once() {
                Ok(reading) => sink(reading),
                Err(err) => {
                    error!("bh1750: polling stopped: {}", err);
                    return err;
                }
            }
            self.sensor.delay_ms(self.poll_interval_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::hal::{HalError, HalTransport};
    use crate::tests::RecordingDelay;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use std::vec;
    use std::vec::Vec;

    #[test]
    fn classification_bounds() {
        assert_eq!(classify(0.0), Brightness::TooDark);
        assert_eq!(classify(10.0), Brightness::TooDark);
        assert_eq!(classify(10.0001), Brightness::Dark);
        assert_eq!(classify(25.0), Brightness::Dark);
        assert_eq!(classify(25.5), Brightness::Medium);
        assert_eq!(classify(45.0), Brightness::Medium);
        assert_eq!(classify(50.0), Brightness::Bright);
        assert_eq!(classify(60.0), Brightness::Bright);
        assert_eq!(classify(60.0001), Brightness::TooBright);
        assert_eq!(classify(54612.5), Brightness::TooBright);
    }

    #[test]
    fn labels() {
        assert_eq!(Brightness::TooDark.label(), "too dark");
        assert_eq!(std::format!("{}", Brightness::TooBright), "too bright");
    }

    #[test]
    fn polls_until_bus_fails() {
        let expectations = [
            I2cTransaction::write(0x23, vec![0x10]),
            I2cTransaction::read(0x23, vec![0x00, 0x0b]),
            I2cTransaction::read(0x23, vec![0x00, 0x3c]),
            I2cTransaction::read(0x23, vec![0x00, 0x00]).with_error(ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut pin = PinMock::new(&[PinTransaction::set(State::Low)]);
        let transport = HalTransport::new(1, i2c.clone(), 17, pin.clone());
        let delay = RecordingDelay::default();
        let waited = delay.total_ns.clone();

        let mut monitor = Monitor::from_config(transport, delay, &Config::default()).unwrap();
        let mut readings = Vec::new();
        let err = monitor.run(|reading| readings.push(reading));

        assert!(matches!(err, BH1750Error::Transport(HalError::I2c(ErrorKind::Other))));
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].brightness, Brightness::TooDark); // 11 / 1.2 lx
        assert_eq!(readings[1].brightness, Brightness::Bright); // 60 / 1.2 = 50 lx
        // three settling delays plus two poll intervals
        assert_eq!(waited.get(), (3 * 140 + 2 * 1000) as u64 * 1_000_000);

        drop(monitor);
        i2c.done();
        pin.done();
    }

    #[test]
    fn poll_once_with_high_address() {
        let expectations = [
            I2cTransaction::write(0x5c, vec![0x10]),
            I2cTransaction::read(0x5c, vec![0x00, 0x24]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut pin = PinMock::new(&[PinTransaction::set(State::High)]);
        let transport = HalTransport::new(1, i2c.clone(), 17, pin.clone());
        let sensor = BH1750::new(transport, RecordingDelay::default(), 17, true).unwrap();

        let mut monitor = Monitor::new(sensor, 500);
        let reading = monitor.poll_once().unwrap();

        assert!((reading.lux - 30.0).abs() < 1e-9);
        assert_eq!(reading.brightness, Brightness::Medium);
        assert_eq!(monitor.sensor().address(), 0x5c);

        drop(monitor.into_inner());
        i2c.done();
        pin.done();
    }
}
