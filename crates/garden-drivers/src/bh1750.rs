//! # BH1750 Driver
//!
//! This module provides an asynchronous, architecture-agnostic driver for
//! the BH1750 ambient light sensor, read over the I²C protocol.
//!
//! The lamp regulation loop runs the sensor in continuous mode: it is started
//! once, and every regulation step then reads the last completed conversion
//! from the data register without waiting for a new one.
//!
//! For detailed information and specifications, see the [datasheet](https://www.alldatasheet.com/datasheet-pdf/pdf/338083/ROHM/BH1750FVI.html).

use core::result::Result::{self, Err, Ok};

use embedded_hal_async::i2c::I2c;

// Instruction set architecture opcodes.
const POWER_DOWN: u8 = 0x00;
const POWER_ON: u8 = 0x01;

// Continuous high resolution mode 2: 0.5 lx per count, 120 ms per conversion.
const CONTINUOUS_HIGH_RES_MODE_2: u8 = 0x11;
const LUX_PER_COUNT: f32 = 0.5;

// Manufacturer scaling constant between counts and lux.
const COUNTS_PER_LUX: f32 = 1.2;

/// Errors that may occur while interacting with the BH1750 sensor.
#[derive(Debug, Copy, Clone)]
pub enum Bh1750Error<E> {
    /// I²C bus error.
    ///
    /// A read that does not return both bytes of the data register ends up
    /// here.
    I2c(E),
    /// Continuous measurement not started.
    ///
    /// Occurs when attempting to read a continuous measurement before it has been started.
    ContinuousMeasurementNotStarted,
}

impl<E> From<E> for Bh1750Error<E> {
    fn from(e: E) -> Self {
        Bh1750Error::I2c(e)
    }
}

/// I²C address of the BH1750 sensor.
///
/// The sensor supports two possible addresses depending on how the ADDR pin is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Low: `0x23` when ADDR is connected to GND or floating.
    Low = 0x23,
    /// High: `0x5C` when ADDR is connected to VCC.
    High = 0x5C,
}

impl Address {
    /// Selects the address from the level of the ADDR pin.
    #[must_use]
    #[inline]
    pub const fn from_addr_pin(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// BH1750 driver.
pub struct Bh1750<I2C> {
    i2c: I2C,
    address: Address,
    continuous: bool,
}

impl<I2C, E> Bh1750<I2C>
where
    I2C: I2c<u8, Error = E>,
{
    /// Creates a new [`Bh1750`] driver with the given I²C bus and address.
    #[must_use]
    pub fn new(i2c: I2C, address: Address) -> Self {
        Self {
            i2c,
            address,
            continuous: false,
        }
    }

    /// The I²C address the driver talks to.
    #[must_use]
    #[inline]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Puts the sensor into the `Power On` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I²C bus operation fails.
    pub async fn power_on(&mut self) -> Result<(), Bh1750Error<E>> {
        self.send_instruction(POWER_ON).await
    }

    /// Puts the sensor into the `Power Down` state.
    ///
    /// Any running continuous measurement is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I²C bus operation fails.
    pub async fn power_down(&mut self) -> Result<(), Bh1750Error<E>> {
        self.send_instruction(POWER_DOWN).await?;
        self.continuous = false;

        Ok(())
    }

    /// Starts a continuous measurement in high resolution mode 2.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the configuration instruction via I²C fails.
    pub async fn start_continuous_measurement(&mut self) -> Result<(), Bh1750Error<E>> {
        self.send_instruction(CONTINUOUS_HIGH_RES_MODE_2).await?;
        self.continuous = true;

        Ok(())
    }

    /// Reads the last completed continuous conversion, in lux.
    ///
    /// The call does not wait for a new conversion: between two conversions
    /// the same value is returned.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`Bh1750Error::ContinuousMeasurementNotStarted`] if the caller attempts to read
    ///   before starting continuous mode.
    /// - An I²C error if the two bytes of the data register cannot be read.
    pub async fn latest_measurement(&mut self) -> Result<f32, Bh1750Error<E>> {
        if !self.continuous {
            return Err(Bh1750Error::ContinuousMeasurementNotStarted);
        }

        let raw = self.read_raw().await?;

        Ok(raw_to_lux(raw))
    }

    async fn read_raw(&mut self) -> Result<u16, E> {
        let mut buf = [0u8; 2];
        self.i2c.read(self.address as u8, &mut buf).await?;

        Ok(u16::from_be_bytes(buf))
    }

    #[inline]
    async fn send_instruction(&mut self, instr: u8) -> Result<(), Bh1750Error<E>> {
        self.i2c.write(self.address as u8, &[instr]).await?;

        Ok(())
    }
}

// lux = raw / 1.2 * 0.5, with the default MTreg of 69.
#[inline]
fn raw_to_lux(raw: u16) -> f32 {
    f32::from(raw) / COUNTS_PER_LUX * LUX_PER_COUNT
}
