//! Blocking PCA9685 channel driver.
//!
//! Owns the injected I2C bus handle and a delay provider. One `Pca9685` is
//! the single serialization point for a physical chip: every motor commanding
//! that chip borrows this driver for the duration of each operation, so
//! register sequences that the datasheet requires to be ordered (sleep /
//! prescale / wake) can never interleave.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::{Error, Result};

use super::registers::{self, bits, Channel};

/// Default I2C address of the HAT's PCA9685.
pub const DEFAULT_ADDRESS: u8 = 0x6F;

/// Milliseconds to wait for the on-chip oscillator to stabilize.
const OSCILLATOR_SETTLE_MS: u32 = 5;

/// Blocking driver for one PCA9685 chip.
pub struct Pca9685<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D, E> Pca9685<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    /// Create a driver at the default HAT address.
    ///
    /// [`init`](Self::init) must be called before any other operation.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    /// Create a driver at a specific chip address.
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self { i2c, delay, address }
    }

    /// The chip address this driver talks to.
    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Reset the chip into a known state and wake the oscillator.
    ///
    /// Zeroes every channel, configures totem-pole outputs and all-call
    /// addressing, then clears the sleep bit and waits for the oscillator.
    pub fn init(&mut self) -> Result<(), E> {
        self.set_all_channels_duty(0, 0)?;
        self.write_register(registers::MODE2, bits::OUTDRV)?;
        self.write_register(registers::MODE1, bits::ALLCALL)?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS);

        let mode1 = self.read_register(registers::MODE1)?;
        self.write_register(registers::MODE1, mode1 & !bits::SLEEP)?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS);
        Ok(())
    }

    /// Set the chip-wide PWM frequency in Hz.
    ///
    /// The prescale register can only be written while the oscillator is
    /// stopped, so this follows the datasheet sequence: sleep, write
    /// prescale, restore MODE1, wait, restart. The write order is a chip
    /// requirement, not an optimization.
    pub fn set_frequency(&mut self, freq_hz: f32) -> Result<(), E> {
        let prescale = registers::prescale_from_frequency(freq_hz)?;

        let mode1 = self.read_register(registers::MODE1)?;
        let sleeping = (mode1 & !bits::RESTART) | bits::SLEEP;
        self.write_register(registers::MODE1, sleeping)?;
        self.write_register(registers::PRESCALE, prescale)?;
        self.write_register(registers::MODE1, mode1)?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS);
        self.write_register(registers::MODE1, mode1 | bits::RESTART)?;
        Ok(())
    }

    /// Read back the frequency currently programmed into the prescaler.
    ///
    /// Exact only up to the 8-bit prescale quantization, so a
    /// `set_frequency` / `frequency` round trip is approximate.
    pub fn frequency(&mut self) -> Result<f32, E> {
        let prescale = self.read_register(registers::PRESCALE)?;
        Ok(registers::frequency_from_prescale(prescale))
    }

    /// Program one channel's on/off counts (four ordered register writes).
    pub fn set_channel_duty(&mut self, channel: Channel, on: u16, off: u16) -> Result<(), E> {
        let writes = registers::channel_duty_writes(channel, on, off)?;
        for (reg, value) in writes {
            self.write_register(reg, value)?;
        }
        Ok(())
    }

    /// Program every channel at once through the broadcast registers.
    pub fn set_all_channels_duty(&mut self, on: u16, off: u16) -> Result<(), E> {
        let writes = registers::all_channels_duty_writes(on, off)?;
        for (reg, value) in writes {
            self.write_register(reg, value)?;
        }
        Ok(())
    }

    /// Drive a channel as a digital pin using the full-on / full-off bits.
    pub fn set_pin(&mut self, channel: Channel, high: bool) -> Result<(), E> {
        let (on, off) = registers::level_counts(high);
        self.set_channel_duty(channel, on, off)
    }

    /// Send the SWRST byte to the general-call address, resetting every
    /// PCA9685 on the bus.
    pub fn software_reset(&mut self) -> Result<(), E> {
        self.i2c
            .write(registers::GENERAL_CALL, &[registers::SWRST])
            .map_err(Error::Transport)
    }

    /// Release the bus handle and delay provider.
    pub fn free(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Sleep helper for the motion sequencer's step pacing.
    pub(crate) fn pause_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), E> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::Transport)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, E> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(Error::Transport)?;
        Ok(buf[0])
    }
}
