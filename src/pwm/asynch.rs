//! Non-blocking PCA9685 channel driver.
//!
//! Mirror of [`Pca9685`](super::driver::Pca9685) over the `embedded-hal-async`
//! traits. All register computation is shared with the blocking driver
//! through the pure [`registers`](super::registers) codec; only the
//! suspension points differ. Awaiting each transaction in turn preserves the
//! write order the chip requires.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::error::{Error, Result};

use super::driver::DEFAULT_ADDRESS;
use super::registers::{self, bits, Channel};

const OSCILLATOR_SETTLE_MS: u32 = 5;

/// Non-blocking driver for one PCA9685 chip.
pub struct Pca9685Async<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D, E> Pca9685Async<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    /// Create a driver at the default HAT address.
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
    pub async fn init(&mut self) -> Result<(), E> {
        self.set_all_channels_duty(0, 0).await?;
        self.write_register(registers::MODE2, bits::OUTDRV).await?;
        self.write_register(registers::MODE1, bits::ALLCALL).await?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS).await;

        let mode1 = self.read_register(registers::MODE1).await?;
        self.write_register(registers::MODE1, mode1 & !bits::SLEEP)
            .await?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS).await;
        Ok(())
    }

    /// Set the chip-wide PWM frequency in Hz (datasheet sleep/prescale/wake
    /// sequence, same as the blocking driver).
    pub async fn set_frequency(&mut self, freq_hz: f32) -> Result<(), E> {
        let prescale = registers::prescale_from_frequency(freq_hz)?;

        let mode1 = self.read_register(registers::MODE1).await?;
        let sleeping = (mode1 & !bits::RESTART) | bits::SLEEP;
        self.write_register(registers::MODE1, sleeping).await?;
        self.write_register(registers::PRESCALE, prescale).await?;
        self.write_register(registers::MODE1, mode1).await?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS).await;
        self.write_register(registers::MODE1, mode1 | bits::RESTART)
            .await?;
        Ok(())
    }

    /// Read back the frequency currently programmed into the prescaler.
    pub async fn frequency(&mut self) -> Result<f32, E> {
        let prescale = self.read_register(registers::PRESCALE).await?;
        Ok(registers::frequency_from_prescale(prescale))
    }

    /// Program one channel's on/off counts (four ordered register writes).
    pub async fn set_channel_duty(
        &mut self,
        channel: Channel,
        on: u16,
        off: u16,
    ) -> Result<(), E> {
        let writes = registers::channel_duty_writes(channel, on, off)?;
        for (reg, value) in writes {
            self.write_register(reg, value).await?;
        }
        Ok(())
    }

    /// Program every channel at once through the broadcast registers.
    pub async fn set_all_channels_duty(&mut self, on: u16, off: u16) -> Result<(), E> {
        let writes = registers::all_channels_duty_writes(on, off)?;
        for (reg, value) in writes {
            self.write_register(reg, value).await?;
        }
        Ok(())
    }

    /// Drive a channel as a digital pin using the full-on / full-off bits.
    pub async fn set_pin(&mut self, channel: Channel, high: bool) -> Result<(), E> {
        let (on, off) = registers::level_counts(high);
        self.set_channel_duty(channel, on, off).await
    }

    /// Send the SWRST byte to the general-call address.
    pub async fn software_reset(&mut self) -> Result<(), E> {
        self.i2c
            .write(registers::GENERAL_CALL, &[registers::SWRST])
            .await
            .map_err(Error::Transport)
    }

    /// Release the bus handle and delay provider.
    pub fn free(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub(crate) async fn pause_us(&mut self, us: u32) {
        self.delay.delay_us(us).await;
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), E> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(Error::Transport)
    }

    async fn read_register(&mut self, register: u8) -> Result<u8, E> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .await
            .map_err(Error::Transport)?;
        Ok(buf[0])
    }
}
