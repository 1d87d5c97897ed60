//! Brushed DC motor control over three PCA9685 channels.
//!
//! Thin consumer of the PWM layer: one duty channel for speed, two digital
//! lines for direction through the H-bridge. No motion state beyond the
//! declared throttle.

use crate::error::{Error, InvalidArgument};
use crate::pwm::{Channel, Pca9685};
use crate::stepper::Direction;

/// Default PWM carrier frequency for DC motors, in Hz.
pub const DEFAULT_FREQUENCY_HZ: f32 = 1600.0;

/// Full-scale duty for a 100 % throttle (255 * 16).
const FULL_DUTY: f32 = 4080.0;

/// The three PCA9685 channels driving one DC motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DcChannels {
    /// Speed (duty) channel.
    pub pwm: Channel,
    /// H-bridge direction line 1.
    pub in1: Channel,
    /// H-bridge direction line 2.
    pub in2: Channel,
}

impl DcChannels {
    pub(crate) fn all(&self) -> [Channel; 3] {
        [self.pwm, self.in1, self.in2]
    }
}

/// One brushed DC motor.
pub struct DcMotor {
    channels: DcChannels,
    frequency_hz: f32,
    duty: u16,
}

impl DcMotor {
    /// Create a motor at the default carrier frequency and zero throttle.
    pub fn new(channels: DcChannels) -> Self {
        Self {
            channels,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            duty: 0,
        }
    }

    /// The channel assignment this motor drives.
    #[inline]
    pub fn channels(&self) -> DcChannels {
        self.channels
    }

    /// Change the carrier frequency used by [`init`](Self::init).
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency_hz = freq_hz;
    }

    /// Store a throttle without touching the bus; [`init`](Self::init)
    /// applies it.
    pub fn preset_speed(&mut self, percent: f32) -> Result<(), InvalidArgument> {
        self.duty = duty_from_percent(percent)?;
        Ok(())
    }

    /// Program the carrier frequency and apply the stored throttle.
    pub fn init<I2C, D, E>(&mut self, pwm: &mut Pca9685<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        pwm.set_frequency(self.frequency_hz)?;
        self.apply_speed(pwm)
    }

    /// Write the stored throttle to the speed channel.
    pub fn apply_speed<I2C, D, E>(&self, pwm: &mut Pca9685<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        pwm.set_channel_duty(self.channels.pwm, 0, self.duty)
    }

    /// Set the throttle as a percentage of full duty, `0..=100`.
    pub fn set_speed<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685<I2C, D>,
        percent: f32,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        self.duty = duty_from_percent(percent)?;
        pwm.set_channel_duty(self.channels.pwm, 0, self.duty)
    }

    /// Drive in `direction`. Break-before-make: the old direction line drops
    /// before the new one rises, so both H-bridge legs are never high at
    /// once.
    pub fn run<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685<I2C, D>,
        direction: Direction,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        match direction {
            Direction::Forward => {
                pwm.set_pin(self.channels.in2, false)?;
                pwm.set_pin(self.channels.in1, true)
            }
            Direction::Backward => {
                pwm.set_pin(self.channels.in1, false)?;
                pwm.set_pin(self.channels.in2, true)
            }
        }
    }

    /// Drop both direction lines, coasting the motor.
    pub fn stop<I2C, D, E>(&mut self, pwm: &mut Pca9685<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        pwm.set_pin(self.channels.in1, false)?;
        pwm.set_pin(self.channels.in2, false)
    }
}

fn duty_from_percent(percent: f32) -> Result<u16, InvalidArgument> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(InvalidArgument::Throttle(percent));
    }
    Ok(libm::roundf(percent / 100.0 * FULL_DUTY) as u16)
}
