//! Hobby servo control over one PCA9685 channel.
//!
//! A servo reads the width of the high pulse, not the duty ratio, so the
//! calibration is expressed in milliseconds of pulse width at the travel
//! endpoints and converted to 12-bit counts at the configured frame rate.

use crate::error::{Error, InvalidArgument};
use crate::pwm::{Channel, Pca9685};

/// Default servo frame rate, in Hz.
pub const DEFAULT_FREQUENCY_HZ: f32 = 50.0;

/// Default pulse width at position 0, in milliseconds.
pub const DEFAULT_MIN_PULSE_MS: f32 = 0.7;

/// Default pulse width at position 100, in milliseconds.
pub const DEFAULT_MAX_PULSE_MS: f32 = 3.2;

/// One hobby servo.
pub struct Servo {
    channel: Channel,
    frequency_hz: f32,
    min_pulse_ms: f32,
    max_pulse_ms: f32,
}

impl Servo {
    /// Create a servo with the conventional 50 Hz / 0.7-3.2 ms calibration.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            min_pulse_ms: DEFAULT_MIN_PULSE_MS,
            max_pulse_ms: DEFAULT_MAX_PULSE_MS,
        }
    }

    /// The channel this servo is attached to.
    #[inline]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Replace the frame rate and travel-endpoint pulse widths.
    ///
    /// Servos vary; sweep the extremes carefully on new hardware before
    /// trusting a calibration.
    pub fn calibrate(
        &mut self,
        frequency_hz: f32,
        min_pulse_ms: f32,
        max_pulse_ms: f32,
    ) -> Result<(), InvalidArgument> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(InvalidArgument::Frequency(frequency_hz));
        }
        if !min_pulse_ms.is_finite() || min_pulse_ms <= 0.0 {
            return Err(InvalidArgument::PulseWidth(min_pulse_ms));
        }
        if !max_pulse_ms.is_finite() || max_pulse_ms <= min_pulse_ms {
            return Err(InvalidArgument::PulseWidth(max_pulse_ms));
        }
        self.frequency_hz = frequency_hz;
        self.min_pulse_ms = min_pulse_ms;
        self.max_pulse_ms = max_pulse_ms;
        Ok(())
    }

    /// Program the frame rate. Shares the chip-wide prescaler, so mixing
    /// servos with 1.6 kHz motor channels on one chip does not work.
    pub fn init<I2C, D, E>(&mut self, pwm: &mut Pca9685<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        pwm.set_frequency(self.frequency_hz)
    }

    /// Move to `position`, a percentage of calibrated travel in `0..=100`.
    pub fn move_to<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685<I2C, D>,
        position: f32,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        if !position.is_finite() || !(0.0..=100.0).contains(&position) {
            return Err(Error::Invalid(InvalidArgument::Position(position)));
        }
        let pulse_ms =
            self.min_pulse_ms + position / 100.0 * (self.max_pulse_ms - self.min_pulse_ms);
        let counts = libm::roundf(pulse_ms * self.frequency_hz * 4096.0 / 1000.0) as u16;
        pwm.set_channel_duty(self.channel, 0, counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x6F;

    fn duty_writes(ch: u8, off: u16) -> [I2cTransaction; 4] {
        let base = 0x06 + 4 * ch;
        [
            I2cTransaction::write(ADDR, vec![base, 0]),
            I2cTransaction::write(ADDR, vec![base + 1, 0]),
            I2cTransaction::write(ADDR, vec![base + 2, (off & 0xFF) as u8]),
            I2cTransaction::write(ADDR, vec![base + 3, (off >> 8) as u8]),
        ]
    }

    #[test]
    fn travel_endpoints_use_calibrated_pulse_widths() {
        // 0.7 ms at 50 Hz = 143.36 counts; 3.2 ms = 655.36.
        let mut expected = Vec::new();
        expected.extend(duty_writes(0, 143));
        expected.extend(duty_writes(0, 655));
        let i2c = I2cMock::new(&expected);
        let mut pwm = Pca9685::new(i2c, NoopDelay);
        let mut servo = Servo::new(Channel::new(0).unwrap());
        servo.move_to(&mut pwm, 0.0).unwrap();
        servo.move_to(&mut pwm, 100.0).unwrap();
        let (mut i2c, _) = pwm.free();
        i2c.done();
    }

    #[test]
    fn midpoint_interpolates_linearly() {
        // 0.7 + 0.5 * 2.5 = 1.95 ms -> 399.36 counts.
        let i2c = I2cMock::new(&duty_writes(3, 399));
        let mut pwm = Pca9685::new(i2c, NoopDelay);
        let mut servo = Servo::new(Channel::new(3).unwrap());
        servo.move_to(&mut pwm, 50.0).unwrap();
        let (mut i2c, _) = pwm.free();
        i2c.done();
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let i2c = I2cMock::new(&[]);
        let mut pwm = Pca9685::new(i2c, NoopDelay);
        let mut servo = Servo::new(Channel::new(0).unwrap());
        for bad in [-0.1f32, 100.1, f32::NAN] {
            assert!(servo.move_to(&mut pwm, bad).is_err(), "{} accepted", bad);
        }
        let (mut i2c, _) = pwm.free();
        i2c.done();
    }

    #[test]
    fn calibration_rejects_inverted_endpoints() {
        let mut servo = Servo::new(Channel::new(0).unwrap());
        assert_eq!(
            servo.calibrate(50.0, 2.0, 1.0),
            Err(InvalidArgument::PulseWidth(1.0))
        );
        assert_eq!(
            servo.calibrate(0.0, 0.7, 3.2),
            Err(InvalidArgument::Frequency(0.0))
        );
        assert!(servo.calibrate(60.0, 1.0, 2.0).is_ok());
    }
}
