//! Non-blocking motion for [`Stepper`].
//!
//! Same state machine as the blocking methods; only the bus and the waiting
//! differ. The pattern, cache diffing, and speed derivation are shared, so a
//! stepper can move through either driver without re-synchronizing state.

use core::time::Duration;

use crate::clock::SystemClock;
use crate::error::Error;
use crate::pwm::Pca9685Async;

use super::driver::{LineWrite, StepOutcome, Stepper};
use super::pattern::Direction;

impl Stepper {
    /// Program the winding PWM carrier frequency.
    pub async fn init_async<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685Async<I2C, D>,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal_async::i2c::I2c<Error = E>,
        D: embedded_hal_async::delay::DelayNs,
    {
        pwm.set_frequency(self.frequency_hz()).await
    }

    /// Change the winding PWM carrier and program the chip immediately.
    ///
    /// The prescaler is chip-wide, so this retunes every channel on the
    /// shared PCA9685, not just this motor's windings.
    pub async fn set_frequency_async<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685Async<I2C, D>,
        freq_hz: f32,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal_async::i2c::I2c<Error = E>,
        D: embedded_hal_async::delay::DelayNs,
    {
        pwm.set_frequency(freq_hz).await?;
        self.store_frequency_hz(freq_hz);
        Ok(())
    }

    /// Advance exactly one pulse and flush the changed lines.
    pub async fn one_step_async<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685Async<I2C, D>,
        direction: Direction,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal_async::i2c::I2c<Error = E>,
        D: embedded_hal_async::delay::DelayNs,
    {
        let vector = self.advance_pattern(direction);
        for write in self.pulse_writes(vector) {
            apply_write(pwm, write).await?;
        }
        Ok(())
    }

    /// Run `count` pulses at the declared speed.
    ///
    /// Paces against absolute deadlines. A deadline that has already slipped
    /// by a full interval when its turn comes is skipped and counted in
    /// [`StepOutcome::retried`]; the motion still performs `count` pulses,
    /// just later than scheduled.
    pub async fn step_async<I2C, D, E, C>(
        &mut self,
        pwm: &mut Pca9685Async<I2C, D>,
        clock: &C,
        direction: Direction,
        count: u32,
    ) -> Result<StepOutcome, Error<E>>
    where
        I2C: embedded_hal_async::i2c::I2c<Error = E>,
        D: embedded_hal_async::delay::DelayNs,
        C: SystemClock,
    {
        let timing = self.required_timing()?;
        let interval = Duration::from_micros(timing.interval_us() as u64);

        let start = clock.elapsed();
        let mut deadline = start;
        let mut performed = 0u32;
        let mut retried = 0u32;
        while performed < count {
            deadline += interval;
            let now = clock.elapsed();
            if now >= deadline + interval {
                // Deadline already a whole interval stale: let the schedule
                // catch up before pulsing again.
                retried += 1;
                continue;
            }
            if now < deadline {
                pwm.pause_us((deadline - now).as_micros() as u32).await;
            }
            self.one_step_async(pwm, direction).await?;
            performed += 1;
        }
        let duration = clock.elapsed() - start;

        Ok(StepOutcome {
            steps: performed,
            direction,
            duration_us: duration.as_micros() as u64,
            retried,
        })
    }

    /// De-energize both windings so the shaft spins freely.
    pub async fn release_async<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685Async<I2C, D>,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal_async::i2c::I2c<Error = E>,
        D: embedded_hal_async::delay::DelayNs,
    {
        for write in self.release_writes() {
            apply_write(pwm, write).await?;
        }
        Ok(())
    }
}

async fn apply_write<I2C, D, E>(
    pwm: &mut Pca9685Async<I2C, D>,
    write: LineWrite,
) -> Result<(), Error<E>>
where
    I2C: embedded_hal_async::i2c::I2c<Error = E>,
    D: embedded_hal_async::delay::DelayNs,
{
    match write {
        LineWrite::Duty(channel, duty) => pwm.set_channel_duty(channel, 0, duty).await,
        LineWrite::Level(channel, level) => pwm.set_pin(channel, level).await,
    }
}
