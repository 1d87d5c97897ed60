//! Stepper driver: channel assignment, lazy line state, and blocking motion.
//!
//! A [`Stepper`] holds no bus handle. It owns the motion state (phase, speed,
//! per-line cache) and borrows a [`Pca9685`] for the duration of each
//! command, so several motors can share one chip without wrapper types.

use core::time::Duration;

use crate::clock::SystemClock;
use crate::error::{Error, InvalidArgument};
use crate::pwm::{Channel, Pca9685};

use super::pattern::{Direction, Microsteps, OutputVector, PatternGenerator, SteppingStyle};
use super::speed::{PulseTiming, Speed};

/// Default PWM carrier frequency for stepper windings, in Hz.
pub const DEFAULT_FREQUENCY_HZ: f32 = 1600.0;

/// Default steps per revolution (28BYJ-48 class geared motors).
pub const DEFAULT_STEPS_PER_REVOLUTION: u16 = 2048;

/// The six PCA9685 channels driving one bipolar stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepperChannels {
    /// Winding 1 PWM (speed) channel.
    pub pwm_a: Channel,
    /// Winding 1 direction line 1.
    pub ain1: Channel,
    /// Winding 1 direction line 2.
    pub ain2: Channel,
    /// Winding 2 PWM (speed) channel.
    pub pwm_b: Channel,
    /// Winding 2 direction line 1.
    pub bin1: Channel,
    /// Winding 2 direction line 2.
    pub bin2: Channel,
}

impl StepperChannels {
    /// All six channels in an arbitrary but stable order, for overlap checks.
    pub(crate) fn all(&self) -> [Channel; 6] {
        [
            self.pwm_a, self.ain1, self.ain2, self.pwm_b, self.bin1, self.bin2,
        ]
    }
}

/// One pending bus update for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineWrite {
    /// Program a winding PWM duty (on count stays 0).
    Duty(Channel, u16),
    /// Drive a direction line as a digital level.
    Level(Channel, bool),
}

/// Last value written to each line, `None` until first touched. PWM entries
/// hold the post-current-scaling duty so a current change naturally misses
/// the cache.
#[derive(Debug, Clone, Copy, Default)]
struct LineCache {
    pwm_a: Option<u16>,
    pwm_b: Option<u16>,
    ain2: Option<bool>,
    bin1: Option<bool>,
    ain1: Option<bool>,
    bin2: Option<bool>,
}

/// Result of a multi-step motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepOutcome {
    /// Step calls actually performed.
    pub steps: u32,
    /// Direction the motion ran in.
    pub direction: Direction,
    /// Wall time the motion took, in microseconds.
    pub duration_us: u64,
    /// Pulses whose deadline had already passed when their turn came. Always
    /// zero for blocking motion, which waits instead of skipping.
    pub retried: u32,
}

/// Builder for a [`Stepper`].
///
/// Channels are mandatory; everything else has the conventional defaults
/// (double stepping, 8 microsteps, 2048 steps/rev, full current, 1.6 kHz
/// carrier, no speed).
#[derive(Debug, Clone)]
pub struct StepperBuilder {
    channels: StepperChannels,
    style: SteppingStyle,
    microsteps: Microsteps,
    steps_per_revolution: u16,
    current: f32,
    frequency_hz: f32,
    speed: Option<Speed>,
}

impl StepperBuilder {
    /// Start a builder for the given channel assignment.
    pub fn new(channels: StepperChannels) -> Self {
        Self {
            channels,
            style: SteppingStyle::default(),
            microsteps: Microsteps::default(),
            steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
            current: 1.0,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            speed: None,
        }
    }

    /// Stepping style (default double).
    pub fn style(mut self, style: SteppingStyle) -> Self {
        self.style = style;
        self
    }

    /// Microsteps per step (default 8).
    pub fn microsteps(mut self, microsteps: Microsteps) -> Self {
        self.microsteps = microsteps;
        self
    }

    /// Motor geometry: full steps per output revolution (default 2048).
    pub fn steps_per_revolution(mut self, steps: u16) -> Self {
        self.steps_per_revolution = steps;
        self
    }

    /// Current scale factor in `(0, 1]` (default 1.0).
    pub fn current(mut self, current: f32) -> Self {
        self.current = current;
        self
    }

    /// PWM carrier frequency in Hz (default 1600).
    pub fn frequency(mut self, freq_hz: f32) -> Self {
        self.frequency_hz = freq_hz;
        self
    }

    /// Initial speed declaration.
    pub fn speed(mut self, speed: Speed) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Validate and build the stepper.
    pub fn build(self) -> Result<Stepper, InvalidArgument> {
        check_current(self.current)?;
        let timing = match self.speed {
            Some(speed) => Some(speed.derive(
                self.style,
                self.microsteps,
                self.steps_per_revolution,
            )?),
            None => None,
        };
        Ok(Stepper {
            channels: self.channels,
            style: self.style,
            pattern: PatternGenerator::new(self.microsteps),
            steps_per_revolution: self.steps_per_revolution,
            current: self.current,
            frequency_hz: self.frequency_hz,
            speed: self.speed,
            timing,
            cache: LineCache::default(),
        })
    }
}

fn check_current(current: f32) -> Result<(), InvalidArgument> {
    if !current.is_finite() || current <= 0.0 || current > 1.0 {
        return Err(InvalidArgument::CurrentScale(current));
    }
    Ok(())
}

/// One bipolar stepper on six PCA9685 channels.
pub struct Stepper {
    channels: StepperChannels,
    style: SteppingStyle,
    pattern: PatternGenerator,
    steps_per_revolution: u16,
    current: f32,
    frequency_hz: f32,
    speed: Option<Speed>,
    timing: Option<PulseTiming>,
    cache: LineCache,
}

impl Stepper {
    /// Builder entry point.
    pub fn builder(channels: StepperChannels) -> StepperBuilder {
        StepperBuilder::new(channels)
    }

    /// The channel assignment this stepper drives.
    #[inline]
    pub fn channels(&self) -> StepperChannels {
        self.channels
    }

    /// Current stepping style.
    #[inline]
    pub fn style(&self) -> SteppingStyle {
        self.style
    }

    /// Current electrical phase, `0..4 * microsteps`.
    #[inline]
    pub fn phase(&self) -> u16 {
        self.pattern.phase()
    }

    /// The derived pulse timing, if a speed has been declared.
    #[inline]
    pub fn timing(&self) -> Option<PulseTiming> {
        self.timing
    }

    /// Change the stepping style. Geometry-dependent speeds (rpm, sps) are
    /// re-derived; a pps speed keeps its pulse rate.
    pub fn set_style(&mut self, style: SteppingStyle) -> Result<(), InvalidArgument> {
        self.style = style;
        self.rederive_timing()
    }

    /// Change the microstep count; the phase is re-wrapped into the new
    /// range and geometry-dependent speeds re-derived.
    pub fn set_microsteps(&mut self, microsteps: Microsteps) -> Result<(), InvalidArgument> {
        self.pattern.set_microsteps(microsteps);
        self.rederive_timing()
    }

    /// Change the steps-per-revolution geometry.
    pub fn set_steps_per_revolution(&mut self, steps: u16) -> Result<(), InvalidArgument> {
        self.steps_per_revolution = steps;
        self.rederive_timing()
    }

    /// Declare the motor speed. Takes effect on the next motion command.
    pub fn set_speed(&mut self, speed: Speed) -> Result<(), InvalidArgument> {
        self.timing = Some(speed.derive(
            self.style,
            self.pattern.microsteps(),
            self.steps_per_revolution,
        )?);
        self.speed = Some(speed);
        Ok(())
    }

    /// Change the current scale factor, `(0, 1]`.
    ///
    /// The next pulse re-writes any PWM line whose scaled duty changed; the
    /// cache compares scaled values, so no explicit invalidation is needed.
    pub fn set_current(&mut self, current: f32) -> Result<(), InvalidArgument> {
        check_current(current)?;
        self.current = current;
        Ok(())
    }

    /// Configured PWM carrier frequency in Hz.
    #[inline]
    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    /// Record a newly programmed carrier frequency.
    pub(crate) fn store_frequency_hz(&mut self, freq_hz: f32) {
        self.frequency_hz = freq_hz;
    }

    /// Advance the phase one call's worth for the current style.
    pub(crate) fn advance_pattern(&mut self, direction: Direction) -> OutputVector {
        self.pattern.advance(self.style, direction)
    }

    fn rederive_timing(&mut self) -> Result<(), InvalidArgument> {
        if let Some(speed) = self.speed {
            if speed.is_geometry_dependent() {
                self.timing = Some(speed.derive(
                    self.style,
                    self.pattern.microsteps(),
                    self.steps_per_revolution,
                )?);
            }
        }
        Ok(())
    }

    /// Scale a winding duty by the current factor.
    fn scale(&self, duty: u16) -> u16 {
        libm::roundf(duty as f32 * self.current) as u16
    }

    /// Diff an output vector against the line cache and emit writes for the
    /// changed lines only, in the fixed PWMA, PWMB, AIN2, BIN1, AIN1, BIN2
    /// order. The cache is updated as the writes are produced.
    pub(crate) fn pulse_writes(&mut self, vector: OutputVector) -> heapless::Vec<LineWrite, 6> {
        let mut writes = heapless::Vec::new();
        let ch = self.channels;

        let pwm_a = self.scale(vector.pwm_a);
        if self.cache.pwm_a != Some(pwm_a) {
            self.cache.pwm_a = Some(pwm_a);
            let _ = writes.push(LineWrite::Duty(ch.pwm_a, pwm_a));
        }
        let pwm_b = self.scale(vector.pwm_b);
        if self.cache.pwm_b != Some(pwm_b) {
            self.cache.pwm_b = Some(pwm_b);
            let _ = writes.push(LineWrite::Duty(ch.pwm_b, pwm_b));
        }
        if self.cache.ain2 != Some(vector.ain2) {
            self.cache.ain2 = Some(vector.ain2);
            let _ = writes.push(LineWrite::Level(ch.ain2, vector.ain2));
        }
        if self.cache.bin1 != Some(vector.bin1) {
            self.cache.bin1 = Some(vector.bin1);
            let _ = writes.push(LineWrite::Level(ch.bin1, vector.bin1));
        }
        if self.cache.ain1 != Some(vector.ain1) {
            self.cache.ain1 = Some(vector.ain1);
            let _ = writes.push(LineWrite::Level(ch.ain1, vector.ain1));
        }
        if self.cache.bin2 != Some(vector.bin2) {
            self.cache.bin2 = Some(vector.bin2);
            let _ = writes.push(LineWrite::Level(ch.bin2, vector.bin2));
        }

        writes
    }

    /// Writes that clear every line, filtered through the line cache like
    /// any other output. Lines already known to be off are not rewritten,
    /// so a repeated release issues nothing.
    pub(crate) fn release_writes(&mut self) -> heapless::Vec<LineWrite, 6> {
        self.pulse_writes(OutputVector::RELEASED)
    }

    /// The step interval, or the error for motion without a declared speed.
    pub(crate) fn required_timing<E>(&self) -> Result<PulseTiming, Error<E>> {
        self.timing.ok_or(Error::SpeedNotConfigured)
    }

    /// Program the winding PWM carrier frequency. Call once after the chip's
    /// own `init`.
    pub fn init<I2C, D, E>(&mut self, pwm: &mut Pca9685<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        pwm.set_frequency(self.frequency_hz())
    }

    /// Change the winding PWM carrier and program the chip immediately.
    ///
    /// The prescaler is chip-wide, so this retunes every channel on the
    /// shared PCA9685, not just this motor's windings.
    pub fn set_frequency<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685<I2C, D>,
        freq_hz: f32,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        pwm.set_frequency(freq_hz)?;
        self.store_frequency_hz(freq_hz);
        Ok(())
    }

    /// Advance exactly one pulse in `direction` and flush the changed lines.
    ///
    /// Timing-free: pacing is the caller's problem, so no speed needs to be
    /// declared.
    pub fn one_step<I2C, D, E>(
        &mut self,
        pwm: &mut Pca9685<I2C, D>,
        direction: Direction,
    ) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        let vector = self.advance_pattern(direction);
        for write in self.pulse_writes(vector) {
            apply_write(pwm, write)?;
        }
        Ok(())
    }

    /// Run `count` pulses at the declared speed, blocking between pulses.
    ///
    /// Fails with [`Error::SpeedNotConfigured`] when no speed has been
    /// declared. The clock paces against absolute deadlines, so per-pulse
    /// jitter does not accumulate into drift.
    pub fn step<I2C, D, E, C>(
        &mut self,
        pwm: &mut Pca9685<I2C, D>,
        clock: &C,
        direction: Direction,
        count: u32,
    ) -> Result<StepOutcome, Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
        C: SystemClock,
    {
        let timing = self.required_timing()?;
        let interval = Duration::from_micros(timing.interval_us() as u64);

        let start = clock.elapsed();
        let mut deadline = start;
        for _ in 0..count {
            self.one_step(pwm, direction)?;
            deadline += interval;
            let now = clock.elapsed();
            if now < deadline {
                let wait = deadline - now;
                pwm.pause_us(wait.as_micros() as u32);
            }
        }
        let duration = clock.elapsed() - start;

        Ok(StepOutcome {
            steps: count,
            direction,
            duration_us: duration.as_micros() as u64,
            retried: 0,
        })
    }

    /// De-energize both windings so the shaft spins freely.
    ///
    /// Goes through the line cache, so only lines not already off are
    /// written.
    pub fn release<I2C, D, E>(&mut self, pwm: &mut Pca9685<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: embedded_hal::i2c::I2c<Error = E>,
        D: embedded_hal::delay::DelayNs,
    {
        for write in self.release_writes() {
            apply_write(pwm, write)?;
        }
        Ok(())
    }
}

pub(crate) fn apply_write<I2C, D, E>(
    pwm: &mut Pca9685<I2C, D>,
    write: LineWrite,
) -> Result<(), Error<E>>
where
    I2C: embedded_hal::i2c::I2c<Error = E>,
    D: embedded_hal::delay::DelayNs,
{
    match write {
        LineWrite::Duty(channel, duty) => pwm.set_channel_duty(channel, 0, duty),
        LineWrite::Level(channel, level) => pwm.set_pin(channel, level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> StepperChannels {
        StepperChannels {
            pwm_a: Channel::new(8).unwrap(),
            ain2: Channel::new(9).unwrap(),
            ain1: Channel::new(10).unwrap(),
            pwm_b: Channel::new(13).unwrap(),
            bin2: Channel::new(12).unwrap(),
            bin1: Channel::new(11).unwrap(),
        }
    }

    fn stepper() -> Stepper {
        Stepper::builder(channels()).build().unwrap()
    }

    #[test]
    fn builder_rejects_bad_current() {
        for bad in [0.0f32, -0.5, 1.5, f32::NAN] {
            let result = Stepper::builder(channels()).current(bad).build();
            assert!(result.is_err(), "{} accepted", bad);
        }
        assert!(Stepper::builder(channels()).current(0.5).build().is_ok());
    }

    #[test]
    fn first_pulse_writes_every_line() {
        let mut s = stepper();
        let vector = s.pattern.advance(s.style, Direction::Forward);
        let writes = s.pulse_writes(vector);
        assert_eq!(writes.len(), 6);
        // Fixed order: PWMA, PWMB, AIN2, BIN1, AIN1, BIN2.
        assert_eq!(writes[0], LineWrite::Duty(Channel::new(8).unwrap(), 4080));
        assert_eq!(writes[1], LineWrite::Duty(Channel::new(13).unwrap(), 4080));
        assert_eq!(writes[2], LineWrite::Level(Channel::new(9).unwrap(), true));
        assert_eq!(writes[3], LineWrite::Level(Channel::new(11).unwrap(), true));
        assert_eq!(writes[4], LineWrite::Level(Channel::new(10).unwrap(), false));
        assert_eq!(writes[5], LineWrite::Level(Channel::new(12).unwrap(), false));
    }

    #[test]
    fn unchanged_lines_are_suppressed() {
        let mut s = stepper();
        let v = s.pattern.advance(s.style, Direction::Forward);
        let _ = s.pulse_writes(v);

        // Double style index 1 -> 3: PWMs stay at full, AIN2 drops, AIN1
        // rises, winding 2 lines are unchanged.
        let v = s.pattern.advance(s.style, Direction::Forward);
        let writes = s.pulse_writes(v);
        assert_eq!(
            writes.as_slice(),
            &[
                LineWrite::Level(Channel::new(9).unwrap(), false),
                LineWrite::Level(Channel::new(10).unwrap(), true),
            ]
        );
    }

    #[test]
    fn identical_vector_writes_nothing() {
        let mut s = stepper();
        let v = s.pattern.advance(s.style, Direction::Forward);
        let _ = s.pulse_writes(v);
        let writes = s.pulse_writes(v);
        assert!(writes.is_empty());
    }

    #[test]
    fn current_scaling_applies_to_pwm_lines_only() {
        let mut s = Stepper::builder(channels()).current(0.5).build().unwrap();
        let v = s.pattern.advance(s.style, Direction::Forward);
        let writes = s.pulse_writes(v);
        assert_eq!(writes[0], LineWrite::Duty(Channel::new(8).unwrap(), 2040));
        assert_eq!(writes[1], LineWrite::Duty(Channel::new(13).unwrap(), 2040));
        assert_eq!(writes[2], LineWrite::Level(Channel::new(9).unwrap(), true));
    }

    #[test]
    fn current_change_misses_the_cache() {
        let mut s = stepper();
        let v = s.pattern.advance(s.style, Direction::Forward);
        let _ = s.pulse_writes(v);

        s.set_current(0.25).unwrap();
        let writes = s.pulse_writes(v);
        assert_eq!(
            writes.as_slice(),
            &[
                LineWrite::Duty(Channel::new(8).unwrap(), 1020),
                LineWrite::Duty(Channel::new(13).unwrap(), 1020),
            ]
        );
    }

    #[test]
    fn release_goes_through_the_line_cache() {
        let mut s = stepper();
        let v = s.pattern.advance(s.style, Direction::Forward);
        let _ = s.pulse_writes(v);

        // Coil index 1 left AIN1 and BIN2 low, so clearing only touches the
        // four energized lines.
        let writes = s.release_writes();
        assert_eq!(
            writes.as_slice(),
            &[
                LineWrite::Duty(Channel::new(8).unwrap(), 0),
                LineWrite::Duty(Channel::new(13).unwrap(), 0),
                LineWrite::Level(Channel::new(9).unwrap(), false),
                LineWrite::Level(Channel::new(11).unwrap(), false),
            ]
        );

        // Everything is off now; a second release has nothing to do.
        let writes = s.release_writes();
        assert!(writes.is_empty());
    }

    #[test]
    fn geometry_change_rederives_rpm_but_not_pps() {
        let mut rpm = Stepper::builder(channels())
            .steps_per_revolution(200)
            .speed(Speed::Rpm(60.0))
            .build()
            .unwrap();
        assert_eq!(rpm.timing().unwrap().pulse_hz(), 200.0);
        rpm.set_style(SteppingStyle::Interleaved).unwrap();
        assert_eq!(rpm.timing().unwrap().pulse_hz(), 400.0);
        rpm.set_steps_per_revolution(400).unwrap();
        assert_eq!(rpm.timing().unwrap().pulse_hz(), 800.0);

        let mut pps = Stepper::builder(channels())
            .speed(Speed::Pps(100.0))
            .build()
            .unwrap();
        pps.set_style(SteppingStyle::Interleaved).unwrap();
        assert_eq!(pps.timing().unwrap().pulse_hz(), 100.0);
    }

    #[test]
    fn multi_step_requires_a_speed() {
        let s = stepper();
        let result: Result<PulseTiming, Error<()>> = s.required_timing();
        assert!(matches!(result, Err(Error::SpeedNotConfigured)));
    }

    #[test]
    fn microstep_change_rewraps_phase() {
        let mut s = Stepper::builder(channels())
            .microsteps(Microsteps::SIXTEEN)
            .build()
            .unwrap();
        // Walk backward to phase 56 in the 0..64 range, then shrink it.
        let v = s.pattern.advance(s.style, Direction::Backward);
        let _ = s.pulse_writes(v);
        assert_eq!(s.phase(), 56);
        s.set_microsteps(Microsteps::EIGHT).unwrap();
        assert_eq!(s.phase(), 24);
    }
}
