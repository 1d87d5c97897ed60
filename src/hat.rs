//! The HAT aggregate: one PCA9685 plus the motors wired to it.
//!
//! [`MotorHat`] owns the chip driver and the per-motor state, and hands out
//! split borrows so a motor operation and the bus never alias. The driver is
//! the single serialization point for the chip: all motor commands on one
//! HAT funnel through it in call order.

use crate::board::stepper_channels;
use crate::config::{validate_config, HatConfig};
use crate::dc::DcMotor;
use crate::error::{ConfigError, Error};
use crate::pwm::{Channel, Pca9685};
use crate::servo::Servo;
use crate::stepper::Stepper;

/// Stepper slots on the board (two ports per stepper).
pub const MAX_STEPPERS: usize = 2;
/// DC motor slots on the board (one port each).
pub const MAX_DC_MOTORS: usize = 4;
/// Servo slots: one free PWM channel each.
pub const MAX_SERVOS: usize = 16;

/// One motor HAT: a PCA9685 and the motors configured on it.
pub struct MotorHat<I2C, D> {
    pwm: Pca9685<I2C, D>,
    frequency_hz: f32,
    steppers: heapless::Vec<Stepper, MAX_STEPPERS>,
    dc_motors: heapless::Vec<DcMotor, MAX_DC_MOTORS>,
    servos: heapless::Vec<Servo, MAX_SERVOS>,
}

impl<I2C, D, E> MotorHat<I2C, D>
where
    I2C: embedded_hal::i2c::I2c<Error = E>,
    D: embedded_hal::delay::DelayNs,
{
    /// Create an empty HAT at the default address and motor frequency.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            pwm: Pca9685::new(i2c, delay),
            frequency_hz: crate::stepper::DEFAULT_FREQUENCY_HZ,
            steppers: heapless::Vec::new(),
            dc_motors: heapless::Vec::new(),
            servos: heapless::Vec::new(),
        }
    }

    /// Build a fully populated HAT from a validated configuration.
    pub fn from_config(i2c: I2C, delay: D, config: &HatConfig) -> Result<Self, ConfigError> {
        validate_config(config)?;

        let mut hat = Self {
            pwm: Pca9685::with_address(i2c, delay, config.address),
            frequency_hz: config.frequency,
            steppers: heapless::Vec::new(),
            dc_motors: heapless::Vec::new(),
            servos: heapless::Vec::new(),
        };

        for sc in config.steppers.iter() {
            let mut builder = Stepper::builder(stepper_channels(sc.ports[0], sc.ports[1]))
                .style(sc.style)
                .microsteps(sc.microsteps)
                .steps_per_revolution(sc.steps_per_revolution)
                .current(sc.current)
                .frequency(config.frequency);
            if let Some(speed) = sc.speed()? {
                builder = builder.speed(speed);
            }
            let stepper = builder.build()?;
            hat.steppers
                .push(stepper)
                .map_err(|_| ConfigError::TooManySteppers)?;
        }

        for dc in config.dc_motors.iter() {
            let mut motor = DcMotor::new(dc.port.channels());
            motor.set_frequency(config.frequency);
            motor.preset_speed(dc.speed)?;
            hat.dc_motors
                .push(motor)
                .map_err(|_| ConfigError::TooManyDcMotors)?;
        }

        for sc in config.servos.iter() {
            let mut servo = Servo::new(sc.channel);
            servo.calibrate(sc.frequency, sc.min_pulse_ms, sc.max_pulse_ms)?;
            hat.servos
                .push(servo)
                .map_err(|_| ConfigError::TooManyServos)?;
        }

        Ok(hat)
    }

    /// Reset the chip, program the motor carrier frequency, and apply each
    /// DC motor's stored throttle.
    ///
    /// The chip has one prescaler, so servo frame rates are not programmed
    /// here; on a servo-only HAT, call the servo's own `init` instead.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        self.pwm.init()?;
        self.pwm.set_frequency(self.frequency_hz)?;
        for motor in self.dc_motors.iter() {
            motor.apply_speed(&mut self.pwm)?;
        }
        Ok(())
    }

    /// Add a stepper, rejecting channel overlap with motors already present.
    pub fn add_stepper(&mut self, stepper: Stepper) -> Result<usize, ConfigError> {
        self.check_free(&stepper.channels().all())?;
        self.steppers
            .push(stepper)
            .map_err(|_| ConfigError::TooManySteppers)?;
        Ok(self.steppers.len() - 1)
    }

    /// Add a DC motor, rejecting channel overlap.
    pub fn add_dc_motor(&mut self, motor: DcMotor) -> Result<usize, ConfigError> {
        self.check_free(&motor.channels().all())?;
        self.dc_motors
            .push(motor)
            .map_err(|_| ConfigError::TooManyDcMotors)?;
        Ok(self.dc_motors.len() - 1)
    }

    /// Add a servo, rejecting channel overlap.
    pub fn add_servo(&mut self, servo: Servo) -> Result<usize, ConfigError> {
        self.check_free(&[servo.channel()])?;
        self.servos
            .push(servo)
            .map_err(|_| ConfigError::TooManyServos)?;
        Ok(self.servos.len() - 1)
    }

    /// Borrow stepper `index` together with the bus driver.
    pub fn stepper(&mut self, index: usize) -> Option<(&mut Stepper, &mut Pca9685<I2C, D>)> {
        self.steppers.get_mut(index).map(|s| (s, &mut self.pwm))
    }

    /// Borrow DC motor `index` together with the bus driver.
    pub fn dc_motor(&mut self, index: usize) -> Option<(&mut DcMotor, &mut Pca9685<I2C, D>)> {
        self.dc_motors.get_mut(index).map(|m| (m, &mut self.pwm))
    }

    /// Borrow servo `index` together with the bus driver.
    pub fn servo(&mut self, index: usize) -> Option<(&mut Servo, &mut Pca9685<I2C, D>)> {
        self.servos.get_mut(index).map(|s| (s, &mut self.pwm))
    }

    /// Number of configured steppers.
    pub fn stepper_count(&self) -> usize {
        self.steppers.len()
    }

    /// Number of configured DC motors.
    pub fn dc_motor_count(&self) -> usize {
        self.dc_motors.len()
    }

    /// Number of configured servos.
    pub fn servo_count(&self) -> usize {
        self.servos.len()
    }

    /// Direct access to the chip driver.
    pub fn pwm(&mut self) -> &mut Pca9685<I2C, D> {
        &mut self.pwm
    }

    /// Release the bus handle and delay provider.
    pub fn free(self) -> (I2C, D) {
        self.pwm.free()
    }

    fn check_free(&self, wanted: &[Channel]) -> Result<(), ConfigError> {
        let mut in_use = [false; 16];
        for s in self.steppers.iter() {
            for c in s.channels().all() {
                in_use[c.index() as usize] = true;
            }
        }
        for m in self.dc_motors.iter() {
            for c in m.channels().all() {
                in_use[c.index() as usize] = true;
            }
        }
        for s in self.servos.iter() {
            in_use[s.channel().index() as usize] = true;
        }
        for c in wanted {
            if in_use[c.index() as usize] {
                return Err(ConfigError::PinOverlap(c.index()));
            }
        }
        Ok(())
    }
}
