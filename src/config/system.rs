//! HAT configuration - root configuration structure.

use heapless::Vec;
use serde::Deserialize;

use crate::board::Port;
use crate::error::ConfigError;
use crate::hat::{MAX_DC_MOTORS, MAX_SERVOS, MAX_STEPPERS};
use crate::pwm::{Channel, DEFAULT_ADDRESS};
use crate::servo;
use crate::stepper::{Microsteps, Speed, SteppingStyle, DEFAULT_STEPS_PER_REVOLUTION};

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct HatConfig {
    /// I2C address of the HAT's PCA9685.
    #[serde(default = "default_address")]
    pub address: u8,

    /// Motor PWM carrier frequency in Hz, shared by the whole chip.
    #[serde(default = "default_frequency")]
    pub frequency: f32,

    /// Stepper definitions, one per `[[stepper]]` table.
    #[serde(default, rename = "stepper")]
    pub steppers: Vec<StepperConfig, MAX_STEPPERS>,

    /// DC motor definitions, one per `[[dc]]` table.
    #[serde(default, rename = "dc")]
    pub dc_motors: Vec<DcMotorConfig, MAX_DC_MOTORS>,

    /// Servo definitions, one per `[[servo]]` table.
    #[serde(default, rename = "servo")]
    pub servos: Vec<ServoConfig, MAX_SERVOS>,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            frequency: default_frequency(),
            steppers: Vec::new(),
            dc_motors: Vec::new(),
            servos: Vec::new(),
        }
    }
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_frequency() -> f32 {
    1600.0
}

/// One stepper from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct StepperConfig {
    /// The two ports the windings are wired to, winding 1 first.
    pub ports: [Port; 2],

    /// Full steps per output revolution.
    #[serde(default = "default_steps_per_revolution")]
    pub steps_per_revolution: u16,

    /// Microsteps per step (8 or 16).
    #[serde(default)]
    pub microsteps: Microsteps,

    /// Stepping style.
    #[serde(default)]
    pub style: SteppingStyle,

    /// Current scale factor in `(0, 1]`.
    #[serde(default = "default_current")]
    pub current: f32,

    /// Speed in pulses per second.
    #[serde(default)]
    pub pps: Option<f32>,

    /// Speed in revolutions per minute.
    #[serde(default)]
    pub rpm: Option<f32>,

    /// Speed in full steps per second.
    #[serde(default)]
    pub sps: Option<f32>,
}

fn default_steps_per_revolution() -> u16 {
    DEFAULT_STEPS_PER_REVOLUTION
}

fn default_current() -> f32 {
    1.0
}

impl StepperConfig {
    /// The declared speed, if any. At most one unit may be set.
    pub fn speed(&self) -> Result<Option<Speed>, ConfigError> {
        let mut speed = None;
        for candidate in [
            self.pps.map(Speed::Pps),
            self.rpm.map(Speed::Rpm),
            self.sps.map(Speed::Sps),
        ]
        .into_iter()
        .flatten()
        {
            if speed.is_some() {
                return Err(ConfigError::MultipleSpeeds);
            }
            speed = Some(candidate);
        }
        Ok(speed)
    }
}

/// One DC motor from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct DcMotorConfig {
    /// The port the motor is wired to.
    pub port: Port,

    /// Initial throttle percent, applied at init.
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    100.0
}

/// One servo from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServoConfig {
    /// The PWM channel the servo signal line is wired to.
    pub channel: Channel,

    /// Frame rate in Hz.
    #[serde(default = "default_servo_frequency")]
    pub frequency: f32,

    /// Pulse width at position 0, in milliseconds.
    #[serde(default = "default_min_pulse")]
    pub min_pulse_ms: f32,

    /// Pulse width at position 100, in milliseconds.
    #[serde(default = "default_max_pulse")]
    pub max_pulse_ms: f32,
}

fn default_servo_frequency() -> f32 {
    servo::DEFAULT_FREQUENCY_HZ
}

fn default_min_pulse() -> f32 {
    servo::DEFAULT_MIN_PULSE_MS
}

fn default_max_pulse() -> f32 {
    servo::DEFAULT_MAX_PULSE_MS
}
