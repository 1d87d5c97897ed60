//! Configuration validation.

use crate::board::{stepper_channels, Port};
use crate::error::{ConfigError, InvalidArgument};

use super::system::{DcMotorConfig, HatConfig, ServoConfig, StepperConfig};

/// Validate a HAT configuration.
///
/// Checks:
/// - Motor parameters are in range (current, throttle, pulse widths)
/// - At most one speed unit per stepper
/// - The chip-wide frequency is a positive number
/// - No two motor definitions claim the same PWM channel
pub fn validate_config(config: &HatConfig) -> Result<(), ConfigError> {
    if !config.frequency.is_finite() || config.frequency <= 0.0 {
        return Err(InvalidArgument::Frequency(config.frequency).into());
    }

    let mut claimed = [false; 16];
    let mut claim = |channel: u8| -> Result<(), ConfigError> {
        let slot = &mut claimed[channel as usize];
        if *slot {
            return Err(ConfigError::PinOverlap(channel));
        }
        *slot = true;
        Ok(())
    };

    for stepper in config.steppers.iter() {
        validate_stepper(stepper)?;
        for channel in stepper_channels(stepper.ports[0], stepper.ports[1]).all() {
            claim(channel.index())?;
        }
    }

    for dc in config.dc_motors.iter() {
        validate_dc(dc)?;
        for channel in dc.port.channels().all() {
            claim(channel.index())?;
        }
    }

    for servo in config.servos.iter() {
        validate_servo(servo)?;
        claim(servo.channel.index())?;
    }

    Ok(())
}

fn validate_stepper(config: &StepperConfig) -> Result<(), ConfigError> {
    let [a, b]: [Port; 2] = config.ports;
    if a == b {
        return Err(ConfigError::PinOverlap(a.channels().pwm.index()));
    }
    if !config.current.is_finite() || config.current <= 0.0 || config.current > 1.0 {
        return Err(InvalidArgument::CurrentScale(config.current).into());
    }
    for speed in [config.pps, config.rpm, config.sps].into_iter().flatten() {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(InvalidArgument::Speed(speed).into());
        }
    }
    config.speed()?;
    Ok(())
}

fn validate_dc(config: &DcMotorConfig) -> Result<(), ConfigError> {
    if !config.speed.is_finite() || !(0.0..=100.0).contains(&config.speed) {
        return Err(InvalidArgument::Throttle(config.speed).into());
    }
    Ok(())
}

fn validate_servo(config: &ServoConfig) -> Result<(), ConfigError> {
    if !config.frequency.is_finite() || config.frequency <= 0.0 {
        return Err(InvalidArgument::Frequency(config.frequency).into());
    }
    if !config.min_pulse_ms.is_finite() || config.min_pulse_ms <= 0.0 {
        return Err(InvalidArgument::PulseWidth(config.min_pulse_ms).into());
    }
    if !config.max_pulse_ms.is_finite() || config.max_pulse_ms <= config.min_pulse_ms {
        return Err(InvalidArgument::PulseWidth(config.max_pulse_ms).into());
    }
    Ok(())
}
