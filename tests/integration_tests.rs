//! Integration tests for the motor-hat library.
//!
//! These tests verify the complete workflow from TOML parsing to register
//! traffic, using a mock I2C bus that checks every byte put on the wire.

use core::time::Duration;

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

use motor_hat::{
    Direction, Error, MotorHat, Pca9685, Port, Speed, Stepper, SteppingStyle,
};

const ADDR: u8 = 0x6F;

// =============================================================================
// Test configuration data
// =============================================================================

const FULL_CONFIG: &str = r#"
frequency = 1600.0

[[stepper]]
ports = ["M1", "M2"]
steps_per_revolution = 200
style = "double"
rpm = 60.0

[[dc]]
port = "M3"
speed = 50.0

[[servo]]
channel = 0
"#;

// =============================================================================
// Wire-level helpers
// =============================================================================

/// The four register writes programming one channel's on/off counts.
fn duty(channel: u8, on: u16, off: u16) -> Vec<I2cTransaction> {
    let base = 0x06 + 4 * channel;
    vec![
        I2cTransaction::write(ADDR, vec![base, (on & 0xFF) as u8]),
        I2cTransaction::write(ADDR, vec![base + 1, (on >> 8) as u8]),
        I2cTransaction::write(ADDR, vec![base + 2, (off & 0xFF) as u8]),
        I2cTransaction::write(ADDR, vec![base + 3, (off >> 8) as u8]),
    ]
}

/// A digital level through the full-on / full-off sentinel counts.
fn pin(channel: u8, high: bool) -> Vec<I2cTransaction> {
    if high {
        duty(channel, 4096, 0)
    } else {
        duty(channel, 0, 4096)
    }
}

/// The chip init sequence: zero all channels, MODE2 totem-pole, MODE1
/// all-call, then wake the oscillator.
fn init_trace() -> Vec<I2cTransaction> {
    let mut t = vec![
        I2cTransaction::write(ADDR, vec![0xFA, 0x00]),
        I2cTransaction::write(ADDR, vec![0xFB, 0x00]),
        I2cTransaction::write(ADDR, vec![0xFC, 0x00]),
        I2cTransaction::write(ADDR, vec![0xFD, 0x00]),
        I2cTransaction::write(ADDR, vec![0x01, 0x04]),
        I2cTransaction::write(ADDR, vec![0x00, 0x01]),
    ];
    t.push(I2cTransaction::write_read(ADDR, vec![0x00], vec![0x01]));
    t.push(I2cTransaction::write(ADDR, vec![0x00, 0x01]));
    t
}

/// The sleep / prescale / wake / restart sequence for one frequency change.
fn frequency_trace(prescale: u8) -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write_read(ADDR, vec![0x00], vec![0x01]),
        I2cTransaction::write(ADDR, vec![0x00, 0x11]),
        I2cTransaction::write(ADDR, vec![0xFE, prescale]),
        I2cTransaction::write(ADDR, vec![0x00, 0x01]),
        I2cTransaction::write(ADDR, vec![0x00, 0x81]),
    ]
}

fn stepper_on_m1_m2() -> Stepper {
    Stepper::builder(motor_hat::stepper_channels(Port::M1, Port::M2))
        .build()
        .unwrap()
}

// =============================================================================
// Chip-level traces
// =============================================================================

#[test]
fn init_follows_the_datasheet_sequence() {
    let i2c = I2cMock::new(&init_trace());
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    pwm.init().unwrap();
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

#[test]
fn set_frequency_sleeps_before_touching_the_prescaler() {
    // 1600 Hz -> prescale 3.
    let i2c = I2cMock::new(&frequency_trace(3));
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    pwm.set_frequency(1600.0).unwrap();
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

#[test]
fn transport_errors_surface_unchanged() {
    use embedded_hal::i2c::ErrorKind;
    let expectations =
        [I2cTransaction::write(ADDR, vec![0xFA, 0x00]).with_error(ErrorKind::Other)];
    let i2c = I2cMock::new(&expectations);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let result = pwm.set_all_channels_duty(0, 0);
    assert!(matches!(result, Err(Error::Transport(ErrorKind::Other))));
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

// =============================================================================
// Stepper golden traces
// =============================================================================

/// Four forward double steps on M1+M2 walk coil indices 1, 3, 5, 7. The
/// first pulse writes all six lines; each later pulse only rewrites the two
/// coil lines that flipped.
#[test]
fn four_forward_double_steps_golden_trace() {
    let mut expected = Vec::new();
    // Step 1, coil index 1 = [1, 1, 0, 0]: full trace in line order
    // PWMA, PWMB, AIN2, BIN1, AIN1, BIN2.
    expected.extend(duty(8, 0, 4080));
    expected.extend(duty(13, 0, 4080));
    expected.extend(pin(9, true));
    expected.extend(pin(11, true));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));
    // Step 2, index 3 = [0, 1, 1, 0]: AIN2 drops, AIN1 rises.
    expected.extend(pin(9, false));
    expected.extend(pin(10, true));
    // Step 3, index 5 = [0, 0, 1, 1]: BIN1 drops, BIN2 rises.
    expected.extend(pin(11, false));
    expected.extend(pin(12, true));
    // Step 4, index 7 = [1, 0, 0, 1]: AIN2 rises, AIN1 drops.
    expected.extend(pin(9, true));
    expected.extend(pin(10, false));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    for _ in 0..4 {
        stepper.one_step(&mut pwm, Direction::Forward).unwrap();
    }
    assert_eq!(stepper.phase(), 28);
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

/// Stepping back after stepping forward revisits the same coil pattern, so
/// the reverse pulse writes exactly the two lines the forward pulse flipped.
#[test]
fn backward_step_retraces_the_forward_pattern() {
    let mut expected = Vec::new();
    // Forward to index 1.
    expected.extend(duty(8, 0, 4080));
    expected.extend(duty(13, 0, 4080));
    expected.extend(pin(9, true));
    expected.extend(pin(11, true));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));
    // Forward to index 3.
    expected.extend(pin(9, false));
    expected.extend(pin(10, true));
    // Backward to index 1 again.
    expected.extend(pin(9, true));
    expected.extend(pin(10, false));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    stepper.one_step(&mut pwm, Direction::Forward).unwrap();
    stepper.one_step(&mut pwm, Direction::Forward).unwrap();
    stepper.one_step(&mut pwm, Direction::Backward).unwrap();
    assert_eq!(stepper.phase(), 4);
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

#[test]
fn release_writes_all_six_lines_off() {
    // Fresh stepper: the cache knows nothing, so every line is written.
    let mut expected = Vec::new();
    expected.extend(duty(8, 0, 0));
    expected.extend(duty(13, 0, 0));
    expected.extend(pin(9, false));
    expected.extend(pin(11, false));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    stepper.release(&mut pwm).unwrap();
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

/// Release goes through the same line cache as stepping: after one pulse it
/// clears only the four energized lines, and a second release puts nothing
/// on the bus at all.
#[test]
fn repeated_release_is_suppressed_by_the_line_cache() {
    let mut expected = Vec::new();
    // Forward to coil index 1 = [1, 1, 0, 0].
    expected.extend(duty(8, 0, 4080));
    expected.extend(duty(13, 0, 4080));
    expected.extend(pin(9, true));
    expected.extend(pin(11, true));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));
    // Release: AIN1 and BIN2 are already low and stay untouched.
    expected.extend(duty(8, 0, 0));
    expected.extend(duty(13, 0, 0));
    expected.extend(pin(9, false));
    expected.extend(pin(11, false));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    stepper.one_step(&mut pwm, Direction::Forward).unwrap();
    stepper.release(&mut pwm).unwrap();
    stepper.release(&mut pwm).unwrap();
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

/// A runtime frequency change retunes the shared prescaler and is remembered
/// by the stepper.
#[test]
fn set_frequency_retunes_the_running_stepper() {
    // 50 Hz -> prescale 121.
    let i2c = I2cMock::new(&frequency_trace(121));
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    assert_eq!(stepper.frequency_hz(), 1600.0);
    stepper.set_frequency(&mut pwm, 50.0).unwrap();
    assert_eq!(stepper.frequency_hz(), 50.0);
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

#[test]
fn multi_step_without_a_speed_is_rejected_before_the_bus() {
    let i2c = I2cMock::new(&[]);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    let clock = || Duration::ZERO;
    let result = stepper.step(&mut pwm, &clock, Direction::Forward, 10);
    assert!(matches!(result, Err(Error::SpeedNotConfigured)));
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

#[test]
fn paced_motion_reports_its_step_count_and_direction() {
    // Same wire trace as the golden test; the clock never advances, so the
    // sequencer sleeps through its delay provider (a no-op here).
    let mut expected = Vec::new();
    expected.extend(duty(8, 0, 4080));
    expected.extend(duty(13, 0, 4080));
    expected.extend(pin(9, true));
    expected.extend(pin(11, true));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));
    expected.extend(pin(9, false));
    expected.extend(pin(10, true));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685::new(i2c, NoopDelay);
    let mut stepper = Stepper::builder(motor_hat::stepper_channels(Port::M1, Port::M2))
        .speed(Speed::Pps(1000.0))
        .build()
        .unwrap();
    let clock = || Duration::ZERO;
    let outcome = stepper
        .step(&mut pwm, &clock, Direction::Forward, 2)
        .unwrap();
    assert_eq!(outcome.steps, 2);
    assert_eq!(outcome.direction, Direction::Forward);
    assert_eq!(outcome.retried, 0);
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

/// A style change re-derives geometry-dependent speeds so the shaft rate is
/// preserved across the switch.
#[test]
fn style_change_rederives_the_pulse_rate() {
    let mut stepper = Stepper::builder(motor_hat::stepper_channels(Port::M1, Port::M2))
        .style(SteppingStyle::Microstep)
        .speed(Speed::Rpm(10.0))
        .build()
        .unwrap();
    let hz_micro = stepper.timing().unwrap().pulse_hz();
    stepper.set_style(SteppingStyle::Double).unwrap();
    let hz_double = stepper.timing().unwrap().pulse_hz();
    // 8 microsteps: the microstep rate is 16x the full-step rate.
    assert_eq!(hz_micro, hz_double * 16.0);
}

// =============================================================================
// Full-stack: TOML -> HAT -> wire
// =============================================================================

#[test]
fn config_to_first_step_full_trace() {
    let config = motor_hat::config::parse_config(FULL_CONFIG).unwrap();

    let mut expected = init_trace();
    // MotorHat::init: chip init, motor frequency, stored DC throttle.
    expected.extend(frequency_trace(3));
    expected.extend(duty(2, 0, 2040)); // M3 PWM at 50 %
    // First forward double step on the stepper.
    expected.extend(duty(8, 0, 4080));
    expected.extend(duty(13, 0, 4080));
    expected.extend(pin(9, true));
    expected.extend(pin(11, true));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));

    let i2c = I2cMock::new(&expected);
    let mut hat = MotorHat::from_config(i2c, NoopDelay, &config).unwrap();
    hat.init().unwrap();

    let (stepper, pwm) = hat.stepper(0).unwrap();
    // rpm 60 at 200 steps/rev = 200 pulses/s in double style.
    assert_eq!(stepper.timing().unwrap().pulse_hz(), 200.0);
    stepper.one_step(pwm, Direction::Forward).unwrap();

    let (mut i2c, _) = hat.free();
    i2c.done();
}
