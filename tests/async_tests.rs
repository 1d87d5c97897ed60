//! Tests for the non-blocking drivers.
//!
//! The mock I2C bus implements the async HAL traits, so these run the same
//! byte-level checks as the blocking tests, plus the overrun accounting that
//! only exists in the async sequencer.
#![cfg(feature = "async")]

use core::cell::Cell;
use core::time::Duration;

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

use motor_hat::{Direction, Pca9685Async, Port, Speed, Stepper};

const ADDR: u8 = 0x6F;

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

fn stepper_on_m1_m2() -> Stepper {
    Stepper::builder(motor_hat::stepper_channels(Port::M1, Port::M2))
        .build()
        .unwrap()
}

/// A clock that replays a scripted sequence of elapsed times, repeating the
/// last entry once the script runs out.
fn scripted_clock<'a>(times_us: &'a [u64], cursor: &'a Cell<usize>) -> impl Fn() -> Duration + 'a {
    move || {
        let i = cursor.get();
        cursor.set(i + 1);
        Duration::from_micros(times_us[i.min(times_us.len() - 1)])
    }
}

#[tokio::test]
async fn async_init_follows_the_datasheet_sequence() {
    let mut expected = vec![
        I2cTransaction::write(ADDR, vec![0xFA, 0x00]),
        I2cTransaction::write(ADDR, vec![0xFB, 0x00]),
        I2cTransaction::write(ADDR, vec![0xFC, 0x00]),
        I2cTransaction::write(ADDR, vec![0xFD, 0x00]),
        I2cTransaction::write(ADDR, vec![0x01, 0x04]),
        I2cTransaction::write(ADDR, vec![0x00, 0x01]),
    ];
    expected.push(I2cTransaction::write_read(ADDR, vec![0x00], vec![0x01]));
    expected.push(I2cTransaction::write(ADDR, vec![0x00, 0x01]));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685Async::new(i2c, NoopDelay);
    pwm.init().await.unwrap();
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

#[tokio::test]
async fn async_set_frequency_retunes_the_running_stepper() {
    // 50 Hz -> prescale 121.
    let expected = [
        I2cTransaction::write_read(ADDR, vec![0x00], vec![0x01]),
        I2cTransaction::write(ADDR, vec![0x00, 0x11]),
        I2cTransaction::write(ADDR, vec![0xFE, 121]),
        I2cTransaction::write(ADDR, vec![0x00, 0x01]),
        I2cTransaction::write(ADDR, vec![0x00, 0x81]),
    ];
    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685Async::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    stepper.set_frequency_async(&mut pwm, 50.0).await.unwrap();
    assert_eq!(stepper.frequency_hz(), 50.0);
    let (mut i2c, _) = pwm.free();
    i2c.done();
}

/// A deadline that is a whole interval stale when its turn comes is counted
/// as a retry and skipped, and the motion still performs every pulse.
#[tokio::test]
async fn stale_deadline_is_counted_and_the_motion_still_completes() {
    // Two forward double pulses: full first trace, then the two flipped
    // coil lines.
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
    let mut pwm = Pca9685Async::new(i2c, NoopDelay);
    let mut stepper = Stepper::builder(motor_hat::stepper_channels(Port::M1, Port::M2))
        .speed(Speed::Pps(1000.0))
        .build()
        .unwrap();

    // 1000 pps = 1000 us interval. The first tick (deadline 1000) finds the
    // clock already at 2500, past deadline + interval, so it is skipped; the
    // re-armed deadline 2000 is merely late and pulses immediately; the
    // third tick waits out its remaining 100 us.
    let times = [0u64, 2500, 2500, 2900, 3000];
    let cursor = Cell::new(0);
    let clock = scripted_clock(&times, &cursor);

    let outcome = stepper
        .step_async(&mut pwm, &clock, Direction::Forward, 2)
        .await
        .unwrap();
    assert_eq!(outcome.steps, 2);
    assert_eq!(outcome.retried, 1);
    assert_eq!(outcome.direction, Direction::Forward);
    assert_eq!(outcome.duration_us, 3000);

    let (mut i2c, _) = pwm.free();
    i2c.done();
}

/// Async release is filtered through the line cache like every other output.
#[tokio::test]
async fn async_release_after_a_pulse_clears_only_energized_lines() {
    let mut expected = Vec::new();
    // Forward to coil index 1 = [1, 1, 0, 0].
    expected.extend(duty(8, 0, 4080));
    expected.extend(duty(13, 0, 4080));
    expected.extend(pin(9, true));
    expected.extend(pin(11, true));
    expected.extend(pin(10, false));
    expected.extend(pin(12, false));
    // Release: AIN1 and BIN2 are already low.
    expected.extend(duty(8, 0, 0));
    expected.extend(duty(13, 0, 0));
    expected.extend(pin(9, false));
    expected.extend(pin(11, false));

    let i2c = I2cMock::new(&expected);
    let mut pwm = Pca9685Async::new(i2c, NoopDelay);
    let mut stepper = stepper_on_m1_m2();
    stepper
        .one_step_async(&mut pwm, Direction::Forward)
        .await
        .unwrap();
    stepper.release_async(&mut pwm).await.unwrap();
    stepper.release_async(&mut pwm).await.unwrap();
    let (mut i2c, _) = pwm.free();
    i2c.done();
}
