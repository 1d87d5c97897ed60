//! Example: configuration-driven motor HAT setup.
//!
//! Parses a TOML description of a full HAT (one stepper, one DC motor, one
//! servo), builds the aggregate from it and exercises each motor. The I2C
//! bus is a stand-in that prints every transfer.
//!
//! Run with: `cargo run --example config_driven`

use motor_hat::{Direction, MotorHat, OperatingSystemClock};

const CONFIG: &str = r#"
frequency = 1600.0

[[stepper]]
ports = ["M1", "M2"]
steps_per_revolution = 200
style = "interleaved"
rpm = 120.0

[[dc]]
port = "M3"
speed = 75.0

[[servo]]
channel = 0
min_pulse_ms = 1.0
max_pulse_ms = 2.0
"#;

/// Stand-in bus that prints every transfer instead of talking to hardware.
struct TraceBus;

impl embedded_hal::i2c::ErrorType for TraceBus {
    type Error = core::convert::Infallible;
}

impl embedded_hal::i2c::I2c for TraceBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                embedded_hal::i2c::Operation::Write(bytes) => {
                    println!("  i2c 0x{address:02X} <- {bytes:02X?}");
                }
                embedded_hal::i2c::Operation::Read(buffer) => {
                    buffer.fill(0);
                    println!("  i2c 0x{address:02X} -> {} byte(s)", buffer.len());
                }
            }
        }
        Ok(())
    }
}

/// Delay provider backed by the OS scheduler.
struct Sleeper;

impl embedded_hal::delay::DelayNs for Sleeper {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns as u64));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Config-driven HAT example ===\n");

    let config = motor_hat::config::parse_config(CONFIG)?;
    let mut hat = MotorHat::from_config(TraceBus, Sleeper, &config)?;
    println!(
        "configured: {} stepper(s), {} dc motor(s), {} servo(s)",
        hat.stepper_count(),
        hat.dc_motor_count(),
        hat.servo_count()
    );

    println!("\n-- hat init --");
    hat.init()?;

    println!("\n-- stepper: 4 steps forward --");
    let clock = OperatingSystemClock::new();
    if let Some((stepper, pwm)) = hat.stepper(0) {
        let outcome = stepper.step(pwm, &clock, Direction::Forward, 4)?;
        println!("moved {} steps in {} us", outcome.steps, outcome.duration_us);
    }

    println!("\n-- dc motor: run forward, then stop --");
    if let Some((dc, pwm)) = hat.dc_motor(0) {
        dc.run(pwm, Direction::Forward)?;
        dc.stop(pwm)?;
    }

    println!("\n-- servo: sweep to mid travel --");
    if let Some((servo, pwm)) = hat.servo(0) {
        servo.move_to(pwm, 50.0)?;
    }

    Ok(())
}
