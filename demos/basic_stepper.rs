//! Basic stepper control example.
//!
//! Builds one stepper on the M1/M2 ports, runs a paced move in each
//! direction and releases the windings. The I2C bus is a stand-in that
//! prints every transfer, so this runs without hardware.
//!
//! Run with: `cargo run --example basic_stepper`

use motor_hat::{Direction, OperatingSystemClock, Pca9685, Port, Speed, Stepper, SteppingStyle};

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
    println!("=== Basic stepper example ===\n");

    println!("-- chip init --");
    let mut pwm = Pca9685::new(TraceBus, Sleeper);
    pwm.init()?;

    let mut stepper = Stepper::builder(motor_hat::stepper_channels(Port::M1, Port::M2))
        .style(SteppingStyle::Double)
        .steps_per_revolution(200)
        .speed(Speed::Rpm(120.0))
        .build()?;
    println!("\n-- carrier frequency ({} Hz) --", stepper.frequency_hz());
    stepper.init(&mut pwm)?;

    let clock = OperatingSystemClock::new();

    println!("\n-- 8 steps forward --");
    let outcome = stepper.step(&mut pwm, &clock, Direction::Forward, 8)?;
    println!(
        "moved {} steps in {} us, phase {}",
        outcome.steps,
        outcome.duration_us,
        stepper.phase()
    );

    println!("\n-- 8 steps back --");
    let outcome = stepper.step(&mut pwm, &clock, Direction::Backward, 8)?;
    println!(
        "moved {} steps in {} us, phase {}",
        outcome.steps,
        outcome.duration_us,
        stepper.phase()
    );

    println!("\n-- release --");
    stepper.release(&mut pwm)?;

    Ok(())
}
