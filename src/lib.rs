//! # motor-hat
//!
//! PCA9685-based motor HAT driver with embedded-hal 1.0 support: bipolar
//! steppers, brushed DC motors, and hobby servos over one I2C chip.
//!
//! ## Features
//!
//! - **Four stepping styles**: single, double, interleaved, and sinusoidal
//!   microstepping (8 or 16 microsteps per step)
//! - **Lazy register writes**: only lines whose value changed touch the bus,
//!   so a step costs as few I2C transactions as possible
//! - **Configuration-driven**: define the whole HAT in a TOML file
//! - **embedded-hal 1.0**: injected `I2c` bus and `DelayNs` timing, with an
//!   `embedded-hal-async` mirror behind the `async` feature
//! - **no_std compatible**: core library works without the standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use motor_hat::{load_config, Direction, MotorHat, OperatingSystemClock};
//!
//! let config = load_config("hat.toml")?;
//! let mut hat = MotorHat::from_config(i2c, delay, &config)?;
//! hat.init()?;
//!
//! let clock = OperatingSystemClock::new();
//! let (stepper, pwm) = hat.stepper(0).unwrap();
//! stepper.step(pwm, &clock, Direction::Forward, 2048)?;
//! stepper.release(pwm)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O, TOML parsing, and the OS clock
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `async`: Enables the `embedded-hal-async` drivers
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core modules
pub mod board;
pub mod clock;
pub mod config;
pub mod dc;
pub mod error;
pub mod hat;
pub mod pwm;
pub mod servo;
pub mod stepper;

// Re-exports for ergonomic API
pub use board::{stepper_channels, Port};
pub use clock::SystemClock;
pub use config::{validate_config, DcMotorConfig, HatConfig, ServoConfig, StepperConfig};
pub use dc::{DcChannels, DcMotor};
pub use error::{ConfigError, Error, InvalidArgument, Result};
pub use hat::{MotorHat, MAX_DC_MOTORS, MAX_SERVOS, MAX_STEPPERS};
pub use pwm::{Channel, Pca9685, DEFAULT_ADDRESS};
pub use servo::Servo;
pub use stepper::{
    Direction, Microsteps, Speed, StepOutcome, Stepper, StepperBuilder, StepperChannels,
    SteppingStyle,
};

#[cfg(feature = "async")]
pub use pwm::Pca9685Async;

// Configuration loading and OS timing (std only)
#[cfg(feature = "std")]
pub use clock::OperatingSystemClock;
#[cfg(feature = "std")]
pub use config::load_config;
