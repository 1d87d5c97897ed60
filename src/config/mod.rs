//! Configuration module for the motor HAT.
//!
//! Provides types for loading and validating motor definitions from TOML
//! files (with `std` feature) or pre-parsed data.

mod system;
mod validation;

#[cfg(feature = "std")]
mod loader;

pub use system::{DcMotorConfig, HatConfig, ServoConfig, StepperConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};
