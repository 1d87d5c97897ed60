//! PWM layer: PCA9685 register codec and channel drivers.

pub mod driver;
pub mod registers;

#[cfg(feature = "async")]
pub mod asynch;

pub use driver::{Pca9685, DEFAULT_ADDRESS};
pub use registers::Channel;

#[cfg(feature = "async")]
pub use asynch::Pca9685Async;
