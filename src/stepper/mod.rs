//! Bipolar stepper motion: pattern generation, speed derivation, and the
//! per-motor driver with its lazy line cache.

pub mod driver;
pub mod pattern;
pub mod speed;

#[cfg(feature = "async")]
mod asynch;

pub use driver::{
    StepOutcome, Stepper, StepperBuilder, StepperChannels, DEFAULT_FREQUENCY_HZ,
    DEFAULT_STEPS_PER_REVOLUTION,
};
pub use pattern::{Direction, Microsteps, OutputVector, SteppingStyle};
pub use speed::{PulseTiming, Speed};
