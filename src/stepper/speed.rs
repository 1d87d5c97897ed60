//! Speed units and pulse timing derivation.
//!
//! A stepper's speed can be given in three units; all of them reduce to a
//! pulse frequency, the rate of individual step calls. Styles that subdivide
//! steps (interleaved halves them, microstep slices them `microsteps` ways)
//! need proportionally more pulses to hold the same shaft speed, so the
//! derivation folds the style multipliers in.

use serde::Deserialize;

use crate::error::InvalidArgument;

use super::pattern::{Microsteps, SteppingStyle};

/// A declared motor speed, in one of the supported units.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// Pulses per second: raw step-call rate, style-independent.
    Pps(f32),
    /// Revolutions per minute of the output shaft.
    Rpm(f32),
    /// Full steps per second of the output shaft.
    Sps(f32),
}

impl Speed {
    fn value(self) -> f32 {
        match self {
            Speed::Pps(v) | Speed::Rpm(v) | Speed::Sps(v) => v,
        }
    }

    /// Whether the pulse rate depends on style, microsteps, or the
    /// steps-per-revolution count. Pulse rates are declared directly and
    /// never re-derived.
    pub(crate) fn is_geometry_dependent(self) -> bool {
        !matches!(self, Speed::Pps(_))
    }

    /// Reduce this speed to concrete pulse timing for the given stepping
    /// geometry.
    pub fn derive(
        self,
        style: SteppingStyle,
        microsteps: Microsteps,
        steps_per_revolution: u16,
    ) -> Result<PulseTiming, InvalidArgument> {
        let value = self.value();
        if !value.is_finite() || value <= 0.0 {
            return Err(InvalidArgument::Speed(value));
        }

        let half_step_multiplier = match style {
            SteppingStyle::Interleaved => 2.0,
            _ => 1.0,
        };
        let micro_step_multiplier = match style {
            SteppingStyle::Microstep => microsteps.value() as f32 * 2.0,
            _ => 1.0,
        };

        let pulse_hz = match self {
            Speed::Pps(pps) => pps,
            Speed::Rpm(rpm) => {
                let step_hz = rpm * steps_per_revolution as f32 / 60.0;
                step_hz * half_step_multiplier * micro_step_multiplier
            }
            Speed::Sps(sps) => sps * half_step_multiplier * micro_step_multiplier,
        };

        Ok(PulseTiming::from_pulse_hz(pulse_hz))
    }
}

/// Concrete pacing for the motion sequencer: one pulse per interval.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseTiming {
    pulse_hz: f32,
    interval_us: u32,
}

impl PulseTiming {
    fn from_pulse_hz(pulse_hz: f32) -> Self {
        let interval_us = libm::roundf(1_000_000.0 / pulse_hz) as u32;
        Self { pulse_hz, interval_us }
    }

    /// Pulse rate in Hz.
    #[inline]
    pub fn pulse_hz(self) -> f32 {
        self.pulse_hz
    }

    /// Interval between pulses in microseconds.
    #[inline]
    pub fn interval_us(self) -> u32 {
        self.interval_us
    }
}
