//! Board wiring: the fixed mapping from motor ports to PCA9685 channels.
//!
//! The HAT exposes four screw-terminal ports. A DC motor occupies one port;
//! a stepper occupies two (one per winding). The channel assignments are
//! fixed by the board's copper, so they live here as constants rather than
//! in configuration.

use serde::Deserialize;

use crate::dc::DcChannels;
use crate::pwm::Channel;
use crate::stepper::StepperChannels;

/// A motor port on the HAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// Port M1: channels 8 (PWM), 10 (IN1), 9 (IN2).
    M1,
    /// Port M2: channels 13 (PWM), 11 (IN1), 12 (IN2).
    M2,
    /// Port M3: channels 2 (PWM), 4 (IN1), 3 (IN2).
    M3,
    /// Port M4: channels 7 (PWM), 5 (IN1), 6 (IN2).
    M4,
}

impl Port {
    /// The three channels wired to this port.
    pub const fn channels(self) -> DcChannels {
        // (PWM, IN1, IN2) per the board schematic.
        let (pwm, in1, in2) = match self {
            Port::M1 => (8, 10, 9),
            Port::M2 => (13, 11, 12),
            Port::M3 => (2, 4, 3),
            Port::M4 => (7, 5, 6),
        };
        DcChannels {
            pwm: Channel::new_unchecked(pwm),
            in1: Channel::new_unchecked(in1),
            in2: Channel::new_unchecked(in2),
        }
    }
}

/// The channel assignment for a stepper across two ports: `winding_a` drives
/// winding 1, `winding_b` winding 2. The stock wiring is (M1, M2) for
/// stepper 1 and (M3, M4) for stepper 2.
pub const fn stepper_channels(winding_a: Port, winding_b: Port) -> StepperChannels {
    let a = winding_a.channels();
    let b = winding_b.channels();
    StepperChannels {
        pwm_a: a.pwm,
        ain1: a.in1,
        ain2: a.in2,
        pwm_b: b.pwm,
        bin1: b.in1,
        bin2: b.in2,
    }
}
