//! Stepping pattern generation.
//!
//! The commutation core: given a stepping style and a direction, advance the
//! persistent phase position and compute the coil/PWM output vector for the
//! new phase. Phase lives in `[0, 4 * microsteps)` — four full steps cover
//! one electrical cycle of the two windings.

use core::str::FromStr;

use serde::Deserialize;

use crate::error::InvalidArgument;

/// Direction of motor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Advance the phase.
    Forward,
    /// Rewind the phase.
    Backward,
}

impl Direction {
    /// Signed phase increment for this direction.
    #[inline]
    fn delta(self, amount: i32) -> i32 {
        match self {
            Direction::Forward => amount,
            Direction::Backward => -amount,
        }
    }
}

impl FromStr for Direction {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            _ => Err(InvalidArgument::Direction),
        }
    }
}

/// Stepping style: granularity and excitation scheme per step call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SteppingStyle {
    /// One winding energized at a time; one full step per call.
    Single,
    /// Both windings energized; one full step per call, more torque.
    #[default]
    Double,
    /// Alternates single and double excitation; half a step per call.
    Interleaved,
    /// Sinusoidal current split across both windings; `1/microsteps` of a
    /// step per call. Smoothest, lowest-vibration mode.
    Microstep,
}

impl FromStr for SteppingStyle {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(SteppingStyle::Single),
            "double" => Ok(SteppingStyle::Double),
            "interleaved" => Ok(SteppingStyle::Interleaved),
            "microstep" => Ok(SteppingStyle::Microstep),
            _ => Err(InvalidArgument::Style),
        }
    }
}

/// Microsteps per full step, validated to the two supported curve sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Microsteps(u8);

/// Duty ramp for 8 microsteps: quantized quarter sine, 0-255.
const MICROSTEP_CURVE_8: [u8; 9] = [0, 50, 98, 142, 180, 212, 236, 250, 255];

/// Duty ramp for 16 microsteps.
const MICROSTEP_CURVE_16: [u8; 17] = [
    0, 25, 50, 74, 98, 120, 141, 162, 180, 197, 212, 225, 236, 244, 250, 253, 255,
];

impl Microsteps {
    /// Eight microsteps per step.
    pub const EIGHT: Self = Self(8);
    /// Sixteen microsteps per step.
    pub const SIXTEEN: Self = Self(16);

    /// Create a microsteps value, validating against the supported set.
    pub fn new(value: u8) -> Result<Self, InvalidArgument> {
        match value {
            8 | 16 => Ok(Self(value)),
            _ => Err(InvalidArgument::Microsteps(value)),
        }
    }

    /// Get the raw count.
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The duty curve for this count; `value() + 1` entries so both endpoints
    /// of a quadrant are addressable.
    fn curve(self) -> &'static [u8] {
        match self.0 {
            8 => &MICROSTEP_CURVE_8,
            _ => &MICROSTEP_CURVE_16,
        }
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::EIGHT
    }
}

impl TryFrom<u8> for Microsteps {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u8::deserialize(deserializer)?;
        Microsteps::new(value).map_err(|e| {
            let mut buf = heapless::String::<64>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// One instant of winding excitation: two 12-bit PWM duties
/// (pre-current-scaling) and four coil direction levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputVector {
    /// Winding 1 PWM duty, 0-4095.
    pub pwm_a: u16,
    /// Winding 2 PWM duty, 0-4095.
    pub pwm_b: u16,
    /// Winding 1 coil line 2.
    pub ain2: bool,
    /// Winding 2 coil line 1.
    pub bin1: bool,
    /// Winding 1 coil line 1.
    pub ain1: bool,
    /// Winding 2 coil line 2.
    pub bin2: bool,
}

impl OutputVector {
    /// All lines off: both windings de-energized.
    pub const RELEASED: Self = Self {
        pwm_a: 0,
        pwm_b: 0,
        ain2: false,
        bin1: false,
        ain1: false,
        bin2: false,
    };
}

/// Full-step commutation sequence for a 2-winding bipolar stepper, indexed by
/// half-step. Columns are `[AIN2, BIN1, AIN1, BIN2]`.
const STEP2COILS: [[u8; 4]; 8] = [
    [1, 0, 0, 0],
    [1, 1, 0, 0],
    [0, 1, 0, 0],
    [0, 1, 1, 0],
    [0, 0, 1, 0],
    [0, 0, 1, 1],
    [0, 0, 0, 1],
    [1, 0, 0, 1],
];

/// Full-scale winding duty for the non-microstep styles (255 * 16).
const FULL_DUTY: u16 = 4080;

/// Owns the phase position — the only mutable motion state. The motor does
/// not forget its electrical phase between commands, so the generator must
/// persist for the life of the stepper instance.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    /// Current phase in `[0, 4 * microsteps)`.
    phase: i32,
    microsteps: Microsteps,
}

impl PatternGenerator {
    /// Create a generator at phase zero.
    pub fn new(microsteps: Microsteps) -> Self {
        Self { phase: 0, microsteps }
    }

    /// Current phase position.
    #[inline]
    pub fn phase(&self) -> u16 {
        self.phase as u16
    }

    /// Microsteps per step.
    #[inline]
    pub fn microsteps(&self) -> Microsteps {
        self.microsteps
    }

    /// Change the microstep count, re-wrapping the phase into the new range.
    pub fn set_microsteps(&mut self, microsteps: Microsteps) {
        self.microsteps = microsteps;
        self.phase = self.phase.rem_euclid(4 * microsteps.value() as i32);
    }

    /// Advance one call's worth of phase for `style` and compute the output.
    pub fn advance(&mut self, style: SteppingStyle, direction: Direction) -> OutputVector {
        match style {
            SteppingStyle::Single => self.single(direction),
            SteppingStyle::Double => self.double(direction),
            SteppingStyle::Interleaved => self.interleaved(direction),
            SteppingStyle::Microstep => self.microstep(direction),
        }
    }

    /// One full step, landing on an even half-step (single-coil excitation).
    fn single(&mut self, direction: Direction) -> OutputVector {
        let ms = self.microsteps.value() as i32;
        let mut phase = self.phase + direction.delta(ms);
        // Floor to the nearest even half-step. Truncated remainder keeps the
        // backward-from-zero case on the commutation grid.
        phase -= phase % ms;
        self.phase = phase.rem_euclid(4 * ms);
        self.full_duty_vector()
    }

    /// One full step, landing on an odd half-step (both coils energized).
    fn double(&mut self, direction: Direction) -> OutputVector {
        let ms = self.microsteps.value() as i32;
        let mut phase = self.phase + direction.delta(ms);
        // Floor to the nearest odd half-step.
        phase -= (phase + ms / 2) % ms;
        self.phase = phase.rem_euclid(4 * ms);
        self.full_duty_vector()
    }

    /// Half a step, alternating between single- and double-coil excitation.
    fn interleaved(&mut self, direction: Direction) -> OutputVector {
        let ms = self.microsteps.value() as i32;
        let mut phase = self.phase + direction.delta(ms / 2);
        // Floor to the nearest half-step.
        phase -= phase % (ms / 2);
        self.phase = phase.rem_euclid(4 * ms);
        self.full_duty_vector()
    }

    /// One microstep: complementary positions in the duty curve on the two
    /// windings, with the active coil pair selected by quadrant.
    fn microstep(&mut self, direction: Direction) -> OutputVector {
        let ms = self.microsteps.value() as i32;
        self.phase = (self.phase + direction.delta(1)).rem_euclid(4 * ms);

        let curve = self.microsteps.curve();
        let p = self.phase;
        let (pwm_a, pwm_b, coils) = if p < ms {
            (curve[(ms - p) as usize], curve[p as usize], [1, 1, 0, 0])
        } else if p < 2 * ms {
            (
                curve[(p - ms) as usize],
                curve[(2 * ms - p) as usize],
                [0, 1, 1, 0],
            )
        } else if p < 3 * ms {
            (
                curve[(3 * ms - p) as usize],
                curve[(p - 2 * ms) as usize],
                [0, 0, 1, 1],
            )
        } else {
            (
                curve[(p - 3 * ms) as usize],
                curve[(4 * ms - p) as usize],
                [1, 0, 0, 1],
            )
        };

        OutputVector {
            pwm_a: pwm_a as u16 * 16,
            pwm_b: pwm_b as u16 * 16,
            ain2: coils[0] != 0,
            bin1: coils[1] != 0,
            ain1: coils[2] != 0,
            bin2: coils[3] != 0,
        }
    }

    /// Coil pattern for the current phase at full winding duty.
    fn full_duty_vector(&self) -> OutputVector {
        let half_step = self.microsteps.value() as i32 / 2;
        let coils = STEP2COILS[(self.phase / half_step) as usize % 8];
        OutputVector {
            pwm_a: FULL_DUTY,
            pwm_b: FULL_DUTY,
            ain2: coils[0] != 0,
            bin1: coils[1] != 0,
            ain1: coils[2] != 0,
            bin2: coils[3] != 0,
        }
    }
}
