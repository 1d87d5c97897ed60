//! Error types for the motor-hat library.
//!
//! Provides unified error handling across parameter validation, bus
//! transport, and configuration loading.

use core::fmt;

/// Result type alias for driver operations, generic over the bus error type.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Unified error type for PWM and motor operations.
///
/// Generic over `E`, the error type of the underlying I2C implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error<E> {
    /// An I2C transaction failed. Never retried by the driver; retry policy
    /// belongs to the transport layer.
    Transport(E),
    /// A parameter failed validation.
    Invalid(InvalidArgument),
    /// A multi-step move was requested before any speed was configured.
    SpeedNotConfigured,
}

/// Parameter validation failures.
///
/// Raised synchronously at the offending call, never silently coerced.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidArgument {
    /// PWM channel outside 0-15.
    Channel(u8),
    /// PWM frequency not a positive finite number.
    Frequency(f32),
    /// Duty count outside 0-4096.
    Duty(u16),
    /// Microsteps per step other than 8 or 16.
    Microsteps(u8),
    /// Current-limiting scale outside [0, 1].
    CurrentScale(f32),
    /// Direction token other than `forward` or `backward`.
    Direction,
    /// Stepping style token not recognized.
    Style,
    /// Speed value not a positive finite number.
    Speed(f32),
    /// DC motor throttle outside 0-100 percent.
    Throttle(f32),
    /// Servo position outside 0-100 percent.
    Position(f32),
    /// Servo pulse width not positive, or minimum not below maximum.
    PulseWidth(f32),
}

/// Configuration parsing and validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration.
    Parse(heapless::String<128>),
    /// A motor parameter in the configuration failed validation.
    Invalid(InvalidArgument),
    /// More than one of pps, rpm, sps given for a single stepper.
    MultipleSpeeds,
    /// Two motor definitions claim the same PWM channel.
    PinOverlap(u8),
    /// More steppers defined than the board supports (max 2).
    TooManySteppers,
    /// More DC motors defined than the board supports (max 4).
    TooManyDcMotors,
    /// More servos defined than the board has channels for (max 16).
    TooManyServos,
    /// File I/O error (std only).
    #[cfg(feature = "std")]
    Io(heapless::String<128>),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "I2C transport error: {:?}", e),
            Error::Invalid(e) => write!(f, "Invalid argument: {}", e),
            Error::SpeedNotConfigured => {
                write!(f, "No speed configured: set pps, rpm or sps before stepping")
            }
        }
    }
}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidArgument::Channel(c) => write!(f, "Channel {} out of range 0-15", c),
            InvalidArgument::Frequency(v) => write!(f, "Frequency {} Hz is not valid", v),
            InvalidArgument::Duty(v) => write!(f, "Duty count {} out of range 0-4096", v),
            InvalidArgument::Microsteps(v) => {
                write!(f, "Invalid microsteps: {}. Valid values: 8, 16", v)
            }
            InvalidArgument::CurrentScale(v) => {
                write!(f, "Current scale {} out of range 0.0-1.0", v)
            }
            InvalidArgument::Direction => {
                write!(f, "Direction should be either \"forward\" or \"backward\"")
            }
            InvalidArgument::Style => {
                write!(f, "Style should be single, double, interleaved or microstep")
            }
            InvalidArgument::Speed(v) => write!(f, "Speed {} is not a valid rate", v),
            InvalidArgument::Throttle(v) => write!(f, "Throttle {}% out of range 0-100", v),
            InvalidArgument::Position(v) => write!(f, "Position {}% out of range 0-100", v),
            InvalidArgument::PulseWidth(v) => {
                write!(f, "Pulse width {} ms is not a valid calibration", v)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {}", e),
            ConfigError::MultipleSpeeds => {
                write!(f, "At most one of pps, rpm, sps may be set per stepper")
            }
            ConfigError::PinOverlap(pin) => {
                write!(f, "Motor definitions overlap on channel {}", pin)
            }
            ConfigError::TooManySteppers => write!(f, "Too many steppers (max 2)"),
            ConfigError::TooManyDcMotors => write!(f, "Too many DC motors (max 4)"),
            ConfigError::TooManyServos => write!(f, "Too many servos (max 16)"),
            #[cfg(feature = "std")]
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl<E> From<InvalidArgument> for Error<E> {
    fn from(e: InvalidArgument) -> Self {
        Error::Invalid(e)
    }
}

impl From<InvalidArgument> for ConfigError {
    fn from(e: InvalidArgument) -> Self {
        ConfigError::Invalid(e)
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}

#[cfg(feature = "std")]
impl std::error::Error for InvalidArgument {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
