//! PCA9685 register map and pure codec helpers.
//!
//! Everything here is stateless: given a target frequency or a channel duty
//! request, these functions compute the register addresses and byte values to
//! put on the bus. The [`driver`](super::driver) issues the actual
//! transactions.

use serde::Deserialize;

use crate::error::InvalidArgument;

/// Mode register 1.
pub const MODE1: u8 = 0x00;
/// Mode register 2.
pub const MODE2: u8 = 0x01;
/// PWM frequency prescaler.
pub const PRESCALE: u8 = 0xFE;
/// Channel 0 on-count, low byte. Channel `n` is offset by `4 * n`.
pub const LED0_ON_L: u8 = 0x06;
/// Channel 0 on-count, high byte.
pub const LED0_ON_H: u8 = 0x07;
/// Channel 0 off-count, low byte.
pub const LED0_OFF_L: u8 = 0x08;
/// Channel 0 off-count, high byte.
pub const LED0_OFF_H: u8 = 0x09;
/// Broadcast on-count, low byte (writes every channel).
pub const ALL_LED_ON_L: u8 = 0xFA;
/// Broadcast on-count, high byte.
pub const ALL_LED_ON_H: u8 = 0xFB;
/// Broadcast off-count, low byte.
pub const ALL_LED_OFF_L: u8 = 0xFC;
/// Broadcast off-count, high byte.
pub const ALL_LED_OFF_H: u8 = 0xFD;

/// MODE1/MODE2 bit masks.
pub mod bits {
    /// MODE1: restart PWM after wake.
    pub const RESTART: u8 = 0x80;
    /// MODE1: oscillator off. Prescale writes require this bit set.
    pub const SLEEP: u8 = 0x10;
    /// MODE1: respond to the LED all-call address.
    pub const ALLCALL: u8 = 0x01;
    /// MODE2: totem-pole output structure.
    pub const OUTDRV: u8 = 0x04;
}

/// I2C general-call address.
pub const GENERAL_CALL: u8 = 0x00;
/// Software reset byte, sent to the general-call address.
pub const SWRST: u8 = 0x06;

/// Internal oscillator frequency in Hz.
pub const OSC_CLOCK_HZ: f32 = 25_000_000.0;
/// Counts per PWM period (12-bit counter).
pub const COUNTS_PER_PERIOD: f32 = 4096.0;
/// Sentinel count engaging the full-on / full-off bit (bit 12).
pub const FULL_SCALE: u16 = 4096;

/// One register write: `(register address, byte value)`.
pub type RegisterWrite = (u8, u8);

/// A validated PWM channel index, 0-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Create a channel, validating the index against the chip's 16 outputs.
    pub fn new(index: u8) -> Result<Self, InvalidArgument> {
        if index > 15 {
            Err(InvalidArgument::Channel(index))
        } else {
            Ok(Self(index))
        }
    }

    /// Channel indices in the board pin tables are known-good constants.
    pub(crate) const fn new_unchecked(index: u8) -> Self {
        Self(index)
    }

    /// Get the raw channel index.
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = InvalidArgument;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let index = u8::deserialize(deserializer)?;
        Channel::new(index).map_err(|e| {
            let mut buf = heapless::String::<64>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// Compute the prescale register value for a target PWM frequency.
///
/// `prescale = round(25 MHz / 4096 / freq - 1)`, rounded half-up per the
/// datasheet guidance. The result is clamped to the 8-bit register range.
pub fn prescale_from_frequency(freq_hz: f32) -> Result<u8, InvalidArgument> {
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(InvalidArgument::Frequency(freq_hz));
    }

    let estimate = OSC_CLOCK_HZ / COUNTS_PER_PERIOD / freq_hz - 1.0;
    let prescale = libm::roundf(estimate);

    Ok(prescale.clamp(0.0, 255.0) as u8)
}

/// Invert [`prescale_from_frequency`]: the frequency actually produced by a
/// prescale register value.
#[inline]
pub fn frequency_from_prescale(prescale: u8) -> f32 {
    OSC_CLOCK_HZ / ((prescale as f32 + 1.0) * COUNTS_PER_PERIOD)
}

/// Validate a pair of 12-bit on/off counts (4096 is the full-on sentinel).
fn check_counts(on: u16, off: u16) -> Result<(), InvalidArgument> {
    if on > FULL_SCALE {
        return Err(InvalidArgument::Duty(on));
    }
    if off > FULL_SCALE {
        return Err(InvalidArgument::Duty(off));
    }
    Ok(())
}

/// The four byte writes that program one channel's on/off counts.
pub fn channel_duty_writes(
    channel: Channel,
    on: u16,
    off: u16,
) -> Result<[RegisterWrite; 4], InvalidArgument> {
    check_counts(on, off)?;
    let offset = 4 * channel.index();
    Ok([
        (LED0_ON_L + offset, (on & 0xFF) as u8),
        (LED0_ON_H + offset, (on >> 8) as u8),
        (LED0_OFF_L + offset, (off & 0xFF) as u8),
        (LED0_OFF_H + offset, (off >> 8) as u8),
    ])
}

/// The four byte writes that program every channel at once.
pub fn all_channels_duty_writes(
    on: u16,
    off: u16,
) -> Result<[RegisterWrite; 4], InvalidArgument> {
    check_counts(on, off)?;
    Ok([
        (ALL_LED_ON_L, (on & 0xFF) as u8),
        (ALL_LED_ON_H, (on >> 8) as u8),
        (ALL_LED_OFF_L, (off & 0xFF) as u8),
        (ALL_LED_OFF_H, (off >> 8) as u8),
    ])
}

/// On/off counts encoding a digital level: full-on for high, full-off for low.
#[inline]
pub fn level_counts(high: bool) -> (u16, u16) {
    if high {
        (FULL_SCALE, 0)
    } else {
        (0, FULL_SCALE)
    }
}
