//! Analog-to-digital converters
//!
//! A [`Converter`] is one channel of an ADC chip. It produces a [`Sample`]:
//! the reading normalized to the chip's full-scale range plus the voltage it
//! corresponds to. Two families are supported:
//!
//! - [`mcp3008`]: 10-bit, SPI, eight single-ended channels, fixed 3.3 V
//!   reference.
//! - [`ads1115`]: 16-bit, I2C, four single-ended channels behind a
//!   programmable-gain amplifier.

pub mod ads1115;
pub mod mcp3008;

pub use ads1115::{Ads1115, Ads1115Converter, Ads1115Registry, Gain};
pub use mcp3008::{Mcp3008, Mcp3008Converter};

use core::str::FromStr;

use thiserror_no_std::Error;

use crate::config::ConfigurationError;

/// Transient converter failures. The pipeline logs these and retries on the
/// next cycle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterError {
    #[error("{chip}: bus error during {operation}")]
    Bus {
        chip: &'static str,
        operation: &'static str,
    },
    #[error("{chip}: conversion did not complete")]
    Timeout { chip: &'static str },
}

/// One conversion result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Reading relative to the full-scale range, always within `0.0..=1.0`.
    pub normalized: f32,
    /// Measured voltage in volts.
    pub voltage: f32,
}

impl Sample {
    /// Build a sample from a chip that reports a fraction of its reference.
    ///
    /// The voltage is derived from the clamped fraction, so it can never
    /// exceed `full_scale`.
    pub fn from_normalized(normalized: f32, full_scale: f32) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        Self {
            normalized,
            voltage: normalized * full_scale,
        }
    }

    /// Build a sample from a chip that reports volts.
    ///
    /// Inputs beyond full scale saturate at `1.0` rather than failing.
    pub fn from_voltage(voltage: f32, full_scale: f32) -> Self {
        Self {
            normalized: (voltage / full_scale).clamp(0.0, 1.0),
            voltage,
        }
    }
}

/// One analog input channel.
pub trait Converter {
    /// Channel index on the chip.
    fn channel(&self) -> u8;

    /// Voltage that corresponds to a normalized reading of `1.0`.
    fn full_scale_voltage(&self) -> f32;

    /// Perform one conversion.
    fn sample(&mut self) -> impl Future<Output = Result<Sample, ConverterError>>;

    /// Normalized reading in `0.0..=1.0`.
    fn read(&mut self) -> impl Future<Output = Result<f32, ConverterError>> {
        async move { Ok(self.sample().await?.normalized) }
    }

    /// Measured voltage in volts.
    fn voltage(&mut self) -> impl Future<Output = Result<f32, ConverterError>> {
        async move { Ok(self.sample().await?.voltage) }
    }
}

/// The converter chip families the machine can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterFamily {
    /// MCP3008 on SPI.
    Mcp3008,
    /// ADS1115 on I2C.
    Ads1115,
}

impl ConverterFamily {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mcp3008 => "MCP3008",
            Self::Ads1115 => "ADS1115",
        }
    }

    /// Highest valid channel index.
    pub const fn max_channel(self) -> u8 {
        match self {
            Self::Mcp3008 => 7,
            Self::Ads1115 => 3,
        }
    }

    /// Reject channels the chip does not have.
    pub fn check_channel(self, channel: u8) -> Result<u8, ConfigurationError> {
        if channel <= self.max_channel() {
            Ok(channel)
        } else {
            Err(ConfigurationError::InvalidChannel {
                family: self.label(),
                channel,
                max: self.max_channel(),
            })
        }
    }
}

impl FromStr for ConverterFamily {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("MCP3008") {
            Ok(Self::Mcp3008)
        } else if s.eq_ignore_ascii_case("ADS1115") {
            Ok(Self::Ads1115)
        } else {
            Err(ConfigurationError::invalid("ADC_TYPE", s))
        }
    }
}
