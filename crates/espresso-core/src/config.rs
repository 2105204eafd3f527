//! Process configuration values and their parsers
//!
//! Everything here is supplied once at startup and stays immutable for the
//! lifetime of the process. The parsers are shared by every binary so an
//! environment variable means the same thing on the device and in the
//! simulator.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str::FromStr;
use core::time::Duration;

use thiserror_no_std::Error;

/// Maximum number of characters of an offending value kept in an error.
const MAX_REPORTED_VALUE: usize = 32;

/// Default pause between two controller cycles.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// Default rating of the pressure transducers fitted to the machine.
pub const DEFAULT_MAX_PRESSURE_MPA: f32 = 2.0;

/// Fatal configuration problems, surfaced at startup and never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{family} channel {channel} out of range (valid: 0-{max})")]
    InvalidChannel {
        family: &'static str,
        channel: u8,
        max: u8,
    },
    #[error("no sensors configured")]
    NoSensors,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        key: &'static str,
        value: heapless::String<MAX_REPORTED_VALUE>,
    },
    #[error("{key} is required")]
    MissingValue { key: &'static str },
}

impl ConfigurationError {
    /// Build an [`ConfigurationError::InvalidValue`], truncating long input.
    pub fn invalid(key: &'static str, value: &str) -> Self {
        let mut reported = heapless::String::new();
        for c in value.chars() {
            if reported.push(c).is_err() {
                break;
            }
        }
        Self::InvalidValue {
            key,
            value: reported,
        }
    }
}

/// Controller cadence settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub render_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            render_interval: DEFAULT_RENDER_INTERVAL,
        }
    }
}

/// Parse a 7-bit bus address written as hex (`0x48`) or decimal (`72`).
pub fn parse_address(key: &'static str, value: &str) -> Result<u8, ConfigurationError> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };

    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        _ => Err(ConfigurationError::invalid(key, value)),
    }
}

/// One analog sensor as configured: a display name, the converter channel it
/// is wired to and, for pressure transducers, an optional rating override.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub name: String,
    pub channel: u8,
    pub max_pressure_mpa: Option<f32>,
}

impl FromStr for ChannelSpec {
    type Err = ConfigurationError;

    /// `name:channel[:max_mpa]`, e.g. `Head:0` or `Boiler:1:1.2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':').map(str::trim);

        let name = match parts.next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ConfigurationError::invalid("sensor name", s)),
        };

        let channel = parts
            .next()
            .and_then(|channel| channel.parse::<u8>().ok())
            .ok_or_else(|| ConfigurationError::invalid("sensor channel", s))?;

        let max_pressure_mpa = match parts.next() {
            Some(rating) => match rating.parse::<f32>() {
                Ok(rating) if rating > 0.0 => Some(rating),
                _ => return Err(ConfigurationError::invalid("max pressure", s)),
            },
            None => None,
        };

        if parts.next().is_some() {
            return Err(ConfigurationError::invalid("sensor", s));
        }

        Ok(Self {
            name,
            channel,
            max_pressure_mpa,
        })
    }
}

/// Parse a comma separated list of [`ChannelSpec`]s. Empty entries are skipped.
pub fn parse_channel_specs(value: &str) -> Result<Vec<ChannelSpec>, ConfigurationError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ChannelSpec::from_str)
        .collect()
}

/// Parse a duration given in whole milliseconds.
pub fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigurationError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigurationError::invalid(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("ADS_ADDRESS", "0x48"), Ok(0x48));
        assert_eq!(parse_address("ADS_ADDRESS", "73"), Ok(0x49));
        assert!(parse_address("ADS_ADDRESS", "0x80").is_err());
        assert!(parse_address("ADS_ADDRESS", "board").is_err());
    }

    #[test]
    fn test_channel_specs() {
        let specs = parse_channel_specs("Head:0, Boiler:1:1.2,").unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "Head");
        assert_eq!(specs[0].channel, 0);
        assert_eq!(specs[0].max_pressure_mpa, None);
        assert_eq!(specs[1].name, "Boiler");
        assert_eq!(specs[1].channel, 1);
        assert_eq!(specs[1].max_pressure_mpa, Some(1.2));
    }

    #[test]
    fn test_channel_spec_rejects_garbage() {
        assert!("Head".parse::<ChannelSpec>().is_err());
        assert!(":0".parse::<ChannelSpec>().is_err());
        assert!("Head:x".parse::<ChannelSpec>().is_err());
        assert!("Head:0:-1".parse::<ChannelSpec>().is_err());
        assert!("Head:0:2:extra".parse::<ChannelSpec>().is_err());
    }

    #[test]
    fn test_invalid_value_is_truncated() {
        let long = "x".repeat(100);
        let ConfigurationError::InvalidValue { value, .. } =
            ConfigurationError::invalid("ADC_TYPE", &long)
        else {
            panic!("expected InvalidValue");
        };
        assert_eq!(value.len(), MAX_REPORTED_VALUE);
    }

    #[test]
    fn test_default_render_interval() {
        assert_eq!(
            ControllerConfig::default().render_interval,
            Duration::from_millis(100)
        );
        assert_eq!(parse_millis("RENDER_INTERVAL_MS", "250"), Ok(Duration::from_millis(250)));
    }
}
