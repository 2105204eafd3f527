//! Machine configuration from the command line and the environment.

use std::str::FromStr;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use espresso_core::config::{
    ChannelSpec, ConfigurationError, ControllerConfig, parse_address, parse_channel_specs,
    parse_millis,
};
use espresso_core::converter::{ConverterFamily, Gain};
use espresso_core::sensor::{CalibrationKind, TemperatureUnit};

/// Desktop simulator for the smart espresso machine sensor pipeline.
///
/// Every option can also be given through the environment variable named
/// after it.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Converter family: MCP3008 or ADS1115
    #[arg(long, env = "ADC_TYPE", default_value = "ADS1115", value_parser = parsed::<ConverterFamily>)]
    adc_type: ConverterFamily,

    /// ADS1115 programmable gain: 2/3, 1, 2, 4, 8 or 16
    #[arg(long, env = "ADS_GAIN", default_value = "2/3", value_parser = parsed::<Gain>)]
    ads_gain: Gain,

    /// ADS1115 bus address, hex or decimal
    #[arg(long, env = "ADS_ADDRESS", default_value = "0x48", value_parser = ads_address)]
    ads_address: u8,

    /// Pressure transducers as name:channel[:max_mpa], comma separated
    #[arg(long, env = "PRESSURE_SENSORS", default_value = "Head:0,Boiler:1", value_parser = channel_list)]
    pressure_sensors: ChannelList,

    /// Rating of transducers without their own max_mpa
    #[arg(long, env = "PRESSURE_MAX_MPA", default_value = "2.0", value_parser = max_pressure)]
    pressure_max_mpa: f32,

    /// Zero point tracking: ranged or running-minimum
    #[arg(long, env = "PRESSURE_CALIBRATION", default_value = "ranged", value_parser = parsed::<CalibrationKind>)]
    pressure_calibration: CalibrationKind,

    /// Flow meter as name:channel
    #[arg(long, env = "FLOW_SENSOR", value_parser = parsed::<ChannelSpec>)]
    flow_sensor: Option<ChannelSpec>,

    /// Name of the climate probe, empty to run without one
    #[arg(long, env = "ENVIRONMENT_SENSOR", default_value = "Environment")]
    environment_sensor: String,

    #[arg(long, env = "USE_FAHRENHEIT", default_value = "false", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    use_fahrenheit: bool,

    /// Pause between controller cycles in milliseconds
    #[arg(long, env = "RENDER_INTERVAL_MS", default_value = "100", value_parser = render_interval)]
    render_interval_ms: Duration,

    #[arg(long, env = "DISPLAY_ENABLE", default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    display_enable: bool,

    /// Publish telemetry to Home Assistant (dry run)
    #[arg(long, env = "HA_ENABLE", default_value = "false", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    ha_enable: bool,

    #[arg(long, env = "HA_URL")]
    ha_url: Option<String>,

    #[arg(long, env = "HA_TOKEN", hide_env_values = true)]
    ha_token: Option<String>,

    #[arg(long, env = "HA_VERIFY_SSL", default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    ha_verify_ssl: bool,
}

/// Comma separated list of channels, parsed as one value.
#[derive(Debug, Clone, PartialEq)]
struct ChannelList(Vec<ChannelSpec>);

fn parsed<T>(value: &str) -> Result<T, String>
where
    T: FromStr<Err = ConfigurationError>,
{
    value.parse::<T>().map_err(|e| e.to_string())
}

fn ads_address(value: &str) -> Result<u8, String> {
    parse_address("ADS_ADDRESS", value).map_err(|e| e.to_string())
}

fn channel_list(value: &str) -> Result<ChannelList, String> {
    parse_channel_specs(value)
        .map(ChannelList)
        .map_err(|e| e.to_string())
}

fn max_pressure(value: &str) -> Result<f32, String> {
    match value.trim().parse::<f32>() {
        Ok(mpa) if mpa > 0.0 => Ok(mpa),
        _ => Err(ConfigurationError::invalid("PRESSURE_MAX_MPA", value).to_string()),
    }
}

fn render_interval(value: &str) -> Result<Duration, String> {
    parse_millis("RENDER_INTERVAL_MS", value).map_err(|e| e.to_string())
}

/// Where telemetry would be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeAssistant {
    pub url: String,
    pub token: String,
    pub verify_ssl: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub adc: ConverterFamily,
    pub ads_gain: Gain,
    pub ads_address: u8,
    pub pressure_sensors: Vec<ChannelSpec>,
    pub max_pressure_mpa: f32,
    pub calibration: CalibrationKind,
    pub flow_sensor: Option<ChannelSpec>,
    pub environment_sensor: Option<String>,
    pub temperature_unit: TemperatureUnit,
    pub controller: ControllerConfig,
    pub display: bool,
    pub home_assistant: Option<HomeAssistant>,
}

impl TryFrom<Args> for Settings {
    type Error = ConfigurationError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let home_assistant = if args.ha_enable {
            Some(HomeAssistant {
                url: present("HA_URL", args.ha_url)?,
                token: present("HA_TOKEN", args.ha_token)?,
                verify_ssl: args.ha_verify_ssl,
            })
        } else {
            None
        };

        let environment_sensor = args.environment_sensor.trim();

        Ok(Self {
            adc: args.adc_type,
            ads_gain: args.ads_gain,
            ads_address: args.ads_address,
            pressure_sensors: args.pressure_sensors.0,
            max_pressure_mpa: args.pressure_max_mpa,
            calibration: args.pressure_calibration,
            flow_sensor: args.flow_sensor,
            environment_sensor: (!environment_sensor.is_empty())
                .then(|| environment_sensor.to_string()),
            temperature_unit: if args.use_fahrenheit {
                TemperatureUnit::Fahrenheit
            } else {
                TemperatureUnit::Celsius
            },
            controller: ControllerConfig {
                render_interval: args.render_interval_ms,
            },
            display: args.display_enable,
            home_assistant,
        })
    }
}

fn present(key: &'static str, value: Option<String>) -> Result<String, ConfigurationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigurationError::MissingValue { key }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn settings(args: &[&str]) -> Result<Settings, ConfigurationError> {
        let argv = std::iter::once("espresso-simulator").chain(args.iter().copied());
        let args = Args::try_parse_from(argv).unwrap();
        Settings::try_from(args)
    }

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.adc, ConverterFamily::Ads1115);
        assert_eq!(settings.ads_gain, Gain::TwoThirds);
        assert_eq!(settings.ads_address, 0x48);
        assert_eq!(settings.pressure_sensors.len(), 2);
        assert_eq!(settings.pressure_sensors[1].name, "Boiler");
        assert_eq!(settings.max_pressure_mpa, 2.0);
        assert_eq!(settings.calibration, CalibrationKind::Ranged);
        assert_eq!(settings.flow_sensor, None);
        assert_eq!(settings.environment_sensor.as_deref(), Some("Environment"));
        assert_eq!(settings.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(
            settings.controller.render_interval,
            Duration::from_millis(100)
        );
        assert!(settings.display);
        assert_eq!(settings.home_assistant, None);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            "--adc-type",
            "MCP3008",
            "--pressure-sensors",
            "Head:3:1.2",
            "--pressure-calibration",
            "running-minimum",
            "--flow-sensor",
            "Water:4",
            "--environment-sensor",
            "",
            "--use-fahrenheit",
            "yes",
            "--render-interval-ms",
            "500",
            "--display-enable",
            "off",
        ])
        .unwrap();

        assert_eq!(settings.adc, ConverterFamily::Mcp3008);
        assert_eq!(settings.pressure_sensors[0].max_pressure_mpa, Some(1.2));
        assert_eq!(settings.calibration, CalibrationKind::RunningMinimum);
        assert_eq!(settings.flow_sensor.map(|s| s.channel), Some(4));
        assert_eq!(settings.environment_sensor, None);
        assert_eq!(settings.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(
            settings.controller.render_interval,
            Duration::from_millis(500)
        );
        assert!(!settings.display);
    }

    #[test]
    fn test_home_assistant_requires_credentials() {
        assert_eq!(
            settings(&["--ha-enable", "true", "--ha-url", "http://ha.local:8123"]),
            Err(ConfigurationError::MissingValue { key: "HA_TOKEN" })
        );

        let settings = settings(&[
            "--ha-enable",
            "1",
            "--ha-url",
            "http://ha.local:8123",
            "--ha-token",
            "abc",
            "--ha-verify-ssl",
            "false",
        ])
        .unwrap();
        assert_eq!(
            settings.home_assistant,
            Some(HomeAssistant {
                url: "http://ha.local:8123".to_string(),
                token: "abc".to_string(),
                verify_ssl: false,
            })
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for args in [
            ["--adc-type", "ADS1015"],
            ["--ads-gain", "3"],
            ["--ads-address", "0x80"],
            ["--pressure-max-mpa", "0"],
            ["--display-enable", "maybe"],
            ["--pressure-sensors", "Head"],
        ] {
            let parsed =
                Args::try_parse_from(std::iter::once("espresso-simulator").chain(args));
            assert!(parsed.is_err(), "{args:?}");
        }
    }
}
