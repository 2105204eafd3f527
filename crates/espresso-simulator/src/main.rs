//! Desktop simulator for the smart espresso machine sensor pipeline.
//!
//! Wires `espresso-core` to simulated converters, a simulated climate probe,
//! a dry-run Home Assistant sink and a 128x64 simulated OLED, then runs the
//! controller until it fails or the window is closed.
//!
//! Every option is a command line flag that falls back to an environment
//! variable (a `.env` file in the working directory is loaded first):
//!
//! | Variable               | Default           |
//! |------------------------|-------------------|
//! | `ADC_TYPE`             | `ADS1115`         |
//! | `ADS_GAIN`             | `2/3`             |
//! | `ADS_ADDRESS`          | `0x48`            |
//! | `PRESSURE_SENSORS`     | `Head:0,Boiler:1` |
//! | `PRESSURE_MAX_MPA`     | `2.0`             |
//! | `PRESSURE_CALIBRATION` | `ranged`          |
//! | `FLOW_SENSOR`          | unset             |
//! | `ENVIRONMENT_SENSOR`   | `Environment`     |
//! | `USE_FAHRENHEIT`       | `false`           |
//! | `RENDER_INTERVAL_MS`   | `100`             |
//! | `DISPLAY_ENABLE`       | `true`            |
//! | `HA_ENABLE`            | `false`           |
//! | `HA_URL`, `HA_TOKEN`   | required with HA  |
//! | `HA_VERIFY_SSL`        | `true`            |
//!
//! `RUST_LOG` sets the log level. `--help` lists the flags.

mod hardware;
mod screen;
mod settings;
mod sink;

use std::convert::Infallible;

use clap::Parser;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use log::{error, info};

use espresso_core::bus::shared;
use espresso_core::config::ConfigurationError;
use espresso_core::controller::{Controller, Error};
use espresso_core::converter::{
    Ads1115Registry, Converter, ConverterFamily, Mcp3008, Mcp3008Converter,
};
use espresso_core::sensor::{AnySensor, EnvironmentSensor, FlowSensor, PressureSensor};

use hardware::{Machine, SimulatedAds1115, SimulatedMcp3008, SimulatedProbe, StdClock, StdDelay};
use screen::SimulatorScreen;
use settings::{Args, Settings};
use sink::DryRunSink;

type MachineSensor<C> = AnySensor<C, SimulatedProbe, StdClock>;

/// Build every configured sensor on converters from `converter` and run the
/// controller.
fn run_machine<C, F>(settings: &Settings, machine: Machine, mut converter: F) -> Result<Infallible, Error>
where
    C: Converter,
    F: FnMut(u8) -> Result<C, ConfigurationError>,
{
    let mut sensors: Vec<MachineSensor<C>> = Vec::new();

    for spec in &settings.pressure_sensors {
        let max_mpa = spec.max_pressure_mpa.unwrap_or(settings.max_pressure_mpa);
        info!(
            "Pressure sensor {:?} on channel {} ({} MPa, {:?})",
            spec.name, spec.channel, max_mpa, settings.calibration
        );
        let sensor = PressureSensor::with_calibration(
            converter(spec.channel)?,
            spec.name.clone(),
            settings.calibration.build(max_mpa),
        );
        sensors.push(sensor.into());
    }

    if let Some(spec) = &settings.flow_sensor {
        info!("Flow sensor {:?} on channel {}", spec.name, spec.channel);
        sensors.push(FlowSensor::new(converter(spec.channel)?, spec.name.clone()).into());
    }

    if let Some(name) = &settings.environment_sensor {
        info!("Environment sensor {:?} ({:?})", name, settings.temperature_unit);
        let sensor = EnvironmentSensor::new(
            SimulatedProbe::new(machine),
            StdClock::new(),
            name.clone(),
            settings.temperature_unit,
        );
        sensors.push(sensor.into());
    }

    let sink = settings.home_assistant.as_ref().map(DryRunSink::new);
    let screen = settings.display.then(SimulatorScreen::new);

    let mut controller = Controller::new(sensors, StdDelay)
        .with_sink(sink)
        .with_screen(screen)
        .with_config(settings.controller);

    block_on(controller.run())
}

fn run(settings: &Settings) -> Result<Infallible, Error> {
    let machine = Machine::new();

    match settings.adc {
        ConverterFamily::Mcp3008 => {
            let chip = shared(Mcp3008::new(SimulatedMcp3008::new(machine)));
            run_machine(settings, machine, |channel| {
                Mcp3008Converter::new(chip.clone(), channel)
            })
        }
        ConverterFamily::Ads1115 => {
            let bus = Mutex::<NoopRawMutex, _>::new(SimulatedAds1115::new(
                machine,
                settings.ads_address,
            ));
            let mut registry = Ads1115Registry::new(&bus, StdDelay);
            run_machine(settings, machine, |channel| {
                registry.converter(channel, settings.ads_gain, settings.ads_address)
            })
        }
    }
}

fn main() {
    // Load .env before the logger so RUST_LOG from the file applies.
    let dotenv = dotenvy::dotenv();
    env_logger::init();
    match dotenv {
        Ok(path) => info!("Loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => error!("Ignoring .env: {}", e),
    }

    info!("Starting espresso machine simulator");

    let settings = match Settings::try_from(Args::parse()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "{} converter, display {}, Home Assistant {}",
        settings.adc.label(),
        if settings.display { "on" } else { "off" },
        if settings.home_assistant.is_some() { "on" } else { "off" },
    );

    match run(&settings) {
        Ok(never) => match never {},
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
