//! Sensors: converters plus physics
//!
//! A [`Sensor`] owns its hardware source, caches the last reading, turns it
//! into a physical value and knows how to describe that value for the
//! display and for telemetry.
//!
//! Variants:
//! - [`PressureSensor`]: analog transducer with self-calibration.
//! - [`EnvironmentSensor`]: digital humidity/temperature probe, rate limited.
//! - [`FlowSensor`]: analog placeholder; its conversion is not defined yet
//!   and fails loudly.
//!
//! [`AnySensor`] puts the variants behind one type so a controller can keep
//! them in a single ordered list.

pub mod calibration;
mod environment;
mod flow;
mod pressure;
#[cfg(feature = "probe-sht40")]
mod sht40;

pub use calibration::{CalibrationKind, PressureCalibration, RangedVoltage, RunningMinimum};
pub use environment::{
    ClimateProbe, ClimateReading, Clock, EnvironmentSensor, MIN_READ_INTERVAL, TemperatureUnit,
};
pub use flow::FlowSensor;
pub use pressure::{Pressure, PressureSensor};
#[cfg(feature = "probe-sht40")]
pub use sht40::{MeasurementFailed, Sht40Probe};

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use log::warn;
use thiserror_no_std::Error;

use crate::converter::{Converter, ConverterError};
use crate::telemetry::{EntityState, TelemetrySink};

/// Prefix shared by every entity the machine publishes.
const ENTITY_PREFIX: &str = "sensor.espresso_machine_";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The converter did not deliver a sample this cycle.
    #[error("converter failed: {0}")]
    Converter(ConverterError),
    /// Nothing has been read successfully yet.
    #[error("{sensor}: no data yet")]
    NoData { sensor: String },
    /// The physical conversion for this sensor does not exist.
    #[error("{sensor}: {quantity} conversion is not implemented")]
    Unimplemented {
        sensor: String,
        quantity: &'static str,
    },
}

impl SensorError {
    /// Fatal errors stop the controller; everything else is retried on the
    /// next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}

impl From<ConverterError> for SensorError {
    fn from(e: ConverterError) -> Self {
        Self::Converter(e)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("{entity_id}: sink rejected the update")]
    Sink { entity_id: String },
    #[error("nothing to publish: {0}")]
    Sensor(SensorError),
}

impl From<SensorError> for PublishError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

/// The capability set every sensor variant provides.
pub trait Sensor {
    /// What one read produces.
    type Reading: Copy + PartialEq + Debug;

    /// Display name, also used to derive entity ids.
    fn name(&self) -> &str;

    /// Query the hardware, update the cache and return the new reading.
    fn read(&mut self) -> impl Future<Output = Result<Self::Reading, SensorError>>;

    /// The cached reading, if there is one.
    fn cached(&self) -> Option<Self::Reading>;

    /// The cached reading, reading the hardware only when nothing is cached.
    fn value(&mut self) -> impl Future<Output = Result<Self::Reading, SensorError>> {
        async move {
            match self.cached() {
                Some(reading) => Ok(reading),
                None => self.read().await,
            }
        }
    }

    /// One display line: `"<name>: <value> <unit>"`.
    fn message(&self) -> Result<String, SensorError>;

    /// The primary physical value, in [`Sensor::unit_of_measurement`].
    fn normalized_value(&self) -> Result<f32, SensorError>;

    fn unit_of_measurement(&self) -> &'static str;

    /// Everything this sensor would publish right now.
    fn entity_states(&self) -> Result<Vec<EntityState>, SensorError>;

    /// Push [`Sensor::entity_states`] to `sink`.
    ///
    /// Without a sink this does nothing. Returns how many states were
    /// published; stops at the first rejected update.
    fn publish<T: TelemetrySink>(
        &self,
        sink: Option<&mut T>,
    ) -> impl Future<Output = Result<usize, PublishError>> {
        async move {
            let Some(sink) = sink else {
                return Ok(0);
            };

            let states = self.entity_states()?;
            for state in &states {
                if let Err(e) = sink.publish(state).await {
                    warn!("Failed to publish {}: {:?}", state.entity_id, e);
                    return Err(PublishError::Sink {
                        entity_id: state.entity_id.clone(),
                    });
                }
            }
            Ok(states.len())
        }
    }
}

/// `sensor.espresso_machine_<name>_<quantity>`, with the name lower-cased and
/// spaces turned into underscores.
pub fn entity_id(name: &str, quantity: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect();
    format!("{ENTITY_PREFIX}{slug}_{quantity}")
}

/// Round to `decimals` places for publication.
pub fn round_to(value: f32, decimals: i32) -> f32 {
    let scale = libm::powf(10.0, decimals as f32);
    libm::roundf(value * scale) / scale
}

/// Reading of any sensor variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnyReading {
    Pressure(Pressure),
    Climate(Option<ClimateReading>),
    Flow(f32),
}

/// Every sensor variant behind one type.
///
/// The capability methods return `impl Future`, which rules out trait
/// objects; this enum forwards each call to the variant instead.
pub enum AnySensor<C, P, K> {
    Pressure(PressureSensor<C>),
    Environment(EnvironmentSensor<P, K>),
    Flow(FlowSensor<C>),
}

impl<C, P, K> From<PressureSensor<C>> for AnySensor<C, P, K> {
    fn from(sensor: PressureSensor<C>) -> Self {
        Self::Pressure(sensor)
    }
}

impl<C, P, K> From<EnvironmentSensor<P, K>> for AnySensor<C, P, K> {
    fn from(sensor: EnvironmentSensor<P, K>) -> Self {
        Self::Environment(sensor)
    }
}

impl<C, P, K> From<FlowSensor<C>> for AnySensor<C, P, K> {
    fn from(sensor: FlowSensor<C>) -> Self {
        Self::Flow(sensor)
    }
}

impl<C, P, K> Sensor for AnySensor<C, P, K>
where
    C: Converter,
    P: ClimateProbe,
    K: Clock,
{
    type Reading = AnyReading;

    fn name(&self) -> &str {
        match self {
            Self::Pressure(s) => s.name(),
            Self::Environment(s) => s.name(),
            Self::Flow(s) => s.name(),
        }
    }

    async fn read(&mut self) -> Result<AnyReading, SensorError> {
        match self {
            Self::Pressure(s) => s.read().await.map(AnyReading::Pressure),
            Self::Environment(s) => s.read().await.map(AnyReading::Climate),
            Self::Flow(s) => s.read().await.map(AnyReading::Flow),
        }
    }

    fn cached(&self) -> Option<AnyReading> {
        match self {
            Self::Pressure(s) => s.cached().map(AnyReading::Pressure),
            Self::Environment(s) => s.cached().map(AnyReading::Climate),
            Self::Flow(s) => s.cached().map(AnyReading::Flow),
        }
    }

    fn message(&self) -> Result<String, SensorError> {
        match self {
            Self::Pressure(s) => s.message(),
            Self::Environment(s) => s.message(),
            Self::Flow(s) => s.message(),
        }
    }

    fn normalized_value(&self) -> Result<f32, SensorError> {
        match self {
            Self::Pressure(s) => s.normalized_value(),
            Self::Environment(s) => s.normalized_value(),
            Self::Flow(s) => s.normalized_value(),
        }
    }

    fn unit_of_measurement(&self) -> &'static str {
        match self {
            Self::Pressure(s) => s.unit_of_measurement(),
            Self::Environment(s) => s.unit_of_measurement(),
            Self::Flow(s) => s.unit_of_measurement(),
        }
    }

    fn entity_states(&self) -> Result<Vec<EntityState>, SensorError> {
        match self {
            Self::Pressure(s) => s.entity_states(),
            Self::Environment(s) => s.entity_states(),
            Self::Flow(s) => s.entity_states(),
        }
    }
}
