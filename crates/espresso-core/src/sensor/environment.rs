use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::time::Duration;

use log::{debug, warn};

use super::{Sensor, SensorError, entity_id, round_to};
use crate::telemetry::{EntityAttributes, EntityState};

/// Shortest time between two hardware measurements.
pub const MIN_READ_INTERVAL: Duration = Duration::from_secs(2);

/// Humidity and temperature from one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Temperature in the sensor's configured unit.
    pub temperature: f32,
}

/// Driver for a digital humidity/temperature probe. Temperatures are
/// reported in Celsius.
pub trait ClimateProbe {
    type Error: Debug;

    fn measure(&mut self) -> impl Future<Output = Result<ClimateReading, Self::Error>>;
}

/// Monotonic time since an arbitrary epoch.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }

    fn from_celsius(self, celsius: f32) -> f32 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Humidity/temperature sensor that talks to the hardware at most once
/// every [`MIN_READ_INTERVAL`].
pub struct EnvironmentSensor<P, K> {
    probe: P,
    clock: K,
    name: String,
    unit: TemperatureUnit,
    reading: Option<ClimateReading>,
    last_read: Option<Duration>,
}

impl<P: ClimateProbe, K: Clock> EnvironmentSensor<P, K> {
    pub fn new(probe: P, clock: K, name: impl Into<String>, unit: TemperatureUnit) -> Self {
        Self {
            probe,
            clock,
            name: name.into(),
            unit,
            reading: None,
            last_read: None,
        }
    }

    fn is_fresh(&self, now: Duration) -> bool {
        self.last_read
            .is_some_and(|last| now.saturating_sub(last) < MIN_READ_INTERVAL)
    }

    fn state(
        &self,
        quantity: &'static str,
        value: f32,
        unit: &'static str,
        label: &str,
    ) -> EntityState {
        EntityState {
            entity_id: entity_id(&self.name, quantity),
            state: round_to(value, 1),
            attributes: EntityAttributes {
                unit_of_measurement: unit,
                friendly_name: format!("{} {}", self.name, label),
                device_class: Some(quantity),
            },
        }
    }
}

impl<P: ClimateProbe, K: Clock> Sensor for EnvironmentSensor<P, K> {
    type Reading = Option<ClimateReading>;

    fn name(&self) -> &str {
        &self.name
    }

    /// Measure unless the last successful measurement is too recent.
    ///
    /// Probe failures are logged and leave the previous reading in place.
    async fn read(&mut self) -> Result<Option<ClimateReading>, SensorError> {
        let now = self.clock.now();
        if self.is_fresh(now) {
            return Ok(self.reading);
        }

        match self.probe.measure().await {
            Ok(raw) => {
                let reading = ClimateReading {
                    humidity: raw.humidity,
                    temperature: self.unit.from_celsius(raw.temperature),
                };
                debug!(
                    "{}: {:.1}{} {:.1}%",
                    self.name,
                    reading.temperature,
                    self.unit.symbol(),
                    reading.humidity
                );
                self.reading = Some(reading);
                self.last_read = Some(now);
            }
            Err(e) => warn!("{}: measurement failed: {:?}", self.name, e),
        }

        Ok(self.reading)
    }

    fn cached(&self) -> Option<Option<ClimateReading>> {
        self.reading.map(Some)
    }

    fn message(&self) -> Result<String, SensorError> {
        Ok(match self.reading {
            Some(r) => format!(
                "{}: {:.1}{} {:.1}%",
                self.name,
                r.temperature,
                self.unit.symbol(),
                r.humidity
            ),
            None => format!("{}: No data", self.name),
        })
    }

    /// The temperature.
    fn normalized_value(&self) -> Result<f32, SensorError> {
        self.reading
            .map(|r| r.temperature)
            .ok_or_else(|| SensorError::NoData {
                sensor: self.name.clone(),
            })
    }

    fn unit_of_measurement(&self) -> &'static str {
        self.unit.symbol()
    }

    fn entity_states(&self) -> Result<Vec<EntityState>, SensorError> {
        let Some(reading) = self.reading else {
            return Ok(Vec::new());
        };

        Ok(Vec::from([
            self.state(
                "temperature",
                reading.temperature,
                self.unit.symbol(),
                "Temperature",
            ),
            self.state("humidity", reading.humidity, "%", "Humidity"),
        ]))
    }
}
