use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use super::calibration::PressureCalibration;
use super::{Sensor, SensorError, entity_id, round_to};
use crate::converter::{Converter, Sample};
use crate::telemetry::{EntityAttributes, EntityState};

const UNIT: &str = "bar";

/// A pressure value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pressure {
    pub mpa: f32,
}

impl Pressure {
    pub fn bar(&self) -> f32 {
        self.mpa * 10.0
    }
}

/// Analog pressure transducer behind a converter channel.
pub struct PressureSensor<C> {
    converter: C,
    name: String,
    calibration: PressureCalibration,
    last_sample: Option<Sample>,
    pressure: Option<Pressure>,
}

impl<C: Converter> PressureSensor<C> {
    /// Sensor with the default ranged calibration.
    pub fn new(converter: C, name: impl Into<String>) -> Self {
        Self::with_calibration(converter, name, PressureCalibration::default())
    }

    pub fn with_calibration(
        converter: C,
        name: impl Into<String>,
        calibration: PressureCalibration,
    ) -> Self {
        Self {
            converter,
            name: name.into(),
            calibration,
            last_sample: None,
            pressure: None,
        }
    }

    pub fn calibration(&self) -> &PressureCalibration {
        &self.calibration
    }

    /// Learned zero-point offset in volts, for strategies that have one.
    pub fn offset_voltage(&self) -> Option<f32> {
        self.calibration.offset_voltage()
    }

    /// Raw converter output behind the cached pressure.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    /// Same as [`Sensor::message`] but in MPa.
    pub fn message_mpa(&self) -> String {
        match self.pressure {
            Some(p) => format!("{}: {:.4} MPa", self.name, p.mpa),
            None => format!("{}: No data", self.name),
        }
    }

    fn pressure(&self) -> Result<Pressure, SensorError> {
        self.pressure.ok_or_else(|| SensorError::NoData {
            sensor: self.name.clone(),
        })
    }
}

impl<C: Converter> Sensor for PressureSensor<C> {
    type Reading = Pressure;

    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self) -> Result<Pressure, SensorError> {
        let sample = self.converter.sample().await?;
        self.calibration.ingest(sample);
        let pressure = Pressure {
            mpa: self.calibration.mpa(sample),
        };
        debug!(
            "{}: {:.3} V -> {:.4} MPa",
            self.name, sample.voltage, pressure.mpa
        );

        self.last_sample = Some(sample);
        self.pressure = Some(pressure);
        Ok(pressure)
    }

    fn cached(&self) -> Option<Pressure> {
        self.pressure
    }

    fn message(&self) -> Result<String, SensorError> {
        Ok(match self.pressure {
            Some(p) => format!("{}: {:.2} {}", self.name, p.bar(), UNIT),
            None => format!("{}: No data", self.name),
        })
    }

    fn normalized_value(&self) -> Result<f32, SensorError> {
        Ok(self.pressure()?.bar())
    }

    fn unit_of_measurement(&self) -> &'static str {
        UNIT
    }

    fn entity_states(&self) -> Result<Vec<EntityState>, SensorError> {
        let pressure = self.pressure()?;
        Ok(vec![EntityState {
            entity_id: entity_id(&self.name, "pressure"),
            state: round_to(pressure.bar(), 2),
            attributes: EntityAttributes {
                unit_of_measurement: UNIT,
                friendly_name: format!("{} Pressure", self.name),
                device_class: Some("pressure"),
            },
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::RunningMinimum;
    use crate::sensor::testing::{RecordingSink, ScriptedConverter};
    use embassy_futures::block_on;

    #[test]
    fn test_rated_pressure_at_full_output() {
        let mut sensor = PressureSensor::new(ScriptedConverter::new(&[4.5]), "Head");
        let pressure = block_on(sensor.read()).unwrap();

        assert_eq!(pressure.mpa, 2.0);
        assert_eq!(pressure.bar(), 20.0);
        assert_eq!(sensor.offset_voltage(), Some(0.0));
        assert_eq!(sensor.message().unwrap(), "Head: 20.00 bar");
        assert_eq!(sensor.message_mpa(), "Head: 2.0000 MPa");
        assert_eq!(sensor.normalized_value().unwrap(), 20.0);
    }

    #[test]
    fn test_no_data_before_first_read() {
        let sensor = PressureSensor::new(ScriptedConverter::new(&[]), "Boiler");

        assert_eq!(sensor.message().unwrap(), "Boiler: No data");
        assert_eq!(sensor.message_mpa(), "Boiler: No data");
        assert!(matches!(
            sensor.normalized_value(),
            Err(SensorError::NoData { .. })
        ));
        assert!(sensor.entity_states().is_err());
    }

    #[test]
    fn test_value_is_idempotent() {
        let converter = ScriptedConverter::new(&[2.5, 3.5]);
        let conversions = converter.conversions.clone();
        let mut sensor = PressureSensor::new(converter, "Head");

        let first = block_on(sensor.value()).unwrap();
        let second = block_on(sensor.value()).unwrap();
        assert_eq!(first, second);
        assert_eq!(conversions.get(), 1);

        // An explicit read moves on to the next sample.
        let third = block_on(sensor.read()).unwrap();
        assert_eq!(third.mpa, 1.5);
        assert_eq!(conversions.get(), 2);
    }

    #[test]
    fn test_failed_read_keeps_previous_value() {
        let mut sensor = PressureSensor::new(ScriptedConverter::new(&[2.5]), "Head");
        block_on(sensor.read()).unwrap();

        assert!(matches!(
            block_on(sensor.read()),
            Err(SensorError::Converter(_))
        ));
        assert_eq!(sensor.cached(), Some(Pressure { mpa: 1.0 }));
        assert_eq!(sensor.last_sample().map(|s| s.voltage), Some(2.5));
    }

    #[test]
    fn test_running_minimum_calibration() {
        // 0.3072 V of 6.144 V full scale is a normalized 0.05.
        let calibration = PressureCalibration::RunningMinimum(RunningMinimum::new());
        let mut sensor = PressureSensor::with_calibration(
            ScriptedConverter::new(&[0.3072]),
            "Head",
            calibration,
        );

        let pressure = block_on(sensor.read()).unwrap();
        let normalized = sensor.last_sample().unwrap().normalized;
        assert_eq!(pressure.mpa, 0.0);
        assert_eq!(sensor.offset_voltage(), None);
        assert!(matches!(
            sensor.calibration(),
            PressureCalibration::RunningMinimum(c) if c.minimum() == normalized
        ));
    }

    #[test]
    fn test_publishes_rounded_bar() {
        // 1.73 V is 0.615 MPa, i.e. 6.15 bar.
        let mut sensor = PressureSensor::new(ScriptedConverter::new(&[1.73]), "Group Head");
        block_on(sensor.read()).unwrap();

        let mut sink = RecordingSink::default();
        let published = block_on(sensor.publish(Some(&mut sink))).unwrap();
        assert_eq!(published, 1);

        let states = sink.published.borrow();
        let state = &states[0];
        assert_eq!(
            state.entity_id,
            "sensor.espresso_machine_group_head_pressure"
        );
        assert_eq!(state.state, round_to(state.state, 2));
        assert!(state.state > 6.14 && state.state < 6.16);
        assert_eq!(state.attributes.unit_of_measurement, "bar");
        assert_eq!(state.attributes.friendly_name, "Group Head Pressure");
        assert_eq!(state.attributes.device_class, Some("pressure"));
    }
}
