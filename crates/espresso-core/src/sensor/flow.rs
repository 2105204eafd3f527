use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use super::{Sensor, SensorError};
use crate::converter::{Converter, Sample};
use crate::telemetry::EntityState;

const QUANTITY: &str = "flow";

/// Analog flow meter.
///
/// Samples are taken and kept, but there is no conversion to a volume yet,
/// so every value-producing call fails with
/// [`SensorError::Unimplemented`].
pub struct FlowSensor<C> {
    converter: C,
    name: String,
    last_sample: Option<Sample>,
}

impl<C: Converter> FlowSensor<C> {
    pub fn new(converter: C, name: impl Into<String>) -> Self {
        Self {
            converter,
            name: name.into(),
            last_sample: None,
        }
    }

    /// Raw converter output from the most recent read.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    fn unimplemented(&self) -> SensorError {
        SensorError::Unimplemented {
            sensor: self.name.clone(),
            quantity: QUANTITY,
        }
    }
}

impl<C: Converter> Sensor for FlowSensor<C> {
    type Reading = f32;

    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self) -> Result<f32, SensorError> {
        let sample = self.converter.sample().await?;
        debug!("{}: raw {:.4}", self.name, sample.normalized);
        self.last_sample = Some(sample);
        Err(self.unimplemented())
    }

    fn cached(&self) -> Option<f32> {
        None
    }

    fn message(&self) -> Result<String, SensorError> {
        Err(self.unimplemented())
    }

    fn normalized_value(&self) -> Result<f32, SensorError> {
        Err(self.unimplemented())
    }

    fn unit_of_measurement(&self) -> &'static str {
        "L"
    }

    fn entity_states(&self) -> Result<Vec<EntityState>, SensorError> {
        Err(self.unimplemented())
    }
}
