//! Telemetry sink seam
//!
//! Sensors describe what they want published as [`EntityState`]s; a
//! [`TelemetrySink`] pushes them to the home-automation state store. The
//! payload serializes to the body of a Home Assistant `POST
//! /api/states/<entity_id>` request.

use alloc::string::String;
use core::fmt::Debug;

use serde::Serialize;

/// One entity update.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EntityState {
    /// Target entity, carried in the request path rather than the body.
    #[serde(skip)]
    pub entity_id: String,
    /// Value already rounded to the quantity's display precision.
    pub state: f32,
    pub attributes: EntityAttributes,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EntityAttributes {
    pub unit_of_measurement: &'static str,
    pub friendly_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
}

/// Receives periodic sensor values. Fire-and-forget: the caller logs a
/// failure and moves on.
pub trait TelemetrySink {
    type Error: Debug;

    fn publish(&mut self, state: &EntityState) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Sink type of a controller that has no telemetry configured. It has no
/// values, so it can only ever appear as `None`.
#[derive(Debug)]
pub enum NoSink {}

impl TelemetrySink for NoSink {
    type Error = core::convert::Infallible;

    async fn publish(&mut self, _state: &EntityState) -> Result<(), Self::Error> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_payload_matches_state_body() {
        let state = EntityState {
            entity_id: "sensor.espresso_machine_head_pressure".to_string(),
            state: 9.25,
            attributes: EntityAttributes {
                unit_of_measurement: "bar",
                friendly_name: "Head Pressure".to_string(),
                device_class: Some("pressure"),
            },
        };

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "state": 9.25,
                "attributes": {
                    "unit_of_measurement": "bar",
                    "friendly_name": "Head Pressure",
                    "device_class": "pressure",
                }
            })
        );
    }

    #[test]
    fn test_payload_omits_missing_device_class() {
        let state = EntityState {
            entity_id: "sensor.espresso_machine_water_flow".to_string(),
            state: 0.0,
            attributes: EntityAttributes {
                unit_of_measurement: "L",
                friendly_name: "Water Flow".to_string(),
                device_class: None,
            },
        };

        let json = serde_json::to_value(&state).unwrap();
        assert!(json["attributes"].get("device_class").is_none());
        assert!(json.get("entity_id").is_none());
    }
}
