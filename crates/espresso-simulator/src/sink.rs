//! Dry-run Home Assistant sink.
//!
//! Builds the exact request the machine would send to the Home Assistant
//! REST API and logs it instead of putting it on the network.

use espresso_core::telemetry::{EntityState, TelemetrySink};
use log::info;

use crate::settings::HomeAssistant;

pub struct DryRunSink {
    base_url: String,
    verify_ssl: bool,
}

impl DryRunSink {
    pub fn new(config: &HomeAssistant) -> Self {
        info!(
            "Home Assistant dry run against {} (bearer token set, verify TLS: {})",
            config.url, config.verify_ssl
        );
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            verify_ssl: config.verify_ssl,
        }
    }

    /// State endpoint of `entity_id`.
    pub fn endpoint(&self, entity_id: &str) -> String {
        format!("{}/api/states/{}", self.base_url, entity_id)
    }

    pub fn verify_ssl(&self) -> bool {
        self.verify_ssl
    }
}

impl TelemetrySink for DryRunSink {
    type Error = serde_json::Error;

    async fn publish(&mut self, state: &EntityState) -> Result<(), Self::Error> {
        let body = serde_json::to_string(state)?;
        info!("POST {} {}", self.endpoint(&state.entity_id), body);
        Ok(())
    }
}
