//! The acquisition loop
//!
//! A [`Controller`] owns an ordered list of sensors and, optionally, a
//! telemetry sink and a screen. Every cycle it reads all sensors, publishes
//! their values and renders one line per sensor, then sleeps for the render
//! interval.
//!
//! Per-cycle failures (a bus glitch, a rejected publish, a render error) are
//! logged and the loop carries on. Only configuration problems and
//! conversions that do not exist stop it.

use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::config::{ConfigurationError, ControllerConfig};
use crate::display::{NoScreen, Screen, layout_lines};
use crate::sensor::{PublishError, Sensor, SensorError};
use crate::telemetry::{NoSink, TelemetrySink};

/// Shortest pause between cycles, so the loop never spins.
pub const MIN_PAUSE_MS: u32 = 1;

/// Errors that stop the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(ConfigurationError),
    #[error("sensor error: {0}")]
    Sensor(SensorError),
}

impl From<ConfigurationError> for Error {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
}

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    pub read_failures: usize,
    pub publish_failures: usize,
    /// Entity states accepted by the sink.
    pub published: usize,
    pub rendered: bool,
}

pub struct Controller<S, D, T = NoSink, W = NoScreen> {
    sensors: Vec<S>,
    delay: D,
    sink: Option<T>,
    screen: Option<W>,
    config: ControllerConfig,
    state: ControllerState,
}

impl<S, D> Controller<S, D>
where
    S: Sensor,
    D: DelayNs,
{
    /// A controller that only reads. Sensors are processed in the given
    /// order, which is also the order of the lines on screen.
    pub fn new(sensors: Vec<S>, delay: D) -> Self {
        Self {
            sensors,
            delay,
            sink: None,
            screen: None,
            config: ControllerConfig::default(),
            state: ControllerState::Idle,
        }
    }
}

impl<S, D, T, W> Controller<S, D, T, W>
where
    S: Sensor,
    D: DelayNs,
    T: TelemetrySink,
    W: Screen,
{
    pub fn with_sink<T2: TelemetrySink>(self, sink: Option<T2>) -> Controller<S, D, T2, W> {
        Controller {
            sensors: self.sensors,
            delay: self.delay,
            sink,
            screen: self.screen,
            config: self.config,
            state: self.state,
        }
    }

    pub fn with_screen<W2: Screen>(self, screen: Option<W2>) -> Controller<S, D, T, W2> {
        Controller {
            sensors: self.sensors,
            delay: self.delay,
            sink: self.sink,
            screen,
            config: self.config,
            state: self.state,
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Cycle forever. Only returns on a fatal error.
    ///
    /// An empty sensor list is rejected before any hardware is touched.
    pub async fn run(&mut self) -> Result<Infallible, Error> {
        if self.sensors.is_empty() {
            return Err(ConfigurationError::NoSensors.into());
        }

        let pause_ms = u32::try_from(self.config.render_interval.as_millis())
            .unwrap_or(u32::MAX)
            .max(MIN_PAUSE_MS);
        info!(
            "Controller running: {} sensor(s), sink {}, screen {}, every {} ms",
            self.sensors.len(),
            if self.sink.is_some() { "on" } else { "off" },
            if self.screen.is_some() { "on" } else { "off" },
            pause_ms
        );
        self.state = ControllerState::Running;

        loop {
            if let Err(e) = self.cycle().await {
                error!("Controller stopped: {}", e);
                self.state = ControllerState::Idle;
                return Err(e);
            }
            self.delay.delay_ms(pause_ms).await;
        }
    }

    /// One read, publish, render pass.
    pub async fn cycle(&mut self) -> Result<CycleReport, Error> {
        let mut report = CycleReport::default();

        for sensor in self.sensors.iter_mut() {
            if let Err(e) = sensor.read().await {
                if e.is_fatal() {
                    return Err(e.into());
                }
                warn!("{}: read failed: {}", sensor.name(), e);
                report.read_failures += 1;
            }
        }

        if let Some(sink) = self.sink.as_mut() {
            for sensor in &self.sensors {
                match sensor.publish(Some(&mut *sink)).await {
                    Ok(count) => report.published += count,
                    Err(PublishError::Sensor(e)) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        warn!("{}: {}", sensor.name(), e);
                        report.publish_failures += 1;
                    }
                }
            }
        }

        if let Some(screen) = self.screen.as_mut() {
            let mut messages = Vec::with_capacity(self.sensors.len());
            for sensor in &self.sensors {
                match sensor.message() {
                    Ok(message) => messages.push(message),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => warn!("{}: {}", sensor.name(), e),
                }
            }

            match screen.render(&layout_lines(messages)) {
                Ok(()) => report.rendered = true,
                Err(e) => warn!("Render failed: {:?}", e),
            }
        }

        debug!("Cycle done: {:?}", report);
        Ok(report)
    }
}
