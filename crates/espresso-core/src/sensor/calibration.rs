//! Pressure calibration strategies
//!
//! Each strategy works in two steps. [`PressureCalibration::ingest`] lets a
//! fresh sample move the calibration state, then [`PressureCalibration::mpa`]
//! converts a sample with the current state and changes nothing.

use core::str::FromStr;

use log::info;

use crate::config::{ConfigurationError, DEFAULT_MAX_PRESSURE_MPA};
use crate::converter::Sample;

/// Transducer output at zero pressure.
pub const SENSOR_MIN_VOLTAGE: f32 = 0.5;
/// Transducer output at rated pressure.
pub const SENSOR_MAX_VOLTAGE: f32 = 4.5;
/// Lowest zero-point offset the ranged strategy will learn.
pub const MAX_OFFSET_DRIFT: f32 = -0.1;

/// Starting floor of the running-minimum strategy, as a normalized reading.
pub const INITIAL_RUNNING_MINIMUM: f32 = 0.097_215_44;

/// Ratiometric 0.5-4.5 V transducer that learns a downward zero-point drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangedVoltage {
    max_pressure_mpa: f32,
    offset_voltage: f32,
}

impl RangedVoltage {
    pub const fn new(max_pressure_mpa: f32) -> Self {
        Self {
            max_pressure_mpa,
            offset_voltage: 0.0,
        }
    }

    /// Learned zero-point correction in volts, within `MAX_OFFSET_DRIFT..=0`.
    pub fn offset_voltage(&self) -> f32 {
        self.offset_voltage
    }

    /// Lower the offset when `voltage` sits below the current zero point.
    /// The offset only ever decreases. Returns true when it moved.
    pub fn ingest(&mut self, voltage: f32) -> bool {
        let offset = (voltage - SENSOR_MIN_VOLTAGE).max(MAX_OFFSET_DRIFT);
        if offset >= self.offset_voltage {
            return false;
        }
        self.offset_voltage = offset;
        info!("Pressure zero point drifted, offset now {:.3} V", offset);
        true
    }

    pub fn mpa(&self, voltage: f32) -> f32 {
        let effective = (voltage - SENSOR_MIN_VOLTAGE - self.offset_voltage).max(0.0);
        effective / (SENSOR_MAX_VOLTAGE - SENSOR_MIN_VOLTAGE) * self.max_pressure_mpa
    }
}

impl Default for RangedVoltage {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRESSURE_MPA)
    }
}

/// Single-sensor calibration that treats the lowest normalized reading seen
/// so far as zero pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningMinimum {
    minimum: f32,
}

impl RunningMinimum {
    /// Normalized-reading span that maps to 1 MPa.
    const SPAN: f32 = 2.0;

    pub const fn new() -> Self {
        Self {
            minimum: INITIAL_RUNNING_MINIMUM,
        }
    }

    pub fn minimum(&self) -> f32 {
        self.minimum
    }

    /// Returns true when `normalized` became the new minimum.
    pub fn ingest(&mut self, normalized: f32) -> bool {
        if normalized >= self.minimum {
            return false;
        }
        self.minimum = normalized;
        info!("New minimum pressure reading: {}", normalized);
        true
    }

    pub fn mpa(&self, normalized: f32) -> f32 {
        (normalized - self.minimum) / Self::SPAN
    }
}

impl Default for RunningMinimum {
    fn default() -> Self {
        Self::new()
    }
}

/// The calibration a [`super::PressureSensor`] applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressureCalibration {
    Ranged(RangedVoltage),
    RunningMinimum(RunningMinimum),
}

impl PressureCalibration {
    /// Feed one sample. Returns true when the zero point moved.
    pub fn ingest(&mut self, sample: Sample) -> bool {
        match self {
            Self::Ranged(c) => c.ingest(sample.voltage),
            Self::RunningMinimum(c) => c.ingest(sample.normalized),
        }
    }

    pub fn mpa(&self, sample: Sample) -> f32 {
        match self {
            Self::Ranged(c) => c.mpa(sample.voltage),
            Self::RunningMinimum(c) => c.mpa(sample.normalized),
        }
    }

    /// Learned voltage offset; only the ranged strategy has one.
    pub fn offset_voltage(&self) -> Option<f32> {
        match self {
            Self::Ranged(c) => Some(c.offset_voltage()),
            Self::RunningMinimum(_) => None,
        }
    }
}

impl Default for PressureCalibration {
    fn default() -> Self {
        Self::Ranged(RangedVoltage::default())
    }
}

/// Name of a calibration strategy as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationKind {
    #[default]
    Ranged,
    RunningMinimum,
}

impl CalibrationKind {
    /// Fresh calibration state of this kind.
    pub fn build(self, max_pressure_mpa: f32) -> PressureCalibration {
        match self {
            Self::Ranged => PressureCalibration::Ranged(RangedVoltage::new(max_pressure_mpa)),
            Self::RunningMinimum => PressureCalibration::RunningMinimum(RunningMinimum::new()),
        }
    }
}

impl FromStr for CalibrationKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ranged" => Ok(Self::Ranged),
            "running-minimum" => Ok(Self::RunningMinimum),
            other => Err(ConfigurationError::invalid("PRESSURE_CALIBRATION", other)),
        }
    }
}
