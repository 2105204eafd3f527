//! Hardware-independent core library for the smart espresso machine
//!
//! This crate contains the sensor acquisition and calibration pipeline:
//! converter abstractions over the supported ADC families, the pressure,
//! environment and flow sensors with their unit conversion and
//! self-calibration, the telemetry and display seams, and the controller that
//! reads, publishes and renders on a fixed cadence.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod bus;
pub mod config;
pub mod controller;
pub mod converter;
pub mod display;
pub mod sensor;
pub mod telemetry;

pub use controller::{Controller, Error};
