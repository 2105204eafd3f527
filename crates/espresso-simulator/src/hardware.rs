//! Simulated machine hardware.
//!
//! A [`Machine`] plays back a repeating shot profile. The converter fakes
//! answer at register level, so the real `espresso-core` drivers run
//! unmodified against them.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, ErrorKind, NoAcknowledgeSource};
use embedded_hal_async::spi::{self, Operation, SpiDevice};
use espresso_core::sensor::{ClimateProbe, ClimateReading, Clock};
use log::debug;

/// Length of one simulated brew cycle.
const SHOT_PERIOD_SECS: f32 = 30.0;
/// Rating the simulated transducers are built for.
const TRANSDUCER_MAX_MPA: f32 = 2.0;
/// Idle transducer output, a little below the nominal 0.5 V zero point.
const IDLE_VOLTAGE: f32 = 0.47;

/// MCP3008 reference voltage.
const MCP3008_REFERENCE: f32 = 3.3;

const ADS_REG_CONVERSION: u8 = 0x00;
const ADS_REG_CONFIG: u8 = 0x01;
const ADS_CONFIG_OS: u16 = 0x8000;

/// Shared time base of the simulated machine.
#[derive(Debug, Clone, Copy)]
pub struct Machine {
    start: Instant,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Voltage present at converter input `channel`.
    ///
    /// Channel 0 follows the group head through a shot, channel 1 sits at
    /// boiler pressure and the remaining inputs carry a small flow meter
    /// signal.
    pub fn input_voltage(&self, channel: u8) -> f32 {
        let t = self.elapsed();
        match channel {
            0 => head_voltage(t % SHOT_PERIOD_SECS),
            1 => transducer_voltage(0.12 + 0.01 * (t / 3.0).sin()),
            _ => 0.2 + 0.05 * (t * 2.0).sin().abs(),
        }
    }
}

fn transducer_voltage(mpa: f32) -> f32 {
    0.5 + mpa / TRANSDUCER_MAX_MPA * 4.0
}

/// Idle, pre-infusion ramp, extraction plateau, release.
fn head_voltage(t: f32) -> f32 {
    let mpa = match t {
        t if t < 5.0 => return IDLE_VOLTAGE,
        t if t < 8.0 => (t - 5.0) / 3.0 * 0.3,
        t if t < 10.0 => 0.3 + (t - 8.0) / 2.0 * 0.6,
        t if t < 25.0 => 0.9 + 0.02 * (t * 1.7).sin(),
        t if t < 27.0 => 0.9 * (27.0 - t) / 2.0,
        _ => return IDLE_VOLTAGE,
    };
    transducer_voltage(mpa)
}

/// MCP3008 on an SPI device.
pub struct SimulatedMcp3008 {
    machine: Machine,
}

impl SimulatedMcp3008 {
    pub fn new(machine: Machine) -> Self {
        Self { machine }
    }

    fn answer(&self, request: &[u8], response: &mut [u8]) {
        if request.len() < 3 || response.len() < 3 {
            return;
        }
        let channel = (request[1] >> 4) & 0x07;
        let voltage = self.machine.input_voltage(channel);
        let code = (voltage / MCP3008_REFERENCE * 1023.0).clamp(0.0, 1023.0) as u16;
        response[0] = 0;
        response[1] = (code >> 8) as u8 & 0x03;
        response[2] = code as u8;
    }
}

impl spi::ErrorType for SimulatedMcp3008 {
    type Error = Infallible;
}

impl SpiDevice for SimulatedMcp3008 {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Transfer(read, write) => self.answer(write, read),
                Operation::TransferInPlace(buf) if buf.len() >= 3 => {
                    let request = [buf[0], buf[1], buf[2]];
                    self.answer(&request, buf);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// One ADS1115 on an I2C bus. Every other address NAKs.
pub struct SimulatedAds1115 {
    machine: Machine,
    address: u8,
    pointer: u8,
    config: u16,
}

impl SimulatedAds1115 {
    pub fn new(machine: Machine, address: u8) -> Self {
        Self {
            machine,
            address,
            pointer: ADS_REG_CONVERSION,
            config: 0,
        }
    }

    fn full_scale(&self) -> f32 {
        match (self.config >> 9) & 0x07 {
            0 => 6.144,
            1 => 4.096,
            2 => 2.048,
            3 => 1.024,
            4 => 0.512,
            _ => 0.256,
        }
    }

    fn conversion(&self) -> u16 {
        let channel = ((self.config >> 12) & 0x03) as u8;
        let voltage = self.machine.input_voltage(channel);
        let raw = (voltage / self.full_scale() * 32768.0).clamp(-32768.0, 32767.0);
        raw as i16 as u16
    }
}

impl i2c::ErrorType for SimulatedAds1115 {
    type Error = ErrorKind;
}

impl i2c::I2c for SimulatedAds1115 {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    let Some(&register) = bytes.first() else {
                        continue;
                    };
                    self.pointer = register;
                    if register == ADS_REG_CONFIG && bytes.len() == 3 {
                        // Conversions finish instantly.
                        self.config = u16::from_be_bytes([bytes[1], bytes[2]]) | ADS_CONFIG_OS;
                    }
                }
                i2c::Operation::Read(buf) => {
                    let value = match self.pointer {
                        ADS_REG_CONFIG => self.config,
                        _ => self.conversion(),
                    };
                    for (dst, src) in buf.iter_mut().zip(value.to_be_bytes()) {
                        *dst = src;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Humidity/temperature probe in a warm kitchen. Every seventh
/// measurement fails the way a CRC error on the real bus would.
pub struct SimulatedProbe {
    machine: Machine,
    measurements: u32,
}

impl SimulatedProbe {
    pub fn new(machine: Machine) -> Self {
        Self {
            machine,
            measurements: 0,
        }
    }
}

impl ClimateProbe for SimulatedProbe {
    type Error = &'static str;

    async fn measure(&mut self) -> Result<ClimateReading, Self::Error> {
        self.measurements += 1;
        if self.measurements % 7 == 0 {
            return Err("CRC mismatch");
        }

        let t = self.machine.elapsed();
        let reading = ClimateReading {
            humidity: 55.0 + 8.0 * (t / 45.0).sin(),
            temperature: 24.0 + 2.5 * (t / 90.0).sin(),
        };
        debug!("Probe: {:?}", reading);
        Ok(reading)
    }
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Blocking delay. The pipeline runs on one thread, so sleeping it is the
/// same as yielding.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    async fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::mutex::Mutex;
    use espresso_core::bus::shared;
    use espresso_core::converter::{
        Ads1115Registry, Converter, Gain, Mcp3008, Mcp3008Converter,
    };

    #[test]
    fn test_shot_profile() {
        assert_eq!(head_voltage(1.0), IDLE_VOLTAGE);
        assert!((head_voltage(9.0) - transducer_voltage(0.6)).abs() < 1e-4);
        let plateau = head_voltage(15.0);
        assert!(plateau > transducer_voltage(0.85) && plateau < transducer_voltage(0.95));
        assert_eq!(head_voltage(29.0), IDLE_VOLTAGE);
    }

    #[test]
    fn test_core_driver_reads_simulated_ads1115() {
        let machine = Machine::new();
        let bus = Mutex::<NoopRawMutex, _>::new(SimulatedAds1115::new(machine, 0x48));
        let mut registry = Ads1115Registry::new(&bus, StdDelay);

        let mut boiler = registry.converter(1, Gain::TwoThirds, 0x48).unwrap();
        let voltage = block_on(boiler.voltage()).unwrap();
        assert!(voltage > 0.7 && voltage < 0.8, "{voltage}");

        let mut missing = registry.converter(0, Gain::TwoThirds, 0x49).unwrap();
        assert!(block_on(missing.sample()).is_err());
    }

    #[test]
    fn test_core_driver_reads_simulated_mcp3008() {
        let chip = shared(Mcp3008::new(SimulatedMcp3008::new(Machine::new())));
        let mut flow = Mcp3008Converter::new(chip, 2).unwrap();

        let voltage = block_on(flow.voltage()).unwrap();
        assert!(voltage > 0.19 && voltage < 0.26, "{voltage}");
    }
}
