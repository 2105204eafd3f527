//! ADS1115: 16-bit I2C converter with a programmable-gain amplifier.
//!
//! Up to four chips can sit on one bus (addresses 0x48-0x4B). Every channel
//! of a chip goes through the same [`Shared`] handle, which the
//! [`Ads1115Registry`] creates on first use of an address and hands out
//! again for later channels.

use alloc::collections::BTreeMap;
use core::str::FromStr;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{Converter, ConverterError, ConverterFamily, Sample};
use crate::bus::{AsyncI2cDevice, Shared, shared};
use crate::config::ConfigurationError;

/// Address with the ADDR pin tied to ground.
pub const DEFAULT_ADDRESS: u8 = 0x48;

const CHIP: &str = "ADS1115";

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// Written: start a single conversion. Read: no conversion in progress.
const CONFIG_OS: u16 = 0x8000;
/// AINx against GND; the channel is added to this base.
const CONFIG_MUX_SINGLE_BASE: u16 = 0b100;
const CONFIG_MODE_SINGLE_SHOT: u16 = 0x0100;
/// 860 samples per second.
const CONFIG_DATA_RATE_860: u16 = 0b111 << 5;
const CONFIG_COMPARATOR_DISABLED: u16 = 0x0003;

/// One conversion at 860 SPS takes a little under 1.2 ms.
const CONVERSION_TIME_US: u32 = 1_200;
const MAX_READY_POLLS: usize = 5;

/// Programmable-gain amplifier setting.
///
/// The gain selects the full-scale input range. `TwoThirds` covers a 5 V
/// sensor output; `One` covers 4.096 V.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gain {
    TwoThirds,
    #[default]
    One,
    Two,
    Four,
    Eight,
    Sixteen,
}

impl Gain {
    /// Voltage that reads as full scale: `4.096 / gain`, or 6.144 V for 2/3.
    pub const fn full_scale_voltage(self) -> f32 {
        match self {
            Self::TwoThirds => 6.144,
            Self::One => 4.096,
            Self::Two => 2.048,
            Self::Four => 1.024,
            Self::Eight => 0.512,
            Self::Sixteen => 0.256,
        }
    }

    const fn pga_bits(self) -> u16 {
        let bits = match self {
            Self::TwoThirds => 0b000,
            Self::One => 0b001,
            Self::Two => 0b010,
            Self::Four => 0b011,
            Self::Eight => 0b100,
            Self::Sixteen => 0b101,
        };
        bits << 9
    }
}

impl FromStr for Gain {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2/3" => Ok(Self::TwoThirds),
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            "4" => Ok(Self::Four),
            "8" => Ok(Self::Eight),
            "16" => Ok(Self::Sixteen),
            other => Err(ConfigurationError::invalid("ADS_GAIN", other)),
        }
    }
}

/// One chip on the bus.
pub struct Ads1115<I, D> {
    i2c: I,
    address: u8,
    delay: D,
}

impl<I: I2c, D: DelayNs> Ads1115<I, D> {
    pub fn new(i2c: I, address: u8, delay: D) -> Self {
        Self {
            i2c,
            address,
            delay,
        }
    }

    /// Run one single-shot conversion of `channel` against ground and return
    /// the signed result.
    pub async fn convert(&mut self, channel: u8, gain: Gain) -> Result<i16, ConverterError> {
        let config = CONFIG_OS
            | ((CONFIG_MUX_SINGLE_BASE + u16::from(channel)) << 12)
            | gain.pga_bits()
            | CONFIG_MODE_SINGLE_SHOT
            | CONFIG_DATA_RATE_860
            | CONFIG_COMPARATOR_DISABLED;
        let [hi, lo] = config.to_be_bytes();

        self.i2c
            .write(self.address, &[REG_CONFIG, hi, lo])
            .await
            .map_err(|e| {
                error!("{} @ {:#04x} config write failed: {:?}", CHIP, self.address, e);
                ConverterError::Bus {
                    chip: CHIP,
                    operation: "start conversion",
                }
            })?;

        // Wait for the OS bit to come back before reading the result,
        // max of MAX_READY_POLLS checks.
        let mut ready = false;
        for _ in 0..MAX_READY_POLLS {
            self.delay.delay_us(CONVERSION_TIME_US).await;
            let status = self.read_register(REG_CONFIG, "check conversion status").await?;
            if status & CONFIG_OS != 0 {
                ready = true;
                break;
            }
        }

        if !ready {
            error!("{} @ {:#04x} conversion not ready", CHIP, self.address);
            return Err(ConverterError::Timeout { chip: CHIP });
        }

        let raw = self.read_register(REG_CONVERSION, "read conversion").await? as i16;
        debug!(
            "{} @ {:#04x} channel {}: raw {}",
            CHIP, self.address, channel, raw
        );
        Ok(raw)
    }

    async fn read_register(
        &mut self,
        register: u8,
        operation: &'static str,
    ) -> Result<u16, ConverterError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .await
            .map_err(|e| {
                error!("{} @ {:#04x} {} failed: {:?}", CHIP, self.address, operation, e);
                ConverterError::Bus {
                    chip: CHIP,
                    operation,
                }
            })?;
        Ok(u16::from_be_bytes(buf))
    }
}

/// One ADS1115 input channel with its own gain.
pub struct Ads1115Converter<I, D> {
    chip: Shared<Ads1115<I, D>>,
    channel: u8,
    gain: Gain,
}

impl<I: I2c, D: DelayNs> Ads1115Converter<I, D> {
    /// Bind `channel` (0-3) of a shared chip.
    pub fn new(
        chip: Shared<Ads1115<I, D>>,
        channel: u8,
        gain: Gain,
    ) -> Result<Self, ConfigurationError> {
        let channel = ConverterFamily::Ads1115.check_channel(channel)?;
        Ok(Self {
            chip,
            channel,
            gain,
        })
    }
}

impl<I: I2c, D: DelayNs> Converter for Ads1115Converter<I, D> {
    fn channel(&self) -> u8 {
        self.channel
    }

    fn full_scale_voltage(&self) -> f32 {
        self.gain.full_scale_voltage()
    }

    async fn sample(&mut self) -> Result<Sample, ConverterError> {
        let raw = self.chip.lock().await.convert(self.channel, self.gain).await?;
        let full_scale = self.full_scale_voltage();
        let voltage = f32::from(raw) * full_scale / 32768.0;
        Ok(Sample::from_voltage(voltage, full_scale))
    }
}

/// Pool of ADS1115 chips on one bus, keyed by address.
///
/// Owned by whatever builds the converters. The first converter requested
/// for an address creates the chip handle; later requests reuse it, so all
/// channels of one chip serialize their conversions.
pub struct Ads1115Registry<'a, M: RawMutex, B, D> {
    bus: &'a Mutex<M, B>,
    delay: D,
    chips: BTreeMap<u8, Shared<Ads1115<AsyncI2cDevice<'a, M, B>, D>>>,
}

impl<'a, M, B, D> Ads1115Registry<'a, M, B, D>
where
    M: RawMutex,
    B: I2c,
    D: DelayNs + Clone,
{
    pub fn new(bus: &'a Mutex<M, B>, delay: D) -> Self {
        Self {
            bus,
            delay,
            chips: BTreeMap::new(),
        }
    }

    /// Get a converter for `channel` of the chip at `address`.
    pub fn converter(
        &mut self,
        channel: u8,
        gain: Gain,
        address: u8,
    ) -> Result<Ads1115Converter<AsyncI2cDevice<'a, M, B>, D>, ConfigurationError> {
        let channel = ConverterFamily::Ads1115.check_channel(channel)?;

        let bus = self.bus;
        let delay = &self.delay;
        let chip = self
            .chips
            .entry(address)
            .or_insert_with(|| {
                info!("{}: registering chip at {:#04x}", CHIP, address);
                shared(Ads1115::new(AsyncI2cDevice::new(bus), address, delay.clone()))
            })
            .clone();

        Ads1115Converter::new(chip, channel, gain)
    }

    /// Number of distinct chips handed out so far.
    pub fn chip_count(&self) -> usize {
        self.chips.len()
    }
}
