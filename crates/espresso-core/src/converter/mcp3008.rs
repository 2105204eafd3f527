//! MCP3008: 10-bit SPI converter with a fixed 3.3 V reference.

use embedded_hal_async::spi::SpiDevice;
use log::{debug, error};

use super::{Converter, ConverterError, ConverterFamily, Sample};
use crate::bus::Shared;
use crate::config::ConfigurationError;

/// Reference voltage the chip is powered from.
pub const REFERENCE_VOLTAGE: f32 = 3.3;

/// Largest code a 10-bit conversion can return.
const MAX_CODE: u16 = 1023;

/// Start bit, then single-ended mode and the channel in the high nibble.
const START_BIT: u8 = 0x01;
const SINGLE_ENDED: u8 = 0x80;

const CHIP: &str = "MCP3008";

/// The chip itself. Channels share it through [`Shared`].
pub struct Mcp3008<S> {
    spi: S,
}

impl<S: SpiDevice> Mcp3008<S> {
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Run one single-ended conversion and return the raw 10-bit code.
    pub async fn convert(&mut self, channel: u8) -> Result<u16, ConverterError> {
        let tx = [START_BIT, SINGLE_ENDED | (channel << 4), 0x00];
        let mut rx = [0u8; 3];

        self.spi.transfer(&mut rx, &tx).await.map_err(|e| {
            error!("{} channel {} transfer failed: {:?}", CHIP, channel, e);
            ConverterError::Bus {
                chip: CHIP,
                operation: "single-ended conversion",
            }
        })?;

        let code = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        debug!("{} channel {}: code {}", CHIP, channel, code);
        Ok(code)
    }
}

/// One MCP3008 input channel.
pub struct Mcp3008Converter<S> {
    chip: Shared<Mcp3008<S>>,
    channel: u8,
}

impl<S: SpiDevice> Mcp3008Converter<S> {
    /// Bind `channel` (0-7) of a shared chip.
    pub fn new(chip: Shared<Mcp3008<S>>, channel: u8) -> Result<Self, ConfigurationError> {
        let channel = ConverterFamily::Mcp3008.check_channel(channel)?;
        Ok(Self { chip, channel })
    }
}

impl<S: SpiDevice> Converter for Mcp3008Converter<S> {
    fn channel(&self) -> u8 {
        self.channel
    }

    fn full_scale_voltage(&self) -> f32 {
        REFERENCE_VOLTAGE
    }

    async fn sample(&mut self) -> Result<Sample, ConverterError> {
        let code = self.chip.lock().await.convert(self.channel).await?;
        let normalized = f32::from(code) / f32::from(MAX_CODE);
        Ok(Sample::from_normalized(normalized, REFERENCE_VOLTAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::shared;
    use alloc::vec::Vec;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_hal_async::spi::{ErrorType, Operation};

    /// Answers every conversion with a fixed code per channel.
    struct FakeSpi {
        codes: [u16; 8],
        requests: Vec<[u8; 3]>,
    }

    impl FakeSpi {
        fn new(codes: [u16; 8]) -> Self {
            Self {
                codes,
                requests: Vec::new(),
            }
        }
    }

    impl ErrorType for FakeSpi {
        type Error = Infallible;
    }

    impl SpiDevice for FakeSpi {
        async fn transaction(
            &mut self,
            operations: &mut [Operation<'_, u8>],
        ) -> Result<(), Self::Error> {
            for op in operations.iter_mut() {
                if let Operation::Transfer(read, write) = op {
                    let channel = usize::from((write[1] >> 4) & 0x07);
                    let code = self.codes[channel];
                    read[1] = (code >> 8) as u8 & 0x03;
                    read[2] = code as u8;
                    self.requests.push([write[0], write[1], write[2]]);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_channel_out_of_range_is_rejected() {
        let chip = shared(Mcp3008::new(FakeSpi::new([0; 8])));
        assert!(matches!(
            Mcp3008Converter::new(chip.clone(), 8),
            Err(ConfigurationError::InvalidChannel { channel: 8, max: 7, .. })
        ));
        assert!(Mcp3008Converter::new(chip, 7).is_ok());
    }

    #[test]
    fn test_full_scale_code_reads_reference_voltage() {
        let mut codes = [0; 8];
        codes[3] = 1023;
        let chip = shared(Mcp3008::new(FakeSpi::new(codes)));
        let mut adc = Mcp3008Converter::new(chip, 3).unwrap();

        let sample = block_on(adc.sample()).unwrap();
        assert_eq!(sample.normalized, 1.0);
        assert_eq!(sample.voltage, REFERENCE_VOLTAGE);
        assert_eq!(block_on(adc.read()).unwrap(), 1.0);
    }

    #[test]
    fn test_channels_share_the_chip() {
        let mut codes = [0; 8];
        codes[0] = 0;
        codes[1] = 512;
        let chip = shared(Mcp3008::new(FakeSpi::new(codes)));
        let mut head = Mcp3008Converter::new(chip.clone(), 0).unwrap();
        let mut boiler = Mcp3008Converter::new(chip.clone(), 1).unwrap();

        assert_eq!(block_on(head.read()).unwrap(), 0.0);
        let boiler_voltage = block_on(boiler.voltage()).unwrap();
        assert_eq!(boiler_voltage, 512.0 / 1023.0 * REFERENCE_VOLTAGE);

        drop((head, boiler));
        let chip = match alloc::rc::Rc::try_unwrap(chip) {
            Ok(chip) => chip.into_inner(),
            Err(_) => panic!("converters still hold the chip"),
        };
        assert_eq!(chip.spi.requests, [[0x01, 0x80, 0x00], [0x01, 0x90, 0x00]]);
    }
}
