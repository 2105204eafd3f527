use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use sht4x::Sht4xAsync;

use super::{ClimateProbe, ClimateReading};

/// Driver failures carry no detail the caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementFailed;

/// SHT40 humidity/temperature probe on I2C.
pub struct Sht40Probe<I, D> {
    sensor: Sht4xAsync<I, D>,
    delay: D,
}

impl<I: I2c, D: DelayNs> Sht40Probe<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            sensor: Sht4xAsync::<I, D>::new(i2c),
            delay,
        }
    }
}

impl<I: I2c, D: DelayNs> ClimateProbe for Sht40Probe<I, D> {
    type Error = MeasurementFailed;

    async fn measure(&mut self) -> Result<ClimateReading, MeasurementFailed> {
        let measurement = self
            .sensor
            .measure(sht4x::Precision::High, &mut self.delay)
            .await
            .map_err(|e| {
                log::error!("SHT40 measurement failed: {:?}", e);
                MeasurementFailed
            })?;

        Ok(ClimateReading {
            humidity: measurement.humidity_percent().to_num::<f32>(),
            temperature: measurement.temperature_celsius().to_num::<f32>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};

    const PROBE_ADDRESS: u8 = 0x44;
    const MEASURE_HIGH_PRECISION: u8 = 0xFD;

    /// CRC-8 used on every Sensirion data word.
    fn crc8(word: [u8; 2]) -> u8 {
        let mut crc = 0xFFu8;
        for byte in word {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ 0x31
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    /// Answers a measure command with fixed raw words.
    struct FakeSht40 {
        temperature: u16,
        humidity: u16,
        corrupt: bool,
        command: Option<u8>,
    }

    impl FakeSht40 {
        fn new(temperature: u16, humidity: u16) -> Self {
            Self {
                temperature,
                humidity,
                corrupt: false,
                command: None,
            }
        }

        fn frame(&self) -> [u8; 6] {
            let t = self.temperature.to_be_bytes();
            let h = self.humidity.to_be_bytes();
            let mut frame = [t[0], t[1], crc8(t), h[0], h[1], crc8(h)];
            if self.corrupt {
                frame[2] ^= 0xFF;
            }
            frame
        }
    }

    impl i2c::ErrorType for FakeSht40 {
        type Error = ErrorKind;
    }

    impl i2c::I2c for FakeSht40 {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if address != PROBE_ADDRESS {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => self.command = bytes.first().copied(),
                    Operation::Read(buf) => {
                        if self.command != Some(MEASURE_HIGH_PRECISION) {
                            return Err(ErrorKind::Other);
                        }
                        for (dst, src) in buf.iter_mut().zip(self.frame()) {
                            *dst = src;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_measure_converts_raw_words() {
        // 0x6666 is 40 % of the temperature span, 0x8000 half the humidity span.
        let mut probe = Sht40Probe::new(FakeSht40::new(0x6666, 0x8000), NoDelay);

        let reading = block_on(probe.measure()).unwrap();
        assert!((reading.temperature - 25.0).abs() < 0.01, "{reading:?}");
        assert!((reading.humidity - 56.5).abs() < 0.01, "{reading:?}");
    }

    #[test]
    fn test_bad_checksum_fails_measurement() {
        let mut fake = FakeSht40::new(0x6666, 0x8000);
        fake.corrupt = true;
        let mut probe = Sht40Probe::new(fake, NoDelay);

        assert_eq!(block_on(probe.measure()), Err(MeasurementFailed));
    }
}
