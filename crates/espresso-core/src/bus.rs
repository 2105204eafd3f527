//! Shared bus handles
//!
//! The ADS1115 converters and the OLED panel all hang off one I2C bus, and
//! several converter channels talk to the same chip. Both kinds of sharing go
//! through an embassy [`Mutex`] so multi-step transactions stay atomic.

use alloc::rc::Rc;

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

/// A chip handle shared by every converter channel that addresses it.
///
/// The pipeline runs on a single thread, so the lock never contends; it only
/// keeps a configure/wait/read-back conversion from interleaving with another
/// channel's conversion on the same chip.
pub type Shared<T> = Rc<Mutex<NoopRawMutex, T>>;

/// Wrap a chip so it can be handed to several converters.
pub fn shared<T>(chip: T) -> Shared<T> {
    Rc::new(Mutex::new(chip))
}

/// Async I2C bus sharing device.
///
/// Each device on the bus gets its own `AsyncI2cDevice`; every operation
/// locks the bus for the duration of the transaction and awaits it instead of
/// blocking.
///
/// The raw mutex is a parameter: a single-threaded controller uses
/// [`NoopRawMutex`], a bus shared with interrupt handlers uses
/// `CriticalSectionRawMutex`.
///
/// # Example
///
/// ```no_run
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
/// use embassy_sync::mutex::Mutex;
/// # use espresso_core::bus::AsyncI2cDevice;
/// # fn demo<T: embedded_hal_async::i2c::I2c>(i2c: T) {
/// let bus: Mutex<NoopRawMutex, T> = Mutex::new(i2c);
///
/// let adc = AsyncI2cDevice::new(&bus);
/// let oled = AsyncI2cDevice::new(&bus);
/// # let _ = (adc, oled);
/// # }
/// ```
pub struct AsyncI2cDevice<'a, M: RawMutex, T> {
    bus: &'a Mutex<M, T>,
}

impl<'a, M: RawMutex, T> AsyncI2cDevice<'a, M, T> {
    /// Create a new `AsyncI2cDevice`.
    #[inline]
    pub const fn new(bus: &'a Mutex<M, T>) -> Self {
        Self { bus }
    }
}

impl<M: RawMutex, T> Clone for AsyncI2cDevice<'_, M, T> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<M, T> ErrorType for AsyncI2cDevice<'_, M, T>
where
    M: RawMutex,
    T: ErrorType,
{
    type Error = T::Error;
}

impl<M, T> I2c for AsyncI2cDevice<'_, M, T>
where
    M: RawMutex,
    T: I2c,
{
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.read(address, read).await
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.write(address, write).await
    }

    /// The register pointer write and the read back happen under one lock,
    /// so no other device can move the pointer in between.
    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.write_read(address, write, read).await
    }

    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.transaction(address, operations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use core::convert::Infallible;
    use embassy_futures::block_on;

    /// Records every address touched on the bus.
    #[derive(Default)]
    struct RecordingBus {
        touched: Vec<u8>,
    }

    impl ErrorType for RecordingBus {
        type Error = Infallible;
    }

    impl I2c for RecordingBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations.iter_mut() {
                if let Operation::Read(buf) = op {
                    buf.fill(address);
                }
            }
            self.touched.push(address);
            Ok(())
        }
    }

    #[test]
    fn test_devices_share_one_bus() {
        let bus: Mutex<NoopRawMutex, RecordingBus> = Mutex::new(RecordingBus::default());
        let mut adc = AsyncI2cDevice::new(&bus);
        let mut oled = AsyncI2cDevice::new(&bus);

        block_on(async {
            let mut buf = [0u8; 2];
            adc.write_read(0x48, &[0x00], &mut buf).await.unwrap();
            assert_eq!(buf, [0x48, 0x48]);
            oled.write(0x3C, &[0xAE]).await.unwrap();
        });

        let bus = bus.into_inner();
        assert_eq!(bus.touched, [0x48, 0x3C]);
    }
}
