//! Exclusive ownership of the physical camera.
//!
//! The [`CameraGate`] is a single-permit semaphore: whoever holds the permit
//! may open the device, everyone else is turned away with
//! [`GateError::Busy`]. A [`CameraHandle`] bundles the permit with the open
//! device and gives both back when it is released or dropped.

use super::camera::{Camera, CameraDriver, CameraError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Errors from acquiring the camera.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("camera is busy")]
    Busy,
    #[error(transparent)]
    Device(#[from] CameraError),
}

/// Gate serializing access to the single camera.
pub struct CameraGate {
    driver: Arc<dyn CameraDriver>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl CameraGate {
    /// Creates a fail-fast gate.
    pub fn new(driver: Arc<dyn CameraDriver>) -> Self {
        Self::with_timeout(driver, Duration::ZERO)
    }

    /// Creates a gate that waits at most `acquire_timeout` for the camera.
    pub fn with_timeout(driver: Arc<dyn CameraDriver>, acquire_timeout: Duration) -> Self {
        Self {
            driver,
            permits: Arc::new(Semaphore::new(1)),
            acquire_timeout,
        }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Whether some operation currently owns the camera.
    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Reserves the camera without opening it.
    ///
    /// Never waits longer than the configured timeout.
    pub async fn reserve(&self) -> Result<Reservation, GateError> {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) if !self.acquire_timeout.is_zero() => {
                match tokio::time::timeout(
                    self.acquire_timeout,
                    Arc::clone(&self.permits).acquire_owned(),
                )
                .await
                {
                    Ok(Ok(permit)) => permit,
                    _ => return Err(GateError::Busy),
                }
            }
            Err(_) => return Err(GateError::Busy),
        };

        Ok(Reservation {
            permit,
            driver: Arc::clone(&self.driver),
        })
    }

    /// Reserves and opens the camera in one step.
    pub fn try_acquire(&self) -> Result<CameraHandle, GateError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| GateError::Busy)?;
        Reservation {
            permit,
            driver: Arc::clone(&self.driver),
        }
        .open()
    }
}

/// A held gate permit whose device is not open yet.
///
/// Dropping it returns the permit.
pub struct Reservation {
    permit: OwnedSemaphorePermit,
    driver: Arc<dyn CameraDriver>,
}

impl Reservation {
    /// Opens the device. Blocking; on failure the permit is returned.
    pub fn open(self) -> Result<CameraHandle, GateError> {
        let camera = self.driver.open().map_err(|e| {
            tracing::warn!(driver = self.driver.name(), error = %e, "Camera open failed");
            GateError::Device(e)
        })?;
        tracing::debug!(driver = self.driver.name(), "Camera acquired");
        Ok(CameraHandle {
            camera: Some(camera),
            permit: Some(self.permit),
        })
    }
}

/// Exclusive access to the open camera.
pub struct CameraHandle {
    camera: Option<Box<dyn Camera>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl CameraHandle {
    /// The device, or `NotInitialized` once released.
    pub fn camera(&mut self) -> Result<&mut dyn Camera, CameraError> {
        match self.camera.as_mut() {
            Some(camera) => Ok(&mut **camera),
            None => Err(CameraError::NotInitialized),
        }
    }

    pub fn is_released(&self) -> bool {
        self.camera.is_none()
    }

    /// Stops any recording, closes the device and frees the gate.
    ///
    /// Idempotent.
    pub fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if camera.is_recording() {
                if let Err(e) = camera.stop_recording() {
                    tracing::warn!(error = %e, "Stop during release failed");
                }
            }
            camera.close();
            tracing::debug!("Camera released");
        }
        // Device closed before the permit goes back.
        self.permit.take();
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::{MockDriver, MockFaults};

    fn gate() -> (CameraGate, Arc<MockDriver>) {
        let driver = Arc::new(MockDriver::new());
        (CameraGate::new(driver.clone()), driver)
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let (gate, driver) = gate();
        let mut first = gate.try_acquire().unwrap();
        assert!(gate.is_held());
        assert!(matches!(gate.try_acquire(), Err(GateError::Busy)));
        assert_eq!(driver.stats().opened(), 1);

        first.release();
        assert!(!gate.is_held());
        assert_eq!(driver.stats().live(), 0);
        let _second = gate.try_acquire().unwrap();
    }

    #[test]
    fn test_release_is_idempotent_and_drop_releases() {
        let (gate, driver) = gate();
        {
            let mut handle = gate.try_acquire().unwrap();
            handle.release();
            handle.release();
            assert!(handle.is_released());
            assert!(handle.camera().is_err());
        }
        {
            let _handle = gate.try_acquire().unwrap();
        }
        assert!(!gate.is_held());
        assert_eq!(driver.stats().closed(), 2);
    }

    #[test]
    fn test_failed_open_frees_gate() {
        let driver = Arc::new(MockDriver::with_faults(MockFaults {
            open: true,
            ..Default::default()
        }));
        let gate = CameraGate::new(driver.clone());
        assert!(matches!(gate.try_acquire(), Err(GateError::Device(_))));
        assert!(!gate.is_held());

        driver.set_faults(MockFaults::default());
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_bounded_wait_gives_up() {
        let driver = Arc::new(MockDriver::new());
        let gate = CameraGate::with_timeout(driver, Duration::from_millis(50));
        let _held = gate.reserve().await.unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(gate.reserve().await, Err(GateError::Busy)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_bounded_wait_succeeds_after_release() {
        let driver = Arc::new(MockDriver::new());
        let gate = Arc::new(CameraGate::with_timeout(driver, Duration::from_secs(2)));
        let held = gate.reserve().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.reserve().await.is_ok() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert!(waiter.await.unwrap());
    }
}
