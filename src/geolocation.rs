//! Single-shot device position requests.

use log::debug;
use poll_promise::Promise;
use std::sync::Arc;
use thiserror::Error;

use crate::projection::GeoPos;

/// Why a position could not be determined.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    /// The user or the platform refused access to the position.
    #[error("Permission to read the device position was denied")]
    PermissionDenied,

    /// No position source could produce a fix.
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    /// The source gave up waiting for a fix.
    #[error("Timed out while waiting for a position")]
    Timeout,
}

/// A source of the current device position.
///
/// `current_position` runs on a background thread and may block.
pub trait Geolocation: Send + 'static {
    /// Returns the current position.
    fn current_position(&self) -> Result<GeoPos, GeolocationError>;
}

/// A position source that always reports the same place.
#[derive(Clone, Copy, Debug)]
pub struct FixedGeolocation(pub GeoPos);

impl Geolocation for FixedGeolocation {
    fn current_position(&self) -> Result<GeoPos, GeolocationError> {
        Ok(self.0)
    }
}

/// A position source backed by a closure.
///
/// # Example
///
/// ```
/// use osmpoint_map::geolocation::{DynGeolocation, GeolocationError};
/// let source = DynGeolocation::new(|| Err(GeolocationError::PermissionDenied));
/// ```
pub struct DynGeolocation {
    position: Box<dyn Fn() -> Result<GeoPos, GeolocationError> + Send>,
}

impl DynGeolocation {
    /// Creates a new `DynGeolocation`.
    pub fn new(position: impl Fn() -> Result<GeoPos, GeolocationError> + Send + 'static) -> Self {
        Self {
            position: Box::new(position),
        }
    }
}

impl Geolocation for DynGeolocation {
    fn current_position(&self) -> Result<GeoPos, GeolocationError> {
        (self.position)()
    }
}

type PositionResult = Result<GeoPos, Arc<GeolocationError>>;

/// A position request running in the background.
pub struct GeolocationRequest {
    promise: Promise<PositionResult>,
}

impl GeolocationRequest {
    /// Starts asking `source` for the current position.
    pub fn spawn(source: impl Geolocation) -> Self {
        let promise = Promise::spawn_thread("geolocation", move || {
            debug!("Requesting current position");
            source.current_position().map_err(Arc::new)
        });
        Self { promise }
    }

    /// Returns the result if the request has finished.
    pub fn ready(&self) -> Option<&PositionResult> {
        self.promise.ready()
    }

    /// Consumes the request if it has finished, otherwise hands it back.
    pub fn try_take(self) -> Result<PositionResult, Self> {
        self.promise
            .try_take()
            .map_err(|promise| Self { promise })
    }
}

/// The state of the last position request.
#[derive(Default)]
pub enum GeolocationStatus {
    /// No request has been made.
    #[default]
    Idle,

    /// A request is in flight.
    Pending(GeolocationRequest),

    /// The last request succeeded and the map was centered on it.
    Located(GeoPos),

    /// The last request failed. The map kept its center.
    Failed(Arc<GeolocationError>),
}

impl GeolocationStatus {
    /// Whether a request is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, GeolocationStatus::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_resolves_with_source_result() {
        let request = GeolocationRequest::spawn(FixedGeolocation(GeoPos::new(10.0, 20.0)));
        let result = request.promise.block_until_ready();
        assert_eq!(result.as_ref().ok(), Some(&GeoPos::new(10.0, 20.0)));
    }

    #[test]
    fn request_reports_errors() {
        let request =
            GeolocationRequest::spawn(DynGeolocation::new(|| Err(GeolocationError::Timeout)));
        let result = request.promise.block_until_ready();
        assert_eq!(
            result.as_ref().err().map(|e| &**e),
            Some(&GeolocationError::Timeout)
        );
    }

    #[test]
    fn status_defaults_to_idle() {
        let status = GeolocationStatus::default();
        assert!(matches!(status, GeolocationStatus::Idle));
        assert!(!status.is_pending());
    }
}
