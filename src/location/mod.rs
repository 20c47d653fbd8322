//! Coordinate source abstraction and location tracker.
//!
//! Wraps a continuous push stream of position updates into a single
//! current-coordinate observable plus status. The stream itself comes from
//! an injected [`CoordinateSource`] so platform geolocation and test
//! doubles are interchangeable.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::signal::Signal;
use crate::types::Coordinate;

/// Closed set of reasons a coordinate watch can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    #[error("location access was denied")]
    PermissionDenied,
    #[error("location information is unavailable")]
    Unavailable,
    #[error("the request to get location timed out")]
    Timeout,
    #[error("an unknown error occurred while fetching location")]
    Unknown,
}

/// Events produced by a coordinate source.
pub enum WatchEvent {
    /// A position update arrived.
    Update(Coordinate),
    /// The source will produce no further updates.
    Closed,
}

/// Trait abstracting where position updates come from.
///
/// Implementations handle platform specifics internally. The tracker loop
/// calls [`next_update`](CoordinateSource::next_update) in a select! with
/// cancellation, so updates are always processed in arrival order.
#[async_trait]
pub trait CoordinateSource: Send + 'static {
    /// Wait for the next position update.
    ///
    /// Returns `WatchEvent::Closed` when the stream ends. Errors use the
    /// closed [`WatchError`] set; the tracker records them and keeps
    /// watching.
    async fn next_update(&mut self) -> Result<WatchEvent, WatchError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Watch status exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationStatus {
    #[default]
    Acquiring,
    Available,
    Error,
}

/// Holds the current coordinate and watch status as observable signals.
///
/// Constructed once and shared; the geofence engine consumes updates
/// through the channel returned by [`LocationTracker::run`]'s caller.
pub struct LocationTracker {
    pub coordinates: Signal<Option<Coordinate>>,
    pub status: Signal<LocationStatus>,
    pub error_message: Signal<Option<String>>,
}

impl Default for LocationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationTracker {
    pub fn new() -> Self {
        Self {
            coordinates: Signal::new(None),
            status: Signal::new(LocationStatus::Acquiring),
            error_message: Signal::new(None),
        }
    }

    /// Record one successful update.
    pub fn record_update(&self, coords: Coordinate) {
        self.coordinates.set(Some(coords));
        if self.status.get() != LocationStatus::Available {
            self.status.set(LocationStatus::Available);
            self.error_message.set(None);
        }
    }

    /// Record a watch error. The coordinate is cleared so stale positions
    /// are never reported as current.
    pub fn record_error(&self, err: WatchError) {
        self.coordinates.set(None);
        self.status.set(LocationStatus::Error);
        self.error_message.set(Some(err.to_string()));
    }

    /// Drive the tracker from a coordinate source until the source closes
    /// or the token is cancelled. Each update is forwarded to `on_update`
    /// in arrival order.
    pub async fn run<S: CoordinateSource>(
        &self,
        mut source: S,
        cancel: CancellationToken,
        mut on_update: impl FnMut(Coordinate),
    ) {
        info!(source = source.source_name(), "Location watch started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Location watch cancelled");
                    break;
                }
                result = source.next_update() => result,
            };

            match event {
                Ok(WatchEvent::Update(coords)) => {
                    self.record_update(coords);
                    on_update(coords);
                }
                Ok(WatchEvent::Closed) => {
                    info!("Coordinate source closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Location watch error");
                    self.record_error(e);
                    if e == WatchError::PermissionDenied {
                        // No retry on denial; the watch cannot recover.
                        break;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Scripted source (tests / demo replay)
// ============================================================================

/// Replays a fixed sequence of updates, then closes.
pub struct ScriptedSource {
    events: std::vec::IntoIter<Result<Coordinate, WatchError>>,
}

impl ScriptedSource {
    pub fn new(events: Vec<Result<Coordinate, WatchError>>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }

    /// Convenience for an all-success script.
    pub fn from_coordinates(coords: Vec<Coordinate>) -> Self {
        Self::new(coords.into_iter().map(Ok).collect())
    }
}

#[async_trait]
impl CoordinateSource for ScriptedSource {
    async fn next_update(&mut self) -> Result<WatchEvent, WatchError> {
        match self.events.next() {
            Some(Ok(c)) => Ok(WatchEvent::Update(c)),
            Some(Err(e)) => Err(e),
            None => Ok(WatchEvent::Closed),
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracker_records_updates_in_order() {
        let tracker = LocationTracker::new();
        let source = ScriptedSource::from_coordinates(vec![
            Coordinate::new(1.0, 1.0),
            Coordinate::new(2.0, 2.0),
        ]);

        let mut seen = Vec::new();
        tracker
            .run(source, CancellationToken::new(), |c| seen.push(c))
            .await;

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].latitude, 1.0);
        assert_eq!(seen[1].latitude, 2.0);
        assert_eq!(tracker.status.get(), LocationStatus::Available);
        assert!(tracker.coordinates.get().is_some());
    }

    #[tokio::test]
    async fn test_error_clears_coordinate() {
        let tracker = LocationTracker::new();
        let source = ScriptedSource::new(vec![
            Ok(Coordinate::new(1.0, 1.0)),
            Err(WatchError::Timeout),
        ]);

        tracker.run(source, CancellationToken::new(), |_| {}).await;

        assert_eq!(tracker.status.get(), LocationStatus::Error);
        assert!(tracker.coordinates.get().is_none());
        assert!(tracker.error_message.get().is_some());
    }

    #[tokio::test]
    async fn test_permission_denied_stops_watch() {
        let tracker = LocationTracker::new();
        let source = ScriptedSource::new(vec![
            Err(WatchError::PermissionDenied),
            Ok(Coordinate::new(9.0, 9.0)),
        ]);

        let mut seen = Vec::new();
        tracker
            .run(source, CancellationToken::new(), |c| seen.push(c))
            .await;

        // The update after the denial must never be processed.
        assert!(seen.is_empty());
        assert_eq!(tracker.status.get(), LocationStatus::Error);
    }
}
