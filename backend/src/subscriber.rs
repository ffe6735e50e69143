use crate::config::LocationRequest;
use crate::position_source::{LocationCallback, LocationResult, PositionSource, SourceError};
use crate::state::ServiceState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Feeds every fix a source delivers into the service's latest-sample slot.
pub struct LocationSubscriber {
    source: Arc<dyn PositionSource>,
    state: Arc<ServiceState>,
    active: AtomicBool,
}

impl LocationSubscriber {
    pub fn new(source: Arc<dyn PositionSource>, state: Arc<ServiceState>) -> Self {
        Self {
            source,
            state,
            active: AtomicBool::new(false),
        }
    }

    /// Registers with the source. A refused subscription is logged and left
    /// inactive; the caller never sees the failure.
    pub fn start(&self, request: &LocationRequest) {
        let state = self.state.clone();
        let callback: LocationCallback = Arc::new(move |result: LocationResult| {
            for location in result.locations {
                tracing::debug!("Location: {}, {}", location.latitude, location.longitude);
                state.latest.store(location);
            }
        });

        tracing::debug!(
            priority = ?request.priority,
            interval = ?request.interval,
            min_update_interval = ?request.min_update_interval,
            max_update_delay = ?request.max_update_delay,
            wait_for_accurate = request.wait_for_accurate_location,
            "requesting location updates"
        );
        match self.source.request_location_updates(request, callback) {
            Ok(()) => {
                self.active.store(true, Ordering::SeqCst);
                tracing::info!("subscribed to {} location updates", self.source.name());
            }
            Err(SourceError::PermissionDenied) => {
                tracing::error!("Location permission not granted");
            }
            Err(e) => {
                tracing::error!("subscribing to {} failed: {e}", self.source.name());
            }
        }
    }

    /// Safe to call any number of times.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.source.remove_location_updates();
            tracing::info!("unsubscribed from {}", self.source.name());
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample, FakeSource};

    #[test]
    fn last_delivered_update_wins() {
        let source = Arc::new(FakeSource::new());
        let state = ServiceState::new();
        let subscriber = LocationSubscriber::new(source.clone(), state.clone());
        subscriber.start(&LocationRequest::default());
        assert!(subscriber.is_active());

        source.deliver(sample(1.0, 1.0));
        source.deliver(sample(2.0, 2.0));
        source.deliver(sample(-3.0, 3.0));
        assert_eq!(state.latest.snapshot(), Some(sample(-3.0, 3.0)));
    }

    #[test]
    fn batched_result_keeps_last_location() {
        let source = Arc::new(FakeSource::new());
        let state = ServiceState::new();
        let subscriber = LocationSubscriber::new(source.clone(), state.clone());
        subscriber.start(&LocationRequest::default());

        source.deliver_batch(vec![sample(1.0, 1.0), sample(5.0, 5.0), sample(4.0, 4.0)]);
        assert_eq!(state.latest.snapshot(), Some(sample(4.0, 4.0)));
    }

    #[test]
    fn denied_capability_leaves_subscriber_inactive() {
        let source = Arc::new(FakeSource::denying());
        let state = ServiceState::new();
        let subscriber = LocationSubscriber::new(source.clone(), state.clone());
        subscriber.start(&LocationRequest::default());

        assert!(!subscriber.is_active());
        source.deliver(sample(1.0, 1.0));
        assert!(state.latest.snapshot().is_none());

        subscriber.stop();
        assert_eq!(source.removals(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let source = Arc::new(FakeSource::new());
        let subscriber = LocationSubscriber::new(source.clone(), ServiceState::new());
        subscriber.start(&LocationRequest::default());

        subscriber.stop();
        subscriber.stop();
        subscriber.stop();
        assert_eq!(source.removals(), 1);
        assert!(!subscriber.is_active());
    }
}
