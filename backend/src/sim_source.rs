use crate::clock::Clock;
use crate::config::{LocationRequest, Priority};
use crate::position_source::{LocationCallback, LocationResult, PositionSource, SourceError};
use location_bridge_shared::PositionSample;
use rand::RngExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const BASE_LAT: f64 = 31.7619;
const BASE_LON: f64 = -106.4850;

/// Largest single step of the walk, in degrees (~20 m).
const MAX_STEP_DEG: f64 = 0.0002;

const SIM_PROVIDER: &str = "simulated";

/// `interval` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Random walk around a fixed coordinate, for hosts without positioning
/// hardware.
pub struct SimulatedSource {
    clock: Arc<dyn Clock>,
    active: Mutex<Option<CancellationToken>>,
}

impl SimulatedSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            active: Mutex::new(None),
        }
    }
}

impl PositionSource for SimulatedSource {
    fn name(&self) -> &str {
        SIM_PROVIDER
    }

    fn request_location_updates(
        &self,
        request: &LocationRequest,
        callback: LocationCallback,
    ) -> Result<(), SourceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let token = CancellationToken::new();
        if let Some(previous) = self
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(token.clone())
        {
            previous.cancel();
        }

        let period = request
            .interval
            .max(request.min_update_interval)
            .max(MIN_PERIOD);
        let priority = request.priority;
        let clock = self.clock.clone();

        runtime.spawn(async move {
            let mut walk = Walk::new();
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let sample = walk.step(priority, clock.now_ms());
                        callback(LocationResult::single(sample));
                    }
                }
            }
        });
        Ok(())
    }

    fn remove_location_updates(&self) {
        if let Some(token) = self.active.lock().unwrap_or_else(|p| p.into_inner()).take() {
            token.cancel();
        }
    }
}

struct Walk {
    lat: f64,
    lon: f64,
}

impl Walk {
    fn new() -> Self {
        Self {
            lat: BASE_LAT,
            lon: BASE_LON,
        }
    }

    fn step(&mut self, priority: Priority, now_ms: i64) -> PositionSample {
        let mut rng = rand::rng();
        self.lat = (self.lat + rng.random_range(-MAX_STEP_DEG..MAX_STEP_DEG)).clamp(-90.0, 90.0);
        self.lon += rng.random_range(-MAX_STEP_DEG..MAX_STEP_DEG);

        let (accuracy, vertical_accuracy) = match priority {
            Priority::HighAccuracy => (rng.random_range(3.0..10.0), Some(rng.random_range(4.0..15.0))),
            Priority::Balanced => (rng.random_range(20.0..100.0), None),
            Priority::LowPower | Priority::Passive => (rng.random_range(500.0..3000.0), None),
        };

        PositionSample {
            latitude: self.lat,
            longitude: self.lon,
            accuracy,
            vertical_accuracy,
            provider: SIM_PROVIDER.to_string(),
            captured_at_ms: now_ms,
        }
    }
}
