use crate::clock::Clock;
use crate::state::ServiceState;
use location_bridge_shared::SaveLocationArgs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What a single reporting tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NoSample,
    NoSink,
    Sent,
    Failed,
}

/// Relays the latest sample every `period` until `cancel` fires. The first
/// relay happens one full period after start.
pub async fn reporter_task(
    state: Arc<ServiceState>,
    clock: Arc<dyn Clock>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                report_tick(&state, clock.as_ref()).await;
            }
        }
    }

    tracing::debug!("periodic reporter stopped");
}

pub async fn report_tick(state: &ServiceState, clock: &dyn Clock) -> TickOutcome {
    let Some(sample) = state.latest.snapshot() else {
        tracing::debug!("no location yet, skipping report");
        return TickOutcome::NoSample;
    };

    let Some(sink) = state.sink() else {
        tracing::debug!("no runtime attached, dropping location report");
        return TickOutcome::NoSink;
    };

    tracing::debug!("Sending location to runtime for storage");
    let args = SaveLocationArgs::from_sample(&sample, clock.now_ms());
    match sink.save_location(&args).await {
        Ok(()) => TickOutcome::Sent,
        Err(e) => {
            tracing::error!("Error sending location to runtime: {e}");
            TickOutcome::Failed
        }
    }
}
