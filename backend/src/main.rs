// main.rs

mod clock;
mod config;
mod foreground;
mod position_source;
mod reporter;
mod runtime;
mod service;
mod sim_source;
mod sink;
mod state;
mod subscriber;
#[cfg(test)]
mod test_support;

use crate::clock::{Clock, SystemClock};
use crate::config::{ServiceConfig, SourceKind};
use crate::foreground::LogForeground;
use crate::position_source::{GpsdSource, PositionSource};
use crate::runtime::{CallbackRegistry, EmbeddedRuntimeHost};
use crate::service::{LocationService, ServiceDeps};
use crate::sim_source::SimulatedSource;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env();
    let command = config::start_command(std::env::args().nth(1).as_deref())?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // --- Position source ---
    let source: Arc<dyn PositionSource> = match config.source {
        SourceKind::Gpsd => Arc::new(GpsdSource::new(config.gpsd_addr.clone(), clock.clone())),
        SourceKind::Simulated => {
            tracing::warn!("using simulated position source");
            Arc::new(SimulatedSource::new(clock.clone()))
        }
    };

    // --- Embedded runtime ---
    let registry = match CallbackRegistry::load(&config.callback_registry) {
        Ok(registry) => {
            if registry.is_empty() {
                tracing::warn!("callback registry is empty, runtime handles will not resolve");
            } else {
                tracing::info!("{} runtime callbacks registered", registry.len());
            }
            registry
        }
        Err(e) => {
            tracing::warn!("no runtime callbacks available: {e:#}");
            CallbackRegistry::new(Vec::new())
        }
    };

    let service = LocationService::new(
        config,
        ServiceDeps {
            source,
            runtime_host: Arc::new(EmbeddedRuntimeHost::new(registry)),
            foreground: Arc::new(LogForeground),
            clock,
        },
    );

    let mode = service.on_start(Some(command)).await;
    tracing::debug!("service running ({mode:?})");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    if service.is_running().await {
        let identity = service.identity();
        match service.latest_sample() {
            Some(s) => tracing::info!(
                "last known position for {}/{}: {}, {} (±{} m)",
                identity.group_name,
                identity.user_name,
                s.latitude,
                s.longitude,
                s.accuracy
            ),
            None => tracing::info!("no position was ever received"),
        }
    }
    service.on_stop().await;
    Ok(())
}
