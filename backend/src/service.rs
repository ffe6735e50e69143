use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::foreground::{ForegroundHost, Notification, NotificationChannel};
use crate::position_source::PositionSource;
use crate::reporter::reporter_task;
use crate::sink::{RuntimeError, RuntimeHost};
use crate::state::{Identity, ServiceState};
use crate::subscriber::LocationSubscriber;
use location_bridge_shared::{PositionSample, StartCommand};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tells the host what to do if it kills the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Restart it, possibly without a start command.
    Sticky,
}

/// External collaborators the service is wired to.
pub struct ServiceDeps {
    pub source: Arc<dyn PositionSource>,
    pub runtime_host: Arc<dyn RuntimeHost>,
    pub foreground: Arc<dyn ForegroundHost>,
    pub clock: Arc<dyn Clock>,
}

struct Running {
    cancel: CancellationToken,
    reporter: JoinHandle<()>,
    runtime_init: Option<JoinHandle<()>>,
}

/// Lifecycle controller: stopped -> running -> stopped.
pub struct LocationService {
    config: ServiceConfig,
    state: Arc<ServiceState>,
    subscriber: LocationSubscriber,
    runtime_host: Arc<dyn RuntimeHost>,
    foreground: Arc<dyn ForegroundHost>,
    clock: Arc<dyn Clock>,
    running: Mutex<Option<Running>>,
}

impl LocationService {
    pub fn new(config: ServiceConfig, deps: ServiceDeps) -> Self {
        let state = ServiceState::new();
        let subscriber = LocationSubscriber::new(deps.source, state.clone());
        deps.foreground
            .create_channel(&NotificationChannel::location_tracking());
        tracing::debug!("Service created");

        Self {
            config,
            state,
            subscriber,
            runtime_host: deps.runtime_host,
            foreground: deps.foreground,
            clock: deps.clock,
            running: Mutex::new(None),
        }
    }

    /// `None` is a host restart of a sticky service: the previous identity is
    /// kept and no runtime is launched.
    pub async fn on_start(&self, command: Option<StartCommand>) -> StartMode {
        let mut running = self.running.lock().await;

        if running.is_some() {
            if command.is_none() {
                tracing::debug!("already running, ignoring restart without a command");
                return StartMode::Sticky;
            }
            tracing::warn!("start received while running, restarting service");
            if let Some(previous) = running.take() {
                self.shutdown(previous).await;
            }
        }

        let mut runtime_init = None;
        match command {
            Some(cmd) => {
                tracing::info!(
                    "Service started with groupName: {}, userName: {}",
                    cmd.group_name,
                    cmd.user_name
                );
                self.state.set_identity(Identity {
                    group_name: cmd.group_name.clone(),
                    user_name: cmd.user_name.clone(),
                });
                if cmd.has_runtime() {
                    runtime_init = Some(self.spawn_runtime_init(cmd.callback_handle));
                }
            }
            None => {
                let identity = self.state.identity();
                tracing::info!(
                    "Service restarted without a command, keeping groupName: {}, userName: {}",
                    identity.group_name,
                    identity.user_name
                );
            }
        }

        if let Err(e) = self
            .foreground
            .start_foreground(&Notification::location_tracking())
        {
            tracing::error!("failed to enter foreground: {e:#}");
        }

        self.subscriber.start(&self.config.request);

        let cancel = CancellationToken::new();
        let reporter = tokio::spawn(reporter_task(
            self.state.clone(),
            self.clock.clone(),
            self.config.report_interval,
            cancel.clone(),
        ));

        *running = Some(Running {
            cancel,
            reporter,
            runtime_init,
        });
        StartMode::Sticky
    }

    pub async fn on_stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(current) = running.take() {
            self.shutdown(current).await;
            tracing::info!("Service destroyed");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub fn latest_sample(&self) -> Option<PositionSample> {
        self.state.latest.snapshot()
    }

    pub fn identity(&self) -> Identity {
        self.state.identity()
    }

    fn spawn_runtime_init(&self, callback_handle: i64) -> JoinHandle<()> {
        let host = self.runtime_host.clone();
        let state = self.state.clone();
        let args = state.identity().to_args();

        tokio::spawn(async move {
            let sink = match host.launch(callback_handle).await {
                Ok(sink) => sink,
                Err(RuntimeError::CallbackNotFound(handle)) => {
                    tracing::error!("Failed to lookup callback {handle}");
                    return;
                }
                Err(e) => {
                    tracing::error!("Error initializing runtime: {e}");
                    return;
                }
            };
            state.install_sink(sink.clone());

            if let Err(e) = sink.initialize(&args).await {
                tracing::error!("initializeDatabase failed: {e}");
            }
        })
    }

    async fn shutdown(&self, running: Running) {
        self.subscriber.stop();

        running.cancel.cancel();
        if let Err(e) = running.reporter.await {
            tracing::error!("periodic reporter ended abnormally: {e}");
        }

        if let Some(init) = running.runtime_init {
            init.abort();
            let _ = init.await;
        }
        if let Some(sink) = self.state.take_sink() {
            sink.shutdown().await;
        }

        self.foreground.stop_foreground();
    }
}
