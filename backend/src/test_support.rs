//! Fakes for the service's external collaborators.

use crate::clock::Clock;
use crate::config::LocationRequest;
use crate::foreground::{ForegroundHost, Notification, NotificationChannel};
use crate::position_source::{LocationCallback, LocationResult, PositionSource, SourceError};
use crate::sink::{MessageSink, RuntimeError, RuntimeHost};
use async_trait::async_trait;
use location_bridge_shared::{InitializeDatabaseArgs, PositionSample, SaveLocationArgs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub fn sample(latitude: f64, longitude: f64) -> PositionSample {
    PositionSample {
        latitude,
        longitude,
        accuracy: 5.0,
        vertical_accuracy: None,
        provider: "fused".to_string(),
        captured_at_ms: 0,
    }
}

/// Milliseconds since construction on tokio's (pausable) clock.
pub struct PausedClock {
    origin: Instant,
}

impl PausedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

#[derive(Default)]
pub struct FakeSource {
    deny: bool,
    callback: Mutex<Option<LocationCallback>>,
    subscriptions: AtomicUsize,
    removals: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn deliver(&self, sample: PositionSample) {
        self.deliver_batch(vec![sample]);
    }

    /// No-op while nobody is subscribed.
    pub fn deliver_batch(&self, locations: Vec<PositionSample>) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(LocationResult { locations });
        }
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl PositionSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn request_location_updates(
        &self,
        _request: &LocationRequest,
        callback: LocationCallback,
    ) -> Result<(), SourceError> {
        if self.deny {
            return Err(SourceError::PermissionDenied);
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        *self.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn remove_location_updates(&self) {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.callback.lock().unwrap().take();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    InitializeDatabase(InitializeDatabaseArgs),
    SaveLocation(SaveLocationArgs),
}

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
    fail_remaining: AtomicUsize,
    attempts: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` saves fail with a transport error.
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_remaining: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<SaveLocationArgs> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::SaveLocation(args) => Some(args),
                SinkCall::InitializeDatabase(_) => None,
            })
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn initialize(&self, args: &InitializeDatabaseArgs) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::InitializeDatabase(args.clone()));
        Ok(())
    }

    async fn save_location(&self, args: &SaveLocationArgs) -> Result<(), RuntimeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RuntimeError::Transport(std::io::Error::other("runtime busy")));
        }
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::SaveLocation(args.clone()));
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out one shared `RecordingSink` for every successful launch.
pub struct FakeRuntimeHost {
    sink: Arc<RecordingSink>,
    knows_callbacks: bool,
    launches: Mutex<Vec<i64>>,
}

impl FakeRuntimeHost {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(RecordingSink::new()),
            knows_callbacks: true,
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn without_callbacks() -> Self {
        Self {
            knows_callbacks: false,
            ..Self::new()
        }
    }

    pub fn sink(&self) -> Arc<RecordingSink> {
        self.sink.clone()
    }

    pub fn launches(&self) -> Vec<i64> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuntimeHost for FakeRuntimeHost {
    async fn launch(&self, callback_handle: i64) -> Result<Arc<dyn MessageSink>, RuntimeError> {
        self.launches.lock().unwrap().push(callback_handle);
        if !self.knows_callbacks {
            return Err(RuntimeError::CallbackNotFound(callback_handle));
        }
        Ok(self.sink.clone())
    }
}

#[derive(Default)]
pub struct RecordingForeground {
    channels: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    refuse: bool,
}

impl RecordingForeground {
    /// Every `start_foreground` is counted, then refused.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn channels(&self) -> usize {
        self.channels.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ForegroundHost for RecordingForeground {
    fn create_channel(&self, _channel: &NotificationChannel) {
        self.channels.fetch_add(1, Ordering::SeqCst);
    }

    fn start_foreground(&self, _notification: &Notification) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            anyhow::bail!("foreground start not allowed");
        }
        Ok(())
    }

    fn stop_foreground(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
