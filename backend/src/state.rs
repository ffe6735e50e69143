use crate::sink::MessageSink;
use location_bridge_shared::{InitializeDatabaseArgs, PositionSample};
use std::sync::{Arc, Mutex, MutexGuard};

/// Single-slot, last-write-wins holder for the most recent position.
#[derive(Debug, Default)]
pub struct LatestSample {
    slot: Mutex<Option<PositionSample>>,
}

impl LatestSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever is held, unconditionally.
    pub fn store(&self, sample: PositionSample) {
        *lock(&self.slot) = Some(sample);
    }

    /// Copy of the held sample; the slot keeps it.
    pub fn snapshot(&self) -> Option<PositionSample> {
        lock(&self.slot).clone()
    }
}

/// Group/user pair the runtime is initialized with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub group_name: String,
    pub user_name: String,
}

impl Identity {
    pub fn to_args(&self) -> InitializeDatabaseArgs {
        InitializeDatabaseArgs {
            group_name: self.group_name.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

/// State shared between the lifecycle controller, the source callback and the
/// reporter task.
#[derive(Default)]
pub struct ServiceState {
    /// Written by the source callback, read by the reporter.
    pub latest: LatestSample,

    /// Installed once the embedded runtime is up; `None` swallows reports.
    sink: Mutex<Option<Arc<dyn MessageSink>>>,

    /// Survives sticky restarts that arrive without a start command.
    identity: Mutex<Identity>,
}

impl ServiceState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sink(&self) -> Option<Arc<dyn MessageSink>> {
        lock(&self.sink).clone()
    }

    pub fn install_sink(&self, sink: Arc<dyn MessageSink>) {
        *lock(&self.sink) = Some(sink);
    }

    pub fn take_sink(&self) -> Option<Arc<dyn MessageSink>> {
        lock(&self.sink).take()
    }

    pub fn identity(&self) -> Identity {
        lock(&self.identity).clone()
    }

    pub fn set_identity(&self, identity: Identity) {
        *lock(&self.identity) = identity;
    }
}

/// A panicked writer cannot leave a half-written `Option`, so poisoning is ignored.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
