use location_bridge_shared::StartCommand;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_GPSD_ADDR: &str = "127.0.0.1:2947";
const DEFAULT_CALLBACK_REGISTRY_PATH: &str = "config/callbacks.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    HighAccuracy,
    Balanced,
    LowPower,
    Passive,
}

impl Priority {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high_accuracy" | "high" => Some(Priority::HighAccuracy),
            "balanced" => Some(Priority::Balanced),
            "low_power" | "low" => Some(Priority::LowPower),
            "passive" => Some(Priority::Passive),
            _ => None,
        }
    }
}

/// Hints handed to a position source when subscribing.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRequest {
    pub priority: Priority,
    /// Desired delivery interval.
    pub interval: Duration,
    /// Deliveries never arrive faster than this.
    pub min_update_interval: Duration,
    /// Longest a source may batch fixes before delivering.
    pub max_update_delay: Duration,
    pub wait_for_accurate_location: bool,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            priority: Priority::HighAccuracy,
            interval: Duration::from_millis(10_000),
            min_update_interval: Duration::from_millis(5_000),
            max_update_delay: Duration::from_millis(15_000),
            wait_for_accurate_location: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Gpsd,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub report_interval: Duration,
    pub request: LocationRequest,
    pub source: SourceKind,
    pub gpsd_addr: String,
    pub callback_registry: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            report_interval: DEFAULT_REPORT_INTERVAL,
            request: LocationRequest::default(),
            source: SourceKind::Gpsd,
            gpsd_addr: DEFAULT_GPSD_ADDR.to_string(),
            callback_registry: default_callback_registry_path(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        let report_interval = lookup("LB_REPORT_INTERVAL_SEC")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.report_interval);

        let request = LocationRequest {
            priority: lookup("LB_PRIORITY")
                .and_then(|v| Priority::parse(&v))
                .unwrap_or(defaults.request.priority),
            interval: millis("LB_UPDATE_INTERVAL_MS", defaults.request.interval),
            min_update_interval: millis(
                "LB_MIN_UPDATE_INTERVAL_MS",
                defaults.request.min_update_interval,
            ),
            max_update_delay: millis("LB_MAX_UPDATE_DELAY_MS", defaults.request.max_update_delay),
            wait_for_accurate_location: defaults.request.wait_for_accurate_location,
        };

        let source = match lookup("LB_POSITION_SOURCE").as_deref() {
            Some("simulated") => SourceKind::Simulated,
            _ => SourceKind::Gpsd,
        };

        let gpsd_addr = lookup("LB_GPSD_ADDR").unwrap_or(defaults.gpsd_addr);

        let callback_registry = lookup("LB_CALLBACK_REGISTRY")
            .map(PathBuf::from)
            .unwrap_or(defaults.callback_registry);

        Self {
            report_interval,
            request,
            source,
            gpsd_addr,
            callback_registry,
        }
    }
}

pub fn default_callback_registry_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CALLBACK_REGISTRY_PATH)
}

/// Start command from a JSON argument, or from `LB_GROUP_NAME`,
/// `LB_USER_NAME` and `LB_CALLBACK_HANDLE`.
pub fn start_command(arg: Option<&str>) -> anyhow::Result<StartCommand> {
    if let Some(raw) = arg {
        return serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("Invalid start command JSON: {e}"));
    }
    Ok(StartCommand {
        group_name: std::env::var("LB_GROUP_NAME").unwrap_or_default(),
        user_name: std::env::var("LB_USER_NAME").unwrap_or_default(),
        callback_handle: std::env::var("LB_CALLBACK_HANDLE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0),
    })
}
