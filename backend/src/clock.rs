use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock milliseconds for payload timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        get_current_timestamp_ms()
    }
}

pub fn get_current_timestamp_ms() -> i64 {
    let now = SystemTime::now();
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
