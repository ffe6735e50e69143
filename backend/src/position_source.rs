use crate::clock::Clock;
use crate::config::LocationRequest;
use location_bridge_shared::PositionSample;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

const GPSD_WATCH: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";
const GPSD_PROVIDER: &str = "gpsd";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("location permission not granted")]
    PermissionDenied,

    #[error("position source unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fixes delivered together in one callback, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResult {
    pub locations: Vec<PositionSample>,
}

impl LocationResult {
    pub fn single(sample: PositionSample) -> Self {
        Self {
            locations: vec![sample],
        }
    }
}

pub type LocationCallback = Arc<dyn Fn(LocationResult) + Send + Sync>;

// ======================================================================
//  Position Source Trait
// ======================================================================
pub trait PositionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Starts delivering fixes to `callback` according to `request`.
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        callback: LocationCallback,
    ) -> Result<(), SourceError>;

    /// Stops delivery. Takes effect before returning.
    fn remove_location_updates(&self);
}

// ======================================================================
//  gpsd Implementation
// ======================================================================
pub struct GpsdSource {
    addr: String,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<CancellationToken>>,
}

impl GpsdSource {
    pub fn new(addr: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            addr: addr.into(),
            clock,
            active: Mutex::new(None),
        }
    }
}

impl PositionSource for GpsdSource {
    fn name(&self) -> &str {
        "gpsd"
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

        runtime.spawn(watch_gpsd(
            self.addr.clone(),
            request.min_update_interval,
            self.clock.clone(),
            callback,
            token,
        ));
        Ok(())
    }

    fn remove_location_updates(&self) {
        if let Some(token) = self.active.lock().unwrap_or_else(|p| p.into_inner()).take() {
            token.cancel();
        }
    }
}

async fn watch_gpsd(
    addr: String,
    min_update_interval: Duration,
    clock: Arc<dyn Clock>,
    callback: LocationCallback,
    cancel: CancellationToken,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        res = TcpStream::connect(&addr) => res,
    };
    let mut stream = match stream {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("gpsd at {addr} unreachable, no fixes will be delivered: {e}");
            return;
        }
    };
    if let Err(e) = stream.write_all(GPSD_WATCH).await {
        tracing::error!("failed to enable gpsd watch mode: {e}");
        return;
    }
    tracing::info!("watching gpsd at {addr}");

    let mut lines = BufReader::new(stream).lines();
    let mut last_delivered_ms: Option<i64> = None;
    let min_gap_ms = gap_ms(min_update_interval);

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                let now_ms = clock.now_ms();
                let Some(sample) = parse_tpv(&line, now_ms) else {
                    continue;
                };
                if let Some(last) = last_delivered_ms
                    && now_ms - last < min_gap_ms
                {
                    continue;
                }
                last_delivered_ms = Some(now_ms);
                callback(LocationResult::single(sample));
            }
            Ok(None) => {
                tracing::warn!("gpsd closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!("reading from gpsd failed: {e}");
                break;
            }
        }
    }
}

/// Saturates instead of wrapping for intervals past `i64::MAX` ms.
fn gap_ms(interval: Duration) -> i64 {
    i64::try_from(interval.as_millis()).unwrap_or(i64::MAX)
}

#[derive(Debug, Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    epv: Option<f64>,
    time: Option<String>,
}

/// Turns one gpsd JSON report into a sample. Anything but a `TPV` report with a
/// 2D or 3D fix yields `None`.
pub fn parse_tpv(line: &str, now_ms: i64) -> Option<PositionSample> {
    let report: GpsdReport = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode < 2 {
        return None;
    }
    let latitude = report.lat.filter(|v| v.is_finite())?;
    let longitude = report.lon.filter(|v| v.is_finite())?;

    let accuracy = report
        .eph
        .or_else(|| match (report.epx, report.epy) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        })
        .unwrap_or(0.0);

    let captured_at_ms = report
        .time
        .as_deref()
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or(now_ms);

    Some(PositionSample {
        latitude,
        longitude,
        accuracy,
        vertical_accuracy: report.epv,
        provider: GPSD_PROVIDER.to_string(),
        captured_at_ms,
    })
}
