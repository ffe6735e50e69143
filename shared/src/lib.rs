use serde::{Deserialize, Serialize};

/// Method channel the embedded runtime listens on.
pub const LOCATION_CHANNEL: &str = "location_bridge/location_channel";

pub const METHOD_INITIALIZE_DATABASE: &str = "initializeDatabase";
pub const METHOD_SAVE_LOCATION: &str = "saveLocation";

/// One position fix as delivered by a position source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    pub vertical_accuracy: Option<f64>,
    pub provider: String,
    pub captured_at_ms: i64,
}

/// Start command handed to the service by its host.
/// Every field is optional on the wire; `callback_handle == 0` means no runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartCommand {
    pub group_name: String,
    pub user_name: String,
    pub callback_handle: i64,
}

impl StartCommand {
    pub fn has_runtime(&self) -> bool {
        self.callback_handle != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeDatabaseArgs {
    pub group_name: String,
    pub user_name: String,
}

/// Payload of a `saveLocation` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLocationArgs {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch millis at the time of sending.
    pub timestamp: i64,
    pub accuracy: f32,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_accuracy: Option<f32>,
}

impl SaveLocationArgs {
    pub fn from_sample(sample: &PositionSample, timestamp: i64) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp,
            accuracy: sample.accuracy as f32,
            provider: sample.provider.clone(),
            vertical_accuracy: sample.vertical_accuracy.map(|v| v as f32),
        }
    }
}

/// A named invocation on the runtime's method channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    pub arguments: serde_json::Value,
}
