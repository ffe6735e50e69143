pub const NOTIFICATION_CHANNEL_ID: &str = "location_tracking_channel";
pub const NOTIFICATION_ID: u32 = 1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub importance: Importance,
}

impl NotificationChannel {
    pub fn location_tracking() -> Self {
        Self {
            id: NOTIFICATION_CHANNEL_ID,
            name: "Location Tracking",
            description: "Used for tracking location in the background",
            importance: Importance::Low,
        }
    }
}

/// Surface the host opens when the notification is tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapTarget {
    MainSurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundServiceType {
    Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u32,
    pub channel_id: &'static str,
    pub title: &'static str,
    pub text: &'static str,
    pub ongoing: bool,
    pub tap_target: TapTarget,
    pub service_type: ForegroundServiceType,
}

impl Notification {
    pub fn location_tracking() -> Self {
        Self {
            id: NOTIFICATION_ID,
            channel_id: NOTIFICATION_CHANNEL_ID,
            title: "Location Tracking",
            text: "Tracking location in background",
            ongoing: true,
            tap_target: TapTarget::MainSurface,
            service_type: ForegroundServiceType::Location,
        }
    }
}

/// Host facility that keeps the process alive behind a visible notification.
pub trait ForegroundHost: Send + Sync {
    fn create_channel(&self, channel: &NotificationChannel);
    fn start_foreground(&self, notification: &Notification) -> anyhow::Result<()>;
    fn stop_foreground(&self);
}

/// Foreground presence for hosts without a notification tray: the
/// notification lives in the structured log.
#[derive(Debug, Default)]
pub struct LogForeground;

impl ForegroundHost for LogForeground {
    fn create_channel(&self, channel: &NotificationChannel) {
        tracing::info!(
            channel = channel.id,
            importance = ?channel.importance,
            "notification channel created: {} ({})",
            channel.name,
            channel.description
        );
    }

    fn start_foreground(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            id = notification.id,
            channel = notification.channel_id,
            service_type = ?notification.service_type,
            ongoing = notification.ongoing,
            tap_target = ?notification.tap_target,
            "{}: {}",
            notification.title,
            notification.text
        );
        Ok(())
    }

    fn stop_foreground(&self) {
        tracing::info!(id = NOTIFICATION_ID, "foreground presence removed");
    }
}
