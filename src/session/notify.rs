use tracing::{error, info};

/// User-visible error/success surfacing (toast equivalent). This subsystem
/// calls it; the host application owns the rendering.
pub trait NotificationSink: Send + Sync {
    fn notify_error(&self, message: &str);
    fn notify_info(&self, message: &str);
}

/// Default sink: routes notifications to the log.
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify_error(&self, message: &str) {
        error!("{message}");
    }

    fn notify_info(&self, message: &str) {
        info!("{message}");
    }
}
