use super::{Notifier, PlayerId, Severity};

/// Shows rental notices as desktop notifications
///
/// Handy when running the console host next to a game client. Every player
/// shares the same desktop, so the player id is folded into the summary.
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, player: PlayerId, title: &str, message: &str, severity: Severity) {
        let (icon, urgency) = match severity {
            Severity::Info | Severity::Success => ("dialog-information", notify_rust::Urgency::Low),
            Severity::Warning => ("dialog-warning", notify_rust::Urgency::Normal),
            Severity::Error => ("dialog-error", notify_rust::Urgency::Critical),
        };

        if let Err(e) = notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(&format!("{} ({})", title, player))
            .body(message)
            .icon(icon)
            .urgency(urgency)
            .show()
        {
            tracing::warn!("Desktop notification failed: {}", e);
        }
    }
}
