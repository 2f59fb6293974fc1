use crate::error::AppError;
use crate::notify::{NotificationSink, split_summary};
use async_trait::async_trait;
use notify_rust::Notification;

/// Local desktop popup. The recipient is shown in the app name so several
/// owners sharing one machine can tell reminders apart.
pub struct DesktopSink;

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<(), AppError> {
        let (summary, body) = split_summary(text);
        let summary = summary.to_string();
        let body = body.to_string();
        let appname = format!("taskbot ({recipient_id})");

        tokio::task::spawn_blocking(move || {
            let mut notification = Notification::new();
            notification.appname(&appname);
            notification.summary(&summary);
            notification.body(&body);
            notification
                .show()
                .map(|_| ())
                .map_err(|err| AppError::send_failure(err.to_string()))
        })
        .await
        .map_err(|err| AppError::send_failure(err.to_string()))?
    }
}
