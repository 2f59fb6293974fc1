use crate::error::AppError;
use crate::notify::{NotificationSink, split_summary};
use async_trait::async_trait;
use tauri_winrt_notification::Toast;

pub struct DesktopSink;

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<(), AppError> {
        let (summary, body) = split_summary(text);
        let summary = summary.to_string();
        let body = body.to_string();
        let recipient = recipient_id.to_string();

        tokio::task::spawn_blocking(move || {
            Toast::new(Toast::POWERSHELL_APP_ID)
                .title(&summary)
                .text1(&body)
                .text2(&recipient)
                .show()
                .map_err(|err| AppError::send_failure(err.to_string()))
        })
        .await
        .map_err(|err| AppError::send_failure(err.to_string()))?
    }
}
