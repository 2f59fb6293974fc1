use crate::error::AppError;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::DesktopSink;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::DesktopSink;

/// Outbound side of the chat: deliver `text` to `recipient_id`.
///
/// Failures are returned, never panicked; callers decide whether they are
/// fatal.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<(), AppError>;
}

pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn send(&self, _recipient_id: &str, _text: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Writes each message to stdout, prefixed with its recipient.
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<(), AppError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "[{recipient_id}] {text}")
            .map_err(|err| AppError::send_failure(err.to_string()))?;
        stdout
            .flush()
            .map_err(|err| AppError::send_failure(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    Desktop,
    None,
}

impl SinkKind {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "console" | "stdout" => Ok(Self::Console),
            "desktop" => Ok(Self::Desktop),
            "none" | "noop" | "off" => Ok(Self::None),
            other => Err(AppError::invalid_input(format!("unknown sink '{other}'"))),
        }
    }
}

/// Picks the sink from `TASKBOT_SINK`; `TASKBOT_DISABLE_NOTIFICATIONS`
/// always wins.
pub fn sink_from_env() -> Result<Arc<dyn NotificationSink>, AppError> {
    if std::env::var("TASKBOT_DISABLE_NOTIFICATIONS").is_ok() {
        return Ok(Arc::new(NoopSink));
    }

    let kind = match std::env::var("TASKBOT_SINK") {
        Ok(raw) => SinkKind::parse(&raw)?,
        Err(_) => SinkKind::Console,
    };

    match kind {
        SinkKind::Console => Ok(Arc::new(ConsoleSink)),
        SinkKind::None => Ok(Arc::new(NoopSink)),
        SinkKind::Desktop => match platform_sink() {
            Ok(sink) => Ok(sink),
            Err(AppError::InvalidData(reason)) => {
                tracing::warn!("desktop notifications unavailable ({reason}), using console");
                Ok(Arc::new(ConsoleSink))
            }
            Err(other) => Err(other),
        },
    }
}

#[cfg(any(target_os = "linux", windows))]
pub fn platform_sink() -> Result<Arc<dyn NotificationSink>, AppError> {
    Ok(Arc::new(DesktopSink))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_sink() -> Result<Arc<dyn NotificationSink>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}

/// Splits a chat message into the title and body used by desktop popups.
pub(crate) fn split_summary(text: &str) -> (&str, &str) {
    match text.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest.trim()),
        None => ("taskbot", text.trim()),
    }
}
