use crate::config::Config;
use crate::error::AppError;
use crate::model::registry::is_group_id;
use crate::model::{Group, User};
use crate::notify::NotificationSink;
use crate::storage::SharedStore;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Adds `id` to the user registry if it is not there yet. Returns whether a
/// new user was written.
pub async fn register_user(
    store: &SharedStore,
    id: &str,
    name: &str,
    now: OffsetDateTime,
) -> Result<bool, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::invalid_input("user id is required"));
    }

    store
        .update_if_changed(|state| {
            if state.users.iter().any(|user| user.id == id) {
                return Ok((false, false));
            }
            state.users.push(User {
                id: id.to_string(),
                name: name.to_string(),
                joined_at: now,
            });
            Ok((true, true))
        })
        .await
}

/// Adds a group conversation to the registry. Ids that are not group
/// addresses are ignored.
pub async fn register_group(
    store: &SharedStore,
    id: &str,
    name: &str,
    now: OffsetDateTime,
) -> Result<bool, AppError> {
    if !is_group_id(id) {
        debug!(id, "not a group id, skipping registration");
        return Ok(false);
    }

    let inserted = store
        .update_if_changed(|state| {
            if state.groups.iter().any(|group| group.id == id) {
                return Ok((false, false));
            }
            state.groups.push(Group {
                id: id.to_string(),
                name: name.to_string(),
                joined_at: now,
            });
            Ok((true, true))
        })
        .await?;

    if inserted {
        info!(id, name, "group registered");
    }
    Ok(inserted)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub users: usize,
    pub groups: usize,
    pub tasks: usize,
}

pub async fn global_stats(store: &SharedStore) -> Stats {
    let state = store.read().await;
    Stats {
        users: state.users.len(),
        groups: state.groups.len(),
        tasks: state.tasks.len(),
    }
}

pub fn render_stats(stats: &Stats) -> String {
    format!(
        "📊 *ESTADÍSTICAS GLOBALES*\n\n👥 Usuarios: {}\n🏙️ Grupos: {}\n📝 Tareas: {}",
        stats.users, stats.groups, stats.tasks
    )
}

pub async fn group_list(store: &SharedStore) -> String {
    let state = store.read().await;
    if state.groups.is_empty() {
        return "No hay grupos registrados.".to_string();
    }
    state
        .groups
        .iter()
        .enumerate()
        .map(|(i, group)| format!("{}. {} ({})", i + 1, group.name, group.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Admin commands are open to any sender whose id contains the configured
/// admin id. With no admin configured, nobody is an admin.
pub fn is_admin(config: &Config, sender_id: &str) -> bool {
    match config.admin_id.as_deref().map(str::trim) {
        Some(admin) if !admin.is_empty() => sender_id.contains(admin),
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

pub fn announcement_text(text: &str) -> String {
    format!("📢 *ANUNCIO*\n\n{text}")
}

/// Sends an announcement to every registered group, one at a time.
pub async fn broadcast(
    store: &SharedStore,
    sink: &dyn NotificationSink,
    text: &str,
    send_timeout: Duration,
) -> Result<BroadcastReport, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::invalid_input("escribe el mensaje"));
    }

    let groups = store.read().await.groups;
    let message = announcement_text(text);
    let mut report = BroadcastReport::default();

    for group in &groups {
        let outcome = match tokio::time::timeout(send_timeout, sink.send(&group.id, &message)).await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::send_failure("send timed out")),
        };
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                warn!(group = %group.id, "announcement not delivered: {err}");
                report.failed += 1;
            }
        }
    }

    info!(
        delivered = report.delivered,
        failed = report.failed,
        "broadcast finished"
    );
    Ok(report)
}
