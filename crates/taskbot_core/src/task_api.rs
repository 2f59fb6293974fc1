use crate::dates::DateParser;
use crate::error::AppError;
use crate::model::Task;
use crate::recurrence;
use crate::storage::{SharedStore, StoreState};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::info;

/// Description stored when the text held nothing but a recurrence marker.
pub const DEFAULT_DESCRIPTION: &str = "Recordatorio";

#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    pub min_recurrence_minutes: u32,
    /// Offset used when echoing the resolved date back to the user.
    pub display_offset: UtcOffset,
}

#[derive(Debug, Clone)]
pub struct Created {
    pub task: Task,
    pub confirmation: String,
}

/// A task together with its 1-based position in the owner's pending view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTask {
    pub index: usize,
    pub task: Task,
}

pub async fn create_task(
    store: &SharedStore,
    parser: &dyn DateParser,
    options: CreateOptions,
    owner_id: &str,
    raw_text: &str,
) -> Result<Created, AppError> {
    create_task_at(
        store,
        parser,
        options,
        owner_id,
        raw_text,
        OffsetDateTime::now_utc(),
    )
    .await
}

pub async fn create_task_at(
    store: &SharedStore,
    parser: &dyn DateParser,
    options: CreateOptions,
    owner_id: &str,
    raw_text: &str,
    now: OffsetDateTime,
) -> Result<Created, AppError> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return Err(AppError::invalid_input("owner is required"));
    }

    let stripped = recurrence::strip_marker(raw_text, options.min_recurrence_minutes)?;
    let parsed_date = parser.parse(&stripped.clean_text, now);

    if parsed_date.is_none() && stripped.interval_minutes.is_none() {
        return Err(AppError::unrecognized(
            "no entendí la fecha; prueba: /tarea Agua -cada 45m",
        ));
    }

    let description = if stripped.clean_text.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        stripped.clean_text.clone()
    };

    let mut task = Task {
        id: String::new(),
        description,
        due_date: parsed_date.unwrap_or(now),
        recurrence_interval_minutes: stripped.interval_minutes,
        last_reminded_at: None,
        reminder_sent: false,
        is_completed: false,
        owner_id: owner_id.to_string(),
    };

    let task = store
        .update(|state| {
            task.id = next_task_id(state, now);
            state.tasks.push(task.clone());
            Ok(task)
        })
        .await?;

    info!(
        task_id = %task.id,
        owner = %task.owner_id,
        recurrence = ?task.recurrence_interval_minutes,
        "task created"
    );

    let confirmation = confirmation_text(
        parsed_date,
        task.recurrence_interval_minutes,
        options.display_offset,
    )?;
    Ok(Created { task, confirmation })
}

fn next_task_id(state: &StoreState, now: OffsetDateTime) -> String {
    let mut stamp = now.unix_timestamp_nanos();
    loop {
        let candidate = format!("task-{stamp}");
        if !state.tasks.iter().any(|task| task.id == candidate) {
            return candidate;
        }
        stamp += 1;
    }
}

fn confirmation_text(
    parsed_date: Option<OffsetDateTime>,
    interval_minutes: Option<u32>,
    offset: UtcOffset,
) -> Result<String, AppError> {
    let mut message = String::from("✅ *Anotado*");
    if let Some(date) = parsed_date {
        message.push_str(&format!(" para: {}", format_local(date, offset)?));
    }
    if let Some(minutes) = interval_minutes {
        message.push_str(&format!("\n🔁 *Repetir:* Cada {minutes} min."));
    }
    Ok(message)
}

pub fn format_local(instant: OffsetDateTime, offset: UtcOffset) -> Result<String, AppError> {
    let format = format_description!("[day]/[month]/[year] [hour]:[minute]");
    instant
        .to_offset(offset)
        .format(&format)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// The owner's not-completed tasks in storage order, numbered from 1.
pub fn pending_view(state: &StoreState, owner_id: &str) -> Vec<IndexedTask> {
    state
        .tasks
        .iter()
        .filter(|task| task.is_pending_for(owner_id))
        .enumerate()
        .map(|(position, task)| IndexedTask {
            index: position + 1,
            task: task.clone(),
        })
        .collect()
}

pub async fn list_tasks(store: &SharedStore, owner_id: &str) -> Vec<IndexedTask> {
    let state = store.read().await;
    pending_view(&state, owner_id.trim())
}

pub fn render_task_list(tasks: &[IndexedTask], offset: UtcOffset) -> Result<String, AppError> {
    if tasks.is_empty() {
        return Ok("🎉 Sin tareas pendientes.".to_string());
    }

    let mut message = String::from("📋 *TU AGENDA*\n");
    for entry in tasks {
        let repeat = match entry.task.recurrence_interval_minutes {
            Some(minutes) => format!(" 🔁 Cada {minutes}m"),
            None => String::new(),
        };
        message.push_str(&format!(
            "*{}.* {}{}\n   🕒 {}\n",
            entry.index,
            entry.task.description,
            repeat,
            format_local(entry.task.due_date, offset)?
        ));
    }
    message.push_str("\n🗑️ /borrar [numero]");
    Ok(message)
}

/// Removes the task shown at `index_arg` in the owner's pending view.
pub async fn delete_task(
    store: &SharedStore,
    owner_id: &str,
    index_arg: &str,
) -> Result<Task, AppError> {
    let owner_id = owner_id.trim();
    let index_arg = index_arg.trim();
    let index: usize = index_arg
        .parse()
        .map_err(|_| AppError::invalid_index(format!("'{index_arg}' is not a task number")))?;

    let removed = store
        .update(|state| {
            let view = pending_view(state, owner_id);
            let target = index
                .checked_sub(1)
                .and_then(|position| view.get(position))
                .ok_or_else(|| {
                    AppError::invalid_index(format!(
                        "task number must be between 1 and {}",
                        view.len()
                    ))
                })?;

            let position = state
                .tasks
                .iter()
                .position(|task| task.id == target.task.id)
                .ok_or_else(|| AppError::invalid_data("task vanished from store"))?;
            Ok(state.tasks.remove(position))
        })
        .await?;

    info!(task_id = %removed.id, owner = %owner_id, "task deleted");
    Ok(removed)
}
