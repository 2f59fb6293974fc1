//! Periodic reminder scan.
//!
//! Each tick snapshots the store, decides which tasks are due, sends one
//! reminder per due task and then commits the trigger bookkeeping in a single
//! write. Delivery is best-effort: a failed or timed-out send is logged and
//! reported, but the task's bookkeeping still advances, so an occurrence is
//! never retried.

use crate::error::AppError;
use crate::model::Task;
use crate::notify::NotificationSink;
use crate::storage::SharedStore;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Skip,
    Fire,
}

/// Decides whether `task` fires at `now`.
///
/// Recurring tasks gate their first occurrence on the anchor and every later
/// one on whole minutes elapsed since the previous fire, so a late scan still
/// fires once and missed windows are not replayed.
pub fn trigger_for(task: &Task, now: OffsetDateTime) -> Trigger {
    if task.is_completed {
        return Trigger::Skip;
    }

    let due = match task.recurrence_interval_minutes {
        None => !task.reminder_sent && task.due_date <= now,
        Some(interval) => match task.last_reminded_at {
            None => task.due_date <= now,
            Some(last) => (now - last).whole_minutes() >= i64::from(interval.max(1)),
        },
    };

    if due { Trigger::Fire } else { Trigger::Skip }
}

/// Records a fire at `now`.
pub fn apply_fire(task: &mut Task, now: OffsetDateTime) {
    if task.is_recurring() {
        let mut fired_at = now.max(task.due_date);
        if let Some(previous) = task.last_reminded_at {
            fired_at = fired_at.max(previous);
        }
        task.last_reminded_at = Some(fired_at);
    } else {
        task.reminder_sent = true;
    }
}

pub fn reminder_text(task: &Task) -> String {
    let mut text = format!("⏰ *RECORDATORIO*\n\n📌 {}", task.description);
    if let Some(interval) = task.recurrence_interval_minutes {
        text.push_str(&format!("\n🔄 _Siguiente en {interval} min_"));
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub task_id: String,
    pub recipient_id: String,
    pub error: AppError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Ids of tasks that fired this tick, in storage order.
    pub fired: Vec<String>,
    pub failures: Vec<SendFailure>,
    /// Whether bookkeeping was written back.
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub send_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

struct PlannedFire {
    task_id: String,
    recipient_id: String,
    text: String,
}

pub struct ReminderEngine {
    store: SharedStore,
    sink: Arc<dyn NotificationSink>,
    settings: EngineSettings,
    /// Held for a whole tick so two scans never interleave.
    run_lock: Mutex<()>,
}

impl ReminderEngine {
    pub fn new(store: SharedStore, sink: Arc<dyn NotificationSink>, settings: EngineSettings) -> Self {
        Self {
            store,
            sink,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn tick(&self) -> Result<TickReport, AppError> {
        self.tick_at(OffsetDateTime::now_utc()).await
    }

    /// Runs one scan as if the wall clock read `now`.
    pub async fn tick_at(&self, now: OffsetDateTime) -> Result<TickReport, AppError> {
        let _running = self.run_lock.lock().await;

        let snapshot = self.store.read().await;
        let plan: Vec<PlannedFire> = snapshot
            .tasks
            .iter()
            .filter(|task| trigger_for(task, now) == Trigger::Fire)
            .map(|task| PlannedFire {
                task_id: task.id.clone(),
                recipient_id: task.owner_id.clone(),
                text: reminder_text(task),
            })
            .collect();

        if plan.is_empty() {
            debug!(tasks = snapshot.tasks.len(), "tick: nothing due");
            return Ok(TickReport::default());
        }

        let mut report = TickReport::default();
        for fire in &plan {
            debug!(task_id = %fire.task_id, recipient = %fire.recipient_id, "sending reminder");
            if let Err(err) = self.deliver(&fire.recipient_id, &fire.text).await {
                warn!(
                    task_id = %fire.task_id,
                    recipient = %fire.recipient_id,
                    "reminder not delivered: {err}"
                );
                report.failures.push(SendFailure {
                    task_id: fire.task_id.clone(),
                    recipient_id: fire.recipient_id.clone(),
                    error: err,
                });
            }
            report.fired.push(fire.task_id.clone());
        }

        self.store
            .update(|state| {
                for fire in &plan {
                    if let Some(task) = state
                        .tasks
                        .iter_mut()
                        .find(|task| task.id == fire.task_id && !task.is_completed)
                    {
                        apply_fire(task, now);
                    }
                }
                Ok(())
            })
            .await?;
        report.persisted = true;

        info!(
            fired = report.fired.len(),
            failed = report.failures.len(),
            "tick complete"
        );
        Ok(report)
    }

    async fn deliver(&self, recipient_id: &str, text: &str) -> Result<(), AppError> {
        match tokio::time::timeout(self.settings.send_timeout, self.sink.send(recipient_id, text)).await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::send_failure(format!(
                "send timed out after {}s",
                self.settings.send_timeout.as_secs_f32()
            ))),
        }
    }

    /// Starts the periodic scan on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.settings.tick_interval.as_secs(),
                "reminder engine started"
            );
            let mut interval = tokio::time::interval(self.settings.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if let Err(err) = self.tick().await {
                    error!("reminder tick failed: {err}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineSettings, ReminderEngine, Trigger, apply_fire, reminder_text, trigger_for};
    use crate::error::AppError;
    use crate::model::Task;
    use crate::notify::NotificationSink;
    use crate::storage::{MemoryStore, SharedStore, StoreState};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use time::OffsetDateTime;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2026-10-17 12:00 UTC);

    fn minutes(n: i64) -> time::Duration {
        time::Duration::minutes(n)
    }

    fn one_shot(id: &str, due: OffsetDateTime) -> Task {
        Task {
            id: id.to_string(),
            description: format!("task {id}"),
            due_date: due,
            recurrence_interval_minutes: None,
            last_reminded_at: None,
            reminder_sent: false,
            is_completed: false,
            owner_id: format!("owner-{id}"),
        }
    }

    fn recurring(id: &str, due: OffsetDateTime, interval: u32) -> Task {
        Task {
            recurrence_interval_minutes: Some(interval),
            ..one_shot(id, due)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Vec<String>,
    }

    impl RecordingSink {
        fn failing_for(recipients: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: recipients.iter().map(|r| r.to_string()).collect(),
            }
        }

        fn recipients(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(recipient, _)| recipient.clone())
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, recipient_id: &str, text: &str) -> Result<(), AppError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient_id.to_string(), text.to_string()));
            if self.fail_for.iter().any(|r| r == recipient_id) {
                return Err(AppError::send_failure("socket closed"));
            }
            Ok(())
        }
    }

    struct HangingSink;

    #[async_trait]
    impl NotificationSink for HangingSink {
        async fn send(&self, _recipient_id: &str, _text: &str) -> Result<(), AppError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn engine_with(
        tasks: Vec<Task>,
        sink: Arc<dyn NotificationSink>,
    ) -> (ReminderEngine, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new(StoreState {
            tasks,
            ..StoreState::default()
        }));
        let engine = ReminderEngine::new(
            SharedStore::from_arc(memory.clone()),
            sink,
            EngineSettings {
                tick_interval: Duration::from_secs(60),
                send_timeout: Duration::from_millis(50),
            },
        );
        (engine, memory)
    }

    #[test]
    fn one_shot_fires_once_due() {
        let mut task = one_shot("a", T0);

        assert_eq!(trigger_for(&task, T0 - minutes(1)), Trigger::Skip);
        assert_eq!(trigger_for(&task, T0), Trigger::Fire);

        apply_fire(&mut task, T0);
        assert!(task.reminder_sent);
        assert_eq!(task.last_reminded_at, None);
        for later in [1, 60, 60 * 24 * 365] {
            assert_eq!(trigger_for(&task, T0 + minutes(later)), Trigger::Skip);
        }
    }

    #[test]
    fn completed_tasks_never_fire() {
        let mut task = recurring("a", T0 - minutes(500), 5);
        task.is_completed = true;
        assert_eq!(trigger_for(&task, T0), Trigger::Skip);
    }

    #[test]
    fn first_recurring_fire_gates_on_anchor_not_interval() {
        let task = recurring("a", T0, 600);

        assert_eq!(trigger_for(&task, T0 - minutes(1)), Trigger::Skip);
        assert_eq!(trigger_for(&task, T0), Trigger::Fire);
    }

    #[test]
    fn recurring_waits_whole_interval_from_last_fire() {
        let mut task = recurring("a", T0, 45);
        apply_fire(&mut task, T0 + minutes(3));

        let last = T0 + minutes(3);
        assert_eq!(task.last_reminded_at, Some(last));
        assert_eq!(
            trigger_for(&task, last + minutes(45) - time::Duration::seconds(1)),
            Trigger::Skip
        );
        assert_eq!(trigger_for(&task, last + minutes(45)), Trigger::Fire);
    }

    #[test]
    fn late_scan_fires_once_and_reanchors_without_backfill() {
        let mut task = recurring("a", T0, 10);
        apply_fire(&mut task, T0);

        // Scanner stalled for 35 minutes: three windows were missed.
        let late = T0 + minutes(35);
        assert_eq!(trigger_for(&task, late), Trigger::Fire);
        apply_fire(&mut task, late);

        assert_eq!(task.last_reminded_at, Some(late));
        assert_eq!(trigger_for(&task, late + minutes(9)), Trigger::Skip);
        assert_eq!(trigger_for(&task, late + minutes(10)), Trigger::Fire);
    }

    #[test]
    fn stored_zero_interval_is_clamped_to_one_minute() {
        let mut task = recurring("a", T0, 0);
        apply_fire(&mut task, T0);

        assert_eq!(trigger_for(&task, T0 + time::Duration::seconds(30)), Trigger::Skip);
        assert_eq!(trigger_for(&task, T0 + minutes(1)), Trigger::Fire);
    }

    #[test]
    fn last_reminded_never_moves_backwards() {
        let mut task = recurring("a", T0, 5);
        task.last_reminded_at = Some(T0 + minutes(30));

        apply_fire(&mut task, T0 + minutes(10));

        assert_eq!(task.last_reminded_at, Some(T0 + minutes(30)));
    }

    #[test]
    fn reminder_text_mentions_next_window_for_recurring() {
        assert_eq!(
            reminder_text(&one_shot("a", T0)),
            "⏰ *RECORDATORIO*\n\n📌 task a"
        );
        assert_eq!(
            reminder_text(&recurring("b", T0, 45)),
            "⏰ *RECORDATORIO*\n\n📌 task b\n🔄 _Siguiente en 45 min_"
        );
    }

    #[tokio::test]
    async fn quiet_tick_performs_no_write() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, memory) = engine_with(
            vec![one_shot("a", T0 + minutes(5)), recurring("b", T0 + minutes(1), 5)],
            sink.clone(),
        );

        let report = engine.tick_at(T0).await.unwrap();

        assert!(report.fired.is_empty());
        assert!(!report.persisted);
        assert_eq!(memory.save_count(), 0);
        assert!(sink.recipients().is_empty());
    }

    #[tokio::test]
    async fn due_tasks_fire_once_per_tick_and_batch_one_write() {
        let sink = Arc::new(RecordingSink::default());
        let mut done = one_shot("done", T0 - minutes(5));
        done.is_completed = true;
        let (engine, memory) = engine_with(
            vec![
                one_shot("a", T0 - minutes(600)),
                recurring("b", T0 - minutes(90), 5),
                one_shot("later", T0 + minutes(1)),
                done,
            ],
            sink.clone(),
        );

        let report = engine.tick_at(T0).await.unwrap();

        assert_eq!(report.fired, vec!["a", "b"]);
        assert!(report.persisted);
        assert_eq!(memory.save_count(), 1);
        assert_eq!(sink.recipients(), vec!["owner-a", "owner-b"]);

        let stored = memory.snapshot().tasks;
        assert!(stored[0].reminder_sent);
        assert_eq!(stored[1].last_reminded_at, Some(T0));
        assert!(!stored[2].reminder_sent);
        assert!(!stored[3].reminder_sent);

        // Same instant again: nothing left to do.
        let again = engine.tick_at(T0).await.unwrap();
        assert!(again.fired.is_empty());
        assert_eq!(memory.save_count(), 1);
    }

    #[tokio::test]
    async fn send_failure_still_commits_and_other_tasks_are_sent() {
        let sink = Arc::new(RecordingSink::failing_for(&["owner-a"]));
        let (engine, memory) = engine_with(
            vec![one_shot("a", T0), recurring("b", T0, 15)],
            sink.clone(),
        );

        let report = engine.tick_at(T0).await.unwrap();

        assert_eq!(report.fired, vec!["a", "b"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].task_id, "a");
        assert_eq!(report.failures[0].error.code(), "send_failure");
        assert_eq!(sink.recipients(), vec!["owner-a", "owner-b"]);

        let stored = memory.snapshot().tasks;
        assert!(stored[0].reminder_sent);
        assert_eq!(stored[1].last_reminded_at, Some(T0));

        let next = engine.tick_at(T0 + minutes(1)).await.unwrap();
        assert!(next.fired.is_empty());
    }

    #[tokio::test]
    async fn hung_send_times_out_as_failure() {
        let (engine, memory) = engine_with(vec![one_shot("a", T0)], Arc::new(HangingSink));

        let report = engine.tick_at(T0).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.message().contains("timed out"));
        assert!(memory.snapshot().tasks[0].reminder_sent);
    }

    #[tokio::test]
    async fn recurring_fires_are_spaced_by_interval_across_ticks() {
        let sink = Arc::new(RecordingSink::default());
        let (engine, memory) = engine_with(vec![recurring("r", T0, 3)], sink.clone());

        let mut fire_times = Vec::new();
        for minute in 0..10 {
            let now = T0 + minutes(minute);
            if !engine.tick_at(now).await.unwrap().fired.is_empty() {
                fire_times.push(minute);
            }
        }

        assert_eq!(fire_times, vec![0, 3, 6, 9]);
        assert_eq!(memory.save_count(), 4);
        assert_eq!(
            memory.snapshot().tasks[0].last_reminded_at,
            Some(T0 + minutes(9))
        );
    }

    #[tokio::test]
    async fn task_deleted_during_tick_is_not_resurrected() {
        struct DeletingSink {
            store: SharedStore,
        }

        #[async_trait]
        impl NotificationSink for DeletingSink {
            async fn send(&self, _recipient_id: &str, _text: &str) -> Result<(), AppError> {
                self.store
                    .update(|state| {
                        state.tasks.clear();
                        Ok(())
                    })
                    .await
            }
        }

        let memory = Arc::new(MemoryStore::new(StoreState {
            tasks: vec![one_shot("a", T0)],
            ..StoreState::default()
        }));
        let store = SharedStore::from_arc(memory.clone());
        let engine = ReminderEngine::new(
            store.clone(),
            Arc::new(DeletingSink { store }),
            EngineSettings::default(),
        );

        let report = engine.tick_at(T0).await.unwrap();

        assert_eq!(report.fired, vec!["a"]);
        assert!(memory.snapshot().tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_ticks_on_interval() {
        let sink = Arc::new(RecordingSink::default());
        let past = OffsetDateTime::now_utc() - minutes(1);
        let (engine, memory) = engine_with(vec![one_shot("a", past)], sink.clone());

        let handle = engine.spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.abort();

        assert_eq!(sink.recipients(), vec!["owner-a"]);
        assert!(memory.snapshot().tasks[0].reminder_sent);
    }
}
