mod cli;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cli::{Cli, Command, joined};
use std::io::Write;
use std::sync::Arc;
use taskbot_core::admin;
use taskbot_core::config::{Config, load_config_with_fallback};
use taskbot_core::dates::SpanishDateParser;
use taskbot_core::error::AppError;
use taskbot_core::grade;
use taskbot_core::model::Task;
use taskbot_core::model::registry::is_group_id;
use taskbot_core::notify::{NotificationSink, sink_from_env};
use taskbot_core::reminder::{EngineSettings, ReminderEngine, TickReport};
use taskbot_core::session::{Session, SessionEvent};
use taskbot_core::storage::json_store::resolve_store_path;
use taskbot_core::storage::{JsonFileStore, SharedStore};
use taskbot_core::task_api::{self, CreateOptions, IndexedTask};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct App {
    config: Config,
    store: SharedStore,
    parser: SpanishDateParser,
    sink: Arc<dyn NotificationSink>,
}

impl App {
    fn from_env() -> Result<Self, AppError> {
        let loaded = load_config_with_fallback();
        if let Some(err) = &loaded.error {
            warn!("using default configuration: {err}");
        }
        let config = loaded.config;
        let offset = config.offset()?;
        let store_path = resolve_store_path(config.store_path.as_deref())?;
        info!(path = %store_path.display(), "using store");

        Ok(Self {
            store: SharedStore::new(JsonFileStore::new(store_path)),
            parser: SpanishDateParser::new(offset),
            sink: sink_from_env()?,
            config,
        })
    }

    fn offset(&self) -> UtcOffset {
        self.parser.offset()
    }

    fn owner(&self, cli: &Cli) -> String {
        match cli.owner.as_deref().map(str::trim) {
            Some(owner) if !owner.is_empty() => owner.to_string(),
            _ => self.config.default_owner.clone(),
        }
    }

    fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            tick_interval: self.config.tick_interval(),
            send_timeout: self.config.send_timeout(),
        }
    }

    fn require_admin(&self, sender: &str) -> Result<(), AppError> {
        if admin::is_admin(&self.config, sender) {
            Ok(())
        } else {
            Err(AppError::invalid_input("only the admin can run this command"))
        }
    }
}

fn format_rfc3339(instant: OffsetDateTime) -> Result<String, AppError> {
    instant
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn task_json(task: &Task) -> Result<serde_json::Value, AppError> {
    Ok(serde_json::json!({
        "id": task.id,
        "description": task.description,
        "dueDate": format_rfc3339(task.due_date)?,
        "recurrenceInterval": task.recurrence_interval_minutes,
        "owner": task.owner_id,
    }))
}

fn print_tasks_json(tasks: &[IndexedTask]) -> Result<(), AppError> {
    let mut payload = Vec::with_capacity(tasks.len());
    for entry in tasks {
        let mut value = task_json(&entry.task)?;
        value["index"] = serde_json::json!(entry.index);
        payload.push(value);
    }
    println!("{}", serde_json::Value::Array(payload));
    Ok(())
}

fn print_tick_report(report: &TickReport, json: bool) {
    if json {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|failure| {
                serde_json::json!({
                    "task_id": failure.task_id,
                    "error": failure.error.code(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "fired": report.fired,
                "failures": failures,
                "persisted": report.persisted,
            })
        );
    } else {
        println!(
            "Fired {} reminder(s), {} failed",
            report.fired.len(),
            report.failures.len()
        );
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => escape = true,
            '"' => in_quotes = !in_quotes,
            ch if ch.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

/// Registers whoever is talking, the way every incoming chat message does.
async fn register_sender(app: &App, sender: &str) -> Result<(), AppError> {
    let now = OffsetDateTime::now_utc();
    if is_group_id(sender) {
        admin::register_group(&app.store, sender, "Grupo", now).await?;
    }
    admin::register_user(&app.store, sender, sender, now).await?;
    Ok(())
}

async fn run_command(app: &App, cli: Cli) -> Result<(), AppError> {
    let sender = app.owner(&cli);
    register_sender(app, &sender).await?;

    match cli.command {
        Command::Add { text } => {
            let options = CreateOptions {
                min_recurrence_minutes: app.config.min_recurrence_minutes(),
                display_offset: app.offset(),
            };
            let created =
                task_api::create_task(&app.store, &app.parser, options, &sender, &joined(&text))
                    .await?;
            if cli.json {
                println!("{}", task_json(&created.task)?);
            } else {
                println!("{}", created.confirmation);
            }
        }
        Command::List => {
            let tasks = task_api::list_tasks(&app.store, &sender).await;
            if cli.json {
                print_tasks_json(&tasks)?;
            } else {
                println!("{}", task_api::render_task_list(&tasks, app.offset())?);
            }
        }
        Command::Delete { index } => {
            let task = task_api::delete_task(&app.store, &sender, &index).await?;
            if cli.json {
                println!("{}", task_json(&task)?);
            } else {
                println!("🗑️ Eliminada: {}", task.description);
            }
        }
        Command::Grade { values } => {
            let outcome = grade::grade_from_args(&joined(&values))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "current_total": outcome.current_total,
                        "goal": outcome.goal,
                        "needed": outcome.needed,
                    })
                );
            } else {
                println!("{}", grade::render_grade(&outcome));
            }
        }
        Command::Stats => {
            app.require_admin(&sender)?;
            let stats = admin::global_stats(&app.store).await;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "users": stats.users,
                        "groups": stats.groups,
                        "tasks": stats.tasks,
                    })
                );
            } else {
                println!("{}", admin::render_stats(&stats));
            }
        }
        Command::Groups => {
            app.require_admin(&sender)?;
            println!("{}", admin::group_list(&app.store).await);
        }
        Command::JoinGroup { id, name } => {
            let name = match joined(&name) {
                name if name.is_empty() => "Grupo".to_string(),
                name => name,
            };
            let now = OffsetDateTime::now_utc();
            if !is_group_id(&id) {
                return Err(AppError::invalid_input(format!(
                    "'{id}' is not a group id (expected ...@g.us)"
                )));
            }
            let inserted = admin::register_group(&app.store, &id, &name, now).await?;
            if inserted {
                println!("Registered group: {name} ({id})");
            } else {
                println!("Group already registered: {id}");
            }
        }
        Command::Broadcast { text } => {
            app.require_admin(&sender)?;
            let report = admin::broadcast(
                &app.store,
                app.sink.as_ref(),
                &joined(&text),
                app.config.send_timeout(),
            )
            .await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "delivered": report.delivered,
                        "failed": report.failed,
                    })
                );
            } else {
                println!("✅ Enviado. ({} ok, {} failed)", report.delivered, report.failed);
            }
        }
        Command::Tick => {
            let engine = ReminderEngine::new(
                app.store.clone(),
                app.sink.clone(),
                app.engine_settings(),
            );
            let report = engine.tick().await?;
            print_tick_report(&report, cli.json);
        }
        Command::Run => {
            return Err(AppError::invalid_input(
                "run is only available as a top-level command",
            ));
        }
    }

    Ok(())
}

async fn run_interactive(app: &App) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("taskbot".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(app, cli).await {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

/// Reminder loop plus the console session until stdin closes or Ctrl-C.
async fn run_service(app: &App) -> Result<(), AppError> {
    let mut session = Session::new();
    session.apply(SessionEvent::Connect { registered: true })?;

    let engine = ReminderEngine::new(app.store.clone(), app.sink.clone(), app.engine_settings());
    let handle = engine.spawn();

    let (result, interrupted) = tokio::select! {
        result = run_interactive(app) => (result, false),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            (Ok(()), true)
        }
    };

    handle.abort();
    session.apply(SessionEvent::Closed { logged_out: true })?;
    info!(state = ?session.state(), "session closed");

    // The runtime would wait on the blocking stdin read forever.
    if interrupted {
        std::io::stdout().flush().ok();
        std::process::exit(0);
    }
    result
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch() -> Result<(), AppError> {
    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        let app = App::from_env()?;
        return run_interactive(&app).await;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.print()?;
            return Ok(());
        }
        Err(err) => return Err(normalize_parse_error(err)),
    };
    let app = App::from_env()?;
    if cli.command == Command::Run {
        return run_service(&app).await;
    }
    run_command(&app, cli).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = dispatch().await {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::split_command_line;

    #[test]
    fn split_command_line_honours_quotes() {
        let args = split_command_line(r#"add "Parcial de cálculo" -cada 1d"#).unwrap();
        assert_eq!(args, vec!["add", "Parcial de cálculo", "-cada", "1d"]);
    }

    #[test]
    fn split_command_line_keeps_escaped_quotes() {
        let args = split_command_line(r#"add "dice \"hola\"""#).unwrap();
        assert_eq!(args, vec!["add", r#"dice "hola""#]);
    }

    #[test]
    fn split_command_line_rejects_open_quote() {
        let err = split_command_line(r#"add "sin cerrar"#).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}
