mod cli;

use clap::Parser;
use clap::error::ErrorKind;
use cli::{AddArgs, Cli, Command, EditArgs, HistoryCommand, ListCommand, collect_overrides};
use memoguard_core::clock::{format_clock, parse_input_timestamp, parse_timestamp};
use memoguard_core::config::{self, Config, Palette, palette_for_theme};
use memoguard_core::assessment::{PatientAssessment, load_assessments};
use memoguard_core::error::AppError;
use memoguard_core::insight::{MemoryInsights, insights_for};
use memoguard_core::memory::{MemoryItem, load_memories};
use memoguard_core::model::{
    CareTask, HistoryPatch, Priority, ReminderLogEntry, ReminderSlot, TaskDraft, TaskPatch,
    TaskStatus,
};
use memoguard_core::scheduler::format_reminder;
use memoguard_core::source::{RemoteFileSource, SeedSource, TaskSource};
use memoguard_core::task_api::{self, ListView};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::{OffsetDateTime, UtcOffset};

struct Context {
    json: bool,
    now: OffsetDateTime,
    offset: UtcOffset,
    config: Config,
    palette: Palette,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Starts")]
    starts: String,
    #[tabled(rename = "Frequency")]
    frequency: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Lead")]
    lead: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct ReminderRow {
    #[tabled(rename = "At")]
    at: String,
    #[tabled(rename = "Task")]
    title: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Trigger")]
    trigger_at: String,
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "When")]
    timestamp: String,
    #[tabled(rename = "Task")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct MemoryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Date")]
    event_date: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Tone")]
    tone: String,
    #[tabled(rename = "Keywords")]
    keywords: String,
}

#[derive(Tabled)]
struct AssessmentRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Assessment")]
    label: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn parse_priority(raw: Option<&str>) -> Result<Option<Priority>, AppError> {
    raw.map(|value| {
        Priority::parse(value).ok_or_else(|| {
            AppError::invalid_input(format!("priority must be low, medium or high, got '{value}'"))
        })
    })
    .transpose()
}

fn parse_status(raw: &str) -> Result<TaskStatus, AppError> {
    TaskStatus::parse(raw).ok_or_else(|| {
        AppError::invalid_input(format!(
            "status must be pending, completed, skipped or snoozed, got '{raw}'"
        ))
    })
}

fn local_start(task: &CareTask, offset: UtcOffset) -> String {
    match parse_timestamp(&task.start_at, "start_at") {
        Ok(start) => {
            let date = start.to_offset(offset).date();
            let clock = format_clock(start, offset).unwrap_or_default();
            format!("{date} {clock}")
        }
        Err(_) => task.start_at.clone(),
    }
}

fn print_tasks(ctx: &Context, tasks: &[CareTask]) -> Result<(), AppError> {
    if ctx.json {
        let payload =
            serde_json::to_string(tasks).map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
        return Ok(());
    }

    if tasks.is_empty() {
        println!("{}", ctx.palette.mutedize("No tasks."));
        return Ok(());
    }

    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|task| TaskRow {
            id: task.id.clone(),
            title: task.title.clone(),
            starts: local_start(task, ctx.offset),
            frequency: task.frequency.to_string(),
            priority: task.priority.to_string(),
            lead: format!("{}m", task.reminder_lead),
            status: task
                .latest_status()
                .map(|status| status.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}

fn print_task(ctx: &Context, verb: &str, task: &CareTask) -> Result<(), AppError> {
    if ctx.json {
        let payload =
            serde_json::to_string(task).map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
    } else {
        println!(
            "{verb} task: {} ({})",
            ctx.palette.accentize(&task.title),
            ctx.palette.mutedize(&task.id)
        );
    }
    Ok(())
}

fn print_task_details(ctx: &Context, task: &CareTask) -> Result<(), AppError> {
    if ctx.json {
        return print_task(ctx, "", task);
    }

    println!("{}", ctx.palette.accentize(&task.title));
    println!("  id:        {}", task.id);
    println!("  category:  {}", task.category);
    println!("  frequency: {}", task.frequency);
    println!("  starts:    {}", task.start_at);
    println!("  ends:      {}", task.end_at.as_deref().unwrap_or("-"));
    println!("  priority:  {}", task.priority);
    println!("  reminder:  {} min before via {}", task.reminder_lead, task.reminder_channel.join(", "));
    if let Some(notes) = task.notes.as_deref().filter(|notes| !notes.is_empty()) {
        println!("  notes:     {notes}");
    }
    if task.status_history.is_empty() {
        println!("  history:   {}", ctx.palette.mutedize("none"));
    } else {
        println!("  history:");
        for entry in &task.status_history {
            println!("    {} {}", entry.timestamp, entry.status);
        }
    }
    Ok(())
}

fn print_reminders(ctx: &Context, slots: &[ReminderSlot]) -> Result<(), AppError> {
    if ctx.json {
        let payload =
            serde_json::to_string(slots).map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
        return Ok(());
    }

    if slots.is_empty() {
        println!("{}", ctx.palette.mutedize("No upcoming reminders."));
        return Ok(());
    }

    let mut rows = Vec::with_capacity(slots.len());
    for slot in slots {
        rows.push(ReminderRow {
            at: format_reminder(slot, ctx.offset)?,
            title: slot.title.clone(),
            channel: slot.channel.clone(),
            trigger_at: slot.trigger_at.clone(),
        });
    }
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}

fn print_log(ctx: &Context, entries: &[ReminderLogEntry]) -> Result<(), AppError> {
    if ctx.json {
        let payload =
            serde_json::to_string(entries).map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", ctx.palette.mutedize("No reminder history."));
        return Ok(());
    }

    let rows: Vec<LogRow> = entries
        .iter()
        .map(|entry| LogRow {
            timestamp: entry.timestamp.clone(),
            title: entry.title.clone(),
            status: entry.status.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}

fn print_insights(ctx: &Context, insights: &MemoryInsights) -> Result<(), AppError> {
    if ctx.json {
        let payload = serde_json::to_string(insights)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
        return Ok(());
    }

    println!("{}", ctx.palette.accentize(&insights.summary));
    println!("  tone:     {}", insights.tone);
    if insights.keywords.is_empty() {
        println!("  keywords: {}", ctx.palette.mutedize("none"));
    } else {
        println!("  keywords: {}", insights.keywords.join(", "));
    }
    Ok(())
}

fn print_memories(ctx: &Context, memories: &[MemoryItem]) -> Result<(), AppError> {
    if ctx.json {
        let payload = serde_json::to_string(memories)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
        return Ok(());
    }

    if memories.is_empty() {
        println!("{}", ctx.palette.mutedize("No memories."));
        return Ok(());
    }

    let rows: Vec<MemoryRow> = memories
        .iter()
        .map(|memory| MemoryRow {
            id: memory.id.clone(),
            event_date: memory.event_date.clone(),
            title: memory.title.clone(),
            tone: memory.insights.tone.to_string(),
            keywords: memory.insights.keywords.join(", "),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}

fn print_assessments(ctx: &Context, assessments: &[PatientAssessment]) -> Result<(), AppError> {
    if ctx.json {
        let payload = serde_json::to_string(assessments)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        println!("{payload}");
        return Ok(());
    }

    if assessments.is_empty() {
        println!("{}", ctx.palette.mutedize("No assessments."));
        return Ok(());
    }

    let rows: Vec<AssessmentRow> = assessments
        .iter()
        .map(|assessment| AssessmentRow {
            date: assessment.date.clone(),
            label: assessment.label.clone(),
            value: match assessment.value {
                Some(value) => format!("{value} {}", assessment.unit),
                None => "-".to_string(),
            },
            status: assessment.status.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}

fn add_draft(args: AddArgs) -> Result<TaskDraft, AppError> {
    let title = match args.title {
        Some(value) if !value.trim().is_empty() => value,
        _ => return Err(AppError::invalid_input("title is required")),
    };
    let start_at = args
        .start
        .ok_or_else(|| AppError::invalid_input("start is required"))?;

    Ok(TaskDraft {
        title,
        start_at,
        frequency: args.frequency,
        notes: args.notes,
        category: args.category,
        priority: parse_priority(args.priority.as_deref())?,
        reminder_lead: args.lead,
        reminder_channel: (!args.channels.is_empty()).then_some(args.channels),
    })
}

fn edit_patch(args: EditArgs) -> Result<(String, TaskPatch), AppError> {
    let end_at = if args.clear_end {
        Some(None)
    } else {
        args.end.map(Some)
    };
    let patch = TaskPatch {
        title: args.title,
        category: args.category,
        frequency: args.frequency,
        start_at: args.start,
        end_at,
        priority: parse_priority(args.priority.as_deref())?,
        reminder_lead: args.lead,
        reminder_channel: (!args.channels.is_empty()).then_some(args.channels),
        notes: args.notes,
    };
    Ok((args.id, patch))
}

fn run_command(command: Command, ctx: &Context) -> Result<(), AppError> {
    match command {
        Command::Add(args) => {
            let draft = add_draft(args)?;
            let task = task_api::add_task(&draft, ctx.now)?;
            print_task(ctx, "Added", &task)?;
        }
        Command::Edit(args) => {
            let (id, patch) = edit_patch(args)?;
            let task = task_api::update_task(&id, &patch)?;
            print_task(ctx, "Updated", &task)?;
        }
        Command::Show { id } => {
            let task = task_api::get_task(&id)?;
            print_task_details(ctx, &task)?;
        }
        Command::Remove { id } => {
            let task = task_api::remove_task(&id)?;
            print_task(ctx, "Removed", &task)?;
        }
        Command::Done { id } => {
            let task = task_api::complete_task(&id, ctx.now)?;
            print_task(ctx, "Completed", &task)?;
        }
        Command::List { view } => {
            let view = match view.unwrap_or(ListCommand::All) {
                ListCommand::All => ListView::All,
                ListCommand::Today => ListView::Today,
                ListCommand::Upcoming => ListView::Upcoming,
            };
            let tasks = task_api::list_tasks(view, ctx.now, ctx.offset)?;
            print_tasks(ctx, &tasks)?;
        }
        Command::Log { limit } => {
            let entries = task_api::reminder_log(limit)?;
            print_log(ctx, &entries)?;
        }
        Command::Reminders { limit } => {
            let limit = match limit {
                Some(value) => usize::try_from(value).unwrap_or(0),
                None => ctx.config.reminder_limit(),
            };
            let slots = task_api::upcoming_reminders(limit, ctx.now)?;
            print_reminders(ctx, &slots)?;
        }
        Command::History { action } => run_history(action, ctx)?,
        Command::Sync { from } => {
            let source: Box<dyn TaskSource> = match from {
                Some(path) => Box::new(RemoteFileSource::new(path)),
                None => Box::new(SeedSource),
            };
            let outcome = task_api::sync_tasks(source.as_ref())?;
            if outcome.used_cache {
                eprintln!(
                    "WARNING: could not refresh from {}, keeping cached tasks",
                    source.name()
                );
            }
            if ctx.json {
                print_tasks(ctx, &outcome.tasks)?;
            } else {
                println!(
                    "Synced {} tasks from {} ({})",
                    outcome.tasks.len(),
                    source.name(),
                    outcome.state.as_str()
                );
            }
        }
        Command::Notify => {
            let outcome =
                task_api::notify_due_reminders(ctx.now, ctx.config.notify_window_minutes())?;
            for failure in &outcome.failures {
                eprintln!("ERROR: {} ({})", failure.error, failure.slot_id);
            }
            if ctx.json {
                print_reminders(ctx, &outcome.delivered)?;
            } else {
                println!(
                    "Sent {} reminders, skipped {} on other channels",
                    outcome.delivered.len(),
                    outcome.skipped.len()
                );
            }
        }
        Command::Insight { text } => print_insights(ctx, &insights_for(&text))?,
        Command::Memories { from } => {
            let memories = load_memories(&from, ctx.now)?;
            print_memories(ctx, &memories)?;
        }
        Command::Assessments { from } => {
            let assessments = load_assessments(&from, ctx.now)?;
            print_assessments(ctx, &assessments)?;
        }
    }

    Ok(())
}

fn run_history(action: HistoryCommand, ctx: &Context) -> Result<(), AppError> {
    match action {
        HistoryCommand::Add {
            id,
            status,
            timestamp,
        } => {
            let status = parse_status(&status)?;
            let (task, entry) = task_api::add_reminder_entry(&id, status, &timestamp)?;
            if ctx.json {
                print_task(ctx, "", &task)?;
            } else {
                println!(
                    "Logged {} for {} at {}",
                    entry.status,
                    ctx.palette.accentize(&task.title),
                    entry.timestamp
                );
            }
        }
        HistoryCommand::Update {
            id,
            timestamp,
            status,
            new_timestamp,
        } => {
            let patch = HistoryPatch {
                status: status.as_deref().map(parse_status).transpose()?,
                timestamp: new_timestamp,
            };
            let task = task_api::update_reminder_entry(&id, &timestamp, &patch)?;
            print_task(ctx, "Updated history of", &task)?;
        }
        HistoryCommand::Remove { id, timestamp } => {
            let task = task_api::remove_reminder_entry(&id, &timestamp)?;
            print_task(ctx, "Updated history of", &task)?;
        }
    }
    Ok(())
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

fn build_context(cli: &Cli) -> Result<(Context, Option<AppError>), AppError> {
    let loaded = config::load_config_with_fallback();
    let overrides = collect_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    let config = config::merge_overrides(&loaded.config, &overrides);

    let now = match cli.now.as_deref() {
        Some(raw) => parse_input_timestamp(raw, "now")?,
        None => OffsetDateTime::now_utc(),
    };
    let offset = config.offset()?;
    let palette = palette_for_theme(config.theme.as_deref());

    Ok((
        Context {
            json: cli.json,
            now,
            offset,
            config,
            palette,
        },
        loaded.error,
    ))
}

fn init_logging(config: &Config) {
    env_logger::Builder::from_env(
        env_logger::Env::new().filter_or("MEMOGUARD_LOG", config.log_level()),
    )
    .format_timestamp(None)
    .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    let (ctx, config_error) = match build_context(&cli) {
        Ok(built) => built,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    };

    init_logging(&ctx.config);
    if let Some(err) = config_error {
        log::warn!("ignoring config file: {err}");
    }
    log::debug!("running {:?} at {}", cli.command, ctx.now);

    if let Err(err) = run_command(cli.command, &ctx) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{add_draft, edit_patch, parse_status};
    use crate::cli::{AddArgs, EditArgs};
    use memoguard_core::model::{Priority, TaskStatus};

    fn add_args(title: Option<&str>, start: Option<&str>) -> AddArgs {
        AddArgs {
            title: title.map(str::to_string),
            start: start.map(str::to_string),
            frequency: "daily".to_string(),
            notes: None,
            category: None,
            priority: Some("HIGH".to_string()),
            lead: None,
            channels: Vec::new(),
        }
    }

    #[test]
    fn add_draft_requires_title_and_start() {
        let err = add_draft(add_args(None, Some("2025-09-21T08:00:00Z"))).unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        let err = add_draft(add_args(Some("walk"), None)).unwrap_err();
        assert!(err.message().contains("start"));

        let draft = add_draft(add_args(Some("walk"), Some("2025-09-21T08:00:00Z"))).unwrap();
        assert_eq!(draft.priority, Some(Priority::High));
        assert_eq!(draft.reminder_channel, None);
    }

    #[test]
    fn edit_patch_maps_clear_end() {
        let args = EditArgs {
            id: "t-1".to_string(),
            title: None,
            category: None,
            frequency: None,
            start: None,
            end: None,
            clear_end: true,
            priority: None,
            lead: Some(5),
            channels: vec!["sms".to_string()],
            notes: None,
        };

        let (id, patch) = edit_patch(args).unwrap();

        assert_eq!(id, "t-1");
        assert_eq!(patch.end_at, Some(None));
        assert_eq!(patch.reminder_lead, Some(5));
        assert_eq!(patch.reminder_channel, Some(vec!["sms".to_string()]));
    }

    #[test]
    fn parse_status_rejects_unknown() {
        assert_eq!(parse_status("snoozed").unwrap(), TaskStatus::Snoozed);
        assert_eq!(parse_status("lost").unwrap_err().code(), "invalid_input");
    }
}
