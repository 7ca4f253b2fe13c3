use clap::{Args, Parser, Subcommand};
use memoguard_core::config::ConfigOverrides;
use memoguard_core::task_api::DASHBOARD_LIMIT;

#[derive(Parser, Debug)]
#[command(name = "memoguard", author, version, about = "Care-task reminders for MemoGuard caregivers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Evaluate as if the current time were this RFC3339 instant
    #[arg(long, value_name = "RFC3339", global = true)]
    pub now: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a care task
    ///
    /// Example: memoguard add "Morning medication" --start 2025-09-21T08:00:00+08:00 --frequency daily
    Add(AddArgs),
    /// Change fields of a task
    ///
    /// Example: memoguard edit t-001 --lead 30 --channel sms
    Edit(EditArgs),
    /// Show details of a task
    ///
    /// Example: memoguard show t-001
    Show { id: String },
    /// Remove a task
    ///
    /// Example: memoguard remove t-001
    Remove { id: String },
    /// Record a completion for a task
    ///
    /// Example: memoguard done t-001
    Done { id: String },
    /// List tasks
    ///
    /// Example: memoguard list today
    List {
        #[command(subcommand)]
        view: Option<ListCommand>,
    },
    /// Show the most recent status changes across all tasks
    ///
    /// Example: memoguard log --limit 10
    Log {
        #[arg(long, default_value_t = DASHBOARD_LIMIT)]
        limit: usize,
    },
    /// Preview the next reminders
    ///
    /// Example: memoguard reminders --limit 5
    Reminders {
        /// Number of reminders to show; defaults to the configured limit
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },
    /// Edit a task's reminder log
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
    /// Refresh tasks from the built-in fixtures or a task API export
    ///
    /// Example: memoguard sync --from tasks-export.json
    Sync {
        #[arg(long, value_name = "FILE")]
        from: Option<std::path::PathBuf>,
    },
    /// Send desktop notifications for reminders due soon
    ///
    /// Example: memoguard notify
    Notify,
    /// Summarize a memory text: tone, keywords and a short summary
    ///
    /// Example: memoguard insight "今天和孙女一起包饺子，很开心"
    Insight { text: String },
    /// List memories from a companion app export
    ///
    /// Example: memoguard memories --from memories.json
    Memories {
        #[arg(long, value_name = "FILE")]
        from: std::path::PathBuf,
    },
    /// List patient assessments from a clinic export, oldest first
    ///
    /// Example: memoguard assessments --from assessments.json
    Assessments {
        #[arg(long, value_name = "FILE")]
        from: std::path::PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub title: Option<String>,
    /// First occurrence (RFC3339)
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long, default_value = "once")]
    pub frequency: String,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// low, medium or high
    #[arg(long)]
    pub priority: Option<String>,
    /// Minutes before the start at which to remind
    #[arg(long)]
    pub lead: Option<u32>,
    /// Delivery channel; repeat for several, first one is used for reminders
    #[arg(long = "channel")]
    pub channels: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub frequency: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long, conflicts_with = "clear_end")]
    pub end: Option<String>,
    #[arg(long)]
    pub clear_end: bool,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub lead: Option<u32>,
    #[arg(long = "channel")]
    pub channels: Vec<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ListCommand {
    /// Every task
    All,
    /// Tasks starting today
    Today,
    /// The next five tasks by start time
    Upcoming,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Example: memoguard history add t-001 snoozed 2025-09-20T08:30:00+08:00
    Add {
        id: String,
        status: String,
        timestamp: String,
    },
    /// Example: memoguard history update t-001 2025-09-20T08:30:00+08:00 --status skipped
    Update {
        id: String,
        timestamp: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "timestamp", value_name = "RFC3339")]
        new_timestamp: Option<String>,
    },
    /// Example: memoguard history remove t-001 2025-09-20T08:30:00+08:00
    Remove { id: String, timestamp: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    UtcOffset,
    ReminderLimit,
    NotifyWindowMinutes,
    LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let (key_raw, value_raw) = raw
        .trim()
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;
    let target = match field.as_str() {
        "theme" => ConfigOverrideTarget::Theme,
        "utc_offset" | "offset" | "timezone" => ConfigOverrideTarget::UtcOffset,
        "reminder_limit" | "limit" => ConfigOverrideTarget::ReminderLimit,
        "notify_window_minutes" | "notify_window" => ConfigOverrideTarget::NotifyWindowMinutes,
        "log_level" | "log" => ConfigOverrideTarget::LogLevel,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride {
        target,
        value: value_raw.trim().to_string(),
    })
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::UtcOffset => overrides.utc_offset = Some(parsed.value),
            ConfigOverrideTarget::ReminderLimit => {
                let limit = parsed
                    .value
                    .parse()
                    .map_err(|_| format!("reminder_limit must be a number, got '{}'", parsed.value))?;
                overrides.reminder_limit = Some(limit);
            }
            ConfigOverrideTarget::NotifyWindowMinutes => {
                let minutes = parsed.value.parse().map_err(|_| {
                    format!("notify_window_minutes must be a number, got '{}'", parsed.value)
                })?;
                overrides.notify_window_minutes = Some(minutes);
            }
            ConfigOverrideTarget::LogLevel => overrides.log_level = Some(parsed.value),
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigOverrideTarget, collect_overrides, parse_config_override};

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" UTC-Offset = +08:00 ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::UtcOffset);
        assert_eq!(parsed.value, "+08:00");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("unknown.field=value").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("theme").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn collect_overrides_parses_numbers() {
        let overrides = collect_overrides(&[
            "reminder_limit=7".to_string(),
            "notify-window=30".to_string(),
            "theme=noir".to_string(),
        ])
        .unwrap();

        assert_eq!(overrides.reminder_limit, Some(7));
        assert_eq!(overrides.notify_window_minutes, Some(30));
        assert_eq!(overrides.theme.as_deref(), Some("noir"));
    }

    #[test]
    fn collect_overrides_rejects_non_numeric_limit() {
        let err = collect_overrides(&["limit=many".to_string()]).unwrap_err();
        assert!(err.contains("reminder_limit"));
    }
}
