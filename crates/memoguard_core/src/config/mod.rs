use crate::clock::{local_offset, parse_offset};
use crate::error::AppError;
use crate::scheduler::DEFAULT_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::UtcOffset;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "MEMOGUARD_CONFIG_PATH";
const DEFAULT_NOTIFY_WINDOW_MINUTES: u32 = 15;
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn accentize(&self, text: &str) -> String {
        self.paint(self.accent, text)
    }

    pub fn mutedize(&self, text: &str) -> String {
        self.paint(self.muted, text)
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if color.is_empty() {
            return text.to_string();
        }
        format!("{color}{text}{}", self.reset)
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match theme.and_then(canonical_theme_name).as_deref() {
        Some("noir") => Palette {
            accent: "\x1b[38;5;208m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        Some("calm") => Palette {
            accent: "\x1b[38;5;108m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            accent: "",
            muted: "",
            reset: "",
        },
    }
}

pub fn canonical_theme_name(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    match cleaned.trim_matches('_') {
        "" | "light" | "plain" => Some("default".to_string()),
        "dark" | "dark_mode" | "darkmode" => Some("noir".to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub theme: Option<String>,
    /// Offset used for "today" and for rendering reminder times. Local
    /// offset when unset.
    #[serde(default)]
    pub utc_offset: Option<String>,
    #[serde(default)]
    pub reminder_limit: Option<usize>,
    #[serde(default)]
    pub notify_window_minutes: Option<u32>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn offset(&self) -> Result<UtcOffset, AppError> {
        match self.utc_offset.as_deref() {
            Some(raw) => parse_offset(raw),
            None => Ok(local_offset()),
        }
    }

    pub fn reminder_limit(&self) -> usize {
        self.reminder_limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn notify_window_minutes(&self) -> u32 {
        self.notify_window_minutes
            .unwrap_or(DEFAULT_NOTIFY_WINDOW_MINUTES)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub utc_offset: Option<String>,
    pub reminder_limit: Option<usize>,
    pub notify_window_minutes: Option<u32>,
    pub log_level: Option<String>,
}

/// Per-user directory holding the config and the task store:
/// `%APPDATA%/memoguard` on Windows, `~/.config/memoguard` elsewhere.
pub fn app_dir() -> Result<PathBuf, AppError> {
    let (var, nested) = if cfg!(windows) {
        ("APPDATA", None)
    } else {
        ("HOME", Some(".config"))
    };
    let base = std::env::var(var).map_err(|_| AppError::invalid_data(format!("{var} is not set")))?;
    let mut dir = PathBuf::from(base);
    if let Some(nested) = nested {
        dir.push(nested);
    }
    dir.push("memoguard");
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf, AppError> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(app_dir()?.join(CONFIG_FILE_NAME)),
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    config.theme = config.theme.and_then(|name| canonical_theme_name(&name));
    if let Some(raw) = config.utc_offset.as_deref() {
        parse_offset(raw).map_err(|err| {
            AppError::invalid_data(format!("{}: {}", path.display(), err.message()))
        })?;
    }
    Ok(config)
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(theme) = overrides.theme.as_ref() {
        merged.theme = canonical_theme_name(theme);
    }
    if let Some(offset) = overrides.utc_offset.as_ref() {
        merged.utc_offset = Some(offset.clone());
    }
    if let Some(limit) = overrides.reminder_limit {
        merged.reminder_limit = Some(limit);
    }
    if let Some(window) = overrides.notify_window_minutes {
        merged.notify_window_minutes = Some(window);
    }
    if let Some(level) = overrides.log_level.as_ref() {
        merged.log_level = Some(level.clone());
    }
    merged
}
