use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::{EditorConfig, ProviderKind};

static EDITOR_LOGGER: Lazy<EditorLogger> = Lazy::new(EditorLogger::new);

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    EDITOR_LOGGER.update_config(config);

    log::set_logger(&*EDITOR_LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "🎨",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn to_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_level_filter(&self) -> log::LevelFilter {
        self.to_level().to_level_filter()
    }

    pub fn from_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// One emitted record, as written in JSON mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    pub thread_id: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub context: HashMap<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            module,
            file,
            line,
            thread_id: format!("{:?}", std::thread::current().id()),
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_thread_id: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_to_file: bool,
    pub log_file_path: String,
    /// Tag added to every entry, e.g. the editor session id.
    pub session_tag: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_thread_id: false,
            show_file_location: false,
            show_module: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_to_file: false,
            log_file_path: "rgenedit.log".to_string(),
            session_tag: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_to_file = true;
        self.log_file_path = path.to_string();
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn with_session_tag(mut self, tag: impl Into<String>) -> Self {
        self.session_tag = Some(tag.into());
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            log_to_file: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_colors: true,
            show_emojis: true,
            output_json: false,
            show_file_location: true,
            ..Default::default()
        }
    }

    /// Development defaults, with the level taken from `EDITOR_LOG_LEVEL`.
    pub fn from_env() -> Self {
        let level = std::env::var("EDITOR_LOG_LEVEL")
            .ok()
            .and_then(|value| LogLevel::parse(&value))
            .unwrap_or(LogLevel::Info);
        Self::development().with_level(level)
    }
}

pub struct EditorLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
}

impl EditorLogger {
    fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) {
        if new_config.log_to_file {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&new_config.log_file_path)
            {
                Ok(file) => {
                    if let Ok(mut log_file) = self.log_file.lock() {
                        *log_file = Some(file);
                    }
                }
                Err(e) => eprintln!("Could not open log file {}: {}", new_config.log_file_path, e),
            }
        }

        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
    }

    fn format_line(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let colors = config.show_colors;
        let mut output = String::new();

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if colors {
            output.push_str(&format!("[{}] ", level.color(entry.level.color()).bold()));
        } else {
            output.push_str(&format!("[{}] ", level));
        }

        if let Some(tag) = &config.session_tag {
            if colors {
                output.push_str(&format!("[{}] ", tag.bright_yellow()));
            } else {
                output.push_str(&format!("[{}] ", tag));
            }
        }

        if config.show_module && !entry.module.is_empty() {
            if colors {
                output.push_str(&format!("{}: ", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.module));
            }
        }

        output.push_str(&entry.message);

        if !entry.context.is_empty() {
            let context = serde_json::to_string(&entry.context).unwrap_or_default();
            if colors {
                output.push_str(&format!(" {}", context.bright_cyan()));
            } else {
                output.push_str(&format!(" {}", context));
            }
        }

        if config.show_thread_id {
            output.push_str(&format!(" [thread:{}]", entry.thread_id));
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn create_entry(&self, record: &Record, config: &LoggerConfig) -> LogEntry {
        let entry = LogEntry::new(
            LogLevel::from_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        );
        match &config.session_tag {
            Some(tag) => entry.with_context("session", serde_json::Value::String(tag.clone())),
            None => entry,
        }
    }
}

impl log::Log for EditorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => metadata.level() <= config.min_level.to_level(),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Ok(config) = self.config.lock() else {
            return;
        };

        let entry = self.create_entry(record, &config);
        let line = if config.output_json {
            serde_json::to_string(&entry).unwrap_or_default()
        } else {
            self.format_line(&entry, &config)
        };
        println!("{}", line);

        if config.log_to_file {
            if let Ok(mut guard) = self.log_file.lock() {
                if let Some(file) = guard.as_mut() {
                    let _ = writeln!(file, "{}", line);
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        if let Ok(mut guard) = self.log_file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Logs how long an operation took when stopped or dropped.
pub struct Timer {
    start: Instant,
    name: String,
    stopped: bool,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
            stopped: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn stop(&mut self) -> Duration {
        let elapsed = self.elapsed();
        if !self.stopped {
            self.stopped = true;
            log::info!("⏱️  {} completed in {}ms", self.name, elapsed.as_millis());
        }
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

/// Logs the effective configuration. Credentials are reported as present
/// or absent, never printed.
pub fn log_config_info(config: &EditorConfig) {
    log::info!("⚙️  Editor configuration:");
    log::info!("   Request timeout: {}s", config.request_timeout.as_secs());
    match config.provider {
        ProviderKind::Gemini => {
            log::info!("   Provider: Gemini");
            if let Some(gemini) = &config.gemini {
                log::info!("   Image model: {}", gemini.image_model);
                log::info!("   Text model: {}", gemini.text_model);
                log::info!(
                    "   API key: {}",
                    if gemini.api_key.is_some() { "✅" } else { "❌" }
                );
            }
        }
        ProviderKind::Bedrock => {
            log::info!("   Provider: AWS Bedrock");
            if let Some(bedrock) = &config.bedrock {
                log::info!("   Region: {}", bedrock.region.as_deref().unwrap_or("default chain"));
                log::info!("   Image model: {}", bedrock.image_model_id);
                log::info!("   Text model: {}", bedrock.text_model_id);
                log::info!(
                    "   Static credentials: {}",
                    if bedrock.access_key.is_some() { "✅" } else { "❌" }
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert!(LogLevel::Warn > LogLevel::Info);
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);
    }

    #[test]
    fn test_plain_line_format() {
        let logger = EditorLogger::new();
        let config = LoggerConfig::new()
            .with_colors(false)
            .with_session_tag("s-1");
        let config = LoggerConfig {
            include_timestamp: false,
            show_emojis: false,
            ..config
        };
        let entry = LogEntry::new(
            LogLevel::Warn,
            "no image returned".into(),
            "rgenedit::validator".into(),
            "src/validator.rs".into(),
            10,
        );
        assert_eq!(
            logger.format_line(&entry, &config),
            "[WARN] [s-1] rgenedit::validator: no image returned"
        );
    }

    #[test]
    fn test_json_entry_carries_context() {
        let entry = LogEntry::new(LogLevel::Info, "m".into(), "x".into(), "f".into(), 1)
            .with_context("task", serde_json::json!("retouch"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["context"]["task"], "retouch");
        assert_eq!(json["level"], "Info");
    }
}
