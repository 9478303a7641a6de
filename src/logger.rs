//! Logging setup for tendies
//!
//! Plain text through `env_logger` by default. A level of `json` or
//! `json:<level>` switches to one JSON object per line, written to stderr or
//! to `TENDIES_LOG_PATH`.

use chrono::{Local, Utc};
use log::{LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

/// Level used when nothing is configured
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// A parsed `--log-level` / `TENDIES_LOG_LEVEL` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSpec {
    pub json: bool,
    pub level: LevelFilter,
}

impl LogSpec {
    /// Unknown level names fall back to `warn`
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim().to_lowercase();
        let (json, level) = match spec.strip_prefix("json:") {
            Some(level) => (true, level),
            None if spec == "json" => (true, "info"),
            None => (false, spec.as_str()),
        };
        let level = match level {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Warn,
        };
        Self { json, level }
    }
}

/// JSON lines logger
#[derive(Debug)]
pub struct JsonLogger {
    level: LevelFilter,
    target_file: Mutex<Option<File>>,
}

impl JsonLogger {
    pub fn new(level: LevelFilter, log_path: Option<String>) -> Self {
        let target_file = log_path
            .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());

        JsonLogger {
            level,
            target_file: Mutex::new(target_file),
        }
    }

    /// Install the global logger for `level_str`. Returns the effective spec.
    pub fn init_with_level(level_str: &str) -> LogSpec {
        let spec = LogSpec::parse(level_str);

        if !spec.json {
            let _ = env_logger::Builder::new()
                .filter_level(spec.level)
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "🍗 [{} {} {}] {}",
                        Local::now().format("%Y-%m-%dT%H:%M:%S"),
                        record.level(),
                        record.target(),
                        record.args()
                    )
                })
                .try_init();
            return spec;
        }

        let logger = Box::new(JsonLogger::new(spec.level, env::var("TENDIES_LOG_PATH").ok()));
        if let Err(e) = log::set_boxed_logger(logger) {
            eprintln!("Failed to initialize JSON logger: {e}");
            return spec;
        }
        log::set_max_level(spec.level);
        spec
    }

    /// Initialize from `TENDIES_LOG_LEVEL`, defaulting to warnings only
    pub fn init() -> LogSpec {
        let level = env::var("TENDIES_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        Self::init_with_level(&level)
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut guard) = self.target_file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.write_all(line.as_bytes());
                return;
            }
        }
        let _ = io::stderr().write_all(line.as_bytes());
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = json!({
            "@timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "@level": record.level().to_string().to_lowercase(),
            "@message": record.args().to_string(),
            "@module": record.target(),
            "@pid": std::process::id(),
        });
        self.write_line(&format!("{entry}\n"));
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.target_file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
        let _ = io::stderr().flush();
    }
}

/// Helper to check if JSON logging is enabled
pub fn is_json_logging() -> bool {
    env::var("TENDIES_LOG_LEVEL")
        .map(|v| v.starts_with("json"))
        .unwrap_or(false)
}
