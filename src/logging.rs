use std::fmt;
use std::io::{stderr, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use humantime::format_rfc3339;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const COMPONENT: &str = "mask-registry";

const ALLOWED_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        if !ALLOWED_LEVELS.contains(&normalized.as_str()) {
            return Err(anyhow!("unsupported log level: {s}"));
        }
        Ok(match normalized.as_str() {
            "trace" => Level::Trace,
            "debug" => Level::Debug,
            "info" => Level::Info,
            "warn" => Level::Warn,
            _ => Level::Error,
        })
    }
}

pub trait LogSink: Send + Sync {
    fn write(&self, entry: &Map<String, Value>);
}

/// Writes every entry to stderr, one JSON object per line.
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, entry: &Map<String, Value>) {
        if let Ok(serialized) = serde_json::to_string(entry) {
            let _ = writeln!(stderr(), "{}", serialized);
        }
    }
}

struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _entry: &Map<String, Value>) {}
}

#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Map<String, Value>> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .iter()
            .filter(|entry| entry.get("level").and_then(Value::as_str) == Some(level.as_str()))
            .filter_map(|entry| entry.get("message").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &Map<String, Value>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}

fn current_timestamp() -> String {
    format_rfc3339(std::time::SystemTime::now()).to_string()
}

fn stable_tags(value: Value) -> Map<String, Value> {
    let mut out = Map::new();
    if let Value::Object(obj) = value {
        for (key, val) in obj {
            match val {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    out.insert(key, val);
                }
                _ => {}
            }
        }
    }
    out
}

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    min_level: Level,
    tags: Map<String, Value>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::stderr(Level::Info)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>, min_level: Level) -> Self {
        let mut tags = Map::new();
        tags.insert("component".to_string(), Value::String(COMPONENT.to_string()));
        Self {
            sink,
            min_level,
            tags,
        }
    }

    pub fn stderr(min_level: Level) -> Self {
        Self::new(Arc::new(StderrSink), min_level)
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NullSink), Level::Error)
    }

    pub fn memory(sink: &MemorySink, min_level: Level) -> Self {
        Self::new(Arc::new(sink.clone()), min_level)
    }

    /// Returns a logger that adds the scalar entries of `tags` to every entry.
    pub fn with_tags(&self, tags: Value) -> Logger {
        let mut merged = self.tags.clone();
        for (key, value) in stable_tags(tags) {
            merged.insert(key, value);
        }
        Logger {
            sink: self.sink.clone(),
            min_level: self.min_level,
            tags: merged,
        }
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    pub fn log(&self, level: Level, message: &str, data: Option<Value>) {
        if !self.enabled(level) {
            return;
        }
        let mut entry = Map::new();
        entry.insert("level".to_string(), Value::String(level.as_str().to_string()));
        entry.insert("message".to_string(), Value::String(message.to_string()));
        match data {
            Some(Value::Object(map)) => {
                entry.insert("data".to_string(), Value::Object(map));
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                let mut wrapper = Map::new();
                wrapper.insert("value".to_string(), other);
                entry.insert("data".to_string(), Value::Object(wrapper));
            }
        }
        entry.insert("tags".to_string(), Value::Object(self.tags.clone()));
        entry.insert("timestamp".to_string(), Value::String(current_timestamp()));
        self.sink.write(&entry);
    }

    pub fn trace(&self, message: &str, data: Option<Value>) {
        self.log(Level::Trace, message, data);
    }

    pub fn debug(&self, message: &str, data: Option<Value>) {
        self.log(Level::Debug, message, data);
    }

    pub fn info(&self, message: &str, data: Option<Value>) {
        self.log(Level::Info, message, data);
    }

    pub fn warn(&self, message: &str, data: Option<Value>) {
        self.log(Level::Warn, message, data);
    }

    pub fn error(&self, message: &str, data: Option<Value>) {
        self.log(Level::Error, message, data);
    }
}
