//! Process-wide settings: default log format and global observers.

use crate::error::AiError;
use crate::event::FunctionObserver;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable read on first access to the global settings
pub const LOG_FORMAT_ENV: &str = "AIFUSE_LOG_FORMAT";

/// How function calls are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// No function-call logging
    #[default]
    Off,
    /// One line per event
    BasicText,
    /// Structured tracing fields
    DetailedObject,
    /// The serialized event as JSON
    DetailedJson,
}

impl FromStr for LogFormat {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Ok(LogFormat::Off),
            "basic-text" => Ok(LogFormat::BasicText),
            "detailed-object" => Ok(LogFormat::DetailedObject),
            "detailed-json" => Ok(LogFormat::DetailedJson),
            other => Err(AiError::configuration(format!(
                "Unknown log format '{}', expected one of off, basic-text, detailed-object, detailed-json",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogFormat::Off => "off",
            LogFormat::BasicText => "basic-text",
            LogFormat::DetailedObject => "detailed-object",
            LogFormat::DetailedJson => "detailed-json",
        };
        f.write_str(s)
    }
}

/// Settings applied to every function call in the process
#[derive(Debug, Clone, Default)]
pub struct GlobalSettings {
    pub log_format: LogFormat,
    pub observers: Vec<Arc<dyn FunctionObserver>>,
}

impl GlobalSettings {
    /// Defaults, with the log format taken from `AIFUSE_LOG_FORMAT` when set
    pub fn from_env() -> Self {
        let log_format = match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|e: AiError| {
                tracing::warn!(error = %e, "Ignoring {}", LOG_FORMAT_ENV);
                LogFormat::Off
            }),
            Err(_) => LogFormat::Off,
        };
        Self {
            log_format,
            observers: Vec::new(),
        }
    }
}

static GLOBAL: Lazy<ArcSwap<GlobalSettings>> =
    Lazy::new(|| ArcSwap::from_pointee(GlobalSettings::from_env()));

/// Current global settings
pub fn global_settings() -> Arc<GlobalSettings> {
    GLOBAL.load_full()
}

pub fn log_format() -> LogFormat {
    GLOBAL.load().log_format
}

pub fn set_log_format(log_format: LogFormat) {
    GLOBAL.rcu(|current| {
        let mut next = GlobalSettings::clone(current);
        next.log_format = log_format;
        next
    });
}

pub fn global_observers() -> Vec<Arc<dyn FunctionObserver>> {
    GLOBAL.load().observers.clone()
}

pub fn set_global_observers(observers: Vec<Arc<dyn FunctionObserver>>) {
    GLOBAL.rcu(|current| {
        let mut next = GlobalSettings::clone(current);
        next.observers = observers.clone();
        next
    });
}

pub fn add_global_observer(observer: Arc<dyn FunctionObserver>) {
    GLOBAL.rcu(|current| {
        let mut next = GlobalSettings::clone(current);
        next.observers.push(observer.clone());
        next
    });
}
