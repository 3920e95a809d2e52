use std::fs;
use std::path::Path;
use std::time::Duration;

use parser_engine::SchedulerSettings;
use parser_logging::{parser_info, parser_warn};
use serde::{Deserialize, Serialize};

use crate::SettingsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Status refresh period while the parser is busy.
    pub refresh_interval_ms: u64,
    /// Upper bound for a blocking "Try a Word".
    pub trace_wait_timeout_ms: u64,
    pub load_on_start: bool,
    pub worker_name: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let scheduler = SchedulerSettings::default();
        Self {
            refresh_interval_ms: 250,
            trace_wait_timeout_ms: 10_000,
            load_on_start: scheduler.load_on_start,
            worker_name: scheduler.worker_name,
        }
    }
}

impl SessionSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn trace_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.trace_wait_timeout_ms)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            worker_name: self.worker_name.clone(),
            load_on_start: self.load_on_start,
        }
    }

    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Like `read`, but falls back to defaults when the file is missing or
    /// malformed.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(settings) => {
                parser_info!("Loaded session settings from {:?}", path);
                settings
            }
            Err(SettingsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => {
                parser_warn!("Using default session settings; {:?}: {}", path, err);
                Self::default()
            }
        }
    }
}
