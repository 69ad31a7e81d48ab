use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bulk_core::reminders::ReminderPolicy;
use bulk_core::retry::RetryPolicy;
use chrono::TimeDelta;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Tunables read from `config.toml`, then overridden by `BULK_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub photo_bucket: String,
    pub onesignal_app_id: Option<String>,
    pub onesignal_api_key: Option<String>,
    /// Push identity this host reports when registering.
    pub subscriber_id: Option<String>,
    pub look_ahead_days: u32,
    pub throttle_hours: i64,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            photo_bucket: "progress-photos".to_string(),
            onesignal_app_id: None,
            onesignal_api_key: None,
            subscriber_id: None,
            look_ahead_days: 7,
            throttle_hours: 23,
            poll_interval_secs: 2,
            poll_max_attempts: 10,
        }
    }
}

impl Settings {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config.toml")
    }

    /// Apply `BULK_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = text("BULK_SUPABASE_URL") {
            self.supabase_url = Some(v);
        }
        if let Some(v) = text("BULK_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(v);
        }
        if let Some(v) = text("BULK_PHOTO_BUCKET") {
            self.photo_bucket = v;
        }
        if let Some(v) = text("BULK_ONESIGNAL_APP_ID") {
            self.onesignal_app_id = Some(v);
        }
        if let Some(v) = text("BULK_ONESIGNAL_API_KEY") {
            self.onesignal_api_key = Some(v);
        }
        if let Some(v) = text("BULK_SUBSCRIBER_ID") {
            self.subscriber_id = Some(v);
        }
        override_number(
            &mut self.look_ahead_days,
            "BULK_LOOK_AHEAD_DAYS",
            text("BULK_LOOK_AHEAD_DAYS"),
        );
        override_number(
            &mut self.throttle_hours,
            "BULK_THROTTLE_HOURS",
            text("BULK_THROTTLE_HOURS"),
        );
        override_number(
            &mut self.poll_interval_secs,
            "BULK_POLL_INTERVAL_SECS",
            text("BULK_POLL_INTERVAL_SECS"),
        );
        override_number(
            &mut self.poll_max_attempts,
            "BULK_POLL_MAX_ATTEMPTS",
            text("BULK_POLL_MAX_ATTEMPTS"),
        );
    }

    #[must_use]
    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            look_ahead_days: self.look_ahead_days,
            throttle: TimeDelta::try_hours(self.throttle_hours)
                .unwrap_or_else(|| ReminderPolicy::default().throttle),
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }
}

fn override_number<T: std::str::FromStr>(slot: &mut T, key: &str, value: Option<String>) {
    let Some(raw) = value else {
        return;
    };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring non-numeric override"),
    }
}

pub struct Config {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "bulk").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("bulk.db");
        let config_path = proj_dirs.config_dir().join("config.toml");

        let mut settings = read_settings(&config_path)?;
        settings.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(Config {
            db_path,
            config_path,
            settings,
        })
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Settings::from_toml(&contents).with_context(|| format!("Invalid config: {}", path.display()))
}
