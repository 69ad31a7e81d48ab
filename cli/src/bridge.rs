use std::sync::Arc;

use anyhow::{Result, bail};
use bulk_core::cache::LocalCache;
use bulk_core::platform::{NativeBridge, PushInfo};
use bulk_core::reminders::AlarmSpec;

/// Native bridge for the terminal host.
///
/// Alarms are spooled into the cache's `alarms` table. This process never
/// fires them: an external runner (cron, a desktop notifier) reads the table
/// and shows each alarm at its `fire_at`. Alarms already past are pruned
/// whenever `bulk reminders list` runs, and every reschedule replaces the
/// whole set. The push identity comes from configuration.
pub struct SpoolBridge {
    cache: Arc<LocalCache>,
    subscriber_id: Option<String>,
}

impl SpoolBridge {
    pub fn new(cache: Arc<LocalCache>, subscriber_id: Option<String>) -> Self {
        Self {
            cache,
            subscriber_id,
        }
    }
}

impl NativeBridge for SpoolBridge {
    fn register(&self) -> Result<()> {
        if self.subscriber_id.is_none() {
            bail!("No push identity configured. Set BULK_SUBSCRIBER_ID or subscriber_id in config.toml");
        }
        Ok(())
    }

    fn info(&self) -> Result<PushInfo> {
        Ok(PushInfo {
            subscriber_id: self.subscriber_id.clone(),
            is_subscribed: self.subscriber_id.is_some(),
        })
    }

    fn create_alarm(&self, alarm: &AlarmSpec) -> Result<()> {
        self.cache.insert_alarm(alarm)
    }

    fn cancel_all_alarms(&self) -> Result<()> {
        let cleared = self.cache.clear_alarms()?;
        tracing::debug!(cleared, "cleared spooled alarms");
        Ok(())
    }
}
