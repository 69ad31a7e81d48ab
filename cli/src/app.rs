use std::sync::Arc;

use anyhow::Result;
use bulk_core::cache::LocalCache;
use bulk_core::notify::{Notifier, TracingNotifier};
use bulk_core::platform::Platform;
use bulk_core::push::PushRegistration;
use bulk_core::reminders::ReminderScheduler;
use bulk_core::store::BulkingStore;

use crate::bridge::SpoolBridge;
use crate::config::Config;
use crate::notifier::StderrNotifier;
use crate::supabase::SupabaseStore;

/// Everything a command needs, wired from configuration.
pub(crate) struct App {
    pub store: BulkingStore<SupabaseStore>,
    pub cache: Arc<LocalCache>,
    pub push: PushRegistration,
}

impl App {
    /// Open the cache, connect the remote store and load state.
    /// `quiet` routes user notices to the log instead of stderr.
    pub async fn open(config: &Config, quiet: bool) -> Result<Self> {
        let settings = &config.settings;
        let cache = Arc::new(LocalCache::open(&config.db_path)?);
        let notifier: Arc<dyn Notifier> = if quiet {
            Arc::new(TracingNotifier)
        } else {
            Arc::new(StderrNotifier)
        };

        let remote = Arc::new(SupabaseStore::new(
            settings.supabase_url.as_deref(),
            settings.supabase_anon_key.as_deref(),
            &settings.photo_bucket,
        )?);
        let platform = Platform::Native(Arc::new(SpoolBridge::new(
            cache.clone(),
            settings.subscriber_id.clone(),
        )));
        let scheduler = Arc::new(ReminderScheduler::new(
            platform.clone(),
            cache.clone(),
            notifier.clone(),
            settings.reminder_policy(),
        ));

        let store = BulkingStore::new(remote, cache.clone(), notifier.clone())
            .with_reminders(scheduler);
        let push = PushRegistration::new(platform, notifier, settings.retry_policy());

        store.load().await;
        Ok(Self { store, cache, push })
    }

    pub fn scheduler(&self) -> Result<&Arc<ReminderScheduler>> {
        self.store
            .reminders()
            .ok_or_else(|| anyhow::anyhow!("Reminders are not enabled"))
    }
}
