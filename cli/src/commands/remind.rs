use anyhow::{Context, Result, bail};

use bulk_core::remote::RemoteStore;

use super::helpers::print_json;
use crate::config::Settings;
use crate::onesignal::OneSignalClient;
use crate::supabase::SupabaseStore;

/// Scheduled server-side job: push one reminder per meal to the
/// subscriber stored on the goal.
pub(crate) async fn cmd_remind_dispatch(settings: &Settings, json: bool) -> Result<()> {
    let remote = SupabaseStore::new(
        settings.supabase_url.as_deref(),
        settings.supabase_anon_key.as_deref(),
        &settings.photo_bucket,
    )?;
    if !remote.is_configured() {
        bail!("Supabase is not configured. Set BULK_SUPABASE_URL and BULK_SUPABASE_ANON_KEY");
    }
    let onesignal = OneSignalClient::new(
        settings.onesignal_app_id.as_deref(),
        settings.onesignal_api_key.as_deref(),
    )?;

    let goal = remote.fetch_goal().await.context("Failed to read goal")?;
    let Some(subscriber_id) = goal.and_then(|g| g.subscriber_id) else {
        bail!("No device registered for notifications. Run `bulk push register` first");
    };
    let meals = remote.fetch_meals().await.context("Failed to read meals")?;

    let deliveries = onesignal.dispatch(&subscriber_id, &meals).await;
    let failed = deliveries.iter().filter(|d| !d.ok).count();

    if json {
        print_json(&deliveries)?;
    } else {
        for d in &deliveries {
            let mark = if d.ok { "sent" } else { "FAILED" };
            println!("  {} ({}): {mark} {}", d.meal, d.time, d.detail);
        }
        println!("Dispatched {} of {} reminders", deliveries.len() - failed, deliveries.len());
    }

    if failed > 0 {
        bail!("{failed} reminder(s) failed to send");
    }
    Ok(())
}
