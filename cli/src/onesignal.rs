use anyhow::{Context, Result, bail};
use reqwest::RequestBuilder;
use serde::Serialize;

use bulk_core::models::Meal;

const NOTIFICATIONS_URL: &str = "https://onesignal.com/api/v1/notifications";

#[derive(Debug, Serialize)]
struct Contents {
    en: String,
    id: String,
}

#[derive(Debug, Serialize)]
struct NotificationRequest<'a> {
    app_id: &'a str,
    include_player_ids: [&'a str; 1],
    headings: Contents,
    contents: Contents,
    /// Deliver at the time of day the subscriber is usually active.
    delayed_option: &'static str,
}

/// Result of one meal's push, reported per meal.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub meal: String,
    pub time: String,
    pub ok: bool,
    pub detail: String,
}

/// Server-side fan-out of meal reminders through `OneSignal`.
pub struct OneSignalClient {
    client: reqwest::Client,
    app_id: String,
    api_key: String,
}

impl OneSignalClient {
    pub fn new(app_id: Option<&str>, api_key: Option<&str>) -> Result<Self> {
        let (Some(app_id), Some(api_key)) = (app_id, api_key) else {
            bail!("OneSignal is not configured. Set BULK_ONESIGNAL_APP_ID and BULK_ONESIGNAL_API_KEY");
        };
        let client = reqwest::Client::builder()
            .user_agent(format!("bulk-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            app_id: app_id.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn request_for(&self, subscriber_id: &str, meal: &Meal) -> RequestBuilder {
        let body = NotificationRequest {
            app_id: &self.app_id,
            include_player_ids: [subscriber_id],
            headings: Contents {
                en: format!("Time for {}! 🍽️", meal.name),
                id: format!("Waktunya {}! 🍽️", meal.name),
            },
            contents: Contents {
                en: format!("Eat on time at {}. Keep bulking!", meal.time),
                id: format!("Ayo makan tepat waktu jam {}. Semangat bulking!", meal.time),
            },
            delayed_option: "last-active",
        };
        self.client
            .post(NOTIFICATIONS_URL)
            .header("Authorization", format!("Basic {}", self.api_key))
            .json(&body)
    }

    /// Send one notification per meal. A failed meal does not stop the rest.
    pub async fn dispatch(&self, subscriber_id: &str, meals: &[Meal]) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(meals.len());
        for meal in meals {
            let outcome = match self.request_for(subscriber_id, meal).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.text().await.unwrap_or_default();
                    Ok(notification_id(&body).unwrap_or(body))
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    Err(format!("HTTP {status}: {body}"))
                }
                Err(e) => Err(e.to_string()),
            };
            match &outcome {
                Ok(_) => tracing::info!(meal = %meal.name, "reminder dispatched"),
                Err(e) => tracing::warn!(meal = %meal.name, error = %e, "reminder dispatch failed"),
            }
            deliveries.push(Delivery {
                meal: meal.name.clone(),
                time: meal.time.clone(),
                ok: outcome.is_ok(),
                detail: outcome.unwrap_or_else(|e| e),
            });
        }
        deliveries
    }
}

fn notification_id(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}
