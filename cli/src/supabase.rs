use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use bulk_core::models::{Goal, Meal, WeightEntry};
use bulk_core::remote::{
    FoodItemRow, GOAL_ROW_ID, GoalRow, MealRow, MealWithFoodsRow, RemoteError, RemoteResult,
    RemoteStore, WeightRow,
};

struct Credentials {
    url: String,
    anon_key: String,
}

/// Remote store over Supabase's REST (`PostgREST`) and Storage APIs.
///
/// Built without credentials, every call fails with
/// [`RemoteError::Unconfigured`] and the app runs from the local cache.
pub struct SupabaseStore {
    client: reqwest::Client,
    creds: Option<Credentials>,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(url: Option<&str>, anon_key: Option<&str>, bucket: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("bulk-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;

        let creds = match (url, anon_key) {
            (Some(url), Some(anon_key)) => Some(Credentials {
                url: url.trim_end_matches('/').to_string(),
                anon_key: anon_key.to_string(),
            }),
            _ => {
                tracing::info!("Supabase credentials missing, working from the local cache");
                None
            }
        };

        Ok(Self {
            client,
            creds,
            bucket: bucket.to_string(),
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.creds.is_some()
    }

    fn creds(&self) -> RemoteResult<&Credentials> {
        self.creds.as_ref().ok_or(RemoteError::Unconfigured)
    }

    fn request(&self, method: Method, path: &str) -> RemoteResult<RequestBuilder> {
        let creds = self.creds()?;
        Ok(self
            .client
            .request(method, format!("{}/{path}", creds.url))
            .header("apikey", &creds.anon_key)
            .header("Authorization", format!("Bearer {}", creds.anon_key)))
    }

    fn table(&self, method: Method, table: &str) -> RemoteResult<RequestBuilder> {
        self.request(method, &format!("rest/v1/{table}"))
    }

    /// Insert-or-replace by primary key.
    fn upsert(&self, table: &str) -> RemoteResult<RequestBuilder> {
        Ok(self
            .table(Method::POST, table)?
            .header("Prefer", "resolution=merge-duplicates,return=minimal"))
    }

    /// Meals with their food items, oldest first. Seed ids ("1".."4") and
    /// generated ids do not sort together, so creation time leads.
    fn meals_request(&self) -> RemoteResult<RequestBuilder> {
        Ok(self.table(Method::GET, "meals")?.query(&[
            ("select", "*,food_items(*)"),
            ("order", "created_at.asc,id.asc"),
        ]))
    }

    fn public_prefix(&self, creds: &Credentials) -> String {
        format!("{}/storage/v1/object/public/{}/", creds.url, self.bucket)
    }

    async fn send(req: RequestBuilder) -> RemoteResult<Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch<T: DeserializeOwned>(req: RequestBuilder) -> RemoteResult<T> {
        Self::send(req)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

impl RemoteStore for SupabaseStore {
    async fn fetch_goal(&self) -> RemoteResult<Option<Goal>> {
        let req = self
            .table(Method::GET, "goals")?
            .query(&[("select", "*".to_string()), ("id", eq(&GOAL_ROW_ID.to_string()))]);
        let rows: Vec<GoalRow> = Self::fetch(req).await?;
        Ok(rows.into_iter().next().map(Goal::from))
    }

    async fn upsert_goal(&self, goal: &Goal) -> RemoteResult<()> {
        let row = GoalRow::from_goal(goal, Utc::now().to_rfc3339());
        Self::send(self.upsert("goals")?.json(&[row])).await?;
        Ok(())
    }

    async fn fetch_meals(&self) -> RemoteResult<Vec<Meal>> {
        let req = self.meals_request()?;
        let rows: Vec<MealWithFoodsRow> = Self::fetch(req).await?;
        Ok(rows.into_iter().map(Meal::from).collect())
    }

    async fn upsert_meal_row(&self, meal: &MealRow) -> RemoteResult<()> {
        Self::send(self.upsert("meals")?.json(&[meal])).await?;
        Ok(())
    }

    async fn set_meal_completed(&self, meal_id: &str, completed: bool) -> RemoteResult<()> {
        let req = self
            .table(Method::PATCH, "meals")?
            .query(&[("id", eq(meal_id))])
            .json(&serde_json::json!({ "completed": completed }));
        Self::send(req).await?;
        Ok(())
    }

    async fn delete_meal(&self, meal_id: &str) -> RemoteResult<()> {
        let req = self
            .table(Method::DELETE, "meals")?
            .query(&[("id", eq(meal_id))]);
        Self::send(req).await?;
        Ok(())
    }

    async fn delete_food_items(&self, meal_id: &str) -> RemoteResult<()> {
        let req = self
            .table(Method::DELETE, "food_items")?
            .query(&[("meal_id", eq(meal_id))]);
        Self::send(req).await?;
        Ok(())
    }

    async fn insert_food_items(&self, rows: &[FoodItemRow]) -> RemoteResult<()> {
        let req = self
            .table(Method::POST, "food_items")?
            .header("Prefer", "return=minimal")
            .json(rows);
        Self::send(req).await?;
        Ok(())
    }

    async fn fetch_weight_history(&self) -> RemoteResult<Vec<WeightEntry>> {
        let req = self
            .table(Method::GET, "weight_history")?
            .query(&[("select", "*"), ("order", "date.asc")]);
        let rows: Vec<WeightRow> = Self::fetch(req).await?;
        Ok(rows.into_iter().map(WeightEntry::from).collect())
    }

    async fn upsert_weight_entry(&self, entry: &WeightEntry) -> RemoteResult<()> {
        Self::send(self.upsert("weight_history")?.json(&[WeightRow::from(entry)])).await?;
        Ok(())
    }

    async fn delete_weight_entry(&self, entry_id: &str) -> RemoteResult<()> {
        let req = self
            .table(Method::DELETE, "weight_history")?
            .query(&[("id", eq(entry_id))]);
        Self::send(req).await?;
        Ok(())
    }

    async fn upload_photo(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RemoteResult<String> {
        let req = self
            .request(
                Method::POST,
                &format!("storage/v1/object/{}/{path}", self.bucket),
            )?
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes);
        Self::send(req).await?;
        let creds = self.creds()?;
        Ok(format!("{}{path}", self.public_prefix(creds)))
    }

    async fn remove_photo(&self, path: &str) -> RemoteResult<()> {
        let req = self
            .request(Method::DELETE, &format!("storage/v1/object/{}", self.bucket))?
            .json(&serde_json::json!({ "prefixes": [path] }));
        Self::send(req).await?;
        Ok(())
    }

    fn photo_path(&self, url: &str) -> Option<String> {
        let creds = self.creds.as_ref()?;
        url.strip_prefix(&self.public_prefix(creds))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}
