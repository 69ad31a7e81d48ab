use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{FoodItem, Goal, Meal, Photo, WeightEntry};

/// The goal table holds exactly one row under this key.
pub const GOAL_ROW_ID: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No backend credentials; callers fall back to the local cache.
    #[error("remote store is not configured")]
    Unconfigured,
    #[error("remote request failed: {0}")]
    Request(String),
    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected remote response: {0}")]
    Decode(String),
}

impl RemoteError {
    #[must_use]
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, Self::Unconfigured)
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Typed access to the remote tables and photo storage.
///
/// Each call is a single request; nothing here spans tables atomically.
pub trait RemoteStore: Send + Sync + 'static {
    fn fetch_goal(&self) -> impl Future<Output = RemoteResult<Option<Goal>>> + Send;

    /// Replace the singleton goal row and stamp its update time.
    fn upsert_goal(&self, goal: &Goal) -> impl Future<Output = RemoteResult<()>> + Send;

    /// All meals with their food items joined in.
    fn fetch_meals(&self) -> impl Future<Output = RemoteResult<Vec<Meal>>> + Send;

    /// Replace the scalar columns (name, time, completed) of one meal.
    fn upsert_meal_row(&self, meal: &MealRow) -> impl Future<Output = RemoteResult<()>> + Send;

    fn set_meal_completed(
        &self,
        meal_id: &str,
        completed: bool,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Delete a meal; its food items go with it.
    fn delete_meal(&self, meal_id: &str) -> impl Future<Output = RemoteResult<()>> + Send;

    fn delete_food_items(&self, meal_id: &str) -> impl Future<Output = RemoteResult<()>> + Send;

    fn insert_food_items(
        &self,
        rows: &[FoodItemRow],
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Weight history ordered by date ascending.
    fn fetch_weight_history(&self) -> impl Future<Output = RemoteResult<Vec<WeightEntry>>> + Send;

    fn upsert_weight_entry(
        &self,
        entry: &WeightEntry,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    fn delete_weight_entry(&self, entry_id: &str) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Store a photo and return its public reference.
    fn upload_photo(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = RemoteResult<String>> + Send;

    fn remove_photo(&self, path: &str) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Storage path of a reference produced by `upload_photo`, or `None`
    /// for anything this store does not own.
    fn photo_path(&self, url: &str) -> Option<String>;
}

// --- Row types (relational column names) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRow {
    pub id: i64,
    pub target_weight: f64,
    pub current_weight: f64,
    pub daily_calories: u32,
    pub daily_protein: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub onesignal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl GoalRow {
    #[must_use]
    pub fn from_goal(goal: &Goal, updated_at: String) -> Self {
        Self {
            id: GOAL_ROW_ID,
            target_weight: goal.target_weight,
            current_weight: goal.current_weight,
            daily_calories: goal.daily_calories,
            daily_protein: goal.daily_protein,
            start_date: goal.start_date,
            onesignal_id: goal.subscriber_id.clone(),
            updated_at: Some(updated_at),
        }
    }
}

impl From<GoalRow> for Goal {
    fn from(row: GoalRow) -> Self {
        Self {
            target_weight: row.target_weight,
            current_weight: row.current_weight,
            daily_calories: row.daily_calories,
            daily_protein: row.daily_protein,
            start_date: row.start_date,
            subscriber_id: row.onesignal_id.filter(|id| !id.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRow {
    pub id: String,
    pub name: String,
    pub time: String,
    #[serde(default)]
    pub completed: bool,
}

impl From<&Meal> for MealRow {
    fn from(meal: &Meal) -> Self {
        Self {
            id: meal.id.clone(),
            name: meal.name.clone(),
            time: meal.time.clone(),
            completed: meal.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItemRow {
    pub id: String,
    pub meal_id: String,
    pub name: String,
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

impl FoodItemRow {
    #[must_use]
    pub fn for_meal(meal: &Meal) -> Vec<Self> {
        meal.foods
            .iter()
            .map(|f| Self {
                id: f.id.clone(),
                meal_id: meal.id.clone(),
                name: f.name.clone(),
                calories: f.calories,
                protein: f.protein,
                carbs: f.carbs,
                fat: f.fat,
            })
            .collect()
    }
}

impl From<FoodItemRow> for FoodItem {
    fn from(row: FoodItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            calories: row.calories,
            protein: row.protein,
            carbs: row.carbs,
            fat: row.fat,
            portion: None,
        }
    }
}

/// A meal row with its joined `food_items`.
#[derive(Debug, Clone, Deserialize)]
pub struct MealWithFoodsRow {
    #[serde(flatten)]
    pub meal: MealRow,
    #[serde(default)]
    pub food_items: Vec<FoodItemRow>,
}

impl From<MealWithFoodsRow> for Meal {
    fn from(row: MealWithFoodsRow) -> Self {
        Self {
            id: row.meal.id,
            name: row.meal.name,
            time: row.meal.time,
            completed: row.meal.completed,
            foods: row.food_items.into_iter().map(FoodItem::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub id: String,
    pub date: NaiveDate,
    pub weight: f64,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<&WeightEntry> for WeightRow {
    fn from(entry: &WeightEntry) -> Self {
        Self {
            id: entry.id.clone(),
            date: entry.date,
            weight: entry.weight,
            image: entry.image.clone().map(String::from),
        }
    }
}

impl From<WeightRow> for WeightEntry {
    fn from(row: WeightRow) -> Self {
        Self {
            id: row.id,
            date: row.date,
            weight: row.weight,
            image: row.image.filter(|s| !s.is_empty()).map(Photo::from),
        }
    }
}
