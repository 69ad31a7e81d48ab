use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The singleton goal row. Replaced wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub target_weight: f64,
    /// Starting weight; the baseline for progress and gain.
    pub current_weight: f64,
    pub daily_calories: u32,
    pub daily_protein: u32,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: String,
    pub name: String,
    /// Time of day as "HH:MM". Kept as text so a malformed remote row
    /// only costs that meal its reminders.
    pub time: String,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
    #[serde(default)]
    pub completed: bool,
}

impl Meal {
    #[must_use]
    pub fn new(name: &str, time: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            time: time.to_string(),
            foods: Vec::new(),
            completed: false,
        }
    }

    #[must_use]
    pub fn time_of_day(&self) -> Option<(u32, u32)> {
        parse_meal_time(&self.time)
    }
}

/// A progress photo attached to a weight entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Photo {
    /// A `data:` URL still waiting to be uploaded.
    Inline(String),
    /// A stable reference returned by object storage.
    Url(String),
}

impl Photo {
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline(s) | Self::Url(s) => s,
        }
    }
}

impl From<String> for Photo {
    fn from(value: String) -> Self {
        if value.starts_with("data:") {
            Self::Inline(value)
        } else {
            Self::Url(value)
        }
    }
}

impl From<Photo> for String {
    fn from(value: Photo) -> Self {
        match value {
            Photo::Inline(s) | Photo::Url(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: String,
    pub date: NaiveDate,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Photo>,
}

impl WeightEntry {
    #[must_use]
    pub fn new(date: NaiveDate, weight: f64) -> Self {
        Self {
            id: new_id(),
            date,
            weight,
            image: None,
        }
    }
}

/// Client-generated identifier, ordered by creation time.
#[must_use]
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Parse "HH:MM" (24h) into `(hour, minute)`.
#[must_use]
pub fn parse_meal_time(time: &str) -> Option<(u32, u32)> {
    let (h, m) = time.trim().split_once(':')?;
    if h.is_empty() || m.len() != 2 {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

pub fn validate_meal_time(time: &str) -> Result<String> {
    match parse_meal_time(time) {
        Some((h, m)) => Ok(format!("{h:02}:{m:02}")),
        None => bail!("Invalid meal time '{time}'. Use HH:MM (24h), e.g. 07:30"),
    }
}

pub fn validate_meal_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Meal name must not be empty");
    }
    Ok(trimmed.to_string())
}

pub fn validate_food_item(food: &FoodItem) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    Ok(())
}

pub fn validate_weight(weight: f64) -> Result<()> {
    if !weight.is_finite() || weight <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(())
}

pub fn validate_goal(goal: &Goal) -> Result<()> {
    validate_weight(goal.target_weight)
        .map_err(|_| anyhow::anyhow!("Target weight must be greater than 0"))?;
    validate_weight(goal.current_weight)
        .map_err(|_| anyhow::anyhow!("Starting weight must be greater than 0"))?;
    if goal.daily_calories == 0 {
        bail!("Daily calorie target must be greater than 0");
    }
    Ok(())
}

// --- Built-in sample data (first run, nothing remote or cached) ---

#[must_use]
pub fn default_goal() -> Goal {
    Goal {
        target_weight: 75.0,
        current_weight: 65.0,
        daily_calories: 3000,
        daily_protein: 150,
        start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap_or_default(),
        subscriber_id: None,
    }
}

fn sample_food(id: &str, name: &str, macros: [u32; 4]) -> FoodItem {
    let [calories, protein, carbs, fat] = macros;
    FoodItem {
        id: id.to_string(),
        name: name.to_string(),
        calories,
        protein,
        carbs,
        fat,
        portion: None,
    }
}

fn sample_meal(id: &str, name: &str, time: &str, foods: Vec<FoodItem>) -> Meal {
    Meal {
        id: id.to_string(),
        name: name.to_string(),
        time: time.to_string(),
        foods,
        completed: false,
    }
}

#[must_use]
pub fn default_meals() -> Vec<Meal> {
    vec![
        sample_meal(
            "1",
            "Sarapan",
            "07:00",
            vec![
                sample_food("f1", "Nasi Putih", [350, 6, 78, 1]),
                sample_food("f2", "Telur Rebus (3)", [210, 18, 2, 15]),
                sample_food("f3", "Susu Full Cream", [150, 8, 12, 8]),
            ],
        ),
        sample_meal(
            "2",
            "Makan Siang",
            "12:00",
            vec![
                sample_food("f4", "Nasi Putih", [350, 6, 78, 1]),
                sample_food("f5", "Dada Ayam 200g", [330, 62, 0, 7]),
                sample_food("f6", "Sayur Brokoli", [55, 4, 11, 1]),
            ],
        ),
        sample_meal(
            "3",
            "Snack Sore",
            "16:00",
            vec![
                sample_food("f7", "Pisang (2)", [210, 3, 54, 1]),
                sample_food("f8", "Selai Kacang 2 sdm", [190, 7, 7, 16]),
            ],
        ),
        sample_meal(
            "4",
            "Makan Malam",
            "19:00",
            vec![
                sample_food("f9", "Nasi Putih", [350, 6, 78, 1]),
                sample_food("f10", "Ikan Salmon 150g", [280, 34, 0, 16]),
                sample_food("f11", "Kentang Rebus", [130, 3, 30, 0]),
            ],
        ),
    ]
}

#[must_use]
pub fn default_weight_history() -> Vec<WeightEntry> {
    [("w1", (2026, 2, 1), 63.0), ("w2", (2026, 2, 4), 64.3), ("w3", (2026, 2, 11), 65.0)]
        .into_iter()
        .map(|(id, (y, m, d), weight)| WeightEntry {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            weight,
            image: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meal_time_valid() {
        assert_eq!(parse_meal_time("07:00"), Some((7, 0)));
        assert_eq!(parse_meal_time("23:59"), Some((23, 59)));
        assert_eq!(parse_meal_time("7:30"), Some((7, 30)));
        assert_eq!(parse_meal_time(" 12:05 "), Some((12, 5)));
    }

    #[test]
    fn test_parse_meal_time_invalid() {
        assert!(parse_meal_time("24:00").is_none());
        assert!(parse_meal_time("12:60").is_none());
        assert!(parse_meal_time("12").is_none());
        assert!(parse_meal_time("12:5").is_none());
        assert!(parse_meal_time("ab:cd").is_none());
        assert!(parse_meal_time("").is_none());
    }

    #[test]
    fn test_validate_meal_time_normalizes() {
        assert_eq!(validate_meal_time("7:05").unwrap(), "07:05");
        assert!(validate_meal_time("noon").is_err());
    }

    #[test]
    fn test_validate_meal_name() {
        assert_eq!(validate_meal_name("  Sarapan ").unwrap(), "Sarapan");
        assert!(validate_meal_name("   ").is_err());
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(65.5).is_ok());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(-1.0).is_err());
        assert!(validate_weight(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_goal() {
        assert!(validate_goal(&default_goal()).is_ok());

        let mut goal = default_goal();
        goal.daily_calories = 0;
        assert!(validate_goal(&goal).is_err());

        let mut goal = default_goal();
        goal.target_weight = 0.0;
        assert!(validate_goal(&goal).is_err());
    }

    #[test]
    fn test_photo_classified_by_prefix() {
        let inline = Photo::from("data:image/png;base64,AAAA".to_string());
        assert!(inline.is_inline());
        let url = Photo::from("https://x.supabase.co/storage/v1/object/public/p/a.jpg".to_string());
        assert!(!url.is_inline());
    }

    #[test]
    fn test_photo_serializes_as_plain_string() {
        let entry = WeightEntry {
            id: "w".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            weight: 70.0,
            image: Some(Photo::Url("https://example.com/a.jpg".to_string())),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["image"], "https://example.com/a.jpg");
        assert_eq!(json["date"], "2026-02-20");

        let back: WeightEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_new_ids_are_time_ordered() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_defaults_match_seed_data() {
        let goal = default_goal();
        assert!((goal.target_weight - 75.0).abs() < f64::EPSILON);
        assert_eq!(goal.daily_calories, 3000);
        assert_eq!(default_meals().len(), 4);
        assert!(default_meals().iter().all(|m| m.time_of_day().is_some()));
        let history = default_weight_history();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].date <= w[1].date));
    }
}
