//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};

use crate::models::{Goal, Meal, WeightEntry};
use crate::notify::{Notice, NoticeLevel, Notifier};
use crate::platform::{BrowserNotifications, NativeBridge, Permission, PushInfo};
use crate::reminders::AlarmSpec;
use crate::remote::{
    FoodItemRow, MealRow, MealWithFoodsRow, RemoteError, RemoteResult, RemoteStore,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- Remote store ---

const PHOTO_PREFIX: &str = "memory://photos/";

#[derive(Default)]
struct RemoteState {
    goal: Option<Goal>,
    meals: Vec<MealRow>,
    foods: Vec<FoodItemRow>,
    weights: Vec<WeightEntry>,
    photos: HashMap<String, Vec<u8>>,
    calls: Vec<String>,
}

/// Remote store backed by plain collections, with per-operation failure injection.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    failing: Mutex<HashSet<&'static str>>,
    unconfigured: bool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Self::default()
        }
    }

    /// Make every future call to `op` fail.
    pub fn fail(&self, op: &'static str) {
        lock(&self.failing).insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        lock(&self.failing).remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn goal(&self) -> Option<Goal> {
        lock(&self.state).goal.clone()
    }

    pub fn meal_rows(&self) -> Vec<MealRow> {
        lock(&self.state).meals.clone()
    }

    pub fn food_rows(&self, meal_id: &str) -> Vec<FoodItemRow> {
        lock(&self.state)
            .foods
            .iter()
            .filter(|f| f.meal_id == meal_id)
            .cloned()
            .collect()
    }

    pub fn weights(&self) -> Vec<WeightEntry> {
        lock(&self.state).weights.clone()
    }

    pub fn photo_paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = lock(&self.state).photos.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn seed_goal(&self, goal: Goal) {
        lock(&self.state).goal = Some(goal);
    }

    pub fn seed_meals(&self, meals: &[Meal]) {
        let mut state = lock(&self.state);
        for meal in meals {
            state.meals.push(MealRow::from(meal));
            state.foods.extend(FoodItemRow::for_meal(meal));
        }
    }

    pub fn seed_weights(&self, entries: Vec<WeightEntry>) {
        lock(&self.state).weights = entries;
    }

    fn begin(&self, op: &'static str, arg: &str) -> RemoteResult<MutexGuard<'_, RemoteState>> {
        if self.unconfigured {
            return Err(RemoteError::Unconfigured);
        }
        let mut state = lock(&self.state);
        if arg.is_empty() {
            state.calls.push(op.to_string());
        } else {
            state.calls.push(format!("{op}:{arg}"));
        }
        if lock(&self.failing).contains(op) {
            return Err(RemoteError::Status {
                status: 503,
                body: format!("{op} unavailable"),
            });
        }
        Ok(state)
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch_goal(&self) -> RemoteResult<Option<Goal>> {
        let state = self.begin("fetch_goal", "")?;
        Ok(state.goal.clone())
    }

    async fn upsert_goal(&self, goal: &Goal) -> RemoteResult<()> {
        let mut state = self.begin("upsert_goal", "")?;
        state.goal = Some(goal.clone());
        Ok(())
    }

    async fn fetch_meals(&self) -> RemoteResult<Vec<Meal>> {
        let state = self.begin("fetch_meals", "")?;
        Ok(state
            .meals
            .iter()
            .map(|m| {
                Meal::from(MealWithFoodsRow {
                    meal: m.clone(),
                    food_items: state
                        .foods
                        .iter()
                        .filter(|f| f.meal_id == m.id)
                        .cloned()
                        .collect(),
                })
            })
            .collect())
    }

    async fn upsert_meal_row(&self, meal: &MealRow) -> RemoteResult<()> {
        let mut state = self.begin("upsert_meal_row", &meal.id)?;
        match state.meals.iter_mut().find(|m| m.id == meal.id) {
            Some(existing) => *existing = meal.clone(),
            None => state.meals.push(meal.clone()),
        }
        Ok(())
    }

    async fn set_meal_completed(&self, meal_id: &str, completed: bool) -> RemoteResult<()> {
        let mut state = self.begin("set_meal_completed", meal_id)?;
        if let Some(meal) = state.meals.iter_mut().find(|m| m.id == meal_id) {
            meal.completed = completed;
        }
        Ok(())
    }

    async fn delete_meal(&self, meal_id: &str) -> RemoteResult<()> {
        let mut state = self.begin("delete_meal", meal_id)?;
        state.meals.retain(|m| m.id != meal_id);
        state.foods.retain(|f| f.meal_id != meal_id);
        Ok(())
    }

    async fn delete_food_items(&self, meal_id: &str) -> RemoteResult<()> {
        let mut state = self.begin("delete_food_items", meal_id)?;
        state.foods.retain(|f| f.meal_id != meal_id);
        Ok(())
    }

    async fn insert_food_items(&self, rows: &[FoodItemRow]) -> RemoteResult<()> {
        let meal_id = rows.first().map(|r| r.meal_id.clone()).unwrap_or_default();
        let mut state = self.begin("insert_food_items", &meal_id)?;
        state.foods.extend_from_slice(rows);
        Ok(())
    }

    async fn fetch_weight_history(&self) -> RemoteResult<Vec<WeightEntry>> {
        let state = self.begin("fetch_weight_history", "")?;
        let mut weights = state.weights.clone();
        weights.sort_by_key(|e| e.date);
        Ok(weights)
    }

    async fn upsert_weight_entry(&self, entry: &WeightEntry) -> RemoteResult<()> {
        let mut state = self.begin("upsert_weight_entry", &entry.id)?;
        match state.weights.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => state.weights.push(entry.clone()),
        }
        Ok(())
    }

    async fn delete_weight_entry(&self, entry_id: &str) -> RemoteResult<()> {
        let mut state = self.begin("delete_weight_entry", entry_id)?;
        state.weights.retain(|e| e.id != entry_id);
        Ok(())
    }

    async fn upload_photo(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> RemoteResult<String> {
        let mut state = self.begin("upload_photo", path)?;
        state.photos.insert(path.to_string(), bytes);
        Ok(format!("{PHOTO_PREFIX}{path}"))
    }

    async fn remove_photo(&self, path: &str) -> RemoteResult<()> {
        let mut state = self.begin("remove_photo", path)?;
        state.photos.remove(path);
        Ok(())
    }

    fn photo_path(&self, url: &str) -> Option<String> {
        url.strip_prefix(PHOTO_PREFIX).map(str::to_string)
    }
}

// --- Notifier ---

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn errors(&self) -> Vec<Notice> {
        lock(&self.notices)
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .cloned()
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

// --- Native bridge ---

#[derive(Default)]
struct BridgeState {
    alarms: Vec<AlarmSpec>,
    cancel_calls: usize,
    register_calls: usize,
    info_calls: usize,
    failing_alarms: HashSet<String>,
    fail_cancel: bool,
    fail_register: bool,
    /// Info reported once `info_calls` reaches the threshold.
    confirm_after: Option<(usize, PushInfo)>,
}

#[derive(Default)]
pub struct RecordingBridge {
    state: Mutex<BridgeState>,
}

impl RecordingBridge {
    pub fn alarms(&self) -> Vec<AlarmSpec> {
        lock(&self.state).alarms.clone()
    }

    pub fn cancel_calls(&self) -> usize {
        lock(&self.state).cancel_calls
    }

    pub fn register_calls(&self) -> usize {
        lock(&self.state).register_calls
    }

    pub fn info_calls(&self) -> usize {
        lock(&self.state).info_calls
    }

    pub fn fail_alarm(&self, id: &str) {
        lock(&self.state).failing_alarms.insert(id.to_string());
    }

    pub fn fail_cancel(&self, fail: bool) {
        lock(&self.state).fail_cancel = fail;
    }

    pub fn fail_register(&self, fail: bool) {
        lock(&self.state).fail_register = fail;
    }

    /// Report `subscriber_id` as subscribed from the `n`th info call on.
    pub fn confirm_after(&self, n: usize, subscriber_id: &str) {
        lock(&self.state).confirm_after = Some((
            n,
            PushInfo {
                subscriber_id: Some(subscriber_id.to_string()),
                is_subscribed: true,
            },
        ));
    }
}

impl NativeBridge for RecordingBridge {
    fn register(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.register_calls += 1;
        if state.fail_register {
            bail!("bridge refused registration");
        }
        Ok(())
    }

    fn info(&self) -> Result<PushInfo> {
        let mut state = lock(&self.state);
        state.info_calls += 1;
        match &state.confirm_after {
            Some((n, info)) if state.info_calls >= *n => Ok(info.clone()),
            _ => Ok(PushInfo::default()),
        }
    }

    fn create_alarm(&self, alarm: &AlarmSpec) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing_alarms.contains(&alarm.id) {
            bail!("alarm service rejected {}", alarm.id);
        }
        state.alarms.push(alarm.clone());
        Ok(())
    }

    fn cancel_all_alarms(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.cancel_calls += 1;
        if state.fail_cancel {
            bail!("alarm service unavailable");
        }
        state.alarms.clear();
        Ok(())
    }
}

// --- Browser notifications ---

pub struct FakeBrowser {
    permission: Mutex<Permission>,
    answer: Mutex<Permission>,
    shown: Mutex<Vec<(String, String)>>,
}

impl FakeBrowser {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            answer: Mutex::new(permission),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// What the user picks when asked.
    pub fn answer_with(&self, permission: Permission) {
        *lock(&self.answer) = permission;
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        lock(&self.shown).clone()
    }
}

impl BrowserNotifications for FakeBrowser {
    fn permission(&self) -> Permission {
        *lock(&self.permission)
    }

    fn request_permission(&self) -> Result<Permission> {
        let answer = *lock(&self.answer);
        *lock(&self.permission) = answer;
        Ok(answer)
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        lock(&self.shown).push((title.to_string(), body.to_string()));
        Ok(())
    }
}
