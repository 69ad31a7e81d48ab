use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDate};
use tokio::task::JoinSet;

use crate::cache::{LocalCache, Slot};
use crate::image;
use crate::metrics::{self, MacroTotals, Summary};
use crate::models::{
    FoodItem, Goal, Meal, Photo, WeightEntry, default_goal, default_meals, default_weight_history,
};
use crate::notify::{Notice, Notifier};
use crate::reminders::{ReminderScheduler, ScheduleReport};
use crate::remote::{FoodItemRow, MealRow, RemoteError, RemoteStore};

struct StoreState {
    goal: Goal,
    meals: Vec<Meal>,
    weight_history: Vec<WeightEntry>,
    loading: bool,
}

/// Application state with optimistic local mutation.
///
/// Every mutation updates memory and the local cache before returning, then
/// hands the remote write to a background task. Remote outcomes only surface
/// through logging and the [`Notifier`]; local state is never rolled back.
/// Remote writes for the same entity are not serialized, so a later mutation
/// may race an earlier one still in flight.
pub struct BulkingStore<R: RemoteStore> {
    remote: Arc<R>,
    cache: Arc<LocalCache>,
    notifier: Arc<dyn Notifier>,
    reminders: Option<Arc<ReminderScheduler>>,
    state: Mutex<StoreState>,
    tasks: Mutex<JoinSet<()>>,
}

impl<R: RemoteStore> BulkingStore<R> {
    /// A store holding the built-in defaults in the `loading` state.
    /// Call [`load`](Self::load) to pull real data.
    pub fn new(remote: Arc<R>, cache: Arc<LocalCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            remote,
            cache,
            notifier,
            reminders: None,
            state: Mutex::new(StoreState {
                goal: default_goal(),
                meals: default_meals(),
                weight_history: default_weight_history(),
                loading: true,
            }),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    #[must_use]
    pub fn with_reminders(mut self, scheduler: Arc<ReminderScheduler>) -> Self {
        self.reminders = Some(scheduler);
        self
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Reads ---

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    #[must_use]
    pub fn goal(&self) -> Goal {
        self.state().goal.clone()
    }

    #[must_use]
    pub fn meals(&self) -> Vec<Meal> {
        self.state().meals.clone()
    }

    #[must_use]
    pub fn meal(&self, meal_id: &str) -> Option<Meal> {
        self.state().meals.iter().find(|m| m.id == meal_id).cloned()
    }

    /// Weight history, date ascending.
    #[must_use]
    pub fn weight_history(&self) -> Vec<WeightEntry> {
        self.state().weight_history.clone()
    }

    #[must_use]
    pub fn totals(&self) -> MacroTotals {
        metrics::meal_totals(&self.state().meals)
    }

    #[must_use]
    pub fn current_weight(&self) -> f64 {
        let state = self.state();
        metrics::current_weight(&state.goal, &state.weight_history)
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        self.summary_at(Local::now().date_naive())
    }

    #[must_use]
    pub fn summary_at(&self, today: NaiveDate) -> Summary {
        let state = self.state();
        Summary::compute(&state.goal, &state.meals, &state.weight_history, today)
    }

    #[must_use]
    pub fn reminders(&self) -> Option<&Arc<ReminderScheduler>> {
        self.reminders.as_ref()
    }

    // --- Startup ---

    /// Pull state from the remote store, falling back to the local cache and
    /// then to the built-in defaults. Always clears `loading`.
    pub async fn load(&self) {
        let fetched = tokio::try_join!(
            self.remote.fetch_goal(),
            self.remote.fetch_meals(),
            self.remote.fetch_weight_history(),
        );

        match fetched {
            Ok((goal, meals, mut history)) => {
                let mut state = self.state();
                if let Some(goal) = goal {
                    state.goal = goal;
                }
                if !meals.is_empty() {
                    state.meals = meals;
                }
                if !history.is_empty() {
                    history.sort_by_key(|e| e.date);
                    state.weight_history = history;
                }
                self.persist(Slot::Goal, &state.goal);
                self.persist(Slot::Meals, &state.meals);
                self.persist(Slot::WeightHistory, &state.weight_history);
                tracing::debug!(
                    meals = state.meals.len(),
                    weights = state.weight_history.len(),
                    "loaded state from remote store"
                );
            }
            Err(e) => {
                if e.is_unconfigured() {
                    tracing::debug!("remote store not configured, using local cache");
                } else {
                    tracing::warn!(error = %e, "failed to load from remote store, using local cache");
                }
                self.load_from_cache();
            }
        }

        self.state().loading = false;
    }

    fn load_from_cache(&self) {
        let cached = match self.cache.load_state() {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read local cache, using defaults");
                return;
            }
        };
        let mut state = self.state();
        if let Some(goal) = cached.goal {
            state.goal = goal;
        }
        if let Some(meals) = cached.meals {
            state.meals = meals;
        }
        if let Some(mut history) = cached.weight_history {
            history.sort_by_key(|e| e.date);
            state.weight_history = history;
        }
    }

    /// Throttled reminder schedule for application start.
    pub fn start_reminders(&self) -> Option<ScheduleReport> {
        let scheduler = self.reminders.as_ref()?;
        scheduler.schedule_if_needed(&self.meals())
    }

    /// Wait for every in-flight remote write.
    pub async fn flush(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks());
            if tasks.is_empty() {
                return;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "reconciliation task did not complete");
                }
            }
        }
    }

    /// Reconciliation tasks not yet awaited by [`flush`](Self::flush).
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.tasks().len()
    }

    // --- Meals ---

    /// Append a food to a meal. Returns `false` if the meal was not found.
    pub fn add_food_to_meal(&self, meal_id: &str, food: FoodItem) -> bool {
        let updated = {
            let mut state = self.state();
            let Some(meal) = state.meals.iter_mut().find(|m| m.id == meal_id) else {
                tracing::debug!(meal_id, "add food: no such meal");
                return false;
            };
            meal.foods.push(food);
            let updated = meal.clone();
            self.persist(Slot::Meals, &state.meals);
            updated
        };
        self.spawn_meal_sync(updated);
        true
    }

    pub fn remove_food_from_meal(&self, meal_id: &str, food_id: &str) -> bool {
        let updated = {
            let mut state = self.state();
            let Some(meal) = state.meals.iter_mut().find(|m| m.id == meal_id) else {
                tracing::debug!(meal_id, "remove food: no such meal");
                return false;
            };
            let before = meal.foods.len();
            meal.foods.retain(|f| f.id != food_id);
            if meal.foods.len() == before {
                tracing::debug!(meal_id, food_id, "remove food: no such food");
                return false;
            }
            let updated = meal.clone();
            self.persist(Slot::Meals, &state.meals);
            updated
        };
        self.spawn_meal_sync(updated);
        true
    }

    pub fn add_meal(&self, meal: Meal) {
        let meals = {
            let mut state = self.state();
            state.meals.push(meal.clone());
            self.persist(Slot::Meals, &state.meals);
            state.meals.clone()
        };
        self.spawn_meal_sync(meal);
        self.reschedule(&meals);
    }

    pub fn remove_meal(&self, meal_id: &str) -> bool {
        let meals = {
            let mut state = self.state();
            let before = state.meals.len();
            state.meals.retain(|m| m.id != meal_id);
            if state.meals.len() == before {
                return false;
            }
            self.persist(Slot::Meals, &state.meals);
            state.meals.clone()
        };

        let remote = Arc::clone(&self.remote);
        let notifier = Arc::clone(&self.notifier);
        let meal_id = meal_id.to_string();
        self.dispatch(async move {
            if let Err(e) = remote.delete_meal(&meal_id).await {
                report_failure(notifier.as_ref(), "meal deletion", &e);
            }
        });
        self.reschedule(&meals);
        true
    }

    /// Flip a meal's completion flag. Returns the new value.
    pub fn toggle_meal_completion(&self, meal_id: &str) -> Option<bool> {
        let completed = {
            let mut state = self.state();
            let meal = state.meals.iter_mut().find(|m| m.id == meal_id)?;
            meal.completed = !meal.completed;
            let completed = meal.completed;
            self.persist(Slot::Meals, &state.meals);
            completed
        };

        let remote = Arc::clone(&self.remote);
        let notifier = Arc::clone(&self.notifier);
        let meal_id = meal_id.to_string();
        self.dispatch(async move {
            if let Err(e) = remote.set_meal_completed(&meal_id, completed).await {
                report_failure(notifier.as_ref(), "meal status", &e);
            }
        });
        Some(completed)
    }

    // --- Weight ---

    /// Record a weight entry, replacing any entry on the same date.
    ///
    /// An inline photo is uploaded first; if that fails the inline data is
    /// kept locally and the user is told. Returns the entry as stored.
    pub async fn add_weight_entry(&self, mut entry: WeightEntry) -> WeightEntry {
        if let Some(existing_id) = self
            .state()
            .weight_history
            .iter()
            .find(|e| e.date == entry.date)
            .map(|e| e.id.clone())
        {
            entry.id = existing_id;
        }

        let inline = match &entry.image {
            Some(Photo::Inline(data_url)) => Some(data_url.clone()),
            _ => None,
        };
        if let Some(data_url) = inline {
            match image::upload_inline(self.remote.as_ref(), &data_url, &entry.id).await {
                Some(url) => entry.image = Some(Photo::Url(url)),
                None => self.notifier.notify(Notice::error(
                    "Photo saved on this device only; cloud upload failed",
                )),
            }
        }

        // Every entry on this date is replaced; the first keeps its id.
        let replaced = {
            let mut state = self.state();
            let mut replaced = Vec::new();
            state.weight_history.retain(|e| {
                if e.date == entry.date {
                    replaced.push(e.clone());
                    false
                } else {
                    true
                }
            });
            if let Some(first) = replaced.first() {
                entry.id.clone_from(&first.id);
            }
            state.weight_history.push(entry.clone());
            state.weight_history.sort_by_key(|e| e.date);
            self.persist(Slot::WeightHistory, &state.weight_history);
            replaced
        };

        let kept_url = entry.image.as_ref().map(Photo::as_str);
        let stale_photos: Vec<String> = replaced
            .iter()
            .filter_map(|old| match &old.image {
                Some(Photo::Url(url)) if kept_url != Some(url.as_str()) => {
                    self.remote.photo_path(url)
                }
                _ => None,
            })
            .collect();
        let duplicate_ids: Vec<String> = replaced
            .iter()
            .skip(1)
            .map(|old| old.id.clone())
            .filter(|id| *id != entry.id)
            .collect();
        if !duplicate_ids.is_empty() {
            tracing::debug!(date = %entry.date, count = duplicate_ids.len(), "dropping duplicate weight entries");
        }

        let remote = Arc::clone(&self.remote);
        let notifier = Arc::clone(&self.notifier);
        let stored = entry.clone();
        self.dispatch(async move {
            if let Err(e) = remote.upsert_weight_entry(&stored).await {
                report_failure(notifier.as_ref(), "weight entry", &e);
                return;
            }
            for id in duplicate_ids {
                if let Err(e) = remote.delete_weight_entry(&id).await {
                    report_failure(notifier.as_ref(), "weight deletion", &e);
                }
            }
            for path in stale_photos {
                if let Err(e) = remote.remove_photo(&path).await {
                    tracing::warn!(entry_id = %stored.id, path, error = %e, "failed to remove replaced photo");
                }
            }
        });
        entry
    }

    pub fn remove_weight_entry(&self, entry_id: &str) -> bool {
        let removed = {
            let mut state = self.state();
            let Some(pos) = state.weight_history.iter().position(|e| e.id == entry_id) else {
                return false;
            };
            let removed = state.weight_history.remove(pos);
            self.persist(Slot::WeightHistory, &state.weight_history);
            removed
        };

        let photo_path = match &removed.image {
            Some(Photo::Url(url)) => self.remote.photo_path(url),
            _ => None,
        };
        let remote = Arc::clone(&self.remote);
        let notifier = Arc::clone(&self.notifier);
        self.dispatch(async move {
            if let Some(path) = photo_path {
                if let Err(e) = remote.remove_photo(&path).await {
                    tracing::warn!(entry_id = %removed.id, path, error = %e, "failed to remove photo");
                }
            }
            if let Err(e) = remote.delete_weight_entry(&removed.id).await {
                report_failure(notifier.as_ref(), "weight deletion", &e);
            }
        });
        true
    }

    // --- Goal ---

    pub fn set_goals(&self, goal: Goal) {
        {
            let mut state = self.state();
            state.goal = goal.clone();
            self.persist(Slot::Goal, &state.goal);
        }
        self.spawn_goal_upsert(goal);
    }

    /// Store the push subscriber id on the goal so the server-side reminder
    /// job can address this device. No-op when already stored.
    pub fn attach_subscriber(&self, subscriber_id: &str) -> bool {
        let goal = {
            let mut state = self.state();
            if state.goal.subscriber_id.as_deref() == Some(subscriber_id) {
                return false;
            }
            state.goal.subscriber_id = Some(subscriber_id.to_string());
            self.persist(Slot::Goal, &state.goal);
            state.goal.clone()
        };
        self.spawn_goal_upsert(goal);
        true
    }

    // --- Internals ---

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist<T: serde::Serialize + ?Sized>(&self, slot: Slot, value: &T) {
        if let Err(e) = self.cache.write_slot(slot, value) {
            tracing::warn!(slot = slot.key(), error = %e, "failed to write local cache");
        }
    }

    fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, remote write dropped");
            return;
        };
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(task, &handle);
    }

    fn spawn_meal_sync(&self, meal: Meal) {
        let remote = Arc::clone(&self.remote);
        let notifier = Arc::clone(&self.notifier);
        self.dispatch(async move {
            if let Err((step, e)) = sync_meal(remote.as_ref(), &meal).await {
                tracing::debug!(meal_id = %meal.id, step, "meal sync stopped");
                report_failure(notifier.as_ref(), "meal", &e);
            }
        });
    }

    fn spawn_goal_upsert(&self, goal: Goal) {
        let remote = Arc::clone(&self.remote);
        let notifier = Arc::clone(&self.notifier);
        self.dispatch(async move {
            if let Err(e) = remote.upsert_goal(&goal).await {
                report_failure(notifier.as_ref(), "goal", &e);
            }
        });
    }

    fn reschedule(&self, meals: &[Meal]) {
        if let Some(scheduler) = &self.reminders {
            scheduler.sync_meal_reminders(meals);
        }
    }
}

/// Push one meal to the two remote tables: scalar row, then a full
/// replacement of its food items.
///
/// Not atomic. A failure between steps leaves the remote meal row and its
/// food items out of step until the next sync of that meal.
async fn sync_meal<R: RemoteStore>(remote: &R, meal: &Meal) -> Result<(), (&'static str, RemoteError)> {
    remote
        .upsert_meal_row(&MealRow::from(meal))
        .await
        .map_err(|e| ("upsert_meal_row", e))?;
    remote
        .delete_food_items(&meal.id)
        .await
        .map_err(|e| ("delete_food_items", e))?;
    let rows = FoodItemRow::for_meal(meal);
    if !rows.is_empty() {
        remote
            .insert_food_items(&rows)
            .await
            .map_err(|e| ("insert_food_items", e))?;
    }
    Ok(())
}

fn report_failure(notifier: &dyn Notifier, what: &str, error: &RemoteError) {
    if error.is_unconfigured() {
        tracing::debug!(what, "remote store not configured, change kept locally");
        return;
    }
    tracing::warn!(what, error = %error, "remote write failed");
    notifier.notify(Notice::error(format!("Failed to sync {what}")));
}
