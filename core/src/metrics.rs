use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Goal, Meal, WeightEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MacroTotals {
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

/// Dashboard view of the current state.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub date: NaiveDate,
    pub totals: MacroTotals,
    pub calorie_target: u32,
    pub protein_target: u32,
    pub calories_remaining: i64,
    pub protein_remaining: i64,
    pub meals_completed: usize,
    pub meals_total: usize,
    pub starting_weight: f64,
    pub current_weight: f64,
    pub target_weight: f64,
    pub total_gain: f64,
    pub weight_progress: f64,
    pub days_elapsed: i64,
}

/// Sum macros over completed meals only.
#[must_use]
pub fn meal_totals(meals: &[Meal]) -> MacroTotals {
    meals
        .iter()
        .filter(|m| m.completed)
        .flat_map(|m| &m.foods)
        .fold(MacroTotals::default(), |acc, f| MacroTotals {
            calories: acc.calories.saturating_add(f.calories),
            protein: acc.protein.saturating_add(f.protein),
            carbs: acc.carbs.saturating_add(f.carbs),
            fat: acc.fat.saturating_add(f.fat),
        })
}

/// Weight of the latest-dated entry, or the goal's starting weight.
#[must_use]
pub fn current_weight(goal: &Goal, history: &[WeightEntry]) -> f64 {
    history
        .iter()
        .max_by_key(|e| e.date)
        .map_or(goal.current_weight, |e| e.weight)
}

#[must_use]
pub fn total_gain(goal: &Goal, current: f64) -> f64 {
    (current - goal.current_weight).max(0.0)
}

/// Percent of the way from starting weight to target, clamped to 0..=100.
#[must_use]
pub fn weight_progress(goal: &Goal, current: f64) -> f64 {
    let start = goal.current_weight;
    if goal.target_weight <= start {
        return 0.0;
    }
    ((current - start) / (goal.target_weight - start) * 100.0).clamp(0.0, 100.0)
}

/// Day count since the start date, where the start date itself is day 1.
#[must_use]
pub fn days_elapsed(start: NaiveDate, today: NaiveDate) -> i64 {
    (today - start).num_days() + 1
}

impl Summary {
    #[must_use]
    pub fn compute(goal: &Goal, meals: &[Meal], history: &[WeightEntry], today: NaiveDate) -> Self {
        let totals = meal_totals(meals);
        let current = current_weight(goal, history);
        Self {
            date: today,
            totals,
            calorie_target: goal.daily_calories,
            protein_target: goal.daily_protein,
            calories_remaining: i64::from(goal.daily_calories) - i64::from(totals.calories),
            protein_remaining: i64::from(goal.daily_protein) - i64::from(totals.protein),
            meals_completed: meals.iter().filter(|m| m.completed).count(),
            meals_total: meals.len(),
            starting_weight: goal.current_weight,
            current_weight: current,
            target_weight: goal.target_weight,
            total_gain: total_gain(goal, current),
            weight_progress: weight_progress(goal, current),
            days_elapsed: days_elapsed(goal.start_date, today),
        }
    }
}
