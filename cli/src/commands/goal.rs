use anyhow::{Result, bail};

use bulk_core::models::{Goal, validate_goal};

use super::helpers::{parse_date, print_json};
use crate::app::App;

/// Fields to change on the goal; `None` keeps the current value.
#[derive(Debug, Default)]
pub(crate) struct GoalUpdate {
    pub target: Option<f64>,
    pub start_weight: Option<f64>,
    pub calories: Option<u32>,
    pub protein: Option<u32>,
    pub start_date: Option<String>,
}

impl GoalUpdate {
    fn is_empty(&self) -> bool {
        self.target.is_none()
            && self.start_weight.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.start_date.is_none()
    }

    fn apply(self, mut goal: Goal) -> Result<Goal> {
        if let Some(v) = self.target {
            goal.target_weight = v;
        }
        if let Some(v) = self.start_weight {
            goal.current_weight = v;
        }
        if let Some(v) = self.calories {
            goal.daily_calories = v;
        }
        if let Some(v) = self.protein {
            goal.daily_protein = v;
        }
        if self.start_date.is_some() {
            goal.start_date = parse_date(self.start_date)?;
        }
        validate_goal(&goal)?;
        Ok(goal)
    }
}

fn print_goal(goal: &Goal) {
    println!("Target weight:  {:.1} kg", goal.target_weight);
    println!("Start weight:   {:.1} kg", goal.current_weight);
    println!("Daily calories: {} kcal", goal.daily_calories);
    println!("Daily protein:  {} g", goal.daily_protein);
    println!("Start date:     {}", goal.start_date);
    if let Some(id) = &goal.subscriber_id {
        println!("Push device:    {id}");
    }
}

pub(crate) fn cmd_goal_show(app: &App, json: bool) -> Result<()> {
    let goal = app.store.goal();
    if json {
        return print_json(&goal);
    }
    print_goal(&goal);
    Ok(())
}

pub(crate) fn cmd_goal_set(app: &App, update: GoalUpdate, json: bool) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --target, --start-weight, --calories, --protein, --start-date");
    }
    let goal = update.apply(app.store.goal())?;
    app.store.set_goals(goal.clone());

    if json {
        return print_json(&goal);
    }
    eprintln!("Goal updated");
    print_goal(&goal);
    Ok(())
}
