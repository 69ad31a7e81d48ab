use anyhow::Result;

use super::helpers::{no_neg_zero, parse_date, print_json};
use crate::app::App;

pub(crate) fn cmd_summary(app: &App, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let s = app.store.summary_at(date);

    if json {
        return print_json(&s);
    }

    let day = s.days_elapsed;
    println!("=== {} · day {day} ===\n", s.date);

    let t = s.totals;
    let (cal_target, p_target) = (s.calorie_target, s.protein_target);
    println!(
        "  Calories: {} / {cal_target} kcal ({} remaining)",
        t.calories, s.calories_remaining
    );
    println!(
        "  Protein:  {} / {p_target} g ({} remaining)",
        t.protein, s.protein_remaining
    );
    println!("  Carbs:    {} g", t.carbs);
    println!("  Fat:      {} g", t.fat);
    println!("  Meals:    {}/{} completed", s.meals_completed, s.meals_total);
    println!();
    println!(
        "  Weight:   {:.1} kg (start {:.1} kg, target {:.1} kg)",
        s.current_weight, s.starting_weight, s.target_weight
    );
    println!(
        "  Gained:   {:.1} kg · {:.0}% of goal",
        no_neg_zero(s.total_gain),
        s.weight_progress
    );

    Ok(())
}
