use anyhow::{Result, bail};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bulk_core::models::{
    FoodItem, Meal, new_id, validate_food_item, validate_meal_name, validate_meal_time,
};

use super::helpers::{print_json, resolve_id, short_id, truncate};
use crate::app::App;

fn resolve_meal(app: &App, query: &str) -> Result<Meal> {
    let meals = app.store.meals();
    let id = resolve_id("meal", query, meals.iter().map(|m| m.id.as_str()))?;
    match meals.into_iter().find(|m| m.id == id) {
        Some(meal) => Ok(meal),
        None => bail!("No meal with id '{query}'"),
    }
}

pub(crate) fn cmd_meal_list(app: &App, json: bool) -> Result<()> {
    let meals = app.store.meals();
    if json {
        return print_json(&meals);
    }
    if meals.is_empty() {
        eprintln!("No meals planned. Add one with `bulk meal add <name> <HH:MM>`");
        return Ok(());
    }

    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Meal")]
        name: String,
        #[tabled(rename = "Foods")]
        foods: usize,
        #[tabled(rename = "kcal")]
        calories: u32,
        #[tabled(rename = "P (g)")]
        protein: u32,
        #[tabled(rename = "Done")]
        done: &'static str,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: short_id(&m.id).to_string(),
            time: m.time.clone(),
            name: truncate(&m.name, 30),
            foods: m.foods.len(),
            calories: m.foods.iter().map(|f| f.calories).sum(),
            protein: m.foods.iter().map(|f| f.protein).sum(),
            done: if m.completed { "✓" } else { "" },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    for meal in meals.iter().filter(|m| !m.foods.is_empty()) {
        println!("\n  {} ({})", meal.name, meal.time);
        for f in &meal.foods {
            let portion = f
                .portion
                .as_ref()
                .map(|p| format!(" ({p})"))
                .unwrap_or_default();
            println!(
                "    [{}] {}{portion}: {} kcal | P:{}g C:{}g F:{}g",
                short_id(&f.id),
                f.name,
                f.calories,
                f.protein,
                f.carbs,
                f.fat
            );
        }
    }
    Ok(())
}

pub(crate) fn cmd_meal_add(app: &App, name: &str, time: &str, json: bool) -> Result<()> {
    let name = validate_meal_name(name)?;
    let time = validate_meal_time(time)?;
    let meal = Meal::new(&name, &time);
    app.store.add_meal(meal.clone());

    if json {
        return print_json(&meal);
    }
    println!("Added {} at {} [{}]", meal.name, meal.time, short_id(&meal.id));
    Ok(())
}

pub(crate) fn cmd_meal_remove(app: &App, query: &str, json: bool) -> Result<()> {
    let meal = resolve_meal(app, query)?;
    app.store.remove_meal(&meal.id);

    if json {
        return print_json(&meal);
    }
    println!("Removed {} ({})", meal.name, meal.time);
    Ok(())
}

pub(crate) fn cmd_meal_toggle(app: &App, query: &str, json: bool) -> Result<()> {
    let meal = resolve_meal(app, query)?;
    let Some(completed) = app.store.toggle_meal_completion(&meal.id) else {
        bail!("No meal with id '{query}'");
    };

    if json {
        #[derive(Serialize)]
        struct Toggled<'a> {
            id: &'a str,
            name: &'a str,
            completed: bool,
        }
        return print_json(&Toggled {
            id: &meal.id,
            name: &meal.name,
            completed,
        });
    }
    if completed {
        println!("{} marked as eaten", meal.name);
    } else {
        println!("{} marked as not eaten", meal.name);
    }
    Ok(())
}

/// Macros for a new food item.
#[derive(Debug, Clone)]
pub(crate) struct NewFood {
    pub name: String,
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
    pub portion: Option<String>,
}

pub(crate) fn cmd_meal_add_food(app: &App, query: &str, food: NewFood, json: bool) -> Result<()> {
    let meal = resolve_meal(app, query)?;
    let food = FoodItem {
        id: new_id(),
        name: food.name.trim().to_string(),
        calories: food.calories,
        protein: food.protein,
        carbs: food.carbs,
        fat: food.fat,
        portion: food.portion.filter(|p| !p.trim().is_empty()),
    };
    validate_food_item(&food)?;

    if !app.store.add_food_to_meal(&meal.id, food.clone()) {
        bail!("No meal with id '{query}'");
    }

    if json {
        return print_json(&food);
    }
    println!(
        "Added {} to {}: {} kcal | P:{}g C:{}g F:{}g",
        food.name, meal.name, food.calories, food.protein, food.carbs, food.fat
    );
    Ok(())
}

pub(crate) fn cmd_meal_remove_food(
    app: &App,
    meal_query: &str,
    food_query: &str,
    json: bool,
) -> Result<()> {
    let meal = resolve_meal(app, meal_query)?;
    let food_id = resolve_id("food", food_query, meal.foods.iter().map(|f| f.id.as_str()))?;
    if !app.store.remove_food_from_meal(&meal.id, &food_id) {
        bail!("No food with id '{food_query}' in {}", meal.name);
    }

    if json {
        return print_json(&serde_json::json!({ "meal_id": meal.id, "food_id": food_id }));
    }
    let name = meal
        .foods
        .iter()
        .find(|f| f.id == food_id)
        .map_or("Food", |f| f.name.as_str());
    println!("Removed {name} from {}", meal.name);
    Ok(())
}
