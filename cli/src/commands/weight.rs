use std::path::Path;

use anyhow::{Context, Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bulk_core::image::to_data_url;
use bulk_core::models::{Photo, WeightEntry, validate_weight};

use super::helpers::{image_content_type, no_neg_zero, parse_date, print_json, resolve_id, short_id};
use crate::app::App;

const KG_PER_LB: f64 = 0.453_592;

fn to_kg(value: f64, unit: &str) -> Result<f64> {
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => {
            let kg = no_neg_zero(value * KG_PER_LB);
            eprintln!("Converting {value:.1} lbs → {kg:.2} kg");
            Ok(kg)
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

fn read_photo(path: &Path) -> Result<Photo> {
    let content_type = image_content_type(path)?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Photo::Inline(to_data_url(content_type, &bytes)))
}

fn photo_label(photo: Option<&Photo>) -> &'static str {
    match photo {
        Some(Photo::Url(_)) => "uploaded",
        Some(Photo::Inline(_)) => "on device",
        None => "",
    }
}

pub(crate) async fn cmd_weight_log(
    app: &App,
    value: f64,
    unit: &str,
    date: Option<String>,
    photo: Option<&Path>,
    json: bool,
) -> Result<()> {
    let weight = to_kg(value, unit)?;
    validate_weight(weight)?;
    let date = parse_date(date)?;

    let mut entry = WeightEntry::new(date, weight);
    if let Some(path) = photo {
        entry.image = Some(read_photo(path)?);
    }

    let saved = app.store.add_weight_entry(entry).await;

    if json {
        return print_json(&saved);
    }
    println!("Logged {:.1} kg for {}", saved.weight, saved.date);
    match &saved.image {
        Some(Photo::Url(url)) => println!("  Photo: {url}"),
        Some(Photo::Inline(_)) => println!("  Photo: kept on this device"),
        None => {}
    }
    Ok(())
}

pub(crate) fn cmd_weight_history(app: &App, json: bool) -> Result<()> {
    let history = app.store.weight_history();
    if json {
        return print_json(&history);
    }
    if history.is_empty() {
        eprintln!("No weight entries yet");
        return Ok(());
    }

    #[derive(Tabled)]
    struct WeightRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        weight: String,
        #[tabled(rename = "Change")]
        change: String,
        #[tabled(rename = "Photo")]
        photo: &'static str,
    }

    let mut prev: Option<f64> = None;
    let rows: Vec<WeightRow> = history
        .iter()
        .map(|e| {
            let change = prev.map_or_else(String::new, |p| {
                format!("{:+.1}", no_neg_zero(e.weight - p))
            });
            prev = Some(e.weight);
            WeightRow {
                id: short_id(&e.id).to_string(),
                date: e.date.to_string(),
                weight: format!("{:.1}", e.weight),
                change,
                photo: photo_label(e.image.as_ref()),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_weight_delete(app: &App, query: &str, json: bool) -> Result<()> {
    let history = app.store.weight_history();
    let id = resolve_id("weight entry", query, history.iter().map(|e| e.id.as_str()))?;
    let Some(entry) = history.into_iter().find(|e| e.id == id) else {
        bail!("No weight entry with id '{query}'");
    };
    app.store.remove_weight_entry(&entry.id);

    if json {
        return print_json(&entry);
    }
    println!("Deleted {:.1} kg entry for {}", entry.weight, entry.date);
    Ok(())
}
