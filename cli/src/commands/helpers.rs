use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Find the one id equal to, or starting with, `query`.
///
/// Ids are long UUIDs, so the CLI accepts any unambiguous prefix.
pub(crate) fn resolve_id<'a, I>(kind: &str, query: &str, ids: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let query = query.trim();
    if query.is_empty() {
        bail!("Empty {kind} id");
    }
    let mut matches = Vec::new();
    for id in ids {
        if id == query {
            return Ok(id.to_string());
        }
        if id.starts_with(query) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [] => bail!("No {kind} with id '{query}'"),
        [only] => Ok((*only).to_string()),
        _ => bail!(
            "Ambiguous {kind} id '{query}' matches {} entries; use more characters",
            matches.len()
        ),
    }
}

/// MIME type for a photo file, by extension.
pub(crate) fn image_content_type(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        _ => bail!(
            "Unsupported photo type '{}'. Use a .jpg, .png or .webp file",
            path.display()
        ),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2026-02-11".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 11).unwrap());
        assert!(parse_date(Some("11/02/2026".to_string())).is_err());
    }

    #[test]
    fn test_resolve_id() {
        let ids = ["0190a1b2-aaaa", "0190a1b2-bbbb", "1"];
        assert_eq!(resolve_id("meal", "1", ids).unwrap(), "1");
        assert_eq!(resolve_id("meal", "0190a1b2-b", ids).unwrap(), "0190a1b2-bbbb");
        let err = resolve_id("meal", "0190", ids).unwrap_err().to_string();
        assert!(err.contains("Ambiguous"));
        assert!(resolve_id("meal", "zzz", ids).is_err());
        assert!(resolve_id("meal", "  ", ids).is_err());
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type(Path::new("me.JPG")).unwrap(), "image/jpeg");
        assert_eq!(image_content_type(Path::new("a/b.webp")).unwrap(), "image/webp");
        assert!(image_content_type(Path::new("notes.txt")).is_err());
        assert!(image_content_type(Path::new("noext")).is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0190a1b2-c3d4"), "0190a1b2");
        assert_eq!(short_id("f1"), "f1");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Telur Rebus (3)", 10), "Telur R...");
        assert_eq!(truncate("Nasi", 10), "Nasi");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }
}
