use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Serialize, de::DeserializeOwned};

use crate::models::{Goal, Meal, WeightEntry};
use crate::reminders::AlarmSpec;

/// Named slots mirroring the in-memory collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Meals,
    Goal,
    WeightHistory,
}

impl Slot {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Meals => "meals",
            Self::Goal => "goal",
            Self::WeightHistory => "weight_history",
        }
    }
}

/// What the cache held at startup. Absent slots are `None`.
#[derive(Debug, Clone, Default)]
pub struct CachedState {
    pub goal: Option<Goal>,
    pub meals: Option<Vec<Meal>>,
    pub weight_history: Option<Vec<WeightEntry>>,
}

/// Local persistence: the state fallback slots, small settings, and the
/// alarm spool used by hosts without a native alarm service.
pub struct LocalCache {
    conn: Mutex<Connection>,
}

impl LocalCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database: {}", path.display()))?;
        let cache = LocalCache {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = LocalCache {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS cache_slots (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS alarms (
                    id TEXT PRIMARY KEY NOT NULL,
                    meal_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    message TEXT NOT NULL,
                    fire_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_alarms_fire_at ON alarms(fire_at);

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- State slots ---

    pub fn write_slot<T: Serialize + ?Sized>(&self, slot: Slot, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize cache slot '{}'", slot.key()))?;
        self.conn().execute(
            "INSERT INTO cache_slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![slot.key(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Read a slot. A slot that no longer deserializes is treated as absent.
    pub fn read_slot<T: DeserializeOwned>(&self, slot: Slot) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM cache_slots WHERE key = ?1",
                params![slot.key()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(slot = slot.key(), error = %e, "discarding unreadable cache slot");
                Ok(None)
            }
        }
    }

    pub fn load_state(&self) -> Result<CachedState> {
        Ok(CachedState {
            goal: self.read_slot(Slot::Goal)?,
            meals: self.read_slot(Slot::Meals)?,
            weight_history: self.read_slot(Slot::WeightHistory)?,
        })
    }

    // --- Settings ---

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get_setting(key)? {
            Some(v) => {
                let ts = DateTime::parse_from_rfc3339(&v)
                    .with_context(|| format!("Invalid timestamp in setting '{key}': {v}"))?;
                Ok(Some(ts.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    pub fn set_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.set_setting(key, &at.to_rfc3339())
    }

    // --- Alarm spool ---

    pub fn insert_alarm(&self, alarm: &AlarmSpec) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO alarms (id, meal_id, title, message, fire_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                alarm.id,
                alarm.meal_id,
                alarm.title,
                alarm.message,
                alarm.fire_at_local()
            ],
        )?;
        Ok(())
    }

    /// Remove every spooled alarm, returning how many there were.
    pub fn clear_alarms(&self) -> Result<usize> {
        let n = self.conn().execute("DELETE FROM alarms", [])?;
        Ok(n)
    }

    /// Drop alarms whose fire time is before `cutoff`, returning how many.
    pub fn prune_alarms_before(&self, cutoff: NaiveDateTime) -> Result<usize> {
        let cutoff = cutoff.format(AlarmSpec::LOCAL_FORMAT).to_string();
        let n = self
            .conn()
            .execute("DELETE FROM alarms WHERE fire_at < ?1", params![cutoff])?;
        Ok(n)
    }

    /// Spooled alarms ordered by fire time. Rows with an unparseable time are skipped.
    pub fn list_alarms(&self) -> Result<Vec<AlarmSpec>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, meal_id, title, message, fire_at FROM alarms ORDER BY fire_at, id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, meal_id, title, message, fire_at)| {
                let fire_at = AlarmSpec::parse_local(&fire_at)?;
                Some(AlarmSpec {
                    id,
                    meal_id,
                    title,
                    message,
                    fire_at,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_goal, default_meals, default_weight_history};
    use chrono::NaiveDate;

    #[test]
    fn test_empty_cache_has_no_state() {
        let cache = LocalCache::open_in_memory().unwrap();
        let state = cache.load_state().unwrap();
        assert!(state.goal.is_none());
        assert!(state.meals.is_none());
        assert!(state.weight_history.is_none());
    }

    #[test]
    fn test_slots_overwrite() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache.write_slot(Slot::Meals, &default_meals()).unwrap();
        cache.write_slot(Slot::Meals, &default_meals()[..1]).unwrap();
        let meals: Vec<Meal> = cache.read_slot(Slot::Meals).unwrap().unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].name, "Sarapan");
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.db");
        {
            let cache = LocalCache::open(&path).unwrap();
            let mut goal = default_goal();
            goal.target_weight = 80.0;
            cache.write_slot(Slot::Goal, &goal).unwrap();
            cache
                .write_slot(Slot::WeightHistory, &default_weight_history())
                .unwrap();
        }
        let cache = LocalCache::open(&path).unwrap();
        let state = cache.load_state().unwrap();
        assert!((state.goal.unwrap().target_weight - 80.0).abs() < f64::EPSILON);
        assert_eq!(state.weight_history.unwrap().len(), 3);
        assert!(state.meals.is_none());
    }

    #[test]
    fn test_corrupt_slot_reads_as_absent() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache
            .conn()
            .execute(
                "INSERT INTO cache_slots (key, value, updated_at) VALUES ('goal', '{not json', '')",
                [],
            )
            .unwrap();
        let goal: Option<Goal> = cache.read_slot(Slot::Goal).unwrap();
        assert!(goal.is_none());
    }

    #[test]
    fn test_settings_roundtrip() {
        let cache = LocalCache::open_in_memory().unwrap();
        assert!(cache.get_setting("k").unwrap().is_none());
        cache.set_setting("k", "v1").unwrap();
        cache.set_setting("k", "v2").unwrap();
        assert_eq!(cache.get_setting("k").unwrap().as_deref(), Some("v2"));

        let at = Utc::now();
        cache.set_timestamp("ts", at).unwrap();
        let back = cache.get_timestamp("ts").unwrap().unwrap();
        assert_eq!(back.timestamp(), at.timestamp());
    }

    #[test]
    fn test_alarm_spool() {
        let cache = LocalCache::open_in_memory().unwrap();
        let at = |d: u32| {
            NaiveDate::from_ymd_opt(2026, 2, d)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap()
        };
        for (id, day) in [("b", 3), ("a", 2)] {
            cache
                .insert_alarm(&AlarmSpec {
                    id: id.to_string(),
                    meal_id: "1".to_string(),
                    title: "Time for Sarapan!".to_string(),
                    message: "m".to_string(),
                    fire_at: at(day),
                })
                .unwrap();
        }
        let alarms = cache.list_alarms().unwrap();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0].id, "a");
        assert_eq!(alarms[0].fire_at, at(2));

        assert_eq!(cache.clear_alarms().unwrap(), 2);
        assert_eq!(cache.clear_alarms().unwrap(), 0);
        assert!(cache.list_alarms().unwrap().is_empty());
    }

    #[test]
    fn test_prune_past_alarms() {
        let cache = LocalCache::open_in_memory().unwrap();
        let at = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2026, 2, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        for (id, fire_at) in [("past", at(9, 19)), ("soon", at(10, 12)), ("later", at(11, 7))] {
            cache
                .insert_alarm(&AlarmSpec {
                    id: id.to_string(),
                    meal_id: "1".to_string(),
                    title: "t".to_string(),
                    message: "m".to_string(),
                    fire_at,
                })
                .unwrap();
        }

        assert_eq!(cache.prune_alarms_before(at(10, 9)).unwrap(), 1);
        let ids: Vec<_> = cache.list_alarms().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["soon", "later"]);
        assert_eq!(cache.prune_alarms_before(at(10, 9)).unwrap(), 0);
        assert!(cache.list_alarms().unwrap().is_empty());
    }
}
