use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Days, Local, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::LocalCache;
use crate::models::Meal;
use crate::notify::{Notice, Notifier};
use crate::platform::{BrowserNotifications, Permission, Platform};

const LAST_SCHEDULED_KEY: &str = "reminders.last_scheduled";

/// How far ahead to schedule and how long a full schedule stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub look_ahead_days: u32,
    pub throttle: TimeDelta,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            look_ahead_days: 7,
            throttle: TimeDelta::hours(23),
        }
    }
}

/// One alarm occurrence. `fire_at` is device-local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmSpec {
    pub id: String,
    pub meal_id: String,
    pub title: String,
    pub message: String,
    pub fire_at: NaiveDateTime,
}

impl AlarmSpec {
    pub const LOCAL_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// `YYYY-MM-DD HH:MM:SS` without any offset; alarm services read it as local time.
    #[must_use]
    pub fn fire_at_local(&self) -> String {
        self.fire_at.format(Self::LOCAL_FORMAT).to_string()
    }

    #[must_use]
    pub fn parse_local(s: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, Self::LOCAL_FORMAT).ok()
    }
}

/// Outcome of one full reschedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    pub platform: &'static str,
    pub planned: usize,
    pub scheduled: usize,
    pub failed: usize,
    /// Meals left out because their time did not parse.
    pub skipped_meals: usize,
}

/// Expand meals into alarms for `days` days starting at `now`'s date.
/// Today's occurrence is dropped once its time has passed.
#[must_use]
pub fn plan_reminders(meals: &[Meal], now: NaiveDateTime, days: u32) -> Vec<AlarmSpec> {
    let today = now.date();
    let mut alarms = Vec::new();

    for meal in meals {
        let Some((hour, minute)) = meal.time_of_day() else {
            tracing::warn!(meal_id = %meal.id, time = %meal.time, "meal time does not parse, no reminders");
            continue;
        };
        for offset in 0..days {
            let Some(day) = today.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };
            let Some(fire_at) = day.and_hms_opt(hour, minute, 0) else {
                continue;
            };
            if offset == 0 && fire_at <= now {
                continue;
            }
            alarms.push(AlarmSpec {
                id: format!("meal-{}-{}", meal.id, day.format("%Y%m%d")),
                meal_id: meal.id.clone(),
                title: format!("Time for {}! 🍽️", meal.name),
                message: format!("Eat on time at {}. Keep bulking!", meal.time),
                fire_at,
            });
        }
    }

    alarms.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.id.cmp(&b.id)));
    alarms
}

/// Keeps the platform's alarm set in line with the meal schedule.
pub struct ReminderScheduler {
    platform: Platform,
    cache: Arc<LocalCache>,
    notifier: Arc<dyn Notifier>,
    policy: ReminderPolicy,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl ReminderScheduler {
    pub fn new(
        platform: Platform,
        cache: Arc<LocalCache>,
        notifier: Arc<dyn Notifier>,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            platform,
            cache,
            notifier,
            policy,
            timers: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> ReminderPolicy {
        self.policy
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn last_scheduled(&self) -> Result<Option<DateTime<Utc>>> {
        self.cache.get_timestamp(LAST_SCHEDULED_KEY)
    }

    /// Cancel everything and schedule from scratch.
    pub fn sync_meal_reminders(&self, meals: &[Meal]) -> ScheduleReport {
        self.sync_meal_reminders_at(meals, Local::now())
    }

    pub fn sync_meal_reminders_at(&self, meals: &[Meal], now: DateTime<Local>) -> ScheduleReport {
        let mut report = ScheduleReport {
            platform: self.platform.name(),
            ..ScheduleReport::default()
        };
        report.skipped_meals = meals.iter().filter(|m| m.time_of_day().is_none()).count();

        match &self.platform {
            Platform::Unavailable => {
                tracing::debug!("no notification capability, skipping reminder schedule");
                return report;
            }
            Platform::Browser(browser) if browser.permission() != Permission::Granted => {
                tracing::debug!("notification permission not granted, skipping reminder schedule");
                return report;
            }
            _ => {}
        }

        self.cancel_all();

        let alarms = plan_reminders(meals, now.naive_local(), self.policy.look_ahead_days);
        report.planned = alarms.len();

        match &self.platform {
            Platform::Native(bridge) => {
                for alarm in &alarms {
                    match bridge.create_alarm(alarm) {
                        Ok(()) => report.scheduled += 1,
                        Err(e) => {
                            report.failed += 1;
                            tracing::warn!(alarm_id = %alarm.id, error = %e, "failed to create alarm");
                        }
                    }
                }
            }
            Platform::Browser(browser) => {
                report.scheduled = self.arm_timers(browser, alarms, now);
                report.failed = report.planned - report.scheduled;
            }
            Platform::Unavailable => {}
        }

        if report.failed > 0 {
            self.notifier.notify(Notice::error(format!(
                "{} of {} meal reminders could not be scheduled",
                report.failed, report.planned
            )));
        }
        if let Err(e) = self
            .cache
            .set_timestamp(LAST_SCHEDULED_KEY, now.with_timezone(&Utc))
        {
            tracing::warn!(error = %e, "failed to record reminder schedule time");
        }

        tracing::info!(
            platform = report.platform,
            planned = report.planned,
            scheduled = report.scheduled,
            failed = report.failed,
            "meal reminders scheduled"
        );
        report
    }

    /// Reschedule only when the last full schedule is older than the
    /// throttle. Returns `None` when skipped.
    pub fn schedule_if_needed(&self, meals: &[Meal]) -> Option<ScheduleReport> {
        self.schedule_if_needed_at(meals, Local::now())
    }

    pub fn schedule_if_needed_at(
        &self,
        meals: &[Meal],
        now: DateTime<Local>,
    ) -> Option<ScheduleReport> {
        let last = match self.last_scheduled() {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable reminder schedule time, rescheduling");
                None
            }
        };
        if let Some(last) = last {
            let elapsed = now.with_timezone(&Utc) - last;
            if elapsed >= TimeDelta::zero() && elapsed < self.policy.throttle {
                tracing::debug!(elapsed_mins = elapsed.num_minutes(), "reminders still fresh");
                return None;
            }
        }
        Some(self.sync_meal_reminders_at(meals, now))
    }

    /// Drop every scheduled reminder. Safe to call with nothing pending.
    pub fn cancel_all(&self) {
        let timers = std::mem::take(
            &mut *self.timers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for timer in timers {
            timer.abort();
        }

        if let Platform::Native(bridge) = &self.platform {
            if let Err(e) = bridge.cancel_all_alarms() {
                tracing::warn!(error = %e, "failed to cancel alarms");
                self.notifier
                    .notify(Notice::error("Could not clear old meal reminders"));
            }
        }
    }

    /// Number of in-process timers still waiting to fire.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    fn arm_timers(
        &self,
        browser: &Arc<dyn BrowserNotifications>,
        alarms: Vec<AlarmSpec>,
        now: DateTime<Local>,
    ) -> usize {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, browser reminders not armed");
            return 0;
        };

        let now = now.naive_local();
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        for alarm in alarms {
            let delay = (alarm.fire_at - now).to_std().unwrap_or_default();
            let browser = Arc::clone(browser);
            timers.push(handle.spawn(async move {
                tokio::time::sleep(delay).await;
                if browser.permission() != Permission::Granted {
                    return;
                }
                if let Err(e) = browser.show(&alarm.title, &alarm.message) {
                    tracing::warn!(alarm_id = %alarm.id, error = %e, "failed to show reminder");
                }
            }));
        }
        timers.len()
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        for timer in self
            .timers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_meals;
    use crate::testing::{FakeBrowser, RecordingBridge, RecordingNotifier};
    use chrono::{NaiveDate, TimeZone};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn local(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.from_local_datetime(&at(d, h, m)).earliest().unwrap()
    }

    fn scheduler(platform: Platform) -> (ReminderScheduler, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let cache = Arc::new(LocalCache::open_in_memory().unwrap());
        let scheduler = ReminderScheduler::new(
            platform,
            cache,
            notifier.clone(),
            ReminderPolicy::default(),
        );
        (scheduler, notifier)
    }

    #[test]
    fn test_past_time_today_is_skipped() {
        let meals = vec![Meal::new("Sarapan", "07:00")];
        let alarms = plan_reminders(&meals, at(10, 8, 0), 7);
        assert_eq!(alarms.len(), 6);
        assert_eq!(alarms[0].fire_at, at(11, 7, 0));
        assert_eq!(alarms[0].fire_at_local(), "2026-02-11 07:00:00");
    }

    #[test]
    fn test_future_time_today_is_kept() {
        let meals = vec![Meal::new("Makan Malam", "19:00")];
        let alarms = plan_reminders(&meals, at(10, 8, 0), 7);
        assert_eq!(alarms.len(), 7);
        assert_eq!(alarms[0].fire_at, at(10, 19, 0));
        assert_eq!(alarms[6].fire_at, at(16, 19, 0));
    }

    #[test]
    fn test_exact_now_counts_as_elapsed() {
        let meals = vec![Meal::new("Sarapan", "07:00")];
        let alarms = plan_reminders(&meals, at(10, 7, 0), 1);
        assert!(alarms.is_empty());
    }

    #[test]
    fn test_alarm_content() {
        let meal = Meal::new("Snack Sore", "16:00");
        let alarms = plan_reminders(std::slice::from_ref(&meal), at(10, 8, 0), 1);
        assert_eq!(alarms.len(), 1);
        let alarm = &alarms[0];
        assert_eq!(alarm.meal_id, meal.id);
        assert!(alarm.title.contains("Snack Sore"));
        assert!(alarm.message.contains("16:00"));
        assert_eq!(alarm.id, format!("meal-{}-20260210", meal.id));
    }

    #[test]
    fn test_bad_meal_time_skips_only_that_meal() {
        let meals = vec![Meal::new("Broken", "later"), Meal::new("Sarapan", "07:00")];
        let alarms = plan_reminders(&meals, at(10, 6, 0), 2);
        assert_eq!(alarms.len(), 2);
        assert!(alarms.iter().all(|a| a.meal_id == meals[1].id));
    }

    #[test]
    fn test_plan_sorted_by_fire_time() {
        let alarms = plan_reminders(&default_meals(), at(10, 6, 0), 3);
        assert_eq!(alarms.len(), 12);
        assert!(alarms.windows(2).all(|w| w[0].fire_at <= w[1].fire_at));
    }

    #[test]
    fn test_parse_local_roundtrip() {
        assert_eq!(
            AlarmSpec::parse_local("2026-02-11 07:00:00"),
            Some(at(11, 7, 0))
        );
        assert!(AlarmSpec::parse_local("2026-02-11T07:00:00Z").is_none());
    }

    #[test]
    fn test_native_sync_cancels_then_creates() {
        let bridge = Arc::new(RecordingBridge::default());
        let (scheduler, notifier) = scheduler(Platform::Native(bridge.clone()));

        let report = scheduler.sync_meal_reminders_at(&default_meals(), local(10, 6, 0));
        assert_eq!(report.planned, 28);
        assert_eq!(report.scheduled, 28);
        assert_eq!(report.failed, 0);
        assert_eq!(bridge.cancel_calls(), 1);
        assert_eq!(bridge.alarms().len(), 28);
        assert!(notifier.notices().is_empty());

        scheduler.sync_meal_reminders_at(&default_meals(), local(10, 6, 0));
        assert_eq!(bridge.cancel_calls(), 2);
        assert_eq!(bridge.alarms().len(), 28);
    }

    #[test]
    fn test_one_failing_alarm_does_not_stop_the_rest() {
        let bridge = Arc::new(RecordingBridge::default());
        bridge.fail_alarm("meal-1-20260211");
        let (scheduler, notifier) = scheduler(Platform::Native(bridge.clone()));

        let report = scheduler.sync_meal_reminders_at(&default_meals(), local(10, 6, 0));
        assert_eq!(report.failed, 1);
        assert_eq!(report.scheduled, 27);
        assert_eq!(bridge.alarms().len(), 27);
        assert_eq!(notifier.errors().len(), 1);
    }

    #[test]
    fn test_cancel_failure_is_reported_and_scheduling_continues() {
        let bridge = Arc::new(RecordingBridge::default());
        bridge.fail_cancel(true);
        let (scheduler, notifier) = scheduler(Platform::Native(bridge.clone()));

        let report = scheduler.sync_meal_reminders_at(&default_meals(), local(10, 6, 0));
        assert_eq!(report.scheduled, 28);
        assert_eq!(notifier.errors().len(), 1);
    }

    #[test]
    fn test_unavailable_is_a_noop() {
        let (scheduler, notifier) = scheduler(Platform::Unavailable);
        let report = scheduler.sync_meal_reminders_at(&default_meals(), local(10, 6, 0));
        assert_eq!(report.platform, "unavailable");
        assert_eq!(report.planned, 0);
        assert!(notifier.notices().is_empty());
        assert!(scheduler.last_scheduled().unwrap().is_none());
        scheduler.cancel_all();
    }

    #[test]
    fn test_throttle_skips_recent_schedule() {
        let bridge = Arc::new(RecordingBridge::default());
        let (scheduler, _) = scheduler(Platform::Native(bridge.clone()));
        let meals = default_meals();

        assert!(scheduler.schedule_if_needed_at(&meals, local(10, 6, 0)).is_some());
        assert!(scheduler.schedule_if_needed_at(&meals, local(10, 20, 0)).is_none());
        assert!(scheduler.schedule_if_needed_at(&meals, local(11, 4, 59)).is_none());
        assert_eq!(bridge.cancel_calls(), 1);

        assert!(scheduler.schedule_if_needed_at(&meals, local(11, 5, 0)).is_some());
        assert_eq!(bridge.cancel_calls(), 2);
    }

    #[test]
    fn test_explicit_sync_bypasses_throttle() {
        let bridge = Arc::new(RecordingBridge::default());
        let (scheduler, _) = scheduler(Platform::Native(bridge.clone()));
        let meals = default_meals();

        scheduler.schedule_if_needed_at(&meals, local(10, 6, 0));
        scheduler.sync_meal_reminders_at(&meals, local(10, 6, 5));
        assert_eq!(bridge.cancel_calls(), 2);
    }

    #[test]
    fn test_browser_without_permission_schedules_nothing() {
        let browser = Arc::new(FakeBrowser::new(Permission::Default));
        let (scheduler, _) = scheduler(Platform::Browser(browser.clone()));
        let report = scheduler.sync_meal_reminders_at(&default_meals(), local(10, 6, 0));
        assert_eq!(report.scheduled, 0);
        assert!(scheduler.last_scheduled().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_timers_cancel() {
        let browser = Arc::new(FakeBrowser::new(Permission::Granted));
        let (scheduler, _) = scheduler(Platform::Browser(browser.clone()));

        let meals = vec![Meal::new("Sarapan", "07:00")];
        let report = scheduler.sync_meal_reminders_at(&meals, local(10, 6, 0));
        assert_eq!(report.planned, 7);
        assert_eq!(report.scheduled, 7);
        assert_eq!(scheduler.pending_timers(), 7);

        scheduler.cancel_all();
        assert_eq!(scheduler.pending_timers(), 0);
        tokio::time::sleep(std::time::Duration::from_secs(2 * 3600)).await;
        assert!(browser.shown().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_timer_shows_notification() {
        let browser = Arc::new(FakeBrowser::new(Permission::Granted));
        let (scheduler, _) = scheduler(Platform::Browser(browser.clone()));

        let now = local(10, 6, 0);
        let meals = vec![Meal::new("Sarapan", "07:00")];
        scheduler.sync_meal_reminders_at(&meals, now);

        tokio::time::sleep(std::time::Duration::from_secs(3601)).await;
        let shown = browser.shown();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].0.contains("Sarapan"));
    }
}
