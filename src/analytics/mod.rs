//! Pure statistics over a task snapshot.
//!
//! Every query is a function of `(tasks, anchor date, time zone, window)`.
//! Nothing is cached and the task list is never mutated. A timestamp "falls on"
//! a day when its local date in the configured time zone is that day, which is
//! the same as lying within `[start_of_day, end_of_day]`.

mod distribution;
mod heatmap;
mod series;
mod summary;
mod window;

pub use distribution::PriorityBreakdown;
pub use heatmap::{activity_level, month_days};
pub use series::{SeriesSummary, TimePoint, TrendPoint};
pub use summary::TaskStats;
pub use window::Window;

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Task;

pub struct Analytics<'a, Tz: TimeZone> {
    tasks: &'a [Task],
    anchor: NaiveDate,
    tz: Tz,
}

impl<'a> Analytics<'a, Local> {
    /// Anchor on today in the local time zone
    pub fn today(tasks: &'a [Task]) -> Self {
        Self::new(tasks, Local::now().date_naive(), Local)
    }
}

impl<'a, Tz: TimeZone> Analytics<'a, Tz> {
    pub fn new(tasks: &'a [Task], anchor: NaiveDate, tz: Tz) -> Self {
        Self { tasks, anchor, tz }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub(crate) fn tasks(&self) -> &'a [Task] {
        self.tasks
    }

    /// Local calendar day of a timestamp
    pub(crate) fn day_of(&self, ts: &DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    /// Day a task was completed, only for tasks currently marked completed
    pub(crate) fn completion_day(&self, task: &Task) -> Option<NaiveDate> {
        if !task.completed {
            return None;
        }
        task.completed_at.as_ref().map(|ts| self.day_of(ts))
    }

    /// `days` consecutive days ending on the anchor, oldest first
    pub(crate) fn window_days(&self, days: u32) -> Vec<NaiveDate> {
        (0..u64::from(days))
            .rev()
            .filter_map(|back| self.anchor.checked_sub_days(Days::new(back)))
            .collect()
    }

    /// Everything the dashboard shows, for one window
    pub fn report(&self, window: Window) -> Report {
        let time = self.time_series(window.days());
        Report {
            anchor: self.anchor,
            window,
            stats: self.summary(),
            pending_by_priority: self.pending_by_priority(),
            completed_by_priority: self.priority_by_window(),
            trend: self.completion_trend(window.days()),
            time_summary: SeriesSummary::from_points(&time),
            time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub anchor: NaiveDate,
    pub window: Window,
    pub stats: TaskStats,
    pub pending_by_priority: PriorityBreakdown,
    pub completed_by_priority: BTreeMap<Window, PriorityBreakdown>,
    pub trend: Vec<TrendPoint>,
    pub time: Vec<TimePoint>,
    pub time_summary: SeriesSummary,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::Priority;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;

    #[test]
    fn window_days_are_oldest_first() {
        let tasks = vec![];
        let analytics = Analytics::new(&tasks, anchor(), Utc);
        let days = analytics.window_days(3);
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2025, 7, 28).unwrap(),
                NaiveDate::from_ymd_opt(2025, 7, 29).unwrap(),
                anchor(),
            ]
        );
        assert!(analytics.window_days(0).is_empty());
    }

    #[test]
    fn day_bounds_follow_time_zone() {
        // 23:30 UTC on the 29th is already the 30th at UTC+2
        let mut task = done("1", Priority::Low, 0);
        task.completed_at = Some(Utc.with_ymd_and_hms(2025, 7, 29, 23, 30, 0).unwrap());
        let tasks = vec![task];

        let utc = Analytics::new(&tasks, anchor(), Utc);
        assert_eq!(utc.summary().completed_today, 0);

        let east = Analytics::new(&tasks, anchor(), FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(east.summary().completed_today, 1);
    }

    #[test]
    fn report_uses_requested_window() {
        let tasks = crate::sample::sample_tasks();
        let report = Analytics::new(&tasks, anchor(), Utc).report(Window::Week);
        assert_eq!(report.trend.len(), 7);
        assert_eq!(report.time.len(), 7);
        assert_eq!(report.completed_by_priority.len(), 4);
        assert_eq!(report.stats.total, 6);
    }
}
