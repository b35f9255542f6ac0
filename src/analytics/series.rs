use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::HashMap;

use super::Analytics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub date: NaiveDate,
    pub total_minutes: u64,
}

impl<Tz: TimeZone> Analytics<'_, Tz> {
    /// Completions per day for the `window_days` days ending on the anchor.
    /// Always exactly `window_days` points, oldest first.
    pub fn completion_trend(&self, window_days: u32) -> Vec<TrendPoint> {
        let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();
        for day in self.tasks().iter().filter_map(|t| self.completion_day(t)) {
            *per_day.entry(day).or_default() += 1;
        }

        self.window_days(window_days)
            .into_iter()
            .map(|date| TrendPoint {
                completed: per_day.get(&date).copied().unwrap_or(0),
                date,
            })
            .collect()
    }

    /// Minutes per day: a task's whole `time_spent` lands on its completion day,
    /// and every session's duration lands on the day it started. A task completed
    /// today with sessions yesterday therefore shows up on both days.
    pub fn time_series(&self, window_days: u32) -> Vec<TimePoint> {
        let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
        for task in self.tasks() {
            if let Some(day) = self.completion_day(task) {
                *per_day.entry(day).or_default() += u64::from(task.time_spent);
            }
            for session in &task.pomodoro_sessions {
                *per_day.entry(self.day_of(&session.start_time)).or_default() += u64::from(session.duration);
            }
        }

        self.window_days(window_days)
            .into_iter()
            .map(|date| TimePoint {
                total_minutes: per_day.get(&date).copied().unwrap_or(0),
                date,
            })
            .collect()
    }
}

/// Display aggregates over a time series
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSummary {
    pub total: u64,
    pub average: f64,
    pub max: u64,
    /// Average of the first `i + 1` days, for each day `i`
    pub cumulative_average: Vec<f64>,
}

impl SeriesSummary {
    pub fn from_points(points: &[TimePoint]) -> Self {
        let total: u64 = points.iter().map(|p| p.total_minutes).sum();
        let average = if points.is_empty() {
            0.0
        } else {
            total as f64 / points.len() as f64
        };
        let max = points.iter().map(|p| p.total_minutes).max().unwrap_or(0);

        let mut running = 0u64;
        let cumulative_average = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                running += p.total_minutes;
                running as f64 / (i + 1) as f64
            })
            .collect();

        Self { total, average, max, cumulative_average }
    }
}
