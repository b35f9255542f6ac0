use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::HashSet;

use super::Analytics;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completed_today: usize,
    pub streak: u32,
    pub total_time_spent: u64,   // minutes
    pub average_time_per_task: f64, // minutes per completed task
}

impl<Tz: TimeZone> Analytics<'_, Tz> {
    pub fn summary(&self) -> TaskStats {
        let tasks = self.tasks();
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let completed_today = tasks
            .iter()
            .filter(|t| self.completion_day(t) == Some(self.anchor()))
            .count();
        let total_time_spent: u64 = tasks.iter().map(|t| u64::from(t.time_spent)).sum();
        let average_time_per_task = if completed > 0 {
            total_time_spent as f64 / completed as f64
        } else {
            0.0
        };

        TaskStats {
            total,
            completed,
            pending: total - completed,
            completed_today,
            streak: self.streak(),
            total_time_spent,
            average_time_per_task,
        }
    }

    /// Consecutive days with a completion, walking back from the anchor.
    ///
    /// An empty anchor day is skipped once; the first empty day before it ends the walk.
    pub fn streak(&self) -> u32 {
        let active: HashSet<NaiveDate> = self
            .tasks()
            .iter()
            .filter_map(|t| self.completion_day(t))
            .collect();

        let mut streak = 0;
        let mut day = self.anchor();
        loop {
            if active.contains(&day) {
                streak += 1;
            } else if day != self.anchor() {
                break;
            }
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }
        streak
    }
}
