use chrono::{Days, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{Analytics, Window};
use crate::models::Priority;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityBreakdown {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl PriorityBreakdown {
    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Medium => self.medium += 1,
            Priority::High => self.high += 1,
        }
    }

    pub fn get(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }

    pub fn total(&self) -> u32 {
        self.low + self.medium + self.high
    }
}

impl<Tz: TimeZone> Analytics<'_, Tz> {
    /// Incomplete tasks by priority, regardless of dates
    pub fn pending_by_priority(&self) -> PriorityBreakdown {
        let mut breakdown = PriorityBreakdown::default();
        for task in self.tasks().iter().filter(|t| !t.completed) {
            breakdown.bump(task.priority);
        }
        breakdown
    }

    /// Completed tasks by priority whose completion day lies in
    /// `[anchor - window_days, anchor]`
    pub fn completed_by_priority(&self, window_days: u32) -> PriorityBreakdown {
        let anchor = self.anchor();
        let start = anchor
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(chrono::NaiveDate::MIN);

        let mut breakdown = PriorityBreakdown::default();
        for task in self.tasks() {
            if let Some(day) = self.completion_day(task) {
                if day >= start && day <= anchor {
                    breakdown.bump(task.priority);
                }
            }
        }
        breakdown
    }

    /// Completed-task breakdown for each fixed window, keyed by window
    pub fn priority_by_window(&self) -> BTreeMap<Window, PriorityBreakdown> {
        Window::ALL
            .iter()
            .map(|w| (*w, self.completed_by_priority(w.days())))
            .collect()
    }
}
