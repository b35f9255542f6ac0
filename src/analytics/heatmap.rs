use chrono::{Datelike, NaiveDate, TimeZone};
use std::collections::BTreeMap;

use super::Analytics;

impl<Tz: TimeZone> Analytics<'_, Tz> {
    /// Completed tasks per day within one calendar year
    pub fn activity_for_year(&self, year: i32) -> BTreeMap<NaiveDate, u32> {
        let mut activity = BTreeMap::new();
        for day in self.tasks().iter().filter_map(|t| self.completion_day(t)) {
            if day.year() == year {
                *activity.entry(day).or_insert(0) += 1;
            }
        }
        activity
    }
}

/// Heatmap intensity: 0 none, 1 one task, 2 two, 3 three or four, 4 five or more
pub fn activity_level(count: u32) -> u8 {
    match count {
        0 => 0,
        1 => 1,
        2 => 2,
        3..=4 => 3,
        _ => 4,
    }
}

/// Every date of a month, in order. Empty for an invalid month.
pub fn month_days(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| d.month() == month)
        .collect()
}
