//! Demonstration data shown on first launch and by `taskdash sample`.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{Priority, Session, Task};

fn at(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2025, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

fn session(id: &str, start: DateTime<Utc>, minutes: u32, completed: bool) -> Session {
    Session {
        id: id.to_string(),
        start_time: start,
        end_time: Some(start + Duration::minutes(i64::from(minutes))),
        duration: minutes,
        completed,
    }
}

fn task(
    id: &str,
    text: &str,
    priority: Priority,
    category: &str,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    sessions: Vec<Session>,
) -> Task {
    Task {
        id: id.to_string(),
        text: text.to_string(),
        completed: completed_at.is_some(),
        priority,
        created_at,
        completed_at,
        category: Some(category.to_string()),
        time_spent: sessions.iter().map(|s| s.duration).sum(),
        pomodoro_sessions: sessions,
    }
}

/// Six tasks spread over the last week of July 2025
pub fn sample_tasks() -> Vec<Task> {
    vec![
        task(
            "1",
            "Complete project proposal",
            Priority::High,
            "Work",
            at(7, 26, 9, 0),
            Some(at(7, 26, 15, 30)),
            vec![
                session("1-1", at(7, 26, 9, 0), 25, true),
                session("1-2", at(7, 26, 9, 30), 25, true),
                session("1-3", at(7, 26, 14, 0), 25, true),
            ],
        ),
        task(
            "2",
            "Review team feedback",
            Priority::Medium,
            "Work",
            at(7, 27, 10, 0),
            Some(at(7, 27, 16, 0)),
            vec![
                session("2-1", at(7, 27, 14, 0), 25, true),
                session("2-2", at(7, 27, 15, 0), 25, true),
            ],
        ),
        task("3", "Buy groceries", Priority::Low, "Personal", at(7, 29, 8, 0), None, vec![]),
        task(
            "4",
            "Schedule dentist appointment",
            Priority::Medium,
            "Health",
            at(7, 28, 9, 0),
            None,
            vec![
                session("4-1", at(7, 28, 9, 0), 25, true),
                session("4-2", at(7, 28, 10, 0), 15, false),
            ],
        ),
        task(
            "5",
            "Finish quarterly report",
            Priority::High,
            "Work",
            at(7, 29, 7, 0),
            None,
            vec![session("5-1", at(7, 29, 7, 0), 25, true)],
        ),
        task(
            "6",
            "Prepare presentation slides",
            Priority::High,
            "Work",
            at(7, 29, 8, 0),
            Some(at(7, 30, 17, 0)),
            vec![
                session("6-1", at(7, 30, 8, 0), 25, true),
                session("6-2", at(7, 30, 9, 0), 25, true),
                session("6-3", at(7, 30, 10, 0), 25, true),
            ],
        ),
    ]
}
