use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Sort weight: high 3, medium 2, low 1
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(format!("Unknown priority '{}' (expected low, medium or high)", other)),
        }
    }
}

/// A single timed-work interval on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration: u32, // minutes
    pub completed: bool,
}

impl Session {
    /// Session ids are unique within a task: `{task_id}-{start millis}`
    pub fn make_id(task_id: &str, start_time: DateTime<Utc>) -> String {
        format!("{}-{}", task_id, start_time.timestamp_millis())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub time_spent: u32, // minutes
    #[serde(default)]
    pub pomodoro_sessions: Vec<Session>,
}

impl Task {
    pub fn new(text: String, priority: Priority, category: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            text,
            completed: false,
            priority,
            created_at: now,
            completed_at: None,
            category,
            time_spent: 0,
            pomodoro_sessions: Vec::new(),
        }
    }
}

/// Partial update for `TaskStore::update`. `None` leaves a field untouched.
///
/// Completion only changes through toggle, which keeps `completed_at` in step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the category
    pub category: Option<Option<String>>,
    /// Explicit reset of accumulated minutes
    pub time_spent: Option<u32>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.priority.is_none() && self.category.is_none() && self.time_spent.is_none()
    }
}

/// Order tasks for display: incomplete first, then by priority weight descending.
/// The sort is stable so newest-first order is kept within a group.
pub fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| b.priority.weight().cmp(&a.priority.weight()))
    });
}
