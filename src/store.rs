use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Priority, Session, Task, TaskUpdate};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Task text cannot be empty")]
    EmptyText,
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Task id prefix '{0}' matches more than one task")]
    AmbiguousId(String),
}

/// In-memory task collection, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Resolve an exact id, or a unique id prefix
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&Task, StoreError> {
        if let Some(task) = self.get(prefix) {
            return Ok(task);
        }
        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousId(prefix.to_string())),
            _ => Err(StoreError::NotFound(prefix.to_string())),
        }
    }

    /// Create a task and prepend it
    pub fn add(
        &mut self,
        text: &str,
        priority: Priority,
        category: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&Task, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }
        // Blank categories are treated as none
        let category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let task = Task::new(text.to_string(), priority, category, now);
        tracing::debug!(id = %task.id, "adding task");
        self.tasks.insert(0, task);
        Ok(&self.tasks[0])
    }

    /// Flip completion; `completed_at` is set to `now` or cleared
    pub fn toggle(&mut self, id: &str, now: DateTime<Utc>) -> Option<&Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        task.completed_at = if task.completed { Some(now) } else { None };
        Some(&*task)
    }

    /// Shallow merge of the fields present in `update`
    pub fn update(&mut self, id: &str, update: TaskUpdate) -> Result<&Task, StoreError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(text) = update.text {
            let text = text.trim();
            if text.is_empty() {
                return Err(StoreError::EmptyText);
            }
            task.text = text.to_string();
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(category) = update.category {
            task.category = category.filter(|c| !c.trim().is_empty());
        }
        if let Some(minutes) = update.time_spent {
            task.time_spent = minutes;
        }
        Ok(&*task)
    }

    /// Remove a task. Returns false when it was not there.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Append a closed session and add its minutes to `time_spent`, in one step
    pub fn record_session(&mut self, id: &str, session: Session) -> Result<&Task, StoreError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        task.time_spent = task.time_spent.saturating_add(session.duration);
        task.pomodoro_sessions.push(session);
        Ok(&*task)
    }
}
