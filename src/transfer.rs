//! Backup files: `{ "todos": [...], "exportedAt": "..." }` as indented JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use crate::models::Task;
use crate::persistence::{DecodeMode, decode_task};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid file format: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Not a valid backup file: {0}")]
    MalformedImport(String),
    #[error("Failed to read backup file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Backup<'a> {
    todos: &'a [Task],
    exported_at: DateTime<Utc>,
}

/// Default file name for a backup taken on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("todo-backup-{}.json", date.format("%Y-%m-%d"))
}

pub fn export_json(tasks: &[Task], now: DateTime<Utc>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Backup { todos: tasks, exported_at: now })
}

/// Parse and validate a backup. Nothing is applied unless every record is valid.
pub fn import_json(contents: &str) -> Result<Vec<Task>, ImportError> {
    let data: Value = serde_json::from_str(contents)?;
    let records = match data.get("todos") {
        Some(Value::Array(records)) => records,
        Some(_) => return Err(ImportError::MalformedImport("`todos` is not a list".to_string())),
        None => return Err(ImportError::MalformedImport("missing `todos`".to_string())),
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            decode_task(record.clone(), DecodeMode::Strict)
                .map_err(|err| ImportError::MalformedImport(format!("task #{}: {}", index + 1, err)))
        })
        .collect()
}

pub fn import_file(path: &Path) -> Result<Vec<Task>, ImportError> {
    let contents = std::fs::read_to_string(path)?;
    import_json(&contents)
}
