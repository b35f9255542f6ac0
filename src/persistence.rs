//! Persistence bridge: an opaque key-value store plus the typed records kept in it.
//!
//! Three kinds of records live in the store: the task list, the settings, and one
//! active-session marker per running timer. Everything read back passes through a
//! validating decode before it becomes a [`Task`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::models::{Priority, Session, Task};
use crate::sample;

pub const DATA_KEY: &str = "todo-dashboard-data";
pub const SETTINGS_KEY: &str = "todo-dashboard-settings";
pub const TIMER_KEY_PREFIX: &str = "todo-dashboard-timer:";

/// Key of the active-session marker for one task
pub fn timer_key(task_id: &str) -> String {
    format!("{}{}", TIMER_KEY_PREFIX, task_id)
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Failed to encode or decode record: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<DatabaseError> for StorageError {
    fn from(err: DatabaseError) -> Self {
        StorageError::StorageUnavailable(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("Invalid date in field '{field}': {value:?}")]
    InvalidDateInRecord { field: &'static str, value: String },
    #[error("Malformed record: {0}")]
    Shape(String),
}

/// Minimal string key-value interface, in the manner of browser local storage
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).keys_with_prefix(prefix)
    }
}

/// Volatile store used by tests and `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .items
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Record decoding
// ---------------------------------------------------------------------------

/// How strictly to treat bad timestamps inside an otherwise well-formed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Persisted data: drop the bad field or session, keep the task
    Lenient,
    /// Imported data: any bad field rejects the record
    Strict,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    id: String,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    completed: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    id: String,
    text: String,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    priority: Option<Priority>,
    created_at: String,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    time_spent: Option<f64>,
    #[serde(default)]
    pomodoro_sessions: Option<Vec<Value>>,
}

fn minutes(value: Option<f64>) -> u32 {
    // Stored minutes are whole numbers; tolerate floats from hand-edited files
    value
        .filter(|m| m.is_finite() && *m > 0.0)
        .map(|m| m.round().min(u32::MAX as f64) as u32)
        .unwrap_or(0)
}

fn required_date(field: &'static str, value: &str) -> Result<DateTime<Utc>, RecordError> {
    parse_timestamp(value).ok_or_else(|| RecordError::InvalidDateInRecord {
        field,
        value: value.to_string(),
    })
}

fn optional_date(
    field: &'static str,
    value: Option<&str>,
    mode: DecodeMode,
    record_id: &str,
) -> Result<Option<DateTime<Utc>>, RecordError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match required_date(field, value) {
        Ok(ts) => Ok(Some(ts)),
        Err(err) if mode == DecodeMode::Lenient => {
            tracing::warn!(record = record_id, %err, "dropping unparseable timestamp");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn decode_session(value: Value, mode: DecodeMode) -> Result<Session, RecordError> {
    let raw: RawSession =
        serde_json::from_value(value).map_err(|e| RecordError::Shape(e.to_string()))?;
    let start_time = required_date("startTime", &raw.start_time)?;
    let end_time = optional_date("endTime", raw.end_time.as_deref(), mode, &raw.id)?;
    Ok(Session {
        id: raw.id,
        start_time,
        end_time,
        duration: minutes(raw.duration),
        completed: raw.completed.unwrap_or(false),
    })
}

/// Validate one task record and turn it into a [`Task`]
pub fn decode_task(value: Value, mode: DecodeMode) -> Result<Task, RecordError> {
    let raw: RawTask =
        serde_json::from_value(value).map_err(|e| RecordError::Shape(e.to_string()))?;

    if mode == DecodeMode::Strict && raw.text.trim().is_empty() {
        return Err(RecordError::Shape(format!("task {} has empty text", raw.id)));
    }

    let created_at = required_date("createdAt", &raw.created_at)?;
    let completed_at = optional_date("completedAt", raw.completed_at.as_deref(), mode, &raw.id)?;
    // completedAt is present iff completed
    let (completed, completed_at) = match (raw.completed.unwrap_or(false), completed_at) {
        (true, Some(ts)) => (true, Some(ts)),
        (true, None) if mode == DecodeMode::Strict => {
            return Err(RecordError::Shape(format!("completed task {} has no completedAt", raw.id)));
        }
        (true, None) => {
            tracing::warn!(task = %raw.id, "completed task has no completion time, marking it pending");
            (false, None)
        }
        (false, _) => (false, None),
    };

    let mut sessions = Vec::new();
    for value in raw.pomodoro_sessions.unwrap_or_default() {
        match decode_session(value, mode) {
            Ok(session) => sessions.push(session),
            Err(err) if mode == DecodeMode::Lenient => {
                tracing::warn!(task = %raw.id, %err, "skipping malformed session");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Task {
        id: raw.id,
        text: raw.text,
        completed,
        priority: raw.priority.unwrap_or_default(),
        created_at,
        completed_at,
        category: raw.category,
        time_spent: minutes(raw.time_spent),
        pomodoro_sessions: sessions,
    })
}

// ---------------------------------------------------------------------------
// Task list
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredTasks<'a> {
    tasks: &'a [Task],
    last_updated: DateTime<Utc>,
}

/// Decode the persisted task envelope. Bad records are skipped, not fatal.
pub fn decode_task_list(raw: &str) -> Result<Vec<Task>, RecordError> {
    let envelope: Value = serde_json::from_str(raw).map_err(|e| RecordError::Shape(e.to_string()))?;
    // Older saves used `todos`, like the export format
    let records = envelope
        .get("tasks")
        .or_else(|| envelope.get("todos"))
        .and_then(Value::as_array)
        .ok_or_else(|| RecordError::Shape("expected a `tasks` array".to_string()))?;

    let mut tasks = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match decode_task(record.clone(), DecodeMode::Lenient) {
            Ok(task) => tasks.push(task),
            Err(err) => tracing::warn!(index, %err, "skipping unreadable task record"),
        }
    }
    Ok(tasks)
}

/// Load the task list, falling back to sample data when nothing usable is stored
pub fn load_tasks(store: &dyn KeyValueStore) -> Vec<Task> {
    match store.get_item(DATA_KEY) {
        Ok(Some(raw)) => match decode_task_list(&raw) {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::error!(%err, "stored task data is unreadable, using sample data");
                sample::sample_tasks()
            }
        },
        Ok(None) => {
            tracing::info!("no stored tasks, starting from sample data");
            sample::sample_tasks()
        }
        Err(err) => {
            tracing::error!(%err, "failed to read tasks, using sample data");
            sample::sample_tasks()
        }
    }
}

pub fn save_tasks(store: &dyn KeyValueStore, tasks: &[Task], now: DateTime<Utc>) -> Result<(), StorageError> {
    let json = serde_json::to_string(&StoredTasks { tasks, last_updated: now })?;
    store.set_item(DATA_KEY, &json)
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    pub dark_mode: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    #[serde(default)]
    dark_mode: Option<bool>,
    #[serde(default)]
    last_updated: Option<String>,
}

impl Settings {
    /// Settings used when nothing is stored: follow the terminal's colour scheme
    pub fn system_default() -> Self {
        let colorfgbg = std::env::var("COLORFGBG").ok();
        Self { dark_mode: prefers_dark(colorfgbg.as_deref()) }
    }
}

/// Interpret `COLORFGBG` (`"fg;bg"` or `"fg;default;bg"`): dark backgrounds are 0-6 and 8
pub fn prefers_dark(colorfgbg: Option<&str>) -> bool {
    colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .is_some_and(|bg| bg <= 6 || bg == 8)
}

pub fn load_settings(store: &dyn KeyValueStore) -> Settings {
    let raw = match store.get_item(SETTINGS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Settings::system_default(),
        Err(err) => {
            tracing::error!(%err, "failed to read settings");
            return Settings::system_default();
        }
    };
    match serde_json::from_str::<StoredSettings>(&raw) {
        Ok(stored) => Settings { dark_mode: stored.dark_mode.unwrap_or(false) },
        Err(err) => {
            tracing::error!(%err, "stored settings are unreadable");
            Settings::system_default()
        }
    }
}

pub fn save_settings(store: &dyn KeyValueStore, settings: Settings, now: DateTime<Utc>) -> Result<(), StorageError> {
    let json = serde_json::to_string(&StoredSettings {
        dark_mode: Some(settings.dark_mode),
        last_updated: Some(now.to_rfc3339()),
    })?;
    store.set_item(SETTINGS_KEY, &json)
}

/// Remove the task list and settings (timer markers are left to their trackers)
pub fn clear_all(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    store.remove_item(DATA_KEY)?;
    store.remove_item(SETTINGS_KEY)
}

// ---------------------------------------------------------------------------
// Active-session markers
// ---------------------------------------------------------------------------

/// Written when a timer starts, removed when it stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMarker {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub running: bool,
}

pub fn read_marker(store: &dyn KeyValueStore, task_id: &str) -> Result<Option<ActiveMarker>, StorageError> {
    match store.get_item(&timer_key(task_id))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn write_marker(store: &dyn KeyValueStore, task_id: &str, marker: &ActiveMarker) -> Result<(), StorageError> {
    store.set_item(&timer_key(task_id), &serde_json::to_string(marker)?)
}

pub fn clear_marker(store: &dyn KeyValueStore, task_id: &str) -> Result<(), StorageError> {
    store.remove_item(&timer_key(task_id))
}

/// Ids of tasks that currently have a persisted active session
pub fn active_marker_ids(store: &dyn KeyValueStore) -> Result<Vec<String>, StorageError> {
    Ok(store
        .keys_with_prefix(TIMER_KEY_PREFIX)?
        .into_iter()
        .filter_map(|key| key.strip_prefix(TIMER_KEY_PREFIX).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Store whose every call fails, as when local storage is disabled
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get_item(&self, _: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::StorageUnavailable("quota exceeded".into()))
        }
        fn set_item(&self, _: &str, _: &str) -> Result<(), StorageError> {
            Err(StorageError::StorageUnavailable("quota exceeded".into()))
        }
        fn remove_item(&self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::StorageUnavailable("quota exceeded".into()))
        }
        fn keys_with_prefix(&self, _: &str) -> Result<Vec<String>, StorageError> {
            Err(StorageError::StorageUnavailable("quota exceeded".into()))
        }
    }

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 30, h, 0, 0).unwrap()
    }

    #[test]
    fn parses_js_and_naive_timestamps() {
        assert_eq!(parse_timestamp("2025-07-30T09:00:00.000Z"), Some(ts(9)));
        assert_eq!(parse_timestamp("2025-07-30T09:00:00"), Some(ts(9)));
        assert_eq!(parse_timestamp("2025-07-30T11:00:00+02:00"), Some(ts(9)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn tasks_round_trip_through_store() {
        let store = MemoryStore::new();
        let tasks = sample::sample_tasks();
        save_tasks(&store, &tasks, ts(12)).unwrap();
        assert_eq!(load_tasks(&store), tasks);
    }

    #[test]
    fn missing_or_broken_data_falls_back_to_sample() {
        assert_eq!(load_tasks(&MemoryStore::new()), sample::sample_tasks());
        assert_eq!(load_tasks(&BrokenStore), sample::sample_tasks());

        let store = MemoryStore::new();
        store.set_item(DATA_KEY, "{not json").unwrap();
        assert_eq!(load_tasks(&store), sample::sample_tasks());
    }

    #[test]
    fn lenient_decode_skips_bad_records_and_dates() {
        let raw = json!({
            "tasks": [
                { "id": "ok", "text": "fine", "completed": true, "priority": "high",
                  "createdAt": "2025-07-29T08:00:00.000Z", "completedAt": "not a date",
                  "timeSpent": 40,
                  "pomodoroSessions": [
                      { "id": "s1", "startTime": "2025-07-29T08:00:00Z", "duration": 25, "completed": true },
                      { "id": "s2", "startTime": "garbage", "duration": 15, "completed": false }
                  ] },
                { "id": "bad", "text": "no created date", "createdAt": "??" },
                { "text": "no id" }
            ],
            "lastUpdated": "2025-07-30T00:00:00Z"
        });
        let tasks = decode_task_list(&raw.to_string()).unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.time_spent, 40);
        assert_eq!(task.pomodoro_sessions.len(), 1);
        assert_eq!(task.pomodoro_sessions[0].id, "s1");
    }

    #[test]
    fn strict_decode_reports_invalid_date() {
        let record = json!({ "id": "1", "text": "t", "createdAt": "2025-07-29T08:00:00Z",
                             "completed": true, "completedAt": "soon" });
        assert_eq!(
            decode_task(record, DecodeMode::Strict).unwrap_err(),
            RecordError::InvalidDateInRecord { field: "completedAt", value: "soon".into() }
        );
    }

    #[test]
    fn strict_decode_rejects_completed_without_completed_at() {
        let record = json!({ "id": "1", "text": "t", "createdAt": "2025-07-29T08:00:00Z", "completed": true });
        assert!(matches!(
            decode_task(record.clone(), DecodeMode::Strict),
            Err(RecordError::Shape(_))
        ));

        let task = decode_task(record, DecodeMode::Lenient).unwrap();
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn strict_decode_rejects_blank_text() {
        for text in ["", "   "] {
            let record = json!({ "id": "1", "text": text, "createdAt": "2025-07-29T08:00:00Z" });
            assert!(matches!(decode_task(record, DecodeMode::Strict), Err(RecordError::Shape(_))));
        }
    }

    #[test]
    fn decode_fills_defaults_and_drops_stray_completed_at() {
        let record = json!({ "id": "1", "text": "t", "createdAt": "2025-07-29T08:00:00Z",
                             "completedAt": "2025-07-29T09:00:00Z", "timeSpent": null });
        let task = decode_task(record, DecodeMode::Strict).unwrap();
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.time_spent, 0);
        assert!(task.pomodoro_sessions.is_empty());
    }

    #[test]
    fn legacy_todos_envelope_is_accepted() {
        let raw = json!({ "todos": [ { "id": "1", "text": "t", "createdAt": "2025-07-29T08:00:00Z" } ] });
        assert_eq!(decode_task_list(&raw.to_string()).unwrap().len(), 1);
    }

    #[test]
    fn settings_round_trip_and_fallback() {
        let store = MemoryStore::new();
        save_settings(&store, Settings { dark_mode: true }, ts(9)).unwrap();
        assert_eq!(load_settings(&store), Settings { dark_mode: true });

        store.set_item(SETTINGS_KEY, "][").unwrap();
        assert_eq!(load_settings(&store), Settings::system_default());
        assert_eq!(load_settings(&BrokenStore), Settings::system_default());
    }

    #[test]
    fn colorfgbg_detection() {
        assert!(prefers_dark(Some("15;0")));
        assert!(prefers_dark(Some("15;default;0")));
        assert!(!prefers_dark(Some("0;15")));
        assert!(!prefers_dark(None));
    }

    #[test]
    fn markers_are_scoped_per_task() {
        let store = MemoryStore::new();
        let marker = ActiveMarker { session_id: "a-1".into(), start_time: ts(9), running: true };
        write_marker(&store, "a", &marker).unwrap();

        assert_eq!(read_marker(&store, "a").unwrap(), Some(marker));
        assert_eq!(read_marker(&store, "b").unwrap(), None);
        assert_eq!(active_marker_ids(&store).unwrap(), vec!["a".to_string()]);

        clear_marker(&store, "a").unwrap();
        assert_eq!(read_marker(&store, "a").unwrap(), None);
    }

    #[test]
    fn marker_json_shape() {
        let marker = ActiveMarker { session_id: "a-1".into(), start_time: ts(9), running: true };
        let value = serde_json::to_value(&marker).unwrap();
        assert_eq!(value["sessionId"], "a-1");
        assert_eq!(value["running"], true);
        assert!(value["startTime"].as_str().unwrap().starts_with("2025-07-30T09:00:00"));
    }
}
