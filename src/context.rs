//! Application context: the one owner of storage, settings, config and the task list.
//!
//! Every task mutation goes through here and is followed by a save. Saves are
//! fire-and-forget: a failure is logged, the context is marked dirty, and the
//! next save or the final flush tries again.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::models::{Priority, Task, TaskUpdate};
use crate::persistence::{self, KeyValueStore, Settings};
use crate::sample;
use crate::store::{StoreError, TaskStore};
use crate::timer::{Clock, ClosedSession, SessionTracker, SystemClock, TickOutcome};
use crate::transfer::{self, ImportError};

pub struct AppContext<S: KeyValueStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    config: Config,
    tasks: TaskStore,
    settings: Settings,
    dirty: bool,
}

impl<S: KeyValueStore, C: Clock> AppContext<S, C> {
    /// Load tasks and settings from `store`, defaulting whatever is missing or unreadable
    pub fn init(store: S, clock: C, config: Config) -> Self {
        let tasks = TaskStore::new(persistence::load_tasks(&store));
        let settings = persistence::load_settings(&store);
        tracing::debug!(tasks = tasks.len(), dark_mode = settings.dark_mode, "context initialised");
        Self {
            store,
            clock,
            config,
            tasks,
            settings,
            dirty: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Resolve a full id or unique prefix to the task's id
    pub fn resolve_id(&self, prefix: &str) -> Result<String, StoreError> {
        self.tasks.find_by_prefix(prefix).map(|t| t.id.clone())
    }

    pub fn add_task(
        &mut self,
        text: &str,
        priority: Option<Priority>,
        category: Option<String>,
    ) -> Result<Task, StoreError> {
        let priority = priority.unwrap_or(self.config.default_priority);
        let now = self.now();
        let task = self.tasks.add(text, priority, category, now)?.clone();
        self.persist_tasks();
        Ok(task)
    }

    pub fn toggle_task(&mut self, id: &str) -> Result<Task, StoreError> {
        let now = self.now();
        let task = self
            .tasks
            .toggle(id, now)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.persist_tasks();
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<Task, StoreError> {
        let task = self.tasks.update(id, update)?.clone();
        self.persist_tasks();
        Ok(task)
    }

    /// Delete a task and any running timer it had. Returns false if absent.
    pub fn delete_task(&mut self, id: &str) -> bool {
        if !self.tasks.delete(id) {
            return false;
        }
        if let Err(err) = persistence::clear_marker(&self.store, id) {
            tracing::error!(task = id, %err, "failed to clear timer marker of deleted task");
        }
        self.persist_tasks();
        true
    }

    /// Drop every task and remove stored data and settings
    pub fn clear_all(&mut self) {
        self.tasks.clear();
        match persistence::active_marker_ids(&self.store) {
            Ok(ids) => {
                for id in ids {
                    if let Err(err) = persistence::clear_marker(&self.store, &id) {
                        tracing::error!(task = %id, %err, "failed to clear timer marker");
                    }
                }
            }
            Err(err) => tracing::error!(%err, "failed to list timer markers"),
        }
        if let Err(err) = persistence::clear_all(&self.store) {
            tracing::error!(%err, "failed to clear stored data");
        }
        // The emptied list is the new state; make sure it sticks
        self.persist_tasks();
    }

    pub fn load_sample_data(&mut self) {
        self.tasks.replace_all(sample::sample_tasks());
        self.persist_tasks();
    }

    /// Replace all tasks with the contents of a backup. The store is untouched on error.
    pub fn import_json(&mut self, contents: &str) -> Result<usize, ImportError> {
        let tasks = transfer::import_json(contents)?;
        let count = tasks.len();
        self.tasks.replace_all(tasks);
        self.persist_tasks();
        tracing::info!(count, "imported tasks");
        Ok(count)
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        transfer::export_json(self.tasks(), self.now())
    }

    /// Tracker for a task, resumed from its persisted marker if one exists
    pub fn tracker(&self, task_id: &str) -> SessionTracker {
        SessionTracker::restore(task_id, self.config.pomodoro_minutes, &self.store, self.now())
    }

    /// Trackers for every task with an active session
    pub fn running_trackers(&self) -> Vec<SessionTracker> {
        match persistence::active_marker_ids(&self.store) {
            Ok(ids) => ids
                .iter()
                .filter(|id| self.tasks.get(id).is_some())
                .map(|id| self.tracker(id))
                .filter(SessionTracker::is_running)
                .collect(),
            Err(err) => {
                tracing::error!(%err, "failed to list timer markers");
                Vec::new()
            }
        }
    }

    /// Start a session on a task. Ok(false) when one is already running.
    pub fn start_timer(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.tasks.get(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let mut tracker = self.tracker(id);
        Ok(tracker.start(&self.store, self.now()))
    }

    /// Stop (or reset) the running session on a task and merge it in
    pub fn stop_timer(&mut self, id: &str, reset: bool) -> Result<Option<ClosedSession>, StoreError> {
        if self.tasks.get(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let mut tracker = self.tracker(id);
        let now = self.now();
        let closed = if reset {
            tracker.reset(&self.store, now)
        } else {
            // A session past its target closes at the target, as the dashboard tick would
            match tracker.tick(&self.store, now) {
                TickOutcome::Completed(closed) => Some(closed),
                _ => tracker.stop(&self.store, now),
            }
        };
        if let Some(closed) = &closed {
            self.record_session(closed.clone())?;
        }
        Ok(closed)
    }

    /// Merge a closed session: one appended session, one `time_spent` increase
    pub fn record_session(&mut self, closed: ClosedSession) -> Result<(), StoreError> {
        self.tasks.record_session(&closed.task_id, closed.session)?;
        self.persist_tasks();
        Ok(())
    }

    pub fn toggle_dark_mode(&mut self) -> bool {
        self.settings.dark_mode = !self.settings.dark_mode;
        if let Err(err) = persistence::save_settings(&self.store, self.settings, self.now()) {
            tracing::error!(%err, "failed to save settings");
        }
        self.settings.dark_mode
    }

    fn persist_tasks(&mut self) {
        match persistence::save_tasks(&self.store, self.tasks.tasks(), self.now()) {
            Ok(()) => self.dirty = false,
            Err(err) => {
                tracing::error!(%err, "failed to save tasks");
                self.dirty = true;
            }
        }
    }

    /// Retry any save that failed earlier
    pub fn flush(&mut self) {
        if self.dirty {
            self.persist_tasks();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn shutdown(mut self) {
        self.flush();
    }
}

impl<S: KeyValueStore, C: Clock> Drop for AppContext<S, C> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{DATA_KEY, MemoryStore, StorageError};
    use crate::timer::ManualClock;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 30, 9, 0, 0).unwrap()
    }

    fn empty_context() -> AppContext<MemoryStore, ManualClock> {
        let mut ctx = AppContext::init(MemoryStore::new(), ManualClock::new(t0()), Config::default());
        ctx.clear_all();
        ctx
    }

    #[test]
    fn first_launch_shows_sample_data() {
        let ctx = AppContext::init(MemoryStore::new(), ManualClock::new(t0()), Config::default());
        assert_eq!(ctx.tasks(), sample::sample_tasks().as_slice());
    }

    #[test]
    fn mutations_are_saved_immediately() {
        let mut ctx = empty_context();
        let task = ctx.add_task("Write tests", None, Some("Dev".into())).unwrap();
        assert_eq!(task.priority, Priority::Medium);

        let saved = persistence::load_tasks(ctx.store());
        assert_eq!(saved, vec![task]);
    }

    #[test]
    fn timer_session_merges_into_task() {
        let mut ctx = empty_context();
        let id = ctx.add_task("Focus", Some(Priority::High), None).unwrap().id;

        assert!(ctx.start_timer(&id).unwrap());
        assert!(!ctx.start_timer(&id).unwrap());
        assert_eq!(ctx.running_trackers().len(), 1);

        ctx.clock.advance(Duration::seconds(1500));
        let closed = ctx.stop_timer(&id, false).unwrap().unwrap();
        assert!(closed.session.completed);

        let task = &ctx.tasks()[0];
        assert_eq!(task.time_spent, 25);
        assert_eq!(task.pomodoro_sessions.len(), 1);
        assert!(ctx.running_trackers().is_empty());
        // Stopping again records nothing
        assert_eq!(ctx.stop_timer(&id, false).unwrap(), None);
        assert_eq!(ctx.tasks()[0].time_spent, 25);
    }

    #[test]
    fn stop_after_overrun_records_the_target() {
        let mut ctx = empty_context();
        let id = ctx.add_task("Forgotten", None, None).unwrap().id;
        ctx.start_timer(&id).unwrap();

        ctx.clock.advance(Duration::hours(2));
        let closed = ctx.stop_timer(&id, false).unwrap().unwrap();
        assert_eq!(closed.session.duration, 25);
        assert!(closed.session.completed);
        assert_eq!(ctx.tasks()[0].time_spent, 25);
        assert!(ctx.running_trackers().is_empty());
    }

    #[test]
    fn timer_survives_context_reload() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(t0());
        let id = {
            let mut ctx = AppContext::init(&store, &clock, Config::default());
            let id = ctx.add_task("Long task", None, None).unwrap().id;
            ctx.start_timer(&id).unwrap();
            id
        };

        clock.advance(Duration::seconds(900));
        let mut ctx = AppContext::init(&store, &clock, Config::default());
        assert_eq!(ctx.tracker(&id).displayed_secs(), 900);
        let closed = ctx.stop_timer(&id, false).unwrap().unwrap();
        assert_eq!(closed.session.duration, 15);
        assert!(!closed.session.completed);
    }

    #[test]
    fn delete_clears_marker() {
        let mut ctx = empty_context();
        let id = ctx.add_task("Doomed", None, None).unwrap().id;
        ctx.start_timer(&id).unwrap();
        assert!(ctx.delete_task(&id));
        assert_eq!(persistence::read_marker(ctx.store(), &id).unwrap(), None);
        assert!(!ctx.delete_task(&id));
    }

    #[test]
    fn failed_import_leaves_tasks_alone() {
        let mut ctx = empty_context();
        ctx.add_task("Keep me", None, None).unwrap();
        assert!(ctx.import_json(r#"{"todos": "nope"}"#).is_err());
        assert_eq!(ctx.tasks().len(), 1);

        let backup = transfer::export_json(&sample::sample_tasks(), t0()).unwrap();
        assert_eq!(ctx.import_json(&backup).unwrap(), 6);
        assert_eq!(ctx.tasks().len(), 6);
    }

    #[test]
    fn export_import_round_trip() {
        let mut ctx = empty_context();
        ctx.add_task("One", Some(Priority::Low), None).unwrap();
        let id = ctx.add_task("Two", Some(Priority::High), Some("Work".into())).unwrap().id;
        ctx.toggle_task(&id).unwrap();
        let before = ctx.tasks().to_vec();

        let json = ctx.export_json().unwrap();
        let mut other = empty_context();
        other.import_json(&json).unwrap();
        assert_eq!(other.tasks(), before.as_slice());
    }

    #[test]
    fn dark_mode_is_persisted() {
        let store = MemoryStore::new();
        let mut ctx = AppContext::init(&store, ManualClock::new(t0()), Config::default());
        let dark = ctx.toggle_dark_mode();
        drop(ctx);
        let ctx = AppContext::init(&store, ManualClock::new(t0()), Config::default());
        assert_eq!(ctx.settings().dark_mode, dark);
    }

    #[test]
    fn clear_all_removes_everything() {
        let mut ctx = AppContext::init(MemoryStore::new(), ManualClock::new(t0()), Config::default());
        ctx.start_timer("1").unwrap();
        ctx.clear_all();
        assert!(ctx.tasks().is_empty());
        assert!(persistence::active_marker_ids(ctx.store()).unwrap().is_empty());
        // An empty list is stored, so the next launch does not bring back samples
        let ctx = AppContext::init(ctx.store(), ManualClock::new(t0()), Config::default());
        assert!(ctx.tasks().is_empty());
    }

    /// Store that can be switched into failure mode
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: Cell<bool>,
    }

    impl KeyValueStore for FlakyStore {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }
        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.failing.get() {
                return Err(StorageError::StorageUnavailable("disk full".into()));
            }
            self.inner.set_item(key, value)
        }
        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
        fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.keys_with_prefix(prefix)
        }
    }

    #[test]
    fn failed_save_is_retried_on_flush() {
        let mut ctx = AppContext::init(FlakyStore::default(), ManualClock::new(t0()), Config::default());
        ctx.store().failing.set(true);
        let task = ctx.add_task("Survives", None, None).unwrap();
        assert!(ctx.is_dirty());
        assert!(ctx.tasks().contains(&task));

        ctx.store().failing.set(false);
        ctx.flush();
        assert!(!ctx.is_dirty());
        let raw = ctx.store().get_item(DATA_KEY).unwrap().unwrap();
        assert!(raw.contains("Survives"));
    }
}
