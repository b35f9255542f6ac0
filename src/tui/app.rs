use ratatui::widgets::ListState;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::analytics::{Analytics, Report, Window};
use crate::config::Theme;
use crate::context::AppContext;
use crate::database::Database;
use crate::models::{Task, sort_by_priority};
use crate::persistence::KeyValueStore;
use crate::timer::{Clock, SessionTracker, SystemClock, TickOutcome};
use crate::tui::error::TuiError;
use crate::utils::{ParsedKeyBinding, parse_key_binding};

/// Event poll timeout while no timer is running
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dashboard,
    Help,
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub mode: Mode,
    pub window: Window,
    pub list_state: ListState,
}

#[derive(Debug, Clone, Default)]
pub struct StatusState {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

/// Config key bindings, parsed once at startup
#[derive(Debug, Clone)]
pub struct Bindings {
    pub quit: ParsedKeyBinding,
    pub list_up: ParsedKeyBinding,
    pub list_down: ParsedKeyBinding,
    pub next_window: ParsedKeyBinding,
    pub prev_window: ParsedKeyBinding,
    pub toggle_task: ParsedKeyBinding,
    pub toggle_timer: ParsedKeyBinding,
    pub reset_timer: ParsedKeyBinding,
    pub toggle_dark_mode: ParsedKeyBinding,
}

impl Bindings {
    fn from_config(keys: &crate::config::KeyBindings) -> Result<Self, TuiError> {
        let parse = |s: &str| parse_key_binding(s).map_err(TuiError::KeyBindingError);
        Ok(Self {
            quit: parse(&keys.quit)?,
            list_up: parse(&keys.list_up)?,
            list_down: parse(&keys.list_down)?,
            next_window: parse(&keys.next_window)?,
            prev_window: parse(&keys.prev_window)?,
            toggle_task: parse(&keys.toggle_task)?,
            toggle_timer: parse(&keys.toggle_timer)?,
            reset_timer: parse(&keys.reset_timer)?,
            toggle_dark_mode: parse(&keys.toggle_dark_mode)?,
        })
    }
}

pub struct App<S: KeyValueStore = Database, C: Clock = SystemClock> {
    pub ctx: AppContext<S, C>,
    pub ui: UiState,
    pub status: StatusState,
    pub bindings: Bindings,
    /// Running timers by task id
    pub trackers: HashMap<String, SessionTracker>,
}

impl<S: KeyValueStore, C: Clock> App<S, C> {
    pub fn new(ctx: AppContext<S, C>) -> Result<Self, TuiError> {
        let bindings = Bindings::from_config(&ctx.config().key_bindings)?;
        let trackers = ctx
            .running_trackers()
            .into_iter()
            .map(|t| (t.task_id().to_string(), t))
            .collect();

        let mut list_state = ListState::default();
        if !ctx.tasks().is_empty() {
            list_state.select(Some(0));
        }

        Ok(Self {
            ui: UiState {
                mode: Mode::Dashboard,
                window: ctx.config().default_window,
                list_state,
            },
            status: StatusState::default(),
            bindings,
            trackers,
            ctx,
        })
    }

    /// Tasks in display order: incomplete first, then by priority
    pub fn visible_tasks(&self) -> Vec<Task> {
        let mut tasks = self.ctx.tasks().to_vec();
        sort_by_priority(&mut tasks);
        tasks
    }

    pub fn selected_task_id(&self) -> Option<String> {
        let index = self.ui.list_state.selected()?;
        self.visible_tasks().get(index).map(|t| t.id.clone())
    }

    /// Analytics for the current window, recomputed on every call
    pub fn report(&self) -> Report {
        let anchor = self.ctx.now().with_timezone(&chrono::Local).date_naive();
        Analytics::new(self.ctx.tasks(), anchor, chrono::Local).report(self.ui.window)
    }

    pub fn active_theme(&self) -> Theme {
        self.ctx.config().get_active_theme(self.ctx.settings().dark_mode)
    }

    pub fn select_next(&mut self) {
        let len = self.ctx.tasks().len();
        if len == 0 {
            self.ui.list_state.select(None);
            return;
        }
        let next = self.ui.list_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.ui.list_state.select(Some(next));
    }

    pub fn select_previous(&mut self) {
        if self.ctx.tasks().is_empty() {
            self.ui.list_state.select(None);
            return;
        }
        let prev = self.ui.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.ui.list_state.select(Some(prev));
    }

    pub fn next_window(&mut self) {
        self.ui.window = self.ui.window.next();
    }

    pub fn prev_window(&mut self) {
        self.ui.window = self.ui.window.prev();
    }

    pub fn toggle_selected_task(&mut self) {
        let Some(id) = self.selected_task_id() else {
            self.set_status_message("No task selected".to_string());
            return;
        };
        match self.ctx.toggle_task(&id) {
            Ok(task) if task.completed => self.set_status_message("Task completed".to_string()),
            Ok(_) => self.set_status_message("Task reopened".to_string()),
            Err(e) => self.set_status_message(format!("Failed to update task: {}", e)),
        }
        // The toggled task may have moved in display order
        if let Some(index) = self.visible_tasks().iter().position(|t| t.id == id) {
            self.ui.list_state.select(Some(index));
        }
    }

    /// Start the selected task's timer, or stop it if it is running
    pub fn toggle_selected_timer(&mut self) {
        let Some(id) = self.selected_task_id() else {
            self.set_status_message("No task selected".to_string());
            return;
        };
        let now = self.ctx.now();

        if let Some(mut tracker) = self.trackers.remove(&id) {
            if let Some(closed) = tracker.stop(self.ctx.store(), now) {
                let minutes = closed.minutes();
                match self.ctx.record_session(closed) {
                    Ok(()) => self.set_status_message(format!("Timer stopped, {} min recorded", minutes)),
                    Err(e) => self.set_status_message(format!("Failed to record session: {}", e)),
                }
            }
            return;
        }

        let mut tracker = SessionTracker::new(id.clone(), self.ctx.config().pomodoro_minutes);
        tracker.start(self.ctx.store(), now);
        self.trackers.insert(id, tracker);
        self.set_status_message("Timer started".to_string());
    }

    pub fn reset_selected_timer(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let Some(mut tracker) = self.trackers.remove(&id) else {
            self.set_status_message("No timer running".to_string());
            return;
        };
        if let Some(closed) = tracker.reset(self.ctx.store(), self.ctx.now()) {
            if let Err(e) = self.ctx.record_session(closed) {
                self.set_status_message(format!("Failed to record session: {}", e));
                return;
            }
        }
        self.set_status_message("Timer reset".to_string());
    }

    pub fn toggle_dark_mode(&mut self) {
        let dark = self.ctx.toggle_dark_mode();
        self.set_status_message(format!("Dark mode {}", if dark { "on" } else { "off" }));
    }

    /// Advance every running timer; sessions that reached their target are recorded
    pub fn tick(&mut self) {
        let now = self.ctx.now();
        let mut finished = Vec::new();
        for (id, tracker) in self.trackers.iter_mut() {
            match tracker.tick(self.ctx.store(), now) {
                TickOutcome::Completed(closed) => finished.push((id.clone(), Some(closed))),
                TickOutcome::Idle => finished.push((id.clone(), None)),
                TickOutcome::Running { .. } => {}
            }
        }
        for (id, closed) in finished {
            self.trackers.remove(&id);
            let Some(closed) = closed else { continue };
            match self.ctx.record_session(closed) {
                Ok(()) => self.set_status_message("Pomodoro completed!".to_string()),
                Err(e) => self.set_status_message(format!("Failed to record session: {}", e)),
            }
        }
    }

    /// Recompute elapsed time from timestamps after the terminal regains focus
    pub fn resync(&mut self) {
        let now = self.ctx.now();
        for tracker in self.trackers.values_mut() {
            tracker.resync(now);
        }
    }

    /// How long the event loop may block waiting for input
    pub fn poll_timeout(&self) -> Duration {
        self.trackers
            .values()
            .filter_map(SessionTracker::tick_interval)
            .min()
            .unwrap_or(IDLE_POLL_INTERVAL)
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    /// Check if status message should be auto-cleared (after 3 seconds)
    pub fn check_status_message_timeout(&mut self) {
        const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 3;
        if let Some(time) = self.status.message_time {
            if time.elapsed().as_secs() >= STATUS_MESSAGE_TIMEOUT_SECS {
                self.clear_status_message();
            }
        }
    }

    pub fn shutdown(self) {
        self.ctx.shutdown();
    }
}
