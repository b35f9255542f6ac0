//! Per-task stopwatch that survives reloads and suspension.
//!
//! Elapsed time is always derived from the persisted start timestamp and the
//! current wall clock, never from counted ticks. A tick, a focus regain and a
//! fresh process all compute the same value for the same `now`.

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;

use crate::models::Session;
use crate::persistence::{self, ActiveMarker, KeyValueStore};

pub const DEFAULT_TARGET_MINUTES: u32 = 25;

/// How often a running timer refreshes its display
pub const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Whole seconds between `start` and `now`; never negative
pub fn elapsed_secs(now: DateTime<Utc>, start: DateTime<Utc>) -> i64 {
    (now - start).num_milliseconds().max(0) / 1000
}

/// Session length in minutes, rounded half up
pub fn session_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let ms = (end - start).num_milliseconds().max(0);
    u32::try_from((ms + 30_000) / 60_000).unwrap_or(u32::MAX)
}

/// Render seconds as `MM:SS` (minutes may exceed two digits)
pub fn format_clock(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerState {
    Idle,
    Running {
        session_id: String,
        start_time: DateTime<Utc>,
    },
}

/// A finished session, ready to be merged into its task
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub task_id: String,
    pub session: Session,
}

impl ClosedSession {
    /// Minutes to add to the task's `time_spent`
    pub fn minutes(&self) -> u32 {
        self.session.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Idle,
    Running { elapsed_secs: i64 },
    /// The target was reached on this tick
    Completed(ClosedSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseKind {
    Stop,
    Reset,
    TargetReached,
}

#[derive(Debug, Clone)]
pub struct SessionTracker {
    task_id: String,
    target: Duration,
    state: TimerState,
    displayed_secs: i64,
}

impl SessionTracker {
    pub fn new(task_id: impl Into<String>, target_minutes: u32) -> Self {
        Self {
            task_id: task_id.into(),
            target: Duration::minutes(i64::from(target_minutes.max(1))),
            state: TimerState::Idle,
            displayed_secs: 0,
        }
    }

    /// Rebuild a tracker from its persisted marker, keeping the original start time
    pub fn restore(
        task_id: impl Into<String>,
        target_minutes: u32,
        store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Self {
        let mut tracker = Self::new(task_id, target_minutes);
        match persistence::read_marker(store, &tracker.task_id) {
            Ok(Some(marker)) if marker.running => {
                tracing::debug!(task = %tracker.task_id, session = %marker.session_id, "resuming timer");
                tracker.state = TimerState::Running {
                    session_id: marker.session_id,
                    start_time: marker.start_time,
                };
                tracker.resync(now);
            }
            Ok(Some(_)) => tracker.discard_marker(store),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(task = %tracker.task_id, %err, "discarding unreadable timer marker");
                tracker.discard_marker(store);
            }
        }
        tracker
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TimerState::Running { start_time, .. } => Some(start_time),
            TimerState::Idle => None,
        }
    }

    pub fn target_secs(&self) -> i64 {
        self.target.num_seconds()
    }

    /// Elapsed seconds as last computed by `resync`/`tick`
    pub fn displayed_secs(&self) -> i64 {
        self.displayed_secs
    }

    pub fn remaining_secs(&self) -> i64 {
        (self.target_secs() - self.displayed_secs).max(0)
    }

    /// Fraction of the target covered, 0.0..=1.0
    pub fn progress(&self) -> f64 {
        (self.displayed_secs as f64 / self.target_secs() as f64).clamp(0.0, 1.0)
    }

    /// Poll interval for the host loop; `None` while idle, so nothing is scheduled
    pub fn tick_interval(&self) -> Option<std::time::Duration> {
        self.is_running().then_some(TICK_INTERVAL)
    }

    /// Begin a session. Returns false (and does nothing) when already running.
    pub fn start(&mut self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> bool {
        if self.is_running() {
            return false;
        }
        let session_id = Session::make_id(&self.task_id, now);
        let marker = ActiveMarker {
            session_id: session_id.clone(),
            start_time: now,
            running: true,
        };
        if let Err(err) = persistence::write_marker(store, &self.task_id, &marker) {
            tracing::error!(task = %self.task_id, %err, "failed to persist timer start");
        }
        tracing::debug!(task = %self.task_id, session = %session_id, "timer started");
        self.state = TimerState::Running { session_id, start_time: now };
        self.displayed_secs = 0;
        true
    }

    /// Recompute the displayed elapsed time from timestamps only
    pub fn resync(&mut self, now: DateTime<Utc>) -> i64 {
        if let TimerState::Running { start_time, .. } = self.state {
            self.displayed_secs = elapsed_secs(now, start_time);
        }
        self.displayed_secs
    }

    /// Periodic refresh. Closes the session once the target is reached.
    pub fn tick(&mut self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }
        let elapsed = self.resync(now);
        if elapsed >= self.target_secs() {
            return match self.close(store, now, CloseKind::TargetReached) {
                Some(closed) => TickOutcome::Completed(closed),
                None => TickOutcome::Idle,
            };
        }
        TickOutcome::Running { elapsed_secs: elapsed }
    }

    /// End the session. Completed only if it lasted the full target.
    pub fn stop(&mut self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> Option<ClosedSession> {
        self.close(store, now, CloseKind::Stop)
    }

    /// Cancel the session: recorded as incomplete, display back to zero
    pub fn reset(&mut self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> Option<ClosedSession> {
        let closed = self.close(store, now, CloseKind::Reset);
        self.displayed_secs = 0;
        closed
    }

    fn close(&mut self, store: &dyn KeyValueStore, now: DateTime<Utc>, kind: CloseKind) -> Option<ClosedSession> {
        let TimerState::Running { session_id, start_time } =
            std::mem::replace(&mut self.state, TimerState::Idle)
        else {
            return None;
        };

        let reached_target = now - start_time >= self.target;
        let (duration, completed) = match kind {
            CloseKind::TargetReached => (self.target.num_minutes() as u32, true),
            CloseKind::Stop => (session_minutes(start_time, now), reached_target),
            CloseKind::Reset => (session_minutes(start_time, now), false),
        };

        self.displayed_secs = match kind {
            CloseKind::TargetReached => 0,
            _ => elapsed_secs(now, start_time),
        };
        self.discard_marker(store);

        tracing::debug!(task = %self.task_id, session = %session_id, duration, completed, "timer closed");
        Some(ClosedSession {
            task_id: self.task_id.clone(),
            session: Session {
                id: session_id,
                start_time,
                end_time: Some(now),
                duration,
                completed,
            },
        })
    }

    fn discard_marker(&self, store: &dyn KeyValueStore) {
        if let Err(err) = persistence::clear_marker(store, &self.task_id) {
            tracing::error!(task = %self.task_id, %err, "failed to clear timer marker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, timer_key};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 30, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn elapsed_survives_background_gap() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(t0());
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        assert!(tracker.start(&store, clock.now()));

        // No ticks while backgrounded
        clock.advance(secs(90));
        assert_eq!(tracker.resync(clock.now()), 90);
    }

    #[test]
    fn resync_is_idempotent() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());
        let now = t0() + Duration::milliseconds(42_700);
        assert_eq!(tracker.resync(now), 42);
        assert_eq!(tracker.resync(now), 42);
        assert_eq!(tracker.tick(&store, now), TickOutcome::Running { elapsed_secs: 42 });
    }

    #[test]
    fn restore_keeps_original_start() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());
        drop(tracker);

        // A new process picks the session up where it was
        let restored = SessionTracker::restore("task", DEFAULT_TARGET_MINUTES, &store, t0() + secs(300));
        assert!(restored.is_running());
        assert_eq!(restored.start_time(), Some(t0()));
        assert_eq!(restored.displayed_secs(), 300);
    }

    #[test]
    fn restore_without_marker_is_idle() {
        let store = MemoryStore::new();
        let tracker = SessionTracker::restore("task", DEFAULT_TARGET_MINUTES, &store, t0());
        assert_eq!(tracker.state(), &TimerState::Idle);
        assert_eq!(tracker.tick_interval(), None);
    }

    #[test]
    fn unreadable_marker_is_discarded() {
        let store = MemoryStore::new();
        store.set_item(&timer_key("task"), "not json").unwrap();
        let tracker = SessionTracker::restore("task", DEFAULT_TARGET_MINUTES, &store, t0());
        assert!(!tracker.is_running());
        assert_eq!(store.get_item(&timer_key("task")).unwrap(), None);
    }

    #[rstest]
    #[case::full_target(1500, 25, true)]
    #[case::early_stop(900, 15, false)]
    #[case::past_target(1700, 28, true)]
    #[case::rounds_half_up(90, 2, false)]
    #[case::rounds_down(89, 1, false)]
    #[case::under_half_minute(29, 0, false)]
    fn stop_records_rounded_minutes(#[case] after: i64, #[case] minutes: u32, #[case] completed: bool) {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());

        let closed = tracker.stop(&store, t0() + secs(after)).unwrap();
        assert_eq!(closed.task_id, "task");
        assert_eq!(closed.session.duration, minutes);
        assert_eq!(closed.session.completed, completed);
        assert_eq!(closed.session.start_time, t0());
        assert_eq!(closed.session.end_time, Some(t0() + secs(after)));
        assert_eq!(closed.session.id, Session::make_id("task", t0()));
        assert!(!tracker.is_running());
    }

    #[test]
    fn start_and_stop_are_noops_in_wrong_state() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        assert_eq!(tracker.stop(&store, t0()), None);
        assert_eq!(tracker.reset(&store, t0()), None);

        assert!(tracker.start(&store, t0()));
        assert!(!tracker.start(&store, t0() + secs(10)));
        // The second start did not move the clock
        assert_eq!(tracker.start_time(), Some(t0()));

        assert!(tracker.stop(&store, t0() + secs(60)).is_some());
        assert_eq!(tracker.stop(&store, t0() + secs(61)), None);
    }

    #[test]
    fn marker_lives_only_while_running() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());
        let marker = persistence::read_marker(&store, "task").unwrap().unwrap();
        assert_eq!(marker.start_time, t0());
        assert!(marker.running);

        tracker.stop(&store, t0() + secs(60));
        assert_eq!(persistence::read_marker(&store, "task").unwrap(), None);
    }

    #[test]
    fn tick_completes_at_target_with_fixed_duration() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());

        assert!(matches!(tracker.tick(&store, t0() + secs(1499)), TickOutcome::Running { .. }));
        // Woken long after the target: still a fixed 25 minute session
        let TickOutcome::Completed(closed) = tracker.tick(&store, t0() + secs(4000)) else {
            panic!("expected completion");
        };
        assert_eq!(closed.session.duration, 25);
        assert!(closed.session.completed);
        assert!(!tracker.is_running());
        assert_eq!(tracker.displayed_secs(), 0);
        assert_eq!(tracker.tick(&store, t0() + secs(4001)), TickOutcome::Idle);
        assert_eq!(persistence::read_marker(&store, "task").unwrap(), None);
    }

    #[test]
    fn reset_marks_incomplete_and_zeroes_display() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());
        tracker.resync(t0() + secs(1600));

        let closed = tracker.reset(&store, t0() + secs(1600)).unwrap();
        assert!(!closed.session.completed);
        assert_eq!(closed.minutes(), 27);
        assert_eq!(tracker.displayed_secs(), 0);
    }

    #[test]
    fn stop_freezes_display_at_elapsed() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        tracker.start(&store, t0());
        tracker.stop(&store, t0() + secs(125));
        assert_eq!(tracker.displayed_secs(), 125);
        assert_eq!(tracker.remaining_secs(), 1500 - 125);
    }

    #[test]
    fn tick_interval_follows_state() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", DEFAULT_TARGET_MINUTES);
        assert_eq!(tracker.tick_interval(), None);
        tracker.start(&store, t0());
        assert_eq!(tracker.tick_interval(), Some(TICK_INTERVAL));
        tracker.stop(&store, t0() + secs(5));
        assert_eq!(tracker.tick_interval(), None);
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(-5), "00:00");
    }

    #[test]
    fn progress_is_clamped() {
        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new("task", 1);
        tracker.start(&store, t0());
        tracker.resync(t0() + secs(30));
        assert_eq!(tracker.progress(), 0.5);
        tracker.resync(t0() + secs(300));
        assert_eq!(tracker.progress(), 1.0);
    }
}
