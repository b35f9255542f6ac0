use crossterm::event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size as terminal_size,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::io;

use crate::persistence::KeyValueStore;
use crate::timer::Clock;
use crate::tui::app::{App, Mode};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;

/// Guard that ensures terminal state is restored even on panic
/// This is critical for TUI applications - if the terminal is left in raw mode
/// or alternate screen, the user's terminal will be unusable.
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    /// Initialize terminal state and return a guard
    /// The guard will restore terminal state when dropped (even on panic)
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        // Focus events drive timer resync after the terminal was in the background
        execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;

        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Manually restore terminal state (called on normal exit)
    /// After calling this, the guard will do nothing on drop
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Ignore errors in drop - we're already in a cleanup path
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen);
        }
    }
}

pub fn run_event_loop<S: KeyValueStore, C: Clock>(mut app: App<S, C>) -> Result<(), TuiError> {
    // Check terminal size before entering alternate screen
    // This allows us to show a helpful error message in the normal terminal
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;

    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    // Setup terminal with guard to ensure restoration on panic
    let mut guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    tracing::debug!(timers = app.trackers.len(), "dashboard started");

    loop {
        app.check_status_message_timeout();

        let terminal_size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, terminal_size.width, terminal_size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(terminal_rect);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        // The running timer's tick interval bounds how long we block
        if event::poll(app.poll_timeout())? {
            match event::read()? {
                // Only process Press events to avoid double-processing on Windows
                Event::Key(key_event) if key_event.kind == KeyEventKind::Press => {
                    if handle_key_event(&mut app, key_event) {
                        break;
                    }
                }
                Event::FocusGained => {
                    tracing::debug!("focus regained, resyncing timers");
                    app.resync();
                }
                _ => {}
            }
        }

        // Every wake re-derives elapsed time, so a missed tick costs nothing
        app.tick();
    }

    guard.restore()?;
    app.shutdown();

    Ok(())
}

/// Apply one key press. Returns true when the user asked to quit.
pub fn handle_key_event<S: KeyValueStore, C: Clock>(app: &mut App<S, C>, key_event: KeyEvent) -> bool {
    if app.ui.mode == Mode::Help {
        if matches!(key_event.code, KeyCode::Esc | KeyCode::Char('?')) {
            app.ui.mode = Mode::Dashboard;
        }
        return false;
    }

    let bindings = app.bindings.clone();
    if bindings.quit.matches(&key_event) {
        return true;
    }

    if bindings.list_down.matches(&key_event) || key_event.code == KeyCode::Down {
        app.select_next();
    } else if bindings.list_up.matches(&key_event) || key_event.code == KeyCode::Up {
        app.select_previous();
    } else if bindings.next_window.matches(&key_event) {
        app.next_window();
    } else if bindings.prev_window.matches(&key_event) {
        app.prev_window();
    } else if bindings.toggle_task.matches(&key_event) {
        app.toggle_selected_task();
    } else if bindings.toggle_timer.matches(&key_event) {
        app.toggle_selected_timer();
    } else if bindings.reset_timer.matches(&key_event) {
        app.reset_selected_timer();
    } else if bindings.toggle_dark_mode.matches(&key_event) {
        app.toggle_dark_mode();
    } else if key_event.code == KeyCode::Char('?') {
        app.ui.mode = Mode::Help;
    }
    false
}
