use ratatui::Frame;
use ratatui::layout::Alignment;
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders};

use crate::persistence::KeyValueStore;
use crate::timer::Clock;
use crate::tui::app::{App, Mode};
use crate::tui::layout::Layout;
use crate::tui::widgets::{
    charts::{render_priority_panel, render_time_chart, render_trend_chart},
    color::parse_color,
    help::render_help,
    stat_cards::render_stat_cards,
    status_bar::render_status_bar,
    tabs::render_window_tabs,
    task_list::render_task_list,
};
use crate::utils::format_key_binding_for_display as key;

pub fn render<S: KeyValueStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>, layout: &Layout) {
    let theme = app.active_theme();
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("Task Dashboard")
        .title_alignment(Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    // Analytics are derived fresh for every frame
    let report = app.report();

    render_window_tabs(f, layout.tabs_area, app.ui.window, &theme);
    render_stat_cards(f, layout.cards_area, &report.stats, &theme);
    render_trend_chart(f, layout.trend_area, &report.trend, report.window, &theme);
    render_time_chart(f, layout.time_area, &report.time, &report.time_summary, &theme);
    render_priority_panel(
        f,
        layout.priority_area,
        &report.pending_by_priority,
        &report.completed_by_priority,
        report.window,
        &theme,
    );

    let tasks = app.visible_tasks();
    render_task_list(f, layout.tasks_area, &tasks, &app.trackers, &mut app.ui.list_state, &theme);

    if app.ui.mode == Mode::Help {
        render_help(f, f.area(), &app.ctx.config().key_bindings, &theme);
    }

    let key_hints = get_key_hints(app);
    render_status_bar(f, layout.status_area, app.status.message.as_deref(), &key_hints, &theme);
}

fn get_key_hints<S: KeyValueStore, C: Clock>(app: &App<S, C>) -> Vec<String> {
    let keys = &app.ctx.config().key_bindings;
    match app.ui.mode {
        Mode::Help => vec!["Esc or ?: Exit help".to_string()],
        Mode::Dashboard => vec![
            format!("{}: Quit", key(&keys.quit)),
            format!("{}: Done", key(&keys.toggle_task)),
            format!("{}: Timer", key(&keys.toggle_timer)),
            format!("{}: Reset", key(&keys.reset_timer)),
            format!("{}/{}: Window", key(&keys.prev_window), key(&keys.next_window)),
            format!("{}: Dark mode", key(&keys.toggle_dark_mode)),
            "?: Help".to_string(),
        ],
    }
}
