use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::config::{KeyBindings, Theme};
use crate::tui::widgets::color::parse_color;
use crate::utils::format_key_binding_for_display as key;

pub fn render_help(f: &mut Frame, area: Rect, keys: &KeyBindings, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);

    let popup_area = popup_area(area, 60, 70);
    // Clear the background first - this prevents content from showing through
    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(build_help_text(keys))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help - Key Bindings")
                .title_alignment(Alignment::Center)
                .style(Style::default().fg(fg_color).bg(bg_color)),
        )
        .style(Style::default().fg(fg_color).bg(bg_color))
        .wrap(ratatui::widgets::Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

/// Centered rect using a percentage of the available area
fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

fn build_help_text(keys: &KeyBindings) -> String {
    let mut text = String::new();

    text.push_str("Navigation:\n");
    text.push_str(&format!("  {} / {}: Move selection\n", key(&keys.list_up), key(&keys.list_down)));
    text.push_str(&format!("  {} / {}: Change window\n", key(&keys.prev_window), key(&keys.next_window)));
    text.push('\n');

    text.push_str("Tasks:\n");
    text.push_str(&format!("  {}: Complete / reopen task\n", key(&keys.toggle_task)));
    text.push_str(&format!("  {}: Start / stop pomodoro\n", key(&keys.toggle_timer)));
    text.push_str(&format!("  {}: Reset pomodoro\n", key(&keys.reset_timer)));
    text.push('\n');

    text.push_str("General:\n");
    text.push_str(&format!("  {}: Toggle dark mode\n", key(&keys.toggle_dark_mode)));
    text.push_str(&format!("  {}: Quit\n", key(&keys.quit)));
    text.push_str("  ?: Show/hide help\n");
    text.push_str("\nTasks are added and edited with the `taskdash` CLI.\n");

    text
}
