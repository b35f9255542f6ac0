use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use std::collections::HashMap;

use crate::config::Theme;
use crate::models::Task;
use crate::timer::{SessionTracker, format_clock};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color, priority_color};
use crate::utils::format_minutes;

/// Right-hand annotation: live timer while running, otherwise accumulated time
pub fn task_suffix(task: &Task, tracker: Option<&SessionTracker>) -> String {
    match tracker.filter(|t| t.is_running()) {
        Some(tracker) => format!(
            "⏱ {} / {}",
            format_clock(tracker.displayed_secs()),
            format_clock(tracker.target_secs())
        ),
        None if task.time_spent > 0 => format_minutes(u64::from(task.time_spent)),
        None => String::new(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        text.chars().take(max.saturating_sub(3)).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    tasks: &[Task],
    trackers: &HashMap<String, SessionTracker>,
    list_state: &mut ListState,
    theme: &Theme,
) {
    let fg_color = parse_color(&theme.fg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = get_contrast_text_color(highlight_bg);
    // 2 for borders, 2 for the status marker
    let max_width = usize::from(area.width.saturating_sub(4));

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let marker = if task.completed { "✓ " } else { "○ " };
            let suffix = task_suffix(task, trackers.get(&task.id));
            let category = task.category.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default();
            let title_width = max_width.saturating_sub(suffix.chars().count() + category.chars().count() + 4);
            let title = truncate(&task.text, title_width);
            let padding = max_width
                .saturating_sub(title.chars().count() + category.chars().count() + suffix.chars().count() + 2);

            let text_style = if task.completed {
                Style::default().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::styled("▌", Style::default().fg(priority_color(task.priority))),
                Span::raw(" "),
                Span::styled(title, text_style),
                Span::styled(category, Style::default().add_modifier(Modifier::DIM)),
                Span::raw(" ".repeat(padding)),
                Span::raw(suffix),
            ]))
        })
        .collect();

    let completed = tasks.iter().filter(|t| t.completed).count();
    let title = format!("Tasks ({}/{})", completed, tasks.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));

    f.render_stateful_widget(list, area, list_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn suffix_prefers_live_timer() {
        let now = Utc.with_ymd_and_hms(2025, 7, 30, 9, 0, 0).unwrap();
        let mut task = crate::sample::sample_tasks().remove(0);
        task.time_spent = 75;
        assert_eq!(task_suffix(&task, None), "1h 15m");

        let store = MemoryStore::new();
        let mut tracker = SessionTracker::new(task.id.clone(), 25);
        tracker.start(&store, now);
        tracker.resync(now + Duration::seconds(65));
        assert_eq!(task_suffix(&task, Some(&tracker)), "⏱ 01:05 / 25:00");

        task.time_spent = 0;
        tracker.stop(&store, now + Duration::seconds(70));
        assert_eq!(task_suffix(&task, Some(&tracker)), "");
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate("abcdefghij", 6), "abc...");
        assert_eq!(truncate("abc", 6), "abc");
    }
}
