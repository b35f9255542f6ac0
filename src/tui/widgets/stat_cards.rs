use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::analytics::TaskStats;
use crate::config::Theme;
use crate::tui::widgets::color::parse_color;
use crate::utils::format_minutes;

/// Headline numbers as (title, value) pairs, in display order
pub fn card_values(stats: &TaskStats) -> [(&'static str, String); 4] {
    [
        ("Tasks", format!("{}/{} done", stats.completed, stats.total)),
        ("Today", stats.completed_today.to_string()),
        ("Streak", format!("{} day{}", stats.streak, if stats.streak == 1 { "" } else { "s" })),
        ("Focus", format_minutes(stats.total_time_spent)),
    ]
}

pub fn render_stat_cards(f: &mut Frame, area: Rect, stats: &TaskStats, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let accent = parse_color(&theme.accent);

    let cards = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
    for ((title, value), card_area) in card_values(stats).into_iter().zip(cards.iter()) {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(fg_color));
        f.render_widget(paragraph, *card_area);
    }
}
