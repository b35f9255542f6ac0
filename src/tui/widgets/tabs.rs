use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Tabs;

use crate::analytics::Window;
use crate::config::Theme;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

/// One tab per analytics window; the selected one bounds the charts
pub fn render_window_tabs(f: &mut Frame, area: Rect, current: Window, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = get_contrast_text_color(highlight_bg);

    let titles: Vec<Line> = Window::ALL
        .iter()
        .map(|window| {
            Line::from(vec![
                Span::raw(" "),
                Span::raw(format!("Last {}", window.label())),
                Span::raw(" "),
            ])
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(current.index())
        .style(Style::default().fg(fg_color).bg(bg_color))
        .highlight_style(
            Style::default()
                .fg(highlight_fg)
                .bg(highlight_bg)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" ")
        .padding("", "");

    f.render_widget(tabs, area);
}
