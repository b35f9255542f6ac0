use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;

use crate::config::Theme;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

const SEPARATOR: &str = " • ";
const ELLIPSIS: &str = "...";

/// Join as many hints as fit in `max_width`, ending with an ellipsis when some are dropped
pub fn fit_hints(hints: &[String], max_width: usize) -> String {
    let mut text = String::new();
    for hint in hints {
        let sep = if text.is_empty() { "" } else { SEPARATOR };
        let would_be = text.chars().count() + sep.chars().count() + hint.chars().count();
        if would_be > max_width {
            let keep = max_width.saturating_sub(ELLIPSIS.len());
            if text.is_empty() {
                text = hint.chars().take(keep).collect();
            } else if text.chars().count() > keep {
                text = text.chars().take(keep).collect();
            }
            text.push_str(ELLIPSIS);
            break;
        }
        text.push_str(sep);
        text.push_str(hint);
    }
    text
}

pub fn render_status_bar(f: &mut Frame, area: Rect, message: Option<&str>, key_hints: &[String], theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let max_width = usize::from(area.width);

    let (content, style) = match message {
        // Status messages get a highlighted background for visibility
        Some(msg) => {
            let content = if msg.chars().count() > max_width {
                msg.chars().take(max_width.saturating_sub(3)).collect::<String>() + ELLIPSIS
            } else {
                msg.to_string()
            };
            let msg_fg = get_contrast_text_color(highlight_bg);
            (content, Style::default().fg(msg_fg).bg(highlight_bg).add_modifier(Modifier::BOLD))
        }
        None => (fit_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color)),
    };

    f.render_widget(Paragraph::new(content).style(style), area);
}
