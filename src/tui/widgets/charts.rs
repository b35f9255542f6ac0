use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Sparkline};
use std::collections::BTreeMap;

use crate::analytics::{PriorityBreakdown, SeriesSummary, TimePoint, TrendPoint, Window};
use crate::config::Theme;
use crate::models::Priority;
use crate::tui::widgets::color::{parse_color, priority_color};
use crate::utils::format_minutes;

/// Sum consecutive values into at most `max_buckets` buckets, keeping order.
/// The last bucket absorbs the remainder.
pub fn bucket(values: &[u64], max_buckets: usize) -> Vec<u64> {
    if max_buckets == 0 || values.is_empty() {
        return Vec::new();
    }
    if values.len() <= max_buckets {
        return values.to_vec();
    }
    let size = values.len().div_ceil(max_buckets);
    values.chunks(size).map(|chunk| chunk.iter().sum()).collect()
}

/// Completed tasks per day over the window
pub fn render_trend_chart(f: &mut Frame, area: Rect, trend: &[TrendPoint], window: Window, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let accent = parse_color(&theme.accent);

    let values: Vec<u64> = trend.iter().map(|p| u64::from(p.completed)).collect();
    // Each bar needs two columns (bar + gap) inside the borders
    let max_bars = usize::from(area.width.saturating_sub(2) / 2);
    let per_bar = values.len().div_ceil(max_bars.max(1)).max(1);
    let bars: Vec<Bar> = bucket(&values, max_bars)
        .into_iter()
        .map(|value| Bar::default().value(value).text_value(String::new()))
        .collect();

    let title = if per_bar > 1 {
        format!("Completed ({}, {} days/bar)", window, per_bar)
    } else {
        format!("Completed ({})", window)
    };
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_width(1)
        .bar_gap(1)
        .bar_style(Style::default().fg(accent))
        .style(Style::default().fg(fg_color));
    f.render_widget(chart, area);
}

/// Minutes per day with the window's totals underneath
pub fn render_time_chart(f: &mut Frame, area: Rect, time: &[TimePoint], summary: &SeriesSummary, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let accent = parse_color(&theme.accent);

    let block = Block::default().borders(Borders::ALL).title("Focus time");
    let inner = block.inner(area);
    f.render_widget(block.style(Style::default().fg(fg_color)), area);

    let [spark_area, summary_area] = Layout::vertical([Constraint::Min(1), Constraint::Length(2)]).areas(inner);

    let values: Vec<u64> = time.iter().map(|p| p.total_minutes).collect();
    let values = bucket(&values, usize::from(spark_area.width));
    let sparkline = Sparkline::default()
        .data(values.iter().copied())
        .style(Style::default().fg(accent));
    f.render_widget(sparkline, spark_area);

    let lines = vec![
        Line::from(format!("Total {}  Best day {}", format_minutes(summary.total), format_minutes(summary.max))),
        Line::from(format!("Avg {:.1} min/day", summary.average)),
    ];
    f.render_widget(Paragraph::new(lines).style(Style::default().fg(fg_color)), summary_area);
}

fn breakdown_line(label: &str, breakdown: &PriorityBreakdown) -> Line<'static> {
    let mut spans = vec![Span::raw(format!("{:<8}", label))];
    for priority in Priority::ALL {
        spans.push(Span::styled(
            format!("{}:{:<3} ", &priority.as_str()[..1].to_uppercase(), breakdown.get(priority)),
            Style::default().fg(priority_color(priority)),
        ));
    }
    Line::from(spans)
}

/// Pending tasks and completions per window, by priority
pub fn render_priority_panel(
    f: &mut Frame,
    area: Rect,
    pending: &PriorityBreakdown,
    completed: &BTreeMap<Window, PriorityBreakdown>,
    current: Window,
    theme: &Theme,
) {
    let fg_color = parse_color(&theme.fg);

    let mut lines = vec![breakdown_line("Pending", pending), Line::from("Completed")];
    for (window, breakdown) in completed {
        let line = breakdown_line(&format!(" {}", window.label()), breakdown);
        lines.push(if *window == current {
            line.style(Style::default().add_modifier(Modifier::BOLD))
        } else {
            line
        });
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Priorities"))
        .style(Style::default().fg(fg_color));
    f.render_widget(paragraph, area);
}
