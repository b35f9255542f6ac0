use ratatui::layout::{Constraint, Direction, Layout as RatLayout, Rect};

pub struct Layout {
    pub inner_area: Rect, // Area inside the outer border
    pub tabs_area: Rect,
    pub cards_area: Rect,
    pub trend_area: Rect,
    pub time_area: Rect,
    pub priority_area: Rect,
    pub tasks_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum terminal dimensions required for the dashboard
    /// Width: four stat cards of 15 columns
    /// Height: tabs (1) + cards (3) + charts (7) + task list (5) + status (1) + 3 spare
    pub const MIN_WIDTH: u16 = 60;
    pub const MIN_HEIGHT: u16 = 20;

    pub fn calculate(size: Rect) -> Self {
        // Ensure minimum terminal size (accounting for outer border)
        let width = size.width.max(Self::MIN_WIDTH + 2);
        let height = size.height.max(Self::MIN_HEIGHT + 2);
        let size = Rect::new(size.x, size.y, width, height);

        let inner_area = Rect::new(
            size.x + 1,
            size.y + 1,
            size.width.saturating_sub(2),
            size.height.saturating_sub(2),
        );

        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),      // Window tabs
                Constraint::Length(3),      // Stat cards
                Constraint::Percentage(45), // Charts
                Constraint::Min(5),         // Task list
                Constraint::Length(1),      // Status
            ])
            .split(inner_area);

        let charts = RatLayout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Percentage(35),
                Constraint::Percentage(25),
            ])
            .split(vertical[2]);

        Self {
            inner_area,
            tabs_area: vertical[0],
            cards_area: vertical[1],
            trend_area: charts[0],
            time_area: charts[1],
            priority_area: charts[2],
            tasks_area: vertical[3],
            status_area: vertical[4],
        }
    }
}
