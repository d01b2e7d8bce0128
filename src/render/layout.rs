use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Sidebar width on the dashboard screen.
pub const SIDEBAR_WIDTH: u16 = 40;

/// Top-level vertical layout: title row, main view, control bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppLayout {
    pub title: Rect,
    pub main_view: Rect,
    pub control_bar: Rect,
}

pub fn app_layout(area: Rect) -> AppLayout {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .split(area);

    AppLayout {
        title: layout[0],
        main_view: layout[1],
        control_bar: layout[2],
    }
}

/// Dashboard split: sidebar on the left, tabbed content on the right.
pub fn dashboard_layout(area: Rect) -> (Rect, Rect) {
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
        .split(area);
    (layout[0], layout[1])
}

/// Centered rect with fixed width and height, clamped to fit inside `r`.
pub fn centered_rect_fixed(r: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(r.width);
    let h = height.min(r.height);
    Rect {
        x: r.x + r.width.saturating_sub(w) / 2,
        y: r.y + r.height.saturating_sub(h) / 2,
        width: w,
        height: h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_layout_reserves_title_and_controls() {
        let l = app_layout(Rect::new(0, 0, 80, 24));
        assert_eq!(l.title.height, 1);
        assert_eq!(l.control_bar.height, 1);
        assert_eq!(l.control_bar.y, 23);
        assert_eq!(l.main_view.height, 22);
    }

    #[test]
    fn centered_rect_is_clamped() {
        let r = centered_rect_fixed(Rect::new(0, 0, 20, 10), 50, 4);
        assert_eq!(r, Rect::new(0, 3, 20, 4));
    }
}
