use crate::render::context::RenderContext;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

/// Bottom bar of key hints, with an optional status on the right.
pub struct Controls {
    pub controls: Vec<(&'static str, &'static str)>,
    pub status: Option<String>,
    pub dimmed: bool,
    key_color: Color,
    label_color: Color,
    bar_bg: Color,
    dimmed_color: Color,
}

impl Controls {
    pub fn from_context(ctx: &RenderContext) -> Self {
        Self {
            controls: Vec::new(),
            status: None,
            dimmed: false,
            key_color: ctx.keybind_hints,
            label_color: ctx.keybind_labels,
            bar_bg: ctx.controls_bg,
            dimmed_color: ctx.dimmed,
        }
    }

    pub fn with_controls(mut self, controls: &[(&'static str, &'static str)]) -> Self {
        self.controls = controls.to_vec();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = self.controls.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });
        constraints.push(Constraint::Fill(1));
        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let (key_style, label_style) = if self.dimmed {
            let dim = Style::default().fg(self.dimmed_color);
            (dim, dim.bg(self.bar_bg))
        } else {
            (
                Style::default().fg(self.key_color),
                Style::default().fg(self.label_color).bg(self.bar_bg),
            )
        };

        for (i, (key, action)) in self.controls.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(key_style.bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(label_style)
                .render(layout[j + 1], buf);
        }

        let fill = layout[self.controls.len() * 2];
        Paragraph::new(self.status.clone().unwrap_or_default())
            .style(label_style)
            .right_aligned()
            .render(fill, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;

    fn rendered(controls: &Controls, width: u16) -> String {
        let area = Rect::new(0, 0, width, 1);
        let mut buf = Buffer::empty(area);
        controls.render(area, &mut buf);
        (0..width).map(|x| buf[(x, 0)].symbol().to_string()).collect()
    }

    #[test]
    fn renders_keys_labels_and_status() {
        let ctx = RenderContext::from_theme(&Theme::default());
        let controls = Controls::from_context(&ctx)
            .with_controls(&[("q", "Quit"), ("Tab", "Next tab")])
            .with_status("Rows: 42");
        let line = rendered(&controls, 60);
        assert!(line.contains("q"));
        assert!(line.contains("Quit"));
        assert!(line.contains("Next tab"));
        assert!(line.trim_end().ends_with("Rows: 42"));
    }
}
