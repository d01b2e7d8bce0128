use crate::config::Theme;
use ratatui::style::Color;

/// Snapshot of theme colors passed to widgets instead of many individual parameters.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub keybind_hints: Color,
    pub keybind_labels: Color,
    pub controls_bg: Color,
    pub primary_series: Color,
    pub secondary_series: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub dimmed: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub table_header: Color,
    pub table_header_bg: Color,
    pub sidebar_border: Color,
    pub focused_border: Color,
    pub metric_value: Color,
}

impl RenderContext {
    pub fn from_theme(theme: &Theme) -> Self {
        Self {
            keybind_hints: theme.get("keybind_hints"),
            keybind_labels: theme.get("keybind_labels"),
            controls_bg: theme.get("controls_bg"),
            primary_series: theme.get("primary_chart_series_color"),
            secondary_series: theme.get("secondary_chart_series_color"),
            success: theme.get("success"),
            warning: theme.get("warning"),
            error: theme.get("error"),
            dimmed: theme.get("dimmed"),
            text_primary: theme.get("text_primary"),
            text_secondary: theme.get("text_secondary"),
            table_header: theme.get("table_header"),
            table_header_bg: theme.get("table_header_bg"),
            sidebar_border: theme.get("sidebar_border"),
            focused_border: theme.get("focused_border"),
            metric_value: theme.get("metric_value"),
        }
    }

    /// Border color for a pane, highlighted when it has focus.
    pub fn border(&self, focused: bool) -> Color {
        if focused {
            self.focused_border
        } else {
            self.sidebar_border
        }
    }
}
