//! Sidebar rendering plus the editor pop-ups it opens.

use crate::dashboard::{DashboardSession, Editor};
use crate::render::context::RenderContext;
use crate::render::layout::centered_rect_fixed;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Widget};

pub fn render_sidebar(
    area: Rect,
    buf: &mut Buffer,
    session: &DashboardSession,
    ctx: &RenderContext,
    focused: bool,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ctx.border(focused)))
        .title(" Settings ");
    let inner = block.inner(area);
    block.render(area, buf);

    let items = session.items();
    if items.is_empty() {
        Paragraph::new("No columns loaded")
            .style(Style::default().fg(ctx.dimmed))
            .render(inner, buf);
        return;
    }

    let selected = session.cursor.min(items.len() - 1);
    let label_width = 18usize;
    let mut lines: Vec<ListItem> = Vec::new();
    let mut section = "";
    for (i, item) in items.iter().enumerate() {
        if item.section() != section {
            section = item.section();
            lines.push(ListItem::new(Line::styled(
                section,
                Style::default()
                    .fg(ctx.table_header)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        let marker = if i == selected { "▸ " } else { "  " };
        let value_style = if i == selected && focused {
            Style::default()
                .fg(ctx.keybind_hints)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(ctx.text_primary)
        };
        lines.push(ListItem::new(Line::from(vec![
            Span::styled(marker, Style::default().fg(ctx.keybind_hints)),
            Span::styled(
                format!("{:<width$}", item.label(), width = label_width),
                Style::default().fg(ctx.text_secondary),
            ),
            Span::styled(session.item_value(*item), value_style),
        ])));
    }

    // Keep the selected row visible on short terminals.
    let visible = inner.height as usize;
    let selected_line = lines_before(&items, selected) + selected;
    let skip = (selected_line + 1).saturating_sub(visible);
    List::new(lines.into_iter().skip(skip).collect::<Vec<_>>()).render(inner, buf);
}

/// Section headings drawn above item `index`.
fn lines_before(items: &[crate::dashboard::SidebarItem], index: usize) -> usize {
    let mut headings = 0;
    let mut section = "";
    for item in items.iter().take(index + 1) {
        if item.section() != section {
            section = item.section();
            headings += 1;
        }
    }
    headings
}

/// Pop-up for the open editor, if any.
pub fn render_editor(area: Rect, buf: &mut Buffer, session: &DashboardSession, ctx: &RenderContext) {
    let Some(editor) = &session.editor else {
        return;
    };
    match editor {
        Editor::Text { item, input } => {
            let rect = centered_rect_fixed(area, 60, 5);
            Clear.render(rect, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ctx.focused_border))
                .title(format!(" {} ", item.label()));
            let inner = block.inner(rect);
            block.render(rect, buf);
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
                .split(inner);
            input.render(rows[0], buf);
            Paragraph::new("Enter: apply  Esc: cancel")
                .style(Style::default().fg(ctx.dimmed))
                .render(rows[2], buf);
        }
        Editor::AllowList {
            role,
            values,
            checked,
            cursor,
        } => {
            let height = (values.len() as u16 + 4).min(area.height);
            let rect = centered_rect_fixed(area, 50, height);
            Clear.render(rect, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ctx.focused_border))
                .title(format!(" Keep {} values ", role.label().to_lowercase()))
                .title_bottom(" Space: toggle  a: all  Enter: apply ");
            let inner = block.inner(rect);
            block.render(rect, buf);

            let skip = (*cursor + 1).saturating_sub(inner.height as usize);
            let items: Vec<ListItem> = values
                .iter()
                .zip(checked.iter())
                .enumerate()
                .skip(skip)
                .map(|(i, (value, on))| {
                    let mark = if *on { "[x] " } else { "[ ] " };
                    let style = if i == *cursor {
                        Style::default()
                            .fg(ctx.keybind_hints)
                            .add_modifier(Modifier::REVERSED)
                    } else {
                        Style::default().fg(ctx.text_primary)
                    };
                    ListItem::new(Line::styled(format!("{}{}", mark, value), style))
                })
                .collect();
            List::new(items).render(inner, buf);
        }
    }
}
