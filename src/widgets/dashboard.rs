//! Tabbed dashboard body: metric cards, charts and the data table.

use crate::dashboard::{DashboardSession, Tab};
use crate::dataset::days_since_epoch;
use crate::pipeline::DashboardView;
use crate::render::context::RenderContext;
use crate::summary::{format_currency, GroupTotal};
use polars::prelude::{AnyValue, DataFrame};
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, BorderType, Borders, Cell, Chart, Dataset, GraphType,
    Paragraph, Row, Table, Tabs, Widget, Wrap,
};
use txdash_cli::Currency;

const COLUMN_WIDTH: u16 = 16;

pub fn render_dashboard(
    area: Rect,
    buf: &mut Buffer,
    session: &DashboardSession,
    ctx: &RenderContext,
    table_row_limit: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Fill(1)])
        .split(area);

    Tabs::new(Tab::ALL.iter().map(|t| t.title()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ctx.sidebar_border)),
        )
        .select(session.tab.index())
        .style(Style::default().fg(ctx.text_secondary))
        .highlight_style(
            Style::default()
                .fg(ctx.keybind_hints)
                .add_modifier(Modifier::BOLD),
        )
        .render(chunks[0], buf);

    let body = chunks[1];
    if let Some(error) = session.error() {
        render_message(body, buf, " Error ", error, ctx.error, ctx);
        return;
    }
    if session.awaiting_sheet() {
        let text = format!(
            "{} has {} sheets. Choose a sheet in the sidebar, or a second sheet to merge with.",
            session.file_name(),
            session.sheet_names().len()
        );
        render_message(body, buf, " Choose a sheet ", &text, ctx.warning, ctx);
        return;
    }
    let Some(view) = session.view() else {
        render_message(body, buf, " No data ", "Nothing loaded yet.", ctx.dimmed, ctx);
        return;
    };
    if view.is_empty() {
        if session.tab != Tab::Data {
            render_message(body, buf, " No data ", "No data available", ctx.warning, ctx);
            return;
        }
        // The data tab still dumps the cleaned table under the warning.
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(body);
        render_message(parts[0], buf, " No data ", "No data available", ctx.warning, ctx);
        render_table(parts[1], buf, view, session.table_offset, table_row_limit, ctx);
        return;
    }

    let currency = session.settings().currency;
    match session.tab {
        Tab::Overview => render_overview(body, buf, view, currency, ctx),
        Tab::Gender => render_gender(body, buf, view, ctx),
        Tab::Segment => match &view.summary.by_segment {
            Some(totals) => render_bars(
                body,
                buf,
                " Amount by segment ",
                totals,
                currency,
                Direction::Horizontal,
                ctx,
            ),
            None => render_needs(body, buf, "segment and amount", ctx),
        },
        Tab::TimeSeries => render_daily(body, buf, view, currency, ctx),
        Tab::AgeGroups => match &view.summary.by_age_group {
            Some(totals) => render_bars(
                body,
                buf,
                " Amount by age group ",
                totals,
                currency,
                Direction::Vertical,
                ctx,
            ),
            None => render_needs(body, buf, "age and amount", ctx),
        },
        Tab::Breakdown => render_breakdown(body, buf, view, currency, ctx),
        Tab::Histogram => render_histogram(body, buf, view, ctx),
        Tab::Data => render_table(body, buf, view, session.table_offset, table_row_limit, ctx),
    }
}

fn panel<'a>(title: &'a str, ctx: &RenderContext) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ctx.sidebar_border))
        .title(title)
}

fn render_message(
    area: Rect,
    buf: &mut Buffer,
    title: &str,
    text: &str,
    color: ratatui::style::Color,
    ctx: &RenderContext,
) {
    Paragraph::new(text)
        .style(Style::default().fg(color))
        .wrap(Wrap { trim: true })
        .block(panel(title, ctx).border_style(Style::default().fg(color)))
        .render(area, buf);
}

fn render_needs(area: Rect, buf: &mut Buffer, roles: &str, ctx: &RenderContext) {
    let text = format!("Assign the {} columns in the sidebar to see this view.", roles);
    render_message(area, buf, " Not available ", &text, ctx.dimmed, ctx);
}

fn render_overview(
    area: Rect,
    buf: &mut Buffer,
    view: &DashboardView,
    currency: Currency,
    ctx: &RenderContext,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Fill(1)])
        .split(area);
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Fill(1), Constraint::Fill(1)])
        .split(rows[0]);

    let metrics = &view.summary.metrics;
    let total = metrics
        .total_amount
        .map(|t| format_currency(currency, t))
        .unwrap_or_else(|| "-".to_string());
    for (rect, title, value) in [
        (cards[0], " Transactions ", metrics.row_count.to_string()),
        (cards[1], " Total amount ", total),
    ] {
        Paragraph::new(Line::styled(
            value,
            Style::default()
                .fg(ctx.metric_value)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(panel(title, ctx))
        .render(rect, buf);
    }

    match &view.summary.monthly {
        Some(monthly) => render_bars(
            rows[1],
            buf,
            " Amount per month ",
            monthly,
            currency,
            Direction::Vertical,
            ctx,
        ),
        None => render_needs(rows[1], buf, "date and amount", ctx),
    }
}

/// Bar heights are whole units; negative totals draw as empty bars but keep
/// their formatted value.
fn render_bars(
    area: Rect,
    buf: &mut Buffer,
    title: &str,
    totals: &[GroupTotal],
    currency: Currency,
    direction: Direction,
    ctx: &RenderContext,
) {
    let bars: Vec<Bar> = totals
        .iter()
        .map(|t| {
            Bar::default()
                .value(t.total.max(0.0).round() as u64)
                .label(Line::from(t.key.to_string()))
                .text_value(format_currency(currency, t.total))
                .style(Style::default().fg(ctx.primary_series))
                .value_style(
                    Style::default()
                        .fg(ctx.text_primary)
                        .bg(ctx.primary_series),
                )
        })
        .collect();
    let mut chart = BarChart::default()
        .block(panel(title, ctx))
        .data(BarGroup::default().bars(&bars))
        .bar_gap(1)
        .direction(direction);
    if direction == Direction::Vertical {
        chart = chart.bar_width(bar_width(area.width, bars.len()));
    }
    chart.render(area, buf);
}

fn bar_width(width: u16, count: usize) -> u16 {
    if count == 0 {
        return 1;
    }
    let available = width.saturating_sub(2) as usize / count;
    available.saturating_sub(1).clamp(1, 14) as u16
}

fn share_bar(share: f64, width: usize) -> String {
    "█".repeat((share.clamp(0.0, 1.0) * width as f64).round() as usize)
}

fn render_gender(area: Rect, buf: &mut Buffer, view: &DashboardView, ctx: &RenderContext) {
    let Some(shares) = &view.summary.gender_share else {
        render_needs(area, buf, "gender", ctx);
        return;
    };
    let bar_space = area.width.saturating_sub(2 + COLUMN_WIDTH + 10 + 10 + 3) as usize;
    let rows: Vec<Row> = shares
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.key.to_string()),
                Cell::from(s.count.to_string()),
                Cell::from(format!("{:.1}%", s.share * 100.0)),
                Cell::from(share_bar(s.share, bar_space))
                    .style(Style::default().fg(ctx.primary_series)),
            ])
        })
        .collect();
    Table::new(
        rows,
        [
            Constraint::Length(COLUMN_WIDTH),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Fill(1),
        ],
    )
    .header(header_row(&["Gender", "Count", "Share", ""], ctx))
    .block(panel(" Gender distribution ", ctx))
    .render(area, buf);
}

fn render_daily(
    area: Rect,
    buf: &mut Buffer,
    view: &DashboardView,
    currency: Currency,
    ctx: &RenderContext,
) {
    let Some(daily) = &view.summary.daily else {
        render_needs(area, buf, "date and amount", ctx);
        return;
    };
    let (Some(first), Some(last)) = (daily.first(), daily.last()) else {
        return;
    };
    let points: Vec<(f64, f64)> = daily
        .iter()
        .map(|d| (days_since_epoch(d.date) as f64, d.total))
        .collect();
    let x_min = days_since_epoch(first.date) as f64;
    let x_max = (days_since_epoch(last.date) as f64).max(x_min + 1.0);
    let y_min = points.iter().map(|p| p.1).fold(0.0f64, f64::min);
    let y_max = points.iter().map(|p| p.1).fold(f64::MIN, f64::max).max(y_min + 1.0);

    let dataset = Dataset::default()
        .name("amount")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(ctx.primary_series))
        .data(&points);
    let axis_style = Style::default().fg(ctx.text_secondary);
    Chart::new(vec![dataset])
        .block(panel(" Daily amount ", ctx))
        .x_axis(
            Axis::default()
                .style(axis_style)
                .bounds([x_min, x_max])
                .labels([
                    first.date.format("%Y-%m-%d").to_string(),
                    last.date.format("%Y-%m-%d").to_string(),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(axis_style)
                .bounds([y_min, y_max])
                .labels([
                    format_currency(currency, y_min),
                    format_currency(currency, y_max),
                ]),
        )
        .render(area, buf);
}

fn render_breakdown(
    area: Rect,
    buf: &mut Buffer,
    view: &DashboardView,
    currency: Currency,
    ctx: &RenderContext,
) {
    let Some(breakdown) = &view.summary.breakdown else {
        render_needs(area, buf, "segment, gender and amount", ctx);
        return;
    };
    let rows: Vec<Row> = breakdown
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.segment.to_string()),
                Cell::from(r.gender.to_string()),
                Cell::from(Line::from(format_currency(currency, r.total)).right_aligned()),
            ])
        })
        .collect();
    Table::new(
        rows,
        [
            Constraint::Length(COLUMN_WIDTH * 2),
            Constraint::Length(COLUMN_WIDTH),
            Constraint::Length(COLUMN_WIDTH),
        ],
    )
    .header(header_row(&["Segment", "Gender", "Amount"], ctx))
    .block(panel(" Amount by segment and gender ", ctx))
    .render(area, buf);
}

fn render_histogram(area: Rect, buf: &mut Buffer, view: &DashboardView, ctx: &RenderContext) {
    let Some(bins) = &view.summary.histogram else {
        render_needs(area, buf, "amount", ctx);
        return;
    };
    let bars: Vec<Bar> = bins
        .iter()
        .map(|b| {
            Bar::default()
                .value(b.count as u64)
                .label(Line::from(format!("{:.0}", b.lower)))
                .style(Style::default().fg(ctx.secondary_series))
        })
        .collect();
    BarChart::default()
        .block(panel(" Amount distribution ", ctx))
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width(area.width, bars.len()))
        .bar_gap(1)
        .render(area, buf);
}

fn header_row<'a>(titles: &[&'a str], ctx: &RenderContext) -> Row<'a> {
    Row::new(titles.iter().map(|t| Cell::from(*t))).style(
        Style::default()
            .fg(ctx.table_header)
            .bg(ctx.table_header_bg)
            .add_modifier(Modifier::BOLD),
    )
}

/// Display text for one cell of the data table.
pub fn cell_text(value: AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Float64(v) => format!("{:.2}", v),
        AnyValue::Float32(v) => format!("{:.2}", v),
        other => other.to_string(),
    }
}

fn render_table(
    area: Rect,
    buf: &mut Buffer,
    view: &DashboardView,
    offset: usize,
    row_limit: usize,
    ctx: &RenderContext,
) {
    let df: &DataFrame = &view.table;
    let limit = df.height().min(row_limit);
    let visible = area.height.saturating_sub(3) as usize;
    let start = offset.min(limit.saturating_sub(1));
    let end = (start + visible).min(limit);

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let rows: Vec<Row> = (start..end)
        .map(|i| {
            Row::new(
                df.get_columns()
                    .iter()
                    .map(|c| Cell::from(c.get(i).map(cell_text).unwrap_or_default())),
            )
        })
        .collect();
    let widths = vec![Constraint::Length(COLUMN_WIDTH); names.len()];
    let title = if df.height() > row_limit {
        format!(
            " Cleaned data (rows {}-{} of first {} / {}) ",
            start + 1,
            end,
            limit,
            df.height()
        )
    } else {
        format!(" Cleaned data (rows {}-{} of {}) ", start + 1, end, df.height())
    };

    Table::new(rows, widths)
        .header(Row::new(names.into_iter().map(|n| {
            Cell::from(Span::styled(
                n,
                Style::default()
                    .fg(ctx.table_header)
                    .add_modifier(Modifier::BOLD),
            ))
        })))
        .column_spacing(1)
        .block(panel(&title, ctx))
        .render(area, buf);
}
