//! Session-scoped dashboard state: the opened upload, the base table, the current
//! [`DashboardSettings`] and the last pipeline view, plus the sidebar cursor and
//! any open editor.
//!
//! Every sidebar interaction builds a new settings value and re-runs
//! [`pipeline::run`] over the base table.

use crate::dataset::{common_columns, LoadOptions, SheetSelection, Upload, Workbook};
use crate::error::{DashboardError, Result};
use crate::error_display::user_message;
use crate::filter::{DateRange, FilterSelection};
use crate::pipeline::{self, DashboardSettings, DashboardView, Role};
use crate::widgets::text_input::{TextInput, TextInputEvent};
use chrono::{Duration, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent};
use polars::prelude::DataFrame;
use tracing::{info, warn};
use txdash_cli::{Currency, FilterMode};

pub const NONE_OPTION: &str = "None";
const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Dashboard tabs, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Overview,
    Gender,
    Segment,
    TimeSeries,
    AgeGroups,
    Breakdown,
    Histogram,
    Data,
}

impl Tab {
    pub const ALL: [Tab; 8] = [
        Tab::Overview,
        Tab::Gender,
        Tab::Segment,
        Tab::TimeSeries,
        Tab::AgeGroups,
        Tab::Breakdown,
        Tab::Histogram,
        Tab::Data,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Gender => "Gender",
            Self::Segment => "Segments",
            Self::TimeSeries => "Daily",
            Self::AgeGroups => "Age groups",
            Self::Breakdown => "Breakdown",
            Self::Histogram => "Histogram",
            Self::Data => "Data",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarItem {
    Sheet,
    MergeWith,
    MergeOn,
    Role(Role),
    Currency,
    GenderValues,
    SegmentValues,
    AgeBins,
    AgeLabels,
    AgeGroupFilter,
    GenderFilter,
    SegmentFilter,
    StartDate,
    EndDate,
    FilterMode,
}

impl SidebarItem {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sheet => "Sheet",
            Self::MergeWith => "Merge with",
            Self::MergeOn => "Merge on",
            Self::Role(role) => role.label(),
            Self::Currency => "Currency",
            Self::GenderValues => "Gender values",
            Self::SegmentValues => "Filter values",
            Self::AgeBins => "Age bins",
            Self::AgeLabels => "Age labels",
            Self::AgeGroupFilter => "Age group",
            Self::GenderFilter => "Gender filter",
            Self::SegmentFilter => "Other filter",
            Self::StartDate => "Start date",
            Self::EndDate => "End date",
            Self::FilterMode => "Filter mode",
        }
    }

    /// Section heading drawn above the first item of each group.
    pub fn section(&self) -> &'static str {
        match self {
            Self::Sheet | Self::MergeWith | Self::MergeOn => "Sheets",
            Self::Role(_) | Self::Currency => "Columns",
            Self::GenderValues | Self::SegmentValues | Self::AgeBins | Self::AgeLabels => {
                "Cleaning"
            }
            _ => "Filters",
        }
    }
}

/// Sheet and merge choices for a multi-sheet workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetChoice {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub on: Option<String>,
}

impl SheetChoice {
    pub fn from_selection(selection: Option<&SheetSelection>) -> Self {
        match selection {
            Some(SheetSelection::Single(sheet)) => Self {
                primary: Some(sheet.clone()),
                ..Self::default()
            },
            Some(SheetSelection::Merge {
                primary,
                secondary,
                on,
            }) => Self {
                primary: Some(primary.clone()),
                secondary: Some(secondary.clone()),
                on: Some(on.clone()),
            },
            None => Self::default(),
        }
    }

    /// None until a primary sheet is chosen. A merge partner without a shared
    /// column still yields a merge so the load reports the missing column.
    pub fn selection(&self) -> Option<SheetSelection> {
        let primary = self.primary.clone()?;
        Some(match &self.secondary {
            Some(secondary) => SheetSelection::Merge {
                primary,
                secondary: secondary.clone(),
                on: self.on.clone().unwrap_or_default(),
            },
            None => SheetSelection::Single(primary),
        })
    }
}

/// Pop-up editor opened from the sidebar.
pub enum Editor {
    Text {
        item: SidebarItem,
        input: TextInput,
    },
    AllowList {
        role: Role,
        values: Vec<String>,
        checked: Vec<bool>,
        cursor: usize,
    },
}

pub struct DashboardSession {
    workbook: Workbook,
    sheets: SheetChoice,
    merge_columns: Vec<String>,
    base: Option<DataFrame>,
    columns: Vec<String>,
    settings: DashboardSettings,
    view: Option<DashboardView>,
    error: Option<String>,
    pub notice: Option<String>,
    pub tab: Tab,
    pub cursor: usize,
    pub editor: Option<Editor>,
    pub table_offset: usize,
}

impl DashboardSession {
    /// Open `upload` and run the pipeline once. Load and pipeline failures are kept
    /// for display; only an unreadable upload is an error here.
    pub fn open(
        upload: Upload,
        options: LoadOptions,
        selection: Option<&SheetSelection>,
        settings: DashboardSettings,
    ) -> Result<Self> {
        let workbook = Workbook::open(upload, options)?;
        info!(
            file = workbook.name(),
            sheets = workbook.sheet_names().len(),
            "opened upload"
        );
        let mut session = Self {
            workbook,
            sheets: SheetChoice::from_selection(selection),
            merge_columns: Vec::new(),
            base: None,
            columns: Vec::new(),
            settings,
            view: None,
            error: None,
            notice: None,
            tab: Tab::default(),
            cursor: 0,
            editor: None,
            table_offset: 0,
        };
        session.reload(false);
        Ok(session)
    }

    pub fn file_name(&self) -> &str {
        self.workbook.name()
    }

    pub fn sheet_names(&self) -> &[String] {
        self.workbook.sheet_names()
    }

    pub fn sheets(&self) -> &SheetChoice {
        &self.sheets
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn view(&self) -> Option<&DashboardView> {
        self.view.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True while a multi-sheet workbook is waiting for a sheet choice.
    pub fn awaiting_sheet(&self) -> bool {
        self.workbook.needs_selection() && self.sheets.primary.is_none()
    }

    /// Re-read the base table from the current sheet choice. With `prune_roles`,
    /// roles naming columns absent from the new table are cleared.
    fn reload(&mut self, prune_roles: bool) {
        self.table_offset = 0;
        self.refresh_merge_columns();
        if self.awaiting_sheet() {
            self.base = None;
            self.view = None;
            self.error = None;
            return;
        }

        match self.workbook.load(self.sheets.selection().as_ref()) {
            Ok(df) => {
                self.columns = df
                    .get_column_names()
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                if prune_roles {
                    for role in Role::ALL {
                        if let Some(column) = self.settings.roles.get(role) {
                            if !self.columns.iter().any(|c| c == column) {
                                self.settings = self.settings.with_role(role, None);
                            }
                        }
                    }
                }
                info!(rows = df.height(), cols = df.width(), "loaded base table");
                self.base = Some(df);
                self.view = None;
                self.recompute();
            }
            Err(e) => {
                warn!(error = %e, "could not load upload");
                self.base = None;
                self.view = None;
                self.columns.clear();
                self.error = Some(user_message(&e));
            }
        }
    }

    fn refresh_merge_columns(&mut self) {
        self.merge_columns.clear();
        let (Some(primary), Some(secondary)) = (&self.sheets.primary, &self.sheets.secondary)
        else {
            return;
        };
        let read_both = self
            .workbook
            .read_sheet(primary)
            .and_then(|left| Ok((left, self.workbook.read_sheet(secondary)?)));
        if let Ok((left, right)) = read_both {
            self.merge_columns = common_columns(&left, &right);
        }
        let on_is_shared = self
            .sheets
            .on
            .as_ref()
            .is_some_and(|on| self.merge_columns.contains(on));
        if !on_is_shared {
            self.sheets.on = self.merge_columns.first().cloned();
        }
    }

    /// Run the pipeline for the current settings. On failure the previous view is
    /// kept so the sidebar still offers its options.
    fn recompute(&mut self) {
        let Some(base) = &self.base else {
            return;
        };
        match pipeline::run(base, &self.settings) {
            Ok(view) => {
                self.view = Some(view);
                self.error = None;
            }
            Err(e) => {
                warn!(error = %e, "pipeline failed");
                self.error = Some(user_message(&e));
            }
        }
    }

    fn apply_settings(&mut self, settings: DashboardSettings) {
        if settings != self.settings {
            self.settings = settings;
            self.recompute();
        }
    }

    pub fn items(&self) -> Vec<SidebarItem> {
        let roles = &self.settings.roles;
        let mut items = Vec::new();
        if self.workbook.needs_selection() {
            items.push(SidebarItem::Sheet);
            if self.sheets.primary.is_some() {
                items.push(SidebarItem::MergeWith);
            }
            if self.sheets.secondary.is_some() {
                items.push(SidebarItem::MergeOn);
            }
        }
        if self.base.is_none() {
            return items;
        }
        items.extend(Role::ALL.iter().map(|r| SidebarItem::Role(*r)));
        items.push(SidebarItem::Currency);
        if roles.gender.is_some() {
            items.push(SidebarItem::GenderValues);
        }
        if roles.segment.is_some() {
            items.push(SidebarItem::SegmentValues);
        }
        if roles.age.is_some() {
            items.extend([
                SidebarItem::AgeBins,
                SidebarItem::AgeLabels,
                SidebarItem::AgeGroupFilter,
            ]);
        }
        if roles.gender.is_some() {
            items.push(SidebarItem::GenderFilter);
        }
        if roles.segment.is_some() {
            items.push(SidebarItem::SegmentFilter);
        }
        if roles.date.is_some() {
            items.extend([SidebarItem::StartDate, SidebarItem::EndDate]);
        }
        items.push(SidebarItem::FilterMode);
        items
    }

    pub fn selected_item(&self) -> Option<SidebarItem> {
        let items = self.items();
        items.get(self.cursor.min(items.len().saturating_sub(1))).copied()
    }

    /// Current value of a sidebar item, as displayed.
    pub fn item_value(&self, item: SidebarItem) -> String {
        let s = &self.settings;
        let allow_summary = |allow: &Option<Vec<String>>, raw: usize| match allow {
            None => format!("all {}", raw),
            Some(list) => format!("{} of {}", list.len(), raw),
        };
        let options = self.view.as_ref().map(|v| &v.options);
        match item {
            SidebarItem::Sheet => self
                .sheets
                .primary
                .clone()
                .unwrap_or_else(|| "(choose)".to_string()),
            SidebarItem::MergeWith => self
                .sheets
                .secondary
                .clone()
                .unwrap_or_else(|| NONE_OPTION.to_string()),
            SidebarItem::MergeOn => self
                .sheets
                .on
                .clone()
                .unwrap_or_else(|| "(no shared column)".to_string()),
            SidebarItem::Role(role) => s.roles.get(role).unwrap_or(NONE_OPTION).to_string(),
            SidebarItem::Currency => s.currency.symbol().to_string(),
            SidebarItem::GenderValues => allow_summary(
                &s.gender_allow,
                options.map(|o| o.raw_genders.len()).unwrap_or(0),
            ),
            SidebarItem::SegmentValues => allow_summary(
                &s.segment_allow,
                options.map(|o| o.raw_segments.len()).unwrap_or(0),
            ),
            SidebarItem::AgeBins => s.age_bins.clone(),
            SidebarItem::AgeLabels => s.age_labels.clone(),
            SidebarItem::AgeGroupFilter => s.filters.age_group.label().to_string(),
            SidebarItem::GenderFilter => s.filters.gender.label().to_string(),
            SidebarItem::SegmentFilter => s.filters.segment.label().to_string(),
            SidebarItem::StartDate => self
                .date_range()
                .map(|r| r.start.format(DATE_INPUT_FORMAT).to_string())
                .unwrap_or_else(|| "-".to_string()),
            SidebarItem::EndDate => self
                .date_range()
                .map(|r| r.end.format(DATE_INPUT_FORMAT).to_string())
                .unwrap_or_else(|| "-".to_string()),
            SidebarItem::FilterMode => s.filter_mode.as_str().to_string(),
        }
    }

    /// Effective date range: the chosen one, else the bounds of the date column.
    pub fn date_range(&self) -> Option<DateRange> {
        self.settings
            .filters
            .date_range
            .or_else(|| self.view.as_ref()?.options.date_bounds)
    }

    pub fn move_cursor(&mut self, down: bool) {
        let count = self.items().len();
        if count == 0 {
            return;
        }
        let current = self.cursor.min(count - 1);
        self.cursor = if down {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
    }

    /// Step the selected item's value (Left / Right on the sidebar).
    pub fn cycle(&mut self, forward: bool) {
        let Some(item) = self.selected_item() else {
            return;
        };
        self.notice = None;
        match item {
            SidebarItem::Sheet => {
                let names = self.workbook.sheet_names().to_vec();
                let next = cycle_value(&names, self.sheets.primary.as_deref(), forward);
                if next != self.sheets.primary {
                    if self.sheets.secondary == next {
                        self.sheets.secondary = None;
                    }
                    self.sheets.primary = next;
                    self.reload(true);
                }
            }
            SidebarItem::MergeWith => {
                let mut options = vec![NONE_OPTION.to_string()];
                options.extend(
                    self.workbook
                        .sheet_names()
                        .iter()
                        .filter(|n| Some(*n) != self.sheets.primary.as_ref())
                        .cloned(),
                );
                let current = self.sheets.secondary.as_deref().unwrap_or(NONE_OPTION);
                let next = cycle_value(&options, Some(current), forward)
                    .filter(|v| v != NONE_OPTION);
                self.sheets.secondary = next;
                self.sheets.on = None;
                self.reload(true);
            }
            SidebarItem::MergeOn => {
                let next = cycle_value(&self.merge_columns, self.sheets.on.as_deref(), forward);
                if next.is_some() && next != self.sheets.on {
                    self.sheets.on = next;
                    self.reload(true);
                }
            }
            SidebarItem::Role(role) => {
                let mut options = vec![NONE_OPTION.to_string()];
                options.extend(self.columns.iter().cloned());
                let current = self.settings.roles.get(role).unwrap_or(NONE_OPTION);
                let next = cycle_value(&options, Some(current), forward)
                    .filter(|v| v != NONE_OPTION);
                let settings = self.settings.with_role(role, next);
                self.apply_settings(settings);
            }
            SidebarItem::Currency => {
                let idx = Currency::ALL
                    .iter()
                    .position(|c| *c == self.settings.currency)
                    .unwrap_or(0);
                let len = Currency::ALL.len();
                let next = if forward {
                    (idx + 1) % len
                } else {
                    (idx + len - 1) % len
                };
                let settings = self.settings.with_currency(Currency::ALL[next]);
                self.apply_settings(settings);
            }
            SidebarItem::AgeGroupFilter | SidebarItem::GenderFilter | SidebarItem::SegmentFilter => {
                self.cycle_filter(item, forward)
            }
            SidebarItem::StartDate | SidebarItem::EndDate => {
                let step = if forward { 1 } else { -1 };
                if let Some(range) = self.date_range() {
                    let range = shift_range(range, item == SidebarItem::StartDate, step);
                    self.set_date_range(range);
                }
            }
            SidebarItem::FilterMode => {
                let mode = match self.settings.filter_mode {
                    FilterMode::Conjunctive => FilterMode::LastApplied,
                    FilterMode::LastApplied => FilterMode::Conjunctive,
                };
                let settings = self.settings.with_filter_mode(mode);
                self.apply_settings(settings);
            }
            SidebarItem::GenderValues
            | SidebarItem::SegmentValues
            | SidebarItem::AgeBins
            | SidebarItem::AgeLabels => {}
        }
    }

    fn cycle_filter(&mut self, item: SidebarItem, forward: bool) {
        let Some(view) = &self.view else {
            return;
        };
        let mut filters = self.settings.filters.clone();
        let (options, slot) = match item {
            SidebarItem::AgeGroupFilter => (&view.options.age_groups, &mut filters.age_group),
            SidebarItem::GenderFilter => (&view.options.genders, &mut filters.gender),
            _ => (&view.options.segments, &mut filters.segment),
        };
        if !options.is_empty() {
            let len = options.len();
            let next = match slot.position_in(options) {
                Some(i) if forward => (i + 1) % len,
                Some(i) => (i + len - 1) % len,
                None => 0,
            };
            *slot = FilterSelection::from_options(options, next);
        }
        let settings = self.settings.with_filters(filters);
        self.apply_settings(settings);
    }

    fn set_date_range(&mut self, range: DateRange) {
        let mut filters = self.settings.filters.clone();
        filters.date_range = Some(range);
        let settings = self.settings.with_filters(filters);
        self.apply_settings(settings);
    }

    /// Enter on the sidebar: open an editor for free-form items, else step forward.
    pub fn activate(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        self.notice = None;
        match item {
            SidebarItem::AgeBins
            | SidebarItem::AgeLabels
            | SidebarItem::StartDate
            | SidebarItem::EndDate => {
                let mut input = TextInput::new();
                input.set_value(&self.item_value(item));
                input.set_focused(true);
                self.editor = Some(Editor::Text { item, input });
            }
            SidebarItem::GenderValues | SidebarItem::SegmentValues => {
                let role = if item == SidebarItem::GenderValues {
                    Role::Gender
                } else {
                    Role::Segment
                };
                let Some(view) = &self.view else {
                    return;
                };
                let (values, allow) = match role {
                    Role::Gender => (&view.options.raw_genders, &self.settings.gender_allow),
                    _ => (&view.options.raw_segments, &self.settings.segment_allow),
                };
                let checked = values
                    .iter()
                    .map(|v| allow.as_ref().is_none_or(|a| a.contains(v)))
                    .collect();
                self.editor = Some(Editor::AllowList {
                    role,
                    values: values.clone(),
                    checked,
                    cursor: 0,
                });
            }
            _ => self.cycle(true),
        }
    }

    /// Route a key to the open editor. Returns false when no editor is open.
    pub fn handle_editor_key(&mut self, event: &KeyEvent) -> bool {
        let Some(editor) = self.editor.as_mut() else {
            return false;
        };
        match editor {
            Editor::Text { item, input } => match input.handle_key(event) {
                TextInputEvent::Submit => {
                    let (item, value) = (*item, input.value());
                    self.editor = None;
                    if let Err(e) = self.submit_text(item, value.trim()) {
                        self.notice = Some(user_message(&e));
                    }
                }
                TextInputEvent::Cancel => self.editor = None,
                TextInputEvent::None => {}
            },
            Editor::AllowList {
                role,
                values,
                checked,
                cursor,
            } => match event.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    *cursor = cursor.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if *cursor + 1 < values.len() {
                        *cursor += 1;
                    }
                }
                KeyCode::Char(' ') => {
                    if let Some(c) = checked.get_mut(*cursor) {
                        *c = !*c;
                    }
                }
                KeyCode::Char('a') => {
                    let all = checked.iter().all(|c| *c);
                    checked.iter_mut().for_each(|c| *c = !all);
                }
                KeyCode::Enter => {
                    let allow: Vec<String> = values
                        .iter()
                        .zip(checked.iter())
                        .filter(|(_, c)| **c)
                        .map(|(v, _)| v.clone())
                        .collect();
                    let settings = match role {
                        Role::Gender => self.settings.with_gender_allow(allow),
                        _ => self.settings.with_segment_allow(allow),
                    };
                    self.editor = None;
                    self.apply_settings(settings);
                }
                KeyCode::Esc => self.editor = None,
                _ => {}
            },
        }
        true
    }

    fn submit_text(&mut self, item: SidebarItem, value: &str) -> Result<()> {
        let s = &self.settings;
        let settings = match item {
            SidebarItem::AgeBins => s.with_age_bins(value.to_string(), s.age_labels.clone()),
            SidebarItem::AgeLabels => s.with_age_bins(s.age_bins.clone(), value.to_string()),
            SidebarItem::StartDate | SidebarItem::EndDate => {
                let date = NaiveDate::parse_from_str(value, DATE_INPUT_FORMAT).map_err(|_| {
                    DashboardError::Processing(format!("'{}' is not a YYYY-MM-DD date", value))
                })?;
                let Some(mut range) = self.date_range() else {
                    return Ok(());
                };
                if item == SidebarItem::StartDate {
                    range.start = date;
                } else {
                    range.end = date;
                }
                let mut filters = s.filters.clone();
                filters.date_range = Some(range);
                s.with_filters(filters)
            }
            _ => return Ok(()),
        };
        self.apply_settings(settings);
        Ok(())
    }

    pub fn scroll_table(&mut self, rows: isize) {
        let height = self.view.as_ref().map(|v| v.table.height()).unwrap_or(0);
        let offset = self.table_offset as isize + rows;
        self.table_offset = offset.clamp(0, height.saturating_sub(1) as isize) as usize;
    }
}

/// Next (or previous) entry of `options` after `current`, wrapping around. An
/// unknown `current` starts at the first entry.
fn cycle_value(options: &[String], current: Option<&str>, forward: bool) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let len = options.len();
    let next = match current.and_then(|c| options.iter().position(|o| o == c)) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None => 0,
    };
    Some(options[next].clone())
}

fn shift_range(range: DateRange, start: bool, days: i64) -> DateRange {
    let shift = |d: NaiveDate| d.checked_add_signed(Duration::days(days)).unwrap_or(d);
    if start {
        DateRange {
            start: shift(range.start),
            ..range
        }
    } else {
        DateRange {
            end: shift(range.end),
            ..range
        }
    }
}
