//! Dataset loading: delimited text or spreadsheet uploads, sheet selection and
//! the optional left join of two sheets on a shared column.

use crate::error::{DashboardError, Result};
use calamine::{open_workbook_auto_from_rs, Data, DataType as _, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Temporary column used to restore primary-sheet row order after a join.
const JOIN_ROW_INDEX: &str = "__txdash_row";

/// Kind of uploaded file, detected from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Delimited,
    Spreadsheet,
}

impl FileKind {
    pub fn detect(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Delimited),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(Self::Spreadsheet),
            "" => Err(DashboardError::UnsupportedFormat(format!(
                "'{}' has no extension",
                name
            ))),
            other => Err(DashboardError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// An uploaded file: its name (used for kind detection) and raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn kind(&self) -> Result<FileKind> {
        FileKind::detect(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub infer_schema_length: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            infer_schema_length: 1000,
        }
    }
}

/// Which sheet(s) of a multi-sheet workbook become the record table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelection {
    Single(String),
    Merge {
        primary: String,
        secondary: String,
        on: String,
    },
}

/// An opened upload. Spreadsheets expose their sheet names before any sheet is read.
#[derive(Debug, Clone)]
pub struct Workbook {
    upload: Upload,
    kind: FileKind,
    sheet_names: Vec<String>,
    options: LoadOptions,
}

impl Workbook {
    pub fn open(upload: Upload, options: LoadOptions) -> Result<Self> {
        let kind = upload.kind()?;
        let sheet_names = match kind {
            FileKind::Delimited => Vec::new(),
            FileKind::Spreadsheet => {
                let workbook = open_workbook_auto_from_rs(Cursor::new(upload.bytes.as_slice()))?;
                let names = workbook.sheet_names().to_vec();
                if names.is_empty() {
                    return Err(DashboardError::Processing(
                        "Spreadsheet has no worksheets".to_string(),
                    ));
                }
                names
            }
        };
        info!(
            file = %upload.name,
            ?kind,
            sheets = sheet_names.len(),
            "opened upload"
        );
        Ok(Self {
            upload,
            kind,
            sheet_names,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.upload.name
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// True when the caller must pick a sheet (or two sheets to merge) before loading.
    pub fn needs_selection(&self) -> bool {
        self.sheet_names.len() > 1
    }

    /// Read one worksheet into a DataFrame, typing each column from its cells.
    pub fn read_sheet(&self, sheet: &str) -> Result<DataFrame> {
        if self.kind != FileKind::Spreadsheet {
            return Err(DashboardError::Processing(format!(
                "{} is not a spreadsheet",
                self.upload.name
            )));
        }
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(self.upload.bytes.as_slice()))?;
        let range = workbook.worksheet_range(sheet)?;
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
        let df = rows_to_dataframe(&rows)?;
        debug!(sheet, rows = df.height(), cols = df.width(), "read sheet");
        Ok(df)
    }

    /// Produce the record table. Single-sheet workbooks and delimited files ignore
    /// `selection`; multi-sheet workbooks require one.
    pub fn load(&self, selection: Option<&SheetSelection>) -> Result<DataFrame> {
        match self.kind {
            FileKind::Delimited => read_delimited(&self.upload.bytes, &self.options),
            FileKind::Spreadsheet => match selection {
                Some(SheetSelection::Single(sheet)) => self.read_sheet(sheet),
                Some(SheetSelection::Merge {
                    primary,
                    secondary,
                    on,
                }) => {
                    let left = self.read_sheet(primary)?;
                    let right = self.read_sheet(secondary)?;
                    merge_sheets(&left, &right, on, primary, secondary)
                }
                None if self.sheet_names.len() == 1 => self.read_sheet(&self.sheet_names[0]),
                None => Err(DashboardError::Processing(format!(
                    "{} has {} sheets; choose a sheet or two sheets to merge",
                    self.upload.name,
                    self.sheet_names.len()
                ))),
            },
        }
    }
}

fn read_delimited(bytes: &[u8], options: &LoadOptions) -> Result<DataFrame> {
    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(options.infer_schema_length))
        .map_parse_options(|opts| {
            opts.with_separator(options.delimiter)
                .with_try_parse_dates(true)
        });
    let df = CsvReader::new(Cursor::new(bytes.to_vec()))
        .with_options(read_options)
        .finish()?;
    trim_column_names(df)
}

fn trim_column_names(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        let trimmed = name.trim();
        if trimmed != name {
            df.rename(&name, trimmed.into())?;
        }
    }
    Ok(df)
}

/// Column names present in both tables, in primary-table order.
pub fn common_columns(primary: &DataFrame, secondary: &DataFrame) -> Vec<String> {
    let secondary_names: Vec<String> = secondary
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    primary
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|n| secondary_names.contains(n))
        .collect()
}

/// Left join `secondary` onto `primary` on `on`. Every primary row is kept, in order;
/// secondary fields without a match are null.
pub fn merge_sheets(
    primary: &DataFrame,
    secondary: &DataFrame,
    on: &str,
    primary_name: &str,
    secondary_name: &str,
) -> Result<DataFrame> {
    let shared = common_columns(primary, secondary);
    if !shared.iter().any(|c| c == on) {
        return Err(DashboardError::NoCommonColumn {
            primary: primary_name.to_string(),
            secondary: secondary_name.to_string(),
        });
    }

    let mut left = primary.clone().lazy();
    let mut right = secondary.clone().lazy();
    if primary.column(on)?.dtype() != secondary.column(on)?.dtype() {
        left = left.with_column(col(on).cast(DataType::String));
        right = right.with_column(col(on).cast(DataType::String));
    }

    let joined = left
        .with_row_index(JOIN_ROW_INDEX, None)
        .join(right, [col(on)], [col(on)], JoinArgs::new(JoinType::Left))
        .sort(
            [JOIN_ROW_INDEX],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;
    let merged = joined.drop(JOIN_ROW_INDEX)?;
    info!(
        on,
        primary = primary_name,
        secondary = secondary_name,
        rows = merged.height(),
        "merged sheets"
    );
    Ok(merged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellColumnType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
    Datetime,
}

/// First row is the header; remaining rows are data.
fn rows_to_dataframe(rows: &[Vec<Data>]) -> Result<DataFrame> {
    let Some(header_row) = rows.first() else {
        return Ok(DataFrame::empty());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| c.as_string().unwrap_or_else(|| c.to_string()))
        .collect();
    let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let cells: Vec<Option<&Data>> = rows[1..].iter().map(|row| row.get(idx)).collect();
        let name = match header.trim() {
            "" => format!("column_{}", idx + 1),
            h => h.to_string(),
        };
        let series = cells_to_series(&name, &cells, infer_cell_type(&cells))?;
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Whole-number floats become Int64; datetime cells (or strings that all parse as
/// dates) become Date, or Datetime when any value carries a time of day.
fn infer_cell_type(cells: &[Option<&Data>]) -> CellColumnType {
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_datetime = false;
    for cell in cells.iter().flatten() {
        if cell.is_empty() {
            continue;
        }
        if cell.is_string() {
            let all_parse = cells
                .iter()
                .flatten()
                .all(|c| c.is_empty() || cell_to_datetime(c).is_some());
            return if all_parse {
                temporal_type(cells)
            } else {
                CellColumnType::Utf8
            };
        }
        if cell.is_datetime() || cell.is_datetime_iso() {
            has_datetime = true;
        } else if cell.is_int() {
            has_int = true;
        } else if cell.is_float() {
            has_float = true;
        } else if cell.is_bool() {
            has_bool = true;
        }
    }
    if has_datetime {
        temporal_type(cells)
    } else if has_float {
        let all_whole = cells
            .iter()
            .flatten()
            .filter_map(|c| c.as_f64())
            .all(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10);
        if all_whole {
            CellColumnType::Int64
        } else {
            CellColumnType::Float64
        }
    } else if has_int {
        CellColumnType::Int64
    } else if has_bool {
        CellColumnType::Boolean
    } else {
        CellColumnType::Utf8
    }
}

fn temporal_type(cells: &[Option<&Data>]) -> CellColumnType {
    let midnight = NaiveTime::MIN;
    let all_midnight = cells
        .iter()
        .flatten()
        .filter_map(|c| cell_to_datetime(c))
        .all(|dt| dt.time() == midnight);
    if all_midnight {
        CellColumnType::Date
    } else {
        CellColumnType::Datetime
    }
}

fn cell_to_datetime(cell: &Data) -> Option<NaiveDateTime> {
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    parse_datetime_str(s)
}

/// Date/datetime formats accepted in text cells and CSV date columns, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%d %b %Y"];

/// Parses a date or datetime string; returns None for anything unrecognised.
pub fn parse_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

fn cells_to_series(name: &str, cells: &[Option<&Data>], col_type: CellColumnType) -> Result<Series> {
    let series = match col_type {
        CellColumnType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_i64()))
                .collect();
            Series::new(name.into(), v)
        }
        CellColumnType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        CellColumnType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        CellColumnType::Utf8 => {
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| c.filter(|cell| !cell.is_empty()).and_then(|cell| cell.as_string()))
                .collect();
            Series::new(name.into(), v)
        }
        CellColumnType::Date => {
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|c| c.and_then(cell_to_datetime).map(|dt| days_since_epoch(dt.date())))
                .collect();
            Series::new(name.into(), v).cast(&DataType::Date)?
        }
        CellColumnType::Datetime => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}

/// Physical representation of a polars Date.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()).num_days() as i32
}

/// Inverse of [`days_since_epoch`].
pub fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days as i64))
}
