//! Filter stage: equality filters on age group, gender and segment, and an
//! inclusive date range.

use crate::cleaning::{distinct_values, AGE_GROUP_COLUMN};
use crate::dataset::{date_from_days, days_since_epoch, parse_datetime_str};
use crate::error::{DashboardError, Result};
use crate::pipeline::RoleAssignment;
use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;
use txdash_cli::FilterMode;

/// Option shown first in every categorical filter.
pub const ALL: &str = "All";

/// One categorical predicate: disabled, or pinned to a single value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterSelection {
    #[default]
    All,
    Only(String),
}

impl FilterSelection {
    /// Selection for picker option `index`. Option 0 is the [`ALL`] sentinel; a
    /// category that happens to be named "All" sits at a later index.
    pub fn from_options(options: &[String], index: usize) -> Self {
        match options.get(index) {
            Some(value) if index > 0 => Self::Only(value.clone()),
            _ => Self::All,
        }
    }

    /// Index of this selection among picker `options`.
    pub fn position_in(&self, options: &[String]) -> Option<usize> {
        match self {
            Self::All => (!options.is_empty()).then_some(0),
            Self::Only(v) => options.iter().skip(1).position(|o| o == v).map(|i| i + 1),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL,
            Self::Only(v) => v,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Only(_))
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterChain {
    pub age_group: FilterSelection,
    pub gender: FilterSelection,
    pub segment: FilterSelection,
    /// None means the full range of the date column.
    pub date_range: Option<DateRange>,
}

/// Convert `column` to the Date dtype and drop rows whose date is missing or
/// cannot be parsed.
pub fn normalize_dates(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let source = df.column(column)?;
    let dates: Series = match source.dtype() {
        DataType::Date => source.as_materialized_series().clone(),
        DataType::Datetime(_, _) => source.cast(&DataType::Date)?.as_materialized_series().clone(),
        _ => {
            let text = source.cast(&DataType::String)?;
            let days: Vec<Option<i32>> = text
                .str()?
                .iter()
                .map(|v| v.and_then(parse_datetime_str).map(|dt| days_since_epoch(dt.date())))
                .collect();
            Series::new(column.into(), days).cast(&DataType::Date)?
        }
    };
    let mut out = df.clone();
    out.with_column(dates)?;
    let before = out.height();
    let mask = out.column(column)?.is_not_null();
    let out = out.filter(&mask)?;
    if out.height() < before {
        debug!(column, dropped = before - out.height(), "dropped rows with unparseable dates");
    }
    Ok(out)
}

fn day_numbers(df: &DataFrame, column: &str) -> Result<Vec<Option<i32>>> {
    let col = df.column(column)?;
    if col.dtype() != &DataType::Date {
        return Err(DashboardError::Processing(format!(
            "Date column '{}' has not been normalized",
            column
        )));
    }
    let days = col.cast(&DataType::Int32)?;
    Ok(days.i32()?.iter().collect())
}

/// Earliest and latest date of a normalized date column; None when it is empty.
pub fn date_bounds(df: &DataFrame, column: &str) -> Result<Option<DateRange>> {
    let days = day_numbers(df, column)?;
    let present = days.iter().flatten();
    let (Some(min), Some(max)) = (present.clone().min(), present.max()) else {
        return Ok(None);
    };
    Ok(date_from_days(*min)
        .zip(date_from_days(*max))
        .map(|(start, end)| DateRange { start, end }))
}

/// Picker options for a categorical column: [`ALL`] then its distinct values.
pub fn filter_options(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let mut options = vec![ALL.to_string()];
    options.extend(distinct_values(df, column)?);
    Ok(options)
}

/// Picker options for the age-group filter, in bin label order, restricted to
/// groups that occur.
pub fn age_group_options(df: &DataFrame, labels: &[String]) -> Result<Vec<String>> {
    let present = distinct_values(df, AGE_GROUP_COLUMN)?;
    let mut options = vec![ALL.to_string()];
    options.extend(labels.iter().filter(|l| present.contains(l)).cloned());
    Ok(options)
}

fn equals_mask(df: &DataFrame, column: &str, value: &str) -> Result<BooleanChunked> {
    let text = df.column(column)?.cast(&DataType::String)?;
    Ok(text.str()?.iter().map(|v| v == Some(value)).collect())
}

fn filter_equals(df: &DataFrame, column: &str, value: &str) -> Result<DataFrame> {
    let mask = equals_mask(df, column, value)?;
    Ok(df.filter(&mask)?)
}

fn filter_dates(df: &DataFrame, column: &str, range: &DateRange) -> Result<DataFrame> {
    let start = days_since_epoch(range.start);
    let end = days_since_epoch(range.end);
    let mask: BooleanChunked = day_numbers(df, column)?
        .into_iter()
        .map(|d| d.is_some_and(|d| start <= d && d <= end))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Apply `chain` to `cleaned` in the order age group, gender, segment, date.
///
/// In [`FilterMode::Conjunctive`] each active filter narrows the result of the
/// previous one. In [`FilterMode::LastApplied`] each active filter is applied to
/// `cleaned` itself, so only the last active filter holds.
pub fn apply(
    cleaned: &DataFrame,
    chain: &FilterChain,
    roles: &RoleAssignment,
    mode: FilterMode,
) -> Result<DataFrame> {
    let mut view = cleaned.clone();
    let source = |view: &DataFrame| match mode {
        FilterMode::Conjunctive => view.clone(),
        FilterMode::LastApplied => cleaned.clone(),
    };

    let has_age_group = cleaned.column(AGE_GROUP_COLUMN).is_ok() && roles.age.is_some();
    if let (true, FilterSelection::Only(group)) = (has_age_group, &chain.age_group) {
        view = filter_equals(&source(&view), AGE_GROUP_COLUMN, group)?;
    }
    if let (Some(col), FilterSelection::Only(value)) = (&roles.gender, &chain.gender) {
        view = filter_equals(&source(&view), col, value)?;
    }
    if let (Some(col), FilterSelection::Only(value)) = (&roles.segment, &chain.segment) {
        view = filter_equals(&source(&view), col, value)?;
    }
    if let (Some(col), Some(range)) = (&roles.date, &chain.date_range) {
        view = filter_dates(&source(&view), col, range)?;
    }
    debug!(
        mode = mode.as_str(),
        rows = view.height(),
        of = cleaned.height(),
        "applied filters"
    );
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roles() -> RoleAssignment {
        RoleAssignment {
            date: Some("date".into()),
            amount: Some("amount".into()),
            gender: Some("gender".into()),
            age: Some("age".into()),
            segment: Some("segment".into()),
        }
    }

    fn sample() -> DataFrame {
        let df = df!(
            "date" => ["2022-12-31", "2023-01-15", "2023-02-01", "2023-01-20"],
            "amount" => [1.0f64, 2.0, 3.0, 4.0],
            "gender" => ["F", "M", "F", "F"],
            "age" => [25i64, 30, 45, 60],
            "segment" => ["Mass", "Mass", "HNW", "HNW"],
            "age_group" => ["Millennials", "Millennials", "Gen X", "Baby Boomers"]
        )
        .unwrap();
        normalize_dates(&df, "date").unwrap()
    }

    fn amounts(df: &DataFrame) -> Vec<f64> {
        df.column("amount").unwrap().f64().unwrap().iter().flatten().collect()
    }

    #[test]
    fn january_range_keeps_only_mid_january() {
        let df = df!(
            "date" => ["2022-12-31", "2023-01-15", "2023-02-01"],
            "amount" => [1.0f64, 2.0, 3.0]
        )
        .unwrap();
        let df = normalize_dates(&df, "date").unwrap();
        let chain = FilterChain {
            date_range: Some(DateRange {
                start: ymd(2023, 1, 1),
                end: ymd(2023, 1, 31),
            }),
            ..FilterChain::default()
        };
        let roles = RoleAssignment {
            date: Some("date".into()),
            ..RoleAssignment::default()
        };
        let view = apply(&df, &chain, &roles, FilterMode::Conjunctive).unwrap();
        assert_eq!(amounts(&view), vec![2.0]);
    }

    #[test]
    fn normalize_drops_unparseable_dates() {
        let df = df!(
            "date" => [Some("2023-01-15"), Some("garbage"), None, Some("01/20/2023")],
            "amount" => [1.0f64, 2.0, 3.0, 4.0]
        )
        .unwrap();
        let out = normalize_dates(&df, "date").unwrap();
        assert_eq!(out.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(amounts(&out), vec![1.0, 4.0]);
    }

    #[test]
    fn date_bounds_cover_column() {
        let bounds = date_bounds(&sample(), "date").unwrap().unwrap();
        assert_eq!(bounds.start, ymd(2022, 12, 31));
        assert_eq!(bounds.end, ymd(2023, 2, 1));
    }

    #[test]
    fn conjunctive_mode_intersects_filters() {
        let chain = FilterChain {
            gender: FilterSelection::Only("F".into()),
            segment: FilterSelection::Only("HNW".into()),
            ..FilterChain::default()
        };
        let view = apply(&sample(), &chain, &roles(), FilterMode::Conjunctive).unwrap();
        assert_eq!(amounts(&view), vec![3.0, 4.0]);

        let chain = FilterChain {
            gender: FilterSelection::Only("M".into()),
            segment: FilterSelection::Only("HNW".into()),
            ..FilterChain::default()
        };
        let view = apply(&sample(), &chain, &roles(), FilterMode::Conjunctive).unwrap();
        assert_eq!(view.height(), 0);
    }

    #[test]
    fn last_applied_mode_keeps_only_last_active_filter() {
        let chain = FilterChain {
            gender: FilterSelection::Only("M".into()),
            segment: FilterSelection::Only("HNW".into()),
            ..FilterChain::default()
        };
        let view = apply(&sample(), &chain, &roles(), FilterMode::LastApplied).unwrap();
        assert_eq!(amounts(&view), vec![3.0, 4.0]);
    }

    #[test]
    fn age_group_filter_requires_age_role() {
        let chain = FilterChain {
            age_group: FilterSelection::Only("Gen X".into()),
            ..FilterChain::default()
        };
        let view = apply(&sample(), &chain, &roles(), FilterMode::Conjunctive).unwrap();
        assert_eq!(amounts(&view), vec![3.0]);

        let no_age = RoleAssignment {
            age: None,
            ..roles()
        };
        let view = apply(&sample(), &chain, &no_age, FilterMode::Conjunctive).unwrap();
        assert_eq!(view.height(), 4);
    }

    #[test]
    fn options_start_with_all() {
        let df = sample();
        assert_eq!(filter_options(&df, "gender").unwrap(), vec!["All", "F", "M"]);
        let labels: Vec<String> = ["Gen Z", "Millennials", "Gen X", "Baby Boomers"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            age_group_options(&df, &labels).unwrap(),
            vec!["All", "Millennials", "Gen X", "Baby Boomers"]
        );
    }

    #[test]
    fn selection_by_option_index() {
        let options: Vec<String> = ["All", "F", "All"].iter().map(|s| s.to_string()).collect();
        assert_eq!(FilterSelection::from_options(&options, 0), FilterSelection::All);
        assert_eq!(
            FilterSelection::from_options(&options, 1),
            FilterSelection::Only("F".into())
        );
        // A real category named "All" stays selectable.
        let all_value = FilterSelection::from_options(&options, 2);
        assert_eq!(all_value, FilterSelection::Only("All".into()));
        assert!(all_value.is_active());
        assert_eq!(all_value.position_in(&options), Some(2));
        assert_eq!(FilterSelection::All.position_in(&options), Some(0));
        assert_eq!(FilterSelection::Only("M".into()).position_in(&options), None);
        assert_eq!(FilterSelection::Only("F".into()).label(), "F");
    }
}
