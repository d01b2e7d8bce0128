//! The dashboard pipeline: base table + settings -> cleaned table, filtered view
//! and summary.
//!
//! [`run`] is a pure function. Widgets never edit a table in place; each
//! interaction produces a new [`DashboardSettings`] and the pipeline re-runs from
//! the base table.

use crate::cleaning::{self, AgeBins};
use crate::error::{DashboardError, Result};
use crate::filter::{self, DateRange, FilterChain};
use crate::summary::DashboardSummary;
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, info};
use txdash_cli::{Currency, FilterMode};

/// Logical dashboard field a column can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Date,
    Amount,
    Gender,
    Age,
    Segment,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Date, Role::Amount, Role::Gender, Role::Age, Role::Segment];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Date => "Transaction date",
            Self::Amount => "Transaction amount",
            Self::Gender => "Gender",
            Self::Age => "Age",
            Self::Segment => "Other filter",
        }
    }
}

/// Column assigned to each role; None means the role is unused.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleAssignment {
    pub date: Option<String>,
    pub amount: Option<String>,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub segment: Option<String>,
}

impl RoleAssignment {
    pub fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::Date => self.date.as_deref(),
            Role::Amount => self.amount.as_deref(),
            Role::Gender => self.gender.as_deref(),
            Role::Age => self.age.as_deref(),
            Role::Segment => self.segment.as_deref(),
        }
    }

    pub fn with(&self, role: Role, column: Option<String>) -> Self {
        let mut next = self.clone();
        let slot = match role {
            Role::Date => &mut next.date,
            Role::Amount => &mut next.amount,
            Role::Gender => &mut next.gender,
            Role::Age => &mut next.age,
            Role::Segment => &mut next.segment,
        };
        *slot = column;
        next
    }

    /// Every assigned column must exist in `df`.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        for role in Role::ALL {
            if let Some(column) = self.get(role) {
                if df.column(column).is_err() {
                    return Err(DashboardError::Processing(format!(
                        "{} column '{}' not found in the uploaded data",
                        role.label(),
                        column
                    )));
                }
            }
        }
        Ok(())
    }
}

/// All widget state that drives one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    pub roles: RoleAssignment,
    pub currency: Currency,
    /// None keeps every distinct gender value.
    pub gender_allow: Option<Vec<String>>,
    /// None keeps every distinct segment value.
    pub segment_allow: Option<Vec<String>>,
    pub age_bins: String,
    pub age_labels: String,
    pub filters: FilterChain,
    pub filter_mode: FilterMode,
    pub histogram_bins: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            roles: RoleAssignment::default(),
            currency: Currency::default(),
            gender_allow: None,
            segment_allow: None,
            age_bins: cleaning::DEFAULT_AGE_BINS.to_string(),
            age_labels: cleaning::DEFAULT_AGE_LABELS.to_string(),
            filters: FilterChain::default(),
            filter_mode: FilterMode::default(),
            histogram_bins: 20,
        }
    }
}

impl DashboardSettings {
    /// Reassign a role. Filters and allow-lists tied to that role are reset.
    pub fn with_role(&self, role: Role, column: Option<String>) -> Self {
        let mut next = self.clone();
        next.roles = self.roles.with(role, column);
        match role {
            Role::Gender => {
                next.gender_allow = None;
                next.filters.gender = Default::default();
            }
            Role::Segment => {
                next.segment_allow = None;
                next.filters.segment = Default::default();
            }
            Role::Age => next.filters.age_group = Default::default(),
            Role::Date => next.filters.date_range = None,
            Role::Amount => {}
        }
        next
    }

    pub fn with_filters(&self, filters: FilterChain) -> Self {
        Self {
            filters,
            ..self.clone()
        }
    }

    pub fn with_currency(&self, currency: Currency) -> Self {
        Self {
            currency,
            ..self.clone()
        }
    }

    pub fn with_filter_mode(&self, filter_mode: FilterMode) -> Self {
        Self {
            filter_mode,
            ..self.clone()
        }
    }

    pub fn with_age_bins(&self, bins: String, labels: String) -> Self {
        let mut next = self.clone();
        next.age_bins = bins;
        next.age_labels = labels;
        next.filters.age_group = Default::default();
        next
    }

    pub fn with_gender_allow(&self, allow: Vec<String>) -> Self {
        let mut next = self.clone();
        next.gender_allow = Some(allow);
        next.filters.gender = Default::default();
        next
    }

    pub fn with_segment_allow(&self, allow: Vec<String>) -> Self {
        let mut next = self.clone();
        next.segment_allow = Some(allow);
        next.filters.segment = Default::default();
        next
    }
}

/// Choices offered by the sidebar for the current settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidebarOptions {
    /// Distinct raw values, offered for the allow-lists.
    pub raw_genders: Vec<String>,
    pub raw_segments: Vec<String>,
    /// Filter pickers, each starting with "All".
    pub age_groups: Vec<String>,
    pub genders: Vec<String>,
    pub segments: Vec<String>,
    pub date_bounds: Option<DateRange>,
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct DashboardView {
    /// Cleaned table before filtering.
    pub table: DataFrame,
    pub filtered: DataFrame,
    pub summary: DashboardSummary,
    pub options: SidebarOptions,
}

impl DashboardView {
    pub fn is_empty(&self) -> bool {
        self.filtered.height() == 0
    }
}

/// Clean, bucket, filter and summarize `base` under `settings`.
pub fn run(base: &DataFrame, settings: &DashboardSettings) -> Result<DashboardView> {
    let started = Instant::now();
    let roles = &settings.roles;
    roles.validate(base)?;
    if let Some(amount) = roles.amount.as_deref() {
        cleaning::numeric_column(base, amount)?;
    }

    let mut options = SidebarOptions::default();
    let mut table = base.clone();

    if let Some(gender) = roles.gender.as_deref() {
        options.raw_genders = cleaning::distinct_values(base, gender)?;
        let allow = settings.gender_allow.as_ref().unwrap_or(&options.raw_genders);
        table = cleaning::collapse_categories(&table, gender, allow)?;
    }
    if let Some(age) = roles.age.as_deref() {
        table = cleaning::impute_median(&table, age)?;
    }
    if let Some(segment) = roles.segment.as_deref() {
        options.raw_segments = cleaning::distinct_values(base, segment)?;
        let allow = settings.segment_allow.as_ref().unwrap_or(&options.raw_segments);
        table = cleaning::collapse_categories(&table, segment, allow)?;
    }

    let bins = match roles.age.as_deref() {
        Some(age) => {
            let bins = AgeBins::parse(&settings.age_bins, &settings.age_labels)?;
            table = cleaning::bucket_ages(&table, age, &bins)?;
            options.age_groups = filter::age_group_options(&table, bins.labels())?;
            Some(bins)
        }
        None => None,
    };
    if let Some(date) = roles.date.as_deref() {
        table = filter::normalize_dates(&table, date)?;
        options.date_bounds = filter::date_bounds(&table, date)?;
    }
    if let Some(gender) = roles.gender.as_deref() {
        options.genders = filter::filter_options(&table, gender)?;
    }
    if let Some(segment) = roles.segment.as_deref() {
        options.segments = filter::filter_options(&table, segment)?;
    }

    // An unset range means the full bounds, so the date filter runs whenever a
    // date role is set.
    let mut chain = settings.filters.clone();
    if roles.date.is_some() && chain.date_range.is_none() {
        chain.date_range = options.date_bounds;
    }
    let filtered = filter::apply(&table, &chain, roles, settings.filter_mode)?;
    let summary = DashboardSummary::compute(
        &filtered,
        roles,
        bins.as_ref().map(|b| b.labels()),
        settings.histogram_bins,
    )?;

    debug!(rows = filtered.height(), "pipeline view ready");
    info!(
        cleaned = table.height(),
        filtered = filtered.height(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline run"
    );
    Ok(DashboardView {
        table,
        filtered,
        summary,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSelection;

    fn base() -> DataFrame {
        df!(
            "date" => ["2023-01-15", "bad", "2023-02-01", "2023-01-20"],
            "amount" => [10.0f64, 20.0, 30.0, 40.0],
            "gender" => [Some("F"), Some("M"), None, Some("X")],
            "age" => [Some(25.0f64), None, Some(45.0), Some(120.0)],
            "segment" => ["Mass", "HNW", "Mass", "Affluent"]
        )
        .unwrap()
    }

    fn all_roles() -> DashboardSettings {
        let s = DashboardSettings::default();
        s.with_role(Role::Date, Some("date".into()))
            .with_role(Role::Amount, Some("amount".into()))
            .with_role(Role::Gender, Some("gender".into()))
            .with_role(Role::Age, Some("age".into()))
            .with_role(Role::Segment, Some("segment".into()))
    }

    #[test]
    fn no_roles_passes_table_through() {
        let view = run(&base(), &DashboardSettings::default()).unwrap();
        assert_eq!(view.table.height(), 4);
        assert!(view.table.equals_missing(&base()));
        assert_eq!(view.summary.metrics.row_count, 4);
        assert!(view.summary.metrics.total_amount.is_none());
    }

    #[test]
    fn unknown_role_column_is_processing_error() {
        let settings = DashboardSettings::default().with_role(Role::Amount, Some("price".into()));
        let err = run(&base(), &settings).unwrap_err();
        assert!(matches!(err, DashboardError::Processing(ref m) if m.contains("price")));
    }

    #[test]
    fn full_run_cleans_buckets_and_drops_bad_dates() {
        let settings = all_roles().with_gender_allow(vec!["F".into(), "M".into()]);
        let view = run(&base(), &settings).unwrap();
        // "bad" date row dropped.
        assert_eq!(view.table.height(), 3);
        assert_eq!(view.options.raw_genders, vec!["F", "M", "X"]);
        assert_eq!(view.options.genders, vec!["All", "F", "Other"]);
        assert!(view.table.column(cleaning::AGE_GROUP_COLUMN).is_ok());
        assert_eq!(view.table.column("age").unwrap().null_count(), 0);
        assert_eq!(view.summary.metrics.total_amount, Some(80.0));
        assert!(view.options.date_bounds.is_some());
    }

    #[test]
    fn invalid_bins_fail_the_run() {
        let settings = all_roles().with_age_bins("0, 50, 20".into(), "a, b".into());
        let err = run(&base(), &settings).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidBinSpec(_)));

        // Without an age role the bin text is never parsed.
        let settings = settings.with_role(Role::Age, None);
        assert!(run(&base(), &settings).is_ok());
    }

    #[test]
    fn filters_flow_through_settings() {
        let settings = all_roles();
        let mut chain = settings.filters.clone();
        chain.segment = FilterSelection::Only("Mass".into());
        let view = run(&base(), &settings.with_filters(chain)).unwrap();
        assert_eq!(view.filtered.height(), 2);
        assert_eq!(view.summary.metrics.total_amount, Some(40.0));
        assert!(!view.is_empty());
    }

    #[test]
    fn reassigning_role_resets_its_filter() {
        let settings = all_roles();
        let mut chain = settings.filters.clone();
        chain.gender = FilterSelection::Only("F".into());
        let settings = settings.with_filters(chain);
        let next = settings.with_role(Role::Gender, Some("segment".into()));
        assert_eq!(next.filters.gender, FilterSelection::All);
        assert_eq!(settings.filters.gender, FilterSelection::Only("F".into()));
    }

    #[test]
    fn unset_date_range_matches_full_bounds_in_last_applied_mode() {
        let settings = all_roles().with_filter_mode(FilterMode::LastApplied);
        let mut chain = settings.filters.clone();
        chain.gender = FilterSelection::Only("F".into());
        let unset = run(&base(), &settings.with_filters(chain.clone())).unwrap();

        chain.date_range = unset.options.date_bounds;
        let explicit = run(&base(), &settings.with_filters(chain.clone())).unwrap();

        // The date filter re-derives from the cleaned table and drops the gender filter.
        assert_eq!(unset.filtered.height(), 3);
        assert_eq!(explicit.filtered.height(), 3);

        let conjunctive = run(
            &base(),
            &settings
                .with_filters(chain)
                .with_filter_mode(FilterMode::Conjunctive),
        )
        .unwrap();
        assert_eq!(conjunctive.filtered.height(), 1);
    }

    #[test]
    fn amount_text_that_is_not_a_number_is_an_error() {
        let df = df!("amount" => ["10", "$20", "30"]).unwrap();
        let settings = DashboardSettings::default().with_role(Role::Amount, Some("amount".into()));
        let err = run(&df, &settings).unwrap_err();
        assert!(matches!(err, DashboardError::Processing(ref m) if m.contains("'amount' is not numeric")));

        let df = df!("amount" => ["10", "20", "30"]).unwrap();
        let view = run(&df, &settings).unwrap();
        assert_eq!(view.summary.metrics.total_amount, Some(60.0));
    }
}
