//! Cleaning and bucketing: categorical collapse, median imputation and the
//! derived `age_group` column.
//!
//! Every operation returns a new DataFrame; the input is never modified.

use crate::error::{DashboardError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Replacement value for categories outside the allow-list.
pub const OTHER: &str = "Other";

/// Name of the column added by [`bucket_ages`].
pub const AGE_GROUP_COLUMN: &str = "age_group";

pub const DEFAULT_AGE_BINS: &str = "0, 11, 27, 43, 59, 78, 100";
pub const DEFAULT_AGE_LABELS: &str = "Gen Alpha, Gen Z, Millennials, Gen X, Baby Boomers, Silent Gen";

/// Replace every value of `column` not in `allow_list` (and every missing value)
/// with [`OTHER`]. The column becomes a String column.
pub fn collapse_categories(df: &DataFrame, column: &str, allow_list: &[String]) -> Result<DataFrame> {
    let allowed: HashSet<&str> = allow_list.iter().map(|s| s.as_str()).collect();
    let values = df.column(column)?.cast(&DataType::String)?;
    let collapsed: Vec<&str> = values
        .str()?
        .iter()
        .map(|v| match v {
            Some(v) if allowed.contains(v) => v,
            _ => OTHER,
        })
        .collect();
    let mut out = df.clone();
    out.with_column(Series::new(column.into(), collapsed))?;
    debug!(column, allowed = allow_list.len(), "collapsed categories");
    Ok(out)
}

/// `column` as Float64. Present values that do not parse as numbers are an
/// error rather than null.
pub fn numeric_column(df: &DataFrame, column: &str) -> Result<Column> {
    df.column(column)?
        .cast_with_options(&DataType::Float64, CastOptions::Strict)
        .map_err(|_| DashboardError::Processing(format!("Column '{}' is not numeric", column)))
}

/// Median of the present values; an even count averages the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Fill missing values of a numeric column with the median of its present values.
/// The median is taken once, before any filling. A column with no present values
/// is returned unchanged.
pub fn impute_median(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let values = numeric_column(df, column)?;
    let present: Vec<f64> = values.f64()?.iter().flatten().collect();
    let Some(m) = median(&present) else {
        debug!(column, "no values present; imputation skipped");
        return Ok(df.clone());
    };
    let filled: Vec<f64> = values.f64()?.iter().map(|v| v.unwrap_or(m)).collect();
    let mut out = df.clone();
    out.with_column(Series::new(column.into(), filled))?;
    debug!(column, median = m, "imputed missing values");
    Ok(out)
}

/// Age bin boundaries and their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeBins {
    bounds: Vec<f64>,
    labels: Vec<String>,
}

impl Default for AgeBins {
    fn default() -> Self {
        Self {
            bounds: vec![0.0, 11.0, 27.0, 43.0, 59.0, 78.0, 100.0],
            labels: ["Gen Alpha", "Gen Z", "Millennials", "Gen X", "Baby Boomers", "Silent Gen"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AgeBins {
    pub fn new(bounds: Vec<f64>, labels: Vec<String>) -> Result<Self> {
        if bounds.len() < 2 {
            return Err(DashboardError::InvalidBinSpec(
                "at least two bin boundaries are required".to_string(),
            ));
        }
        if let Some(w) = bounds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DashboardError::InvalidBinSpec(format!(
                "bins must be strictly increasing ({} is not less than {})",
                w[0], w[1]
            )));
        }
        if labels.len() != bounds.len() - 1 {
            return Err(DashboardError::InvalidBinSpec(format!(
                "{} bins need {} labels, got {}",
                bounds.len(),
                bounds.len() - 1,
                labels.len()
            )));
        }
        Ok(Self { bounds, labels })
    }

    /// Parse comma-separated boundaries and labels, e.g. `"0, 18, 65"` and `"Minor, Adult"`.
    pub fn parse(bins_text: &str, labels_text: &str) -> Result<Self> {
        let bounds = bins_text
            .split(',')
            .map(|s| {
                let s = s.trim();
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| {
                        DashboardError::InvalidBinSpec(format!("'{}' is not a number", s))
                    })
            })
            .collect::<Result<Vec<f64>>>()?;
        let labels = labels_text
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        Self::new(bounds, labels)
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label of the half-open interval `[B[i], B[i+1])` containing `age`.
    pub fn label_for(&self, age: f64) -> Option<&str> {
        self.bounds
            .windows(2)
            .position(|w| w[0] <= age && age < w[1])
            .map(|i| self.labels[i].as_str())
    }
}

/// Add [`AGE_GROUP_COLUMN`], bucketing `column` with `bins`. Ages outside the
/// bins (or missing) get no group.
pub fn bucket_ages(df: &DataFrame, column: &str, bins: &AgeBins) -> Result<DataFrame> {
    let ages = numeric_column(df, column)?;
    let groups: Vec<Option<&str>> = ages
        .f64()?
        .iter()
        .map(|age| age.and_then(|a| bins.label_for(a)))
        .collect();
    let mut out = df.clone();
    out.with_column(Series::new(AGE_GROUP_COLUMN.into(), groups))?;
    Ok(out)
}

/// Distinct present values of `column` as strings, in first-appearance order.
pub fn distinct_values(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let values = df.column(column)?.cast(&DataType::String)?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for v in values.str()?.iter().flatten() {
        if seen.insert(v) {
            out.push(v.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
        df.column(column)
            .unwrap()
            .str()
            .unwrap()
            .iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect()
    }

    #[test]
    fn collapse_keeps_allowed_and_others_become_other() {
        let df = df!("gender" => [Some("F"), Some("M"), Some("U"), None, Some("Female")]).unwrap();
        let allow = vec!["F".to_string(), "M".to_string()];
        let out = collapse_categories(&df, "gender", &allow).unwrap();
        let values = strings(&out, "gender");
        assert_eq!(
            values,
            vec![
                Some("F".to_string()),
                Some("M".to_string()),
                Some(OTHER.to_string()),
                Some(OTHER.to_string()),
                Some(OTHER.to_string()),
            ]
        );
        for v in values.into_iter().flatten() {
            assert!(allow.contains(&v) || v == OTHER);
        }
    }

    #[test]
    fn collapse_is_idempotent() {
        let df = df!("seg" => [Some("Mass"), Some("HNW"), None, Some("Affluent")]).unwrap();
        let allow = vec!["Mass".to_string(), "Affluent".to_string()];
        let once = collapse_categories(&df, "seg", &allow).unwrap();
        let twice = collapse_categories(&once, "seg", &allow).unwrap();
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn collapse_numeric_codes_as_text() {
        let df = df!("code" => [1i64, 2, 3]).unwrap();
        let out = collapse_categories(&df, "code", &["2".to_string()]).unwrap();
        assert_eq!(
            strings(&out, "code"),
            vec![Some("Other".into()), Some("2".into()), Some("Other".into())]
        );
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn impute_fills_missing_and_keeps_median() {
        let df = df!("age" => [Some(20.0f64), None, Some(40.0), Some(30.0), None]).unwrap();
        let out = impute_median(&df, "age").unwrap();
        let values: Vec<Option<f64>> = out.column("age").unwrap().f64().unwrap().iter().collect();
        assert_eq!(
            values,
            vec![Some(20.0), Some(30.0), Some(40.0), Some(30.0), Some(30.0)]
        );
        // Median over the originally present positions is unchanged.
        let original: Vec<f64> = [0usize, 2, 3].iter().filter_map(|&i| values[i]).collect();
        assert_eq!(median(&original), Some(30.0));
    }

    #[test]
    fn impute_integer_column_and_all_missing_column() {
        let ints = df!("age" => [Some(10i64), None, Some(20)]).unwrap();
        let out = impute_median(&ints, "age").unwrap();
        assert_eq!(out.column("age").unwrap().null_count(), 0);

        let empty = df!("age" => [None::<f64>, None]).unwrap();
        let out = impute_median(&empty, "age").unwrap();
        assert_eq!(out.column("age").unwrap().null_count(), 2);
    }

    #[test]
    fn default_bins_assign_generations() {
        let bins = AgeBins::parse(DEFAULT_AGE_BINS, DEFAULT_AGE_LABELS).unwrap();
        assert_eq!(bins, AgeBins::default());
        assert_eq!(bins.label_for(0.0), Some("Gen Alpha"));
        assert_eq!(bins.label_for(10.999), Some("Gen Alpha"));
        assert_eq!(bins.label_for(11.0), Some("Gen Z"));
        assert_eq!(bins.label_for(99.9), Some("Silent Gen"));
        assert_eq!(bins.label_for(100.0), None);
        assert_eq!(bins.label_for(-1.0), None);
    }

    #[test]
    fn parse_rejects_bad_specs() {
        for (bins, labels) in [
            ("0, ten, 20", "a, b"),
            ("0, 10, 20", "a"),
            ("0, 20, 10", "a, b"),
            ("0, 10, 10", "a, b"),
            ("5", ""),
        ] {
            assert!(
                matches!(AgeBins::parse(bins, labels), Err(DashboardError::InvalidBinSpec(_))),
                "expected InvalidBinSpec for {bins:?} / {labels:?}"
            );
        }
    }

    #[test]
    fn parse_trims_labels() {
        let bins = AgeBins::parse("0,18,65", " Minor ,Adult").unwrap();
        assert_eq!(bins.labels(), &["Minor".to_string(), "Adult".to_string()]);
        assert_eq!(bins.bounds(), &[0.0, 18.0, 65.0]);
    }

    #[test]
    fn bucket_adds_age_group_column() {
        let df = df!("age" => [Some(5i64), Some(30), None, Some(120)]).unwrap();
        let out = bucket_ages(&df, "age", &AgeBins::default()).unwrap();
        assert_eq!(
            strings(&out, AGE_GROUP_COLUMN),
            vec![Some("Gen Alpha".into()), Some("Millennials".into()), None, None]
        );
        assert_eq!(out.column("age").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn distinct_values_first_appearance_order() {
        let df = df!("g" => [Some("M"), Some("F"), None, Some("M"), Some("U")]).unwrap();
        assert_eq!(distinct_values(&df, "g").unwrap(), vec!["M", "F", "U"]);
    }

    #[test]
    fn unparseable_ages_are_rejected_not_imputed() {
        let df = df!("age" => ["25", "unknown", "35"]).unwrap();
        let err = impute_median(&df, "age").unwrap_err();
        assert!(matches!(err, DashboardError::Processing(ref m) if m.contains("'age' is not numeric")));
        let err = bucket_ages(&df, "age", &AgeBins::default()).unwrap_err();
        assert!(matches!(err, DashboardError::Processing(_)));

        let numeric_text = df!("age" => [Some("25"), None, Some("35")]).unwrap();
        let out = impute_median(&numeric_text, "age").unwrap();
        let ages: Vec<f64> = out.column("age").unwrap().f64().unwrap().iter().flatten().collect();
        assert_eq!(ages, vec![25.0, 30.0, 35.0]);
    }
}
