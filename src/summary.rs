//! Aggregations behind the dashboard's metric cards and chart views.

use crate::cleaning::{numeric_column, AGE_GROUP_COLUMN};
use crate::dataset::date_from_days;
use crate::error::Result;
use crate::pipeline::RoleAssignment;
use chrono::NaiveDate;
use polars::prelude::*;
use std::fmt;
use txdash_cli::Currency;

const TOTAL: &str = "__total";
const COUNT: &str = "__count";
const MONTH: &str = "__month";

/// Key of a grouped result. Missing keys are a bucket of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Value(String),
    Missing,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Missing => write!(f, "(missing)"),
        }
    }
}

impl From<Option<&str>> for GroupKey {
    fn from(v: Option<&str>) -> Self {
        match v {
            Some(v) => Self::Value(v.to_string()),
            None => Self::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupTotal {
    pub key: GroupKey,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupShare {
    pub key: GroupKey,
    pub count: usize,
    /// Fraction of rows in the view, 0.0..=1.0.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub segment: GroupKey,
    pub gender: GroupKey,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// Equal-width bin `[lower, upper)`; the last bin also includes `upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub row_count: usize,
    /// Present only when an amount column is assigned.
    pub total_amount: Option<f64>,
}

/// Everything the dashboard renders for one filtered view. Each field is None
/// when the roles it needs are not assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub metrics: Metrics,
    pub monthly: Option<Vec<GroupTotal>>,
    pub gender_share: Option<Vec<GroupShare>>,
    pub by_segment: Option<Vec<GroupTotal>>,
    pub daily: Option<Vec<DailyTotal>>,
    pub by_age_group: Option<Vec<GroupTotal>>,
    pub breakdown: Option<Vec<BreakdownRow>>,
    pub histogram: Option<Vec<HistogramBin>>,
}

impl DashboardSummary {
    /// `age_labels` is Some only when age bucketing succeeded for this view.
    pub fn compute(
        view: &DataFrame,
        roles: &RoleAssignment,
        age_labels: Option<&[String]>,
        histogram_bins: usize,
    ) -> Result<Self> {
        let amount = roles.amount.as_deref();
        let date = roles.date.as_deref();
        let gender = roles.gender.as_deref();
        let segment = roles.segment.as_deref();

        let metrics = Metrics {
            row_count: view.height(),
            total_amount: amount.map(|a| amount_sum(view, a)).transpose()?,
        };

        let monthly = match (date, amount) {
            (Some(d), Some(a)) => Some(monthly_totals(view, d, a)?),
            _ => None,
        };
        let gender_share = gender.map(|g| shares(view, g)).transpose()?;
        let by_segment = match (segment, amount) {
            (Some(s), Some(a)) => Some(grouped_sum(view, s, a)?),
            _ => None,
        };
        let daily = match (date, amount) {
            (Some(d), Some(a)) => Some(daily_totals(view, d, a)?),
            _ => None,
        };
        let by_age_group = match (roles.age.as_deref(), amount, age_labels) {
            (Some(_), Some(a), Some(labels)) if view.column(AGE_GROUP_COLUMN).is_ok() => {
                Some(age_group_totals(view, a, labels)?)
            }
            _ => None,
        };
        let breakdown = match (segment, gender, amount) {
            (Some(s), Some(g), Some(a)) if s != g => Some(breakdown(view, s, g, a)?),
            _ => None,
        };
        let histogram = amount
            .map(|a| histogram(view, a, histogram_bins))
            .transpose()?;

        Ok(Self {
            metrics,
            monthly,
            gender_share,
            by_segment,
            daily,
            by_age_group,
            breakdown,
            histogram,
        })
    }
}

fn amounts(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let values = numeric_column(df, column)?;
    Ok(values.f64()?.iter().collect())
}

fn amount_sum(df: &DataFrame, column: &str) -> Result<f64> {
    Ok(amounts(df, column)?.into_iter().flatten().sum())
}

fn keys(df: &DataFrame, column: &str) -> Result<Vec<GroupKey>> {
    let text = df.column(column)?.cast(&DataType::String)?;
    Ok(text.str()?.iter().map(GroupKey::from).collect())
}

fn grouped_frame(df: &DataFrame, by: &[&str], amount: &str) -> Result<DataFrame> {
    let by_exprs: Vec<Expr> = by.iter().map(|c| col(*c)).collect();
    let sort_by: Vec<PlSmallStr> = by.iter().map(|c| PlSmallStr::from(*c)).collect();
    let out = df
        .clone()
        .lazy()
        .group_by(by_exprs)
        .agg([col(amount).strict_cast(DataType::Float64).sum().alias(TOTAL)])
        .sort(
            sort_by,
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?;
    Ok(out)
}

/// Sum of `amount` per distinct value of `key`, sorted by key with missing last.
pub fn grouped_sum(df: &DataFrame, key: &str, amount: &str) -> Result<Vec<GroupTotal>> {
    let out = grouped_frame(df, &[key], amount)?;
    let totals = amounts(&out, TOTAL)?;
    Ok(keys(&out, key)?
        .into_iter()
        .zip(totals)
        .map(|(key, total)| GroupTotal {
            key,
            total: total.unwrap_or(0.0),
        })
        .collect())
}

fn monthly_totals(df: &DataFrame, date: &str, amount: &str) -> Result<Vec<GroupTotal>> {
    let days = df.column(date)?.cast(&DataType::Int32)?;
    let months: Vec<Option<String>> = days
        .i32()?
        .iter()
        .map(|d| d.and_then(date_from_days).map(|d| d.format("%Y-%m").to_string()))
        .collect();
    let mut with_month = df.clone();
    with_month.with_column(Series::new(MONTH.into(), months))?;
    grouped_sum(&with_month, MONTH, amount)
}

fn daily_totals(df: &DataFrame, date: &str, amount: &str) -> Result<Vec<DailyTotal>> {
    let out = grouped_frame(df, &[date], amount)?;
    let days = out.column(date)?.cast(&DataType::Int32)?;
    let totals = amounts(&out, TOTAL)?;
    Ok(days
        .i32()?
        .iter()
        .zip(totals)
        .filter_map(|(d, total)| {
            d.and_then(date_from_days).map(|date| DailyTotal {
                date,
                total: total.unwrap_or(0.0),
            })
        })
        .collect())
}

fn shares(df: &DataFrame, key: &str) -> Result<Vec<GroupShare>> {
    let out = df
        .clone()
        .lazy()
        .group_by([col(key)])
        .agg([len().alias(COUNT)])
        .sort(
            [key],
            SortMultipleOptions::default().with_nulls_last(true),
        )
        .collect()?;
    let counts = out.column(COUNT)?.cast(&DataType::UInt64)?;
    let rows = df.height().max(1) as f64;
    Ok(keys(&out, key)?
        .into_iter()
        .zip(counts.u64()?.iter())
        .map(|(key, count)| {
            let count = count.unwrap_or(0) as usize;
            GroupShare {
                key,
                count,
                share: count as f64 / rows,
            }
        })
        .collect())
}

fn age_group_totals(df: &DataFrame, amount: &str, labels: &[String]) -> Result<Vec<GroupTotal>> {
    let mut totals = grouped_sum(df, AGE_GROUP_COLUMN, amount)?;
    let rank = |key: &GroupKey| match key {
        GroupKey::Value(v) => labels.iter().position(|l| l == v).unwrap_or(labels.len()),
        GroupKey::Missing => labels.len() + 1,
    };
    totals.sort_by_key(|t| rank(&t.key));
    Ok(totals)
}

fn breakdown(df: &DataFrame, segment: &str, gender: &str, amount: &str) -> Result<Vec<BreakdownRow>> {
    let out = grouped_frame(df, &[segment, gender], amount)?;
    let totals = amounts(&out, TOTAL)?;
    Ok(keys(&out, segment)?
        .into_iter()
        .zip(keys(&out, gender)?)
        .zip(totals)
        .map(|((segment, gender), total)| BreakdownRow {
            segment,
            gender,
            total: total.unwrap_or(0.0),
        })
        .collect())
}

/// Equal-width frequency distribution of the present values of `amount`.
pub fn histogram(df: &DataFrame, amount: &str, bins: usize) -> Result<Vec<HistogramBin>> {
    let values: Vec<f64> = amounts(df, amount)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Ok(Vec::new());
    };
    if min == max {
        return Ok(vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }]);
    }
    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    Ok(out)
}

/// Symbol-prefixed amount with thousands separators and two decimals, e.g. `$1,234.56`.
pub fn format_currency(currency: Currency, amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}{}.{}", sign, currency.symbol(), grouped, frac_part)
}
