mod common;

use common::{write_file, TRANSACTIONS_CSV};
use polars::prelude::*;
use std::path::Path;
use tempfile::TempDir;
use txdash::cleaning::AGE_GROUP_COLUMN;
use txdash::cli::{Currency, FilterMode};
use txdash::dataset::{common_columns, merge_sheets, LoadOptions, SheetSelection, Upload, Workbook};
use txdash::error::DashboardError;
use txdash::filter::{DateRange, FilterSelection};
use txdash::pipeline::{self, DashboardSettings, Role};
use txdash::summary::{format_currency, GroupKey};

fn load_transactions() -> (TempDir, DataFrame) {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "transactions.csv", TRANSACTIONS_CSV);
    let upload = Upload::from_path(&path).unwrap();
    let workbook = Workbook::open(upload, LoadOptions::default()).unwrap();
    assert!(!workbook.needs_selection());
    let df = workbook.load(None).unwrap();
    (dir, df)
}

fn all_roles() -> DashboardSettings {
    DashboardSettings::default()
        .with_role(Role::Date, Some("transaction_date".into()))
        .with_role(Role::Amount, Some("amount".into()))
        .with_role(Role::Gender, Some("gender".into()))
        .with_role(Role::Age, Some("age".into()))
        .with_role(Role::Segment, Some("segment".into()))
}

fn date(s: &str) -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn full_pipeline_over_csv_upload() {
    let (_dir, base) = load_transactions();
    assert_eq!(base.height(), 7);

    let view = pipeline::run(&base, &all_roles()).unwrap();
    // The "not a date" row is dropped once a date role is set.
    assert_eq!(view.table.height(), 6);
    assert_eq!(view.summary.metrics.row_count, 6);
    assert_eq!(view.summary.metrics.total_amount, Some(805.75));
    assert_eq!(
        format_currency(Currency::Usd, view.summary.metrics.total_amount.unwrap()),
        "$805.75"
    );

    let monthly = view.summary.monthly.unwrap();
    let months: Vec<String> = monthly.iter().map(|m| m.key.to_string()).collect();
    assert_eq!(months, vec!["2023-01", "2023-02", "2023-03"]);
    assert_eq!(monthly[0].total, 425.75);

    assert_eq!(
        view.options.date_bounds,
        Some(DateRange {
            start: date("2023-01-05"),
            end: date("2023-03-01"),
        })
    );
}

#[test]
fn january_range_keeps_only_january_rows() {
    let (_dir, base) = load_transactions();
    let settings = all_roles();
    let mut filters = settings.filters.clone();
    filters.date_range = Some(DateRange {
        start: date("2023-01-01"),
        end: date("2023-01-31"),
    });
    let view = pipeline::run(&base, &settings.with_filters(filters)).unwrap();
    assert_eq!(view.filtered.height(), 3);
    assert_eq!(view.summary.metrics.total_amount, Some(425.75));
    let daily = view.summary.daily.unwrap();
    assert!(daily.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(daily.last().unwrap().date, date("2023-01-31"));
}

#[test]
fn missing_segment_collapses_to_other() {
    let (_dir, base) = load_transactions();
    let view = pipeline::run(&base, &all_roles()).unwrap();
    let keys: Vec<GroupKey> = view
        .summary
        .by_segment
        .unwrap()
        .into_iter()
        .map(|t| t.key)
        .collect();
    assert!(keys.contains(&GroupKey::Value("Other".into())));
    assert!(!keys.contains(&GroupKey::Missing));
    assert_eq!(view.options.raw_segments, vec!["Mass", "Affluent", "HNW"]);
}

#[test]
fn missing_age_is_imputed_with_median_and_bucketed() {
    let (_dir, base) = load_transactions();
    let view = pipeline::run(&base, &all_roles()).unwrap();

    let ages = view.table.column("age").unwrap().f64().unwrap().clone();
    assert_eq!(ages.null_count(), 0);
    // Median of 25, 41, 67, 15, 30, 33 is 31.5.
    assert!(ages.iter().flatten().any(|a| a == 31.5));

    let groups = view.table.column(AGE_GROUP_COLUMN).unwrap().str().unwrap().clone();
    let labels: Vec<&str> = groups.iter().flatten().collect();
    assert!(labels.contains(&"Gen Z"));
    assert!(labels.contains(&"Baby Boomers"));
    assert_eq!(view.options.age_groups[0], "All");

    let by_age = view.summary.by_age_group.unwrap();
    let order: Vec<String> = by_age.iter().map(|g| g.key.to_string()).collect();
    assert_eq!(order, vec!["Gen Z", "Millennials", "Baby Boomers"]);
}

#[test]
fn custom_bins_partition_every_age() {
    let (_dir, base) = load_transactions();
    let settings = all_roles().with_age_bins("0, 18, 65, 120".into(), " Minor , Adult ,Senior".into());
    let view = pipeline::run(&base, &settings).unwrap();
    let groups = view.table.column(AGE_GROUP_COLUMN).unwrap().str().unwrap().clone();
    assert_eq!(groups.null_count(), 0);
    assert_eq!(view.options.age_groups, vec!["All", "Minor", "Adult", "Senior"]);
}

#[test]
fn invalid_bins_are_reported() {
    let (_dir, base) = load_transactions();
    let settings = all_roles().with_age_bins("0, 18, 65".into(), "Young".into());
    let err = pipeline::run(&base, &settings).unwrap_err();
    assert!(matches!(err, DashboardError::InvalidBinSpec(_)));
}

#[test]
fn filter_modes_differ_on_stacked_filters() {
    let (_dir, base) = load_transactions();
    let settings = all_roles();
    let mut filters = settings.filters.clone();
    filters.gender = FilterSelection::Only("F".into());
    filters.segment = FilterSelection::Only("Affluent".into());
    let settings = settings.with_filters(filters);

    let conjunctive = pipeline::run(&base, &settings).unwrap();
    assert_eq!(conjunctive.filtered.height(), 1);
    assert_eq!(conjunctive.summary.metrics.total_amount, Some(60.0));

    // The date filter always runs last when a date role is set, so it alone holds.
    let last_applied = settings.with_filter_mode(FilterMode::LastApplied);
    let view = pipeline::run(&base, &last_applied).unwrap();
    assert_eq!(view.filtered.height(), 6);

    // Without a date role the segment filter is the last one applied.
    let mut undated = last_applied.with_role(Role::Date, None);
    undated.filters.gender = FilterSelection::Only("F".into());
    undated.filters.segment = FilterSelection::Only("Affluent".into());
    let view = pipeline::run(&base, &undated).unwrap();
    assert_eq!(view.filtered.height(), 2);
}

#[test]
fn filter_with_no_match_yields_empty_view() {
    let (_dir, base) = load_transactions();
    let settings = all_roles();
    let mut filters = settings.filters.clone();
    filters.date_range = Some(DateRange {
        start: date("2024-01-01"),
        end: date("2024-12-31"),
    });
    let view = pipeline::run(&base, &settings.with_filters(filters)).unwrap();
    assert!(view.is_empty());
    assert_eq!(view.summary.metrics.total_amount, Some(0.0));
}

#[test]
fn histogram_counts_every_amount() {
    let (_dir, base) = load_transactions();
    let view = pipeline::run(&base, &all_roles()).unwrap();
    let bins = view.summary.histogram.unwrap();
    assert_eq!(bins.len(), 20);
    assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 6);
    assert_eq!(bins.last().unwrap().upper, 300.0);
}

#[test]
fn gender_shares_sum_to_one() {
    let (_dir, base) = load_transactions();
    let view = pipeline::run(&base, &all_roles()).unwrap();
    let shares = view.summary.gender_share.unwrap();
    let total: f64 = shares.iter().map(|s| s.share).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn unsupported_upload_is_rejected() {
    let upload = Upload::new("report.pdf", b"%PDF".to_vec());
    let err = Workbook::open(upload, LoadOptions::default()).unwrap_err();
    assert!(matches!(err, DashboardError::UnsupportedFormat(_)));
}

#[test]
fn semicolon_delimited_upload() {
    let upload = Upload::new("tx.txt", b"amount;gender\n1.5;F\n2.5;M\n".to_vec());
    let options = LoadOptions {
        delimiter: b';',
        ..LoadOptions::default()
    };
    let df = Workbook::open(upload, options).unwrap().load(None).unwrap();
    assert_eq!(df.width(), 2);
    assert_eq!(df.height(), 2);
}

#[test]
fn merge_keeps_primary_rows_in_order() {
    let transactions = df!(
        "customer_id" => [3i64, 1, 2, 9],
        "amount" => [10.0f64, 20.0, 30.0, 40.0]
    )
    .unwrap();
    let customers = df!(
        "customer_id" => [1i64, 2, 3],
        "gender" => ["F", "M", "F"]
    )
    .unwrap();

    let merged = merge_sheets(&transactions, &customers, "customer_id", "tx", "cust").unwrap();
    assert_eq!(merged.height(), 4);
    let ids: Vec<Option<i64>> = merged
        .column("customer_id")
        .unwrap()
        .i64()
        .unwrap()
        .iter()
        .collect();
    assert_eq!(ids, vec![Some(3), Some(1), Some(2), Some(9)]);
    let genders: Vec<Option<&str>> = merged.column("gender").unwrap().str().unwrap().iter().collect();
    assert_eq!(genders, vec![Some("F"), Some("F"), Some("M"), None]);

    let err = merge_sheets(&transactions, &customers, "amount", "tx", "cust").unwrap_err();
    assert!(matches!(err, DashboardError::NoCommonColumn { .. }));
}

const WORKBOOK: &str = "tests/sample-data/transactions.xlsx";

fn open_workbook() -> Workbook {
    let upload = Upload::from_path(Path::new(WORKBOOK)).unwrap();
    Workbook::open(upload, LoadOptions::default()).unwrap()
}

#[test]
fn multi_sheet_workbook_requires_a_selection() {
    let workbook = open_workbook();
    assert_eq!(workbook.sheet_names(), ["Transactions", "Customers"]);
    assert!(workbook.needs_selection());

    let err = workbook.load(None).unwrap_err();
    assert!(matches!(err, DashboardError::Processing(ref m) if m.contains("2 sheets")));

    let customers = workbook
        .load(Some(&SheetSelection::Single("Customers".into())))
        .unwrap();
    assert_eq!(customers.height(), 3);
    assert_eq!(customers.column("customer_id").unwrap().dtype(), &DataType::Int64);
    assert_eq!(customers.column("gender").unwrap().dtype(), &DataType::String);
}

#[test]
fn merged_sheets_flow_through_pipeline() {
    let workbook = open_workbook();
    let transactions = workbook.read_sheet("Transactions").unwrap();
    let customers = workbook.read_sheet("Customers").unwrap();
    assert_eq!(common_columns(&transactions, &customers), vec!["customer_id"]);

    let merged = workbook
        .load(Some(&SheetSelection::Merge {
            primary: "Transactions".into(),
            secondary: "Customers".into(),
            on: "customer_id".into(),
        }))
        .unwrap();
    assert_eq!(merged.height(), 4);
    let ids: Vec<Option<i64>> = merged
        .column("customer_id")
        .unwrap()
        .i64()
        .unwrap()
        .iter()
        .collect();
    assert_eq!(ids, vec![Some(3), Some(1), Some(2), Some(9)]);
    let genders: Vec<Option<&str>> = merged.column("gender").unwrap().str().unwrap().iter().collect();
    assert_eq!(genders, vec![Some("F"), Some("F"), Some("M"), None]);

    let settings = DashboardSettings::default()
        .with_role(Role::Amount, Some("amount".into()))
        .with_role(Role::Gender, Some("gender".into()))
        .with_role(Role::Age, Some("age".into()));
    let view = pipeline::run(&merged, &settings).unwrap();
    assert_eq!(view.summary.metrics.total_amount, Some(100.5));
    assert_eq!(view.options.raw_genders, vec!["F", "M"]);
    let other = view
        .summary
        .gender_share
        .unwrap()
        .into_iter()
        .find(|s| s.key == GroupKey::Value("Other".into()))
        .unwrap();
    assert_eq!(other.count, 1);

    let err = workbook
        .load(Some(&SheetSelection::Merge {
            primary: "Transactions".into(),
            secondary: "Customers".into(),
            on: "segment".into(),
        }))
        .unwrap_err();
    assert!(matches!(err, DashboardError::NoCommonColumn { .. }));
}

