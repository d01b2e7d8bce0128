//! Shared CLI definitions for txdash.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Currency symbol shown on the headline amount card and chart labels.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// US dollar ($)
    #[default]
    Usd,
    /// Euro (€)
    Eur,
    /// Nigerian naira (₦)
    Ngn,
    /// Pound sterling (£)
    Gbp,
    /// Japanese yen (¥)
    Jpy,
    /// Indian rupee (₹)
    Inr,
    /// South Korean won (₩)
    Krw,
    /// Russian ruble (₽)
    Rub,
    /// Israeli shekel (₪)
    Ils,
    /// Swiss franc (CHF)
    Chf,
    /// Australian dollar (A$)
    Aud,
    /// Canadian dollar (C$)
    Cad,
    /// Hong Kong dollar (HK$)
    Hkd,
    /// New Zealand dollar (NZ$)
    Nzd,
    /// UAE dirham (د.إ)
    Aed,
    /// Brazilian real (R$)
    Brl,
    /// Turkish lira (₺)
    Try,
    /// Ukrainian hryvnia (₴)
    Uah,
    /// Thai baht (฿)
    Thb,
    /// Singapore dollar (S$)
    Sgd,
}

impl Currency {
    /// Every selectable currency, in the order the sidebar cycles through them.
    pub const ALL: [Currency; 20] = [
        Self::Usd,
        Self::Eur,
        Self::Ngn,
        Self::Gbp,
        Self::Jpy,
        Self::Inr,
        Self::Krw,
        Self::Rub,
        Self::Ils,
        Self::Chf,
        Self::Aud,
        Self::Cad,
        Self::Hkd,
        Self::Nzd,
        Self::Aed,
        Self::Brl,
        Self::Try,
        Self::Uah,
        Self::Thb,
        Self::Sgd,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Ngn => "₦",
            Self::Gbp => "£",
            Self::Jpy => "¥",
            Self::Inr => "₹",
            Self::Krw => "₩",
            Self::Rub => "₽",
            Self::Ils => "₪",
            Self::Chf => "CHF",
            Self::Aud => "A$",
            Self::Cad => "C$",
            Self::Hkd => "HK$",
            Self::Nzd => "NZ$",
            Self::Aed => "د.إ",
            Self::Brl => "R$",
            Self::Try => "₺",
            Self::Uah => "₴",
            Self::Thb => "฿",
            Self::Sgd => "S$",
        }
    }
}

/// How successive dashboard filters combine.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Each filter narrows the view produced by the previous one
    #[default]
    Conjunctive,
    /// Each active filter starts again from the full table, so only the last one holds
    LastApplied,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conjunctive => "conjunctive",
            Self::LastApplied => "last applied",
        }
    }
}

/// Command-line arguments for txdash
#[derive(Clone, Parser, Debug)]
#[command(
    name = "txdash",
    version,
    about = "Transaction dashboard in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Spreadsheet (.xlsx, .xls, .xlsm, .xlsb, .ods) or delimited text (.csv, .txt) to upload after login
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Sheet to use from a multi-sheet workbook (also the primary sheet when merging)
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// Merge the primary sheet with this sheet (left join)
    #[arg(long = "merge-with", value_name = "SHEET", requires = "sheet")]
    pub merge_with: Option<String>,

    /// Column shared by both sheets to merge on
    #[arg(long = "on", value_name = "COLUMN", requires = "merge_with")]
    pub on: Option<String>,

    /// Specify the delimiter to use when reading a delimited text file
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Number of rows to use when inferring CSV schema (default: 1000)
    #[arg(long = "infer-schema-length", value_name = "N")]
    pub infer_schema_length: Option<usize>,

    /// Transaction date column
    #[arg(long = "date-col", value_name = "COLUMN")]
    pub date_col: Option<String>,

    /// Transaction amount column
    #[arg(long = "amount-col", value_name = "COLUMN")]
    pub amount_col: Option<String>,

    /// Gender column
    #[arg(long = "gender-col", value_name = "COLUMN")]
    pub gender_col: Option<String>,

    /// Age column
    #[arg(long = "age-col", value_name = "COLUMN")]
    pub age_col: Option<String>,

    /// Secondary (segment) filter column
    #[arg(long = "segment-col", value_name = "COLUMN")]
    pub segment_col: Option<String>,

    /// Currency used for amounts (overrides config)
    #[arg(long = "currency", value_enum)]
    pub currency: Option<Currency>,

    /// Age bin boundaries, comma-separated and strictly increasing (e.g. "0, 18, 65, 120")
    #[arg(long = "age-bins", value_name = "BINS")]
    pub age_bins: Option<String>,

    /// Age group labels, comma-separated, one fewer than the bins
    #[arg(long = "age-labels", value_name = "LABELS")]
    pub age_labels: Option<String>,

    /// How filters combine (overrides config)
    #[arg(long = "filter-mode", value_enum)]
    pub filter_mode: Option<FilterMode>,

    /// SQLite file holding user accounts (default: users.db in the config directory)
    #[arg(long = "credentials-db", value_name = "PATH")]
    pub credentials_db: Option<PathBuf>,

    /// Log at debug level
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/txdash/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            format!("[{placeholder}]")
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if placeholder.is_empty() || !arg.get_action().takes_values() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
