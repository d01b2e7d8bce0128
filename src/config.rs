use crate::cleaning::{AgeBins, DEFAULT_AGE_BINS, DEFAULT_AGE_LABELS};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use supports_color::Stream;
use txdash_cli::{Currency, FilterMode};

pub const CONFIG_FILE: &str = "config.toml";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Default configuration as a TOML template. Every field is commented out so
    /// the built-in defaults apply until the user uncomments one.
    pub fn generate_default_config(&self) -> Result<String> {
        let toml_str = toml::to_string_pretty(&AppConfig::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        Ok(Self::comment_all_fields(&toml_str, &Self::collect_all_comments()))
    }

    fn collect_all_comments() -> HashMap<String, String> {
        let sections: [(&str, &[(&str, &str)]); 8] = [
            ("", APP_COMMENTS),
            ("file_loading", FILE_LOADING_COMMENTS),
            ("dashboard", DASHBOARD_COMMENTS),
            ("filters", FILTER_COMMENTS),
            ("chart", CHART_COMMENTS),
            ("auth", AUTH_COMMENTS),
            ("performance", PERFORMANCE_COMMENTS),
            ("debug", DEBUG_COMMENTS),
        ];
        let mut comments = HashMap::new();
        for (section, fields) in sections {
            for (field, comment) in fields {
                let key = if section.is_empty() {
                    field.to_string()
                } else {
                    format!("{}.{}", section, field)
                };
                comments.insert(key, comment.to_string());
            }
        }
        comments
    }

    fn comment_all_fields(toml: &str, comments: &HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# txdash configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_sections = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                result.push_str(&Self::unset_option_fields(&section, comments));
                seen_sections.insert(section.clone());
                current_section = section;
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        // Sections whose fields are all None are not emitted by the serializer.
        for field_path in OPTION_FIELDS {
            let Some((section, _)) = field_path.split_once('.') else {
                continue;
            };
            if seen_sections.insert(section.to_string()) {
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push('\n');
                    result.push_str(header);
                    result.push('\n');
                }
                result.push_str(&format!("# [{}]\n", section));
                result.push_str(&Self::unset_option_fields(section, comments));
            }
        }

        result
    }

    /// Optional fields are skipped by the serializer when None; list them anyway
    /// so users can find them.
    fn unset_option_fields(section: &str, comments: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for field_path in OPTION_FIELDS {
            let Some((field_section, field_name)) = field_path.rsplit_once('.') else {
                continue;
            };
            if field_section != section {
                continue;
            }
            if let Some(comment) = comments.get(*field_path) {
                for comment_line in comment.lines() {
                    out.push_str("# ");
                    out.push_str(comment_line);
                    out.push('\n');
                }
            }
            out.push_str(&format!("# {} = \n", field_name));
        }
        out
    }

    /// Section name from a header line like "[chart]" or "[theme.colors]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path(CONFIG_FILE);

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config()?)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub dashboard: DashboardConfig,
    pub filters: FilterConfig,
    pub chart: ChartConfig,
    pub auth: AuthConfig,
    pub performance: PerformanceConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "file_loading",
        "# ============================================================================\n# File Loading\n# ============================================================================",
    ),
    (
        "dashboard",
        "# ============================================================================\n# Dashboard Defaults\n# ============================================================================",
    ),
    (
        "filters",
        "# ============================================================================\n# Filters\n# ============================================================================",
    ),
    (
        "chart",
        "# ============================================================================\n# Charts and Data Table\n# ============================================================================",
    ),
    (
        "auth",
        "# ============================================================================\n# Accounts\n# ============================================================================",
    ),
    (
        "performance",
        "# ============================================================================\n# Performance Settings\n# ============================================================================",
    ),
    (
        "theme",
        "# ============================================================================\n# Color Theme\n# ============================================================================",
    ),
    (
        "theme.colors",
        "# Color definitions\n# Supported formats:\n#   - Named colors: \"red\", \"blue\", \"bright_red\", \"dark_gray\", etc. (case-insensitive)\n#   - Hex colors: \"#ff0000\" (case-insensitive)\n#   - Indexed colors: \"indexed(0-255)\" for the xterm 256-color palette\n# Colors adapt to your terminal's capabilities",
    ),
    (
        "debug",
        "# ============================================================================\n# Debug Settings\n# ============================================================================",
    ),
];

/// Option fields that the serializer omits from the default template.
const OPTION_FIELDS: &[&str] = &[
    "file_loading.delimiter",
    "file_loading.infer_schema_length",
    "auth.database_path",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub infer_schema_length: Option<usize>,
}

const FILE_LOADING_COMMENTS: &[(&str, &str)] = &[
    (
        "delimiter",
        "Delimiter for .csv/.txt uploads (as ASCII value, e.g. 59 for ';')\nDefault: 44 (comma)",
    ),
    (
        "infer_schema_length",
        "Rows scanned to infer column types in delimited files (default: 1000)",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub currency: Currency,
    pub age_bins: String,
    pub age_labels: String,
}

const DASHBOARD_COMMENTS: &[(&str, &str)] = &[
    (
        "currency",
        "Currency for amount cards and charts: usd, eur, ngn, gbp, jpy, inr, krw, rub, ils, chf,\naud, cad, hkd, nzd, aed, brl, try, uah, thb, sgd",
    ),
    (
        "age_bins",
        "Age bin boundaries, comma-separated and strictly increasing.\nIntervals are [low, high): an age equal to the last boundary gets no group",
    ),
    ("age_labels", "Age group labels, one fewer than the boundaries"),
];

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            age_bins: DEFAULT_AGE_BINS.to_string(),
            age_labels: DEFAULT_AGE_LABELS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: FilterMode,
}

const FILTER_COMMENTS: &[(&str, &str)] = &[(
    "mode",
    "How filters combine: \"conjunctive\" (each narrows the previous result) or\n\"last_applied\" (each starts from the full table; only the last active filter holds)",
)];

pub const DEFAULT_HISTOGRAM_BINS: usize = 20;
pub const MAX_HISTOGRAM_BINS: usize = 200;
pub const DEFAULT_TABLE_ROW_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub histogram_bins: usize,
    /// Rows shown in the data tab.
    pub table_row_limit: usize,
}

const CHART_COMMENTS: &[(&str, &str)] = &[
    (
        "histogram_bins",
        "Number of equal-width bins in the amount histogram (1-200)",
    ),
    (
        "table_row_limit",
        "Maximum rows shown in the Data tab",
    ),
];

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            table_row_limit: DEFAULT_TABLE_ROW_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// SQLite file with user accounts. None = users.db in the config directory.
    pub database_path: Option<String>,
}

const AUTH_COMMENTS: &[(&str, &str)] = &[(
    "database_path",
    "SQLite file holding user accounts\nDefault: users.db in the txdash config directory",
)];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    pub event_poll_interval_ms: u64,
}

const PERFORMANCE_COMMENTS: &[(&str, &str)] = &[(
    "event_poll_interval_ms",
    "Event polling interval in milliseconds\nLower values = more responsive but higher CPU usage",
)];

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorConfig {
    pub keybind_hints: String,
    pub keybind_labels: String,
    pub controls_bg: String,
    pub primary_chart_series_color: String,
    pub secondary_chart_series_color: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub table_header: String,
    pub table_header_bg: String,
    pub sidebar_border: String,
    pub focused_border: String,
    pub metric_value: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            keybind_hints: "cyan".to_string(),
            keybind_labels: "indexed(252)".to_string(),
            controls_bg: "indexed(235)".to_string(),
            primary_chart_series_color: "cyan".to_string(),
            secondary_chart_series_color: "magenta".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            text_primary: "default".to_string(),
            text_secondary: "indexed(240)".to_string(),
            table_header: "white".to_string(),
            table_header_bg: "indexed(235)".to_string(),
            sidebar_border: "indexed(240)".to_string(),
            focused_border: "yellow".to_string(),
            metric_value: "bright_cyan".to_string(),
        }
    }
}

impl ColorConfig {
    /// (name, value) for every color, in declaration order.
    pub fn entries(&self) -> [(&'static str, &str); 16] {
        [
            ("keybind_hints", self.keybind_hints.as_str()),
            ("keybind_labels", self.keybind_labels.as_str()),
            ("controls_bg", self.controls_bg.as_str()),
            ("primary_chart_series_color", self.primary_chart_series_color.as_str()),
            ("secondary_chart_series_color", self.secondary_chart_series_color.as_str()),
            ("success", self.success.as_str()),
            ("error", self.error.as_str()),
            ("warning", self.warning.as_str()),
            ("dimmed", self.dimmed.as_str()),
            ("text_primary", self.text_primary.as_str()),
            ("text_secondary", self.text_secondary.as_str()),
            ("table_header", self.table_header.as_str()),
            ("table_header_bg", self.table_header_bg.as_str()),
            ("sidebar_border", self.sidebar_border.as_str()),
            ("focused_border", self.focused_border.as_str()),
            ("metric_value", self.metric_value.as_str()),
        ]
    }

    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.entries() {
            parser.parse(value).map_err(|e| {
                eyre!(
                    "theme.colors.{}: {}. Use a valid color name (e.g. red, cyan, bright_red), \
                     hex (#rrggbb), or indexed(0-255)",
                    name,
                    e
                )
            })?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        macro_rules! take_if_set {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field != default.$field {
                        self.$field = other.$field;
                    }
                )*
            };
        }
        take_if_set!(
            keybind_hints,
            keybind_labels,
            controls_bg,
            primary_chart_series_color,
            secondary_chart_series_color,
            success,
            error,
            warning,
            dimmed,
            text_primary,
            text_secondary,
            table_header,
            table_header_bg,
            sidebar_border,
            focused_border,
            metric_value,
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: String,
}

const DEBUG_COMMENTS: &[(&str, &str)] = &[(
    "log_level",
    "Log level for the log file in the cache directory: error, warn, info, debug or trace\nRUST_LOG overrides this; --debug forces debug",
)];

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            dashboard: DashboardConfig::default(),
            filters: FilterConfig::default(),
            chart: ChartConfig::default(),
            auth: AuthConfig::default(),
            performance: PerformanceConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Same as [`AppConfig::load`] but reading from `manager`'s directory.
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let config_path = manager.config_path(CONFIG_FILE);
        let mut config = AppConfig::default();
        config.merge(Self::load_user_config(&config_path)?);

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", config_path.display(), e))?;

        Ok(config)
    }

    fn load_user_config(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        let default = AppConfig::default();
        if other.version != default.version {
            self.version = other.version;
        }

        if other.file_loading.delimiter.is_some() {
            self.file_loading.delimiter = other.file_loading.delimiter;
        }
        if other.file_loading.infer_schema_length.is_some() {
            self.file_loading.infer_schema_length = other.file_loading.infer_schema_length;
        }

        if other.dashboard.currency != default.dashboard.currency {
            self.dashboard.currency = other.dashboard.currency;
        }
        if other.dashboard.age_bins != default.dashboard.age_bins {
            self.dashboard.age_bins = other.dashboard.age_bins;
        }
        if other.dashboard.age_labels != default.dashboard.age_labels {
            self.dashboard.age_labels = other.dashboard.age_labels;
        }

        if other.filters.mode != default.filters.mode {
            self.filters.mode = other.filters.mode;
        }

        if other.chart.histogram_bins != default.chart.histogram_bins {
            self.chart.histogram_bins = other.chart.histogram_bins;
        }
        if other.chart.table_row_limit != default.chart.table_row_limit {
            self.chart.table_row_limit = other.chart.table_row_limit;
        }

        if other.auth.database_path.is_some() {
            self.auth.database_path = other.auth.database_path;
        }

        if other.performance.event_poll_interval_ms != default.performance.event_poll_interval_ms {
            self.performance.event_poll_interval_ms = other.performance.event_poll_interval_ms;
        }

        self.theme.colors.merge(other.theme.colors);

        if other.debug.log_level != default.debug.log_level {
            self.debug.log_level = other.debug.log_level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        if self.chart.histogram_bins == 0 || self.chart.histogram_bins > MAX_HISTOGRAM_BINS {
            return Err(eyre!(
                "chart.histogram_bins must be between 1 and {}, got {}",
                MAX_HISTOGRAM_BINS,
                self.chart.histogram_bins
            ));
        }

        if self.chart.table_row_limit == 0 {
            return Err(eyre!("chart.table_row_limit must be greater than 0"));
        }

        if self.file_loading.infer_schema_length == Some(0) {
            return Err(eyre!("file_loading.infer_schema_length must be greater than 0"));
        }

        AgeBins::parse(&self.dashboard.age_bins, &self.dashboard.age_labels)
            .map_err(|e| eyre!("dashboard: {}", e))?;

        let level = self.debug.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(eyre!(
                "debug.log_level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.debug.log_level
            ));
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        Ok(())
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a named, hex or indexed color for the current terminal
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();

        if trimmed.starts_with('#') && trimmed.len() == 7 {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.convert_rgb_to_terminal_color(r, g, b));
        }

        let lower = trimmed.to_lowercase();
        if let Some(num_str) = lower
            .strip_prefix("indexed(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let num = num_str.trim().parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        match lower.as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),

            "bright_black" | "bright black" => Ok(Color::Indexed(8)),
            "bright_red" | "bright red" => Ok(Color::Indexed(9)),
            "bright_green" | "bright green" => Ok(Color::Indexed(10)),
            "bright_yellow" | "bright yellow" => Ok(Color::Indexed(11)),
            "bright_blue" | "bright blue" => Ok(Color::Indexed(12)),
            "bright_magenta" | "bright magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" | "bright cyan" => Ok(Color::Indexed(14)),
            "bright_white" | "bright white" => Ok(Color::Indexed(15)),

            "gray" | "grey" | "dark_gray" | "dark gray" | "dark_grey" | "dark grey" => {
                Ok(Color::Indexed(8))
            }
            "light_gray" | "light gray" | "light_grey" | "light grey" => Ok(Color::Indexed(7)),

            "reset" | "default" | "none" => Ok(Color::Reset),

            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), or hex colors (#ff0000)",
                trimmed
            )),
        }
    }

    fn convert_rgb_to_terminal_color(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let digits = s
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.is_ascii())
        .ok_or_else(|| eyre!("Invalid hex color format: '{}'. Expected format: #rrggbb", s))?;
    let component = |range: std::ops::Range<usize>, name: &str| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|_| eyre!("Invalid {} component in hex color: {}", name, s))
    };
    Ok((component(0..2, "red")?, component(2..4, "green")?, component(4..6, "blue")?))
}

/// Nearest entry of the xterm 256-color palette
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        // grayscale ramp 232-255
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        return match gray {
            0..=7 => 16,
            248..=u16::MAX => 231,
            _ => 232 + ((gray - 8) * 24 / 240) as u8,
        };
    }

    // 6x6x6 color cube 16-231
    let scale = |c: u8| (c as u16 * 5 / 255) as u8;
    16 + 36 * scale(r) + 6 * scale(g) + scale(b)
}

/// Nearest of the 8 basic ANSI colors
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }

    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Parsed theme colors, keyed by config field name
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let colors = config
            .colors
            .entries()
            .into_iter()
            .map(|(name, value)| Ok((name.to_string(), parser.parse(value)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { colors })
    }

    /// Color by name; Reset if unknown
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }
}
