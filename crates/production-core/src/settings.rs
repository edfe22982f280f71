use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::models::{Dimension, FilterCriteria, Selection, ShiftPattern, ValueColumn};
use crate::profile::IngestionProfile;

/// Work-order export used when no source is configured.
pub const DEFAULT_SOURCE: &str =
    "https://raw.githubusercontent.com/K1NGOD-RJ/Analise-da-Controle/refs/heads/main/controle_limpo.csv";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Production dashboard pipeline: ingest work orders, filter, aggregate, project
#[derive(Parser, Debug, Clone)]
#[command(
    name = "production-dashboard",
    about = "Production dashboard pipeline: ingest work orders, filter, aggregate, project",
    version
)]
pub struct Settings {
    /// Work-order CSV location (local path or http(s) URL)
    #[arg(long, env = "PRODUCTION_SOURCE", default_value = DEFAULT_SOURCE)]
    pub source: String,

    /// Built-in ingestion profile; without it a saved profile or `legacy` is used
    #[arg(long, value_parser = ["legacy", "headered"])]
    pub profile: Option<String>,

    /// JSON ingestion profile (overrides --profile)
    #[arg(long)]
    pub profile_file: Option<PathBuf>,

    /// Capacity log CSV location, used for the production projection
    #[arg(long)]
    pub capacity_log: Option<String>,

    /// Sector KPI CSV location (repeatable)
    #[arg(long)]
    pub sector_kpi: Vec<String>,

    /// Only include these delivery years
    #[arg(long, value_delimiter = ',')]
    pub year: Vec<i32>,

    /// Only include these delivery months (1-12)
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Vec<u32>,

    /// Only include these categories (case-insensitive)
    #[arg(long, value_delimiter = ',')]
    pub category: Vec<String>,

    /// Only include these responsible parties
    #[arg(long, value_delimiter = ',')]
    pub responsible: Vec<String>,

    /// Only include these teams
    #[arg(long, value_delimiter = ',')]
    pub team: Vec<String>,

    /// Only include these sales channels
    #[arg(long, value_delimiter = ',')]
    pub channel: Vec<String>,

    /// Activate a filter dimension with nothing selected (repeatable)
    #[arg(long)]
    pub select_none: Vec<Dimension>,

    /// Value column for rankings, the moving average and anomaly flags
    #[arg(long, default_value = "quantity", value_parser = ["quantity", "weighted_quantity"])]
    pub value: String,

    /// Shift pattern for the projection
    #[arg(long, default_value = "single")]
    pub shift: ShiftPattern,

    /// Planned headcount for the projection
    #[arg(long, default_value = "10")]
    pub headcount: f64,

    /// Planned working days per projected month
    #[arg(long, default_value = "22")]
    pub working_days: f64,

    /// Number of months to project
    #[arg(long, default_value = "6")]
    pub horizon: u32,

    /// Number of categories in the top-N ranking
    #[arg(long, default_value = "5")]
    pub top_n: usize,

    /// Trailing window of the daily moving average
    #[arg(long, default_value = "7", value_parser = clap::value_parser!(u32).range(1..=365))]
    pub window: u32,

    /// Absolute z-score above which an order is flagged
    #[arg(long, default_value = "3.0")]
    pub z_threshold: f64,

    /// Timeout for remote fetches, in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout_secs: u64,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Write the filtered work orders to this CSV file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Parse an explicit argument list and apply the `--debug` override.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Translate the filter flags into [`FilterCriteria`].
    ///
    /// A dimension without values stays bypassed. `--select-none` wins over
    /// any values given for the same dimension.
    pub fn filter_criteria(&self) -> Result<FilterCriteria> {
        let mut criteria = FilterCriteria::default();
        if !self.year.is_empty() {
            criteria.years = Selection::only(self.year.iter().copied());
        }
        if !self.month.is_empty() {
            criteria.months = Selection::only(self.month.iter().copied());
        }
        if !self.category.is_empty() {
            // Categories are stored upper-cased.
            criteria.categories =
                Selection::only(self.category.iter().map(|c| c.trim().to_uppercase()));
        }
        if !self.responsible.is_empty() {
            criteria.responsibles = Selection::only(self.responsible.iter().map(|r| r.trim().to_string()));
        }
        if !self.team.is_empty() {
            criteria.teams = Selection::only(self.team.iter().map(|t| t.trim().to_string()));
        }
        if !self.channel.is_empty() {
            criteria.channels = Selection::only(self.channel.iter().map(|c| c.trim().to_string()));
        }

        for &dimension in &self.select_none {
            if !criteria.select_none(dimension) {
                return Err(PipelineError::Config(format!(
                    "dimension {:?} cannot be filtered",
                    dimension
                )));
            }
        }
        Ok(criteria)
    }

    /// The ingestion profile to use.
    ///
    /// Order: `--profile-file`, an explicit `--profile`, a profile saved at
    /// the default path, then the `legacy` built-in.
    pub fn resolve_profile(&self) -> Result<IngestionProfile> {
        self.resolve_profile_in(&IngestionProfile::default_path())
    }

    /// Same as [`Settings::resolve_profile`] with an explicit default path.
    pub fn resolve_profile_in(&self, default_path: &Path) -> Result<IngestionProfile> {
        if let Some(path) = &self.profile_file {
            return IngestionProfile::load_from(path);
        }
        if let Some(name) = &self.profile {
            return IngestionProfile::builtin(name);
        }
        if default_path.exists() {
            return IngestionProfile::load_from(default_path);
        }
        Ok(IngestionProfile::legacy())
    }

    pub fn value_column(&self) -> ValueColumn {
        match self.value.as_str() {
            "weighted_quantity" => ValueColumn::WeightedQuantity,
            _ => ValueColumn::Quantity,
        }
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
