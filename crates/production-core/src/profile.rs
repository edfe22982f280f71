use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::data_processors::NumericLocale;
use crate::error::{PipelineError, Result};
use crate::models::Field;

/// Positional column layout of the legacy spreadsheet export.
pub const LEGACY_COLUMNS: [&str; 18] = [
    "Ordem",
    "OS",
    "OS UNICA",
    "FINAL",
    "EQUIPE",
    "RESPONSAVEL",
    "CANAL",
    "STATUS",
    "CODIGO/CLIENTE",
    "PRODUTO",
    "QTD",
    "DATA DE ENTREGA",
    "SEMANA NO ANO",
    "MES ENTREGA",
    "ANO ENTREGA",
    "MES_ANO",
    "CATEGORIA CONVERSOR",
    "QUANTIDADE PONDERADA",
];

/// Source header → canonical field name, shared by the built-in profiles.
const PORTUGUESE_COLUMN_MAP: [(&str, Field); 13] = [
    ("OS", Field::Id),
    ("EQUIPE", Field::Team),
    ("RESPONSAVEL", Field::Responsible),
    ("CANAL", Field::Channel),
    ("STATUS", Field::Status),
    ("CODIGO/CLIENTE", Field::ProductCode),
    ("PRODUTO", Field::Family),
    ("QTD", Field::Quantity),
    ("DATA DE ENTREGA", Field::DeliveryDate),
    ("MES ENTREGA", Field::Month),
    ("ANO ENTREGA", Field::Year),
    ("CATEGORIA CONVERSOR", Field::Category),
    ("QUANTIDADE PONDERADA", Field::WeightedQuantity),
];

// ── HeaderMode ────────────────────────────────────────────────────────────────

/// Where column names come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMode {
    /// The first record of the file is the header row.
    #[default]
    FirstRow,
    /// The file has no header; columns are named by this list, in order.
    Positional(Vec<String>),
}

// ── IngestionProfile ──────────────────────────────────────────────────────────

/// Everything `normalize` needs to know about one deployment's source layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionProfile {
    pub name: String,
    #[serde(default)]
    pub header: HeaderMode,
    /// Raw header → canonical field name. Unmapped headers pass through.
    #[serde(default)]
    pub column_map: BTreeMap<String, String>,
    /// Fields that must be present for a row to be retained, on top of
    /// [`Field::ALWAYS_REQUIRED`].
    #[serde(default)]
    pub required: BTreeSet<Field>,
    #[serde(default)]
    pub numeric_locale: NumericLocale,
}

impl IngestionProfile {
    /// Headerless comma-decimal export with the fixed 18-column layout.
    pub fn legacy() -> Self {
        Self {
            name: "legacy".to_string(),
            header: HeaderMode::Positional(LEGACY_COLUMNS.iter().map(|c| c.to_string()).collect()),
            column_map: portuguese_column_map(),
            required: [Field::Quantity, Field::Year, Field::Month, Field::Responsible]
                .into_iter()
                .collect(),
            numeric_locale: NumericLocale::CommaDecimal,
        }
    }

    /// Header-row export with plain decimals. Canonical column names pass
    /// through untouched, so normalized output can be read back with it.
    pub fn headered() -> Self {
        Self {
            name: "headered".to_string(),
            header: HeaderMode::FirstRow,
            column_map: portuguese_column_map(),
            required: BTreeSet::new(),
            numeric_locale: NumericLocale::Plain,
        }
    }

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "legacy" => Ok(Self::legacy()),
            "headered" => Ok(Self::headered()),
            other => Err(PipelineError::Config(format!(
                "unknown ingestion profile '{}'",
                other
            ))),
        }
    }

    /// Default location of a user profile: `~/.production-dashboard/profile.json`.
    pub fn default_path() -> PathBuf {
        Self::default_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The profile path rooted at `base_dir`.
    pub fn default_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".production-dashboard").join("profile.json")
    }

    /// Load and validate a profile from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Self = serde_json::from_str(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Every rename target must be a declared field and a positional header
    /// list must not be empty.
    pub fn validate(&self) -> Result<()> {
        for target in self.column_map.values() {
            target.parse::<Field>()?;
        }
        if let HeaderMode::Positional(columns) = &self.header {
            if columns.is_empty() {
                return Err(PipelineError::Config(format!(
                    "profile '{}' has an empty positional column list",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// The name a raw header carries after renaming.
    pub fn rename<'a>(&'a self, raw_header: &'a str) -> &'a str {
        let trimmed = raw_header.trim();
        self.column_map
            .get(trimmed)
            .map(String::as_str)
            .unwrap_or(trimmed)
    }

    /// [`Field::ALWAYS_REQUIRED`] plus the profile's own required set.
    pub fn required_fields(&self) -> BTreeSet<Field> {
        Field::ALWAYS_REQUIRED
            .iter()
            .copied()
            .chain(self.required.iter().copied())
            .collect()
    }
}

fn portuguese_column_map() -> BTreeMap<String, String> {
    PORTUGUESE_COLUMN_MAP
        .iter()
        .map(|(raw, field)| (raw.to_string(), field.as_str().to_string()))
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
