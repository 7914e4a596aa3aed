use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::commission::{RatePolicy, DEFAULT_UNASSIGNED_LABEL};
use crate::error::{Result, TallyError};

/// Header names of the columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default = "default_salesperson")]
    pub salesperson: String,
    #[serde(default = "default_amount")]
    pub amount: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_product")]
    pub product: String,
}

fn default_salesperson() -> String {
    "asesor".to_string()
}

fn default_amount() -> String {
    "TotalFac".to_string()
}

fn default_client_id() -> String {
    "Identificacion".to_string()
}

fn default_product() -> String {
    "producto".to_string()
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            salesperson: default_salesperson(),
            amount: default_amount(),
            client_id: default_client_id(),
            product: default_product(),
        }
    }
}

impl ColumnMap {
    pub fn required(&self) -> [&str; 3] {
        [&self.salesperson, &self.amount, &self.client_id]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub columns: ColumnMap,
    #[serde(default)]
    pub rate: RatePolicy,
    #[serde(default = "default_unassigned_label")]
    pub unassigned_label: String,
}

fn default_unassigned_label() -> String {
    DEFAULT_UNASSIGNED_LABEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            rate: RatePolicy::default(),
            unassigned_label: default_unassigned_label(),
        }
    }
}

/// `$TALLY_CONFIG`, or `~/.config/tally/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("TALLY_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
        .join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let path = settings_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TallyError::Settings(e.to_string()))?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            columns: ColumnMap {
                salesperson: "Vendedor".to_string(),
                ..ColumnMap::default()
            },
            rate: RatePolicy::flat(2.0).unwrap(),
            unassigned_label: "(sin asesor)".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_defaults_match_original_columns() {
        let s = Settings::default();
        assert_eq!(s.columns.required(), ["asesor", "TotalFac", "Identificacion"]);
        assert_eq!(s.columns.product, "producto");
        assert_eq!(s.unassigned_label, DEFAULT_UNASSIGNED_LABEL);
        assert_eq!(s.rate, RatePolicy::default());
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let json = r#"{"columns": {"amount": "Total"}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.columns.amount, "Total");
        assert_eq!(s.columns.salesperson, "asesor");
        assert_eq!(s.rate, RatePolicy::default());
    }

    #[test]
    fn test_out_of_range_rate_is_rejected() {
        let json = r#"{"rate": {"kind": "flat", "percent": -1}}"#;
        assert!(serde_json::from_str::<Settings>(json).is_err());
    }
}
