use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    preferences::{DisplayPreferences, DivisionMode},
    tap_tempo::{TapTempo, DEFAULT_CAPACITY, DEFAULT_MIN_INTERVAL},
    timing::NoteValue,
};

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "bpm.yml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tap: TapConfig,
    pub display: DisplayConfig,
    pub midi: MidiConfig,
    pub link: LinkConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TapConfig {
    pub capacity: usize,
    pub min_interval_secs: f64,
    pub auto_reset_secs: Option<f64>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            min_interval_secs: DEFAULT_MIN_INTERVAL,
            auto_reset_secs: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub round_outputs: bool,
    pub division_mode: DivisionMode,
    pub rows: RowSet,
    pub columns: Vec<Column>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            round_outputs: true,
            division_mode: DivisionMode::None,
            rows: RowSet::Extended,
            columns: vec![Column::Time],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MidiConfig {
    /// Substring of the MIDI input port whose notes count as taps.
    pub input_port: Option<String>,
    /// Substring of the MIDI output port that receives clock messages.
    pub clock_port: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub enabled: bool,
}

/// How many note values the table shows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RowSet {
    /// Whole note down to 1/128.
    Standard,
    /// Whole note down to 1/1024.
    #[default]
    Extended,
}

impl RowSet {
    pub fn notes(self) -> &'static [NoteValue] {
        match self {
            RowSet::Standard => &NoteValue::ALL[..NoteValue::STANDARD_LEN],
            RowSet::Extended => &NoteValue::ALL,
        }
    }
}

/// A presentation multiplier applied to each duration before formatting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Time,
    Times10,
    Tenth,
    Hundredth,
    Thousandth,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Time,
        Column::Times10,
        Column::Tenth,
        Column::Hundredth,
        Column::Thousandth,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Time => "Time",
            Column::Times10 => "10x",
            Column::Tenth => "1/10th",
            Column::Hundredth => "1/100th",
            Column::Thousandth => "1/1000th",
        }
    }

    pub fn apply(self, ms: f64) -> f64 {
        match self {
            Column::Time => ms,
            Column::Times10 => ms * 10.0,
            Column::Tenth => ms / 10.0,
            Column::Hundredth => ms / 100.0,
            Column::Thousandth => ms / 1000.0,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// read if present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).map_err(|source| AppError::ConfigIo {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| AppError::ConfigParse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;

        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.tap.capacity < 2 {
            return Err(AppError::InvalidConfig(format!(
                "tap.capacity must be at least 2, got {}",
                self.tap.capacity
            )));
        }
        if self.tap.min_interval_secs.is_nan() || self.tap.min_interval_secs < 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "tap.min_interval_secs must be non-negative, got {}",
                self.tap.min_interval_secs
            )));
        }
        if let Some(gap) = self.tap.auto_reset_secs {
            if gap.is_nan() || gap <= 0.0 {
                return Err(AppError::InvalidConfig(format!(
                    "tap.auto_reset_secs must be positive, got {gap}"
                )));
            }
        }
        if self.display.columns.is_empty() {
            return Err(AppError::InvalidConfig(
                "display.columns must name at least one column".into(),
            ));
        }
        Ok(())
    }

    pub fn tap_tempo(&self) -> TapTempo {
        TapTempo::new(self.tap.capacity, self.tap.min_interval_secs)
            .with_reset_gap(self.tap.auto_reset_secs)
    }

    pub fn preferences(&self) -> DisplayPreferences {
        DisplayPreferences {
            round_outputs: self.display.round_outputs,
            division_mode: self.display.division_mode,
            locked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tap.capacity, 24);
        assert_eq!(config.tap.min_interval_secs, 0.2);
        assert!(config.display.round_outputs);
    }

    #[test]
    fn bundled_config_matches_defaults() {
        let config = Config::from_yaml(include_str!("../bpm.yml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = Config::from_yaml(
            "display:\n  round_outputs: false\n  division_mode: divide100\n  rows: standard\n  columns: [time, tenth]\n",
        )
        .unwrap();

        assert!(!config.display.round_outputs);
        assert_eq!(config.display.division_mode, DivisionMode::Divide100);
        assert_eq!(config.display.rows.notes().len(), 8);
        assert_eq!(config.display.columns, vec![Column::Time, Column::Tenth]);
        assert_eq!(config.tap, TapConfig::default());
    }

    #[test]
    fn rejects_small_capacity() {
        let config = Config::from_yaml("tap:\n  capacity: 1\n").unwrap();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_columns() {
        let config = Config::from_yaml("display:\n  columns: []\n").unwrap();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(Config::from_yaml("tap:\n  capacty: 12\n").is_err());
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tap:\n  capacity: 8\n  auto_reset_secs: 2.0").unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.tap.capacity, 8);
        assert_eq!(config.tap.auto_reset_secs, Some(2.0));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yml");
        let err = Config::load(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, AppError::ConfigIo { .. }));
    }

    #[test]
    fn column_multipliers() {
        assert_eq!(Column::Time.apply(500.0), 500.0);
        assert_eq!(Column::Times10.apply(500.0), 5000.0);
        assert_eq!(Column::Tenth.apply(500.0), 50.0);
        assert_eq!(Column::Hundredth.apply(500.0), 5.0);
        assert_eq!(Column::Thousandth.apply(500.0), 0.5);
    }
}
