use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Display-only scaling applied uniformly to every duration in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DivisionMode {
    #[default]
    None,
    Divide100,
    Divide1000,
}

impl DivisionMode {
    pub fn divisor(self) -> f64 {
        match self {
            DivisionMode::None => 1.0,
            DivisionMode::Divide100 => 100.0,
            DivisionMode::Divide1000 => 1000.0,
        }
    }

    /// None -> ÷100 -> ÷1000 -> None.
    pub fn next(self) -> Self {
        match self {
            DivisionMode::None => DivisionMode::Divide100,
            DivisionMode::Divide100 => DivisionMode::Divide1000,
            DivisionMode::Divide1000 => DivisionMode::None,
        }
    }
}

impl fmt::Display for DivisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivisionMode::None => write!(f, "none"),
            DivisionMode::Divide100 => write!(f, "÷ 100"),
            DivisionMode::Divide1000 => write!(f, "÷ 1000"),
        }
    }
}

/// Toggle state owned by the interactive session and read at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPreferences {
    pub round_outputs: bool,
    pub division_mode: DivisionMode,
    pub locked: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            round_outputs: true,
            division_mode: DivisionMode::None,
            locked: false,
        }
    }
}

impl DisplayPreferences {
    pub fn toggle_rounding(&mut self) {
        self.round_outputs = !self.round_outputs;
    }

    pub fn cycle_division_mode(&mut self) {
        self.division_mode = self.division_mode.next();
    }

    pub fn toggle_lock(&mut self) {
        self.locked = !self.locked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_and_unlocked() {
        let prefs = DisplayPreferences::default();
        assert!(prefs.round_outputs);
        assert!(!prefs.locked);
        assert_eq!(prefs.division_mode, DivisionMode::None);
    }

    #[test]
    fn division_mode_cycles_back_to_none() {
        let mut prefs = DisplayPreferences::default();
        prefs.cycle_division_mode();
        assert_eq!(prefs.division_mode, DivisionMode::Divide100);
        prefs.cycle_division_mode();
        assert_eq!(prefs.division_mode, DivisionMode::Divide1000);
        prefs.cycle_division_mode();
        assert_eq!(prefs.division_mode, DivisionMode::None);
    }

    #[test]
    fn division_scales_values() {
        assert_eq!(500.0 / DivisionMode::None.divisor(), 500.0);
        assert_eq!(500.0 / DivisionMode::Divide100.divisor(), 5.0);
        assert_eq!(500.0 / DivisionMode::Divide1000.divisor(), 0.5);
    }

    #[test]
    fn division_mode_parses_from_yaml() {
        let mode: DivisionMode = serde_yaml::from_str("divide1000").unwrap();
        assert_eq!(mode, DivisionMode::Divide1000);
    }
}
