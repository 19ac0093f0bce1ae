use std::time::Instant;

use log::{debug, info};

use crate::{
    preferences::DisplayPreferences,
    tap_tempo::TapTempo,
    timing::DurationTable,
};

/// User commands understood by a tap session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tap(Instant),
    Reset,
    ToggleRounding,
    CycleDivisionMode,
    ToggleLock,
}

/// What changed after a command was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    /// Nothing visible changed.
    Unchanged,
    /// A new tempo estimate is available.
    Tempo(f64),
    /// The tap history and tempo were cleared.
    Cleared,
    /// Only display preferences changed.
    Display,
}

/// The tap estimator and display toggles of one interactive session.
///
/// All mutation goes through [`TapSession::apply`]; the owner of the session
/// is the only writer.
#[derive(Debug, Clone)]
pub struct TapSession {
    tapper: TapTempo,
    prefs: DisplayPreferences,
    bpm: Option<f64>,
}

impl TapSession {
    pub fn new(tapper: TapTempo, prefs: DisplayPreferences) -> Self {
        Self {
            tapper,
            prefs,
            bpm: None,
        }
    }

    pub fn apply(&mut self, command: Command) -> Update {
        match command {
            Command::Tap(_) if self.prefs.locked => {
                debug!("tap ignored while locked");
                Update::Unchanged
            }
            Command::Tap(at) => match self.tapper.record_tap(at) {
                Some(bpm) => {
                    self.bpm = Some(bpm);
                    Update::Tempo(bpm)
                }
                None => Update::Unchanged,
            },
            Command::Reset => {
                self.tapper.reset();
                self.bpm = None;
                info!("tap history reset");
                Update::Cleared
            }
            Command::ToggleRounding => {
                self.prefs.toggle_rounding();
                info!("rounding {}", if self.prefs.round_outputs { "on" } else { "off" });
                Update::Display
            }
            Command::CycleDivisionMode => {
                self.prefs.cycle_division_mode();
                info!("division mode: {}", self.prefs.division_mode);
                Update::Display
            }
            Command::ToggleLock => {
                self.prefs.toggle_lock();
                info!("input {}", if self.prefs.locked { "locked" } else { "unlocked" });
                Update::Display
            }
        }
    }

    /// Last tempo estimate, if any tap window produced one since the last reset.
    pub fn bpm(&self) -> Option<f64> {
        self.bpm
    }

    pub fn preferences(&self) -> &DisplayPreferences {
        &self.prefs
    }

    pub fn taps(&self) -> usize {
        self.tapper.len()
    }

    pub fn table(&self) -> Option<DurationTable> {
        self.bpm.and_then(DurationTable::compute)
    }
}
