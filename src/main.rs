mod config;
mod error;
#[cfg(feature = "link")]
mod link_controller;
#[cfg(feature = "midi")]
mod midi_clock;
#[cfg(feature = "midi")]
mod midi_input;
mod preferences;
mod session;
mod sink;
mod table;
mod tap_tempo;
mod terminal;
mod timing;

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::mpsc::{self, Sender},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use config::{Column, Config, RowSet};
use error::AppError;
use preferences::DivisionMode;
use session::{Command, TapSession, Update};
use sink::TempoSink;
use table::TimingReport;
use timing::DurationTable;

/// Messages from the input sources to the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Command(Command),
    Redraw,
    Quit,
}

/// Tap a tempo and read off note durations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the timing table for this tempo and exit instead of tapping.
    #[arg(long)]
    bpm: Option<f64>,
    /// YAML configuration file (defaults to ./bpm.yml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the one-shot table as JSON.
    #[arg(long, requires = "bpm")]
    json: bool,
    /// Show raw values with three decimals instead of rounding.
    #[arg(long)]
    no_round: bool,
    #[arg(long, value_enum)]
    division: Option<DivisionMode>,
    #[arg(long, value_enum)]
    rows: Option<RowSet>,
    /// Columns to show; repeat or separate with commas.
    #[arg(long, value_enum, value_delimiter = ',')]
    columns: Vec<Column>,
    /// Show every multiplier column.
    #[arg(long, conflicts_with = "columns")]
    wide: bool,
    /// MIDI input port (name substring) whose notes count as taps.
    #[arg(long)]
    midi_in: Option<String>,
    /// MIDI output port (name substring) that receives clock at the tapped tempo.
    #[arg(long)]
    midi_clock: Option<String>,
    /// Publish the tapped tempo to an Ableton Link session.
    #[arg(long)]
    link: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if self.no_round {
            config.display.round_outputs = false;
        }
        if let Some(mode) = self.division {
            config.display.division_mode = mode;
        }
        if let Some(rows) = self.rows {
            config.display.rows = rows;
        }
        if self.wide {
            config.display.columns = Column::ALL.to_vec();
        } else if !self.columns.is_empty() {
            config.display.columns = self.columns.clone();
        }
        if self.midi_in.is_some() {
            config.midi.input_port = self.midi_in.clone();
        }
        if self.midi_clock.is_some() {
            config.midi.clock_port = self.midi_clock.clone();
        }
        if self.link {
            config.link.enabled = true;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    args.apply_to(&mut config);
    config.validate()?;

    match args.bpm {
        Some(bpm) => print_table(&config, bpm, args.json),
        None => run_interactive(&config),
    }
}

fn print_table(config: &Config, bpm: f64, json: bool) -> Result<()> {
    let table = DurationTable::compute(bpm).ok_or(AppError::InvalidBpm(bpm))?;
    let report = TimingReport::build(
        &table,
        &config.preferences(),
        config.display.rows,
        &config.display.columns,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        report.write_text(&mut out)?;
    }
    Ok(())
}

fn run_interactive(config: &Config) -> Result<()> {
    let (tx, rx) = mpsc::channel::<ControlMessage>();

    let mut sinks = open_sinks(config)?;
    let _midi_input = open_midi_input(config, tx.clone())?;

    let _guard = terminal::TerminalGuard::enter().context("entering raw terminal mode")?;
    terminal::spawn_input(tx).context("starting terminal input thread")?;

    let mut session = TapSession::new(config.tap_tempo(), config.preferences());
    let mut stdout = io::stdout();
    let rows = config.display.rows;
    let columns = &config.display.columns;

    terminal::draw(&mut stdout, &session, rows, columns)?;

    while let Ok(message) = rx.recv() {
        match message {
            ControlMessage::Command(command) => {
                if handle_command(&mut session, command, &mut sinks) {
                    terminal::draw(&mut stdout, &session, rows, columns)?;
                }
            }
            ControlMessage::Redraw => terminal::draw(&mut stdout, &session, rows, columns)?,
            ControlMessage::Quit => break,
        }
    }

    info!("session ended at {:?} BPM", session.bpm());
    Ok(())
}

/// Apply one command and notify the sinks. Returns whether the screen needs a redraw.
fn handle_command(
    session: &mut TapSession,
    command: Command,
    sinks: &mut [Box<dyn TempoSink>],
) -> bool {
    match session.apply(command) {
        Update::Unchanged => {
            debug!("{command:?} changed nothing");
            // the tap counter still moves
            matches!(command, Command::Tap(_))
        }
        Update::Tempo(bpm) => {
            debug!("tempo {bpm} BPM");
            sink::broadcast(sinks, Some(bpm));
            true
        }
        Update::Cleared => {
            sink::broadcast(sinks, None);
            true
        }
        Update::Display => true,
    }
}

fn open_sinks(config: &Config) -> Result<Vec<Box<dyn TempoSink>>, AppError> {
    #[allow(unused_mut)]
    let mut sinks: Vec<Box<dyn TempoSink>> = Vec::new();

    if let Some(port) = &config.midi.clock_port {
        #[cfg(feature = "midi")]
        {
            let clock = midi_clock::MidiClock::new(port)?;
            info!("midi clock on \"{}\"", clock.port_name());
            sinks.push(Box::new(clock));
        }
        #[cfg(not(feature = "midi"))]
        {
            let _ = port;
            return Err(AppError::FeatureDisabled("midi"));
        }
    }

    if config.link.enabled {
        #[cfg(feature = "link")]
        sinks.push(Box::new(link_controller::LinkController::new(120.0)));
        #[cfg(not(feature = "link"))]
        return Err(AppError::FeatureDisabled("link"));
    }

    Ok(sinks)
}

#[cfg(feature = "midi")]
fn open_midi_input(
    config: &Config,
    tx: Sender<ControlMessage>,
) -> Result<Option<midi_input::MidiTapInput>, AppError> {
    match &config.midi.input_port {
        Some(port) => {
            let input = midi_input::MidiTapInput::connect(port, tx)?;
            info!("midi taps from \"{}\"", input.port_name());
            Ok(Some(input))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "midi"))]
fn open_midi_input(config: &Config, _tx: Sender<ControlMessage>) -> Result<Option<()>, AppError> {
    match config.midi.input_port {
        Some(_) => Err(AppError::FeatureDisabled("midi")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "tap-bpm",
            "--bpm",
            "120",
            "--no-round",
            "--division",
            "divide100",
            "--columns",
            "time,tenth",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert!(!config.display.round_outputs);
        assert_eq!(config.display.division_mode, DivisionMode::Divide100);
        assert_eq!(config.display.columns, vec![Column::Time, Column::Tenth]);
    }

    #[test]
    fn wide_shows_every_column() {
        let args = Args::parse_from(["tap-bpm", "--wide"]);
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.display.columns, Column::ALL.to_vec());
    }

    #[test]
    fn json_requires_bpm() {
        assert!(Args::try_parse_from(["tap-bpm", "--json"]).is_err());
    }

    #[test]
    fn commands_redraw_and_reach_sinks() {
        struct Count(std::rc::Rc<std::cell::Cell<usize>>);
        impl TempoSink for Count {
            fn tempo_changed(&mut self, _bpm: f64) {
                self.0.set(self.0.get() + 1);
            }
            fn tempo_cleared(&mut self) {
                self.0.set(self.0.get() + 100);
            }
        }

        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut sinks: Vec<Box<dyn TempoSink>> = vec![Box::new(Count(calls.clone()))];
        let mut session = TapSession::new(Config::default().tap_tempo(), Default::default());
        let start = Instant::now();

        assert!(handle_command(&mut session, Command::Tap(start), &mut sinks));
        assert_eq!(calls.get(), 0);
        let second = Command::Tap(start + Duration::from_millis(500));
        assert!(handle_command(&mut session, second, &mut sinks));
        assert_eq!(calls.get(), 1);
        assert!(handle_command(&mut session, Command::Reset, &mut sinks));
        assert_eq!(calls.get(), 101);
    }
}
