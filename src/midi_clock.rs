use log::warn;
use midir::{MidiOutput, MidiOutputConnection, SendError};
use std::{
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use crate::{error::AppError, sink::TempoSink};

const PPQN: f64 = 24.0;
const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;
const THREAD_NAME: &str = "tap-bpm-midi-clock";

const CLOCK: u8 = 0xF8;
const START: u8 = 0xFA;
const STOP: u8 = 0xFC;

/// MIDI beat clock that follows the tapped tempo on a background thread.
#[derive(Debug)]
pub struct MidiClock {
    tx: Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
    port_name: String,
    running: bool,
}

impl MidiClock {
    pub fn new(port_hint: &str) -> Result<Self, AppError> {
        let midi_out =
            MidiOutput::new("tap-bpm").map_err(|err| AppError::MidiInit(err.to_string()))?;

        let ports = midi_out.ports();
        let hint = port_hint.trim().to_lowercase();
        let target_port = ports
            .iter()
            .find(|port| {
                hint.is_empty()
                    || midi_out
                        .port_name(port)
                        .map(|name| name.to_lowercase().contains(&hint))
                        .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| AppError::MidiPortNotFound(port_hint.to_string()))?;

        let port_name = midi_out
            .port_name(&target_port)
            .unwrap_or_else(|_| "<unknown>".into());

        let connection = midi_out
            .connect(&target_port, "tap-bpm-clock-out")
            .map_err(|err| AppError::MidiConnection(err.to_string()))?;

        let (tx, rx) = mpsc::channel::<Command>();
        let port_label = port_name.clone();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || run_clock(connection, rx, port_label))
            .map_err(|err| AppError::MidiThread(err.to_string()))?;

        Ok(Self {
            tx,
            thread: Some(thread),
            port_name,
            running: false,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send_command(&self, command: Command) -> Result<(), AppError> {
        self.tx
            .send(command)
            .map_err(|_| AppError::MidiThread("clock thread has stopped".into()))
    }
}

impl TempoSink for MidiClock {
    fn tempo_changed(&mut self, bpm: f64) {
        let mut result = self.send_command(Command::SetBpm(sanitize_bpm(bpm)));
        if result.is_ok() && !self.running {
            result = self.send_command(Command::Start);
            self.running = result.is_ok();
        }
        if let Err(err) = result {
            warn!("midi clock ({}): {err}", self.port_name);
        }
    }

    fn tempo_cleared(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Err(err) = self.send_command(Command::Stop) {
            warn!("midi clock ({}): {err}", self.port_name);
        }
    }
}

impl Drop for MidiClock {
    fn drop(&mut self) {
        if self.tx.send(Command::Shutdown).is_ok() {
            if let Some(handle) = self.thread.take() {
                let _ = handle.join();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Start,
    Stop,
    SetBpm(f64),
    Shutdown,
}

struct ClockState {
    connection: MidiOutputConnection,
    port_name: String,
    tick_duration: Duration,
    running: bool,
    next_tick: Instant,
}

impl ClockState {
    fn send(&mut self, byte: u8, label: &str) -> bool {
        match send_byte(&mut self.connection, byte) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "midi clock ({}): failed to send {label} message: {err}",
                    self.port_name
                );
                false
            }
        }
    }

    /// Returns `false` once the thread should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start => {
                self.running = self.send(START, "START");
                self.next_tick = Instant::now();
            }
            Command::Stop => {
                self.send(STOP, "STOP");
                self.running = false;
            }
            Command::SetBpm(bpm) => {
                self.tick_duration = duration_from_bpm(bpm);
                if self.running {
                    self.next_tick = Instant::now()
                        .checked_add(self.tick_duration)
                        .unwrap_or_else(Instant::now);
                }
            }
            Command::Shutdown => {
                if self.running {
                    self.send(STOP, "STOP");
                }
                return false;
            }
        }
        true
    }
}

fn run_clock(connection: MidiOutputConnection, rx: mpsc::Receiver<Command>, port_name: String) {
    let mut state = ClockState {
        connection,
        port_name,
        tick_duration: duration_from_bpm(120.0),
        running: false,
        next_tick: Instant::now(),
    };

    loop {
        let command = if state.running {
            let now = Instant::now();
            if now >= state.next_tick {
                if state.send(CLOCK, "CLOCK") {
                    state.next_tick = state
                        .next_tick
                        .checked_add(state.tick_duration)
                        .unwrap_or_else(Instant::now);
                } else {
                    state.running = false;
                }
                continue;
            }

            match rx.recv_timeout(state.next_tick - now) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            }
        };

        if !state.handle(command) {
            break;
        }
    }

    let _ = state.connection.close();
}

fn send_byte(connection: &mut MidiOutputConnection, byte: u8) -> Result<(), SendError> {
    connection.send(&[byte])
}

fn duration_from_bpm(bpm: f64) -> Duration {
    let nanos = (60_000_000_000_f64 / (bpm * PPQN)).max(1.0);
    Duration::from_nanos(nanos as u64)
}

fn sanitize_bpm(raw: f64) -> f64 {
    raw.clamp(MIN_BPM, MAX_BPM)
}
