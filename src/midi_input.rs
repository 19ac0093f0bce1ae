use log::debug;
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::{sync::mpsc::Sender, time::Instant};

use crate::{error::AppError, session::Command, ControlMessage};

const NOTE_ON: u8 = 0x90;

/// Treats note-on messages from a MIDI input port as taps.
///
/// The connection stays open for as long as the value is alive.
pub struct MidiTapInput {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiTapInput {
    pub fn connect(port_hint: &str, tx: Sender<ControlMessage>) -> Result<Self, AppError> {
        let mut midi_in =
            MidiInput::new("tap-bpm").map_err(|err| AppError::MidiInit(err.to_string()))?;
        midi_in.ignore(Ignore::All);

        let hint = port_hint.trim().to_lowercase();
        let target_port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                hint.is_empty()
                    || midi_in
                        .port_name(port)
                        .map(|name| name.to_lowercase().contains(&hint))
                        .unwrap_or(false)
            })
            .ok_or_else(|| AppError::MidiPortNotFound(port_hint.to_string()))?;

        let port_name = midi_in
            .port_name(&target_port)
            .unwrap_or_else(|_| "<unknown>".into());

        let connection = midi_in
            .connect(
                &target_port,
                "tap-bpm-in",
                move |_stamp, message, _| {
                    if is_tap(message) {
                        let now = Instant::now();
                        debug!("midi tap {message:02x?}");
                        let _ = tx.send(ControlMessage::Command(Command::Tap(now)));
                    }
                },
                (),
            )
            .map_err(|err| AppError::MidiConnection(err.to_string()))?;

        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Note-on with non-zero velocity on any channel.
fn is_tap(message: &[u8]) -> bool {
    match message {
        [status, _note, velocity, ..] => status & 0xF0 == NOTE_ON && *velocity > 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_tap;

    #[test]
    fn note_on_is_a_tap() {
        assert!(is_tap(&[0x90, 60, 100]));
        assert!(is_tap(&[0x9A, 36, 1]));
    }

    #[test]
    fn other_messages_are_ignored() {
        // note-on with zero velocity is a note-off
        assert!(!is_tap(&[0x90, 60, 0]));
        assert!(!is_tap(&[0x80, 60, 100]));
        assert!(!is_tap(&[0xF8]));
        assert!(!is_tap(&[]));
    }
}
