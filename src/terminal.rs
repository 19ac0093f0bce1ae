use std::{
    io::{self, Write},
    sync::mpsc::Sender,
    thread,
    time::Instant,
};

use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, warn};

use crate::{
    config::{Column, RowSet},
    session::{Command, TapSession},
    table::TimingReport,
    ControlMessage,
};

const THREAD_NAME: &str = "tap-bpm-input";
const PLACEHOLDER: &str = "Tap to get started";
const HELP: &str =
    "Space/click: tap  R: reset  F1: rounding  F2: division  L: lock  Q/Esc: quit";

/// Raw mode, alternate screen and mouse capture for as long as it is alive.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)
        {
            let _ = terminal::disable_raw_mode();
            return Err(err);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, cursor::Show, DisableMouseCapture, LeaveAlternateScreen)
        {
            warn!("failed to restore terminal: {err}");
        }
        let _ = terminal::disable_raw_mode();
    }
}

/// Forward terminal events to `tx` from a background thread.
///
/// The thread ends when the receiving side hangs up or reading fails.
pub fn spawn_input(tx: Sender<ControlMessage>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || loop {
            let event = match event::read() {
                Ok(event) => event,
                Err(err) => {
                    warn!("terminal input error: {err}");
                    let _ = tx.send(ControlMessage::Quit);
                    return;
                }
            };

            let now = Instant::now();
            if let Some(message) = map_event(&event, now) {
                if tx.send(message).is_err() {
                    return;
                }
            }
        })
}

/// Translate one terminal event into a session message.
pub fn map_event(event: &Event, now: Instant) -> Option<ControlMessage> {
    match event {
        Event::Key(key) => map_key(key, now),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                Some(ControlMessage::Command(Command::Tap(now)))
            }
            _ => None,
        },
        Event::Resize(width, height) => {
            debug!("terminal resized to {width}x{height}");
            Some(ControlMessage::Redraw)
        }
        _ => None,
    }
}

fn map_key(key: &KeyEvent, now: Instant) -> Option<ControlMessage> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let command = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(ControlMessage::Quit)
        }
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
            return Some(ControlMessage::Quit)
        }
        KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('t') | KeyCode::Char('T') => {
            Command::Tap(now)
        }
        KeyCode::Char('r') | KeyCode::Char('R') => Command::Reset,
        KeyCode::Char('l') | KeyCode::Char('L') => Command::ToggleLock,
        KeyCode::F(1) => Command::ToggleRounding,
        KeyCode::F(2) => Command::CycleDivisionMode,
        _ => return None,
    };
    Some(ControlMessage::Command(command))
}

/// Lines shown on screen, top to bottom, with their colour.
pub fn screen_lines(
    session: &TapSession,
    rows: RowSet,
    columns: &[Column],
) -> Vec<(String, Color)> {
    let prefs = session.preferences();
    let mut lines = Vec::new();

    match session.table() {
        Some(table) => {
            let report = TimingReport::build(&table, prefs, rows, columns);
            lines.push((format!("BPM: {}", report.bpm), Color::White));
            lines.push((String::new(), Color::Reset));
            lines.push((report.header_line(), Color::DarkCyan));
            lines.extend(report.row_lines().map(|line| (line, Color::White)));
        }
        None => lines.push((PLACEHOLDER.to_string(), Color::White)),
    }

    lines.push((String::new(), Color::Reset));
    lines.push((
        format!(
            "rounding: {}   division: {}   taps: {}{}",
            if prefs.round_outputs { "on" } else { "off" },
            prefs.division_mode,
            session.taps(),
            if prefs.locked { "   [locked]" } else { "" },
        ),
        Color::DarkGrey,
    ));

    lines
}

/// Redraw the whole screen, centring the table block.
pub fn draw<W: Write>(
    out: &mut W,
    session: &TapSession,
    rows: RowSet,
    columns: &[Column],
) -> io::Result<()> {
    let (width, height) = terminal::size()?;
    let lines = screen_lines(session, rows, columns);

    let block_width = lines
        .iter()
        .map(|(line, _)| line.chars().count())
        .max()
        .unwrap_or(0);
    let start_x = centre(width, block_width);
    let start_y = centre(height, lines.len());

    queue!(out, Clear(ClearType::All))?;
    for (offset, (line, color)) in lines.iter().enumerate() {
        let y = start_y.saturating_add(offset as u16);
        queue!(
            out,
            cursor::MoveTo(start_x, y),
            SetForegroundColor(*color),
            Print(line)
        )?;
    }

    let help_x = centre(width, HELP.chars().count());
    queue!(
        out,
        cursor::MoveTo(help_x, height.saturating_sub(1)),
        SetForegroundColor(Color::Green),
        Print(HELP),
        ResetColor
    )?;
    out.flush()
}

fn centre(available: u16, used: usize) -> u16 {
    let used = u16::try_from(used).unwrap_or(u16::MAX);
    available.saturating_sub(used) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{preferences::DisplayPreferences, tap_tempo::TapTempo};
    use crossterm::event::{KeyEventState, MouseEvent};
    use std::time::Duration;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn command(event: Event) -> Option<Command> {
        match map_event(&event, Instant::now()) {
            Some(ControlMessage::Command(command)) => Some(command),
            _ => None,
        }
    }

    #[test]
    fn tap_keys_and_click() {
        let now = Instant::now();
        let click = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });

        for event in [key(KeyCode::Char(' ')), key(KeyCode::Enter), click] {
            assert_eq!(
                map_event(&event, now),
                Some(ControlMessage::Command(Command::Tap(now)))
            );
        }
    }

    #[test]
    fn command_keys() {
        assert_eq!(command(key(KeyCode::Char('r'))), Some(Command::Reset));
        assert_eq!(command(key(KeyCode::F(1))), Some(Command::ToggleRounding));
        assert_eq!(command(key(KeyCode::F(2))), Some(Command::CycleDivisionMode));
        assert_eq!(command(key(KeyCode::Char('L'))), Some(Command::ToggleLock));
    }

    #[test]
    fn quit_keys() {
        let now = Instant::now();
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        for event in [key(KeyCode::Esc), key(KeyCode::Char('q')), ctrl_c] {
            assert_eq!(map_event(&event, now), Some(ControlMessage::Quit));
        }
    }

    #[test]
    fn key_release_is_ignored() {
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char(' '),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(map_event(&release, Instant::now()), None);
    }

    #[test]
    fn resize_requests_redraw() {
        assert_eq!(
            map_event(&Event::Resize(80, 24), Instant::now()),
            Some(ControlMessage::Redraw)
        );
    }

    #[test]
    fn placeholder_before_first_estimate() {
        let session = TapSession::new(TapTempo::default(), DisplayPreferences::default());
        let lines = screen_lines(&session, RowSet::Standard, &[Column::Time]);
        assert_eq!(lines[0].0, PLACEHOLDER);
    }

    #[test]
    fn table_after_estimate() {
        let mut session = TapSession::new(TapTempo::default(), DisplayPreferences::default());
        let start = Instant::now();
        session.apply(Command::Tap(start));
        session.apply(Command::Tap(start + Duration::from_millis(500)));

        let lines = screen_lines(&session, RowSet::Standard, &[Column::Time]);

        assert_eq!(lines[0].0, "BPM: 120");
        assert_eq!(lines[2].0, "Note           Time");
        // header, 8 rows, blank line, status line
        assert_eq!(lines.len(), 3 + 8 + 2);
        assert!(lines.last().unwrap().0.starts_with("rounding: on"));
    }
}
