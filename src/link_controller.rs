use ableton_link::{Link, SessionState};
use log::info;

use crate::sink::TempoSink;

/// Publishes the tapped tempo to an Ableton Link session.
///
/// The session starts playing on the first estimate and stops when the tap
/// history is reset.
pub struct LinkController {
    link: Link,
    playing: bool,
}

impl LinkController {
    pub fn new(initial_bpm: f64) -> Self {
        let mut link = Link::new(initial_bpm);
        link.enable_start_stop_sync(true);
        link.enable(true);
        info!("ableton link enabled");
        Self {
            link,
            playing: false,
        }
    }

    fn app_session_state(&self) -> Option<SessionState> {
        let mut state_opt = None;
        self.link
            .with_app_session_state(|state| state_opt = Some(state));
        state_opt
    }
}

impl TempoSink for LinkController {
    fn tempo_changed(&mut self, bpm: f64) {
        let now = self.link.clock().micros();
        if let Some(mut state) = self.app_session_state() {
            state.set_tempo(bpm, now);
            if !self.playing {
                state.set_is_playing(true, now);
            }
            self.link.commit_app_session_state(state);
            self.playing = true;
        }
    }

    fn tempo_cleared(&mut self) {
        if !self.playing {
            return;
        }
        let now = self.link.clock().micros();
        if let Some(mut state) = self.app_session_state() {
            state.set_is_playing(false, now);
            self.link.commit_app_session_state(state);
        }
        self.playing = false;
    }
}
