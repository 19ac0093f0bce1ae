/// Something that follows the tapped tempo, such as a clock output.
pub trait TempoSink {
    /// A new estimate is available.
    fn tempo_changed(&mut self, bpm: f64);

    /// The tap history was reset.
    fn tempo_cleared(&mut self);
}

/// Forward tempo updates to every sink.
pub fn broadcast(sinks: &mut [Box<dyn TempoSink>], bpm: Option<f64>) {
    for sink in sinks.iter_mut() {
        match bpm {
            Some(bpm) => sink.tempo_changed(bpm),
            None => sink.tempo_cleared(),
        }
    }
}
