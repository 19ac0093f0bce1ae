use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidBpm(f64),
    #[cfg(feature = "midi")]
    #[error("failed to initialise MIDI: {0}")]
    MidiInit(String),
    #[cfg(feature = "midi")]
    #[error("no MIDI port matching \"{0}\" was found")]
    MidiPortNotFound(String),
    #[cfg(feature = "midi")]
    #[error("failed to open MIDI connection: {0}")]
    MidiConnection(String),
    #[cfg(feature = "midi")]
    #[error("midi clock thread error: {0}")]
    MidiThread(String),
    #[error("{0} support was not compiled in; rebuild with `--features {0}`")]
    FeatureDisabled(&'static str),
}
