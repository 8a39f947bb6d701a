use std::path::PathBuf;

use thiserror::Error;

/// A track could not be opened or decoded. The player keeps its previous binding.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to probe format: {0}")]
    Probe(#[source] symphonia::core::errors::Error),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("no sample rate in track")]
    MissingSampleRate,

    #[error("decode error: {0}")]
    Decoder(#[source] symphonia::core::errors::Error),

    #[error("{path:?} contains no audio frames")]
    Empty { path: PathBuf },

    #[error("unknown track: {0}")]
    UnknownTrack(String),
}

/// Audio device start-up failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to get output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to query supported configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A control-console line that could not be turned into an event.
#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("empty command")]
    Empty,

    #[error("unknown deck '{0}' (expected 1 or 2)")]
    UnknownDeck(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing argument for '{0}'")]
    MissingArgument(&'static str),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid toggle '{0}' (expected on or off)")]
    InvalidToggle(String),
}
