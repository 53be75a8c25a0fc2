//! Error types for the Exposure voice session core

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised by collaborators and configuration.
///
/// The session orchestrator converts every one of these into a state
/// transition plus an `error` log entry; only the device adapter and
/// configuration loading hand them back to the caller.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Streaming capture error: {0}")]
    Capture(String),

    #[error("Device panel error: {0}")]
    Device(String),

    #[error("Mapping store error: {0}")]
    MappingStore(String),

    #[error("Audio clip error: {0}")]
    Clip(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

impl From<::config::ConfigError> for VoiceError {
    fn from(err: ::config::ConfigError) -> Self {
        VoiceError::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for VoiceError {
    fn from(err: base64::DecodeError) -> Self {
        VoiceError::Synthesis(format!("audio payload is not valid base64: {}", err))
    }
}
