//! Console configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`exposure.toml`, or the path in `EXPOSURE_CONFIG`), then
//! `EXPOSURE__*` environment variables (e.g. `EXPOSURE__VOICE_ID`).

use crate::device::DEFAULT_BUTTON_COUNT;
use crate::error::{VoiceError, VoiceResult};
use crate::session::SessionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "exposure.toml";

/// Which synthesis backend the console talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    Demo,
    Google,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub voice_id: String,
    pub language_code: String,
    #[serde(default)]
    pub speaking_rate: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    pub synthesis: SynthesisBackend,
    pub google_api_url: String,
    /// Bearer token for the Google backend, obtained out of band.
    #[serde(default)]
    pub google_access_token: Option<String>,
    pub device_buttons: usize,
    pub mapping_path: PathBuf,
    pub clips_dir: PathBuf,
    pub synthesis_timeout_secs: u64,
}

impl ConsoleConfig {
    /// Load `.env`, then the layered configuration.
    pub fn load() -> VoiceResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!(".env not loaded: {}", e);
        }
        let path =
            std::env::var("EXPOSURE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load with `path` as the file layer. A missing file is skipped.
    pub fn load_from(path: &Path) -> VoiceResult<Self> {
        let builder = ::config::Config::builder()
            .set_default("voice_id", "en-US-Standard-A")?
            .set_default("language_code", "en-US")?
            .set_default("synthesis", "demo")?
            .set_default("google_api_url", "https://texttospeech.googleapis.com/v1")?
            .set_default("device_buttons", DEFAULT_BUTTON_COUNT as i64)?
            .set_default("mapping_path", "device_mappings.toml")?
            .set_default("clips_dir", "clips")?
            .set_default("synthesis_timeout_secs", 30_i64)?;

        let builder = if path.exists() {
            info!(path = %path.display(), "Loading console config");
            builder.add_source(::config::File::from(path))
        } else {
            builder
        };

        let loaded: ConsoleConfig = builder
            .add_source(::config::Environment::with_prefix("EXPOSURE").separator("__"))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> VoiceResult<()> {
        if self.device_buttons == 0 {
            return Err(VoiceError::Config("device_buttons must be at least 1".into()));
        }
        if let Some(rate) = self.speaking_rate {
            if rate <= 0.0 {
                return Err(VoiceError::Config(format!(
                    "speaking_rate must be positive, got {}",
                    rate
                )));
            }
        }
        if self.synthesis_timeout_secs == 0 {
            return Err(VoiceError::Config("synthesis_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            voice_id: self.voice_id.clone(),
            rate: self.speaking_rate,
            pitch: self.pitch,
            synthesis_timeout: self.synthesis_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConsoleConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.language_code, "en-US");
        assert_eq!(config.synthesis, SynthesisBackend::Demo);
        assert_eq!(config.mapping_path, PathBuf::from("device_mappings.toml"));
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(30));
        assert!(config.speaking_rate.is_none());
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "voice_id = \"en-US-Standard-C\"\nsynthesis = \"google\"\nspeaking_rate = 1.25\ndevice_buttons = 16"
        )
        .unwrap();
        let config = ConsoleConfig::load_from(file.path()).unwrap();
        assert_eq!(config.voice_id, "en-US-Standard-C");
        assert_eq!(config.synthesis, SynthesisBackend::Google);
        assert_eq!(config.device_buttons, 16);
        let settings = config.session_settings();
        assert_eq!(settings.rate, Some(1.25));
        assert_eq!(settings.voice_id, "en-US-Standard-C");
    }

    #[test]
    fn zero_buttons_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "device_buttons = 0").unwrap();
        assert!(matches!(
            ConsoleConfig::load_from(file.path()),
            Err(VoiceError::Config(_))
        ));
    }

    #[test]
    fn non_positive_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConsoleConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        config.speaking_rate = Some(0.0);
        assert!(config.validate().is_err());
        config.speaking_rate = Some(0.5);
        assert!(config.validate().is_ok());
    }
}
