//! **Speech synthesis** — the collaborator that turns markup into audio.
//!
//! Implement [`SpeechSynthesizer`] for a cloud or local engine. The session
//! orchestrator calls it at most once at a time and measures latency itself.

use crate::error::{VoiceError, VoiceResult};
use crate::playback::AudioPayload;
use crate::ssml;
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One synthesis request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub markup: Option<String>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
}

/// Audio returned by the synthesizer, with the latency it observed.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResponse {
    pub audio: AudioPayload,
    pub measured_latency_ms: u64,
}

/// A voice offered by the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub language_code: String,
    pub gender: String,
}

/// Voices offered when the backend cannot list its own.
pub fn default_voices() -> Vec<VoiceInfo> {
    [
        ("en-US-Standard-A", "FEMALE"),
        ("en-US-Standard-B", "MALE"),
        ("en-US-Standard-C", "FEMALE"),
        ("en-US-Standard-D", "MALE"),
    ]
    .into_iter()
    .map(|(name, gender)| VoiceInfo {
        name: name.to_string(),
        language_code: "en-US".to_string(),
        gender: gender.to_string(),
    })
    .collect()
}

/// Backend that turns text or markup into playable audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<SynthesisResponse>;

    /// Voices this backend can speak with.
    async fn voices(&self) -> VoiceResult<Vec<VoiceInfo>> {
        Ok(default_voices())
    }
}

/// Demo synthesizer: no network, echoes the markup back as the payload.
#[derive(Debug, Default)]
pub struct DemoSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DemoSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<SynthesisResponse> {
        let body = request.markup.as_deref().unwrap_or(&request.text);
        info!("[DEMO] Synthesizing: {:?} with voice: {}", request.text, request.voice_id);
        Ok(SynthesisResponse {
            audio: AudioPayload::new(body.as_bytes().to_vec()),
            measured_latency_ms: 0,
        })
    }
}

/// Google Cloud Text-to-Speech over REST.
///
/// The bearer token is obtained elsewhere; this backend only spends it.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    /// Base URL without trailing slash (e.g. https://texttospeech.googleapis.com/v1).
    pub base_url: String,
    pub access_token: String,
    pub language_code: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeReply {
    audio_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVoice {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
    #[serde(default)]
    ssml_gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesReply {
    #[serde(default)]
    voices: Vec<GoogleVoice>,
}

impl GoogleTts {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        language_code: impl Into<String>,
        timeout: Duration,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            language_code: language_code.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request_body(&self, request: &SynthesisRequest) -> serde_json::Value {
        let input = match request.markup.as_deref() {
            Some(markup) if ssml::is_markup(markup) => serde_json::json!({ "ssml": markup }),
            _ => serde_json::json!({ "text": request.text }),
        };
        serde_json::json!({
            "input": input,
            "voice": {
                "languageCode": self.language_code,
                "name": request.voice_id,
                "ssmlGender": "NEUTRAL",
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": request.rate.unwrap_or(1.0),
                "pitch": request.pitch.unwrap_or(0.0),
            },
        })
    }

    async fn error_message(res: reqwest::Response) -> String {
        let status = res.status();
        let body: serde_json::Value = res.json().await.unwrap_or_default();
        let detail = body
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        format!("TTS API error {}: {}", status.as_u16(), detail)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<SynthesisResponse> {
        let started = Instant::now();
        let res = self
            .client
            .post(self.endpoint("text:synthesize"))
            .bearer_auth(&self.access_token)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        if !res.status().is_success() {
            return Err(VoiceError::Synthesis(Self::error_message(res).await));
        }
        let reply: SynthesizeReply = res
            .json()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        let audio = base64::engine::general_purpose::STANDARD.decode(reply.audio_content)?;
        let measured_latency_ms = started.elapsed().as_millis() as u64;
        debug!(bytes = audio.len(), measured_latency_ms, "GoogleTts: synthesized");
        Ok(SynthesisResponse {
            audio: AudioPayload::new(audio),
            measured_latency_ms,
        })
    }

    async fn voices(&self) -> VoiceResult<Vec<VoiceInfo>> {
        let started = Instant::now();
        let res = self
            .client
            .get(self.endpoint("voices"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(VoiceError::Synthesis(Self::error_message(res).await));
        }
        let reply: VoicesReply = res.json().await?;
        info!("Voices fetched in {}ms", started.elapsed().as_millis());
        Ok(reply
            .voices
            .into_iter()
            .map(|v| VoiceInfo {
                language_code: v.language_codes.into_iter().next().unwrap_or_default(),
                gender: v.ssml_gender.unwrap_or_else(|| "NEUTRAL".to_string()),
                name: v.name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> GoogleTts {
        GoogleTts::new(
            "https://tts.example/v1/",
            "token",
            "en-US",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn demo_echoes_markup() {
        let response = DemoSynthesizer
            .synthesize(&SynthesisRequest {
                text: "hi".to_string(),
                voice_id: "v".to_string(),
                markup: Some("<speak>hi</speak>".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.audio.as_bytes(), b"<speak>hi</speak>");
    }

    #[test]
    fn google_sends_ssml_only_for_markup() {
        let tts = google();
        let with_markup = tts.request_body(&SynthesisRequest {
            text: "hi".to_string(),
            voice_id: "en-US-Standard-B".to_string(),
            markup: Some(ssml::annotate("hi", Some("calm"))),
            rate: Some(1.2),
            pitch: None,
        });
        assert!(with_markup["input"]["ssml"].as_str().unwrap().starts_with("<speak>"));
        assert_eq!(with_markup["voice"]["name"], "en-US-Standard-B");
        assert_eq!(with_markup["audioConfig"]["pitch"], 0.0);

        let plain = tts.request_body(&SynthesisRequest {
            text: "hi".to_string(),
            ..Default::default()
        });
        assert_eq!(plain["input"]["text"], "hi");
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(google().endpoint("voices"), "https://tts.example/v1/voices");
    }

    #[test]
    fn default_voice_list() {
        let voices = default_voices();
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[1].gender, "MALE");
    }
}
