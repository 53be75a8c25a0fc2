//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use exposure_voice::{
    AudioPayload, AudioPlayback, Collaborators, DemoClips, EmotionRegistry, SessionLog,
    SessionOrchestrator, SessionSettings, SpeechSynthesizer, StreamingCapture, SynthesisRequest,
    SynthesisResponse, VoiceError, VoiceResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Holds a synthesis in flight until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct ScriptedSynth {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub gate: Option<Arc<Gate>>,
    pub requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedSynth {
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynth {
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<SynthesisResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Synthesis("quota exceeded".into()));
        }
        Ok(SynthesisResponse {
            audio: AudioPayload::new(format!("audio:{}", request.text).into_bytes()),
            measured_latency_ms: 42,
        })
    }
}

#[derive(Default)]
pub struct RecordingPlayback {
    pub played: Mutex<Vec<AudioPayload>>,
    pub fail: AtomicBool,
}

impl RecordingPlayback {
    pub fn played(&self) -> Vec<AudioPayload> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayback for RecordingPlayback {
    async fn play(&self, payload: &AudioPayload) -> VoiceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Playback("no output device".into()));
        }
        self.played.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCapture {
    pub calls: Mutex<Vec<String>>,
    pub fail_start: AtomicBool,
    /// Number of upcoming `stop` calls that fail.
    pub stop_failures: AtomicUsize,
    starts: AtomicUsize,
    /// Holds every `start` after the first one.
    resume_gate: Option<Arc<Gate>>,
}

impl RecordingCapture {
    pub fn gated_resume(gate: Arc<Gate>) -> Self {
        Self {
            resume_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingCapture for RecordingCapture {
    async fn start(&self, voice_id: &str) -> VoiceResult<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(VoiceError::Capture("socket refused".into()));
        }
        let earlier_starts = self.starts.fetch_add(1, Ordering::SeqCst);
        if let (Some(gate), true) = (&self.resume_gate, earlier_starts > 0) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.calls.lock().unwrap().push(format!("start:{voice_id}"));
        Ok(())
    }

    async fn stop(&self) -> VoiceResult<()> {
        let failing = self
            .stop_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(VoiceError::Capture("stop not acknowledged".into()));
        }
        self.calls.lock().unwrap().push("stop".to_string());
        Ok(())
    }
}

pub struct Harness {
    pub session: Arc<SessionOrchestrator>,
    pub synth: Arc<ScriptedSynth>,
    pub playback: Arc<RecordingPlayback>,
    pub capture: Arc<RecordingCapture>,
}

impl Harness {
    pub fn new(synth: ScriptedSynth) -> Self {
        Self::with_settings(synth, SessionSettings::default())
    }

    pub fn with_settings(synth: ScriptedSynth, settings: SessionSettings) -> Self {
        Self::build(synth, RecordingCapture::default(), settings)
    }

    pub fn build(synth: ScriptedSynth, capture: RecordingCapture, settings: SessionSettings) -> Self {
        init_tracing();
        let synth = Arc::new(synth);
        let playback = Arc::new(RecordingPlayback::default());
        let capture = Arc::new(capture);
        let collaborators = Collaborators {
            synthesizer: synth.clone(),
            playback: playback.clone(),
            capture: capture.clone(),
            clips: Arc::new(DemoClips),
        };
        let session = Arc::new(SessionOrchestrator::new(
            Arc::new(EmotionRegistry::with_builtins()),
            Arc::new(SessionLog::new()),
            collaborators,
            settings,
        ));
        Self {
            session,
            synth,
            playback,
            capture,
        }
    }

    pub fn gated() -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        (Self::new(ScriptedSynth::gated(gate.clone())), gate)
    }
}

pub fn short_timeout() -> SessionSettings {
    SessionSettings {
        synthesis_timeout: Duration::from_millis(50),
        ..SessionSettings::default()
    }
}
