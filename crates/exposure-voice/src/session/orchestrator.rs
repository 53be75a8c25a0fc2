//! **Session Orchestrator** — the single-flight state machine behind the console.
//!
//! Every speak, trigger, replay and listening transition goes through here.
//! At most one synthesis is in flight: the status flips to `Processing` before
//! the first suspension point, so any overlapping request sees it and is
//! rejected. Collaborator failures never escape; they become an `error` log
//! entry and a return to `Idle`.

use crate::capture::{NullCapture, StreamingCapture};
use crate::emotion::{
    EmotionDefinition, EmotionDraft, EmotionId, EmotionKind, EmotionRegistry, EmotionValidator,
};
use crate::error::{VoiceError, VoiceResult};
use crate::playback::{AudioPayload, AudioPlayback, ClipSource, DemoClips, SilentPlayback};
use crate::session::state::{
    admits, completion_status, Operation, ReplayEntry, SessionState, SessionStatus,
};
use crate::session_log::{PendingEntry, SessionLog};
use crate::ssml;
use crate::synthesis::{
    default_voices, DemoSynthesizer, SpeechSynthesizer, SynthesisRequest, VoiceInfo,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The external services a session talks to, chosen once at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub playback: Arc<dyn AudioPlayback>,
    pub capture: Arc<dyn StreamingCapture>,
    pub clips: Arc<dyn ClipSource>,
}

impl Collaborators {
    /// Stand-ins that need no network or audio hardware.
    pub fn demo() -> Self {
        Self {
            synthesizer: Arc::new(DemoSynthesizer),
            playback: Arc::new(SilentPlayback),
            capture: Arc::new(NullCapture::default()),
            clips: Arc::new(DemoClips),
        }
    }
}

/// Per-session synthesis settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub voice_id: String,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub synthesis_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            voice_id: "en-US-Standard-A".to_string(),
            rate: None,
            pitch: None,
            synthesis_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of `speak` / `trigger`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Audio was produced and played.
    Completed { latency_ms: u64 },
    /// Another operation holds the session.
    Rejected { status: SessionStatus },
    /// A collaborator failed; the session is back in `Idle`.
    Failed { reason: String },
    /// The emotion id is not registered.
    Unresolved,
}

impl SpeakOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SpeakOutcome::Completed { .. })
    }
}

/// Result of `start_listening` / `stop_listening`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    Started,
    Stopped,
    Rejected { status: SessionStatus },
    Failed { reason: String },
}

/// Result of `replay`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    Replayed,
    Rejected { status: SessionStatus },
    /// Nothing has been synthesized yet.
    Empty,
    Failed { reason: String },
}

enum AudioSource {
    Synthesize { tag: Option<String> },
    Clip { reference: String },
}

struct VoiceJob {
    text: String,
    source: AudioSource,
    emotion_label: Option<String>,
}

impl VoiceJob {
    fn completed_entry(&self, latency_ms: u64) -> PendingEntry {
        match &self.emotion_label {
            Some(label) => PendingEntry::emotion(&self.text, label, latency_ms),
            None => PendingEntry::tts(&self.text, latency_ms),
        }
    }
}

pub struct SessionOrchestrator {
    state: Mutex<SessionState>,
    registry: Arc<EmotionRegistry>,
    log: Arc<SessionLog>,
    collaborators: Collaborators,
    settings: SessionSettings,
}

impl SessionOrchestrator {
    pub fn new(
        registry: Arc<EmotionRegistry>,
        log: Arc<SessionLog>,
        collaborators: Collaborators,
        settings: SessionSettings,
    ) -> Self {
        info!(voice = %settings.voice_id, emotions = registry.len(), "Session orchestrator ready");
        Self {
            state: Mutex::new(SessionState::new(settings.voice_id.clone())),
            registry,
            log,
            collaborators,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn registry(&self) -> &Arc<EmotionRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<SessionLog> {
        &self.log
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    /// False while a synthesis or capture transition is in flight.
    pub fn is_accepting_triggers(&self) -> bool {
        self.lock().accepts_triggers()
    }

    /// Speak typed text, optionally shaped by an SSML preset.
    pub async fn speak(&self, text: &str, tag: Option<&str>) -> SpeakOutcome {
        self.run(VoiceJob {
            text: text.to_string(),
            source: AudioSource::Synthesize {
                tag: tag.map(str::to_string),
            },
            emotion_label: None,
        })
        .await
    }

    /// Speak an operator line, honouring a leading `/tag`.
    pub async fn speak_line(&self, input: &str) -> SpeakOutcome {
        let parsed = ssml::parse_command(input.trim());
        self.speak(&parsed.remainder, parsed.tag.as_deref()).await
    }

    /// Fire a registered emotion. Unknown ids are a silent no-op.
    pub async fn trigger(&self, emotion_id: &str) -> SpeakOutcome {
        let Some(definition) = self.registry.find_by_id(emotion_id) else {
            debug!(emotion_id, "Trigger ignored: unknown emotion");
            return SpeakOutcome::Unresolved;
        };
        let source = match definition.kind {
            EmotionKind::Synthesized => AudioSource::Synthesize {
                tag: definition.tag.clone(),
            },
            EmotionKind::Audio => AudioSource::Clip {
                reference: definition.phrase.clone(),
            },
        };
        self.run(VoiceJob {
            text: definition.phrase,
            source,
            emotion_label: Some(definition.display_name),
        })
        .await
    }

    /// Register a new emotion and prove it playable. Returns the assigned id.
    pub async fn add_emotion(&self, draft: EmotionDraft) -> EmotionId {
        self.registry.add(draft, self).await
    }

    /// Claim the single synthesis slot. Returns whether capture must be paused
    /// and the voice to speak with.
    fn begin_speak(&self) -> Result<(bool, String), SessionStatus> {
        let mut state = self.lock();
        if !state.accepts_triggers() {
            return Err(state.status);
        }
        let was_listening = state.status == SessionStatus::Listening;
        if was_listening {
            state.resume_listening_on_completion = true;
        }
        state.status = SessionStatus::Processing;
        Ok((was_listening, state.active_voice_id.clone()))
    }

    async fn run(&self, job: VoiceJob) -> SpeakOutcome {
        let (pause_capture, voice_id) = match self.begin_speak() {
            Ok(claim) => claim,
            Err(status) => {
                warn!(%status, "Speak rejected: session busy");
                return SpeakOutcome::Rejected { status };
            }
        };
        debug!(text = %job.text, voice = %voice_id, resume = pause_capture, "Speak dispatched");

        if pause_capture {
            if let Err(first) = self.collaborators.capture.stop().await {
                warn!(error = %first, "Pausing listening failed, retrying once");
                if let Err(e) = self.collaborators.capture.stop().await {
                    return self.fail(
                        format!("Could not pause listening, capture state unknown: {}", e),
                        &job,
                    );
                }
            }
        }

        let (audio, latency_ms) = match self.produce(&job, &voice_id).await {
            Ok(produced) => produced,
            Err(e) => return self.fail(e.to_string(), &job),
        };

        if let Err(e) = self.collaborators.playback.play(&audio).await {
            return self.fail(e.to_string(), &job);
        }

        let resume = {
            let mut state = self.lock();
            state.last_latency_ms = Some(latency_ms);
            state.replay_cache.store(ReplayEntry {
                text: job.text.clone(),
                audio,
            });
            state.resume_listening_on_completion
        };
        self.log.append(job.completed_entry(latency_ms));
        info!(latency_ms, emotion = ?job.emotion_label, "Speak completed");

        if resume {
            self.resume_listening(&voice_id).await;
        } else {
            self.settle(completion_status(false, true));
        }
        SpeakOutcome::Completed { latency_ms }
    }

    /// Reopen capture after a speak that paused it. A `stop_listening` that
    /// lands while capture restarts wins: capture is closed again and the
    /// session settles in `Idle`.
    async fn resume_listening(&self, voice_id: &str) {
        if let Err(e) = self.collaborators.capture.start(voice_id).await {
            let reason = format!("Could not resume listening: {}", e);
            error!("{}", reason);
            self.log.append(PendingEntry::error(reason));
            self.settle(SessionStatus::Idle);
            return;
        }

        let still_wanted = {
            let mut state = self.lock();
            let wanted = state.resume_listening_on_completion;
            if wanted {
                state.status = completion_status(true, true);
                state.resume_listening_on_completion = false;
            }
            wanted
        };
        if still_wanted {
            debug!(voice = voice_id, "Listening resumed");
            return;
        }

        info!("Listening was stopped during the speak; closing capture again");
        if let Err(e) = self.collaborators.capture.stop().await {
            let reason = format!("Could not stop listening cleanly: {}", e);
            error!("{}", reason);
            self.log.append(PendingEntry::error(reason));
        }
        self.settle(SessionStatus::Idle);
    }

    /// Fetch the audio for `job` and measure how long the collaborator took.
    async fn produce(&self, job: &VoiceJob, voice_id: &str) -> VoiceResult<(AudioPayload, u64)> {
        let started = Instant::now();
        match &job.source {
            AudioSource::Synthesize { tag } => {
                let request = SynthesisRequest {
                    text: job.text.clone(),
                    voice_id: voice_id.to_string(),
                    markup: Some(ssml::annotate(&job.text, tag.as_deref())),
                    rate: self.settings.rate,
                    pitch: self.settings.pitch,
                };
                let timeout = self.settings.synthesis_timeout;
                let response =
                    tokio::time::timeout(timeout, self.collaborators.synthesizer.synthesize(&request))
                        .await
                        .map_err(|_| {
                            VoiceError::Synthesis(format!(
                                "synthesis timed out after {} ms",
                                timeout.as_millis()
                            ))
                        })??;
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(
                    latency_ms,
                    reported_ms = response.measured_latency_ms,
                    "Synthesis returned"
                );
                Ok((response.audio, latency_ms))
            }
            AudioSource::Clip { reference } => {
                let audio = self.collaborators.clips.load(reference).await?;
                Ok((audio, started.elapsed().as_millis() as u64))
            }
        }
    }

    fn fail(&self, reason: String, job: &VoiceJob) -> SpeakOutcome {
        error!(reason = %reason, emotion = ?job.emotion_label, "Speak failed");
        self.log
            .append(PendingEntry::error(reason.clone()).with_emotion_label(job.emotion_label.clone()));
        self.settle(completion_status(true, false));
        SpeakOutcome::Failed { reason }
    }

    fn settle(&self, status: SessionStatus) {
        let mut state = self.lock();
        state.status = status;
        state.resume_listening_on_completion = false;
        debug!(%status, "Session settled");
    }

    /// Open a listening session with `voice_id`.
    pub async fn start_listening(&self, voice_id: &str) -> ListenOutcome {
        {
            let mut state = self.lock();
            if state.capture_pending || !admits(state.status, Operation::StartListening) {
                return ListenOutcome::Rejected {
                    status: state.status,
                };
            }
            state.capture_pending = true;
        }

        let result = self.collaborators.capture.start(voice_id).await;

        {
            let mut state = self.lock();
            state.capture_pending = false;
            if result.is_ok() {
                state.status = SessionStatus::Listening;
                state.active_voice_id = voice_id.to_string();
            }
        }
        match result {
            Ok(()) => {
                info!(voice = voice_id, "Listening started");
                ListenOutcome::Started
            }
            Err(e) => {
                let reason = format!("Could not start listening: {}", e);
                error!("{}", reason);
                self.log.append(PendingEntry::error(reason.clone()));
                ListenOutcome::Failed { reason }
            }
        }
    }

    /// Close the listening session. While a speak interrupted listening, this
    /// only cancels the pending resume; the speak itself runs to completion.
    pub async fn stop_listening(&self) -> ListenOutcome {
        {
            let mut state = self.lock();
            if state.status == SessionStatus::Processing && state.resume_listening_on_completion {
                state.resume_listening_on_completion = false;
                info!("Pending listening resume cancelled");
                return ListenOutcome::Stopped;
            }
            if state.capture_pending || !admits(state.status, Operation::StopListening) {
                return ListenOutcome::Rejected {
                    status: state.status,
                };
            }
            state.capture_pending = true;
        }

        let result = self.collaborators.capture.stop().await;

        {
            let mut state = self.lock();
            state.capture_pending = false;
            state.status = SessionStatus::Idle;
            state.resume_listening_on_completion = false;
        }
        match result {
            Ok(()) => {
                info!("Listening stopped");
                ListenOutcome::Stopped
            }
            Err(e) => {
                let reason = format!("Could not stop listening cleanly: {}", e);
                error!("{}", reason);
                self.log.append(PendingEntry::error(reason.clone()));
                ListenOutcome::Failed { reason }
            }
        }
    }

    /// Play the cached audio again without synthesizing.
    pub async fn replay(&self) -> ReplayOutcome {
        let entry = {
            let mut state = self.lock();
            if state.capture_pending || !admits(state.status, Operation::Replay) {
                return ReplayOutcome::Rejected {
                    status: state.status,
                };
            }
            let Some(entry) = state.replay_cache.get().cloned() else {
                return ReplayOutcome::Empty;
            };
            state.status = SessionStatus::Processing;
            entry
        };

        let result = self.collaborators.playback.play(&entry.audio).await;
        let outcome = match result {
            Ok(()) => {
                self.log.append(PendingEntry::replay(&entry.text));
                info!(text = %entry.text, "Replayed");
                ReplayOutcome::Replayed
            }
            Err(e) => {
                let reason = e.to_string();
                error!(reason = %reason, "Replay failed");
                self.log.append(PendingEntry::error(reason.clone()));
                ReplayOutcome::Failed { reason }
            }
        };
        self.settle(SessionStatus::Idle);
        outcome
    }

    /// Switch the voice used for synthesis. Only allowed while idle.
    pub fn set_voice(&self, voice_id: &str) -> bool {
        let mut state = self.lock();
        if state.capture_pending || !admits(state.status, Operation::SetVoice) {
            return false;
        }
        state.active_voice_id = voice_id.to_string();
        info!(voice = voice_id, "Voice selected");
        true
    }

    /// Voices offered by the synthesizer, or the default list if it cannot say.
    pub async fn voices(&self) -> Vec<VoiceInfo> {
        match self.collaborators.synthesizer.voices().await {
            Ok(voices) if !voices.is_empty() => voices,
            Ok(_) => default_voices(),
            Err(e) => {
                warn!("Failed to load voices, using defaults: {}", e);
                default_voices()
            }
        }
    }
}

#[async_trait]
impl EmotionValidator for SessionOrchestrator {
    async fn validate(&self, definition: &EmotionDefinition) -> bool {
        self.trigger(&definition.id).await.is_completed()
    }
}
