//! Session state owned by the orchestrator, and the pure rules that move it.

use crate::playback::AudioPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session is. Starts `Idle`; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Processing,
    Listening,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Processing => "processing",
            SessionStatus::Listening => "listening",
        })
    }
}

/// Operations gated on the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Speak,
    StartListening,
    StopListening,
    Replay,
    SetVoice,
}

/// True when `op` may begin while the session is in `status`.
pub fn admits(status: SessionStatus, op: Operation) -> bool {
    use SessionStatus::*;
    match op {
        Operation::Speak => matches!(status, Idle | Listening),
        Operation::StartListening | Operation::Replay | Operation::SetVoice => status == Idle,
        Operation::StopListening => status == Listening,
    }
}

/// Status a speak settles in. A failure always lands in `Idle`, dropping any
/// pending resume of the listening session.
pub fn completion_status(resume_listening: bool, succeeded: bool) -> SessionStatus {
    if succeeded && resume_listening {
        SessionStatus::Listening
    } else {
        SessionStatus::Idle
    }
}

/// The most recent synthesized utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEntry {
    pub text: String,
    pub audio: AudioPayload,
}

/// One-slot memory of the last synthesized audio. Each store replaces the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayCache {
    slot: Option<ReplayEntry>,
}

impl ReplayCache {
    /// Last writer wins; the previous entry is returned.
    pub fn store(&mut self, entry: ReplayEntry) -> Option<ReplayEntry> {
        self.slot.replace(entry)
    }

    pub fn get(&self) -> Option<&ReplayEntry> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub active_voice_id: String,
    pub last_latency_ms: Option<u64>,
    pub resume_listening_on_completion: bool,
    pub replay_cache: ReplayCache,
    /// Set while waiting on the capture side to start or stop.
    pub(crate) capture_pending: bool,
}

impl SessionState {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Idle,
            active_voice_id: voice_id.into(),
            last_latency_ms: None,
            resume_listening_on_completion: false,
            replay_cache: ReplayCache::default(),
            capture_pending: false,
        }
    }

    /// Whether a speak or trigger would be accepted right now.
    pub fn accepts_triggers(&self) -> bool {
        !self.capture_pending && admits(self.status, Operation::Speak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speak_is_admitted_from_idle_and_listening_only() {
        assert!(admits(SessionStatus::Idle, Operation::Speak));
        assert!(admits(SessionStatus::Listening, Operation::Speak));
        assert!(!admits(SessionStatus::Processing, Operation::Speak));
    }

    #[test]
    fn listening_transitions() {
        assert!(admits(SessionStatus::Idle, Operation::StartListening));
        assert!(!admits(SessionStatus::Listening, Operation::StartListening));
        assert!(admits(SessionStatus::Listening, Operation::StopListening));
        assert!(!admits(SessionStatus::Idle, Operation::StopListening));
        assert!(!admits(SessionStatus::Listening, Operation::Replay));
    }

    #[test]
    fn failure_never_resumes() {
        assert_eq!(completion_status(true, true), SessionStatus::Listening);
        assert_eq!(completion_status(false, true), SessionStatus::Idle);
        assert_eq!(completion_status(true, false), SessionStatus::Idle);
    }

    #[test]
    fn replay_cache_keeps_last_writer() {
        let mut cache = ReplayCache::default();
        assert!(cache.is_empty());
        cache.store(ReplayEntry {
            text: "one".to_string(),
            audio: AudioPayload::new(vec![1]),
        });
        let previous = cache.store(ReplayEntry {
            text: "two".to_string(),
            audio: AudioPayload::new(vec![2]),
        });
        assert_eq!(previous.unwrap().text, "one");
        assert_eq!(cache.get().unwrap().audio.as_bytes(), &[2]);
    }
}
