//! # Exposure Voice - Live Voice Session Core
//!
//! Turns operator input (typed text, hotkeys, board clicks, external panel
//! presses) into synthesized or pre-recorded speech, one utterance at a time,
//! with a replayable last utterance and an append-only session log.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Trigger Router                           │
//! │   hotkey ─┐        board click ─┐        panel press ─┐     │
//! │           ↓                     ↓                     ↓     │
//! │   ┌──────────────┐      ┌──────────────┐    ┌──────────────┐│
//! │   │   Emotion    │      │   Session    │    │ Device Button││
//! │   │   Registry   │ ───→ │ Orchestrator │ ←─ │   Adapter    ││
//! │   └──────────────┘      └──────────────┘    └──────────────┘│
//! │                          ↓    ↓     ↓                        │
//! │                  SSML  Synth  Playback  Capture → Session Log│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every external service sits behind an async trait chosen once at
//! construction; the demo stand-ins need no network or audio device.

pub mod capture;
pub mod config;
pub mod device;
pub mod emotion;
pub mod error;
pub mod playback;
pub mod router;
pub mod session;
pub mod session_log;
pub mod ssml;
pub mod synthesis;

pub use capture::{NullCapture, StreamingCapture};
pub use crate::config::{ConsoleConfig, SynthesisBackend};
pub use device::{
    DeviceButtonAdapter, DeviceButtonMapping, DeviceLink, MappingStore, MappingTable,
    MemoryMappingStore, NullDeviceLink, TomlMappingStore,
};
pub use emotion::{
    EmotionDefinition, EmotionDraft, EmotionId, EmotionKind, EmotionRegistry, EmotionValidator,
};
pub use error::{VoiceError, VoiceResult};
#[cfg(feature = "playback")]
pub use playback::RodioPlayback;
pub use playback::{AudioPayload, AudioPlayback, ClipSource, DemoClips, DirectoryClips, SilentPlayback};
pub use router::{KeyEvent, KeyState, RouteOutcome, TriggerRouter};
pub use session::{
    Collaborators, ListenOutcome, ReplayOutcome, SessionOrchestrator, SessionSettings,
    SessionState, SessionStatus, SpeakOutcome,
};
pub use session_log::{
    latency_band, LatencyBand, LatencyStats, LogKind, PendingEntry, SessionLog, SessionLogEntry,
};
pub use ssml::{annotate, parse_command, ParsedCommand};
pub use synthesis::{
    default_voices, DemoSynthesizer, GoogleTts, SpeechSynthesizer, SynthesisRequest,
    SynthesisResponse, VoiceInfo,
};
