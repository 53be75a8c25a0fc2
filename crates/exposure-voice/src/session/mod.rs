//! Session core: the state record and the orchestrator that owns it.

mod orchestrator;
mod state;

pub use orchestrator::{
    Collaborators, ListenOutcome, ReplayOutcome, SessionOrchestrator, SessionSettings,
    SpeakOutcome,
};
pub use state::{
    admits, completion_status, Operation, ReplayCache, ReplayEntry, SessionState, SessionStatus,
};
