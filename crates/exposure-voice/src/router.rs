//! **Trigger Router** — turns hotkeys, board clicks and panel presses into emotion triggers.
//!
//! Events are never queued. While the orchestrator is busy the event is
//! dropped, and an event that resolves to nothing is silently ignored.

use crate::device::DeviceButtonAdapter;
use crate::emotion::{canonical_key, EmotionRegistry};
use crate::session::{SessionOrchestrator, SpeakOutcome};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A raw key signal from the hotkey source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Either a key code (`KeyT`, `F1`) or the printed character (`t`).
    pub key: String,
    pub state: KeyState,
    /// Set by sources that flag auto-repeat themselves.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn press(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: KeyState::Pressed,
            repeat: false,
        }
    }

    pub fn release(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: KeyState::Released,
            repeat: false,
        }
    }

    pub fn repeated(key: impl Into<String>) -> Self {
        Self {
            repeat: true,
            ..Self::press(key)
        }
    }
}

/// What happened to a routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the orchestrator.
    Dispatched(SpeakOutcome),
    /// The orchestrator was not accepting triggers.
    Dropped,
    /// Nothing is bound to the event.
    Unresolved,
    /// Key release or auto-repeat.
    Ignored,
}

pub struct TriggerRouter {
    orchestrator: Arc<SessionOrchestrator>,
    adapter: Arc<DeviceButtonAdapter>,
    held: Mutex<HashSet<String>>,
}

impl TriggerRouter {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, adapter: Arc<DeviceButtonAdapter>) -> Self {
        Self {
            orchestrator,
            adapter,
            held: Mutex::new(HashSet::new()),
        }
    }

    fn registry(&self) -> &EmotionRegistry {
        self.orchestrator.registry()
    }

    pub fn adapter(&self) -> &Arc<DeviceButtonAdapter> {
        &self.adapter
    }

    /// Route a key signal. Only the leading edge of a press fires.
    pub async fn route_key_event(&self, event: &KeyEvent) -> RouteOutcome {
        let key = canonical_key(&event.key);
        let first_edge = {
            let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
            match event.state {
                KeyState::Released => {
                    held.remove(&key);
                    return RouteOutcome::Ignored;
                }
                KeyState::Pressed => !event.repeat && held.insert(key),
            }
        };
        if !first_edge {
            debug!(key = %event.key, "Auto-repeat ignored");
            return RouteOutcome::Ignored;
        }

        match self.registry().find_by_hotkey(&event.key) {
            Some(definition) => self.dispatch(&definition.id).await,
            None => RouteOutcome::Unresolved,
        }
    }

    /// Press and release `key`.
    pub async fn tap_key(&self, key: &str) -> RouteOutcome {
        let outcome = self.route_key_event(&KeyEvent::press(key)).await;
        let _ = self.route_key_event(&KeyEvent::release(key)).await;
        outcome
    }

    /// Route a click on the emotion board.
    pub async fn route_button_click(&self, emotion_id: &str) -> RouteOutcome {
        if self.registry().find_by_id(emotion_id).is_none() {
            return RouteOutcome::Unresolved;
        }
        self.dispatch(emotion_id).await
    }

    /// Route a press on the external panel.
    pub async fn route_device_press(&self, button_index: usize) -> RouteOutcome {
        match self.adapter.on_press(button_index) {
            Some(emotion_id) => self.dispatch(&emotion_id).await,
            None => RouteOutcome::Unresolved,
        }
    }

    async fn dispatch(&self, emotion_id: &str) -> RouteOutcome {
        if !self.orchestrator.is_accepting_triggers() {
            debug!(emotion_id, status = %self.orchestrator.status(), "Trigger dropped: session busy");
            return RouteOutcome::Dropped;
        }
        match self.orchestrator.trigger(emotion_id).await {
            SpeakOutcome::Unresolved => RouteOutcome::Unresolved,
            outcome => RouteOutcome::Dispatched(outcome),
        }
    }
}
