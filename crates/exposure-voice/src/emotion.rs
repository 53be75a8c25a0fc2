//! **Emotion Registry** — the ordered, append-only list of emotion triggers.
//!
//! Holds the built-in board plus operator-created emotions. Lookups go by id
//! (buttons, device panel) or by hotkey (keyboard). Creating an emotion
//! immediately runs a one-shot validation speak through an [`EmotionValidator`]
//! so a new definition is proven playable before anything else can fire it.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Identifier of an emotion definition.
pub type EmotionId = String;

/// How an emotion is voiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionKind {
    /// `phrase` names a pre-recorded clip.
    Audio,
    /// `phrase` is text sent through the synthesizer.
    Synthesized,
}

/// A named, hotkey-bound trigger. `id` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionDefinition {
    pub id: EmotionId,
    pub display_name: String,
    pub hotkey: String,
    pub kind: EmotionKind,
    pub phrase: String,
    /// SSML preset applied when the phrase is synthesized.
    #[serde(default)]
    pub tag: Option<String>,
}

/// An emotion as submitted by the operator, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionDraft {
    pub display_name: String,
    /// `None` picks the first free function key.
    #[serde(default)]
    pub hotkey: Option<String>,
    pub kind: EmotionKind,
    pub phrase: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl EmotionDraft {
    /// A synthesized emotion speaking `phrase` with the optional preset `tag`.
    pub fn synthesized(
        display_name: impl Into<String>,
        phrase: impl Into<String>,
        tag: Option<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            hotkey: None,
            kind: EmotionKind::Synthesized,
            phrase: phrase.into(),
            tag,
        }
    }

    pub fn with_hotkey(mut self, hotkey: impl Into<String>) -> Self {
        self.hotkey = Some(hotkey.into());
        self
    }
}

/// Runs the one-shot validation speak for a freshly registered emotion.
#[async_trait]
pub trait EmotionValidator: Send + Sync {
    /// Returns true when the definition played back successfully.
    async fn validate(&self, definition: &EmotionDefinition) -> bool;
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Build a unique id from a millisecond timestamp and a process-wide sequence.
///
/// The sequence keeps ids distinct when two calls land in the same millisecond.
pub fn generate_id(now_ms: i64) -> EmotionId {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("custom-{now_ms}-{seq}")
}

/// Normalize the two key representations: a printable character (`a`, `1`)
/// and a physical key code (`KeyA`, `Digit1`). Other names pass through.
pub fn canonical_key(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
        (Some(c), None) if c.is_ascii_digit() => format!("Digit{c}"),
        _ => key.to_string(),
    }
}

/// True when a raw key from the hotkey source fires `binding`.
pub fn hotkey_matches(binding: &str, raw: &str) -> bool {
    binding == raw || canonical_key(binding) == canonical_key(raw)
}

/// Conflict policy for several definitions sharing a hotkey: the most recently
/// registered wins.
pub fn resolve_hotkey_conflict<'a>(
    candidates: impl Iterator<Item = &'a EmotionDefinition>,
) -> Option<&'a EmotionDefinition> {
    candidates.last()
}

/// Ordered collection of emotion definitions.
#[derive(Debug, Default)]
pub struct EmotionRegistry {
    definitions: RwLock<Vec<EmotionDefinition>>,
}

impl EmotionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in board.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for definition in builtin_emotions() {
            registry.insert(definition);
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<EmotionDefinition>> {
        self.definitions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<EmotionDefinition>> {
        self.definitions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a definition with a caller-chosen id. A definition already using
    /// that id is replaced in place (last write wins).
    pub fn insert(&self, definition: EmotionDefinition) {
        let mut defs = self.write();
        match defs.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => {
                debug!(id = %definition.id, "Replacing emotion with duplicate id");
                *existing = definition;
            }
            None => defs.push(definition),
        }
    }

    /// Assign an id to `draft` and append it. Does not validate.
    pub fn register(&self, draft: EmotionDraft) -> EmotionDefinition {
        let id = generate_id(Utc::now().timestamp_millis());
        let mut defs = self.write();
        let hotkey = draft
            .hotkey
            .filter(|h| !h.trim().is_empty())
            .map(|h| h.trim().to_string())
            .unwrap_or_else(|| first_free_function_key(&defs));
        let definition = EmotionDefinition {
            id,
            display_name: draft.display_name,
            hotkey,
            kind: draft.kind,
            phrase: draft.phrase,
            tag: draft.tag,
        };
        defs.push(definition.clone());
        info!(
            id = %definition.id,
            name = %definition.display_name,
            hotkey = %definition.hotkey,
            "Emotion registered"
        );
        definition
    }

    /// Register `draft` and run the validation speak. Returns the assigned id.
    pub async fn add(&self, draft: EmotionDraft, validator: &dyn EmotionValidator) -> EmotionId {
        let definition = self.register(draft);
        let playable = validator.validate(&definition).await;
        debug!(id = %definition.id, playable, "Emotion validation finished");
        definition.id
    }

    pub fn find_by_id(&self, id: &str) -> Option<EmotionDefinition> {
        self.read().iter().find(|d| d.id == id).cloned()
    }

    pub fn find_by_hotkey(&self, key: &str) -> Option<EmotionDefinition> {
        let defs = self.read();
        resolve_hotkey_conflict(defs.iter().filter(|d| hotkey_matches(&d.hotkey, key))).cloned()
    }

    /// Snapshot of every definition in registration order.
    pub fn all(&self) -> Vec<EmotionDefinition> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn first_free_function_key(defs: &[EmotionDefinition]) -> String {
    (1..=12)
        .map(|n| format!("F{n}"))
        .find(|key| !defs.iter().any(|d| hotkey_matches(&d.hotkey, key)))
        .unwrap_or_else(|| "F12".to_string())
}

/// The board every session starts with.
pub fn builtin_emotions() -> Vec<EmotionDefinition> {
    let clips = [
        ("laugh", "Laugh", "F1"),
        ("gasp", "Gasp", "F2"),
        ("sigh", "Sigh", "F3"),
        ("hmm", "Hmm", "F4"),
        ("wow", "Wow", "F5"),
        ("oops", "Oops", "F6"),
    ];
    let phrases = [
        ("tease", "Tease", "Is that really the best you can do?"),
        ("calm", "Calm", "Breathe slowly. You are doing fine."),
        ("encourage", "Encourage", "Keep going, you've got this."),
        ("whisper", "Whisper", "Listen closely."),
        ("moan", "Moan", "Mmm."),
        ("affirmation", "Affirmation", "You are safe here."),
        ("humiliate", "Humiliate", "Was that supposed to impress me?"),
        ("command", "Command", "Look at me. Now."),
    ];

    let audio = clips.iter().map(|(id, name, key)| EmotionDefinition {
        id: (*id).to_string(),
        display_name: (*name).to_string(),
        hotkey: (*key).to_string(),
        kind: EmotionKind::Audio,
        phrase: format!("{id}.mp3"),
        tag: None,
    });
    let spoken = phrases
        .iter()
        .enumerate()
        .map(|(i, (id, name, phrase))| EmotionDefinition {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            hotkey: format!("Digit{}", i + 1),
            kind: EmotionKind::Synthesized,
            phrase: (*phrase).to_string(),
            tag: Some((*id).to_string()),
        });
    audio.chain(spoken).collect()
}
