//! **Session Log** — append-only record of everything the session voiced.
//!
//! Entries are immutable once appended and ordered newest-first by insertion,
//! never by their timestamp.

use crate::error::VoiceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Tts,
    Emotion,
    Replay,
    Error,
}

/// One appended record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// An entry waiting for its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub kind: LogKind,
    pub content: String,
    pub emotion_label: Option<String>,
    pub latency_ms: Option<u64>,
}

impl PendingEntry {
    pub fn tts(content: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            kind: LogKind::Tts,
            content: content.into(),
            emotion_label: None,
            latency_ms: Some(latency_ms),
        }
    }

    pub fn emotion(content: impl Into<String>, label: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            kind: LogKind::Emotion,
            content: content.into(),
            emotion_label: Some(label.into()),
            latency_ms: Some(latency_ms),
        }
    }

    pub fn replay(content: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Replay,
            content: content.into(),
            emotion_label: None,
            latency_ms: Some(0),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Error,
            content: content.into(),
            emotion_label: None,
            latency_ms: None,
        }
    }

    pub fn with_emotion_label(mut self, label: Option<String>) -> Self {
        self.emotion_label = label;
        self
    }
}

/// Aggregate over the latencies of tts and emotion entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub average_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Rough quality bands for a synthesis latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBand {
    Good,
    Fair,
    Poor,
}

pub fn latency_band(latency_ms: u64) -> LatencyBand {
    match latency_ms {
        0..=199 => LatencyBand::Good,
        200..=499 => LatencyBand::Fair,
        _ => LatencyBand::Poor,
    }
}

#[derive(Debug, Default)]
struct LogInner {
    next_id: u64,
    entries: VecDeque<SessionLogEntry>,
}

#[derive(Debug, Default)]
pub struct SessionLog {
    inner: RwLock<LogInner>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and store `pending` at the head of the log.
    pub fn append(&self, pending: PendingEntry) -> SessionLogEntry {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let entry = SessionLogEntry {
            id: inner.next_id,
            timestamp: Utc::now(),
            kind: pending.kind,
            content: pending.content,
            emotion_label: pending.emotion_label,
            latency_ms: pending.latency_ms,
        };
        inner.entries.push_front(entry.clone());
        entry
    }

    /// All entries, newest first.
    pub fn entries(&self) -> Vec<SessionLogEntry> {
        self.recent(usize::MAX)
    }

    /// At most `n` entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<SessionLogEntry> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn latency_stats(&self) -> Option<LatencyStats> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let samples: Vec<u64> = inner
            .entries
            .iter()
            .filter(|e| matches!(e.kind, LogKind::Tts | LogKind::Emotion))
            .filter_map(|e| e.latency_ms)
            .collect();
        if samples.is_empty() {
            return None;
        }
        let total: u64 = samples.iter().sum();
        Some(LatencyStats {
            count: samples.len(),
            average_ms: total as f64 / samples.len() as f64,
            min_ms: samples.iter().copied().min().unwrap_or_default(),
            max_ms: samples.iter().copied().max().unwrap_or_default(),
        })
    }

    /// JSON array of all entries, newest first.
    pub fn to_json(&self) -> VoiceResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_entry_comes_first() {
        let log = SessionLog::new();
        log.append(PendingEntry::tts("first", 120));
        log.append(PendingEntry::error("boom"));
        let entries = log.entries();
        assert_eq!(entries[0].content, "boom");
        assert_eq!(entries[1].content, "first");
        assert!(entries[0].id > entries[1].id);
    }

    #[test]
    fn recent_truncates() {
        let log = SessionLog::new();
        for i in 0..5 {
            log.append(PendingEntry::tts(format!("line {i}"), 10));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "line 4");
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn stats_skip_replays_and_errors() {
        let log = SessionLog::new();
        assert!(log.latency_stats().is_none());
        log.append(PendingEntry::tts("a", 100));
        log.append(PendingEntry::emotion("b", "Laugh", 300));
        log.append(PendingEntry::replay("a"));
        log.append(PendingEntry::error("c"));
        let stats = log.latency_stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min_ms, 100);
        assert_eq!(stats.max_ms, 300);
        assert!((stats.average_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn latency_bands() {
        assert_eq!(latency_band(50), LatencyBand::Good);
        assert_eq!(latency_band(200), LatencyBand::Fair);
        assert_eq!(latency_band(900), LatencyBand::Poor);
    }

    #[test]
    fn json_export_uses_snake_case_kinds() {
        let log = SessionLog::new();
        log.append(PendingEntry::replay("again"));
        let json: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["kind"], "replay");
        assert_eq!(json[0]["latency_ms"], 0);
        assert!(json[0].get("emotion_label").is_none());
    }
}
