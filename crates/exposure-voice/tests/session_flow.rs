//! Session orchestrator behaviour against scripted collaborators.

mod common;

use common::{short_timeout, Gate, Harness, RecordingCapture, ScriptedSynth};
use exposure_voice::{
    EmotionDraft, ListenOutcome, LogKind, ReplayOutcome, SessionSettings, SessionStatus,
    SpeakOutcome,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn overlapping_speaks_are_rejected_while_processing() {
    let (harness, gate) = Harness::gated();
    let session = harness.session.clone();
    let first = tokio::spawn(async move { session.speak("first", None).await });

    gate.entered.notified().await;
    assert_eq!(harness.session.status(), SessionStatus::Processing);
    assert!(!harness.session.is_accepting_triggers());

    let second = harness.session.speak("second", None).await;
    assert_eq!(
        second,
        SpeakOutcome::Rejected {
            status: SessionStatus::Processing
        }
    );
    let third = harness.session.trigger("calm").await;
    assert!(matches!(third, SpeakOutcome::Rejected { .. }));

    gate.release.notify_one();
    assert!(first.await.unwrap().is_completed());
    assert_eq!(harness.synth.calls(), 1);
    assert_eq!(harness.session.log().len(), 1);
    assert_eq!(harness.session.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn replay_reuses_cached_audio() {
    let harness = Harness::new(ScriptedSynth::default());
    assert!(harness.session.speak("hello", None).await.is_completed());
    assert_eq!(harness.session.replay().await, ReplayOutcome::Replayed);

    assert_eq!(harness.synth.calls(), 1);
    let played = harness.playback.played();
    assert_eq!(played.len(), 2);
    assert_eq!(played[0], played[1]);

    let newest = &harness.session.log().entries()[0];
    assert_eq!(newest.kind, LogKind::Replay);
    assert_eq!(newest.content, "hello");
    assert_eq!(newest.latency_ms, Some(0));
    assert_eq!(harness.session.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn replay_keeps_only_the_latest_utterance() {
    let harness = Harness::new(ScriptedSynth::default());
    let _ = harness.session.speak("one", None).await;
    let _ = harness.session.speak("two", None).await;
    let _ = harness.session.replay().await;
    assert_eq!(
        harness.playback.played().last().unwrap().as_bytes(),
        b"audio:two"
    );
}

#[tokio::test]
async fn speak_from_listening_resumes_listening() {
    let harness = Harness::new(ScriptedSynth::default());
    assert_eq!(
        harness.session.start_listening("en-US-Standard-B").await,
        ListenOutcome::Started
    );
    assert!(harness.session.speak("hi", None).await.is_completed());

    assert_eq!(harness.session.status(), SessionStatus::Listening);
    assert!(!harness.session.snapshot().resume_listening_on_completion);
    assert_eq!(
        harness.capture.calls(),
        vec!["start:en-US-Standard-B", "stop", "start:en-US-Standard-B"]
    );
    let request = harness.synth.requests.lock().unwrap()[0].clone();
    assert_eq!(request.voice_id, "en-US-Standard-B");
}

#[tokio::test]
async fn synthesis_failure_from_listening_lands_idle() {
    let harness = Harness::new(ScriptedSynth::default());
    harness.synth.fail.store(true, Ordering::SeqCst);
    let _ = harness.session.start_listening("v").await;

    let outcome = harness.session.speak("hi", None).await;
    assert!(matches!(outcome, SpeakOutcome::Failed { ref reason } if reason.contains("quota")));

    let state = harness.session.snapshot();
    assert_eq!(state.status, SessionStatus::Idle);
    assert!(!state.resume_listening_on_completion);
    assert!(state.replay_cache.is_empty());
    assert!(state.last_latency_ms.is_none());
    assert_eq!(harness.capture.calls(), vec!["start:v", "stop"]);

    let entries = harness.session.log().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LogKind::Error);
}

#[tokio::test]
async fn synthesis_timeout_is_a_failure() {
    let gate = Arc::new(Gate::default());
    let harness = Harness::with_settings(ScriptedSynth::gated(gate), short_timeout());

    let outcome = harness.session.speak("never", None).await;
    assert!(matches!(outcome, SpeakOutcome::Failed { ref reason } if reason.contains("timed out")));
    assert_eq!(harness.session.status(), SessionStatus::Idle);
    assert!(harness.playback.played().is_empty());
}

#[tokio::test]
async fn playback_failure_skips_cache_and_latency() {
    let harness = Harness::new(ScriptedSynth::default());
    harness.playback.fail.store(true, Ordering::SeqCst);

    let outcome = harness.session.speak("hi", None).await;
    assert!(matches!(outcome, SpeakOutcome::Failed { .. }));
    assert_eq!(harness.session.replay().await, ReplayOutcome::Empty);
    assert_eq!(harness.session.log().entries()[0].kind, LogKind::Error);
}

#[tokio::test]
async fn stop_while_speaking_cancels_the_resume_only() {
    let (harness, gate) = Harness::gated();
    let _ = harness.session.start_listening("v").await;

    let session = harness.session.clone();
    let speak = tokio::spawn(async move { session.speak("hold on", None).await });
    gate.entered.notified().await;

    assert_eq!(harness.session.stop_listening().await, ListenOutcome::Stopped);
    gate.release.notify_one();

    assert!(speak.await.unwrap().is_completed());
    assert_eq!(harness.session.status(), SessionStatus::Idle);
    assert_eq!(harness.capture.calls(), vec!["start:v", "stop"]);
}

#[tokio::test]
async fn stop_while_capture_resumes_closes_it_again() {
    let gate = Arc::new(Gate::default());
    let harness = Harness::build(
        ScriptedSynth::default(),
        RecordingCapture::gated_resume(gate.clone()),
        SessionSettings::default(),
    );
    let _ = harness.session.start_listening("v").await;

    let session = harness.session.clone();
    let speak = tokio::spawn(async move { session.speak("hi", None).await });
    gate.entered.notified().await;

    assert_eq!(harness.session.stop_listening().await, ListenOutcome::Stopped);
    gate.release.notify_one();

    assert!(speak.await.unwrap().is_completed());
    let state = harness.session.snapshot();
    assert_eq!(state.status, SessionStatus::Idle);
    assert!(!state.resume_listening_on_completion);
    assert_eq!(
        harness.capture.calls(),
        vec!["start:v", "stop", "start:v", "stop"]
    );
}

#[tokio::test]
async fn pause_is_retried_once_before_speaking() {
    let harness = Harness::new(ScriptedSynth::default());
    let _ = harness.session.start_listening("v").await;
    harness.capture.stop_failures.store(1, Ordering::SeqCst);

    assert!(harness.session.speak("hi", None).await.is_completed());
    assert_eq!(harness.session.status(), SessionStatus::Listening);
    assert_eq!(harness.capture.calls(), vec!["start:v", "stop", "start:v"]);
}

#[tokio::test]
async fn unpausable_capture_fails_the_speak() {
    let harness = Harness::new(ScriptedSynth::default());
    let _ = harness.session.start_listening("v").await;
    harness.capture.stop_failures.store(2, Ordering::SeqCst);

    let outcome = harness.session.speak("hi", None).await;
    assert!(
        matches!(outcome, SpeakOutcome::Failed { ref reason } if reason.contains("capture state unknown"))
    );
    assert_eq!(harness.synth.calls(), 0);
    assert_eq!(harness.session.status(), SessionStatus::Idle);
    assert_eq!(harness.session.log().entries()[0].kind, LogKind::Error);
}

#[tokio::test]
async fn listening_transitions_are_gated() {
    let harness = Harness::new(ScriptedSynth::default());
    assert!(matches!(
        harness.session.stop_listening().await,
        ListenOutcome::Rejected {
            status: SessionStatus::Idle
        }
    ));
    let _ = harness.session.start_listening("v").await;
    assert!(matches!(
        harness.session.start_listening("v").await,
        ListenOutcome::Rejected { .. }
    ));
    assert!(matches!(harness.session.replay().await, ReplayOutcome::Rejected { .. }));
    assert_eq!(harness.session.stop_listening().await, ListenOutcome::Stopped);
    assert_eq!(harness.session.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn capture_start_failure_stays_idle() {
    let harness = Harness::new(ScriptedSynth::default());
    harness.capture.fail_start.store(true, Ordering::SeqCst);

    let outcome = harness.session.start_listening("v").await;
    assert!(matches!(outcome, ListenOutcome::Failed { .. }));
    assert_eq!(harness.session.status(), SessionStatus::Idle);
    assert_eq!(harness.session.log().entries()[0].kind, LogKind::Error);
    assert!(harness.session.is_accepting_triggers());
}

#[tokio::test]
async fn tagged_emotion_is_annotated_and_labelled() {
    let harness = Harness::new(ScriptedSynth::default());
    assert!(harness.session.trigger("whisper").await.is_completed());

    let request = harness.synth.requests.lock().unwrap()[0].clone();
    assert_eq!(
        request.markup.as_deref(),
        Some(exposure_voice::annotate("Listen closely.", Some("whisper")).as_str())
    );
    let entry = &harness.session.log().entries()[0];
    assert_eq!(entry.kind, LogKind::Emotion);
    assert_eq!(entry.emotion_label.as_deref(), Some("Whisper"));
    assert!(entry.latency_ms.is_some());
}

#[tokio::test]
async fn clip_emotion_skips_synthesis() {
    let harness = Harness::new(ScriptedSynth::default());
    assert!(harness.session.trigger("laugh").await.is_completed());
    assert_eq!(harness.synth.calls(), 0);
    assert_eq!(harness.playback.played()[0].as_bytes(), b"laugh.mp3");
}

#[tokio::test]
async fn added_emotion_is_validated_by_speaking_it() {
    let harness = Harness::new(ScriptedSynth::default());
    let id = harness
        .session
        .add_emotion(EmotionDraft::synthesized("Praise", "Good job.", Some("encourage".into())))
        .await;

    let definition = harness.session.registry().find_by_id(&id).unwrap();
    assert_eq!(definition.hotkey, "F7");
    assert_eq!(harness.synth.calls(), 1);
    let entry = &harness.session.log().entries()[0];
    assert_eq!(entry.content, "Good job.");
    assert_eq!(entry.emotion_label.as_deref(), Some("Praise"));
}

#[tokio::test]
async fn emotion_added_while_busy_is_still_registered() {
    let (harness, gate) = Harness::gated();
    let session = harness.session.clone();
    let speak = tokio::spawn(async move { session.speak("busy", None).await });
    gate.entered.notified().await;

    let id = harness
        .session
        .add_emotion(EmotionDraft::synthesized("Later", "Later.", None))
        .await;
    assert!(harness.session.registry().find_by_id(&id).is_some());

    gate.release.notify_one();
    assert!(speak.await.unwrap().is_completed());
    assert_eq!(harness.synth.calls(), 1);
}

#[tokio::test]
async fn session_prosody_reaches_every_request() {
    let settings = SessionSettings {
        rate: Some(1.2),
        pitch: Some(-2.0),
        ..SessionSettings::default()
    };
    let harness = Harness::with_settings(ScriptedSynth::default(), settings);
    let _ = harness.session.speak("steady", None).await;
    let request = harness.synth.requests.lock().unwrap()[0].clone();
    assert_eq!(request.rate, Some(1.2));
    assert_eq!(request.pitch, Some(-2.0));
}
