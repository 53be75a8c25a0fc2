//! Exposure Console
//!
//! Drives one live voice session from an interactive prompt.
//! Voice-producing commands run in the background so `:stop` and further
//! triggers stay responsive while a synthesis is in flight.

mod commands;
mod prompt;

use anyhow::Context;
use commands::{parse_line, Command, HELP};
use exposure_voice::{
    latency_band, AudioPlayback, ClipSource, Collaborators, ConsoleConfig, DemoClips,
    DemoSynthesizer, DeviceButtonAdapter, DirectoryClips, EmotionRegistry, GoogleTts,
    ListenOutcome, NullCapture, NullDeviceLink, ReplayOutcome, RouteOutcome, SessionLog,
    SessionOrchestrator, SpeakOutcome, SpeechSynthesizer, SynthesisBackend, TomlMappingStore,
    TriggerRouter,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_VIEW_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[exposure-console] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsoleConfig::load().context("load console config")?;
    let session = Arc::new(SessionOrchestrator::new(
        Arc::new(EmotionRegistry::with_builtins()),
        Arc::new(SessionLog::new()),
        build_collaborators(&config)?,
        config.session_settings(),
    ));

    let adapter = Arc::new(DeviceButtonAdapter::new(
        config.device_buttons,
        Arc::new(TomlMappingStore::new(&config.mapping_path)),
        Arc::new(NullDeviceLink),
    ));
    if let Err(e) = adapter.reload().await {
        warn!(error = %e, "Device mappings not loaded; starting with an empty panel");
    }

    let console = Arc::new(Console {
        router: TriggerRouter::new(Arc::clone(&session), Arc::clone(&adapter)),
        session,
        adapter,
    });

    info!(
        synthesis = ?config.synthesis,
        voice = %config.voice_id,
        buttons = config.device_buttons,
        "Exposure console ready (:help for commands)"
    );

    let (line_tx, mut lines) = mpsc::channel::<String>(32);
    prompt::spawn(line_tx);

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match parse_line(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => Arc::clone(&console).dispatch(command).await,
                    Err(e) => println!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Exposure console stopped");
    Ok(())
}

fn build_collaborators(config: &ConsoleConfig) -> anyhow::Result<Collaborators> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.synthesis {
        SynthesisBackend::Demo => Arc::new(DemoSynthesizer),
        SynthesisBackend::Google => {
            let token = config
                .google_access_token
                .clone()
                .context("google synthesis needs EXPOSURE__GOOGLE_ACCESS_TOKEN")?;
            Arc::new(GoogleTts::new(
                &config.google_api_url,
                token,
                &config.language_code,
                config.synthesis_timeout(),
            )?)
        }
    };

    let clips: Arc<dyn ClipSource> = if config.clips_dir.is_dir() {
        Arc::new(DirectoryClips::new(&config.clips_dir))
    } else {
        info!(dir = %config.clips_dir.display(), "Clip directory missing; using demo clips");
        Arc::new(DemoClips)
    };

    Ok(Collaborators {
        synthesizer,
        playback: playback_backend()?,
        capture: Arc::new(NullCapture::default()),
        clips,
    })
}

#[cfg(feature = "playback")]
fn playback_backend() -> anyhow::Result<Arc<dyn AudioPlayback>> {
    Ok(Arc::new(exposure_voice::RodioPlayback::new()?))
}

#[cfg(not(feature = "playback"))]
fn playback_backend() -> anyhow::Result<Arc<dyn AudioPlayback>> {
    Ok(Arc::new(exposure_voice::SilentPlayback))
}

struct Console {
    session: Arc<SessionOrchestrator>,
    router: TriggerRouter,
    adapter: Arc<DeviceButtonAdapter>,
}

impl Console {
    async fn dispatch(self: Arc<Self>, command: Command) {
        match command {
            Command::Say(_)
            | Command::Replay
            | Command::Key(_)
            | Command::Click(_)
            | Command::Press(_)
            | Command::Add(_) => {
                tokio::spawn(async move { self.voice(command).await });
            }
            other => self.control(other).await,
        }
    }

    /// Commands that may hold the session while audio is produced.
    async fn voice(&self, command: Command) {
        match command {
            Command::Say(line) => report_speak(self.session.speak_line(&line).await),
            Command::Replay => match self.session.replay().await {
                ReplayOutcome::Replayed => {}
                ReplayOutcome::Empty => println!("nothing to replay yet"),
                ReplayOutcome::Rejected { status } => println!("busy ({})", status),
                ReplayOutcome::Failed { reason } => println!("replay failed: {}", reason),
            },
            Command::Key(key) => report_route(self.router.tap_key(&key).await),
            Command::Click(id) => report_route(self.router.route_button_click(&id).await),
            Command::Press(index) => report_route(self.router.route_device_press(index).await),
            Command::Add(draft) => {
                let id = self.session.add_emotion(draft).await;
                if let Some(def) = self.session.registry().find_by_id(&id) {
                    println!("added {} ({}) on {}", def.display_name, def.id, def.hotkey);
                }
            }
            _ => {}
        }
    }

    async fn control(&self, command: Command) {
        match command {
            Command::Listen => {
                let voice = self.session.snapshot().active_voice_id;
                report_listen(self.session.start_listening(&voice).await);
            }
            Command::Stop => report_listen(self.session.stop_listening().await),
            Command::Assign { button, emotion_id } => {
                let label = self
                    .session
                    .registry()
                    .find_by_id(&emotion_id)
                    .map(|def| def.display_name)
                    .unwrap_or_else(|| emotion_id.clone());
                report(self.adapter.assign(button, emotion_id, label));
            }
            Command::Clear(button) => report(self.adapter.clear(button)),
            Command::Connect => report(self.adapter.connect().await),
            Command::Disconnect => report(self.adapter.disconnect().await),
            Command::Reload => report(self.adapter.reload().await),
            Command::Save => report(self.adapter.persist().await),
            Command::Voices => {
                for voice in self.session.voices().await {
                    println!("{}  {}  {}", voice.name, voice.language_code, voice.gender);
                }
            }
            Command::Voice(id) => {
                if !self.session.set_voice(&id) {
                    println!("voice can only change while idle ({})", self.session.status());
                }
            }
            Command::Log => {
                for entry in self.session.log().recent(LOG_VIEW_LIMIT) {
                    let label = entry.emotion_label.as_deref().unwrap_or("-");
                    let latency = entry
                        .latency_ms
                        .map(|ms| format!("{} ms", ms))
                        .unwrap_or_default();
                    println!(
                        "{} {:?} [{}] {} {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.kind,
                        label,
                        entry.content,
                        latency
                    );
                }
            }
            Command::Stats => match self.session.log().latency_stats() {
                Some(stats) => println!(
                    "{} utterances, avg {:.0} ms ({:?}), min {} ms, max {} ms",
                    stats.count,
                    stats.average_ms,
                    latency_band(stats.average_ms as u64),
                    stats.min_ms,
                    stats.max_ms
                ),
                None => println!("no latency samples yet"),
            },
            Command::Export(path) => match (self.session.log().to_json(), path) {
                (Ok(json), None) => println!("{}", json),
                (Ok(json), Some(path)) => match tokio::fs::write(&path, json).await {
                    Ok(()) => println!("session log written to {}", path.display()),
                    Err(e) => println!("could not write {}: {}", path.display(), e),
                },
                (Err(e), _) => println!("{}", e),
            },
            Command::Help => println!("{}", HELP),
            _ => {}
        }
    }
}

fn report(result: exposure_voice::VoiceResult<()>) {
    if let Err(e) = result {
        println!("{}", e);
    }
}

fn report_speak(outcome: SpeakOutcome) {
    match outcome {
        SpeakOutcome::Completed { latency_ms } => {
            println!("spoken in {} ms ({:?})", latency_ms, latency_band(latency_ms))
        }
        SpeakOutcome::Rejected { status } => println!("busy ({})", status),
        SpeakOutcome::Failed { reason } => println!("failed: {}", reason),
        SpeakOutcome::Unresolved => {}
    }
}

fn report_route(outcome: RouteOutcome) {
    match outcome {
        RouteOutcome::Dispatched(speak) => report_speak(speak),
        RouteOutcome::Dropped => println!("busy, trigger dropped"),
        RouteOutcome::Unresolved | RouteOutcome::Ignored => {}
    }
}

fn report_listen(outcome: ListenOutcome) {
    match outcome {
        ListenOutcome::Started => println!("listening"),
        ListenOutcome::Stopped => println!("stopped listening"),
        ListenOutcome::Rejected { status } => println!("not now ({})", status),
        ListenOutcome::Failed { reason } => println!("{}", reason),
    }
}
