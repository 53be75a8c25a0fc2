//! **Playback** — the audio-output collaborator and pre-recorded clip loading.
//!
//! The core only hands opaque payloads to an [`AudioPlayback`] implementation
//! and waits for its completion signal. Decoding lives in the implementation
//! (rodio, behind the `playback` feature).

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Opaque, locally playable audio (MP3/WAV bytes). Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioPayload {
    bytes: Arc<Vec<u8>>,
}

impl AudioPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for AudioPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Plays a payload and resolves once playback has finished.
#[async_trait]
pub trait AudioPlayback: Send + Sync {
    async fn play(&self, payload: &AudioPayload) -> VoiceResult<()>;
}

/// Drops audio on the floor. Used for demo sessions and headless hosts.
#[derive(Debug, Default)]
pub struct SilentPlayback;

#[async_trait]
impl AudioPlayback for SilentPlayback {
    async fn play(&self, payload: &AudioPayload) -> VoiceResult<()> {
        debug!(bytes = payload.len(), "SilentPlayback: discarding audio");
        Ok(())
    }
}

/// Loads the audio for emotions of kind `audio`.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn load(&self, reference: &str) -> VoiceResult<AudioPayload>;
}

/// Clips stored as files under one directory; the reference is a relative file name.
#[derive(Debug, Clone)]
pub struct DirectoryClips {
    root: PathBuf,
}

impl DirectoryClips {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, reference: &str) -> VoiceResult<PathBuf> {
        let rel = Path::new(reference);
        if reference.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(VoiceError::Clip(format!(
                "clip reference must be a relative file name: {:?}",
                reference
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ClipSource for DirectoryClips {
    async fn load(&self, reference: &str) -> VoiceResult<AudioPayload> {
        let path = self.resolve(reference)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| VoiceError::Clip(format!("{}: {}", path.display(), e)))?;
        Ok(AudioPayload::new(bytes))
    }
}

/// Returns the reference name as the payload so demo sessions can fire clip emotions.
#[derive(Debug, Default)]
pub struct DemoClips;

#[async_trait]
impl ClipSource for DemoClips {
    async fn load(&self, reference: &str) -> VoiceResult<AudioPayload> {
        info!("[DEMO] Playing clip: {}", reference);
        Ok(AudioPayload::new(reference.as_bytes().to_vec()))
    }
}

#[cfg(feature = "playback")]
mod rodio_playback {
    use super::*;
    use rodio::{OutputStream, Sink, Source};
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::thread;
    use tokio::sync::oneshot;
    use tracing::{error, warn};

    struct Job {
        payload: AudioPayload,
        done: oneshot::Sender<VoiceResult<()>>,
    }

    /// Speaker output through rodio. The output stream is not `Send` on every
    /// platform, so it lives on a dedicated thread fed by a channel.
    pub struct RodioPlayback {
        jobs: mpsc::Sender<Job>,
    }

    impl RodioPlayback {
        /// Open the default output device.
        pub fn new() -> VoiceResult<Self> {
            let (jobs, rx) = mpsc::channel::<Job>();
            let (ready_tx, ready_rx) = mpsc::channel::<VoiceResult<()>>();

            thread::spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(VoiceError::Playback(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                info!("RodioPlayback: output stream ready");

                while let Ok(job) = rx.recv() {
                    let result = play_blocking(&handle, &job.payload);
                    if let Err(ref e) = result {
                        warn!("RodioPlayback: {}", e);
                    }
                    let _ = job.done.send(result);
                }
                warn!("RodioPlayback: job channel closed, output thread exiting");
            });

            ready_rx
                .recv()
                .map_err(|e| VoiceError::Playback(format!("output thread died: {}", e)))??;
            Ok(Self { jobs })
        }
    }

    fn play_blocking(handle: &rodio::OutputStreamHandle, payload: &AudioPayload) -> VoiceResult<()> {
        if payload.is_empty() {
            return Ok(());
        }
        let sink = Sink::try_new(handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
        let source = rodio::Decoder::new(Cursor::new(payload.as_bytes().to_vec()))
            .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
        sink.append(source.convert_samples::<f32>());
        sink.sleep_until_end();
        Ok(())
    }

    #[async_trait]
    impl AudioPlayback for RodioPlayback {
        async fn play(&self, payload: &AudioPayload) -> VoiceResult<()> {
            let (done, wait) = oneshot::channel();
            self.jobs
                .send(Job {
                    payload: payload.clone(),
                    done,
                })
                .map_err(|_| VoiceError::Playback("output thread is gone".to_string()))?;
            wait.await.unwrap_or_else(|_| {
                error!("RodioPlayback: completion dropped");
                Err(VoiceError::Playback("playback completion dropped".to_string()))
            })
        }
    }
}

#[cfg(feature = "playback")]
pub use rodio_playback::RodioPlayback;
