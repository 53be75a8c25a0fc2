//! **Device Button Adapter** — logical mapping for an external button panel.
//!
//! A fixed table of N slots maps button indices to emotion ids. Presses only
//! route while the panel is connected. The physical driver sits behind
//! [`DeviceLink`]; persisted mappings sit behind [`MappingStore`].

use crate::emotion::EmotionId;
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Slot count of the reference panel (4 rows of 8).
pub const DEFAULT_BUTTON_COUNT: usize = 32;

/// One slot of the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceButtonMapping {
    pub button_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_id: Option<EmotionId>,
    pub label: String,
}

impl DeviceButtonMapping {
    pub fn unbound(button_index: usize) -> Self {
        Self {
            button_index,
            emotion_id: None,
            label: format!("Button {}", button_index + 1),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.emotion_id.is_some()
    }
}

/// The persisted form of the whole panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    #[serde(default)]
    pub buttons: Vec<DeviceButtonMapping>,
}

impl MappingTable {
    /// Fit a stored table to `button_count` slots: out-of-range entries are
    /// dropped, missing slots are unbound, a repeated index keeps the last entry.
    pub fn into_slots(self, button_count: usize) -> Vec<DeviceButtonMapping> {
        let mut slots: Vec<_> = (0..button_count).map(DeviceButtonMapping::unbound).collect();
        for mapping in self.buttons {
            match slots.get_mut(mapping.button_index) {
                Some(slot) => *slot = mapping,
                None => warn!(index = mapping.button_index, "Ignoring mapping outside the panel"),
            }
        }
        slots
    }
}

/// Loads and saves the panel mapping.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn load(&self) -> VoiceResult<MappingTable>;
    async fn save(&self, table: &MappingTable) -> VoiceResult<()>;
}

/// In-process store, mainly for tests and demo sessions.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    table: Mutex<MappingTable>,
}

impl MemoryMappingStore {
    pub fn new(table: MappingTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }

    pub fn snapshot(&self) -> MappingTable {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn load(&self) -> VoiceResult<MappingTable> {
        Ok(self.snapshot())
    }

    async fn save(&self, table: &MappingTable) -> VoiceResult<()> {
        *self.table.lock().unwrap_or_else(|e| e.into_inner()) = table.clone();
        Ok(())
    }
}

/// TOML file store. A missing file loads as an empty table.
#[derive(Debug, Clone)]
pub struct TomlMappingStore {
    path: PathBuf,
}

impl TomlMappingStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MappingStore for TomlMappingStore {
    async fn load(&self) -> VoiceResult<MappingTable> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No mapping file yet");
                return Ok(MappingTable::default());
            }
            Err(e) => return Err(VoiceError::MappingStore(format!("{}: {}", self.path.display(), e))),
        };
        Ok(toml::from_str(&raw)?)
    }

    async fn save(&self, table: &MappingTable) -> VoiceResult<()> {
        let raw = toml::to_string_pretty(table)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write beside the target and rename so readers never see a partial file.
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Connection to the physical panel.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    async fn connect(&self) -> VoiceResult<()>;
    async fn disconnect(&self) -> VoiceResult<()>;
}

/// Link used when no panel driver is installed; always succeeds.
#[derive(Debug, Default)]
pub struct NullDeviceLink;

#[async_trait]
impl DeviceLink for NullDeviceLink {
    async fn connect(&self) -> VoiceResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> VoiceResult<()> {
        Ok(())
    }
}

/// Fixed-size button table gated on the panel connection.
pub struct DeviceButtonAdapter {
    slots: RwLock<Vec<DeviceButtonMapping>>,
    connected: AtomicBool,
    store: Arc<dyn MappingStore>,
    link: Arc<dyn DeviceLink>,
}

impl DeviceButtonAdapter {
    pub fn new(button_count: usize, store: Arc<dyn MappingStore>, link: Arc<dyn DeviceLink>) -> Self {
        Self {
            slots: RwLock::new((0..button_count).map(DeviceButtonMapping::unbound).collect()),
            connected: AtomicBool::new(false),
            store,
            link,
        }
    }

    pub fn button_count(&self) -> usize {
        self.read_slots().len()
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, Vec<DeviceButtonMapping>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, Vec<DeviceButtonMapping>> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Open the panel. On failure the adapter stays disconnected.
    pub async fn connect(&self) -> VoiceResult<()> {
        self.link.connect().await?;
        self.connected.store(true, Ordering::SeqCst);
        info!("Device panel connected");
        Ok(())
    }

    /// Close the panel. On failure the adapter stays connected.
    pub async fn disconnect(&self) -> VoiceResult<()> {
        self.link.disconnect().await?;
        self.connected.store(false, Ordering::SeqCst);
        info!("Device panel disconnected");
        Ok(())
    }

    /// Bind a slot, overwriting whatever it held.
    pub fn assign(
        &self,
        button_index: usize,
        emotion_id: impl Into<EmotionId>,
        label: impl Into<String>,
    ) -> VoiceResult<()> {
        let mut slots = self.write_slots();
        let slot = slots
            .get_mut(button_index)
            .ok_or_else(|| out_of_range(button_index))?;
        *slot = DeviceButtonMapping {
            button_index,
            emotion_id: Some(emotion_id.into()),
            label: label.into(),
        };
        debug!(button_index, emotion = ?slot.emotion_id, "Button assigned");
        Ok(())
    }

    /// Reset a slot to unbound.
    pub fn clear(&self, button_index: usize) -> VoiceResult<()> {
        let mut slots = self.write_slots();
        let slot = slots
            .get_mut(button_index)
            .ok_or_else(|| out_of_range(button_index))?;
        *slot = DeviceButtonMapping::unbound(button_index);
        Ok(())
    }

    pub fn slot(&self, button_index: usize) -> Option<DeviceButtonMapping> {
        self.read_slots().get(button_index).cloned()
    }

    pub fn table(&self) -> MappingTable {
        MappingTable {
            buttons: self.read_slots().clone(),
        }
    }

    /// Replace the whole table with the stored one. Nothing changes on failure.
    pub async fn reload(&self) -> VoiceResult<()> {
        let table = self.store.load().await?;
        let mut slots = self.write_slots();
        let count = slots.len();
        *slots = table.into_slots(count);
        info!(bound = slots.iter().filter(|s| s.is_bound()).count(), "Device mappings reloaded");
        Ok(())
    }

    /// Save the current table through the store.
    pub async fn persist(&self) -> VoiceResult<()> {
        let table = self.table();
        self.store.save(&table).await
    }

    /// Emotion bound to `button_index`, or `None` when disconnected or unbound.
    pub fn on_press(&self, button_index: usize) -> Option<EmotionId> {
        if !self.is_connected() {
            debug!(button_index, "Press ignored: panel disconnected");
            return None;
        }
        self.read_slots()
            .get(button_index)
            .and_then(|slot| slot.emotion_id.clone())
    }
}

fn out_of_range(button_index: usize) -> VoiceError {
    VoiceError::Device(format!("button index {} is outside the panel", button_index))
}
