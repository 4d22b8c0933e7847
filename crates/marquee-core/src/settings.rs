//! Persisted player settings.
//!
//! Settings are read once when a controller is built and written back
//! whenever one of the settings-backed setters changes a value.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by settings stores
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Speaker layout the audio sink should be configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioOutputType {
    #[default]
    Stereo,
    FourChannel,
    FiveChannel,
    FourOne,
    FiveOne,
    Ac3Passthru,
}

impl AudioOutputType {
    /// Number of channels requested from the pipeline, `None` for passthrough
    pub fn channel_count(self) -> Option<u32> {
        match self {
            AudioOutputType::Stereo => Some(2),
            AudioOutputType::FourChannel => Some(4),
            AudioOutputType::FiveChannel => Some(5),
            AudioOutputType::FourOne | AudioOutputType::FiveOne => Some(6),
            AudioOutputType::Ac3Passthru => None,
        }
    }
}

/// Network connection speed hint handed to streaming sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionSpeed {
    Modem14_4,
    Modem19_2,
    Modem28_8,
    Modem33_6,
    Modem34_4,
    Modem56,
    Isdn112,
    Dsl256,
    Dsl384,
    Dsl512,
    T1,
    #[default]
    Lan,
}

impl ConnectionSpeed {
    pub const ALL: [ConnectionSpeed; 12] = [
        ConnectionSpeed::Modem14_4,
        ConnectionSpeed::Modem19_2,
        ConnectionSpeed::Modem28_8,
        ConnectionSpeed::Modem33_6,
        ConnectionSpeed::Modem34_4,
        ConnectionSpeed::Modem56,
        ConnectionSpeed::Isdn112,
        ConnectionSpeed::Dsl256,
        ConnectionSpeed::Dsl384,
        ConnectionSpeed::Dsl512,
        ConnectionSpeed::T1,
        ConnectionSpeed::Lan,
    ];

    pub fn bits_per_second(self) -> u64 {
        match self {
            ConnectionSpeed::Modem14_4 => 14_400,
            ConnectionSpeed::Modem19_2 => 19_200,
            ConnectionSpeed::Modem28_8 => 28_800,
            ConnectionSpeed::Modem33_6 => 33_600,
            ConnectionSpeed::Modem34_4 => 34_400,
            ConnectionSpeed::Modem56 => 56_000,
            ConnectionSpeed::Isdn112 => 112_000,
            ConnectionSpeed::Dsl256 => 256_000,
            ConnectionSpeed::Dsl384 => 384_000,
            ConnectionSpeed::Dsl512 => 512_000,
            ConnectionSpeed::T1 => 1_536_000,
            ConnectionSpeed::Lan => 10_752_000,
        }
    }

    /// Speed in kbit/s, rounded up
    pub fn kbps(self) -> u32 {
        self.bits_per_second().div_ceil(1000) as u32
    }
}

/// Picture controls backed by the sink's color balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoProperty {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

impl VideoProperty {
    pub const ALL: [VideoProperty; 4] = [
        VideoProperty::Brightness,
        VideoProperty::Contrast,
        VideoProperty::Saturation,
        VideoProperty::Hue,
    ];

    /// Color balance channel label this property maps to
    pub fn channel_label(self) -> &'static str {
        match self {
            VideoProperty::Brightness => "BRIGHTNESS",
            VideoProperty::Contrast => "CONTRAST",
            VideoProperty::Saturation => "SATURATION",
            VideoProperty::Hue => "HUE",
        }
    }
}

/// Picture property scale used by the public API
pub const VIDEO_PROPERTY_MAX: u16 = u16::MAX;
const VIDEO_PROPERTY_DEFAULT: u16 = VIDEO_PROPERTY_MAX / 2;

/// Everything the player persists between sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub audio_output: AudioOutputType,
    pub connection_speed: ConnectionSpeed,
    pub brightness: u16,
    pub contrast: u16,
    pub saturation: u16,
    pub hue: u16,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            audio_output: AudioOutputType::default(),
            connection_speed: ConnectionSpeed::default(),
            brightness: VIDEO_PROPERTY_DEFAULT,
            contrast: VIDEO_PROPERTY_DEFAULT,
            saturation: VIDEO_PROPERTY_DEFAULT,
            hue: VIDEO_PROPERTY_DEFAULT,
        }
    }
}

impl PlayerSettings {
    pub fn video_property(&self, property: VideoProperty) -> u16 {
        match property {
            VideoProperty::Brightness => self.brightness,
            VideoProperty::Contrast => self.contrast,
            VideoProperty::Saturation => self.saturation,
            VideoProperty::Hue => self.hue,
        }
    }

    pub fn set_video_property(&mut self, property: VideoProperty, value: u16) {
        match property {
            VideoProperty::Brightness => self.brightness = value,
            VideoProperty::Contrast => self.contrast = value,
            VideoProperty::Saturation => self.saturation = value,
            VideoProperty::Hue => self.hue = value,
        }
    }
}

/// Backing storage for [`PlayerSettings`]
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<PlayerSettings>;
    fn save(&self, settings: &PlayerSettings) -> Result<()>;
}

/// Settings kept as pretty-printed JSON on disk
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/marquee/player.json`
    pub fn with_default_path() -> Result<Self> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(dir.join("marquee").join("player.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<PlayerSettings> {
        if !self.path.exists() {
            debug!("No settings at {:?}, using defaults", self.path);
            return Ok(PlayerSettings::default());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, settings: &PlayerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, data)?;
        info!("Saved player settings to {:?}", self.path);
        Ok(())
    }
}

/// In-memory store, used when nothing should touch the disk
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<PlayerSettings>,
    saves: Mutex<usize>,
}

impl MemorySettingsStore {
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            saves: Mutex::new(0),
        }
    }

    /// Snapshot of the stored settings
    pub fn current(&self) -> PlayerSettings {
        self.settings.lock().clone()
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<PlayerSettings> {
        Ok(self.settings.lock().clone())
    }

    fn save(&self, settings: &PlayerSettings) -> Result<()> {
        *self.settings.lock() = settings.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}
