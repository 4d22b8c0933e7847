//! Marquee Core - shared plumbing for the playback crates
//!
//! This crate provides the pieces every Marquee consumer needs before a
//! pipeline is ever opened:
//! - Logging configuration and subscriber setup
//! - Persisted player settings (audio output, connection speed, picture)

pub mod logging;
pub mod settings;

pub use logging::{LogConfig, LogGuard};
pub use settings::{
    AudioOutputType, ConnectionSpeed, JsonSettingsStore, MemorySettingsStore, PlayerSettings,
    SettingsError, SettingsStore, VideoProperty, VIDEO_PROPERTY_MAX,
};
