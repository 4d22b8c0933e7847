//! Marquee Media - playback pipeline control
//!
//! This crate drives an opaque media pipeline through its playback lifecycle:
//! - State machine and public playback contract ([`PlayerController`])
//! - Seek debouncing and replay ([`SeekCoordinator`])
//! - Stream and download buffering policy ([`BufferingMonitor`])
//! - Optional sink capability discovery ([`InterfaceResolver`])
//! - Error taxonomy ([`ErrorClassifier`]) and tag aggregation ([`TagAggregator`])
//!
//! The pipeline itself is reached through the [`MediaPipeline`] trait and
//! reports progress as [`PipelineMessage`]s posted onto the controller's
//! dispatch queue.

use thiserror::Error;

pub mod buffering;
pub mod bus;
pub mod capabilities;
pub mod classify;
pub mod clock;
pub mod context;
pub mod controller;
pub mod events;
pub mod metadata;
pub mod pipeline;
pub mod seek;
pub mod tags;
pub mod testing;
pub mod timers;

pub use buffering::{BufferingAction, BufferingMode, BufferingMonitor, BufferingState};
pub use bus::{AuthReply, Bus, ControlMessage, ControllerHandle, LoopMessage};
pub use capabilities::{
    BalanceChannel, BalanceType, ColorBalance, Element, InterfaceResolver, Navigation,
    NavigationCommand, Resolution, SinkTopology, SurfaceBinding, SurfaceProvider, WindowHandle,
};
pub use classify::{
    ErrorClassifier, ErrorKind, ErrorRecord, MissingCapability, MissingCapabilityNotice,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ExecutionContext;
pub use controller::{ControllerConfig, PlayerController, UseType};
pub use events::{AuthRequest, CapabilityInstaller, EventBus, MountOperator, PlayerEvent};
pub use metadata::{MetadataKind, MetadataValue};
pub use pipeline::{
    AudioFormat, BufferingKind, BufferingQuery, CoreError, ErrorCode, MediaPipeline,
    MessageSource, PipelineMessage, PipelineState, RawError, ResourceError, SeekCommand,
    SeekFlags, SourceRole, StateChangeReturn, StreamError, StreamInfo, VideoFormat,
};
pub use seek::{SeekCoordinator, SeekDecision, SeekRequest};
pub use tags::{Image, ImageKind, StreamKind, TagAggregator, TagList, TagSnapshot, TagValue};
pub use timers::{TimerKind, Timers};

/// Errors returned by controller operations
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("No media is open")]
    NoMedia,

    #[error("Invalid media location: {0}")]
    InvalidUri(String),

    /// Classified pipeline failure
    #[error("{0}")]
    Playback(#[from] ErrorRecord),

    #[error("Failed to change playback direction")]
    DirectionChange,

    #[error("Seek error: {0}")]
    SeekError(String),

    #[error("Frame step failed")]
    StepFailed,
}

/// Result type for media operations
pub type Result<T> = std::result::Result<T, MediaError>;
