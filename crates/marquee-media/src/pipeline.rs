//! Pipeline abstraction
//!
//! The controller never decodes anything itself. It issues requests through
//! [`MediaPipeline`] and learns about progress from the [`PipelineMessage`]s
//! the pipeline posts onto its [`Bus`] from whatever thread it runs on.

use crate::bus::Bus;
use crate::capabilities::SinkTopology;
use crate::classify::MissingCapability;
use crate::tags::{StreamKind, TagList};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline state, ordered from inert to rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}

/// Immediate result of a state change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeReturn {
    Success,
    /// The change completes later and is reported on the bus
    Async,
    /// Succeeded, but the pipeline is live and cannot preroll
    NoPreroll,
    Failure,
}

/// What kind of object posted a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// The top-level pipeline object itself
    Pipeline,
    VideoSink,
    AudioSink,
    TypeFinder,
    /// Network source that accepts credentials (HTTP, RTSP)
    NetworkSource,
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSource {
    pub name: String,
    pub role: SourceRole,
}

impl MessageSource {
    pub fn new(name: impl Into<String>, role: SourceRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    pub fn pipeline() -> Self {
        Self::new("pipeline", SourceRole::Pipeline)
    }

    pub fn is_pipeline(&self) -> bool {
        self.role == SourceRole::Pipeline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    NotFound,
    OpenRead,
    OpenWrite,
    OpenReadWrite,
    Busy,
    Read,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    CodecNotFound,
    WrongType,
    NotImplemented,
    Failed,
    TypeNotFound,
    Decode,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    MissingPlugin,
    Other,
}

/// Low-level error code as reported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Resource(ResourceError),
    Stream(StreamError),
    Core(CoreError),
    Library,
}

/// Unclassified error posted by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    pub code: ErrorCode,
    pub source: MessageSource,
    pub message: String,
    /// Backend diagnostic text, not meant for users
    pub debug: Option<String>,
}

impl RawError {
    pub fn new(code: ErrorCode, source: MessageSource, message: impl Into<String>) -> Self {
        Self {
            code,
            source,
            message: message.into(),
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }
}

/// Buffering strategy announced by a buffering message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingKind {
    Stream,
    Download,
    Timeshift,
    Live,
}

/// Answer to a buffering query while download buffering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferingQuery {
    pub percent: u8,
    /// End of the cached range as a fraction of the stream, if known
    pub range_stop: Option<f64>,
    /// Estimated milliseconds until the download completes, -1 if unknown
    pub remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekFlags {
    pub flush: bool,
    pub accurate: bool,
    pub key_unit: bool,
}

impl SeekFlags {
    pub fn flush_accurate() -> Self {
        Self {
            flush: true,
            accurate: true,
            key_unit: false,
        }
    }

    pub fn flush_key_unit() -> Self {
        Self {
            flush: true,
            accurate: false,
            key_unit: true,
        }
    }
}

/// Seek issued to the pipeline; times are in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekCommand {
    pub rate: f64,
    pub start: Option<u64>,
    pub stop: Option<u64>,
    pub flags: SeekFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps_n: u32,
    pub fps_d: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    pub channels: u32,
    pub has_lfe: bool,
    pub sample_rate: u32,
}

/// Composition of the current stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamInfo {
    /// Video streams present in the container
    pub video_streams: u32,
    pub audio_streams: u32,
    /// A video stream is actually being decoded
    pub has_video: bool,
    pub has_audio: bool,
    pub video: Option<VideoFormat>,
    pub audio: Option<AudioFormat>,
}

/// Everything a pipeline reports asynchronously
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    StateChanged {
        source: MessageSource,
        old: PipelineState,
        new: PipelineState,
    },
    Error(RawError),
    Warning {
        source: MessageSource,
        message: String,
        debug: Option<String>,
    },
    Eos,
    Buffering {
        kind: BufferingKind,
        percent: u8,
        /// Location of the on-disk cache when download buffering
        cache_path: Option<String>,
    },
    Tag {
        kind: Option<StreamKind>,
        tags: TagList,
    },
    DurationChanged,
    AsyncDone,
    StreamChanged,
    VideoSizeChanged,
    Redirect {
        uri: String,
    },
    Progress {
        percent: u8,
    },
    MissingPlugin(MissingCapability),
    NotMounted {
        uri: String,
    },
    NavigationCommandsChanged {
        in_menu: bool,
    },
    /// The output sink was rebuilt; cached capabilities are stale
    SinkChanged,
}

impl PipelineMessage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineMessage::StateChanged { .. } => "state-changed",
            PipelineMessage::Error(_) => "error",
            PipelineMessage::Warning { .. } => "warning",
            PipelineMessage::Eos => "eos",
            PipelineMessage::Buffering { .. } => "buffering",
            PipelineMessage::Tag { .. } => "tag",
            PipelineMessage::DurationChanged => "duration-changed",
            PipelineMessage::AsyncDone => "async-done",
            PipelineMessage::StreamChanged => "stream-changed",
            PipelineMessage::VideoSizeChanged => "video-size",
            PipelineMessage::Redirect { .. } => "redirect",
            PipelineMessage::Progress { .. } => "progress",
            PipelineMessage::MissingPlugin(_) => "missing-plugin",
            PipelineMessage::NotMounted { .. } => "not-mounted",
            PipelineMessage::NavigationCommandsChanged { .. } => "navigation-commands-changed",
            PipelineMessage::SinkChanged => "sink-changed",
        }
    }

    /// Messages drained synchronously when extracting metadata
    pub fn carries_metadata(&self) -> bool {
        matches!(
            self,
            PipelineMessage::Tag { .. }
                | PipelineMessage::DurationChanged
                | PipelineMessage::StreamChanged
                | PipelineMessage::VideoSizeChanged
        )
    }
}

/// Opaque media graph driven by the controller.
///
/// Implementations post every asynchronous outcome on the [`Bus`] handed to
/// [`MediaPipeline::attach_bus`]. Queries answer immediately and return
/// `None` when the pipeline cannot answer in its current state.
pub trait MediaPipeline: Send {
    fn attach_bus(&mut self, bus: Bus);

    fn set_uri(&mut self, uri: &str, subtitle_uri: Option<&str>);

    fn set_state(&mut self, state: PipelineState) -> StateChangeReturn;

    fn current_state(&self) -> PipelineState;

    /// Stream duration in milliseconds
    fn query_duration(&self) -> Option<u64>;

    /// Playback position in milliseconds
    fn query_position(&self) -> Option<u64>;

    fn query_seekable(&self) -> Option<bool>;

    fn query_buffering(&self) -> Option<BufferingQuery>;

    /// Returns false when the seek was refused
    fn seek(&mut self, command: SeekCommand) -> bool;

    /// Step the given number of frames in the current direction
    fn step(&mut self, frames: u64) -> bool;

    fn set_volume(&mut self, volume: f64);

    fn set_connection_speed(&mut self, kbps: u32);

    fn set_audio_channels(&mut self, channels: u32);

    fn set_source_credentials(&mut self, user: &str, password: &str);

    fn stream_info(&self) -> StreamInfo;

    /// Elements relevant for capability discovery
    fn topology(&self) -> SinkTopology;
}
