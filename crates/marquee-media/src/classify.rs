//! Error classification.
//!
//! Maps raw pipeline errors onto the application taxonomy. Callers only ever
//! see [`ErrorRecord`]s; raw codes never leave this module's callers.

use crate::pipeline::{CoreError, ErrorCode, RawError, ResourceError, SourceRole, StreamError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Application-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AudioOutputUnavailable,
    VideoOutputUnavailable,
    AudioOutputBusy,
    VideoOutputBusy,
    FileNotFound,
    PermissionDenied,
    FileGeneric,
    CodecNotHandled,
    NetworkReadError,
    EmptyStream,
    PluginLoadFailure,
    Generic,
}

impl ErrorKind {
    /// The item cannot be retried as-is
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::FileNotFound
                | ErrorKind::PermissionDenied
                | ErrorKind::CodecNotHandled
                | ErrorKind::PluginLoadFailure
                | ErrorKind::EmptyStream
        )
    }
}

/// Classified failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// The pipeline stays usable for another item
    pub recoverable: bool,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: !kind.is_fatal(),
        }
    }

    pub fn fatal(&self) -> bool {
        !self.recoverable
    }
}

/// A decoder or element the pipeline needed but could not find
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCapability {
    /// Installer-readable detail string
    pub detail: String,
    /// Human readable description
    pub description: String,
}

impl MissingCapability {
    pub fn new(detail: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            description: description.into(),
        }
    }
}

/// Notification handed to the capability installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCapabilityNotice {
    pub details: Vec<String>,
    pub descriptions: Vec<String>,
    /// The pipeline had prerolled when the notice was raised
    pub prerolled: bool,
}

const AUDIO_OUTPUT_NOT_FOUND: &str =
    "The requested audio output was not found. Please select another audio output.";
const VIDEO_OUTPUT_NOT_FOUND: &str =
    "The requested video output was not found. Please select another video output.";
const LOCATION_NOT_FOUND: &str = "Location not found.";
const PERMISSION_DENIED: &str =
    "Could not open location; you might not have permission to open the file.";
const VIDEO_OUTPUT_BUSY: &str = "The video output is in use by another application. \
     Please close other video applications, or select another video output.";
const AUDIO_OUTPUT_BUSY: &str = "The audio output is in use by another application. \
     Please select another audio output. You may want to consider using a sound server.";
const NETWORK_READ: &str =
    "Cannot play this file over the network. Try downloading it to disk first.";

#[derive(Debug, Default)]
pub struct ErrorClassifier {
    missing: Vec<MissingCapability>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_missing(&mut self, capability: MissingCapability) {
        debug!("Missing capability: {}", capability.description);
        self.missing.push(capability);
    }

    pub fn missing(&self) -> &[MissingCapability] {
        &self.missing
    }

    pub fn clear_missing(&mut self) {
        self.missing.clear();
    }

    /// Notice for the installer, or `None` when the error is not caused by
    /// the recorded missing capabilities.
    pub fn missing_capability_notice(&self, raw: &RawError) -> Option<MissingCapabilityNotice> {
        if self.missing.is_empty() {
            return None;
        }

        let relevant = matches!(
            raw.code,
            ErrorCode::Core(CoreError::MissingPlugin) | ErrorCode::Stream(StreamError::CodecNotFound)
        ) || (raw.code == ErrorCode::Stream(StreamError::WrongType) && raw.source.is_pipeline());

        relevant.then(|| self.notice(false))
    }

    /// Notice raised once the pipeline prerolled despite missing pieces
    pub fn preroll_notice(&self) -> Option<MissingCapabilityNotice> {
        (!self.missing.is_empty()).then(|| self.notice(true))
    }

    fn notice(&self, prerolled: bool) -> MissingCapabilityNotice {
        MissingCapabilityNotice {
            details: self.missing.iter().map(|m| m.detail.clone()).collect(),
            descriptions: self.missing.iter().map(|m| m.description.clone()).collect(),
            prerolled,
        }
    }

    /// Classify `raw`, consuming any recorded missing capabilities
    pub fn classify(&mut self, raw: &RawError) -> ErrorRecord {
        let record = self.resolve(raw);
        debug!(
            "Classified {:?} from {} as {:?}",
            raw.code, raw.source.name, record.kind
        );
        self.missing.clear();
        record
    }

    fn resolve(&self, raw: &RawError) -> ErrorRecord {
        let role = raw.source.role;
        match raw.code {
            ErrorCode::Resource(
                code @ (ResourceError::NotFound
                | ResourceError::OpenRead
                | ResourceError::OpenWrite
                | ResourceError::OpenReadWrite),
            ) => match role {
                SourceRole::AudioSink => {
                    ErrorRecord::new(ErrorKind::AudioOutputUnavailable, AUDIO_OUTPUT_NOT_FOUND)
                }
                SourceRole::VideoSink => {
                    ErrorRecord::new(ErrorKind::VideoOutputUnavailable, VIDEO_OUTPUT_NOT_FOUND)
                }
                _ if code == ResourceError::NotFound => {
                    ErrorRecord::new(ErrorKind::FileNotFound, LOCATION_NOT_FOUND)
                }
                _ => ErrorRecord::new(ErrorKind::PermissionDenied, PERMISSION_DENIED),
            },
            ErrorCode::Resource(ResourceError::Busy) if role == SourceRole::VideoSink => {
                ErrorRecord::new(ErrorKind::VideoOutputBusy, VIDEO_OUTPUT_BUSY)
            }
            ErrorCode::Resource(ResourceError::Busy) if role == SourceRole::AudioSink => {
                ErrorRecord::new(ErrorKind::AudioOutputBusy, AUDIO_OUTPUT_BUSY)
            }
            ErrorCode::Resource(_) => ErrorRecord::new(ErrorKind::FileGeneric, raw.message.clone()),
            ErrorCode::Core(CoreError::MissingPlugin) => {
                let message = match self.missing.first() {
                    Some(missing) => format!(
                        "The playback of this movie requires a {} plugin which is not installed.",
                        missing.description
                    ),
                    None => raw.message.clone(),
                };
                ErrorRecord::new(ErrorKind::PluginLoadFailure, message)
            }
            ErrorCode::Stream(StreamError::CodecNotFound) => {
                ErrorRecord::new(ErrorKind::CodecNotHandled, self.codec_message(raw))
            }
            ErrorCode::Stream(StreamError::WrongType | StreamError::NotImplemented) => {
                ErrorRecord::new(
                    ErrorKind::CodecNotHandled,
                    format!("{}: {}", raw.source.name, raw.message),
                )
            }
            ErrorCode::Stream(StreamError::Failed) if role == SourceRole::TypeFinder => {
                ErrorRecord::new(ErrorKind::NetworkReadError, NETWORK_READ)
            }
            _ => ErrorRecord::new(ErrorKind::Generic, raw.message.clone()),
        }
    }

    fn codec_message(&self, raw: &RawError) -> String {
        match self.missing.as_slice() {
            [] => raw.message.clone(),
            [single] => format!(
                "The playback of this movie requires a {} plugin which is not installed.",
                single.description
            ),
            several => {
                let list: Vec<&str> = several.iter().map(|m| m.description.as_str()).collect();
                format!(
                    "The playback of this movie requires the following decoders which are not installed:\n\n{}",
                    list.join("\n")
                )
            }
        }
    }
}
