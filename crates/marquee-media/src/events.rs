//! Typed events and external collaborators.

use crate::bus::ControllerHandle;
use crate::classify::{ErrorKind, MissingCapabilityNotice};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Notifications raised by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Error {
        kind: ErrorKind,
        message: String,
        playback_stopped: bool,
        fatal: bool,
    },
    Eos,
    Tick {
        current_time: u64,
        stream_length: u64,
        position: f64,
        seekable: bool,
    },
    Buffering(u8),
    /// Cached fraction of the stream, -1 when unknown
    DownloadBuffering(f64),
    GotMetadata,
    ChannelsChanged,
    Redirect(String),
    SeekableChanged(bool),
    DownloadFilename(String),
    VolumeChanged(f64),
}

/// Fan-out of [`PlayerEvent`]s to every subscriber
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlayerEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event`, forgetting subscribers that hung up
    pub fn emit(&mut self, event: PlayerEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Installs missing decoders or sources.
///
/// Returning `true` means the notice was accepted; the installer reports the
/// outcome later through [`ControllerHandle::install_finished`].
pub trait CapabilityInstaller: Send {
    fn install(&mut self, notice: &MissingCapabilityNotice, handle: ControllerHandle) -> bool;
}

/// Credentials request for a protected network location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub uri: String,
    pub message: String,
}

/// Mounts volumes and asks for passwords on behalf of the controller.
///
/// Both calls return immediately; completions are posted through the handle.
pub trait MountOperator: Send {
    fn mount_enclosing_volume(&mut self, uri: &str, handle: ControllerHandle);

    fn ask_password(&mut self, request: &AuthRequest, handle: ControllerHandle);
}
