//! The controller's single dispatch queue.
//!
//! Pipeline threads post [`PipelineMessage`]s through a [`Bus`];
//! collaborators post completions through a [`ControllerHandle`]. Both land
//! on the same channel and are handled in arrival order by the loop that
//! owns the controller.

use crate::capabilities::{Element, InterfaceResolver, WindowHandle};
use crate::pipeline::PipelineMessage;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Answer from the password dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    Credentials { user: String, password: String },
    Aborted,
}

/// Completions and internal requests handled on the controller's loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Deferred capability discovery on the creating context
    ResolveCapabilities,
    InstallFinished { success: bool },
    MountFinished(Result<(), String>),
    Auth(AuthReply),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopMessage {
    Pipeline(PipelineMessage),
    Control(ControlMessage),
}

/// Posting side handed to the pipeline
#[derive(Clone)]
pub struct Bus {
    tx: Sender<LoopMessage>,
    flushing: Arc<AtomicBool>,
    resolver: Arc<InterfaceResolver>,
}

impl Bus {
    pub(crate) fn new(tx: Sender<LoopMessage>, resolver: Arc<InterfaceResolver>) -> Self {
        Self {
            tx,
            flushing: Arc::new(AtomicBool::new(false)),
            resolver,
        }
    }

    /// Queue a message; dropped while the bus is flushing
    pub fn post(&self, message: PipelineMessage) -> bool {
        if self.flushing.load(Ordering::Acquire) {
            trace!("Bus flushing, dropping {}", message.name());
            return false;
        }
        self.tx.send(LoopMessage::Pipeline(message)).is_ok()
    }

    /// Synchronous drawing-surface request, answered on the calling thread
    pub fn request_surface(
        &self,
        requester: &Arc<dyn Element>,
        video_sink: Option<&Arc<dyn Element>>,
    ) -> Option<WindowHandle> {
        self.resolver.prepare_surface(requester, video_sink)
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    pub(crate) fn set_flushing(&self, flushing: bool) {
        self.flushing.store(flushing, Ordering::Release);
    }
}

/// Cloneable handle collaborators use to report back to the controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: Sender<LoopMessage>,
}

impl ControllerHandle {
    pub(crate) fn new(tx: Sender<LoopMessage>) -> Self {
        Self { tx }
    }

    pub fn install_finished(&self, success: bool) -> bool {
        self.send(ControlMessage::InstallFinished { success })
    }

    pub fn mount_finished(&self, result: Result<(), String>) -> bool {
        self.send(ControlMessage::MountFinished(result))
    }

    pub fn auth_reply(&self, reply: AuthReply) -> bool {
        self.send(ControlMessage::Auth(reply))
    }

    fn send(&self, message: ControlMessage) -> bool {
        self.tx.send(LoopMessage::Control(message)).is_ok()
    }
}
