//! Optional sink capabilities.
//!
//! Output sinks may expose a drawing-surface binding, navigation commands
//! and a color balance. The sink owns those objects; the resolver only keeps
//! weak handles and re-resolves them lazily after the sink changes.
//!
//! Discovery belongs to the thread that created the controller. When the
//! pipeline thread asks, cached handles are dropped and one deferred
//! re-resolution is posted to the controller's loop. The only synchronous
//! cross-thread path is [`InterfaceResolver::prepare_surface`], which the
//! pipeline calls right before it would otherwise open a window of its own.

use crate::bus::{ControlMessage, LoopMessage};
use crate::context::ExecutionContext;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Native drawable handle supplied by the windowing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

pub trait SurfaceBinding: Send + Sync {
    fn bind_window(&self, handle: WindowHandle);

    /// Redraw the last frame
    fn expose(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationCommand {
    Menu,
    TitleMenu,
    RootMenu,
    Left,
    Right,
    Up,
    Down,
    Activate,
    PreviousAngle,
    NextAngle,
}

pub trait Navigation: Send + Sync {
    fn send_command(&self, command: NavigationCommand);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceType {
    Hardware,
    Software,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChannel {
    pub label: String,
    pub min: i32,
    pub max: i32,
}

pub trait ColorBalance: Send + Sync {
    fn balance_type(&self) -> BalanceType;
    fn channels(&self) -> Vec<BalanceChannel>;
    fn value(&self, channel: &str) -> Option<i32>;
    fn set_value(&self, channel: &str, value: i32);
}

/// Element inside the pipeline that may expose capabilities.
///
/// Returned handles must be clones of objects the element keeps alive.
pub trait Element: Send + Sync {
    fn name(&self) -> &str;

    fn surface_binding(&self) -> Option<Arc<dyn SurfaceBinding>> {
        None
    }

    fn navigation(&self) -> Option<Arc<dyn Navigation>> {
        None
    }

    fn color_balance(&self) -> Option<Arc<dyn ColorBalance>> {
        None
    }
}

/// Supplies the native drawable the surface binding should render into
pub trait SurfaceProvider: Send + Sync {
    fn window_handle(&self) -> Option<WindowHandle>;
}

/// Elements relevant for capability lookup
#[derive(Clone, Default)]
pub struct SinkTopology {
    pub video_sink: Option<Arc<dyn Element>>,
    /// Every element in the pipeline, searched for color balance
    pub elements: Vec<Arc<dyn Element>>,
}

impl fmt::Debug for SinkTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkTopology")
            .field("video_sink", &self.video_sink.as_ref().map(|s| s.name()))
            .field("elements", &self.elements.len())
            .finish()
    }
}

/// Outcome of [`InterfaceResolver::resolve_capabilities`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        surface: bool,
        navigation: bool,
        color_balance: bool,
    },
    /// Called off the creating context; re-resolution was posted instead
    Deferred,
}

#[derive(Default)]
struct CapabilitySet {
    surface: Option<Weak<dyn SurfaceBinding>>,
    navigation: Option<Weak<dyn Navigation>>,
    color_balance: Option<Weak<dyn ColorBalance>>,
}

impl CapabilitySet {
    fn clear(&mut self) {
        self.surface = None;
        self.navigation = None;
        self.color_balance = None;
    }
}

pub struct InterfaceResolver {
    context: ExecutionContext,
    set: Mutex<CapabilitySet>,
    deferred: AtomicBool,
    loop_tx: Sender<LoopMessage>,
    surface_provider: RwLock<Option<Arc<dyn SurfaceProvider>>>,
}

impl InterfaceResolver {
    pub fn new(context: ExecutionContext, loop_tx: Sender<LoopMessage>) -> Self {
        Self {
            context,
            set: Mutex::new(CapabilitySet::default()),
            deferred: AtomicBool::new(false),
            loop_tx,
            surface_provider: RwLock::new(None),
        }
    }

    pub fn set_surface_provider(&self, provider: Option<Arc<dyn SurfaceProvider>>) {
        *self.surface_provider.write() = provider;
    }

    /// Look up every capability from `topology`.
    ///
    /// Cheap enough to call whenever the sink may have changed.
    pub fn resolve_capabilities(&self, topology: &SinkTopology) -> Resolution {
        if !self.context.is_current() {
            self.invalidate();
            self.schedule_deferred();
            return Resolution::Deferred;
        }

        let video_sink = topology.video_sink.as_ref();
        let surface = video_sink.and_then(|sink| sink.surface_binding());
        let navigation = video_sink.and_then(|sink| sink.navigation());

        let balances: Vec<Arc<dyn ColorBalance>> = topology
            .elements
            .iter()
            .filter_map(|element| element.color_balance())
            .collect();
        let color_balance = balances
            .iter()
            .find(|balance| balance.balance_type() == BalanceType::Hardware)
            .or_else(|| balances.first())
            .cloned()
            .or_else(|| video_sink.and_then(|sink| sink.color_balance()));

        let resolution = Resolution::Resolved {
            surface: surface.is_some(),
            navigation: navigation.is_some(),
            color_balance: color_balance.is_some(),
        };

        let mut set = self.set.lock();
        set.surface = surface.as_ref().map(Arc::downgrade);
        set.navigation = navigation.as_ref().map(Arc::downgrade);
        set.color_balance = color_balance.as_ref().map(Arc::downgrade);
        drop(set);

        debug!("Resolved sink capabilities: {:?}", resolution);
        resolution
    }

    /// Synchronous surface request from the pipeline thread.
    ///
    /// Resolves only the surface binding, falling back to the requesting
    /// element, and binds the provider's handle before returning. The other
    /// capabilities are left to the deferred path.
    pub fn prepare_surface(
        &self,
        requester: &Arc<dyn Element>,
        video_sink: Option<&Arc<dyn Element>>,
    ) -> Option<WindowHandle> {
        let binding = {
            let mut set = self.set.lock();
            set.navigation = None;
            set.color_balance = None;
            let binding = video_sink
                .and_then(|sink| sink.surface_binding())
                .or_else(|| requester.surface_binding());
            set.surface = binding.as_ref().map(Arc::downgrade);
            binding
        };

        if !self.context.is_current() {
            self.schedule_deferred();
        }

        let Some(binding) = binding else {
            warn!("{} asked for a surface but exposes no binding", requester.name());
            return None;
        };
        let handle = self
            .surface_provider
            .read()
            .as_ref()
            .and_then(|provider| provider.window_handle())?;

        debug!("Binding window {:?} for {}", handle, requester.name());
        binding.bind_window(handle);
        Some(handle)
    }

    pub fn surface_binding(&self) -> Option<Arc<dyn SurfaceBinding>> {
        self.set.lock().surface.as_ref().and_then(Weak::upgrade)
    }

    pub fn navigation(&self) -> Option<Arc<dyn Navigation>> {
        self.set.lock().navigation.as_ref().and_then(Weak::upgrade)
    }

    pub fn color_balance(&self) -> Option<Arc<dyn ColorBalance>> {
        self.set.lock().color_balance.as_ref().and_then(Weak::upgrade)
    }

    /// Drop every cached handle
    pub fn invalidate(&self) {
        self.set.lock().clear();
    }

    /// Whether a deferred re-resolution is queued
    pub fn deferred_pending(&self) -> bool {
        self.deferred.load(Ordering::Acquire)
    }

    /// Called by the loop right before running the deferred re-resolution
    pub(crate) fn take_deferred(&self) -> bool {
        self.deferred.swap(false, Ordering::AcqRel)
    }

    fn schedule_deferred(&self) {
        if self.deferred.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Scheduling capability re-resolution on the creating context");
        let message = LoopMessage::Control(ControlMessage::ResolveCapabilities);
        if self.loop_tx.send(message).is_err() {
            self.deferred.store(false, Ordering::Release);
        }
    }
}
