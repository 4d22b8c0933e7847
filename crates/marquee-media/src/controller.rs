//! Player controller
//!
//! Owns the pipeline and drives it through open, preroll, play, pause, stop
//! and close. Everything the pipeline reports arrives as a [`LoopMessage`] on
//! one dispatch queue and is handled by whoever calls
//! [`PlayerController::dispatch_pending`] or [`PlayerController::iterate`].
//! Timers are deadlines checked by the same loop, so no handler ever runs
//! concurrently with a public call.

use crate::buffering::{BufferingAction, BufferingMonitor, BufferingState};
use crate::bus::{AuthReply, Bus, ControlMessage, ControllerHandle, LoopMessage};
use crate::capabilities::{
    BalanceChannel, ColorBalance, InterfaceResolver, NavigationCommand, Resolution,
    SurfaceProvider,
};
use crate::classify::{ErrorClassifier, ErrorKind, ErrorRecord, MissingCapabilityNotice};
use crate::clock::{Clock, SystemClock};
use crate::context::ExecutionContext;
use crate::events::{AuthRequest, CapabilityInstaller, EventBus, MountOperator, PlayerEvent};
use crate::metadata::{MetadataKind, MetadataSource, MetadataValue};
use crate::pipeline::{
    BufferingKind, ErrorCode, MediaPipeline, MessageSource, PipelineMessage, PipelineState,
    RawError, ResourceError, SourceRole, StateChangeReturn, StreamInfo,
};
use crate::seek::{SeekCoordinator, SeekDecision, SeekRequest};
use crate::tags::{StreamKind, TagAggregator, TagList};
use crate::timers::{TimerKind, Timers};
use crate::{MediaError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use marquee_core::{
    AudioOutputType, ConnectionSpeed, MemorySettingsStore, PlayerSettings, SettingsStore,
    VideoProperty, VIDEO_PROPERTY_MAX,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const EMPTY_STREAM: &str = "Media file could not be played.";
const VIDEO_DECODER_MISSING: &str = "The video codec is not handled. You might need to \
     install additional plugins to be able to play some types of movies.";
const MOUNT_UNAVAILABLE: &str = "No mount operator available for this location.";

/// What the controller is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UseType {
    #[default]
    Video,
    Audio,
    /// Blocking open, extract metadata, never play
    Metadata,
    /// Blocking open for frame capture
    Capture,
}

impl UseType {
    /// Interactive controllers return from `open` before preroll completes
    pub fn is_interactive(self) -> bool {
        matches!(self, UseType::Video | UseType::Audio)
    }
}

/// Controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub use_type: UseType,
    /// Position update period while playing
    pub tick_interval_ms: u64,
    /// Seek coalescing window
    pub seek_debounce_ms: u64,
    pub download_poll_interval_ms: u64,
    /// Remaining download time times this margin must fit in the stream
    pub download_margin: f64,
    /// Grace period before a stopped pipeline drops to Null
    pub teardown_grace_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            use_type: UseType::Video,
            tick_interval_ms: 200,
            seek_debounce_ms: 100,
            download_poll_interval_ms: 200,
            download_margin: 1.1,
            teardown_grace_ms: 10_000,
        }
    }
}

impl ControllerConfig {
    pub fn with_use_type(use_type: UseType) -> Self {
        Self {
            use_type,
            ..Self::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn seek_debounce(&self) -> Duration {
        Duration::from_millis(self.seek_debounce_ms)
    }

    pub fn download_poll_interval(&self) -> Duration {
        Duration::from_millis(self.download_poll_interval_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    Idle,
    Asking,
    /// The user dismissed the dialog; further 401s surface as errors
    Aborted,
}

enum PrerollOutcome {
    Prerolled,
    Failed(RawError),
    EndOfStream,
}

/// A normalized media location
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    uri: String,
    device: Option<String>,
}

pub struct PlayerController {
    config: ControllerConfig,
    context: ExecutionContext,
    pipeline: Box<dyn MediaPipeline>,
    clock: Arc<dyn Clock>,
    settings_store: Arc<dyn SettingsStore>,
    settings: PlayerSettings,

    loop_tx: Sender<LoopMessage>,
    loop_rx: Receiver<LoopMessage>,
    backlog: VecDeque<LoopMessage>,
    bus: Bus,
    timers: Timers,
    events: EventBus,

    resolver: Arc<InterfaceResolver>,
    seek: SeekCoordinator,
    buffering: BufferingMonitor,
    classifier: ErrorClassifier,
    tags: TagAggregator,

    installer: Option<Box<dyn CapabilityInstaller>>,
    mount_operator: Option<Box<dyn MountOperator>>,

    mrl: Option<String>,
    subtitle_uri: Option<String>,
    media_device: Option<String>,
    credentials: Option<(String, String)>,

    target_state: PipelineState,
    /// State requested with an async return that has not been reached yet
    pending_state: Option<PipelineState>,

    stream_length: u64,
    current_time: u64,
    position: f64,
    /// Cached pipeline answer to the seekable query
    seekable: Option<bool>,
    seekable_reported: Option<bool>,
    is_live: bool,
    is_menu: bool,
    stream_info: StreamInfo,
    got_redirect: bool,
    volume: f64,

    ignore_errors: bool,
    plugin_install_in_progress: bool,
    mount_in_progress: bool,
    auth: AuthState,
}

impl PlayerController {
    pub fn new(
        mut pipeline: Box<dyn MediaPipeline>,
        config: ControllerConfig,
        context: ExecutionContext,
    ) -> Self {
        let (loop_tx, loop_rx) = unbounded();
        let resolver = Arc::new(InterfaceResolver::new(context, loop_tx.clone()));
        let bus = Bus::new(loop_tx.clone(), resolver.clone());
        pipeline.attach_bus(bus.clone());

        info!("Creating player controller for {:?}", config.use_type);

        let mut controller = Self {
            seek: SeekCoordinator::new(config.seek_debounce()),
            buffering: BufferingMonitor::new(config.download_margin),
            config,
            context,
            pipeline,
            clock: Arc::new(SystemClock),
            settings_store: Arc::new(MemorySettingsStore::default()),
            settings: PlayerSettings::default(),
            loop_tx,
            loop_rx,
            backlog: VecDeque::new(),
            bus,
            timers: Timers::new(),
            events: EventBus::new(),
            resolver,
            classifier: ErrorClassifier::new(),
            tags: TagAggregator::new(),
            installer: None,
            mount_operator: None,
            mrl: None,
            subtitle_uri: None,
            media_device: None,
            credentials: None,
            target_state: PipelineState::Null,
            pending_state: None,
            stream_length: 0,
            current_time: 0,
            position: 0.0,
            seekable: None,
            seekable_reported: None,
            is_live: false,
            is_menu: false,
            stream_info: StreamInfo::default(),
            got_redirect: false,
            volume: 1.0,
            ignore_errors: false,
            plugin_install_in_progress: false,
            mount_in_progress: false,
            auth: AuthState::Idle,
        };
        controller.apply_settings();
        controller
    }

    /// Load persisted settings from `store` and keep writing changes back to it
    pub fn with_settings(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings = match store.load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load player settings, using defaults: {}", e);
                PlayerSettings::default()
            }
        };
        self.settings_store = store;
        self.apply_settings();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_installer(mut self, installer: Box<dyn CapabilityInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn with_mount_operator(mut self, operator: Box<dyn MountOperator>) -> Self {
        self.mount_operator = Some(operator);
        self
    }

    pub fn with_surface_provider(self, provider: Arc<dyn SurfaceProvider>) -> Self {
        self.resolver.set_surface_provider(Some(provider));
        self
    }

    fn apply_settings(&mut self) {
        self.pipeline
            .set_connection_speed(self.settings.connection_speed.kbps());
        if let Some(channels) = self.settings.audio_output.channel_count() {
            self.pipeline.set_audio_channels(channels);
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Posting handle for collaborators completing asynchronous work
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle::new(self.loop_tx.clone())
    }

    pub fn resolver(&self) -> &Arc<InterfaceResolver> {
        &self.resolver
    }

    // ===== Lifecycle =====

    /// Open `uri`, replacing whatever was open.
    ///
    /// Interactive controllers return once preroll has been requested.
    /// Metadata and capture controllers block until the pipeline prerolls or
    /// fails.
    pub fn open(&mut self, uri: &str, subtitle_uri: Option<&str>) -> Result<()> {
        if self.mrl.is_some() {
            self.close();
        }

        let location = normalize_location(uri)?;
        info!("Opening {}", location.uri);

        self.got_redirect = false;
        self.stream_info = StreamInfo::default();
        self.stream_length = 0;
        self.ignore_errors = false;
        self.timers.cancel(TimerKind::ReadyTeardown);

        self.bus.set_flushing(true);
        self.flush_pipeline_messages();
        self.target_state = PipelineState::Ready;
        self.request_state(PipelineState::Ready);
        self.bus.set_flushing(false);

        self.pipeline.set_uri(&location.uri, subtitle_uri);
        self.mrl = Some(location.uri);
        self.media_device = location.device;
        self.subtitle_uri = subtitle_uri.map(str::to_string);
        self.seekable = None;
        self.target_state = PipelineState::Paused;
        self.classifier.clear_missing();
        self.request_state(PipelineState::Paused);

        if self.config.use_type.is_interactive() {
            return Ok(());
        }

        let outcome = self.wait_for_preroll();

        if self.config.use_type == UseType::Metadata {
            self.drain_metadata_messages();
            self.refresh_stream_length();
            self.events.emit(PlayerEvent::GotMetadata);
        }

        let raw = match outcome {
            PrerollOutcome::Prerolled => {
                self.events.emit(PlayerEvent::ChannelsChanged);
                return Ok(());
            }
            PrerollOutcome::Failed(raw) => Some(raw),
            PrerollOutcome::EndOfStream => None,
        };

        if let Some(raw) = &raw {
            if self.offer_missing_capabilities(raw) {
                self.ignore_errors = true;
                return Ok(());
            }
        }

        self.stop_pipeline();
        self.ignore_errors = true;
        self.mrl = None;
        self.media_device = None;
        self.subtitle_uri = None;

        let record = match raw {
            Some(raw) => self.classifier.classify(&raw),
            None => ErrorRecord::new(ErrorKind::EmptyStream, EMPTY_STREAM),
        };
        warn!("Failed to open media: {}", record.message);
        Err(MediaError::Playback(record))
    }

    pub fn play(&mut self) -> Result<()> {
        if !self.config.use_type.is_interactive() {
            debug!("Not playing, controller is used for {:?}", self.config.use_type);
            return Ok(());
        }
        if self.mrl.is_none() {
            return Err(MediaError::NoMedia);
        }

        self.target_state = PipelineState::Playing;
        self.timers.cancel(TimerKind::ReadyTeardown);

        let current = self.pipeline.current_state();
        if current == PipelineState::Playing && self.pending_state.is_none() {
            debug!("Already playing");
            return Ok(());
        }

        if self.buffering.blocks_play(self.stream_length) {
            debug!("Buffering, deferring playback");
            return Ok(());
        }
        if self.plugin_install_in_progress && current != PipelineState::Paused {
            debug!("Capability install in progress, deferring playback");
            return Ok(());
        }
        if self.mount_in_progress {
            debug!("Mount in progress, deferring playback");
            return Ok(());
        }
        if self.auth == AuthState::Asking {
            debug!("Waiting for credentials, deferring playback");
            return Ok(());
        }

        info!("Playing {}", self.mrl.as_deref().unwrap_or_default());
        self.bus.set_flushing(false);
        self.set_playback_direction(true)?;
        if self.request_state(PipelineState::Playing) == StateChangeReturn::Failure {
            warn!("Pipeline refused to play");
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.mrl.is_none() {
            return;
        }

        let current = self.pipeline.current_state();
        if self.is_live && self.pending_state.is_some() && current > PipelineState::Ready {
            debug!("Live stream has not prerolled, stopping instead of pausing");
            self.stop();
            return;
        }

        debug!("Pausing");
        self.timers.cancel(TimerKind::ReadyTeardown);
        self.target_state = PipelineState::Paused;
        self.bus.set_flushing(false);
        self.request_state(PipelineState::Paused);
    }

    pub fn stop(&mut self) {
        info!("Stopping");
        self.stop_pipeline();
        self.got_time_tick(0);
    }

    /// Stop and forget the current media. A no-op when nothing is open.
    pub fn close(&mut self) {
        let Some(mrl) = self.mrl.take() else {
            trace!("Nothing to close");
            return;
        };
        info!("Closing {}", mrl);

        self.stop_pipeline();

        self.subtitle_uri = None;
        self.media_device = None;
        self.credentials = None;
        self.is_live = false;
        self.is_menu = false;
        self.seek.reset();
        self.tags.clear();
        self.buffering.reset();
        self.resolver.invalidate();
        self.stream_info = StreamInfo::default();
        self.stream_length = 0;
        self.seekable = None;
        self.auth = AuthState::Idle;
        self.mount_in_progress = false;
        self.timers.cancel(TimerKind::SeekFlush);
        self.timers.cancel(TimerKind::Eos);

        self.seekable_reported = Some(false);
        self.events.emit(PlayerEvent::SeekableChanged(false));
        self.events.emit(PlayerEvent::ChannelsChanged);
        self.got_time_tick(0);
    }

    fn stop_pipeline(&mut self) {
        self.target_state = PipelineState::Ready;
        let current = self.pipeline.current_state();
        if current > PipelineState::Ready {
            debug!("Dropping pipeline from {} to READY", current);
            self.request_state(PipelineState::Ready);
            self.process_pending_state_changes();
        }

        self.bus.set_flushing(true);
        self.flush_pipeline_messages();

        if current > PipelineState::Null {
            let now = self.clock.now();
            self.timers
                .schedule_once(TimerKind::ReadyTeardown, now, self.config.teardown_grace());
        }

        self.buffering.reset();
        self.plugin_install_in_progress = false;
        self.ignore_errors = false;
        self.timers.cancel(TimerKind::DownloadPoll);
        self.timers.cancel(TimerKind::Tick);
        self.timers.cancel(TimerKind::SeekFlush);
        self.timers.cancel(TimerKind::Eos);
    }

    /// Stop, keeping a pending request to play for when the obstacle clears
    fn stop_preserving_target(&mut self) {
        let target = self.target_state;
        self.stop();
        if target == PipelineState::Playing {
            self.target_state = target;
        }
    }

    fn request_state(&mut self, state: PipelineState) -> StateChangeReturn {
        let result = self.pipeline.set_state(state);
        self.pending_state = (result == StateChangeReturn::Async).then_some(state);
        if result == StateChangeReturn::Failure {
            warn!("State change to {} failed", state);
        }
        result
    }

    // ===== Seeking =====

    /// Seek to a fraction of the stream
    pub fn seek(&mut self, fraction: f64) -> Result<()> {
        let length = self.stream_length();
        let time_ms = (fraction.clamp(0.0, 1.0) * length as f64) as u64;
        self.seek_time(time_ms, false)
    }

    pub fn seek_time(&mut self, time_ms: u64, accurate: bool) -> Result<()> {
        let Some(mrl) = self.mrl.as_deref() else {
            return Err(MediaError::NoMedia);
        };
        let disc = mrl.starts_with("dvd:") || mrl.starts_with("vcd:");
        let length = self.stream_length();

        if time_ms > length && length > 0 && !disc {
            debug!("Seek to {} ms is past the end ({} ms)", time_ms, length);
            self.schedule_eos();
            return Ok(());
        }

        self.got_time_tick(time_ms);

        let now = self.clock.now();
        match self.seek.request(time_ms, accurate, now) {
            SeekDecision::Execute(request) => self.execute_seek(request),
            SeekDecision::Deferred { flush_at } => {
                trace!("Deferring seek to {} ms", time_ms);
                if !self.timers.is_active(TimerKind::SeekFlush) {
                    self.timers.schedule_at(TimerKind::SeekFlush, flush_at);
                }
                Ok(())
            }
        }
    }

    fn execute_seek(&mut self, request: SeekRequest) -> Result<()> {
        self.set_playback_direction(true)?;
        debug!("Seeking to {} ms", request.time_ms);
        if !self.pipeline.seek(SeekCoordinator::seek_command(&request)) {
            return Err(MediaError::SeekError(format!(
                "pipeline refused seek to {} ms",
                request.time_ms
            )));
        }
        self.seek.issued(&request);
        Ok(())
    }

    fn flush_pending_seek(&mut self) {
        let now = self.clock.now();
        if let Some(request) = self.seek.flush_due(now) {
            if let Err(e) = self.execute_seek(request) {
                warn!("Deferred seek failed: {}", e);
            }
        } else if let Some(deadline) = self.seek.flush_deadline() {
            if deadline > now {
                self.timers.schedule_at(TimerKind::SeekFlush, deadline);
            }
        }
    }

    /// Step one frame in either direction
    pub fn step(&mut self, forward: bool) -> Result<()> {
        if self.mrl.is_none() {
            return Err(MediaError::NoMedia);
        }
        self.set_playback_direction(forward)?;
        if !self.pipeline.step(1) {
            return Err(MediaError::StepFailed);
        }
        if let Some(position) = self.pipeline.query_position() {
            self.got_time_tick(position);
        }
        Ok(())
    }

    pub fn set_playback_direction(&mut self, forward: bool) -> Result<()> {
        let position = self.pipeline.query_position().unwrap_or(self.current_time);
        let Some(command) = self.seek.direction_command(forward, position) else {
            return Ok(());
        };
        debug!(
            "Switching playback direction to {}",
            if forward { "forward" } else { "reverse" }
        );
        if !self.pipeline.seek(command) {
            return Err(MediaError::DirectionChange);
        }
        self.seek.set_direction(forward);
        Ok(())
    }

    pub fn is_seekable(&mut self) -> bool {
        let seekable = if self.mrl.is_none() || self.is_menu {
            false
        } else {
            match self.seekable {
                Some(seekable) => seekable,
                None => match self.pipeline.query_seekable() {
                    Some(seekable) => {
                        self.seekable = Some(seekable);
                        seekable
                    }
                    None => self.stream_length > 0,
                },
            }
        };
        self.notify_seekable(seekable);
        seekable
    }

    fn notify_seekable(&mut self, seekable: bool) {
        if self.seekable_reported != Some(seekable) {
            self.seekable_reported = Some(seekable);
            self.events.emit(PlayerEvent::SeekableChanged(seekable));
        }
    }

    /// Whether seeking is cheap: local files, discs and downloaded streams
    pub fn can_direct_seek(&self) -> bool {
        match self.mrl.as_deref() {
            None => false,
            Some(mrl) => {
                self.buffering.is_downloading()
                    || ["file://", "dvd:/", "vcd:/"]
                        .iter()
                        .any(|prefix| mrl.starts_with(prefix))
            }
        }
    }

    // ===== Position =====

    pub fn stream_length(&mut self) -> u64 {
        if self.stream_length == 0 {
            self.refresh_stream_length();
        }
        self.stream_length
    }

    fn refresh_stream_length(&mut self) {
        if let Some(length) = self.pipeline.query_duration() {
            self.stream_length = length;
        }
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    fn query_timeout(&mut self) {
        if let Some(length) = self.pipeline.query_duration() {
            if length != self.stream_length {
                trace!("Stream length changed to {} ms", length);
                self.stream_length = length;
                if self.config.use_type.is_interactive() {
                    self.events.emit(PlayerEvent::GotMetadata);
                }
            }
        }
        if let Some(position) = self.pipeline.query_position() {
            self.got_time_tick(position);
        }
    }

    fn got_time_tick(&mut self, time_ms: u64) {
        self.current_time = time_ms;
        self.position = if self.stream_length == 0 {
            0.0
        } else {
            (time_ms as f64 / self.stream_length as f64).min(1.0)
        };

        let seekable = if self.stream_length == 0 {
            self.is_seekable()
        } else {
            if self.seekable.is_none() {
                self.seekable = Some(true);
                self.notify_seekable(true);
            }
            true
        };
        self.is_live = self.stream_length == 0;

        self.events.emit(PlayerEvent::Tick {
            current_time: time_ms,
            stream_length: self.stream_length,
            position: self.position,
            seekable,
        });
    }

    fn schedule_eos(&mut self) {
        if !self.timers.is_active(TimerKind::Eos) {
            let now = self.clock.now();
            self.timers.schedule_once(TimerKind::Eos, now, Duration::ZERO);
        }
    }

    // ===== State queries =====

    pub fn is_playing(&self) -> bool {
        self.target_state == PipelineState::Playing
    }

    pub fn target_state(&self) -> PipelineState {
        self.target_state
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.current_state()
    }

    pub fn buffering_state(&self) -> &BufferingState {
        self.buffering.state()
    }

    pub fn mrl(&self) -> Option<&str> {
        self.mrl.as_deref()
    }

    pub fn subtitle_uri(&self) -> Option<&str> {
        self.subtitle_uri.as_deref()
    }

    /// Device path for disc locations
    pub fn media_device(&self) -> Option<&str> {
        self.media_device.as_deref()
    }

    /// Path of the on-disk cache once a download has completed
    pub fn download_filename(&self) -> Option<&str> {
        self.buffering.state().cached_file_path.as_deref()
    }

    pub fn has_menus(&self) -> bool {
        self.is_menu
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn got_redirect(&self) -> bool {
        self.got_redirect
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(user, password)| (user.as_str(), password.as_str()))
    }

    pub fn stream_info(&self) -> &StreamInfo {
        &self.stream_info
    }

    pub fn tags(&self) -> &TagAggregator {
        &self.tags
    }

    pub fn metadata(&mut self, kind: MetadataKind) -> MetadataValue {
        let stream_length_ms = self.stream_length();
        MetadataSource {
            tags: &self.tags,
            info: &self.stream_info,
            stream_length_ms,
            extracting: self.config.use_type == UseType::Metadata,
        }
        .resolve(kind)
    }

    // ===== Settings-backed properties =====

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings_store.save(&self.settings) {
            warn!("Failed to save player settings: {}", e);
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn can_set_volume(&self) -> bool {
        self.settings.audio_output != AudioOutputType::Ac3Passthru
    }

    pub fn set_volume(&mut self, volume: f64) {
        if !self.can_set_volume() {
            debug!("Volume is fixed for passthrough output");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.pipeline.set_volume(volume);
        self.volume = volume;
        self.events.emit(PlayerEvent::VolumeChanged(volume));
    }

    pub fn connection_speed(&self) -> ConnectionSpeed {
        self.settings.connection_speed
    }

    pub fn set_connection_speed(&mut self, speed: ConnectionSpeed) {
        self.pipeline.set_connection_speed(speed.kbps());
        if self.settings.connection_speed != speed {
            self.settings.connection_speed = speed;
            self.save_settings();
        }
    }

    pub fn audio_output(&self) -> AudioOutputType {
        self.settings.audio_output
    }

    /// Switch the speaker layout; returns whether anything changed
    pub fn set_audio_output(&mut self, output: AudioOutputType) -> bool {
        if output == self.settings.audio_output {
            return false;
        }
        let Some(channels) = output.channel_count() else {
            debug!("Passthrough output cannot be selected directly");
            return false;
        };
        self.settings.audio_output = output;
        self.save_settings();
        self.pipeline.set_audio_channels(channels);
        true
    }

    /// Picture property on the 0..=65535 scale
    pub fn video_property(&self, property: VideoProperty) -> u16 {
        if let Some(balance) = self.resolver.color_balance() {
            if let Some(channel) = find_channel(balance.as_ref(), property) {
                if let Some(value) = balance.value(&channel.label) {
                    return scale_from_channel(value, &channel);
                }
            }
        }
        self.settings.video_property(property)
    }

    pub fn set_video_property(&mut self, property: VideoProperty, value: u16) {
        if let Some(balance) = self.resolver.color_balance() {
            if let Some(channel) = find_channel(balance.as_ref(), property) {
                balance.set_value(&channel.label, scale_to_channel(value, &channel));
            }
        }
        self.settings.set_video_property(property, value);
        self.save_settings();
    }

    fn apply_video_properties(&self) {
        let Some(balance) = self.resolver.color_balance() else {
            return;
        };
        for property in VideoProperty::ALL {
            if let Some(channel) = find_channel(balance.as_ref(), property) {
                let value = self.settings.video_property(property);
                balance.set_value(&channel.label, scale_to_channel(value, &channel));
            }
        }
    }

    /// Forward a menu navigation command; false when the sink has no navigation
    pub fn navigation_command(&self, command: NavigationCommand) -> bool {
        match self.resolver.navigation() {
            Some(navigation) => {
                navigation.send_command(command);
                true
            }
            None => false,
        }
    }

    /// Re-run capability discovery against the current sink topology
    pub fn resolve_capabilities(&mut self) -> Resolution {
        let topology = self.pipeline.topology();
        let resolution = self.resolver.resolve_capabilities(&topology);
        if matches!(resolution, Resolution::Resolved { .. }) {
            self.apply_video_properties();
        }
        resolution
    }

    // ===== Dispatch =====

    /// Handle everything queued and every due timer, until nothing is left
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut progressed = false;

            while let Some(message) = self.next_queued() {
                self.handle_loop_message(message);
                handled += 1;
                progressed = true;
            }

            let due = self.timers.take_due(self.clock.now());
            for kind in due {
                self.fire_timer(kind);
                handled += 1;
                progressed = true;
            }

            if !progressed {
                return handled;
            }
        }
    }

    /// Wait up to `timeout` for work, then dispatch it
    pub fn iterate(&mut self, timeout: Duration) -> usize {
        let handled = self.dispatch_pending();
        if handled > 0 {
            return handled;
        }

        let now = self.clock.now();
        let wait = self
            .timers
            .next_deadline()
            .map_or(timeout, |deadline| {
                deadline.saturating_duration_since(now).min(timeout)
            });

        match self.loop_rx.recv_timeout(wait) {
            Ok(message) => self.backlog.push_back(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
        self.dispatch_pending()
    }

    fn next_queued(&mut self) -> Option<LoopMessage> {
        self.backlog
            .pop_front()
            .or_else(|| self.loop_rx.try_recv().ok())
    }

    fn take_queued(&mut self) -> Vec<LoopMessage> {
        self.backlog
            .drain(..)
            .chain(self.loop_rx.try_iter())
            .collect()
    }

    /// Drop queued pipeline messages; completions stay queued
    fn flush_pipeline_messages(&mut self) {
        let queued = self.take_queued();
        self.backlog = queued
            .into_iter()
            .filter(|message| matches!(message, LoopMessage::Control(_)))
            .collect();
    }

    fn process_pending_state_changes(&mut self) {
        for message in self.take_queued() {
            match message {
                LoopMessage::Pipeline(message @ PipelineMessage::StateChanged { .. }) => {
                    self.handle_pipeline_message(message)
                }
                other => self.backlog.push_back(other),
            }
        }
    }

    fn drain_metadata_messages(&mut self) {
        for message in self.take_queued() {
            match message {
                LoopMessage::Pipeline(message) if message.carries_metadata() => {
                    self.handle_pipeline_message(message)
                }
                other => self.backlog.push_back(other),
            }
        }
    }

    /// Block until the pipeline prerolls, fails or hits end-of-stream
    fn wait_for_preroll(&mut self) -> PrerollOutcome {
        let mut deferred = VecDeque::new();

        let outcome = loop {
            let message = match self.backlog.pop_front() {
                Some(message) => message,
                None => match self.loop_rx.recv() {
                    Ok(message) => message,
                    Err(_) => {
                        break PrerollOutcome::Failed(RawError::new(
                            ErrorCode::Library,
                            MessageSource::pipeline(),
                            "Pipeline message queue closed",
                        ))
                    }
                },
            };

            match message {
                LoopMessage::Pipeline(PipelineMessage::StateChanged { source, old, new }) => {
                    let prerolled = source.is_pipeline() && new == PipelineState::Paused;
                    self.on_state_changed(&source, old, new);
                    if prerolled {
                        break PrerollOutcome::Prerolled;
                    }
                }
                LoopMessage::Pipeline(PipelineMessage::Error(raw)) => {
                    break PrerollOutcome::Failed(raw)
                }
                LoopMessage::Pipeline(PipelineMessage::Eos) => break PrerollOutcome::EndOfStream,
                other => deferred.push_back(other),
            }
        };

        deferred.extend(self.backlog.drain(..));
        self.backlog = deferred;
        outcome
    }

    fn fire_timer(&mut self, kind: TimerKind) {
        trace!("Timer fired: {:?}", kind);
        match kind {
            TimerKind::Tick => self.query_timeout(),
            TimerKind::DownloadPoll => self.poll_download(),
            TimerKind::Eos => {
                info!("End of stream");
                self.events.emit(PlayerEvent::Eos);
            }
            TimerKind::SeekFlush => self.flush_pending_seek(),
            TimerKind::ReadyTeardown => {
                debug!("Idle grace period over, releasing pipeline resources");
                self.request_state(PipelineState::Null);
            }
        }
    }

    fn handle_loop_message(&mut self, message: LoopMessage) {
        match message {
            LoopMessage::Pipeline(message) => self.handle_pipeline_message(message),
            LoopMessage::Control(message) => self.handle_control_message(message),
        }
    }

    fn handle_pipeline_message(&mut self, message: PipelineMessage) {
        trace!("Pipeline message: {}", message.name());
        match message {
            PipelineMessage::StateChanged { source, old, new } => {
                self.on_state_changed(&source, old, new)
            }
            PipelineMessage::Error(raw) => self.on_error(raw),
            PipelineMessage::Warning {
                source,
                message,
                debug: details,
            } => {
                warn!(
                    "Warning from {}: {} ({})",
                    source.name,
                    message,
                    details.as_deref().unwrap_or("no details")
                );
            }
            PipelineMessage::Eos => {
                self.query_timeout();
                self.schedule_eos();
            }
            PipelineMessage::Buffering {
                kind,
                percent,
                cache_path,
            } => self.on_buffering(kind, percent, cache_path),
            PipelineMessage::Tag { kind, tags } => self.on_tags(kind, &tags),
            PipelineMessage::DurationChanged => {
                self.stream_length = 0;
                self.refresh_stream_length();
            }
            PipelineMessage::AsyncDone => self.on_async_done(),
            PipelineMessage::StreamChanged => {
                self.update_stream_info();
                if self.config.use_type.is_interactive() {
                    self.events.emit(PlayerEvent::GotMetadata);
                    self.events.emit(PlayerEvent::ChannelsChanged);
                }
            }
            PipelineMessage::VideoSizeChanged => {
                self.update_stream_info();
                if self.config.use_type.is_interactive() {
                    self.events.emit(PlayerEvent::GotMetadata);
                }
            }
            PipelineMessage::Redirect { uri } => {
                info!("Redirected to {}", uri);
                self.got_redirect = true;
                self.events.emit(PlayerEvent::Redirect(uri));
            }
            PipelineMessage::Progress { percent } => {
                if !self.buffering.is_holding() {
                    self.events.emit(PlayerEvent::Buffering(percent.min(100)));
                }
            }
            PipelineMessage::MissingPlugin(capability) => {
                self.classifier.record_missing(capability)
            }
            PipelineMessage::NotMounted { uri } => self.on_not_mounted(uri),
            PipelineMessage::NavigationCommandsChanged { in_menu } => {
                self.is_menu = in_menu;
                self.is_seekable();
            }
            PipelineMessage::SinkChanged => {
                self.resolver.invalidate();
                self.resolve_capabilities();
            }
        }
    }

    fn handle_control_message(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::ResolveCapabilities => {
                if !self.context.is_current() {
                    warn!("Dispatching off the creating context, capabilities stay unresolved");
                    self.resolver.take_deferred();
                    return;
                }
                if self.resolver.take_deferred() {
                    self.resolve_capabilities();
                }
            }
            ControlMessage::InstallFinished { success } => {
                self.plugin_install_in_progress = false;
                if success {
                    info!("Capability install finished");
                    if self.target_state == PipelineState::Playing {
                        self.resume_playback("install");
                    }
                } else {
                    info!("Capability install did not complete");
                }
            }
            ControlMessage::MountFinished(result) => {
                self.mount_in_progress = false;
                match result {
                    Ok(()) => {
                        info!("Volume mounted");
                        if self.target_state == PipelineState::Playing {
                            self.resume_playback("mount");
                        }
                    }
                    Err(message) => self.report_mount_failure(message),
                }
            }
            ControlMessage::Auth(reply) => {
                match reply {
                    AuthReply::Credentials { user, password } => {
                        debug!("Received credentials for {}", user);
                        self.auth = AuthState::Idle;
                        self.pipeline.set_source_credentials(&user, &password);
                        self.credentials = Some((user, password));
                    }
                    AuthReply::Aborted => {
                        info!("Authentication aborted");
                        self.auth = AuthState::Aborted;
                    }
                }
                if self.target_state == PipelineState::Playing {
                    self.resume_playback("authentication");
                }
            }
        }
    }

    fn resume_playback(&mut self, after: &str) {
        debug!("Resuming deferred playback after {}", after);
        if let Err(e) = self.play() {
            warn!("Deferred playback failed: {}", e);
        }
    }

    // ===== Message handlers =====

    fn on_state_changed(&mut self, source: &MessageSource, old: PipelineState, new: PipelineState) {
        if !source.is_pipeline() || old == new {
            return;
        }
        debug!("Pipeline state changed from {} to {}", old, new);

        if self.pending_state == Some(new) {
            self.pending_state = None;
        }

        if new <= PipelineState::Paused {
            self.query_timeout();
            self.timers.cancel(TimerKind::Tick);
        } else {
            let now = self.clock.now();
            self.timers
                .schedule_periodic(TimerKind::Tick, now, self.config.tick_interval());
        }

        match (old, new) {
            (PipelineState::Ready, PipelineState::Paused) => {
                self.refresh_stream_length();
                self.update_stream_info();
                self.resolve_capabilities();

                if let Some(notice) = self.classifier.preroll_notice() {
                    if self.deliver_notice(&notice) {
                        self.plugin_install_in_progress = true;
                        self.classifier.clear_missing();
                    }
                } else {
                    self.check_video_decoder();
                }

                if self.target_state == PipelineState::Paused {
                    self.pause();
                }
            }
            (PipelineState::Paused, PipelineState::Ready) => {
                self.stream_info = StreamInfo::default();
                self.tags.clear();
            }
            _ => {}
        }
    }

    fn check_video_decoder(&mut self) {
        if self.config.use_type != UseType::Video {
            return;
        }
        if self.stream_info.video_streams > 0 && !self.stream_info.has_video {
            warn!("Video stream present but no decoder is handling it");
            self.events.emit(PlayerEvent::Error {
                kind: ErrorKind::CodecNotHandled,
                message: VIDEO_DECODER_MISSING.to_string(),
                playback_stopped: false,
                fatal: false,
            });
        }
    }

    fn update_stream_info(&mut self) {
        self.stream_info = self.pipeline.stream_info();
    }

    fn on_async_done(&mut self) {
        self.pending_state = None;
        let now = self.clock.now();
        if let Some(request) = self.seek.complete(now) {
            debug!("Replaying pending seek to {} ms", request.time_ms);
            if let Err(e) = self.execute_seek(request) {
                warn!("Pending seek failed: {}", e);
            }
        }
    }

    fn on_error(&mut self, raw: RawError) {
        if self.ignore_errors {
            debug!("Ignoring error from {}: {}", raw.source.name, raw.message);
            return;
        }
        if self.offer_missing_capabilities(&raw) || self.check_missing_auth(&raw) {
            return;
        }

        error!(
            "Error from {}: {} ({})",
            raw.source.name,
            raw.message,
            raw.debug.as_deref().unwrap_or("no details")
        );
        let record = self.classifier.classify(&raw);

        self.target_state = PipelineState::Null;
        self.request_state(PipelineState::Null);
        self.buffering.reset();
        self.seek.reset();
        self.timers.cancel(TimerKind::Tick);
        self.timers.cancel(TimerKind::DownloadPoll);
        self.timers.cancel(TimerKind::SeekFlush);

        self.events.emit(PlayerEvent::Error {
            fatal: record.fatal(),
            kind: record.kind,
            message: record.message,
            playback_stopped: true,
        });
    }

    /// Hand a missing-capability error to the installer; true when it took it
    fn offer_missing_capabilities(&mut self, raw: &RawError) -> bool {
        let Some(notice) = self.classifier.missing_capability_notice(raw) else {
            return false;
        };
        if !self.deliver_notice(&notice) {
            return false;
        }
        self.stop_preserving_target();
        self.plugin_install_in_progress = true;
        self.classifier.clear_missing();
        true
    }

    fn deliver_notice(&mut self, notice: &MissingCapabilityNotice) -> bool {
        let handle = self.handle();
        let Some(installer) = self.installer.as_mut() else {
            debug!("No installer for {} missing capabilities", notice.details.len());
            return false;
        };
        info!(
            "Requesting install of: {}",
            notice.descriptions.join(", ")
        );
        installer.install(notice, handle)
    }

    fn check_missing_auth(&mut self, raw: &RawError) -> bool {
        if self.config.use_type != UseType::Video {
            return false;
        }
        match self.auth {
            AuthState::Aborted => {
                debug!("Authentication was aborted, reporting error");
                return false;
            }
            AuthState::Asking => {
                debug!("Ignoring error while asking for credentials");
                return true;
            }
            AuthState::Idle => {}
        }

        let unauthorized = raw.source.role == SourceRole::NetworkSource
            && raw.code == ErrorCode::Resource(ResourceError::Read)
            && raw.debug.as_deref().is_some_and(|debug| debug.contains("401"));
        if !unauthorized {
            return false;
        }
        let Some(uri) = self.mrl.clone() else {
            return false;
        };

        let handle = self.handle();
        let Some(operator) = self.mount_operator.as_mut() else {
            return false;
        };
        info!("Asking for credentials for {}", uri);
        self.auth = AuthState::Asking;
        operator.ask_password(
            &AuthRequest {
                uri,
                message: raw.message.clone(),
            },
            handle,
        );
        self.stop_preserving_target();
        true
    }

    fn on_not_mounted(&mut self, uri: String) {
        if self.mount_in_progress {
            debug!("Mount already in progress for {}", uri);
            return;
        }
        self.stop_preserving_target();

        let handle = self.handle();
        match self.mount_operator.as_mut() {
            Some(operator) => {
                info!("Mounting enclosing volume of {}", uri);
                self.mount_in_progress = true;
                operator.mount_enclosing_volume(&uri, handle);
            }
            None => self.report_mount_failure(MOUNT_UNAVAILABLE.to_string()),
        }
    }

    fn report_mount_failure(&mut self, message: String) {
        warn!("Mount failed: {}", message);
        let raw = RawError::new(
            ErrorCode::Resource(ResourceError::OpenRead),
            MessageSource::new("mount", SourceRole::Element),
            message,
        );
        let record = self.classifier.classify(&raw);
        self.events.emit(PlayerEvent::Error {
            kind: record.kind,
            message: record.message,
            playback_stopped: false,
            fatal: false,
        });
    }

    fn on_buffering(&mut self, kind: BufferingKind, percent: u8, cache_path: Option<String>) {
        let current = self.pipeline.current_state();
        let actions =
            self.buffering
                .on_message(kind, percent, cache_path, self.target_state, current);
        self.apply_buffering_actions(actions);
    }

    fn poll_download(&mut self) {
        let query = self.pipeline.query_buffering();
        let actions = self
            .buffering
            .poll(query, self.target_state, self.stream_length);
        self.apply_buffering_actions(actions);
    }

    fn apply_buffering_actions(&mut self, actions: Vec<BufferingAction>) {
        for action in actions {
            match action {
                BufferingAction::Pause => {
                    self.request_state(PipelineState::Paused);
                }
                BufferingAction::Resume => self.resume_playback("buffering"),
                BufferingAction::StartPoll => {
                    let now = self.clock.now();
                    self.timers.schedule_periodic(
                        TimerKind::DownloadPoll,
                        now,
                        self.config.download_poll_interval(),
                    );
                }
                BufferingAction::CancelPoll => {
                    self.timers.cancel(TimerKind::DownloadPoll);
                }
                BufferingAction::ReportBuffering(percent) => {
                    self.events.emit(PlayerEvent::Buffering(percent))
                }
                BufferingAction::ReportDownload(fill) => {
                    self.events.emit(PlayerEvent::DownloadBuffering(fill))
                }
                BufferingAction::PublishCachedFile(path) => {
                    info!("Download complete, cached at {}", path);
                    self.events.emit(PlayerEvent::DownloadFilename(path));
                }
            }
        }
    }

    fn on_tags(&mut self, kind: Option<StreamKind>, tags: &TagList) {
        if !self.tags.merge(kind, tags) {
            return;
        }
        let notify = match self.config.use_type {
            UseType::Video | UseType::Audio => true,
            UseType::Capture => self.tags.best_cover_image().is_some(),
            UseType::Metadata => false,
        };
        if notify {
            self.events.emit(PlayerEvent::GotMetadata);
        }
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        debug!("Releasing player controller");
        self.bus.set_flushing(true);
        self.timers.cancel_all();
        self.pipeline.set_state(PipelineState::Null);
    }
}

fn find_channel(balance: &dyn ColorBalance, property: VideoProperty) -> Option<BalanceChannel> {
    balance
        .channels()
        .into_iter()
        .find(|channel| {
            channel
                .label
                .to_ascii_uppercase()
                .contains(property.channel_label())
        })
}

fn scale_from_channel(value: i32, channel: &BalanceChannel) -> u16 {
    let range = f64::from(channel.max) - f64::from(channel.min);
    if range <= 0.0 {
        return 0;
    }
    let scaled =
        (0.5 + (f64::from(value) - f64::from(channel.min)) * f64::from(VIDEO_PROPERTY_MAX) / range)
            .floor();
    scaled.clamp(0.0, f64::from(VIDEO_PROPERTY_MAX)) as u16
}

fn scale_to_channel(value: u16, channel: &BalanceChannel) -> i32 {
    let range = f64::from(channel.max) - f64::from(channel.min);
    let scaled =
        (0.5 + f64::from(value) * range / f64::from(VIDEO_PROPERTY_MAX) + f64::from(channel.min))
            .floor();
    (scaled as i32).clamp(channel.min, channel.max)
}

fn normalize_location(input: &str) -> Result<Location> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MediaError::InvalidUri(input.to_string()));
    }

    for scheme in ["dvd", "vcd"] {
        if let Some(rest) = input.strip_prefix(&format!("{}://", scheme)) {
            let device = (!rest.is_empty()).then(|| rest.to_string());
            return Ok(Location {
                uri: format!("{}://", scheme),
                device,
            });
        }
    }

    for scheme in ["icy://", "icyx://"] {
        if let Some(rest) = input.strip_prefix(scheme) {
            return Ok(Location {
                uri: format!("http://{}", rest),
                device: None,
            });
        }
    }

    if input.contains("://") {
        return Ok(Location {
            uri: input.to_string(),
            device: None,
        });
    }

    let path = Path::new(input);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| MediaError::InvalidUri(format!("{}: {}", input, e)))?
            .join(path)
    };
    Ok(Location {
        uri: format!("file://{}", absolute.display()),
        device: None,
    })
}
