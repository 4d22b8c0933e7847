//! Deterministic in-memory backend.
//!
//! [`ScriptedPipeline`] behaves like a well-mannered pipeline: state changes
//! walk through every intermediate state and post a message per step,
//! preroll completes with an async-done, seeks are recorded and acknowledged.
//! Clones share state, so a test keeps one clone to inspect calls and inject
//! messages while the controller owns the other.

use crate::bus::Bus;
use crate::capabilities::{
    BalanceChannel, BalanceType, ColorBalance, Element, Navigation, NavigationCommand,
    SinkTopology, SurfaceBinding, WindowHandle,
};
use crate::pipeline::{
    BufferingQuery, MediaPipeline, MessageSource, PipelineMessage, PipelineState, RawError,
    SeekCommand, StateChangeReturn, StreamInfo,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// How the scripted pipeline reacts to a Ready to Paused request
#[derive(Debug, Clone, PartialEq)]
pub enum PrerollBehavior {
    /// Reach Paused and post async-done
    Succeed,
    /// Stay in Ready and post the error
    Fail(RawError),
    /// Stay in Ready and post end-of-stream
    EndOfStream,
    /// Stay in Ready; the test posts messages itself
    Manual,
}

struct ScriptState {
    bus: Option<Bus>,
    state: PipelineState,
    uri: Option<String>,
    subtitle_uri: Option<String>,
    duration: Option<u64>,
    position: u64,
    seekable: Option<bool>,
    buffering: Option<BufferingQuery>,
    stream_info: StreamInfo,
    topology: SinkTopology,
    preroll: PrerollBehavior,
    preroll_messages: Vec<PipelineMessage>,
    live: bool,
    refuse_seeks: bool,
    refuse_rate_changes: bool,
    rate: f64,
    volume: f64,
    connection_speed: Option<u32>,
    audio_channels: Option<u32>,
    credentials: Option<(String, String)>,
    seeks: Vec<SeekCommand>,
    steps: Vec<u64>,
    state_requests: Vec<PipelineState>,
    uris: Vec<String>,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            bus: None,
            state: PipelineState::Null,
            uri: None,
            subtitle_uri: None,
            duration: None,
            position: 0,
            seekable: None,
            buffering: None,
            stream_info: StreamInfo::default(),
            topology: SinkTopology::default(),
            preroll: PrerollBehavior::Succeed,
            preroll_messages: Vec::new(),
            live: false,
            refuse_seeks: false,
            refuse_rate_changes: false,
            rate: 1.0,
            volume: 1.0,
            connection_speed: None,
            audio_channels: None,
            credentials: None,
            seeks: Vec::new(),
            steps: Vec::new(),
            state_requests: Vec::new(),
            uris: Vec::new(),
        }
    }
}

impl ScriptState {
    fn post(&self, message: PipelineMessage) {
        if let Some(bus) = &self.bus {
            bus.post(message);
        }
    }

    fn post_transition(&self, old: PipelineState, new: PipelineState) {
        self.post(PipelineMessage::StateChanged {
            source: MessageSource::pipeline(),
            old,
            new,
        });
    }
}

#[derive(Clone, Default)]
pub struct ScriptedPipeline {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a message as if the pipeline thread had
    pub fn post(&self, message: PipelineMessage) {
        self.inner.lock().post(message);
    }

    pub fn bus(&self) -> Option<Bus> {
        self.inner.lock().bus.clone()
    }

    pub fn set_duration(&self, duration_ms: Option<u64>) {
        self.inner.lock().duration = duration_ms;
    }

    pub fn set_position(&self, position_ms: u64) {
        self.inner.lock().position = position_ms;
    }

    pub fn set_seekable(&self, seekable: Option<bool>) {
        self.inner.lock().seekable = seekable;
    }

    pub fn set_buffering_query(&self, query: Option<BufferingQuery>) {
        self.inner.lock().buffering = query;
    }

    pub fn set_stream_info(&self, info: StreamInfo) {
        self.inner.lock().stream_info = info;
    }

    pub fn set_topology(&self, topology: SinkTopology) {
        self.inner.lock().topology = topology;
    }

    pub fn set_preroll(&self, behavior: PrerollBehavior) {
        self.inner.lock().preroll = behavior;
    }

    /// Messages posted on every preroll attempt, ahead of its outcome
    pub fn set_preroll_messages(&self, messages: Vec<PipelineMessage>) {
        self.inner.lock().preroll_messages = messages;
    }

    /// Live pipelines answer a Paused request with no-preroll
    pub fn set_live(&self, live: bool) {
        self.inner.lock().live = live;
    }

    pub fn refuse_seeks(&self, refuse: bool) {
        self.inner.lock().refuse_seeks = refuse;
    }

    /// Refuse seeks that change the playback rate, accept the rest
    pub fn refuse_rate_changes(&self, refuse: bool) {
        self.inner.lock().refuse_rate_changes = refuse;
    }

    /// Force the state without posting anything
    pub fn force_state(&self, state: PipelineState) {
        self.inner.lock().state = state;
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock().state
    }

    pub fn uri(&self) -> Option<String> {
        self.inner.lock().uri.clone()
    }

    pub fn subtitle_uri(&self) -> Option<String> {
        self.inner.lock().subtitle_uri.clone()
    }

    /// Every URI ever set, in order
    pub fn uris(&self) -> Vec<String> {
        self.inner.lock().uris.clone()
    }

    pub fn seeks(&self) -> Vec<SeekCommand> {
        self.inner.lock().seeks.clone()
    }

    pub fn steps(&self) -> Vec<u64> {
        self.inner.lock().steps.clone()
    }

    pub fn state_requests(&self) -> Vec<PipelineState> {
        self.inner.lock().state_requests.clone()
    }

    pub fn clear_requests(&self) {
        let mut inner = self.inner.lock();
        inner.seeks.clear();
        inner.steps.clear();
        inner.state_requests.clear();
    }

    pub fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    pub fn connection_speed(&self) -> Option<u32> {
        self.inner.lock().connection_speed
    }

    pub fn audio_channels(&self) -> Option<u32> {
        self.inner.lock().audio_channels
    }

    pub fn credentials(&self) -> Option<(String, String)> {
        self.inner.lock().credentials.clone()
    }
}

fn step_towards(from: PipelineState, to: PipelineState) -> PipelineState {
    use PipelineState::*;
    let order = [Null, Ready, Paused, Playing];
    let index = order.iter().position(|s| *s == from).unwrap_or(0);
    if to > from {
        order[index + 1]
    } else {
        order[index - 1]
    }
}

impl MediaPipeline for ScriptedPipeline {
    fn attach_bus(&mut self, bus: Bus) {
        self.inner.lock().bus = Some(bus);
    }

    fn set_uri(&mut self, uri: &str, subtitle_uri: Option<&str>) {
        let mut inner = self.inner.lock();
        inner.uri = Some(uri.to_string());
        inner.subtitle_uri = subtitle_uri.map(str::to_string);
        inner.uris.push(uri.to_string());
    }

    fn set_state(&mut self, target: PipelineState) -> StateChangeReturn {
        let mut inner = self.inner.lock();
        inner.state_requests.push(target);

        let mut result = StateChangeReturn::Success;
        while inner.state != target {
            let old = inner.state;
            let new = step_towards(old, target);

            if old == PipelineState::Ready && new == PipelineState::Paused {
                for message in inner.preroll_messages.clone() {
                    inner.post(message);
                }
                match inner.preroll.clone() {
                    PrerollBehavior::Succeed => {}
                    PrerollBehavior::Fail(error) => {
                        inner.post(PipelineMessage::Error(error));
                        return StateChangeReturn::Async;
                    }
                    PrerollBehavior::EndOfStream => {
                        inner.post(PipelineMessage::Eos);
                        return StateChangeReturn::Async;
                    }
                    PrerollBehavior::Manual => return StateChangeReturn::Async,
                }
                inner.state = new;
                inner.post_transition(old, new);
                if inner.live {
                    result = StateChangeReturn::NoPreroll;
                } else {
                    inner.post(PipelineMessage::AsyncDone);
                    result = StateChangeReturn::Async;
                }
                continue;
            }

            inner.state = new;
            inner.post_transition(old, new);
        }
        result
    }

    fn current_state(&self) -> PipelineState {
        self.inner.lock().state
    }

    fn query_duration(&self) -> Option<u64> {
        let inner = self.inner.lock();
        if inner.state >= PipelineState::Paused {
            inner.duration
        } else {
            None
        }
    }

    fn query_position(&self) -> Option<u64> {
        let inner = self.inner.lock();
        (inner.state >= PipelineState::Paused).then_some(inner.position)
    }

    fn query_seekable(&self) -> Option<bool> {
        self.inner.lock().seekable
    }

    fn query_buffering(&self) -> Option<BufferingQuery> {
        self.inner.lock().buffering
    }

    fn seek(&mut self, command: SeekCommand) -> bool {
        let mut inner = self.inner.lock();
        inner.seeks.push(command);
        if inner.refuse_seeks {
            return false;
        }
        if command.rate != inner.rate {
            if inner.refuse_rate_changes {
                return false;
            }
            inner.rate = command.rate;
        }
        if let Some(start) = command.start {
            if command.rate > 0.0 {
                inner.position = start;
            }
        }
        if inner.state >= PipelineState::Paused {
            inner.post(PipelineMessage::AsyncDone);
        }
        true
    }

    fn step(&mut self, frames: u64) -> bool {
        let mut inner = self.inner.lock();
        inner.steps.push(frames);
        inner.state >= PipelineState::Paused
    }

    fn set_volume(&mut self, volume: f64) {
        self.inner.lock().volume = volume;
    }

    fn set_connection_speed(&mut self, kbps: u32) {
        self.inner.lock().connection_speed = Some(kbps);
    }

    fn set_audio_channels(&mut self, channels: u32) {
        self.inner.lock().audio_channels = Some(channels);
    }

    fn set_source_credentials(&mut self, user: &str, password: &str) {
        self.inner.lock().credentials = Some((user.to_string(), password.to_string()));
    }

    fn stream_info(&self) -> StreamInfo {
        self.inner.lock().stream_info.clone()
    }

    fn topology(&self) -> SinkTopology {
        self.inner.lock().topology.clone()
    }
}

/// Surface binding that remembers the last bound window
#[derive(Debug, Default)]
pub struct RecordingSurface {
    bound: Mutex<Option<WindowHandle>>,
}

impl RecordingSurface {
    pub fn bound(&self) -> Option<WindowHandle> {
        *self.bound.lock()
    }
}

impl SurfaceBinding for RecordingSurface {
    fn bind_window(&self, handle: WindowHandle) {
        *self.bound.lock() = Some(handle);
    }
}

#[derive(Debug, Default)]
pub struct TestNavigation {
    commands: Mutex<Vec<NavigationCommand>>,
}

impl TestNavigation {
    pub fn commands(&self) -> Vec<NavigationCommand> {
        self.commands.lock().clone()
    }
}

impl Navigation for TestNavigation {
    fn send_command(&self, command: NavigationCommand) {
        self.commands.lock().push(command);
    }
}

/// Color balance with the four usual channels, each ranging -1000..=1000
#[derive(Debug)]
pub struct TestColorBalance {
    balance_type: BalanceType,
    channels: Vec<BalanceChannel>,
    values: Mutex<HashMap<String, i32>>,
}

impl TestColorBalance {
    pub fn new(balance_type: BalanceType) -> Self {
        let channels: Vec<BalanceChannel> = ["BRIGHTNESS", "CONTRAST", "SATURATION", "HUE"]
            .iter()
            .map(|label| BalanceChannel {
                label: label.to_string(),
                min: -1000,
                max: 1000,
            })
            .collect();
        let values = channels.iter().map(|c| (c.label.clone(), 0)).collect();
        Self {
            balance_type,
            channels,
            values: Mutex::new(values),
        }
    }
}

impl ColorBalance for TestColorBalance {
    fn balance_type(&self) -> BalanceType {
        self.balance_type
    }

    fn channels(&self) -> Vec<BalanceChannel> {
        self.channels.clone()
    }

    fn value(&self, channel: &str) -> Option<i32> {
        self.values.lock().get(channel).copied()
    }

    fn set_value(&self, channel: &str, value: i32) {
        self.values.lock().insert(channel.to_string(), value);
    }
}

/// Element exposing whichever capabilities it was built with
pub struct TestElement {
    name: String,
    surface: Option<Arc<dyn SurfaceBinding>>,
    navigation: Option<Arc<dyn Navigation>>,
    color_balance: Option<Arc<dyn ColorBalance>>,
}

impl TestElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surface: None,
            navigation: None,
            color_balance: None,
        }
    }

    pub fn with_surface(mut self, surface: Arc<dyn SurfaceBinding>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_navigation(mut self, navigation: Arc<dyn Navigation>) -> Self {
        self.navigation = Some(navigation);
        self
    }

    pub fn with_color_balance(mut self, balance: Arc<dyn ColorBalance>) -> Self {
        self.color_balance = Some(balance);
        self
    }
}

impl Element for TestElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn surface_binding(&self) -> Option<Arc<dyn SurfaceBinding>> {
        self.surface.clone()
    }

    fn navigation(&self) -> Option<Arc<dyn Navigation>> {
        self.navigation.clone()
    }

    fn color_balance(&self) -> Option<Arc<dyn ColorBalance>> {
        self.color_balance.clone()
    }
}
