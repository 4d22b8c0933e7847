//! Buffering policy.
//!
//! Stream buffering holds a playing pipeline in Paused until the buffer is
//! full again. Download buffering caches the whole stream to disk and lets
//! playback start once the remaining download comfortably fits inside the
//! stream's duration. Once download buffering is detected it stays in effect
//! until the media is closed.
//!
//! The monitor only decides; the controller carries out the returned
//! [`BufferingAction`]s.

use crate::pipeline::{BufferingKind, BufferingQuery, PipelineState};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BufferingMode {
    #[default]
    None,
    Stream,
    Download,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferingState {
    pub mode: BufferingMode,
    pub percent: u8,
    /// Estimated milliseconds until the download completes, -1 if unknown
    pub remaining: i64,
    /// On-disk cache, download mode only
    pub cached_file_path: Option<String>,
}

impl Default for BufferingState {
    fn default() -> Self {
        Self {
            mode: BufferingMode::None,
            percent: 0,
            remaining: -1,
            cached_file_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BufferingAction {
    /// Put the pipeline in Paused without touching the target state
    Pause,
    /// Retry `play()`
    Resume,
    StartPoll,
    CancelPoll,
    ReportBuffering(u8),
    ReportDownload(f64),
    PublishCachedFile(String),
}

#[derive(Debug)]
pub struct BufferingMonitor {
    state: BufferingState,
    /// Stream buffering is holding a playing pipeline
    holding: bool,
    margin: f64,
}

impl BufferingMonitor {
    /// `margin` inflates the remaining download time before comparing it
    /// with the stream length
    pub fn new(margin: f64) -> Self {
        Self {
            state: BufferingState::default(),
            holding: false,
            margin,
        }
    }

    pub fn state(&self) -> &BufferingState {
        &self.state
    }

    pub fn mode(&self) -> BufferingMode {
        self.state.mode
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    pub fn is_downloading(&self) -> bool {
        self.state.mode == BufferingMode::Download
    }

    /// Handle a buffering message from the pipeline
    pub fn on_message(
        &mut self,
        kind: BufferingKind,
        percent: u8,
        cache_path: Option<String>,
        target: PipelineState,
        current: PipelineState,
    ) -> Vec<BufferingAction> {
        let percent = percent.min(100);

        if kind == BufferingKind::Download {
            if self.state.mode == BufferingMode::Download {
                if self.state.cached_file_path.is_none() {
                    self.state.cached_file_path = cache_path;
                }
                return Vec::new();
            }

            debug!("Switching to download buffering");
            self.holding = false;
            self.state.mode = BufferingMode::Download;
            self.state.percent = percent;
            self.state.cached_file_path = cache_path;
            return vec![
                BufferingAction::CancelPoll,
                BufferingAction::Pause,
                BufferingAction::StartPoll,
            ];
        }

        if self.state.mode == BufferingMode::Download {
            debug!("Ignoring stream buffering report while download buffering");
            return Vec::new();
        }

        self.state.mode = BufferingMode::Stream;
        self.state.percent = percent;
        let mut actions = vec![BufferingAction::ReportBuffering(percent)];

        if percent >= 100 {
            self.holding = false;
            if target == PipelineState::Playing {
                debug!("Buffering done, resuming playback");
                actions.push(BufferingAction::Resume);
            }
        } else if target == PipelineState::Playing {
            if current != PipelineState::Paused {
                debug!("Buffering at {}%, pausing", percent);
                actions.push(BufferingAction::Pause);
            }
            self.holding = true;
        }

        actions
    }

    /// One download poll; `query` is `None` when the pipeline could not answer
    pub fn poll(
        &mut self,
        query: Option<BufferingQuery>,
        target: PipelineState,
        stream_length: u64,
    ) -> Vec<BufferingAction> {
        let Some(query) = query else {
            return Vec::new();
        };

        let fill = query.range_stop.unwrap_or(-1.0);
        let complete = fill >= 1.0;
        self.state.percent = query.percent.min(100);
        self.state.remaining = if complete { 0 } else { query.remaining };

        let mut actions = vec![BufferingAction::ReportDownload(fill.min(1.0))];

        if self.download_done(stream_length) && target == PipelineState::Playing {
            debug!("Download buffered enough, resuming playback");
            actions.push(BufferingAction::Resume);
        }

        if complete {
            actions.push(BufferingAction::CancelPoll);
            if let Some(path) = self.state.cached_file_path.clone() {
                actions.push(BufferingAction::PublishCachedFile(path));
            }
        }

        actions
    }

    /// Whether enough has been downloaded to start playing
    pub fn download_done(&self, stream_length: u64) -> bool {
        let remaining = self.state.remaining;
        if remaining == 0 {
            return true;
        }
        if stream_length == 0 {
            return false;
        }
        if remaining < 0 {
            return true;
        }
        (remaining as f64) * self.margin < stream_length as f64
    }

    /// Whether `play()` must wait
    pub fn blocks_play(&self, stream_length: u64) -> bool {
        match self.state.mode {
            BufferingMode::None => false,
            BufferingMode::Stream => self.holding || self.state.percent < 100,
            BufferingMode::Download => !self.download_done(stream_length),
        }
    }

    pub fn reset(&mut self) {
        self.state = BufferingState::default();
        self.holding = false;
    }
}
