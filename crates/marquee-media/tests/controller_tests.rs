use crossbeam_channel::Receiver;
use marquee_media::testing::ScriptedPipeline;
use marquee_media::{
    BufferingKind, BufferingMode, ControllerConfig, ErrorCode, ErrorKind, ExecutionContext,
    ManualClock, MediaError, MessageSource, PipelineMessage, PipelineState, PlayerController,
    PlayerEvent, RawError, ResourceError, SourceRole, StreamInfo, UseType,
};
use std::sync::Arc;

struct Harness {
    controller: PlayerController,
    script: ScriptedPipeline,
    clock: Arc<ManualClock>,
    events: Receiver<PlayerEvent>,
}

impl Harness {
    fn new() -> Self {
        let script = ScriptedPipeline::new();
        script.set_duration(Some(60_000));
        let clock = Arc::new(ManualClock::new());
        let mut controller = PlayerController::new(
            Box::new(script.clone()),
            ControllerConfig::with_use_type(UseType::Video),
            ExecutionContext::current(),
        )
        .with_clock(clock.clone());
        let events = controller.subscribe();
        Self {
            controller,
            script,
            clock,
            events,
        }
    }

    fn opened(uri: &str) -> Self {
        let mut harness = Self::new();
        harness.controller.open(uri, None).unwrap();
        harness.controller.dispatch_pending();
        harness
    }

    fn playing(uri: &str) -> Self {
        let mut harness = Self::opened(uri);
        harness.controller.play().unwrap();
        harness.controller.dispatch_pending();
        harness
    }

    fn events(&self) -> Vec<PlayerEvent> {
        self.events.try_iter().collect()
    }

    fn advance(&mut self, ms: u64) -> usize {
        self.clock.advance_ms(ms);
        self.controller.dispatch_pending()
    }

    fn assert_state_invariant(&self) {
        assert!(
            !(self.controller.pipeline_state() == PipelineState::Playing
                && self.controller.target_state() != PipelineState::Playing),
            "pipeline playing while target is {}",
            self.controller.target_state()
        );
    }
}

fn tick_times(events: &[PlayerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::Tick { current_time, .. } => Some(*current_time),
            _ => None,
        })
        .collect()
}

fn count(events: &[PlayerEvent], wanted: &PlayerEvent) -> usize {
    events.iter().filter(|event| *event == wanted).count()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_open_prerolls_to_paused() {
    let mut h = Harness::opened("file:///a.mp4");

    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert_eq!(h.controller.target_state(), PipelineState::Paused);
    assert_eq!(h.controller.mrl(), Some("file:///a.mp4"));
    assert_eq!(h.controller.stream_length(), 60_000);
    assert!(h.controller.is_seekable());
    assert!(h.events().contains(&PlayerEvent::GotMetadata));
}

#[test]
fn test_open_normalizes_local_paths() {
    let mut h = Harness::new();
    h.controller.open("/media/b.ogg", Some("file:///media/b.srt")).unwrap();

    assert_eq!(h.script.uri().as_deref(), Some("file:///media/b.ogg"));
    assert_eq!(h.script.subtitle_uri().as_deref(), Some("file:///media/b.srt"));
    assert_eq!(h.controller.subtitle_uri(), Some("file:///media/b.srt"));
}

#[test]
fn test_open_splits_disc_device() {
    let mut h = Harness::new();
    h.controller.open("dvd:///dev/sr0", None).unwrap();

    assert_eq!(h.controller.mrl(), Some("dvd://"));
    assert_eq!(h.controller.media_device(), Some("/dev/sr0"));
}

#[test]
fn test_open_replaces_previous_media() {
    let mut h = Harness::opened("file:///a.mp4");
    h.events();

    h.controller.open("file:///b.mp4", None).unwrap();
    h.controller.dispatch_pending();

    assert_eq!(h.script.uris(), vec!["file:///a.mp4", "file:///b.mp4"]);
    assert_eq!(h.controller.mrl(), Some("file:///b.mp4"));
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert!(h.events().contains(&PlayerEvent::SeekableChanged(false)));
}

#[test]
fn test_open_rejects_empty_location() {
    let mut h = Harness::new();
    assert!(matches!(
        h.controller.open("", None),
        Err(MediaError::InvalidUri(_))
    ));
    assert_eq!(h.controller.mrl(), None);
}

#[test]
fn test_play_and_pause() {
    let mut h = Harness::playing("file:///a.mp4");
    assert!(h.controller.is_playing());
    assert_eq!(h.controller.target_state(), PipelineState::Playing);

    h.controller.pause();
    h.controller.dispatch_pending();
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert_eq!(h.controller.target_state(), PipelineState::Paused);
}

#[test]
fn test_play_without_media_fails() {
    let mut h = Harness::new();
    assert!(matches!(h.controller.play(), Err(MediaError::NoMedia)));
    assert_eq!(h.controller.pipeline_state(), PipelineState::Null);
}

#[test]
fn test_ticks_while_playing() {
    let mut h = Harness::playing("file:///a.mp4");
    h.events();

    h.script.set_position(1_000);
    h.advance(200);

    let events = h.events();
    assert!(events.iter().any(|event| matches!(
        event,
        PlayerEvent::Tick {
            current_time: 1_000,
            stream_length: 60_000,
            seekable: true,
            ..
        }
    )));
    assert!((h.controller.position() - 1_000.0 / 60_000.0).abs() < 1e-9);
}

#[test]
fn test_ticks_stop_when_paused() {
    let mut h = Harness::playing("file:///a.mp4");
    h.controller.pause();
    h.controller.dispatch_pending();
    h.events();

    h.advance(1_000);
    assert!(tick_times(&h.events()).is_empty());
}

#[test]
fn test_state_invariant_across_operations() {
    let mut h = Harness::new();
    h.controller.open("file:///a.mp4", None).unwrap();
    h.assert_state_invariant();

    let steps: [fn(&mut PlayerController); 6] = [
        |c| {
            c.play().unwrap();
        },
        |c| c.pause(),
        |c| {
            c.play().unwrap();
        },
        |c| c.stop(),
        |c| {
            c.play().unwrap();
        },
        |c| c.close(),
    ];

    for step in steps {
        step(&mut h.controller);
        h.assert_state_invariant();
        h.controller.dispatch_pending();
        h.assert_state_invariant();
        h.advance(250);
        h.assert_state_invariant();
    }
}

#[test]
fn test_close_is_idempotent() {
    let mut h = Harness::playing("file:///a.mp4");
    h.events();

    h.controller.close();
    assert_eq!(h.controller.mrl(), None);
    assert_eq!(h.controller.pipeline_state(), PipelineState::Ready);
    let events = h.events();
    assert!(events.contains(&PlayerEvent::SeekableChanged(false)));
    assert!(events.contains(&PlayerEvent::ChannelsChanged));
    assert_eq!(tick_times(&events), vec![0]);

    h.script.clear_requests();
    h.controller.close();
    h.controller.dispatch_pending();
    assert!(h.events().is_empty());
    assert!(h.script.state_requests().is_empty());
}

#[test]
fn test_close_without_media_is_noop() {
    let mut h = Harness::new();
    h.controller.close();

    assert!(h.events().is_empty());
    assert!(h.script.state_requests().is_empty());
}

#[test]
fn test_stop_twice_is_safe() {
    let mut h = Harness::playing("file:///a.mp4");

    h.controller.stop();
    h.controller.stop();
    h.controller.dispatch_pending();

    assert_eq!(h.controller.pipeline_state(), PipelineState::Ready);
    assert_eq!(h.controller.target_state(), PipelineState::Ready);
    assert_eq!(h.controller.mrl(), Some("file:///a.mp4"));
    assert_eq!(h.controller.current_time(), 0);
}

#[test]
fn test_stopped_pipeline_is_torn_down_after_grace() {
    let mut h = Harness::playing("file:///a.mp4");
    h.controller.stop();

    h.advance(9_999);
    assert_eq!(h.controller.pipeline_state(), PipelineState::Ready);

    h.advance(1);
    assert_eq!(h.controller.pipeline_state(), PipelineState::Null);
}

#[test]
fn test_play_cancels_teardown() {
    let mut h = Harness::playing("file:///a.mp4");
    h.controller.stop();
    h.controller.play().unwrap();
    h.controller.dispatch_pending();
    assert!(h.controller.is_playing());

    h.advance(10_000);
    assert!(h.controller.is_playing());
}

// ============================================================================
// Seeking
// ============================================================================

#[test]
fn test_end_to_end_playback_with_coalesced_seek() {
    let mut h = Harness::playing("file:///a.mp4");
    h.script.clear_requests();
    h.events();

    // Preroll just finished, so both requests fall inside the window
    h.controller.seek_time(5_000, false).unwrap();
    h.clock.advance_ms(50);
    h.controller.seek_time(5_000, false).unwrap();
    assert!(h.script.seeks().is_empty());

    h.advance(100);
    let seeks = h.script.seeks();
    assert_eq!(seeks.len(), 1);
    assert_eq!(seeks[0].start, Some(5_000));
    assert!(seeks[0].rate > 0.0);

    h.script.set_position(5_200);
    h.advance(200);
    h.script.set_position(5_400);
    h.advance(200);

    h.script.post(PipelineMessage::Eos);
    h.controller.dispatch_pending();

    let events = h.events();
    let times = tick_times(&events);
    assert!(times.len() >= 4);
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", times);
    assert_eq!(count(&events, &PlayerEvent::Eos), 1);
    assert_eq!(h.script.seeks().len(), 1);
}

#[test]
fn test_seek_outside_window_executes_and_later_ones_coalesce() {
    let mut h = Harness::opened("file:///a.mp4");
    h.script.clear_requests();
    h.advance(200);

    h.controller.seek_time(1_000, false).unwrap();
    assert_eq!(h.script.seeks().len(), 1);

    h.controller.seek_time(2_000, false).unwrap();
    h.controller.seek_time(3_000, false).unwrap();
    assert_eq!(h.script.seeks().len(), 1);

    h.controller.dispatch_pending();
    let seeks = h.script.seeks();
    assert_eq!(seeks.len(), 2);
    assert_eq!(seeks[0].start, Some(1_000));
    assert_eq!(seeks[1].start, Some(3_000));

    h.advance(500);
    assert_eq!(h.script.seeks().len(), 2);
}

#[test]
fn test_accurate_seek_is_never_deferred() {
    let mut h = Harness::opened("file:///a.mp4");
    h.script.clear_requests();

    h.controller.seek_time(1_000, true).unwrap();
    let seeks = h.script.seeks();
    assert_eq!(seeks.len(), 1);
    assert!(seeks[0].flags.accurate);
}

#[test]
fn test_seek_by_fraction() {
    let mut h = Harness::opened("file:///a.mp4");
    h.script.clear_requests();
    h.advance(200);

    h.controller.seek(0.5).unwrap();
    assert_eq!(h.script.seeks()[0].start, Some(30_000));
}

#[test]
fn test_seek_past_end_schedules_single_eos() {
    let mut h = Harness::playing("file:///a.mp4");
    h.script.clear_requests();
    h.events();

    h.controller.seek_time(70_000, false).unwrap();
    h.controller.seek_time(80_000, false).unwrap();
    h.controller.dispatch_pending();

    assert!(h.script.seeks().is_empty());
    assert_eq!(count(&h.events(), &PlayerEvent::Eos), 1);
}

#[test]
fn test_seek_without_media() {
    let mut h = Harness::new();
    assert!(matches!(
        h.controller.seek_time(1_000, false),
        Err(MediaError::NoMedia)
    ));
}

#[test]
fn test_refused_seek_is_reported() {
    let mut h = Harness::opened("file:///a.mp4");
    h.advance(200);
    h.script.refuse_seeks(true);

    assert!(matches!(
        h.controller.seek_time(1_000, false),
        Err(MediaError::SeekError(_))
    ));
}

#[test]
fn test_step_switches_direction() {
    let mut h = Harness::opened("file:///a.mp4");
    h.script.clear_requests();
    h.script.set_position(2_000);

    h.controller.step(true).unwrap();
    assert!(h.script.seeks().is_empty());

    h.controller.step(false).unwrap();
    let seeks = h.script.seeks();
    assert_eq!(seeks.len(), 1);
    assert!(seeks[0].rate < 0.0);
    assert_eq!(seeks[0].stop, Some(2_000));
    assert_eq!(h.script.steps(), vec![1, 1]);

    h.controller.dispatch_pending();
    h.controller.play().unwrap();
    let seeks = h.script.seeks();
    assert_eq!(seeks.len(), 2);
    assert!(seeks[1].rate > 0.0);
}

#[test]
fn test_seek_fails_when_forward_rate_is_refused() {
    let mut h = Harness::opened("file:///a.mp4");
    h.script.set_position(2_000);
    h.controller.step(false).unwrap();
    h.controller.dispatch_pending();
    h.advance(200);
    h.script.refuse_rate_changes(true);
    h.script.clear_requests();

    assert!(matches!(
        h.controller.seek_time(5_000, false),
        Err(MediaError::DirectionChange)
    ));
    let seeks = h.script.seeks();
    assert_eq!(seeks.len(), 1);
    assert!(seeks[0].rate > 0.0);
    assert!(seeks[0].flags.accurate);
}

#[test]
fn test_play_fails_when_forward_rate_is_refused() {
    let mut h = Harness::opened("file:///a.mp4");
    h.controller.step(false).unwrap();
    h.controller.dispatch_pending();
    h.script.refuse_rate_changes(true);
    h.script.clear_requests();

    assert!(matches!(
        h.controller.play(),
        Err(MediaError::DirectionChange)
    ));
    assert!(!h.script.state_requests().contains(&PipelineState::Playing));
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);

    h.script.refuse_rate_changes(false);
    h.controller.play().unwrap();
    h.controller.dispatch_pending();
    assert_eq!(h.controller.pipeline_state(), PipelineState::Playing);
}

#[test]
fn test_play_while_pause_is_in_flight_targets_playing() {
    let mut h = Harness::playing("file:///a.mp4");
    h.controller.pause();
    assert!(!h.controller.is_playing());

    // the pipeline has not reached Paused yet
    h.script.force_state(PipelineState::Playing);
    h.controller.play().unwrap();

    assert_eq!(h.controller.target_state(), PipelineState::Playing);
    assert!(h.controller.is_playing());
}

#[test]
fn test_is_playing_follows_target() {
    let mut h = Harness::opened("file:///a.mp4");
    assert!(!h.controller.is_playing());

    h.controller.play().unwrap();
    assert!(h.controller.is_playing());

    h.controller.pause();
    h.script.force_state(PipelineState::Playing);
    assert!(!h.controller.is_playing());
}

#[test]
fn test_direct_seek_depends_on_location() {
    let h = Harness::opened("file:///a.mp4");
    assert!(h.controller.can_direct_seek());

    let h = Harness::opened("http://example.com/a.mp4");
    assert!(!h.controller.can_direct_seek());

    let h = Harness::new();
    assert!(!h.controller.can_direct_seek());
}

// ============================================================================
// Buffering
// ============================================================================

#[test]
fn test_stream_buffering_gates_play() {
    let mut h = Harness::opened("http://example.com/a.mp4");
    h.script.post(PipelineMessage::Buffering {
        kind: BufferingKind::Stream,
        percent: 30,
        cache_path: None,
    });
    h.controller.dispatch_pending();

    h.controller.play().unwrap();
    h.controller.dispatch_pending();
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert_eq!(h.controller.target_state(), PipelineState::Playing);

    h.script.post(PipelineMessage::Buffering {
        kind: BufferingKind::Stream,
        percent: 100,
        cache_path: None,
    });
    h.controller.dispatch_pending();
    assert!(h.controller.is_playing());

    let events = h.events();
    assert!(events.contains(&PlayerEvent::Buffering(30)));
    assert!(events.contains(&PlayerEvent::Buffering(100)));
}

#[test]
fn test_buffering_underrun_pauses_and_resumes() {
    let mut h = Harness::playing("http://example.com/a.mp4");

    h.script.post(PipelineMessage::Buffering {
        kind: BufferingKind::Stream,
        percent: 20,
        cache_path: None,
    });
    h.controller.dispatch_pending();
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert_eq!(h.controller.target_state(), PipelineState::Playing);
    h.assert_state_invariant();

    // Still holding, so progress reports are suppressed and play waits
    h.events();
    h.script.post(PipelineMessage::Progress { percent: 40 });
    h.controller.dispatch_pending();
    assert!(!h.events().contains(&PlayerEvent::Buffering(40)));
    h.controller.play().unwrap();
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);

    h.script.post(PipelineMessage::Buffering {
        kind: BufferingKind::Stream,
        percent: 100,
        cache_path: None,
    });
    h.controller.dispatch_pending();
    assert!(h.controller.is_playing());
}

#[test]
fn test_download_buffering_flow() {
    let mut h = Harness::playing("http://example.com/a.mp4");
    assert!(!h.controller.can_direct_seek());

    h.script.post(PipelineMessage::Buffering {
        kind: BufferingKind::Download,
        percent: 0,
        cache_path: Some("/tmp/cache.mp4".to_string()),
    });
    h.controller.dispatch_pending();
    assert_eq!(h.controller.buffering_state().mode, BufferingMode::Download);
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert_eq!(h.controller.target_state(), PipelineState::Playing);
    assert!(h.controller.can_direct_seek());

    // 100 s left of a 60 s stream: keep waiting
    h.script.set_buffering_query(Some(marquee_media::BufferingQuery {
        percent: 50,
        range_stop: Some(0.5),
        remaining: 100_000,
    }));
    h.advance(200);
    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert!(h.events().contains(&PlayerEvent::DownloadBuffering(0.5)));

    h.script.set_buffering_query(Some(marquee_media::BufferingQuery {
        percent: 80,
        range_stop: Some(0.8),
        remaining: 10_000,
    }));
    h.advance(200);
    assert!(h.controller.is_playing());

    h.script.set_buffering_query(Some(marquee_media::BufferingQuery {
        percent: 100,
        range_stop: Some(1.0),
        remaining: 0,
    }));
    h.advance(200);
    let events = h.events();
    assert!(events.contains(&PlayerEvent::DownloadFilename(
        "/tmp/cache.mp4".to_string()
    )));
    assert_eq!(h.controller.download_filename(), Some("/tmp/cache.mp4"));

    h.advance(1_000);
    assert!(!h
        .events()
        .iter()
        .any(|event| matches!(event, PlayerEvent::DownloadBuffering(_))));
}

// ============================================================================
// Pipeline messages
// ============================================================================

#[test]
fn test_warnings_do_not_interrupt_playback() {
    let mut h = Harness::playing("file:///a.mp4");
    h.events();

    h.script.post(PipelineMessage::Warning {
        source: MessageSource::new("videosink", SourceRole::VideoSink),
        message: "Frames are being dropped".to_string(),
        debug: Some("late by 40 ms".to_string()),
    });
    h.script.post(PipelineMessage::Warning {
        source: MessageSource::pipeline(),
        message: "Clock drift".to_string(),
        debug: None,
    });
    h.controller.dispatch_pending();

    assert_eq!(h.controller.pipeline_state(), PipelineState::Playing);
    assert!(!h
        .events()
        .iter()
        .any(|event| matches!(event, PlayerEvent::Error { .. })));
}

#[test]
fn test_error_while_playing_stops_pipeline() {
    let mut h = Harness::playing("file:///a.mp4");
    h.events();

    h.script.post(PipelineMessage::Error(RawError::new(
        ErrorCode::Resource(ResourceError::NotFound),
        MessageSource::new("filesrc", SourceRole::Element),
        "gone",
    )));
    h.controller.dispatch_pending();

    assert_eq!(h.controller.target_state(), PipelineState::Null);
    assert_eq!(h.controller.pipeline_state(), PipelineState::Null);
    let errors: Vec<_> = h
        .events()
        .into_iter()
        .filter(|event| matches!(event, PlayerEvent::Error { .. }))
        .collect();
    assert_eq!(
        errors,
        vec![PlayerEvent::Error {
            kind: ErrorKind::FileNotFound,
            message: "Location not found.".to_string(),
            playback_stopped: true,
            fatal: true,
        }]
    );
}

#[test]
fn test_missing_video_decoder_is_reported() {
    let mut h = Harness::new();
    h.script.set_stream_info(StreamInfo {
        video_streams: 1,
        audio_streams: 1,
        has_audio: true,
        ..StreamInfo::default()
    });
    h.controller.open("file:///a.mkv", None).unwrap();
    h.controller.dispatch_pending();

    assert_eq!(h.controller.pipeline_state(), PipelineState::Paused);
    assert!(h.events().iter().any(|event| matches!(
        event,
        PlayerEvent::Error {
            kind: ErrorKind::CodecNotHandled,
            playback_stopped: false,
            fatal: false,
            ..
        }
    )));
}

#[test]
fn test_redirect_is_forwarded() {
    let mut h = Harness::opened("http://example.com/a.m3u");
    h.script.post(PipelineMessage::Redirect {
        uri: "http://example.com/b.mp3".to_string(),
    });
    h.controller.dispatch_pending();

    assert!(h.controller.got_redirect());
    assert!(h
        .events()
        .contains(&PlayerEvent::Redirect("http://example.com/b.mp3".to_string())));
}

#[test]
fn test_duration_change_requeries_length() {
    let mut h = Harness::opened("file:///a.mp4");
    h.script.set_duration(Some(90_000));
    h.script.post(PipelineMessage::DurationChanged);
    h.controller.dispatch_pending();

    assert_eq!(h.controller.stream_length(), 90_000);
}

#[test]
fn test_menu_makes_stream_unseekable() {
    let mut h = Harness::opened("dvd:///dev/sr0");
    assert!(h.controller.is_seekable());
    h.events();

    h.script
        .post(PipelineMessage::NavigationCommandsChanged { in_menu: true });
    h.controller.dispatch_pending();

    assert!(h.controller.has_menus());
    assert!(!h.controller.is_seekable());
    assert!(h.events().contains(&PlayerEvent::SeekableChanged(false)));
}

#[test]
fn test_stream_without_duration_is_live() {
    let mut h = Harness::new();
    h.script.set_duration(None);
    h.controller.open("http://radio.example/stream", None).unwrap();
    h.controller.dispatch_pending();

    assert!(h.controller.is_live());
    assert!(!h.controller.is_seekable());
    assert!(h.events().iter().any(|event| matches!(
        event,
        PlayerEvent::Tick {
            stream_length: 0,
            seekable: false,
            ..
        }
    )));
}

#[test]
fn test_stream_change_refreshes_info() {
    let mut h = Harness::opened("file:///a.mp4");
    h.events();

    h.script.set_stream_info(StreamInfo {
        audio_streams: 2,
        has_audio: true,
        ..StreamInfo::default()
    });
    h.script.post(PipelineMessage::StreamChanged);
    h.controller.dispatch_pending();

    assert_eq!(h.controller.stream_info().audio_streams, 2);
    let events = h.events();
    assert!(events.contains(&PlayerEvent::GotMetadata));
    assert!(events.contains(&PlayerEvent::ChannelsChanged));
}

#[test]
fn test_volume_is_clamped() {
    let mut h = Harness::new();
    h.controller.set_volume(1.5);
    assert_eq!(h.controller.volume(), 1.0);
    assert_eq!(h.script.volume(), 1.0);

    h.controller.set_volume(-0.5);
    assert_eq!(h.controller.volume(), 0.0);

    let events = h.events();
    assert!(events.contains(&PlayerEvent::VolumeChanged(1.0)));
    assert!(events.contains(&PlayerEvent::VolumeChanged(0.0)));
}

#[test]
fn test_iterate_waits_for_timers() {
    let mut h = Harness::playing("file:///a.mp4");
    h.events();

    // Nothing queued and no timer due on the manual clock: returns after the timeout
    let handled = h
        .controller
        .iterate(std::time::Duration::from_millis(5));
    assert_eq!(handled, 0);

    h.clock.advance_ms(200);
    let handled = h
        .controller
        .iterate(std::time::Duration::from_millis(5));
    assert!(handled > 0);
    assert!(!tick_times(&h.events()).is_empty());
}
