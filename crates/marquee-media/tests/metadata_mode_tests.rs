use marquee_media::tags::names;
use marquee_media::testing::{PrerollBehavior, ScriptedPipeline};
use marquee_media::{
    ControllerConfig, ErrorCode, ErrorKind, ExecutionContext, Image, ImageKind, ManualClock,
    MediaError, MessageSource, MetadataKind, PipelineMessage, PipelineState, PlayerController,
    PlayerEvent, RawError, ResourceError, SourceRole, StreamInfo, StreamKind, TagList, TagValue,
    UseType,
};
use std::sync::Arc;

fn controller(script: &ScriptedPipeline, use_type: UseType) -> PlayerController {
    PlayerController::new(
        Box::new(script.clone()),
        ControllerConfig::with_use_type(use_type),
        ExecutionContext::current(),
    )
    .with_clock(Arc::new(ManualClock::new()))
}

fn title(text: &str) -> PipelineMessage {
    PipelineMessage::Tag {
        kind: None,
        tags: TagList::new().with(names::TITLE, TagValue::Text(text.to_string())),
    }
}

#[test]
fn test_metadata_open_blocks_until_preroll() {
    let script = ScriptedPipeline::new();
    script.set_duration(Some(125_000));
    script.set_stream_info(StreamInfo {
        audio_streams: 1,
        has_audio: true,
        ..StreamInfo::default()
    });
    script.set_preroll_messages(vec![
        title("Overture"),
        PipelineMessage::Tag {
            kind: Some(StreamKind::Audio),
            tags: TagList::new().with(names::AUDIO_CODEC, TagValue::Text("Vorbis".to_string())),
        },
    ]);
    let mut controller = controller(&script, UseType::Metadata);
    let events = controller.subscribe();

    controller.open("file:///music/overture.ogg", None).unwrap();

    assert_eq!(controller.pipeline_state(), PipelineState::Paused);
    let events: Vec<_> = events.try_iter().collect();
    assert_eq!(
        events
            .iter()
            .filter(|event| **event == PlayerEvent::GotMetadata)
            .count(),
        1
    );
    assert!(events.contains(&PlayerEvent::ChannelsChanged));

    assert_eq!(
        controller.metadata(MetadataKind::Title).as_text(),
        Some("Overture")
    );
    assert_eq!(
        controller.metadata(MetadataKind::AudioCodec).as_text(),
        Some("Vorbis")
    );
    assert_eq!(controller.metadata(MetadataKind::Duration).as_int(), Some(125));
    assert_eq!(controller.metadata(MetadataKind::HasAudio).as_bool(), Some(true));
}

#[test]
fn test_metadata_open_failure_is_classified() {
    let script = ScriptedPipeline::new();
    script.set_preroll(PrerollBehavior::Fail(RawError::new(
        ErrorCode::Resource(ResourceError::NotFound),
        MessageSource::new("filesrc", SourceRole::Element),
        "No such file",
    )));
    let mut controller = controller(&script, UseType::Metadata);
    let events = controller.subscribe();

    let result = controller.open("file:///missing.ogg", None);
    match result {
        Err(MediaError::Playback(record)) => {
            assert_eq!(record.kind, ErrorKind::FileNotFound);
            assert!(record.fatal());
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(controller.mrl(), None);

    // Metadata consumers are always told when extraction finished
    assert!(events.try_iter().any(|event| event == PlayerEvent::GotMetadata));

    controller.dispatch_pending();
    assert!(!events
        .try_iter()
        .any(|event| matches!(event, PlayerEvent::Error { .. })));
}

#[test]
fn test_metadata_open_of_empty_stream() {
    let script = ScriptedPipeline::new();
    script.set_preroll(PrerollBehavior::EndOfStream);
    let mut controller = controller(&script, UseType::Metadata);

    match controller.open("file:///empty.ogg", None) {
        Err(MediaError::Playback(record)) => {
            assert_eq!(record.kind, ErrorKind::EmptyStream);
            assert_eq!(record.message, "Media file could not be played.");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_metadata_controller_never_plays() {
    let script = ScriptedPipeline::new();
    script.set_duration(Some(10_000));
    let mut controller = controller(&script, UseType::Metadata);
    controller.open("file:///clip.ogg", None).unwrap();

    controller.play().unwrap();
    controller.dispatch_pending();
    assert_eq!(controller.pipeline_state(), PipelineState::Paused);
}

#[test]
fn test_capture_reports_metadata_once_cover_arrives() {
    let script = ScriptedPipeline::new();
    script.set_duration(Some(10_000));
    let mut controller = controller(&script, UseType::Capture);
    let events = controller.subscribe();

    controller.open("file:///album/track.flac", None).unwrap();
    controller.dispatch_pending();
    events.try_iter().for_each(drop);

    script.post(title("Track"));
    controller.dispatch_pending();
    assert!(!events.try_iter().any(|event| event == PlayerEvent::GotMetadata));

    let cover = Image::new(ImageKind::FrontCover, "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
    script.post(PipelineMessage::Tag {
        kind: None,
        tags: TagList::new().with(names::IMAGE, TagValue::Image(cover.clone())),
    });
    controller.dispatch_pending();
    assert!(events.try_iter().any(|event| event == PlayerEvent::GotMetadata));

    assert_eq!(
        controller.metadata(MetadataKind::CoverArt),
        marquee_media::MetadataValue::Image(Some(cover))
    );
}

#[test]
fn test_interactive_tags_notify_each_change() {
    let script = ScriptedPipeline::new();
    script.set_duration(Some(10_000));
    let mut controller = controller(&script, UseType::Audio);
    let events = controller.subscribe();
    controller.open("http://radio.example/stream", None).unwrap();
    controller.dispatch_pending();
    events.try_iter().for_each(drop);

    script.post(title("First song"));
    script.post(title("First song"));
    script.post(title("Second song"));
    controller.dispatch_pending();

    let notifications = events
        .try_iter()
        .filter(|event| *event == PlayerEvent::GotMetadata)
        .count();
    assert_eq!(notifications, 2);
    assert_eq!(
        controller.metadata(MetadataKind::Title).as_text(),
        Some("Second song")
    );
}
