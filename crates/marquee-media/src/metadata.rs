//! Typed metadata queries over tags and stream composition.

use crate::pipeline::StreamInfo;
use crate::tags::{names, Image, StreamKind, TagAggregator, TagSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Title,
    Artist,
    Year,
    Comment,
    Album,
    Duration,
    TrackNumber,
    CoverArt,
    HasVideo,
    DimensionX,
    DimensionY,
    VideoBitrate,
    VideoCodec,
    Fps,
    HasAudio,
    AudioBitrate,
    AudioCodec,
    AudioSampleRate,
    AudioChannels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(Option<String>),
    Int(i64),
    Bool(bool),
    Image(Option<Image>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => text.as_deref(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

/// Everything a metadata lookup reads
pub(crate) struct MetadataSource<'a> {
    pub tags: &'a TagAggregator,
    pub info: &'a StreamInfo,
    pub stream_length_ms: u64,
    /// Metadata extraction mode reports codecs it cannot decode
    pub extracting: bool,
}

impl MetadataSource<'_> {
    pub fn resolve(&self, kind: MetadataKind) -> MetadataValue {
        let global = self.tags.global();
        match kind {
            MetadataKind::Title => text(global.string(names::TITLE)),
            MetadataKind::Artist => text(global.string(names::ARTIST)),
            MetadataKind::Comment => text(global.string(names::COMMENT)),
            MetadataKind::Album => text(global.string(names::ALBUM)),
            MetadataKind::Year => {
                MetadataValue::Text(global.year(names::DATE).map(|year| year.to_string()))
            }
            MetadataKind::VideoCodec => {
                text(self.codec(StreamKind::Video, names::VIDEO_CODEC))
            }
            MetadataKind::AudioCodec => {
                text(self.codec(StreamKind::Audio, names::AUDIO_CODEC))
            }
            MetadataKind::AudioChannels => MetadataValue::Text(self.channel_layout()),
            MetadataKind::Duration => MetadataValue::Int((self.stream_length_ms / 1000) as i64),
            MetadataKind::TrackNumber => {
                MetadataValue::Int(global.uint(names::TRACK_NUMBER).unwrap_or(0) as i64)
            }
            MetadataKind::DimensionX => {
                MetadataValue::Int(self.info.video.map_or(0, |v| v.width as i64))
            }
            MetadataKind::DimensionY => {
                MetadataValue::Int(self.info.video.map_or(0, |v| v.height as i64))
            }
            MetadataKind::Fps => MetadataValue::Int(self.fps()),
            MetadataKind::VideoBitrate => MetadataValue::Int(self.bitrate(StreamKind::Video)),
            MetadataKind::AudioBitrate => MetadataValue::Int(self.bitrate(StreamKind::Audio)),
            MetadataKind::AudioSampleRate => {
                MetadataValue::Int(self.info.audio.map_or(0, |a| a.sample_rate as i64))
            }
            MetadataKind::HasVideo => MetadataValue::Bool(
                self.info.has_video || (self.extracting && global.contains(names::VIDEO_CODEC)),
            ),
            MetadataKind::HasAudio => MetadataValue::Bool(
                self.info.has_audio || (self.extracting && global.contains(names::AUDIO_CODEC)),
            ),
            MetadataKind::CoverArt => MetadataValue::Image(self.tags.best_cover_image().cloned()),
        }
    }

    fn codec(&self, kind: StreamKind, global_tag: &str) -> Option<&str> {
        self.tags
            .snapshot(kind)
            .and_then(|snapshot| snapshot.string(names::CODEC))
            .or_else(|| self.tags.global().string(global_tag))
    }

    fn channel_layout(&self) -> Option<String> {
        let audio = self.info.audio?;
        let layout = match audio.channels {
            0 => return None,
            n if n > 2 && audio.has_lfe => format!("Surround {}.1", n - 1),
            1 => "Mono".to_string(),
            2 => "Stereo".to_string(),
            n => n.to_string(),
        };
        Some(layout)
    }

    fn fps(&self) -> i64 {
        match self.info.video {
            Some(video) if video.fps_d > 0 => {
                let (n, d) = (u64::from(video.fps_n), u64::from(video.fps_d));
                ((n + d / 2) / d) as i64
            }
            _ => 0,
        }
    }

    fn bitrate(&self, kind: StreamKind) -> i64 {
        self.tags
            .snapshot(kind)
            .and_then(|snapshot: &TagSnapshot| {
                snapshot
                    .uint(names::BITRATE)
                    .or_else(|| snapshot.uint(names::NOMINAL_BITRATE))
            })
            .map_or(0, |bits| (bits / 1000) as i64)
    }
}

/// Text values never contain line feeds
fn text(value: Option<&str>) -> MetadataValue {
    MetadataValue::Text(value.map(|s| s.replace('\n', " ")))
}
