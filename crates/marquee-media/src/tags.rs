//! Stream tag aggregation.
//!
//! Tags arrive in batches while a stream is open. Each batch is merged into
//! the global snapshot and, when the posting stream's kind is known, into that
//! kind's snapshot. A name present in a batch replaces every value previously
//! stored under that name, so radio streams that change their title mid-stream
//! never show stale values and re-merging a batch is a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Well-known tag names
pub mod names {
    pub const TITLE: &str = "title";
    pub const ARTIST: &str = "artist";
    pub const ALBUM: &str = "album";
    pub const DATE: &str = "date";
    pub const COMMENT: &str = "comment";
    pub const TRACK_NUMBER: &str = "track-number";
    pub const CODEC: &str = "codec";
    pub const VIDEO_CODEC: &str = "video-codec";
    pub const AUDIO_CODEC: &str = "audio-codec";
    pub const BITRATE: &str = "bitrate";
    pub const NOMINAL_BITRATE: &str = "nominal-bitrate";
    pub const IMAGE: &str = "image";
    pub const PREVIEW_IMAGE: &str = "preview-image";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Undefined,
    FrontCover,
    BackCover,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub kind: ImageKind,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl Image {
    pub fn new(kind: ImageKind, mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            kind,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    UInt(u64),
    Double(f64),
    Date { year: i32, month: u8, day: u8 },
    Image(Image),
}

/// One batch of tags as posted by the pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagList {
    entries: Vec<(String, TagValue)>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: TagValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: TagValue) {
        self.entries.push((name.into(), value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, TagValue)> for TagList {
    fn from_iter<I: IntoIterator<Item = (S, TagValue)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

/// Merged view of every batch seen so far
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagSnapshot {
    tags: BTreeMap<String, Vec<TagValue>>,
}

impl TagSnapshot {
    /// Merge a batch, returning whether anything changed
    pub fn merge(&mut self, batch: &TagList) -> bool {
        let mut grouped: BTreeMap<&str, Vec<TagValue>> = BTreeMap::new();
        for (name, value) in batch.iter() {
            grouped.entry(name).or_default().push(value.clone());
        }

        let mut changed = false;
        for (name, values) in grouped {
            if self.tags.get(name) != Some(&values) {
                self.tags.insert(name.to_string(), values);
                changed = true;
            }
        }
        changed
    }

    pub fn get(&self, name: &str) -> Option<&[TagValue]> {
        self.tags.get(name).map(Vec::as_slice)
    }

    pub fn first(&self, name: &str) -> Option<&TagValue> {
        self.get(name).and_then(|values| values.first())
    }

    /// First text value stored under `name`
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name)?.iter().find_map(|value| match value {
            TagValue::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        self.get(name)?.iter().find_map(|value| match value {
            TagValue::UInt(v) => Some(*v),
            _ => None,
        })
    }

    pub fn year(&self, name: &str) -> Option<i32> {
        self.get(name)?.iter().find_map(|value| match value {
            TagValue::Date { year, .. } => Some(*year),
            _ => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

/// Global and per-kind tag caches
#[derive(Debug, Default)]
pub struct TagAggregator {
    global: TagSnapshot,
    per_kind: BTreeMap<StreamKind, TagSnapshot>,
}

impl TagAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch; `kind` is `None` when the posting stream is unknown
    pub fn merge(&mut self, kind: Option<StreamKind>, tags: &TagList) -> bool {
        let mut changed = self.global.merge(tags);
        if let Some(kind) = kind {
            changed |= self.per_kind.entry(kind).or_default().merge(tags);
        }
        changed
    }

    pub fn snapshot(&self, kind: StreamKind) -> Option<&TagSnapshot> {
        self.per_kind.get(&kind)
    }

    pub fn global(&self) -> &TagSnapshot {
        &self.global
    }

    /// Front cover first, then the first untyped image, then a preview image
    pub fn best_cover_image(&self) -> Option<&Image> {
        let mut untyped = None;
        for value in self.global.get(names::IMAGE).unwrap_or_default() {
            if let TagValue::Image(image) = value {
                match image.kind {
                    ImageKind::FrontCover => return Some(image),
                    ImageKind::Undefined if untyped.is_none() => untyped = Some(image),
                    _ => {}
                }
            }
        }

        untyped.or_else(|| {
            self.global
                .get(names::PREVIEW_IMAGE)
                .unwrap_or_default()
                .iter()
                .find_map(|value| match value {
                    TagValue::Image(image) => Some(image),
                    _ => None,
                })
        })
    }

    pub fn clear(&mut self) {
        self.global.clear();
        self.per_kind.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(value: &str) -> TagValue {
        TagValue::Text(value.to_string())
    }

    fn image(kind: ImageKind, byte: u8) -> TagValue {
        TagValue::Image(Image::new(kind, "image/png", vec![byte]))
    }

    #[test]
    fn test_merge_replaces_on_collision() {
        let mut tags = TagAggregator::new();
        tags.merge(None, &TagList::new().with(names::TITLE, text("First")));
        tags.merge(
            None,
            &TagList::new()
                .with(names::TITLE, text("Second"))
                .with(names::ARTIST, text("Someone")),
        );

        assert_eq!(tags.global().get(names::TITLE), Some(&[text("Second")][..]));
        assert_eq!(tags.global().string(names::ARTIST), Some("Someone"));
    }

    #[test]
    fn test_merge_accumulates_values_within_one_batch() {
        let mut tags = TagAggregator::new();
        tags.merge(
            None,
            &TagList::new()
                .with(names::IMAGE, image(ImageKind::BackCover, 1))
                .with(names::IMAGE, image(ImageKind::Undefined, 2)),
        );
        assert_eq!(tags.global().get(names::IMAGE).map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_kind_snapshot_is_separate() {
        let mut tags = TagAggregator::new();
        tags.merge(
            Some(StreamKind::Audio),
            &TagList::new().with(names::BITRATE, TagValue::UInt(128_000)),
        );

        assert_eq!(
            tags.snapshot(StreamKind::Audio).and_then(|s| s.uint(names::BITRATE)),
            Some(128_000)
        );
        assert!(tags.snapshot(StreamKind::Video).is_none());
        assert_eq!(tags.global().uint(names::BITRATE), Some(128_000));
    }

    #[test]
    fn test_second_identical_merge_reports_no_change() {
        let mut tags = TagAggregator::new();
        let batch = TagList::new().with(names::ALBUM, text("Album"));
        assert!(tags.merge(Some(StreamKind::Audio), &batch));
        assert!(!tags.merge(Some(StreamKind::Audio), &batch));
    }

    #[test]
    fn test_cover_prefers_front_cover_regardless_of_order() {
        for front_first in [true, false] {
            let mut batch = TagList::new();
            if front_first {
                batch.push(names::IMAGE, image(ImageKind::FrontCover, 1));
                batch.push(names::IMAGE, image(ImageKind::Undefined, 2));
            } else {
                batch.push(names::IMAGE, image(ImageKind::Undefined, 2));
                batch.push(names::IMAGE, image(ImageKind::FrontCover, 1));
            }
            let mut tags = TagAggregator::new();
            tags.merge(None, &batch);

            let cover = tags.best_cover_image().unwrap();
            assert_eq!(cover.kind, ImageKind::FrontCover);
        }
    }

    #[test]
    fn test_cover_falls_back_to_untyped_then_preview() {
        let mut tags = TagAggregator::new();
        tags.merge(
            None,
            &TagList::new().with(names::PREVIEW_IMAGE, image(ImageKind::Undefined, 9)),
        );
        assert_eq!(tags.best_cover_image().map(|i| &*i.data), Some(&[9u8][..]));

        tags.merge(
            None,
            &TagList::new()
                .with(names::IMAGE, image(ImageKind::BackCover, 3))
                .with(names::IMAGE, image(ImageKind::Undefined, 4)),
        );
        assert_eq!(tags.best_cover_image().map(|i| &*i.data), Some(&[4u8][..]));
    }

    #[test]
    fn test_no_cover() {
        let mut tags = TagAggregator::new();
        tags.merge(
            None,
            &TagList::new().with(names::IMAGE, image(ImageKind::BackCover, 1)),
        );
        assert!(tags.best_cover_image().is_none());
    }

    fn tag_value() -> impl Strategy<Value = TagValue> {
        prop_oneof![
            "[a-z]{0,8}".prop_map(TagValue::Text),
            any::<u64>().prop_map(TagValue::UInt),
            (1900i32..2100, 1u8..13, 1u8..29)
                .prop_map(|(year, month, day)| TagValue::Date { year, month, day }),
        ]
    }

    fn tag_list() -> impl Strategy<Value = TagList> {
        prop::collection::vec(
            (
                prop::sample::select(vec![names::TITLE, names::ARTIST, names::COMMENT]),
                tag_value(),
            ),
            0..8,
        )
        .prop_map(|entries| entries.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(
            history in prop::collection::vec(tag_list(), 0..4),
            batch in tag_list(),
        ) {
            let mut once = TagAggregator::new();
            let mut twice = TagAggregator::new();
            for earlier in &history {
                once.merge(Some(StreamKind::Video), earlier);
                twice.merge(Some(StreamKind::Video), earlier);
            }

            once.merge(Some(StreamKind::Video), &batch);
            twice.merge(Some(StreamKind::Video), &batch);
            twice.merge(Some(StreamKind::Video), &batch);

            prop_assert_eq!(once.global(), twice.global());
            prop_assert_eq!(
                once.snapshot(StreamKind::Video),
                twice.snapshot(StreamKind::Video)
            );
        }
    }
}
