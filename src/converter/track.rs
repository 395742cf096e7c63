//! Track classification into the root and per-channel child tracks

use super::options::TrackDetection;
use crate::bms::commands::MAX_CHILDREN;
use crate::error::{Error, Result};
use crate::midi::{Sequence, Track};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<key>[a-z0-9.-]+)\s*:\s*(?P<value>[a-z0-9.-]+)").expect("valid tag regex")
});

static INT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<neg>-)?(?P<value>[0-9a-f]+)(?P<hex>h)?$").expect("valid integer regex")
});

/// Tagged track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Root,
    Child,
}

/// Role of a classified track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Root,
    Child(u8),
}

/// `key: value` tags read from a track name
///
/// Recognized keys are `track-type` (`root` or `child`), `track-id` (0-15)
/// and `track-arg` (a signed 16-bit value, decimal or hex with an `h`
/// suffix). Unparseable values leave the field unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub kind: Option<TrackKind>,
    pub id: Option<u8>,
    pub arg: Option<i16>,
}

impl TrackTags {
    pub fn parse(name: &str) -> Self {
        let mut tags = Self::default();

        for cap in TAG_REGEX.captures_iter(name) {
            let value = &cap["value"];
            match cap["key"].to_ascii_lowercase().as_str() {
                "track-type" => {
                    if value.eq_ignore_ascii_case("root") {
                        tags.kind = Some(TrackKind::Root);
                    } else if value.eq_ignore_ascii_case("child") {
                        tags.kind = Some(TrackKind::Child);
                    }
                }
                "track-id" => {
                    if let Some(id) = parse_int(value, 0, MAX_CHILDREN as i32 - 1) {
                        tags.id = Some(id as u8);
                    }
                }
                "track-arg" => {
                    if let Some(arg) = parse_int(value, i16::MIN as i32, i16::MAX as i32) {
                        tags.arg = Some(arg as i16);
                    }
                }
                _ => {}
            }
        }

        tags
    }

    pub fn from_track(track: &Track) -> Self {
        track.name.as_deref().map(Self::parse).unwrap_or_default()
    }
}

/// Parse `[-]digits[h]` and check it against an inclusive range
fn parse_int(s: &str, min: i32, max: i32) -> Option<i32> {
    let cap = INT_REGEX.captures(s)?;
    let radix = if cap.name("hex").is_some() { 16 } else { 10 };
    let mut value = i32::from_str_radix(&cap["value"], radix).ok()?;
    if cap.name("neg").is_some() {
        value = -value;
    }
    (min..=max).contains(&value).then_some(value)
}

/// A track selected for conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Index into the sequence's track list
    pub index: usize,
    pub role: TrackRole,
    /// Channel whose channel events are converted
    pub channel: Option<u8>,
    /// Argument for the child's track-init instruction
    pub arg: Option<i16>,
}

/// Result of track classification
#[derive(Debug, Clone)]
pub struct TrackMap {
    pub root: TrackInfo,
    pub children: [Option<TrackInfo>; MAX_CHILDREN],
}

impl TrackMap {
    pub fn classify(sequence: &Sequence, mode: TrackDetection) -> Result<Self> {
        match mode {
            TrackDetection::Manual => Self::classify_manual(sequence),
            TrackDetection::Auto => Self::classify_auto(sequence),
        }
    }

    fn classify_manual(sequence: &Sequence) -> Result<Self> {
        let mut root = None;
        let mut children: [Option<TrackInfo>; MAX_CHILDREN] = Default::default();

        for (index, track) in sequence.tracks.iter().enumerate() {
            let tags = TrackTags::from_track(track);
            match (tags.kind, tags.id) {
                (Some(TrackKind::Root), _) => {
                    if root.is_some() {
                        return Err(Error::DuplicateRootTrack);
                    }
                    root = Some(TrackInfo {
                        index,
                        role: TrackRole::Root,
                        channel: tags.id,
                        arg: tags.arg,
                    });
                }
                (Some(TrackKind::Child), Some(id)) => {
                    let slot = &mut children[id as usize];
                    if slot.is_some() {
                        return Err(Error::DuplicateTrack { id });
                    }
                    *slot = Some(TrackInfo {
                        index,
                        role: TrackRole::Child(id),
                        channel: Some(id),
                        arg: tags.arg,
                    });
                }
                (Some(TrackKind::Child), None) => {
                    warn!("Track {} is tagged as a child but has no track-id", index);
                }
                (None, _) => {}
            }
        }

        let root = root.ok_or(Error::NoRootTrack)?;
        Ok(Self { root, children })
    }

    fn classify_auto(sequence: &Sequence) -> Result<Self> {
        let (root_index, root_track) = sequence
            .tracks
            .iter()
            .enumerate()
            .find(|(_, track)| track.is_control_only())
            .ok_or(Error::NoRootTrack)?;
        let root_tags = TrackTags::from_track(root_track);
        let root = TrackInfo {
            index: root_index,
            role: TrackRole::Root,
            channel: root_tags.id,
            arg: root_tags.arg,
        };

        let mut children: [Option<TrackInfo>; MAX_CHILDREN] = Default::default();
        for (index, track) in sequence.tracks.iter().enumerate() {
            if !track.has_note_on() {
                continue;
            }
            let Some(id) = track.first_channel() else {
                continue;
            };
            let slot = &mut children[id as usize];
            if slot.is_some() {
                return Err(Error::DuplicateTrack { id });
            }
            *slot = Some(TrackInfo {
                index,
                role: TrackRole::Child(id),
                channel: Some(id),
                arg: TrackTags::from_track(track).arg,
            });
        }

        Ok(Self { root, children })
    }

    /// Role assigned to the track at `index`, if any
    pub fn role_of(&self, index: usize) -> Option<TrackRole> {
        if self.root.index == index {
            return Some(TrackRole::Root);
        }
        self.children
            .iter()
            .flatten()
            .find(|child| child.index == index)
            .map(|child| child.role)
    }

    /// Detected children in ascending channel order
    pub fn children(&self) -> impl Iterator<Item = &TrackInfo> {
        self.children.iter().flatten()
    }
}
