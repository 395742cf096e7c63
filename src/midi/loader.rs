//! Standard MIDI File loading via `midly`

use super::{ChannelMessage, Event, EventKind, MetaMessage, Sequence, Track};
use crate::error::{Error, Result};
use midly::{MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;

impl Sequence {
    /// Read and parse a MIDI file
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open '{}': {}", path.display(), e),
            ))
        })?;
        Self::parse(&data)
    }

    /// Parse a MIDI file from memory
    pub fn parse(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data).map_err(|e| Error::MidiParse(e.to_string()))?;
        Self::from_smf(&smf)
    }

    /// Build the sequence model from a parsed SMF
    pub fn from_smf(smf: &Smf) -> Result<Self> {
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(fps, sub) => {
                return Err(Error::UnsupportedTiming(format!(
                    "SMPTE timecode ({} fps, {} subframes)",
                    fps.as_int(),
                    sub
                )))
            }
        };

        let tracks = smf.tracks.iter().map(|t| convert_track(t)).collect();

        Ok(Self {
            ticks_per_beat,
            tracks,
        })
    }
}

fn convert_track(events: &[midly::TrackEvent]) -> Track {
    let mut time = 0u64;
    let mut name = None;
    let mut out = Vec::with_capacity(events.len());

    for event in events {
        time += event.delta.as_int() as u64;

        let kind = match event.kind {
            TrackEventKind::Midi { channel, message } => EventKind::Channel {
                channel: channel.as_int(),
                message: convert_message(message),
            },
            TrackEventKind::SysEx(data) | TrackEventKind::Escape(data) => {
                EventKind::SysEx(data.to_vec())
            }
            TrackEventKind::Meta(meta) => {
                let meta = convert_meta(meta);
                if let (None, MetaMessage::TrackName(n)) = (&name, &meta) {
                    name = Some(n.clone());
                }
                EventKind::Meta(meta)
            }
        };

        out.push(Event::new(time, kind));
    }

    Track::new(name, out)
}

fn convert_message(message: MidiMessage) -> ChannelMessage {
    match message {
        MidiMessage::NoteOff { key, vel } => ChannelMessage::NoteOff {
            key: key.as_int(),
            vel: vel.as_int(),
        },
        MidiMessage::NoteOn { key, vel } => ChannelMessage::NoteOn {
            key: key.as_int(),
            vel: vel.as_int(),
        },
        MidiMessage::Aftertouch { key, vel } => ChannelMessage::Aftertouch {
            key: key.as_int(),
            vel: vel.as_int(),
        },
        MidiMessage::Controller { controller, value } => ChannelMessage::Controller {
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::ProgramChange { program } => ChannelMessage::ProgramChange {
            program: program.as_int(),
        },
        MidiMessage::ChannelAftertouch { vel } => ChannelMessage::ChannelAftertouch {
            vel: vel.as_int(),
        },
        MidiMessage::PitchBend { bend } => ChannelMessage::PitchBend {
            bend: bend.0.as_int(),
        },
    }
}

fn convert_meta(meta: midly::MetaMessage) -> MetaMessage {
    match meta {
        midly::MetaMessage::Tempo(usec) => MetaMessage::Tempo(usec.as_int()),
        midly::MetaMessage::EndOfTrack => MetaMessage::EndOfTrack,
        midly::MetaMessage::TrackName(bytes) => {
            MetaMessage::TrackName(String::from_utf8_lossy(bytes).into_owned())
        }
        midly::MetaMessage::SequencerSpecific(bytes) => split_manufacturer_id(bytes),
        _ => MetaMessage::Other,
    }
}

/// Split a sequencer-specific payload into its manufacturer id and data.
/// A leading zero byte introduces a three-byte id.
fn split_manufacturer_id(bytes: &[u8]) -> MetaMessage {
    let (id, data) = match bytes {
        [0, hi, lo, rest @ ..] => (((*hi as u32) << 8) | *lo as u32, rest),
        [id, rest @ ..] => (*id as u32, rest),
        [] => (0, bytes),
    };
    MetaMessage::SequencerSpecific {
        id,
        data: data.to_vec(),
    }
}
