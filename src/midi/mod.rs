//! MIDI sequence model consumed by the converter
//!
//! Tracks hold events with absolute tick times. The loader in [`loader`]
//! builds this model from a Standard MIDI File.

pub mod loader;

/// Controller numbers the converter understands
pub mod controller {
    pub const BANK_SELECT_MSB: u8 = 0;
    pub const VOLUME_MSB: u8 = 7;
    pub const PAN_MSB: u8 = 10;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const VOLUME_LSB: u8 = 39;
    pub const PAN_LSB: u8 = 42;
    /// EMIDI track loop start
    pub const LOOP_BEGIN: u8 = 116;
    /// EMIDI track loop end
    pub const LOOP_END: u8 = 117;
    /// EMIDI global loop start
    pub const GLOBAL_LOOP_BEGIN: u8 = 118;
    /// EMIDI global loop end
    pub const GLOBAL_LOOP_END: u8 = 119;

    /// Controllers 0-31 carry the most significant half of a 14-bit value
    pub fn is_msb(controller: u8) -> bool {
        controller < 32
    }
}

/// Manufacturer id whose sequencer-specific payloads are copied into the output
pub const PLACEHOLDER_MANUFACTURER_ID: u32 = 0x7D;

/// A parsed MIDI file
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Ticks per quarter note
    pub ticks_per_beat: u16,
    pub tracks: Vec<Track>,
}

/// One MIDI track
#[derive(Debug, Clone, Default)]
pub struct Track {
    /// First track name meta event, if any
    pub name: Option<String>,
    /// Events sorted by time
    pub events: Vec<Event>,
}

impl Track {
    pub fn new(name: Option<String>, events: Vec<Event>) -> Self {
        Self { name, events }
    }

    /// True if every event is a meta event or a controller change
    pub fn is_control_only(&self) -> bool {
        self.events.iter().all(|e| match &e.kind {
            EventKind::Meta(_) => true,
            EventKind::Channel { message, .. } => {
                matches!(message, ChannelMessage::Controller { .. })
            }
            EventKind::SysEx(_) => false,
        })
    }

    /// True if the track contains any note-on message
    pub fn has_note_on(&self) -> bool {
        self.events.iter().any(|e| {
            matches!(
                e.kind,
                EventKind::Channel {
                    message: ChannelMessage::NoteOn { .. },
                    ..
                }
            )
        })
    }

    /// Channel number of the first channel event
    pub fn first_channel(&self) -> Option<u8> {
        self.events.iter().find_map(Event::channel)
    }

    /// Iterate controller changes as (event, controller, value)
    pub fn controllers(&self) -> impl Iterator<Item = (&Event, u8, u8)> {
        self.events.iter().filter_map(|e| match e.kind {
            EventKind::Channel {
                message: ChannelMessage::Controller { controller, value },
                ..
            } => Some((e, controller, value)),
            _ => None,
        })
    }

    /// Insert a run of events at `time`, keeping their order. With `first`
    /// set they go before every existing event at that tick; otherwise after
    /// them but before a same-tick end-of-track.
    pub fn insert_at(&mut self, time: u64, events: impl IntoIterator<Item = Event>, first: bool) {
        let idx = if first {
            self.index_before(time)
        } else {
            self.index_after(time)
        };
        self.events.splice(idx..idx, events);
    }

    fn index_before(&self, time: u64) -> usize {
        self.events
            .iter()
            .position(|e| e.time >= time)
            .unwrap_or(self.events.len())
    }

    fn index_after(&self, time: u64) -> usize {
        self.events
            .iter()
            .position(|e| {
                e.time > time
                    || (e.time == time
                        && matches!(e.kind, EventKind::Meta(MetaMessage::EndOfTrack)))
            })
            .unwrap_or(self.events.len())
    }
}

/// A timed MIDI event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Absolute time in ticks
    pub time: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: u64, kind: EventKind) -> Self {
        Self { time, kind }
    }

    pub fn channel_message(time: u64, channel: u8, message: ChannelMessage) -> Self {
        Self::new(time, EventKind::Channel { channel, message })
    }

    pub fn meta(time: u64, message: MetaMessage) -> Self {
        Self::new(time, EventKind::Meta(message))
    }

    pub fn controller(time: u64, channel: u8, controller: u8, value: u8) -> Self {
        Self::channel_message(time, channel, ChannelMessage::Controller { controller, value })
    }

    pub fn channel(&self) -> Option<u8> {
        match self.kind {
            EventKind::Channel { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

/// Event category
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Channel { channel: u8, message: ChannelMessage },
    Meta(MetaMessage),
    SysEx(Vec<u8>),
}

/// Channel voice messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { key: u8, vel: u8 },
    NoteOn { key: u8, vel: u8 },
    Aftertouch { key: u8, vel: u8 },
    Controller { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelAftertouch { vel: u8 },
    /// Raw 14-bit bend, 8192 is centre
    PitchBend { bend: u16 },
}

/// Meta messages
#[derive(Debug, Clone, PartialEq)]
pub enum MetaMessage {
    /// Microseconds per quarter note
    Tempo(u32),
    EndOfTrack,
    TrackName(String),
    SequencerSpecific { id: u32, data: Vec<u8> },
    Other,
}

impl MetaMessage {
    /// Whole beats per minute for a tempo message
    pub fn bpm(&self) -> Option<u16> {
        match *self {
            MetaMessage::Tempo(usec) if usec > 0 => {
                Some((60_000_000 / usec).min(u16::MAX as u32) as u16)
            }
            _ => None,
        }
    }
}
