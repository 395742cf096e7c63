use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("Unsupported MIDI time division: {0}")]
    UnsupportedTiming(String),

    #[error("Failed to detect root track")]
    NoRootTrack,

    #[error("More than one root track")]
    DuplicateRootTrack,

    #[error("More than one track with ID {id}")]
    DuplicateTrack { id: u8 },

    #[error("Loop is missing a start point")]
    LoopMissingStart,

    #[error("Loop is missing an end point")]
    LoopMissingEnd,

    #[error("Track {track} ends inside an open loop")]
    UnclosedLoop { track: String },

    #[error("Failed to allocate a voice for note {note}")]
    VoicePoolExhausted { note: u8 },

    #[error("Note {note} released without a held voice")]
    VoiceNotHeld { note: u8 },

    #[error("Controller does not have a complete value")]
    IncompleteController,

    #[error("Output offset {offset:#x} exceeds the 24-bit address range")]
    AddressOverflow { offset: u64 },

    #[error("BMS parse error: {0}")]
    BmsParse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
