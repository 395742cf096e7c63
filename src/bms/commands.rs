//! BMS opcode table and decoded command model

use serde::Serialize;

/// BMS opcodes
pub mod opcode {
    /// Note-on is an implicit triplet: any byte below this is a note number
    pub const NOTE_ON_LIMIT: u8 = 0x80;
    pub const DELAY_U8: u8 = 0x80;
    /// Voice off, 0x81-0x87 for voices 1-7
    pub const VOICE_OFF: u8 = 0x80;
    pub const DELAY_U16: u8 = 0x88;
    /// Voice off with argument, 0x89-0x8F for voices 1-7
    pub const VOICE_OFF_EX: u8 = 0x88;
    pub const PERF_U8: u8 = 0x94;
    pub const PERF_U8_DUR_U8: u8 = 0x96;
    pub const PERF_U8_DUR_U16: u8 = 0x97;
    pub const PERF_S8: u8 = 0x98;
    pub const PERF_S8_DUR_U8: u8 = 0x9A;
    pub const PERF_S8_DUR_U16: u8 = 0x9B;
    pub const PERF_S16: u8 = 0x9C;
    pub const PERF_S16_DUR_U8: u8 = 0x9E;
    pub const PERF_S16_DUR_U16: u8 = 0x9F;
    pub const PARAM_U8: u8 = 0xA4;
    pub const PARAM_U16: u8 = 0xAC;
    pub const ADD_CHILD: u8 = 0xC1;
    pub const ADD_SIBLING: u8 = 0xC2;
    pub const SEEK: u8 = 0xC4;
    pub const BACK: u8 = 0xC6;
    pub const SEEK_EX: u8 = 0xC8;
    pub const LOOP_BEGIN: u8 = 0xC9;
    pub const LOOP_END: u8 = 0xCA;
    pub const PREV_NOTE: u8 = 0xD4;
    pub const TRANSPOSE: u8 = 0xD9;
    pub const STOP_CHILD: u8 = 0xDA;
    pub const FLAGS: u8 = 0xDE;
    pub const SET_DYNAMIC: u8 = 0xDF;
    pub const UNSET_DYNAMIC: u8 = 0xE0;
    pub const CLEAR_DYNAMIC: u8 = 0xE1;
    pub const ADD_POOL: u8 = 0xE5;
    pub const REMOVE_POOL: u8 = 0xE6;
    pub const TRACK_INIT: u8 = 0xE7;
    /// 24-bit delay; the carry-flag form 0xEB is never emitted
    pub const DELAY_U24: u8 = 0xEA;
    pub const TEMPO: u8 = 0xFD;
    pub const PPQN: u8 = 0xFE;
    pub const END_OF_TRACK: u8 = 0xFF;
}

/// Parameter ids for the 0xA4/0xAC register writes
pub mod param {
    pub const BANK: u8 = 0x20;
    pub const PROGRAM: u8 = 0x21;
}

/// Number of hardware voices
pub const VOICE_COUNT: usize = 7;

/// Number of child tracks addressable from the root
pub const MAX_CHILDREN: usize = 16;

/// Largest offset or delay a 24-bit field can hold
pub const U24_MAX: u32 = 0xFF_FFFF;

/// Performance parameter ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PerfType {
    Volume = 0,
    Pitch = 1,
    Pan = 3,
}

/// Comparison mode of a seek or back instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SeekMode {
    Always = 0,
    Zero = 1,
    NonZero = 2,
    One = 3,
    GreaterThan = 4,
    LessThan = 5,
}

/// Value operand of a performance instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "width", content = "value", rename_all = "snake_case")]
pub enum PerfValue {
    U8(u8),
    S8(i8),
    S16(i16),
}

/// A decoded BMS instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BmsCommand {
    Delay { ticks: u32 },
    VoiceOn { note: u8, voice: u8, velocity: u8 },
    VoiceOff { voice: u8 },
    VoiceOffEx { voice: u8, arg: u8 },
    Perf {
        #[serde(rename = "param")]
        kind: u8,
        value: PerfValue,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u16>,
    },
    BankSelect { bank: u16 },
    ProgramSelect { program: u16 },
    Param { param: u8, value: u16 },
    AddChild { id: u8, target: u32 },
    AddSibling { id: u8, target: u32 },
    Seek { mode: u8, target: u32 },
    SeekEx { mode: u8, target: u32 },
    Back { mode: u8 },
    LoopBegin { count: u16 },
    LoopEnd,
    PrevNote { note: u8 },
    Transpose { amount: i8 },
    StopChild { id: u8 },
    Flags { flags: u8 },
    SetDynamic { id: u8, target: u32 },
    UnsetDynamic { id: u8 },
    ClearDynamic,
    AddPool,
    RemovePool,
    TrackInit { arg: i16 },
    Tempo { bpm: u16 },
    Ppqn { ppqn: u16 },
    EndOfTrack,
    Unknown { opcode: u8 },
}

/// Number of operand bytes after a fixed-size opcode, `None` for unknown opcodes
pub fn command_size(op: u8) -> Option<usize> {
    use opcode::*;
    let size = match op {
        0x00..=0x7F => 2,
        DELAY_U8 => 1,
        0x81..=0x87 => 0,
        DELAY_U16 => 2,
        0x89..=0x8F => 1,
        PERF_U8 | PERF_S8 => 2,
        PERF_U8_DUR_U8 | PERF_S8_DUR_U8 | PERF_S16 => 3,
        PERF_U8_DUR_U16 | PERF_S8_DUR_U16 | PERF_S16_DUR_U8 => 4,
        PERF_S16_DUR_U16 => 5,
        PARAM_U8 => 2,
        PARAM_U16 => 3,
        ADD_CHILD | ADD_SIBLING | SEEK | SEEK_EX | SET_DYNAMIC => 4,
        BACK => 1,
        LOOP_BEGIN => 2,
        LOOP_END => 0,
        PREV_NOTE | TRANSPOSE | STOP_CHILD | FLAGS | UNSET_DYNAMIC => 1,
        CLEAR_DYNAMIC | ADD_POOL | REMOVE_POOL => 0,
        TRACK_INIT => 2,
        DELAY_U24 => 3,
        TEMPO | PPQN => 2,
        END_OF_TRACK => 0,
        _ => return None,
    };
    Some(size)
}
