//! BMS stream writer
//!
//! All multi-byte operands are big-endian. Offsets are 24-bit, so the stream
//! can never grow past [`U24_MAX`] bytes.

use super::commands::{opcode, param, PerfType, PerfValue, SeekMode, U24_MAX};
use super::delay;
use crate::error::{Error, Result};
use std::io::{Seek, SeekFrom, Write};

/// Forward reference to a not-yet-known offset
///
/// Created over a 3-byte placeholder and consumed by [`BmsWriter::close_point`],
/// which backpatches the placeholder with the write position at close time.
#[must_use = "an open point must be closed before the stream is finished"]
#[derive(Debug, PartialEq, Eq)]
pub struct Point {
    offset: u32,
}

impl Point {
    /// Offset of the placeholder bytes
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// BMS writer over any seekable sink
pub struct BmsWriter<W: Write + Seek> {
    inner: W,
    /// Current write position
    pos: u32,
}

impl<W: Write + Seek> BmsWriter<W> {
    /// Create a writer appending from the start of `inner`
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Get current write position
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Run `f` with the cursor moved to `offset`, then return to the
    /// current position whether or not `f` succeeded
    pub fn at<T>(&mut self, offset: u32, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        self.seek(offset)?;
        let result = f(self);
        self.seek(saved)?;
        result
    }

    fn seek(&mut self, offset: u32) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset as u64))?;
        self.pos = offset;
        Ok(())
    }

    /// Flush and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    // raw writes

    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos as u64 + data.len() as u64;
        if end > U24_MAX as u64 {
            return Err(Error::AddressOverflow { offset: end });
        }
        self.inner.write_all(data)?;
        self.pos = end as u32;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    pub fn write_s8(&mut self, value: i8) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    pub fn write_s16(&mut self, value: i16) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    /// Write a 24-bit value; larger values are an address overflow
    pub fn write_u24(&mut self, value: u32) -> Result<()> {
        if value > U24_MAX {
            return Err(Error::AddressOverflow {
                offset: value as u64,
            });
        }
        self.write_raw(&value.to_be_bytes()[1..])
    }

    // points

    /// Reserve a 3-byte placeholder at the current position
    pub fn open_point(&mut self) -> Result<Point> {
        let point = Point { offset: self.pos };
        self.write_u24(0)?;
        Ok(point)
    }

    /// Patch the point's placeholder with the current position
    pub fn close_point(&mut self, point: Point) -> Result<()> {
        let target = self.pos;
        self.at(point.offset, |w| w.write_u24(target))
    }

    // timing

    pub fn write_delay(&mut self, ticks: u64) -> Result<()> {
        let commands = delay::generate_delay(ticks);
        self.write_raw(&commands)
    }

    // voices

    /// Start `note` on a 1-based voice
    pub fn write_voice_on(&mut self, note: u8, voice: u8, velocity: u8) -> Result<()> {
        debug_assert!(note < opcode::NOTE_ON_LIMIT);
        self.write_raw(&[note, voice, velocity])
    }

    pub fn write_voice_off(&mut self, voice: u8) -> Result<()> {
        self.write_u8(opcode::VOICE_OFF + voice)
    }

    pub fn write_voice_off_ex(&mut self, voice: u8, arg: u8) -> Result<()> {
        self.write_raw(&[opcode::VOICE_OFF_EX + voice, arg])
    }

    // performance

    /// Write a performance ramp; a zero duration uses the immediate form
    pub fn write_perf(&mut self, kind: PerfType, value: PerfValue, duration: u16) -> Result<()> {
        let base = match value {
            PerfValue::U8(_) => opcode::PERF_U8,
            PerfValue::S8(_) => opcode::PERF_S8,
            PerfValue::S16(_) => opcode::PERF_S16,
        };
        let op = match duration {
            0 => base,
            1..=0xFF => base + 2,
            _ => base + 3,
        };

        self.write_raw(&[op, kind as u8])?;
        match value {
            PerfValue::U8(v) => self.write_u8(v)?,
            PerfValue::S8(v) => self.write_s8(v)?,
            PerfValue::S16(v) => self.write_s16(v)?,
        }
        match duration {
            0 => Ok(()),
            1..=0xFF => self.write_u8(duration as u8),
            _ => self.write_u16(duration),
        }
    }

    // bank/program

    pub fn write_param_u8(&mut self, id: u8, value: u8) -> Result<()> {
        self.write_raw(&[opcode::PARAM_U8, id, value])
    }

    pub fn write_param_u16(&mut self, id: u8, value: u16) -> Result<()> {
        self.write_raw(&[opcode::PARAM_U16, id])?;
        self.write_u16(value)
    }

    pub fn write_bank_select(&mut self, bank: u16) -> Result<()> {
        self.write_param_u16(param::BANK, bank)
    }

    pub fn write_bank_select_u8(&mut self, bank: u8) -> Result<()> {
        self.write_param_u8(param::BANK, bank)
    }

    pub fn write_program_select(&mut self, program: u8) -> Result<()> {
        self.write_param_u8(param::PROGRAM, program)
    }

    pub fn write_program_select_u16(&mut self, program: u16) -> Result<()> {
        self.write_param_u16(param::PROGRAM, program)
    }

    // tracks

    /// Add a child track whose start offset is not known yet
    pub fn write_add_child(&mut self, id: u8) -> Result<Point> {
        self.write_raw(&[opcode::ADD_CHILD, id])?;
        self.open_point()
    }

    pub fn write_add_child_at(&mut self, id: u8, offset: u32) -> Result<()> {
        self.write_raw(&[opcode::ADD_CHILD, id])?;
        self.write_u24(offset)
    }

    pub fn write_add_sibling(&mut self, id: u8) -> Result<Point> {
        self.write_raw(&[opcode::ADD_SIBLING, id])?;
        self.open_point()
    }

    pub fn write_add_sibling_at(&mut self, id: u8, offset: u32) -> Result<()> {
        self.write_raw(&[opcode::ADD_SIBLING, id])?;
        self.write_u24(offset)
    }

    pub fn write_stop_child(&mut self, id: u8) -> Result<()> {
        self.write_raw(&[opcode::STOP_CHILD, id])
    }

    pub fn write_track_init(&mut self, arg: i16) -> Result<()> {
        self.write_u8(opcode::TRACK_INIT)?;
        self.write_s16(arg)
    }

    // seeking

    pub fn write_seek(&mut self, mode: SeekMode) -> Result<Point> {
        self.write_raw(&[opcode::SEEK, mode as u8])?;
        self.open_point()
    }

    pub fn write_seek_at(&mut self, mode: SeekMode, offset: u32) -> Result<()> {
        self.write_raw(&[opcode::SEEK, mode as u8])?;
        self.write_u24(offset)
    }

    pub fn write_seek_ex(&mut self, mode: SeekMode) -> Result<Point> {
        self.write_raw(&[opcode::SEEK_EX, mode as u8])?;
        self.open_point()
    }

    pub fn write_seek_ex_at(&mut self, mode: SeekMode, offset: u32) -> Result<()> {
        self.write_raw(&[opcode::SEEK_EX, mode as u8])?;
        self.write_u24(offset)
    }

    pub fn write_back(&mut self, mode: SeekMode) -> Result<()> {
        self.write_raw(&[opcode::BACK, mode as u8])
    }

    // looping

    pub fn write_loop_begin(&mut self, count: u16) -> Result<()> {
        self.write_u8(opcode::LOOP_BEGIN)?;
        self.write_u16(count)
    }

    pub fn write_loop_end(&mut self) -> Result<()> {
        self.write_u8(opcode::LOOP_END)
    }

    // dynamics

    pub fn write_set_dynamic(&mut self, id: u8) -> Result<Point> {
        self.write_raw(&[opcode::SET_DYNAMIC, id])?;
        self.open_point()
    }

    pub fn write_set_dynamic_at(&mut self, id: u8, offset: u32) -> Result<()> {
        self.write_raw(&[opcode::SET_DYNAMIC, id])?;
        self.write_u24(offset)
    }

    pub fn write_unset_dynamic(&mut self, id: u8) -> Result<()> {
        self.write_raw(&[opcode::UNSET_DYNAMIC, id])
    }

    pub fn write_clear_dynamic(&mut self) -> Result<()> {
        self.write_u8(opcode::CLEAR_DYNAMIC)
    }

    // tempo/ppqn

    pub fn write_tempo(&mut self, bpm: u16) -> Result<()> {
        self.write_u8(opcode::TEMPO)?;
        self.write_u16(bpm)
    }

    pub fn write_ppqn(&mut self, ppqn: u16) -> Result<()> {
        self.write_u8(opcode::PPQN)?;
        self.write_u16(ppqn)
    }

    pub fn write_track_end(&mut self) -> Result<()> {
        self.write_u8(opcode::END_OF_TRACK)
    }

    // misc

    pub fn write_prev_note(&mut self, note: u8) -> Result<()> {
        self.write_raw(&[opcode::PREV_NOTE, note])
    }

    pub fn write_transpose(&mut self, amount: i8) -> Result<()> {
        self.write_u8(opcode::TRANSPOSE)?;
        self.write_s8(amount)
    }

    pub fn write_flags(&mut self, flags: u8) -> Result<()> {
        self.write_raw(&[opcode::FLAGS, flags])
    }

    pub fn write_add_pool(&mut self) -> Result<()> {
        self.write_u8(opcode::ADD_POOL)
    }

    pub fn write_remove_pool(&mut self) -> Result<()> {
        self.write_u8(opcode::REMOVE_POOL)
    }
}
