//! BMS stream reader and disassembler

use super::commands::{command_size, opcode, param, BmsCommand, PerfValue};
use crate::error::{Error, Result};
use serde::Serialize;

/// A decoded instruction and the offset of its opcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BmsInstruction {
    pub offset: u32,
    #[serde(flatten)]
    pub command: BmsCommand,
}

/// BMS stream reader
pub struct BmsReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BmsReader<'a> {
    /// Create a new reader from raw BMS data
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Check if we've reached the end of data
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Seek to a position
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::BmsParse(format!("Unexpected end of data at {:#x}", self.pos)))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_s8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let hi = self.read_u8()? as u16;
        let lo = self.read_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    pub fn read_s16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let hi = self.read_u8()? as u32;
        let lo = self.read_u16()? as u32;
        Ok((hi << 16) | lo)
    }

    /// Decode the instruction at the current position
    pub fn read_command(&mut self) -> Result<BmsCommand> {
        use opcode::*;

        let op = self.read_u8()?;
        if command_size(op).is_none() {
            return Ok(BmsCommand::Unknown { opcode: op });
        }

        let cmd = match op {
            0x00..=0x7F => BmsCommand::VoiceOn {
                note: op,
                voice: self.read_u8()?,
                velocity: self.read_u8()?,
            },
            DELAY_U8 => BmsCommand::Delay {
                ticks: self.read_u8()? as u32,
            },
            0x81..=0x87 => BmsCommand::VoiceOff {
                voice: op - VOICE_OFF,
            },
            DELAY_U16 => BmsCommand::Delay {
                ticks: self.read_u16()? as u32,
            },
            0x89..=0x8F => BmsCommand::VoiceOffEx {
                voice: op - VOICE_OFF_EX,
                arg: self.read_u8()?,
            },
            PERF_U8..=PERF_S16_DUR_U16 => self.read_perf(op)?,
            PARAM_U8 => {
                let id = self.read_u8()?;
                let value = self.read_u8()? as u16;
                param_command(id, value)
            }
            PARAM_U16 => {
                let id = self.read_u8()?;
                let value = self.read_u16()?;
                param_command(id, value)
            }
            ADD_CHILD => BmsCommand::AddChild {
                id: self.read_u8()?,
                target: self.read_u24()?,
            },
            ADD_SIBLING => BmsCommand::AddSibling {
                id: self.read_u8()?,
                target: self.read_u24()?,
            },
            SEEK => BmsCommand::Seek {
                mode: self.read_u8()?,
                target: self.read_u24()?,
            },
            SEEK_EX => BmsCommand::SeekEx {
                mode: self.read_u8()?,
                target: self.read_u24()?,
            },
            BACK => BmsCommand::Back {
                mode: self.read_u8()?,
            },
            LOOP_BEGIN => BmsCommand::LoopBegin {
                count: self.read_u16()?,
            },
            LOOP_END => BmsCommand::LoopEnd,
            PREV_NOTE => BmsCommand::PrevNote {
                note: self.read_u8()?,
            },
            TRANSPOSE => BmsCommand::Transpose {
                amount: self.read_s8()?,
            },
            STOP_CHILD => BmsCommand::StopChild {
                id: self.read_u8()?,
            },
            FLAGS => BmsCommand::Flags {
                flags: self.read_u8()?,
            },
            SET_DYNAMIC => BmsCommand::SetDynamic {
                id: self.read_u8()?,
                target: self.read_u24()?,
            },
            UNSET_DYNAMIC => BmsCommand::UnsetDynamic {
                id: self.read_u8()?,
            },
            CLEAR_DYNAMIC => BmsCommand::ClearDynamic,
            ADD_POOL => BmsCommand::AddPool,
            REMOVE_POOL => BmsCommand::RemovePool,
            TRACK_INIT => BmsCommand::TrackInit {
                arg: self.read_s16()?,
            },
            DELAY_U24 => BmsCommand::Delay {
                ticks: self.read_u24()?,
            },
            TEMPO => BmsCommand::Tempo {
                bpm: self.read_u16()?,
            },
            PPQN => BmsCommand::Ppqn {
                ppqn: self.read_u16()?,
            },
            END_OF_TRACK => BmsCommand::EndOfTrack,
            _ => BmsCommand::Unknown { opcode: op },
        };

        Ok(cmd)
    }

    fn read_perf(&mut self, op: u8) -> Result<BmsCommand> {
        let kind = self.read_u8()?;
        let value = match op & 0xFC {
            opcode::PERF_S8 => PerfValue::S8(self.read_s8()?),
            opcode::PERF_S16 => PerfValue::S16(self.read_s16()?),
            _ => PerfValue::U8(self.read_u8()?),
        };
        let duration = match op & 0x03 {
            2 => Some(self.read_u8()? as u16),
            3 => Some(self.read_u16()?),
            _ => None,
        };
        Ok(BmsCommand::Perf {
            kind,
            value,
            duration,
        })
    }

    /// Decode every instruction from the current position to the end
    pub fn parse_commands(&mut self) -> Result<Vec<BmsInstruction>> {
        let mut instructions = Vec::new();
        while !self.is_eof() {
            let offset = self.pos as u32;
            let command = self.read_command()?;
            instructions.push(BmsInstruction { offset, command });
        }
        Ok(instructions)
    }
}

fn param_command(id: u8, value: u16) -> BmsCommand {
    match id {
        param::BANK => BmsCommand::BankSelect { bank: value },
        param::PROGRAM => BmsCommand::ProgramSelect { program: value },
        _ => BmsCommand::Param { param: id, value },
    }
}
