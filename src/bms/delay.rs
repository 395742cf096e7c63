//! BMS delay instruction generation

use super::commands::{opcode, U24_MAX};

/// Generate delay instructions for a given number of ticks
///
/// Each instruction uses the narrowest operand that fits. Durations above
/// the 24-bit range are split into maximal chunks. Zero ticks produce nothing.
pub fn generate_delay(mut ticks: u64) -> Vec<u8> {
    let mut commands = Vec::new();

    while ticks > 0 {
        let chunk = ticks.min(U24_MAX as u64) as u32;
        if chunk > 0xFFFF {
            commands.push(opcode::DELAY_U24);
            commands.extend_from_slice(&chunk.to_be_bytes()[1..]);
        } else if chunk > 0xFF {
            commands.push(opcode::DELAY_U16);
            commands.extend_from_slice(&(chunk as u16).to_be_bytes());
        } else {
            commands.push(opcode::DELAY_U8);
            commands.push(chunk as u8);
        }
        ticks -= chunk as u64;
    }

    commands
}
