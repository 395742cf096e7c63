//! JSON serialization types for disassembled BMS data

use super::commands::BmsCommand;
use super::reader::BmsInstruction;
use serde::Serialize;
use std::collections::BTreeMap;

/// Top-level JSON structure for a BMS file
#[derive(Debug, Clone, Serialize)]
pub struct BmsJson {
    /// File size in bytes
    pub size: usize,
    /// Child track id to start offset, as linked from the root track
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<u8, u32>,
    /// Decoded instructions in file order
    pub instructions: Vec<BmsInstruction>,
}

impl BmsJson {
    /// Create a BmsJson from a decoded instruction list
    pub fn new(size: usize, instructions: Vec<BmsInstruction>) -> Self {
        let children = instructions
            .iter()
            .take_while(|i| !matches!(i.command, BmsCommand::EndOfTrack))
            .filter_map(|i| match i.command {
                BmsCommand::AddChild { id, target } => Some((id, target)),
                _ => None,
            })
            .collect();

        Self {
            size,
            children,
            instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bms::BmsReader;

    #[test]
    fn test_children_from_root() {
        let data = [
            0xC1, 0x00, 0x00, 0x00, 0x0B, //
            0xC1, 0x02, 0x00, 0x00, 0x0C, //
            0xFF, //
            0xFF, //
            0xFF,
        ];
        let instructions = BmsReader::new(&data).parse_commands().unwrap();
        let json = BmsJson::new(data.len(), instructions);
        assert_eq!(json.children.get(&0), Some(&0x0B));
        assert_eq!(json.children.get(&2), Some(&0x0C));
        assert_eq!(json.instructions.len(), 5);

        let text = serde_json::to_string(&json).unwrap();
        assert!(text.contains(r#""cmd":"add_child""#));
        assert!(text.contains(r#""target":11"#));
    }
}
