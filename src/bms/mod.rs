pub mod commands;
pub mod delay;
pub mod json;
pub mod reader;
pub mod writer;

pub use commands::{BmsCommand, PerfType, PerfValue, SeekMode};
pub use json::BmsJson;
pub use reader::{BmsInstruction, BmsReader};
pub use writer::{BmsWriter, Point};
