pub mod bms;
pub mod converter;
pub mod error;
pub mod midi;

pub use converter::{Converter, Options};
pub use error::Error;
