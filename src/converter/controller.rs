//! 14-bit controller reconstruction

use crate::error::{Error, Result};

/// Most/least significant halves of a 14-bit MIDI controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerPair {
    lsb: Option<u8>,
    msb: Option<u8>,
}

impl ControllerPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one 7-bit half. An MSB arriving before any LSB implies LSB 0.
    pub fn set(&mut self, value: u8, msb: bool) {
        let value = value & 0x7F;
        if msb {
            self.msb = Some(value);
            self.lsb.get_or_insert(0);
        } else {
            self.lsb = Some(value);
        }
    }

    /// Combined value, defined once the MSB has been seen
    pub fn value(&self) -> Result<u16> {
        let msb = self.msb.ok_or(Error::IncompleteController)?;
        Ok(((msb as u16) << 7) | self.lsb.unwrap_or(0) as u16)
    }

    pub fn msb(&self) -> Option<u8> {
        self.msb
    }

    pub fn lsb(&self) -> Option<u8> {
        self.lsb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_after_lsb() {
        let mut cc = ControllerPair::new();
        cc.set(0x05, false);
        cc.set(0x40, true);
        assert_eq!(cc.value().unwrap(), (0x40 << 7) | 0x05);
    }

    #[test]
    fn test_msb_alone() {
        let mut cc = ControllerPair::new();
        cc.set(100, true);
        assert_eq!(cc.lsb(), Some(0));
        assert_eq!(cc.value().unwrap(), 100 << 7);
    }

    #[test]
    fn test_lsb_update() {
        let mut cc = ControllerPair::new();
        cc.set(0x7F, true);
        cc.set(0x7F, false);
        assert_eq!(cc.value().unwrap(), 0x3FFF);
        cc.set(0x01, true);
        assert_eq!(cc.value().unwrap(), (1 << 7) | 0x7F);
    }

    #[test]
    fn test_incomplete() {
        let mut cc = ControllerPair::new();
        assert!(matches!(cc.value(), Err(Error::IncompleteController)));
        cc.set(3, false);
        assert!(matches!(cc.value(), Err(Error::IncompleteController)));
        assert_eq!(cc.msb(), None);
    }
}
