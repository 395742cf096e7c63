//! Voice slot allocation

use crate::bms::commands::VOICE_COUNT;
use crate::error::{Error, Result};

/// Maps sounding notes to the engine's fixed voice slots
#[derive(Debug, Clone, Default)]
pub struct VoicePool {
    slots: [Option<u8>; VOICE_COUNT],
}

impl VoicePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the first free slot for `note`, returning its 0-based index
    pub fn allocate(&mut self, note: u8) -> Result<usize> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::VoicePoolExhausted { note })?;
        self.slots[index] = Some(note);
        Ok(index)
    }

    /// Free the first slot holding `note`, returning its 0-based index
    pub fn release(&mut self, note: u8) -> Result<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| *slot == Some(note))
            .ok_or(Error::VoiceNotHeld { note })?;
        self.slots[index] = None;
        Ok(index)
    }

    /// Number of sounding voices
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_pool() {
        let mut pool = VoicePool::new();
        for (i, note) in (60..67).enumerate() {
            assert_eq!(pool.allocate(note).unwrap(), i);
        }
        assert_eq!(pool.active(), 7);
        assert!(matches!(
            pool.allocate(70),
            Err(Error::VoicePoolExhausted { note: 70 })
        ));
    }

    #[test]
    fn test_release_reuses_slot() {
        let mut pool = VoicePool::new();
        for note in 60..67 {
            pool.allocate(note).unwrap();
        }
        assert_eq!(pool.release(63).unwrap(), 3);
        assert_eq!(pool.allocate(80).unwrap(), 3);
        assert_eq!(pool.release(80).unwrap(), 3);
    }

    #[test]
    fn test_release_unheld() {
        let mut pool = VoicePool::new();
        assert!(matches!(
            pool.release(60),
            Err(Error::VoiceNotHeld { note: 60 })
        ));
        pool.allocate(60).unwrap();
        pool.release(60).unwrap();
        assert!(pool.release(60).is_err());
    }

    #[test]
    fn test_same_note_twice() {
        let mut pool = VoicePool::new();
        assert_eq!(pool.allocate(60).unwrap(), 0);
        assert_eq!(pool.allocate(60).unwrap(), 1);
        assert_eq!(pool.release(60).unwrap(), 0);
        assert_eq!(pool.release(60).unwrap(), 1);
        assert_eq!(pool.active(), 0);
    }
}
