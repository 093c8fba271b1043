use crate::program::NOP_WORD;
use crate::{CoreError, Result};

pub const ROM_WORDS: usize = 256;
pub const ROM_BYTES: usize = ROM_WORDS * 4;

/// 256-word read-only instruction store with a registered read port.
///
/// An index presented through [`issue_read`](Self::issue_read) during one
/// cycle is latched at [`tick`](Self::tick) and visible through
/// [`fetched`](Self::fetched) from the following cycle on.
#[derive(Debug, Clone)]
pub struct InstructionRom {
    words: [u32; ROM_WORDS],
    fetched: u32,
    pending: Option<usize>,
}

impl InstructionRom {
    /// Build the store from an image of at most [`ROM_WORDS`] words. Words
    /// past the image hold the add-immediate no-op encoding.
    pub fn new(image: &[u32]) -> Result<Self> {
        if image.len() > ROM_WORDS {
            return Err(CoreError::ProgramTooLarge {
                words: image.len(),
                limit: ROM_WORDS,
            });
        }
        let mut words = [NOP_WORD; ROM_WORDS];
        words[..image.len()].copy_from_slice(image);
        Ok(Self {
            words,
            fetched: 0,
            pending: None,
        })
    }

    /// Direct view of one stored word, bypassing the synchronous port.
    /// Index bits beyond the store's 8 address lines are ignored.
    pub fn word(&self, index: usize) -> u32 {
        self.words[index & (ROM_WORDS - 1)]
    }

    pub fn words(&self) -> &[u32; ROM_WORDS] {
        &self.words
    }

    /// Present a read request for the current cycle.
    pub fn issue_read(&mut self, index: usize) {
        self.pending = Some(index & (ROM_WORDS - 1));
    }

    /// Read-port output as latched at the most recent clock edge.
    pub fn fetched(&self) -> u32 {
        self.fetched
    }

    pub(crate) fn set_fetched(&mut self, word: u32) {
        self.fetched = word;
    }

    /// Clock edge: latch the pending request into the read port. With no
    /// pending request the port holds its value.
    pub fn tick(&mut self) {
        if let Some(index) = self.pending.take() {
            self.fetched = self.words[index];
        }
    }

    /// Clear the port. The stored words are configuration, not state, and
    /// survive reset.
    pub fn reset_port(&mut self) {
        self.pending = None;
        self.fetched = 0;
    }
}
