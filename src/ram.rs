pub const RAM_WORDS: usize = 1024;
pub const RAM_BYTES: usize = RAM_WORDS * 4;

/// Merge `data` into `current` one byte lane at a time. Mask bit *n* enables
/// lane *n* (bits 8n+7..8n).
pub(crate) fn merge_word(current: u32, data: u32, mask: u8) -> u32 {
    let mut merged = current;
    for lane in 0..4 {
        if mask & (1 << lane) != 0 {
            let bits = 0xFFu32 << (lane * 8);
            merged = (merged & !bits) | (data & bits);
        }
    }
    merged
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Read { index: usize },
    Write { index: usize, data: u32, mask: u8 },
}

/// 1024-word read/write data store. At most one request per cycle; the
/// request presented during cycle *n* takes effect at the *n*→*n+1* edge,
/// so reads have one cycle of latency and a written word is visible from
/// the next cycle on. Writes honour a 4-bit byte-enable mask via a
/// read-modify-write merge.
#[derive(Debug, Clone)]
pub struct DataRam {
    words: Vec<u32>,
    rdata: u32,
    pending: Option<Request>,
}

impl Default for DataRam {
    fn default() -> Self {
        Self::new()
    }
}

impl DataRam {
    pub fn new() -> Self {
        Self {
            words: vec![0; RAM_WORDS],
            rdata: 0,
            pending: None,
        }
    }

    /// Direct view of one stored word, bypassing the synchronous port.
    /// `index` must be below [`RAM_WORDS`].
    pub fn word(&self, index: usize) -> u32 {
        self.words[index]
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn load_words(&mut self, image: &[u32]) {
        let limit = self.words.len().min(image.len());
        self.words[..limit].copy_from_slice(&image[..limit]);
    }

    pub fn issue_read(&mut self, index: usize) {
        debug_assert!(self.pending.is_none(), "one request per cycle");
        self.pending = Some(Request::Read { index });
    }

    pub fn issue_write(&mut self, index: usize, data: u32, mask: u8) {
        debug_assert!(self.pending.is_none(), "one request per cycle");
        self.pending = Some(Request::Write { index, data, mask });
    }

    /// Read-port output as latched at the most recent clock edge.
    pub fn rdata(&self) -> u32 {
        self.rdata
    }

    /// Clock edge: commit the pending request.
    pub fn tick(&mut self) {
        match self.pending.take() {
            Some(Request::Read { index }) => self.rdata = self.words[index],
            Some(Request::Write { index, data, mask }) => {
                self.words[index] = merge_word(self.words[index], data, mask);
            }
            None => {}
        }
    }

    /// Clear the port. Stored words survive reset; only initialization
    /// fills them.
    pub fn reset_port(&mut self) {
        self.pending = None;
        self.rdata = 0;
    }
}
