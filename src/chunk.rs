use crate::evidence::{self, EvidenceError, EvidenceSource};

/// One scan window plus the carried tail of the previous window.
///
/// `data` holds `carry_len` bytes re-read from just before `start`, followed
/// by the primary window `[start, start + primary_len)`. Every source byte
/// belongs to exactly one primary window; carry bytes exist only so that
/// patterns straddling a window edge are visible in one buffer.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: u64,
    /// Global offset of the first primary byte.
    pub start: u64,
    /// Carried bytes prepended before `start`.
    pub carry_len: usize,
    pub data: Vec<u8>,
}

impl Chunk {
    /// Global offset of `data[0]`.
    pub fn base(&self) -> u64 {
        self.start - self.carry_len as u64
    }

    pub fn primary(&self) -> &[u8] {
        &self.data[self.carry_len..]
    }

    pub fn primary_len(&self) -> usize {
        self.data.len() - self.carry_len
    }

    /// Global offset one past the last primary byte.
    pub fn primary_end(&self) -> u64 {
        self.start + self.primary_len() as u64
    }
}

/// Sequential reader producing carry-adjusted chunks over an evidence
/// source. The carry is `max_signature_len - 1` bytes so a pattern can
/// straddle at most one window edge and still land whole in one buffer.
pub struct ChunkReader<'a> {
    source: &'a dyn EvidenceSource,
    window: u64,
    carry: usize,
    total: u64,
    next_offset: u64,
    next_id: u64,
}

impl<'a> ChunkReader<'a> {
    pub fn new(source: &'a dyn EvidenceSource, window: u64, carry: usize) -> Self {
        Self::resume_at(source, window, carry, 0)
    }

    /// Start reading at `offset` instead of zero. The first chunk re-reads
    /// up to `carry` bytes before `offset` so signatures straddling the
    /// resume boundary are still seen.
    pub fn resume_at(source: &'a dyn EvidenceSource, window: u64, carry: usize, offset: u64) -> Self {
        Self {
            source,
            window: window.max(1),
            carry,
            total: source.len(),
            next_offset: offset,
            next_id: 0,
        }
    }

    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, EvidenceError> {
        if self.next_offset >= self.total {
            return Ok(None);
        }

        let carry_len = (self.carry as u64).min(self.next_offset) as usize;
        let read_start = self.next_offset - carry_len as u64;
        let primary_len = self.window.min(self.total - self.next_offset);
        let want = carry_len + primary_len as usize;

        let mut data = vec![0u8; want];
        let n = evidence::read_exact_at(self.source, read_start, &mut data)?;
        data.truncate(n);
        if data.len() <= carry_len {
            // source shrank underneath us; nothing new to scan
            return Ok(None);
        }

        let chunk = Chunk {
            id: self.next_id,
            start: self.next_offset,
            carry_len,
            data,
        };
        self.next_id += 1;
        self.next_offset = chunk.primary_end();
        Ok(Some(chunk))
    }
}
