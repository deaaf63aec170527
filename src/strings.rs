use serde::Serialize;

use crate::chunk::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StringEncoding {
    Ascii,
    Utf16le,
}

impl StringEncoding {
    /// Source bytes consumed per character of extracted text.
    pub fn unit_width(&self) -> u64 {
        match self {
            Self::Ascii => 1,
            Self::Utf16le => 2,
        }
    }
}

/// A maximal printable run, emitted once at its true start offset even when
/// it crosses chunk boundaries.
#[derive(Debug, Clone, Serialize)]
pub struct StringMatch {
    pub offset: u64,
    pub text: String,
    pub encoding: StringEncoding,
}

struct Run {
    start: u64,
    chars: Vec<u8>,
}

/// Extracts printable runs (0x20..=0x7E) from the primary window of each
/// chunk. Unlike the carve scanner, boundary handling here is run state,
/// not byte carry: a run still open when a chunk ends is held and continued
/// into the next chunk, so a real string is never split or double-counted.
/// In UTF-16LE mode the scanner additionally holds the low byte of a code
/// unit cut in half by the boundary.
pub struct StringScanner {
    encoding: StringEncoding,
    min_len: usize,
    max_len: usize,
    run: Option<Run>,
    split_unit: Option<(u64, u8)>,
}

impl StringScanner {
    pub fn new(encoding: StringEncoding, min_len: usize, max_len: usize) -> Self {
        Self {
            encoding,
            min_len: min_len.max(1),
            max_len: if max_len == 0 { usize::MAX } else { max_len },
            run: None,
            split_unit: None,
        }
    }

    pub fn scan_chunk(&mut self, chunk: &Chunk) -> Vec<StringMatch> {
        let mut out = Vec::new();
        match self.encoding {
            StringEncoding::Ascii => self.scan_ascii(chunk.start, chunk.primary(), &mut out),
            StringEncoding::Utf16le => self.scan_utf16le(chunk.start, chunk.primary(), &mut out),
        }
        out
    }

    /// Flush the run held across the final chunk boundary, if any.
    pub fn finish(&mut self) -> Vec<StringMatch> {
        let mut out = Vec::new();
        self.split_unit = None;
        self.flush(&mut out);
        out
    }

    fn scan_ascii(&mut self, start: u64, data: &[u8], out: &mut Vec<StringMatch>) {
        for (i, byte) in data.iter().enumerate() {
            if is_printable(*byte) {
                let pos = start + i as u64;
                let run = self.run.get_or_insert_with(|| Run {
                    start: pos,
                    chars: Vec::new(),
                });
                run.chars.push(*byte);
                if run.chars.len() >= self.max_len {
                    self.flush(out);
                }
            } else {
                self.flush(out);
            }
        }
    }

    fn scan_utf16le(&mut self, start: u64, data: &[u8], out: &mut Vec<StringMatch>) {
        let mut i = 0usize;

        // complete a code unit split at the previous chunk boundary
        if let Some((offset, low)) = self.split_unit.take() {
            if !data.is_empty() && data[0] == 0x00 {
                self.push_utf16(offset, low, out);
                i = 1;
            } else {
                self.flush(out);
            }
        }

        while i < data.len() {
            if i + 1 == data.len() {
                if is_printable(data[i]) {
                    self.split_unit = Some((start + i as u64, data[i]));
                } else {
                    self.flush(out);
                }
                return;
            }
            if is_printable(data[i]) && data[i + 1] == 0x00 {
                self.push_utf16(start + i as u64, data[i], out);
                i += 2;
            } else {
                self.flush(out);
                i += 1;
            }
        }
    }

    fn push_utf16(&mut self, pos: u64, ch: u8, out: &mut Vec<StringMatch>) {
        let run = self.run.get_or_insert_with(|| Run {
            start: pos,
            chars: Vec::new(),
        });
        run.chars.push(ch);
        if run.chars.len() >= self.max_len {
            self.flush(out);
        }
    }

    fn flush(&mut self, out: &mut Vec<StringMatch>) {
        if let Some(run) = self.run.take() {
            if run.chars.len() >= self.min_len {
                out.push(StringMatch {
                    offset: run.start,
                    text: String::from_utf8_lossy(&run.chars).into_owned(),
                    encoding: self.encoding,
                });
            }
        }
    }
}

fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E)
}
