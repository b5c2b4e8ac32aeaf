//! Decode window of a character LOB.
//!
//! The window holds a run of decoded characters together with the byte range they were
//! decoded from. It moves forward over the content one chunk at a time. Moving it back
//! means decoding from the start of the LOB again.

use super::LobCore;
use crate::{Charset, Error, Result};
use std::cmp;
use tracing::{debug, trace};

pub struct CharWindow {
    charset: Charset,
    /// Decoded characters. Those before `first` have been moved past and are dropped on the next decode.
    chars: Vec<char>,
    /// Number of source bytes each character in `chars` was decoded from
    widths: Vec<u8>,
    first: usize,
    /// Character offset of `chars[first]`
    char_start: u64,
    /// Byte offset of `chars[first]`
    byte_start: u64,
    /// Byte offset right after the last character in `chars`
    next_byte: u64,
    char_length: Option<u64>,
}

impl CharWindow {
    pub(crate) fn new(charset: Charset) -> Self {
        Self { charset, chars: Vec::new(), widths: Vec::new(), first: 0, char_start: 0, byte_start: 0, next_byte: 0, char_length: None }
    }

    pub(crate) fn charset(&self) -> Charset {
        self.charset
    }

    /// Number of characters in the LOB, if it has been resolved.
    pub(crate) fn char_length(&self) -> Option<u64> {
        self.char_length
    }

    /// Decoded characters at the start of the window.
    pub(crate) fn head(&self, len: usize) -> &[char] {
        let window = &self.chars[self.first..];
        &window[..cmp::min(len, window.len())]
    }

    /// Number of decoded characters in the window.
    fn len(&self) -> usize {
        self.chars.len() - self.first
    }

    fn clear(&mut self) {
        self.chars.clear();
        self.widths.clear();
        self.first = 0;
    }

    fn rewind(&mut self) {
        self.clear();
        self.char_start = 0;
        self.byte_start = 0;
        self.next_byte = 0;
    }

    pub(crate) fn invalidate(&mut self) {
        self.rewind();
        self.char_length = None;
    }

    pub(crate) fn appended(&mut self, num_chars: u64) {
        if let Some( char_length ) = self.char_length.as_mut() {
            *char_length += num_chars;
        }
    }

    /**
        Positions the window at the 1-based character position `pos` and decodes up to
        `len` characters from there.

        Returns the number of characters available at the head of the window, which is
        less than `len` only when the end of the LOB is reached. Returns 0 when `pos` is
        past the last character.
    */
    pub(crate) fn read(&mut self, core: &LobCore, pos: u64, len: usize) -> Result<usize> {
        let size = core.size();
        if let Some( char_length ) = self.char_length {
            if pos > char_length {
                if pos - 1 > char_length {
                    self.clear();
                    self.char_start = char_length;
                    self.byte_start = size;
                    self.next_byte = size;
                }
                return Ok(0);
            }
        }
        let target = pos - 1;

        if target < self.char_start {
            debug!(target, window_start = self.char_start, "CLOB window moves back, decoding from the start");
            self.rewind();
        }

        while target >= self.char_start + self.len() as u64 {
            self.byte_start = self.next_byte;
            self.char_start += self.len() as u64;
            self.clear();
            if self.next_byte >= size {
                if self.char_length.is_none() {
                    debug!(char_length = self.char_start, byte_length = size, "CLOB length resolved");
                    self.char_length = Some(self.char_start);
                }
                return Ok(0);
            }
            self.decode_next_chunk(core, size)?;
        }

        let skip = (target - self.char_start) as usize;
        if skip > 0 {
            let skip_bytes = byte_len(&self.widths[self.first..self.first + skip]);
            self.first += skip;
            self.char_start += skip as u64;
            self.byte_start += skip_bytes;
        }

        while len > self.len() && self.next_byte < size {
            self.decode_next_chunk(core, size)?;
        }
        Ok( cmp::min(len, self.len()) )
    }

    /**
        Decodes the next chunk of bytes and appends it to the window.

        Unless the chunk ends the LOB its last character might be an incomplete multi-byte
        sequence. That character is dropped and decoded again as the first one of the next chunk.
    */
    fn decode_next_chunk(&mut self, core: &LobCore, size: u64) -> Result<()> {
        let chunk_start = self.next_byte;
        let chunk_len = cmp::min(core.chunk_size() as u64, size - chunk_start) as usize;
        let bytes = core.read_exact_at(chunk_start, chunk_len)?;
        let chunk_end = chunk_start + bytes.len() as u64;
        if self.first > 0 {
            self.chars.drain(..self.first);
            self.widths.drain(..self.first);
            self.first = 0;
        }
        let num_kept = self.chars.len();
        self.charset.decode_into(&bytes, &mut self.chars, &mut self.widths);

        if chunk_end >= size {
            self.next_byte = chunk_end;
            let char_length = self.char_start + self.len() as u64;
            if self.char_length.is_none() {
                debug!(char_length, byte_length = size, "CLOB length resolved");
            }
            self.char_length = Some(char_length);
        } else {
            self.chars.pop();
            self.widths.pop();
            let confirmed = byte_len(&self.widths[num_kept..]);
            if confirmed == 0 {
                return Err( Error::invariant(format!("no complete character in {} bytes at byte {}", bytes.len(), chunk_start)) );
            }
            self.next_byte = chunk_start + confirmed;
        }
        trace!(chunk_start, chunk_len, next_byte = self.next_byte, window_chars = self.len(), "CLOB chunk decoded");
        Ok(())
    }
}

fn byte_len(widths: &[u8]) -> u64 {
    widths.iter().map(|&width| width as u64).sum()
}
