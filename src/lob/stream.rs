//! Reader and writer adapters over LOBs.

use super::{*, clob::read_substring};
use crate::Charset;
use std::{fmt, io, mem};
use tracing::warn;

/// Data a writer has buffered but not yet appended to its LOB.
pub struct WriterSlot {
    /// 1-based byte position the buffered data goes to
    pos: u64,
    data: Vec<u8>,
    /// Number of characters in `data`. `None` for writers of raw bytes.
    pending_chars: Option<u64>,
}

/// Writers currently open on a LOB.
#[derive(Default)]
pub struct WriterRegistry {
    next_id: u64,
    slots: Vec<(u64, Arc<Mutex<WriterSlot>>)>,
}

impl WriterRegistry {
    fn register(&mut self, slot: Arc<Mutex<WriterSlot>>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.push((id, slot));
        id
    }

    fn deregister(&mut self, id: u64) {
        self.slots.retain(|(slot_id, _)| *slot_id != id);
    }

    /// Drops all registered writers and returns how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let num_slots = self.slots.len();
        self.slots.clear();
        num_slots
    }

    pub(crate) fn slots(&self) -> Vec<Arc<Mutex<WriterSlot>>> {
        self.slots.iter().map(|(_, slot)| slot.clone()).collect()
    }
}

/**
    Appends the writer's buffered data to the LOB.

    The buffer is emptied even when the append fails. Whatever part of it the channel
    confirmed stays in the LOB.
*/
pub(crate) fn flush_slot<T: LobType>(state: &mut LobState<T>, slot: &mut WriterSlot) -> Result<()> {
    let size_before = state.core()?.size();
    if slot.data.is_empty() {
        return Ok(());
    }
    let data = mem::take(&mut slot.data);
    let num_chars = slot.pending_chars.as_mut().map(mem::take);
    let res = append_bytes(state, slot.pos, &data, num_chars);
    slot.pos += state.core()?.size() - size_before;
    res.map(|_| ())
}

/// Writer's connection to its LOB and its registry entry.
pub(crate) struct WriterLink<T: LobType> {
    lob: Weak<Mutex<LobState<T>>>,
    slot: Arc<Mutex<WriterSlot>>,
    id: u64,
    capacity: usize,
    closed: bool,
}

impl<T: LobType> WriterLink<T> {
    pub(crate) fn register(lob: Weak<Mutex<LobState<T>>>, state: &mut LobState<T>, pos: u64, is_text: bool, capacity: usize) -> Self {
        let slot = WriterSlot {
            pos,
            data: Vec::with_capacity(capacity),
            pending_chars: if is_text { Some(0) } else { None },
        };
        let slot = Arc::new(Mutex::new(slot));
        let id = state.writers.register(slot.clone());
        debug!(id, pos, "LOB writer registered");
        Self { lob, slot, id, capacity, closed: false }
    }

    /**
        Buffers `data`, appending the buffer to the LOB every time it fills up, so at most
        `capacity` bytes are ever held.

        `num_chars` counts the characters in `data`. They are credited to the buffer together
        with the last piece of `data`.
    */
    fn push(&mut self, mut data: &[u8], num_chars: u64) -> Result<()> {
        loop {
            let is_full = {
                let mut slot = self.slot.lock();
                let room = self.capacity.saturating_sub(slot.data.len());
                let (piece, rest) = data.split_at(cmp::min(room, data.len()));
                slot.data.extend_from_slice(piece);
                data = rest;
                if data.is_empty() {
                    if let Some( pending_chars ) = slot.pending_chars.as_mut() {
                        *pending_chars += num_chars;
                    }
                }
                slot.data.len() >= self.capacity
            };
            if is_full {
                self.flush()?;
            }
            if data.is_empty() {
                return Ok(());
            }
        }
    }

    fn flush(&self) -> Result<()> {
        let lob = self.lob.upgrade().ok_or(Error::Freed)?;
        let mut state = lob.lock();
        let mut slot = self.slot.lock();
        flush_slot(&mut state, &mut slot)
    }

    fn deregister(&self) {
        if let Some( lob ) = self.lob.upgrade() {
            lob.lock().writers.deregister(self.id);
            debug!(id = self.id, "LOB writer deregistered");
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        let res = self.flush();
        self.deregister();
        res
    }
}

impl<T: LobType> Drop for WriterLink<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let has_data = !self.slot.lock().data.is_empty();
        if has_data {
            if let Err( err ) = self.flush() {
                warn!(id = self.id, %err, "buffered LOB data is lost");
            }
        }
        self.deregister();
    }
}

/**
    Buffered writer that appends raw bytes to a LOB.

    Returned by [`BLOB::open_write_stream`](crate::BLOB) and [`CLOB::set_ascii_stream`](crate::CLOB).
    Call [`close`](LobWriter::close) to learn whether the last buffered bytes made it into
    the LOB. A writer that is simply dropped pushes them on a best-effort basis.
*/
pub struct LobWriter<T: LobType> {
    link: WriterLink<T>,
}

impl<T: LobType> LobWriter<T> {
    pub(crate) fn new(link: WriterLink<T>) -> Self {
        Self { link }
    }

    /// Appends buffered data to the LOB and removes this writer from the LOB's registry.
    pub fn close(mut self) -> Result<()> {
        self.link.close()
    }
}

impl<T: LobType> io::Write for LobWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.link.push(buf, 0)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.link.flush()?;
        Ok(())
    }
}

/**
    Buffered writer that appends text to a CLOB.

    Text is encoded into the CLOB's character set as it is written, so characters that the
    character set cannot represent are rejected right away.
*/
pub struct ClobWriter {
    link: WriterLink<Character>,
    charset: Charset,
}

impl ClobWriter {
    pub(crate) fn new(link: WriterLink<Character>, charset: Charset) -> Self {
        Self { link, charset }
    }

    /// Buffers the text for appending.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        let data = self.charset.encode(text)?;
        self.link.push(&data, text.chars().count() as u64)
    }

    /// Appends buffered text to the CLOB.
    pub fn flush(&mut self) -> Result<()> {
        self.link.flush()
    }

    /// Appends buffered text to the CLOB and removes this writer from the CLOB's registry.
    pub fn close(mut self) -> Result<()> {
        self.link.close()
    }
}

impl fmt::Write for ClobWriter {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        self.write_text(text).map_err(|err| {
            warn!(%err, "CLOB write failed");
            fmt::Error
        })
    }
}

/// Reader of the raw bytes of a LOB.
pub struct ByteReader<T: LobType> {
    lob: Weak<Mutex<LobState<T>>>,
    offset: u64,
    remaining: u64,
}

impl<T: LobType> ByteReader<T> {
    pub(crate) fn new(lob: Weak<Mutex<LobState<T>>>, offset: u64, len: u64) -> Self {
        Self { lob, offset, remaining: len }
    }
}

impl<T: LobType> io::Read for ByteReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let lob = self.lob.upgrade().ok_or(Error::Freed)?;
        let state = lob.lock();
        let core = state.core()?;
        let len = cmp::min(buf.len() as u64, self.remaining);
        let len = cmp::min(len, core.size().saturating_sub(self.offset)) as usize;
        if len == 0 {
            self.remaining = 0;
            return Ok(0);
        }
        core.read_exact_into(self.offset, &mut buf[..len])?;
        self.offset += len as u64;
        self.remaining -= len as u64;
        Ok(len)
    }
}

/// Reader of CLOB text. Yields the text as UTF-8.
pub struct CharReader {
    lob: Weak<Mutex<LobState<Character>>>,
    /// 1-based position of the next character to fetch
    pos: u64,
    remaining: u64,
    chars_per_fetch: u64,
    text: Vec<u8>,
    consumed: usize,
}

impl CharReader {
    pub(crate) fn new(lob: Weak<Mutex<LobState<Character>>>, pos: u64, len: u64, chars_per_fetch: u64) -> Self {
        Self { lob, pos, remaining: len, chars_per_fetch, text: Vec::new(), consumed: 0 }
    }

    /// Fetches the next batch of characters. Returns `false` at the end of the requested range.
    fn fetch(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        let lob = self.lob.upgrade().ok_or(Error::Freed)?;
        let mut state = lob.lock();
        let len = cmp::min(self.remaining, self.chars_per_fetch) as usize;
        let text = read_substring(&mut state, self.pos, len)?;
        if text.is_empty() {
            self.remaining = 0;
            return Ok(false);
        }
        let num_chars = text.chars().count() as u64;
        self.pos += num_chars;
        self.remaining -= num_chars;
        self.text = text.into_bytes();
        self.consumed = 0;
        Ok(true)
    }
}

impl io::Read for CharReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.consumed == self.text.len() && !self.fetch()? {
            return Ok(0);
        }
        let len = cmp::min(buf.len(), self.text.len() - self.consumed);
        buf[..len].copy_from_slice(&self.text[self.consumed..self.consumed + len]);
        self.consumed += len;
        Ok(len)
    }
}
