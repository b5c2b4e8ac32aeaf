//! Functions for performing operations on large objects (LOBs).

mod blob;
mod clob;
mod stream;
mod window;

pub use stream::{ByteReader, CharReader, LobWriter, ClobWriter};

use crate::{Error, Result, LobChannel, LobHandle, LobKind};
use parking_lot::{Mutex, MutexGuard};
use std::{cmp, sync::{Arc, Weak}};
use stream::WriterRegistry;
use tracing::{debug, trace};

/// Marker for the kind of content a [`LOB`] holds - [`Binary`] or [`Character`].
pub trait LobType: Send + 'static {
    const KIND: LobKind;

    #[doc(hidden)]
    type Window: Send;

    /// Forgets everything known about the content beyond its byte size.
    #[doc(hidden)]
    fn invalidate(window: &mut Self::Window);

    /// Records that content was appended. `num_chars` is `None` when the number of appended characters is unknown.
    #[doc(hidden)]
    fn appended(window: &mut Self::Window, num_chars: Option<u64>);
}

/// Binary content. See [`BLOB`](crate::BLOB).
pub struct Binary;

/// Character content. See [`CLOB`](crate::CLOB).
pub struct Character;

impl LobType for Binary {
    const KIND: LobKind = LobKind::Binary;
    type Window = ();
    fn invalidate(_window: &mut ()) {}
    fn appended(_window: &mut (), _num_chars: Option<u64>) {}
}

impl LobType for Character {
    const KIND: LobKind = LobKind::Character;
    type Window = window::CharWindow;

    fn invalidate(window: &mut Self::Window) {
        window.invalidate();
    }

    fn appended(window: &mut Self::Window, num_chars: Option<u64>) {
        match num_chars {
            Some( num_chars ) => window.appended(num_chars),
            None => window.invalidate(),
        }
    }
}

/// Where LOB content comes from.
pub(crate) enum Content {
    /// Remote content reached through the channel.
    Locator(Arc<dyn LobChannel>),
    /// Content that was delivered together with its handle.
    Inline(Vec<u8>),
}

/// Chunked byte-level access to LOB content.
pub(crate) struct LobCore {
    content: Content,
    handle: LobHandle,
    writable: bool,
    chunk_size: usize,
}

impl LobCore {
    pub(crate) fn new(content: Content, handle: LobHandle, writable: bool, chunk_size: usize) -> Self {
        let writable = writable && matches!(content, Content::Locator(_));
        Self { content, handle, writable, chunk_size }
    }

    pub(crate) fn size(&self) -> u64 {
        self.handle.size
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Makes a single read request.
    fn read_some(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match &self.content {
            Content::Locator(channel) => {
                let num_read = channel.read(&self.handle, offset, buf)?;
                trace!(offset, requested = buf.len(), delivered = num_read, "LOB read");
                Ok(num_read)
            }
            Content::Inline(data) => {
                let start = cmp::min(offset, data.len() as u64) as usize;
                let len = cmp::min(buf.len(), data.len() - start);
                buf[..len].copy_from_slice(&data[start..start + len]);
                Ok(len)
            }
        }
    }

    /**
        Fills `buf` with content starting at byte `offset`, one chunk at a time.

        The caller has already clamped the range to the LOB size, thus running out of
        data before `buf` is full means the channel broke the size contract.
    */
    pub(crate) fn read_exact_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let end = cmp::min(buf.len(), filled + self.chunk_size);
            let num_read = self.read_some(offset + filled as u64, &mut buf[filled..end])?;
            if num_read == 0 {
                return Err( Error::invariant(format!(
                    "LOB of {} bytes ended at byte {} while {} more bytes were expected",
                    self.handle.size, offset + filled as u64, buf.len() - filled
                )) );
            }
            filled += num_read;
        }
        Ok(())
    }

    pub(crate) fn read_exact_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.read_exact_into(offset, &mut data)?;
        Ok(data)
    }

    /**
        Writes `data` at the end of the content, one chunk at a time.

        The size is advanced after each confirmed chunk, so if the channel fails midway the
        size still accounts for every chunk that made it.
    */
    fn append(&mut self, data: &[u8]) -> Result<usize> {
        let channel = match &self.content {
            Content::Locator(channel) => channel.clone(),
            Content::Inline(_) => return Err( Error::NotWritable ),
        };
        let mut written = 0;
        while written < data.len() {
            let end = cmp::min(data.len(), written + self.chunk_size);
            let num_written = channel.write(&self.handle, self.handle.size, &data[written..end])?;
            trace!(offset = self.handle.size, requested = end - written, accepted = num_written, "LOB write");
            if num_written == 0 {
                return Err( Error::invariant(format!("channel accepted none of {} bytes", end - written)) );
            }
            self.handle.size += num_written as u64;
            written += num_written;
        }
        Ok(written)
    }
}

/// State shared by a LOB and the streams opened on it.
pub struct LobState<T: LobType> {
    pub(crate) core: Option<LobCore>,
    pub(crate) window: T::Window,
    pub(crate) writers: WriterRegistry,
}

impl<T: LobType> LobState<T> {
    pub(crate) fn core(&self) -> Result<&LobCore> {
        self.core.as_ref().ok_or(Error::Freed)
    }
}

/// Converts a 1-based position into a 0-based offset.
pub(crate) fn offset_of(pos: u64) -> Result<u64> {
    if pos < 1 {
        Err( Error::InvalidArgument(format!("position must be 1 or greater, got {}", pos)) )
    } else {
        Ok( pos - 1 )
    }
}

/**
    Appends `data` to the content. `pos` is the 1-based byte position the caller expects
    the end of the LOB to be at.
*/
pub(crate) fn append_bytes<T: LobType>(state: &mut LobState<T>, pos: u64, data: &[u8], num_chars: Option<u64>) -> Result<usize> {
    let LobState { core, window, .. } = state;
    let core = core.as_mut().ok_or(Error::Freed)?;
    if !core.writable {
        return Err( Error::NotWritable );
    }
    let expected = core.size() + 1;
    if pos != expected {
        return Err( Error::PositionInvalid { pos, expected } );
    }
    let size_before = core.size();
    match core.append(data) {
        Ok( written ) => {
            T::appended(window, num_chars);
            Ok(written)
        }
        Err( err ) => {
            if core.size() != size_before {
                T::appended(window, None);
            }
            Err(err)
        }
    }
}

/**
    LOB locator.

    All operations take `&self`. The LOB content is reached through the channel one chunk at
    a time. Streams opened on a LOB keep only a weak reference to it.
*/
pub struct LOB<T: LobType> {
    state: Arc<Mutex<LobState<T>>>,
}

impl<T: LobType> LOB<T> {
    pub(crate) fn make(core: LobCore, window: T::Window) -> Self {
        let state = LobState { core: Some(core), window, writers: WriterRegistry::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, LobState<T>> {
        self.state.lock()
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<LobState<T>>> {
        Arc::downgrade(&self.state)
    }

    /// Returns `true` if the content of this LOB can be appended to.
    pub fn is_writable(&self) -> Result<bool> {
        Ok( self.lock().core()?.writable )
    }

    /// Returns a snapshot of the LOB's handle.
    pub fn handle(&self) -> Result<LobHandle> {
        Ok( self.lock().core()?.handle.clone() )
    }

    /**
        Returns the LOB handle in the packed form that can be sent to the server.

        # Example
        ```
        use lobio::{BLOB, LobHandle, MemoryChannel};
        use std::sync::Arc;

        let channel = Arc::new(MemoryChannel::new());
        let lob = BLOB::new(channel.clone())?;
        lob.set_bytes(1, b"Hello")?;
        let packed = lob.packed_handle()?;

        let copy = BLOB::from_packed(channel, &packed, false)?;
        assert_eq!(copy.length()?, 5);
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn packed_handle(&self) -> Result<Vec<u8>> {
        Ok( self.lock().core()?.handle.pack() )
    }

    /**
        Reads up to `len` bytes of the raw content starting at the 1-based byte position `pos`.

        The read stops at the end of the LOB. Requests that start past the end return nothing.

        # Failures
        - `pos` is 0
        - The channel failed or delivered less than the LOB size promised
    */
    pub fn get_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let offset = offset_of(pos)?;
        let state = self.lock();
        let core = state.core()?;
        let available = core.size().saturating_sub(offset);
        let len = cmp::min(len as u64, available) as usize;
        if len == 0 {
            return Ok(Vec::new());
        }
        core.read_exact_at(offset, len)
    }

    /**
        Appends raw bytes. `pos` must be the position right after the last byte of the LOB.

        Returns the number of bytes written.

        # Failures
        - The LOB is read-only
        - `pos` is not the current byte length + 1
        - The channel failed. Chunks written before the failure stay in the LOB.
    */
    pub fn set_bytes(&self, pos: u64, data: &[u8]) -> Result<usize> {
        self.set_bytes_from(pos, data, 0, data.len())
    }

    /// Appends `len` bytes of `data` starting at `offset`. See [`LOB::set_bytes`].
    pub fn set_bytes_from(&self, pos: u64, data: &[u8], offset: usize, len: usize) -> Result<usize> {
        let end = offset.checked_add(len).filter(|&end| end <= data.len()).ok_or_else(||
            Error::InvalidArgument(format!("range {}+{} is out of bounds of {} bytes", offset, len, data.len()))
        )?;
        let mut state = self.lock();
        let num_chars = if matches!(T::KIND, LobKind::Binary) { Some(0) } else { None };
        append_bytes(&mut state, pos, &data[offset..end], num_chars)
    }

    /**
        Pushes the buffered data of every open writer of this LOB into the LOB.

        Writers stay open and registered.
    */
    pub fn flush_all_writers(&self) -> Result<()> {
        let mut state = self.lock();
        state.core()?;
        for slot in state.writers.slots() {
            let mut slot = slot.lock();
            stream::flush_slot(&mut state, &mut slot)?;
        }
        Ok(())
    }

    /**
        Releases the LOB. All open writers are dropped from the registry and any further use
        of this LOB or of its streams fails with [`Error::Freed`].
    */
    pub fn free(&self) -> Result<()> {
        let mut state = self.lock();
        let core = state.core.take().ok_or(Error::Freed)?;
        let num_writers = state.writers.clear();
        T::invalidate(&mut state.window);
        debug!(locator = ?core.handle.locator, num_writers, "LOB freed");
        Ok(())
    }

    /// Searching LOB content is not supported.
    pub fn position(&self, _pattern: &[u8], _start: u64) -> Result<u64> {
        Err( Error::Unsupported("position") )
    }

    /// LOBs can only grow. Truncation is not supported.
    pub fn truncate(&self, _len: u64) -> Result<()> {
        Err( Error::Unsupported("truncate") )
    }
}
