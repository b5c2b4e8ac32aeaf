use super::{*, stream::*};
use crate::{config, LobConfig};
use std::io::BufReader;

impl LOB<Binary> {
    /// Creates a new empty BLOB using the process-wide settings.
    pub fn new(channel: Arc<dyn LobChannel>) -> Result<Self> {
        Self::with_config(channel, config())
    }

    /**
        Creates a new empty BLOB on the server. The LOB is writable.

        # Example
        ```
        use lobio::{BLOB, LobConfig, MemoryChannel};
        use std::sync::Arc;

        let channel = Arc::new(MemoryChannel::new());
        let config = LobConfig::with_chunk_size(4096)?;
        let lob = BLOB::with_config(channel.clone(), &config)?;
        let data = vec![42u8; 10000];
        let written = lob.set_bytes(1, &data)?;
        assert_eq!(written, 10000);
        // 4096 + 4096 + 1808
        assert_eq!(channel.writes(), 3);
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn with_config(channel: Arc<dyn LobChannel>, config: &LobConfig) -> Result<Self> {
        let handle = channel.new_lob(LobKind::Binary)?;
        debug!(locator = ?handle.locator, "new BLOB");
        let core = LobCore::new(Content::Locator(channel), handle, true, config.chunk_size);
        Ok( Self::make(core, ()) )
    }

    /// Wraps an existing BLOB, for example one fetched as part of a result row.
    pub fn from_handle(channel: Arc<dyn LobChannel>, handle: LobHandle, writable: bool) -> Result<Self> {
        Self::from_handle_with_config(channel, handle, writable, config())
    }

    pub fn from_handle_with_config(channel: Arc<dyn LobChannel>, handle: LobHandle, writable: bool, config: &LobConfig) -> Result<Self> {
        if handle.kind != LobKind::Binary {
            return Err( Error::invalid_arg("handle does not refer to a binary LOB") );
        }
        let core = LobCore::new(Content::Locator(channel), handle, writable, config.chunk_size);
        Ok( Self::make(core, ()) )
    }

    /// Wraps an existing BLOB given its packed handle.
    pub fn from_packed(channel: Arc<dyn LobChannel>, packed: &[u8], writable: bool) -> Result<Self> {
        let handle = LobHandle::unpack(packed)?;
        Self::from_handle(channel, handle, writable)
    }

    /// Creates a read-only BLOB over content that was delivered inline.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let handle = LobHandle { kind: LobKind::Binary, size: data.len() as u64, locator: None, charset: None };
        let core = LobCore::new(Content::Inline(data), handle, false, config().chunk_size);
        Self::make(core, ())
    }

    /// Returns the number of bytes in the LOB.
    pub fn length(&self) -> Result<u64> {
        Ok( self.lock().core()?.size() )
    }

    /// Returns a buffered reader over the entire content.
    pub fn get_binary_stream(&self) -> Result<BufReader<ByteReader<Binary>>> {
        self.open_read_stream(1, u64::MAX)
    }

    /**
        Returns a buffered reader over up to `len` bytes starting at the 1-based position `pos`.

        The range is clamped to the size of the LOB at the time the stream is opened.

        # Example
        ```
        use lobio::{BLOB, MemoryChannel};
        use std::{io::Read, sync::Arc};

        let lob = BLOB::new(Arc::new(MemoryChannel::new()))?;
        lob.set_bytes(1, b"%PDF-1.3 ... %%EOF")?;

        let mut header = String::new();
        lob.open_read_stream(1, 8)?.read_to_string(&mut header)?;
        assert_eq!(header, "%PDF-1.3");
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn open_read_stream(&self, pos: u64, len: u64) -> Result<BufReader<ByteReader<Binary>>> {
        let offset = offset_of(pos)?;
        let state = self.lock();
        let core = state.core()?;
        let len = cmp::min(len, core.size().saturating_sub(offset));
        let reader = ByteReader::new(self.downgrade(), offset, len);
        Ok( BufReader::with_capacity(core.chunk_size(), reader) )
    }

    /**
        Returns a writer that appends to the LOB starting at the 1-based position `pos`,
        which must be right after the last byte of the LOB.

        The writer buffers up to one chunk. Its data reaches the LOB when the buffer fills,
        on `flush`, on `close`, when the LOB's [`flush_all_writers`](LOB::flush_all_writers)
        is called, and, on a best-effort basis, when the writer is dropped.

        # Example
        ```
        use lobio::{BLOB, MemoryChannel};
        use std::{io::Write, sync::Arc};

        let lob = BLOB::new(Arc::new(MemoryChannel::new()))?;
        let mut writer = lob.open_write_stream(1)?;
        writer.write_all(b"Hello, ")?;
        writer.write_all(b"World!")?;
        assert_eq!(lob.length()?, 0);

        lob.flush_all_writers()?;
        assert_eq!(lob.length()?, 13);
        writer.close()?;
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn open_write_stream(&self, pos: u64) -> Result<LobWriter<Binary>> {
        offset_of(pos)?;
        let mut state = self.lock();
        let core = state.core()?;
        if !core.writable {
            return Err( Error::NotWritable );
        }
        let expected = core.size() + 1;
        if pos != expected {
            return Err( Error::PositionInvalid { pos, expected } );
        }
        let chunk_size = core.chunk_size();
        let link = WriterLink::register(self.downgrade(), &mut state, pos, false, chunk_size);
        Ok( LobWriter::new(link) )
    }

    /// Alias of [`open_write_stream`](LOB::open_write_stream).
    pub fn set_binary_stream(&self, pos: u64) -> Result<LobWriter<Binary>> {
        self.open_write_stream(pos)
    }
}
