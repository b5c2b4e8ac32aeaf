use super::{*, window::CharWindow, stream::*};
use crate::{config, Charset, LobConfig};
use std::io::BufReader;

/// Characters fetched by one refill of a character stream.
fn chars_per_fetch(chunk_size: usize) -> u64 {
    cmp::max(chunk_size / 4, 1) as u64
}

/// Returns up to `len` characters starting at the 1-based character position `pos`.
pub(crate) fn read_substring(state: &mut LobState<Character>, pos: u64, len: usize) -> Result<String> {
    offset_of(pos)?;
    let LobState { core, window, .. } = state;
    let core = core.as_ref().ok_or(Error::Freed)?;
    let num_chars = window.read(core, pos, len)?;
    Ok( window.head(num_chars).iter().collect() )
}

/**
    Verifies that `pos` is where the next character would be appended and returns the
    1-based byte position of the end of the LOB.
*/
fn check_append_position(state: &mut LobState<Character>, pos: u64) -> Result<u64> {
    offset_of(pos)?;
    let LobState { core, window, .. } = state;
    let core = core.as_ref().ok_or(Error::Freed)?;
    if !core.writable {
        return Err( Error::NotWritable );
    }
    if window.read(core, pos, 1)? == 0 {
        if let Some( char_length ) = window.char_length() {
            if pos == char_length + 1 {
                return Ok( core.size() + 1 );
            }
        }
    }
    window.read(core, u64::MAX, 1)?;
    let expected = window.char_length().unwrap_or(0) + 1;
    Err( Error::PositionInvalid { pos, expected } )
}

impl LOB<Character> {
    /// Creates a new empty CLOB using the process-wide settings.
    pub fn new(channel: Arc<dyn LobChannel>) -> Result<Self> {
        Self::with_config(channel, config())
    }

    /**
        Creates a new empty CLOB on the server. The LOB is writable and stores its text
        in the configured character set.

        # Example
        ```
        use lobio::{CLOB, Charset, LobConfig, MemoryChannel};
        use std::sync::Arc;

        let channel = Arc::new(MemoryChannel::new());
        let config = LobConfig { charset: Charset::Utf16Le, ..LobConfig::default() };
        let lob = CLOB::with_config(channel.clone(), &config)?;
        lob.set_string(1, "tête-à-tête")?;

        assert_eq!(lob.length()?, 11);
        assert_eq!(channel.content(&lob.handle()?).map(|bytes| bytes.len()), Some(22));
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn with_config(channel: Arc<dyn LobChannel>, config: &LobConfig) -> Result<Self> {
        let mut handle = channel.new_lob(LobKind::Character)?;
        handle.charset = Some(config.charset.name().to_owned());
        debug!(locator = ?handle.locator, charset = config.charset.name(), "new CLOB");
        let core = LobCore::new(Content::Locator(channel), handle, true, config.chunk_size);
        Ok( Self::make(core, CharWindow::new(config.charset)) )
    }

    /**
        Wraps an existing CLOB, for example one fetched as part of a result row.

        The character set is taken from the handle. If the handle does not name one, the
        configured default is used.
    */
    pub fn from_handle(channel: Arc<dyn LobChannel>, handle: LobHandle, writable: bool) -> Result<Self> {
        Self::from_handle_with_config(channel, handle, writable, config())
    }

    pub fn from_handle_with_config(channel: Arc<dyn LobChannel>, mut handle: LobHandle, writable: bool, config: &LobConfig) -> Result<Self> {
        if handle.kind != LobKind::Character {
            return Err( Error::invalid_arg("handle does not refer to a character LOB") );
        }
        let charset = match handle.charset.as_deref() {
            Some( name ) => Charset::from_name(name)?,
            None => config.charset,
        };
        handle.charset = Some(charset.name().to_owned());
        let core = LobCore::new(Content::Locator(channel), handle, writable, config.chunk_size);
        Ok( Self::make(core, CharWindow::new(charset)) )
    }

    /// Wraps an existing CLOB given its packed handle. The text is expected in the configured character set.
    pub fn from_packed(channel: Arc<dyn LobChannel>, packed: &[u8], writable: bool) -> Result<Self> {
        let handle = LobHandle::unpack(packed)?;
        Self::from_handle(channel, handle, writable)
    }

    /**
        Creates a read-only CLOB over content that was delivered inline.

        # Example
        ```
        use lobio::{CLOB, Charset};

        let lob = CLOB::from_bytes(vec![0x74, 0xea, 0x74, 0x65], Charset::Latin1);
        assert_eq!(lob.get_sub_string(1, 10)?, "tête");
        assert!(!lob.is_writable()?);
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn from_bytes(data: Vec<u8>, charset: Charset) -> Self {
        let handle = LobHandle {
            kind: LobKind::Character,
            size: data.len() as u64,
            locator: None,
            charset: Some(charset.name().to_owned()),
        };
        let core = LobCore::new(Content::Inline(data), handle, false, config().chunk_size);
        Self::make(core, CharWindow::new(charset))
    }

    /// Returns the character set the text of this LOB is encoded in.
    pub fn charset(&self) -> Result<Charset> {
        let state = self.lock();
        state.core()?;
        Ok( state.window.charset() )
    }

    /**
        Returns the number of characters in the LOB.

        The first call on a LOB whose length is not yet known decodes the content to the
        end. The result is cached and kept current by appends.
    */
    pub fn length(&self) -> Result<u64> {
        let mut state = self.lock();
        let LobState { core, window, .. } = &mut *state;
        let core = core.as_ref().ok_or(Error::Freed)?;
        if window.char_length().is_none() {
            window.read(core, u64::MAX, 1)?;
        }
        Ok( window.char_length().unwrap_or(0) )
    }

    /**
        Returns up to `len` characters starting at the 1-based character position `pos`.

        Returns an empty string when `pos` is past the end of the LOB.

        Reading forward is cheap - the decode window just moves on. Reading anything before
        the start of the window decodes the LOB again from its first byte.

        # Example
        ```
        use lobio::{CLOB, MemoryChannel};
        use std::sync::Arc;

        let lob = CLOB::new(Arc::new(MemoryChannel::new()))?;
        assert_eq!(lob.set_string(1, "hello")?, 5);
        assert_eq!(lob.length()?, 5);
        lob.set_string(6, "world")?;
        assert_eq!(lob.length()?, 10);
        assert_eq!(lob.get_sub_string(3, 5)?, "llowo");
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn get_sub_string(&self, pos: u64, len: usize) -> Result<String> {
        read_substring(&mut self.lock(), pos, len)
    }

    /// Returns a buffered reader that yields the whole text as UTF-8.
    pub fn get_character_stream(&self) -> Result<BufReader<CharReader>> {
        self.open_character_stream(1, u64::MAX)
    }

    /**
        Returns a buffered reader that yields up to `len` characters starting at the
        1-based character position `pos`. The text is produced as UTF-8 whatever the
        character set of the LOB is.

        # Example
        ```
        use lobio::{CLOB, MemoryChannel};
        use std::{io::BufRead, sync::Arc};

        let lob = CLOB::new(Arc::new(MemoryChannel::new()))?;
        lob.set_string(1, "To see a World in a Grain of Sand\nAnd a Heaven in a Wild Flower\n")?;

        let lines : Vec<String> = lob.open_character_stream(10, 100)?.lines().collect::<std::io::Result<_>>()?;
        assert_eq!(lines, ["World in a Grain of Sand", "And a Heaven in a Wild Flower"]);
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn open_character_stream(&self, pos: u64, len: u64) -> Result<BufReader<CharReader>> {
        offset_of(pos)?;
        let chunk_size = self.lock().core()?.chunk_size();
        let reader = CharReader::new(self.downgrade(), pos, len, chars_per_fetch(chunk_size));
        Ok( BufReader::with_capacity(chunk_size, reader) )
    }

    /// Returns a buffered reader over the raw bytes of the LOB.
    pub fn get_ascii_stream(&self) -> Result<BufReader<ByteReader<Character>>> {
        let state = self.lock();
        let core = state.core()?;
        let reader = ByteReader::new(self.downgrade(), 0, core.size());
        Ok( BufReader::with_capacity(core.chunk_size(), reader) )
    }

    /**
        Appends text. `pos` must be the character position right after the last character
        of the LOB.

        Returns the number of characters written.

        # Failures
        - The LOB is read-only
        - `pos` is not the current length + 1
        - The text has characters the LOB's character set cannot represent
        - The channel failed
    */
    pub fn set_string(&self, pos: u64, text: &str) -> Result<usize> {
        let mut state = self.lock();
        let byte_pos = check_append_position(&mut state, pos)?;
        let data = state.window.charset().encode(text)?;
        let num_chars = text.chars().count();
        append_bytes(&mut state, byte_pos, &data, Some(num_chars as u64))?;
        Ok(num_chars)
    }

    /**
        Returns a writer that appends text to the LOB starting at the character position `pos`,
        which must be right after the last character of the LOB.

        # Example
        ```
        use lobio::{CLOB, MemoryChannel};
        use std::{fmt::Write, sync::Arc};

        let lob = CLOB::new(Arc::new(MemoryChannel::new()))?;
        let mut writer = lob.set_character_stream(1)?;
        for i in 1..=3 {
            write!(writer, "{};", i)?;
        }
        writer.close()?;
        assert_eq!(lob.get_sub_string(1, 100)?, "1;2;3;");
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn set_character_stream(&self, pos: u64) -> Result<ClobWriter> {
        let mut state = self.lock();
        let byte_pos = check_append_position(&mut state, pos)?;
        let charset = state.window.charset();
        let chunk_size = state.core()?.chunk_size();
        let link = WriterLink::register(self.downgrade(), &mut state, byte_pos, true, chunk_size);
        Ok( ClobWriter::new(link, charset) )
    }

    /**
        Returns a writer that appends raw bytes to the LOB. `pos` is the character position
        right after the last character of the LOB.

        The bytes are expected to be text in the LOB's character set. As their character count
        is not known, the length of the LOB is resolved again when it is next requested.
    */
    pub fn set_ascii_stream(&self, pos: u64) -> Result<LobWriter<Character>> {
        let mut state = self.lock();
        let byte_pos = check_append_position(&mut state, pos)?;
        let chunk_size = state.core()?.chunk_size();
        let link = WriterLink::register(self.downgrade(), &mut state, byte_pos, false, chunk_size);
        Ok( LobWriter::new(link) )
    }
}
