//! LOB access settings

use crate::{Charset, Error, Result};
use once_cell::sync::OnceCell;
use std::env;

/// Number of bytes transferred in one channel round trip, unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE : usize = 128 * 1024;

/// A chunk must hold a complete character and the start of the next one in any supported charset.
const MIN_CHUNK_SIZE : usize = 8;

const CHUNK_SIZE_VAR : &str = "LOBIO_CHUNK_SIZE";
const CHARSET_VAR    : &str = "LOBIO_CHARSET";

/// Settings that LOBs are created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobConfig {
    /// Upper bound on the bytes moved by one channel read or write. Also the capacity of stream buffers.
    pub chunk_size: usize,
    /// Character set of new CLOBs and of CLOBs whose handle does not name one.
    pub charset: Charset,
}

impl Default for LobConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, charset: Charset::Utf8 }
    }
}

impl LobConfig {
    /**
        Creates settings with the specified chunk size and the default character set.

        # Failures
        - The chunk size is too small to hold two characters.
    */
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self> {
        check_chunk_size(chunk_size)?;
        Ok( Self { chunk_size, ..Self::default() } )
    }

    /**
        Reads settings from the environment:
        - `LOBIO_CHUNK_SIZE` - the chunk size in bytes
        - `LOBIO_CHARSET` - the default character set name

        Unset variables keep their default values.
    */
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok( value ) = env::var(CHUNK_SIZE_VAR) {
            let chunk_size = value.trim().parse::<usize>().map_err(|_|
                Error::InvalidArgument(format!("{} is not a number: {:?}", CHUNK_SIZE_VAR, value))
            )?;
            check_chunk_size(chunk_size)?;
            config.chunk_size = chunk_size;
        }
        if let Ok( value ) = env::var(CHARSET_VAR) {
            config.charset = Charset::from_name(&value)?;
        }
        Ok(config)
    }
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size < MIN_CHUNK_SIZE {
        Err( Error::InvalidArgument(format!("chunk size must be at least {} bytes, got {}", MIN_CHUNK_SIZE, chunk_size)) )
    } else {
        Ok(())
    }
}

/**
    Returns the process-wide settings used by the `new`/`from_*` constructors.

    They are read from the environment on first use (see [`LobConfig::from_env`]). Invalid
    environment values are logged and replaced by defaults.
*/
pub fn config() -> &'static LobConfig {
    static CONFIG: OnceCell<LobConfig> = OnceCell::new();
    CONFIG.get_or_init(|| {
        LobConfig::from_env().unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring LOB settings from the environment");
            LobConfig::default()
        })
    })
}
