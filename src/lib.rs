#![cfg_attr(not(doctest), doc=include_str!("../README.md"))]

mod err;
mod config;
mod charset;
mod handle;
mod channel;
mod lob;

pub use err::Error;
pub use config::{config, LobConfig, DEFAULT_CHUNK_SIZE};
pub use charset::Charset;
pub use handle::{LobHandle, LobKind};
pub use channel::{LobChannel, MemoryChannel};
pub use lob::{LOB, LobType, Binary, Character, ByteReader, CharReader, LobWriter, ClobWriter};

pub type Result<T> = std::result::Result<T, Error>;
pub type BLOB      = lob::LOB<lob::Binary>;
pub type CLOB      = lob::LOB<lob::Character>;
