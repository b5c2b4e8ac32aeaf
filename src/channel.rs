//! Transport the LOBs use to reach their content.

mod memory;

pub use memory::MemoryChannel;

use crate::{LobHandle, LobKind, Result};

/**
    Blocking request/response channel to the server that stores LOB content.

    The channel knows nothing about characters, positions or buffering. LOBs call it
    with 0-based byte offsets and bounded buffers and loop as needed.
*/
pub trait LobChannel: Send + Sync {
    /// Creates a new empty LOB on the server and returns its handle.
    fn new_lob(&self, kind: LobKind) -> Result<LobHandle>;

    /**
        Reads up to `buf.len()` bytes of content starting at `offset`.

        Returns the number of bytes placed into `buf`. This may be less than requested
        even before the end of the content is reached.
    */
    fn read(&self, handle: &LobHandle, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /**
        Writes `data` at `offset` and returns the number of bytes the server accepted.

        `offset` is always the current end of the content. Writing anywhere else is
        undefined at this level.
    */
    fn write(&self, handle: &LobHandle, offset: u64, data: &[u8]) -> Result<usize>;
}
