use super::LobChannel;
use crate::{Error, LobHandle, LobKind, Result};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

/**
    In-process channel that keeps LOB content in memory.

    Besides serving as a stand-in server, it counts round trips and can be set up to
    deliver short reads or to fail writes, which makes it the channel of choice for tests.

    # Example
    ```
    use lobio::{MemoryChannel, LobChannel, LobKind};

    let channel = MemoryChannel::new().with_max_transfer(3);
    let handle = channel.insert(LobKind::Binary, b"Hello, World!".to_vec());
    let mut buf = [0u8; 8];
    let num_read = channel.read(&handle, 7, &mut buf)?;
    assert_eq!(num_read, 3);
    assert_eq!(&buf[..num_read], b"Wor");
    assert_eq!(channel.reads(), 1);
    # Ok::<(),lobio::Error>(())
    ```
*/
#[derive(Debug, Default)]
pub struct MemoryChannel {
    lobs: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicUsize,
    max_transfer: Option<usize>,
    writes_until_failure: Mutex<Option<usize>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of bytes any single read or write moves.
    pub fn with_max_transfer(mut self, max_transfer: usize) -> Self {
        self.max_transfer = Some(max_transfer.max(1));
        self
    }

    /// Makes every write after the first `num_writes` fail with a communication error.
    pub fn fail_after_writes(&self, num_writes: usize) {
        *self.writes_until_failure.lock() = Some(num_writes);
    }

    /// Stores `content` as a new LOB and returns a handle that refers to it.
    pub fn insert(&self, kind: LobKind, content: Vec<u8>) -> LobHandle {
        let mut handle = LobHandle::new(kind, &self.next_locator());
        handle.size = content.len() as u64;
        if let Some( locator ) = handle.locator.as_ref() {
            self.lobs.lock().insert(locator.clone(), content);
        }
        handle
    }

    /// Returns a copy of the content stored for the handle.
    pub fn content(&self, handle: &LobHandle) -> Option<Vec<u8>> {
        let locator = handle.locator.as_ref()?;
        self.lobs.lock().get(locator).cloned()
    }

    /// Number of `read` requests served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write` requests served so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    fn next_locator(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("mem:lob/{:05}", id)
    }

    fn transfer_len(&self, requested: usize) -> usize {
        self.max_transfer.map_or(requested, |max| requested.min(max))
    }
}

fn locator_of(handle: &LobHandle) -> Result<&str> {
    handle.locator.as_deref().ok_or_else(|| Error::Communication("handle has no locator".to_owned()))
}

impl LobChannel for MemoryChannel {
    fn new_lob(&self, kind: LobKind) -> Result<LobHandle> {
        Ok( self.insert(kind, Vec::new()) )
    }

    fn read(&self, handle: &LobHandle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let locator = locator_of(handle)?;
        let lobs = self.lobs.lock();
        let content = lobs.get(locator).ok_or_else(|| Error::Communication(format!("unknown LOB {}", locator)))?;
        if offset >= content.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let len = self.transfer_len(buf.len()).min(content.len() - start);
        buf[..len].copy_from_slice(&content[start..start + len]);
        Ok(len)
    }

    fn write(&self, handle: &LobHandle, offset: u64, data: &[u8]) -> Result<usize> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        {
            let mut writes_until_failure = self.writes_until_failure.lock();
            if let Some( remaining ) = writes_until_failure.as_mut() {
                if *remaining == 0 {
                    return Err( Error::Communication("connection reset".to_owned()) );
                }
                *remaining -= 1;
            }
        }
        let locator = locator_of(handle)?;
        let mut lobs = self.lobs.lock();
        let content = lobs.get_mut(locator).ok_or_else(|| Error::Communication(format!("unknown LOB {}", locator)))?;
        if offset != content.len() as u64 {
            return Err( Error::Communication(format!("write at {} does not append to {} bytes of {}", offset, content.len(), locator)) );
        }
        let len = self.transfer_len(data.len());
        content.extend_from_slice(&data[..len]);
        Ok(len)
    }
}
