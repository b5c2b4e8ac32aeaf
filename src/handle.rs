//! LOB handle - the metadata record that identifies LOB content.

use crate::{Error, Result};

const BLOB_TYPE_CODE : i32 = 23;
const CLOB_TYPE_CODE : i32 = 24;

const PACKED_HEADER_SIZE : usize = 4 + 8 + 4;

/// Kind of content a LOB holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobKind {
    Binary,
    Character,
}

impl LobKind {
    /// Returns the type code used for this kind in the packed handle.
    pub fn type_code(&self) -> i32 {
        match self {
            LobKind::Binary    => BLOB_TYPE_CODE,
            LobKind::Character => CLOB_TYPE_CODE,
        }
    }

    pub fn from_type_code(code: i32) -> Result<Self> {
        match code {
            BLOB_TYPE_CODE => Ok(LobKind::Binary),
            CLOB_TYPE_CODE => Ok(LobKind::Character),
            _ => Err( Error::InvalidArgument(format!("unknown LOB type code {}", code)) ),
        }
    }
}

/**
    Metadata of a LOB.

    `size` is the authoritative byte length of the content. LOBs advance it only after
    the channel confirms a write.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobHandle {
    pub kind: LobKind,
    pub size: u64,
    /// Opaque remote reference to the content. `None` when the content was returned inline.
    pub locator: Option<String>,
    /// Character set name. Only meaningful for character LOBs.
    pub charset: Option<String>,
}

impl LobHandle {
    /// Creates a handle for an empty LOB referenced by `locator`.
    pub fn new(kind: LobKind, locator: &str) -> Self {
        Self { kind, size: 0, locator: Some(locator.to_owned()), charset: None }
    }

    /// Returns `true` if the content is referenced by a remote locator rather than carried inline.
    pub fn locator_present(&self) -> bool {
        self.locator.is_some()
    }

    /**
        Serializes the handle into the packed form the server exchanges:
        big-endian type code (i32), size (i64), locator length (i32, counting
        the terminating NUL) and the NUL-terminated locator.

        The character set is not part of the packed form.

        # Example
        ```
        use lobio::{LobHandle, LobKind};

        let mut handle = LobHandle::new(LobKind::Binary, "file:/lob/ces_001/t1.0001");
        handle.size = 42;
        let packed = handle.pack();
        assert_eq!(LobHandle::unpack(&packed)?, handle);
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn pack(&self) -> Vec<u8> {
        let locator = self.locator.as_deref().unwrap_or("");
        let mut buf = Vec::with_capacity(PACKED_HEADER_SIZE + locator.len() + 1);
        buf.extend_from_slice(&self.kind.type_code().to_be_bytes());
        buf.extend_from_slice(&(self.size as i64).to_be_bytes());
        buf.extend_from_slice(&((locator.len() + 1) as i32).to_be_bytes());
        buf.extend_from_slice(locator.as_bytes());
        buf.push(0);
        buf
    }

    /// Parses a packed handle. See [`LobHandle::pack`] for the layout.
    pub fn unpack(packed: &[u8]) -> Result<Self> {
        if packed.len() < PACKED_HEADER_SIZE {
            return Err( Error::InvalidArgument(format!("packed LOB handle is too short: {} bytes", packed.len())) );
        }
        let kind = LobKind::from_type_code(i32::from_be_bytes(read_array(&packed[0..4])))?;
        let size = i64::from_be_bytes(read_array(&packed[4..12]));
        if size < 0 {
            return Err( Error::InvalidArgument(format!("negative LOB size {}", size)) );
        }
        let locator_len = i32::from_be_bytes(read_array(&packed[12..16]));
        if locator_len < 0 || PACKED_HEADER_SIZE + locator_len as usize > packed.len() {
            return Err( Error::InvalidArgument(format!("invalid locator length {}", locator_len)) );
        }
        let locator = &packed[PACKED_HEADER_SIZE..PACKED_HEADER_SIZE + locator_len as usize];
        let locator = match locator.split_last() {
            Some((&0, text)) => text,
            _ => locator,
        };
        let locator = std::str::from_utf8(locator)
            .map_err(|_| Error::invalid_arg("locator is not valid UTF-8"))?;
        let locator = if locator.is_empty() { None } else { Some(locator.to_owned()) };
        Ok( Self { kind, size: size as u64, locator, charset: None } )
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(bytes);
    array
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_layout() {
        let mut handle = LobHandle::new(LobKind::Character, "ab");
        handle.size = 0x0102;
        let packed = handle.pack();
        assert_eq!(packed, [
            0, 0, 0, 24,
            0, 0, 0, 0, 0, 0, 1, 2,
            0, 0, 0, 3,
            b'a', b'b', 0
        ]);
    }

    #[test]
    fn unpack_rejects_garbage() {
        assert!(LobHandle::unpack(&[0, 0, 0, 23]).is_err());
        let mut packed = LobHandle::new(LobKind::Binary, "x").pack();
        packed[3] = 99;
        assert!(LobHandle::unpack(&packed).is_err());
        let mut packed = LobHandle::new(LobKind::Binary, "x").pack();
        packed[15] = 50;
        assert!(LobHandle::unpack(&packed).is_err());
    }

    #[test]
    fn unpack_drops_charset() {
        let mut handle = LobHandle::new(LobKind::Character, "loc");
        handle.charset = Some("UTF-8".into());
        let unpacked = LobHandle::unpack(&handle.pack()).unwrap();
        assert_eq!(unpacked.charset, None);
        assert_eq!(unpacked.locator.as_deref(), Some("loc"));
    }
}
