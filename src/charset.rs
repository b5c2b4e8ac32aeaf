//! Character sets a CLOB can be stored in.

use crate::{Error, Result};

const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

/// Encoding of the bytes stored in a character LOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Utf16Be,
    Utf16Le,
    /// ISO-8859-1
    Latin1,
    /// US-ASCII
    Ascii,
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Utf8
    }
}

impl Charset {
    /**
        Looks up a character set by one of its common names. The lookup is case-insensitive.

        # Example
        ```
        use lobio::Charset;

        assert_eq!(Charset::from_name("UTF-8")?, Charset::Utf8);
        assert_eq!(Charset::from_name("iso88591")?, Charset::Latin1);
        assert!(Charset::from_name("ebcdic").is_err());
        # Ok::<(),lobio::Error>(())
        ```
    */
    pub fn from_name(name: &str) -> Result<Self> {
        let charset = match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "al32utf8"                   => Charset::Utf8,
            "utf-16" | "utf-16be" | "utf16" | "utf16be"     => Charset::Utf16Be,
            "utf-16le" | "utf16le"                          => Charset::Utf16Le,
            "iso-8859-1" | "iso8859-1" | "iso88591" | "latin1" | "latin-1" => Charset::Latin1,
            "us-ascii" | "ascii"                            => Charset::Ascii,
            _ => return Err( Error::InvalidArgument(format!("unknown character set {:?}", name)) ),
        };
        Ok(charset)
    }

    /// Returns the canonical name of the character set.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8    => "UTF-8",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Latin1  => "ISO-8859-1",
            Charset::Ascii   => "US-ASCII",
        }
    }

    /**
        Decodes bytes into characters.

        Decoding is lossy: malformed sequences, and a sequence truncated by the end of `bytes`,
        come out as U+FFFD.
    */
    pub fn decode(&self, bytes: &[u8]) -> Vec<char> {
        let mut chars = Vec::with_capacity(bytes.len());
        self.decode_into(bytes, &mut chars, &mut Vec::new());
        chars
    }

    /**
        Decodes bytes and appends the characters to `chars`. For every character pushes
        the number of source bytes it was decoded from to `widths`.

        A U+FFFD spans exactly the bytes it replaced, so the widths always add up to `bytes.len()`.
    */
    pub(crate) fn decode_into(&self, bytes: &[u8], chars: &mut Vec<char>, widths: &mut Vec<u8>) {
        match self {
            Charset::Utf8    => decode_utf8(bytes, chars, widths),
            Charset::Utf16Be => decode_utf16(bytes, u16::from_be_bytes, chars, widths),
            Charset::Utf16Le => decode_utf16(bytes, u16::from_le_bytes, chars, widths),
            Charset::Latin1  => {
                chars.extend(bytes.iter().map(|&b| b as char));
                widths.resize(widths.len() + bytes.len(), 1);
            }
            Charset::Ascii   => {
                chars.extend(bytes.iter().map(|&b| if b < 0x80 { b as char } else { REPLACEMENT }));
                widths.resize(widths.len() + bytes.len(), 1);
            }
        }
    }

    /// Encodes text. Fails if the text has characters that this character set cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Charset::Utf8    => Ok( text.as_bytes().to_vec() ),
            Charset::Utf16Be => Ok( text.encode_utf16().flat_map(u16::to_be_bytes).collect() ),
            Charset::Utf16Le => Ok( text.encode_utf16().flat_map(u16::to_le_bytes).collect() ),
            Charset::Latin1  => encode_single_byte(text, 0xff, self.name()),
            Charset::Ascii   => encode_single_byte(text, 0x7f, self.name()),
        }
    }
}

/// Each maximal invalid sequence, and an incomplete one at the end, comes out as one U+FFFD.
fn decode_utf8(bytes: &[u8], chars: &mut Vec<char>, widths: &mut Vec<u8>) {
    let mut rest = bytes;
    while !rest.is_empty() {
        let (valid, invalid_len) = match std::str::from_utf8(rest) {
            Ok( text ) => (text, 0),
            Err( err ) => {
                let valid_len = err.valid_up_to();
                let text = std::str::from_utf8(&rest[..valid_len]).unwrap_or_default();
                (text, err.error_len().unwrap_or(rest.len() - valid_len))
            }
        };
        for c in valid.chars() {
            chars.push(c);
            widths.push(c.len_utf8() as u8);
        }
        if invalid_len > 0 {
            chars.push(REPLACEMENT);
            widths.push(invalid_len as u8);
        }
        rest = &rest[valid.len() + invalid_len..];
    }
}

/// A tail cut inside a code unit or a surrogate pair comes out as one U+FFFD.
fn decode_utf16(bytes: &[u8], to_unit: fn([u8;2]) -> u16, chars: &mut Vec<char>, widths: &mut Vec<u8>) {
    let units : Vec<u16> = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]])).collect();
    let (units, tail_len) = match units.split_last() {
        Some((&last, head)) if (0xd800..0xdc00).contains(&last) => (head, 2 + bytes.len() % 2),
        _ => (&units[..], bytes.len() % 2),
    };
    for res in char::decode_utf16(units.iter().copied()) {
        match res {
            Ok( c ) => {
                chars.push(c);
                widths.push(c.len_utf16() as u8 * 2);
            }
            Err( _ ) => {
                chars.push(REPLACEMENT);
                widths.push(2);
            }
        }
    }
    if tail_len > 0 {
        chars.push(REPLACEMENT);
        widths.push(tail_len as u8);
    }
}

fn encode_single_byte(text: &str, max: u32, name: &str) -> Result<Vec<u8>> {
    text.chars().map(|c| {
        let code = c as u32;
        if code <= max {
            Ok( code as u8 )
        } else {
            Err( Error::InvalidArgument(format!("{:?} cannot be encoded in {}", c, name)) )
        }
    }).collect()
}
