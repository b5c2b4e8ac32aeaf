mod common;

use common::{chunked, init_logging};
use lobio::*;
use std::sync::Arc;

const C : usize = DEFAULT_CHUNK_SIZE;

fn stored_clob(channel: &Arc<MemoryChannel>, text: &str, config: &LobConfig) -> Result<CLOB> {
    let handle = channel.insert(LobKind::Character, text.as_bytes().to_vec());
    CLOB::from_handle_with_config(channel.clone(), handle, false, config)
}

#[test]
fn character_split_by_chunk_boundary() -> Result<()> {
    init_logging();
    // the 4-byte character takes bytes C-2..C+2
    let text = format!("{}😀bc", "a".repeat(C - 2));
    let num_chars = C + 1;
    let channel = Arc::new(MemoryChannel::new());
    let config = LobConfig::default();

    let lob = stored_clob(&channel, &text, &config)?;
    assert_eq!(lob.get_sub_string(1, num_chars + 10)?, text);
    assert_eq!(channel.reads(), 2, "every byte is fetched once");
    assert_eq!(lob.get_sub_string(C as u64 - 1, 1)?, "😀");

    channel.reset_counters();
    let lob = stored_clob(&channel, &text, &config)?;
    let mut one_by_one = String::new();
    for pos in 1..=num_chars as u64 {
        one_by_one.push_str(&lob.get_sub_string(pos, 1)?);
    }
    assert!(one_by_one == text);
    assert_eq!(channel.reads(), 2, "every byte is fetched once");
    assert_eq!(lob.get_sub_string(num_chars as u64 + 1, 1)?, "");
    assert_eq!(lob.length()?, num_chars as u64);
    assert_eq!(channel.reads(), 2, "length is known at the end");
    Ok(())
}

#[test]
fn small_chunks_of_mixed_width_text() -> Result<()> {
    let text = "ÿ€😀a".repeat(40);
    let channel = Arc::new(MemoryChannel::new());
    let chars : Vec<char> = text.chars().collect();

    for chunk_size in [8, 9, 10, 11, 13] {
        let lob = stored_clob(&channel, &text, &chunked(chunk_size))?;
        assert_eq!(lob.length()?, 160, "chunk size {}", chunk_size);
        for pos in (1..=160).step_by(7) {
            let expected : String = chars[pos - 1..].iter().take(5).collect();
            assert_eq!(lob.get_sub_string(pos as u64, 5)?, expected, "chunk size {}, position {}", chunk_size, pos);
        }
    }
    Ok(())
}

#[test]
fn backward_seek() -> Result<()> {
    let text : String = ('a'..='z').cycle().take(100).collect();
    let channel = Arc::new(MemoryChannel::new());
    let lob = stored_clob(&channel, &text, &chunked(8))?;

    assert_eq!(lob.get_sub_string(60, 3)?, &text[59..62]);
    let reads_forward = channel.reads();
    assert_eq!(lob.get_sub_string(3, 4)?, &text[2..6]);
    assert!(channel.reads() > reads_forward, "moving back decodes from the start");
    assert_eq!(lob.get_sub_string(58, 10)?, &text[57..67]);
    assert_eq!(lob.get_sub_string(1, 100)?, text);
    assert_eq!(lob.get_sub_string(99, 100)?, &text[98..]);
    Ok(())
}

#[test]
fn length_is_resolved_once() -> Result<()> {
    let channel = Arc::new(MemoryChannel::new());
    let lob = stored_clob(&channel, "0123456789abcdefghij", &chunked(8))?;
    assert_eq!(channel.reads(), 0, "nothing is fetched up front");

    assert_eq!(lob.length()?, 20);
    assert_eq!(channel.reads(), 3);
    assert_eq!(lob.length()?, 20);
    assert_eq!(channel.reads(), 3);
    Ok(())
}

#[test]
fn appends_keep_length_current() -> Result<()> {
    let channel = Arc::new(MemoryChannel::new());
    let lob = CLOB::with_config(channel.clone(), &chunked(8))?;
    lob.set_string(1, "añb")?;
    assert_eq!(lob.length()?, 3);

    channel.reset_counters();
    lob.set_string(4, "çd")?;
    assert_eq!(lob.length()?, 5);
    assert_eq!(channel.reads(), 0, "append at the known end needs no reads");
    assert_eq!(lob.get_sub_string(3, 3)?, "bçd");
    Ok(())
}

#[test]
fn empty_clob() -> Result<()> {
    let lob = CLOB::new(Arc::new(MemoryChannel::new()))?;
    assert_eq!(lob.length()?, 0);
    assert_eq!(lob.get_sub_string(1, 10)?, "");
    assert_eq!(lob.set_string(1, "")?, 0);
    assert_eq!(lob.length()?, 0);
    assert_eq!(lob.set_string(2, "x"), Err(Error::PositionInvalid { pos: 2, expected: 1 }));
    Ok(())
}

#[test]
fn utf16_clob() -> Result<()> {
    // U+1D11E is a surrogate pair that the first chunk splits
    let text = "abc𝄞 clef";
    for charset in [Charset::Utf16Be, Charset::Utf16Le] {
        let channel = Arc::new(MemoryChannel::new());
        let config = LobConfig { charset, ..chunked(8) };
        let lob = CLOB::with_config(channel.clone(), &config)?;
        assert_eq!(lob.charset()?, charset);
        assert_eq!(lob.set_string(1, text)?, 9);
        assert_eq!(lob.handle()?.size, 20);
        assert_eq!(channel.content(&lob.handle()?), Some(charset.encode(text)?));

        let handle = lob.handle()?;
        for chunk_size in [8, 9] {
            let lob = CLOB::from_handle_with_config(channel.clone(), handle.clone(), false, &chunked(chunk_size))?;
            assert_eq!(lob.charset()?, charset, "charset comes from the handle");
            assert_eq!(lob.length()?, 9);
            assert_eq!(lob.get_sub_string(4, 1)?, "𝄞");
            assert_eq!(lob.get_sub_string(3, 4)?, "c𝄞 c");
            assert_eq!(lob.get_sub_string(1, 20)?, text);
        }
    }
    Ok(())
}

#[test]
fn single_byte_clobs() -> Result<()> {
    let config = LobConfig { charset: Charset::Latin1, ..chunked(8) };
    let lob = CLOB::with_config(Arc::new(MemoryChannel::new()), &config)?;
    assert_eq!(lob.set_string(1, "Größe")?, 5);
    assert_eq!(lob.handle()?.size, 5);
    assert_eq!(lob.set_string(6, "€"), Err(Error::InvalidArgument(String::new())));
    assert_eq!(lob.length()?, 5);
    assert_eq!(lob.get_sub_string(3, 2)?, "öß");

    let lob = CLOB::from_bytes(vec![b'o', b'k', 0xe9], Charset::Ascii);
    assert_eq!(lob.get_sub_string(1, 3)?, "ok\u{fffd}");
    Ok(())
}

#[test]
fn malformed_utf8_is_replaced() -> Result<()> {
    let channel = Arc::new(MemoryChannel::new());
    let handle = channel.insert(LobKind::Character, vec![b'a', 0xff, b'b', b'c']);
    let lob = CLOB::from_handle_with_config(channel, handle, false, &LobConfig::default())?;
    assert_eq!(lob.get_sub_string(1, 10)?, "a\u{fffd}bc");
    assert_eq!(lob.length()?, 4);
    Ok(())
}

#[test]
fn malformed_bytes_before_the_last_chunk() -> Result<()> {
    init_logging();
    let mut content = vec![b'a', 0xff];
    content.extend_from_slice(b"bcdefghij");
    // a 2-byte sequence cut short by 'x', and a 3-byte one cut short by 'y'
    content.extend_from_slice(&[0xc3, b'x', 0xe2, 0x82, b'y']);
    let expected = "a\u{fffd}bcdefghij\u{fffd}x\u{fffd}y";
    let channel = Arc::new(MemoryChannel::new());
    let handle = channel.insert(LobKind::Character, content);

    for chunk_size in [8, 9, 10, 64] {
        let lob = CLOB::from_handle_with_config(channel.clone(), handle.clone(), false, &chunked(chunk_size))?;
        assert_eq!(lob.get_sub_string(1, 100)?, expected, "chunk size {}", chunk_size);
        assert_eq!(lob.length()?, 15, "chunk size {}", chunk_size);
        assert_eq!(lob.get_sub_string(8, 3)?, "ghi", "chunk size {}", chunk_size);
        assert_eq!(lob.get_sub_string(12, 4)?, "\u{fffd}x\u{fffd}y", "chunk size {}", chunk_size);
    }
    Ok(())
}
