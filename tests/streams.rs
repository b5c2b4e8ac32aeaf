mod common;

use common::{chunked, init_logging};
use lobio::*;
use std::{fmt::Write as _, io::{BufRead, Read, Write}, sync::Arc};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

#[test]
fn blob_read_stream() -> TestResult {
    init_logging();
    let channel = Arc::new(MemoryChannel::new());
    let data : Vec<u8> = (0..100u8).collect();
    let handle = channel.insert(LobKind::Binary, data.clone());
    let lob = BLOB::from_handle_with_config(channel.clone(), handle, false, &chunked(16))?;

    let mut all = Vec::new();
    lob.get_binary_stream()?.read_to_end(&mut all)?;
    assert_eq!(all, data);

    let mut part = Vec::new();
    lob.open_read_stream(91, 50)?.read_to_end(&mut part)?;
    assert_eq!(part, &data[90..]);

    let mut part = Vec::new();
    lob.open_read_stream(11, 5)?.read_to_end(&mut part)?;
    assert_eq!(part, &data[10..15]);

    let mut part = Vec::new();
    lob.open_read_stream(200, 5)?.read_to_end(&mut part)?;
    assert!(part.is_empty());

    assert_eq!(lob.open_read_stream(0, 5).err(), Some(Error::InvalidArgument(String::new())));
    Ok(())
}

#[test]
fn blob_write_stream() -> TestResult {
    init_logging();
    let channel = Arc::new(MemoryChannel::new());
    let lob = BLOB::with_config(channel.clone(), &chunked(8))?;

    let mut writer = lob.open_write_stream(1)?;
    writer.write_all(b"abc")?;
    assert_eq!(lob.length()?, 0, "data stays in the writer buffer");
    assert_eq!(channel.writes(), 0);

    writer.write_all(b"defghijklmnopqrst")?;
    assert_eq!(lob.length()?, 16, "every full buffer is flushed");
    assert_eq!(channel.writes(), 2);

    writer.write_all(b"uv")?;
    writer.flush()?;
    assert_eq!(lob.length()?, 22);
    assert_eq!(channel.writes(), 3);
    writer.close()?;
    assert_eq!(lob.get_bytes(1, 100)?, b"abcdefghijklmnopqrstuv");

    assert_eq!(lob.open_write_stream(1).err(), Some(Error::PositionInvalid { pos: 1, expected: 23 }));
    assert_eq!(lob.open_write_stream(0).err(), Some(Error::InvalidArgument(String::new())));
    Ok(())
}

#[test]
fn large_writes_are_buffered_one_chunk_at_a_time() -> TestResult {
    let channel = Arc::new(MemoryChannel::new());
    let lob = BLOB::with_config(channel.clone(), &chunked(8))?;
    let data : Vec<u8> = (0..100u8).collect();

    let mut writer = lob.open_write_stream(1)?;
    writer.write_all(&data)?;
    assert_eq!(lob.length()?, 96);
    assert_eq!(channel.writes(), 12, "one channel write per chunk");
    writer.close()?;
    assert_eq!(lob.get_bytes(1, 200)?, data);

    let clob = CLOB::with_config(channel.clone(), &chunked(8))?;
    let text = "àéîõü".repeat(10);
    let mut writer = clob.set_character_stream(1)?;
    writer.write_text(&text)?;
    assert_eq!(clob.handle()?.size, 96);
    writer.close()?;
    assert_eq!(clob.length()?, 50);
    assert_eq!(clob.get_sub_string(1, 100)?, text);
    Ok(())
}

#[test]
fn dropped_writer_flushes() -> TestResult {
    let lob = BLOB::new(Arc::new(MemoryChannel::new()))?;
    {
        let mut writer = lob.set_binary_stream(1)?;
        writer.write_all(b"tail")?;
    }
    assert_eq!(lob.length()?, 4);
    assert_eq!(lob.get_bytes(1, 4)?, b"tail");
    Ok(())
}

#[test]
fn flush_all_writers() -> TestResult {
    let lob = BLOB::new(Arc::new(MemoryChannel::new()))?;
    let mut writer = lob.open_write_stream(1)?;
    writer.write_all(b"first ")?;
    lob.flush_all_writers()?;
    assert_eq!(lob.length()?, 6);

    writer.write_all(b"second")?;
    assert_eq!(lob.length()?, 6);
    lob.flush_all_writers()?;
    assert_eq!(lob.length()?, 12);

    writer.close()?;
    lob.flush_all_writers()?;
    assert_eq!(lob.get_bytes(1, 20)?, b"first second");
    Ok(())
}

#[test]
fn clob_character_streams() -> TestResult {
    init_logging();
    let lob = CLOB::with_config(Arc::new(MemoryChannel::new()), &chunked(8))?;
    let mut writer = lob.set_character_stream(1)?;
    for line in ["première ligne", "второй ряд", "third 😀 line"] {
        writeln!(writer, "{}", line)?;
    }
    writer.close()?;
    assert_eq!(lob.length()?, 14 + 1 + 10 + 1 + 12 + 1);

    let lines : Vec<String> = lob.get_character_stream()?.lines().collect::<std::io::Result<_>>()?;
    assert_eq!(lines, ["première ligne", "второй ряд", "third 😀 line"]);

    let mut text = String::new();
    lob.open_character_stream(16, 6)?.read_to_string(&mut text)?;
    assert_eq!(text, "второй");

    let mut text = String::new();
    lob.open_character_stream(100, 6)?.read_to_string(&mut text)?;
    assert!(text.is_empty());
    Ok(())
}

#[test]
fn clob_writer_appends_at_the_end() -> TestResult {
    let lob = CLOB::new(Arc::new(MemoryChannel::new()))?;
    lob.set_string(1, "héllo")?;
    assert_eq!(lob.set_character_stream(5).err(), Some(Error::PositionInvalid { pos: 5, expected: 6 }));

    let mut writer = lob.set_character_stream(6)?;
    writer.write_text(", wörld")?;
    writer.flush()?;
    assert_eq!(lob.length()?, 12);
    writer.write_text("!")?;
    writer.close()?;
    assert_eq!(lob.get_sub_string(1, 20)?, "héllo, wörld!");
    assert_eq!(lob.length()?, 13);
    Ok(())
}

#[test]
fn clob_writer_rejects_unencodable_text() -> TestResult {
    let config = LobConfig { charset: Charset::Ascii, ..LobConfig::default() };
    let lob = CLOB::with_config(Arc::new(MemoryChannel::new()), &config)?;
    let mut writer = lob.set_character_stream(1)?;
    writer.write_text("plain")?;
    assert_eq!(writer.write_text("naïve"), Err(Error::InvalidArgument(String::new())));
    writer.close()?;
    assert_eq!(lob.get_sub_string(1, 20)?, "plain");
    Ok(())
}

#[test]
fn clob_ascii_streams() -> TestResult {
    let lob = CLOB::new(Arc::new(MemoryChannel::new()))?;
    lob.set_string(1, "ab")?;
    let mut writer = lob.set_ascii_stream(3)?;
    writer.write_all("çd".as_bytes())?;
    writer.close()?;
    assert_eq!(lob.length()?, 4);

    let mut raw = Vec::new();
    lob.get_ascii_stream()?.read_to_end(&mut raw)?;
    assert_eq!(raw, "abçd".as_bytes());
    Ok(())
}

#[test]
fn streams_of_freed_lob() -> TestResult {
    let lob = BLOB::new(Arc::new(MemoryChannel::new()))?;
    lob.set_bytes(1, b"content")?;
    let mut reader = lob.get_binary_stream()?;
    let mut writer = lob.open_write_stream(8)?;
    writer.write_all(b"more")?;
    lob.free()?;

    let mut buf = [0u8; 4];
    let err = reader.read(&mut buf).unwrap_err();
    assert_eq!(Error::from_io(&err), Some(&Error::Freed));
    let err = writer.flush().unwrap_err();
    assert_eq!(Error::from_io(&err), Some(&Error::Freed));
    assert_eq!(writer.close(), Err(Error::Freed));

    let clob = CLOB::new(Arc::new(MemoryChannel::new()))?;
    clob.set_string(1, "text")?;
    let mut reader = clob.get_character_stream()?;
    let mut writer = clob.set_character_stream(5)?;
    drop(clob);

    let mut text = String::new();
    let err = reader.read_to_string(&mut text).unwrap_err();
    assert_eq!(Error::from_io(&err), Some(&Error::Freed));
    assert_eq!(writer.write_text("x"), Ok(()));
    assert_eq!(writer.flush(), Err(Error::Freed));
    Ok(())
}

#[test]
fn failed_flush_discards_buffer() -> TestResult {
    init_logging();
    let channel = Arc::new(MemoryChannel::new());
    let lob = BLOB::with_config(channel.clone(), &chunked(8))?;
    let mut writer = lob.open_write_stream(1)?;
    writer.write_all(b"abcd")?;
    channel.fail_after_writes(0);
    assert_eq!(lob.flush_all_writers(), Err(Error::Communication(String::new())));
    assert_eq!(lob.length()?, 0);

    channel.fail_after_writes(usize::MAX);
    writer.write_all(b"ef")?;
    writer.close()?;
    assert_eq!(lob.get_bytes(1, 10)?, b"ef");
    Ok(())
}
