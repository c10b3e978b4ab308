//! Loading raw metadata text from plain-text files, stdin, or PNG text chunks.

use crate::error::SourceError;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// PNG file signature (first 8 bytes of any valid PNG)
const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const PNG_READER_CAPACITY: usize = 128 * 1024;
/// Text chunk keywords A1111/Forge/Civitai write generation parameters under.
const METADATA_KEYS: &[&str] = &[
    "parameters",
    "Parameters",
    "Description",
    "description",
    "Comment",
    "comment",
];

pub const STDIN_MARKER: &str = "-";

/// Reads metadata text for `input`: `-` reads stdin, `.png` files are searched for a
/// parameters text chunk, anything else is read as UTF-8 text.
pub fn load_metadata(input: &Path) -> Result<String, SourceError> {
    if input.as_os_str() == STDIN_MARKER {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| SourceError::Io {
                path: PathBuf::from(STDIN_MARKER),
                source,
            })?;
        return Ok(text);
    }

    if is_png_path(input) {
        let chunks = read_png_text_chunks(input)?;
        return select_metadata(&chunks).ok_or_else(|| SourceError::NoMetadata(input.to_path_buf()));
    }

    std::fs::read_to_string(input).map_err(|source| SourceError::Io {
        path: input.to_path_buf(),
        source,
    })
}

fn is_png_path(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

/// Extracts all PNG text chunks as key/value pairs.
///
/// Only chunk headers and text payloads are read; image data chunks are skipped.
pub fn read_png_text_chunks(path: &Path) -> Result<HashMap<String, String>, SourceError> {
    let io_error = |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let mut reader = BufReader::with_capacity(PNG_READER_CAPACITY, file);
    let mut text_chunks = HashMap::new();

    let mut sig = [0u8; 8];
    if reader.read_exact(&mut sig).is_err() || sig != PNG_SIGNATURE {
        return Err(SourceError::InvalidPng(path.to_path_buf()));
    }

    loop {
        let length = match reader.read_u32::<BigEndian>() {
            Ok(len) => len,
            Err(_) => break, // EOF
        };

        let mut chunk_type = [0u8; 4];
        if reader.read_exact(&mut chunk_type).is_err() {
            break;
        }

        match &chunk_type {
            b"tEXt" | b"zTXt" | b"iTXt" => {
                let mut data = vec![0u8; length as usize];
                reader.read_exact(&mut data).map_err(io_error)?;
                reader.seek(SeekFrom::Current(4)).map_err(io_error)?; // CRC

                let maybe_pair = match &chunk_type {
                    b"tEXt" => parse_text_chunk_pair(&data),
                    b"zTXt" => parse_ztxt_chunk_pair(&data),
                    _ => parse_itxt_chunk_pair(&data),
                };

                if let Some((key, value)) = maybe_pair {
                    text_chunks.insert(key, value);
                }
            }
            b"IEND" => break,
            _ => {
                reader
                    .seek(SeekFrom::Current(length as i64 + 4))
                    .map_err(io_error)?;
            }
        }
    }

    log::debug!(
        "Read {} text chunk(s) from {}",
        text_chunks.len(),
        path.display()
    );
    Ok(text_chunks)
}

fn select_metadata(chunks: &HashMap<String, String>) -> Option<String> {
    METADATA_KEYS
        .iter()
        .filter_map(|key| chunks.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_text_chunk_pair(data: &[u8]) -> Option<(String, String)> {
    let null_pos = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8(data[..null_pos].to_vec()).ok()?;
    let value = String::from_utf8(data[null_pos + 1..].to_vec()).ok()?;
    Some((keyword, value))
}

fn parse_ztxt_chunk_pair(data: &[u8]) -> Option<(String, String)> {
    let null_pos = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8(data[..null_pos].to_vec()).ok()?;

    let compression_method = *data.get(null_pos + 1)?;
    if compression_method != 0 {
        return None;
    }

    let mut payload = &data[null_pos + 2..];
    // Some writers emit a stray separator byte before the zlib stream.
    if payload.first() == Some(&0) {
        payload = &payload[1..];
    }

    let value = decompress_zlib_to_string(payload)?;
    Some((keyword, value))
}

fn parse_itxt_chunk_pair(data: &[u8]) -> Option<(String, String)> {
    let null_pos = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8(data[..null_pos].to_vec()).ok()?;

    let rest = &data[null_pos + 1..];
    if rest.len() < 2 {
        return None;
    }

    let compressed = match (rest[0], rest[1]) {
        (0, _) => false,
        (1, 0) => true,
        _ => return None,
    };

    let after_compression = &rest[2..];
    let lang_end = after_compression.iter().position(|&b| b == 0)?;
    let after_lang = &after_compression[lang_end + 1..];
    let translated_end = after_lang.iter().position(|&b| b == 0)?;
    let text = &after_lang[translated_end + 1..];

    let value = if compressed {
        decompress_zlib_to_string(text)?
    } else {
        String::from_utf8(text.to_vec()).ok()?
    };
    Some((keyword, value))
}

fn decompress_zlib_to_string(data: &[u8]) -> Option<String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = String::new();
    decoder.read_to_string(&mut output).ok()?;
    Some(output)
}
