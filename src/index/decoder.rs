//! Decoder for git's `DIRC` index format, versions 2 to 4.
//!
//! ```text
//! header   "DIRC" | version: u32 | entry count: u32
//! entry    ctime mtime (2 x u32 each) | dev ino mode uid gid size (u32 each)
//!          | object id (20 bytes) | flags: u16 | [extended flags: u16, v3+]
//!          | name
//! ```
//!
//! All integers are big-endian. In v2 and v3 the name is NUL padded so that each entry
//! is a multiple of 8 bytes long. In v4 the name is stored as "drop N bytes from the
//! previous name, then append this NUL-terminated suffix", with N as an offset varint.
//! Extensions and the trailing checksum follow the entries and are not needed here.

use super::{IndexDecoder, IndexEntry};
use crate::core::IdxvizError;
use anyhow::Result;
use std::path::Path;
use tracing::debug;

const SIGNATURE: &[u8; 4] = b"DIRC";
const HEADER_LEN: usize = 12;
/// Stat data, object id and flags.
const ENTRY_FIXED_LEN: usize = 62;
const SIZE_OFFSET: usize = 36;
const FLAGS_OFFSET: usize = 60;

const NAME_MASK: u16 = 0x0fff;
const EXTENDED_FLAG: u16 = 0x4000;

/// [`IndexDecoder`] for `.git/index` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitIndexDecoder;

impl IndexDecoder for GitIndexDecoder {
    fn decode(&self, index_path: &Path) -> Result<Vec<IndexEntry>> {
        let bytes = std::fs::read(index_path).map_err(|e| decode_error(index_path, format!("cannot read file: {e}")))?;
        let entries = Self::decode_bytes(&bytes).map_err(|reason| decode_error(index_path, reason))?;
        debug!(target: "idxviz::index", "Read {} entries from {}", entries.len(), index_path.display());
        Ok(entries)
    }
}

impl GitIndexDecoder {
    /// Decode an in-memory index. The error is a human readable reason.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Vec<IndexEntry>, String> {
        let mut reader = Reader::new(bytes);

        if reader.take(4)? != SIGNATURE {
            return Err("missing DIRC signature".to_string());
        }
        let version = reader.u32()?;
        if !(2..=4).contains(&version) {
            return Err(format!("unsupported index version {version}"));
        }
        let count = reader.u32()? as usize;
        debug_assert_eq!(reader.pos, HEADER_LEN);

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(count.min(bytes.len() / ENTRY_FIXED_LEN));
        let mut previous_name: Vec<u8> = Vec::new();

        for index in 0..count {
            let start = reader.pos;
            let fixed = reader
                .take(ENTRY_FIXED_LEN)
                .map_err(|_| format!("entry {index} is truncated"))?;
            let size = u32::from_be_bytes([
                fixed[SIZE_OFFSET],
                fixed[SIZE_OFFSET + 1],
                fixed[SIZE_OFFSET + 2],
                fixed[SIZE_OFFSET + 3],
            ]);
            let flags = u16::from_be_bytes([fixed[FLAGS_OFFSET], fixed[FLAGS_OFFSET + 1]]);

            if flags & EXTENDED_FLAG != 0 {
                if version < 3 {
                    return Err(format!("entry {index} uses extended flags in a version {version} index"));
                }
                reader.take(2).map_err(|_| format!("entry {index} is truncated"))?;
            }

            let name = if version == 4 {
                let strip = reader.varint().map_err(|_| format!("entry {index} is truncated"))?;
                if strip > previous_name.len() {
                    return Err(format!("entry {index} strips more than the previous name"));
                }
                let suffix = reader.until_nul().map_err(|_| format!("entry {index} name is not terminated"))?;
                let mut name = previous_name[..previous_name.len() - strip].to_vec();
                name.extend_from_slice(suffix);
                name
            } else {
                let name_start = reader.pos;
                let declared = usize::from(flags & NAME_MASK);
                let name = if declared == usize::from(NAME_MASK) {
                    reader.until_nul().map_err(|_| format!("entry {index} name is not terminated"))?
                } else {
                    reader.take(declared).map_err(|_| format!("entry {index} name is truncated"))?
                };

                // Entries are NUL padded to a multiple of 8 bytes, with at least one NUL
                let entry_len = (name_start - start + name.len() + 8) & !7;
                reader
                    .seek(start + entry_len)
                    .map_err(|_| format!("entry {index} padding is truncated"))?;
                name.to_vec()
            };

            let path = String::from_utf8_lossy(&name).into_owned();
            previous_name = name;

            if path.is_empty() || path.ends_with('/') {
                // Sparse directory entries describe a whole subtree, not a file
                continue;
            }
            // Conflict stages of one path are stored next to each other
            if entries.last().is_some_and(|last| last.name == path) {
                continue;
            }
            entries.push(IndexEntry::new(path, u64::from(size)));
        }

        Ok(entries)
    }
}

fn decode_error(path: &Path, reason: String) -> anyhow::Error {
    IdxvizError::DecodeError {
        path: path.display().to_string(),
        reason,
    }
    .into()
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err("unexpected end of file".to_string());
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn seek(&mut self, to: usize) -> Result<(), String> {
        if to > self.bytes.len() {
            return Err("unexpected end of file".to_string());
        }
        self.pos = to;
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Bytes up to a NUL, which is consumed but not returned.
    fn until_nul(&mut self) -> Result<&'a [u8], String> {
        let rest = &self.bytes[self.pos..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err("unexpected end of file".to_string());
        };
        self.pos += len + 1;
        Ok(&rest[..len])
    }

    /// git's offset encoding: each continuation adds one before shifting, so no value
    /// has two encodings.
    fn varint(&mut self) -> Result<usize, String> {
        let mut byte = self.take(1)?[0];
        let mut value = usize::from(byte & 0x7f);
        while byte & 0x80 != 0 {
            byte = self.take(1)?[0];
            value = value
                .checked_add(1)
                .and_then(|v| v.checked_mul(128))
                .and_then(|v| v.checked_add(usize::from(byte & 0x7f)))
                .ok_or_else(|| "varint overflow".to_string())?;
        }
        Ok(value)
    }
}
