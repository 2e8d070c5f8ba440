//! Byte-level writer for git index files used by decoder and cache tests.

use std::path::Path;

struct Entry {
    name: String,
    size: u32,
    stage: u16,
    extended: bool,
}

/// Builds a `DIRC` index of the given version.
///
/// Stat fields are zero and object ids are filler. A small `TREE` extension and a zero
/// checksum follow the entries so readers must stop at the declared entry count.
pub struct IndexBuilder {
    version: u32,
    entries: Vec<Entry>,
}

impl IndexBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            entries: Vec::new(),
        }
    }

    pub fn entry(self, name: &str, size: u32) -> Self {
        self.push(name, size, 0, false)
    }

    /// An entry at merge stage 1-3.
    pub fn staged_entry(self, name: &str, size: u32, stage: u16) -> Self {
        self.push(name, size, stage, false)
    }

    /// An entry carrying the v3 extended flags word.
    pub fn extended_entry(self, name: &str, size: u32) -> Self {
        self.push(name, size, 0, true)
    }

    fn push(mut self, name: &str, size: u32, stage: u16, extended: bool) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            size,
            stage,
            extended,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"DIRC");
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        let mut previous: &[u8] = &[];
        for entry in &self.entries {
            let start = out.len();
            // ctime, mtime, dev, ino, mode, uid, gid
            out.extend_from_slice(&[0u8; 36]);
            out.extend_from_slice(&entry.size.to_be_bytes());
            out.extend_from_slice(&[0xab; 20]);

            let name = entry.name.as_bytes();
            let mut flags = (name.len().min(0xfff) as u16) | (entry.stage << 12);
            if entry.extended {
                flags |= 0x4000;
            }
            out.extend_from_slice(&flags.to_be_bytes());
            if entry.extended {
                // intent-to-add
                out.extend_from_slice(&0x2000u16.to_be_bytes());
            }

            if self.version == 4 {
                let common = previous.iter().zip(name).take_while(|(a, b)| a == b).count();
                out.extend_from_slice(&encode_offset_varint(previous.len() - common));
                out.extend_from_slice(&name[common..]);
                out.push(0);
                previous = name;
            } else {
                out.extend_from_slice(name);
                let entry_len = (out.len() - start + 8) & !7;
                out.resize(start + entry_len, 0);
            }
        }

        out.extend_from_slice(b"TREE");
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&[0u8; 20]);
        out
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.build())
    }
}

fn encode_offset_varint(mut value: usize) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value != 0 {
        value -= 1;
        bytes.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_varint_encoding() {
        assert_eq!(encode_offset_varint(0), vec![0x00]);
        assert_eq!(encode_offset_varint(127), vec![0x7f]);
        assert_eq!(encode_offset_varint(128), vec![0x80, 0x00]);
        assert_eq!(encode_offset_varint(209), vec![0x80, 0x51]);
    }

    #[test]
    fn test_v2_entries_are_eight_byte_aligned() {
        let bytes = IndexBuilder::new(2).entry("abc", 1).build();
        // header + one padded entry + TREE extension + checksum
        assert_eq!(bytes.len(), 12 + 72 + 8 + 20);
    }
}
