//! Archive container format
//!
//! An archive is an ordered list of named entries:
//!
//! ```text
//! magic "SCAR" | version u8 | count u32 | { name_len u16 | name | data_len u32 | data }*
//! ```
//!
//! All integers are big-endian. Entries whose name ends in `.class` hold
//! class descriptors; everything else is opaque.

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// File signature
pub const ARCHIVE_MAGIC: &[u8; 4] = b"SCAR";

/// Container format version
pub const ARCHIVE_VERSION: u8 = 1;

/// Suffix of class entries
pub const CLASS_SUFFIX: &str = ".class";

// =============================================================================
// Errors
// =============================================================================

/// Archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid archive: {0}")]
    InvalidFormat(String),
}

// =============================================================================
// Entries
// =============================================================================

/// One named entry of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn is_class(&self) -> bool {
        self.name.ends_with(CLASS_SUFFIX)
    }
}

/// Entry name for a class
pub fn class_entry_name(class: &str) -> String {
    format!("{}{}", class.replace('.', "/"), CLASS_SUFFIX)
}

// =============================================================================
// Archive
// =============================================================================

/// An ordered collection of entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    names: HashSet<String>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; names must be unique
    pub fn push(&mut self, entry: ArchiveEntry) -> Result<(), ArchiveError> {
        if !self.names.insert(entry.name.clone()) {
            return Err(ArchiveError::InvalidFormat(format!(
                "duplicate entry {}",
                entry.name
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn class_entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| e.is_class())
    }

    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode to the container format
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(ARCHIVE_MAGIC);
        bytes.push(ARCHIVE_VERSION);
        bytes.extend_from_slice(&length_u32(self.entries.len(), "entry count")?.to_be_bytes());

        for entry in &self.entries {
            let name = entry.name.as_bytes();
            let name_len = u16::try_from(name.len()).map_err(|_| {
                ArchiveError::InvalidFormat(format!("entry name too long: {}", entry.name))
            })?;
            bytes.extend_from_slice(&name_len.to_be_bytes());
            bytes.extend_from_slice(name);
            bytes.extend_from_slice(&length_u32(entry.data.len(), &entry.name)?.to_be_bytes());
            bytes.extend_from_slice(&entry.data);
        }

        Ok(bytes)
    }

    /// Decode from the container format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut reader = Reader::new(bytes);

        if reader.read_bytes(ARCHIVE_MAGIC.len())? != ARCHIVE_MAGIC {
            return Err(ArchiveError::InvalidFormat("bad magic".to_string()));
        }
        let version = reader.read_u8()?;
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::InvalidFormat(format!(
                "unsupported version {}",
                version
            )));
        }

        let count = reader.read_u32()? as usize;
        let mut names = HashSet::new();
        let mut entries = Vec::new();
        for _ in 0..count {
            let name_len = reader.read_u16()? as usize;
            let name = String::from_utf8(reader.read_bytes(name_len)?.to_vec())
                .map_err(|_| ArchiveError::InvalidFormat("entry name is not UTF-8".to_string()))?;
            let data_len = reader.read_u32()? as usize;
            let data = reader.read_bytes(data_len)?.to_vec();

            if !names.insert(name.clone()) {
                return Err(ArchiveError::InvalidFormat(format!("duplicate entry {}", name)));
            }
            entries.push(ArchiveEntry { name, data });
        }

        if !reader.is_at_end() {
            return Err(ArchiveError::InvalidFormat("trailing bytes".to_string()));
        }

        Ok(Self { entries, names })
    }

    /// Load an archive from disk
    pub fn read_from(path: &Path) -> Result<Self, ArchiveError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Save the archive to disk.
    ///
    /// The archive is written to a temporary sibling first and renamed into
    /// place, so `path` never holds a partial archive.
    pub fn write_to(&self, path: &Path) -> Result<(), ArchiveError> {
        let bytes = self.to_bytes()?;
        let temp_path = temp_path_for(path);

        let result = (|| -> Result<(), ArchiveError> {
            let file = fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&bytes)?;
            writer.flush()?;
            drop(writer);
            fs::rename(&temp_path, path)?;
            Ok(())
        })();

        if result.is_err() && temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

fn length_u32(len: usize, what: &str) -> Result<u32, ArchiveError> {
    u32::try_from(len).map_err(|_| ArchiveError::InvalidFormat(format!("{} too large", what)))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

// =============================================================================
// Byte Reader
// =============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ArchiveError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| ArchiveError::InvalidFormat("truncated archive".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, ArchiveError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, ArchiveError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ArchiveError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
