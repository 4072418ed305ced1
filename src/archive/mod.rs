//! Archive module for reading and writing class archives

pub mod container;

pub use container::{
    class_entry_name, Archive, ArchiveEntry, ArchiveError, ARCHIVE_MAGIC, ARCHIVE_VERSION,
    CLASS_SUFFIX,
};
