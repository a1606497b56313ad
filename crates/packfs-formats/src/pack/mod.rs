//! Pack archive format implementation
//!
//! A pack flattens a directory tree and its file payloads into one file. All
//! integers are little-endian.
//!
//! # Sections
//!
//! - **Header** (32 bytes): signature `PACK`, reserved word, entry count,
//!   name table offset, payload region offset.
//! - **Entry records** (28 bytes each): kind, flags, name offset and length
//!   (UTF-16 code units), payload size, payload offset.
//! - **Name table**: every record's name concatenated as UTF-16LE with no
//!   separators.
//! - **Payload region**: file contents in record order.
//! - **Footer** (4 bytes): Adler-32 over everything before it.
//!
//! Records are laid out breadth-first. A directory's `payload_offset` is the
//! index of its first child and `payload_size` its child count; a file's are
//! its payload offset (relative to the payload region on disk, absolute once
//! loaded) and byte length.

mod builder;
mod entry;
mod error;
mod header;
mod reader;
mod scanner;

pub use builder::{PackSummary, PackWriter};
pub use entry::{EntryKind, EntryRecord, RECORD_SIZE};
pub use error::{PackError, PackResult};
pub use header::{FOOTER_SIZE, HEADER_SIZE, PACK_SIGNATURE, PackFooter, PackHeader};
pub use reader::{PackOpenOptions, PackReader, ROOT_INDEX, path_segments};
pub use scanner::{ScanEntry, ScannedTree, scan_tree};

use std::path::Path;

/// Scan `source` and write it as a pack to `output`
///
/// `source` may be a directory or a single file. Nothing is written if the
/// scan fails.
pub fn build_pack(source: impl AsRef<Path>, output: impl AsRef<Path>) -> PackResult<PackSummary> {
    let tree = scan_tree(source)?;
    PackWriter::new(tree).write_to_file(output)
}
