//! Pack writer
//!
//! Serializes a [`ScannedTree`] into the on-disk layout. The archive is
//! assembled in memory and written in one go, so a failed build never leaves
//! a half-written pack behind.

use crate::checksum::Adler32;
use crate::pack::entry::EntryRecord;
use crate::pack::error::{PackError, PackResult};
use crate::pack::header::{FOOTER_SIZE, PackFooter, PackHeader};
use crate::pack::scanner::ScannedTree;
use binrw::BinWrite;
use rand::{RngExt, rng};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Summary of a written pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    /// Number of records, root included
    pub entry_count: usize,
    /// Number of file records
    pub file_count: usize,
    /// Number of directory records, root included
    pub directory_count: usize,
    /// Total payload bytes
    pub payload_bytes: u64,
    /// Size of the archive file
    pub archive_size: u64,
    /// Adler-32 stored in the footer
    pub checksum: u32,
}

/// Builder for pack archives
#[derive(Debug, Clone)]
pub struct PackWriter {
    tree: ScannedTree,
    reserved: Option<u32>,
}

impl PackWriter {
    /// Create a writer for a scanned tree
    pub fn new(tree: ScannedTree) -> Self {
        Self {
            tree,
            reserved: None,
        }
    }

    /// Use a fixed value for the reserved header field instead of random bits
    pub fn with_reserved(mut self, reserved: u32) -> Self {
        self.reserved = Some(reserved);
        self
    }

    /// The tree this writer serializes
    pub fn tree(&self) -> &ScannedTree {
        &self.tree
    }

    /// Build the complete archive in memory
    pub fn build(&self) -> PackResult<Vec<u8>> {
        self.assemble().map(|(bytes, _)| bytes)
    }

    /// Build the archive, returning the bytes and the footer checksum
    fn assemble(&self) -> PackResult<(Vec<u8>, u32)> {
        let entries = &self.tree.entries;
        match entries.first() {
            Some(root) if root.kind.is_directory() => {}
            _ => {
                return Err(PackError::InvalidRecord {
                    index: 0,
                    reason: "root entry must be a directory".to_string(),
                });
            }
        }

        // Name table and records
        let mut names: Vec<u16> = Vec::new();
        let mut records = Vec::with_capacity(entries.len());
        let mut payload_offset: i64 = 0;
        let mut next_child: i64 = 1;

        for (index, entry) in entries.iter().enumerate() {
            let name_offset = to_i32(index, names.len(), "name table offset")?;
            names.extend(entry.name.encode_utf16());
            let name_length = to_i32(index, names.len() - name_offset as usize, "name length")?;

            let record = if entry.kind.is_file() {
                let size = to_i32(index, entry.size as usize, "file size")?;
                let record = EntryRecord::file(name_offset, name_length, size, payload_offset);
                payload_offset += i64::from(size);
                record
            } else {
                let count = to_i32(index, entry.child_count, "child count")?;
                let record = EntryRecord::directory(name_offset, name_length, count, next_child);
                next_child += i64::from(count);
                record
            };
            records.push(record);
        }

        // Every record except the root is somebody's child
        if next_child != entries.len() as i64 {
            return Err(PackError::InvalidRecord {
                index: 0,
                reason: format!(
                    "child counts cover {} records, tree has {}",
                    next_child,
                    entries.len()
                ),
            });
        }

        let reserved = self.reserved.unwrap_or_else(|| rng().random::<u32>());
        let header = PackHeader::new(entries.len(), names.len() * 2, reserved);

        let mut output = Vec::with_capacity(
            header.payload_region_offset as usize + payload_offset as usize + FOOTER_SIZE as usize,
        );
        {
            let mut cursor = Cursor::new(&mut output);
            header.write(&mut cursor)?;
            for record in &records {
                record.write(&mut cursor)?;
            }
        }
        for unit in &names {
            output.extend_from_slice(&unit.to_le_bytes());
        }
        debug_assert_eq!(output.len() as i64, header.payload_region_offset);

        for entry in entries.iter().filter(|e| e.kind.is_file()) {
            let data = fs::read(&entry.source)?;
            if data.len() as u64 != entry.size {
                return Err(PackError::SizeChanged {
                    path: entry.source.clone(),
                    expected: entry.size,
                    actual: data.len() as u64,
                });
            }
            output.extend_from_slice(&data);
        }

        let mut hasher = Adler32::new();
        hasher.update(&output);
        let footer = PackFooter {
            checksum: hasher.finish(),
        };
        let end = output.len() as u64;
        let mut cursor = Cursor::new(&mut output);
        cursor.set_position(end);
        footer.write(&mut cursor)?;

        debug!(
            "Built pack: {} records, {} name units, {} payload bytes",
            records.len(),
            names.len(),
            payload_offset
        );

        Ok((output, footer.checksum))
    }

    /// Build the archive and write it to `path`
    ///
    /// An existing file is truncated. If writing fails, the partial output
    /// is removed.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> PackResult<PackSummary> {
        let path = path.as_ref();
        let (bytes, checksum) = self.assemble()?;

        if let Err(e) = fs::write(path, &bytes) {
            if let Err(cleanup) = fs::remove_file(path) {
                warn!(
                    "Failed to remove partial pack {}: {}",
                    path.display(),
                    cleanup
                );
            }
            return Err(e.into());
        }

        let summary = PackSummary {
            entry_count: self.tree.len(),
            file_count: self.tree.file_count(),
            directory_count: self.tree.directory_count(),
            payload_bytes: self.tree.payload_bytes(),
            archive_size: bytes.len() as u64,
            checksum,
        };

        info!(
            "Wrote pack {} ({} entries, {} bytes, checksum {:08x})",
            path.display(),
            summary.entry_count,
            summary.archive_size,
            summary.checksum
        );

        Ok(summary)
    }
}

fn to_i32(index: usize, value: usize, what: &str) -> PackResult<i32> {
    i32::try_from(value).map_err(|_| PackError::InvalidRecord {
        index,
        reason: format!("{what} {value} exceeds the 32-bit field"),
    })
}
