//! Pack reader
//!
//! Loads the header, the record table and the name table of a pack into
//! memory. Payload bytes stay on disk and are read on demand through a
//! positioned read primitive, so any number of threads can read through one
//! shared [`PackReader`] without disturbing each other.

use crate::checksum::Adler32;
use crate::pack::entry::EntryRecord;
use crate::pack::error::{PackError, PackResult};
use crate::pack::header::{FOOTER_SIZE, HEADER_SIZE, PackFooter, PackHeader};
use binrw::BinRead;
use memmap2::Mmap;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Record index of the archive root directory
pub const ROOT_INDEX: usize = 0;

/// Chunk size for streaming checksum verification
const VERIFY_CHUNK: usize = 64 * 1024;

/// Options for opening a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOpenOptions {
    /// Verify the Adler-32 footer while opening (reads the whole file)
    pub verify_checksum: bool,
    /// Serve payload reads from a memory map instead of a locked file handle
    pub use_mmap: bool,
}

impl Default for PackOpenOptions {
    fn default() -> Self {
        Self {
            verify_checksum: false,
            use_mmap: true,
        }
    }
}

impl PackOpenOptions {
    /// Enable or disable checksum verification on open
    #[must_use]
    pub const fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Enable or disable memory-mapped payload reads
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.use_mmap = enable;
        self
    }
}

/// Where payload bytes are read from
enum PayloadSource {
    /// Read-only mapping of the whole archive
    Mapped(Mmap),
    /// Single handle, seek and read under one lock per call
    Locked(Mutex<File>),
}

impl std::fmt::Debug for PayloadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapped(map) => write!(f, "Mapped({} bytes)", map.len()),
            Self::Locked(_) => f.write_str("Locked"),
        }
    }
}

/// An opened pack: immutable index plus payload access
#[derive(Debug)]
pub struct PackReader {
    path: PathBuf,
    header: PackHeader,
    records: Vec<EntryRecord>,
    names: Vec<u16>,
    file_len: u64,
    payload: PayloadSource,
}

impl PackReader {
    /// Open and validate a pack
    ///
    /// File record payload offsets are rebased from payload-relative to
    /// absolute file offsets. The checksum is only verified when
    /// [`PackOpenOptions::verify_checksum`] is set.
    pub fn open(path: impl AsRef<Path>, options: &PackOpenOptions) -> PackResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE + FOOTER_SIZE {
            return Err(PackError::Truncated {
                needed: HEADER_SIZE + FOOTER_SIZE,
                actual: file_len,
            });
        }

        let mut reader = BufReader::new(&file);
        let header = PackHeader::read(&mut reader)?;
        header.validate_for_len(file_len)?;

        // Records follow the header directly
        let count = header.entry_count as usize;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(EntryRecord::read(&mut reader)?);
        }

        let name_bytes = header.name_table_len();
        if name_bytes % 2 != 0 {
            return Err(PackError::OddNameTable(name_bytes));
        }
        reader.seek(SeekFrom::Start(header.name_table_offset as u64))?;
        let mut raw = vec![0u8; name_bytes as usize];
        reader.read_exact(&mut raw)?;
        let names: Vec<u16> = raw
            .chunks_exact(2)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
            .collect();
        drop(reader);

        rebase_records(&header, &mut records, names.len(), file_len)?;

        let payload = if options.use_mmap {
            // The archive is never written while mounted
            #[allow(unsafe_code)]
            let map = unsafe { Mmap::map(&file)? };
            PayloadSource::Mapped(map)
        } else {
            PayloadSource::Locked(Mutex::new(file))
        };

        let reader = Self {
            path: path.to_path_buf(),
            header,
            records,
            names,
            file_len,
            payload,
        };

        if options.verify_checksum {
            reader.verify_checksum()?;
        }

        info!(
            "Opened pack {} ({} entries, {:?})",
            path.display(),
            reader.records.len(),
            reader.payload
        );

        Ok(reader)
    }

    /// Path the pack was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed header
    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Size of the archive file in bytes
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Number of records, root included
    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// All records; file payload offsets are absolute
    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    /// Record at `index`
    pub fn record(&self, index: usize) -> Option<&EntryRecord> {
        self.records.get(index)
    }

    /// Raw UTF-16 name of the record at `index`
    pub fn name_units(&self, index: usize) -> &[u16] {
        self.records
            .get(index)
            .and_then(|r| self.names.get(r.name_range()))
            .unwrap_or(&[])
    }

    /// Name of the record at `index`; unpaired surrogates become U+FFFD
    pub fn name(&self, index: usize) -> String {
        String::from_utf16_lossy(self.name_units(index))
    }

    /// Index range of a directory's children (empty for files)
    pub fn children(&self, index: usize) -> Range<usize> {
        self.records
            .get(index)
            .map_or(0..0, EntryRecord::child_range)
    }

    /// Find the child of directory `dir` called `name`
    ///
    /// Linear scan of the child range, comparing length first and then
    /// code unit by code unit.
    pub fn find_child(&self, dir: usize, name: &str) -> Option<usize> {
        let wanted = name.encode_utf16().count();
        self.children(dir).find(|&child| {
            let units = self.name_units(child);
            units.len() == wanted && units.iter().copied().eq(name.encode_utf16())
        })
    }

    /// Resolve a `/`-delimited path to a record index
    ///
    /// Empty segments are ignored, so `""` and `"/"` resolve to the root.
    /// Descending through a file fails.
    pub fn resolve(&self, path: &str) -> Option<usize> {
        path_segments(path).try_fold(ROOT_INDEX, |dir, segment| self.find_child(dir, segment))
    }

    /// Read payload bytes of file `index` starting at `offset` into `buf`
    ///
    /// Returns the number of bytes read, which is short at end of file and
    /// 0 at or past it.
    pub fn read_at(&self, index: usize, offset: u64, buf: &mut [u8]) -> PackResult<usize> {
        let record = self.records.get(index).ok_or(PackError::IndexOutOfRange {
            index,
            count: self.records.len(),
        })?;
        if !record.is_file() {
            return Err(PackError::InvalidRecord {
                index,
                reason: "not a file".to_string(),
            });
        }

        let size = record.file_size();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let len = (size - offset).min(buf.len() as u64) as usize;
        let start = record.payload_offset as u64 + offset;

        match &self.payload {
            PayloadSource::Mapped(map) => {
                let start = start as usize;
                let src = map.get(start..start + len).ok_or(PackError::Truncated {
                    needed: (start + len) as u64,
                    actual: map.len() as u64,
                })?;
                buf[..len].copy_from_slice(src);
                Ok(len)
            }
            PayloadSource::Locked(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(start))?;
                read_full(&mut *file, &mut buf[..len])
            }
        }
    }

    /// Read the whole payload of file `index`
    pub fn read_entry(&self, index: usize) -> PackResult<Vec<u8>> {
        let size = self.records.get(index).map_or(0, EntryRecord::file_size);
        let mut data = vec![0u8; size as usize];
        let read = self.read_at(index, 0, &mut data)?;
        data.truncate(read);
        Ok(data)
    }

    /// Full paths of every file record, with their indices, in record order
    pub fn file_paths(&self) -> Vec<(String, usize)> {
        let mut paths: Vec<Option<String>> = vec![None; self.records.len()];
        paths[ROOT_INDEX] = Some(String::new());

        for dir in 0..self.records.len() {
            let Some(parent) = paths[dir].clone() else {
                continue;
            };
            for child in self.children(dir) {
                let name = self.name(child);
                paths[child] = Some(if parent.is_empty() {
                    name
                } else {
                    format!("{parent}/{name}")
                });
            }
        }

        paths
            .into_iter()
            .enumerate()
            .filter(|(index, _)| self.records[*index].is_file())
            .filter_map(|(index, path)| path.map(|p| (p, index)))
            .collect()
    }

    /// Recompute the Adler-32 over the archive and compare it to the footer
    ///
    /// Returns the checksum on success.
    pub fn verify_checksum(&self) -> PackResult<u32> {
        let content_len = self.file_len - FOOTER_SIZE;
        let mut hasher = Adler32::new();
        let mut tail = [0u8; FOOTER_SIZE as usize];

        match &self.payload {
            PayloadSource::Mapped(map) => {
                let content = map
                    .get(..content_len as usize)
                    .ok_or(PackError::Truncated {
                        needed: self.file_len,
                        actual: map.len() as u64,
                    })?;
                hasher.update(content);
                let footer = map
                    .get(content_len as usize..self.file_len as usize)
                    .ok_or(PackError::Truncated {
                        needed: self.file_len,
                        actual: map.len() as u64,
                    })?;
                tail.copy_from_slice(footer);
            }
            PayloadSource::Locked(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(0))?;
                let mut chunk = vec![0u8; VERIFY_CHUNK];
                {
                    let mut content = (&mut *file).take(content_len);
                    loop {
                        let n = content.read(&mut chunk)?;
                        if n == 0 {
                            break;
                        }
                        hasher.update(&chunk[..n]);
                    }
                }
                file.read_exact(&mut tail)?;
            }
        }

        let footer = PackFooter::read(&mut Cursor::new(&tail))?;
        let actual = hasher.finish();
        if footer.checksum != actual {
            return Err(PackError::ChecksumMismatch {
                expected: footer.checksum,
                actual,
            });
        }

        debug!("Checksum {:08x} verified for {}", actual, self.path.display());
        Ok(actual)
    }
}

/// Split a path into its non-empty `/`-delimited segments
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Bounds-check every record and make file payload offsets absolute
fn rebase_records(
    header: &PackHeader,
    records: &mut [EntryRecord],
    name_units: usize,
    file_len: u64,
) -> PackResult<()> {
    let count = records.len() as i64;
    let payload_start = header.payload_region_offset;
    let payload_len = (file_len - FOOTER_SIZE) as i64 - payload_start;

    match records.first() {
        Some(root) if root.is_directory() => {}
        _ => {
            return Err(PackError::InvalidRecord {
                index: ROOT_INDEX,
                reason: "root is not a directory".to_string(),
            });
        }
    }

    for (index, record) in records.iter_mut().enumerate() {
        let invalid = |reason: String| PackError::InvalidRecord { index, reason };

        if record.name_offset < 0 || record.name_length < 0 {
            return Err(invalid(format!(
                "negative name range {}+{}",
                record.name_offset, record.name_length
            )));
        }
        if i64::from(record.name_offset) + i64::from(record.name_length) > name_units as i64 {
            return Err(invalid(format!(
                "name range {}+{} outside name table of {} units",
                record.name_offset, record.name_length, name_units
            )));
        }
        if record.payload_size < 0 {
            return Err(invalid(format!("negative size {}", record.payload_size)));
        }

        let size = i64::from(record.payload_size);
        let offset = record.payload_offset;
        if record.is_directory() {
            let first = i64::from(size > 0);
            if offset < first || offset.saturating_add(size) > count {
                return Err(invalid(format!(
                    "child range {offset}+{size} outside 1..{count}"
                )));
            }
        } else {
            if offset < 0 || offset.saturating_add(size) > payload_len {
                return Err(invalid(format!(
                    "payload range {offset}+{size} outside region of {payload_len} bytes"
                )));
            }
            record.payload_offset = offset + payload_start;
        }
    }

    Ok(())
}

/// Fill `buf` from `reader`, stopping early only at end of file
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> PackResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
