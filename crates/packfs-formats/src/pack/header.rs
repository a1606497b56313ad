//! Pack header and footer structures
//!
//! The header is a 32-byte little-endian structure:
//! - 4-byte signature `PACK` (`0x4B434150` read as little-endian u32)
//! - 4-byte reserved field (random, uninterpreted)
//! - 8-byte entry count
//! - 8-byte byte offset of the name table
//! - 8-byte byte offset of the payload region

use crate::pack::entry::RECORD_SIZE;
use crate::pack::error::{PackError, PackResult};
use binrw::{BinRead, BinWrite};

/// Pack signature: "PACK" as little-endian u32
pub const PACK_SIGNATURE: u32 = 0x4B43_4150;

/// Header size in bytes
pub const HEADER_SIZE: u64 = 32;

/// Footer size in bytes
pub const FOOTER_SIZE: u64 = 4;

/// Pack header structure (32 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PackHeader {
    /// File signature, must be [`PACK_SIGNATURE`]
    pub signature: u32,

    /// Uninterpreted, filled with random bits by the writer
    pub reserved: u32,

    /// Number of entry records
    pub entry_count: i64,

    /// Byte offset of the name table
    pub name_table_offset: i64,

    /// Byte offset of the payload region
    pub payload_region_offset: i64,
}

impl PackHeader {
    /// Create a header for `entry_count` records and a name table of
    /// `name_table_len` bytes, with offsets laid out back to back
    pub fn new(entry_count: usize, name_table_len: usize, reserved: u32) -> Self {
        let name_table_offset = HEADER_SIZE + entry_count as u64 * RECORD_SIZE;
        Self {
            signature: PACK_SIGNATURE,
            reserved,
            entry_count: entry_count as i64,
            name_table_offset: name_table_offset as i64,
            payload_region_offset: (name_table_offset + name_table_len as u64) as i64,
        }
    }

    /// Validate the header against itself
    pub fn validate(&self) -> PackResult<()> {
        if self.signature != PACK_SIGNATURE {
            return Err(PackError::InvalidSignature {
                expected: PACK_SIGNATURE,
                actual: self.signature,
            });
        }

        for (field, value) in [
            ("entry_count", self.entry_count),
            ("name_table_offset", self.name_table_offset),
            ("payload_region_offset", self.payload_region_offset),
        ] {
            if value < 0 {
                return Err(PackError::InvalidHeaderField { field, value });
            }
        }

        if self.payload_region_offset < self.name_table_offset {
            return Err(PackError::InconsistentOffsets(format!(
                "payload region at {} precedes name table at {}",
                self.payload_region_offset, self.name_table_offset
            )));
        }

        Ok(())
    }

    /// Validate the header against the size of the file it was read from
    ///
    /// Runs [`Self::validate`] first. The record table must fit between the
    /// header and the name table, and the payload region must start before
    /// the footer.
    pub fn validate_for_len(&self, file_len: u64) -> PackResult<()> {
        self.validate()?;

        if self.entry_count == 0 {
            return Err(PackError::InvalidHeaderField {
                field: "entry_count",
                value: 0,
            });
        }

        let records_end = (self.entry_count as u64)
            .checked_mul(RECORD_SIZE)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or(PackError::InvalidHeaderField {
                field: "entry_count",
                value: self.entry_count,
            })?;

        if records_end > self.name_table_offset as u64 {
            return Err(PackError::InconsistentOffsets(format!(
                "{} records end at {records_end}, past name table at {}",
                self.entry_count, self.name_table_offset
            )));
        }

        let footer_start = file_len.saturating_sub(FOOTER_SIZE);
        if self.payload_region_offset as u64 > footer_start {
            return Err(PackError::Truncated {
                needed: self.payload_region_offset as u64 + FOOTER_SIZE,
                actual: file_len,
            });
        }

        Ok(())
    }

    /// Byte length of the name table
    pub fn name_table_len(&self) -> u64 {
        (self.payload_region_offset - self.name_table_offset) as u64
    }
}

/// Pack footer (4 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PackFooter {
    /// Adler-32 over every byte preceding the footer
    pub checksum: u32,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = PackHeader::new(3, 10, 0xDEAD_BEEF);
        assert_eq!(header.name_table_offset, 32 + 3 * 28);
        assert_eq!(header.payload_region_offset, 32 + 3 * 28 + 10);
        assert_eq!(header.name_table_len(), 10);

        let mut buffer = Vec::new();
        header
            .write(&mut Cursor::new(&mut buffer))
            .expect("Operation should succeed");
        assert_eq!(buffer.len() as u64, HEADER_SIZE);
        assert_eq!(&buffer[0..4], b"PACK");
        assert_eq!(&buffer[4..8], &0xDEAD_BEEFu32.to_le_bytes());

        let parsed = PackHeader::read(&mut Cursor::new(&buffer)).expect("Operation should succeed");
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_validation() {
        let valid = PackHeader::new(1, 0, 0);
        assert!(valid.validate().is_ok());

        let mut bad_signature = valid.clone();
        bad_signature.signature = 0x1234_5678;
        assert!(matches!(
            bad_signature.validate(),
            Err(PackError::InvalidSignature { .. })
        ));

        let mut negative = valid.clone();
        negative.name_table_offset = -4;
        assert!(matches!(
            negative.validate(),
            Err(PackError::InvalidHeaderField {
                field: "name_table_offset",
                ..
            })
        ));

        let mut reversed = valid;
        reversed.payload_region_offset = reversed.name_table_offset - 1;
        assert!(matches!(
            reversed.validate(),
            Err(PackError::InconsistentOffsets(_))
        ));
    }

    #[test]
    fn test_header_validation_against_file_len() {
        let header = PackHeader::new(2, 4, 0);
        let exact = header.payload_region_offset as u64 + FOOTER_SIZE;
        assert!(header.validate_for_len(exact).is_ok());
        assert!(matches!(
            header.validate_for_len(exact - 1),
            Err(PackError::Truncated { .. })
        ));

        let mut overlapping = header.clone();
        overlapping.entry_count = 50;
        assert!(matches!(
            overlapping.validate_for_len(exact),
            Err(PackError::InconsistentOffsets(_))
        ));

        let mut huge = header;
        huge.entry_count = i64::MAX;
        assert!(huge.validate_for_len(exact).is_err());
    }
}
