//! Pack archive format for the packfs virtual filesystem
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
//! This crate provides the build side and the read side of the pack format:
//! a single file that flattens a directory tree and every file payload into
//! one container, stamped with an Adler-32 checksum.
//!
//! # Layout
//!
//! ```text
//! [header 32B][entry records 28B * n][name table UTF-16LE][payloads][checksum 4B]
//! ```
//!
//! The entry records are the breadth-first flattening of the tree. A directory
//! record stores the index of its first child and its child count, so the
//! children of every directory form one contiguous index range. Navigation is
//! done over the flat record array; no tree is materialized in memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use packfs_formats::pack::{PackOpenOptions, PackReader, build_pack};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let summary = build_pack("data/", "pack00.pac")?;
//! println!("{} entries, checksum {:08x}", summary.entry_count, summary.checksum);
//!
//! let reader = PackReader::open("pack00.pac", &PackOpenOptions::default())?;
//! let index = reader.resolve("textures/grass.png").ok_or("missing")?;
//! let bytes = reader.read_entry(index)?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Streaming Adler-32 checksum used to stamp built archives
pub mod checksum;
/// Pack archive structures, scanner, writer and reader
///
/// Key features:
/// - **Breadth-first record table**: directory children are contiguous index ranges
/// - **UTF-16 name table**: names addressed by code-unit offset and length
/// - **Positioned payload reads**: memory-mapped or lock-protected, safe to share
/// - **Opt-in integrity check**: Adler-32 footer verified on demand
///
/// See the [`pack`] module for the on-disk layout.
pub mod pack;

pub use checksum::{Adler32, adler32};
