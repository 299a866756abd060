#![forbid(unsafe_code)]
//! On-disk format parsing for ext2 revision-0 structures.
//!
//! Pure parsing crate with no I/O and no side effects: byte slices in,
//! typed structures out. Covers the superblock, the block-group
//! descriptor, inode records, and directory entries.

pub mod ext2;

pub use ext2::{
    BlockGroupDescriptor, DirBlockIter, DirEntry, DirEntryRef, FileType, INODE_RECORD_SIZE,
    Inode, Superblock, parse_dir_block,
};
