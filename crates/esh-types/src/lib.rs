#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const EXT2_SUPERBLOCK_OFFSET: usize = 1024;
pub const EXT2_SUPERBLOCK_SIZE: usize = 1024;
pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;

/// The group-0 descriptor sits in the block immediately after the superblock.
pub const EXT2_GROUP_DESC_OFFSET: usize = 2048;
pub const EXT2_GROUP_DESC_SIZE: usize = 32;

/// Revision-0 inode record size. Later revisions store the size in the
/// superblock, but the record layout parsed here is always the first 128 bytes.
pub const EXT2_GOOD_OLD_INODE_SIZE: u16 = 128;

/// Filesystem state values (`s_state`).
pub const EXT2_VALID_FS: u16 = 1;
pub const EXT2_ERROR_FS: u16 = 2;

/// Maximum directory entry name length.
pub const EXT2_NAME_LEN: usize = 255;

/// ext2 block number (u32 on disk, 0 = unallocated/hole).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u32);

impl BlockNumber {
    /// Convert this block number to its byte offset in the image.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn to_byte_offset(self, block_size: BlockSize) -> Option<ByteOffset> {
        u64::from(self.0)
            .checked_mul(u64::from(block_size.get()))
            .map(ByteOffset)
    }
}

/// ext2 inode number (u32, 1-indexed; 0 is never a valid inode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    /// The root directory is always inode 2.
    pub const ROOT: Self = Self(2);

    /// Zero-based index into the inode table, or `None` for inode 0.
    #[must_use]
    pub fn table_index(self) -> Option<usize> {
        self.0.checked_sub(1).map(|i| i as usize)
    }
}

/// Validated block size (1024, 2048, or 4096 for ext2 revision 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockSize(u32);

impl BlockSize {
    /// Create a `BlockSize` if `value` is one of the supported sizes.
    pub fn new(value: u32) -> Result<Self, ParseError> {
        if !matches!(value, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "block_size",
                reason: "must be 1024, 2048, or 4096",
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Number of u32 block pointers that fit in one block.
    #[must_use]
    pub fn pointers_per_block(self) -> u32 {
        self.0 / 4
    }
}

/// Byte offset within the image (positioned-read semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    /// Add a byte count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

// ── File mode (i_mode) ──────────────────────────────────────────────────────

/// File type mask (upper 4 bits of mode).
pub const EXT2_S_IFMT: u16 = 0xF000;
/// Socket.
pub const EXT2_S_IFSOCK: u16 = 0xC000;
/// Symbolic link.
pub const EXT2_S_IFLNK: u16 = 0xA000;
/// Regular file.
pub const EXT2_S_IFREG: u16 = 0x8000;
/// Block device.
pub const EXT2_S_IFBLK: u16 = 0x6000;
/// Directory.
pub const EXT2_S_IFDIR: u16 = 0x4000;
/// Character device.
pub const EXT2_S_IFCHR: u16 = 0x2000;
/// Named pipe (FIFO).
pub const EXT2_S_IFIFO: u16 = 0x1000;

pub const EXT2_S_IRUSR: u16 = 0x0100;
pub const EXT2_S_IWUSR: u16 = 0x0080;
pub const EXT2_S_IXUSR: u16 = 0x0040;
pub const EXT2_S_IRGRP: u16 = 0x0020;
pub const EXT2_S_IWGRP: u16 = 0x0010;
pub const EXT2_S_IXGRP: u16 = 0x0008;
pub const EXT2_S_IROTH: u16 = 0x0004;
pub const EXT2_S_IWOTH: u16 = 0x0002;
pub const EXT2_S_IXOTH: u16 = 0x0001;

/// Inode mode word: file-type mask plus permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMode(pub u16);

impl FileMode {
    #[must_use]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn is_dir(self) -> bool {
        self.0 & EXT2_S_IFMT == EXT2_S_IFDIR
    }

    #[must_use]
    pub fn is_regular(self) -> bool {
        self.0 & EXT2_S_IFMT == EXT2_S_IFREG
    }

    #[must_use]
    pub fn is_symlink(self) -> bool {
        self.0 & EXT2_S_IFMT == EXT2_S_IFLNK
    }

    /// Nine-character `rwxrwxrwx` permission string (user, group, other).
    #[must_use]
    pub fn symbolic(self) -> String {
        const TABLE: [(u16, char); 9] = [
            (EXT2_S_IRUSR, 'r'),
            (EXT2_S_IWUSR, 'w'),
            (EXT2_S_IXUSR, 'x'),
            (EXT2_S_IRGRP, 'r'),
            (EXT2_S_IWGRP, 'w'),
            (EXT2_S_IXGRP, 'x'),
            (EXT2_S_IROTH, 'r'),
            (EXT2_S_IWOTH, 'w'),
            (EXT2_S_IXOTH, 'x'),
        ];
        TABLE
            .iter()
            .map(|&(bit, ch)| if self.0 & bit != 0 { ch } else { '-' })
            .collect()
    }
}

// ── Parse layer ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid magic: expected {expected:#x}, got {actual:#x}")]
    InvalidMagic { expected: u16, actual: u16 },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("integer conversion failed: {field}")]
    IntegerConversion { field: &'static str },
}

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let bytes = ensure_slice(data, offset, N)?;
    let mut out = [0_u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Decode a NUL-padded fixed-size label (volume name, last-mounted path).
#[must_use]
pub fn trim_nul_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_owned()
}

/// Block size from the superblock's log field: `1024 << log_block_size`.
#[must_use]
pub fn block_size_from_log(log_block_size: u32) -> Option<u32> {
    let shift = 10_u32.checked_add(log_block_size)?;
    1_u32.checked_shl(shift)
}

/// Narrow a `u64` to `usize` with an explicit error path.
pub fn u64_to_usize(value: u64, field: &'static str) -> Result<usize, ParseError> {
    usize::try_from(value).map_err(|_| ParseError::IntegerConversion { field })
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_helpers() {
        let bytes = [0x34_u8, 0x12, 0x78, 0x56, 0xEF, 0xCD, 0xAB, 0x90];
        assert_eq!(read_le_u16(&bytes, 0).expect("u16"), 0x1234);
        assert_eq!(read_le_u32(&bytes, 0).expect("u32"), 0x5678_1234);
        assert_eq!(read_le_u32(&bytes, 4).expect("u32"), 0x90AB_CDEF);
        assert!(matches!(
            read_le_u32(&bytes, 6),
            Err(ParseError::InsufficientData {
                needed: 4,
                offset: 6,
                actual: 2,
            })
        ));
    }

    #[test]
    fn test_ensure_slice_overflow() {
        let bytes = [0_u8; 8];
        assert!(matches!(
            ensure_slice(&bytes, usize::MAX, 2),
            Err(ParseError::InvalidField {
                field: "offset",
                ..
            })
        ));
    }

    #[test]
    fn test_block_size_from_log() {
        assert_eq!(block_size_from_log(0), Some(1024));
        assert_eq!(block_size_from_log(1), Some(2048));
        assert_eq!(block_size_from_log(2), Some(4096));
        assert_eq!(block_size_from_log(64), None);
    }

    #[test]
    fn test_block_size_validation() {
        assert!(BlockSize::new(1024).is_ok());
        assert!(BlockSize::new(2048).is_ok());
        assert!(BlockSize::new(4096).is_ok());
        assert_eq!(BlockSize::new(1024).unwrap().pointers_per_block(), 256);

        assert!(BlockSize::new(0).is_err());
        assert!(BlockSize::new(512).is_err());
        assert!(BlockSize::new(8192).is_err());
        assert!(BlockSize::new(3000).is_err());
    }

    #[test]
    fn test_block_to_byte_offset() {
        let bs = BlockSize::new(1024).unwrap();
        assert_eq!(BlockNumber(0).to_byte_offset(bs), Some(ByteOffset(0)));
        assert_eq!(BlockNumber(21).to_byte_offset(bs), Some(ByteOffset(21504)));
        assert_eq!(
            BlockNumber(u32::MAX).to_byte_offset(BlockSize::new(4096).unwrap()),
            Some(ByteOffset(u64::from(u32::MAX) * 4096))
        );
    }

    #[test]
    fn test_inode_number() {
        assert_eq!(InodeNumber::ROOT, InodeNumber(2));
        assert_eq!(InodeNumber(0).table_index(), None);
        assert_eq!(InodeNumber(1).table_index(), Some(0));
        assert_eq!(InodeNumber(12).table_index(), Some(11));
    }

    #[test]
    fn test_file_mode_type_mask() {
        assert!(FileMode(EXT2_S_IFDIR | 0o755).is_dir());
        assert!(!FileMode(EXT2_S_IFDIR | 0o755).is_regular());
        assert!(FileMode(EXT2_S_IFREG | 0o644).is_regular());
        assert!(FileMode(EXT2_S_IFLNK | 0o777).is_symlink());
        // A symlink shares bits with regular + char dev; the mask must not lie.
        assert!(!FileMode(EXT2_S_IFLNK).is_regular());
    }

    #[test]
    fn test_file_mode_symbolic() {
        assert_eq!(FileMode(EXT2_S_IFREG | 0o644).symbolic(), "rw-r--r--");
        assert_eq!(FileMode(EXT2_S_IFDIR | 0o755).symbolic(), "rwxr-xr-x");
        assert_eq!(FileMode(EXT2_S_IFREG).symbolic(), "---------");
        assert_eq!(FileMode(EXT2_S_IFREG | 0o777).symbolic(), "rwxrwxrwx");
    }

    #[test]
    fn test_trim_nul_padded() {
        assert_eq!(trim_nul_padded(b"root\0\0\0\0"), "root");
        assert_eq!(trim_nul_padded(b"\0\0\0"), "");
        assert_eq!(trim_nul_padded(b"full"), "full");
    }
}
