#![forbid(unsafe_code)]

use esh_types::{
    EXT2_GOOD_OLD_INODE_SIZE, EXT2_SUPER_MAGIC, EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE,
    FileMode, ParseError, block_size_from_log, ensure_slice, read_fixed, read_le_u16, read_le_u32,
    trim_nul_padded,
};
use serde::{Deserialize, Serialize};

/// Size of the fixed inode record layout parsed by [`Inode::parse`].
///
/// Revision-1+ images may allocate more than 128 bytes per table slot
/// (`Superblock::inode_size`), but the extra space holds no revision-0
/// fields and is skipped when indexing the table.
pub const INODE_RECORD_SIZE: usize = 128;

/// Directory entry header: inode (4) + rec_len (2) + name_len (1) + file_type (1).
pub const DIR_ENTRY_HEADER_LEN: usize = 8;

/// An ext2 revision-0 superblock, parsed from the 1024-byte region at
/// byte offset 1024.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    // ── Core geometry ────────────────────────────────────────────────────
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub r_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub frags_per_group: u32,
    pub inodes_per_group: u32,
    /// Effective inode table slot size: 128 for revision 0, `s_inode_size`
    /// otherwise.
    pub inode_size: u16,
    pub first_ino: u32,

    // ── Identity ─────────────────────────────────────────────────────────
    pub magic: u16,
    pub uuid: [u8; 16],
    pub volume_name: String,
    pub last_mounted: String,

    // ── Revision & OS ────────────────────────────────────────────────────
    pub rev_level: u32,
    pub minor_rev_level: u16,
    pub creator_os: u32,

    // ── State ────────────────────────────────────────────────────────────
    pub state: u16,
    pub errors: u16,
    pub mnt_count: u16,
    pub max_mnt_count: u16,

    // ── Timestamps ───────────────────────────────────────────────────────
    pub mtime: u32,
    pub wtime: u32,
    pub lastcheck: u32,
    pub checkinterval: u32,
}

impl Superblock {
    /// Parse an ext2 superblock from a 1024-byte superblock region.
    pub fn parse_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < EXT2_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, 0x38)?;
        if magic != EXT2_SUPER_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: EXT2_SUPER_MAGIC,
                actual: magic,
            });
        }

        let log_block_size = read_le_u32(region, 0x18)?;
        let Some(block_size) = block_size_from_log(log_block_size) else {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "invalid shift",
            });
        };
        if !matches!(block_size, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "unsupported block size",
            });
        }

        let rev_level = read_le_u32(region, 0x4C)?;
        let raw_inode_size = read_le_u16(region, 0x58)?;
        let inode_size = if rev_level == 0 || raw_inode_size == 0 {
            EXT2_GOOD_OLD_INODE_SIZE
        } else {
            if !raw_inode_size.is_power_of_two() || raw_inode_size < EXT2_GOOD_OLD_INODE_SIZE {
                return Err(ParseError::InvalidField {
                    field: "s_inode_size",
                    reason: "must be a power of two >= 128",
                });
            }
            if u32::from(raw_inode_size) > block_size {
                return Err(ParseError::InvalidField {
                    field: "s_inode_size",
                    reason: "inode_size exceeds block_size",
                });
            }
            raw_inode_size
        };

        Ok(Self {
            inodes_count: read_le_u32(region, 0x00)?,
            blocks_count: read_le_u32(region, 0x04)?,
            r_blocks_count: read_le_u32(region, 0x08)?,
            free_blocks_count: read_le_u32(region, 0x0C)?,
            free_inodes_count: read_le_u32(region, 0x10)?,
            first_data_block: read_le_u32(region, 0x14)?,
            log_block_size,
            block_size,
            blocks_per_group: read_le_u32(region, 0x20)?,
            frags_per_group: read_le_u32(region, 0x24)?,
            inodes_per_group: read_le_u32(region, 0x28)?,
            inode_size,
            first_ino: read_le_u32(region, 0x54)?,

            magic,
            uuid: read_fixed::<16>(region, 0x68)?,
            volume_name: trim_nul_padded(&read_fixed::<16>(region, 0x78)?),
            last_mounted: trim_nul_padded(&read_fixed::<64>(region, 0x88)?),

            rev_level,
            minor_rev_level: read_le_u16(region, 0x3E)?,
            creator_os: read_le_u32(region, 0x48)?,

            state: read_le_u16(region, 0x3A)?,
            errors: read_le_u16(region, 0x3C)?,
            mnt_count: read_le_u16(region, 0x34)?,
            max_mnt_count: read_le_u16(region, 0x36)?,

            mtime: read_le_u32(region, 0x2C)?,
            wtime: read_le_u32(region, 0x30)?,
            lastcheck: read_le_u32(region, 0x40)?,
            checkinterval: read_le_u32(region, 0x44)?,
        })
    }

    /// Parse an ext2 superblock from a full disk image.
    pub fn parse_from_image(image: &[u8]) -> Result<Self, ParseError> {
        let end = EXT2_SUPERBLOCK_OFFSET + EXT2_SUPERBLOCK_SIZE;
        if image.len() < end {
            return Err(ParseError::InsufficientData {
                needed: EXT2_SUPERBLOCK_SIZE,
                offset: EXT2_SUPERBLOCK_OFFSET,
                actual: image.len().saturating_sub(EXT2_SUPERBLOCK_OFFSET),
            });
        }
        Self::parse_region(&image[EXT2_SUPERBLOCK_OFFSET..end])
    }

    /// Byte length of the group-0 inode table window:
    /// `inodes_count * inode_size`.
    ///
    /// Returns `IntegerConversion` on overflow (a corrupt count).
    pub fn inode_table_bytes(&self) -> Result<usize, ParseError> {
        let count = self.inodes_count as usize;
        count
            .checked_mul(usize::from(self.inode_size))
            .ok_or(ParseError::IntegerConversion {
                field: "inode_table_bytes",
            })
    }
}

/// Group-0 block group descriptor (32 bytes at byte offset 2048).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
}

impl BlockGroupDescriptor {
    /// Parse a block group descriptor from a 32-byte region.
    ///
    /// Bytes 0x12..0x20 are pad/reserved and not retained.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < esh_types::EXT2_GROUP_DESC_SIZE {
            return Err(ParseError::InsufficientData {
                needed: esh_types::EXT2_GROUP_DESC_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            block_bitmap: read_le_u32(bytes, 0x00)?,
            inode_bitmap: read_le_u32(bytes, 0x04)?,
            inode_table: read_le_u32(bytes, 0x08)?,
            free_blocks_count: read_le_u16(bytes, 0x0C)?,
            free_inodes_count: read_le_u16(bytes, 0x0E)?,
            used_dirs_count: read_le_u16(bytes, 0x10)?,
        })
    }
}

/// An ext2 inode record (first 128 bytes of a table slot).
///
/// The OS-dependent union regions (`i_osd1`, `i_osd2`) only carry a Linux
/// interpretation this system never exercises; they are retained as opaque
/// reserved bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub mode: FileMode,
    pub uid: u16,
    pub size: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_count: u16,
    /// Reserved 512-byte sectors, not filesystem blocks.
    pub blocks: u32,
    pub flags: u32,
    pub osd1: [u8; 4],
    /// Block pointers: `[0..12]` direct, `[12]` indirect, `[13]` double
    /// indirect, `[14]` triple indirect. Zero means unallocated (a hole).
    pub block: [u32; 15],
    pub generation: u32,
    pub file_acl: u32,
    pub dir_acl: u32,
    pub faddr: u32,
    pub osd2: [u8; 12],
}

impl Inode {
    /// Parse an inode from raw bytes. Requires at least 128 bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < INODE_RECORD_SIZE {
            return Err(ParseError::InsufficientData {
                needed: INODE_RECORD_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let mut block = [0_u32; 15];
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = read_le_u32(bytes, 0x28 + i * 4)?;
        }

        Ok(Self {
            mode: FileMode(read_le_u16(bytes, 0x00)?),
            uid: read_le_u16(bytes, 0x02)?,
            size: read_le_u32(bytes, 0x04)?,
            atime: read_le_u32(bytes, 0x08)?,
            ctime: read_le_u32(bytes, 0x0C)?,
            mtime: read_le_u32(bytes, 0x10)?,
            dtime: read_le_u32(bytes, 0x14)?,
            gid: read_le_u16(bytes, 0x18)?,
            links_count: read_le_u16(bytes, 0x1A)?,
            blocks: read_le_u32(bytes, 0x1C)?,
            flags: read_le_u32(bytes, 0x20)?,
            osd1: read_fixed::<4>(bytes, 0x24)?,
            block,
            generation: read_le_u32(bytes, 0x64)?,
            file_acl: read_le_u32(bytes, 0x68)?,
            dir_acl: read_le_u32(bytes, 0x6C)?,
            faddr: read_le_u32(bytes, 0x70)?,
            osd2: read_fixed::<12>(bytes, 0x74)?,
        })
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.mode.is_regular()
    }
}

/// Directory entry file type codes (revision-0 FILETYPE semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FileType {
    Unknown = 0,
    RegFile = 1,
    Dir = 2,
    Chrdev = 3,
    Blkdev = 4,
    Fifo = 5,
    Sock = 6,
    Symlink = 7,
}

impl FileType {
    #[must_use]
    pub fn from_raw(val: u8) -> Self {
        match val {
            1 => Self::RegFile,
            2 => Self::Dir,
            3 => Self::Chrdev,
            4 => Self::Blkdev,
            5 => Self::Fifo,
            6 => Self::Sock,
            7 => Self::Symlink,
            _ => Self::Unknown,
        }
    }

    /// Single-character listing glyph.
    #[must_use]
    pub fn glyph(self) -> char {
        match self {
            Self::RegFile => '-',
            Self::Dir => 'd',
            Self::Chrdev => 'c',
            Self::Blkdev => 'b',
            Self::Fifo => 'B',
            Self::Sock => 'S',
            Self::Symlink => 'l',
            Self::Unknown => 'X',
        }
    }
}

/// A parsed directory entry (owned name bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: FileType,
    pub name: Vec<u8>,
}

impl DirEntry {
    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether this is the `.` entry.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    /// Whether this is the `..` entry.
    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// A borrowed directory entry (zero-copy reference into the block buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntryRef<'a> {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: FileType,
    pub name: &'a [u8],
}

impl DirEntryRef<'_> {
    /// Convert to an owned [`DirEntry`] (allocates name bytes).
    #[must_use]
    pub fn to_owned(&self) -> DirEntry {
        DirEntry {
            inode: self.inode,
            rec_len: self.rec_len,
            name_len: self.name_len,
            file_type: self.file_type,
            name: self.name.to_vec(),
        }
    }

    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// Lazy iterator over the directory entries of one directory data block.
///
/// Each step decodes an 8-byte header plus `name_len` name bytes and
/// advances by `rec_len`, the on-disk distance to the next record, which
/// covers any padding between the name and the next header. Iteration ends
/// at the first zero-inode entry: revision-0 directories use it as the
/// terminator of the entry chain, and records past it are not interpreted.
///
/// Malformed entries (rec_len < 8, record or name running past the block
/// end) yield one `Err` and end iteration.
pub struct DirBlockIter<'a> {
    block: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> DirBlockIter<'a> {
    #[must_use]
    pub fn new(block: &'a [u8]) -> Self {
        Self {
            block,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for DirBlockIter<'a> {
    type Item = Result<DirEntryRef<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset + DIR_ENTRY_HEADER_LEN > self.block.len() {
            return None;
        }

        let header = match decode_header(self.block, self.offset) {
            Ok(header) => header,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        // Inode 0 terminates the chain for this block.
        if header.inode == 0 {
            self.done = true;
            return None;
        }

        if header.rec_len < DIR_ENTRY_HEADER_LEN as u16 {
            self.done = true;
            return Some(Err(ParseError::InvalidField {
                field: "rec_len",
                reason: "directory entry rec_len < 8",
            }));
        }

        let entry_end = self.offset + usize::from(header.rec_len);
        if entry_end > self.block.len() {
            self.done = true;
            return Some(Err(ParseError::InvalidField {
                field: "rec_len",
                reason: "directory entry extends past block boundary",
            }));
        }

        let name_end = self.offset + DIR_ENTRY_HEADER_LEN + usize::from(header.name_len);
        if name_end > entry_end {
            self.done = true;
            return Some(Err(ParseError::InvalidField {
                field: "name_len",
                reason: "name extends past rec_len",
            }));
        }

        let name = &self.block[self.offset + DIR_ENTRY_HEADER_LEN..name_end];
        self.offset = entry_end;

        Some(Ok(DirEntryRef {
            inode: header.inode,
            rec_len: header.rec_len,
            name_len: header.name_len,
            file_type: FileType::from_raw(header.file_type),
            name,
        }))
    }
}

struct RawHeader {
    inode: u32,
    rec_len: u16,
    name_len: u8,
    file_type: u8,
}

fn decode_header(block: &[u8], offset: usize) -> Result<RawHeader, ParseError> {
    Ok(RawHeader {
        inode: read_le_u32(block, offset)?,
        rec_len: read_le_u16(block, offset + 4)?,
        name_len: ensure_slice(block, offset + 6, 1)?[0],
        file_type: ensure_slice(block, offset + 7, 1)?[0],
    })
}

/// Parse all live directory entries from a single directory data block.
pub fn parse_dir_block(block: &[u8]) -> Result<Vec<DirEntry>, ParseError> {
    DirBlockIter::new(block)
        .map(|entry| entry.map(|e| e.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use esh_types::{EXT2_GROUP_DESC_SIZE, EXT2_S_IFDIR, EXT2_S_IFREG};

    fn minimal_superblock_region() -> Vec<u8> {
        let mut region = vec![0_u8; EXT2_SUPERBLOCK_SIZE];
        region[0x00..0x04].copy_from_slice(&32_u32.to_le_bytes()); // inodes_count
        region[0x04..0x08].copy_from_slice(&64_u32.to_le_bytes()); // blocks_count
        region[0x14..0x18].copy_from_slice(&1_u32.to_le_bytes()); // first_data_block
        region[0x18..0x1C].copy_from_slice(&0_u32.to_le_bytes()); // log_block_size=0 -> 1K
        region[0x20..0x24].copy_from_slice(&64_u32.to_le_bytes()); // blocks_per_group
        region[0x28..0x2C].copy_from_slice(&32_u32.to_le_bytes()); // inodes_per_group
        region[0x38..0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
        region[0x3A..0x3C].copy_from_slice(&1_u16.to_le_bytes()); // state = VALID_FS
        region
    }

    #[test]
    fn superblock_parses_geometry() {
        let region = minimal_superblock_region();
        let sb = Superblock::parse_region(&region).expect("valid superblock");
        assert_eq!(sb.inodes_count, 32);
        assert_eq!(sb.blocks_count, 64);
        assert_eq!(sb.first_data_block, 1);
        assert_eq!(sb.block_size, 1024);
        assert_eq!(sb.magic, EXT2_SUPER_MAGIC);
        assert_eq!(sb.state, 1);
        // Revision 0 with a zero s_inode_size field falls back to 128.
        assert_eq!(sb.inode_size, 128);
        assert_eq!(sb.inode_table_bytes().unwrap(), 32 * 128);
    }

    #[test]
    fn superblock_block_size_shift() {
        for (log, expected) in [(0_u32, 1024_u32), (1, 2048), (2, 4096)] {
            let mut region = minimal_superblock_region();
            region[0x18..0x1C].copy_from_slice(&log.to_le_bytes());
            let sb = Superblock::parse_region(&region).expect("valid superblock");
            assert_eq!(sb.block_size, expected);
            assert_eq!(sb.block_size, 1024 << sb.log_block_size);
        }
    }

    #[test]
    fn superblock_rejects_oversized_shift() {
        let mut region = minimal_superblock_region();
        region[0x18..0x1C].copy_from_slice(&3_u32.to_le_bytes()); // 8K
        assert!(matches!(
            Superblock::parse_region(&region),
            Err(ParseError::InvalidField {
                field: "s_log_block_size",
                ..
            })
        ));
    }

    #[test]
    fn superblock_rejects_bad_magic() {
        let mut region = minimal_superblock_region();
        region[0x38..0x3A].copy_from_slice(&0xEF54_u16.to_le_bytes());
        assert_eq!(
            Superblock::parse_region(&region),
            Err(ParseError::InvalidMagic {
                expected: EXT2_SUPER_MAGIC,
                actual: 0xEF54,
            })
        );
    }

    #[test]
    fn superblock_rejects_short_region() {
        let region = minimal_superblock_region();
        assert!(matches!(
            Superblock::parse_region(&region[..512]),
            Err(ParseError::InsufficientData {
                needed: 1024,
                offset: 0,
                actual: 512,
            })
        ));
    }

    #[test]
    fn superblock_revision1_inode_size() {
        let mut region = minimal_superblock_region();
        region[0x4C..0x50].copy_from_slice(&1_u32.to_le_bytes()); // rev_level
        region[0x58..0x5A].copy_from_slice(&256_u16.to_le_bytes());
        let sb = Superblock::parse_region(&region).expect("valid superblock");
        assert_eq!(sb.inode_size, 256);

        // Non-power-of-two inode size is rejected for revision 1.
        region[0x58..0x5A].copy_from_slice(&200_u16.to_le_bytes());
        assert!(Superblock::parse_region(&region).is_err());
    }

    #[test]
    fn superblock_parse_from_image_offset() {
        let mut image = vec![0_u8; 4096];
        image[EXT2_SUPERBLOCK_OFFSET..EXT2_SUPERBLOCK_OFFSET + EXT2_SUPERBLOCK_SIZE]
            .copy_from_slice(&minimal_superblock_region());
        let sb = Superblock::parse_from_image(&image).expect("valid superblock");
        assert_eq!(sb.blocks_count, 64);

        assert!(matches!(
            Superblock::parse_from_image(&image[..1500]),
            Err(ParseError::InsufficientData { .. })
        ));
    }

    #[test]
    fn superblock_identity_fields() {
        let mut region = minimal_superblock_region();
        region[0x78..0x7E].copy_from_slice(b"images");
        region[0x88..0x8C].copy_from_slice(b"/mnt");
        let sb = Superblock::parse_region(&region).expect("valid superblock");
        assert_eq!(sb.volume_name, "images");
        assert_eq!(sb.last_mounted, "/mnt");
    }

    #[test]
    fn group_descriptor_parses() {
        let mut bytes = [0_u8; EXT2_GROUP_DESC_SIZE];
        bytes[0x00..0x04].copy_from_slice(&3_u32.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&4_u32.to_le_bytes());
        bytes[0x08..0x0C].copy_from_slice(&5_u32.to_le_bytes());
        bytes[0x0C..0x0E].copy_from_slice(&40_u16.to_le_bytes());
        bytes[0x0E..0x10].copy_from_slice(&20_u16.to_le_bytes());
        bytes[0x10..0x12].copy_from_slice(&2_u16.to_le_bytes());

        let bg = BlockGroupDescriptor::parse(&bytes).expect("valid descriptor");
        assert_eq!(bg.block_bitmap, 3);
        assert_eq!(bg.inode_bitmap, 4);
        assert_eq!(bg.inode_table, 5);
        assert_eq!(bg.free_blocks_count, 40);
        assert_eq!(bg.free_inodes_count, 20);
        assert_eq!(bg.used_dirs_count, 2);

        assert!(matches!(
            BlockGroupDescriptor::parse(&bytes[..16]),
            Err(ParseError::InsufficientData { .. })
        ));
    }

    fn raw_inode(mode: u16, size: u32, links: u16, block0: u32) -> [u8; INODE_RECORD_SIZE] {
        let mut bytes = [0_u8; INODE_RECORD_SIZE];
        bytes[0x00..0x02].copy_from_slice(&mode.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&size.to_le_bytes());
        bytes[0x1A..0x1C].copy_from_slice(&links.to_le_bytes());
        bytes[0x28..0x2C].copy_from_slice(&block0.to_le_bytes());
        bytes
    }

    #[test]
    fn inode_parses_core_fields() {
        let mut bytes = raw_inode(EXT2_S_IFREG | 0o644, 1337, 1, 21);
        bytes[0x28 + 12 * 4..0x28 + 13 * 4].copy_from_slice(&77_u32.to_le_bytes());
        bytes[0x64..0x68].copy_from_slice(&9_u32.to_le_bytes());

        let inode = Inode::parse(&bytes).expect("valid inode");
        assert!(inode.is_regular());
        assert!(!inode.is_dir());
        assert_eq!(inode.size, 1337);
        assert_eq!(inode.links_count, 1);
        assert_eq!(inode.block[0], 21);
        assert_eq!(inode.block[12], 77);
        assert_eq!(inode.generation, 9);
        assert_eq!(inode.mode.symbolic(), "rw-r--r--");
    }

    #[test]
    fn inode_rejects_short_record() {
        let bytes = raw_inode(EXT2_S_IFDIR | 0o755, 1024, 2, 21);
        assert!(matches!(
            Inode::parse(&bytes[..100]),
            Err(ParseError::InsufficientData {
                needed: 128,
                offset: 0,
                actual: 100,
            })
        ));
    }

    #[test]
    fn file_type_glyphs() {
        assert_eq!(FileType::from_raw(1), FileType::RegFile);
        assert_eq!(FileType::from_raw(2), FileType::Dir);
        assert_eq!(FileType::from_raw(42), FileType::Unknown);

        assert_eq!(FileType::RegFile.glyph(), '-');
        assert_eq!(FileType::Dir.glyph(), 'd');
        assert_eq!(FileType::Chrdev.glyph(), 'c');
        assert_eq!(FileType::Blkdev.glyph(), 'b');
        assert_eq!(FileType::Fifo.glyph(), 'B');
        assert_eq!(FileType::Sock.glyph(), 'S');
        assert_eq!(FileType::Symlink.glyph(), 'l');
        assert_eq!(FileType::Unknown.glyph(), 'X');
    }

    /// Write one directory entry at `offset`, returning the next offset.
    fn put_entry(
        block: &mut [u8],
        offset: usize,
        inode: u32,
        rec_len: u16,
        file_type: u8,
        name: &[u8],
    ) -> usize {
        block[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
        block[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
        block[offset + 6] = u8::try_from(name.len()).unwrap();
        block[offset + 7] = file_type;
        block[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
        offset + usize::from(rec_len)
    }

    fn sample_dir_block() -> Vec<u8> {
        let mut block = vec![0_u8; 1024];
        let mut off = 0;
        off = put_entry(&mut block, off, 2, 12, 2, b".");
        off = put_entry(&mut block, off, 2, 12, 2, b"..");
        off = put_entry(&mut block, off, 12, 20, 1, b"foo.txt");
        // rec_len padded well past the name, as mkfs leaves it on disk.
        off = put_entry(&mut block, off, 13, 40, 2, b"docs");
        put_entry(&mut block, off, 14, 16, 1, b".hidden");
        // Remaining bytes stay zero: the next header has inode 0.
        block
    }

    #[test]
    fn dir_iter_yields_entries_in_disk_order() {
        let block = sample_dir_block();
        let names: Vec<String> = DirBlockIter::new(&block)
            .map(|e| e.expect("valid entry").to_owned().name_str())
            .collect();
        assert_eq!(names, vec![".", "..", "foo.txt", "docs", ".hidden"]);
    }

    #[test]
    fn dir_iter_stops_at_zero_inode_terminator() {
        let mut block = vec![0_u8; 1024];
        let mut off = 0;
        off = put_entry(&mut block, off, 12, 16, 1, b"kept");
        // Terminator with a plausible rec_len, then a live record behind it.
        off = put_entry(&mut block, off, 0, 16, 0, b"");
        put_entry(&mut block, off, 13, 16, 1, b"lost");

        let entries = parse_dir_block(&block).expect("walk succeeds");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, b"kept");
        assert_eq!(entries[0].inode, 12);
        assert_eq!(entries[0].file_type, FileType::RegFile);
    }

    #[test]
    fn dir_iter_is_restartable() {
        let block = sample_dir_block();
        let first: Vec<_> = DirBlockIter::new(&block).map(Result::unwrap).collect();
        let second: Vec<_> = DirBlockIter::new(&block).map(Result::unwrap).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn dir_iter_handles_full_block_without_terminator() {
        let mut block = vec![0_u8; 32];
        let off = put_entry(&mut block, 0, 5, 16, 1, b"a");
        put_entry(&mut block, off, 6, 16, 1, b"b");

        let entries = parse_dir_block(&block).expect("walk succeeds");
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn dir_iter_rejects_small_rec_len() {
        let mut block = vec![0_u8; 64];
        put_entry(&mut block, 0, 5, 16, 1, b"ok");
        block[4..6].copy_from_slice(&4_u16.to_le_bytes()); // rec_len < 8

        let mut iter = DirBlockIter::new(&block);
        assert!(matches!(
            iter.next(),
            Some(Err(ParseError::InvalidField {
                field: "rec_len",
                ..
            }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn dir_iter_rejects_record_past_block_end() {
        let mut block = vec![0_u8; 32];
        put_entry(&mut block, 0, 5, 16, 1, b"ok");
        block[4..6].copy_from_slice(&64_u16.to_le_bytes());

        let mut iter = DirBlockIter::new(&block);
        assert!(matches!(
            iter.next(),
            Some(Err(ParseError::InvalidField {
                field: "rec_len",
                ..
            }))
        ));
    }

    #[test]
    fn dir_iter_rejects_name_past_rec_len() {
        let mut block = vec![0_u8; 64];
        put_entry(&mut block, 0, 5, 12, 1, b"abc");
        block[6] = 9; // name_len > rec_len - 8

        let mut iter = DirBlockIter::new(&block);
        assert!(matches!(
            iter.next(),
            Some(Err(ParseError::InvalidField {
                field: "name_len",
                ..
            }))
        ));
    }

    #[test]
    fn dir_entry_dot_helpers() {
        let block = sample_dir_block();
        let entries = parse_dir_block(&block).expect("walk succeeds");
        assert!(entries[0].is_dot());
        assert!(entries[1].is_dotdot());
        assert!(!entries[4].is_dot());
        assert!(!entries[4].is_dotdot());
    }
}
