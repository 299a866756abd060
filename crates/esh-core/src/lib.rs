#![forbid(unsafe_code)]
//! Core engine for extshell: opens an ext2 image, caches its metadata, and
//! exposes directory walking, name lookup, and file extraction.
//!
//! All state lives in an explicit [`FsImage`] constructed once per image and
//! passed by reference into every operation; several images can be open at
//! the same time. Operations are synchronous and single-threaded, and every
//! read addresses the image at an absolute offset.

mod device;

pub use device::ImageFile;

use esh_error::{EshError, Result};
use esh_ondisk::{
    BlockGroupDescriptor, DirBlockIter, DirEntry, FileType, INODE_RECORD_SIZE, Inode, Superblock,
};
use esh_types::{
    BlockNumber, BlockSize, EXT2_GROUP_DESC_OFFSET, EXT2_GROUP_DESC_SIZE, EXT2_SUPERBLOCK_OFFSET,
    EXT2_SUPERBLOCK_SIZE, InodeNumber, ParseError, ensure_slice, read_le_u32,
};
use std::path::Path;
use tracing::{debug, trace};

/// Convert a parse-layer error into the user-facing error type.
///
/// `InsufficientData` carries a region-relative offset; everything the core
/// reads is an exact-size region, so a short region means the image itself
/// was short where that region came from.
fn parse_error(err: ParseError) -> EshError {
    match err {
        ParseError::InsufficientData {
            needed,
            offset,
            actual,
        } => EshError::Truncated {
            offset: offset as u64,
            needed,
            actual,
        },
        ParseError::IntegerConversion { .. } => EshError::Parse(err.to_string()),
        ParseError::InvalidMagic { .. } | ParseError::InvalidField { .. } => {
            EshError::Format(err.to_string())
        }
    }
}

/// Decode the 128-byte inode record at `index * inode_size` within an
/// already-loaded inode table window. No I/O.
pub fn decode_inode(table: &[u8], index: usize, inode_size: usize) -> Result<Inode> {
    let offset = index
        .checked_mul(inode_size)
        .ok_or_else(|| EshError::Parse("inode table index overflow".to_owned()))?;
    let record = ensure_slice(table, offset, INODE_RECORD_SIZE).map_err(parse_error)?;
    Inode::parse(record).map_err(parse_error)
}

/// The group-0 inode table, bulk-loaded once at open time.
///
/// Holds the raw `inodes_count * inode_size` byte window; records decode on
/// lookup. Never mutated; dropped with the image.
#[derive(Debug)]
pub struct InodeTable {
    raw: Vec<u8>,
    inode_size: usize,
    count: u32,
}

impl InodeTable {
    /// Load the inode table window from `blockgroup.inode_table * block_size`.
    pub fn load(
        device: &ImageFile,
        superblock: &Superblock,
        blockgroup: &BlockGroupDescriptor,
        block_size: BlockSize,
    ) -> Result<Self> {
        let table_bytes = superblock.inode_table_bytes().map_err(parse_error)?;
        let offset = BlockNumber(blockgroup.inode_table)
            .to_byte_offset(block_size)
            .ok_or_else(|| {
                EshError::Format(format!(
                    "inode table block {} offset overflows",
                    blockgroup.inode_table
                ))
            })?;

        let mut raw = vec![0_u8; table_bytes];
        device.read_exact_at(offset.0, &mut raw)?;
        debug!(
            block = blockgroup.inode_table,
            bytes = table_bytes,
            inodes = superblock.inodes_count,
            "inode table cached"
        );

        Ok(Self {
            raw,
            inode_size: usize::from(superblock.inode_size),
            count: superblock.inodes_count,
        })
    }

    /// Number of inodes in the table.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Decode the record for a 1-based inode number.
    pub fn get(&self, ino: InodeNumber) -> Result<Inode> {
        if ino.0 == 0 || ino.0 > self.count {
            return Err(EshError::InvalidInode {
                ino: ino.0,
                count: self.count,
            });
        }
        let index = ino.table_index().unwrap_or_default();
        decode_inode(&self.raw, index, self.inode_size)
    }
}

/// One directory data block, owned, with lazy entry iteration.
///
/// The iterator is restartable: call [`entries`](Self::entries) again to
/// walk from the start.
#[derive(Debug)]
pub struct DirBlock {
    data: Vec<u8>,
}

impl DirBlock {
    #[must_use]
    pub fn entries(&self) -> DirBlockIter<'_> {
        DirBlockIter::new(&self.data)
    }
}

/// An open ext2 image: file handle, decoded metadata, and cached geometry.
#[derive(Debug)]
pub struct FsImage {
    device: ImageFile,
    superblock: Superblock,
    blockgroup: BlockGroupDescriptor,
    inodes: InodeTable,
    block_size: BlockSize,
}

impl FsImage {
    /// Open an image and decode its metadata: superblock, group-0
    /// descriptor, inode table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let device = ImageFile::open(path)?;

        let mut region = [0_u8; EXT2_SUPERBLOCK_SIZE];
        device.read_exact_at(EXT2_SUPERBLOCK_OFFSET as u64, &mut region)?;
        let superblock = Superblock::parse_region(&region).map_err(parse_error)?;
        let block_size = BlockSize::new(superblock.block_size).map_err(parse_error)?;

        let mut desc = [0_u8; EXT2_GROUP_DESC_SIZE];
        device.read_exact_at(EXT2_GROUP_DESC_OFFSET as u64, &mut desc)?;
        let blockgroup = BlockGroupDescriptor::parse(&desc).map_err(parse_error)?;

        if blockgroup.inode_table >= superblock.blocks_count {
            return Err(EshError::Format(format!(
                "inode table block {} beyond blocks_count {}",
                blockgroup.inode_table, superblock.blocks_count
            )));
        }

        let inodes = InodeTable::load(&device, &superblock, &blockgroup, block_size)?;

        debug!(
            block_size = block_size.get(),
            inodes_count = superblock.inodes_count,
            inode_size = superblock.inode_size,
            inode_table_block = blockgroup.inode_table,
            "ext2 image opened"
        );

        Ok(Self {
            device,
            superblock,
            blockgroup,
            inodes,
            block_size,
        })
    }

    #[must_use]
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    #[must_use]
    pub fn blockgroup(&self) -> &BlockGroupDescriptor {
        &self.blockgroup
    }

    #[must_use]
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// Decode the inode record for a 1-based inode number.
    pub fn inode(&self, ino: InodeNumber) -> Result<Inode> {
        self.inodes.get(ino)
    }

    /// Read one block-size's worth of bytes at `block * block_size`.
    pub fn read_block(&self, block: BlockNumber) -> Result<Vec<u8>> {
        let offset = block.to_byte_offset(self.block_size).ok_or_else(|| {
            EshError::Format(format!("block {block} offset overflows"))
        })?;
        let mut buf = vec![0_u8; self.block_size.get() as usize];
        self.device.read_exact_at(offset.0, &mut buf)?;
        trace!(block = block.0, offset = offset.0, "block read");
        Ok(buf)
    }

    /// Read a directory inode's first data block.
    ///
    /// Revision-0 listings are defined over the first block only; the
    /// zero-inode terminator ends the entry chain.
    pub fn dir_block(&self, inode: &Inode) -> Result<DirBlock> {
        let first = inode.block[0];
        if first == 0 {
            return Err(EshError::Format(
                "directory has no data block".to_owned(),
            ));
        }
        let data = self.read_block(BlockNumber(first))?;
        Ok(DirBlock { data })
    }

    /// Visible entries of a directory, in on-disk order.
    ///
    /// `.` and `..` are excluded here, by the listing operation; the
    /// walker itself stays a pure decode primitive.
    pub fn list_dir(&self, dir: InodeNumber) -> Result<Vec<DirEntry>> {
        let inode = self.inodes.get(dir)?;
        if !inode.is_dir() {
            return Err(EshError::NotDirectory { ino: dir.0 });
        }

        let block = self.dir_block(&inode)?;
        let mut out = Vec::new();
        for entry in block.entries() {
            let entry = entry.map_err(parse_error)?;
            if entry.is_dot() || entry.is_dotdot() {
                continue;
            }
            out.push(entry.to_owned());
        }
        Ok(out)
    }

    /// Resolve `name` within a directory, requiring an exact byte-equal
    /// name and a matching file type.
    ///
    /// `Ok(None)` is the normal not-found outcome. Dot entries are not
    /// filtered here, so `..` resolves to the parent directory.
    pub fn find_by_name(
        &self,
        dir: InodeNumber,
        name: &[u8],
        expected: FileType,
    ) -> Result<Option<DirEntry>> {
        let inode = self.inodes.get(dir)?;
        if !inode.is_dir() {
            return Err(EshError::NotDirectory { ino: dir.0 });
        }

        let block = self.dir_block(&inode)?;
        for entry in block.entries() {
            let entry = entry.map_err(parse_error)?;
            if entry.file_type == expected && entry.name == name {
                trace!(ino = entry.inode, "name resolved");
                return Ok(Some(entry.to_owned()));
            }
        }
        Ok(None)
    }

    /// Resolve a logical block index within a file to a physical block.
    ///
    /// Walks direct pointers, then the indirect, double-indirect, and
    /// triple-indirect trees. `Ok(None)` means the logical block is a hole
    /// (reads as zeros).
    pub fn data_block(&self, inode: &Inode, logical: u32) -> Result<Option<BlockNumber>> {
        let ppb = u64::from(self.block_size.pointers_per_block());
        let mut l = u64::from(logical);

        if l < 12 {
            return Ok(nonzero(inode.block[usize::try_from(l).unwrap_or_default()]));
        }
        l -= 12;

        if l < ppb {
            return self.walk_pointers(inode.block[12], &[l]);
        }
        l -= ppb;

        if l < ppb * ppb {
            return self.walk_pointers(inode.block[13], &[l / ppb, l % ppb]);
        }
        l -= ppb * ppb;

        if l < ppb * ppb * ppb {
            return self.walk_pointers(inode.block[14], &[l / (ppb * ppb), (l / ppb) % ppb, l % ppb]);
        }

        Err(EshError::Format(format!(
            "logical block {logical} beyond triple-indirect range"
        )))
    }

    /// Follow a chain of pointer blocks, indexing each level by `path`.
    ///
    /// A zero pointer at any level makes the whole remaining range a hole.
    fn walk_pointers(&self, start: u32, path: &[u64]) -> Result<Option<BlockNumber>> {
        let mut current = start;
        for &index in path {
            if current == 0 {
                return Ok(None);
            }
            let pointers = self.read_block(BlockNumber(current))?;
            let slot = usize::try_from(index).unwrap_or_default() * 4;
            current = read_le_u32(&pointers, slot).map_err(parse_error)?;
        }
        Ok(nonzero(current))
    }

    /// Read a file's full content: exactly `inode.size` bytes, resolving
    /// every data block and zero-filling holes.
    pub fn read_file(&self, ino: InodeNumber) -> Result<Vec<u8>> {
        let inode = self.inodes.get(ino)?;
        let size = inode.size as usize;
        let bs = self.block_size.get() as usize;

        let mut out = Vec::with_capacity(size);
        let blocks_needed = size.div_ceil(bs);
        for logical in 0..blocks_needed {
            let want = (size - out.len()).min(bs);
            #[allow(clippy::cast_possible_truncation)] // bounded by size / bs
            match self.data_block(&inode, logical as u32)? {
                Some(block) => {
                    let data = self.read_block(block)?;
                    out.extend_from_slice(&data[..want]);
                }
                None => out.resize(out.len() + want, 0),
            }
        }

        trace!(ino = ino.0, size, "file content read");
        Ok(out)
    }
}

/// Current-directory state for interactive navigation.
///
/// Starts at the root directory (inode 2) and moves only on a successful
/// directory-typed lookup; a failed lookup leaves the state untouched.
#[derive(Debug, Clone, Copy)]
pub struct Navigator {
    cwd: InodeNumber,
}

impl Navigator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cwd: InodeNumber::ROOT,
        }
    }

    #[must_use]
    pub fn cwd(&self) -> InodeNumber {
        self.cwd
    }

    /// Attempt to change into `name`. Returns `Ok(true)` and updates the
    /// current directory on success, `Ok(false)` without touching state
    /// when no directory of that name exists.
    pub fn change_dir(&mut self, image: &FsImage, name: &[u8]) -> Result<bool> {
        match image.find_by_name(self.cwd, name, FileType::Dir)? {
            Some(entry) => {
                self.cwd = InodeNumber(entry.inode);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

fn nonzero(block: u32) -> Option<BlockNumber> {
    (block != 0).then_some(BlockNumber(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mapping() {
        let truncated = parse_error(ParseError::InsufficientData {
            needed: 128,
            offset: 256,
            actual: 64,
        });
        assert!(matches!(
            truncated,
            EshError::Truncated {
                offset: 256,
                needed: 128,
                actual: 64,
            }
        ));

        let magic = parse_error(ParseError::InvalidMagic {
            expected: 0xEF53,
            actual: 0,
        });
        assert!(matches!(magic, EshError::Format(_)));

        let conv = parse_error(ParseError::IntegerConversion { field: "x" });
        assert!(matches!(conv, EshError::Parse(_)));
    }

    #[test]
    fn decode_inode_indexes_by_slot_size() {
        // Two 256-byte slots; the record is the first 128 bytes of each.
        let mut table = vec![0_u8; 512];
        table[256..258].copy_from_slice(&0x8000_u16.to_le_bytes());
        table[256 + 4..256 + 8].copy_from_slice(&99_u32.to_le_bytes());

        let inode = decode_inode(&table, 1, 256).expect("valid record");
        assert!(inode.is_regular());
        assert_eq!(inode.size, 99);

        assert!(matches!(
            decode_inode(&table, 2, 256),
            Err(EshError::Truncated { .. })
        ));
    }

    #[test]
    fn navigator_starts_at_root() {
        let nav = Navigator::new();
        assert_eq!(nav.cwd(), InodeNumber::ROOT);
    }
}
