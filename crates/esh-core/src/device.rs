#![forbid(unsafe_code)]

use esh_error::{EshError, Result};
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Read-only file-backed image using positioned reads.
///
/// `std::os::unix::fs::FileExt::read_exact_at` does not touch a shared seek
/// position, so every operation addresses the image absolutely and no
/// operation depends on where a previous one left the cursor. The handle
/// closes on drop on all paths, including decode failures.
#[derive(Debug)]
pub struct ImageFile {
    file: std::fs::File,
    len: u64,
}

impl ImageFile {
    /// Open an image read-only. The image is never written through this
    /// handle.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Total image length in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    /// Read exactly `buf.len()` bytes at `offset`.
    ///
    /// A range extending past the end of the image is `EshError::Truncated`
    /// (reported before issuing the read), as is a short read from the OS.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len();
        let end = offset
            .checked_add(needed as u64)
            .ok_or(EshError::Truncated {
                offset,
                needed,
                actual: 0,
            })?;
        if end > self.len {
            return Err(EshError::Truncated {
                offset,
                needed,
                actual: usize::try_from(self.len.saturating_sub(offset)).unwrap_or(0),
            });
        }

        self.file.read_exact_at(buf, offset).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                EshError::Truncated {
                    offset,
                    needed,
                    actual: 0,
                }
            } else {
                EshError::Io(err)
            }
        })
    }
}
