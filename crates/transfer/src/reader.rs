use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use slicebox_protocol::slice_count;

use crate::{DEFAULT_SLICE_SIZE, TransferError};

/// Reads a source file one slice at a time.
///
/// Blocking; sessions move the reader into `spawn_blocking` for each read.
pub struct SliceReader {
    file: std::fs::File,
    slice_size: u64,
    file_size: u64,
    next_index: u32,
}

impl SliceReader {
    /// Opens `path` for sliced reading.
    ///
    /// If `slice_size` is 0, [`DEFAULT_SLICE_SIZE`] (1 MiB) is used.
    pub fn new(path: &Path, slice_size: u64) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        let slice_size = if slice_size == 0 {
            DEFAULT_SLICE_SIZE
        } else {
            slice_size
        };
        Ok(Self {
            file,
            slice_size,
            file_size,
            next_index: 0,
        })
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn slice_count(&self) -> u32 {
        slice_count(self.file_size, self.slice_size)
    }

    /// Index the next call to [`next_slice`](Self::next_slice) returns.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Positions the reader at the start of slice `index`.
    pub fn seek_to_slice(&mut self, index: u32) -> Result<(), TransferError> {
        let offset = u64::from(index) * self.slice_size;
        self.file.seek(SeekFrom::Start(offset))?;
        self.next_index = index;
        Ok(())
    }

    /// Reads the next slice. Returns `None` past the last slice.
    ///
    /// A file that shrank since it was opened fails with `UnexpectedEof`.
    pub fn next_slice(&mut self) -> Result<Option<(u32, Vec<u8>)>, TransferError> {
        let index = self.next_index;
        let offset = u64::from(index) * self.slice_size;
        if offset >= self.file_size {
            return Ok(None);
        }

        let len = (self.file_size - offset).min(self.slice_size);
        let mut buf = vec![0u8; len as usize];
        self.file.read_exact(&mut buf)?;
        self.next_index += 1;
        Ok(Some((index, buf)))
    }

    /// Reads slice `index` directly.
    pub fn read_slice(&mut self, index: u32) -> Result<Option<Vec<u8>>, TransferError> {
        self.seek_to_slice(index)?;
        Ok(self.next_slice()?.map(|(_, data)| data))
    }
}
