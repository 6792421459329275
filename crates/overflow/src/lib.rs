//! # Overflow - on-disk home for paged-out slots
//!
//! Each timestamp store owns one overflow file. Cold slots are written to it
//! by the page-out threads and read back, by position, when a reader needs
//! records that are no longer resident.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────── slot 0 region ────────────────┬──── slot 1 region ────┬ ...
//! │ record 0 │ record 1 │ ... │ record SLOT_SIZE-1 │ record 0 │ ...        │
//! └───────────────────────────────────────────────┴───────────────────────┴
//!
//! record = [first_sample: u64 LE][run_length: u64 LE][timestamp: i64 LE]   (24 bytes)
//!
//! offset(record i of slot N) = (N * SLOT_SIZE + i) * 24
//! ```
//!
//! There is no header, checksum or version: the file is a cache that is
//! truncated on `clear` and deleted on `dispose`. Regions that were never
//! written (sparse holes, or slots discarded by a stress-test source) read
//! back as unused records.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use slot::Record;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Size of one encoded record: three 8-byte integers.
pub const RECORD_BYTES: u64 = 8 * 3;

/// Errors that can occur during overflow file operations.
#[derive(Debug, Error)]
pub enum OverflowError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A byte buffer did not hold a whole number of records.
    #[error("buffer of {0} bytes is not a whole number of records")]
    Misaligned(usize),
}

/// Byte offset of the record with global index `record_index`.
pub fn record_offset(record_index: u64) -> u64 {
    record_index * RECORD_BYTES
}

/// Byte offset of the region reserved for slot `slot_index`.
pub fn slot_offset(slot_index: u64, slot_size: u64) -> u64 {
    record_offset(slot_index * slot_size)
}

/// Appends the little-endian encoding of `records` to `out`.
pub fn encode_records(records: &[Record], out: &mut Vec<u8>) {
    out.reserve(records.len() * RECORD_BYTES as usize);
    for r in records {
        // writes into a Vec cannot fail
        let _ = out.write_u64::<LittleEndian>(r.first_sample);
        let _ = out.write_u64::<LittleEndian>(r.run_length);
        let _ = out.write_i64::<LittleEndian>(r.timestamp);
    }
}

/// Decodes a buffer produced by [`encode_records`].
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Record>, OverflowError> {
    if bytes.len() % RECORD_BYTES as usize != 0 {
        return Err(OverflowError::Misaligned(bytes.len()));
    }

    let mut rdr = bytes;
    let mut records = Vec::with_capacity(bytes.len() / RECORD_BYTES as usize);
    while !rdr.is_empty() {
        let first_sample = rdr.read_u64::<LittleEndian>()?;
        let run_length = rdr.read_u64::<LittleEndian>()?;
        let timestamp = rdr.read_i64::<LittleEndian>()?;
        records.push(Record::new(first_sample, run_length, timestamp));
    }
    Ok(records)
}

/// Deletes an overflow file. A file that is already gone is not an error.
pub fn remove_file<P: AsRef<Path>>(path: P) -> Result<(), OverflowError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OverflowError::Io(e)),
    }
}

/// Random-access overflow file.
///
/// All operations take `&self` and use positioned I/O, so page-out threads
/// and readers can share one handle without coordinating a file cursor.
#[derive(Debug)]
pub struct OverflowFile {
    path: PathBuf,
    file: File,
}

impl OverflowFile {
    /// Creates (or truncates) the overflow file at `path`, creating parent
    /// directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, OverflowError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64, OverflowError> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, OverflowError> {
        Ok(self.len()? == 0)
    }

    /// Writes `records` starting at global record index `first_record`, then
    /// syncs the file so the records are durable when this returns.
    pub fn write_records(&self, first_record: u64, records: &[Record]) -> Result<(), OverflowError> {
        let mut buf = Vec::new();
        encode_records(records, &mut buf);
        write_all_at(&self.file, &buf, record_offset(first_record))?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Reads `count` records starting at global record index `first_record`.
    ///
    /// Bytes past the end of the file read as zero, i.e. as unused records.
    pub fn read_records(&self, first_record: u64, count: usize) -> Result<Vec<Record>, OverflowError> {
        let mut buf = vec![0u8; count * RECORD_BYTES as usize];
        read_at_most(&self.file, &mut buf, record_offset(first_record))?;
        decode_records(&buf)
    }

    /// Empties the file.
    pub fn truncate(&self) -> Result<(), OverflowError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Closes and deletes the file.
    pub fn remove(self) -> Result<(), OverflowError> {
        let OverflowFile { path, file } = self;
        drop(file);
        remove_file(path)
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Fills as much of `buf` as the file can supply, stopping at EOF.
fn read_at_most(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<usize> {
    let mut total = 0;
    while !buf.is_empty() {
        match read_at(file, buf, offset) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                offset += n as u64;
                buf = &mut buf[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
