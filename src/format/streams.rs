//! Byte store behind an open product.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use tracing::trace;

use crate::util::{Error, Result};

/// How a product file is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `"rb"`
    #[default]
    ReadOnly,
    /// `"rb+"` / `"r+b"`
    ReadWrite,
}

impl OpenMode {
    /// Parse a mode string.
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "rb" => Ok(Self::ReadOnly),
            "rb+" | "r+b" => Ok(Self::ReadWrite),
            other => Err(Error::invalid(format!("invalid open mode: \"{}\"", other))),
        }
    }

    /// Canonical mode string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "rb",
            Self::ReadWrite => "rb+",
        }
    }

    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl std::str::FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Random-access byte store for a product file.
/// Read-only products may be memory-mapped; writable ones use the file.
pub struct ProductStreams {
    inner: StreamsInner,
    mode: OpenMode,
    size: u64,
}

enum StreamsInner {
    /// Memory-mapped file (read-only)
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    /// Positioned file access
    File(File),
}

impl ProductStreams {
    /// Open a file with the given mode, memory-mapping read-only files when
    /// `use_mmap` is set.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(mode.is_writable())
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FileNotFound(path.to_path_buf())
                } else {
                    Error::Io(e)
                }
            })?;

        let size = file.metadata()?.len();
        let inner = Self::make_inner(file, mode, use_mmap && size > 0)?;

        Ok(Self { inner, mode, size })
    }

    #[cfg(feature = "mmap")]
    fn make_inner(file: File, mode: OpenMode, use_mmap: bool) -> Result<StreamsInner> {
        if use_mmap && !mode.is_writable() {
            // Safety: the map is read-only and never outlives the streams
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            Ok(StreamsInner::Mmap(mmap))
        } else {
            Ok(StreamsInner::File(file))
        }
    }

    #[cfg(not(feature = "mmap"))]
    fn make_inner(file: File, _mode: OpenMode, _use_mmap: bool) -> Result<StreamsInner> {
        Ok(StreamsInner::File(file))
    }

    /// Get the total file size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Check if the file is memory-mapped.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        match &self.inner {
            #[cfg(feature = "mmap")]
            StreamsInner::Mmap(_) => true,
            StreamsInner::File(_) => false,
        }
    }

    fn check_range(&self, pos: u64, len: usize) -> Result<()> {
        let end = pos
            .checked_add(len as u64)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.size {
            return Err(Error::UnexpectedEof(end));
        }
        Ok(())
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(pos, len)?;
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len())?;

        match &mut self.inner {
            #[cfg(feature = "mmap")]
            StreamsInner::Mmap(mmap) => {
                let start = pos as usize;
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
                Ok(())
            }
            StreamsInner::File(f) => {
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    /// Write bytes in place. Writes never grow the file.
    pub fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        if !self.mode.is_writable() {
            return Err(Error::ReadOnly);
        }
        self.check_range(pos, data.len())?;
        trace!(pos, len = data.len(), "write");

        match &mut self.inner {
            #[cfg(feature = "mmap")]
            StreamsInner::Mmap(_) => Err(Error::ReadOnly),
            StreamsInner::File(f) => {
                f.seek(SeekFrom::Start(pos))?;
                f.write_all(data)?;
                Ok(())
            }
        }
    }

    /// Commit pending writes to storage. No-op for read-only streams.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.inner {
            #[cfg(feature = "mmap")]
            StreamsInner::Mmap(_) => Ok(()),
            StreamsInner::File(f) => {
                if self.mode.is_writable() {
                    f.flush()?;
                    f.sync_data()?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!(OpenMode::parse("rb").unwrap(), OpenMode::ReadOnly);
        assert_eq!(OpenMode::parse("rb+").unwrap(), OpenMode::ReadWrite);
        assert_eq!(OpenMode::parse("r+b").unwrap(), OpenMode::ReadWrite);
        assert!(OpenMode::parse("wb").is_err());
        assert!(OpenMode::parse("").is_err());
    }

    #[test]
    fn test_read_bounds() {
        let f = temp_file(b"0123456789");
        for use_mmap in [true, false] {
            let mut s = ProductStreams::open(f.path(), OpenMode::ReadOnly, use_mmap).unwrap();
            assert_eq!(s.size(), 10);
            assert_eq!(s.read_bytes(2, 3).unwrap(), b"234");
            assert!(matches!(s.read_bytes(8, 3), Err(Error::UnexpectedEof(11))));
            // rejected before any buffer is allocated
            assert!(matches!(s.read_bytes(0, usize::MAX), Err(Error::UnexpectedEof(_))));
        }
    }

    #[test]
    fn test_write_requires_mode() {
        let f = temp_file(b"0123456789");
        let mut ro = ProductStreams::open(f.path(), OpenMode::ReadOnly, false).unwrap();
        assert!(matches!(ro.write_at(0, b"x"), Err(Error::ReadOnly)));

        let mut rw = ProductStreams::open(f.path(), OpenMode::ReadWrite, true).unwrap();
        assert!(!rw.is_mapped());
        rw.write_at(4, b"ab").unwrap();
        rw.flush().unwrap();
        assert_eq!(rw.read_bytes(3, 4).unwrap(), b"3ab6");
        assert!(rw.write_at(9, b"xy").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ProductStreams::open("/nonexistent/product.N1", OpenMode::ReadOnly, true);
        assert!(matches!(err, Err(Error::FileNotFound(_))));
    }
}
