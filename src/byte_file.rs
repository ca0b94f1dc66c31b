//! Positioned byte I/O on a single OS file handle.
//!
//! This is the only place the crate touches `std::fs::File`. A failed open
//! leaves the handle closed, and every operation on a closed handle fails
//! with `NotConnected` instead of panicking.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Direction a file is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

#[derive(Debug)]
pub struct ByteFile {
    file: Option<File>,
    mode: OpenMode,
    eof: bool,
}

impl ByteFile {
    /// Create a handle in the closed state.
    pub fn new() -> Self {
        Self { file: None, mode: OpenMode::Read, eof: false }
    }

    /// Open `path`. Write mode creates or truncates the file.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: OpenMode) -> io::Result<()> {
        self.close()?;
        let result = match mode {
            OpenMode::Read => File::open(path.as_ref()),
            OpenMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_ref()),
        };
        let file = result?;
        self.file = Some(file);
        self.mode = mode;
        self.eof = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// True once a read came up short of the requested length.
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Only stops short at end of file, which also sets the EOF flag.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file.as_mut().ok_or_else(not_open)?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Read exactly `buf.len()` bytes or fail with `UnexpectedEof`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let n = self.read(buf)?;
        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", buf.len(), n),
            ));
        }
        Ok(())
    }

    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self.file.as_mut().ok_or_else(not_open)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let file = self.file.as_mut().ok_or_else(not_open)?;
        self.eof = false;
        file.seek(pos)
    }

    pub fn tell(&mut self) -> io::Result<u64> {
        let file = self.file.as_mut().ok_or_else(not_open)?;
        file.stream_position()
    }

    /// Total length of the file on disk.
    pub fn len(&self) -> io::Result<u64> {
        let file = self.file.as_ref().ok_or_else(not_open)?;
        Ok(file.metadata()?.len())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(not_open)?;
        file.flush()
    }

    /// Flush pending writes and release the handle. Closing twice is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            if self.mode == OpenMode::Write {
                file.flush()?;
                file.sync_all()?;
            }
        }
        self.eof = false;
        Ok(())
    }
}

impl Default for ByteFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for ByteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ByteFile::read(self, buf)
    }
}

impl Write for ByteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ByteFile::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        ByteFile::flush(self)
    }
}

fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "file is not open")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_closed_handle_rejects_io() {
        let mut file = ByteFile::new();
        assert!(!file.is_open());
        let mut buf = [0u8; 4];
        let err = file.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(file.write(b"data").is_err());
    }

    #[test]
    fn test_failed_open_stays_closed() {
        let mut file = ByteFile::new();
        assert!(file.open("/nonexistent/dir/file.blf", OpenMode::Read).is_err());
        assert!(!file.is_open());
    }

    #[test]
    fn test_write_seek_read() {
        let temp = NamedTempFile::new().unwrap();
        let mut file = ByteFile::new();
        file.open(temp.path(), OpenMode::Write).unwrap();
        assert_eq!(file.write(b"hello world").unwrap(), 11);
        assert_eq!(file.tell().unwrap(), 11);
        file.close().unwrap();

        file.open(temp.path(), OpenMode::Read).unwrap();
        assert_eq!(file.len().unwrap(), 11);
        file.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"world");
        assert!(file.at_eof());

        file.seek(SeekFrom::Start(0)).unwrap();
        assert!(!file.at_eof());
        let mut exact = [0u8; 20];
        assert!(file.read_exact(&mut exact).is_err());
    }

    #[test]
    fn test_std_io_traits_delegate() {
        use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

        let temp = NamedTempFile::new().unwrap();
        let mut file = ByteFile::new();
        file.open(temp.path(), OpenMode::Write).unwrap();
        file.write_u32::<LittleEndian>(0x4A42_4F4C).unwrap();
        file.close().unwrap();

        file.open(temp.path(), OpenMode::Read).unwrap();
        assert_eq!(file.read_u32::<LittleEndian>().unwrap(), 0x4A42_4F4C);
        assert!(file.read_u8().is_err());
    }
}
