use std::cmp;
use std::io::{self, Read, Seek, SeekFrom};

/// A `Read + Seek` window over `[start, start + len)` of an underlying
/// reader. Offsets are relative to `start` and nothing outside the window
/// can be read through it.
#[derive(Debug)]
pub struct Section<R> {
    inner: R,
    start: u64,
    len: u64,
    pos: u64,
}

impl<R: Read + Seek> Section<R> {
    pub fn new(inner: R, start: u64, len: u64) -> Self {
        Section {
            inner,
            start,
            len,
            pos: 0,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Positional read, leaves the section cursor alone.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len || buf.is_empty() {
            return Ok(0);
        }

        let max = cmp::min(buf.len() as u64, self.len - offset) as usize;
        self.inner.seek(SeekFrom::Start(self.start + offset))?;
        self.inner.read(&mut buf[..max])
    }
}

impl<R: Read + Seek> Read for Section<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.read_at(self.pos, buf)?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl<R: Read + Seek> Seek for Section<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(x) => Some(x),
            SeekFrom::End(x) => self.len.checked_add_signed(x),
            SeekFrom::Current(x) => self.pos.checked_add_signed(x),
        };

        match new_pos {
            Some(x) => {
                self.pos = x;
                Ok(x)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}
