//! Archive codec seam
//!
//! The trailer logic does not care how entries are laid out inside the
//! archive bytes. Writing goes through an [`ArchiveSink`] that builds the
//! archive into memory, reading goes through an [`ArchiveSource`] that is
//! handed a [`Section`] covering exactly the archive bytes. Zip is the
//! codec shipped here.
use std::io::{self, Cursor, Read, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::section::Section;

/// Builds an archive in memory. Bytes written through `Write` go to the
/// entry most recently started with [`ArchiveSink::start_entry`].
pub trait ArchiveSink: Write {
    /// Per entry metadata understood by the codec
    type Options: Default;

    fn start_entry(&mut self, name: &str, options: Self::Options) -> Result<()>;

    /// Write the archive directory/footer and hand back the complete archive.
    fn finish(self) -> Result<Vec<u8>>;
}

/// Parses an archive out of a bounded view of a file.
pub trait ArchiveSource<R>: Sized {
    fn from_section(section: Section<R>) -> Result<Self>;
}

pub struct ZipSink {
    inner: ZipWriter<Cursor<Vec<u8>>>,
}

impl Default for ZipSink {
    fn default() -> Self {
        ZipSink {
            inner: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }
}

impl Write for ZipSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ArchiveSink for ZipSink {
    type Options = SimpleFileOptions;

    fn start_entry(&mut self, name: &str, options: Self::Options) -> Result<()> {
        self.inner
            .start_file(name, options)
            .map_err(|e| Error::ArchiveWrite(Box::new(e)))
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.inner
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| Error::ArchiveWrite(Box::new(e)))
    }
}

impl<R: Read + Seek> ArchiveSource<R> for ZipArchive<Section<R>> {
    fn from_section(section: Section<R>) -> Result<Self> {
        ZipArchive::new(section).map_err(|e| Error::corrupt_from("unreadable zip archive", e))
    }
}
