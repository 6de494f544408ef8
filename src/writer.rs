use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::archive::{ArchiveSink, ZipSink};
use crate::error::{Error, IoContext, Result};
use crate::trailer::Trailer;

/// Whether the writer closes the destination handle once finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Opened by the writer itself, closed on [`AppendWriter::close`]
    Owned,
    /// Supplied by the caller, get it back with [`AppendWriter::into_inner`]
    Borrowed,
}

/// Builds an archive in memory and, on [`AppendWriter::close`], appends it
/// plus a trailer to the end of the destination.
///
/// Nothing reaches the destination before `close`. Dropping the writer
/// without closing it discards the archive.
pub struct AppendWriter<W: Write + Seek, A: ArchiveSink = ZipSink> {
    dest: Option<W>,
    sink: Option<A>,
    ownership: Ownership,

    // Run on an owned handle before it is closed
    sync: Option<fn(&mut W) -> io::Result<()>>,
}

/// Streams the bytes of one entry into the archive buffer.
pub struct EntryWriter<'a, A: ArchiveSink> {
    sink: &'a mut A,
}

impl<A: ArchiveSink> Write for EntryWriter<'_, A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W: Write + Seek> AppendWriter<W> {
    /// Append after whatever `dest` already holds. The handle stays the
    /// caller's.
    pub fn new(dest: W) -> Self {
        AppendWriter::with_sink(dest, ZipSink::default(), Ownership::Borrowed)
    }
}

impl AppendWriter<File> {
    /// Copy `image` verbatim to `output` (created executable, truncated if it
    /// exists) and get a writer that appends after the copy.
    ///
    /// If the copy fails the partial `output` is closed and left behind, it
    /// must not be used.
    pub fn after_image<P: AsRef<Path>, Q: AsRef<Path>>(image: P, output: Q) -> Result<Self> {
        let (image, output) = (image.as_ref(), output.as_ref());

        // Truncating the output would wipe the image before it gets copied
        if same_file(image, output) {
            return Err(Error::io(
                format!("copy {} onto itself", image.display()),
                io::Error::new(io::ErrorKind::InvalidInput, "image and output are the same file"),
            ));
        }

        let mut source =
            File::open(image).op_with(|| format!("open image {}", image.display()))?;
        let mut dest = create_options()
            .open(output)
            .op_with(|| format!("create {}", output.display()))?;

        let copied = io::copy(&mut source, &mut dest)
            .op_with(|| format!("copy {} to {}", image.display(), output.display()))?;
        debug!(
            "Seeded {} with {} bytes from {}",
            output.display(),
            copied,
            image.display()
        );

        let mut writer = AppendWriter::with_sink(dest, ZipSink::default(), Ownership::Owned);
        writer.sync = Some(|f: &mut File| f.sync_all());
        Ok(writer)
    }

    /// Seed `output` with the running executable.
    pub fn after_current_exe<P: AsRef<Path>>(output: P) -> Result<Self> {
        let exe = std::env::current_exe().op("resolve current executable")?;
        AppendWriter::after_image(exe, output)
    }
}

impl<W: Write + Seek, A: ArchiveSink> AppendWriter<W, A> {
    pub fn with_sink(dest: W, sink: A, ownership: Ownership) -> Self {
        AppendWriter {
            dest: Some(dest),
            sink: Some(sink),
            ownership,
            sync: None,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    fn sink(&mut self) -> Result<&mut A> {
        self.sink.as_mut().ok_or(Error::AlreadyClosed)
    }

    pub fn create(&mut self, name: &str) -> Result<EntryWriter<'_, A>> {
        self.create_with_header(name, A::Options::default())
    }

    /// Start an entry with codec specific metadata, for zip this is the
    /// compression method, modification time, permissions and so on.
    pub fn create_with_header(
        &mut self,
        name: &str,
        options: A::Options,
    ) -> Result<EntryWriter<'_, A>> {
        let sink = self.sink()?;
        sink.start_entry(name, options)?;
        Ok(EntryWriter { sink })
    }

    /// Create an entry holding everything `reader` yields.
    pub fn append_entry<R: Read>(&mut self, name: &str, reader: &mut R) -> Result<u64> {
        self.append_entry_with_header(name, A::Options::default(), reader)
    }

    pub fn append_entry_with_header<R: Read>(
        &mut self,
        name: &str,
        options: A::Options,
        reader: &mut R,
    ) -> Result<u64> {
        let mut entry = self.create_with_header(name, options)?;
        io::copy(reader, &mut entry).op_with(|| format!("copy entry {}", name))
    }

    /// Push the codec's pending state into the archive buffer. The
    /// destination is not touched.
    pub fn flush(&mut self) -> Result<()> {
        self.sink()?.flush().op("flush archive buffer")
    }

    /// Finalize the archive, append it and the trailer to the end of the
    /// destination and close the destination if owned.
    ///
    /// Returns the size of the appended archive, trailer excluded. A failed
    /// append leaves the destination without a trailer.
    pub fn close(&mut self) -> Result<u64> {
        let sink = self.sink.take().ok_or(Error::AlreadyClosed)?;
        let buf = sink.finish()?;
        let archive_size =
            i64::try_from(buf.len()).map_err(|e| Error::ArchiveWrite(Box::new(e)))?;

        let dest = self.dest.as_mut().ok_or(Error::AlreadyClosed)?;
        let start = dest
            .seek(SeekFrom::End(0))
            .op("seek to end of destination")?;

        dest.write_all(&buf)
            .op_with(|| format!("append {} archive bytes at offset {}", buf.len(), start))?;
        Trailer::new(archive_size)
            .write_to(dest)
            .op_with(|| format!("write trailer at offset {}", start + buf.len() as u64))?;
        dest.flush().op("flush destination")?;

        info!(
            "Appended {} archive bytes + trailer at offset {}",
            archive_size, start
        );

        if self.ownership == Ownership::Owned {
            if let Some(sync) = self.sync {
                sync(dest).op("sync destination")?;
            }
            // Dropping the handle closes it
            self.dest = None;
        }

        Ok(buf.len() as u64)
    }

    /// Give back the destination handle. `None` if it was owned and has
    /// been closed.
    pub fn into_inner(mut self) -> Option<W> {
        self.dest.take()
    }
}

impl<W: Write + Seek, A: ArchiveSink> Drop for AppendWriter<W, A> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            warn!("AppendWriter dropped without close, archive discarded");
        }
    }
}

fn create_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }

    options
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
