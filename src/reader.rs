use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use zip::ZipArchive;

use crate::archive::ArchiveSource;
use crate::error::{Error, IoContext, Result};
use crate::section::Section;
use crate::trailer::{Trailer, TRAILER_SIZE};

/// Zip archive read out of the tail of a file
pub type TailZip<R> = ZipArchive<Section<R>>;

/// Where the archive bytes sit inside the file, trailer excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveRange {
    pub start: u64,
    pub len: u64,
}

impl ArchiveRange {
    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// Find and validate the trailer, then work out the archive range.
///
/// The file cursor is moved and is not restored.
pub fn locate<R: Read + Seek>(file: &mut R) -> Result<ArchiveRange> {
    let file_size = file.seek(SeekFrom::End(0)).op("seek to end of file")?;
    if file_size < TRAILER_SIZE as u64 {
        debug!("File of {} bytes is too short for a trailer", file_size);
        return Err(Error::InvalidMagic);
    }

    let trailer_pos = file_size - TRAILER_SIZE as u64;
    file.seek(SeekFrom::Start(trailer_pos))
        .op_with(|| format!("seek to trailer at offset {}", trailer_pos))?;

    let mut buf = [0u8; TRAILER_SIZE];
    file.read_exact(&mut buf)
        .op_with(|| format!("read trailer at offset {}", trailer_pos))?;

    let trailer = Trailer::decode(&buf)?;
    if !trailer.has_valid_magic() {
        debug!("Trailer magic mismatch: {:?}", trailer.magic);
        return Err(Error::InvalidMagic);
    }

    // Archive size must fit between the start of file and the trailer
    let len = u64::try_from(trailer.archive_size)
        .ok()
        .filter(|len| *len <= trailer_pos)
        .ok_or_else(|| {
            Error::corrupt(format!(
                "trailer claims {} archive bytes but only {} precede the trailer",
                trailer.archive_size, trailer_pos
            ))
        })?;

    let range = ArchiveRange {
        start: trailer_pos - len,
        len,
    };
    debug!(
        "Located archive: start: {}, len: {}, file size: {}",
        range.start, range.len, file_size
    );

    Ok(range)
}

/// Open the archive at the end of `file` with any [`ArchiveSource`].
pub fn open_with<R, A>(mut file: R) -> Result<A>
where
    R: Read + Seek,
    A: ArchiveSource<R>,
{
    let range = locate(&mut file)?;
    A::from_section(Section::new(file, range.start, range.len))
}

/// Open the zip archive at the end of `file`.
pub fn open<R: Read + Seek>(file: R) -> Result<TailZip<R>> {
    open_with(file)
}

pub fn open_path<P: AsRef<Path>>(path: P) -> Result<TailZip<File>> {
    let path = path.as_ref();
    let file = File::open(path).op_with(|| format!("open {}", path.display()))?;
    open(file)
}

/// Open the archive glued onto the running executable.
pub fn open_current_exe() -> Result<TailZip<File>> {
    let exe = std::env::current_exe().op("resolve current executable")?;
    open_path(exe)
}

#[cfg(test)]
mod test_locate {
    use super::*;
    use crate::trailer::TRAILER_MAGIC;
    use std::io::{self, Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn glue(host: &[u8], archive: &[u8]) -> Vec<u8> {
        let mut file = host.to_vec();
        file.extend_from_slice(archive);
        file.extend_from_slice(&Trailer::new(archive.len() as i64).encode());
        file
    }

    #[test]
    fn too_short() {
        for len in 0..TRAILER_SIZE {
            let mut file = Cursor::new(TRAILER_MAGIC.repeat(3)[..len].to_vec());
            match locate(&mut file) {
                Err(Error::InvalidMagic) => (),
                x => panic!("len {}: unexpected: {:?}", len, x),
            }
        }
    }

    // Reports a length of `claimed` bytes but only holds `data`
    struct Truncated {
        data: Cursor<Vec<u8>>,
        claimed: u64,
    }

    impl Read for Truncated {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for Truncated {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            let pos = match pos {
                SeekFrom::End(off) => self.claimed.checked_add_signed(off),
                SeekFrom::Start(pos) => Some(pos),
                SeekFrom::Current(off) => self.data.position().checked_add_signed(off),
            }
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad seek"))?;
            self.data.set_position(pos);
            Ok(pos)
        }
    }

    #[test]
    fn short_trailer_read() {
        let mut file = Truncated {
            data: Cursor::new(b"host".repeat(23)),
            claimed: 100,
        };

        match locate(&mut file) {
            Err(Error::Io { op, source }) => {
                assert_eq!(op, "read trailer at offset 88");
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
            }
            x => panic!("unexpected: {:?}", x),
        }
    }

    struct Unseekable;

    impl Read for Unseekable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "pipe"))
        }
    }

    #[test]
    fn seek_failure() {
        match locate(&mut Unseekable) {
            Err(Error::Io { op, source }) => {
                assert_eq!(op, "seek to end of file");
                assert_eq!(source.kind(), io::ErrorKind::Unsupported);
            }
            x => panic!("unexpected: {:?}", x),
        }
        assert!(matches!(open(Unseekable), Err(Error::Io { .. })));
    }

    #[test]
    fn bad_magic() {
        let mut file = glue(b"host", b"archive");
        let at = file.len() - TRAILER_SIZE;
        file[at] = b'Z';

        match locate(&mut Cursor::new(file)) {
            Err(Error::InvalidMagic) => (),
            x => panic!("unexpected: {:?}", x),
        }
    }

    #[test]
    fn no_trailer_at_all() {
        let mut file = Cursor::new(vec![0x7F; 4096]);
        assert!(matches!(locate(&mut file), Err(Error::InvalidMagic)));
    }

    #[test]
    fn range() {
        let mut file = Cursor::new(glue(b"0123456789", b"archive"));
        let range = locate(&mut file).unwrap();

        assert_eq!(range, ArchiveRange { start: 10, len: 7 });
        assert_eq!(range.end(), 17);
    }

    #[test]
    fn bare_trailer() {
        let mut file = Cursor::new(Trailer::new(0).encode().to_vec());
        assert_eq!(
            locate(&mut file).unwrap(),
            ArchiveRange { start: 0, len: 0 }
        );
    }

    #[test]
    fn whole_file_is_archive() {
        let mut file = Cursor::new(glue(b"", b"archive"));
        assert_eq!(
            locate(&mut file).unwrap(),
            ArchiveRange { start: 0, len: 7 }
        );
    }

    #[test]
    fn oversized_archive() {
        let mut file = b"abc".to_vec();
        file.extend_from_slice(&Trailer::new(4).encode());

        match locate(&mut Cursor::new(file)) {
            Err(Error::CorruptArchive { .. }) => (),
            x => panic!("unexpected: {:?}", x),
        }
    }

    #[test]
    fn negative_archive() {
        let mut file = b"abc".to_vec();
        file.extend_from_slice(&Trailer::new(-1).encode());

        match locate(&mut Cursor::new(file)) {
            Err(Error::CorruptArchive { .. }) => (),
            x => panic!("unexpected: {:?}", x),
        }
    }

    #[test]
    fn open_zip() {
        let archive = zip_bytes(&[("readme.txt", b"hello"), ("empty", b"")]);
        let mut zip = open(Cursor::new(glue(&[0xCC; 100], &archive))).unwrap();

        assert_eq!(zip.len(), 2);

        let mut out = String::new();
        zip.by_name("readme.txt")
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn open_is_idempotent() {
        let archive = zip_bytes(&[("a", b"1"), ("b", b"22")]);
        let file = glue(b"#!/bin/sh\n", &archive);

        let first: Vec<String> = open(Cursor::new(file.clone()))
            .unwrap()
            .file_names()
            .map(String::from)
            .collect();
        let mut cursor = Cursor::new(file);
        let second: Vec<String> = open(&mut cursor)
            .unwrap()
            .file_names()
            .map(String::from)
            .collect();
        let third: Vec<String> = open(&mut cursor)
            .unwrap()
            .file_names()
            .map(String::from)
            .collect();

        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn open_garbage_archive() {
        let file = glue(b"host", &[0u8; 40]);

        match open(Cursor::new(file)) {
            Err(Error::CorruptArchive { .. }) => (),
            Err(x) => panic!("unexpected: {:?}", x),
            Ok(_) => panic!("zeros parsed as zip"),
        }
    }

    #[test]
    fn open_missing_path() {
        let dir = tempfile::tempdir().unwrap();

        match open_path(dir.path().join("missing")) {
            Err(Error::Io { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            Err(x) => panic!("unexpected: {:?}", x),
            Ok(_) => panic!("opened a missing file"),
        }
    }
}
