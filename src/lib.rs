//! Archive appended to the end of a file
//!
//! Glues a zip archive onto the tail of any file, usually an executable, so
//! that a single artifact is still a valid host (the program still runs) and
//! also carries a payload that can be found again from the end of the file.
//!
//! # Layout
//!
//! | Bytes          | Content |
//! | -------------- | ------- |
//! | `H`            | Host file, untouched |
//! | `archive_size` | The archive, opaque to this crate |
//! | 12             | [`trailer::Trailer`]: `AA01` magic + `archive_size` as i64 LE |
//!
//! Since the host can be anything, a file that already carries an archive can
//! serve as the host of another one, the reader always finds the last.
//!
//! # Writing
//!
//! ```no_run
//! use std::io::Write;
//!
//! let mut writer = afterarch::AppendWriter::after_current_exe("bundled")?;
//! writer.create("readme.txt")?.write_all(b"hello")?;
//! writer.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Reading
//!
//! ```no_run
//! use std::io::Read;
//!
//! let mut zip = afterarch::open_current_exe()?;
//! let mut readme = String::new();
//! zip.by_name("readme.txt")?.read_to_string(&mut readme)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod archive;
pub mod error;
pub mod reader;
pub mod section;
pub mod trailer;
pub mod writer;

pub use crate::archive::{ArchiveSink, ArchiveSource, ZipSink};
pub use crate::error::{Error, Result};
pub use crate::reader::{locate, open, open_current_exe, open_path, open_with, ArchiveRange, TailZip};
pub use crate::section::Section;
pub use crate::trailer::{Trailer, TRAILER_MAGIC, TRAILER_SIZE};
pub use crate::writer::{AppendWriter, EntryWriter, Ownership};
