use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No trailer at the end of the file, either because the file is too
    /// short to hold one or because the magic does not match.
    #[error("invalid magic number at end of file")]
    InvalidMagic,

    #[error("malformed trailer: got {len} bytes, need {need}")]
    MalformedTrailer { len: usize, need: usize },

    #[error("corrupt archive: {reason}")]
    CorruptArchive {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("archive write failed")]
    ArchiveWrite(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("i/o error during {op}")]
    Io {
        op: String,
        #[source]
        source: io::Error,
    },

    #[error("writer has already been closed")]
    AlreadyClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(op: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            op: op.into(),
            source,
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptArchive {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn corrupt_from<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::CorruptArchive {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Attach the failing operation to a bare io::Error
pub(crate) trait IoContext<T> {
    fn op(self, op: &str) -> Result<T>;
    fn op_with<F: FnOnce() -> String>(self, op: F) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn op(self, op: &str) -> Result<T> {
        self.map_err(|e| Error::io(op, e))
    }

    fn op_with<F: FnOnce() -> String>(self, op: F) -> Result<T> {
        self.map_err(|e| Error::io(op(), e))
    }
}
