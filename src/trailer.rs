//! Trailer record
//!
//! Every file carrying an appended archive ends with a fixed size trailer.
//! Everything is stored in Little Endian format.
//!
//! | Type    | Name         | Description |
//! | ------: | ------------ | ----------- |
//! | [u8; 4] | magic        | Always `AA01` |
//! | i64     | archive_size | Length of the archive bytes right before the trailer |
//!
//! The trailer does not record its own size, reader and writer must agree on
//! [`TRAILER_SIZE`].
use std::io::Write;
use std::mem::size_of;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Error, Result};

pub const TRAILER_MAGIC: [u8; 4] = *b"AA01";

const MAGIC_LEN: usize = size_of::<[u8; 4]>();
const ARCHIVE_SIZE_LEN: usize = size_of::<i64>();

/// Size in bytes of an encoded [`Trailer`].
pub const TRAILER_SIZE: usize = MAGIC_LEN + ARCHIVE_SIZE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub magic: [u8; 4],
    pub archive_size: i64,
}

impl Trailer {
    pub fn new(archive_size: i64) -> Self {
        Trailer {
            magic: TRAILER_MAGIC,
            archive_size,
        }
    }

    pub fn encode(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[..MAGIC_LEN].copy_from_slice(&self.magic);
        LittleEndian::write_i64(&mut buf[MAGIC_LEN..], self.archive_size);
        buf
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<usize> {
        writer.write_all(&self.magic)?;
        writer.write_i64::<LittleEndian>(self.archive_size)?;
        Ok(TRAILER_SIZE)
    }

    /// Structural decode only, the magic is not checked here. See
    /// [`Trailer::has_valid_magic`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TRAILER_SIZE {
            return Err(Error::MalformedTrailer {
                len: bytes.len(),
                need: TRAILER_SIZE,
            });
        }

        let mut magic = [0u8; MAGIC_LEN];
        magic.copy_from_slice(&bytes[..MAGIC_LEN]);

        Ok(Trailer {
            magic,
            archive_size: LittleEndian::read_i64(&bytes[MAGIC_LEN..TRAILER_SIZE]),
        })
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == TRAILER_MAGIC
    }
}
