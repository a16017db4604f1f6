//! Nested length-prefixed chunk grammar shared by `.bh3` and `.bha`.
//!
//! # Layout
//! ```text
//! 0x00: size u32         (bytes after this field, header remainder + body + descendants)
//! 0x04: id u16
//! 0x06: child_count u16
//! 0x08: body             (typed leaf payload, or exactly child_count nested chunks)
//! ```
//!
//! Children are never discovered by scanning: each file kind drives a
//! recursive descent that knows which ids come next. Strings are not chunks,
//! they are a `u32` byte length (terminator included), the ASCII bytes and a
//! trailing NUL.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec2, Vec3, Vec4};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, FormatErrorKind, Result};

/// Root container of both file kinds
pub const ROOT_CHUNK: u16 = 0;
/// `.bh3` mesh container (positions, normals, texcoords, indices)
pub const MESH_CHUNK: u16 = 1;
pub const POSITIONS_CHUNK: u16 = 2;
pub const NORMALS_CHUNK: u16 = 3;
pub const TEX_COORDS_CHUNK: u16 = 4;
pub const INDICES_CHUNK: u16 = 5;
/// `.bh3` bone record (data chunk followed by child bones)
pub const BONE_CHUNK: u16 = 6;
/// Leaf payload of a bone record (`.bh3`) or bone track (`.bha`)
pub const DATA_CHUNK: u16 = 7;
/// `.bha` bone track record (key list followed by child tracks)
pub const TRACK_CHUNK: u16 = 8;

/// A decoded chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub size: u32,
    pub id: u16,
    pub child_count: u16,
}

/// A chunk whose header has been consumed but whose body is still being read.
#[derive(Debug, Clone, Copy)]
pub struct OpenChunk {
    pub header: ChunkHeader,
    /// Stream offset of the byte right after the size field
    body_start: u64,
}

/// Reader for the chunk grammar that tracks its own stream offset.
///
/// The offset is used both for error reporting and for checking that every
/// chunk consumed exactly the number of bytes its size field declares.
pub struct ChunkReader<R: Read> {
    reader: R,
    position: u64,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
        }
    }

    /// Number of bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Build a format error located at the current offset
    pub fn format_error(&self, kind: FormatErrorKind) -> Error {
        Error::Format {
            offset: self.position,
            kind,
        }
    }

    /// Read a chunk header, failing if `expected` is given and does not match.
    pub fn read_header(&mut self, expected: Option<u16>) -> Result<OpenChunk> {
        let header_offset = self.position;
        let size = self.read_u32()?;
        let body_start = self.position;
        let id = self.read_u16()?;
        let child_count = self.read_u16()?;

        if let Some(expected) = expected {
            if id != expected {
                return Err(Error::Format {
                    offset: header_offset,
                    kind: FormatErrorKind::UnexpectedChunk {
                        expected,
                        found: id,
                    },
                });
            }
        }

        Ok(OpenChunk {
            header: ChunkHeader {
                size,
                id,
                child_count,
            },
            body_start,
        })
    }

    /// Require an exact child count for a grammar-fixed node.
    pub fn expect_children(&self, chunk: &OpenChunk, expected: u16) -> Result<()> {
        if chunk.header.child_count != expected {
            return Err(self.format_error(FormatErrorKind::ChildCount {
                id: chunk.header.id,
                expected: expected.to_string(),
                found: chunk.header.child_count,
            }));
        }
        Ok(())
    }

    /// Require at least `minimum` children (bone and track records).
    pub fn expect_min_children(&self, chunk: &OpenChunk, minimum: u16) -> Result<()> {
        if chunk.header.child_count < minimum {
            return Err(self.format_error(FormatErrorKind::ChildCount {
                id: chunk.header.id,
                expected: format!(">= {}", minimum),
                found: chunk.header.child_count,
            }));
        }
        Ok(())
    }

    /// Close a chunk, checking the declared size against the bytes consumed.
    pub fn finish(&self, chunk: OpenChunk) -> Result<()> {
        let actual = self.position - chunk.body_start;
        if actual != u64::from(chunk.header.size) {
            return Err(self.format_error(FormatErrorKind::SizeMismatch {
                id: chunk.header.id,
                declared: chunk.header.size,
                actual,
            }));
        }
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.reader.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let value = self.reader.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let value = self.reader.read_f32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Element count prefix of an array payload (`i32`, must not be negative)
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| self.format_error(FormatErrorKind::NegativeCount(count)))
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Quaternion stored as `x, y, z, w`, taken verbatim (no normalization)
    pub fn read_quat(&mut self) -> Result<Quat> {
        Ok(Quat::from_xyzw(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Read the trailing copy of `rotation.x` and verify it bit for bit.
    pub fn read_redundant_x(&mut self, rotation: Quat) -> Result<()> {
        let found = self.read_f32()?;
        if found.to_bits() != rotation.x.to_bits() {
            return Err(self.format_error(FormatErrorKind::RedundantRotation {
                expected: rotation.x,
                found,
            }));
        }
        Ok(())
    }

    /// Length-prefixed, NUL-terminated ASCII string.
    pub fn read_cstring(&mut self) -> Result<String> {
        let length = self.read_u32()? as usize;
        if length == 0 {
            return Err(self.format_error(FormatErrorKind::MalformedString("zero length")));
        }

        // Grow with the bytes actually present rather than the declared length
        let mut bytes = Vec::new();
        (&mut self.reader).take(length as u64).read_to_end(&mut bytes)?;
        self.position += bytes.len() as u64;
        if bytes.len() < length {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        if bytes.pop() != Some(0) {
            return Err(self.format_error(FormatErrorKind::MalformedString(
                "missing NUL terminator",
            )));
        }
        if !bytes.is_ascii() {
            return Err(self.format_error(FormatErrorKind::MalformedString("non-ASCII bytes")));
        }

        String::from_utf8(bytes)
            .map_err(|_| self.format_error(FormatErrorKind::MalformedString("invalid text")))
    }
}

/// Marker returned by [`ChunkWriter::begin`], consumed by [`ChunkWriter::end`].
#[derive(Debug)]
#[must_use = "an open chunk must be closed to backpatch its size"]
pub struct ChunkMark {
    /// Stream offset of the size placeholder
    offset: u64,
}

/// Writer for the chunk grammar.
///
/// Each chunk is written with a zero size placeholder that is backpatched
/// once the chunk (and all of its descendants) is complete.
pub struct ChunkWriter<W: Write + Seek> {
    writer: W,
}

impl<W: Write + Seek> ChunkWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Emit a header with a placeholder size.
    pub fn begin(&mut self, id: u16, child_count: u16) -> Result<ChunkMark> {
        let offset = self.writer.stream_position()?;
        self.writer.write_u32::<LittleEndian>(0)?;
        self.writer.write_u16::<LittleEndian>(id)?;
        self.writer.write_u16::<LittleEndian>(child_count)?;
        Ok(ChunkMark { offset })
    }

    /// Backpatch the size of a chunk opened with [`begin`](Self::begin).
    pub fn end(&mut self, mark: ChunkMark) -> Result<()> {
        let end = self.writer.stream_position()?;
        let size = end - mark.offset - 4;
        let size = u32::try_from(size).map_err(|_| Error::Format {
            offset: mark.offset,
            kind: FormatErrorKind::ChunkTooLarge(size),
        })?;

        self.writer.seek(SeekFrom::Start(mark.offset))?;
        self.writer.write_u32::<LittleEndian>(size)?;
        self.writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.writer.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Element count prefix of an array payload
    pub fn write_count(&mut self, count: usize, entity: &str) -> Result<()> {
        let count = i32::try_from(count).map_err(|_| {
            Error::unsupported(entity, format!("{} elements exceed the i32 count field", count))
        })?;
        self.write_i32(count)
    }

    pub fn write_vec2(&mut self, v: Vec2) -> Result<()> {
        for c in v.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    pub fn write_vec3(&mut self, v: Vec3) -> Result<()> {
        for c in v.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    pub fn write_vec4(&mut self, v: Vec4) -> Result<()> {
        for c in v.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    pub fn write_quat(&mut self, q: Quat) -> Result<()> {
        for c in q.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    pub fn write_cstring(&mut self, s: &str) -> Result<()> {
        if !s.is_ascii() || s.bytes().any(|b| b == 0) {
            return Err(Error::unsupported(
                format!("string {:?}", s),
                "names must be ASCII without embedded NUL",
            ));
        }
        self.write_u32(s.len() as u32 + 1)?;
        self.writer.write_all(s.as_bytes())?;
        self.writer.write_u8(0)?;
        Ok(())
    }
}

/// Child count of a record chunk: one data chunk plus one chunk per child.
pub(crate) fn record_child_count(children: usize, entity: &str) -> Result<u16> {
    u16::try_from(children + 1).map_err(|_| {
        Error::unsupported(entity, format!("{} children exceed the u16 child count", children))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_with<F>(f: F) -> Vec<u8>
    where
        F: FnOnce(&mut ChunkWriter<Cursor<Vec<u8>>>) -> Result<()>,
    {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        f(&mut writer).unwrap();
        writer.into_inner().into_inner()
    }

    #[test]
    fn test_size_excludes_itself_and_includes_descendants() {
        let bytes = write_with(|w| {
            let outer = w.begin(3, 1)?;
            let inner = w.begin(4, 0)?;
            w.write_u32(0xDEADBEEF)?;
            w.end(inner)?;
            w.end(outer)
        });

        assert_eq!(bytes.len(), 20);
        // outer: 4 (id+count) + 8 (inner header) + 4 (payload)
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(bytes[4..6].try_into().unwrap()), 3);
        assert_eq!(u16::from_le_bytes(bytes[6..8].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 8);
    }

    #[test]
    fn test_read_header_and_finish() {
        let bytes = write_with(|w| {
            let chunk = w.begin(5, 0)?;
            w.write_i32(2)?;
            w.write_u16(7)?;
            w.write_u16(9)?;
            w.end(chunk)
        });

        let mut reader = ChunkReader::new(Cursor::new(bytes));
        let chunk = reader.read_header(Some(5)).unwrap();
        assert_eq!(chunk.header.id, 5);
        assert_eq!(chunk.header.size, 12);
        assert_eq!(reader.read_count().unwrap(), 2);
        assert_eq!(reader.read_u16().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 9);
        reader.finish(chunk).unwrap();
    }

    #[test]
    fn test_unexpected_chunk_id() {
        let bytes = write_with(|w| {
            let chunk = w.begin(2, 0)?;
            w.end(chunk)
        });

        let mut reader = ChunkReader::new(Cursor::new(bytes));
        let err = reader.read_header(Some(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                offset: 0,
                kind: FormatErrorKind::UnexpectedChunk {
                    expected: 1,
                    found: 2
                }
            }
        ));
    }

    #[test]
    fn test_declared_size_mismatch() {
        let mut bytes = write_with(|w| {
            let chunk = w.begin(2, 0)?;
            w.write_u32(1)?;
            w.end(chunk)
        });
        // Declare one byte less than the body actually holds
        bytes[0] = 7;

        let mut reader = ChunkReader::new(Cursor::new(bytes));
        let chunk = reader.read_header(None).unwrap();
        reader.read_u32().unwrap();
        let err = reader.finish(chunk).unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                kind: FormatErrorKind::SizeMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_cstring_includes_terminator_in_length() {
        let bytes = write_with(|w| w.write_cstring("Bip01"));
        assert_eq!(bytes, b"\x06\x00\x00\x00Bip01\x00");

        let mut reader = ChunkReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_cstring().unwrap(), "Bip01");
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn test_cstring_without_terminator_is_rejected() {
        let bytes = b"\x02\x00\x00\x00ab".to_vec();
        let mut reader = ChunkReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_cstring(),
            Err(Error::Format {
                kind: FormatErrorKind::MalformedString(_),
                ..
            })
        ));
    }

    #[test]
    fn test_cstring_oversized_length_is_io_error() {
        let bytes = b"\xff\xff\xff\xffab\x00".to_vec();
        let mut reader = ChunkReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read_cstring(), Err(Error::Io(_))));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let bytes = (-1i32).to_le_bytes().to_vec();
        let mut reader = ChunkReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_count(),
            Err(Error::Format {
                kind: FormatErrorKind::NegativeCount(-1),
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let mut reader = ChunkReader::new(Cursor::new(vec![1u8, 0]));
        assert!(matches!(reader.read_header(None), Err(Error::Io(_))));
    }
}
