//! Skeletal animation container (.bha)
//!
//! # Grammar
//! ```text
//! id 0 root          (1 child)
//! └─ id 8 track      (1 + child tracks)
//!    ├─ id 7 keys    i32 count, count × key
//!    └─ id 8 ...     child tracks, recursively
//!
//! key (36 bytes): time f32, rotation xyzw, translation xyz, rotation.x
//! ```
//!
//! The track tree is isomorphic to the bone tree of the matching `.bh3`; the
//! two are associated purely by pre-order position.

use glam::{Quat, Vec3};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use super::chunk::{record_child_count, ChunkReader, ChunkWriter, DATA_CHUNK, ROOT_CHUNK, TRACK_CHUNK};
use crate::error::{Error, FormatErrorKind, Result};
use crate::tree::TreeNode;

/// Encoded size of one key
pub const KEY_SIZE: usize = 36;

/// One keyframe of a bone track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneKey {
    /// Seconds since the previous key (or since the start, for the first key)
    pub time: f32,
    /// Inverse of the logical bone-local rotation
    pub rotation: Quat,
    pub translation: Vec3,
}

impl BoneKey {
    /// A key holding the rest pose for `time` seconds.
    pub fn rest(time: f32) -> Self {
        Self {
            time,
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }
}

/// Keyframes of one bone plus the tracks of its children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub keys: Vec<BoneKey>,
    pub children: Vec<BoneTrack>,
}

impl BoneTrack {
    /// Length of this track: the sum of its key deltas.
    pub fn duration(&self) -> f32 {
        self.keys.iter().fold(0.0, |sum, k| sum + k.time)
    }
}

impl TreeNode for BoneTrack {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// A decoded `.bha` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BhaFile {
    pub root_track: BoneTrack,
}

impl BhaFile {
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ChunkReader::new(reader);

        let root = reader.read_header(Some(ROOT_CHUNK))?;
        reader.expect_children(&root, 1)?;
        let root_track = read_track(&mut reader)?;
        reader.finish(root)?;

        Ok(Self { root_track })
    }

    /// Decode a complete buffer; bytes after the root chunk are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let file = Self::read(&mut cursor)?;
        let trailing = bytes.len() as u64 - cursor.position();
        if trailing != 0 {
            return Err(Error::Format {
                offset: cursor.position(),
                kind: FormatErrorKind::TrailingBytes(trailing),
            });
        }
        Ok(file)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn write<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut writer = ChunkWriter::new(writer);

        let root = writer.begin(ROOT_CHUNK, 1)?;
        write_track(&mut writer, &self.root_track)?;
        writer.end(root)?;

        writer.into_inner().flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write(&mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Longest key-time sum over all tracks.
    pub fn duration(&self) -> f32 {
        self.root_track
            .pre_order()
            .map(BoneTrack::duration)
            .fold(0.0, f32::max)
    }

    pub fn track_count(&self) -> usize {
        self.root_track.node_count()
    }
}

fn read_track<R: Read>(reader: &mut ChunkReader<R>) -> Result<BoneTrack> {
    let record = reader.read_header(Some(TRACK_CHUNK))?;
    reader.expect_min_children(&record, 1)?;

    let data = reader.read_header(Some(DATA_CHUNK))?;
    reader.expect_children(&data, 0)?;
    let count = reader.read_count()?;
    let mut keys = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        let time = reader.read_f32()?;
        let rotation = reader.read_quat()?;
        let translation = reader.read_vec3()?;
        reader.read_redundant_x(rotation)?;
        keys.push(BoneKey {
            time,
            rotation,
            translation,
        });
    }
    reader.finish(data)?;

    let children = (1..record.header.child_count)
        .map(|_| read_track(reader))
        .collect::<Result<Vec<_>>>()?;
    reader.finish(record)?;

    Ok(BoneTrack { keys, children })
}

fn write_track<W: Write + Seek>(writer: &mut ChunkWriter<W>, track: &BoneTrack) -> Result<()> {
    let child_count = record_child_count(track.children.len(), "bone track")?;
    let record = writer.begin(TRACK_CHUNK, child_count)?;

    let data = writer.begin(DATA_CHUNK, 0)?;
    writer.write_count(track.keys.len(), "bone track keys")?;
    for key in &track.keys {
        writer.write_f32(key.time)?;
        writer.write_quat(key.rotation)?;
        writer.write_vec3(key.translation)?;
        writer.write_f32(key.rotation.x)?;
    }
    writer.end(data)?;

    for child in &track.children {
        write_track(writer, child)?;
    }

    writer.end(record)
}
