//! Mesh + skeleton container (.bh3)
//!
//! # Grammar
//! ```text
//! id 0 root          (2 children)
//! ├─ id 1 mesh       (4 children)
//! │  ├─ id 2 positions   i32 count, count × float4
//! │  ├─ id 3 normals     i32 count, count × float3, then count × u32 padding
//! │  ├─ id 4 texcoords   i32 count, count × float2
//! │  └─ id 5 indices     i32 count, count × u16
//! └─ id 6 bone       (1 + child bones)
//!    ├─ id 7 data    start i32, count i32, name, rotation xyzw, translation xyz, rotation.x
//!    └─ id 6 ...     child bones, recursively
//! ```
//!
//! Vertices are stored pre-skinned: each bone owns the contiguous range
//! `[start, start + count)` of the vertex arrays, already in bind-pose space.

use glam::{Quat, Vec2, Vec3, Vec4};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::ops::Range;
use std::path::Path;

use super::chunk::{
    record_child_count, ChunkReader, ChunkWriter, BONE_CHUNK, DATA_CHUNK, INDICES_CHUNK,
    MESH_CHUNK, NORMALS_CHUNK, POSITIONS_CHUNK, ROOT_CHUNK, TEX_COORDS_CHUNK,
};
use crate::error::{Error, FormatErrorKind, Result};
use crate::tree::TreeNode;

/// Name given to the bone of an empty file
pub const DEFAULT_ROOT_BONE: &str = "root";

/// Parallel vertex arrays plus the triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<Vec4>,
    pub normals: Vec<Vec3>,
    /// One word per normal, stored after the normal array.
    ///
    /// Always zero in files written by the game tools; kept so that a decode
    /// followed by an encode is bit-identical. When its length does not match
    /// `normals`, zeros are written instead.
    pub normal_padding: Vec<u32>,
    pub tex_coords: Vec<Vec2>,
    /// Triangle list, three indices per face
    pub indices: Vec<u16>,
}

impl MeshGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A node of the skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Stored inverted relative to the logical bone-local rotation
    pub rotation: Quat,
    pub translation: Vec3,
    pub vertex_start: i32,
    pub vertex_count: i32,
    pub children: Vec<Bone>,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
            vertex_start: 0,
            vertex_count: 0,
            children: Vec::new(),
        }
    }

    /// The owned vertex range, or `None` if it is empty or negative.
    pub fn vertex_range(&self) -> Option<Range<usize>> {
        let start = usize::try_from(self.vertex_start).ok()?;
        let count = usize::try_from(self.vertex_count).ok()?;
        (count > 0).then(|| start..start + count)
    }
}

impl TreeNode for Bone {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// A decoded `.bh3` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Bh3File {
    pub geometry: MeshGeometry,
    pub root_bone: Bone,
}

impl Default for Bh3File {
    fn default() -> Self {
        Self {
            geometry: MeshGeometry::default(),
            root_bone: Bone::new(DEFAULT_ROOT_BONE),
        }
    }
}

impl Bh3File {
    /// Decode from a stream positioned at the root chunk.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ChunkReader::new(reader);

        let root = reader.read_header(Some(ROOT_CHUNK))?;
        reader.expect_children(&root, 2)?;
        let geometry = read_mesh(&mut reader)?;
        let root_bone = read_bone(&mut reader)?;
        reader.finish(root)?;

        Ok(Self {
            geometry,
            root_bone,
        })
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

    /// Encode, backpatching every chunk size.
    pub fn write<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut writer = ChunkWriter::new(writer);

        let root = writer.begin(ROOT_CHUNK, 2)?;
        write_mesh(&mut writer, &self.geometry)?;
        write_bone(&mut writer, &self.root_bone)?;
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

    pub fn bone_count(&self) -> usize {
        self.root_bone.node_count()
    }
}

fn read_mesh<R: Read>(reader: &mut ChunkReader<R>) -> Result<MeshGeometry> {
    let mesh = reader.read_header(Some(MESH_CHUNK))?;
    reader.expect_children(&mesh, 4)?;

    let positions = read_array(reader, POSITIONS_CHUNK, |r| r.read_vec4())?;

    let normals_chunk = reader.read_header(Some(NORMALS_CHUNK))?;
    reader.expect_children(&normals_chunk, 0)?;
    let count = reader.read_count()?;
    let normals = (0..count)
        .map(|_| reader.read_vec3())
        .collect::<Result<Vec<_>>>()?;
    let normal_padding = (0..count)
        .map(|_| reader.read_u32())
        .collect::<Result<Vec<_>>>()?;
    reader.finish(normals_chunk)?;

    let tex_coords = read_array(reader, TEX_COORDS_CHUNK, |r| r.read_vec2())?;
    let indices = read_array(reader, INDICES_CHUNK, |r| r.read_u16())?;

    reader.finish(mesh)?;

    Ok(MeshGeometry {
        positions,
        normals,
        normal_padding,
        tex_coords,
        indices,
    })
}

/// A leaf chunk holding an `i32` count followed by that many elements.
fn read_array<R, T, F>(reader: &mut ChunkReader<R>, id: u16, mut read_element: F) -> Result<Vec<T>>
where
    R: Read,
    F: FnMut(&mut ChunkReader<R>) -> Result<T>,
{
    let chunk = reader.read_header(Some(id))?;
    reader.expect_children(&chunk, 0)?;
    let count = reader.read_count()?;
    let mut elements = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        elements.push(read_element(reader)?);
    }
    reader.finish(chunk)?;
    Ok(elements)
}

fn read_bone<R: Read>(reader: &mut ChunkReader<R>) -> Result<Bone> {
    let record = reader.read_header(Some(BONE_CHUNK))?;
    reader.expect_min_children(&record, 1)?;

    let data = reader.read_header(Some(DATA_CHUNK))?;
    reader.expect_children(&data, 0)?;
    let vertex_start = reader.read_i32()?;
    let vertex_count = reader.read_i32()?;
    let name = reader.read_cstring()?;
    let rotation = reader.read_quat()?;
    let translation = reader.read_vec3()?;
    reader.read_redundant_x(rotation)?;
    reader.finish(data)?;

    let children = (1..record.header.child_count)
        .map(|_| read_bone(reader))
        .collect::<Result<Vec<_>>>()?;
    reader.finish(record)?;

    Ok(Bone {
        name,
        rotation,
        translation,
        vertex_start,
        vertex_count,
        children,
    })
}

fn write_mesh<W: Write + Seek>(writer: &mut ChunkWriter<W>, geometry: &MeshGeometry) -> Result<()> {
    let mesh = writer.begin(MESH_CHUNK, 4)?;

    let chunk = writer.begin(POSITIONS_CHUNK, 0)?;
    writer.write_count(geometry.positions.len(), "positions")?;
    for &p in &geometry.positions {
        writer.write_vec4(p)?;
    }
    writer.end(chunk)?;

    let chunk = writer.begin(NORMALS_CHUNK, 0)?;
    writer.write_count(geometry.normals.len(), "normals")?;
    for &n in &geometry.normals {
        writer.write_vec3(n)?;
    }
    if geometry.normal_padding.len() == geometry.normals.len() {
        for &word in &geometry.normal_padding {
            writer.write_u32(word)?;
        }
    } else {
        for _ in 0..geometry.normals.len() {
            writer.write_u32(0)?;
        }
    }
    writer.end(chunk)?;

    let chunk = writer.begin(TEX_COORDS_CHUNK, 0)?;
    writer.write_count(geometry.tex_coords.len(), "texture coordinates")?;
    for &uv in &geometry.tex_coords {
        writer.write_vec2(uv)?;
    }
    writer.end(chunk)?;

    let chunk = writer.begin(INDICES_CHUNK, 0)?;
    writer.write_count(geometry.indices.len(), "indices")?;
    for &i in &geometry.indices {
        writer.write_u16(i)?;
    }
    writer.end(chunk)?;

    writer.end(mesh)
}

fn write_bone<W: Write + Seek>(writer: &mut ChunkWriter<W>, bone: &Bone) -> Result<()> {
    let child_count = record_child_count(bone.children.len(), &format!("bone {:?}", bone.name))?;
    let record = writer.begin(BONE_CHUNK, child_count)?;

    let data = writer.begin(DATA_CHUNK, 0)?;
    writer.write_i32(bone.vertex_start)?;
    writer.write_i32(bone.vertex_count)?;
    writer.write_cstring(&bone.name)?;
    writer.write_quat(bone.rotation)?;
    writer.write_vec3(bone.translation)?;
    writer.write_f32(bone.rotation.x)?;
    writer.end(data)?;

    for child in &bone.children {
        write_bone(writer, child)?;
    }

    writer.end(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> Bh3File {
        let mut pelvis = Bone::new("Bip01 Pelvis");
        pelvis.rotation = Quat::from_xyzw(0.5, -0.5, 0.5, 0.5);
        pelvis.translation = Vec3::new(0.0, 0.1, 0.9);
        pelvis.vertex_start = 0;
        pelvis.vertex_count = 3;

        let mut head = Bone::new("Bip01 Head");
        head.rotation = Quat::from_xyzw(0.0, 0.0, 0.70710677, 0.70710677);
        head.translation = Vec3::new(0.2, 0.0, 0.0);
        head.vertex_start = 3;
        head.vertex_count = 1;
        pelvis.children.push(head);

        let mut root = Bone::new("Bip01");
        root.children.push(pelvis);

        Bh3File {
            geometry: MeshGeometry {
                positions: vec![
                    Vec4::new(0.0, 0.0, 0.0, 1.0),
                    Vec4::new(1.0, 0.0, 0.0, 1.0),
                    Vec4::new(0.0, 1.0, 0.0, 1.0),
                    Vec4::new(0.0, 0.0, 1.0, 1.0),
                ],
                normals: vec![Vec3::Z, Vec3::Z, Vec3::Z, Vec3::X],
                normal_padding: vec![0; 4],
                tex_coords: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(0.0, 1.0),
                    Vec2::new(0.5, 0.5),
                ],
                indices: vec![0, 1, 2, 0, 2, 3],
            },
            root_bone: root,
        }
    }

    #[test]
    fn test_bh3_bytes_roundtrip() {
        let file = sample_file();
        let bytes = file.to_bytes().unwrap();

        let parsed = Bh3File::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, file);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_bh3_chunk_sizes() {
        let bytes = sample_file().to_bytes().unwrap();
        let root_size = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(root_size as usize, bytes.len() - 4);

        // mesh: 4 + positions(8+4+64) + normals(8+4+48+16) + uvs(8+4+32) + indices(8+4+12)
        let mesh_size = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(mesh_size, 4 + 76 + 76 + 44 + 24);
    }

    #[test]
    fn test_empty_file_roundtrip() {
        let file = Bh3File::default();
        let bytes = file.to_bytes().unwrap();
        let parsed = Bh3File::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.root_bone.name, DEFAULT_ROOT_BONE);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_nonzero_normal_padding_is_preserved() {
        let mut file = sample_file();
        file.geometry.normal_padding = vec![1, 2, 3, 4];
        let bytes = file.to_bytes().unwrap();
        let parsed = Bh3File::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.geometry.normal_padding, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_redundant_rotation_mismatch_is_rejected() {
        let file = sample_file();
        let mut bytes = file.to_bytes().unwrap();

        // Last 4 bytes of the file are the trailing rotation.x of the last bone
        let len = bytes.len();
        bytes[len - 4..].copy_from_slice(&42.0f32.to_le_bytes());

        let err = Bh3File::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                kind: FormatErrorKind::RedundantRotation { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_root_child_count_is_rejected() {
        let mut bytes = sample_file().to_bytes().unwrap();
        bytes[6..8].copy_from_slice(&3u16.to_le_bytes());

        let err = Bh3File::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                kind: FormatErrorKind::ChildCount { id: 0, found: 3, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unexpected_chunk_id_is_rejected() {
        let mut bytes = sample_file().to_bytes().unwrap();
        // mesh container id
        bytes[12..14].copy_from_slice(&9u16.to_le_bytes());

        let err = Bh3File::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                offset: 8,
                kind: FormatErrorKind::UnexpectedChunk {
                    expected: 1,
                    found: 9
                }
            }
        ));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = sample_file().to_bytes().unwrap();
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(
            Bh3File::from_bytes(&bytes),
            Err(Error::Format {
                kind: FormatErrorKind::TrailingBytes(2),
                ..
            })
        ));
    }

    #[test]
    fn test_vertex_range() {
        let mut bone = Bone::new("b");
        assert_eq!(bone.vertex_range(), None);
        bone.vertex_start = 4;
        bone.vertex_count = 2;
        assert_eq!(bone.vertex_range(), Some(4..6));
        bone.vertex_start = -1;
        assert_eq!(bone.vertex_range(), None);
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bh3");

        let file = sample_file();
        file.save(&path).unwrap();
        assert_eq!(Bh3File::open(&path).unwrap(), file);
    }
}
