//! Bounds, alignment and GLB container assembly

use anyhow::{Context, Result};
use gltf_json as json;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F534A;
const CHUNK_BIN: u32 = 0x004E4942;

/// Component-wise bounding box of a set of positions
pub fn compute_bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];

    for pos in positions {
        for i in 0..3 {
            min[i] = min[i].min(pos[i]);
            max[i] = max[i].max(pos[i]);
        }
    }

    (min, max)
}

/// Pad `buffer` with zeros up to a 4-byte boundary
pub fn align_buffer(buffer: &mut Vec<u8>) {
    let padding = (4 - buffer.len() % 4) % 4;
    buffer.resize(buffer.len() + padding, 0);
}

/// Wrap a document and its binary buffer into a `.glb` container.
///
/// The JSON chunk is padded with spaces, the binary chunk with zeros. The
/// binary chunk is omitted when `buffer_data` is empty.
pub fn assemble_glb(root: &json::Root, buffer_data: &[u8]) -> Result<Vec<u8>> {
    let mut json_bytes = json::serialize::to_string(root)
        .context("Failed to serialize glTF document")?
        .into_bytes();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }

    let mut bin_bytes = buffer_data.to_vec();
    align_buffer(&mut bin_bytes);

    let mut total_length = 12 + 8 + json_bytes.len();
    if !bin_bytes.is_empty() {
        total_length += 8 + bin_bytes.len();
    }
    let total_length =
        u32::try_from(total_length).context("GLB exceeds the 4 GiB container limit")?;

    let mut glb = Vec::with_capacity(total_length as usize);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_length.to_le_bytes());

    glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);

    if !bin_bytes.is_empty() {
        glb.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(&bin_bytes);
    }

    Ok(glb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_bounds_simple() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, -2.0, -3.0]];
        let (min, max) = compute_bounds(&positions);
        assert_eq!(min, [-1.0, -2.0, -3.0]);
        assert_eq!(max, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_align_buffer() {
        let mut buffer = vec![1, 2, 3];
        align_buffer(&mut buffer);
        assert_eq!(buffer, vec![1, 2, 3, 0]);

        let mut aligned = vec![1, 2, 3, 4];
        align_buffer(&mut aligned);
        assert_eq!(aligned.len(), 4);
    }

    #[test]
    fn test_assemble_glb_header() {
        let root = crate::GltfBuilder::new().build(&[], &[], "test");
        let glb = assemble_glb(&root, &[1, 2, 3, 4, 5]).unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(glb[4..8].try_into().unwrap()), 2);
        assert_eq!(
            u32::from_le_bytes(glb[8..12].try_into().unwrap()) as usize,
            glb.len()
        );
        assert_eq!(glb.len() % 4, 0);
        // JSON chunk type
        assert_eq!(&glb[16..20], b"JSON");
    }

    #[test]
    fn test_assembled_glb_parses() {
        let mut buffer = crate::BufferBuilder::new();
        let mesh = crate::MeshBuilder::new()
            .positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]])
            .indices(&[0, 1, 2])
            .build(&mut buffer);
        let root = crate::GltfBuilder::new()
            .buffer_byte_length(buffer.data().len() as u64)
            .add_mesh_from_accessors(Some("Triangle"), &mesh)
            .add_node(crate::NodeDesc {
                mesh: Some(0),
                ..Default::default()
            })
            .add_scene("Scene", &[0])
            .build(buffer.views(), buffer.accessors(), "test");

        let glb = assemble_glb(&root, buffer.data()).unwrap();
        let gltf = gltf::Gltf::from_slice(&glb).unwrap();
        assert_eq!(gltf.meshes().count(), 1);
        assert_eq!(gltf.blob.as_ref().map(Vec::len), Some(buffer.data().len()));
    }
}
