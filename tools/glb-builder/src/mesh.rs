//! Mesh primitive construction

use crate::buffer::{AccessorIndex, BufferBuilder};

/// Accessor indices for one mesh primitive
#[derive(Debug, Clone)]
pub struct MeshAccessors {
    pub positions: AccessorIndex,
    pub normals: Option<AccessorIndex>,
    /// One per texture coordinate set, in set order
    pub uvs: Vec<AccessorIndex>,
    pub joints: Option<AccessorIndex>,
    pub weights: Option<AccessorIndex>,
    pub indices: Option<AccessorIndex>,
    pub material: Option<u32>,
}

/// Builder for a single triangle-list primitive
#[derive(Default)]
pub struct MeshBuilder {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Vec<Vec<[f32; 2]>>,
    joints: Option<Vec<[u16; 4]>>,
    weights: Option<Vec<[f32; 4]>>,
    indices: Option<Vec<u32>>,
    material: Option<u32>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positions(mut self, positions: &[[f32; 3]]) -> Self {
        self.positions = positions.to_vec();
        self
    }

    pub fn normals(mut self, normals: &[[f32; 3]]) -> Self {
        self.normals = Some(normals.to_vec());
        self
    }

    /// Append the next texture coordinate set
    pub fn uvs(mut self, uvs: &[[f32; 2]]) -> Self {
        self.uvs.push(uvs.to_vec());
        self
    }

    /// Joint indices of a skinned primitive (JOINTS_0)
    pub fn joints(mut self, joints: &[[u16; 4]]) -> Self {
        self.joints = Some(joints.to_vec());
        self
    }

    /// Joint weights of a skinned primitive (WEIGHTS_0)
    pub fn weights(mut self, weights: &[[f32; 4]]) -> Self {
        self.weights = Some(weights.to_vec());
        self
    }

    pub fn indices(mut self, indices: &[u32]) -> Self {
        self.indices = Some(indices.to_vec());
        self
    }

    pub fn material(mut self, material: u32) -> Self {
        self.material = Some(material);
        self
    }

    /// Pack every attribute into `buffer`
    pub fn build(self, buffer: &mut BufferBuilder) -> MeshAccessors {
        let positions = buffer.pack_positions(&self.positions);
        let normals = self.normals.as_ref().map(|n| buffer.pack_vec3(n));
        let uvs = self.uvs.iter().map(|uv| buffer.pack_vec2(uv)).collect();
        let joints = self.joints.as_ref().map(|j| buffer.pack_joints(j));
        let weights = self.weights.as_ref().map(|w| buffer.pack_vec4(w));
        let indices = self.indices.as_ref().map(|i| buffer.pack_indices(i));

        MeshAccessors {
            positions,
            normals,
            uvs,
            joints,
            weights,
            indices,
            material: self.material,
        }
    }
}
