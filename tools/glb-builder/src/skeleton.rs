//! Skin construction

use crate::buffer::{AccessorIndex, BufferBuilder};

/// A packed skin, ready to be added to a document
#[derive(Debug, Clone)]
pub struct SkeletonAccessors {
    pub joints: Vec<u32>,
    pub inverse_bind_matrices: AccessorIndex,
    pub skeleton_root: Option<u32>,
}

/// Builder for a skin: joint nodes and their inverse bind matrices
#[derive(Default)]
pub struct SkeletonBuilder {
    joints: Vec<u32>,
    inverse_bind_matrices: Vec<[f32; 16]>,
    skeleton_root: Option<u32>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a joint node with its column-major inverse bind matrix
    pub fn add_joint(mut self, node: u32, inverse_bind_matrix: [f32; 16]) -> Self {
        self.joints.push(node);
        self.inverse_bind_matrices.push(inverse_bind_matrix);
        self
    }

    /// Node that is the common root of the joint hierarchy
    pub fn skeleton_root(mut self, node: u32) -> Self {
        self.skeleton_root = Some(node);
        self
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn build(self, buffer: &mut BufferBuilder) -> SkeletonAccessors {
        let inverse_bind_matrices = buffer.pack_mat4(&self.inverse_bind_matrices);
        SkeletonAccessors {
            joints: self.joints,
            inverse_bind_matrices,
            skeleton_root: self.skeleton_root,
        }
    }
}
