//! GLB generation utilities for the BH3 toolchain
//!
//! Builder-pattern APIs for constructing GLB files:
//! - BufferBuilder: pack binary data with automatic alignment
//! - MeshBuilder: skinned, textured triangle primitives
//! - SkeletonBuilder: skin joints and inverse bind matrices
//! - AnimationBuilder: per-channel keyframe samplers
//! - GltfBuilder: top-level document (nodes, materials, textures, ...)
//!
//! # Example
//!
//! ```no_run
//! use glb_builder::*;
//!
//! let mut buffer = BufferBuilder::new();
//! let mesh = MeshBuilder::new()
//!     .positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]])
//!     .normals(&[[0.0, 0.0, 1.0]; 3])
//!     .indices(&[0, 1, 2])
//!     .build(&mut buffer);
//!
//! let gltf = GltfBuilder::new()
//!     .buffer_byte_length(buffer.data().len() as u64)
//!     .add_mesh_from_accessors(Some("Triangle"), &mesh)
//!     .add_node(NodeDesc { mesh: Some(0), ..Default::default() })
//!     .add_scene("Scene", &[0]);
//!
//! let root = gltf.build(buffer.views(), buffer.accessors(), "glb-builder");
//! let glb_bytes = assemble_glb(&root, buffer.data()).unwrap();
//! ```

pub mod animation;
pub mod buffer;
pub mod document;
pub mod mesh;
pub mod skeleton;
pub mod utils;

pub use animation::{AnimationAccessors, AnimationBuilder, ChannelAccessors, ChannelValues};
pub use buffer::{AccessorIndex, BufferBuilder, ViewIndex};
pub use document::{GltfBuilder, MaterialDesc, NodeDesc};
pub use mesh::{MeshAccessors, MeshBuilder};
pub use skeleton::{SkeletonAccessors, SkeletonBuilder};
pub use utils::{align_buffer, assemble_glb, compute_bounds};

// Re-export commonly used gltf-json types
pub use gltf_json as json;
pub use gltf_json::validation::Checked::Valid;
