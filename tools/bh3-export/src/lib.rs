//! bh3-export library
//!
//! Converts Rise of Nations `.bh3` models and `.bha` animations to binary
//! glTF and back. The format codecs and the scene translation live in
//! `bh3-common`; this crate adds file handling, textures, manifests and the
//! glTF document layer.

pub mod convert;
pub mod info;
pub mod manifest;
pub mod scene;
pub mod texture;

pub use convert::{convert_file, export_model, import_gltf, ImportOutputs, ModelExport, SceneImport};
pub use scene::{load_scene, scene_to_glb, write_glb, Selector};
