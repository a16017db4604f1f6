//! Rise of Nations binary asset formats
//!
//! Both file kinds share one nested chunk grammar (see [`chunk`]). There is
//! no magic number or version field: the root chunk id is always 0 and the
//! file kind is known from context.

pub mod bh3;
pub mod bha;
pub mod chunk;

pub use bh3::{Bh3File, Bone, MeshGeometry};
pub use bha::{BhaFile, BoneKey, BoneTrack};
pub use chunk::{ChunkHeader, ChunkReader, ChunkWriter};
