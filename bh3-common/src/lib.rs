//! Shared model code for the BH3/BHA toolchain.
//!
//! - [`formats`]: binary chunk codecs for `.bh3` models and `.bha` animations
//! - [`scene`]: format-neutral scene graph the glTF adapters read and write
//! - [`import`] / [`export`]: mapping between the scene graph and BH3/BHA
//! - [`sanitize`]: animation fix-ups required by the game engine

pub mod basis;
pub mod error;
pub mod export;
pub mod formats;
pub mod import;
pub mod sanitize;
pub mod scene;
pub mod tree;

pub use error::{Error, FormatErrorKind, Result};
pub use export::{export_scene, ExportOptions};
pub use formats::{Bh3File, BhaFile};
pub use import::{import_scene, ImportOptions, Imported};
