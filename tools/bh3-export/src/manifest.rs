//! Manifest parsing and batch conversion
//!
//! Parses `conversions.toml` and runs every listed conversion.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::convert::{self, ModelExport, SceneImport, ANIMATION_EXT, GLB_EXT, MODEL_EXT};
use crate::scene::Selector;

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    /// Models to convert to glTF
    #[serde(default)]
    pub models: HashMap<String, ModelEntry>,
    /// glTF scenes to convert to models and animations
    #[serde(default)]
    pub scenes: HashMap<String, SceneEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("converted/")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ModelEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        animation: Option<PathBuf>,
    },
}

impl ModelEntry {
    pub fn path(&self) -> &Path {
        match self {
            ModelEntry::Simple(p) => p,
            ModelEntry::Detailed { path, .. } => path,
        }
    }

    pub fn animation(&self) -> Option<&Path> {
        match self {
            ModelEntry::Simple(_) => None,
            ModelEntry::Detailed { animation, .. } => animation.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SceneEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        scene: Option<Selector>,
        #[serde(default)]
        animation: Option<Selector>,
        #[serde(default = "default_true")]
        mesh: bool,
        #[serde(default = "default_true")]
        anim: bool,
        #[serde(default = "default_true")]
        patch: bool,
    },
}

impl SceneEntry {
    pub fn path(&self) -> &Path {
        match self {
            SceneEntry::Simple(p) => p,
            SceneEntry::Detailed { path, .. } => path,
        }
    }

    /// Conversion job writing `<output_dir>/<name>.bh3` and `<name>.bha`
    pub fn job(&self, name: &str, output_dir: &Path) -> SceneImport {
        let mut job = SceneImport::new(self.path());
        if let SceneEntry::Detailed {
            scene,
            animation,
            mesh,
            anim,
            patch,
            ..
        } = self
        {
            job.scene = scene.clone();
            job.animation = animation.clone();
            job.convert_mesh = *mesh;
            job.convert_animation = *anim;
            job.patch_animation = *patch;
        }
        job.model_output = Some(output_dir.join(format!("{}.{}", name, MODEL_EXT)));
        job.animation_output = Some(output_dir.join(format!("{}.{}", name, ANIMATION_EXT)));
        job
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    Ok(manifest)
}

/// Entries sorted by name so builds run in a stable order
fn sorted<V>(entries: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = entries.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<()> {
    // Check that all source files exist
    for (name, entry) in sorted(&manifest.models) {
        if !entry.path().exists() {
            anyhow::bail!("Model '{}' source not found: {:?}", name, entry.path());
        }
        if let Some(animation) = entry.animation() {
            if !animation.exists() {
                anyhow::bail!("Model '{}' animation not found: {:?}", name, animation);
            }
        }
    }
    for (name, entry) in sorted(&manifest.scenes) {
        if !entry.path().exists() {
            anyhow::bail!("Scene '{}' source not found: {:?}", name, entry.path());
        }
    }
    Ok(())
}

/// Run every conversion in a manifest
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<()> {
    let output_dir = output_override.unwrap_or(&manifest.output.dir);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    for (name, entry) in sorted(&manifest.models) {
        let output = output_dir.join(format!("{}.{}", name, GLB_EXT));
        tracing::info!("Converting model: {} -> {:?}", name, output);
        convert::export_model(&ModelExport {
            model: entry.path().to_path_buf(),
            animation: entry.animation().map(Path::to_path_buf),
            output: Some(output),
        })
        .with_context(|| format!("Model '{}' failed", name))?;
    }

    for (name, entry) in sorted(&manifest.scenes) {
        tracing::info!("Converting scene: {} -> {:?}", name, output_dir);
        convert::import_gltf(&entry.job(name, output_dir))
            .with_context(|| format!("Scene '{}' failed", name))?;
    }

    Ok(())
}
