//! File-level conversions between `.bh3`/`.bha` and glTF

use anyhow::{bail, Context, Result};
use bh3_common::export::DEFAULT_ANIMATION_NAME;
use bh3_common::{export_scene, import_scene, Bh3File, BhaFile, ExportOptions, ImportOptions};
use std::path::{Path, PathBuf};

use crate::scene::{self, Selector};
use crate::texture;

pub const MODEL_EXT: &str = "bh3";
pub const ANIMATION_EXT: &str = "bha";
pub const GLB_EXT: &str = "glb";

/// Inputs of a model (+ animation) to glTF conversion
#[derive(Debug, Clone, Default)]
pub struct ModelExport {
    pub model: PathBuf,
    pub animation: Option<PathBuf>,
    /// Defaults to the model path with a `.glb` extension
    pub output: Option<PathBuf>,
}

/// Inputs of a glTF to model (+ animation) conversion
#[derive(Debug, Clone)]
pub struct SceneImport {
    pub input: PathBuf,
    pub scene: Option<Selector>,
    pub animation: Option<Selector>,
    pub convert_mesh: bool,
    pub convert_animation: bool,
    pub patch_animation: bool,
    /// Defaults to the input path with a `.bh3` extension
    pub model_output: Option<PathBuf>,
    /// Defaults to the input path with a `.bha` extension
    pub animation_output: Option<PathBuf>,
}

impl SceneImport {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            scene: None,
            animation: None,
            convert_mesh: true,
            convert_animation: true,
            patch_animation: true,
            model_output: None,
            animation_output: None,
        }
    }
}

/// Lower-cased extension of `path`, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Convert a single file, picking the direction from its extension
pub fn convert_file(input: &Path) -> Result<()> {
    match extension_of(input).as_str() {
        MODEL_EXT => export_model(&ModelExport {
            model: input.to_path_buf(),
            ..Default::default()
        })
        .map(|_| ()),
        "glb" | "gltf" => import_gltf(&SceneImport::new(input)).map(|_| ()),
        ext => bail!(
            "Unsupported file extension {:?} for {:?} (use .bh3, .glb or .gltf)",
            ext,
            input
        ),
    }
}

/// Convert a model and optional animation to a `.glb`; returns the output path
pub fn export_model(job: &ModelExport) -> Result<PathBuf> {
    tracing::info!("Converting bh3 to glTF: {:?}", job.model);
    let model = Bh3File::open(&job.model)
        .with_context(|| format!("Failed to read model: {:?}", job.model))?;
    let animation = job
        .animation
        .as_deref()
        .map(|path| {
            BhaFile::open(path).with_context(|| format!("Failed to read animation: {:?}", path))
        })
        .transpose()?;

    let mesh_name = file_stem(&job.model);
    let options = ExportOptions {
        texture: texture::find_texture(&job.model, &mesh_name),
        animation_name: job
            .animation
            .as_deref()
            .map(file_stem)
            .unwrap_or_else(|| DEFAULT_ANIMATION_NAME.to_string()),
        mesh_name,
    };

    let scene = export_scene(&model, animation.as_ref(), &options)
        .with_context(|| format!("Failed to convert {:?}", job.model))?;

    let output = job
        .output
        .clone()
        .unwrap_or_else(|| job.model.with_extension(GLB_EXT));
    scene::write_glb(&scene, &output)?;
    Ok(output)
}

/// Files written by [`import_gltf`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutputs {
    pub model: Option<PathBuf>,
    pub animation: Option<PathBuf>,
}

/// Convert a glTF/GLB file to `.bh3` and `.bha`
pub fn import_gltf(job: &SceneImport) -> Result<ImportOutputs> {
    tracing::info!("Converting glTF to bh3/bha: {:?}", job.input);
    let scene = scene::load_scene(&job.input, job.scene.as_ref())?;

    let animation = match &job.animation {
        Some(selector) => selector
            .find(scene.animations.iter().map(|a| a.name.as_deref()))
            .unwrap_or_else(|| {
                if !scene.animations.is_empty() {
                    tracing::warn!("Animation {} not found, using the first one", selector);
                }
                0
            }),
        None => 0,
    };
    let options = ImportOptions {
        convert_mesh: job.convert_mesh,
        convert_animation: job.convert_animation,
        patch_animation: job.patch_animation,
        animation,
    };

    let imported = import_scene(&scene, &options)
        .with_context(|| format!("Failed to convert {:?}", job.input))?;

    let mut outputs = ImportOutputs::default();
    if job.convert_mesh {
        let path = job
            .model_output
            .clone()
            .unwrap_or_else(|| job.input.with_extension(MODEL_EXT));
        imported
            .model
            .save(&path)
            .with_context(|| format!("Failed to write model: {:?}", path))?;
        tracing::info!("Wrote {:?}", path);
        outputs.model = Some(path);
    }
    if let Some(bha) = &imported.animation {
        let path = job
            .animation_output
            .clone()
            .unwrap_or_else(|| job.input.with_extension(ANIMATION_EXT));
        bha.save(&path)
            .with_context(|| format!("Failed to write animation: {:?}", path))?;
        tracing::info!("Wrote {:?}", path);
        outputs.animation = Some(path);
    }

    Ok(outputs)
}
