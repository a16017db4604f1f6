//! bh3-export - Rise of Nations model converter
//!
//! Converts .bh3 models (with an optional .bha animation) to .glb, and
//! glTF/GLB scenes back to .bh3/.bha.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use bh3_export::{convert, info, manifest, ModelExport, SceneImport, Selector};

#[derive(Parser)]
#[command(name = "bh3-export")]
#[command(about = "Rise of Nations BH3/BHA <-> glTF converter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file, picking the direction from its extension
    Convert {
        /// Input .bh3, .glb or .gltf file
        input: PathBuf,
    },

    /// Export a model (and animation) to binary glTF
    Bh3 {
        /// Input .bh3 file
        input: PathBuf,

        /// Animation .bha file to bake into the scene
        #[arg(short, long)]
        anim: Option<PathBuf>,

        /// Output .glb file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a glTF/GLB scene as .bh3/.bha
    Gltf {
        /// Input .glb or .gltf file
        input: PathBuf,

        /// Skip the model
        #[arg(long)]
        no_mesh: bool,

        /// Skip the animation
        #[arg(long)]
        no_anim: bool,

        /// Keep the animation tree as authored instead of patching it to the skeleton
        #[arg(long)]
        no_patch: bool,

        /// Scene index or name (default: the document's default scene)
        #[arg(short, long)]
        scene: Option<Selector>,

        /// Animation index or name (default: first animation)
        #[arg(short, long)]
        animation: Option<Selector>,

        /// Output .bh3 file
        #[arg(long)]
        model_output: Option<PathBuf>,

        /// Output .bha file
        #[arg(long)]
        anim_output: Option<PathBuf>,
    },

    /// Run the conversions listed in a manifest file
    Build {
        /// Path to conversions.toml manifest
        #[arg(default_value = "conversions.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to conversions.toml manifest
        #[arg(default_value = "conversions.toml")]
        manifest: PathBuf,
    },

    /// Print a summary of a .bh3 or .bha file
    Info {
        /// Input .bh3 or .bha file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let started = Instant::now();
    let result = run(cli.command);
    match &result {
        Ok(()) => tracing::info!("Command succeeded. Elapsed: {:?}", started.elapsed()),
        Err(_) => tracing::error!("Command failed. Elapsed: {:?}", started.elapsed()),
    }
    result
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Convert { input } => {
            convert::convert_file(&input)?;
        }

        Commands::Bh3 {
            input,
            anim,
            output,
        } => {
            let output = convert::export_model(&ModelExport {
                model: input,
                animation: anim,
                output,
            })?;
            tracing::info!("Done! {:?}", output);
        }

        Commands::Gltf {
            input,
            no_mesh,
            no_anim,
            no_patch,
            scene,
            animation,
            model_output,
            anim_output,
        } => {
            let mut job = SceneImport::new(input);
            job.scene = scene;
            job.animation = animation;
            job.convert_mesh = !no_mesh;
            job.convert_animation = !no_anim;
            job.patch_animation = !no_patch;
            job.model_output = model_output;
            job.animation_output = anim_output;
            convert::import_gltf(&job)?;
        }

        Commands::Build { manifest, output } => {
            tracing::info!("Building conversions from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Info { input } => {
            print!("{}", info::describe_file(&input)?);
        }
    }

    Ok(())
}
