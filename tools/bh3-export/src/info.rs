//! Human-readable summaries of `.bh3` and `.bha` files

use anyhow::{bail, Context, Result};
use bh3_common::formats::bh3::Bone;
use bh3_common::formats::bha::BoneTrack;
use bh3_common::{Bh3File, BhaFile};
use std::fmt::Write;
use std::path::Path;

use crate::convert::{extension_of, ANIMATION_EXT, MODEL_EXT};

/// Describe a model or animation file, chosen by extension
pub fn describe_file(path: &Path) -> Result<String> {
    match extension_of(path).as_str() {
        MODEL_EXT => {
            let model = Bh3File::open(path)
                .with_context(|| format!("Failed to read model: {:?}", path))?;
            Ok(describe_model(&model))
        }
        ANIMATION_EXT => {
            let animation = BhaFile::open(path)
                .with_context(|| format!("Failed to read animation: {:?}", path))?;
            Ok(describe_animation(&animation))
        }
        ext => bail!("Cannot describe {:?} files (use .bh3 or .bha)", ext),
    }
}

pub fn describe_model(model: &Bh3File) -> String {
    let geometry = &model.geometry;
    let mut out = format!(
        "{} vertices, {} triangles, {} bones\n",
        geometry.vertex_count(),
        geometry.triangle_count(),
        model.bone_count()
    );
    write_bone(&mut out, &model.root_bone, 0);
    out
}

fn write_bone(out: &mut String, bone: &Bone, depth: usize) {
    let _ = write!(out, "{:indent$}{}", "", bone.name, indent = depth * 2);
    if bone.vertex_count > 0 {
        let _ = write!(
            out,
            " [vertices {}..{}]",
            bone.vertex_start,
            i64::from(bone.vertex_start) + i64::from(bone.vertex_count)
        );
    }
    out.push('\n');
    for child in &bone.children {
        write_bone(out, child, depth + 1);
    }
}

pub fn describe_animation(animation: &BhaFile) -> String {
    let mut out = format!(
        "{} tracks, {:.3}s\n",
        animation.track_count(),
        animation.duration()
    );
    write_track(&mut out, &animation.root_track, 0);
    out
}

fn write_track(out: &mut String, track: &BoneTrack, depth: usize) {
    let _ = writeln!(
        out,
        "{:indent$}{} keys, {:.3}s",
        "",
        track.keys.len(),
        track.duration(),
        indent = depth * 2
    );
    for child in &track.children {
        write_track(out, child, depth + 1);
    }
}
