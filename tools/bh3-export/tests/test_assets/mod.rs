//! Programmatically built models and animations for the integration tests

use bh3_common::formats::bh3::{Bone, MeshGeometry};
use bh3_common::formats::bha::{BoneKey, BoneTrack};
use bh3_common::{Bh3File, BhaFile};
use glam::{Quat, Vec2, Vec3, Vec4};
use std::path::Path;

fn bone(name: &str, rotation: Quat, translation: Vec3, vertices: (i32, i32)) -> Bone {
    let mut bone = Bone::new(name);
    bone.rotation = rotation;
    bone.translation = translation;
    bone.vertex_start = vertices.0;
    bone.vertex_count = vertices.1;
    bone
}

/// Three bones in a chain owning two triangles' worth of vertices
pub fn soldier() -> Bh3File {
    let mut hips = bone("Hips", Quat::from_rotation_z(0.25), Vec3::new(0.0, 0.0, 1.0), (0, 3));
    let mut spine = bone("Spine", Quat::from_rotation_x(-0.3), Vec3::new(0.0, 0.1, 0.4), (3, 2));
    spine
        .children
        .push(bone("Head", Quat::IDENTITY, Vec3::new(0.0, 0.0, 0.3), (5, 1)));
    hips.children.push(spine);

    let positions = (0..6)
        .map(|i| Vec4::new(0.1 * i as f32, -0.2, 0.05 * i as f32, 1.0))
        .collect();
    let normals = (0..6)
        .map(|i| Vec3::new((i as f32).cos(), (i as f32).sin(), 0.0))
        .collect();
    let tex_coords = (0..6)
        .map(|i| Vec2::new(i as f32 / 8.0, 1.0 - i as f32 / 8.0))
        .collect();

    Bh3File {
        geometry: MeshGeometry {
            positions,
            normals,
            normal_padding: vec![0; 6],
            tex_coords,
            indices: vec![0, 1, 2, 3, 4, 5],
        },
        root_bone: hips,
    }
}

fn key(time: f32, angle: f32, translation: Vec3) -> BoneKey {
    BoneKey {
        time,
        rotation: Quat::from_rotation_z(angle),
        translation,
    }
}

/// Animates the hips and the spine; the head has no track
pub fn walk() -> BhaFile {
    BhaFile {
        root_track: BoneTrack {
            keys: vec![
                key(0.0, 0.25, Vec3::new(0.0, 0.0, 1.0)),
                key(0.5, 0.5, Vec3::new(0.0, 0.2, 1.0)),
            ],
            children: vec![BoneTrack {
                keys: vec![
                    key(0.0, -0.3, Vec3::new(0.0, 0.1, 0.4)),
                    key(0.5, 0.1, Vec3::new(0.0, 0.1, 0.4)),
                ],
                children: Vec::new(),
            }],
        },
    }
}

pub fn write_soldier(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("soldier.bh3");
    soldier().save(&path).expect("Failed to write model");
    path
}

pub fn write_walk(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("walk.bha");
    walk().save(&path).expect("Failed to write animation");
    path
}
