//! BH3 model + BHA animation -> scene graph.
//!
//! Bones become a node hierarchy and a skin; the pre-skinned vertices are
//! moved back into world space so that every joint's inverse bind matrix is
//! simply the inverse of its world transform.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use hashbrown::HashSet;
use tracing::info;

use crate::basis::{flip_winding, game_to_scene};
use crate::error::{Error, Result};
use crate::formats::bh3::{Bh3File, Bone};
use crate::formats::bha::{BhaFile, BoneTrack};
use crate::scene::{
    AlphaMode, Animation, Channel, ChannelCurve, Curve, Image, Material, Mesh, NodeId, Primitive,
    Scene, Skin, TextureRef, Transform,
};
use crate::tree::zip_tolerant;

pub const DEFAULT_MESH_NAME: &str = "MeshName";
pub const DEFAULT_ANIMATION_NAME: &str = "Default";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Name of the mesh, its node and its material
    pub mesh_name: String,
    pub animation_name: String,
    /// Base colour texture, already encoded
    pub texture: Option<Image>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mesh_name: DEFAULT_MESH_NAME.to_string(),
            animation_name: DEFAULT_ANIMATION_NAME.to_string(),
            texture: None,
        }
    }
}

/// A bone placed in the scene
struct Joint<'a> {
    node: NodeId,
    world: Mat4,
    track: Option<&'a BoneTrack>,
}

/// Build a scene holding the skeleton, the skinned mesh and the animation.
///
/// The animation may be shallower than the skeleton; bones without a track
/// are simply not animated.
pub fn export_scene(model: &Bh3File, animation: Option<&BhaFile>, options: &ExportOptions) -> Result<Scene> {
    let geometry = &model.geometry;
    let vertex_count = geometry.vertex_count();
    if geometry.normals.len() != vertex_count || geometry.tex_coords.len() != vertex_count {
        return Err(Error::unsupported(
            "mesh",
            format!(
                "{} positions, {} normals and {} texture coordinates differ in length",
                vertex_count,
                geometry.normals.len(),
                geometry.tex_coords.len()
            ),
        ));
    }

    let mut scene = Scene::default();
    let mut names = HashSet::new();
    let mut joints: Vec<Joint> = Vec::new();
    let mut vertices: Vec<Option<(Vec3, Vec3, u16)>> = vec![None; vertex_count];

    // (parent joint index, children still to visit)
    let mut open_parents: Vec<(usize, usize)> = Vec::new();
    for (bone, track) in zip_tolerant(&model.root_bone, animation.map(|a| &a.root_track)) {
        let parent = match open_parents.last_mut() {
            None => None,
            Some((parent, remaining)) => {
                let parent = *parent;
                *remaining -= 1;
                if *remaining == 0 {
                    open_parents.pop();
                }
                Some(parent)
            }
        };

        let name = unique_name(&mut names, &bone.name);
        let rotation = bone.rotation.inverse();
        let transform = match parent {
            None => Transform::from_translation_rotation(
                game_to_scene() * bone.translation,
                game_to_scene() * rotation,
            ),
            Some(_) => Transform::from_translation_rotation(bone.translation, rotation),
        };
        let node = scene.add_node(name, transform, parent.map(|p| joints[p].node));
        let world = scene.world_matrix(node);

        let joint_index = u16::try_from(joints.len())
            .map_err(|_| Error::unsupported("skeleton", "more than 65536 bones"))?;
        place_vertices(model, bone, world, joint_index, &mut vertices)?;

        if !bone.children.is_empty() {
            open_parents.push((joints.len(), bone.children.len()));
        }
        joints.push(Joint { node, world, track });
    }

    if !geometry.indices.is_empty() {
        add_skinned_mesh(&mut scene, model, &joints, vertices, options)?;
    }

    if animation.is_some() {
        add_animation(&mut scene, &joints, &options.animation_name);
    }

    info!(
        "Exported {} bones, {} vertices, {} triangles{}",
        joints.len(),
        vertex_count,
        geometry.triangle_count(),
        if scene.animations.is_empty() {
            String::new()
        } else {
            format!(", animation {:?}", options.animation_name)
        }
    );

    Ok(scene)
}

/// `name`, or `name1`, `name2`, ... if already taken.
fn unique_name(names: &mut HashSet<String>, name: &str) -> String {
    let mut candidate = name.to_string();
    let mut suffix = 1;
    while names.contains(&candidate) {
        candidate = format!("{}{}", name, suffix);
        suffix += 1;
    }
    names.insert(candidate.clone());
    candidate
}

/// Move a bone's vertices from bone space to world space.
fn place_vertices(
    model: &Bh3File,
    bone: &Bone,
    world: Mat4,
    joint: u16,
    vertices: &mut [Option<(Vec3, Vec3, u16)>],
) -> Result<()> {
    let Some(range) = bone.vertex_range() else {
        return Ok(());
    };
    if range.end > vertices.len() {
        return Err(Error::unsupported(
            format!("bone {:?}", bone.name),
            format!(
                "vertex range {}..{} exceeds {} vertices",
                range.start,
                range.end,
                vertices.len()
            ),
        ));
    }
    if world.determinant() == 0.0 {
        return Err(Error::unsupported(
            format!("bone {:?}", bone.name),
            "world matrix could not be inverted",
        ));
    }
    let normal_matrix = world.inverse().transpose();

    let geometry = &model.geometry;
    for i in range {
        let position = (world * geometry.positions[i]).truncate();
        let normal = normal_matrix
            .transform_vector3(geometry.normals[i])
            .normalize_or_zero();
        vertices[i] = Some((position, normal, joint));
    }
    Ok(())
}

fn add_skinned_mesh(
    scene: &mut Scene,
    model: &Bh3File,
    joints: &[Joint],
    vertices: Vec<Option<(Vec3, Vec3, u16)>>,
    options: &ExportOptions,
) -> Result<()> {
    let geometry = &model.geometry;
    if geometry.indices.len() % 3 != 0 {
        return Err(Error::unsupported(
            "mesh",
            format!("{} indices do not form whole triangles", geometry.indices.len()),
        ));
    }

    let mut primitive = Primitive {
        material: Some(scene.materials.len()),
        ..Default::default()
    };
    let mut tex_coords: Vec<Vec2> = Vec::with_capacity(vertices.len());
    let mut joint_indices = Vec::with_capacity(vertices.len());
    for (i, vertex) in vertices.into_iter().enumerate() {
        let (position, normal, joint) = vertex.ok_or_else(|| {
            Error::unsupported("mesh", format!("vertex {} is not owned by any bone", i))
        })?;
        primitive.positions.push(position);
        primitive.normals.push(normal);
        tex_coords.push(geometry.tex_coords[i]);
        joint_indices.push([joint, 0, 0, 0]);
    }
    primitive.weights = vec![vec![[1.0, 0.0, 0.0, 0.0]; joint_indices.len()]];
    primitive.joints = vec![joint_indices];
    primitive.tex_coords = vec![tex_coords];

    let mut indices = Vec::with_capacity(geometry.indices.len());
    for triangle in geometry.indices.chunks_exact(3) {
        let triangle = flip_winding([triangle[0], triangle[1], triangle[2]]);
        for index in triangle {
            if usize::from(index) >= primitive.positions.len() {
                return Err(Error::unsupported(
                    "mesh",
                    format!("index {} is out of range", index),
                ));
            }
            indices.push(u32::from(index));
        }
    }
    primitive.indices = Some(indices);

    let base_color_texture = options.texture.clone().map(|image| {
        scene.images.push(image);
        TextureRef {
            image: Some(scene.images.len() - 1),
            tex_coord: 0,
        }
    });
    scene.materials.push(Material {
        name: Some(options.mesh_name.clone()),
        base_color_factor: Vec4::new(0.5, 0.5, 0.5, 1.0),
        metallic_factor: 0.1,
        roughness_factor: 0.5,
        alpha_mode: AlphaMode::Blend,
        base_color_texture,
    });

    scene.meshes.push(Mesh {
        name: Some(options.mesh_name.clone()),
        primitives: vec![primitive],
        has_morph_targets: false,
    });
    scene.skins.push(Skin {
        name: None,
        joints: joints.iter().map(|j| j.node).collect(),
        inverse_bind_matrices: joints.iter().map(|j| j.world.inverse()).collect(),
        skeleton: joints.first().map(|j| j.node),
    });

    let node = scene.add_node(options.mesh_name.clone(), Transform::IDENTITY, None);
    scene.nodes[node].mesh = Some(scene.meshes.len() - 1);
    scene.nodes[node].skin = Some(scene.skins.len() - 1);
    Ok(())
}

/// Absolute-time linear channels for every bone whose track has keys.
fn add_animation(scene: &mut Scene, joints: &[Joint], name: &str) {
    let mut channels = Vec::new();
    for joint in joints {
        let Some(track) = joint.track.filter(|t| !t.keys.is_empty()) else {
            continue;
        };

        let rest = scene.nodes[joint.node].transform;
        let mut time = 0.0;
        let mut times = Vec::with_capacity(track.keys.len());
        let mut translations = Vec::with_capacity(track.keys.len());
        let mut rotations: Vec<Quat> = Vec::with_capacity(track.keys.len());
        for key in &track.keys {
            time += key.time;
            times.push(time);
            translations.push(rest.rotation * key.translation + rest.translation);
            rotations.push(rest.rotation * key.rotation.inverse());
        }

        channels.push(Channel {
            node: joint.node,
            curve: ChannelCurve::Translation(Curve::linear(times.clone(), translations)),
        });
        channels.push(Channel {
            node: joint.node,
            curve: ChannelCurve::Rotation(Curve::linear(times, rotations)),
        });
    }

    if !channels.is_empty() {
        scene.animations.push(Animation {
            name: Some(name.to_string()),
            channels,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::bh3::MeshGeometry;
    use crate::formats::bha::BoneKey;
    use crate::import::{import_scene, ImportOptions};
    use crate::tree::zip_exact;

    fn bone(name: &str, rotation: Quat, translation: Vec3, range: (i32, i32)) -> Bone {
        Bone {
            name: name.to_string(),
            rotation,
            translation,
            vertex_start: range.0,
            vertex_count: range.1,
            children: Vec::new(),
        }
    }

    /// Bip01 -> {Pelvis -> {Spine}, Pelvis}: duplicate name, three vertex ranges
    fn sample_model() -> Bh3File {
        let mut root = bone(
            "Bip01",
            Quat::from_rotation_z(0.3).inverse(),
            Vec3::new(0.1, 0.2, 0.9),
            (0, 3),
        );
        let mut pelvis = bone(
            "Pelvis",
            Quat::from_rotation_x(0.4),
            Vec3::new(0.0, 0.0, 0.3),
            (3, 1),
        );
        pelvis.children.push(bone(
            "Spine",
            Quat::from_euler(glam::EulerRot::XYZ, 0.1, 0.2, 0.3),
            Vec3::new(0.2, 0.0, 0.0),
            (4, 2),
        ));
        root.children.push(pelvis);
        root.children.push(bone("Pelvis", Quat::IDENTITY, Vec3::X, (0, 0)));

        let positions = (0..6)
            .map(|i| Vec4::new(i as f32 * 0.1, 0.5, -0.25, 1.0))
            .collect();
        let normals = (0..6)
            .map(|i| Vec3::new(0.0, (i as f32).sin(), (i as f32).cos()).normalize())
            .collect();
        let tex_coords = (0..6).map(|i| Vec2::new(i as f32 / 6.0, 0.5)).collect();

        Bh3File {
            geometry: MeshGeometry {
                positions,
                normals,
                normal_padding: vec![0; 6],
                tex_coords,
                indices: vec![0, 1, 2, 2, 3, 4, 3, 4, 5],
            },
            root_bone: root,
        }
    }

    fn key(time: f32, angle: f32, translation: Vec3) -> BoneKey {
        BoneKey {
            time,
            rotation: Quat::from_rotation_y(angle),
            translation,
        }
    }

    fn sample_animation() -> BhaFile {
        BhaFile {
            root_track: BoneTrack {
                keys: vec![key(0.0, 0.0, Vec3::ZERO), key(0.5, 0.2, Vec3::Z)],
                children: vec![BoneTrack {
                    keys: vec![key(0.25, 0.1, Vec3::ZERO), key(0.25, -0.1, Vec3::X)],
                    children: Vec::new(),
                }],
            },
        }
    }

    #[test]
    fn test_names_are_deduplicated() {
        let scene = export_scene(&sample_model(), None, &ExportOptions::default()).unwrap();
        let names: Vec<_> = scene.nodes.iter().filter_map(|n| n.name.as_deref()).collect();
        assert_eq!(names, ["Bip01", "Pelvis", "Spine", "Pelvis1", DEFAULT_MESH_NAME]);
    }

    #[test]
    fn test_skin_and_material() {
        let scene = export_scene(&sample_model(), None, &ExportOptions::default()).unwrap();
        let skin = &scene.skins[0];
        assert_eq!(skin.joints, vec![0, 1, 2, 3]);
        for (j, &node) in skin.joints.iter().enumerate() {
            let product = scene.world_matrix(node) * skin.inverse_bind_matrix(j);
            assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }

        let material = &scene.materials[0];
        assert_eq!(material.name.as_deref(), Some(DEFAULT_MESH_NAME));
        assert_eq!(material.alpha_mode, AlphaMode::Blend);
        assert_eq!(material.metallic_factor, 0.1);
        assert_eq!(material.base_color_texture, None);

        let primitive = &scene.meshes[0].primitives[0];
        assert_eq!(primitive.joints[0][3], [1, 0, 0, 0]);
        assert_eq!(primitive.joints[0][5], [2, 0, 0, 0]);
        assert_eq!(&primitive.indices.as_ref().unwrap()[..3], &[0, 2, 1]);
    }

    #[test]
    fn test_root_uses_change_of_basis() {
        let model = sample_model();
        let scene = export_scene(&model, None, &ExportOptions::default()).unwrap();
        let root = scene.nodes[0].transform;
        let expected = game_to_scene() * model.root_bone.translation;
        assert!((root.translation - expected).length() < 1e-6);

        let child = scene.nodes[1].transform;
        assert_eq!(child.translation, Vec3::new(0.0, 0.0, 0.3));
        assert!(child
            .rotation
            .abs_diff_eq(Quat::from_rotation_x(0.4).inverse(), 1e-6));
    }

    #[test]
    fn test_partial_index_triangle_is_rejected() {
        let mut model = sample_model();
        model.geometry.indices.push(0);
        let err = export_scene(&model, None, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedData { .. }));
    }

    #[test]
    fn test_unowned_vertex_is_rejected() {
        let mut model = sample_model();
        model.root_bone.vertex_count = 2;
        assert!(export_scene(&model, None, &ExportOptions::default()).is_err());
    }

    #[test]
    fn test_shallow_animation_only_animates_matched_bones() {
        let scene = export_scene(
            &sample_model(),
            Some(&sample_animation()),
            &ExportOptions {
                animation_name: "Walk".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let animation = &scene.animations[0];
        assert_eq!(animation.name.as_deref(), Some("Walk"));
        let animated: HashSet<_> = animation.channels.iter().map(|c| c.node).collect();
        assert_eq!(animated, [0, 1].into_iter().collect());

        // Key times become absolute
        let times = animation.translation(1).unwrap().times.clone();
        assert_eq!(times, vec![0.25, 0.5]);
    }

    #[test]
    fn test_texture_is_embedded() {
        let options = ExportOptions {
            texture: Some(Image {
                name: Some("body".into()),
                mime_type: "image/png".into(),
                data: vec![0x89, b'P', b'N', b'G'],
            }),
            ..Default::default()
        };
        let scene = export_scene(&sample_model(), None, &options).unwrap();
        assert_eq!(scene.images.len(), 1);
        assert_eq!(
            scene.materials[0].base_color_texture,
            Some(TextureRef {
                image: Some(0),
                tex_coord: 0
            })
        );
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut model = sample_model();
        // Unique names so they survive unchanged
        model.root_bone.children[1].name = "Prop".into();
        let animation = sample_animation();

        let scene = export_scene(&model, Some(&animation), &ExportOptions::default()).unwrap();
        let options = ImportOptions {
            patch_animation: false,
            ..Default::default()
        };
        let imported = import_scene(&scene, &options).unwrap();

        for (original, reimported) in zip_exact(&model.root_bone, &imported.model.root_bone).unwrap() {
            assert_eq!(original.name, reimported.name);
            assert!(
                original.rotation.abs_diff_eq(reimported.rotation, 1e-5)
                    || original.rotation.abs_diff_eq(-reimported.rotation, 1e-5),
                "{}: {:?} vs {:?}",
                original.name,
                original.rotation,
                reimported.rotation
            );
            assert!((original.translation - reimported.translation).length() < 1e-5);
            assert_eq!(original.vertex_count, reimported.vertex_count);
            if original.vertex_count > 0 {
                assert_eq!(original.vertex_start, reimported.vertex_start);
            }
        }

        let geometry = &imported.model.geometry;
        for (a, b) in model.geometry.positions.iter().zip(&geometry.positions) {
            assert!((*a - *b).length() < 1e-5);
        }
        for (a, b) in model.geometry.normals.iter().zip(&geometry.normals) {
            assert!((*a - *b).length() < 1e-5);
        }
        assert_eq!(geometry.indices, model.geometry.indices);
        assert_eq!(geometry.tex_coords, model.geometry.tex_coords);

        let bha = imported.animation.unwrap();
        let root_keys = &bha.root_track.keys;
        assert_eq!(root_keys.len(), 2);
        for (a, b) in animation.root_track.keys.iter().zip(root_keys) {
            assert!((a.time - b.time).abs() < 1e-6);
            assert!((a.translation - b.translation).length() < 1e-5);
            assert!(a.rotation.abs_diff_eq(b.rotation, 1e-5) || a.rotation.abs_diff_eq(-b.rotation, 1e-5));
        }
        // Spine and Prop had no track; their empty trailing tracks are pruned
        assert_eq!(bha.track_count(), 2);
    }
}
