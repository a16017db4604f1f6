//! glTF/GLB document -> scene graph

use anyhow::{bail, Context, Result};
use bh3_common::scene::{
    AlphaMode, Animation, Channel, ChannelCurve, Curve, Interpolation, Material, Mesh, Node,
    Primitive, Scene, Skin, TextureRef, Topology, Transform,
};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::animation::util::ReadOutputs;
use std::path::Path;

use super::Selector;

/// Load a glTF/GLB file and flatten the selected scene into a [`Scene`].
///
/// The default scene is used when `selector` matches nothing; if the file has
/// no default scene, the first one.
pub fn load_scene(path: &Path, selector: Option<&Selector>) -> Result<Scene> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;
    read_document(&document, &buffers, selector)
}

/// Convert an already imported document.
pub fn read_document(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    selector: Option<&Selector>,
) -> Result<Scene> {
    let mut scene = Scene {
        nodes: document.nodes().map(read_node).collect(),
        ..Default::default()
    };
    for id in 0..scene.nodes.len() {
        for child in scene.nodes[id].children.clone() {
            scene.nodes[child].parent = Some(id);
        }
    }

    match select_scene(document, selector) {
        Some(selected) => {
            scene.name = selected.name().map(str::to_string);
            scene.roots = selected.nodes().map(|n| n.index()).collect();
        }
        None => {
            tracing::warn!("glTF has no scenes, using every top-level node");
            scene.roots = (0..scene.nodes.len())
                .filter(|&id| scene.nodes[id].parent.is_none())
                .collect();
        }
    }

    for mesh in document.meshes() {
        scene.meshes.push(read_mesh(&mesh, buffers)?);
    }
    for skin in document.skins() {
        scene.skins.push(read_skin(&skin, buffers));
    }
    scene.materials = document.materials().map(|m| read_material(&m)).collect();
    for animation in document.animations() {
        scene.animations.push(read_animation(&animation, buffers)?);
    }

    tracing::debug!(
        "Read glTF scene {:?}: {} nodes, {} meshes, {} skins, {} animations",
        scene.name,
        scene.nodes.len(),
        scene.meshes.len(),
        scene.skins.len(),
        scene.animations.len()
    );

    Ok(scene)
}

fn select_scene<'a>(
    document: &'a gltf::Document,
    selector: Option<&Selector>,
) -> Option<gltf::Scene<'a>> {
    let selected = selector.and_then(|s| s.find(document.scenes().map(|scene| scene.name())));
    match selected {
        Some(index) => document.scenes().nth(index),
        None => {
            if let Some(selector) = selector {
                tracing::warn!("Scene {} not found, using the default scene", selector);
            }
            document
                .default_scene()
                .or_else(|| document.scenes().next())
        }
    }
}

fn read_node(node: gltf::Node) -> Node {
    let (translation, rotation, scale) = node.transform().decomposed();
    Node {
        name: node.name().map(str::to_string),
        parent: None,
        children: node.children().map(|c| c.index()).collect(),
        transform: Transform {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
        },
        mesh: node.mesh().map(|m| m.index()),
        skin: node.skin().map(|s| s.index()),
    }
}

fn read_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<Mesh> {
    let mut has_morph_targets = mesh.weights().is_some_and(|w| !w.is_empty());
    let mut primitives = Vec::new();

    for primitive in mesh.primitives() {
        has_morph_targets |= primitive.morph_targets().next().is_some();
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .with_context(|| {
                format!(
                    "Primitive {} of mesh {:?} has no positions",
                    primitive.index(),
                    mesh.name().unwrap_or("unnamed")
                )
            })?
            .map(Vec3::from_array)
            .collect();
        let normals = reader
            .read_normals()
            .map(|iter| iter.map(Vec3::from_array).collect())
            .unwrap_or_default();

        let tex_coords = (0..)
            .map_while(|set| reader.read_tex_coords(set))
            .map(|iter| iter.into_f32().map(Vec2::from_array).collect())
            .collect();
        let joints = (0..)
            .map_while(|set| reader.read_joints(set))
            .map(|iter| iter.into_u16().collect())
            .collect();
        let weights = (0..)
            .map_while(|set| reader.read_weights(set))
            .map(|iter| iter.into_f32().collect())
            .collect();

        primitives.push(Primitive {
            topology: topology(primitive.mode()),
            positions,
            normals,
            tex_coords,
            joints,
            weights,
            indices: reader.read_indices().map(|iter| iter.into_u32().collect()),
            material: primitive.material().index(),
        });
    }

    Ok(Mesh {
        name: mesh.name().map(str::to_string),
        primitives,
        has_morph_targets,
    })
}

fn topology(mode: gltf::mesh::Mode) -> Topology {
    use gltf::mesh::Mode;
    match mode {
        Mode::Points => Topology::Points,
        Mode::Lines => Topology::Lines,
        Mode::LineLoop => Topology::LineLoop,
        Mode::LineStrip => Topology::LineStrip,
        Mode::Triangles => Topology::Triangles,
        Mode::TriangleStrip => Topology::TriangleStrip,
        Mode::TriangleFan => Topology::TriangleFan,
    }
}

fn read_skin(skin: &gltf::Skin, buffers: &[gltf::buffer::Data]) -> Skin {
    let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    Skin {
        name: skin.name().map(str::to_string),
        joints: skin.joints().map(|j| j.index()).collect(),
        inverse_bind_matrices: reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_default(),
        skeleton: skin.skeleton().map(|n| n.index()),
    }
}

fn read_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    Material {
        name: material.name().map(str::to_string),
        base_color_factor: Vec4::from_array(pbr.base_color_factor()),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
        // Image data is not carried over on import
        base_color_texture: pbr.base_color_texture().map(|info| TextureRef {
            image: None,
            tex_coord: info.tex_coord(),
        }),
    }
}

fn read_animation(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> Result<Animation> {
    let label = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", animation.index()));
    let mut channels = Vec::new();

    for channel in animation.channels() {
        let node = channel.target().node().index();
        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };

        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let times: Vec<f32> = reader
            .read_inputs()
            .with_context(|| format!("Animation {} has a channel without key times", label))?
            .collect();
        let Some(outputs) = reader.read_outputs() else {
            bail!("Animation {} has a channel without key values", label);
        };

        let curve = match outputs {
            ReadOutputs::Translations(values) => ChannelCurve::Translation(Curve {
                interpolation,
                times,
                values: values.map(Vec3::from_array).collect(),
            }),
            ReadOutputs::Rotations(values) => ChannelCurve::Rotation(Curve {
                interpolation,
                times,
                values: values.into_f32().map(Quat::from_array).collect(),
            }),
            ReadOutputs::Scales(values) => ChannelCurve::Scale(Curve {
                interpolation,
                times,
                values: values.map(Vec3::from_array).collect(),
            }),
            ReadOutputs::MorphTargetWeights(_) => {
                tracing::debug!("Skipping morph weight channel in animation {}", label);
                continue;
            }
        };
        channels.push(Channel { node, curve });
    }

    Ok(Animation {
        name: animation.name().map(str::to_string),
        channels,
    })
}
