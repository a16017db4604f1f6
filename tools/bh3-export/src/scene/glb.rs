//! Scene graph -> binary glTF

use anyhow::{bail, Context, Result};
use bh3_common::scene::{AlphaMode, ChannelCurve, Interpolation, Node, Primitive, Scene, Topology};
use glam::{Quat, Vec3};
use glb_builder::json;
use glb_builder::{
    assemble_glb, AnimationBuilder, BufferBuilder, ChannelValues, GltfBuilder, MaterialDesc,
    MeshAccessors, MeshBuilder, NodeDesc, SkeletonBuilder,
};
use std::path::Path;

const GENERATOR: &str = concat!("bh3-export ", env!("CARGO_PKG_VERSION"));

/// Encode a scene as a self-contained `.glb`.
///
/// Every image becomes one texture with the same index, so a material's
/// [`TextureRef::image`](bh3_common::scene::TextureRef) doubles as its
/// texture index.
pub fn scene_to_glb(scene: &Scene) -> Result<Vec<u8>> {
    let mut buffer = BufferBuilder::new();
    let mut gltf = GltfBuilder::new();

    for (index, image) in scene.images.iter().enumerate() {
        let view = buffer.pack_image(&image.data);
        gltf = gltf
            .add_image(image.name.as_deref(), &image.mime_type, view)
            .add_texture(index as u32);
    }

    for material in &scene.materials {
        gltf = gltf.add_material(MaterialDesc {
            name: material.name.clone(),
            base_color_factor: material.base_color_factor.to_array(),
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
            alpha_mode: match material.alpha_mode {
                AlphaMode::Opaque => json::material::AlphaMode::Opaque,
                AlphaMode::Mask => json::material::AlphaMode::Mask,
                AlphaMode::Blend => json::material::AlphaMode::Blend,
            },
            base_color_texture: material
                .base_color_texture
                .and_then(|t| t.image.map(|image| (image as u32, t.tex_coord))),
        });
    }

    for mesh in &scene.meshes {
        let name = mesh.name.as_deref().unwrap_or("unnamed");
        let primitives = mesh
            .primitives
            .iter()
            .map(|p| pack_primitive(p, &mut buffer))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Failed to encode mesh {:?}", name))?;
        gltf = gltf.add_mesh_from_primitives(mesh.name.as_deref(), &primitives);
    }

    for skin in &scene.skins {
        let mut skeleton = SkeletonBuilder::new();
        for (j, &node) in skin.joints.iter().enumerate() {
            skeleton = skeleton.add_joint(node as u32, skin.inverse_bind_matrix(j).to_cols_array());
        }
        if let Some(root) = skin.skeleton {
            skeleton = skeleton.skeleton_root(root as u32);
        }
        let accessors = skeleton.build(&mut buffer);
        gltf = gltf.add_skin(skin.name.as_deref(), &accessors);
    }

    for node in &scene.nodes {
        gltf = gltf.add_node(node_desc(node));
    }

    for animation in &scene.animations {
        if animation.channels.is_empty() {
            continue;
        }
        let mut builder = AnimationBuilder::new();
        for channel in &animation.channels {
            let node = channel.node as u32;
            builder = match &channel.curve {
                ChannelCurve::Translation(c) => builder.channel(
                    node,
                    interpolation(c.interpolation),
                    &c.times,
                    ChannelValues::Translation(c.values.iter().map(|v| v.to_array()).collect()),
                ),
                ChannelCurve::Rotation(c) => builder.channel(
                    node,
                    interpolation(c.interpolation),
                    &c.times,
                    ChannelValues::Rotation(c.values.iter().map(|q| q.to_array()).collect()),
                ),
                ChannelCurve::Scale(c) => builder.channel(
                    node,
                    interpolation(c.interpolation),
                    &c.times,
                    ChannelValues::Scale(c.values.iter().map(|v| v.to_array()).collect()),
                ),
            };
        }
        let accessors = builder.build(&mut buffer);
        gltf = gltf.add_animation(animation.name.as_deref(), &accessors);
    }

    let roots: Vec<u32> = scene.roots.iter().map(|&r| r as u32).collect();
    let root = gltf
        .add_scene(scene.name.as_deref().unwrap_or("Scene"), &roots)
        .buffer_byte_length(buffer.data().len() as u64)
        .build(buffer.views(), buffer.accessors(), GENERATOR);

    assemble_glb(&root, buffer.data())
}

/// Encode `scene` and write it to `path`.
pub fn write_glb(scene: &Scene, path: &Path) -> Result<()> {
    let glb = scene_to_glb(scene)?;
    std::fs::write(path, &glb).with_context(|| format!("Failed to write GLB: {:?}", path))?;
    tracing::info!("Wrote {:?} ({} bytes)", path, glb.len());
    Ok(())
}

fn pack_primitive(primitive: &Primitive, buffer: &mut BufferBuilder) -> Result<MeshAccessors> {
    if primitive.topology != Topology::Triangles {
        bail!("Only triangle lists can be written, got {:?}", primitive.topology);
    }
    let to_arrays = |v: &[Vec3]| v.iter().map(|p| p.to_array()).collect::<Vec<_>>();

    let mut builder = MeshBuilder::new().positions(&to_arrays(&primitive.positions));
    if !primitive.normals.is_empty() {
        builder = builder.normals(&to_arrays(&primitive.normals));
    }
    for set in &primitive.tex_coords {
        let uvs: Vec<[f32; 2]> = set.iter().map(|uv| uv.to_array()).collect();
        builder = builder.uvs(&uvs);
    }
    if primitive.joints.len() > 1 {
        tracing::warn!("Only the first joint/weight set is written");
    }
    if let (Some(joints), Some(weights)) = (primitive.joints.first(), primitive.weights.first()) {
        builder = builder.joints(joints).weights(weights);
    }
    if let Some(indices) = &primitive.indices {
        builder = builder.indices(indices);
    }
    if let Some(material) = primitive.material {
        builder = builder.material(material as u32);
    }

    Ok(builder.build(buffer))
}

/// Default components are left out of the document
fn node_desc(node: &Node) -> NodeDesc {
    let transform = &node.transform;
    NodeDesc {
        name: node.name.clone(),
        translation: (transform.translation != Vec3::ZERO).then(|| transform.translation.to_array()),
        rotation: (transform.rotation != Quat::IDENTITY).then(|| transform.rotation.to_array()),
        scale: (transform.scale != Vec3::ONE).then(|| transform.scale.to_array()),
        children: node.children.iter().map(|&c| c as u32).collect(),
        mesh: node.mesh.map(|m| m as u32),
        skin: node.skin.map(|s| s as u32),
    }
}

fn interpolation(interpolation: Interpolation) -> json::animation::Interpolation {
    match interpolation {
        Interpolation::Step => json::animation::Interpolation::Step,
        Interpolation::Linear => json::animation::Interpolation::Linear,
        Interpolation::CubicSpline => json::animation::Interpolation::CubicSpline,
    }
}
