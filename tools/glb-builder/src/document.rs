//! glTF document construction

use crate::{AnimationAccessors, MeshAccessors, SkeletonAccessors, ViewIndex};
use gltf_json as json;
use gltf_json::validation::Checked::Valid;
use std::collections::BTreeMap;

/// A node of the hierarchy, referring to other document entries by index
#[derive(Debug, Clone, Default)]
pub struct NodeDesc {
    pub name: Option<String>,
    pub translation: Option<[f32; 3]>,
    /// [x, y, z, w]
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub children: Vec<u32>,
    pub mesh: Option<u32>,
    pub skin: Option<u32>,
}

impl NodeDesc {
    fn into_json(self) -> json::Node {
        json::Node {
            camera: None,
            children: if self.children.is_empty() {
                None
            } else {
                Some(self.children.into_iter().map(json::Index::new).collect())
            },
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: self.mesh.map(json::Index::new),
            name: self.name,
            rotation: self.rotation.map(json::scene::UnitQuaternion),
            scale: self.scale,
            translation: self.translation,
            skin: self.skin.map(json::Index::new),
            weights: None,
        }
    }
}

/// A metallic-roughness material
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: json::material::AlphaMode,
    /// (texture index, texture coordinate set)
    pub base_color_texture: Option<(u32, u32)>,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0; 4],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_mode: json::material::AlphaMode::Opaque,
            base_color_texture: None,
        }
    }
}

impl MaterialDesc {
    fn into_json(self) -> json::Material {
        let base_color_texture = self
            .base_color_texture
            .map(|(texture, tex_coord)| json::texture::Info {
                index: json::Index::new(texture),
                tex_coord,
                extensions: Default::default(),
                extras: Default::default(),
            });

        json::Material {
            alpha_mode: Valid(self.alpha_mode),
            name: self.name,
            pbr_metallic_roughness: json::material::PbrMetallicRoughness {
                base_color_factor: json::material::PbrBaseColorFactor(self.base_color_factor),
                base_color_texture,
                metallic_factor: json::material::StrengthFactor(self.metallic_factor),
                roughness_factor: json::material::StrengthFactor(self.roughness_factor),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Builder for complete glTF documents
#[derive(Default)]
pub struct GltfBuilder {
    nodes: Vec<json::Node>,
    meshes: Vec<json::Mesh>,
    materials: Vec<json::Material>,
    images: Vec<json::Image>,
    samplers: Vec<json::texture::Sampler>,
    textures: Vec<json::Texture>,
    skins: Vec<json::Skin>,
    animations: Vec<json::Animation>,
    scenes: Vec<json::Scene>,
    buffer_byte_length: u64,
}

impl GltfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set buffer byte length (required before building)
    pub fn buffer_byte_length(mut self, length: u64) -> Self {
        self.buffer_byte_length = length;
        self
    }

    pub fn add_node(mut self, node: NodeDesc) -> Self {
        self.nodes.push(node.into_json());
        self
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Add a single-primitive triangle mesh
    pub fn add_mesh_from_accessors(mut self, name: Option<&str>, accessors: &MeshAccessors) -> Self {
        self.meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: name.map(str::to_string),
            primitives: vec![primitive(accessors)],
            weights: None,
        });
        self
    }

    /// Add a mesh made of several primitives
    pub fn add_mesh_from_primitives(mut self, name: Option<&str>, primitives: &[MeshAccessors]) -> Self {
        self.meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: name.map(str::to_string),
            primitives: primitives.iter().map(primitive).collect(),
            weights: None,
        });
        self
    }

    pub fn add_material(mut self, material: MaterialDesc) -> Self {
        self.materials.push(material.into_json());
        self
    }

    /// Add an image stored in the binary buffer
    pub fn add_image(mut self, name: Option<&str>, mime_type: &str, view: ViewIndex) -> Self {
        self.images.push(json::Image {
            buffer_view: Some(view.as_json_index()),
            mime_type: Some(json::image::MimeType(mime_type.to_string())),
            name: name.map(str::to_string),
            uri: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        self
    }

    /// Add a texture over `image`, sampled with repeat wrapping
    pub fn add_texture(mut self, image: u32) -> Self {
        if self.samplers.is_empty() {
            self.samplers.push(json::texture::Sampler {
                mag_filter: None,
                min_filter: None,
                name: None,
                wrap_s: Valid(json::texture::WrappingMode::Repeat),
                wrap_t: Valid(json::texture::WrappingMode::Repeat),
                extensions: Default::default(),
                extras: Default::default(),
            });
        }
        self.textures.push(json::Texture {
            name: None,
            sampler: Some(json::Index::new(0)),
            source: json::Index::new(image),
            extensions: Default::default(),
            extras: Default::default(),
        });
        self
    }

    pub fn add_skin(mut self, name: Option<&str>, accessors: &SkeletonAccessors) -> Self {
        self.skins.push(json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: Some(accessors.inverse_bind_matrices.as_json_index()),
            joints: accessors.joints.iter().copied().map(json::Index::new).collect(),
            name: name.map(str::to_string),
            skeleton: accessors.skeleton_root.map(json::Index::new),
        });
        self
    }

    pub fn add_animation(mut self, name: Option<&str>, accessors: &AnimationAccessors) -> Self {
        let mut samplers = Vec::with_capacity(accessors.channels.len());
        let mut channels = Vec::with_capacity(accessors.channels.len());

        for channel in &accessors.channels {
            samplers.push(json::animation::Sampler {
                input: channel.input.as_json_index(),
                interpolation: Valid(channel.interpolation),
                output: channel.output.as_json_index(),
                extensions: Default::default(),
                extras: Default::default(),
            });
            channels.push(json::animation::Channel {
                sampler: json::Index::new(samplers.len() as u32 - 1),
                target: json::animation::Target {
                    node: json::Index::new(channel.node),
                    path: Valid(channel.property),
                    extensions: Default::default(),
                    extras: Default::default(),
                },
                extensions: Default::default(),
                extras: Default::default(),
            });
        }

        self.animations.push(json::Animation {
            channels,
            extensions: Default::default(),
            extras: Default::default(),
            name: name.map(str::to_string),
            samplers,
        });
        self
    }

    /// Add a scene; the first scene added becomes the default one
    pub fn add_scene(mut self, name: &str, root_nodes: &[u32]) -> Self {
        self.scenes.push(json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(name.to_string()),
            nodes: root_nodes.iter().copied().map(json::Index::new).collect(),
        });
        self
    }

    /// Build final glTF Root (requires buffer views and accessors from BufferBuilder)
    pub fn build(
        self,
        buffer_views: &[json::buffer::View],
        accessors: &[json::Accessor],
        generator: &str,
    ) -> json::Root {
        let buffers = if self.buffer_byte_length == 0 {
            Vec::new()
        } else {
            vec![json::Buffer {
                byte_length: self.buffer_byte_length.into(),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri: None,
            }]
        };

        json::Root {
            accessors: accessors.to_vec(),
            animations: self.animations,
            asset: json::Asset {
                copyright: None,
                extensions: Default::default(),
                extras: Default::default(),
                generator: Some(generator.to_string()),
                min_version: None,
                version: "2.0".to_string(),
            },
            buffers,
            buffer_views: buffer_views.to_vec(),
            cameras: Vec::new(),
            extensions: Default::default(),
            extensions_required: Vec::new(),
            extensions_used: Vec::new(),
            extras: Default::default(),
            images: self.images,
            materials: self.materials,
            meshes: self.meshes,
            nodes: self.nodes,
            samplers: self.samplers,
            scene: if self.scenes.is_empty() {
                None
            } else {
                Some(json::Index::new(0))
            },
            scenes: self.scenes,
            skins: self.skins,
            textures: self.textures,
        }
    }
}

fn primitive(accessors: &MeshAccessors) -> json::mesh::Primitive {
    use json::mesh::Semantic;

    let mut attributes = BTreeMap::new();
    attributes.insert(
        Valid(Semantic::Positions),
        accessors.positions.as_json_index(),
    );
    if let Some(normals) = accessors.normals {
        attributes.insert(Valid(Semantic::Normals), normals.as_json_index());
    }
    for (set, uvs) in accessors.uvs.iter().enumerate() {
        attributes.insert(Valid(Semantic::TexCoords(set as u32)), uvs.as_json_index());
    }
    if let Some(joints) = accessors.joints {
        attributes.insert(Valid(Semantic::Joints(0)), joints.as_json_index());
    }
    if let Some(weights) = accessors.weights {
        attributes.insert(Valid(Semantic::Weights(0)), weights.as_json_index());
    }

    json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: accessors.indices.map(|i| i.as_json_index()),
        material: accessors.material.map(json::Index::new),
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
    }
}
