//! Plain-data scene graph exchanged with interchange formats.
//!
//! This mirrors the subset of a glTF document the converters need: a node
//! arena addressed by index, meshes, skins, materials and keyframed
//! animations. Nodes refer to each other by [`NodeId`]; nothing here points
//! back into converter state.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use hashbrown::HashSet;

/// Index of a node in [`Scene::nodes`]
pub type NodeId = usize;

/// Local translation, rotation and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

/// Primitive topology, as in glTF `mesh.primitive.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Primitive {
    pub topology: Topology,
    pub positions: Vec<Vec3>,
    /// Empty when the primitive has no normals
    pub normals: Vec<Vec3>,
    /// One array per texture coordinate set
    pub tex_coords: Vec<Vec<Vec2>>,
    /// One array per joint set (four influences each)
    pub joints: Vec<Vec<[u16; 4]>>,
    /// One array per weight set, parallel to `joints`
    pub weights: Vec<Vec<[f32; 4]>>,
    /// `None` for non-indexed geometry
    pub indices: Option<Vec<u32>>,
    pub material: Option<usize>,
}

impl Primitive {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Triangle list of any triangle topology, or `None` for points and lines.
    ///
    /// Strips and fans are unrolled with the winding rules of glTF.
    pub fn triangles(&self) -> Option<Vec<[u32; 3]>> {
        let indices: Vec<u32> = match &self.indices {
            Some(indices) => indices.clone(),
            None => (0..self.positions.len() as u32).collect(),
        };

        let triangles = match self.topology {
            Topology::Triangles => indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            Topology::TriangleStrip => (0..indices.len().saturating_sub(2))
                .map(|i| {
                    if i % 2 == 0 {
                        [indices[i], indices[i + 1], indices[i + 2]]
                    } else {
                        [indices[i], indices[i + 2], indices[i + 1]]
                    }
                })
                .collect(),
            Topology::TriangleFan => (1..indices.len().saturating_sub(1))
                .map(|i| [indices[i], indices[i + 1], indices[0]])
                .collect(),
            Topology::Points | Topology::Lines | Topology::LineLoop | Topology::LineStrip => {
                return None
            }
        };
        Some(triangles)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    /// Morph targets on any primitive, or default morph weights
    pub has_morph_targets: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub name: Option<String>,
    pub joints: Vec<NodeId>,
    /// Parallel to `joints`; empty means all identity
    pub inverse_bind_matrices: Vec<Mat4>,
    pub skeleton: Option<NodeId>,
}

impl Skin {
    pub fn inverse_bind_matrix(&self, joint: usize) -> Mat4 {
        self.inverse_bind_matrices
            .get(joint)
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// Base colour texture binding of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRef {
    /// Index into [`Scene::images`], when the image data is carried along
    pub image: Option<usize>,
    pub tex_coord: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: AlphaMode,
    pub base_color_texture: Option<TextureRef>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: Vec4::ONE,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_mode: AlphaMode::Opaque,
            base_color_texture: None,
        }
    }
}

/// An encoded image (PNG or JPEG bytes).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub name: Option<String>,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
    CubicSpline,
}

/// Values that can be keyframed.
pub trait Keyframe: Copy {
    fn lerp(a: Self, b: Self, s: f32) -> Self;

    /// Cubic Hermite segment between `v0` and `v1` with tangents scaled by `dt`.
    fn hermite(v0: Self, out_tangent: Self, in_tangent: Self, v1: Self, s: f32, dt: f32) -> Self;
}

fn hermite_weights(s: f32) -> [f32; 4] {
    let s2 = s * s;
    let s3 = s2 * s;
    [
        2.0 * s3 - 3.0 * s2 + 1.0,
        s3 - 2.0 * s2 + s,
        -2.0 * s3 + 3.0 * s2,
        s3 - s2,
    ]
}

impl Keyframe for Vec3 {
    fn lerp(a: Self, b: Self, s: f32) -> Self {
        a.lerp(b, s)
    }

    fn hermite(v0: Self, out_tangent: Self, in_tangent: Self, v1: Self, s: f32, dt: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(s);
        v0 * h00 + out_tangent * (h10 * dt) + v1 * h01 + in_tangent * (h11 * dt)
    }
}

impl Keyframe for Quat {
    fn lerp(a: Self, b: Self, s: f32) -> Self {
        a.slerp(b, s)
    }

    fn hermite(v0: Self, out_tangent: Self, in_tangent: Self, v1: Self, s: f32, dt: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(s);
        (v0 * h00 + out_tangent * (h10 * dt) + v1 * h01 + in_tangent * (h11 * dt)).normalize()
    }
}

/// A keyframed sampler.
///
/// For cubic splines `values` holds three entries per key: in-tangent,
/// value, out-tangent.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve<T> {
    pub interpolation: Interpolation,
    pub times: Vec<f32>,
    pub values: Vec<T>,
}

impl<T: Keyframe> Curve<T> {
    pub fn linear(times: Vec<f32>, values: Vec<T>) -> Self {
        Self {
            interpolation: Interpolation::Linear,
            times,
            values,
        }
    }

    /// The value stored at key `k`
    pub fn key_value(&self, k: usize) -> Option<T> {
        match self.interpolation {
            Interpolation::CubicSpline => self.values.get(k * 3 + 1).copied(),
            _ => self.values.get(k).copied(),
        }
    }

    fn tangents(&self, k: usize) -> Option<(T, T)> {
        Some((*self.values.get(k * 3)?, *self.values.get(k * 3 + 2)?))
    }

    /// Evaluate the curve at `time`, clamping outside the keyed range.
    ///
    /// Returns `None` for an empty curve or a non-finite `time`.
    pub fn sample(&self, time: f32) -> Option<T> {
        if !time.is_finite() {
            return None;
        }
        let last = self.times.len().checked_sub(1)?;
        if time <= self.times[0] {
            return self.key_value(0);
        }
        if time >= self.times[last] {
            return self.key_value(last);
        }

        // Last key at or before `time`
        let i = self.times.partition_point(|&t| t <= time) - 1;
        let (t0, t1) = (self.times[i], self.times[i + 1]);
        let v0 = self.key_value(i)?;
        if time == t0 {
            return Some(v0);
        }
        let v1 = self.key_value(i + 1)?;

        let dt = t1 - t0;
        let s = if dt > 0.0 { (time - t0) / dt } else { 0.0 };
        match self.interpolation {
            Interpolation::Step => Some(v0),
            Interpolation::Linear => Some(T::lerp(v0, v1, s)),
            Interpolation::CubicSpline => {
                let (_, out_tangent) = self.tangents(i)?;
                let (in_tangent, _) = self.tangents(i + 1)?;
                Some(T::hermite(v0, out_tangent, in_tangent, v1, s, dt))
            }
        }
    }
}

/// The animated property of a channel together with its sampler.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCurve {
    Translation(Curve<Vec3>),
    Rotation(Curve<Quat>),
    Scale(Curve<Vec3>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub node: NodeId,
    pub curve: ChannelCurve,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
}

impl Animation {
    fn channels_of(&self, node: NodeId) -> impl Iterator<Item = &ChannelCurve> {
        self.channels
            .iter()
            .filter(move |c| c.node == node)
            .map(|c| &c.curve)
    }

    pub fn translation(&self, node: NodeId) -> Option<&Curve<Vec3>> {
        self.channels_of(node).find_map(|c| match c {
            ChannelCurve::Translation(curve) => Some(curve),
            _ => None,
        })
    }

    pub fn rotation(&self, node: NodeId) -> Option<&Curve<Quat>> {
        self.channels_of(node).find_map(|c| match c {
            ChannelCurve::Rotation(curve) => Some(curve),
            _ => None,
        })
    }

    pub fn scale(&self, node: NodeId) -> Option<&Curve<Vec3>> {
        self.channels_of(node).find_map(|c| match c {
            ChannelCurve::Scale(curve) => Some(curve),
            _ => None,
        })
    }
}

/// A scene: the node arena, the nodes it displays, and the shared resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub name: Option<String>,
    pub nodes: Vec<Node>,
    /// Top-level nodes of the displayed scene
    pub roots: Vec<NodeId>,
    pub meshes: Vec<Mesh>,
    pub skins: Vec<Skin>,
    pub materials: Vec<Material>,
    pub images: Vec<Image>,
    pub animations: Vec<Animation>,
}

impl Scene {
    /// Append a node, linking it under `parent` or as a new root.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: Some(name.into()),
            parent,
            transform,
            ..Default::default()
        });
        match parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Display name of a node, falling back to `node<index>`
    pub fn node_name(&self, id: NodeId) -> String {
        self.nodes[id]
            .name
            .clone()
            .unwrap_or_else(|| format!("node{}", id))
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = self.nodes[id].transform.matrix();
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            matrix = self.nodes[parent].transform.matrix() * matrix;
            current = self.nodes[parent].parent;
        }
        matrix
    }

    /// Topmost ancestor of a node (the node itself if it has no parent)
    pub fn visual_root(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.nodes[id].parent {
            id = parent;
        }
        id
    }

    /// Pre-order walk of the subtree under `root`
    pub fn flatten(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        out
    }

    /// Pre-order walk of every displayed node
    pub fn flatten_all(&self) -> Vec<NodeId> {
        self.roots.iter().flat_map(|&r| self.flatten(r)).collect()
    }

    /// Nodes targeted by a channel of any animation
    pub fn animated_nodes(&self) -> HashSet<NodeId> {
        self.animations
            .iter()
            .flat_map(|a| a.channels.iter().map(|c| c.node))
            .collect()
    }
}
