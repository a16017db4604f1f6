//! Scene graph -> BH3 model + BHA animation.
//!
//! The game has no scale, no multi-bone skinning and no skin separate from
//! the mesh, so all three are baked: ancestor scale into bone translations
//! and vertex positions, inverse bind matrices into the vertices, and each
//! vertex is assigned wholesale to the single joint that influences it.

use glam::{Mat4, Quat, Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use tracing::{debug, info};

use crate::basis::{flip_winding, scene_to_game};
use crate::error::{Error, Result};
use crate::formats::bh3::{Bh3File, Bone, MeshGeometry};
use crate::formats::bha::{BhaFile, BoneKey, BoneTrack};
use crate::sanitize;
use crate::scene::{Animation, Mesh, NodeId, Scene, Skin};

/// Name of the bone inserted above multiple top-level bones
pub const SYNTHETIC_ROOT: &str = "gltfRoot";

/// Tolerance when deciding whether a world transform is the identity
const IDENTITY_EPSILON: f32 = 1e-6;

/// What to convert and how.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub convert_mesh: bool,
    pub convert_animation: bool,
    /// Run [`sanitize::patch`] after pruning
    pub patch_animation: bool,
    /// Index into [`Scene::animations`]; out of range selects the first
    pub animation: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            convert_mesh: true,
            convert_animation: true,
            patch_animation: true,
            animation: 0,
        }
    }
}

/// Output of [`import_scene`].
#[derive(Debug, Clone)]
pub struct Imported {
    pub model: Bh3File,
    /// Present when animation conversion was requested and the scene has one
    pub animation: Option<BhaFile>,
}

/// Convert a skinned scene into a model and (optionally) an animation.
pub fn import_scene(scene: &Scene, options: &ImportOptions) -> Result<Imported> {
    let mesh_nodes: Vec<NodeId> = scene
        .flatten_all()
        .into_iter()
        .filter(|&id| scene.nodes[id].mesh.is_some() && scene.nodes[id].skin.is_some())
        .collect();
    if mesh_nodes.is_empty() {
        return Err(Error::unsupported("scene", "no skinned meshes were found"));
    }

    let joints = collect_joints(scene, &mesh_nodes)?;
    let (bone_nodes, skipped) = select_bone_nodes(scene, &joints);
    let mut skeleton = Skeleton::build(scene, &bone_nodes, &skipped)?;

    let geometry = if options.convert_mesh {
        bake_meshes(scene, &mesh_nodes, &mut skeleton)?
    } else {
        MeshGeometry::default()
    };

    let animation = if options.convert_animation {
        select_animation(scene, options.animation)
    } else {
        None
    };
    if let Some(animation) = animation {
        bake_animation(scene, animation, &mut skeleton);
    }

    let (root_bone, root_track) = skeleton.assemble();

    let animation = animation.map(|_| {
        let mut bha = BhaFile { root_track };
        sanitize::prune(&mut bha);
        if options.patch_animation {
            sanitize::patch(&mut bha);
        }
        bha
    });

    let model = Bh3File {
        geometry,
        root_bone,
    };
    info!(
        "Imported {} bones, {} vertices, {} triangles{}",
        model.bone_count(),
        model.geometry.vertex_count(),
        model.geometry.triangle_count(),
        match &animation {
            Some(bha) => format!(", {} tracks over {:.3}s", bha.track_count(), bha.duration()),
            None => String::new(),
        }
    );

    Ok(Imported { model, animation })
}

fn select_animation(scene: &Scene, index: usize) -> Option<&Animation> {
    scene
        .animations
        .get(index)
        .or_else(|| scene.animations.first())
}

fn node_label(scene: &Scene, id: NodeId) -> String {
    format!("node {:?}", scene.node_name(id))
}

fn mesh_label(scene: &Scene, mesh: &Mesh, node: NodeId) -> String {
    match &mesh.name {
        Some(name) => format!("mesh {:?}", name),
        None => format!("mesh of {}", node_label(scene, node)),
    }
}

fn lookup_skin(scene: &Scene, id: NodeId) -> Result<&Skin> {
    scene.nodes[id]
        .skin
        .and_then(|s| scene.skins.get(s))
        .ok_or_else(|| Error::unsupported(node_label(scene, id), "references a missing skin"))
}

/// Every skin joint and skeleton root used by the skinned meshes, first-seen order.
fn collect_joints(scene: &Scene, mesh_nodes: &[NodeId]) -> Result<Vec<NodeId>> {
    let mut seen = HashSet::new();
    let mut joints = Vec::new();
    for &id in mesh_nodes {
        let skin = lookup_skin(scene, id)?;
        for &joint in skin.joints.iter().chain(skin.skeleton.iter()) {
            if joint >= scene.nodes.len() {
                return Err(Error::unsupported(
                    format!("skin of {}", node_label(scene, id)),
                    format!("joint {} does not exist", joint),
                ));
            }
            if seen.insert(joint) {
                joints.push(joint);
            }
        }
    }
    Ok(joints)
}

/// Pick the nodes that become bones, in pre-order.
///
/// Starting from the top of each joint hierarchy, a node whose parent was
/// dropped (or that has no parent) is dropped too unless it is a joint, or it
/// has children and either a non-identity world transform or an animation
/// channel in any animation. Everything under a kept node is kept.
fn select_bone_nodes(scene: &Scene, joints: &[NodeId]) -> (Vec<NodeId>, HashSet<NodeId>) {
    let joint_set: HashSet<NodeId> = joints.iter().copied().collect();
    let animated = scene.animated_nodes();

    let mut roots = Vec::new();
    for &joint in joints {
        let root = scene.visual_root(joint);
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    let mut kept = Vec::new();
    let mut skipped = HashSet::new();
    for root in roots {
        for id in scene.flatten(root) {
            let node = &scene.nodes[id];
            if node.parent.is_some_and(|p| !skipped.contains(&p)) {
                kept.push(id);
                continue;
            }

            let structural = !node.children.is_empty()
                && (!scene
                    .world_matrix(id)
                    .abs_diff_eq(Mat4::IDENTITY, IDENTITY_EPSILON)
                    || animated.contains(&id));
            if joint_set.contains(&id) || structural {
                kept.push(id);
            } else {
                debug!("Dropping scaffolding {}", node_label(scene, id));
                skipped.insert(id);
            }
        }
    }

    (kept, skipped)
}

/// Converter-owned state of one bone while the trees are being built.
struct Draft {
    /// `None` for the synthetic root
    node: Option<NodeId>,
    bone: Bone,
    keys: Vec<BoneKey>,
    children: Vec<usize>,
    /// Product of ancestor scales baked into this bone
    scale: Vec3,
    /// Vertices owned by this bone, in baked order
    vertices: Vec<usize>,
}

impl Draft {
    fn new(node: Option<NodeId>, bone: Bone, scale: Vec3) -> Self {
        Self {
            node,
            bone,
            keys: Vec::new(),
            children: Vec::new(),
            scale,
            vertices: Vec::new(),
        }
    }
}

/// Bone arena in pre-order plus the scene node -> arena index map.
///
/// Entry 0 is always the synthetic root.
struct Skeleton {
    drafts: Vec<Draft>,
    by_node: HashMap<NodeId, usize>,
}

impl Skeleton {
    fn build(scene: &Scene, bone_nodes: &[NodeId], skipped: &HashSet<NodeId>) -> Result<Self> {
        let mut drafts = vec![Draft::new(None, Bone::new(SYNTHETIC_ROOT), Vec3::ONE)];
        let mut by_node: HashMap<NodeId, usize> = HashMap::new();

        for &id in bone_nodes {
            let node = &scene.nodes[id];
            let local = node.transform;
            let mut bone = Bone::new(scene.node_name(id));

            let (parent_index, scale) = match node.parent.filter(|p| !skipped.contains(p)) {
                None => {
                    bone.translation = scene_to_game() * local.translation;
                    bone.rotation = (scene_to_game() * local.rotation).inverse();
                    (0, Vec3::ONE)
                }
                Some(parent) => {
                    let parent_index = *by_node.get(&parent).ok_or_else(|| {
                        Error::unsupported(node_label(scene, id), "parent node was not converted")
                    })?;
                    let scale: Vec3 = drafts[parent_index].scale * scene.nodes[parent].transform.scale;
                    bone.translation = local.translation * scale;
                    bone.rotation = local.rotation.inverse();
                    (parent_index, scale)
                }
            };

            let index = drafts.len();
            drafts[parent_index].children.push(index);
            drafts.push(Draft::new(Some(id), bone, scale));
            by_node.insert(id, index);
        }

        Ok(Self { drafts, by_node })
    }

    fn draft_of(&self, scene: &Scene, id: NodeId) -> Result<usize> {
        self.by_node
            .get(&id)
            .copied()
            .ok_or_else(|| Error::unsupported(node_label(scene, id), "joint was not converted to a bone"))
    }

    /// Product of the (animated, else rest) scales of converted ancestors at `time`.
    fn animated_scale(&self, scene: &Scene, animation: &Animation, id: NodeId, time: f32) -> Vec3 {
        let mut scale = Vec3::ONE;
        let mut parent = scene.nodes[id].parent;
        while let Some(p) = parent.filter(|p| self.by_node.contains_key(p)) {
            scale *= animation
                .scale(p)
                .and_then(|curve| curve.sample(time))
                .unwrap_or(scene.nodes[p].transform.scale);
            parent = scene.nodes[p].parent;
        }
        scale
    }

    /// Turn the arena into owned trees, dropping a synthetic root with one child.
    fn assemble(mut self) -> (Bone, BoneTrack) {
        let (mut bone, mut track) = assemble_draft(&mut self.drafts, 0);
        if bone.children.len() == 1 {
            if let (Some(child_bone), Some(child_track)) = (bone.children.pop(), track.children.pop()) {
                bone = child_bone;
                track = child_track;
            }
        }
        (bone, track)
    }
}

fn assemble_draft(drafts: &mut [Draft], index: usize) -> (Bone, BoneTrack) {
    let children = std::mem::take(&mut drafts[index].children);
    let mut bone = std::mem::replace(&mut drafts[index].bone, Bone::new(String::new()));
    let mut track = BoneTrack {
        keys: std::mem::take(&mut drafts[index].keys),
        children: Vec::new(),
    };

    for child in children {
        let (child_bone, child_track) = assemble_draft(drafts, child);
        bone.children.push(child_bone);
        track.children.push(child_track);
    }
    (bone, track)
}

/// Per-joint bake matrices of one skin.
struct JointBake {
    draft: usize,
    matrix: Mat4,
    normal_matrix: Mat4,
}

fn bake_meshes(scene: &Scene, mesh_nodes: &[NodeId], skeleton: &mut Skeleton) -> Result<MeshGeometry> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices: Vec<u16> = Vec::new();
    let mut owners: Vec<usize> = Vec::new();
    let mut shared_material: Option<usize> = None;

    for &id in mesh_nodes {
        let mesh = scene.nodes[id]
            .mesh
            .and_then(|m| scene.meshes.get(m))
            .ok_or_else(|| Error::unsupported(node_label(scene, id), "references a missing mesh"))?;
        let skin = lookup_skin(scene, id)?;
        let label = mesh_label(scene, mesh, id);

        if mesh.primitives.iter().any(|p| p.joints.is_empty()) {
            return Err(Error::unsupported(label, "all primitives must be skinned"));
        }
        if mesh.has_morph_targets {
            return Err(Error::unsupported(label, "vertex morphs are not supported"));
        }

        for primitive in &mesh.primitives {
            let material = primitive
                .material
                .ok_or_else(|| Error::unsupported(&label, "every primitive must have a material"))?;
            match shared_material {
                None => shared_material = Some(material),
                Some(shared) if shared != material => {
                    return Err(Error::unsupported(label, "all meshes must use the same material"));
                }
                Some(_) => {}
            }
        }
        let tex_coord_set = shared_material
            .and_then(|m| scene.materials.get(m))
            .and_then(|m| m.base_color_texture)
            .map_or(0, |t| t.tex_coord as usize);

        let mut bakes = Vec::with_capacity(skin.joints.len());
        for (j, &joint) in skin.joints.iter().enumerate() {
            let draft = skeleton.draft_of(scene, joint)?;
            let matrix = Mat4::from_scale(skeleton.drafts[draft].scale) * skin.inverse_bind_matrix(j);
            if matrix.determinant() == 0.0 {
                return Err(Error::unsupported(
                    node_label(scene, joint),
                    "inverse bind matrix could not be inverted",
                ));
            }
            bakes.push(JointBake {
                draft,
                matrix,
                normal_matrix: matrix.inverse().transpose(),
            });
        }

        for (pi, primitive) in mesh.primitives.iter().enumerate() {
            let triangles = primitive.triangles().ok_or_else(|| {
                Error::unsupported(&label, format!("primitive {} is not made of triangles", pi))
            })?;
            if triangles.is_empty() {
                continue;
            }

            let vertex_count = primitive.vertex_count();
            if vertex_count < 3 {
                return Err(Error::unsupported(&label, "must have at least 3 positions"));
            }
            let uvs = primitive.tex_coords.get(tex_coord_set).ok_or_else(|| {
                Error::unsupported(&label, format!("must have tex coord set {}", tex_coord_set))
            })?;
            if primitive.joints.len() > 1 || primitive.weights.len() > 1 {
                return Err(Error::unsupported(
                    &label,
                    "more than one set of joints/weights is not supported",
                ));
            }
            let (Some(joint_set), Some(weight_set)) = (primitive.joints.first(), primitive.weights.first())
            else {
                return Err(Error::unsupported(&label, "must have a set of joints and weights"));
            };

            let base = positions.len();
            for i in 0..vertex_count {
                let vertex = base + i;
                if vertex > usize::from(u16::MAX) {
                    return Err(Error::unsupported(
                        "scene",
                        format!("the number of vertices must not exceed {}", u16::MAX),
                    ));
                }

                let influences = joint_set.get(i).zip(weight_set.get(i)).ok_or_else(|| {
                    Error::unsupported(&label, format!("vertex {} has no joints/weights", i))
                })?;
                let (joint, weight) = single_influence(*influences.0, *influences.1)
                    .map_err(|reason| Error::unsupported(&label, format!("vertex {} {}", i, reason)))?;
                let bake = bakes.get(usize::from(joint)).ok_or_else(|| {
                    Error::unsupported(&label, format!("vertex {} references missing joint {}", i, joint))
                })?;

                let position = bake.matrix.transform_point3(primitive.positions[i]) * weight;
                let normal = primitive.normals.get(i).copied().unwrap_or(Vec3::ZERO);
                let normal = (bake.normal_matrix.transform_vector3(normal) * weight).normalize_or_zero();

                positions.push(position.extend(1.0));
                normals.push(normal);
                tex_coords.push(uvs.get(i).copied().unwrap_or(Vec2::ZERO));
                owners.push(bake.draft);
            }

            for triangle in triangles {
                for corner in flip_winding(triangle) {
                    let corner = corner as usize;
                    if corner >= vertex_count {
                        return Err(Error::unsupported(
                            &label,
                            format!("index {} is out of range for {} vertices", corner, vertex_count),
                        ));
                    }
                    // Bounded by the vertex count check above
                    indices.push((base + corner) as u16);
                }
            }
        }
    }

    for (vertex, &owner) in owners.iter().enumerate() {
        skeleton.drafts[owner].vertices.push(vertex);
    }

    // Regroup vertices so each bone owns a contiguous range, in bone order
    let mut geometry = MeshGeometry::default();
    let mut remap = vec![0u16; positions.len()];
    for draft in &mut skeleton.drafts {
        draft.bone.vertex_start = geometry.positions.len() as i32;
        draft.bone.vertex_count = draft.vertices.len() as i32;
        for &vertex in &draft.vertices {
            remap[vertex] = geometry.positions.len() as u16;
            geometry.positions.push(positions[vertex]);
            geometry.normals.push(normals[vertex]);
            geometry.tex_coords.push(tex_coords[vertex]);
        }
    }
    geometry.normal_padding = vec![0; geometry.normals.len()];
    geometry.indices = indices.iter().map(|&i| remap[usize::from(i)]).collect();

    Ok(geometry)
}

/// The one joint a vertex is bound to, with its normalized weight.
fn single_influence(joints: [u16; 4], weights: [f32; 4]) -> std::result::Result<(u16, f32), &'static str> {
    let total: f32 = weights.iter().sum();
    if total <= 0.0 {
        return Err("is not bound to any joint");
    }

    let mut influence = None;
    for (&joint, &weight) in joints.iter().zip(&weights) {
        let weight = weight / total;
        if weight <= 0.0 {
            continue;
        }
        if influence.is_some() {
            return Err("must only be affected by a single bone");
        }
        influence = Some((joint, weight));
    }
    influence.ok_or("is not bound to any joint")
}

fn bake_animation(scene: &Scene, animation: &Animation, skeleton: &mut Skeleton) {
    for index in 1..skeleton.drafts.len() {
        let Some(id) = skeleton.drafts[index].node else {
            continue;
        };
        let node = &scene.nodes[id];

        let translation = animation.translation(id);
        let rotation = animation.rotation(id);
        let scale = animation.scale(id);

        let mut times: Vec<f32> = [
            translation.map(|c| c.times.as_slice()),
            rotation.map(|c| c.times.as_slice()),
            scale.map(|c| c.times.as_slice()),
        ]
        .into_iter()
        .flatten()
        .flatten()
        .copied()
        .collect();
        times.sort_by(f32::total_cmp);
        times.dedup();

        let base_position = node.transform.translation * skeleton.drafts[index].scale;
        let base_rotation_inv = node.transform.rotation.inverse();

        let mut previous = 0.0;
        let keys: Vec<BoneKey> = times
            .into_iter()
            .map(|time| {
                let delta = time - previous;
                previous = time;

                let translation = translation
                    .and_then(|curve| curve.sample(time))
                    .map_or(Vec3::ZERO, |t| {
                        let scale = skeleton.animated_scale(scene, animation, id, time);
                        base_rotation_inv * (t * scale - base_position)
                    });
                let rotation = rotation
                    .and_then(|curve| curve.sample(time))
                    .map_or(Quat::IDENTITY, |r| (base_rotation_inv * r).inverse());

                BoneKey {
                    time: delta,
                    rotation,
                    translation,
                }
            })
            .collect();

        if !keys.is_empty() {
            debug!("Baked {} keys for {}", keys.len(), node_label(scene, id));
        }
        skeleton.drafts[index].keys = keys;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ChannelCurve, Channel, Curve, Material, Primitive, TextureRef, Transform};
    use crate::tree::TreeNode;
    use glam::Vec4;

    /// Armature(identity) -> Hips(joint) -> Spine(joint); Body mesh at top level.
    ///
    /// Four vertices: 0 and 2 bound to Spine, 1 and 3 to Hips.
    fn skinned_scene() -> Scene {
        let mut scene = Scene::default();
        let armature = scene.add_node("Armature", Transform::IDENTITY, None);
        let hips = scene.add_node(
            "Hips",
            Transform::from_translation_rotation(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY),
            Some(armature),
        );
        let spine = scene.add_node(
            "Spine",
            Transform::from_translation_rotation(Vec3::new(0.0, 0.5, 0.0), Quat::from_rotation_y(0.5)),
            Some(hips),
        );
        let body = scene.add_node("Body", Transform::IDENTITY, None);

        scene.materials.push(Material {
            base_color_texture: Some(TextureRef {
                image: None,
                tex_coord: 0,
            }),
            ..Default::default()
        });
        scene.meshes.push(Mesh {
            name: Some("Body".into()),
            primitives: vec![Primitive {
                positions: vec![
                    Vec3::new(0.0, 1.5, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                    Vec3::new(1.0, 1.5, 0.0),
                    Vec3::new(1.0, 1.0, 0.0),
                ],
                normals: vec![Vec3::Z; 4],
                tex_coords: vec![vec![Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE]],
                joints: vec![vec![[1, 0, 0, 0], [0, 0, 0, 0], [1, 0, 0, 0], [1, 0, 0, 0]]],
                weights: vec![vec![
                    [1.0, 0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0, 0.0],
                    [0.0, 2.0, 0.0, 0.0],
                ]],
                indices: Some(vec![0, 1, 2, 1, 3, 2]),
                material: Some(0),
                ..Default::default()
            }],
            has_morph_targets: false,
        });
        scene.skins.push(Skin {
            name: None,
            joints: vec![hips, spine],
            inverse_bind_matrices: vec![
                scene.world_matrix(hips).inverse(),
                scene.world_matrix(spine).inverse(),
            ],
            skeleton: None,
        });
        scene.nodes[body].mesh = Some(0);
        scene.nodes[body].skin = Some(0);
        scene
    }

    fn import(scene: &Scene) -> Imported {
        import_scene(scene, &ImportOptions::default()).unwrap()
    }

    #[test]
    fn test_identity_scaffolding_is_dropped() {
        let imported = import(&skinned_scene());
        let root = &imported.model.root_bone;
        assert_eq!(root.name, "Hips");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "Spine");
    }

    #[test]
    fn test_root_bone_changes_basis() {
        let imported = import(&skinned_scene());
        let root = &imported.model.root_bone;

        // glTF Y-up becomes game Z-up
        assert!((root.translation - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-6);
        let expected = (scene_to_game() * Quat::IDENTITY).inverse();
        assert!(root.rotation.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_child_bone_rotation_is_inverted() {
        let imported = import(&skinned_scene());
        let spine = &imported.model.root_bone.children[0];
        assert!(spine
            .rotation
            .abs_diff_eq(Quat::from_rotation_y(0.5).inverse(), 1e-6));
        assert!((spine.translation - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_vertices_grouped_by_bone() {
        let imported = import(&skinned_scene());
        let model = &imported.model;
        let hips = &model.root_bone;
        let spine = &hips.children[0];

        assert_eq!((hips.vertex_start, hips.vertex_count), (0, 2));
        assert_eq!((spine.vertex_start, spine.vertex_count), (2, 2));

        // Hips owns scene vertices 1 and 3, baked into hip space
        assert!((model.geometry.positions[0] - Vec4::new(0.0, 0.0, 0.0, 1.0)).length() < 1e-6);
        assert!((model.geometry.positions[1] - Vec4::new(1.0, 0.0, 0.0, 1.0)).length() < 1e-6);
        assert_eq!(model.geometry.tex_coords[0], Vec2::X);
        assert_eq!(model.geometry.normal_padding, vec![0; 4]);

        // Scene triangle (0, 1, 2) -> flipped (0, 2, 1) -> remapped
        assert_eq!(&model.geometry.indices[..3], &[2, 3, 0]);
        assert_eq!(model.geometry.indices.len(), 6);
    }

    #[test]
    fn test_multi_influence_vertex_is_rejected() {
        let mut scene = skinned_scene();
        scene.meshes[0].primitives[0].weights[0][0] = [0.5, 0.5, 0.0, 0.0];

        let err = import_scene(&scene, &ImportOptions::default()).unwrap_err();
        match err {
            Error::UnsupportedData { entity, reason } => {
                assert_eq!(entity, "mesh \"Body\"");
                assert!(reason.contains("single bone"), "{}", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    fn unsupported_reason(scene: &Scene) -> String {
        match import_scene(scene, &ImportOptions::default()) {
            Err(Error::UnsupportedData { reason, .. }) => reason,
            other => panic!("expected unsupported data, got {:?}", other.map(|_| ())),
        }
    }

    /// Replace the mesh with `count` vertices all bound to the hips.
    fn with_vertex_count(mut scene: Scene, count: usize) -> Scene {
        let primitive = &mut scene.meshes[0].primitives[0];
        primitive.positions = vec![Vec3::new(0.0, 1.0, 0.0); count];
        primitive.normals = vec![Vec3::Z; count];
        primitive.tex_coords = vec![vec![Vec2::ZERO; count]];
        primitive.joints = vec![vec![[0, 0, 0, 0]; count]];
        primitive.weights = vec![vec![[1.0, 0.0, 0.0, 0.0]; count]];
        primitive.indices = Some(vec![0, 1, 2]);
        scene
    }

    #[test]
    fn test_vertex_limit_is_inclusive() {
        let imported = import(&with_vertex_count(skinned_scene(), 65536));
        assert_eq!(imported.model.geometry.vertex_count(), 65536);
        assert_eq!(imported.model.root_bone.vertex_count, 65536);

        let reason = unsupported_reason(&with_vertex_count(skinned_scene(), 65537));
        assert!(reason.contains("must not exceed"), "{}", reason);
    }

    #[test]
    fn test_singular_inverse_bind_matrix_is_rejected() {
        let mut scene = skinned_scene();
        scene.skins[0].inverse_bind_matrices[0] = Mat4::ZERO;
        let reason = unsupported_reason(&scene);
        assert!(reason.contains("could not be inverted"), "{}", reason);
    }

    #[test]
    fn test_missing_joint_or_weight_sets_are_rejected() {
        let mut scene = skinned_scene();
        scene.meshes[0].primitives[0].joints.clear();
        let reason = unsupported_reason(&scene);
        assert!(reason.contains("must be skinned"), "{}", reason);

        let mut scene = skinned_scene();
        scene.meshes[0].primitives[0].weights.clear();
        let reason = unsupported_reason(&scene);
        assert!(reason.contains("set of joints and weights"), "{}", reason);

        let mut scene = skinned_scene();
        scene.meshes[0].primitives[0].weights[0].truncate(3);
        let reason = unsupported_reason(&scene);
        assert!(reason.contains("has no joints/weights"), "{}", reason);
    }

    #[test]
    fn test_scene_without_skinned_mesh_is_rejected() {
        let mut scene = skinned_scene();
        scene.nodes[3].skin = None;
        assert!(matches!(
            import_scene(&scene, &ImportOptions::default()),
            Err(Error::UnsupportedData { .. })
        ));
    }

    #[test]
    fn test_mixed_materials_are_rejected() {
        let mut scene = skinned_scene();
        scene.materials.push(Material::default());
        let mut second = scene.meshes[0].primitives[0].clone();
        second.material = Some(1);
        scene.meshes[0].primitives.push(second);

        let err = import_scene(&scene, &ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("same material"), "{}", err);
    }

    #[test]
    fn test_line_primitive_is_rejected() {
        let mut scene = skinned_scene();
        scene.meshes[0].primitives[0].topology = crate::scene::Topology::Lines;
        let err = import_scene(&scene, &ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("triangles"), "{}", err);
    }

    #[test]
    fn test_parent_scale_is_baked() {
        let mut scene = skinned_scene();
        // Hips scaled x2: Spine's offset doubles
        scene.nodes[1].transform.scale = Vec3::splat(2.0);
        scene.skins[0].inverse_bind_matrices = vec![Mat4::IDENTITY, Mat4::IDENTITY];

        let imported = import(&scene);
        let spine = &imported.model.root_bone.children[0];
        assert!((spine.translation - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);

        // Spine vertices are scaled by the accumulated x2
        let first = spine.vertex_start as usize;
        let p = imported.model.geometry.positions[first];
        assert!((p - Vec4::new(0.0, 3.0, 0.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_multiple_roots_keep_synthetic_root() {
        let mut scene = skinned_scene();
        let extra = scene.add_node(
            "Prop",
            Transform::from_translation_rotation(Vec3::X, Quat::IDENTITY),
            None,
        );
        scene.skins[0].joints.push(extra);
        scene.skins[0].inverse_bind_matrices.push(Mat4::IDENTITY);

        let imported = import(&scene);
        let root = &imported.model.root_bone;
        assert_eq!(root.name, SYNTHETIC_ROOT);
        let names: Vec<_> = root.children.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Hips", "Prop"]);
        assert_eq!(imported.animation, None);
    }

    #[test]
    fn test_animation_bake_and_sanitize() {
        let mut scene = skinned_scene();
        let spine = 2;
        scene.animations.push(Animation {
            name: Some("Wave".into()),
            channels: vec![
                Channel {
                    node: spine,
                    curve: ChannelCurve::Rotation(Curve::linear(
                        vec![0.0, 0.5, 1.0],
                        vec![
                            Quat::from_rotation_y(0.5),
                            Quat::from_rotation_y(1.0),
                            Quat::from_rotation_y(0.5),
                        ],
                    )),
                },
                Channel {
                    node: spine,
                    curve: ChannelCurve::Translation(Curve::linear(
                        vec![0.5],
                        vec![Vec3::new(0.0, 0.75, 0.0)],
                    )),
                },
            ],
        });

        let options = ImportOptions {
            patch_animation: false,
            ..Default::default()
        };
        let imported = import_scene(&scene, &options).unwrap();
        let bha = imported.animation.unwrap();

        let hips = &bha.root_track;
        assert_eq!(hips.keys.len(), 1, "unanimated root gets a placeholder");
        let spine_track = &hips.children[0];
        let times: Vec<f32> = spine_track.keys.iter().map(|k| k.time).collect();
        assert_eq!(times, [0.0, 0.5, 0.5]);

        // Rest rotation at t=0 cancels out
        assert!(spine_track.keys[0].rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
        let expected = (Quat::from_rotation_y(-0.5) * Quat::from_rotation_y(1.0)).inverse();
        assert!(spine_track.keys[1].rotation.abs_diff_eq(expected, 1e-5));

        // Translation expressed relative to rest position in the rest frame
        let expected = Quat::from_rotation_y(-0.5) * Vec3::new(0.0, 0.25, 0.0);
        assert!((spine_track.keys[1].translation - expected).length() < 1e-6);
        assert_eq!(spine_track.node_count(), 1);
    }

    #[test]
    fn test_animation_patched_by_default() {
        let mut scene = skinned_scene();
        scene.animations.push(Animation {
            name: None,
            channels: vec![Channel {
                node: 2,
                curve: ChannelCurve::Translation(Curve::linear(
                    vec![0.0, 1.0],
                    vec![Vec3::ZERO, Vec3::Y],
                )),
            }],
        });

        let imported = import(&scene);
        let bha = imported.animation.unwrap();
        assert!(bha.root_track.keys.len() >= 2);
        for track in bha.root_track.pre_order() {
            assert!((track.duration() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mesh_conversion_can_be_skipped() {
        let options = ImportOptions {
            convert_mesh: false,
            ..Default::default()
        };
        let imported = import_scene(&skinned_scene(), &options).unwrap();
        assert!(imported.model.geometry.positions.is_empty());
        assert_eq!(imported.model.bone_count(), 2);
    }
}
