//! Binary buffer packing with automatic alignment and accessor creation

use crate::utils::{align_buffer, compute_bounds};
use gltf_json as json;
use gltf_json::accessor::{ComponentType, GenericComponentType, Type};
use gltf_json::buffer::Target;
use gltf_json::validation::Checked::Valid;

/// Accessor index returned by buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorIndex(pub u32);

impl AccessorIndex {
    pub fn as_json_index(&self) -> json::Index<json::Accessor> {
        json::Index::new(self.0)
    }
}

/// Buffer view index of raw (non-accessor) data such as embedded images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewIndex(pub u32);

impl ViewIndex {
    pub fn as_json_index(&self) -> json::Index<json::buffer::View> {
        json::Index::new(self.0)
    }
}

/// Layout of one accessor over a freshly packed view
struct AccessorLayout {
    count: usize,
    component: ComponentType,
    type_: Type,
    target: Option<Target>,
    bounds: Option<(Vec<f32>, Vec<f32>)>,
}

/// Single binary buffer plus the views and accessors that describe it.
///
/// Every block starts on a 4-byte boundary.
pub struct BufferBuilder {
    buffer: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            views: Vec::new(),
            accessors: Vec::new(),
        }
    }

    pub fn accessor_count(&self) -> u32 {
        self.accessors.len() as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn views(&self) -> &[json::buffer::View] {
        &self.views
    }

    pub fn accessors(&self) -> &[json::Accessor] {
        &self.accessors
    }

    fn push_view(&mut self, bytes: &[u8], target: Option<Target>) -> ViewIndex {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        align_buffer(&mut self.buffer);

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: bytes.len().into(),
            byte_offset: Some((offset as u64).into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: target.map(Valid),
        });
        ViewIndex(self.views.len() as u32 - 1)
    }

    fn push_accessor(&mut self, bytes: &[u8], layout: AccessorLayout) -> AccessorIndex {
        let view = self.push_view(bytes, layout.target);
        let to_json = |values: Vec<f32>| {
            json::Value::Array(values.into_iter().map(json::Value::from).collect())
        };
        let (min, max) = match layout.bounds {
            Some((min, max)) => (Some(to_json(min)), Some(to_json(max))),
            None => (None, None),
        };

        self.accessors.push(json::Accessor {
            buffer_view: Some(view.as_json_index()),
            byte_offset: Some(0u64.into()),
            count: layout.count.into(),
            component_type: Valid(GenericComponentType(layout.component)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(layout.type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });
        AccessorIndex(self.accessors.len() as u32 - 1)
    }

    /// Pack vertex positions; glTF requires their bounds
    pub fn pack_positions(&mut self, positions: &[[f32; 3]]) -> AccessorIndex {
        let (min, max) = compute_bounds(positions);
        self.push_accessor(
            bytemuck::cast_slice(positions),
            AccessorLayout {
                count: positions.len(),
                component: ComponentType::F32,
                type_: Type::Vec3,
                target: Some(Target::ArrayBuffer),
                bounds: Some((min.to_vec(), max.to_vec())),
            },
        )
    }

    /// Pack a vertex attribute of Vec2 (texture coordinates)
    pub fn pack_vec2(&mut self, data: &[[f32; 2]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(data),
            AccessorLayout {
                count: data.len(),
                component: ComponentType::F32,
                type_: Type::Vec2,
                target: Some(Target::ArrayBuffer),
                bounds: None,
            },
        )
    }

    /// Pack a vertex attribute of Vec3 (normals)
    pub fn pack_vec3(&mut self, data: &[[f32; 3]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(data),
            AccessorLayout {
                count: data.len(),
                component: ComponentType::F32,
                type_: Type::Vec3,
                target: Some(Target::ArrayBuffer),
                bounds: None,
            },
        )
    }

    /// Pack a vertex attribute of Vec4 (weights)
    pub fn pack_vec4(&mut self, data: &[[f32; 4]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(data),
            AccessorLayout {
                count: data.len(),
                component: ComponentType::F32,
                type_: Type::Vec4,
                target: Some(Target::ArrayBuffer),
                bounds: None,
            },
        )
    }

    /// Pack joint indices as unsigned shorts
    pub fn pack_joints(&mut self, joints: &[[u16; 4]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(joints),
            AccessorLayout {
                count: joints.len(),
                component: ComponentType::U16,
                type_: Type::Vec4,
                target: Some(Target::ArrayBuffer),
                bounds: None,
            },
        )
    }

    /// Pack triangle indices, as u16 when every index fits
    pub fn pack_indices(&mut self, indices: &[u32]) -> AccessorIndex {
        let layout = |component| AccessorLayout {
            count: indices.len(),
            component,
            type_: Type::Scalar,
            target: Some(Target::ElementArrayBuffer),
            bounds: None,
        };

        if indices.iter().all(|&i| i <= u32::from(u16::MAX)) {
            let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            self.push_accessor(bytemuck::cast_slice(&narrow), layout(ComponentType::U16))
        } else {
            self.push_accessor(bytemuck::cast_slice(indices), layout(ComponentType::U32))
        }
    }

    /// Pack column-major matrices (inverse bind matrices)
    pub fn pack_mat4(&mut self, matrices: &[[f32; 16]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(matrices),
            AccessorLayout {
                count: matrices.len(),
                component: ComponentType::F32,
                type_: Type::Mat4,
                target: None,
                bounds: None,
            },
        )
    }

    /// Pack keyframe times; glTF requires sampler inputs to carry bounds
    pub fn pack_scalars_with_bounds(&mut self, scalars: &[f32]) -> AccessorIndex {
        let min = scalars.iter().copied().fold(f32::INFINITY, f32::min);
        let max = scalars.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.push_accessor(
            bytemuck::cast_slice(scalars),
            AccessorLayout {
                count: scalars.len(),
                component: ComponentType::F32,
                type_: Type::Scalar,
                target: None,
                bounds: Some((vec![min], vec![max])),
            },
        )
    }

    /// Pack animation output values of four components (rotations)
    pub fn pack_vec4_output(&mut self, data: &[[f32; 4]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(data),
            AccessorLayout {
                count: data.len(),
                component: ComponentType::F32,
                type_: Type::Vec4,
                target: None,
                bounds: None,
            },
        )
    }

    /// Pack animation output values of three components (translations, scales)
    pub fn pack_vec3_output(&mut self, data: &[[f32; 3]]) -> AccessorIndex {
        self.push_accessor(
            bytemuck::cast_slice(data),
            AccessorLayout {
                count: data.len(),
                component: ComponentType::F32,
                type_: Type::Vec3,
                target: None,
                bounds: None,
            },
        )
    }

    /// Store encoded image bytes in a view of their own
    pub fn pack_image(&mut self, bytes: &[u8]) -> ViewIndex {
        self.push_view(bytes, None)
    }
}

impl Default for BufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}
