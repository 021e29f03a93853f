//! Binary chunk packing with aligned views and accessors

use gltf_json as json;
use gltf_json::accessor::{ComponentType, Type};
use gltf_json::buffer::Target;
use gltf_json::validation::Checked::Valid;

use super::utils::{align_buffer, compute_bounds};

/// Accessor index returned by pack operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorIndex(pub u32);

impl AccessorIndex {
    pub fn as_json_index(&self) -> json::Index<json::Accessor> {
        json::Index::new(self.0)
    }
}

/// Single binary buffer plus the views and accessors describing it
#[derive(Default)]
pub struct BufferBuilder {
    buffer: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self::default()
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

    /// Append raw bytes as a new view and return its index
    fn push_view(&mut self, bytes: &[u8], target: Option<Target>) -> json::Index<json::buffer::View> {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        align_buffer(&mut self.buffer, 0);

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
        json::Index::new(self.views.len() as u32 - 1)
    }

    fn push_accessor(
        &mut self,
        view: json::Index<json::buffer::View>,
        count: usize,
        component: ComponentType,
        type_: Type,
        bounds: Option<([f32; 3], [f32; 3])>,
    ) -> AccessorIndex {
        let to_value = |v: [f32; 3]| json::Value::Array(v.into_iter().map(json::Value::from).collect());
        let index = self.accessors.len() as u32;
        self.accessors.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(0u64.into()),
            count: count.into(),
            component_type: Valid(json::accessor::GenericComponentType(component)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min: bounds.map(|(min, _)| to_value(min)),
            max: bounds.map(|(_, max)| to_value(max)),
            name: None,
            normalized: false,
            sparse: None,
        });
        AccessorIndex(index)
    }

    /// Vec3 positions with the min/max bounds glTF requires
    ///
    /// Also used for morph target deltas, which need bounds too.
    pub fn pack_positions(&mut self, positions: &[[f32; 3]]) -> AccessorIndex {
        let view = self.push_view(bytemuck::cast_slice(positions), Some(Target::ArrayBuffer));
        let bounds = compute_bounds(positions);
        self.push_accessor(view, positions.len(), ComponentType::F32, Type::Vec3, bounds)
    }

    pub fn pack_vec3(&mut self, data: &[[f32; 3]]) -> AccessorIndex {
        let view = self.push_view(bytemuck::cast_slice(data), Some(Target::ArrayBuffer));
        self.push_accessor(view, data.len(), ComponentType::F32, Type::Vec3, None)
    }

    pub fn pack_vec2(&mut self, data: &[[f32; 2]]) -> AccessorIndex {
        let view = self.push_view(bytemuck::cast_slice(data), Some(Target::ArrayBuffer));
        self.push_accessor(view, data.len(), ComponentType::F32, Type::Vec2, None)
    }

    pub fn pack_vec4(&mut self, data: &[[f32; 4]]) -> AccessorIndex {
        let view = self.push_view(bytemuck::cast_slice(data), Some(Target::ArrayBuffer));
        self.push_accessor(view, data.len(), ComponentType::F32, Type::Vec4, None)
    }

    /// Joint indices as four u16 per vertex
    pub fn pack_joints(&mut self, joints: &[[u16; 4]]) -> AccessorIndex {
        let bytes: Vec<u8> = joints
            .iter()
            .flatten()
            .flat_map(|j| j.to_le_bytes())
            .collect();
        let view = self.push_view(&bytes, Some(Target::ArrayBuffer));
        self.push_accessor(view, joints.len(), ComponentType::U16, Type::Vec4, None)
    }

    pub fn pack_indices(&mut self, indices: &[u32]) -> AccessorIndex {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(Target::ElementArrayBuffer));
        self.push_accessor(view, indices.len(), ComponentType::U32, Type::Scalar, None)
    }

    /// Column-major 4x4 matrices
    pub fn pack_mat4(&mut self, matrices: &[[f32; 16]]) -> AccessorIndex {
        let view = self.push_view(bytemuck::cast_slice(matrices), None);
        self.push_accessor(view, matrices.len(), ComponentType::F32, Type::Mat4, None)
    }

    /// Encoded image bytes; images are referenced by view, not accessor
    pub fn pack_image(&mut self, bytes: &[u8]) -> json::Index<json::buffer::View> {
        self.push_view(bytes, None)
    }
}
