//! Animation channel construction

use crate::buffer::{AccessorIndex, BufferBuilder};
use gltf_json::animation::{Interpolation, Property};

/// Keyframe values of one channel
#[derive(Debug, Clone)]
pub enum ChannelValues {
    Translation(Vec<[f32; 3]>),
    /// Quaternions as [x, y, z, w]
    Rotation(Vec<[f32; 4]>),
    Scale(Vec<[f32; 3]>),
}

impl ChannelValues {
    fn property(&self) -> Property {
        match self {
            ChannelValues::Translation(_) => Property::Translation,
            ChannelValues::Rotation(_) => Property::Rotation,
            ChannelValues::Scale(_) => Property::Scale,
        }
    }
}

struct ChannelData {
    node: u32,
    interpolation: Interpolation,
    times: Vec<f32>,
    values: ChannelValues,
}

/// Packed sampler of one channel
#[derive(Debug, Clone)]
pub struct ChannelAccessors {
    pub node: u32,
    pub property: Property,
    pub interpolation: Interpolation,
    pub input: AccessorIndex,
    pub output: AccessorIndex,
}

/// Packed animation, one sampler per channel
#[derive(Debug, Clone)]
pub struct AnimationAccessors {
    pub channels: Vec<ChannelAccessors>,
}

/// Builder for an animation clip.
///
/// Every channel carries its own key times.
#[derive(Default)]
pub struct AnimationBuilder {
    channels: Vec<ChannelData>,
}

impl AnimationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel targeting `node`.
    ///
    /// For cubic splines `values` holds in-tangent, value and out-tangent
    /// for every key.
    pub fn channel(
        mut self,
        node: u32,
        interpolation: Interpolation,
        times: &[f32],
        values: ChannelValues,
    ) -> Self {
        self.channels.push(ChannelData {
            node,
            interpolation,
            times: times.to_vec(),
            values,
        });
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn build(self, buffer: &mut BufferBuilder) -> AnimationAccessors {
        let channels = self
            .channels
            .into_iter()
            .map(|channel| {
                let input = buffer.pack_scalars_with_bounds(&channel.times);
                let output = match &channel.values {
                    ChannelValues::Translation(v) | ChannelValues::Scale(v) => {
                        buffer.pack_vec3_output(v)
                    }
                    ChannelValues::Rotation(v) => buffer.pack_vec4_output(v),
                };
                ChannelAccessors {
                    node: channel.node,
                    property: channel.values.property(),
                    interpolation: channel.interpolation,
                    input,
                    output,
                }
            })
            .collect();

        AnimationAccessors { channels }
    }
}
