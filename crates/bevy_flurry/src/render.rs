use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

/// One particle quad, laid out for direct upload to a GPU instance buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct QuadInstance {
    pub position: [f32; 2],
    pub size: [f32; 2],
    /// Linear RGBA.
    pub color: [f32; 4],
    /// Size of one sub-image in UV space.
    pub tiling: [f32; 2],
    /// Sub-image cell, in units of `tiling`.
    pub uv_offset: [f32; 2],
    /// Radians, counter-clockwise.
    pub rotation: f32,
    /// `1` when the quad samples a texture, `0` for a flat-colored quad.
    pub textured: u32,
}

impl QuadInstance {
    /// A flat-colored quad.
    pub fn flat(position: Vec2, size: Vec2, rotation: f32, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            size: size.to_array(),
            color: color.to_array(),
            tiling: Vec2::ONE.to_array(),
            uv_offset: Vec2::ZERO.to_array(),
            rotation,
            textured: 0,
        }
    }

    /// A quad sampling the sub-image at `uv_offset` of a texture split by `tiling`.
    pub fn textured(
        position: Vec2,
        size: Vec2,
        rotation: f32,
        color: Vec4,
        tiling: Vec2,
        uv_offset: Vec2,
    ) -> Self {
        Self {
            tiling: tiling.to_array(),
            uv_offset: uv_offset.to_array(),
            textured: 1,
            ..Self::flat(position, size, rotation, color)
        }
    }

    pub fn is_textured(&self) -> bool {
        self.textured != 0
    }
}

/// Receives the quads drawn by particle systems during a render pass.
pub trait QuadRenderer {
    /// Draws one quad. `texture` is `None` for flat-colored quads.
    fn draw_quad(&mut self, quad: QuadInstance, texture: Option<&Handle<Image>>);
}

/// A run of consecutive quads sharing one texture.
#[derive(Debug, Clone, Default)]
pub struct QuadDrawBatch {
    pub texture: Option<Handle<Image>>,
    pub instances: Vec<QuadInstance>,
}

/// The quads produced by the last render pass, grouped into draw batches.
///
/// Refilled every frame by [`render_particle_systems`](crate::spawning::render_particle_systems);
/// a render backend reads it after [`PostUpdate`].
#[derive(Resource, Debug, Default)]
pub struct QuadBatch {
    batches: Vec<QuadDrawBatch>,
}

impl QuadBatch {
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn batches(&self) -> &[QuadDrawBatch] {
        &self.batches
    }

    /// Total number of quads across all batches.
    pub fn len(&self) -> usize {
        self.batches.iter().map(|b| b.instances.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(|b| b.instances.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuadInstance> {
        self.batches.iter().flat_map(|b| b.instances.iter())
    }

    /// Raw bytes of one batch's instances.
    pub fn instance_bytes(batch: &QuadDrawBatch) -> &[u8] {
        bytemuck::cast_slice(&batch.instances)
    }
}

impl QuadRenderer for QuadBatch {
    fn draw_quad(&mut self, quad: QuadInstance, texture: Option<&Handle<Image>>) {
        match self.batches.last_mut() {
            Some(batch) if batch.texture.as_ref() == texture => batch.instances.push(quad),
            _ => self.batches.push(QuadDrawBatch {
                texture: texture.cloned(),
                instances: vec![quad],
            }),
        }
    }
}
