//! Volumetric raymarch pipeline
//!
//! Renders the active volume tier as a translucent field inside its
//! world-space cuboid, composited over the mesh pass. The stepping loop
//! lives in shaders/volume_raymarch.wgsl; the pure math (slab test,
//! front-to-back compositing) is mirrored here and must be kept in sync
//! with the shader.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::core::camera::Camera;
use crate::volume::{TierData, VolumeField, VolumeTier};

/// User-facing raymarch controls.
///
/// `window_min`/`window_max` are mutually pinned: editing one past the
/// other drags the other along, so `window_min <= window_max` holds
/// after every single edit.
#[derive(Debug, Clone)]
pub struct RaymarchSettings {
    pub enabled: bool,
    opacity: f32,
    step_count: u32,
    window_min: f32,
    window_max: f32,
    value_range: [f32; 2],
}

impl RaymarchSettings {
    pub fn new(value_range: [f32; 2]) -> Self {
        Self {
            enabled: true,
            opacity: 0.35,
            step_count: 128,
            window_min: value_range[0],
            window_max: value_range[1],
            value_range,
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.01, 1.0);
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn set_step_count(&mut self, steps: u32) {
        self.step_count = steps.clamp(16, 512);
    }

    pub fn window(&self) -> (f32, f32) {
        (self.window_min, self.window_max)
    }

    pub fn set_window_min(&mut self, value: f32) {
        self.window_min = value;
        if self.window_max < value {
            self.window_max = value;
        }
    }

    pub fn set_window_max(&mut self, value: f32) {
        self.window_max = value;
        if self.window_min > value {
            self.window_min = value;
        }
    }

    /// Restore both window bounds to the field's published value range
    pub fn reset_window(&mut self) {
        self.window_min = self.value_range[0];
        self.window_max = self.value_range[1];
    }
}

/// Uniforms consumed by the raymarch shader
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct VolumeUniforms {
    inv_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    box_min: [f32; 4],
    box_max: [f32; 4],
    /// window_min, window_max, opacity, step_count
    window: [f32; 4],
    /// value range lo, hi, padding
    range: [f32; 4],
}

/// Fullscreen raymarch pass over the active 3D tier texture
pub struct VolumePipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    box_min: Vec3,
    box_max: Vec3,
    tier: Option<VolumeTier>,
}

impl VolumePipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        field: &VolumeField,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("volume_raymarch_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/volume_raymarch.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("volume_uniforms"),
            size: std::mem::size_of::<VolumeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("volume_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("volume_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("volume_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[], // fullscreen triangle
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let bounds = field.world_bounds();
        // Placeholder 1x1x1 texture keeps the bind group valid until the
        // first tier upload
        let placeholder = Self::create_texture(device, [1, 1, 1]);
        queue.write_texture(
            placeholder.as_image_copy(),
            &[0u8],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(1),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );
        let view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = Self::create_bind_group(
            device,
            &bind_group_layout,
            &uniform_buffer,
            &view,
            &sampler,
        );

        Self {
            pipeline,
            uniform_buffer,
            bind_group_layout,
            bind_group,
            sampler,
            box_min: bounds.min,
            box_max: bounds.max,
            tier: None,
        }
    }

    fn create_texture(device: &wgpu::Device, dims: [u32; 3]) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume_tier"),
            size: wgpu::Extent3d {
                width: dims[0],
                height: dims[1],
                depth_or_array_layers: dims[2],
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::Buffer,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("volume_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Upload a tier as the active 3D texture
    pub fn upload_tier(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        tier: VolumeTier,
        data: &TierData,
    ) {
        let texture = Self::create_texture(device, data.dims);
        queue.write_texture(
            texture.as_image_copy(),
            &data.voxels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(data.dims[0]),
                rows_per_image: Some(data.dims[1]),
            },
            wgpu::Extent3d {
                width: data.dims[0],
                height: data.dims[1],
                depth_or_array_layers: data.dims[2],
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.bind_group = Self::create_bind_group(
            device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &view,
            &self.sampler,
        );
        self.tier = Some(tier);
    }

    /// Tier currently uploaded, None before the first upload
    pub fn tier(&self) -> Option<VolumeTier> {
        self.tier
    }

    /// Push this frame's camera and window uniforms
    pub fn update_uniforms(
        &self,
        queue: &wgpu::Queue,
        camera: &Camera,
        settings: &RaymarchSettings,
        value_range: [f32; 2],
    ) {
        let (wmin, wmax) = settings.window();
        let uniforms = VolumeUniforms {
            inv_view_proj: camera.view_projection_inverse().to_cols_array_2d(),
            camera_pos: [camera.position.x, camera.position.y, camera.position.z, 1.0],
            box_min: [self.box_min.x, self.box_min.y, self.box_min.z, 0.0],
            box_max: [self.box_max.x, self.box_max.y, self.box_max.z, 0.0],
            window: [wmin, wmax, settings.opacity(), settings.step_count() as f32],
            range: [value_range[0], value_range[1], 0.0, 0.0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Composite the volume over the already-rendered scene
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        if self.tier.is_none() {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("volume_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

// ---------------------------------------------------------------------------
// CPU mirror of the shader stepping math
// ---------------------------------------------------------------------------

/// Slab intersection of a ray with an axis-aligned box.
///
/// Returns the entry/exit parameters along `dir`, entry clamped to 0.
/// None when the ray misses the box or the exit parameter is
/// non-positive (box entirely behind the ray origin).
pub fn slab_intersect(origin: Vec3, dir: Vec3, box_min: Vec3, box_max: Vec3) -> Option<(f32, f32)> {
    let inv = Vec3::ONE / dir;
    let t0 = (box_min - origin) * inv;
    let t1 = (box_max - origin) * inv;

    let t_near = t0.min(t1);
    let t_far = t0.max(t1);

    let entry = t_near.x.max(t_near.y).max(t_near.z);
    let exit = t_far.x.min(t_far.y).min(t_far.z);

    if exit <= entry.max(0.0) {
        return None;
    }
    Some((entry.max(0.0), exit))
}

/// One front-to-back compositing step:
/// `color += (1 - acc_alpha) * step_alpha * step_color` and
/// `alpha += (1 - acc_alpha) * step_alpha`.
pub fn composite(
    acc_color: [f32; 3],
    acc_alpha: f32,
    step_color: [f32; 3],
    step_alpha: f32,
) -> ([f32; 3], f32) {
    let weight = (1.0 - acc_alpha) * step_alpha;
    (
        [
            acc_color[0] + weight * step_color[0],
            acc_color[1] + weight * step_color[1],
            acc_color[2] + weight * step_color[2],
        ],
        acc_alpha + weight,
    )
}

/// Early-exit threshold for the compositing loop
pub const OPACITY_CUTOFF: f32 = 0.98;
