// Renderer module: wgpu forward pass for the scene plus the GUI overlay

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec3};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::{Error, Result};
use crate::export;
use crate::geometry::{MeshData, Vertex};
use crate::material::{Material, MaterialCache};
use crate::scene::{LightKind, NodeId, Primitive, Scene, SceneLight};

pub const MAX_LIGHTS: usize = 8;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.2,
    b: 0.3,
    a: 1.0,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    /// xyz position, w range
    position: [f32; 4],
    /// xyz direction, w kind (0 directional, 1 point)
    direction: [f32; 4],
    /// rgb * intensity
    color: [f32; 4],
}

// Uniform buffer structure for camera and lights
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GlobalUniforms {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    light_count: [u32; 4],
    lights: [GpuLight; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    color: [f32; 4],
    material: [f32; 4],
}

/// Ambient term plus up to [`MAX_LIGHTS`] direct lights in shader layout.
/// Ambient lights are summed; direct lights beyond the limit are dropped.
pub fn pack_lights(lights: &[SceneLight]) -> ([f32; 4], Vec<GpuLight>) {
    let mut ambient = Vec3::ZERO;
    let mut packed = Vec::new();
    for light in lights {
        let color = Vec3::from(light.color) * light.intensity;
        let (position_w, kind) = match light.kind {
            LightKind::Ambient => {
                ambient += color;
                continue;
            }
            LightKind::Directional => (0.0, 0.0),
            LightKind::Point { range } => (range, 1.0),
        };
        if packed.len() == MAX_LIGHTS {
            log::warn!("More than {MAX_LIGHTS} direct lights; extra lights ignored");
            break;
        }
        packed.push(GpuLight {
            position: light.position.extend(position_w).to_array(),
            direction: light.direction.extend(kind).to_array(),
            color: color.extend(1.0).to_array(),
        });
    }
    (ambient.extend(1.0).to_array(), packed)
}

/// Per-frame view parameters
pub struct FrameView {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
}

/// Tessellated GUI output for one frame
pub struct GuiFrame {
    pub paint_jobs: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

struct GpuObject {
    primitive: Primitive,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    texture: Option<PathBuf>,
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    window: Arc<Window>,
    pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white_texture: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    objects: HashMap<NodeId, GpuObject>,
    /// `None` marks a texture that failed to load
    textures: HashMap<PathBuf, Option<wgpu::BindGroup>>,
    draw_list: Vec<NodeId>,
    egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        // Initialize wgpu
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(Error::NoAdapter)?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Renderer Device"),
                    required_features: wgpu::Features::default(),
                    required_limits: wgpu::Limits::default(),
                },
                None, // Trace path
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let global_layout = uniform_layout(
            &device,
            "Global Bind Group Layout",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let object_layout = uniform_layout(
            &device,
            "Object Bind Group Layout",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&global_layout, &object_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: "vs_main",
                buffers: &[vertex_buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let global_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Global Uniform Buffer"),
            contents: bytemuck::cast_slice(&[GlobalUniforms::zeroed_with_identity()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Global Bind Group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Base Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let white_texture = create_texture_bind_group(
            &device,
            &queue,
            &texture_layout,
            &sampler,
            &white,
            "White Texture",
        );

        let depth_view = create_depth_view(&device, surface_config.width, surface_config.height);
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            window,
            pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            texture_layout,
            sampler,
            white_texture,
            depth_view,
            objects: HashMap::new(),
            textures: HashMap::new(),
            draw_list: Vec::new(),
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, new_size.width, new_size.height);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height as f32
    }

    /// Upload uniforms and (re)build GPU meshes for everything visible,
    /// plus light/camera markers when `show_markers` is set.
    pub fn prepare_scene(
        &mut self,
        scene: &Scene,
        materials: &MaterialCache,
        view: &FrameView,
        show_markers: bool,
    ) {
        let (ambient, lights) = pack_lights(&scene.lights());
        let mut globals = GlobalUniforms::zeroed_with_identity();
        globals.view_proj = view.view_proj.to_cols_array_2d();
        globals.camera_position = view.camera_position.extend(1.0).to_array();
        globals.ambient = ambient;
        globals.light_count = [lights.len() as u32, 0, 0, 0];
        globals.lights[..lights.len()].copy_from_slice(&lights);
        self.queue
            .write_buffer(&self.global_buffer, 0, bytemuck::cast_slice(&[globals]));

        self.draw_list.clear();
        let mut seen = HashSet::new();
        for item in scene.shapes() {
            seen.insert(item.id);
            let material = materials.get(item.material).cloned().unwrap_or_default();
            if let Some(texture) = &material.texture {
                self.ensure_texture(texture);
            }
            self.update_object(item.id, item.primitive, item.world, &material);
        }
        if show_markers {
            for marker in scene.markers() {
                seen.insert(marker.id);
                let material = Material {
                    specular: 0.0,
                    ..Material::solid(marker.color)
                };
                self.update_object(marker.id, &marker.primitive, marker.world, &material);
            }
        }
        // Nodes that were removed or hidden release their buffers
        self.objects.retain(|id, _| seen.contains(id));
    }

    fn update_object(
        &mut self,
        id: NodeId,
        primitive: &Primitive,
        world: Mat4,
        material: &Material,
    ) {
        let stale = self
            .objects
            .get(&id)
            .map_or(true, |object| object.primitive != *primitive);
        if stale {
            let object = self.create_object(primitive);
            self.objects.insert(id, object);
        }

        let uniforms = ObjectUniforms {
            model: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
            color: material.color,
            material: [material.specular, material.shininess.max(1.0), 0.0, 0.0],
        };
        if let Some(object) = self.objects.get_mut(&id) {
            object.texture = material.texture.clone();
            self.queue
                .write_buffer(&object.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
            if object.index_count > 0 {
                self.draw_list.push(id);
            }
        }
    }

    /// Draw the scene and the GUI overlay to the window.
    pub fn render(&mut self, gui: Option<GuiFrame>) -> Result<()> {
        // Texture uploads must survive a skipped frame
        if let Some(gui) = &gui {
            for (id, delta) in &gui.textures_delta.set {
                self.egui_renderer
                    .update_texture(&self.device, &self.queue, *id, delta);
            }
        }
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.resize(self.window.inner_size());
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(err) => return Err(Error::Frame(err)),
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        self.encode_scene_pass(&mut encoder, &view, &self.depth_view);

        let mut command_buffers = Vec::new();
        if let Some(gui) = &gui {
            let screen = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.surface_config.width, self.surface_config.height],
                pixels_per_point: gui.pixels_per_point,
            };
            command_buffers = self.egui_renderer.update_buffers(
                &self.device,
                &self.queue,
                &mut encoder,
                &gui.paint_jobs,
                &screen,
            );
            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("GUI Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                self.egui_renderer
                    .render(&mut render_pass, &gui.paint_jobs, &screen);
            }
        }

        command_buffers.push(encoder.finish());
        self.queue.submit(command_buffers);
        frame.present();

        if let Some(gui) = gui {
            for id in &gui.textures_delta.free {
                self.egui_renderer.free_texture(id);
            }
        }
        Ok(())
    }

    /// Render the scene without the GUI into an offscreen target and read
    /// it back as RGBA pixels.
    pub fn capture_frame(&mut self) -> Result<RgbaImage> {
        let (width, height) = self.size();
        let format = self.surface_config.format;
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = create_depth_view(&self.device, width, height);

        let padded_bytes_per_row = export::padded_bytes_per_row(width);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Readback"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        self.encode_scene_pass(&mut encoder, &target_view, &depth_view);
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| Error::Export("readback callback dropped".to_string()))??;

        let mut pixels = {
            let data = slice.get_mapped_range();
            export::unpad_rows(&data, width, height, padded_bytes_per_row)
        };
        readback.unmap();

        if matches!(
            format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        ) {
            export::bgra_to_rgba(&mut pixels);
        }
        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::Export("captured frame has the wrong size".to_string()))
    }

    fn encode_scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.global_bind_group, &[]);
        for id in &self.draw_list {
            let Some(object) = self.objects.get(id) else {
                continue;
            };
            let texture = object
                .texture
                .as_ref()
                .and_then(|path| self.textures.get(path))
                .and_then(Option::as_ref)
                .unwrap_or(&self.white_texture);
            render_pass.set_bind_group(1, &object.bind_group, &[]);
            render_pass.set_bind_group(2, texture, &[]);
            render_pass.set_vertex_buffer(0, object.vertex_buffer.slice(..));
            render_pass.set_index_buffer(object.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..object.index_count, 0, 0..1);
        }
    }

    fn create_object(&self, primitive: &Primitive) -> GpuObject {
        let mesh = primitive.mesh_data().unwrap_or_else(|err| {
            log::warn!("{} could not be built: {err}", primitive.label());
            MeshData::default()
        });

        // wgpu rejects zero-sized buffers, so empty meshes get one dummy element
        let vertices: &[Vertex] = if mesh.vertices.is_empty() {
            &[Vertex {
                position: [0.0; 3],
                normal: [0.0; 3],
                uv: [0.0; 2],
            }]
        } else {
            &mesh.vertices
        };
        let indices: &[u32] = if mesh.indices.is_empty() { &[0] } else { &mesh.indices };

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniform Buffer"),
            size: std::mem::size_of::<ObjectUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        GpuObject {
            primitive: primitive.clone(),
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            uniform_buffer,
            bind_group,
            texture: None,
        }
    }

    fn ensure_texture(&mut self, path: &Path) {
        if self.textures.contains_key(path) {
            return;
        }
        let bind_group = match image::open(path) {
            Ok(image) => {
                log::debug!("Loaded texture {}", path.display());
                Some(create_texture_bind_group(
                    &self.device,
                    &self.queue,
                    &self.texture_layout,
                    &self.sampler,
                    &image.to_rgba8(),
                    "Material Texture",
                ))
            }
            Err(err) => {
                log::warn!("Texture {} failed to load: {err}", path.display());
                None
            }
        };
        self.textures.insert(path.to_path_buf(), bind_group);
    }
}

impl GlobalUniforms {
    fn zeroed_with_identity() -> Self {
        let mut uniforms: Self = bytemuck::Zeroable::zeroed();
        uniforms.view_proj = Mat4::IDENTITY.to_cols_array_2d();
        uniforms
    }
}

fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &RgbaImage,
    label: &str,
) -> wgpu::BindGroup {
    let (width, height) = image.dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(kind: LightKind, intensity: f32) -> SceneLight {
        SceneLight {
            kind,
            color: [1.0, 0.5, 0.25],
            intensity,
            position: Vec3::new(1.0, 2.0, 3.0),
            direction: Vec3::NEG_Y,
        }
    }

    #[test]
    fn ambient_lights_are_summed() {
        let (ambient, packed) = pack_lights(&[
            light(LightKind::Ambient, 0.2),
            light(LightKind::Ambient, 0.2),
        ]);
        assert!(packed.is_empty());
        assert!((ambient[0] - 0.4).abs() < 1e-6);
        assert!((ambient[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn direct_lights_encode_kind_and_range() {
        let (_, packed) = pack_lights(&[
            light(LightKind::Directional, 1.0),
            light(LightKind::Point { range: 7.0 }, 2.0),
        ]);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].direction, [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(packed[1].direction[3], 1.0);
        assert_eq!(packed[1].position, [1.0, 2.0, 3.0, 7.0]);
        assert_eq!(packed[1].color, [2.0, 1.0, 0.5, 1.0]);
    }

    #[test]
    fn lights_beyond_limit_are_dropped() {
        let lights: Vec<SceneLight> = (0..MAX_LIGHTS + 3)
            .map(|_| light(LightKind::Point { range: 1.0 }, 1.0))
            .collect();
        assert_eq!(pack_lights(&lights).1.len(), MAX_LIGHTS);
    }

    #[test]
    fn uniform_layouts_match_shader_sizes() {
        // mat4 + 3 vec4 + 8 lights of 3 vec4
        assert_eq!(std::mem::size_of::<GlobalUniforms>(), 64 + 48 + MAX_LIGHTS * 48);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 64 * 2 + 32);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }
}
