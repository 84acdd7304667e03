//! Thermoscope - assembly viewer with a volumetric thermal overlay

use std::path::PathBuf;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

use thermoscope::assets::{BoundsTable, LodManifest};
use thermoscope::core::{
    camera::Camera,
    camera_controller::OrbitCameraController,
    error::Error,
    input::InputState,
    logging,
    time::FrameTimer,
};
use thermoscope::iso::{ColorMode, IsoQuality, IsosurfaceCoordinator};
use thermoscope::render::{
    GpuContext, GpuMesh, MeshPipeline, RaymarchSettings, VisibilityCuller, VolumePipeline,
    culling::Frustum,
};
use thermoscope::scene::{FrameContext, PartRecord, ViewerConfig};
use thermoscope::streaming::LodStreamingManager;
use thermoscope::volume::{TierStreamer, VolumeField, VolumeTier};

/// Base colors cycled across parts
const PART_PALETTE: [[f32; 3]; 6] = [
    [0.62, 0.64, 0.67],
    [0.55, 0.58, 0.64],
    [0.70, 0.66, 0.58],
    [0.48, 0.54, 0.52],
    [0.66, 0.58, 0.52],
    [0.58, 0.62, 0.58],
];

/// Everything that needs GPU and asset state, built once in `resumed`
struct ViewerState {
    parts: Vec<PartRecord>,
    part_colors: Vec<[f32; 3]>,
    streaming: LodStreamingManager,
    culler: VisibilityCuller,
    mesh_pipeline: MeshPipeline,
    volume: Option<VolumeState>,
}

/// Heat-map subsystem; absent when the volume data declined to load
struct VolumeState {
    field: Arc<VolumeField>,
    tiers: TierStreamer,
    pipeline: VolumePipeline,
    settings: RaymarchSettings,
    iso: IsosurfaceCoordinator,
    iso_quality: IsoQuality,
    iso_mode: ColorMode,
}

struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    view: Option<ViewerState>,
    camera: Camera,
    controller: OrbitCameraController,
    input: InputState,
    timer: FrameTimer,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let focus = glam::Vec3::from_array(config.camera_focus);
        let controller = OrbitCameraController::new(focus, config.camera_distance);
        let camera = Camera::new(focus, 50.0, 16.0 / 9.0);

        Self {
            config,
            window: None,
            gpu: None,
            view: None,
            camera,
            controller,
            input: InputState::new(),
            timer: FrameTimer::new(),
        }
    }

    /// Load registries and build the viewer state. Malformed startup data
    /// is fatal for the viewer; a missing or malformed volume only
    /// disables the heat-map subsystem.
    fn build_viewer(&self, gpu: &GpuContext) -> Result<ViewerState, Error> {
        let manifest = LodManifest::load(&self.config.manifest_path())?;
        let bounds = BoundsTable::load(&self.config.bounds_path())?;

        let mut names: Vec<String> = manifest
            .part_names()
            .chain(bounds.part_names())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        log::info!("assembly has {} parts", names.len());

        let parts: Vec<PartRecord> = names
            .iter()
            .map(|name| PartRecord::new(name.clone(), bounds.get(name)))
            .collect();
        let part_colors: Vec<[f32; 3]> = (0..parts.len())
            .map(|i| PART_PALETTE[i % PART_PALETTE.len()])
            .collect();

        let mut streaming = LodStreamingManager::new(
            self.config.meshes_dir(),
            self.config.max_concurrent_loads,
        );
        streaming.begin(&parts, &manifest);

        let culler = VisibilityCuller::new(
            self.config.enclosure_part.clone(),
            self.config.display_part.clone(),
        );

        let (width, height) = gpu.size();
        let mesh_pipeline = MeshPipeline::new(&gpu.device, gpu.format(), width, height);

        let volume = match VolumeField::load(&self.config.volume_path()) {
            Ok(field) => {
                log::info!(
                    "volume field {:?} loaded, range {:?}{}",
                    field.dims, field.value_range, self.config.value_unit
                );
                let field = Arc::new(field);
                let tiers = TierStreamer::new(field.clone());
                let mut pipeline = VolumePipeline::new(&gpu.device, &gpu.queue, gpu.format(), &field);
                pipeline.upload_tier(&gpu.device, &gpu.queue, VolumeTier::Full, &tiers.full_tier());
                let settings = RaymarchSettings::new(field.value_range);
                let iso = IsosurfaceCoordinator::new(&field, self.config.value_unit.clone());
                Some(VolumeState {
                    field,
                    tiers,
                    pipeline,
                    settings,
                    iso,
                    iso_quality: IsoQuality::Balanced,
                    iso_mode: ColorMode::Solid,
                })
            }
            Err(e @ Error::MalformedVolumeDescriptor { .. }) => {
                log::error!("volume subsystem disabled: {}", e);
                None
            }
            Err(e) => {
                log::warn!("no volume data, heat-map disabled: {}", e);
                None
            }
        };

        Ok(ViewerState {
            parts,
            part_colors,
            streaming,
            culler,
            mesh_pipeline,
            volume,
        })
    }

    fn update(&mut self) {
        self.timer.tick();
        let dt = self.timer.delta_secs();
        self.controller.update(&mut self.camera, &self.input, dt);

        let ctx = FrameContext {
            camera_pos: self.camera.position,
            frustum: Frustum::from_view_projection(&self.camera.view_projection()),
            time: self.timer.elapsed_secs(),
        };

        let (Some(gpu), Some(view)) = (&self.gpu, &mut self.view) else {
            self.input.end_frame();
            return;
        };

        view.streaming.poll(&mut view.parts);

        let mut events = view.streaming.update(&mut view.parts, ctx.camera_pos);
        view.culler.run(&mut view.parts, &ctx, &mut events);
        for event in &events {
            log::debug!("{:?}", event);
        }

        Self::handle_keys(&self.input, view);

        if let Some(vol) = &mut view.volume {
            let distance = ctx.camera_pos.distance(vol.field.world_anchor());
            if let Some((tier, data)) = vol.tiers.update(distance) {
                vol.pipeline.upload_tier(&gpu.device, &gpu.queue, tier, &data);
            }

            // Notices are logged by the coordinator; polling also
            // re-enables the trigger
            vol.iso.poll();

            vol.pipeline.update_uniforms(&gpu.queue, &self.camera, &vol.settings, vol.field.value_range);
        }

        view.mesh_pipeline.update_camera(&gpu.queue, &self.camera);

        // Lazy GPU uploads for meshes that became drawable this frame
        for (i, part) in view.parts.iter_mut().enumerate() {
            if !part.visible {
                continue;
            }
            if let Some(level) = part.active_level {
                let level = &mut part.levels[level];
                if level.gpu.is_none() {
                    level.gpu = Some(GpuMesh::from_mesh_data(
                        &gpu.device,
                        &gpu.queue,
                        &level.mesh,
                        view.part_colors[i],
                    ));
                }
            }
        }
        if let Some(vol) = &mut view.volume {
            for record in vol.iso.records_mut() {
                if record.visible && record.gpu.is_none() {
                    record.gpu = Some(GpuMesh::from_soup(
                        &gpu.device,
                        &gpu.queue,
                        &record.mesh.positions,
                        &record.mesh.normals,
                        &record.mesh.colors,
                    ));
                }
            }
        }

        self.input.end_frame();
    }

    fn handle_keys(input: &InputState, view: &mut ViewerState) {
        // X-ray: hide/show the enclosing shell
        if input.is_key_just_pressed(KeyCode::KeyX) {
            let enclosure = view.culler.enclosure.clone();
            if let Some(part) = view.parts.iter_mut().find(|p| p.name == enclosure) {
                part.toggle = !part.toggle;
                log::info!("enclosure {}", if part.toggle { "shown" } else { "hidden" });
            }
        }

        let Some(vol) = &mut view.volume else { return };

        if input.is_key_just_pressed(KeyCode::KeyV) {
            vol.settings.enabled = !vol.settings.enabled;
            log::info!("volume rendering {}", if vol.settings.enabled { "on" } else { "off" });
        }
        if input.is_key_just_pressed(KeyCode::KeyR) {
            vol.settings.reset_window();
        }

        let step = (vol.field.value_range[1] - vol.field.value_range[0]) * 0.02;
        let (wmin, wmax) = vol.settings.window();
        if input.is_key_just_pressed(KeyCode::ArrowLeft) {
            vol.settings.set_window_min(wmin - step);
        }
        if input.is_key_just_pressed(KeyCode::ArrowRight) {
            vol.settings.set_window_min(wmin + step);
        }
        if input.is_key_just_pressed(KeyCode::ArrowDown) {
            vol.settings.set_window_max(wmax - step);
        }
        if input.is_key_just_pressed(KeyCode::ArrowUp) {
            vol.settings.set_window_max(wmax + step);
        }
        if input.is_key_just_pressed(KeyCode::BracketLeft) {
            let steps = vol.settings.step_count();
            vol.settings.set_step_count(steps.saturating_sub(16));
        }
        if input.is_key_just_pressed(KeyCode::BracketRight) {
            let steps = vol.settings.step_count();
            vol.settings.set_step_count(steps + 16);
        }
        if input.is_key_just_pressed(KeyCode::Minus) {
            let opacity = vol.settings.opacity();
            vol.settings.set_opacity(opacity - 0.05);
        }
        if input.is_key_just_pressed(KeyCode::Equal) {
            let opacity = vol.settings.opacity();
            vol.settings.set_opacity(opacity + 0.05);
        }

        if input.is_key_just_pressed(KeyCode::Digit1) {
            vol.iso_quality = IsoQuality::Fast;
        }
        if input.is_key_just_pressed(KeyCode::Digit2) {
            vol.iso_quality = IsoQuality::Balanced;
        }
        if input.is_key_just_pressed(KeyCode::Digit3) {
            vol.iso_quality = IsoQuality::Full;
        }
        if input.is_key_just_pressed(KeyCode::KeyG) {
            vol.iso_mode = match vol.iso_mode {
                ColorMode::Solid => ColorMode::Gradient,
                ColorMode::Gradient => ColorMode::Solid,
            };
            log::info!("isosurface coloring: {}", vol.iso_mode.label());
        }
        if input.is_key_just_pressed(KeyCode::KeyI) && !vol.iso.is_busy() {
            let (wmin, wmax) = vol.settings.window();
            let value = (wmin + wmax) * 0.5;
            vol.iso.dispatch(&vol.field, value, vol.iso_mode, vol.iso_quality);
        }
        if input.is_key_just_pressed(KeyCode::KeyC) {
            vol.iso.clear_all();
        }
    }

    fn render(&mut self) {
        let (Some(gpu), Some(view)) = (&self.gpu, &self.view) else {
            return;
        };

        let frame = match gpu.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("skipping frame: {}", e);
                return;
            }
        };
        let target = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        let mut draws: Vec<&GpuMesh> = Vec::new();
        for part in &view.parts {
            if !part.visible {
                continue;
            }
            if let Some(level) = part.active_level {
                if let Some(mesh) = &part.levels[level].gpu {
                    draws.push(mesh);
                }
            }
        }
        if let Some(vol) = &view.volume {
            for record in vol.iso.records() {
                if record.visible {
                    if let Some(mesh) = &record.gpu {
                        draws.push(mesh);
                    }
                }
            }
        }

        view.mesh_pipeline.render(&mut encoder, &target, &draws);

        if let Some(vol) = &view.volume {
            if vol.settings.enabled {
                vol.pipeline.render(&mut encoder, &target);
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window_width, self.config.window_height));

        let window = Arc::new(event_loop.create_window(window_attrs).expect("Failed to create window"));

        let gpu = pollster::block_on(GpuContext::new(window.clone()))
            .expect("Failed to create GPU context");

        let size = window.inner_size();
        self.camera.set_aspect(size.width as f32, size.height as f32);

        log::info!("Window created: {}x{}", size.width, size.height);
        log::info!("GPU: {}", gpu.adapter.get_info().name);

        match self.build_viewer(&gpu) {
            Ok(view) => {
                self.view = Some(view);
            }
            Err(e) => {
                log::error!("startup failed: {}", e);
                event_loop.exit();
                return;
            }
        }

        self.window = Some(window);
        self.gpu = Some(gpu);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.process_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = &mut self.gpu {
                        gpu.resize(size.width, size.height);
                        self.camera.set_aspect(size.width as f32, size.height as f32);
                        if let Some(view) = &mut self.view {
                            view.mesh_pipeline.resize(&gpu.device, size.width, size.height);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.update();
                self.render();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    logging::init();
    log::info!("Thermoscope starting...");

    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_config_arg(&args) {
        Some(path) => match ViewerConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => ViewerConfig::default(),
    };
    if let Some(assets) = parse_assets_arg(&args) {
        config.asset_root = assets;
    }
    log::info!("asset root: {}", config.asset_root.display());

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    let mut app = App::new(config);

    event_loop.run_app(&mut app).expect("Event loop error");
}

/// Parse --config argument from command line
fn parse_config_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == "--config" || args[i] == "-c" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

/// Parse --assets argument from command line
fn parse_assets_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == "--assets" || args[i] == "-a" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}
