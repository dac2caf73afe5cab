// Window, event loop and per-frame orchestration

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::{Window, WindowBuilder};

use crate::animation::{CameraPath, Playback};
use crate::camera::{Camera, CameraPose};
use crate::config::Config;
use crate::error::Result;
use crate::export::ExportJob;
use crate::gui::{EditorState, Gui, UiAction};
use crate::input::{Action, InputState};
use crate::material::{Material, MaterialCache};
use crate::math::Transform;
use crate::renderer::{FrameView, GuiFrame, Renderer};
use crate::scene::{Node, NodeId, Primitive, Scene};

/// Longest step fed to camera motion, so a stalled frame does not teleport
const MAX_FRAME_TIME: f32 = 0.1;
/// Distance in front of the camera where new shapes appear
const SPAWN_DISTANCE: f32 = 3.0;

pub struct App {
    config: Config,
    window: Arc<Window>,
    renderer: Renderer,
    scene: Scene,
    materials: MaterialCache,
    camera: Camera,
    input: InputState,
    path: CameraPath,
    playback: Playback,
    export: Option<ExportJob>,
    gui: Gui,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    show_gui: bool,
    show_markers: bool,
    /// Numbering for shapes added from the panel; never reused
    shapes_added: usize,
    last_frame: Instant,
}

impl App {
    pub async fn new(
        config: Config,
        scene: Scene,
        materials: MaterialCache,
        start_camera: Option<NodeId>,
        event_loop: &EventLoop<()>,
    ) -> Result<Self> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(&config.window.title)
                .with_inner_size(winit::dpi::LogicalSize::new(
                    config.window.width,
                    config.window.height,
                ))
                .build(event_loop)?,
        );
        let renderer = Renderer::new(window.clone()).await?;

        let home = start_camera
            .and_then(|id| scene.camera_pose(id))
            .unwrap_or_else(|| {
                CameraPose::look_at(
                    Vec3::new(0.0, 2.0, 6.0),
                    Vec3::ZERO,
                    config.camera.fov_degrees,
                )
            });
        let camera = Camera::new(home, &config.camera);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &*window,
            Some(window.scale_factor() as f32),
            None,
        );

        log::info!(
            "Scene ready: {} nodes, {} materials, {} cameras",
            scene.len(),
            materials.len(),
            scene.cameras().len()
        );

        Ok(Self {
            input: InputState::new(config.bindings.clone()),
            path: CameraPath::new(config.animation.keyframe_interval, config.animation.easing),
            playback: Playback::new(config.animation.looping),
            export: None,
            gui: Gui::new(),
            show_gui: true,
            show_markers: true,
            shapes_added: 0,
            last_frame: Instant::now(),
            config,
            window,
            renderer,
            scene,
            materials,
            camera,
            egui_ctx,
            egui_state,
        })
    }

    pub fn run(mut self, event_loop: EventLoop<()>) -> Result<()> {
        event_loop.run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
                    self.window_event(event, target);
                }
                Event::AboutToWait => {
                    self.window.request_redraw();
                }
                _ => {}
            }
        })?;
        Ok(())
    }

    fn window_event(&mut self, event: WindowEvent, target: &EventLoopWindowTarget<()>) {
        let response = self.egui_state.on_window_event(&self.window, &event);
        let gui_consumed = self.show_gui && response.consumed;

        match event {
            WindowEvent::CloseRequested => {
                target.exit();
            }
            WindowEvent::Resized(physical_size) => {
                self.renderer.resize(physical_size);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    log::error!("Render failed: {err}");
                    target.exit();
                }
            }
            event => self.input.handle_window_event(&event, gui_consumed),
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(MAX_FRAME_TIME);
        self.last_frame = now;

        for action in self.input.drain_actions() {
            self.handle_action(action);
        }
        let motion = self.input.take_frame();

        // Export drives the camera one frame at a time, playback in real time
        if let Some(pose) = self.export.as_ref().and_then(ExportJob::next_pose) {
            self.camera.set_pose(&pose);
        } else if let Some(pose) = self.playback.advance(&self.path, dt) {
            self.camera.set_pose(&pose);
        } else {
            self.camera.apply(&motion, dt, &self.config.camera);
        }

        let gui = if self.show_gui {
            Some(self.run_gui())
        } else {
            None
        };

        let view = FrameView {
            view_proj: self.camera.view_projection(self.renderer.aspect()),
            camera_position: self.camera.position,
        };
        // Markers never end up in exported frames
        let show_markers = self.show_markers && self.export.is_none();
        self.renderer
            .prepare_scene(&self.scene, &self.materials, &view, show_markers);

        if self.export.is_some() {
            self.capture_export_frame();
        }
        self.renderer.render(gui)
    }

    fn run_gui(&mut self) -> GuiFrame {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let mut state = EditorState {
            scene: &mut self.scene,
            materials: &mut self.materials,
            camera: &mut self.camera,
            camera_config: &mut self.config.camera,
            path: &mut self.path,
            playback: &mut self.playback,
            export: &mut self.config.export,
            show_markers: &mut self.show_markers,
            export_progress: self.export.as_ref().map(ExportJob::progress),
        };
        let gui = &mut self.gui;
        let mut actions = Vec::new();
        let output = self.egui_ctx.run(raw_input, |ctx| {
            actions = gui.show(ctx, &mut state);
        });

        self.egui_state
            .handle_platform_output(&self.window, output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(output.shapes, output.pixels_per_point);

        for action in actions {
            self.handle_ui_action(action);
        }

        GuiFrame {
            paint_jobs,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::ToggleMode => {
                self.camera.toggle_mode();
                log::info!("Camera mode: {:?}", self.camera.mode());
            }
            Action::AddKeyframe => {
                let time = self.path.push(self.camera.pose());
                log::info!("Keyframe {} stored at {time:.2} s", self.path.len());
            }
            Action::PlayPath => {
                if self.path.is_empty() {
                    log::warn!("No keyframes to play");
                } else {
                    self.playback.start();
                }
            }
            Action::ExportPath => self.start_export(),
            Action::ToggleGui => self.show_gui = !self.show_gui,
            Action::ResetCamera => {
                self.playback.stop();
                self.camera.reset();
            }
        }
    }

    fn handle_ui_action(&mut self, action: UiAction) {
        match action {
            UiAction::Trigger(action) => self.handle_action(action),
            UiAction::ClearPath => {
                self.playback.stop();
                self.path.clear();
            }
            UiAction::StopPath => self.playback.stop(),
            UiAction::GoToKeyframe(index) => {
                if let Some(keyframe) = self.path.keyframes().get(index) {
                    self.playback.stop();
                    self.camera.set_pose(&keyframe.pose);
                }
            }
            UiAction::RemoveKeyframe(index) => {
                self.path.remove(index);
            }
            UiAction::RetimeKeyframe(index, time) => {
                self.playback.stop();
                self.path.retime(index, time);
            }
            UiAction::ViewThrough(id) => {
                if let Some(pose) = self.scene.camera_pose(id) {
                    self.playback.stop();
                    self.camera.set_pose(&pose);
                }
            }
            UiAction::StoreView(id) => {
                self.scene.store_camera_pose(id, &self.camera.pose());
            }
            UiAction::AddToPath(id) => {
                if let Some(pose) = self.scene.camera_pose(id) {
                    let time = self.path.push(pose);
                    log::info!("Keyframe {} stored at {time:.2} s", self.path.len());
                }
            }
            UiAction::AddShape(primitive) => {
                let id = self.add_shape(primitive);
                self.gui.select(Some(id));
            }
            UiAction::RemoveNode(id) => {
                if let Some(node) = self.scene.remove(id) {
                    log::info!("Removed {}", node.name);
                }
            }
        }
    }

    fn add_shape(&mut self, primitive: Primitive) -> NodeId {
        let name = next_shape_name(
            &mut self.shapes_added,
            primitive.label(),
            &self.scene,
            &self.materials,
        );
        // Each new shape gets its own material so colour edits stay local
        let material = self
            .materials
            .insert(&shape_material_key(&name), Material::default());
        let position = self.camera.position + self.camera.forward() * SPAWN_DISTANCE;
        log::info!("Added {name}");
        self.scene.add(
            None,
            Node::shape(name, Transform::from_position(position), primitive, material),
        )
    }

    fn start_export(&mut self) {
        if self.export.is_some() {
            log::warn!("An export is already running");
            return;
        }
        match ExportJob::new(&self.path, &self.config.export) {
            Ok(job) => {
                self.playback.stop();
                self.export = Some(job);
            }
            Err(err) => log::error!("Cannot start export: {err}"),
        }
    }

    fn capture_export_frame(&mut self) {
        let Some(job) = self.export.as_mut() else {
            return;
        };
        let result = self
            .renderer
            .capture_frame()
            .and_then(|frame| job.push_frame(frame));
        match result {
            Ok(Some(output)) => {
                log::info!("Export finished: {}", output.display());
                self.export = None;
            }
            Ok(None) => {}
            Err(err) => {
                log::error!("Export aborted: {err}");
                self.export = None;
            }
        }
    }
}

fn shape_material_key(name: &str) -> String {
    format!("node:{name}")
}

/// A shape name whose node and material key are both unused.
fn next_shape_name(
    counter: &mut usize,
    label: &str,
    scene: &Scene,
    materials: &MaterialCache,
) -> String {
    loop {
        *counter += 1;
        let name = format!("{label} {counter}");
        if scene.find(&name).is_none() && materials.handle(&shape_material_key(&name)).is_none() {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialHandle;
    use crate::scene::NodeKind;

    fn add_box(scene: &mut Scene, materials: &mut MaterialCache, counter: &mut usize) -> NodeId {
        let name = next_shape_name(counter, "Box", scene, materials);
        let material = materials.insert(&shape_material_key(&name), Material::default());
        let primitive = Primitive::Box { size: Vec3::ONE };
        scene.add(None, Node::shape(name, Transform::default(), primitive, material))
    }

    fn material_of(scene: &Scene, id: NodeId) -> Option<MaterialHandle> {
        match &scene.get(id)?.kind {
            NodeKind::Shape { material, .. } => Some(*material),
            _ => None,
        }
    }

    #[test]
    fn shape_names_are_not_reused_after_removal() {
        let mut scene = Scene::new();
        let mut materials = MaterialCache::new();
        let mut counter = 0;

        let first = add_box(&mut scene, &mut materials, &mut counter);
        let second = add_box(&mut scene, &mut materials, &mut counter);
        scene.remove(second);
        let third = add_box(&mut scene, &mut materials, &mut counter);

        assert_eq!(scene.get(third).map(|node| node.name.as_str()), Some("Box 3"));
        assert_ne!(material_of(&scene, first), material_of(&scene, third));
        assert!(material_of(&scene, first).is_some());
    }

    #[test]
    fn shape_names_skip_existing_nodes() {
        let mut scene = Scene::new();
        let materials = MaterialCache::new();
        scene.add(None, Node::group("Cone 1", Transform::default()));
        let mut counter = 0;
        assert_eq!(next_shape_name(&mut counter, "Cone", &scene, &materials), "Cone 2");
    }
}
