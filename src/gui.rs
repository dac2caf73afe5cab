// Editor panel: scene tree, inspector, camera and animation controls

use std::path::PathBuf;

use glam::Vec3;

use crate::animation::{CameraPath, Easing, Playback};
use crate::camera::{Camera, CameraMode};
use crate::config::{CameraConfig, ExportConfig};
use crate::export::ExportFormat;
use crate::input::Action;
use crate::material::MaterialCache;
use crate::scene::{LightKind, NodeId, NodeKind, Primitive, Scene};

/// Requests the panel cannot carry out on its own
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Trigger(Action),
    ClearPath,
    StopPath,
    GoToKeyframe(usize),
    RemoveKeyframe(usize),
    /// Move a keyframe to a new time in seconds
    RetimeKeyframe(usize, f32),
    ViewThrough(NodeId),
    StoreView(NodeId),
    /// Append a stored camera's pose to the path
    AddToPath(NodeId),
    AddShape(Primitive),
    RemoveNode(NodeId),
}

/// Everything the panel may edit, borrowed for one frame
pub struct EditorState<'a> {
    pub scene: &'a mut Scene,
    pub materials: &'a mut MaterialCache,
    pub camera: &'a mut Camera,
    pub camera_config: &'a mut CameraConfig,
    pub path: &'a mut CameraPath,
    pub playback: &'a mut Playback,
    pub export: &'a mut ExportConfig,
    pub show_markers: &'a mut bool,
    /// (frames written, total) while an export runs
    pub export_progress: Option<(usize, usize)>,
}

#[derive(Default)]
pub struct Gui {
    selected: Option<NodeId>,
    export_dir: String,
}

/// Default shapes offered by the "Add" buttons
pub fn primitive_templates() -> [Primitive; 4] {
    [
        Primitive::Box { size: Vec3::ONE },
        Primitive::Cylinder {
            radius_top: 0.5,
            radius_bottom: 0.5,
            height: 1.0,
            segments: 32,
        },
        Primitive::Cone {
            radius: 0.5,
            height: 1.0,
            segments: 32,
        },
        Primitive::Ellipsoid {
            radii: Vec3::splat(0.5),
            segments: 32,
            rings: 16,
        },
    ]
}

impl Gui {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, id: Option<NodeId>) {
        self.selected = id;
    }

    pub fn show(&mut self, ctx: &egui::Context, state: &mut EditorState<'_>) -> Vec<UiAction> {
        let mut actions = Vec::new();
        if self.selected.is_some_and(|id| state.scene.get(id).is_none()) {
            self.selected = None;
        }

        egui::SidePanel::right("editor_panel")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    egui::CollapsingHeader::new("Scene")
                        .default_open(true)
                        .show(ui, |ui| self.scene_tree(ui, state, &mut actions));
                    egui::CollapsingHeader::new("Inspector")
                        .default_open(true)
                        .show(ui, |ui| self.inspector(ui, state, &mut actions));
                    egui::CollapsingHeader::new("Camera")
                        .default_open(true)
                        .show(ui, |ui| camera_section(ui, state, &mut actions));
                    egui::CollapsingHeader::new("Animation")
                        .default_open(true)
                        .show(ui, |ui| self.animation_section(ui, state, &mut actions));
                });
            });
        actions
    }

    fn scene_tree(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut EditorState<'_>,
        actions: &mut Vec<UiAction>,
    ) {
        let mut toggled = Vec::new();
        let roots = state.scene.roots().to_vec();
        for root in roots {
            self.tree_node(ui, state.scene, root, 0, &mut toggled);
        }
        for id in toggled {
            if let Some(node) = state.scene.get_mut(id) {
                node.visible = !node.visible;
            }
        }

        ui.separator();
        ui.horizontal_wrapped(|ui| {
            ui.label("Add:");
            for template in primitive_templates() {
                if ui.button(template.label()).clicked() {
                    actions.push(UiAction::AddShape(template));
                }
            }
        });
    }

    fn tree_node(
        &mut self,
        ui: &mut egui::Ui,
        scene: &Scene,
        id: NodeId,
        depth: usize,
        toggled: &mut Vec<NodeId>,
    ) {
        let Some(node) = scene.get(id) else {
            return;
        };
        ui.horizontal(|ui| {
            ui.add_space(depth as f32 * 12.0);
            let mut visible = node.visible;
            if ui.checkbox(&mut visible, "").changed() {
                toggled.push(id);
            }
            let label = format!("{} ({})", node.name, kind_label(&node.kind));
            if ui
                .selectable_label(self.selected == Some(id), label)
                .clicked()
            {
                self.selected = Some(id);
            }
        });
        for child in node.children() {
            self.tree_node(ui, scene, *child, depth + 1, toggled);
        }
    }

    fn inspector(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut EditorState<'_>,
        actions: &mut Vec<UiAction>,
    ) {
        let Some(id) = self.selected else {
            ui.weak("No node selected");
            return;
        };
        let Some(node) = state.scene.get_mut(id) else {
            ui.weak("Selected node not found");
            return;
        };

        ui.horizontal(|ui| {
            ui.label("Name:");
            ui.text_edit_singleline(&mut node.name);
        });

        ui.label("Transform");
        vec3_edit(ui, "Position", &mut node.transform.position, 0.05);
        let mut euler = node.transform.euler_degrees();
        if vec3_edit(ui, "Rotation", &mut euler, 1.0) {
            node.transform.set_euler_degrees(euler);
        }
        if !matches!(node.kind, NodeKind::Camera { .. }) {
            vec3_edit(ui, "Scale", &mut node.transform.scale, 0.01);
        }
        ui.separator();

        match &mut node.kind {
            NodeKind::Group => {}
            NodeKind::Shape {
                primitive,
                material,
            } => {
                primitive_edit(ui, primitive);
                ui.separator();
                if let Some(key) = state.materials.key(*material) {
                    ui.label(format!("Material: {key}"));
                }
                if let Some(material) = state.materials.get_mut(*material) {
                    ui.horizontal(|ui| {
                        ui.label("Colour");
                        ui.color_edit_button_rgba_unmultiplied(&mut material.color);
                    });
                    ui.add(egui::Slider::new(&mut material.specular, 0.0..=1.0).text("Specular"));
                    ui.add(
                        egui::Slider::new(&mut material.shininess, 1.0..=256.0).text("Shininess"),
                    );
                    if let Some(texture) = &material.texture {
                        ui.weak(format!("Texture: {}", texture.display()));
                    }
                }
            }
            NodeKind::Light(light) => {
                ui.label(match light.kind {
                    LightKind::Ambient => "Ambient light",
                    LightKind::Directional => "Directional light (shines along local -Y)",
                    LightKind::Point { .. } => "Point light",
                });
                ui.horizontal(|ui| {
                    ui.label("Colour");
                    ui.color_edit_button_rgb(&mut light.color);
                });
                ui.add(
                    egui::DragValue::new(&mut light.intensity)
                        .speed(0.01)
                        .clamp_range(0.0..=100.0)
                        .prefix("intensity "),
                );
                if let LightKind::Point { range } = &mut light.kind {
                    ui.add(
                        egui::DragValue::new(range)
                            .speed(0.1)
                            .clamp_range(0.01..=1000.0)
                            .prefix("range "),
                    );
                }
            }
            NodeKind::Camera { fov_y } => {
                let mut fov = fov_y.to_degrees();
                if ui
                    .add(egui::Slider::new(&mut fov, 10.0..=120.0).text("FOV"))
                    .changed()
                {
                    *fov_y = fov.to_radians();
                }
                ui.horizontal(|ui| {
                    if ui.button("View through").clicked() {
                        actions.push(UiAction::ViewThrough(id));
                    }
                    if ui.button("Store current view").clicked() {
                        actions.push(UiAction::StoreView(id));
                    }
                });
                if ui.button("Add to path").clicked() {
                    actions.push(UiAction::AddToPath(id));
                }
            }
        }

        ui.separator();
        if ui.button("Delete node").clicked() {
            actions.push(UiAction::RemoveNode(id));
            self.selected = None;
        }
    }

    fn animation_section(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut EditorState<'_>,
        actions: &mut Vec<UiAction>,
    ) {
        ui.label(format!(
            "{} keyframes, {:.1} s",
            state.path.len(),
            state.path.duration()
        ));
        if state.playback.is_playing() {
            ui.label(format!("Playing {:.1} s", state.playback.elapsed()));
        }
        for (index, keyframe) in state.path.keyframes().iter().enumerate() {
            ui.horizontal(|ui| {
                ui.monospace(format!("#{index:<2}"));
                let mut time = keyframe.time;
                let response = ui.add(
                    egui::DragValue::new(&mut time)
                        .speed(0.05)
                        .clamp_range(0.0..=3600.0)
                        .suffix(" s"),
                );
                if response.changed() {
                    actions.push(UiAction::RetimeKeyframe(index, time));
                }
                if ui.small_button("Go").clicked() {
                    actions.push(UiAction::GoToKeyframe(index));
                }
                if ui.small_button("Delete").clicked() {
                    actions.push(UiAction::RemoveKeyframe(index));
                }
            });
        }

        ui.horizontal(|ui| {
            if ui.button("Add keyframe").clicked() {
                actions.push(UiAction::Trigger(Action::AddKeyframe));
            }
            if ui.button("Clear").clicked() {
                actions.push(UiAction::ClearPath);
            }
            if state.playback.is_playing() {
                if ui.button("Stop").clicked() {
                    actions.push(UiAction::StopPath);
                }
            } else if ui
                .add_enabled(!state.path.is_empty(), egui::Button::new("Play"))
                .clicked()
            {
                actions.push(UiAction::Trigger(Action::PlayPath));
            }
        });

        ui.add(
            egui::DragValue::new(&mut state.path.interval)
                .speed(0.1)
                .clamp_range(0.1..=60.0)
                .prefix("interval ")
                .suffix(" s"),
        );
        egui::ComboBox::from_label("Easing")
            .selected_text(format!("{:?}", state.path.easing))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut state.path.easing, Easing::Linear, "Linear");
                ui.selectable_value(&mut state.path.easing, Easing::Smooth, "Smooth");
            });
        ui.checkbox(&mut state.playback.looping, "Loop playback");

        ui.separator();
        ui.label("Export");
        ui.horizontal(|ui| {
            ui.radio_value(&mut state.export.format, ExportFormat::Png, "PNG frames");
            ui.radio_value(&mut state.export.format, ExportFormat::Gif, "GIF");
        });
        ui.add(
            egui::DragValue::new(&mut state.export.fps)
                .clamp_range(1..=120)
                .suffix(" fps"),
        );
        if self.export_dir.is_empty() {
            self.export_dir = state.export.directory.display().to_string();
        }
        ui.horizontal(|ui| {
            ui.label("Directory");
            if ui.text_edit_singleline(&mut self.export_dir).lost_focus() {
                state.export.directory = PathBuf::from(&self.export_dir);
            }
        });
        ui.horizontal(|ui| {
            ui.label("Prefix");
            ui.text_edit_singleline(&mut state.export.prefix);
        });

        match state.export_progress {
            Some((done, total)) => {
                let fraction = done as f32 / total.max(1) as f32;
                ui.add(egui::ProgressBar::new(fraction).text(format!("{done}/{total}")));
            }
            None => {
                let frames = state.path.frame_count(state.export.fps);
                if ui
                    .add_enabled(frames > 0, egui::Button::new(format!("Export {frames} frames")))
                    .clicked()
                {
                    actions.push(UiAction::Trigger(Action::ExportPath));
                }
            }
        }
    }
}

fn camera_section(ui: &mut egui::Ui, state: &mut EditorState<'_>, actions: &mut Vec<UiAction>) {
    let camera = &mut *state.camera;
    let mut mode = camera.mode();
    ui.horizontal(|ui| {
        ui.radio_value(&mut mode, CameraMode::FirstPerson, "First person");
        ui.radio_value(&mut mode, CameraMode::Orbit, "Orbit");
    });
    if mode != camera.mode() {
        camera.set_mode(mode);
    }

    let mut fov = camera.fov_y.to_degrees();
    if ui
        .add(egui::Slider::new(&mut fov, 10.0..=120.0).text("FOV"))
        .changed()
    {
        camera.fov_y = fov.to_radians();
    }
    ui.horizontal(|ui| {
        ui.add(
            egui::DragValue::new(&mut camera.near)
                .speed(0.01)
                .clamp_range(0.001..=10.0)
                .prefix("near "),
        );
        ui.add(
            egui::DragValue::new(&mut camera.far)
                .speed(1.0)
                .clamp_range(1.0..=100_000.0)
                .prefix("far "),
        );
    });

    let config = &mut *state.camera_config;
    ui.add(egui::Slider::new(&mut config.move_speed, 0.1..=50.0).text("Move speed"));
    ui.add(
        egui::Slider::new(&mut config.look_sensitivity, 0.0005..=0.02)
            .logarithmic(true)
            .text("Look sensitivity"),
    );
    ui.checkbox(&mut config.invert_y, "Invert Y");
    ui.add(egui::Slider::new(&mut config.zoom_speed, 0.01..=1.0).text("Zoom speed"));
    ui.checkbox(state.show_markers, "Show light and camera markers");

    let p = camera.position;
    let f = camera.forward();
    ui.monospace(format!("pos  {:>7.2} {:>7.2} {:>7.2}", p.x, p.y, p.z));
    ui.monospace(format!("look {:>7.2} {:>7.2} {:>7.2}", f.x, f.y, f.z));
    if camera.mode() == CameraMode::Orbit {
        let t = camera.target;
        ui.monospace(format!("pivot {:>6.2} {:>7.2} {:>7.2}", t.x, t.y, t.z));
    }
    if ui.button("Reset camera").clicked() {
        actions.push(UiAction::Trigger(Action::ResetCamera));
    }
}

fn primitive_edit(ui: &mut egui::Ui, primitive: &mut Primitive) {
    ui.label(primitive.label());
    match primitive {
        Primitive::Box { size } => {
            vec3_edit(ui, "Size", size, 0.05);
        }
        Primitive::Cylinder {
            radius_top,
            radius_bottom,
            height,
            segments,
        } => {
            positive_edit(ui, "Top radius", radius_top, 0.0);
            positive_edit(ui, "Bottom radius", radius_bottom, 0.0);
            positive_edit(ui, "Height", height, 0.01);
            segments_edit(ui, "Segments", segments);
        }
        Primitive::Cone {
            radius,
            height,
            segments,
        } => {
            positive_edit(ui, "Radius", radius, 0.01);
            positive_edit(ui, "Height", height, 0.01);
            segments_edit(ui, "Segments", segments);
        }
        Primitive::Ellipsoid {
            radii,
            segments,
            rings,
        } => {
            vec3_edit(ui, "Radii", radii, 0.05);
            segments_edit(ui, "Segments", segments);
            segments_edit(ui, "Rings", rings);
        }
        Primitive::Mesh { path } => {
            ui.weak(path.display().to_string());
        }
    }
}

fn vec3_edit(ui: &mut egui::Ui, label: &str, value: &mut Vec3, speed: f32) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let x = ui.add(egui::DragValue::new(&mut value.x).speed(speed)).changed();
        let y = ui.add(egui::DragValue::new(&mut value.y).speed(speed)).changed();
        let z = ui.add(egui::DragValue::new(&mut value.z).speed(speed)).changed();
        x || y || z
    })
    .inner
}

fn positive_edit(ui: &mut egui::Ui, label: &str, value: &mut f32, min: f32) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.add(
            egui::DragValue::new(value)
                .speed(0.01)
                .clamp_range(min..=1000.0),
        );
    });
}

fn segments_edit(ui: &mut egui::Ui, label: &str, value: &mut u32) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.add(egui::DragValue::new(value).clamp_range(3..=256));
    });
}

fn kind_label(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Group => "group",
        NodeKind::Shape { primitive, .. } => primitive.label(),
        NodeKind::Light(_) => "light",
        NodeKind::Camera { .. } => "camera",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPose;
    use crate::scene_file;

    struct Fixture {
        scene: Scene,
        materials: MaterialCache,
        camera: Camera,
        camera_config: CameraConfig,
        path: CameraPath,
        playback: Playback,
        export: ExportConfig,
        show_markers: bool,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scene = Scene::new();
            let mut materials = MaterialCache::new();
            scene_file::demo()
                .build(&mut scene, &mut materials, None)
                .unwrap();
            let camera_config = CameraConfig::default();
            let camera = Camera::new(
                CameraPose::look_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, 60.0),
                &camera_config,
            );
            Self {
                scene,
                materials,
                camera,
                camera_config,
                path: CameraPath::new(1.0, Easing::Linear),
                playback: Playback::default(),
                export: ExportConfig::default(),
                show_markers: true,
            }
        }

        fn state(&mut self) -> EditorState<'_> {
            EditorState {
                scene: &mut self.scene,
                materials: &mut self.materials,
                camera: &mut self.camera,
                camera_config: &mut self.camera_config,
                path: &mut self.path,
                playback: &mut self.playback,
                export: &mut self.export,
                show_markers: &mut self.show_markers,
                export_progress: None,
            }
        }
    }

    fn run_frame(gui: &mut Gui, fixture: &mut Fixture) -> Vec<UiAction> {
        let ctx = egui::Context::default();
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = gui.show(ctx, &mut fixture.state());
        });
        actions
    }

    #[test]
    fn panel_renders_every_node_kind_without_input() {
        let mut fixture = Fixture::new();
        let mut gui = Gui::new();
        let ids: Vec<NodeId> = fixture.scene.iter().map(|(id, _)| id).collect();
        for id in ids {
            gui.select(Some(id));
            assert!(run_frame(&mut gui, &mut fixture).is_empty());
        }
    }

    #[test]
    fn stale_selection_is_cleared() {
        let mut fixture = Fixture::new();
        let mut gui = Gui::new();
        let crate_id = fixture.scene.find("crate").unwrap();
        gui.select(Some(crate_id));
        fixture.scene.remove(crate_id);
        run_frame(&mut gui, &mut fixture);
        assert_eq!(gui.selected, None);
    }

    #[test]
    fn templates_cover_procedural_primitives() {
        let labels: Vec<&str> = primitive_templates().iter().map(Primitive::label).collect();
        assert_eq!(labels, vec!["Box", "Cylinder", "Cone", "Ellipsoid"]);
        for template in primitive_templates() {
            assert!(!template.mesh_data().unwrap().is_empty());
        }
    }
}
