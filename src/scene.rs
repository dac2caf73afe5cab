// Scene graph: primitives, lights and cameras under a transform hierarchy

use std::f32::consts::{FRAC_PI_2, PI};
use std::path::PathBuf;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::error::Result;
use crate::geometry::MeshData;
use crate::material::MaterialHandle;
use crate::math::Transform;

/// Handle to a node. Handles of removed nodes are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Box {
        size: Vec3,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        segments: u32,
    },
    Cone {
        radius: f32,
        height: f32,
        segments: u32,
    },
    Ellipsoid {
        radii: Vec3,
        segments: u32,
        rings: u32,
    },
    /// Triangle mesh loaded from an OBJ file
    Mesh {
        path: PathBuf,
    },
}

impl Primitive {
    pub fn mesh_data(&self) -> Result<MeshData> {
        Ok(match self {
            Primitive::Box { size } => MeshData::cuboid(*size),
            Primitive::Cylinder {
                radius_top,
                radius_bottom,
                height,
                segments,
            } => MeshData::cylinder(*radius_top, *radius_bottom, *height, *segments),
            Primitive::Cone {
                radius,
                height,
                segments,
            } => MeshData::cone(*radius, *height, *segments),
            Primitive::Ellipsoid {
                radii,
                segments,
                rings,
            } => MeshData::ellipsoid(*radii, *segments, *rings),
            Primitive::Mesh { path } => MeshData::load_obj(path)?,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Primitive::Box { .. } => "Box",
            Primitive::Cylinder { .. } => "Cylinder",
            Primitive::Cone { .. } => "Cone",
            Primitive::Ellipsoid { .. } => "Ellipsoid",
            Primitive::Mesh { .. } => "Mesh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Ambient,
    /// Shines along the node's local -Y axis
    Directional,
    Point { range: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
}

/// A light resolved into world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLight {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
    pub direction: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Shape {
        primitive: Primitive,
        material: MaterialHandle,
    },
    Light(Light),
    /// Stored viewpoint; placement comes from the node transform
    Camera { fov_y: f32 },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, transform: Transform, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform,
            visible: true,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>, transform: Transform) -> Self {
        Self::new(name, transform, NodeKind::Group)
    }

    pub fn shape(
        name: impl Into<String>,
        transform: Transform,
        primitive: Primitive,
        material: MaterialHandle,
    ) -> Self {
        Self::new(
            name,
            transform,
            NodeKind::Shape {
                primitive,
                material,
            },
        )
    }

    pub fn light(name: impl Into<String>, transform: Transform, light: Light) -> Self {
        Self::new(name, transform, NodeKind::Light(light))
    }

    /// Camera node placed at `pose`.
    pub fn camera(name: impl Into<String>, pose: &CameraPose) -> Self {
        let transform = Transform::new(pose.position, pose.orientation, Vec3::ONE);
        Self::new(name, transform, NodeKind::Camera { fov_y: pose.fov_y })
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Shape ready to draw: world matrix plus what to draw with
#[derive(Debug, Clone)]
pub struct DrawItem<'a> {
    pub id: NodeId,
    pub primitive: &'a Primitive,
    pub material: MaterialHandle,
    pub world: Mat4,
}

/// Small unlit-looking helper drawn where a light or camera sits
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: NodeId,
    pub primitive: Primitive,
    pub world: Mat4,
    pub color: [f32; 4],
}

const MARKER_SIZE: f32 = 0.1;
const MARKER_SEGMENTS: u32 = 12;

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
}

impl Scene {
    /// Creates a new, empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent` (or as a root). An unknown parent makes
    /// the node a root.
    pub fn add(&mut self, parent: Option<NodeId>, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = parent.filter(|p| self.get(*p).is_some());
        node.parent = parent;
        node.children.clear();
        self.nodes.push(Some(node));
        match parent.and_then(|p| self.get_mut(p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Removes a node and its whole subtree, returning the node itself.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        match node.parent.and_then(|p| self.get_mut(p)) {
            Some(parent) => parent.children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }
        let mut pending = node.children.clone();
        while let Some(child) = pending.pop() {
            if let Some(removed) = self.nodes.get_mut(child.0).and_then(Option::take) {
                pending.extend(removed.children);
            }
        }
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// First node with the given name, in insertion order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, node)| node.name == name).map(|(id, _)| id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|n| (NodeId(i), n)))
    }

    /// Local-to-world matrix, composed root first.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.get(c)) {
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// A node is shown only if it and all its ancestors are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.get(c)) {
            if !node.visible {
                return false;
            }
            current = node.parent;
        }
        current.is_none()
    }

    pub fn shapes(&self) -> Vec<DrawItem<'_>> {
        self.iter()
            .filter(|(id, _)| self.is_visible(*id))
            .filter_map(|(id, node)| match &node.kind {
                NodeKind::Shape {
                    primitive,
                    material,
                } => Some(DrawItem {
                    id,
                    primitive,
                    material: *material,
                    world: self.world_matrix(id),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn lights(&self) -> Vec<SceneLight> {
        self.iter()
            .filter(|(id, _)| self.is_visible(*id))
            .filter_map(|(id, node)| match node.kind {
                NodeKind::Light(light) => {
                    let world = self.world_matrix(id);
                    Some(SceneLight {
                        kind: light.kind,
                        color: light.color,
                        intensity: light.intensity,
                        position: world.transform_point3(Vec3::ZERO),
                        direction: world
                            .transform_vector3(Vec3::NEG_Y)
                            .try_normalize()
                            .unwrap_or(Vec3::NEG_Y),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Markers for visible point/directional lights and cameras. Point
    /// lights get a sphere, directional lights a cone pointing along the
    /// light, cameras a cone opening along the view direction.
    pub fn markers(&self) -> Vec<Marker> {
        self.iter()
            .filter(|(id, _)| self.is_visible(*id))
            .filter_map(|(id, node)| {
                let world = self.world_matrix(id);
                let (primitive, local, color) = match node.kind {
                    NodeKind::Light(light) => {
                        let color = (Vec3::from(light.color) * light.intensity.min(1.0))
                            .extend(1.0)
                            .to_array();
                        match light.kind {
                            LightKind::Ambient => return None,
                            LightKind::Point { .. } => (
                                Primitive::Ellipsoid {
                                    radii: Vec3::splat(MARKER_SIZE),
                                    segments: MARKER_SEGMENTS,
                                    rings: MARKER_SEGMENTS / 2,
                                },
                                Mat4::IDENTITY,
                                color,
                            ),
                            // Apex towards local -Y, the way the light shines
                            LightKind::Directional => (
                                Primitive::Cone {
                                    radius: MARKER_SIZE,
                                    height: MARKER_SIZE * 2.0,
                                    segments: MARKER_SEGMENTS,
                                },
                                Mat4::from_rotation_x(PI),
                                color,
                            ),
                        }
                    }
                    NodeKind::Camera { .. } => (
                        Primitive::Cone {
                            radius: MARKER_SIZE * 1.5,
                            height: MARKER_SIZE * 3.0,
                            segments: 4,
                        },
                        // Apex behind the eye, base along -Z
                        Mat4::from_rotation_x(FRAC_PI_2),
                        [0.9, 0.9, 0.2, 1.0],
                    ),
                    _ => return None,
                };
                Some(Marker {
                    id,
                    primitive,
                    world: world * local,
                    color,
                })
            })
            .collect()
    }

    /// Stored cameras with their world-space poses.
    pub fn cameras(&self) -> Vec<(NodeId, CameraPose)> {
        self.iter()
            .filter_map(|(id, node)| match node.kind {
                NodeKind::Camera { fov_y } => {
                    let (_, orientation, position) =
                        self.world_matrix(id).to_scale_rotation_translation();
                    Some((
                        id,
                        CameraPose {
                            position,
                            orientation: orientation.normalize(),
                            fov_y,
                        },
                    ))
                }
                _ => None,
            })
            .collect()
    }

    pub fn camera_pose(&self, id: NodeId) -> Option<CameraPose> {
        self.cameras()
            .into_iter()
            .find(|(camera, _)| *camera == id)
            .map(|(_, pose)| pose)
    }

    /// Move a camera node so its world pose matches `pose`. Returns false
    /// when `id` is not a camera.
    pub fn store_camera_pose(&mut self, id: NodeId, pose: &CameraPose) -> bool {
        let parent_world = match self.get(id) {
            Some(node) if matches!(node.kind, NodeKind::Camera { .. }) => node
                .parent
                .map_or(Mat4::IDENTITY, |parent| self.world_matrix(parent)),
            _ => return false,
        };
        let world = Mat4::from_rotation_translation(pose.orientation, pose.position);
        let local = parent_world.inverse() * world;
        let (_, rotation, position) = local.to_scale_rotation_translation();
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        node.transform.position = position;
        node.transform.rotation = rotation.normalize();
        node.kind = NodeKind::Camera { fov_y: pose.fov_y };
        true
    }
}
