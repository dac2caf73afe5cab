// Scene descriptions loaded from RON, plus the built-in demo scene

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::error::{Error, Result};
use crate::geometry::MeshData;
use crate::material::{Material, MaterialCache, MaterialHandle};
use crate::math::Transform;
use crate::scene::{Light, LightKind, Node, NodeId, NodeKind, Primitive, Scene};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub materials: BTreeMap<String, Material>,
    pub nodes: Vec<NodeDescription>,
    /// Name of the camera node to start from; the first camera otherwise
    pub start_camera: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub kind: KindDescription,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KindDescription {
    Group,
    Shape {
        primitive: Primitive,
        material: MaterialRef,
    },
    Light(Light),
    /// Placement comes from eye/target, relative to the parent node
    Camera {
        eye: Vec3,
        target: Vec3,
        fov_degrees: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MaterialRef {
    Key(String),
    Color([f32; 4]),
}

impl SceneDescription {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let description = ron::from_str(&text).map_err(|source| Error::Ron {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded scene description {}", path.display());
        Ok(description)
    }

    /// Add the described nodes to `scene`. Relative texture and mesh paths
    /// resolve against `base_dir`. Returns the start camera, if any.
    pub fn build(
        &self,
        scene: &mut Scene,
        materials: &mut MaterialCache,
        base_dir: Option<&Path>,
    ) -> Result<Option<NodeId>> {
        for (key, material) in &self.materials {
            let mut material = material.clone();
            material.texture = material.texture.map(|t| resolve(base_dir, t));
            materials.insert(key, material);
        }

        let mut cameras = Vec::new();
        for node in &self.nodes {
            self.build_node(node, None, scene, materials, base_dir, &mut cameras)?;
        }

        let start = match &self.start_camera {
            Some(name) => {
                let found = cameras
                    .iter()
                    .find(|id| scene.get(**id).is_some_and(|n| &n.name == name));
                Some(*found.ok_or_else(|| {
                    Error::InvalidScene(format!("start camera '{name}' is not a camera node"))
                })?)
            }
            None => cameras.first().copied(),
        };
        Ok(start)
    }

    fn build_node(
        &self,
        description: &NodeDescription,
        parent: Option<NodeId>,
        scene: &mut Scene,
        materials: &mut MaterialCache,
        base_dir: Option<&Path>,
        cameras: &mut Vec<NodeId>,
    ) -> Result<()> {
        let name = description.name.clone();
        let transform = description.transform;
        let mut node = match &description.kind {
            KindDescription::Group => Node::group(name, transform),
            KindDescription::Shape {
                primitive,
                material,
            } => {
                let primitive = match primitive {
                    Primitive::Mesh { path } => Primitive::Mesh {
                        path: resolve(base_dir, path.clone()),
                    },
                    other => other.clone(),
                };
                let mut material = material_handle(materials, material, &description.name)?;
                if let Primitive::Mesh { path } = &primitive {
                    material = mesh_material(materials, material, path);
                }
                Node::shape(name, transform, primitive, material)
            }
            KindDescription::Light(light) => Node::light(name, transform, *light),
            // Cameras are placed by eye/target; any transform is ignored
            KindDescription::Camera {
                eye,
                target,
                fov_degrees,
            } => Node::camera(name, &CameraPose::look_at(*eye, *target, *fov_degrees)),
        };
        node.visible = description.visible;
        let is_camera = matches!(node.kind, NodeKind::Camera { .. });
        let id = scene.add(parent, node);
        if is_camera {
            cameras.push(id);
        }
        for child in &description.children {
            self.build_node(child, Some(id), scene, materials, base_dir, cameras)?;
        }
        Ok(())
    }
}

fn material_handle(
    materials: &mut MaterialCache,
    reference: &MaterialRef,
    node: &str,
) -> Result<MaterialHandle> {
    match reference {
        MaterialRef::Key(key) => materials.handle(key).ok_or_else(|| {
            Error::InvalidScene(format!("node '{node}' uses undefined material '{key}'"))
        }),
        MaterialRef::Color(color) => Ok(materials.solid(*color)),
    }
}

/// Untextured meshes take their surface from the OBJ's own material
/// library, on top of the declared material.
fn mesh_material(
    materials: &mut MaterialCache,
    declared: MaterialHandle,
    path: &Path,
) -> MaterialHandle {
    let Some(base) = materials.get(declared) else {
        return declared;
    };
    if base.texture.is_some() {
        return declared;
    }
    let mtl = match MeshData::load_obj_material(path) {
        Ok(Some(mtl)) => mtl,
        Ok(None) => return declared,
        Err(err) => {
            log::warn!("Cannot read materials of {}: {err}", path.display());
            return declared;
        }
    };
    let material = Material::from_mtl(&mtl, path.parent().unwrap_or(Path::new("")), base);
    let key = format!(
        "{}+mtl:{}:{}",
        materials.key(declared).unwrap_or_default(),
        path.display(),
        mtl.name
    );
    materials.get_or_insert_with(&key, || material)
}

fn resolve(base_dir: Option<&Path>, path: PathBuf) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

fn shape(
    name: &str,
    position: Vec3,
    primitive: Primitive,
    material: MaterialRef,
) -> NodeDescription {
    NodeDescription {
        name: name.to_string(),
        transform: Transform::from_position(position),
        visible: true,
        kind: KindDescription::Shape {
            primitive,
            material,
        },
        children: Vec::new(),
    }
}

fn light(name: &str, transform: Transform, light: Light) -> NodeDescription {
    NodeDescription {
        name: name.to_string(),
        transform,
        visible: true,
        kind: KindDescription::Light(light),
        children: Vec::new(),
    }
}

fn camera(name: &str, eye: Vec3, target: Vec3) -> NodeDescription {
    NodeDescription {
        name: name.to_string(),
        transform: Transform::identity(),
        visible: true,
        kind: KindDescription::Camera {
            eye,
            target,
            fov_degrees: 60.0,
        },
        children: Vec::new(),
    }
}

/// Built-in scene used when no scene file is given: one of each
/// procedural primitive on a floor, three kinds of light and two
/// stored viewpoints.
pub fn demo() -> SceneDescription {
    let mut materials = BTreeMap::new();
    materials.insert(
        "floor".to_string(),
        Material {
            color: [0.35, 0.37, 0.4, 1.0],
            specular: 0.05,
            ..Material::default()
        },
    );
    materials.insert(
        "metal".to_string(),
        Material {
            color: [0.8, 0.8, 0.85, 1.0],
            specular: 0.9,
            shininess: 96.0,
            ..Material::default()
        },
    );

    let mut pillar = shape(
        "pillar",
        Vec3::new(2.5, 1.0, 0.0),
        Primitive::Cylinder {
            radius_top: 0.4,
            radius_bottom: 0.5,
            height: 2.0,
            segments: 32,
        },
        MaterialRef::Key("metal".to_string()),
    );
    pillar.children.push(shape(
        "cap",
        Vec3::new(0.0, 1.4, 0.0),
        Primitive::Cone {
            radius: 0.6,
            height: 0.8,
            segments: 32,
        },
        MaterialRef::Color([0.9, 0.3, 0.2, 1.0]),
    ));

    let nodes = vec![
        shape(
            "floor",
            Vec3::new(0.0, -0.05, 0.0),
            Primitive::Box {
                size: Vec3::new(20.0, 0.1, 20.0),
            },
            MaterialRef::Key("floor".to_string()),
        ),
        shape(
            "crate",
            Vec3::new(-2.5, 0.5, 0.0),
            Primitive::Box { size: Vec3::ONE },
            MaterialRef::Color([0.8, 0.6, 0.3, 1.0]),
        ),
        pillar,
        shape(
            "egg",
            Vec3::new(0.0, 0.75, -2.0),
            Primitive::Ellipsoid {
                radii: Vec3::new(0.5, 0.75, 0.5),
                segments: 32,
                rings: 16,
            },
            MaterialRef::Color([0.3, 0.6, 0.9, 1.0]),
        ),
        light(
            "ambient",
            Transform::identity(),
            Light {
                kind: LightKind::Ambient,
                color: [1.0, 1.0, 1.0],
                intensity: 0.15,
            },
        ),
        light(
            "sun",
            Transform::new(
                Vec3::new(0.0, 10.0, 0.0),
                Quat::from_rotation_x(0.6) * Quat::from_rotation_z(0.4),
                Vec3::ONE,
            ),
            Light {
                kind: LightKind::Directional,
                color: [1.0, 0.95, 0.85],
                intensity: 0.8,
            },
        ),
        light(
            "lamp",
            Transform::from_position(Vec3::new(0.0, 2.5, 2.0)),
            Light {
                kind: LightKind::Point { range: 8.0 },
                color: [1.0, 0.7, 0.4],
                intensity: 1.5,
            },
        ),
        camera("overview", Vec3::new(0.0, 3.0, 8.0), Vec3::new(0.0, 0.5, 0.0)),
        camera("side", Vec3::new(7.0, 2.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
    ];

    SceneDescription {
        materials,
        nodes,
        start_camera: Some("overview".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scene_builds() {
        let mut scene = Scene::new();
        let mut materials = MaterialCache::new();
        let start = demo().build(&mut scene, &mut materials, None).unwrap();

        assert_eq!(scene.get(start.unwrap()).unwrap().name, "overview");
        assert_eq!(scene.cameras().len(), 2);
        assert_eq!(scene.lights().len(), 3);
        assert_eq!(scene.shapes().len(), 5);
        let cap = scene.find("cap").unwrap();
        assert_eq!(scene.get(cap).unwrap().parent(), scene.find("pillar"));
        for item in scene.shapes() {
            assert!(!item.primitive.mesh_data().unwrap().is_empty());
        }
    }

    #[test]
    fn bundled_city_block_scene_builds() {
        let description: SceneDescription =
            ron::from_str(include_str!("../scenes/city_block.ron")).unwrap();
        let mut scene = Scene::new();
        let mut materials = MaterialCache::new();
        let start = description.build(&mut scene, &mut materials, None).unwrap();

        assert_eq!(start, scene.find("street"));
        assert_eq!(scene.cameras().len(), 2);
        assert_eq!(scene.lights().len(), 5);
        assert_eq!(scene.shapes().len(), 6);
        // Board of the turned sign faces along X
        let board = scene.find("green board").unwrap();
        let normal = scene.world_matrix(board).transform_vector3(Vec3::Z);
        assert!(normal.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn parses_ron_with_nested_children() {
        let text = r#"(
            materials: {
                "brick": (color: (0.7, 0.3, 0.2, 1.0), texture: Some("textures/brick.png")),
            },
            nodes: [
                (
                    name: "wall",
                    transform: (position: (0.0, 1.0, 0.0)),
                    kind: Shape(primitive: Box(size: (4.0, 2.0, 0.2)), material: Key("brick")),
                    children: [
                        (name: "lamp", kind: Light((kind: Point(range: 5.0), color: (1.0, 1.0, 1.0), intensity: 2.0))),
                    ],
                ),
                (name: "view", kind: Camera(eye: (0.0, 1.0, 6.0), target: (0.0, 1.0, 0.0), fov_degrees: 45.0)),
            ],
        )"#;
        let description: SceneDescription = ron::from_str(text).unwrap();
        let mut scene = Scene::new();
        let mut materials = MaterialCache::new();
        let start = description
            .build(&mut scene, &mut materials, Some(Path::new("/assets")))
            .unwrap();

        assert_eq!(start, scene.find("view"));
        let lights = scene.lights();
        assert_eq!(lights.len(), 1);
        assert!(lights[0].position.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
        assert_eq!(
            materials.get(materials.handle("brick").unwrap()).unwrap().texture.as_deref(),
            Some(Path::new("/assets/textures/brick.png"))
        );
    }

    #[test]
    fn untextured_mesh_uses_its_mtl() {
        let dir = std::env::temp_dir().join("scenecraft-scene-mtl");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("crate.obj"),
            "mtllib crate.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl wood\nf 1 2 3\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("crate.mtl"),
            "newmtl wood\nKd 0.8 0.6 0.4\nNs 50\nmap_Kd wood.png\n",
        )
        .unwrap();

        let text = r#"(
            materials: {
                "painted": (texture: Some("paint.png")),
            },
            nodes: [
                (name: "plain", kind: Shape(primitive: Mesh(path: "crate.obj"), material: Color((1.0, 1.0, 1.0, 1.0)))),
                (name: "painted", kind: Shape(primitive: Mesh(path: "crate.obj"), material: Key("painted"))),
            ],
        )"#;
        let description: SceneDescription = ron::from_str(text).unwrap();
        let mut scene = Scene::new();
        let mut materials = MaterialCache::new();
        description.build(&mut scene, &mut materials, Some(&dir)).unwrap();

        let material_of = |name: &str| {
            let shapes = scene.shapes();
            let item = shapes
                .iter()
                .find(|item| Some(item.id) == scene.find(name))
                .unwrap();
            materials.get(item.material).unwrap().clone()
        };
        let plain = material_of("plain");
        assert_eq!(plain.texture, Some(dir.join("wood.png")));
        assert_eq!(plain.shininess, 50.0);
        assert_eq!(plain.color, [0.8, 0.6, 0.4, 1.0]);
        assert_eq!(material_of("painted").texture, Some(dir.join("paint.png")));
    }

    #[test]
    fn undefined_material_is_rejected() {
        let description = SceneDescription {
            nodes: vec![shape(
                "ghost",
                Vec3::ZERO,
                Primitive::Box { size: Vec3::ONE },
                MaterialRef::Key("missing".to_string()),
            )],
            ..SceneDescription::default()
        };
        let result = description.build(&mut Scene::new(), &mut MaterialCache::new(), None);
        assert!(matches!(result, Err(Error::InvalidScene(_))));
    }

    #[test]
    fn unknown_start_camera_is_rejected() {
        let description = SceneDescription {
            start_camera: Some("nowhere".to_string()),
            ..demo()
        };
        let result = description.build(&mut Scene::new(), &mut MaterialCache::new(), None);
        assert!(matches!(result, Err(Error::InvalidScene(_))));
    }
}
