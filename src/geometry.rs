// CPU-side mesh generation for the scene primitives

use std::f32::consts::{PI, TAU};
use std::path::Path;

use glam::{Vec2, Vec3};

use crate::error::{Error, Result};

const MIN_SEGMENTS: u32 = 3;

// Vertex layout shared with the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// Indexed triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned box centred on the origin.
    pub fn cuboid(size: Vec3) -> Self {
        let half = size * 0.5;
        // (normal, u, v) with u × v = normal so quads wind outward
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut mesh = Self::default();
        for (normal, u, v) in faces {
            let base = mesh.vertices.len() as u32;
            for (a, b) in corners {
                let position = (normal + u * a + v * b) * half;
                let uv = Vec2::new((a + 1.0) * 0.5, (1.0 - b) * 0.5);
                mesh.vertices.push(Vertex::new(position, normal, uv));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Capped cylinder along Y, centred on the origin. A zero radius at
    /// either end skips that cap, which makes a cone.
    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(MIN_SEGMENTS);
        let half = height * 0.5;
        let slope = if height > 0.0 {
            (radius_bottom - radius_top) / height
        } else {
            0.0
        };

        let mut mesh = Self::default();
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let (sin, cos) = (t * TAU).sin_cos();
            let normal = Vec3::new(sin, slope, cos).normalize();
            mesh.vertices.push(Vertex::new(
                Vec3::new(radius_bottom * sin, -half, radius_bottom * cos),
                normal,
                Vec2::new(t, 1.0),
            ));
            mesh.vertices.push(Vertex::new(
                Vec3::new(radius_top * sin, half, radius_top * cos),
                normal,
                Vec2::new(t, 0.0),
            ));
        }
        for i in 0..segments {
            let b0 = 2 * i;
            let (t0, b1, t1) = (b0 + 1, b0 + 2, b0 + 3);
            mesh.indices.extend_from_slice(&[b0, b1, t1, t1, t0, b0]);
        }

        if radius_top > 0.0 {
            mesh.push_cap(radius_top, half, segments, true);
        }
        if radius_bottom > 0.0 {
            mesh.push_cap(radius_bottom, -half, segments, false);
        }
        mesh
    }

    pub fn cone(radius: f32, height: f32, segments: u32) -> Self {
        Self::cylinder(0.0, radius, height, segments)
    }

    /// UV sphere scaled by `radii`. Normals use the ellipsoid gradient,
    /// not the stretched sphere normal.
    pub fn ellipsoid(radii: Vec3, segments: u32, rings: u32) -> Self {
        let segments = segments.max(MIN_SEGMENTS);
        let rings = rings.max(2);
        let safe_radii = radii.max(Vec3::splat(f32::EPSILON));

        let mut mesh = Self::default();
        for r in 0..=rings {
            let v = r as f32 / rings as f32;
            let (ring_sin, ring_cos) = (v * PI).sin_cos();
            for i in 0..=segments {
                let u = i as f32 / segments as f32;
                let (sin, cos) = (u * TAU).sin_cos();
                let unit = Vec3::new(ring_sin * sin, ring_cos, ring_sin * cos);
                let normal = (unit / safe_radii).normalize_or_zero();
                mesh.vertices
                    .push(Vertex::new(unit * radii, normal, Vec2::new(u, v)));
            }
        }

        let stride = segments + 1;
        for r in 0..rings {
            for i in 0..segments {
                let a = r * stride + i;
                let b = a + stride;
                if r != rings - 1 {
                    mesh.indices.extend_from_slice(&[b, b + 1, a + 1]);
                }
                if r != 0 {
                    mesh.indices.extend_from_slice(&[a + 1, a, b]);
                }
            }
        }
        mesh
    }

    /// The first material an OBJ file uses from its material library.
    /// Files without a readable library yield `None`.
    pub fn load_obj_material(path: &Path) -> Result<Option<tobj::Material>> {
        let (models, materials) =
            tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| Error::Obj {
                path: path.display().to_string(),
                source,
            })?;
        let materials = match materials {
            Ok(materials) => materials,
            Err(err) => {
                log::debug!("{} has no usable material library: {err}", path.display());
                return Ok(None);
            }
        };
        let id = models
            .iter()
            .find_map(|model| model.mesh.material_id)
            .unwrap_or(0);
        Ok(materials.into_iter().nth(id))
    }

    /// Load a Wavefront OBJ file. All models are merged into one mesh;
    /// missing normals are computed from the faces.
    pub fn load_obj(path: &Path) -> Result<Self> {
        let (models, _) =
            tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| Error::Obj {
                path: path.display().to_string(),
                source,
            })?;

        let mut mesh = Self::default();
        let mut has_all_normals = true;
        for model in &models {
            let data = &model.mesh;
            let base = mesh.vertices.len() as u32;
            let count = data.positions.len() / 3;
            let has_normals = data.normals.len() == data.positions.len();
            let has_uvs = data.texcoords.len() / 2 == count;
            has_all_normals &= has_normals;

            for i in 0..count {
                let position = Vec3::from_slice(&data.positions[i * 3..i * 3 + 3]);
                let normal = if has_normals {
                    Vec3::from_slice(&data.normals[i * 3..i * 3 + 3])
                } else {
                    Vec3::ZERO
                };
                let uv = if has_uvs {
                    // OBJ puts v=0 at the bottom
                    Vec2::new(data.texcoords[i * 2], 1.0 - data.texcoords[i * 2 + 1])
                } else {
                    Vec2::ZERO
                };
                mesh.vertices.push(Vertex::new(position, normal, uv));
            }
            mesh.indices.extend(data.indices.iter().map(|i| base + i));
        }

        if !has_all_normals {
            mesh.compute_normals();
        }
        log::debug!(
            "Loaded {} ({} vertices, {} triangles, bounds {:?})",
            path.display(),
            mesh.vertices.len(),
            mesh.indices.len() / 3,
            mesh.bounds()
        );
        Ok(mesh)
    }

    /// Replace vertex normals with area-weighted face normals.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let pa = Vec3::from(self.vertices[a].position);
            let pb = Vec3::from(self.vertices[b].position);
            let pc = Vec3::from(self.vertices[c].position);
            let face = (pb - pa).cross(pc - pa);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from(v.position));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    fn push_cap(&mut self, radius: f32, y: f32, segments: u32, top: bool) {
        let normal = if top { Vec3::Y } else { Vec3::NEG_Y };
        let centre = self.vertices.len() as u32;
        self.vertices.push(Vertex::new(
            Vec3::new(0.0, y, 0.0),
            normal,
            Vec2::splat(0.5),
        ));
        for i in 0..=segments {
            let (sin, cos) = (i as f32 / segments as f32 * TAU).sin_cos();
            self.vertices.push(Vertex::new(
                Vec3::new(radius * sin, y, radius * cos),
                normal,
                Vec2::new(0.5 + sin * 0.5, 0.5 - cos * 0.5),
            ));
        }
        for i in 0..segments {
            let (p0, p1) = (centre + 1 + i, centre + 2 + i);
            if top {
                self.indices.extend_from_slice(&[centre, p0, p1]);
            } else {
                self.indices.extend_from_slice(&[centre, p1, p0]);
            }
        }
    }
}
