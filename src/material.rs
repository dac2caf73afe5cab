// Materials interned by string key

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Linear RGBA, multiplied with the texture
    pub color: [f32; 4],
    pub texture: Option<PathBuf>,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
            specular: 0.3,
            shininess: 32.0,
        }
    }
}

impl Material {
    pub fn solid(color: [f32; 4]) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Material from an MTL entry. Texture paths resolve against
    /// `base_dir`; values the entry leaves out come from `fallback`.
    pub fn from_mtl(mtl: &tobj::Material, base_dir: &Path, fallback: &Material) -> Self {
        Self {
            color: match mtl.diffuse {
                Some([r, g, b]) => [r, g, b, mtl.dissolve.unwrap_or(1.0)],
                None => fallback.color,
            },
            texture: mtl
                .diffuse_texture
                .as_ref()
                .map(|texture| base_dir.join(texture))
                .or_else(|| fallback.texture.clone()),
            specular: mtl
                .specular
                .map_or(fallback.specular, |[r, g, b]| (r + g + b) / 3.0),
            shininess: mtl.shininess.unwrap_or(fallback.shininess),
        }
    }
}

/// Stable index into a [`MaterialCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(usize);

/// Materials deduplicated by key. Handles stay valid for the cache's
/// lifetime; redefining a key updates the material in place.
#[derive(Debug, Default)]
pub struct MaterialCache {
    materials: Vec<Material>,
    keys: Vec<String>,
    by_key: HashMap<String, MaterialHandle>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the material stored under `key`.
    pub fn insert(&mut self, key: &str, material: Material) -> MaterialHandle {
        if let Some(&handle) = self.by_key.get(key) {
            self.materials[handle.0] = material;
            return handle;
        }
        self.push(key, material)
    }

    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        create: impl FnOnce() -> Material,
    ) -> MaterialHandle {
        match self.by_key.get(key) {
            Some(&handle) => handle,
            None => self.push(key, create()),
        }
    }

    /// Shared material for a flat colour; equal colours share one entry.
    pub fn solid(&mut self, color: [f32; 4]) -> MaterialHandle {
        let key = Self::color_key(color);
        self.get_or_insert_with(&key, || Material::solid(color))
    }

    pub fn handle(&self, key: &str) -> Option<MaterialHandle> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle.0)
    }

    pub fn key(&self, handle: MaterialHandle) -> Option<&str> {
        self.keys.get(handle.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Canonical key for a colour, quantised to 8 bits per channel.
    pub fn color_key(color: [f32; 4]) -> String {
        let [r, g, b, a] = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        format!("solid:#{r:02x}{g:02x}{b:02x}{a:02x}")
    }

    fn push(&mut self, key: &str, material: Material) -> MaterialHandle {
        let handle = MaterialHandle(self.materials.len());
        self.materials.push(material);
        self.keys.push(key.to_string());
        self.by_key.insert(key.to_string(), handle);
        log::debug!("Material '{key}' cached as #{}", handle.0);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_same_handle() {
        let mut cache = MaterialCache::new();
        let a = cache.get_or_insert_with("brick", || Material {
            texture: Some("brick.png".into()),
            ..Material::default()
        });
        let b = cache.get_or_insert_with("brick", || panic!("should not rebuild"));
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.key(a), Some("brick"));
    }

    #[test]
    fn equal_colours_share_a_material() {
        let mut cache = MaterialCache::new();
        let red = cache.solid([1.0, 0.0, 0.0, 1.0]);
        let also_red = cache.solid([1.0, 0.0001, 0.0, 1.0]);
        let blue = cache.solid([0.0, 0.0, 1.0, 1.0]);
        assert_eq!(red, also_red);
        assert_ne!(red, blue);
        assert_eq!(cache.key(red), Some("solid:#ff0000ff"));
    }

    #[test]
    fn mtl_values_override_fallback() {
        let mtl = tobj::Material {
            diffuse: Some([0.8, 0.6, 0.4]),
            shininess: Some(50.0),
            diffuse_texture: Some("wood.png".to_string()),
            ..tobj::Material::default()
        };
        let fallback = Material {
            specular: 0.7,
            ..Material::default()
        };
        let material = Material::from_mtl(&mtl, Path::new("/models"), &fallback);
        assert_eq!(material.color, [0.8, 0.6, 0.4, 1.0]);
        assert_eq!(material.texture.as_deref(), Some(Path::new("/models/wood.png")));
        assert_eq!(material.shininess, 50.0);
        assert_eq!(material.specular, 0.7);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut cache = MaterialCache::new();
        let first = cache.insert("floor", Material::solid([0.5, 0.5, 0.5, 1.0]));
        let second = cache.insert("floor", Material::solid([0.1, 0.1, 0.1, 1.0]));
        assert_eq!(first, second);
        assert_eq!(cache.get(first).unwrap().color[0], 0.1);
    }

    #[test]
    fn edits_through_handle_are_visible_by_key() {
        let mut cache = MaterialCache::new();
        let handle = cache.insert("metal", Material::default());
        cache.get_mut(handle).unwrap().shininess = 128.0;
        assert_eq!(cache.get(cache.handle("metal").unwrap()).unwrap().shininess, 128.0);
        assert!(cache.handle("wood").is_none());
    }
}
