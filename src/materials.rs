// Material templates, per-mesh materials and the shared texture cache

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::TextureError;
use crate::kernel_out::RenderColor;
use crate::tagticks::parse_color_or;

pub static WHITE: RenderColor = [1.0, 1.0, 1.0, 1.0];
pub static BLACK: RenderColor = [0.0, 0.0, 0.0, 1.0];

/// A named material look. Building palette entries and the surfaces (ground, roads, walkways) use it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialTemplate {
    pub name: String,
    pub color: String,
    pub roughness: f32,
    pub metalness: f32,
}

impl MaterialTemplate {
    pub fn new(name: &str, color: &str, roughness: f32, metalness: f32) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            roughness,
            metalness,
        }
    }

    pub fn to_material(&self) -> Material {
        Material {
            name: self.name.clone(),
            base_color: parse_color_or(&self.color, WHITE),
            emissive: BLACK,
            roughness: self.roughness,
            metalness: self.metalness,
            texture: None,
        }
    }
}

/// Untextured building materials, used round-robin
pub fn default_palette() -> Vec<MaterialTemplate> {
    vec![MaterialTemplate::new("Plaster Facade", "#87ceeb", 0.9, 0.0)]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceMaterials {
    pub ground: MaterialTemplate,
    pub road: MaterialTemplate,
    pub road_marking: MaterialTemplate,
    pub road_area: MaterialTemplate,
    pub walkway: MaterialTemplate,
}

impl Default for SurfaceMaterials {
    fn default() -> Self {
        Self {
            ground: MaterialTemplate::new("Grass", "#4a7c23", 0.9, 0.1),
            road: MaterialTemplate::new("Asphalt", "#2d2d2d", 0.85, 0.1),
            road_marking: MaterialTemplate::new("Center Line", "#ffdd00", 1.0, 0.0),
            road_area: MaterialTemplate::new("Road Area", "#111111", 0.9, 0.0),
            walkway: MaterialTemplate::new("Concrete Pavers", "#b4b0a8", 0.8, 0.0),
        }
    }
}

/// How textured building materials look
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    pub repeat: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            repeat: 2.0,
            roughness: 0.7,
            metalness: 0.2,
        }
    }
}

/// A loaded texture. Shared by every material using the same path and never changed after loading.
#[derive(Debug, PartialEq)]
pub struct Texture {
    pub path: String,
    pub repeat: [f32; 2],
}

pub trait TextureLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Texture, TextureError>;
}

/// Textures from a local directory. Only checks the file is there, decoding is the renderer's job.
#[derive(Debug, Clone)]
pub struct FileTextureLoader {
    root: PathBuf,
    repeat: f32,
}

impl FileTextureLoader {
    pub fn new(root: impl Into<PathBuf>, repeat: f32) -> Self {
        Self {
            root: root.into(),
            repeat,
        }
    }
}

impl TextureLoader for FileTextureLoader {
    fn load(&self, path: &str) -> Result<Texture, TextureError> {
        let full_path = self.root.join(path);
        match std::fs::metadata(&full_path) {
            Ok(metadata) if metadata.is_file() => Ok(Texture {
                path: full_path.to_string_lossy().into_owned(),
                repeat: [self.repeat, self.repeat],
            }),
            Ok(_) => Err(TextureError::NotFound(path.into())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(TextureError::NotFound(path.into()))
            }
            Err(source) => Err(TextureError::Io {
                path: path.into(),
                source,
            }),
        }
    }
}

/// Accepts every path. For remote data, where the renderer fetches the image itself.
#[derive(Debug, Clone)]
pub struct DeferredTextureLoader {
    pub repeat: f32,
}

impl TextureLoader for DeferredTextureLoader {
    fn load(&self, path: &str) -> Result<Texture, TextureError> {
        Ok(Texture {
            path: path.into(),
            repeat: [self.repeat, self.repeat],
        })
    }
}

/// Loads each distinct path once. Entries are never evicted, a failed path stays failed.
pub struct TextureCache {
    loader: Box<dyn TextureLoader>,
    entries: HashMap<String, Option<Arc<Texture>>>,
}

impl TextureCache {
    pub fn new(loader: Box<dyn TextureLoader>) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &str) -> Option<Arc<Texture>> {
        if let Some(entry) = self.entries.get(path) {
            return entry.clone();
        }
        let entry = match self.loader.load(path) {
            Ok(texture) => {
                debug!("texture loaded: {path}");
                Some(Arc::new(texture))
            }
            Err(error) => {
                warn!("{error}, using the palette instead");
                None
            }
        };
        self.entries.insert(path.into(), entry.clone());
        entry
    }

    /// Number of distinct paths asked for, loaded or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a building's material was made from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialDescriptor {
    Textured { texture_path: String },
    Palette { palette_index: usize },
}

/// A material owned by the scene. Cloning shares the texture, never the emissive.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: RenderColor,
    pub emissive: RenderColor,
    pub roughness: f32,
    pub metalness: f32,
    pub texture: Option<Arc<Texture>>,
}

impl Material {
    pub fn textured(texture: Arc<Texture>, settings: &TextureSettings) -> Self {
        Self {
            name: texture.path.clone(),
            base_color: WHITE,
            emissive: BLACK,
            roughness: settings.roughness,
            metalness: settings.metalness,
            texture: Some(texture),
        }
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }
}
