// Building identities, names and materials

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, RegistryError};
use crate::input_geojson::GeoFeature;
use crate::kernel_in::BuildingId;
use crate::kernel_out::MeshAttributes;
use crate::materials::{
    Material, MaterialDescriptor, MaterialTemplate, TextureCache, TextureSettings,
    default_palette,
};
use crate::scene::{MaterialId, NodeId, NodeKind, SceneGraph};
use crate::tagticks::color_to_css;

static CAMPUS_NAMES: &str = include_str!("../assets/building_names.json");
static CAMPUS_TEXTURES: &str = include_str!("../assets/building_textures.json");

/// Name and texture overrides keyed by the building id string. Both are optional per id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SideTables {
    pub names: HashMap<String, String>,
    pub textures: HashMap<String, String>,
}

fn parse_table(text: &str, path: &str) -> Result<HashMap<String, String>, ConfigError> {
    serde_json::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })
}

fn read_table(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let label = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: label.clone(),
        source,
    })?;
    parse_table(&text, &label)
}

impl SideTables {
    pub fn from_json(names: &str, textures: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            names: parse_table(names, "names")?,
            textures: parse_table(textures, "textures")?,
        })
    }

    /// A missing path means an empty table
    pub fn from_files(names: Option<&Path>, textures: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self {
            names: names.map(read_table).transpose()?.unwrap_or_default(),
            textures: textures.map(read_table).transpose()?.unwrap_or_default(),
        })
    }

    /// The tables of the campus data set, built into the binary
    pub fn campus() -> Result<Self, ConfigError> {
        Self::from_json(CAMPUS_NAMES, CAMPUS_TEXTURES)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildingRecord {
    pub building_id: BuildingId,
    pub display_name: String,
    pub height_meters: f64,
    pub material_descriptor: MaterialDescriptor,
    pub material: MaterialId,
    pub mesh_handles: Vec<NodeId>,
}

/// What the info display gets for a highlighted building
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildingInfo {
    pub building_id: BuildingId,
    pub display_name: String,
    pub height_meters: f64,
    pub has_texture: bool,
    pub base_color: String,
}

pub struct BuildingRegistry {
    side_tables: SideTables,
    palette: Vec<MaterialTemplate>,
    texture_settings: TextureSettings,
    textures: TextureCache,
    // next palette entry, counts every registered building
    palette_cursor: usize,
    records: BTreeMap<BuildingId, BuildingRecord>,
}

impl BuildingRegistry {
    pub fn new(
        side_tables: SideTables,
        palette: Vec<MaterialTemplate>,
        texture_settings: TextureSettings,
        textures: TextureCache,
    ) -> Self {
        let palette = if palette.is_empty() {
            default_palette()
        } else {
            palette
        };
        Self {
            side_tables,
            palette,
            texture_settings,
            textures,
            palette_cursor: 0,
            records: BTreeMap::new(),
        }
    }

    /// Override table, then the `name` property, then "Building {id}"
    pub fn resolve_name(&self, building_id: BuildingId, feature: &GeoFeature) -> String {
        self.side_tables
            .names
            .get(&building_id.as_key())
            .cloned()
            .or_else(|| feature.name())
            .unwrap_or_else(|| format!("Building {building_id}"))
    }

    // Texture if the table has one and it loads, else the palette entry at the cursor.
    fn resolve_material(&mut self, building_id: BuildingId) -> (MaterialDescriptor, Material) {
        let texture_path = self.side_tables.textures.get(&building_id.as_key()).cloned();
        if let Some(texture_path) = texture_path {
            if let Some(texture) = self.textures.get(&texture_path) {
                let material = Material::textured(texture, &self.texture_settings);
                return (MaterialDescriptor::Textured { texture_path }, material);
            }
        }
        let palette_index = self.palette_cursor % self.palette.len();
        (
            MaterialDescriptor::Palette { palette_index },
            self.palette[palette_index].to_material(),
        )
    }

    /// Creates the record of one building, with its own material and scene nodes for `meshes`.
    /// `feature` is the source feature the name and height are taken from.
    pub fn register(
        &mut self,
        building_id: BuildingId,
        feature: &GeoFeature,
        height_meters: f64,
        meshes: Vec<MeshAttributes>,
        scene: &mut SceneGraph,
    ) -> Result<&BuildingRecord, RegistryError> {
        if self.records.contains_key(&building_id) {
            return Err(RegistryError::AlreadyRegistered(building_id));
        }

        let display_name = self.resolve_name(building_id, feature);
        let (material_descriptor, material) = self.resolve_material(building_id);
        self.palette_cursor += 1;

        let material = scene.add_material(material);
        let mesh_handles = meshes
            .into_iter()
            .map(|mesh| scene.add_node(NodeKind::Building(building_id), mesh, material))
            .collect();

        debug!("registered {building_id}: {display_name}, {material_descriptor:?}");
        let record = BuildingRecord {
            building_id,
            display_name,
            height_meters,
            material_descriptor,
            material,
            mesh_handles,
        };
        Ok(self.records.entry(building_id).or_insert(record))
    }

    pub fn get(&self, building_id: BuildingId) -> Option<&BuildingRecord> {
        self.records.get(&building_id)
    }

    /// All records, ordered by id
    pub fn records(&self) -> impl Iterator<Item = &BuildingRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn palette_cursor(&self) -> usize {
        self.palette_cursor
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn info(&self, building_id: BuildingId, scene: &SceneGraph) -> Option<BuildingInfo> {
        let record = self.get(building_id)?;
        let material = scene.material(record.material)?;
        Some(BuildingInfo {
            building_id,
            display_name: record.display_name.clone(),
            height_meters: record.height_meters,
            has_texture: material.has_texture(),
            base_color: color_to_css(&material.base_color),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TextureError;
    use crate::kernel_in::GeographicCoordinates;
    use crate::materials::{DeferredTextureLoader, Texture, TextureLoader};
    use serde_json::json;
    use std::sync::Arc;

    struct NoTextures;

    impl TextureLoader for NoTextures {
        fn load(&self, path: &str) -> Result<Texture, TextureError> {
            Err(TextureError::NotFound(path.into()))
        }
    }

    fn feature() -> GeoFeature {
        GeoFeature::polygon(
            vec![
                GeographicCoordinates::new(0.0, 0.0),
                GeographicCoordinates::new(0.0, 1.0),
                GeographicCoordinates::new(1.0, 1.0),
            ],
            vec![],
        )
    }

    fn palette() -> Vec<MaterialTemplate> {
        vec![
            MaterialTemplate::new("Plaster Facade", "#87ceeb", 0.9, 0.0),
            MaterialTemplate::new("Sandstone", "#d2b48c", 0.8, 0.0),
            MaterialTemplate::new("Concrete", "#a9a9a9", 0.9, 0.0),
        ]
    }

    fn tables() -> SideTables {
        SideTables::from_json(
            r#"{"1": "Rectorate"}"#,
            r#"{"2": "red_brick.jpg", "3": "red_brick.jpg", "4": "missing.jpg"}"#,
        )
        .unwrap()
    }

    fn registry(loader: Box<dyn TextureLoader>) -> BuildingRegistry {
        BuildingRegistry::new(
            tables(),
            palette(),
            TextureSettings::default(),
            TextureCache::new(loader),
        )
    }

    #[test]
    fn names_fall_back_in_order() {
        let registry = registry(Box::new(NoTextures));
        let named = feature().with_property("name", json!("Library"));
        assert_eq!(registry.resolve_name(BuildingId(1), &named), "Rectorate");
        assert_eq!(registry.resolve_name(BuildingId(2), &named), "Library");
        assert_eq!(registry.resolve_name(BuildingId(2), &feature()), "Building 2");
    }

    #[test]
    fn cursor_counts_every_building() {
        let mut registry = registry(Box::new(DeferredTextureLoader { repeat: 2.0 }));
        let mut scene = SceneGraph::new();
        let mut descriptors = Vec::new();
        for id in 1..=5 {
            let record = registry
                .register(BuildingId(id), &feature(), 10.0, vec![MeshAttributes::new()], &mut scene)
                .unwrap();
            descriptors.push(record.material_descriptor.clone());
        }
        assert_eq!(descriptors[0], MaterialDescriptor::Palette { palette_index: 0 });
        assert!(matches!(descriptors[1], MaterialDescriptor::Textured { .. }));
        assert!(matches!(descriptors[2], MaterialDescriptor::Textured { .. }));
        // textured buildings advanced the cursor too
        assert!(matches!(descriptors[3], MaterialDescriptor::Textured { .. }));
        assert_eq!(descriptors[4], MaterialDescriptor::Palette { palette_index: 1 });
        assert_eq!(registry.palette_cursor(), 5);
        assert_eq!(registry.texture_cache().len(), 2);
    }

    #[test]
    fn shared_texture_distinct_materials() {
        let mut registry = registry(Box::new(DeferredTextureLoader { repeat: 2.0 }));
        let mut scene = SceneGraph::new();
        let first = registry
            .register(BuildingId(2), &feature(), 10.0, vec![], &mut scene)
            .unwrap()
            .material;
        let second = registry
            .register(BuildingId(3), &feature(), 10.0, vec![], &mut scene)
            .unwrap()
            .material;
        assert_ne!(first, second);

        let first_texture = scene.material(first).unwrap().texture.clone().unwrap();
        let second_texture = scene.material(second).unwrap().texture.clone().unwrap();
        assert!(Arc::ptr_eq(&first_texture, &second_texture));

        scene.material_mut(first).unwrap().emissive = [0.1, 0.2, 0.3, 1.0];
        assert_eq!(scene.material(second).unwrap().emissive, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_texture_falls_back_to_palette() {
        let mut registry = registry(Box::new(NoTextures));
        let mut scene = SceneGraph::new();
        registry
            .register(BuildingId(1), &feature(), 10.0, vec![], &mut scene)
            .unwrap();
        let record = registry
            .register(BuildingId(4), &feature(), 10.0, vec![], &mut scene)
            .unwrap();
        assert_eq!(record.material_descriptor, MaterialDescriptor::Palette { palette_index: 1 });

        let info = registry.info(BuildingId(4), &scene).unwrap();
        assert!(!info.has_texture);
        assert_eq!(info.base_color, "rgb(210, 180, 140)");
        assert_eq!(info.display_name, "Building 4");
    }

    #[test]
    fn ids_are_never_registered_twice() {
        let mut registry = registry(Box::new(NoTextures));
        let mut scene = SceneGraph::new();
        let mesh = MeshAttributes::new();
        let record = registry
            .register(BuildingId(9), &feature(), 12.0, vec![mesh.clone(), mesh], &mut scene)
            .unwrap();
        assert_eq!(record.mesh_handles, vec![NodeId(0), NodeId(1)]);
        assert_eq!(
            registry
                .register(BuildingId(9), &feature(), 12.0, vec![], &mut scene)
                .err(),
            Some(RegistryError::AlreadyRegistered(BuildingId(9)))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.palette_cursor(), 1);
    }

    #[test]
    fn campus_tables_are_built_in() {
        let tables = SideTables::campus().unwrap();
        assert_eq!(tables.textures.get("1").map(|path| path.contains("red_brick")), Some(true));
        assert!(!tables.names.is_empty());
    }
}
