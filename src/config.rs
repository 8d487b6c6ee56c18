// Settings of one campus scene. Every field defaults to the campus data set.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::extrude::{DashPattern, RibbonProfile};
use crate::kernel_in::{GeoBounds, Projector};
use crate::kernel_out::RenderColor;
use crate::materials::{MaterialTemplate, SurfaceMaterials, TextureSettings, default_palette};
use crate::picking::Camera;
use crate::tagticks::{DEFAULT_BUILDING_HEIGHT, parse_color_or};

/// Which walkway holes are cut out of which walkway polygon
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleAssociation {
    /// only holes lying inside the polygon
    #[default]
    PerFeature,
    /// every hole of the collection from every polygon
    Global,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampusConfig {
    /// Directory or http(s) URL the GeoJSON files are read from
    pub data: String,
    /// Directory the building texture paths are relative to
    pub texture_root: String,
    pub projector: Projector,
    pub bounds: GeoBounds,

    pub batch_size: usize,
    pub source_count: u32,
    /// `{index}` is replaced by the 1-based source index
    pub source_pattern: String,
    pub roads_file: Option<String>,
    pub walkways_file: Option<String>,

    pub default_height: f64,
    /// meters to scene units
    pub height_scale: f64,

    pub road_width: f64,
    pub road_steps: usize,
    pub road_elevation: f64,
    pub dash_length: f64,
    pub dash_gap: f64,
    pub line_width: f64,
    pub dash_steps: usize,
    pub marking_elevation: f64,
    pub road_area_depth: f64,
    pub walkway_depth: f64,
    pub hole_association: HoleAssociation,

    pub ground_size: f64,
    pub ground_elevation: f64,

    pub palette: Vec<MaterialTemplate>,
    pub surfaces: SurfaceMaterials,
    pub texture: TextureSettings,
    pub highlight_emissive: String,
    pub camera: Camera,
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            data: "data".into(),
            texture_root: ".".into(),
            projector: Projector::default(),
            bounds: GeoBounds::default(),
            batch_size: 100,
            source_count: 114,
            source_pattern: "campus/unknown/building_{index}.geojson".into(),
            roads_file: Some("osm_roads.geojson".into()),
            walkways_file: Some("walkways.geojson".into()),
            default_height: DEFAULT_BUILDING_HEIGHT,
            height_scale: 3.0,
            road_width: 2.5,
            road_steps: 200,
            road_elevation: 0.02,
            dash_length: 1.5,
            dash_gap: 1.0,
            line_width: 0.15,
            dash_steps: 20,
            marking_elevation: 0.03,
            road_area_depth: 1.0,
            walkway_depth: 0.1,
            hole_association: HoleAssociation::default(),
            ground_size: 3000.0,
            ground_elevation: -0.1,
            palette: default_palette(),
            surfaces: SurfaceMaterials::default(),
            texture: TextureSettings::default(),
            highlight_emissive: "#1a304c".into(),
            camera: Camera::default(),
        }
    }
}

impl CampusConfig {
    pub fn from_json(text: &str, path: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.into(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let label = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: label.clone(),
            source,
        })?;
        Self::from_json(&text, &label)
    }

    pub fn road_profile(&self) -> RibbonProfile {
        RibbonProfile {
            width: self.road_width,
            steps: self.road_steps,
        }
    }

    pub fn dash_pattern(&self) -> DashPattern {
        DashPattern {
            dash: self.dash_length,
            gap: self.dash_gap,
            profile: RibbonProfile {
                width: self.line_width,
                steps: self.dash_steps,
            },
        }
    }

    pub fn highlight_color(&self) -> RenderColor {
        parse_color_or(&self.highlight_emissive, [0.1, 0.19, 0.3, 1.0])
    }

    /// Extrusion depth in scene units of a building `height_meters` tall
    pub fn building_depth(&self, height_meters: f64) -> f64 {
        height_meters * self.height_scale
    }
}
