//// Campus ToolBox: GeoJSON footprints, roads and walkways to a pickable 3D campus scene
//// Other inputs are possible, as long as they deliver GeoFeatures

mod input_geojson;

// Interface from the input to the extruder
mod kernel_in;
mod tagticks;

// Geometry
mod curve;
mod extrude;
mod footprint;

// Interface from the extruder to a renderer or picker
mod kernel_out;

// Pipeline, identities and interaction
mod config;
mod error;
mod ingest;
mod materials;
mod picking;
mod registry;
mod scene;

// Various outputs are possible (headless, Bevy window)
#[cfg(feature = "bevy")]
mod bevy_ui;

#[cfg(feature = "bevy")]
pub use bevy_ui::render_init;
pub use config::*;
pub use curve::*;
pub use error::*;
pub use extrude::*;
pub use footprint::*;
pub use ingest::*;
pub use input_geojson::*;
pub use kernel_in::*;
pub use kernel_out::*;
pub use materials::*;
pub use picking::*;
pub use registry::*;
pub use scene::*;
pub use tagticks::*;
