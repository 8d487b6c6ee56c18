// Feature ingestion: fetch in batches, filter, project, extrude, register, assemble

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CampusConfig, HoleAssociation};
use crate::curve::CatmullRomCurve;
use crate::error::FetchError;
use crate::extrude::{dashed_centerline, extrude, extrude_footprint, ribbon};
use crate::footprint::Footprint;
use crate::input_geojson::{FeatureFetcher, GeoFeature, GeoGeometry, PolygonRings, join_location};
use crate::kernel_in::{BuildingId, GeographicCoordinates};
use crate::kernel_out::MeshAttributes;
use crate::picking::PickController;
use crate::registry::BuildingRegistry;
use crate::scene::{MaterialId, NodeKind, SceneGraph};

///////////////////////////////////////////////////////////////////////////////////////////////////
// TASKS //////////////////////////////////////////////////////////////////////////////////////////

pub struct SourceAddress;

impl SourceAddress {
    /// `base` + `pattern` with `{index}` replaced, like `data/campus/unknown/building_7.geojson`
    pub fn resolve(base: &str, pattern: &str, index: u32) -> String {
        join_location(base, &pattern.replace("{index}", &index.to_string()))
    }
}

/// One pending fetch. The building id is fixed here, before anything is fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestTask {
    pub source_index: u32,
    pub building_id: BuildingId,
    pub location: String,
}

/// A task after its fetch has settled, one way or the other
#[derive(Debug)]
pub struct SettledTask {
    pub task: IngestTask,
    pub result: Result<Vec<GeoFeature>, FetchError>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskBatch {
    pub tasks: Vec<IngestTask>,
}

impl TaskBatch {
    /// Sources 1..=source_count in batches of batch_size
    pub fn plan(config: &CampusConfig) -> Vec<TaskBatch> {
        let tasks: Vec<IngestTask> = (1..=config.source_count)
            .map(|source_index| IngestTask {
                source_index,
                building_id: BuildingId(source_index),
                location: SourceAddress::resolve(&config.data, &config.source_pattern, source_index),
            })
            .collect();
        tasks
            .chunks(config.batch_size.max(1))
            .map(|tasks| TaskBatch {
                tasks: tasks.to_vec(),
            })
            .collect()
    }

    /// Issues all fetches together and waits until every one has settled.
    /// The result is in task order, whatever order the fetches completed in.
    pub async fn join<F: FeatureFetcher>(self, fetcher: &F) -> Vec<SettledTask> {
        let results = join_all(self.tasks.iter().map(|task| fetcher.fetch(&task.location))).await;
        self.tasks
            .into_iter()
            .zip(results)
            .map(|(task, result)| SettledTask { task, result })
            .collect()
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////
// CAMPUS /////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FailedSource {
    pub source_index: u32,
    pub location: String,
    pub reason: String,
}

/// What one ingestion run produced
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub batches: usize,
    pub sources: usize,
    pub failed_sources: Vec<FailedSource>,
    pub buildings: usize,
    pub skipped_features: usize,
    pub roads: usize,
    pub road_dashes: usize,
    pub road_areas: usize,
    pub walkways: usize,
}

#[derive(Clone, Copy, Debug)]
struct SurfaceIds {
    road: MaterialId,
    road_marking: MaterialId,
    road_area: MaterialId,
    walkway: MaterialId,
}

/// The assembled scene with its buildings
pub struct Campus {
    pub config: CampusConfig,
    pub scene: SceneGraph,
    pub registry: BuildingRegistry,
    pub report: IngestReport,
    surfaces: SurfaceIds,
}

impl Campus {
    /// Empty scene with the surface materials and the ground plane
    pub fn new(config: CampusConfig, registry: BuildingRegistry) -> Self {
        let mut scene = SceneGraph::new();
        let surfaces = &config.surfaces;
        let ground = scene.add_material(surfaces.ground.to_material());
        let surface_ids = SurfaceIds {
            road: scene.add_material(surfaces.road.to_material()),
            road_marking: scene.add_material(surfaces.road_marking.to_material()),
            road_area: scene.add_material(surfaces.road_area.to_material()),
            walkway: scene.add_material(surfaces.walkway.to_material()),
        };
        scene.add_ground(config.ground_size, config.ground_elevation, ground);

        Self {
            config,
            scene,
            registry,
            report: IngestReport::default(),
            surfaces: surface_ids,
        }
    }

    pub fn pick_controller(&self) -> PickController {
        PickController::new(self.config.highlight_color())
    }

    /// Walkways, roads and buildings. Always runs to the end, failures only shrink the scene.
    pub async fn load<F: FeatureFetcher>(&mut self, fetcher: &F) {
        if let Some(walkways_file) = self.config.walkways_file.clone() {
            let location = join_location(&self.config.data, &walkways_file);
            match fetcher.fetch(&location).await {
                Ok(features) => self.add_walkways(&features),
                Err(error) => warn!("walkways skipped: {error}"),
            }
        }
        if let Some(roads_file) = self.config.roads_file.clone() {
            let location = join_location(&self.config.data, &roads_file);
            match fetcher.fetch(&location).await {
                Ok(features) => self.add_roads(&features),
                Err(error) => warn!("roads skipped: {error}"),
            }
        }
        self.load_buildings(fetcher).await;
        info!(
            "campus loaded: {} buildings, {} failed sources, {} nodes",
            self.report.buildings,
            self.report.failed_sources.len(),
            self.scene.len()
        );
    }

    /// Batches run strictly one after the other, so at most `batch_size` fetches are in flight.
    pub async fn load_buildings<F: FeatureFetcher>(&mut self, fetcher: &F) {
        for batch in TaskBatch::plan(&self.config) {
            let first = batch.tasks.first().map_or(0, |task| task.source_index);
            let last = batch.tasks.last().map_or(0, |task| task.source_index);
            info!("batch {}: sources {first}..={last}", self.report.batches + 1);

            let settled = batch.join(fetcher).await;
            self.report.batches += 1;
            for SettledTask { task, result } in settled {
                self.report.sources += 1;
                match result {
                    Ok(features) => self.add_building(&task, &features),
                    Err(error) => {
                        warn!("source {} failed: {error}", task.source_index);
                        self.report.failed_sources.push(FailedSource {
                            source_index: task.source_index,
                            location: task.location,
                            reason: error.to_string(),
                        });
                    }
                }
            }
            info!("batch {} settled", self.report.batches);
        }
    }

    /// All polygons of one source become one building. Nothing usable, no building.
    pub fn add_building(&mut self, task: &IngestTask, features: &[GeoFeature]) {
        let config = &self.config;
        let mut meshes = Vec::new();
        let mut first: Option<(&GeoFeature, f64)> = None;

        for feature in features {
            let polygons = feature.geometry.polygons();
            if polygons.is_empty() {
                debug!("source {}: not a polygon, skipped", task.source_index);
                self.report.skipped_features += 1;
                continue;
            }
            let height = feature.height_or(config.default_height);
            for polygon in polygons {
                if !config.bounds.in_bounds(&polygon.outer) {
                    debug!("source {}: polygon out of bounds", task.source_index);
                    self.report.skipped_features += 1;
                    continue;
                }
                match extrude(
                    &config.projector,
                    &polygon.outer,
                    &polygon.holes,
                    config.building_depth(height),
                ) {
                    Ok(solid) => {
                        meshes.push(solid.mesh);
                        first.get_or_insert((feature, height));
                    }
                    Err(error) => {
                        debug!("source {}: {error}", task.source_index);
                        self.report.skipped_features += 1;
                    }
                }
            }
        }

        let Some((feature, height)) = first else {
            warn!("source {}: no usable building geometry", task.source_index);
            return;
        };
        match self
            .registry
            .register(task.building_id, feature, height, meshes, &mut self.scene)
        {
            Ok(_) => self.report.buildings += 1,
            Err(error) => warn!("source {}: {error}", task.source_index),
        }
    }

    fn project_footprint(&self, polygon: &PolygonRings) -> Option<Footprint> {
        let projector = &self.config.projector;
        let holes = polygon
            .holes
            .iter()
            .map(|hole| projector.project_ring(hole))
            .collect();
        match Footprint::new(projector.project_ring(&polygon.outer), holes) {
            Ok(footprint) => Some(footprint),
            Err(error) => {
                debug!("footprint skipped: {error}");
                None
            }
        }
    }

    /// Road lines become ribbons with a dashed center line, road polygons flat solids.
    pub fn add_roads(&mut self, features: &[GeoFeature]) {
        for feature in features {
            match &feature.geometry {
                GeoGeometry::LineString(points) => {
                    if !self.config.bounds.line_in_bounds(points) {
                        self.report.skipped_features += 1;
                        continue;
                    }
                    self.add_road_line(points);
                }
                geometry => {
                    for polygon in geometry.polygons() {
                        if !self.config.bounds.in_bounds(&polygon.outer) {
                            self.report.skipped_features += 1;
                            continue;
                        }
                        let solid = self.project_footprint(polygon).map(|footprint| {
                            extrude_footprint(&footprint, 0.0, self.config.road_area_depth)
                        });
                        match solid {
                            Some(Ok(solid)) => {
                                self.scene.add_node(
                                    NodeKind::RoadArea,
                                    solid.mesh,
                                    self.surfaces.road_area,
                                );
                                self.report.road_areas += 1;
                            }
                            Some(Err(error)) => {
                                debug!("road area skipped: {error}");
                                self.report.skipped_features += 1;
                            }
                            None => self.report.skipped_features += 1,
                        }
                    }
                }
            }
        }
    }

    fn add_road_line(&mut self, points: &[GeographicCoordinates]) {
        let ground = self.config.projector.project_ring(points);
        let Some(curve) = CatmullRomCurve::through_ground(&ground) else {
            self.report.skipped_features += 1;
            return;
        };

        match ribbon(&curve, &self.config.road_profile(), self.config.road_elevation) {
            Ok(mesh) => {
                self.scene.add_node(NodeKind::Road, mesh, self.surfaces.road);
                self.report.roads += 1;
            }
            Err(error) => {
                debug!("road skipped: {error}");
                self.report.skipped_features += 1;
                return;
            }
        }

        match dashed_centerline(&curve, &self.config.dash_pattern(), self.config.marking_elevation) {
            Ok(dashes) if !dashes.is_empty() => {
                let mut marking = MeshAttributes::new();
                for dash in &dashes {
                    marking.append(dash);
                }
                self.report.road_dashes += dashes.len();
                self.scene
                    .add_node(NodeKind::RoadMarking, marking, self.surfaces.road_marking);
            }
            Ok(_) => (),
            Err(error) => debug!("road marking skipped: {error}"),
        }
    }

    /// Polygons filled with the hole color are cut out of the other walkway polygons.
    pub fn add_walkways(&mut self, features: &[GeoFeature]) {
        let (hole_features, main_features): (Vec<&GeoFeature>, Vec<&GeoFeature>) =
            features.iter().partition(|feature| feature.is_hole());

        let holes: Vec<Footprint> = hole_features
            .iter()
            .flat_map(|feature| feature.geometry.polygons())
            .filter(|polygon| self.config.bounds.in_bounds(&polygon.outer))
            .filter_map(|polygon| self.project_footprint(polygon))
            .collect();
        debug!("walkways: {} polygons, {} holes", main_features.len(), holes.len());

        for feature in main_features {
            for polygon in feature.geometry.polygons() {
                if !self.config.bounds.in_bounds(&polygon.outer) {
                    self.report.skipped_features += 1;
                    continue;
                }
                let Some(mut footprint) = self.project_footprint(polygon) else {
                    self.report.skipped_features += 1;
                    continue;
                };

                let cut: Vec<_> = holes
                    .iter()
                    .filter(|hole| match self.config.hole_association {
                        HoleAssociation::Global => true,
                        HoleAssociation::PerFeature => footprint.contains_ring(hole.outer()),
                    })
                    .flat_map(|hole| hole.polygons.iter().cloned())
                    .collect();

                let solid = footprint
                    .subtract(&cut)
                    .and_then(|_| extrude_footprint(&footprint, 0.0, self.config.walkway_depth));
                match solid {
                    Ok(solid) => {
                        self.scene
                            .add_node(NodeKind::Walkway, solid.mesh, self.surfaces.walkway);
                        self.report.walkways += 1;
                    }
                    Err(error) => {
                        debug!("walkway skipped: {error}");
                        self.report.skipped_features += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel_in::{GeoBounds, GeographicCoordinates, Projector};
    use crate::materials::{DeferredTextureLoader, TextureCache, TextureSettings, default_palette};
    use crate::registry::SideTables;
    use serde_json::json;

    fn ring(points: &[[f64; 2]]) -> Vec<GeographicCoordinates> {
        points
            .iter()
            .map(|p| GeographicCoordinates::new(p[0], p[1]))
            .collect()
    }

    fn square(min: f64, max: f64) -> Vec<GeographicCoordinates> {
        ring(&[[min, min], [min, max], [max, max], [max, min], [min, min]])
    }

    fn test_campus() -> Campus {
        let config = CampusConfig {
            projector: Projector::new(GeographicCoordinates::new(0.0, 0.0), 1.0),
            bounds: GeoBounds {
                min_lon: -100.0,
                max_lon: 100.0,
                min_lat: -100.0,
                max_lat: 100.0,
            },
            ..CampusConfig::default()
        };
        let registry = BuildingRegistry::new(
            SideTables::default(),
            default_palette(),
            TextureSettings::default(),
            TextureCache::new(Box::new(DeferredTextureLoader { repeat: 2.0 })),
        );
        Campus::new(config, registry)
    }

    #[test]
    fn sources_are_addressed_by_index() {
        let config = CampusConfig {
            source_count: 5,
            batch_size: 2,
            ..CampusConfig::default()
        };
        let batches = TaskBatch::plan(&config);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].tasks.len(), 1);
        let task = &batches[1].tasks[1];
        assert_eq!(task.building_id, BuildingId(4));
        assert_eq!(task.location, "data/campus/unknown/building_4.geojson");
        assert_eq!(
            SourceAddress::resolve("https://host/data/", "b_{index}.geojson", 12),
            "https://host/data/b_12.geojson"
        );
    }

    #[test]
    fn walkway_holes_per_feature_or_global() {
        let features = vec![
            GeoFeature::polygon(square(0.0, 10.0), vec![]),
            GeoFeature::polygon(square(20.0, 30.0), vec![]),
            GeoFeature::polygon(square(2.0, 4.0), vec![]).with_property("fill", json!("#ff0000")),
        ];

        let mut campus = test_campus();
        campus.add_walkways(&features);
        assert_eq!(campus.report.walkways, 2);
        let walkways: Vec<_> = campus
            .scene
            .nodes()
            .iter()
            .filter(|node| node.kind == NodeKind::Walkway)
            .collect();
        // the first one got the hole: 4 outer and 4 inner walls
        assert!(walkways[0].mesh.triangle_count() > walkways[1].mesh.triangle_count());

        // globally the hole is cut from the far polygon too, which leaves it unchanged
        let mut global = test_campus();
        global.config.hole_association = HoleAssociation::Global;
        global.add_walkways(&features);
        assert_eq!(global.report.walkways, 2);
    }

    #[test]
    fn roads_become_ribbons_dashes_and_areas() {
        let features = vec![
            GeoFeature::line(ring(&[[0.0, 0.0], [10.0, 0.0]])),
            GeoFeature::line(ring(&[[0.0, 0.0], [500.0, 0.0]])),
            GeoFeature::polygon(square(40.0, 50.0), vec![]),
        ];
        let mut campus = test_campus();
        campus.add_roads(&features);
        assert_eq!(campus.report.roads, 1);
        assert_eq!(campus.report.road_dashes, 4);
        assert_eq!(campus.report.road_areas, 1);
        // the second line leaves the bounds
        assert_eq!(campus.report.skipped_features, 1);
        assert_eq!(campus.scene.count(|kind| *kind == NodeKind::RoadMarking), 1);
    }

    #[test]
    fn building_height_is_scaled_and_bad_polygons_skipped() {
        let mut campus = test_campus();
        let task = IngestTask {
            source_index: 7,
            building_id: BuildingId(7),
            location: "building_7.geojson".into(),
        };
        let features = vec![
            GeoFeature::polygon(ring(&[[0.0, 0.0], [1.0, 1.0]]), vec![]),
            GeoFeature::polygon(square(0.0, 10.0), vec![]).with_property("estimated_height", json!(5)),
        ];
        campus.add_building(&task, &features);
        assert_eq!(campus.report.buildings, 1);
        assert_eq!(campus.report.skipped_features, 1);

        let record = campus.registry.get(BuildingId(7)).unwrap();
        assert_eq!(record.height_meters, 5.0);
        let node = campus.scene.node(record.mesh_handles[0]).unwrap();
        assert_eq!(node.bounding_box.max[1], 15.0);
    }
}
