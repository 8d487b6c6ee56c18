#![allow(dead_code)]

use campus_tb::*;
use glam::DVec3;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

pub const DATA: &str = "mem";

pub fn ring(points: &[[f64; 2]]) -> Vec<GeographicCoordinates> {
    points
        .iter()
        .map(|p| GeographicCoordinates::new(p[0], p[1]))
        .collect()
}

/// Closed square ring from (min, min) to (max, max), counter-clockwise
pub fn square(min: f64, max: f64) -> Vec<GeographicCoordinates> {
    ring(&[[min, min], [max, min], [max, max], [min, max], [min, min]])
}

pub fn building(min: f64, max: f64, height: f64) -> GeoFeature {
    GeoFeature::polygon(square(min, max), vec![])
        .with_property("estimated_height", serde_json::json!(height))
}

pub fn source_location(index: u32) -> String {
    SourceAddress::resolve(DATA, "building_{index}.geojson", index)
}

enum MockSource {
    Features(Vec<GeoFeature>),
    Failing,
}

/// In-memory fetcher. Every source can be delayed or made to fail.
#[derive(Default)]
pub struct MockFetcher {
    sources: HashMap<String, (u64, MockSource)>,
    completed: RefCell<Vec<String>>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, index: u32, delay_ms: u64, features: Vec<GeoFeature>) -> Self {
        self.sources
            .insert(source_location(index), (delay_ms, MockSource::Features(features)));
        self
    }

    pub fn with_failure(mut self, index: u32, delay_ms: u64) -> Self {
        self.sources
            .insert(source_location(index), (delay_ms, MockSource::Failing));
        self
    }

    pub fn with_file(mut self, name: &str, features: Vec<GeoFeature>) -> Self {
        self.sources.insert(
            join_location(DATA, name),
            (0, MockSource::Features(features)),
        );
        self
    }

    /// Locations in the order their fetches completed
    pub fn completed(&self) -> Vec<String> {
        self.completed.borrow().clone()
    }

    /// Most fetches that were pending at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }
}

impl FeatureFetcher for MockFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<GeoFeature>, FetchError> {
        let result = match self.sources.get(location) {
            Some((delay_ms, source)) => {
                self.in_flight.set(self.in_flight.get() + 1);
                self.max_in_flight
                    .set(self.max_in_flight.get().max(self.in_flight.get()));
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                self.in_flight.set(self.in_flight.get() - 1);
                match source {
                    MockSource::Features(features) => Ok(features.clone()),
                    MockSource::Failing => Err(FetchError::Status {
                        location: location.into(),
                        status: 500,
                    }),
                }
            }
            None => Err(FetchError::Status {
                location: location.into(),
                status: 404,
            }),
        };
        self.completed.borrow_mut().push(location.into());
        result
    }
}

/// Unit projection around (0, 0), so geographic units are scene units
pub fn test_config(source_count: u32) -> CampusConfig {
    CampusConfig {
        data: DATA.into(),
        source_pattern: "building_{index}.geojson".into(),
        source_count,
        batch_size: 100,
        roads_file: None,
        walkways_file: None,
        projector: Projector::new(GeographicCoordinates::new(0.0, 0.0), 1.0),
        bounds: GeoBounds {
            min_lon: -100.0,
            max_lon: 100.0,
            min_lat: -100.0,
            max_lat: 100.0,
        },
        ..CampusConfig::default()
    }
}

pub fn test_campus(config: CampusConfig, side_tables: SideTables, loader: Box<dyn TextureLoader>) -> Campus {
    let registry = BuildingRegistry::new(
        side_tables,
        config.palette.clone(),
        config.texture.clone(),
        TextureCache::new(loader),
    );
    Campus::new(config, registry)
}

pub fn untextured_campus(config: CampusConfig) -> Campus {
    test_campus(
        config,
        SideTables::default(),
        Box::new(DeferredTextureLoader { repeat: 2.0 }),
    )
}

/// Straight down onto the ground point (east, north)
pub fn ray_down(east: f64, north: f64) -> Ray {
    Ray::new(DVec3::new(east, 1000.0, -north), DVec3::NEG_Y).expect("valid direction")
}
