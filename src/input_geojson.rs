use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::PathBuf;
use tracing::debug;

use crate::error::FetchError;
use crate::kernel_in::GeographicCoordinates;
use crate::tagticks::{
    FILL_KEY, HEIGHT_KEY, NAME_KEY, is_hole_fill, parse_height, property_string,
};

///////////////////////////////////////////////////////////////////////////////////////////////////
// GEOJSON ////////////////////////////////////////////////////////////////////////////////////////

// Raw serde view of a FeatureCollection. Only what the pipeline reads is declared.
#[derive(Deserialize, Debug)]
struct JsonCollection {
    #[serde(default)]
    features: Vec<JsonFeature>,
}

#[derive(Deserialize, Debug)]
struct JsonFeature {
    geometry: Option<JsonGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum JsonGeometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    #[serde(other)]
    Unsupported,
}

/// Outer ring plus hole rings, in raw geographic coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonRings {
    pub outer: Vec<GeographicCoordinates>,
    pub holes: Vec<Vec<GeographicCoordinates>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeoGeometry {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
    LineString(Vec<GeographicCoordinates>),
}

impl GeoGeometry {
    /// All polygons of the geometry, empty for lines.
    pub fn polygons(&self) -> &[PolygonRings] {
        match self {
            GeoGeometry::Polygon(rings) => std::slice::from_ref(rings),
            GeoGeometry::MultiPolygon(polygons) => polygons,
            GeoGeometry::LineString(_) => &[],
        }
    }
}

/// One loaded feature. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoFeature {
    pub geometry: GeoGeometry,
    pub properties: Map<String, Value>,
}

impl GeoFeature {
    pub fn polygon(outer: Vec<GeographicCoordinates>, holes: Vec<Vec<GeographicCoordinates>>) -> Self {
        Self {
            geometry: GeoGeometry::Polygon(PolygonRings { outer, holes }),
            properties: Map::new(),
        }
    }

    pub fn line(points: Vec<GeographicCoordinates>) -> Self {
        Self {
            geometry: GeoGeometry::LineString(points),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn height_or(&self, default: f64) -> f64 {
        parse_height(self.properties.get(HEIGHT_KEY), default)
    }

    pub fn name(&self) -> Option<String> {
        property_string(self.properties.get(NAME_KEY))
    }

    pub fn is_hole(&self) -> bool {
        is_hole_fill(self.properties.get(FILL_KEY))
    }
}

fn parse_ring(ring: &[Vec<f64>]) -> Option<Vec<GeographicCoordinates>> {
    ring.iter()
        .map(|pair| GeographicCoordinates::from_lon_lat(pair))
        .collect()
}

// [[outer], [hole1], ...]
fn parse_polygon(rings: &[Vec<Vec<f64>>]) -> Option<PolygonRings> {
    let (outer, holes) = rings.split_first()?;
    let outer = parse_ring(outer)?;
    let holes = holes
        .iter()
        .map(|hole| parse_ring(hole))
        .collect::<Option<Vec<_>>>()?;
    Some(PolygonRings { outer, holes })
}

fn convert_feature(feature: JsonFeature) -> Option<GeoFeature> {
    let geometry = match feature.geometry? {
        JsonGeometry::Polygon { coordinates } => GeoGeometry::Polygon(parse_polygon(&coordinates)?),
        JsonGeometry::MultiPolygon { coordinates } => GeoGeometry::MultiPolygon(
            coordinates
                .iter()
                .filter_map(|polygon| parse_polygon(polygon))
                .collect(),
        ),
        JsonGeometry::LineString { coordinates } => GeoGeometry::LineString(parse_ring(&coordinates)?),
        JsonGeometry::Unsupported => return None,
    };
    Some(GeoFeature {
        geometry,
        properties: feature.properties.unwrap_or_default(),
    })
}

/// Parses a FeatureCollection. Features with unsupported or broken geometry are skipped,
/// a collection without any usable feature is an error of the whole source.
pub fn parse_feature_collection(bytes: &[u8], location: &str) -> Result<Vec<GeoFeature>, FetchError> {
    let collection: JsonCollection =
        serde_json::from_slice(bytes).map_err(|source| FetchError::Parse {
            location: location.into(),
            source,
        })?;

    let total = collection.features.len();
    let features: Vec<GeoFeature> = collection
        .features
        .into_iter()
        .filter_map(convert_feature)
        .collect();
    if features.len() < total {
        debug!("{location}: skipped {} unusable features", total - features.len());
    }

    if features.is_empty() {
        return Err(FetchError::Empty(location.into()));
    }
    Ok(features)
}

///////////////////////////////////////////////////////////////////////////////////////////////////
// FETCH //////////////////////////////////////////////////////////////////////////////////////////

/// Asynchronous source of feature collections. A fetch is the only suspension point of the pipeline.
pub trait FeatureFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<GeoFeature>, FetchError>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_bytes(&self, location: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                location: location.into(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

impl FeatureFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<GeoFeature>, FetchError> {
        let bytes = self.get_bytes(location).await?;
        parse_feature_collection(&bytes, location)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

impl FeatureFetcher for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<GeoFeature>, FetchError> {
        let bytes = tokio::fs::read(PathBuf::from(location))
            .await
            .map_err(|source| FetchError::Io {
                location: location.into(),
                source,
            })?;
        parse_feature_collection(&bytes, location)
    }
}

/// Fetcher chosen from the data base: http(s) URLs go over the network, anything else is a directory.
#[derive(Debug, Clone)]
pub enum AnyFetcher {
    Http(HttpFetcher),
    File(FileFetcher),
}

impl FeatureFetcher for AnyFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<GeoFeature>, FetchError> {
        match self {
            AnyFetcher::Http(fetcher) => fetcher.fetch(location).await,
            AnyFetcher::File(fetcher) => fetcher.fetch(location).await,
        }
    }
}

pub fn fetcher_for(base: &str) -> AnyFetcher {
    if base.starts_with("http://") || base.starts_with("https://") {
        AnyFetcher::Http(HttpFetcher::new())
    } else {
        AnyFetcher::File(FileFetcher)
    }
}

/// `base` + `/` + `relative`, without doubling the slash
pub fn join_location(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.into();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
