// Error types of the campus pipeline. Only ConfigError is fatal, everything else is caught
// at the feature or source level and turns into "nothing produced".

use thiserror::Error;

use crate::kernel_in::BuildingId;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{location} answered with status {status}")]
    Status { location: String, status: u16 },
    #[error("reading {location} failed: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no valid GeoJSON in {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} has no features")]
    Empty(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtrudeError {
    #[error("ring has {0} points, at least {1} needed")]
    TooFewPoints(usize, usize),
    #[error("extrusion depth must be positive, got {0}")]
    NonPositiveDepth(f64),
    #[error("ring could not be triangulated")]
    Triangulation,
    #[error("nothing is left after subtracting the holes")]
    NothingLeft,
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture {0} not found")]
    NotFound(String),
    #[error("texture {path} unreadable: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("building {0} is already registered")]
    AlreadyRegistered(BuildingId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
