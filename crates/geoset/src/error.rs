use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal: the dataset could not be read, so no entity can be resolved.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset contains no usable polygon features")]
    Empty,
}

/// Per-entity lookup failures. These are recovered by the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no country matches '{0}'")]
    QueryNotFound(String),

    #[error("continent '{0}' has no resolvable member")]
    AggregationEmpty(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ProjectionError {
    #[error("geometry is empty")]
    EmptyGeometry,

    #[error("padding must be a finite factor >= 1, got {0}")]
    InvalidPadding(f64),
}
