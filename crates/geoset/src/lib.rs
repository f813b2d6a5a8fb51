//! GEOSET: world-borders dataset, localized name resolution and orthographic framing.
//!
//! - Loads a GeoJSON FeatureCollection whose features carry `name_<lang>` properties.
//! - Resolves free-text queries (diacritics and case insensitive) to a country,
//!   a continent aggregate or the whole world.
//! - Frames a resolved geometry: centroid-centred orthographic projection plus a
//!   square lon/lat viewport, with a whole-globe fallback for pole or
//!   antimeridian crossings.
//!
//! Pipeline:
//!   GeometrySet::load -> Resolver::resolve -> projection::build -> (renderer)
//!
//! Continent membership is read from the asset tree: the members of `Europe`
//! are the file stems under `<asset_root>/Europe/`, minus the `icon` placeholder.

pub mod dataset;
pub mod error;
pub mod normalize;
pub mod projection;
pub mod resolve;

pub use dataset::{CountryRecord, GeometrySet};
pub use error::{DatasetError, ProjectionError, ResolveError};
pub use normalize::normalize;
pub use projection::{build, frame_geometry, Framing, Orthographic, Viewport};
pub use resolve::{EntityKind, MemberSource, ResolvedEntity, Resolver, CONTINENTS, ICON_STEM};
