use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::error::DatasetError;

/// Property prefix of the localized name columns (`name_en`, `name_fr`, ...).
const NAME_PREFIX: &str = "name_";

#[derive(Debug, serde::Deserialize)]
struct GeoJsonRoot {
    features: Vec<Feature>,
}

#[derive(Debug, serde::Deserialize)]
struct Feature {
    geometry: Option<GeometryDto>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, serde::Deserialize)]
struct GeometryDto {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// One feature of the dataset: its borders and its names per language code.
#[derive(Debug, Clone)]
pub struct CountryRecord {
    pub geometry: MultiPolygon<f64>,
    pub names: BTreeMap<String, String>,
}

impl CountryRecord {
    pub fn new(geometry: MultiPolygon<f64>, names: BTreeMap<String, String>) -> Self {
        Self { geometry, names }
    }

    /// Display name in `lang`, if that column has a string cell for this record.
    pub fn name(&self, lang: &str) -> Option<&str> {
        self.names.get(lang).map(String::as_str)
    }
}

/// Read-only, ordered collection of country records.
#[derive(Debug, Clone, Default)]
pub struct GeometrySet {
    records: Vec<CountryRecord>,
}

impl GeometrySet {
    pub fn from_records(records: Vec<CountryRecord>) -> Self {
        Self { records }
    }

    /// Load a GeoJSON FeatureCollection from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        info!("Loading country data from {}", path.display());

        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let set = Self::from_reader(BufReader::new(file)).map_err(|source| {
            DatasetError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if set.is_empty() {
            return Err(DatasetError::Empty);
        }

        info!(
            "Loaded {} records ({} languages)",
            set.len(),
            set.languages().len()
        );
        Ok(set)
    }

    /// Parse a FeatureCollection. Features without a polygonal geometry are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        let root: GeoJsonRoot = serde_json::from_reader(reader)?;

        let mut records = Vec::with_capacity(root.features.len());
        for (index, feature) in root.features.into_iter().enumerate() {
            let names = feature
                .properties
                .as_ref()
                .map(name_columns)
                .unwrap_or_default();

            let geometry = match feature.geometry.as_ref().map(multipolygon_from_dto) {
                Some(Some(geometry)) => geometry,
                Some(None) => {
                    warn!(
                        "Skipping feature #{index} ({}): unsupported or malformed geometry",
                        names.get("en").map(String::as_str).unwrap_or("unnamed")
                    );
                    continue;
                }
                None => {
                    warn!("Skipping feature #{index}: null geometry");
                    continue;
                }
            };

            records.push(CountryRecord { geometry, names });
        }

        debug!("Parsed {} polygonal records", records.len());
        Ok(Self { records })
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every language code that appears in at least one record, sorted.
    pub fn languages(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|r| r.names.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Display names in `lang`, sorted case-insensitively.
    pub fn names(&self, lang: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self.records.iter().filter_map(|r| r.name(lang)).collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }
}

fn name_columns(properties: &Map<String, Value>) -> BTreeMap<String, String> {
    properties
        .iter()
        .filter_map(|(key, value)| {
            let lang = key.strip_prefix(NAME_PREFIX)?;
            let name = value.as_str()?;
            (!lang.is_empty()).then(|| (lang.to_owned(), name.to_owned()))
        })
        .collect()
}

fn multipolygon_from_dto(dto: &GeometryDto) -> Option<MultiPolygon<f64>> {
    match dto.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(dto.coordinates.clone()).ok()?;
            polygon_from_rings(rings).map(|p| MultiPolygon(vec![p]))
        }
        "MultiPolygon" => {
            let polys: Vec<Vec<Vec<Vec<f64>>>> =
                serde_json::from_value(dto.coordinates.clone()).ok()?;
            let polys: Vec<Polygon<f64>> =
                polys.into_iter().filter_map(polygon_from_rings).collect();
            (!polys.is_empty()).then(|| MultiPolygon(polys))
        }
        _ => None,
    }
}

fn polygon_from_rings(rings: Vec<Vec<Vec<f64>>>) -> Option<Polygon<f64>> {
    let mut rings = rings.into_iter().filter_map(ring_from_positions);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn ring_from_positions(positions: Vec<Vec<f64>>) -> Option<LineString<f64>> {
    // Elevation, if present, is dropped.
    let coords: Vec<Coord<f64>> = positions
        .into_iter()
        .filter_map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
            _ => None,
        })
        .collect();

    (coords.len() >= 3).then(|| LineString::new(coords))
}
