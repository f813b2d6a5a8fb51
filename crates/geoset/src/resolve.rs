use std::io;

use geo::MultiPolygon;
use log::{debug, warn};

use crate::dataset::GeometrySet;
use crate::error::ResolveError;
use crate::normalize::normalize;

/// Region tokens that aggregate their member countries. Matched case-sensitively.
pub const CONTINENTS: [&str; 6] = [
    "Afrique",
    "Amerique",
    "Asie",
    "Europe",
    "Moyen-Orient",
    "Oceanie",
];

/// Placeholder stem standing for the category itself rather than a member.
pub const ICON_STEM: &str = "icon";

const WORLD_TOKEN: &str = "world";
const WORLD_NAME: &str = "World";

/// Continent -> country. Continent tokens met deeper are plain names.
const MAX_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Country,
    Continent,
    World,
}

/// A country, a continent aggregate or the whole dataset.
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub name: String,
    pub kind: EntityKind,
    pub geometry: MultiPolygon<f64>,
    /// Rows that matched (country), members merged (continent) or records (world).
    pub candidates: usize,
    /// Continent members that failed to resolve.
    pub skipped_members: Vec<String>,
}

/// Lists the member country names of a continent.
pub trait MemberSource: Send + Sync {
    fn members(&self, continent: &str) -> io::Result<Vec<String>>;
}

pub struct Resolver<'a> {
    dataset: &'a GeometrySet,
    language: String,
    members: Option<Box<dyn MemberSource + 'a>>,
    /// Normalized name cells, one Vec per record, in dataset order.
    folded: Vec<Vec<String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(dataset: &'a GeometrySet) -> Self {
        let folded = dataset
            .records()
            .iter()
            .map(|r| r.names.values().map(|n| normalize(n)).collect())
            .collect();

        Self {
            dataset,
            language: "en".to_owned(),
            members: None,
            folded,
        }
    }

    /// Language of the display name returned for country matches.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_members(mut self, source: impl MemberSource + 'a) -> Self {
        self.members = Some(Box::new(source));
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn resolve(&self, query: &str) -> Result<ResolvedEntity, ResolveError> {
        self.resolve_at(query, 0)
    }

    fn resolve_at(&self, query: &str, depth: usize) -> Result<ResolvedEntity, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::QueryNotFound(String::new()));
        }

        if depth + 1 < MAX_DEPTH && CONTINENTS.contains(&query) {
            return self.aggregate(query, depth);
        }

        let needle = normalize(query);
        if needle == WORLD_TOKEN {
            return Ok(self.world());
        }

        self.match_name(query, &needle)
    }

    fn aggregate(&self, continent: &str, depth: usize) -> Result<ResolvedEntity, ResolveError> {
        let empty = || ResolveError::AggregationEmpty(continent.to_owned());

        let Some(source) = self.members.as_ref() else {
            warn!("{continent}: no member source configured");
            return Err(empty());
        };

        let members = source.members(continent).map_err(|err| {
            warn!("{continent}: cannot list members: {err}");
            empty()
        })?;

        let mut polygons = Vec::new();
        let mut merged = 0usize;
        let mut skipped = Vec::new();

        for member in members.iter().filter(|m| m.as_str() != ICON_STEM) {
            match self.resolve_at(member, depth + 1) {
                Ok(entity) => {
                    debug!(
                        "{continent} <- {} ({} polygons)",
                        entity.name,
                        entity.geometry.0.len()
                    );
                    polygons.extend(entity.geometry.0);
                    merged += 1;
                }
                Err(err) => {
                    warn!("{continent} > {member}: {err}");
                    skipped.push(member.clone());
                }
            }
        }

        if merged == 0 {
            return Err(empty());
        }

        Ok(ResolvedEntity {
            name: continent.to_owned(),
            kind: EntityKind::Continent,
            geometry: MultiPolygon(polygons),
            candidates: merged,
            skipped_members: skipped,
        })
    }

    fn world(&self) -> ResolvedEntity {
        let polygons = self
            .dataset
            .records()
            .iter()
            .flat_map(|r| r.geometry.0.iter().cloned())
            .collect();

        ResolvedEntity {
            name: WORLD_NAME.to_owned(),
            kind: EntityKind::World,
            geometry: MultiPolygon(polygons),
            candidates: self.dataset.len(),
            skipped_members: Vec::new(),
        }
    }

    fn match_name(&self, query: &str, needle: &str) -> Result<ResolvedEntity, ResolveError> {
        let not_found = || ResolveError::QueryNotFound(query.to_owned());

        let mut partial = Vec::new();
        let mut exact = Vec::new();

        for (index, cells) in self.folded.iter().enumerate() {
            if cells.iter().any(|c| c == needle) {
                exact.push(index);
            }
            if cells.iter().any(|c| c.contains(needle)) {
                partial.push(index);
            }
        }

        // A perfect match always replaces the containment candidates.
        let candidates = if exact.is_empty() { partial } else { exact };
        let &first = candidates.first().ok_or_else(not_found)?;

        let record = &self.dataset.records()[first];
        let Some(name) = record.name(&self.language) else {
            warn!(
                "'{query}' matched a record without a name_{} column",
                self.language
            );
            return Err(not_found());
        };

        debug!(
            "'{query}' -> {name} ({} candidate rows)",
            candidates.len()
        );

        Ok(ResolvedEntity {
            name: name.to_owned(),
            kind: EntityKind::Country,
            geometry: record.geometry.clone(),
            candidates: candidates.len(),
            skipped_members: Vec::new(),
        })
    }
}
