use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use geoset::{GeometrySet, MemberSource, ResolvedEntity, Resolver, ICON_STEM};
use log::{debug, info};
use walkdir::WalkDir;

use crate::codec::NameCodec;
use crate::render::{Renderer, DEFAULT_SIZE};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Output language of resolved display names.
    pub language: String,
    pub codec: NameCodec,
    /// Scale factor on the geometry extent (>= 1).
    pub padding: f64,
    /// Canvas side in pixels.
    pub size: u32,
    /// Root of the category folders; continents read their members here.
    pub asset_root: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            codec: NameCodec::Plain,
            padding: 1.2,
            size: DEFAULT_SIZE,
            asset_root: None,
        }
    }
}

/// Continent members are the decoded stems of the files in `<root>/<continent>/`.
#[derive(Debug, Clone)]
pub struct AssetMembers {
    root: PathBuf,
    codec: NameCodec,
}

impl AssetMembers {
    pub fn new(root: impl Into<PathBuf>, codec: NameCodec) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }
}

impl MemberSource for AssetMembers {
    fn members(&self, continent: &str) -> io::Result<Vec<String>> {
        let files = list_entries(&self.root.join(continent), EntryKind::File)?;
        Ok(files
            .iter()
            .filter_map(|path| file_stem(path))
            .map(|stem| self.codec.decode_or_raw(&stem))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Dir,
    File,
}

/// Immediate children of `dir` of the given kind, sorted by name, dotfiles skipped.
pub(crate) fn list_entries(dir: &Path, kind: EntryKind) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let keep = match kind {
            EntryKind::Dir => entry.file_type().is_dir(),
            EntryKind::File => entry.file_type().is_file(),
        };
        if keep {
            out.push(entry.into_path());
        }
    }

    Ok(out)
}

pub(crate) fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// Lookup key for an asset file: its decoded stem, or the category for `icon`.
pub fn entity_name(category: &str, path: &Path, codec: NameCodec) -> Option<String> {
    let stem = file_stem(path)?;
    if stem == ICON_STEM {
        return Some(category.to_owned());
    }
    Some(codec.decode_or_raw(&stem))
}

/// Resolver + framing + renderer, built once per run and shared by reference.
pub struct Pipeline<'a> {
    resolver: Resolver<'a>,
    renderer: Renderer,
    padding: f64,
    codec: NameCodec,
}

impl<'a> Pipeline<'a> {
    pub fn new(dataset: &'a GeometrySet, options: PipelineOptions) -> Result<Self> {
        if !options.padding.is_finite() || options.padding < 1.0 {
            bail!("padding must be a finite factor >= 1, got {}", options.padding);
        }
        if options.size == 0 {
            bail!("image size must be at least one pixel");
        }

        let mut resolver = Resolver::new(dataset).with_language(options.language);
        if let Some(root) = options.asset_root {
            resolver = resolver.with_members(AssetMembers::new(root, options.codec));
        }

        Ok(Self {
            resolver,
            renderer: Renderer::new(options.size),
            padding: options.padding,
            codec: options.codec,
        })
    }

    pub fn codec(&self) -> NameCodec {
        self.codec
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Resolve `query`, frame it and write the image to `out`.
    pub fn render_entity(&self, query: &str, out: &Path) -> Result<ResolvedEntity> {
        let entity = self.resolver.resolve(query)?;
        let framing = geoset::build(&entity, self.padding)
            .with_context(|| format!("framing {}", entity.name))?;

        debug!(
            "Extent of {}: lon [{:.2}, {:.2}], lat [{:.2}, {:.2}]",
            entity.name,
            framing.viewport.lon_min,
            framing.viewport.lon_max,
            framing.viewport.lat_min,
            framing.viewport.lat_max
        );

        self.renderer.render_to_file(&entity, &framing, out)?;
        Ok(entity)
    }

    /// Re-render one asset in place, optionally under another name.
    pub fn update_file(&self, path: &Path, name_override: Option<&str>) -> Result<ResolvedEntity> {
        if !path.is_file() {
            bail!("file not found: {}", path.display());
        }

        let category = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name = match name_override {
            Some(name) => name.to_owned(),
            None => entity_name(&category, path, self.codec)
                .with_context(|| format!("no usable file name in {}", path.display()))?,
        };

        info!("Updating {} as '{name}'", path.display());
        self.render_entity(&name, path)
    }
}
