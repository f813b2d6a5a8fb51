use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use log::{debug, info};
use walkdir::WalkDir;

use crate::codec::NameCodec;
use crate::pipeline::file_stem;

/// Re-encode one PNG as WEBP next to it and delete the PNG.
///
/// With `encode`, the new stem is the encoded name, except for icons.
pub fn convert_file(path: &Path, encode: Option<NameCodec>) -> Result<PathBuf> {
    if !path.is_file() {
        bail!("file {} does not exist", path.display());
    }

    let stem = file_stem(path).with_context(|| format!("no file name in {}", path.display()))?;
    let out_stem = match encode {
        Some(codec) if !stem.contains("icon") => codec.encode(&stem),
        _ => stem,
    };
    let out_path = path.with_file_name(format!("{out_stem}.webp"));

    let image = image::open(path)
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgba8();

    if out_path.is_file() && out_path != path {
        debug!("Replacing {}", out_path.display());
        fs::remove_file(&out_path)?;
    }

    image
        .save_with_format(&out_path, ImageFormat::WebP)
        .with_context(|| format!("encoding {}", out_path.display()))?;

    fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;

    Ok(out_path)
}

/// Convert every `.png` below `root`. Returns the number of files converted.
pub fn convert_tree(root: &Path, encode: Option<NameCodec>) -> Result<usize> {
    if !root.is_dir() {
        bail!("folder {} does not exist", root.display());
    }

    let pngs: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .map(|s| s.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();

    for png in &pngs {
        let out = convert_file(png, encode)?;
        info!(
            "Converted {} -> {}",
            png.strip_prefix(root).unwrap_or(png).display(),
            out.strip_prefix(root).unwrap_or(&out).display()
        );
    }

    Ok(pngs.len())
}
