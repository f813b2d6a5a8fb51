use std::io::Cursor;
use std::path::{Path, PathBuf};

use geo::{LineString, Polygon};
use geoset::{Framing, Orthographic, ResolvedEntity, Viewport};
use image::{ImageError, ImageFormat};
use log::debug;
use thiserror::Error;

use crate::canvas::{Canvas, Rgb};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("failed to encode image: {0}")]
    Encode(#[from] ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Canvas, water and country outlines.
    pub background: Rgb,
    pub land: Rgb,
    /// Gray at 50% alpha, pre-blended onto the background.
    pub graticule: Rgb,
}

pub const DEFAULT_PALETTE: Palette = Palette {
    background: [0x00, 0x00, 0x00],
    land: [0x50, 0x50, 0x60],
    graticule: [0x40, 0x40, 0x40],
};

/// Canvas side used by the asset tree (7 in at 100 dpi).
pub const DEFAULT_SIZE: u32 = 700;

const GRATICULE_STEP_DEG: i32 = 10;
const GRATICULE_RADIUS_PX: f64 = 0.5;
const OUTLINE_RADIUS_PX: f64 = 0.5;
const EDGE_SAMPLES: usize = 64;

/// Maps projected plane coordinates to pixels.
#[derive(Debug, Clone, Copy)]
struct PixelFrame {
    x_min: f64,
    y_max: f64,
    scale: f64,
}

impl PixelFrame {
    fn new(projection: &Orthographic, viewport: &Viewport, size: u32) -> Self {
        let (x_min, x_max, y_min, y_max) = if viewport.globe {
            (-1.0, 1.0, -1.0, 1.0)
        } else {
            projected_bounds(projection, viewport)
        };

        // Square the frame around its centre so the canvas is never stretched.
        let half = 0.5 * (x_max - x_min).max(y_max - y_min).max(1e-9);
        let (cx, cy) = (0.5 * (x_min + x_max), 0.5 * (y_min + y_max));

        Self {
            x_min: cx - half,
            y_max: cy + half,
            scale: size as f64 / (2.0 * half),
        }
    }

    #[inline]
    fn to_pixel(self, (x, y): (f64, f64)) -> (f64, f64) {
        ((x - self.x_min) * self.scale, (self.y_max - y) * self.scale)
    }
}

/// Bounding box of the viewport's outline once projected.
fn projected_bounds(projection: &Orthographic, vp: &Viewport) -> (f64, f64, f64, f64) {
    let (mut x_min, mut y_min) = (f64::INFINITY, f64::INFINITY);
    let (mut x_max, mut y_max) = (f64::NEG_INFINITY, f64::NEG_INFINITY);

    for i in 0..=EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        let lon = vp.lon_min + t * vp.width();
        let lat = vp.lat_min + t * vp.height();

        for (lon, lat) in [
            (lon, vp.lat_min),
            (lon, vp.lat_max),
            (vp.lon_min, lat),
            (vp.lon_max, lat),
        ] {
            let (x, y) = projection.project_clamped(lon, lat);
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    (x_min, x_max, y_min, y_max)
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    size: u32,
    palette: Palette,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl Renderer {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            palette: DEFAULT_PALETTE,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Graticule, then every polygon filled in land colour and outlined.
    pub fn draw(&self, entity: &ResolvedEntity, framing: &Framing) -> Canvas {
        let projection = &framing.projection;
        let frame = PixelFrame::new(projection, &framing.viewport, self.size);
        let mut canvas = Canvas::new(self.size, self.size, self.palette.background);

        self.draw_graticule(&mut canvas, projection, frame);
        if framing.viewport.globe {
            let horizon: Vec<(f64, f64)> = (0..=360_i32)
                .map(|deg| {
                    let a = f64::from(deg).to_radians();
                    frame.to_pixel((a.cos(), a.sin()))
                })
                .collect();
            canvas.stroke_polyline(&horizon, GRATICULE_RADIUS_PX, self.palette.graticule);
        }

        for polygon in &entity.geometry.0 {
            let rings = project_polygon(polygon, projection, frame);
            if rings.is_empty() {
                continue;
            }
            canvas.fill_rings(&rings, self.palette.land);
            for ring in &rings {
                canvas.stroke_polyline(ring, OUTLINE_RADIUS_PX, self.palette.background);
            }
        }

        debug!(
            "Drew {} ({} polygons) on a {}px canvas",
            entity.name,
            entity.geometry.0.len(),
            self.size
        );
        canvas
    }

    fn draw_graticule(&self, canvas: &mut Canvas, projection: &Orthographic, frame: PixelFrame) {
        let mut lines: Vec<Vec<(f64, f64)>> = Vec::new();

        for lon in (-180_i32..180).step_by(GRATICULE_STEP_DEG as usize) {
            lines.push((-90_i32..=90).map(|lat| (f64::from(lon), f64::from(lat))).collect());
        }
        for lat in (-90 + GRATICULE_STEP_DEG..90).step_by(GRATICULE_STEP_DEG as usize) {
            lines.push((-180_i32..=180).map(|lon| (f64::from(lon), f64::from(lat))).collect());
        }

        for line in lines {
            // split into runs on the visible hemisphere
            let mut run: Vec<(f64, f64)> = Vec::new();
            for (lon, lat) in line {
                match projection.project(lon, lat) {
                    Some(p) => run.push(frame.to_pixel(p)),
                    None => {
                        canvas.stroke_polyline(&run, GRATICULE_RADIUS_PX, self.palette.graticule);
                        run.clear();
                    }
                }
            }
            canvas.stroke_polyline(&run, GRATICULE_RADIUS_PX, self.palette.graticule);
        }
    }

    /// Write the image; the format follows the file extension.
    pub fn render_to_file(
        &self,
        entity: &ResolvedEntity,
        framing: &Framing,
        path: &Path,
    ) -> Result<(), RenderError> {
        self.draw(entity, framing)
            .into_image()
            .save(path)
            .map_err(|source| RenderError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn render_to_png_bytes(
        &self,
        entity: &ResolvedEntity,
        framing: &Framing,
    ) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        self.draw(entity, framing)
            .into_image()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Visible part of each ring, in pixels. Empty when the exterior is hidden.
fn project_polygon(
    polygon: &Polygon<f64>,
    projection: &Orthographic,
    frame: PixelFrame,
) -> Vec<Vec<(f64, f64)>> {
    let clip = |ring: &LineString<f64>| -> Vec<(f64, f64)> {
        projection
            .clip_ring(ring.coords().map(|c| (c.x, c.y)))
            .into_iter()
            .map(|p| frame.to_pixel(p))
            .collect()
    };

    let exterior = clip(polygon.exterior());
    if exterior.len() < 3 {
        return Vec::new();
    }

    std::iter::once(exterior)
        .chain(polygon.interiors().iter().map(clip))
        .filter(|ring| ring.len() >= 3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon, Point};
    use geoset::{frame_geometry, EntityKind};

    fn entity(polygons: Vec<Polygon<f64>>) -> ResolvedEntity {
        ResolvedEntity {
            name: "Testland".to_owned(),
            kind: EntityKind::Country,
            geometry: MultiPolygon(polygons),
            candidates: 1,
            skipped_members: Vec::new(),
        }
    }

    fn block(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    #[test]
    fn country_lands_in_the_middle() {
        let e = entity(vec![block(10.0, 40.0, 20.0, 50.0)]);
        let framing = frame_geometry(&e.geometry, 1.2).unwrap();
        let canvas = Renderer::new(100).draw(&e, &framing);

        assert_eq!(canvas.width(), 100);
        assert_eq!(canvas.pixel(50, 50), DEFAULT_PALETTE.land);
        // padding leaves the corners empty
        assert_ne!(canvas.pixel(1, 1), DEFAULT_PALETTE.land);
        assert_ne!(canvas.pixel(98, 98), DEFAULT_PALETTE.land);
    }

    #[test]
    fn holes_are_not_filled() {
        let outer = block(0.0, 0.0, 30.0, 30.0);
        let with_hole = Polygon::new(
            outer.exterior().clone(),
            vec![block(10.0, 10.0, 20.0, 20.0).exterior().clone()],
        );
        let e = entity(vec![with_hole]);
        let framing = frame_geometry(&e.geometry, 1.2).unwrap();
        let canvas = Renderer::new(120).draw(&e, &framing);

        assert_ne!(canvas.pixel(60, 60), DEFAULT_PALETTE.land);
    }

    #[test]
    fn globe_mode_draws_the_horizon() {
        let e = entity(vec![block(-20.0, 60.0, -10.0, 89.0)]);
        let framing = frame_geometry(&e.geometry, 1.2).unwrap();
        assert!(framing.viewport.globe);

        let canvas = Renderer::new(100).draw(&e, &framing);
        assert_eq!(canvas.pixel(0, 0), DEFAULT_PALETTE.background);

        // left edge of the disk, around mid-height
        let on_horizon = (44..56)
            .flat_map(|y| (0..2).map(move |x| (x, y)))
            .any(|(x, y)| canvas.pixel(x, y) == DEFAULT_PALETTE.graticule);
        assert!(on_horizon);
    }

    fn land_pixels(canvas: &Canvas) -> usize {
        (0..canvas.height())
            .flat_map(|y| (0..canvas.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == DEFAULT_PALETTE.land)
            .count()
    }

    fn globe_facing(lon: f64, lat: f64) -> Framing {
        let center = Point::new(lon, lat);
        Framing {
            projection: Orthographic::new(lon, lat),
            viewport: Viewport::globe(center),
            center,
        }
    }

    #[test]
    fn far_side_land_is_not_drawn() {
        let antipodal = entity(vec![block(170.0, -10.0, 180.0, 10.0)]);
        let canvas = Renderer::new(100).draw(&antipodal, &globe_facing(0.0, 0.0));
        assert_eq!(land_pixels(&canvas), 0);
    }

    #[test]
    fn land_across_the_horizon_is_cut_at_the_limb() {
        let e = entity(vec![block(60.0, -10.0, 120.0, 10.0)]);
        let canvas = Renderer::new(100).draw(&e, &globe_facing(0.0, 0.0));

        // only the sliver between lon 60 and the limb shows, on the right
        let land = land_pixels(&canvas);
        assert!(land > 0);
        assert!(land < 400);
        assert_ne!(canvas.pixel(75, 50), DEFAULT_PALETTE.land);
        assert_ne!(canvas.pixel(20, 50), DEFAULT_PALETTE.land);
        assert_eq!(canvas.pixel(97, 50), DEFAULT_PALETTE.land);
    }

    #[test]
    fn png_bytes_and_file_output() {
        let e = entity(vec![block(10.0, 40.0, 20.0, 50.0)]);
        let framing = frame_geometry(&e.geometry, 1.2).unwrap();
        let renderer = Renderer::new(32);

        let bytes = renderer.render_to_png_bytes(&e, &framing).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("testland.png");
        renderer.render_to_file(&e, &framing, &png).unwrap();
        assert_eq!(image::image_dimensions(&png).unwrap(), (32, 32));

        let webp = dir.path().join("testland.webp");
        renderer.render_to_file(&e, &framing, &webp).unwrap();
        assert!(webp.exists());

        let unknown = dir.path().join("testland.nope");
        assert!(matches!(
            renderer.render_to_file(&e, &framing, &unknown),
            Err(RenderError::Write { .. })
        ));
    }
}
