use geo::{BoundingRect, Centroid, MultiPolygon, Point, Rect};
use log::debug;

use crate::error::ProjectionError;
use crate::resolve::ResolvedEntity;

/// Longitude span above which the width stops growing. A geometry wider than
/// this straddles the antimeridian.
const MAX_LON_SPAN: f64 = 180.0;

/// Smallest viewport side in degrees, for point-like geometries.
const MIN_SIDE_DEG: f64 = 1.0;

/// Angular step of the horizon arcs inserted by [`Orthographic::clip_ring`].
const HORIZON_STEP_RAD: f64 = std::f64::consts::PI / 90.0;

/// Orthographic projection onto the unit sphere's tangent plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orthographic {
    pub central_lon: f64,
    pub central_lat: f64,
}

impl Orthographic {
    pub fn new(central_lon: f64, central_lat: f64) -> Self {
        Self {
            central_lon,
            central_lat,
        }
    }

    /// Plane coordinates of `(lon, lat)`, or `None` on the far hemisphere.
    #[inline]
    pub fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x, y, cos_c) = self.raw(lon, lat);
        (cos_c >= 0.0).then_some((x, y))
    }

    /// Like [`project`](Self::project), but far-side points are pushed onto the horizon.
    #[inline]
    pub fn project_clamped(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y, cos_c) = self.raw(lon, lat);
        if cos_c >= 0.0 {
            return (x, y);
        }

        let r = x.hypot(y);
        if r > 1e-12 {
            (x / r, y / r)
        } else {
            (1.0, 0.0)
        }
    }

    /// Clip a closed lon/lat ring to the visible hemisphere and project it.
    ///
    /// Edges leaving the hemisphere are cut where their great circle meets the
    /// horizon, and consecutive exit/entry points are joined along the horizon.
    /// A ring with no visible vertex comes back empty.
    pub fn clip_ring<I>(&self, ring: I) -> Vec<(f64, f64)>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut pts: Vec<[f64; 3]> = ring
            .into_iter()
            .map(|(lon, lat)| {
                let (x, y, z) = self.raw(lon, lat);
                [x, y, z]
            })
            .collect();
        if pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }

        let visible = |p: &[f64; 3]| p[2] >= 0.0;
        let Some(start) = pts.iter().position(visible) else {
            return Vec::new();
        };

        let n = pts.len();
        let mut out = Vec::with_capacity(n + 1);
        let mut exit: Option<(f64, f64)> = None;
        out.push((pts[start][0], pts[start][1]));

        for i in 0..n {
            let prev = pts[(start + i) % n];
            let cur = pts[(start + i + 1) % n];

            match (visible(&prev), visible(&cur)) {
                (true, true) => out.push((cur[0], cur[1])),
                (true, false) => {
                    let crossing = horizon_crossing(prev, cur);
                    out.push(crossing);
                    exit = Some(crossing);
                }
                (false, true) => {
                    let entry = horizon_crossing(cur, prev);
                    if let Some(from) = exit.take() {
                        push_horizon_arc(&mut out, from, entry);
                    }
                    out.push(entry);
                    out.push((cur[0], cur[1]));
                }
                (false, false) => {}
            }
        }

        out
    }

    #[inline]
    fn raw(&self, lon: f64, lat: f64) -> (f64, f64, f64) {
        let (sin_phi, cos_phi) = lat.to_radians().sin_cos();
        let (sin_phi0, cos_phi0) = self.central_lat.to_radians().sin_cos();
        let (sin_dlam, cos_dlam) = (lon - self.central_lon).to_radians().sin_cos();

        let x = cos_phi * sin_dlam;
        let y = cos_phi0 * sin_phi - sin_phi0 * cos_phi * cos_dlam;
        let cos_c = sin_phi0 * sin_phi + cos_phi0 * cos_phi * cos_dlam;

        (x, y, cos_c)
    }
}

/// Point where the great circle from visible `a` to hidden `b` meets the horizon.
fn horizon_crossing(a: [f64; 3], b: [f64; 3]) -> (f64, f64) {
    let (wa, wb) = (-b[2], a[2]);
    let (x, y) = (wa * a[0] + wb * b[0], wa * a[1] + wb * b[1]);

    let r = x.hypot(y);
    if r > 1e-12 {
        (x / r, y / r)
    } else {
        (a[0], a[1])
    }
}

/// Points strictly between `from` and `to` along the shorter horizon arc.
fn push_horizon_arc(out: &mut Vec<(f64, f64)>, from: (f64, f64), to: (f64, f64)) {
    let t0 = from.1.atan2(from.0);
    let mut delta = to.1.atan2(to.0) - t0;
    if delta > std::f64::consts::PI {
        delta -= std::f64::consts::TAU;
    } else if delta < -std::f64::consts::PI {
        delta += std::f64::consts::TAU;
    }

    let steps = (delta.abs() / HORIZON_STEP_RAD).ceil() as usize;
    for k in 1..steps {
        let t = t0 + delta * k as f64 / steps as f64;
        out.push((t.cos(), t.sin()));
    }
}

/// Lon/lat rectangle to render, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub center: Point<f64>,
    /// Whole-globe extent; the bounds above are then the full lon/lat range.
    pub globe: bool,
}

impl Viewport {
    pub fn globe(center: Point<f64>) -> Self {
        Self {
            lon_min: -180.0,
            lon_max: 180.0,
            lat_min: -90.0,
            lat_max: 90.0,
            center,
            globe: true,
        }
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn contains(&self, rect: &Rect<f64>) -> bool {
        self.lon_min <= rect.min().x
            && self.lat_min <= rect.min().y
            && rect.max().x <= self.lon_max
            && rect.max().y <= self.lat_max
    }

    /// Longitudes may run past +-180: the projection wraps them.
    fn lat_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat_min) && (-90.0..=90.0).contains(&self.lat_max)
    }
}

/// Everything the renderer needs to place a geometry on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub projection: Orthographic,
    pub viewport: Viewport,
    pub center: Point<f64>,
}

/// Frame a resolved entity. `padding` is a scale factor on the extent (1.2 = 20%).
pub fn build(entity: &ResolvedEntity, padding: f64) -> Result<Framing, ProjectionError> {
    let framing = frame_geometry(&entity.geometry, padding)?;

    debug!(
        "{}: center ({:.2}, {:.2}), lon [{:.2}, {:.2}], lat [{:.2}, {:.2}]{}",
        entity.name,
        framing.center.x(),
        framing.center.y(),
        framing.viewport.lon_min,
        framing.viewport.lon_max,
        framing.viewport.lat_min,
        framing.viewport.lat_max,
        if framing.viewport.globe { " (globe)" } else { "" }
    );

    Ok(framing)
}

pub fn frame_geometry(
    geometry: &MultiPolygon<f64>,
    padding: f64,
) -> Result<Framing, ProjectionError> {
    if !padding.is_finite() || padding < 1.0 {
        return Err(ProjectionError::InvalidPadding(padding));
    }

    let center = geometry
        .centroid()
        .filter(|c| c.x().is_finite() && c.y().is_finite())
        .ok_or(ProjectionError::EmptyGeometry)?;
    let rect = geometry
        .bounding_rect()
        .ok_or(ProjectionError::EmptyGeometry)?;

    let (cx, cy) = (center.x(), center.y());

    // Extents are taken symmetric about the centroid so the square covers the bbox.
    let span_x = 2.0 * (cx - rect.min().x).max(rect.max().x - cx);
    let span_y = 2.0 * (cy - rect.min().y).max(rect.max().y - cy);

    let height = span_y * padding;
    let width = span_x.min(MAX_LON_SPAN) * padding;
    let half = 0.5 * height.max(width).max(MIN_SIDE_DEG);

    let boxed = Viewport {
        lon_min: cx - half,
        lon_max: cx + half,
        lat_min: cy - half,
        lat_max: cy + half,
        center,
        globe: false,
    };

    let crosses_antimeridian = rect.width() > MAX_LON_SPAN;
    let viewport = if boxed.lat_in_range() && !crosses_antimeridian {
        boxed
    } else {
        Viewport::globe(center)
    };

    Ok(Framing {
        projection: Orthographic::new(cx, cy),
        viewport,
        center,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    const EPS: f64 = 1e-9;

    fn rect_poly(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    fn assert_square_and_covering(geometry: &MultiPolygon<f64>) {
        let framing = frame_geometry(geometry, 1.2).unwrap();
        let vp = framing.viewport;
        assert!(!vp.globe);
        assert!((vp.width() - vp.height()).abs() < EPS);
        assert!(vp.contains(&geometry.bounding_rect().unwrap()));
    }

    #[test]
    fn viewport_is_square_and_covers_bbox() {
        assert_square_and_covering(&MultiPolygon(vec![rect_poly(-5.0, 42.0, 8.0, 51.0)]));
        assert_square_and_covering(&MultiPolygon(vec![rect_poly(20.0, -35.0, 23.0, 5.0)]));

        // L shape: the centroid sits well off the bbox centre.
        let l_shape = polygon![
            (x: 0.0, y: 0.0), (x: 30.0, y: 0.0), (x: 30.0, y: 2.0),
            (x: 2.0, y: 2.0), (x: 2.0, y: 30.0), (x: 0.0, y: 30.0),
        ];
        assert_square_and_covering(&MultiPolygon(vec![l_shape]));

        // Two islands far apart.
        assert_square_and_covering(&MultiPolygon(vec![
            rect_poly(0.0, 0.0, 1.0, 1.0),
            rect_poly(40.0, 10.0, 41.0, 11.0),
        ]));
    }

    #[test]
    fn projection_is_centred_on_centroid() {
        let geometry = MultiPolygon(vec![rect_poly(10.0, 20.0, 20.0, 30.0)]);
        let framing = frame_geometry(&geometry, 1.0).unwrap();
        assert!((framing.projection.central_lon - 15.0).abs() < EPS);
        assert!((framing.projection.central_lat - 25.0).abs() < EPS);
        assert_eq!(framing.center, framing.viewport.center);
        assert!((framing.viewport.width() - 10.0).abs() < EPS);
    }

    #[test]
    fn pole_crossing_falls_back_to_globe() {
        let arctic = MultiPolygon(vec![rect_poly(-20.0, 60.0, -10.0, 89.0)]);
        let framing = frame_geometry(&arctic, 1.2).unwrap();
        assert!(framing.viewport.globe);
        assert_eq!(framing.viewport.lat_min, -90.0);
        assert_eq!(framing.viewport.lat_max, 90.0);
        assert_eq!(framing.viewport.lon_min, -180.0);
        assert_eq!(framing.viewport.lon_max, 180.0);
    }

    #[test]
    fn pacific_countries_near_the_antimeridian_keep_their_square() {
        let nz_like = MultiPolygon(vec![
            rect_poly(166.4, -47.3, 174.0, -40.5),
            rect_poly(172.6, -41.6, 178.5, -34.4),
        ]);
        assert_square_and_covering(&nz_like);

        let vp = frame_geometry(&nz_like, 1.2).unwrap().viewport;
        assert!(vp.lon_max > 180.0);
        assert!(vp.width() < 20.0);

        let tonga_like = MultiPolygon(vec![rect_poly(-176.2, -22.4, -173.7, -15.5)]);
        assert_square_and_covering(&tonga_like);
    }

    #[test]
    fn geometries_straddling_the_antimeridian_fall_back_to_globe() {
        // islands on both sides of the dateline, as stored in lon/lat
        let fiji = MultiPolygon(vec![
            rect_poly(177.0, -19.0, 180.0, -16.0),
            rect_poly(-180.0, -17.0, -178.5, -16.0),
        ]);
        assert!(frame_geometry(&fiji, 1.2).unwrap().viewport.globe);

        let band = MultiPolygon(vec![rect_poly(-180.0, -5.0, 180.0, 5.0)]);
        assert!(frame_geometry(&band, 1.2).unwrap().viewport.globe);
    }

    #[test]
    fn point_like_geometry_gets_a_minimum_side() {
        let tiny = MultiPolygon(vec![rect_poly(100.0, 1.0, 100.01, 1.01)]);
        let vp = frame_geometry(&tiny, 1.2).unwrap().viewport;
        assert!(!vp.globe);
        assert!((vp.width() - MIN_SIDE_DEG).abs() < EPS);
        assert!((vp.height() - MIN_SIDE_DEG).abs() < EPS);
    }

    #[test]
    fn rejects_bad_padding_and_empty_geometry() {
        let geometry = MultiPolygon(vec![rect_poly(0.0, 0.0, 1.0, 1.0)]);
        assert_eq!(
            frame_geometry(&geometry, 0.5),
            Err(ProjectionError::InvalidPadding(0.5))
        );
        assert!(frame_geometry(&geometry, f64::NAN).is_err());
        assert_eq!(
            frame_geometry(&MultiPolygon(Vec::new()), 1.2),
            Err(ProjectionError::EmptyGeometry)
        );
    }

    #[test]
    fn orthographic_visibility() {
        let ortho = Orthographic::new(0.0, 0.0);

        let (x, y) = ortho.project(0.0, 0.0).unwrap();
        assert!(x.abs() < EPS && y.abs() < EPS);

        let (x, y) = ortho.project(90.0, 0.0).unwrap();
        assert!((x - 1.0).abs() < EPS && y.abs() < EPS);

        let (_, y) = ortho.project(0.0, 90.0).unwrap();
        assert!((y - 1.0).abs() < EPS);

        assert!(ortho.project(180.0, 0.0).is_none());
        assert!(ortho.project(135.0, 10.0).is_none());

        let (x, y) = ortho.project_clamped(135.0, 10.0);
        assert!((x.hypot(y) - 1.0).abs() < EPS);
    }

    fn ring(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
        rect_poly(x0, y0, x1, y1)
            .exterior()
            .coords()
            .map(|c| (c.x, c.y))
            .collect()
    }

    #[test]
    fn clipping_drops_the_far_hemisphere() {
        let ortho = Orthographic::new(0.0, 0.0);

        assert!(ortho.clip_ring(ring(170.0, -10.0, 180.0, 10.0)).is_empty());

        // fully visible rings are projected as-is and stay closed
        let near = ortho.clip_ring(ring(-10.0, -10.0, 10.0, 10.0));
        assert_eq!(near.len(), 5);
        assert_eq!(near.first(), near.last());
    }

    #[test]
    fn straddling_ring_is_cut_at_the_horizon() {
        let ortho = Orthographic::new(0.0, 0.0);
        let clipped = ortho.clip_ring(ring(60.0, -10.0, 120.0, 10.0));

        assert!(clipped.len() >= 5);
        assert_eq!(clipped.first(), clipped.last());
        for &(x, y) in &clipped {
            assert!(x.hypot(y) <= 1.0 + EPS);
            // the visible part spans lon 60..90 only
            assert!(x >= ortho.project(60.0, 10.0).unwrap().0 - EPS);
        }
        assert!(clipped.iter().any(|&(x, y)| (x.hypot(y) - 1.0).abs() < EPS));
    }

    #[test]
    fn ring_crossing_both_limbs_is_closed_along_the_horizon() {
        let ortho = Orthographic::new(0.0, 0.0);
        let band = [
            (-100.0, -10.0),
            (0.0, -10.0),
            (100.0, -10.0),
            (100.0, 10.0),
            (0.0, 10.0),
            (-100.0, 10.0),
            (-100.0, -10.0),
        ];
        let clipped = ortho.clip_ring(band);

        assert_eq!(clipped.first(), clipped.last());
        let on_horizon: Vec<(f64, f64)> = clipped
            .iter()
            .copied()
            .filter(|&(x, y)| (x.hypot(y) - 1.0).abs() < 1e-6)
            .collect();
        assert!(on_horizon.len() >= 4);
        assert!(on_horizon.iter().any(|&(x, _)| x > 0.9));
        assert!(on_horizon.iter().any(|&(x, _)| x < -0.9));
    }
}
