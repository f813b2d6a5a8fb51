use image::RgbImage;
use rayon::prelude::*;

pub type Rgb = [u8; 3];

/// Square-or-not RGB raster, row-major, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct Canvas {
    w: u32,
    h: u32,
    data: Vec<u8>,
}

#[inline]
fn clamp_i(v: i64, lo: i64, hi: i64) -> i64 {
    v.max(lo).min(hi)
}

#[inline]
fn sqr(x: f64) -> f64 {
    x * x
}

impl Canvas {
    pub fn new(w: u32, h: u32, background: Rgb) -> Self {
        let data = background
            .iter()
            .copied()
            .cycle()
            .take(w as usize * h as usize * 3)
            .collect();

        Self { w, h, data }
    }

    pub fn width(&self) -> u32 {
        self.w
    }

    pub fn height(&self) -> u32 {
        self.h
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let idx = (y as usize * self.w as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    fn paint_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.w as i64 || y >= self.h as i64 {
            return;
        }

        let idx = (y as usize * self.w as usize + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&color);
    }

    /// Fill the area enclosed by `rings` with the even-odd rule, so inner
    /// rings punch holes. Pixel centres are tested; rows run in parallel.
    pub fn fill_rings(&mut self, rings: &[Vec<(f64, f64)>], color: Rgb) {
        if self.w == 0 || self.h == 0 {
            return;
        }

        let (mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(_, y) in rings.iter().flatten() {
            ymin = ymin.min(y);
            ymax = ymax.max(y);
        }
        if !ymin.is_finite() || !ymax.is_finite() {
            return;
        }

        let row_lo = clamp_i(ymin.floor() as i64, 0, self.h as i64 - 1) as usize;
        let row_hi = clamp_i(ymax.ceil() as i64, 0, self.h as i64 - 1) as usize;
        let width = self.w as i64;

        self.data
            .par_chunks_mut(self.w as usize * 3)
            .enumerate()
            .skip(row_lo)
            .take(row_hi - row_lo + 1)
            .for_each(|(row, pixels)| {
                let py = row as f64 + 0.5;

                // x positions where ring edges cross this row's centre line
                let mut crossings = Vec::new();
                for ring in rings.iter().filter(|r| r.len() >= 3) {
                    let mut j = ring.len() - 1;
                    for i in 0..ring.len() {
                        let (xi, yi) = ring[i];
                        let (xj, yj) = ring[j];
                        if (yi > py) != (yj > py) {
                            crossings.push(xi + (py - yi) * (xj - xi) / (yj - yi));
                        }
                        j = i;
                    }
                }
                crossings.sort_by(f64::total_cmp);

                for span in crossings.chunks_exact(2) {
                    let x0 = clamp_i((span[0] - 0.5).ceil() as i64, 0, width);
                    let x1 = clamp_i((span[1] - 0.5).ceil() as i64, 0, width);
                    for x in x0..x1 {
                        let idx = x as usize * 3;
                        pixels[idx..idx + 3].copy_from_slice(&color);
                    }
                }
            });
    }

    /// Draw a polyline widened by `radius_px` around each segment.
    pub fn stroke_polyline(&mut self, line: &[(f64, f64)], radius_px: f64, color: Rgb) {
        if line.len() < 2 {
            return;
        }

        let radius = radius_px.max(0.5);
        let radius_sq = radius * radius;
        let (w, h) = (self.w as i64, self.h as i64);

        for segment in line.windows(2) {
            let (x0, y0) = segment[0];
            let (x1, y1) = segment[1];

            let min_x = clamp_i((x0.min(x1) - radius).floor() as i64, 0, w - 1);
            let max_x = clamp_i((x0.max(x1) + radius).ceil() as i64, 0, w - 1);
            let min_y = clamp_i((y0.min(y1) - radius).floor() as i64, 0, h - 1);
            let max_y = clamp_i((y0.max(y1) + radius).ceil() as i64, 0, h - 1);

            let dx = x1 - x0;
            let dy = y1 - y0;
            let denom = dx * dx + dy * dy + 1e-12;

            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let px = x as f64 + 0.5;
                    let py = y as f64 + 0.5;

                    // closest point on the segment to the pixel centre
                    let t = (((px - x0) * dx + (py - y0) * dy) / denom).clamp(0.0, 1.0);
                    let cx = x0 + t * dx;
                    let cy = y0 + t * dy;

                    if sqr(px - cx) + sqr(py - cy) <= radius_sq {
                        self.paint_pixel(x, y, color);
                    }
                }
            }
        }
    }

    pub fn into_image(self) -> RgbImage {
        let (w, h) = (self.w, self.h);
        RgbImage::from_raw(w, h, self.data).expect("canvas buffer is sized w * h * 3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb = [0, 0, 0];
    const RED: Rgb = [255, 0, 0];

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
    }

    #[test]
    fn fills_inside_only() {
        let mut canvas = Canvas::new(20, 20, BLACK);
        canvas.fill_rings(&[square(5.0, 5.0, 15.0, 15.0)], RED);

        assert_eq!(canvas.pixel(10, 10), RED);
        assert_eq!(canvas.pixel(5, 5), RED);
        assert_eq!(canvas.pixel(14, 14), RED);
        assert_eq!(canvas.pixel(15, 15), BLACK);
        assert_eq!(canvas.pixel(2, 10), BLACK);
    }

    #[test]
    fn inner_ring_is_a_hole() {
        let mut canvas = Canvas::new(30, 30, BLACK);
        canvas.fill_rings(
            &[square(2.0, 2.0, 28.0, 28.0), square(10.0, 10.0, 20.0, 20.0)],
            RED,
        );

        assert_eq!(canvas.pixel(5, 5), RED);
        assert_eq!(canvas.pixel(15, 15), BLACK);
        assert_eq!(canvas.pixel(24, 15), RED);
    }

    #[test]
    fn off_canvas_shapes_are_clipped() {
        let mut canvas = Canvas::new(10, 10, BLACK);
        canvas.fill_rings(&[square(-50.0, -50.0, 50.0, 50.0)], RED);
        assert_eq!(canvas.pixel(0, 0), RED);
        assert_eq!(canvas.pixel(9, 9), RED);

        canvas.stroke_polyline(&[(-100.0, 5.5), (100.0, 5.5)], 0.5, BLACK);
        assert_eq!(canvas.pixel(0, 5), BLACK);
        assert_eq!(canvas.pixel(9, 5), BLACK);
        assert_eq!(canvas.pixel(4, 2), RED);
    }

    #[test]
    fn image_conversion_keeps_pixels() {
        let mut canvas = Canvas::new(4, 3, BLACK);
        canvas.fill_rings(&[square(0.0, 0.0, 2.0, 3.0)], RED);
        let image = canvas.into_image();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0).0, RED);
        assert_eq!(image.get_pixel(3, 2).0, BLACK);
    }
}
