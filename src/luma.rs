//! Luminance planes
//!
//! Conversion of RGB frames to a single luminance channel, rectangular crops
//! and the Sobel gradient statistic used by the texture layer.

use image::RgbImage;
use ndarray::{s, Array2, ArrayView2};

// ITU-R BT.601 luma weights
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Convert an RGB frame to an 8-bit-valued luminance plane of shape `(height, width)`
pub fn luminance(image: &RgbImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let [r, g, b] = image.get_pixel(x as u32, y as u32).0;
        (LUMA_R * f64::from(r) + LUMA_G * f64::from(g) + LUMA_B * f64::from(b)).round()
    })
}

/// Crop a rectangle, clipped to the plane bounds. `None` when the clipped
/// region is empty.
pub fn crop(plane: &Array2<f64>, x: f64, y: f64, width: f64, height: f64) -> Option<ArrayView2<'_, f64>> {
    let (rows, cols) = plane.dim();
    let clamp = |v: f64, max: usize| (v.max(0.0) as usize).min(max);

    let (x0, x1) = (clamp(x, cols), clamp(x + width, cols));
    let (y0, y1) = (clamp(y, rows), clamp(y + height, rows));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(plane.slice(s![y0..y1, x0..x1]))
}

/// Mean Sobel (3x3) gradient magnitude over the plane.
///
/// Borders are mirrored without repeating the edge pixel (`dcb|abcd|cba`).
pub fn mean_gradient(plane: ArrayView2<'_, f64>) -> f64 {
    let (rows, cols) = plane.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }

    let at = |y: isize, x: isize| plane[[reflect(y, rows), reflect(x, cols)]];

    let mut total = 0.0;
    for y in 0..rows as isize {
        for x in 0..cols as isize {
            let gx = (at(y - 1, x + 1) + 2.0 * at(y, x + 1) + at(y + 1, x + 1))
                - (at(y - 1, x - 1) + 2.0 * at(y, x - 1) + at(y + 1, x - 1));
            let gy = (at(y + 1, x - 1) + 2.0 * at(y + 1, x) + at(y + 1, x + 1))
                - (at(y - 1, x - 1) + 2.0 * at(y - 1, x) + at(y - 1, x + 1));
            total += gx.hypot(gy);
        }
    }
    total / (rows * cols) as f64
}

fn reflect(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_luminance_gray_is_identity() {
        let image = RgbImage::from_pixel(4, 3, Rgb([97, 97, 97]));
        let plane = luminance(&image);
        assert_eq!(plane.dim(), (3, 4));
        assert!(plane.iter().all(|&v| v == 97.0));
    }

    #[test]
    fn test_luminance_weights() {
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(luminance(&image)[[0, 0]], 76.0);
        let image = RgbImage::from_pixel(1, 1, Rgb([0, 255, 0]));
        assert_eq!(luminance(&image)[[0, 0]], 150.0);
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let plane = Array2::<f64>::zeros((10, 20));
        let view = crop(&plane, 15.0, -3.0, 10.0, 6.0).unwrap();
        assert_eq!(view.dim(), (3, 5));
        assert!(crop(&plane, 25.0, 0.0, 5.0, 5.0).is_none());
        assert!(crop(&plane, 2.0, 2.0, 0.0, 5.0).is_none());
    }

    #[test]
    fn test_gradient_of_flat_plane_is_zero() {
        let plane = Array2::from_elem((6, 6), 42.0);
        assert_eq!(mean_gradient(plane.view()), 0.0);
    }

    #[test]
    fn test_gradient_of_vertical_edge() {
        let plane = Array2::from_shape_fn((5, 8), |(_, x)| if x < 4 { 0.0 } else { 10.0 });
        // Columns 3 and 4 see the full edge response (4 * 10), the rest see none
        assert!((mean_gradient(plane.view()) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(2, 5), 2);
        assert_eq!(reflect(-1, 1), 0);
    }
}
