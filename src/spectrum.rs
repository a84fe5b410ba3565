//! 2-D spectral analysis
//!
//! Magnitude spectrum of a luminance plane and energy statistics over a
//! radial high-frequency band around the zero-frequency centre.

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::stats::{mean, population_std};

/// Energy statistics of the high-frequency annulus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    /// Sum of magnitudes inside the band
    pub band_energy: f64,
    /// Sum of all magnitudes
    pub total_energy: f64,
    /// `band_energy / total_energy`
    pub ratio: f64,
    /// Band elements above `mean + sigma * stddev` of the band
    pub peak_count: usize,
    /// Number of elements inside the band
    pub band_len: usize,
}

/// Magnitude of the 2-D DFT, in unshifted (zero frequency at `[0, 0]`) order
pub fn magnitude_spectrum(plane: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = plane.dim();
    if rows == 0 || cols == 0 {
        return Array2::zeros((rows, cols));
    }

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(cols);
    let col_fft = planner.plan_fft_forward(rows);

    // Row-major buffer; rustfft transforms every `cols`-long chunk
    let mut rows_buf: Vec<Complex64> = plane.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    row_fft.process(&mut rows_buf);

    let mut cols_buf = vec![Complex64::new(0.0, 0.0); rows * cols];
    for y in 0..rows {
        for x in 0..cols {
            cols_buf[x * rows + y] = rows_buf[y * cols + x];
        }
    }
    col_fft.process(&mut cols_buf);

    Array2::from_shape_fn((rows, cols), |(y, x)| cols_buf[x * rows + y].norm())
}

/// Band statistics between radius `min(h, w) / 4` and `min(h, w) / 2`
/// (both exclusive) around the centred zero frequency.
pub fn band_statistics(magnitude: &Array2<f64>, peak_sigma: f64) -> BandStatistics {
    let (rows, cols) = magnitude.dim();
    let shortest = rows.min(cols);
    let inner = (shortest / 4) as f64;
    let outer = (shortest / 2) as f64;

    let mut total_energy = 0.0;
    let mut band = Vec::new();
    for ((y, x), &value) in magnitude.indexed_iter() {
        total_energy += value;
        let dy = centered(y, rows);
        let dx = centered(x, cols);
        let distance = dx.hypot(dy);
        if distance > inner && distance < outer {
            band.push(value);
        }
    }

    let band_energy: f64 = band.iter().sum();
    let peak_count = match (mean(&band), population_std(&band)) {
        (Some(m), Some(sd)) => {
            let cutoff = m + peak_sigma * sd;
            band.iter().filter(|&&v| v > cutoff).count()
        }
        _ => 0,
    };

    BandStatistics {
        band_energy,
        total_energy,
        ratio: band_energy / (total_energy + 1e-10),
        peak_count,
        band_len: band.len(),
    }
}

/// Offset of an unshifted frequency index from the shifted centre `n / 2`
fn centered(index: usize, n: usize) -> f64 {
    ((index + n / 2) % n) as f64 - (n / 2) as f64
}
