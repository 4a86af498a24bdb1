//! Conversion quality, comparing the source image with its decoded tileset

use image::RgbaImage;
use log::info;
use serde::Serialize;

use crate::color::{oklab_delta_e, oklab_from_rgb};
use crate::decode::is_opaque;

/// Scale applied to Oklab ΔE so values read like classic ΔE
const DELTA_E_DISPLAY_FACTOR: f32 = 100.0;
const MAX_PIXEL_VALUE: f64 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaEStats {
    pub min: f32,
    pub mean: f32,
    pub median: f32,
    pub p95: f32,
    pub max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub delta_e: DeltaEStats,
    /// Per channel PSNR in dB, red, green, blue
    pub psnr: [f64; 3],
    pub psnr_avg: f64,
    /// Number of compared pixels
    pub pixel_count: usize,
}

fn psnr(mse: f64) -> f64 {
    if mse > 0.0 {
        20.0 * MAX_PIXEL_VALUE.log10() - 10.0 * mse.log10()
    } else {
        f64::INFINITY
    }
}

fn percentile(sorted: &[f32], fraction: f32) -> f32 {
    let index = (sorted.len() as f32 * fraction) as usize;
    sorted.get(index).copied().unwrap_or(0.0)
}

impl QualityMetrics {
    /// Compare every drawn output pixel with the source pixel at the same spot.
    ///
    /// Transparent output pixels belong to blank tiles and are skipped.
    pub fn compare(original: &RgbaImage, output: &RgbaImage) -> Self {
        let mut delta_e_values = Vec::with_capacity(output.len() / 4);
        let mut mse = [0f64; 3];

        for (x, y, out) in output.enumerate_pixels() {
            if !is_opaque(out) || x >= original.width() || y >= original.height() {
                continue;
            }
            let src = original.get_pixel(x, y);

            let a = oklab_from_rgb(src[0], src[1], src[2]);
            let b = oklab_from_rgb(out[0], out[1], out[2]);
            delta_e_values.push(oklab_delta_e(a, b) * DELTA_E_DISPLAY_FACTOR);

            for (c, sum) in mse.iter_mut().enumerate() {
                *sum += (src[c] as f64 - out[c] as f64).powi(2);
            }
        }

        delta_e_values.sort_by(|a, b| a.total_cmp(b));
        let pixel_count = delta_e_values.len();
        let mean = if pixel_count > 0 {
            delta_e_values.iter().sum::<f32>() / pixel_count as f32
        } else {
            0.0
        };
        let delta_e = DeltaEStats {
            min: delta_e_values.first().copied().unwrap_or(0.0),
            mean,
            median: percentile(&delta_e_values, 0.5),
            p95: percentile(&delta_e_values, 0.95),
            max: delta_e_values.last().copied().unwrap_or(0.0),
        };

        let mse = mse.map(|sum| sum / pixel_count.max(1) as f64);
        QualityMetrics {
            delta_e,
            psnr: mse.map(psnr),
            psnr_avg: psnr(mse.iter().sum::<f64>() / 3.0),
            pixel_count,
        }
    }

    pub fn log(&self) {
        info!(
            "Image quality {}x delta E (lower is better): min {:.3}, mean {:.3}, median {:.3}, p95 {:.3}, max {:.3}",
            DELTA_E_DISPLAY_FACTOR,
            self.delta_e.min,
            self.delta_e.mean,
            self.delta_e.median,
            self.delta_e.p95,
            self.delta_e.max
        );
        let [r, g, b] = self.psnr;
        info!(
            "PSNR (higher is better): red {r:.3} dB, green {g:.3} dB, blue {b:.3} dB, average {:.3} dB",
            self.psnr_avg
        );
    }
}
