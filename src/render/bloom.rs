//! CPU glow pass: bright-pass, separable box blur, additive composite.

use rayon::prelude::*;

use super::canvas::BloomSettings;

type Rgb = [f32; 3];

fn luminance(c: &Rgb) -> f32 {
    0.2126 * c[0] + 0.7152 * c[1] + 0.0722 * c[2]
}

/// Applies bloom in place to tightly packed RGBA8 pixels.
pub fn apply(pixels: &mut [u8], width: u32, height: u32, settings: &BloomSettings) {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 || settings.strength <= 0.0 || pixels.len() < w * h * 4 {
        return;
    }
    let pixels = &mut pixels[..w * h * 4];

    let bright: Vec<Rgb> = pixels
        .par_chunks_exact(4)
        .map(|px| {
            let c = [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0];
            if luminance(&c) > settings.threshold {
                c
            } else {
                [0.0; 3]
            }
        })
        .collect();

    let radius = settings.radius as usize;
    let horizontal = blur_rows(&bright, w, radius);
    let glow = blur_columns(&horizontal, w, h, radius);

    pixels
        .par_chunks_exact_mut(4)
        .zip(glow.par_iter())
        .for_each(|(px, g)| {
            for i in 0..3 {
                let v = px[i] as f32 / 255.0 + g[i] * settings.strength;
                px[i] = (v.min(1.0) * 255.0).round() as u8;
            }
        });
}

fn blur_rows(src: &[Rgb], w: usize, radius: usize) -> Vec<Rgb> {
    let mut out = vec![[0.0; 3]; src.len()];
    out.par_chunks_mut(w).zip(src.par_chunks(w)).for_each(|(row, line)| {
        for (x, dst) in row.iter_mut().enumerate() {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            let mut acc = [0.0f32; 3];
            for s in &line[lo..=hi] {
                acc[0] += s[0];
                acc[1] += s[1];
                acc[2] += s[2];
            }
            let n = (hi - lo + 1) as f32;
            *dst = [acc[0] / n, acc[1] / n, acc[2] / n];
        }
    });
    out
}

fn blur_columns(src: &[Rgb], w: usize, h: usize, radius: usize) -> Vec<Rgb> {
    let mut out = vec![[0.0; 3]; src.len()];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(h - 1);
        let n = (hi - lo + 1) as f32;
        for (x, dst) in row.iter_mut().enumerate() {
            let mut acc = [0.0f32; 3];
            for yy in lo..=hi {
                let s = &src[yy * w + x];
                acc[0] += s[0];
                acc[1] += s[1];
                acc[2] += s[2];
            }
            *dst = [acc[0] / n, acc[1] / n, acc[2] / n];
        }
    });
    out
}
