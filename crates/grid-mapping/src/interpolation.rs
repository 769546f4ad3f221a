//! Interpolation kernels sampling a 2-D plane at fractional pixel indices.
//!
//! Indices place cell centres on integers. Callers clamp indices into
//! `[0, width - 1] x [0, height - 1]` before sampling.

use crate::types::InterpolationMethod;

/// Sample `plane` (row-major, `width * height`) at `(fi, fj)`.
pub fn sample(
    method: InterpolationMethod,
    plane: &[f32],
    width: usize,
    height: usize,
    fi: f64,
    fj: f64,
) -> f32 {
    match method {
        InterpolationMethod::Nearest => nearest(plane, width, height, fi, fj),
        InterpolationMethod::Bilinear => bilinear(plane, width, height, fi, fj),
        InterpolationMethod::Cubic => cubic(plane, width, height, fi, fj),
    }
}

/// Value of the nearest cell.
pub fn nearest(plane: &[f32], width: usize, height: usize, fi: f64, fj: f64) -> f32 {
    let col = fi.round().clamp(0.0, (width - 1) as f64) as usize;
    let row = fj.round().clamp(0.0, (height - 1) as f64) as usize;
    plane[row * width + col]
}

/// Bilinear blend of the four surrounding cells.
///
/// NaN corners are left out and the remaining weights renormalised, so
/// coastlines and swath edges do not eat into valid data.
pub fn bilinear(plane: &[f32], width: usize, height: usize, fi: f64, fj: f64) -> f32 {
    let i0 = fi.floor().clamp(0.0, (width - 1) as f64) as usize;
    let j0 = fj.floor().clamp(0.0, (height - 1) as f64) as usize;
    let i1 = (i0 + 1).min(width - 1);
    let j1 = (j0 + 1).min(height - 1);
    let tx = (fi - i0 as f64).clamp(0.0, 1.0);
    let ty = (fj - j0 as f64).clamp(0.0, 1.0);

    let corners = [
        (plane[j0 * width + i0], (1.0 - tx) * (1.0 - ty)),
        (plane[j0 * width + i1], tx * (1.0 - ty)),
        (plane[j1 * width + i0], (1.0 - tx) * ty),
        (plane[j1 * width + i1], tx * ty),
    ];

    let (sum, weight) = corners
        .iter()
        .filter(|(v, w)| !v.is_nan() && *w > 0.0)
        .fold((0.0f64, 0.0f64), |(s, ws), (v, w)| (s + *v as f64 * w, ws + w));

    if weight > 0.0 {
        (sum / weight) as f32
    } else {
        f32::NAN
    }
}

/// Catmull-Rom bicubic over the surrounding 4x4 cells.
///
/// Falls back to [`bilinear`] when any of the 16 cells is NaN.
pub fn cubic(plane: &[f32], width: usize, height: usize, fi: f64, fj: f64) -> f32 {
    let i0 = fi.floor() as i64;
    let j0 = fj.floor() as i64;
    let tx = (fi - i0 as f64) as f32;
    let ty = (fj - j0 as f64) as f32;

    let max_i = width as i64 - 1;
    let max_j = height as i64 - 1;

    let mut rows = [0.0f32; 4];
    for (dj, row) in rows.iter_mut().enumerate() {
        let j = (j0 + dj as i64 - 1).clamp(0, max_j) as usize;
        let mut p = [0.0f32; 4];
        for (di, value) in p.iter_mut().enumerate() {
            let i = (i0 + di as i64 - 1).clamp(0, max_i) as usize;
            *value = plane[j * width + i];
            if value.is_nan() {
                return bilinear(plane, width, height, fi, fj);
            }
        }
        *row = catmull_rom(p, tx);
    }
    catmull_rom(rows, ty)
}

fn catmull_rom(p: [f32; 4], t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p[0] + 1.5 * p[1] - 1.5 * p[2] + 0.5 * p[3];
    let b = p[0] - 2.5 * p[1] + 2.0 * p[2] - 0.5 * p[3];
    let c = -0.5 * p[0] + 0.5 * p[2];
    let d = p[1];

    a * t3 + b * t2 + c * t + d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const PLANE: [f32; 9] = [
        1.0, 2.0, 3.0,
        4.0, 5.0, 6.0,
        7.0, 8.0, 9.0,
    ];

    #[test]
    fn test_nearest() {
        assert_eq!(nearest(&PLANE, 3, 3, 0.0, 0.0), 1.0);
        assert_eq!(nearest(&PLANE, 3, 3, 0.4, 0.4), 1.0);
        assert_eq!(nearest(&PLANE, 3, 3, 0.6, 0.6), 5.0);
        assert_eq!(nearest(&PLANE, 3, 3, -0.4, 2.4), 7.0);
    }

    #[test]
    fn test_bilinear_exact_at_centres() {
        assert_eq!(bilinear(&PLANE, 3, 3, 1.0, 1.0), 5.0);
        assert_eq!(bilinear(&PLANE, 3, 3, 2.0, 2.0), 9.0);
        let mid = bilinear(&PLANE, 3, 3, 0.5, 0.5);
        assert!((mid - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_skips_nan_corners() {
        let plane = [1.0, f32::NAN, 3.0, 5.0];
        let v = bilinear(&plane, 2, 2, 0.5, 0.5);
        assert!((v - 3.0).abs() < 1e-6);

        let all_nan = [f32::NAN; 4];
        assert!(bilinear(&all_nan, 2, 2, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_bilinear_single_column() {
        let plane = [2.0, 4.0];
        let v = bilinear(&plane, 1, 2, 0.0, 0.5);
        assert!((v - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_cubic_reproduces_linear_ramp() {
        let v = cubic(&PLANE, 3, 3, 1.0, 1.0);
        assert!((v - 5.0).abs() < 1e-5);

        let ramp: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let v = cubic(&ramp, 4, 4, 1.5, 1.5);
        assert!((v - 7.5).abs() < 1e-5);
    }

    #[test]
    fn test_cubic_falls_back_on_nan() {
        let mut plane = PLANE;
        plane[0] = f32::NAN;
        let v = cubic(&plane, 3, 3, 1.0, 1.0);
        assert!((v - 5.0).abs() < 1e-6);
    }
}
