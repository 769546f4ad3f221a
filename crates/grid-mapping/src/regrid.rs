//! Spatial resampling of datasets between grid mappings.

use crate::error::{GridError, Result};
use crate::grid::{Grid, GridKind};
use crate::interpolation::sample;
use crate::types::InterpolationMethod;
use cube_common::{can_transform, transform_point, CrsCode, Dataset};
use rayon::prelude::*;
use tracing::{debug, info};

/// Per-target-cell lookup into the source plane.
enum CellMapping {
    /// Fractional source index for each target cell (regular sources).
    Inverse(Vec<Option<(f64, f64)>>),
    /// Flat index of the nearest source pixel (irregular sources).
    Forward(Vec<Option<usize>>),
}

/// Resample `ds`, laid out on `source`, onto the regular grid `target`.
///
/// Regular sources are sampled by inverse mapping every target cell centre
/// into the source grid with `method`. Irregular sources are rectified by
/// assigning each source pixel to the target cell it falls in, keeping the
/// pixel closest to the cell centre. Target cells not covered by the source
/// are NaN. A source already on the target geometry is returned unchanged.
pub fn resample_in_space(
    ds: &Dataset,
    source: &Grid,
    target: &Grid,
    method: InterpolationMethod,
) -> Result<Dataset> {
    if (ds.width, ds.height) != source.size {
        return Err(GridError::SizeMismatch {
            expected: source.size,
            actual: (ds.width, ds.height),
        });
    }
    if !target.is_regular() {
        return Err(GridError::not_regular("resampling target"));
    }
    if !ds.xy.is_curvilinear() && source.same_geometry(target) {
        debug!("Source already on target grid, skipping spatial resampling");
        return Ok(ds.clone());
    }
    if !can_transform(target.crs, source.crs) {
        return Err(GridError::UnsupportedTransform {
            from: source.crs,
            to: target.crs,
        });
    }

    let mapping = match &source.kind {
        GridKind::Regular => CellMapping::Inverse(inverse_indices(source, target)),
        GridKind::Irregular { x_coords, y_coords } => {
            CellMapping::Forward(forward_indices(x_coords, y_coords, source.crs, target))
        }
    };

    info!(
        src_width = source.size.0,
        src_height = source.size.1,
        dst_width = target.size.0,
        dst_height = target.size.1,
        method = %method,
        regular_source = source.is_regular(),
        variables = ds.data_vars.len(),
        "Resampling dataset in space"
    );

    let mut out = Dataset::rectilinear(
        target.crs,
        target.x_centers(),
        target.y_centers(),
        ds.time.clone(),
    )?;
    out.attrs = ds.attrs.clone();
    out.xy_var_names = target.xy_var_names.clone();
    out.xy_dim_names = target.xy_dim_names.clone();

    let (sw, sh) = source.size;
    let src_plane = sw * sh;
    for (name, var) in &ds.data_vars {
        let mut data = Vec::with_capacity(out.var_len());
        for t in 0..ds.time.len() {
            let plane = &var.data[t * src_plane..(t + 1) * src_plane];
            let resampled: Vec<f32> = match &mapping {
                CellMapping::Inverse(cells) => cells
                    .par_iter()
                    .map(|cell| cell.map_or(f32::NAN, |(fi, fj)| sample(method, plane, sw, sh, fi, fj)))
                    .collect(),
                CellMapping::Forward(cells) => cells
                    .par_iter()
                    .map(|cell| cell.map_or(f32::NAN, |k| plane[k]))
                    .collect(),
            };
            data.extend(resampled);
        }
        let mut resampled = var.with_data(data);
        resampled.chunks = None;
        out.add_var(name.clone(), resampled)?;
    }

    Ok(out)
}

fn inverse_indices(source: &Grid, target: &Grid) -> Vec<Option<(f64, f64)>> {
    let xs = target.x_centers();
    let ys = target.y_centers();
    let (tw, th) = target.size;
    let max_i = source.size.0 as f64 - 1.0;
    let max_j = source.size.1 as f64 - 1.0;

    let mut cells = vec![None; tw * th];
    cells
        .par_chunks_mut(tw)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, cell) in row.iter_mut().enumerate() {
                *cell = transform_point(target.crs, source.crs, xs[i], ys[j])
                    .map(|(sx, sy)| source.fractional_index(sx, sy))
                    .filter(|&(fi, fj)| {
                        (-0.5..=max_i + 0.5).contains(&fi) && (-0.5..=max_j + 0.5).contains(&fj)
                    })
                    .map(|(fi, fj)| (fi.clamp(0.0, max_i), fj.clamp(0.0, max_j)));
            }
        });
    cells
}

fn forward_indices(
    x_coords: &[f64],
    y_coords: &[f64],
    source_crs: CrsCode,
    target: &Grid,
) -> Vec<Option<usize>> {
    let (tw, th) = target.size;
    let mut best: Vec<Option<(usize, f64)>> = vec![None; tw * th];

    for (k, (&x, &y)) in x_coords.iter().zip(y_coords).enumerate() {
        let Some((tx, ty)) = transform_point(source_crs, target.crs, x, y) else {
            continue;
        };
        let (fi, fj) = target.fractional_index(tx, ty);
        if !fi.is_finite() || !fj.is_finite() {
            continue;
        }
        let (ci, cj) = (fi.round(), fj.round());
        if ci < 0.0 || cj < 0.0 || ci >= tw as f64 || cj >= th as f64 {
            continue;
        }
        let dist = (fi - ci).powi(2) + (fj - cj).powi(2);
        let cell = cj as usize * tw + ci as usize;
        if best[cell].map_or(true, |(_, d)| dist < d) {
            best[cell] = Some((k, dist));
        }
    }

    best.into_iter().map(|b| b.map(|(k, _)| k)).collect()
}
