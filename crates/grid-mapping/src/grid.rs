//! The grid model: regular and irregular grid mappings.

use crate::error::{GridError, Result};
use cube_common::{BoundingBox, CrsCode, Dataset, XyCoords};
use std::ops::Range;

/// Upper bound of the tile size derived for new grids.
pub const DEFAULT_TILE_SIZE: usize = 512;

/// Relative deviation from the mean step tolerated on a regular axis.
const SPACING_TOLERANCE: f64 = 1e-4;

/// Geometry of a grid beyond its regular description.
#[derive(Debug, Clone, PartialEq)]
pub enum GridKind {
    Regular,
    /// Cell-centre coordinates of every pixel, row-major `width * height`.
    Irregular { x_coords: Vec<f64>, y_coords: Vec<f64> },
}

/// A grid mapping binding array indices to coordinates in `crs`.
///
/// For regular grids `xy_min` is the lower-left corner of the lower-left
/// cell and `xy_res` the (positive) cell size. Row 0 is the northernmost row
/// unless `is_j_axis_up` is set. For irregular grids `xy_min` and `xy_res`
/// describe the regular lattice the grid would be rectified onto.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub size: (usize, usize),
    pub xy_min: (f64, f64),
    pub xy_res: (f64, f64),
    pub crs: CrsCode,
    pub tile_size: (usize, usize),
    pub is_j_axis_up: bool,
    pub xy_var_names: (String, String),
    pub xy_dim_names: (String, String),
    pub kind: GridKind,
}

enum AxisSpacing {
    Single,
    Uniform(f64),
    NonUniform,
}

fn axis_spacing(values: &[f64]) -> AxisSpacing {
    let n = values.len();
    if n < 2 {
        return AxisSpacing::Single;
    }
    if values.iter().any(|v| !v.is_finite()) {
        return AxisSpacing::NonUniform;
    }
    let step = (values[n - 1] - values[0]) / (n - 1) as f64;
    if step == 0.0 {
        return AxisSpacing::NonUniform;
    }
    let tolerance = step.abs() * SPACING_TOLERANCE;
    if values
        .windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= tolerance)
    {
        AxisSpacing::Uniform(step)
    } else {
        AxisSpacing::NonUniform
    }
}

fn default_tile_size(size: (usize, usize)) -> (usize, usize) {
    (size.0.min(DEFAULT_TILE_SIZE), size.1.min(DEFAULT_TILE_SIZE))
}

impl Grid {
    /// Create a north-up regular grid with default names and tile size.
    pub fn regular(
        size: (usize, usize),
        xy_min: (f64, f64),
        xy_res: (f64, f64),
        crs: CrsCode,
    ) -> Result<Self> {
        if size.0 == 0 || size.1 == 0 {
            return Err(GridError::InvalidSize {
                width: size.0,
                height: size.1,
            });
        }
        if !(xy_res.0.is_finite() && xy_res.0 > 0.0 && xy_res.1.is_finite() && xy_res.1 > 0.0) {
            return Err(GridError::InvalidResolution(xy_res.0, xy_res.1));
        }
        if !xy_min.0.is_finite() || !xy_min.1.is_finite() {
            return Err(GridError::degenerate(format!(
                "non-finite grid origin ({}, {})",
                xy_min.0, xy_min.1
            )));
        }

        let names = crs.default_xy_names();
        Ok(Self {
            size,
            xy_min,
            xy_res,
            crs,
            tile_size: default_tile_size(size),
            is_j_axis_up: false,
            xy_var_names: names.clone(),
            xy_dim_names: names,
            kind: GridKind::Regular,
        })
    }

    pub fn with_tile_size(mut self, tile_size: (usize, usize)) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_j_axis_up(mut self, is_j_axis_up: bool) -> Self {
        self.is_j_axis_up = is_j_axis_up;
        self
    }

    /// Re-attach coordinate variable and dimension names.
    pub fn derive(mut self, xy_var_names: (String, String), xy_dim_names: (String, String)) -> Self {
        self.xy_var_names = xy_var_names;
        self.xy_dim_names = xy_dim_names;
        self
    }

    pub fn is_regular(&self) -> bool {
        matches!(self.kind, GridKind::Regular)
    }

    pub fn width(&self) -> usize {
        self.size.0
    }

    pub fn height(&self) -> usize {
        self.size.1
    }

    /// Derive the grid mapping of a dataset from its coordinates.
    ///
    /// Uniformly spaced, ascending x with uniformly spaced y gives a regular
    /// grid; anything else (including 2-D coordinates) gives an irregular one.
    /// An axis of length one borrows the resolution of the other axis.
    pub fn from_dataset(ds: &Dataset) -> Result<Self> {
        let grid = match &ds.xy {
            XyCoords::Rectilinear { x, y } => match regular_steps(x, y)? {
                Some((dx, dy)) => {
                    let rx = dx;
                    let ry = dy.abs();
                    let y_lowest = y[0].min(y[y.len() - 1]);
                    Self::regular(
                        (x.len(), y.len()),
                        (x[0] - rx / 2.0, y_lowest - ry / 2.0),
                        (rx, ry),
                        ds.crs,
                    )?
                    .with_j_axis_up(dy > 0.0)
                }
                None => {
                    let w = x.len();
                    let x_coords: Vec<f64> = y.iter().flat_map(|_| x.iter().copied()).collect();
                    let y_coords: Vec<f64> = y
                        .iter()
                        .flat_map(|&yv| std::iter::repeat(yv).take(w))
                        .collect();
                    Self::irregular(ds.crs, (x.len(), y.len()), x_coords, y_coords)?
                }
            },
            XyCoords::Curvilinear { x, y } => {
                Self::irregular(ds.crs, (ds.width, ds.height), x.clone(), y.clone())?
            }
        };

        Ok(grid.derive(ds.xy_var_names.clone(), ds.xy_dim_names.clone()))
    }

    fn irregular(
        crs: CrsCode,
        size: (usize, usize),
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
    ) -> Result<Self> {
        let res = mean_pixel_spacing(&x_coords, &y_coords, size.0, size.1).ok_or_else(|| {
            GridError::degenerate("cannot estimate the pixel size of irregular coordinates")
        })?;
        let bounds = finite_bounds(&x_coords, &y_coords)
            .ok_or_else(|| GridError::NonFiniteCoordinates("x/y".to_string()))?;

        let names = crs.default_xy_names();
        Ok(Self {
            size,
            xy_min: (bounds.min_x - res / 2.0, bounds.min_y - res / 2.0),
            xy_res: (res, res),
            crs,
            tile_size: default_tile_size(size),
            is_j_axis_up: false,
            xy_var_names: names,
            xy_dim_names: ("x".to_string(), "y".to_string()),
            kind: GridKind::Irregular { x_coords, y_coords },
        })
    }

    /// The regular grid this grid is rectified onto.
    ///
    /// Regular grids are returned unchanged. Irregular grids become a
    /// north-up grid with square pixels whose size is the smaller of the
    /// mean row and column pixel spacing, covering the coordinate extent
    /// padded by half a pixel.
    pub fn to_regular(&self) -> Result<Self> {
        let (x_coords, y_coords) = match &self.kind {
            GridKind::Regular => return Ok(self.clone()),
            GridKind::Irregular { x_coords, y_coords } => (x_coords, y_coords),
        };

        if x_coords.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFiniteCoordinates(self.xy_var_names.0.clone()));
        }
        if y_coords.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFiniteCoordinates(self.xy_var_names.1.clone()));
        }

        let res = self.xy_res.0;
        let bounds = finite_bounds(x_coords, y_coords)
            .ok_or_else(|| GridError::NonFiniteCoordinates("x/y".to_string()))?;
        let x_min = bounds.min_x - res / 2.0;
        let y_min = bounds.min_y - res / 2.0;
        let width = cells_to_cover(bounds.width() + res, res);
        let height = cells_to_cover(bounds.height() + res, res);

        let tile_size = (self.tile_size.0.min(width), self.tile_size.1.min(height));
        Ok(Self::regular((width, height), (x_min, y_min), (res, res), self.crs)?
            .with_tile_size(tile_size)
            .derive(self.xy_var_names.clone(), self.xy_dim_names.clone()))
    }

    /// Cell-centre x coordinates of a regular grid.
    pub fn x_centers(&self) -> Vec<f64> {
        let (x0, rx) = (self.xy_min.0, self.xy_res.0);
        (0..self.size.0)
            .map(|i| x0 + (i as f64 + 0.5) * rx)
            .collect()
    }

    /// Cell-centre y coordinates of a regular grid, in row order.
    pub fn y_centers(&self) -> Vec<f64> {
        let (y0, ry) = (self.xy_min.1, self.xy_res.1);
        let h = self.size.1;
        (0..h)
            .map(|j| {
                if self.is_j_axis_up {
                    y0 + (j as f64 + 0.5) * ry
                } else {
                    y0 + ((h - j) as f64 - 0.5) * ry
                }
            })
            .collect()
    }

    /// Outer bounds of the grid cells.
    pub fn bbox(&self) -> BoundingBox {
        match &self.kind {
            GridKind::Regular => BoundingBox::new(
                self.xy_min.0,
                self.xy_min.1,
                self.xy_min.0 + self.size.0 as f64 * self.xy_res.0,
                self.xy_min.1 + self.size.1 as f64 * self.xy_res.1,
            ),
            GridKind::Irregular { x_coords, y_coords } => {
                let half = self.xy_res.0 / 2.0;
                finite_bounds(x_coords, y_coords)
                    .map(|b| BoundingBox::new(b.min_x - half, b.min_y - half, b.max_x + half, b.max_y + half))
                    .unwrap_or_else(|| BoundingBox::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN))
            }
        }
    }

    /// True when both grids are regular and place every cell identically.
    pub fn same_geometry(&self, other: &Grid) -> bool {
        if !self.is_regular() || !other.is_regular() {
            return false;
        }
        let close = |a: f64, b: f64, scale: f64| (a - b).abs() <= scale.abs() * 1e-6;
        self.size == other.size
            && self.crs.is_equivalent(&other.crs)
            && self.is_j_axis_up == other.is_j_axis_up
            && close(self.xy_res.0, other.xy_res.0, self.xy_res.0)
            && close(self.xy_res.1, other.xy_res.1, self.xy_res.1)
            && close(self.xy_min.0, other.xy_min.0, self.xy_res.0)
            && close(self.xy_min.1, other.xy_min.1, self.xy_res.1)
    }

    /// Fractional pixel index of a point, with cell centres at integers.
    pub fn fractional_index(&self, x: f64, y: f64) -> (f64, f64) {
        let fi = (x - self.xy_min.0) / self.xy_res.0 - 0.5;
        let fj = if self.is_j_axis_up {
            (y - self.xy_min.1) / self.xy_res.1 - 0.5
        } else {
            let y_max = self.xy_min.1 + self.size.1 as f64 * self.xy_res.1;
            (y_max - y) / self.xy_res.1 - 0.5
        };
        (fi, fj)
    }

    /// Column and row ranges covering `bbox`, widened by `margin` pixels.
    ///
    /// Returns `None` when the box misses the grid entirely.
    pub fn index_window(&self, bbox: &BoundingBox, margin: usize) -> Option<(Range<usize>, Range<usize>)> {
        if !self.is_regular() || !self.bbox().intersects(bbox) {
            return None;
        }
        let (w, h) = (self.size.0 as i64, self.size.1 as i64);
        let m = margin as i64;
        let (x0, y0) = self.xy_min;
        let (rx, ry) = self.xy_res;

        let col_start = ((bbox.min_x - x0) / rx).floor() as i64 - m;
        let col_end = ((bbox.max_x - x0) / rx).ceil() as i64 + m;
        let (row_start, row_end) = if self.is_j_axis_up {
            (
                ((bbox.min_y - y0) / ry).floor() as i64 - m,
                ((bbox.max_y - y0) / ry).ceil() as i64 + m,
            )
        } else {
            let y_max = y0 + h as f64 * ry;
            (
                ((y_max - bbox.max_y) / ry).floor() as i64 - m,
                ((y_max - bbox.min_y) / ry).ceil() as i64 + m,
            )
        };

        let cols = col_start.clamp(0, w) as usize..col_end.clamp(0, w) as usize;
        let rows = row_start.clamp(0, h) as usize..row_end.clamp(0, h) as usize;
        if cols.is_empty() || rows.is_empty() {
            return None;
        }
        Some((cols, rows))
    }

    /// The sub-grid covering the index window `cols` x `rows`.
    pub fn crop(&self, cols: Range<usize>, rows: Range<usize>) -> Result<Self> {
        if !self.is_regular() {
            return Err(GridError::not_regular("cannot crop an irregular grid"));
        }
        if cols.is_empty() || rows.is_empty() || cols.end > self.size.0 || rows.end > self.size.1 {
            return Err(GridError::InvalidSize {
                width: cols.len(),
                height: rows.len(),
            });
        }
        let (rx, ry) = self.xy_res;
        let x0 = self.xy_min.0 + cols.start as f64 * rx;
        let y0 = if self.is_j_axis_up {
            self.xy_min.1 + rows.start as f64 * ry
        } else {
            self.xy_min.1 + (self.size.1 - rows.end) as f64 * ry
        };
        let size = (cols.len(), rows.len());
        Ok(Self {
            size,
            xy_min: (x0, y0),
            tile_size: (self.tile_size.0.min(size.0), self.tile_size.1.min(size.1)),
            ..self.clone()
        })
    }
}

/// Steps of a regular rectilinear grid, or `None` if the axes are irregular.
fn regular_steps(x: &[f64], y: &[f64]) -> Result<Option<(f64, f64)>> {
    let steps = match (axis_spacing(x), axis_spacing(y)) {
        (AxisSpacing::Single, AxisSpacing::Single) => {
            return Err(GridError::degenerate(
                "a single-cell dataset has no resolution",
            ))
        }
        (AxisSpacing::Uniform(dx), AxisSpacing::Uniform(dy)) => (dx, dy),
        (AxisSpacing::Uniform(dx), AxisSpacing::Single) => (dx, -dx.abs()),
        (AxisSpacing::Single, AxisSpacing::Uniform(dy)) => (dy.abs(), dy),
        _ => return Ok(None),
    };
    if steps.0 < 0.0 || !x[0].is_finite() || !y[0].is_finite() {
        return Ok(None);
    }
    Ok(Some(steps))
}

/// Mean distance between horizontally and vertically adjacent pixels,
/// returning the smaller of the two.
fn mean_pixel_spacing(xs: &[f64], ys: &[f64], width: usize, height: usize) -> Option<f64> {
    let mean_step = |pairs: &mut dyn Iterator<Item = (usize, usize)>| -> Option<f64> {
        let (sum, count) = pairs
            .map(|(a, b)| (xs[b] - xs[a]).hypot(ys[b] - ys[a]))
            .filter(|d| d.is_finite() && *d > 0.0)
            .fold((0.0, 0usize), |(s, n), d| (s + d, n + 1));
        (count > 0).then(|| sum / count as f64)
    };

    let row_step = mean_step(&mut (0..height).flat_map(|j| {
        (0..width.saturating_sub(1)).map(move |i| (j * width + i, j * width + i + 1))
    }));
    let col_step = mean_step(&mut (0..height.saturating_sub(1)).flat_map(|j| {
        (0..width).map(move |i| (j * width + i, (j + 1) * width + i))
    }));

    match (row_step, col_step) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn finite_bounds(xs: &[f64], ys: &[f64]) -> Option<BoundingBox> {
    let fold = |values: &[f64]| {
        values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    };
    let (x_min, x_max) = fold(xs)?;
    let (y_min, y_max) = fold(ys)?;
    Some(BoundingBox::new(x_min, y_min, x_max, y_max))
}

fn cells_to_cover(extent: f64, res: f64) -> usize {
    ((extent / res) - 1e-9).ceil().max(1.0) as usize
}
