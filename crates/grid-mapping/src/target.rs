//! Resolution of the target grid from a source grid and partial overrides.

use crate::error::Result;
use crate::grid::Grid;
use cube_common::{BoundingBox, CrsCode};
use tracing::debug;

/// Optional overrides of a source grid's geometry. Unset fields are
/// inherited from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridOverrides {
    pub spatial_res: Option<f64>,
    pub bbox: Option<BoundingBox>,
    pub crs: Option<CrsCode>,
}

impl GridOverrides {
    pub fn is_empty(&self) -> bool {
        self.spatial_res.is_none() && self.bbox.is_none() && self.crs.is_none()
    }
}

impl Grid {
    /// The regular grid every input is resampled onto.
    ///
    /// The source is regularised first. A resolution override applies to
    /// both axes. A bbox override sets the origin to its lower-left corner
    /// and the size to the bbox extent divided by the resolution, rounded
    /// to the nearest pixel count with halves going to the even count; the
    /// bbox is not checked against the source extent. Tile size, axis
    /// orientation and coordinate names are carried over from the source.
    pub fn to_target(&self, overrides: &GridOverrides) -> Result<Grid> {
        let source = self.to_regular()?;

        let xy_res = overrides
            .spatial_res
            .map(|res| (res, res))
            .unwrap_or(source.xy_res);

        let (size, xy_min) = match overrides.bbox {
            Some(bbox) => (
                (
                    (bbox.width() / xy_res.0).round_ties_even() as usize,
                    (bbox.height() / xy_res.1).round_ties_even() as usize,
                ),
                (bbox.min_x, bbox.min_y),
            ),
            None => (source.size, source.xy_min),
        };

        let crs = overrides.crs.unwrap_or(source.crs);

        let target = Grid::regular(size, xy_min, xy_res, crs)?
            .with_tile_size(source.tile_size)
            .with_j_axis_up(source.is_j_axis_up)
            .derive(source.xy_var_names.clone(), source.xy_dim_names.clone());

        debug!(
            width = target.size.0,
            height = target.size.1,
            x_min = target.xy_min.0,
            y_min = target.xy_min.1,
            x_res = target.xy_res.0,
            y_res = target.xy_res.1,
            crs = %target.crs,
            "Resolved target grid"
        );

        Ok(target)
    }
}
