use super::{CubeTransformer, TransformedCube};
use crate::error::StageResult;
use tracing::debug;

/// Gives every variable the chunk layout `(1, tile_h, tile_w)`.
///
/// The tile size comes from the cube config, or else from the grid capped
/// at `max_tile_size`. Chunks are clipped to the array shape.
#[derive(Debug, Clone, Copy)]
pub struct Rechunker {
    max_tile_size: usize,
}

impl Rechunker {
    pub fn new(max_tile_size: usize) -> Self {
        Self {
            max_tile_size: max_tile_size.max(1),
        }
    }
}

impl CubeTransformer for Rechunker {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        let (tile_w, tile_h) = match cube.config.tile_size {
            Some([w, h]) => (w, h),
            None => (
                cube.grid.tile_size.0.min(self.max_tile_size),
                cube.grid.tile_size.1.min(self.max_tile_size),
            ),
        };

        let TransformedCube {
            mut dataset,
            mut grid,
            config,
        } = cube;
        let chunks = [
            1,
            tile_h.min(dataset.height).max(1),
            tile_w.min(dataset.width).max(1),
        ];
        for var in dataset.data_vars.values_mut() {
            var.chunks = Some(chunks);
        }
        grid.tile_size = (tile_w, tile_h);

        debug!(chunks = ?chunks, "Rechunked cube");
        Ok(TransformedCube::new(dataset, grid, config))
    }
}
