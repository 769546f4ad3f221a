//! Target grid resolution over a range of source grids and overrides.

use cube_common::{BoundingBox, CrsCode, Dataset};
use grid_mapping::{Grid, GridOverrides};

// ============================================================================
// Helpers
// ============================================================================

fn sources() -> Vec<Grid> {
    vec![
        Grid::regular((360, 180), (-180.0, -90.0), (1.0, 1.0), CrsCode::Epsg4326).unwrap(),
        Grid::regular((1000, 800), (500_000.0, 4_000_000.0), (250.0, 250.0), CrsCode::Epsg3857)
            .unwrap()
            .with_tile_size((256, 256)),
        Grid::regular((7, 3), (10.0, 50.0), (0.1, 0.2), CrsCode::Epsg4326)
            .unwrap()
            .with_j_axis_up(true),
    ]
}

fn irregular_source() -> Grid {
    let x: Vec<f64> = (0..3)
        .flat_map(|j| (0..4).map(move |i| i as f64 * 0.5 + j as f64 * 0.05))
        .collect();
    let y: Vec<f64> = (0..3)
        .flat_map(|j| (0..4).map(move |i| 40.0 - j as f64 * 0.5 + i as f64 * 0.05))
        .collect();
    let ds = Dataset::curvilinear(CrsCode::Epsg4326, 4, 3, x, y, vec![]).unwrap();
    Grid::from_dataset(&ds).unwrap()
}

// ============================================================================
// No override
// ============================================================================

#[test]
fn test_no_override_returns_regularised_source() {
    for source in sources() {
        let target = source.to_target(&GridOverrides::default()).unwrap();
        assert_eq!(target, source.to_regular().unwrap());
    }

    let irregular = irregular_source();
    assert!(!irregular.is_regular());
    let target = irregular.to_target(&GridOverrides::default()).unwrap();
    assert!(target.is_regular());
    assert_eq!(target, irregular.to_regular().unwrap());
}

// ============================================================================
// Bbox overrides
// ============================================================================

#[test]
fn test_bbox_size_is_rounded_extent_over_resolution() {
    let boxes = [
        BoundingBox::new(0.0, 0.0, 10.0, 5.0),
        BoundingBox::new(0.0, 0.0, 10.4, 5.6),
        BoundingBox::new(-3.3, 1.1, 7.7, 2.9),
        BoundingBox::new(100.0, -20.0, 101.05, -18.95),
    ];
    let resolutions = [None, Some(0.1), Some(0.25), Some(0.7)];

    let all = sources();
    let source = &all[0];
    for bbox in boxes {
        for res in resolutions {
            let target = source
                .to_target(&GridOverrides {
                    spatial_res: res,
                    bbox: Some(bbox),
                    crs: None,
                })
                .unwrap();
            let (rx, ry) = target.xy_res;
            assert_eq!(
                target.size,
                (
                    ((bbox.max_x - bbox.min_x) / rx).round_ties_even() as usize,
                    ((bbox.max_y - bbox.min_y) / ry).round_ties_even() as usize,
                )
            );
            assert_eq!(target.xy_min, (bbox.min_x, bbox.min_y));
        }
    }
}

#[test]
fn test_bbox_half_pixel_sizes() {
    let source = Grid::regular((10, 10), (0.0, 0.0), (1.0, 1.0), CrsCode::Epsg4326).unwrap();
    let cases = [
        ([0.0, 0.0, 2.5, 4.5], None, (2, 4)),
        ([0.0, 0.0, 1.5, 6.5], None, (2, 6)),
        ([0.0, 0.0, 5.0, 3.0], Some(2.0), (2, 2)),
        ([0.0, 0.0, 7.0, 9.0], Some(2.0), (4, 4)),
    ];
    for (bbox, spatial_res, size) in cases {
        let target = source
            .to_target(&GridOverrides {
                spatial_res,
                bbox: Some(BoundingBox::from_array(bbox)),
                crs: None,
            })
            .unwrap();
        assert_eq!(target.size, size, "bbox {:?} at {:?}", bbox, spatial_res);
    }
}

#[test]
fn test_bbox_override_on_irregular_source() {
    let target = irregular_source()
        .to_target(&GridOverrides {
            spatial_res: Some(0.25),
            bbox: Some(BoundingBox::new(0.0, 39.0, 1.5, 40.0)),
            crs: None,
        })
        .unwrap();
    assert_eq!(target.size, (6, 4));
    assert_eq!(target.xy_res, (0.25, 0.25));
}

// ============================================================================
// Naming and tiling
// ============================================================================

#[test]
fn test_names_and_tiles_follow_source() {
    let source = sources()[1]
        .clone()
        .derive(("east".to_string(), "north".to_string()), ("e".to_string(), "n".to_string()));
    let target = source
        .to_target(&GridOverrides {
            spatial_res: Some(500.0),
            crs: Some(CrsCode::Epsg3857),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(target.tile_size, (256, 256));
    assert_eq!(target.xy_var_names, ("east".to_string(), "north".to_string()));
    assert_eq!(target.xy_dim_names, ("e".to_string(), "n".to_string()));
}
