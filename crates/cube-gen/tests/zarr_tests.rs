//! Generator runs reading from and writing to Zarr stores on disk.

mod common;

use common::nearest_generator;
use cube_common::CrsCode;
use cube_gen::{CubeConfig, CubeGenerator, CubeGeneratorRequest};
use cube_store::{DataStore, InputConfig, OutputConfig, StorePool, ZarrStore, ZarrStoreConfig};
use grid_mapping::Grid;
use test_utils::{assert_approx_eq, assert_bbox_approx_eq, bbox, cell_value, daily_times, stores, test_dataset, zarr_pool};

fn input_store(dir: &std::path::Path) -> ZarrStore {
    ZarrStore::new(ZarrStoreConfig::new(dir.join(stores::INPUT))).unwrap()
}

fn output_store(dir: &std::path::Path) -> ZarrStore {
    ZarrStore::new(ZarrStoreConfig::new(dir.join(stores::OUTPUT))).unwrap()
}

#[test]
fn test_zarr_to_zarr_with_generated_data_id() {
    let (pool, dir) = zarr_pool();
    let source = test_dataset(bbox::NORTH_SEA, 1.0, daily_times("2024-06-01", 2), &["chl"]);
    input_store(dir.path())
        .write_data(&source, "source.zarr", false, &Default::default())
        .unwrap();

    let generator = nearest_generator(pool);
    let request = CubeGeneratorRequest::new(
        vec![InputConfig::new(stores::INPUT, "source.zarr")],
        OutputConfig::new(stores::OUTPUT),
    )
    .with_cube_config(CubeConfig::new().with_tile_size(4, 4));
    let result = generator.generate(request).unwrap();
    assert!(result.is_ok(), "{:?}", result);

    let data_id = result.data_id().unwrap().to_string();
    assert!(data_id.ends_with(".zarr"));

    let output = output_store(dir.path());
    assert!(output.has_data(&data_id));
    let cube = output.open_data(&data_id, &Default::default()).unwrap();
    assert_eq!(cube.time, source.time);
    let chl = cube.var("chl").unwrap();
    assert_eq!(chl.data, source.var("chl").unwrap().data);
    assert_eq!(chl.chunks, Some([1, 4, 4]));
    assert_eq!(cube.attrs["Conventions"], "CF-1.7");
    assert!(chl.attrs.get("grid_mapping").is_none());
    assert!(cube.scalar_vars.is_empty());
}

#[test]
fn test_zarr_resampled_to_mercator() {
    let (pool, dir) = zarr_pool();
    let source = test_dataset(bbox::NORTH_SEA, 1.0, daily_times("2024-06-01", 1), &["chl"]);
    input_store(dir.path())
        .write_data(&source, "source.zarr", false, &Default::default())
        .unwrap();

    let generator = nearest_generator(pool);
    let request = CubeGeneratorRequest::new(
        vec![InputConfig::new(stores::INPUT, "source.zarr")],
        OutputConfig::new(stores::OUTPUT).with_data_id("mercator.zarr"),
    )
    .with_cube_config(
        CubeConfig::new()
            .with_crs("EPSG:3857")
            .with_bbox([100_000.0, 6_700_000.0, 1_000_000.0, 7_500_000.0])
            .with_spatial_res(100_000.0),
    );
    let result = generator.generate(request).unwrap();
    assert!(result.is_ok(), "{:?}", result);

    let cube = output_store(dir.path())
        .open_data("mercator.zarr", &Default::default())
        .unwrap();
    let grid = Grid::from_dataset(&cube).unwrap();
    assert_eq!(grid.crs, CrsCode::Epsg3857);
    assert_eq!(grid.size, (9, 8));
    assert_bbox_approx_eq!(grid.bbox().to_array(), [100_000.0, 6_700_000.0, 1_000_000.0, 7_500_000.0], 1e-6);
    assert_approx_eq!(grid.xy_res.0, 100_000.0, 1e-9);

    let mapping_var = cube.var("chl").unwrap().attrs["grid_mapping"].as_str().unwrap();
    assert!(cube.has_variable(mapping_var));
    assert_eq!(cube.scalar_vars[mapping_var], CrsCode::Epsg3857.cf_attrs());

    // Every target cell lies inside the source, so nothing is NaN.
    let chl = &cube.var("chl").unwrap().data;
    assert!(chl.iter().all(|v| v.is_finite()));
    assert!(chl.iter().all(|v| *v >= cell_value(0, 0, 0) && *v <= cell_value(0, 4, 9)));
}

#[test]
fn test_missing_output_store_fails_at_write() {
    let (pool, dir) = zarr_pool();
    let source = test_dataset(bbox::NORTH_SEA, 1.0, daily_times("2024-06-01", 1), &["chl"]);
    input_store(dir.path())
        .write_data(&source, "source.zarr", false, &Default::default())
        .unwrap();
    let pool = {
        let only_input = StorePool::new();
        only_input
            .add_store(stores::INPUT, pool.get_store(stores::INPUT).unwrap())
            .unwrap();
        std::sync::Arc::new(only_input)
    };

    let generator = nearest_generator(pool);
    let request = CubeGeneratorRequest::new(
        vec![InputConfig::new(stores::INPUT, "source.zarr")],
        OutputConfig::new("nowhere"),
    );
    let result = generator.generate(request).unwrap();
    assert_eq!(result.status_code(), 500);
    assert!(result.message().starts_with("Failed while writing"));
}
