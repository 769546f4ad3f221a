//! Zarr V3 filesystem store.
//!
//! Every dataset is a Zarr group in its own directory below the store root:
//!
//! ```text
//! <root>/<data_id>/
//!     zarr.json        group; attributes hold dataset attrs, CRS, names, variables
//!     <x name>/        float64, [width] or [height, width]
//!     <y name>/        float64, [height] or [height, width]
//!     time/            int64 seconds since 1970-01-01
//!     <variable>/      float32, [time, height, width], NaN fill
//!     <scalar>/        int32, 0-D, attributes only (e.g. the CF grid mapping)
//! ```

use crate::config::{ZarrCompression, ZarrStoreConfig};
use crate::error::{Result, StoreError};
use crate::store::{check_params, requested_variables, validate_data_id, DataStore};
use chrono::{DateTime, Utc};
use cube_common::{Attrs, CrsCode, Dataset, Variable, XyCoords};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;

const TIME_ARRAY: &str = "time";
const LAYOUT_KEY: &str = "cube_layout";

/// Layout description stored in the group attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CubeLayout {
    crs: CrsCode,
    width: usize,
    height: usize,
    curvilinear: bool,
    xy_var_names: (String, String),
    xy_dim_names: (String, String),
    variables: Vec<StoredVariable>,
    #[serde(default)]
    scalar_variables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVariable {
    name: String,
    chunks: [usize; 3],
}

/// A directory of Zarr V3 groups, one per data id.
#[derive(Debug, Clone)]
pub struct ZarrStore {
    config: ZarrStoreConfig,
}

impl ZarrStore {
    pub fn new(config: ZarrStoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::Config)?;
        std::fs::create_dir_all(&config.root)?;
        Ok(Self { config })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn data_path(&self, data_id: &str) -> Result<PathBuf> {
        validate_data_id(data_id)?;
        Ok(self.config.root.join(data_id))
    }

    fn open_fs(path: &Path) -> Result<Arc<FilesystemStore>> {
        let store = FilesystemStore::new(path).map_err(|e| StoreError::zarr(e.to_string()))?;
        Ok(Arc::new(store))
    }

    /// Create the compression codec for variable arrays.
    fn compression_codec(
        &self,
        compression: ZarrCompression,
    ) -> Result<Option<Arc<dyn BytesToBytesCodecTraits>>> {
        let compressor = match compression {
            ZarrCompression::None => return Ok(None),
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| StoreError::Config("Invalid compression level".to_string()))?;

        // typesize is required when shuffle is enabled
        let (shuffle, typesize) = if self.config.shuffle {
            (BloscShuffleMode::Shuffle, Some(4))
        } else {
            (BloscShuffleMode::NoShuffle, None)
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Some(Arc::new(codec)))
    }

    fn write_coords(store: &Arc<FilesystemStore>, dataset: &Dataset) -> Result<()> {
        let (x_name, y_name) = &dataset.xy_var_names;
        let (w, h) = (dataset.width as u64, dataset.height as u64);
        match &dataset.xy {
            XyCoords::Rectilinear { x, y } => {
                write_f64_array(store, x_name, vec![w], x)?;
                write_f64_array(store, y_name, vec![h], y)?;
            }
            XyCoords::Curvilinear { x, y } => {
                write_f64_array(store, x_name, vec![h, w], x)?;
                write_f64_array(store, y_name, vec![h, w], y)?;
            }
        }

        let seconds: Vec<i64> = dataset.time.iter().map(|t| t.timestamp()).collect();
        let mut attrs = Attrs::new();
        attrs.insert("units".to_string(), "seconds since 1970-01-01T00:00:00Z".into());
        attrs.insert("standard_name".to_string(), "time".into());
        let array = ArrayBuilder::new(
            vec![seconds.len() as u64],
            DataType::Int64,
            chunk_grid(vec![seconds.len().max(1) as u64])?,
            FillValue::from(0i64),
        )
        .attributes(attrs)
        .build(store.clone(), &format!("/{}", TIME_ARRAY))
        .map_err(|e| StoreError::zarr(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| StoreError::zarr(e.to_string()))?;
        if !seconds.is_empty() {
            let subset = ArraySubset::new_with_start_shape(vec![0], vec![seconds.len() as u64])
                .map_err(|e| StoreError::zarr(e.to_string()))?;
            array
                .store_array_subset_elements(&subset, &seconds)
                .map_err(|e| StoreError::zarr(e.to_string()))?;
        }
        Ok(())
    }

    fn write_variable(
        &self,
        store: &Arc<FilesystemStore>,
        name: &str,
        var: &Variable,
        shape: [usize; 3],
        compression: ZarrCompression,
    ) -> Result<[usize; 3]> {
        let chunks = clip_chunks(var.chunks.unwrap_or([1, shape[1], shape[2]]), shape);
        let shape_u64: Vec<u64> = shape.iter().map(|&v| v as u64).collect();

        let mut binding = ArrayBuilder::new(
            shape_u64.clone(),
            DataType::Float32,
            chunk_grid(chunks.iter().map(|&c| c as u64).collect())?,
            FillValue::from(f32::NAN),
        );
        let mut builder = binding.attributes(var.attrs.clone());
        if let Some(codec) = self.compression_codec(compression)? {
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }
        let array = builder
            .build(store.clone(), &format!("/{}", name))
            .map_err(|e| StoreError::zarr(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| StoreError::zarr(e.to_string()))?;

        if !var.data.is_empty() {
            let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], shape_u64)
                .map_err(|e| StoreError::zarr(e.to_string()))?;
            array
                .store_array_subset_elements(&subset, &var.data)
                .map_err(|e| StoreError::zarr(e.to_string()))?;
        }
        Ok(chunks)
    }

    /// 0-D array whose only content is its attributes. The single value is
    /// the fill value, so no chunk is written.
    fn write_scalar(store: &Arc<FilesystemStore>, name: &str, attrs: &Attrs) -> Result<()> {
        let array = ArrayBuilder::new(vec![], DataType::Int32, chunk_grid(vec![])?, FillValue::from(0i32))
            .attributes(attrs.clone())
            .build(store.clone(), &format!("/{}", name))
            .map_err(|e| StoreError::zarr(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| StoreError::zarr(e.to_string()))
    }
}

impl DataStore for ZarrStore {
    #[instrument(skip(self, open_params), fields(root = %self.config.root.display()))]
    fn open_data(&self, data_id: &str, open_params: &Attrs) -> Result<Dataset> {
        let requested = requested_variables(open_params)?;
        let path = self.data_path(data_id)?;
        if !self.has_data(data_id) {
            return Err(StoreError::not_found(self.config.root.display().to_string(), data_id));
        }
        let store = Self::open_fs(&path)?;

        let group = Group::open(store.clone(), "/").map_err(|e| StoreError::zarr(e.to_string()))?;
        let mut attrs = group.attributes().clone();
        let layout_value = attrs
            .remove(LAYOUT_KEY)
            .ok_or_else(|| StoreError::invalid_metadata(format!("missing '{}' attribute", LAYOUT_KEY)))?;
        let layout: CubeLayout = serde_json::from_value(layout_value)?;

        let x = read_f64_array(&store, &layout.xy_var_names.0)?;
        let y = read_f64_array(&store, &layout.xy_var_names.1)?;
        let time = read_time(&store)?;

        let mut dataset = if layout.curvilinear {
            Dataset::curvilinear(layout.crs, layout.width, layout.height, x, y, time)?
        } else {
            Dataset::rectilinear(layout.crs, x, y, time)?
        };
        dataset.attrs = attrs;
        dataset.xy_var_names = layout.xy_var_names.clone();
        dataset.xy_dim_names = layout.xy_dim_names.clone();

        let shape = vec![
            dataset.time.len() as u64,
            dataset.height as u64,
            dataset.width as u64,
        ];
        for stored in &layout.variables {
            if let Some(names) = &requested {
                if !names.contains(&stored.name) {
                    continue;
                }
            }
            let array = Array::open(store.clone(), &format!("/{}", stored.name))
                .map_err(|e| StoreError::zarr(e.to_string()))?;
            if array.shape() != shape.as_slice() {
                return Err(StoreError::invalid_metadata(format!(
                    "variable '{}' has shape {:?}, expected {:?}",
                    stored.name,
                    array.shape(),
                    shape
                )));
            }
            let data: Vec<f32> = if dataset.var_len() == 0 {
                Vec::new()
            } else {
                let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], shape.clone())
                    .map_err(|e| StoreError::zarr(e.to_string()))?;
                array
                    .retrieve_array_subset_elements(&subset)
                    .map_err(|e| StoreError::zarr(e.to_string()))?
            };
            let mut var = Variable::new(data);
            var.attrs = array.attributes().clone();
            var.chunks = Some(stored.chunks);
            dataset.add_var(stored.name.clone(), var)?;
        }

        for name in &layout.scalar_variables {
            let array = Array::open(store.clone(), &format!("/{}", name))
                .map_err(|e| StoreError::zarr(e.to_string()))?;
            dataset.scalar_vars.insert(name.clone(), array.attributes().clone());
        }

        debug!(
            data_id = %data_id,
            width = dataset.width,
            height = dataset.height,
            time_steps = dataset.time.len(),
            variables = dataset.data_vars.len(),
            "Opened Zarr dataset"
        );
        Ok(dataset)
    }

    #[instrument(skip(self, dataset, write_params), fields(root = %self.config.root.display()))]
    fn write_data(
        &self,
        dataset: &Dataset,
        data_id: &str,
        replace: bool,
        write_params: &Attrs,
    ) -> Result<String> {
        check_params(write_params, &["compression"])?;
        let compression = match write_params.get("compression").and_then(|v| v.as_str()) {
            Some(name) => name.parse().map_err(StoreError::InvalidParams)?,
            None => self.config.compression,
        };

        let path = self.data_path(data_id)?;
        if path.exists() {
            if !replace {
                return Err(StoreError::AlreadyExists(data_id.to_string()));
            }
            debug!(path = %path.display(), "Replacing existing dataset");
            std::fs::remove_dir_all(&path)?;
        }

        let reserved = [
            dataset.xy_var_names.0.as_str(),
            dataset.xy_var_names.1.as_str(),
            TIME_ARRAY,
        ];
        for (index, name) in dataset.data_vars.keys().chain(dataset.scalar_vars.keys()).enumerate() {
            let clashes = index >= dataset.data_vars.len() && dataset.data_vars.contains_key(name);
            if name.is_empty() || name.contains('/') || reserved.contains(&name.as_str()) || clashes {
                return Err(StoreError::invalid_metadata(format!(
                    "cannot store variable named '{}'",
                    name
                )));
            }
        }

        std::fs::create_dir_all(&path)?;
        let store = Self::open_fs(&path)?;

        Self::write_coords(&store, dataset)?;

        let shape = [dataset.time.len(), dataset.height, dataset.width];
        let mut variables = Vec::with_capacity(dataset.data_vars.len());
        for (name, var) in &dataset.data_vars {
            let chunks = self.write_variable(&store, name, var, shape, compression)?;
            variables.push(StoredVariable {
                name: name.clone(),
                chunks,
            });
        }

        for (name, attrs) in &dataset.scalar_vars {
            Self::write_scalar(&store, name, attrs)?;
        }

        let layout = CubeLayout {
            crs: dataset.crs,
            width: dataset.width,
            height: dataset.height,
            curvilinear: dataset.xy.is_curvilinear(),
            xy_var_names: dataset.xy_var_names.clone(),
            xy_dim_names: dataset.xy_dim_names.clone(),
            variables,
            scalar_variables: dataset.scalar_vars.keys().cloned().collect(),
        };
        let mut attrs = dataset.attrs.clone();
        attrs.insert(LAYOUT_KEY.to_string(), serde_json::to_value(&layout)?);

        let group = GroupBuilder::new()
            .attributes(attrs)
            .build(store.clone(), "/")
            .map_err(|e| StoreError::zarr(e.to_string()))?;
        group
            .store_metadata()
            .map_err(|e| StoreError::zarr(e.to_string()))?;

        info!(
            data_id = %data_id,
            variables = layout.variables.len(),
            time_steps = shape[0],
            compression = %compression,
            "Wrote Zarr dataset"
        );
        Ok(data_id.to_string())
    }

    fn has_data(&self, data_id: &str) -> bool {
        self.data_path(data_id)
            .map(|p| p.join("zarr.json").is_file())
            .unwrap_or(false)
    }

    fn list_data_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.config.root)? {
            let entry = entry?;
            if entry.path().join("zarr.json").is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn chunk_grid(chunks: Vec<u64>) -> Result<zarrs::array::ChunkGrid> {
    chunks
        .try_into()
        .map_err(|e| StoreError::Config(format!("{:?}", e)))
}

fn clip_chunks(chunks: [usize; 3], shape: [usize; 3]) -> [usize; 3] {
    std::array::from_fn(|i| chunks[i].min(shape[i]).max(1))
}

fn write_f64_array(
    store: &Arc<FilesystemStore>,
    name: &str,
    shape: Vec<u64>,
    values: &[f64],
) -> Result<()> {
    let chunks = shape.iter().map(|&v| v.max(1)).collect();
    let array = ArrayBuilder::new(
        shape.clone(),
        DataType::Float64,
        chunk_grid(chunks)?,
        FillValue::from(f64::NAN),
    )
    .build(store.clone(), &format!("/{}", name))
    .map_err(|e| StoreError::zarr(e.to_string()))?;
    array
        .store_metadata()
        .map_err(|e| StoreError::zarr(e.to_string()))?;

    let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    array
        .store_array_subset_elements(&subset, values)
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    Ok(())
}

fn read_f64_array(store: &Arc<FilesystemStore>, name: &str) -> Result<Vec<f64>> {
    let array = Array::open(store.clone(), &format!("/{}", name))
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    let shape = array.shape().to_vec();
    let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| StoreError::zarr(e.to_string()))
}

fn read_time(store: &Arc<FilesystemStore>) -> Result<Vec<DateTime<Utc>>> {
    let array = Array::open(store.clone(), &format!("/{}", TIME_ARRAY))
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    let len = array.shape().first().copied().unwrap_or(0);
    if len == 0 {
        return Ok(Vec::new());
    }
    let subset = ArraySubset::new_with_start_shape(vec![0], vec![len])
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    let seconds: Vec<i64> = array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| StoreError::zarr(e.to_string()))?;
    seconds
        .into_iter()
        .map(|s| {
            DateTime::<Utc>::from_timestamp(s, 0)
                .ok_or_else(|| StoreError::invalid_metadata(format!("time value {} out of range", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn times() -> Vec<DateTime<Utc>> {
        vec![
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        ]
    }

    fn rectilinear() -> Dataset {
        let mut ds = Dataset::rectilinear(
            CrsCode::Epsg4326,
            vec![0.5, 1.5, 2.5],
            vec![1.5, 0.5],
            times(),
        )
        .unwrap();
        ds.attrs.insert("title".to_string(), json!("test cube"));
        let mut chl = Variable::new((0..12).map(|v| v as f32).collect()).with_attr("units", "mg m-3");
        chl.chunks = Some([1, 2, 2]);
        ds.with_var("chl", chl)
            .unwrap()
            .with_var("sst", Variable::filled(12, f32::NAN))
            .unwrap()
    }

    fn store(dir: &TempDir, compression: ZarrCompression) -> ZarrStore {
        ZarrStore::new(ZarrStoreConfig::new(dir.path()).with_compression(compression)).unwrap()
    }

    #[test]
    fn test_roundtrip_rectilinear() {
        let dir = TempDir::new().unwrap();
        for compression in [ZarrCompression::None, ZarrCompression::BloscZstd] {
            let store = store(&dir, compression);
            let ds = rectilinear();
            store.write_data(&ds, "cube.zarr", true, &Attrs::new()).unwrap();

            let back = store.open_data("cube.zarr", &Attrs::new()).unwrap();
            assert_eq!(back.crs, CrsCode::Epsg4326);
            assert_eq!(back.time, ds.time);
            assert_eq!(back.xy, ds.xy);
            assert_eq!(back.attrs["title"], "test cube");
            assert_eq!(back.var("chl").unwrap().data, ds.var("chl").unwrap().data);
            assert_eq!(back.var("chl").unwrap().attrs["units"], "mg m-3");
            assert_eq!(back.var("chl").unwrap().chunks, Some([1, 2, 2]));
            assert_eq!(back.var("sst").unwrap().chunks, Some([1, 2, 3]));
            assert!(back.var("sst").unwrap().data.iter().all(|v| v.is_nan()));
        }
    }

    #[test]
    fn test_roundtrip_grid_mapping_variable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        let mut ds = rectilinear();
        ds.scalar_vars.insert("crs".to_string(), CrsCode::Epsg3857.cf_attrs());
        store.write_data(&ds, "cube.zarr", false, &Attrs::new()).unwrap();
        assert!(dir.path().join("cube.zarr").join("crs").join("zarr.json").is_file());

        let back = store.open_data("cube.zarr", &Attrs::new()).unwrap();
        assert_eq!(back.scalar_vars.len(), 1);
        assert_eq!(back.scalar_vars["crs"]["grid_mapping_name"], "mercator");
        assert_eq!(back.scalar_vars["crs"], CrsCode::Epsg3857.cf_attrs());
    }

    #[test]
    fn test_scalar_name_clashing_with_variable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        let mut ds = rectilinear();
        ds.scalar_vars.insert("chl".to_string(), Attrs::new());
        assert!(matches!(
            store.write_data(&ds, "bad.zarr", false, &Attrs::new()),
            Err(StoreError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_roundtrip_curvilinear() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::BloscLz4);
        let x = vec![0.0, 1.0, 0.1, 1.1];
        let y = vec![1.0, 1.1, 0.0, 0.1];
        let ds = Dataset::curvilinear(CrsCode::Epsg4326, 2, 2, x, y, times())
            .unwrap()
            .with_var("rrs", Variable::new((0..8).map(|v| v as f32 * 0.5).collect()))
            .unwrap();
        store.write_data(&ds, "swath.zarr", false, &Attrs::new()).unwrap();
        let back = store.open_data("swath.zarr", &Attrs::new()).unwrap();
        assert!(back.xy.is_curvilinear());
        assert_eq!(back.xy, ds.xy);
        assert_eq!(back.xy_dim_names, ds.xy_dim_names);
        assert_eq!(back.var("rrs").unwrap().data, ds.var("rrs").unwrap().data);
    }

    #[test]
    fn test_open_selected_variables() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        store.write_data(&rectilinear(), "cube.zarr", false, &Attrs::new()).unwrap();

        let mut params = Attrs::new();
        params.insert("variable_names".to_string(), json!(["sst"]));
        let back = store.open_data("cube.zarr", &params).unwrap();
        assert_eq!(back.variable_names(), vec!["sst".to_string()]);
    }

    #[test]
    fn test_existing_data_requires_replace() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        store.write_data(&rectilinear(), "cube.zarr", false, &Attrs::new()).unwrap();
        assert!(matches!(
            store.write_data(&rectilinear(), "cube.zarr", false, &Attrs::new()),
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.list_data_ids().unwrap(), vec!["cube.zarr".to_string()]);
    }

    #[test]
    fn test_write_params() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        let mut params = Attrs::new();
        params.insert("compression".to_string(), json!("blosc_lz4"));
        assert!(store.write_data(&rectilinear(), "a.zarr", false, &params).is_ok());

        params.insert("chunks".to_string(), json!([1, 1, 1]));
        assert!(matches!(
            store.write_data(&rectilinear(), "b.zarr", false, &params),
            Err(StoreError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_reserved_variable_name() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        let ds = rectilinear().with_var("time", Variable::filled(12, 0.0)).unwrap();
        assert!(matches!(
            store.write_data(&ds, "bad.zarr", false, &Attrs::new()),
            Err(StoreError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_open_missing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, ZarrCompression::None);
        assert!(!store.has_data("nothing.zarr"));
        assert!(matches!(
            store.open_data("nothing.zarr", &Attrs::new()),
            Err(StoreError::DataNotFound { .. })
        ));
    }
}
