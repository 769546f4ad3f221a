//! Cube and generator configuration.

use crate::error::{GeneratorError, Result};
use cube_common::{Attrs, BoundingBox, CrsCode, TimePeriod, TimeRange};
use cube_store::ZarrCompression;
use grid_mapping::{GridOverrides, InterpolationMethod, DEFAULT_TILE_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the generated cube should look like.
///
/// Every field is optional; an unset field is inherited from the sources.
/// Values are kept as written in the request and parsed on access, so a
/// malformed value surfaces as a configuration error of the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CubeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_names: Option<Vec<String>>,

    /// CRS identifier of the target grid, e.g. `EPSG:4326`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,

    /// `[x_min, y_min, x_max, y_max]` in the target CRS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_res: Option<f64>,

    /// `[start, end]` ISO 8601 dates or date-times, either bound may be null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<[Option<String>; 2]>,

    /// Temporal resampling period such as `1D` or `8D`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<String>,

    /// Chunk size `[width, height]` of the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<[usize; 2]>,

    /// Global attributes merged into the output.
    #[serde(skip_serializing_if = "Attrs::is_empty")]
    pub metadata: Attrs,

    /// Attributes merged into individual output variables.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variable_metadata: BTreeMap<String, Attrs>,
}

impl CubeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variable_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_spatial_res(mut self, res: f64) -> Self {
        self.spatial_res = Some(res);
        self
    }

    pub fn with_time_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.time_range = Some([start.map(str::to_string), end.map(str::to_string)]);
        self
    }

    pub fn with_time_period(mut self, period: impl Into<String>) -> Self {
        self.time_period = Some(period.into());
        self
    }

    pub fn with_tile_size(mut self, width: usize, height: usize) -> Self {
        self.tile_size = Some([width, height]);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_variable_metadata(
        mut self,
        var_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.variable_metadata
            .entry(var_name.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Check every field before any stage runs.
    pub fn validate(&self) -> Result<()> {
        self.crs_code()?;
        self.bounding_box()?;
        self.parsed_time_range()?;
        self.parsed_time_period()?;

        if let Some(res) = self.spatial_res {
            if !(res.is_finite() && res > 0.0) {
                return Err(GeneratorError::configuration(format!(
                    "spatial_res must be a positive number, got {}",
                    res
                )));
            }
        }

        if let Some([w, h]) = self.tile_size {
            if w == 0 || h == 0 {
                return Err(GeneratorError::configuration(format!(
                    "tile_size must be positive, got [{}, {}]",
                    w, h
                )));
            }
        }

        Ok(())
    }

    pub fn crs_code(&self) -> Result<Option<CrsCode>> {
        self.crs
            .as_deref()
            .map(CrsCode::parse)
            .transpose()
            .map_err(|e| GeneratorError::configuration(e.to_string()))
    }

    pub fn bounding_box(&self) -> Result<Option<BoundingBox>> {
        let Some(values) = self.bbox else {
            return Ok(None);
        };
        let bbox = BoundingBox::from_array(values);
        if !bbox.is_valid() {
            return Err(GeneratorError::configuration(format!(
                "bbox must be finite with x_min < x_max and y_min < y_max, got {:?}",
                values
            )));
        }
        Ok(Some(bbox))
    }

    pub fn parsed_time_range(&self) -> Result<Option<TimeRange>> {
        let Some([start, end]) = &self.time_range else {
            return Ok(None);
        };
        TimeRange::parse(start.as_deref(), end.as_deref())
            .map(Some)
            .map_err(|e| GeneratorError::configuration(e.to_string()))
    }

    pub fn parsed_time_period(&self) -> Result<Option<TimePeriod>> {
        self.time_period
            .as_deref()
            .map(str::parse::<TimePeriod>)
            .transpose()
            .map_err(|e| GeneratorError::configuration(e.to_string()))
    }

    /// True when any of resolution, bbox or CRS is set.
    pub fn has_spatial_overrides(&self) -> bool {
        self.spatial_res.is_some() || self.bbox.is_some() || self.crs.is_some()
    }

    /// The spatial overrides applied to the source grid.
    pub fn overrides(&self) -> Result<GridOverrides> {
        Ok(GridOverrides {
            spatial_res: self.spatial_res,
            bbox: self.bounding_box()?,
            crs: self.crs_code()?,
        })
    }
}

/// Runtime settings of a generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Interpolation used when resampling regular sources in space.
    pub interpolation: InterpolationMethod,

    /// Upper bound of the output chunk size when the cube config sets none.
    pub default_tile_size: usize,

    /// Compression requested from the output store, unless the output
    /// config already names one.
    pub zarr_compression: Option<ZarrCompression>,

    /// Level of verbosity, 0 means off.
    pub verbosity: u8,

    /// Return failures as errors instead of error results.
    pub raise_on_error: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationMethod::Bilinear,
            default_tile_size: DEFAULT_TILE_SIZE,
            zarr_compression: None,
            verbosity: 0,
            raise_on_error: false,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CUBEGEN_INTERPOLATION") {
            if let Ok(method) = val.parse() {
                config.interpolation = method;
            }
        }

        if let Ok(val) = std::env::var("CUBEGEN_TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.default_tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("CUBEGEN_ZARR_COMPRESSION") {
            if let Ok(compression) = val.parse() {
                config.zarr_compression = Some(compression);
            }
        }

        if let Ok(val) = std::env::var("CUBEGEN_VERBOSITY") {
            if let Ok(level) = val.parse() {
                config.verbosity = level;
            }
        }

        if let Ok(val) = std::env::var("CUBEGEN_RAISE_ON_ERROR") {
            config.raise_on_error = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    pub fn with_raise_on_error(mut self, raise_on_error: bool) -> Self {
        self.raise_on_error = raise_on_error;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.default_tile_size == 0 {
            return Err("default_tile_size must be > 0".to_string());
        }
        Ok(())
    }
}
