//! In-memory gridded dataset model.
//!
//! A [`Dataset`] holds float32 data variables laid out as `[time, y, x]`
//! (row-major, x fastest) on a shared set of spatial coordinates. Spatial
//! coordinates are either 1-D axes ([`XyCoords::Rectilinear`]) or full 2-D
//! arrays ([`XyCoords::Curvilinear`]) as produced by swath sensors.

use crate::crs::CrsCode;
use crate::error::{DatasetError, DatasetResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;

/// Free-form attribute map, serialized as a JSON object.
pub type Attrs = serde_json::Map<String, Value>;

/// One data variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Values in `[time, y, x]` order.
    pub data: Vec<f32>,
    pub attrs: Attrs,
    /// Chunk layout `(time, y, x)`, set by rechunking or read from a store.
    pub chunks: Option<[usize; 3]>,
}

impl Variable {
    pub fn new(data: Vec<f32>) -> Self {
        Self {
            data,
            attrs: Attrs::new(),
            chunks: None,
        }
    }

    pub fn filled(len: usize, value: f32) -> Self {
        Self::new(vec![value; len])
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Same attributes and chunking, different values.
    pub fn with_data(&self, data: Vec<f32>) -> Self {
        Self {
            data,
            attrs: self.attrs.clone(),
            chunks: self.chunks,
        }
    }
}

/// Spatial coordinates of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum XyCoords {
    /// 1-D axes: `x` has `width` values, `y` has `height` values.
    Rectilinear { x: Vec<f64>, y: Vec<f64> },
    /// 2-D coordinates, row-major, `width * height` values each.
    Curvilinear { x: Vec<f64>, y: Vec<f64> },
}

impl XyCoords {
    pub fn is_curvilinear(&self) -> bool {
        matches!(self, XyCoords::Curvilinear { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub attrs: Attrs,
    pub crs: CrsCode,
    pub width: usize,
    pub height: usize,
    pub time: Vec<DateTime<Utc>>,
    pub xy: XyCoords,
    /// Names of the x and y coordinate variables.
    pub xy_var_names: (String, String),
    /// Names of the x and y dimensions.
    pub xy_dim_names: (String, String),
    pub data_vars: BTreeMap<String, Variable>,
    /// Attribute-only 0-D variables, such as a CF grid mapping.
    pub scalar_vars: BTreeMap<String, Attrs>,
}

impl Dataset {
    /// Create a dataset on 1-D coordinate axes, without data variables.
    pub fn rectilinear(
        crs: CrsCode,
        x: Vec<f64>,
        y: Vec<f64>,
        time: Vec<DateTime<Utc>>,
    ) -> DatasetResult<Self> {
        if x.is_empty() || y.is_empty() {
            return Err(DatasetError::EmptyGrid);
        }
        let names = crs.default_xy_names();
        Ok(Self {
            attrs: Attrs::new(),
            crs,
            width: x.len(),
            height: y.len(),
            time,
            xy: XyCoords::Rectilinear { x, y },
            xy_var_names: names.clone(),
            xy_dim_names: names,
            data_vars: BTreeMap::new(),
            scalar_vars: BTreeMap::new(),
        })
    }

    /// Create a dataset on 2-D coordinate arrays, without data variables.
    pub fn curvilinear(
        crs: CrsCode,
        width: usize,
        height: usize,
        x: Vec<f64>,
        y: Vec<f64>,
        time: Vec<DateTime<Utc>>,
    ) -> DatasetResult<Self> {
        if width == 0 || height == 0 {
            return Err(DatasetError::EmptyGrid);
        }
        let n = width * height;
        for (axis, values) in [("x", &x), ("y", &y)] {
            if values.len() != n {
                return Err(DatasetError::CoordinateMismatch {
                    axis: axis.to_string(),
                    expected: n,
                    actual: values.len(),
                });
            }
        }
        Ok(Self {
            attrs: Attrs::new(),
            crs,
            width,
            height,
            time,
            xy: XyCoords::Curvilinear { x, y },
            xy_var_names: crs.default_xy_names(),
            xy_dim_names: ("x".to_string(), "y".to_string()),
            data_vars: BTreeMap::new(),
            scalar_vars: BTreeMap::new(),
        })
    }

    /// Number of cells in one time slice.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    /// Number of values every data variable must hold.
    pub fn var_len(&self) -> usize {
        self.time.len() * self.plane_len()
    }

    pub fn with_var(mut self, name: impl Into<String>, var: Variable) -> DatasetResult<Self> {
        self.add_var(name, var)?;
        Ok(self)
    }

    /// Insert or replace a data variable after checking its length.
    pub fn add_var(&mut self, name: impl Into<String>, var: Variable) -> DatasetResult<()> {
        let name = name.into();
        if var.data.len() != self.var_len() {
            return Err(DatasetError::shape(name, self.var_len(), var.data.len()));
        }
        self.data_vars.insert(name, var);
        Ok(())
    }

    /// A dataset without data variables carries nothing worth writing.
    pub fn is_empty(&self) -> bool {
        self.data_vars.is_empty()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.data_vars.keys().cloned().collect()
    }

    /// True for data variables, scalar variables, the x/y coordinates and `time`.
    pub fn has_variable(&self, name: &str) -> bool {
        self.data_vars.contains_key(name)
            || self.scalar_vars.contains_key(name)
            || name == self.xy_var_names.0
            || name == self.xy_var_names.1
            || name == "time"
    }

    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    /// The `[y, x]` slice of a variable at time index `t`.
    pub fn plane(&self, name: &str, t: usize) -> Option<&[f32]> {
        let n = self.plane_len();
        self.data_vars
            .get(name)
            .and_then(|v| v.data.get(t * n..(t + 1) * n))
    }

    /// Copy of this dataset with every data variable removed.
    pub fn without_data_vars(&self) -> Self {
        Self {
            attrs: self.attrs.clone(),
            crs: self.crs,
            width: self.width,
            height: self.height,
            time: self.time.clone(),
            xy: self.xy.clone(),
            xy_var_names: self.xy_var_names.clone(),
            xy_dim_names: self.xy_dim_names.clone(),
            data_vars: BTreeMap::new(),
            scalar_vars: self.scalar_vars.clone(),
        }
    }

    /// Keep only the named variables that exist.
    pub fn select_vars(&self, names: &[String]) -> Self {
        let mut out = self.without_data_vars();
        out.data_vars = self
            .data_vars
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect();
        out
    }

    /// Keep only the time steps accepted by `keep`.
    pub fn select_time<F>(&self, keep: F) -> Self
    where
        F: Fn(&DateTime<Utc>) -> bool,
    {
        let indices: Vec<usize> = self
            .time
            .iter()
            .enumerate()
            .filter(|(_, t)| keep(*t))
            .map(|(i, _)| i)
            .collect();

        let mut out = self.without_data_vars();
        out.time = indices.iter().map(|&i| self.time[i]).collect();

        let n = self.plane_len();
        for (name, var) in &self.data_vars {
            let mut data = Vec::with_capacity(indices.len() * n);
            for &i in &indices {
                data.extend_from_slice(&var.data[i * n..(i + 1) * n]);
            }
            out.data_vars.insert(name.clone(), var.with_data(data));
        }
        out
    }

    /// Cut out the index window `cols` x `rows`.
    pub fn crop(&self, cols: Range<usize>, rows: Range<usize>) -> DatasetResult<Self> {
        if cols.is_empty() || rows.is_empty() || cols.end > self.width || rows.end > self.height {
            return Err(DatasetError::InvalidWindow(format!(
                "cols {:?}, rows {:?} in {}x{}",
                cols, rows, self.width, self.height
            )));
        }

        let width = cols.len();
        let height = rows.len();
        let crop_plane = |values: &[f64]| -> Vec<f64> {
            rows.clone()
                .flat_map(|j| values[j * self.width + cols.start..j * self.width + cols.end].iter().copied())
                .collect()
        };

        let xy = match &self.xy {
            XyCoords::Rectilinear { x, y } => XyCoords::Rectilinear {
                x: x[cols.clone()].to_vec(),
                y: y[rows.clone()].to_vec(),
            },
            XyCoords::Curvilinear { x, y } => XyCoords::Curvilinear {
                x: crop_plane(x),
                y: crop_plane(y),
            },
        };

        let mut out = self.without_data_vars();
        out.width = width;
        out.height = height;
        out.xy = xy;

        let n = self.plane_len();
        for (name, var) in &self.data_vars {
            let mut data = Vec::with_capacity(self.time.len() * width * height);
            for t in 0..self.time.len() {
                let plane = &var.data[t * n..(t + 1) * n];
                for j in rows.clone() {
                    let row = j * self.width;
                    data.extend_from_slice(&plane[row + cols.start..row + cols.end]);
                }
            }
            out.data_vars.insert(name.clone(), var.with_data(data));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn days(n: u32) -> Vec<DateTime<Utc>> {
        (1..=n)
            .map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap())
            .collect()
    }

    fn sample() -> Dataset {
        let ds = Dataset::rectilinear(
            CrsCode::Epsg4326,
            vec![0.5, 1.5, 2.5],
            vec![10.5, 11.5],
            days(2),
        )
        .unwrap();
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        ds.with_var("chl", Variable::new(data).with_attr("units", "mg m-3"))
            .unwrap()
    }

    #[test]
    fn test_default_names() {
        let ds = sample();
        assert_eq!(ds.xy_var_names, ("lon".to_string(), "lat".to_string()));
        let proj = Dataset::rectilinear(CrsCode::Epsg3857, vec![0.0], vec![0.0], vec![]).unwrap();
        assert_eq!(proj.xy_dim_names, ("x".to_string(), "y".to_string()));
    }

    #[test]
    fn test_add_var_checks_length() {
        let mut ds = sample();
        let err = ds.add_var("bad", Variable::filled(5, 0.0)).unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch { expected: 12, actual: 5, .. }));
    }

    #[test]
    fn test_curvilinear_checks_coords() {
        let err = Dataset::curvilinear(CrsCode::Epsg4326, 2, 2, vec![0.0; 4], vec![0.0; 3], vec![])
            .unwrap_err();
        assert!(matches!(err, DatasetError::CoordinateMismatch { .. }));
    }

    #[test]
    fn test_is_empty_means_no_variables() {
        let ds = sample();
        assert!(!ds.is_empty());
        assert!(ds.without_data_vars().is_empty());
        assert!(ds.select_vars(&["missing".to_string()]).is_empty());
    }

    #[test]
    fn test_has_variable() {
        let mut ds = sample();
        ds.scalar_vars.insert("crs".to_string(), Attrs::new());
        for name in ["chl", "crs", "lon", "lat", "time"] {
            assert!(ds.has_variable(name), "{}", name);
        }
        assert!(!ds.has_variable("latitude_longitude"));
        assert!(ds.without_data_vars().has_variable("crs"));
    }

    #[test]
    fn test_plane() {
        let ds = sample();
        assert_eq!(ds.plane("chl", 1).unwrap(), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert!(ds.plane("chl", 2).is_none());
    }

    #[test]
    fn test_select_time() {
        let ds = sample();
        let second = ds.time[1];
        let out = ds.select_time(|t| *t == second);
        assert_eq!(out.time, vec![second]);
        assert_eq!(out.var("chl").unwrap().data, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(out.var("chl").unwrap().attrs["units"], "mg m-3");
    }

    #[test]
    fn test_crop() {
        let ds = sample();
        let out = ds.crop(1..3, 1..2).unwrap();
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(
            out.xy,
            XyCoords::Rectilinear {
                x: vec![1.5, 2.5],
                y: vec![11.5]
            }
        );
        assert_eq!(out.var("chl").unwrap().data, vec![4.0, 5.0, 10.0, 11.0]);

        assert!(ds.crop(0..4, 0..1).is_err());
        assert!(ds.crop(1..1, 0..1).is_err());
    }
}
