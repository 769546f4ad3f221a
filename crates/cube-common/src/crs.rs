//! Coordinate reference systems and point transforms between them.

use crate::dataset::Attrs;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Earth radius used by the spherical Web Mercator projection.
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the Web Mercator square.
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Semi-major axis shared by the WGS84 and GRS80 ellipsoids.
const EARTH_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const WGS84_INVERSE_FLATTENING: f64 = 298.257_223_563;
const GRS80_INVERSE_FLATTENING: f64 = 298.257_222_101;

/// Well-known CRS codes a cube may be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// CONUS Albers Equal Area
    Epsg5070,
    /// Polar Stereographic North
    Epsg3413,
    /// Polar Stereographic South
    Epsg3031,
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "epsg:4326"
    /// - "WGS84", "CRS84", "OGC:CRS84", "CRS:84"
    /// - "http://www.opengis.net/def/crs/EPSG/0/3857"
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();
        let normalized = normalized
            .strip_prefix("HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/0/")
            .map(|code| format!("EPSG:{}", code))
            .unwrap_or(normalized);

        match normalized.as_str() {
            "EPSG:4326" | "WGS84" | "CRS84" | "CRS:84" | "OGC:CRS84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:5070" => Ok(CrsCode::Epsg5070),
            "EPSG:3413" => Ok(CrsCode::Epsg3413),
            "EPSG:3031" => Ok(CrsCode::Epsg3031),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }

    /// Two CRSs are treated as equivalent when they share the same axes.
    ///
    /// WGS84 and NAD83 differ by less than two meters, well below any cube
    /// resolution this crate handles.
    pub fn is_equivalent(&self, other: &CrsCode) -> bool {
        self == other || (self.is_geographic() && other.is_geographic())
    }

    /// Coordinate variable names conventionally used for this CRS.
    pub fn default_xy_names(&self) -> (String, String) {
        if self.is_geographic() {
            ("lon".to_string(), "lat".to_string())
        } else {
            ("x".to_string(), "y".to_string())
        }
    }

    /// CF `grid_mapping_name` for this CRS.
    pub fn grid_mapping_name(&self) -> &'static str {
        match self {
            CrsCode::Epsg4326 | CrsCode::Epsg4269 => "latitude_longitude",
            CrsCode::Epsg3857 => "mercator",
            CrsCode::Epsg5070 => "albers_conical_equal_area",
            CrsCode::Epsg3413 | CrsCode::Epsg3031 => "polar_stereographic",
        }
    }

    /// CF attributes of a grid mapping variable for this CRS.
    pub fn cf_attrs(&self) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert("grid_mapping_name".to_string(), json!(self.grid_mapping_name()));
        attrs.insert("semi_major_axis".to_string(), json!(EARTH_SEMI_MAJOR_AXIS));
        let params = match self {
            CrsCode::Epsg4326 => json!({
                "inverse_flattening": WGS84_INVERSE_FLATTENING,
                "longitude_of_prime_meridian": 0.0,
            }),
            CrsCode::Epsg4269 => json!({
                "inverse_flattening": GRS80_INVERSE_FLATTENING,
                "longitude_of_prime_meridian": 0.0,
            }),
            CrsCode::Epsg3857 => json!({
                "semi_minor_axis": WEB_MERCATOR_RADIUS,
                "longitude_of_projection_origin": 0.0,
                "standard_parallel": 0.0,
                "false_easting": 0.0,
                "false_northing": 0.0,
            }),
            CrsCode::Epsg5070 => json!({
                "inverse_flattening": GRS80_INVERSE_FLATTENING,
                "standard_parallel": [29.5, 45.5],
                "longitude_of_central_meridian": -96.0,
                "latitude_of_projection_origin": 23.0,
                "false_easting": 0.0,
                "false_northing": 0.0,
            }),
            CrsCode::Epsg3413 => json!({
                "inverse_flattening": WGS84_INVERSE_FLATTENING,
                "straight_vertical_longitude_from_pole": -45.0,
                "latitude_of_projection_origin": 90.0,
                "standard_parallel": 70.0,
                "false_easting": 0.0,
                "false_northing": 0.0,
            }),
            CrsCode::Epsg3031 => json!({
                "inverse_flattening": WGS84_INVERSE_FLATTENING,
                "straight_vertical_longitude_from_pole": 0.0,
                "latitude_of_projection_origin": -90.0,
                "standard_parallel": -71.0,
                "false_easting": 0.0,
                "false_northing": 0.0,
            }),
        };
        if let serde_json::Value::Object(params) = params {
            attrs.extend(params);
        }
        attrs.insert("crs_code".to_string(), json!(self.to_string()));
        attrs
    }

    /// Units of the CRS axes.
    pub fn units(&self) -> &'static str {
        if self.is_geographic() {
            "degrees"
        } else {
            "m"
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg4269 => "EPSG:4269",
            CrsCode::Epsg5070 => "EPSG:5070",
            CrsCode::Epsg3413 => "EPSG:3413",
            CrsCode::Epsg3031 => "EPSG:3031",
        };
        write!(f, "{}", code)
    }
}

impl FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CrsCode> for String {
    fn from(crs: CrsCode) -> Self {
        crs.to_string()
    }
}

/// Transform a point between two CRSs.
///
/// Returns `None` when the CRS pair is not supported or the point falls
/// outside the target's domain.
pub fn transform_point(from: CrsCode, to: CrsCode, x: f64, y: f64) -> Option<(f64, f64)> {
    if from.is_equivalent(&to) {
        return Some((x, y));
    }

    match (from.is_geographic(), to) {
        (true, CrsCode::Epsg3857) => lonlat_to_mercator(x, y),
        (false, _) if from == CrsCode::Epsg3857 && to.is_geographic() => {
            Some(mercator_to_lonlat(x, y))
        }
        _ => None,
    }
}

/// True when [`transform_point`] supports the pair.
pub fn can_transform(from: CrsCode, to: CrsCode) -> bool {
    from.is_equivalent(&to)
        || (from.is_geographic() && to == CrsCode::Epsg3857)
        || (from == CrsCode::Epsg3857 && to.is_geographic())
}

fn lonlat_to_mercator(lon: f64, lat: f64) -> Option<(f64, f64)> {
    if !lon.is_finite() || !lat.is_finite() || lat.abs() > WEB_MERCATOR_MAX_LAT {
        return None;
    }
    let x = WEB_MERCATOR_RADIUS * lon.to_radians();
    let y = WEB_MERCATOR_RADIUS * lat.to_radians().tan().asinh();
    Some((x, y))
}

fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (y / WEB_MERCATOR_RADIUS).sinh().atan().to_degrees();
    (lon, lat)
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
