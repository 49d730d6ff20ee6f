use crate::alti::ElevationSample;
use geo_types::{Geometry, Point};
use serde_json::Value;
use std::collections::HashMap;

/// Canonical building height attribute.
pub const ATTR_HEIGHT: &str = "hauteur";
/// Canonical maximum roof altitude attribute.
pub const ATTR_ROOF_MAX: &str = "altitude_maximale_toit";
/// Canonical minimum roof altitude attribute.
pub const ATTR_ROOF_MIN: &str = "altitude_minimale_toit";
/// Elevation attribute carried by elevation point features.
pub const ATTR_Z: &str = "z";

/// Axis-aligned extent in a projected coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Square extent of `radius` around a center point, in the unit of the
    /// center coordinates.
    pub fn around(x: f64, y: f64, radius: f64) -> Self {
        BoundingBox::new(x - radius, y - radius, x + radius, y + radius)
    }

    /// Renders the box as a WFS `bbox` query parameter.
    pub fn to_query_param(&self, crs: &str) -> String {
        format!(
            "{:.3},{:.3},{:.3},{:.3},{}",
            self.min_x, self.min_y, self.max_x, self.max_y, crs
        )
    }
}

/// One geographic entity: a geometry plus a bag of numeric attributes.
///
/// Attribute values are kept as `Option<f64>`; a missing or non-numeric
/// source value is `None`. Unknown attribute names are carried along and
/// ignored by the export pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub attributes: HashMap<String, Option<f64>>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Feature {
            geometry,
            attributes: HashMap::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied().flatten()
    }
}

/// Ordered features sharing one coordinate system.
///
/// The CRS lives on the collection only; a single feature cannot change
/// coordinate system independently of its siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub crs: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn empty(crs: &str) -> Self {
        FeatureCollection {
            crs: crs.to_string(),
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Turns raw elevation samples into point features carrying a `z`
    /// attribute, ready for reprojection and assembly.
    pub fn from_samples(samples: &[ElevationSample], crs: &str) -> Self {
        let features = samples
            .iter()
            .map(|sample| {
                let mut feature = Feature::new(Point::new(sample.lon, sample.lat).into());
                feature
                    .attributes
                    .insert(ATTR_Z.to_string(), Some(sample.z));
                feature
            })
            .collect();
        FeatureCollection {
            crs: crs.to_string(),
            features,
        }
    }
}

/// Reads a JSON attribute value as a number, leniently.
///
/// Accepts JSON numbers as well as strings written with either decimal
/// separator (`"12.5"`, `"12,5"`). Anything else is treated as missing.
pub fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}
