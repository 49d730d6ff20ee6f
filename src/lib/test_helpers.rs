use crate::feature::{Feature, ATTR_Z};
use geo_types::{LineString, Point, Polygon};

pub fn square_polygon(x: f64, y: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ]),
        vec![],
    )
}

/// Self-intersecting "bowtie" ring, invalid by construction.
pub fn bowtie_polygon() -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (0.0, 0.0),
            (10.0, 10.0),
            (10.0, 0.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]),
        vec![],
    )
}

pub fn holed_polygon() -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]),
        vec![LineString::from(vec![
            (2.0, 2.0),
            (4.0, 2.0),
            (4.0, 4.0),
            (2.0, 4.0),
            (2.0, 2.0),
        ])],
    )
}

pub fn point_feature(lon: f64, lat: f64, z: Option<f64>) -> Feature {
    let mut feature = Feature::new(Point::new(lon, lat).into());
    if z.is_some() {
        feature.attributes.insert(ATTR_Z.to_string(), z);
    }
    feature
}

pub fn square_feature(attributes: &[(&str, Option<f64>)]) -> Feature {
    let mut feature = Feature::new(square_polygon(0.0, 0.0, 10.0).into());
    for (name, value) in attributes {
        feature.attributes.insert((*name).to_string(), *value);
    }
    feature
}
