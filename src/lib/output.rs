use crate::alti::NO_DATA_Z;
use crate::feature::{
    Feature, FeatureCollection, ATTR_HEIGHT, ATTR_ROOF_MAX, ATTR_ROOF_MIN, ATTR_Z,
};
use crate::geometry::{repair, to_paths, Point3};
use crate::Error;
use chrono::{DateTime, Local, Utc};
use dxf::entities::{Entity, EntityType, MText, ModelPoint, Polyline, Vertex};
use dxf::enums::{AcadVersion, DrawingUnits, Units};
use dxf::tables::{AppId, Layer};
use dxf::{Color, Drawing, Point};
use geo_types::Geometry;
use itertools::Itertools;
use log::info;
use std::fs;
use std::path::Path as FsPath;
use std::time::UNIX_EPOCH;

pub const LAYER_BUILDING: &str = "Batiment";
pub const LAYER_PARCEL: &str = "Parcelle";
pub const LAYER_ELEVATION: &str = "Point_Altimetrique";

const COLOR_BUILDING: u8 = 13;
const COLOR_PARCEL: u8 = 153;
const COLOR_ELEVATION: u8 = 106;
const APP_ID: &str = "BDTOPO";

#[derive(Debug, Clone)]
pub struct DrawingOptions {
    pub close_polylines: bool,
    pub elevation_points: bool,
    /// Origin address for the optional annotation block; empty disables it.
    pub address_note: String,
    /// Target CRS code for the optional annotation block.
    pub target_epsg_note: String,
}

impl Default for DrawingOptions {
    fn default() -> Self {
        DrawingOptions {
            close_polylines: true,
            elevation_points: true,
            address_note: String::new(),
            target_epsg_note: String::new(),
        }
    }
}

/// Writes the three-layer 3D drawing and returns the number of emitted
/// building polylines, parcel polylines and elevation points.
///
/// All layers are created even when empty. Per-feature problems (invalid
/// geometry, non-finite vertices, sentinel elevations) only lower the
/// returned counts; the drawing is saved exactly once and identical inputs
/// produce identical files.
pub fn write_drawing(
    buildings: &FeatureCollection,
    parcels: &FeatureCollection,
    elevation: &FeatureCollection,
    out_path: &FsPath,
    options: &DrawingOptions,
) -> Result<(usize, usize, usize), Error> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2018;
    drawing.header.default_drawing_units = Units::Meters;
    drawing.header.drawing_units = DrawingUnits::Metric;
    // the date headers default to now(); pin them so identical inputs
    // write identical files
    drawing.header.creation_date = DateTime::<Local>::from(UNIX_EPOCH);
    drawing.header.creation_date_universal = DateTime::<Utc>::from(UNIX_EPOCH);
    drawing.header.update_date = DateTime::<Local>::from(UNIX_EPOCH);
    drawing.header.update_date_universal = DateTime::<Utc>::from(UNIX_EPOCH);
    // the GUID headers default to random v4 UUIDs; pin them too
    drawing.header.fingerprint_guid = Default::default();
    drawing.header.version_guid = Default::default();

    add_layer(&mut drawing, LAYER_BUILDING, COLOR_BUILDING);
    add_layer(&mut drawing, LAYER_PARCEL, COLOR_PARCEL);
    if options.elevation_points {
        add_layer(&mut drawing, LAYER_ELEVATION, COLOR_ELEVATION);
    }
    drawing.add_app_id(AppId {
        name: APP_ID.to_string(),
        ..Default::default()
    });

    let mut n_buildings = 0;
    for feature in &buildings.features {
        let geometry = repair(feature.geometry.clone());
        let z = building_elevation(feature, options.elevation_points);
        n_buildings += add_feature_paths(
            &mut drawing,
            &geometry,
            z,
            LAYER_BUILDING,
            options.close_polylines,
        );
    }

    let mut n_parcels = 0;
    for feature in &parcels.features {
        let geometry = repair(feature.geometry.clone());
        // parcels are flat reference polygons, never draped
        n_parcels += add_feature_paths(
            &mut drawing,
            &geometry,
            0.0,
            LAYER_PARCEL,
            options.close_polylines,
        );
    }

    let mut n_points = 0;
    if options.elevation_points {
        for feature in &elevation.features {
            let geometry = repair(feature.geometry.clone());
            let z = first_finite(&[feature.attribute(ATTR_Z)], 0.0);
            if z == NO_DATA_Z {
                continue;
            }
            if let Geometry::Point(point) = geometry {
                let mut entity = Entity::new(EntityType::ModelPoint(ModelPoint {
                    location: Point::new(point.x(), point.y(), z),
                    ..Default::default()
                }));
                entity.common.layer = LAYER_ELEVATION.to_string();
                drawing.add_entity(entity);
                n_points += 1;
            }
        }
    }

    if !options.address_note.is_empty() || !options.target_epsg_note.is_empty() {
        add_note(&mut drawing, &options.address_note, &options.target_epsg_note);
    }

    drawing.save_file(out_path.to_string_lossy().as_ref())?;
    info!(
        "wrote {}: {} buildings, {} parcels, {} elevation points",
        out_path.display(),
        n_buildings,
        n_parcels,
        n_points
    );
    Ok((n_buildings, n_parcels, n_points))
}

fn add_layer(drawing: &mut Drawing, name: &str, color: u8) {
    drawing.add_layer(Layer {
        name: name.to_string(),
        color: Color::from_index(color),
        ..Default::default()
    });
}

/// Building elevation policy: first finite value among maximum roof
/// altitude, minimum roof altitude and height; height alone when elevation
/// points are disabled for the run.
fn building_elevation(feature: &Feature, use_roof_altitudes: bool) -> f64 {
    if use_roof_altitudes {
        first_finite(
            &[
                feature.attribute(ATTR_ROOF_MAX),
                feature.attribute(ATTR_ROOF_MIN),
                feature.attribute(ATTR_HEIGHT),
            ],
            0.0,
        )
    } else {
        first_finite(&[feature.attribute(ATTR_HEIGHT)], 0.0)
    }
}

fn first_finite(values: &[Option<f64>], default: f64) -> f64 {
    values
        .iter()
        .filter_map(|v| *v)
        .find(|v| v.is_finite())
        .unwrap_or(default)
}

/// Drops non-finite vertices and collapses consecutive duplicates.
fn clean_points(points: &[Point3]) -> Vec<Point3> {
    points
        .iter()
        .copied()
        .filter(|&(x, y, z)| x.is_finite() && y.is_finite() && z.is_finite())
        .dedup()
        .collect()
}

fn add_feature_paths(
    drawing: &mut Drawing,
    geometry: &Geometry<f64>,
    z: f64,
    layer: &str,
    close_polylines: bool,
) -> usize {
    let mut count = 0;
    for path in to_paths(geometry, z) {
        let points = clean_points(&path.points);
        if points.len() < 2 {
            continue;
        }
        let close = close_polylines && path.ring && points.len() >= 3;
        add_polyline(drawing, &points, layer, close);
        count += 1;
    }
    count
}

fn add_polyline(drawing: &mut Drawing, points: &[Point3], layer: &str, close: bool) {
    let mut polyline = Polyline::default();
    polyline.set_is_3d_polyline(true);
    if close {
        polyline.set_is_closed(true);
    }
    for &(x, y, z) in points {
        let mut vertex = Vertex::new(Point::new(x, y, z));
        vertex.set_is_3d_polyline_vertex(true);
        polyline.add_vertex(drawing, vertex);
    }
    let mut entity = Entity::new(EntityType::Polyline(polyline));
    entity.common.layer = layer.to_string();
    drawing.add_entity(entity);
}

/// One annotation block in the paper-space area. Nothing here can fail
/// with this encoder; drawing I/O problems stay confined to the final save.
fn add_note(drawing: &mut Drawing, address: &str, epsg: &str) {
    let text = format!("EPSG: {}\\PAdresse: {}", epsg, address);
    let mtext = MText {
        insertion_point: Point::new(10.0, 145.0, 0.0),
        initial_text_height: 10.0,
        text,
        text_style_name: "Standard".to_string(),
        ..Default::default()
    };
    let mut entity = Entity::new(EntityType::MText(mtext));
    entity.common.is_in_paper_space = true;
    drawing.add_entity(entity);
}


#[cfg(test)]
mod building_elevation {
    use super::building_elevation;
    use crate::feature::{ATTR_HEIGHT, ATTR_ROOF_MAX, ATTR_ROOF_MIN};
    use crate::test_helpers::square_feature;

    #[test]
    fn roof_max_wins_when_elevation_points_are_enabled() {
        let feature = square_feature(&[
            (ATTR_ROOF_MAX, Some(153.2)),
            (ATTR_ROOF_MIN, Some(148.0)),
            (ATTR_HEIGHT, Some(5.2)),
        ]);
        assert_eq!(building_elevation(&feature, true), 153.2);
    }

    #[test]
    fn falls_through_non_finite_and_missing_values() {
        let feature = square_feature(&[
            (ATTR_ROOF_MAX, Some(f64::NAN)),
            (ATTR_ROOF_MIN, None),
            (ATTR_HEIGHT, Some(5.2)),
        ]);
        assert_eq!(building_elevation(&feature, true), 5.2);
    }

    #[test]
    fn height_only_when_elevation_points_are_disabled() {
        let feature = square_feature(&[(ATTR_ROOF_MAX, Some(153.2)), (ATTR_HEIGHT, Some(5.2))]);
        assert_eq!(building_elevation(&feature, false), 5.2);
    }

    #[test]
    fn defaults_to_zero() {
        let feature = square_feature(&[]);
        assert_eq!(building_elevation(&feature, true), 0.0);
    }
}
