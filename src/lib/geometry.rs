use geo::Validation;
use geo_buf::{buffer_multi_polygon, buffer_polygon};
use geo_types::{Geometry, LineString};

pub type Point3 = (f64, f64, f64);

/// Ordered 3D vertex sequence destined for one drawing polyline.
///
/// `ring` records that the path came from a polygon ring; ring paths carry
/// no duplicate closing vertex, closure is decided at assembly time.
#[derive(Debug, Clone, PartialEq)]
pub struct Path3 {
    pub points: Vec<Point3>,
    pub ring: bool,
}

/// Attempts to heal invalid polygon geometry with a single zero-width
/// buffering pass.
///
/// Empty or already-valid geometry is returned unchanged, as is anything
/// that is not a polygon. If the buffered result is still invalid the
/// original geometry is returned instead; callers must tolerate invalid
/// geometry degrading to fewer usable paths downstream.
pub fn repair(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Polygon(polygon) => {
            if polygon.exterior().0.is_empty() || polygon.is_valid() {
                return Geometry::Polygon(polygon);
            }
            let healed = buffer_polygon(&polygon, 0.0);
            if healed.is_valid() {
                Geometry::MultiPolygon(healed)
            } else {
                Geometry::Polygon(polygon)
            }
        }
        Geometry::MultiPolygon(multi) => {
            if multi.0.is_empty() || multi.is_valid() {
                return Geometry::MultiPolygon(multi);
            }
            let healed = buffer_multi_polygon(&multi, 0.0);
            if healed.is_valid() {
                Geometry::MultiPolygon(healed)
            } else {
                Geometry::MultiPolygon(multi)
            }
        }
        other => other,
    }
}

/// Flattens a geometry into 3D polyline paths draped at elevation `z`.
///
/// Polygons yield one path per ring (holes stay independent paths), lines
/// keep their vertex order, multi variants concatenate their members and
/// any other kind yields nothing. Paths with fewer than two vertices are
/// discarded.
pub fn to_paths(geometry: &Geometry<f64>, z: f64) -> Vec<Path3> {
    let mut paths = Vec::new();
    collect_paths(geometry, z, &mut paths);
    paths.retain(|path| path.points.len() >= 2);
    paths
}

fn collect_paths(geometry: &Geometry<f64>, z: f64, paths: &mut Vec<Path3>) {
    match geometry {
        Geometry::Polygon(polygon) => {
            if !polygon.exterior().0.is_empty() {
                paths.push(ring_path(polygon.exterior(), z));
                for interior in polygon.interiors() {
                    paths.push(ring_path(interior, z));
                }
            }
        }
        Geometry::MultiPolygon(multi) => {
            for polygon in &multi.0 {
                collect_paths(&Geometry::Polygon(polygon.clone()), z, paths);
            }
        }
        Geometry::LineString(line) => {
            if !line.0.is_empty() {
                paths.push(line_path(line, z));
            }
        }
        Geometry::MultiLineString(multi) => {
            for line in &multi.0 {
                collect_paths(&Geometry::LineString(line.clone()), z, paths);
            }
        }
        _ => {}
    }
}

fn ring_path(ring: &LineString<f64>, z: f64) -> Path3 {
    let coords = &ring.0;
    let mut end = coords.len();
    // closure is structural, drop an explicit closing vertex
    if end >= 2 && coords[0] == coords[end - 1] {
        end -= 1;
    }
    let points = coords[..end].iter().map(|c| (c.x, c.y, z)).collect();
    Path3 { points, ring: true }
}

fn line_path(line: &LineString<f64>, z: f64) -> Path3 {
    let points = line.0.iter().map(|c| (c.x, c.y, z)).collect();
    Path3 {
        points,
        ring: false,
    }
}
