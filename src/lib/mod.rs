use crate::alti::ElevationService;
use crate::crs::{epsg_from_postcode, project_wgs84, transform, LambertCc, DEFAULT_CRS, WGS84};
use crate::feature::{BoundingBox, FeatureCollection};
use crate::geocode::Address;
use crate::output::{write_drawing, DrawingOptions};
use crate::wfs::FeatureService;
use log::info;
use std::path::Path;

pub mod alti;
pub mod client;
pub mod crs;
pub mod feature;
pub mod geocode;
pub mod geometry;
pub mod output;
pub mod wfs;
#[cfg(test)]
mod test_helpers;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid service payload: {0}")]
    Payload(String),
    #[error("drawing error: {0}")]
    Dxf(#[from] dxf::DxfError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no entities found in the requested extent")]
    NoEntities,
    #[error("no match for address \"{0}\"")]
    AddressNotFound(String),
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub radius_m: f64,
    pub step_m: f64,
    pub elevation_points: bool,
    pub close_polylines: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            radius_m: 200.0,
            step_m: 50.0,
            elevation_points: true,
            close_polylines: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub buildings: usize,
    pub parcels: usize,
    pub elevation_points: usize,
    pub target_epsg: String,
}

/// Runs one export: fetch buildings and parcels around the address,
/// sample the elevation grid, reproject everything into the zone CRS
/// picked from the postal prefix and write the three-layer drawing.
///
/// Fails with [`Error::NoEntities`] when all three layers come back empty.
pub fn export<S>(
    service: &S,
    address: &Address,
    out_path: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, Error>
where
    S: FeatureService + ElevationService,
{
    let lambert93 = LambertCc::lambert93();
    let (center_x, center_y) = lambert93.forward(address.lon, address.lat);
    let bbox = BoundingBox::around(center_x, center_y, options.radius_m);

    info!("fetching buildings around {}", address.label);
    let mut buildings = wfs::fetch_buildings(service, &bbox, DEFAULT_CRS, wfs::PAGE_SIZE)?;
    info!("fetching parcels");
    let mut parcels = wfs::fetch_parcels(service, &bbox, DEFAULT_CRS, wfs::PAGE_SIZE)?;

    let target_epsg = epsg_from_postcode(&address.postcode);

    let samples = if options.elevation_points {
        info!("sampling the elevation grid");
        alti::sample(
            service,
            address.lon,
            address.lat,
            options.radius_m,
            options.step_m,
        )?
    } else {
        Vec::new()
    };
    let mut elevation = FeatureCollection::from_samples(&samples, WGS84);

    if buildings.is_empty() && parcels.is_empty() && elevation.is_empty() {
        return Err(Error::NoEntities);
    }

    let target = LambertCc::from_epsg(&target_epsg).unwrap_or(lambert93);
    if target_epsg != DEFAULT_CRS {
        transform(&mut buildings, &lambert93, &target, &target_epsg);
        transform(&mut parcels, &lambert93, &target, &target_epsg);
    }
    project_wgs84(&mut elevation, &target, &target_epsg);

    let drawing_options = DrawingOptions {
        close_polylines: options.close_polylines,
        elevation_points: options.elevation_points,
        address_note: address.label.clone(),
        target_epsg_note: target_epsg.clone(),
    };
    let (buildings, parcels, elevation_points) =
        write_drawing(&buildings, &parcels, &elevation, out_path, &drawing_options)?;

    Ok(ExportSummary {
        buildings,
        parcels,
        elevation_points,
        target_epsg,
    })
}
