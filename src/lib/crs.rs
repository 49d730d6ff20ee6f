use crate::feature::FeatureCollection;
use geo::MapCoords;
use geo_types::Coord;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// Fallback projected CRS (Lambert-93) when no zone matches.
pub const DEFAULT_CRS: &str = "EPSG:2154";
/// Geographic CRS of the elevation service.
pub const WGS84: &str = "EPSG:4326";

const GRS80_A: f64 = 6_378_137.0;
const GRS80_INV_F: f64 = 298.257_222_101;

/// Picks the projected "conique conforme" zone for a postal prefix.
///
/// Departments map onto the CC42–CC50 zones, Corsica (20xxx) is pinned to
/// CC42, anything unmapped falls back to Lambert-93.
pub fn epsg_from_postcode(postcode: &str) -> String {
    let dept = match postcode.get(..2) {
        Some(dept) => dept,
        None => return DEFAULT_CRS.to_string(),
    };
    if dept == "20" {
        // Corsica
        return "EPSG:3942".to_string();
    }
    match cc_zone(dept) {
        Some(zone) => format!("EPSG:{}", 3900 + zone),
        None => DEFAULT_CRS.to_string(),
    }
}

fn cc_zone(dept: &str) -> Option<u32> {
    let zone = match dept {
        "2A" | "2B" => 42,
        "09" | "11" | "31" | "34" | "64" | "65" | "66" | "83" => 43,
        "04" | "06" | "12" | "13" | "30" | "32" | "40" | "47" | "48" | "81" | "82" | "84" => 44,
        "05" | "07" | "15" | "19" | "24" | "26" | "33" | "38" | "43" | "46" | "73" => 45,
        "01" | "03" | "16" | "17" | "23" | "42" | "63" | "69" | "74" | "87" => 46,
        "18" | "21" | "25" | "36" | "37" | "39" | "44" | "49" | "58" | "71" | "79" | "85"
        | "86" => 47,
        "10" | "22" | "28" | "29" | "35" | "41" | "45" | "52" | "53" | "56" | "68" | "70"
        | "72" | "88" | "89" | "90" => 48,
        "02" | "14" | "27" | "50" | "51" | "54" | "55" | "57" | "60" | "61" | "67" | "75"
        | "77" | "78" | "91" | "92" | "93" | "94" | "95" => 49,
        "08" | "59" | "62" | "76" | "80" => 50,
        _ => return None,
    };
    Some(zone)
}

/// Two-standard-parallel Lambert conformal conic projection on the GRS80
/// ellipsoid, covering Lambert-93 and the CC42–CC50 zones.
#[derive(Debug, Clone, Copy)]
pub struct LambertCc {
    n: f64,
    af: f64,
    rho0: f64,
    lon0: f64,
    x0: f64,
    y0: f64,
    e: f64,
}

impl LambertCc {
    /// Lambert-93, the nationwide default projection.
    pub fn lambert93() -> Self {
        LambertCc::new(46.5, 44.0, 49.0, 3.0, 700_000.0, 6_600_000.0)
    }

    /// Projection parameters for a supported EPSG code.
    pub fn from_epsg(code: &str) -> Option<Self> {
        if code == DEFAULT_CRS {
            return Some(LambertCc::lambert93());
        }
        let zone: u32 = code.strip_prefix("EPSG:39")?.parse().ok()?;
        if !(42..=50).contains(&zone) {
            return None;
        }
        let lat0 = f64::from(zone);
        Some(LambertCc::new(
            lat0,
            lat0 - 0.75,
            lat0 + 0.75,
            3.0,
            1_700_000.0,
            (lat0 - 41.0) * 1_000_000.0 + 200_000.0,
        ))
    }

    fn new(lat0: f64, lat1: f64, lat2: f64, lon0: f64, x0: f64, y0: f64) -> Self {
        let f = 1.0 / GRS80_INV_F;
        let e = (f * (2.0 - f)).sqrt();
        let m = |phi: f64| phi.cos() / (1.0 - (e * phi.sin()).powi(2)).sqrt();
        let t = |phi: f64| {
            (FRAC_PI_4 - phi / 2.0).tan()
                / ((1.0 - e * phi.sin()) / (1.0 + e * phi.sin())).powf(e / 2.0)
        };
        let phi0 = lat0.to_radians();
        let phi1 = lat1.to_radians();
        let phi2 = lat2.to_radians();
        let n = (m(phi1).ln() - m(phi2).ln()) / (t(phi1).ln() - t(phi2).ln());
        let af = GRS80_A * m(phi1) / (n * t(phi1).powf(n));
        let rho0 = af * t(phi0).powf(n);
        LambertCc {
            n,
            af,
            rho0,
            lon0: lon0.to_radians(),
            x0,
            y0,
            e,
        }
    }

    fn t(&self, phi: f64) -> f64 {
        (FRAC_PI_4 - phi / 2.0).tan()
            / ((1.0 - self.e * phi.sin()) / (1.0 + self.e * phi.sin())).powf(self.e / 2.0)
    }

    /// Geographic degrees to projected meters.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let rho = self.af * self.t(lat.to_radians()).powf(self.n);
        let theta = self.n * (lon.to_radians() - self.lon0);
        (
            self.x0 + rho * theta.sin(),
            self.y0 + self.rho0 - rho * theta.cos(),
        )
    }

    /// Projected meters back to geographic degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.x0;
        let dy = self.rho0 - (y - self.y0);
        let rho = (dx * dx + dy * dy).sqrt() * self.n.signum();
        let t = (rho / self.af).powf(1.0 / self.n);
        let lon = (dx.atan2(dy) / self.n + self.lon0).to_degrees();
        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..8 {
            let es = self.e * phi.sin();
            phi = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
        }
        (lon, phi.to_degrees())
    }
}

/// Reprojects a whole collection between two projected CRSs. The CRS is
/// swapped at the collection level, never per feature.
pub fn transform(
    collection: &mut FeatureCollection,
    source: &LambertCc,
    target: &LambertCc,
    target_code: &str,
) {
    for feature in &mut collection.features {
        feature.geometry = feature.geometry.map_coords(|c: Coord<f64>| {
            let (lon, lat) = source.inverse(c.x, c.y);
            let (x, y) = target.forward(lon, lat);
            Coord { x, y }
        });
    }
    collection.crs = target_code.to_string();
}

/// Projects a geographic (lon/lat) collection into a projected CRS.
pub fn project_wgs84(collection: &mut FeatureCollection, target: &LambertCc, target_code: &str) {
    for feature in &mut collection.features {
        feature.geometry = feature.geometry.map_coords(|c: Coord<f64>| {
            let (x, y) = target.forward(c.x, c.y);
            Coord { x, y }
        });
    }
    collection.crs = target_code.to_string();
}

#[cfg(test)]
mod epsg_from_postcode {
    use super::epsg_from_postcode;

    #[test]
    fn mapped_departments() {
        assert_eq!(epsg_from_postcode("31000"), "EPSG:3943");
        assert_eq!(epsg_from_postcode("75008"), "EPSG:3949");
        assert_eq!(epsg_from_postcode("59000"), "EPSG:3950");
    }

    #[test]
    fn corsica_uses_cc42() {
        assert_eq!(epsg_from_postcode("20000"), "EPSG:3942");
    }

    #[test]
    fn unmapped_or_short_prefixes_fall_back() {
        assert_eq!(epsg_from_postcode("97400"), "EPSG:2154");
        assert_eq!(epsg_from_postcode("7"), "EPSG:2154");
        assert_eq!(epsg_from_postcode(""), "EPSG:2154");
    }
}
