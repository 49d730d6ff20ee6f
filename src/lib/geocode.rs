use crate::client::{HttpClient, GEOCODE_URL};
use crate::Error;
use serde_json::Value;
use std::cmp::Ordering;

pub const GEOCODE_LIMIT: usize = 20;

/// A geocoded address candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub label: String,
    pub lon: f64,
    pub lat: f64,
    pub postcode: String,
    pub citycode: String,
}

/// Resolves free text to address candidates, best match first
/// (score descending, then importance descending).
pub fn geocode(client: &HttpClient, query: &str, limit: usize) -> Result<Vec<Address>, Error> {
    let limit = limit.to_string();
    let raw = client.get_text(GEOCODE_URL, &[("q", query), ("limit", limit.as_str())])?;
    parse_addresses(&raw)
}

fn parse_addresses(raw: &str) -> Result<Vec<Address>, Error> {
    let collection: geojson::FeatureCollection = raw
        .parse()
        .map_err(|err: geojson::Error| Error::Payload(err.to_string()))?;
    let mut ranked = Vec::new();
    for feature in collection.features {
        let (lon, lat) = match feature.geometry {
            Some(geometry) => match geometry.value {
                geojson::Value::Point(ref coords) if coords.len() >= 2 => (coords[0], coords[1]),
                _ => continue,
            },
            None => continue,
        };
        let properties = feature.properties.unwrap_or_default();
        let text = |name: &str| {
            properties
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let number = |name: &str| {
            properties
                .get(name)
                .and_then(Value::as_f64)
                .unwrap_or_default()
        };
        let address = Address {
            label: text("label"),
            lon,
            lat,
            postcode: text("postcode"),
            citycode: text("citycode"),
        };
        ranked.push((number("score"), number("importance"), address));
    }
    ranked.sort_by(|a, b| {
        (b.0, b.1)
            .partial_cmp(&(a.0, a.1))
            .unwrap_or(Ordering::Equal)
    });
    Ok(ranked.into_iter().map(|(_, _, address)| address).collect())
}
