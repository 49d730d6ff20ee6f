use crate::alti::{ElevationSample, ElevationService};
use crate::feature::{lenient_f64, BoundingBox, Feature};
use crate::wfs::FeatureService;
use crate::Error;
use itertools::Itertools;
use log::warn;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::thread;
use std::time::Duration;

pub const WFS_URL: &str = "https://data.geopf.fr/wfs/ows";
pub const ALTI_URL: &str = "https://data.geopf.fr/altimetrie/1.0/calcul/alti/rest/elevation.json";
pub const GEOCODE_URL: &str = "https://data.geopf.fr/geocodage/search";

const USER_AGENT: &str = "cadastre-app/1.0";
const TIMEOUT: Duration = Duration::from_secs(60);
const RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Caller-owned HTTP transport for the GeoPlateforme services.
///
/// Retries connect/timeout failures, 429 and 5xx responses with bounded
/// exponential backoff; any other failure surfaces immediately.
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(HttpClient { client })
    }

    pub(crate) fn get_text(&self, url: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        let response = self.send_with_retry(|| self.client.get(url).query(params))?;
        Ok(response.text()?)
    }

    fn send_with_retry(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, Error> {
        let mut delay = BACKOFF_BASE;
        let mut attempt = 0;
        loop {
            match build().send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt >= RETRIES {
                        return Err(Error::Status {
                            status: status.as_u16(),
                            url: response.url().to_string(),
                        });
                    }
                    warn!("{} from {}, retrying in {:?}", status, response.url(), delay);
                }
                Err(err) => {
                    if !(err.is_timeout() || err.is_connect()) || attempt >= RETRIES {
                        return Err(err.into());
                    }
                    warn!("request failed ({}), retrying in {:?}", err, delay);
                }
            }
            thread::sleep(delay);
            delay *= 2;
            attempt += 1;
        }
    }
}

impl FeatureService for HttpClient {
    fn page(
        &self,
        layer: &str,
        bbox: &BoundingBox,
        crs: &str,
        count: usize,
        start_index: usize,
    ) -> Result<Vec<Feature>, Error> {
        let count = count.to_string();
        let start_index = start_index.to_string();
        let bbox = bbox.to_query_param(crs);
        let raw = self.get_text(
            WFS_URL,
            &[
                ("service", "WFS"),
                ("version", "2.0.0"),
                ("request", "GetFeature"),
                ("typenames", layer),
                ("count", count.as_str()),
                ("startIndex", start_index.as_str()),
                ("srsName", crs),
                ("outputFormat", "application/json"),
                ("bbox", bbox.as_str()),
            ],
        )?;
        parse_features(&raw)
    }
}

/// Decodes one GeoJSON page into domain features. Features without a
/// usable geometry are skipped, attribute values are parsed leniently.
fn parse_features(raw: &str) -> Result<Vec<Feature>, Error> {
    let collection: geojson::FeatureCollection = raw
        .parse()
        .map_err(|err: geojson::Error| Error::Payload(err.to_string()))?;
    let mut features = Vec::with_capacity(collection.features.len());
    for gj_feature in collection.features {
        let geometry = match gj_feature.geometry {
            Some(geometry) => match geo_types::Geometry::<f64>::try_from(geometry.value) {
                Ok(geometry) => geometry,
                Err(err) => {
                    warn!("skipping feature with unsupported geometry: {}", err);
                    continue;
                }
            },
            None => continue,
        };
        let mut feature = Feature::new(geometry);
        if let Some(properties) = gj_feature.properties {
            for (name, value) in properties {
                feature.attributes.insert(name, lenient_f64(&value));
            }
        }
        features.push(feature);
    }
    Ok(features)
}

#[derive(Deserialize)]
struct ElevationResponse {
    elevations: Vec<ElevationSample>,
}

impl ElevationService for HttpClient {
    fn elevations(&self, lons: &[f64], lats: &[f64]) -> Result<Vec<ElevationSample>, Error> {
        let body = json!({
            "lon": join(lons),
            "lat": join(lats),
            "resource": "ign_rge_alti_wld",
            "delimiter": ";",
            "indent": "true",
            "measure": "false",
            "zonly": "false",
        });
        let response = self.send_with_retry(|| self.client.post(ALTI_URL).json(&body))?;
        let parsed: ElevationResponse = response
            .json()
            .map_err(|err| Error::Payload(err.to_string()))?;
        Ok(parsed.elevations)
    }
}

fn join(values: &[f64]) -> String {
    values.iter().map(f64::to_string).join(";")
}

#[cfg(test)]
mod parse_features {
    use super::parse_features;
    use crate::feature::ATTR_HEIGHT;

    const PAGE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]
                },
                "properties": {"hauteur": "5,2", "usage": "résidentiel"}
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": {}
            }
        ]
    }"#;

    #[test]
    fn decodes_geometry_and_lenient_attributes() {
        let features = parse_features(PAGE).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].attribute(ATTR_HEIGHT), Some(5.2));
        assert_eq!(features[0].attribute("usage"), None);
    }

    #[test]
    fn garbage_is_a_payload_error() {
        assert!(parse_features("not json").is_err());
    }
}
