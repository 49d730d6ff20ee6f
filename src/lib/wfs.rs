use crate::feature::{
    BoundingBox, Feature, FeatureCollection, ATTR_HEIGHT, ATTR_ROOF_MAX, ATTR_ROOF_MIN,
};
use crate::Error;
use log::info;

pub const LAYER_BUILDINGS: &str = "BDTOPO_V3:batiment";
pub const LAYER_PARCELS: &str = "BDPARCELLAIRE-VECTEUR_WLD_BDD_WGS84G:parcelle";
pub const PAGE_SIZE: usize = 5000;

const HEIGHT_ALIASES: &[&str] = &[
    "hauteur",
    "height",
    "hauteur_val",
    "hauteur_value",
    "heightaboveground_value",
];
const ROOF_MAX_ALIASES: &[&str] = &["altitude_maximale_toit"];
const ROOF_MIN_ALIASES: &[&str] = &["altitude_minimale_toit"];

/// One page request against a WFS-style feature service.
///
/// Implementations own their transport and retry policy; errors surfacing
/// here are considered final.
pub trait FeatureService {
    fn page(
        &self,
        layer: &str,
        bbox: &BoundingBox,
        crs: &str,
        count: usize,
        start_index: usize,
    ) -> Result<Vec<Feature>, Error>;
}

/// Fetches every feature of `layer` intersecting `bbox`, page by page.
///
/// A page smaller than `page_size` (including an empty one) is the last
/// page; the offset advances by exactly `page_size` otherwise. Pages are
/// concatenated in request order. No match is not an error: the result is
/// an empty collection carrying the requested CRS.
pub fn fetch_layer(
    service: &impl FeatureService,
    layer: &str,
    bbox: &BoundingBox,
    crs: &str,
    page_size: usize,
) -> Result<FeatureCollection, Error> {
    let mut features = Vec::new();
    let mut start_index = 0;
    loop {
        let page = service.page(layer, bbox, crs, page_size, start_index)?;
        let returned = page.len();
        features.extend(page);
        if returned < page_size {
            break;
        }
        start_index += page_size;
    }
    info!("{}: {} features", layer, features.len());
    Ok(FeatureCollection {
        crs: crs.to_string(),
        features,
    })
}

/// Fetches the building layer and normalizes its height attributes onto
/// the canonical names the assembler reads.
pub fn fetch_buildings(
    service: &impl FeatureService,
    bbox: &BoundingBox,
    crs: &str,
    page_size: usize,
) -> Result<FeatureCollection, Error> {
    let mut collection = fetch_layer(service, LAYER_BUILDINGS, bbox, crs, page_size)?;
    for feature in &mut collection.features {
        canonicalize(feature, ATTR_HEIGHT, HEIGHT_ALIASES);
        canonicalize(feature, ATTR_ROOF_MAX, ROOF_MAX_ALIASES);
        canonicalize(feature, ATTR_ROOF_MIN, ROOF_MIN_ALIASES);
    }
    Ok(collection)
}

pub fn fetch_parcels(
    service: &impl FeatureService,
    bbox: &BoundingBox,
    crs: &str,
    page_size: usize,
) -> Result<FeatureCollection, Error> {
    fetch_layer(service, LAYER_PARCELS, bbox, crs, page_size)
}

/// Moves the first matching alias (case-insensitive, in alias priority
/// order) onto the canonical attribute name; synthesizes a null attribute
/// when no alias is present.
fn canonicalize(feature: &mut Feature, canonical: &str, aliases: &[&str]) {
    for alias in aliases {
        let found = feature
            .attributes
            .keys()
            .find(|key| key.eq_ignore_ascii_case(alias))
            .cloned();
        if let Some(key) = found {
            let value = feature.attributes.remove(&key).flatten();
            feature.attributes.insert(canonical.to_string(), value);
            return;
        }
    }
    feature
        .attributes
        .entry(canonical.to_string())
        .or_insert(None);
}

#[cfg(test)]
mod fetch_layer {
    use super::*;
    use crate::test_helpers::point_feature;
    use std::cell::RefCell;

    struct PagedService {
        total: usize,
        requests: RefCell<usize>,
    }

    impl PagedService {
        fn new(total: usize) -> Self {
            PagedService {
                total,
                requests: RefCell::new(0),
            }
        }
    }

    impl FeatureService for PagedService {
        fn page(
            &self,
            _layer: &str,
            _bbox: &BoundingBox,
            _crs: &str,
            count: usize,
            start_index: usize,
        ) -> Result<Vec<Feature>, Error> {
            *self.requests.borrow_mut() += 1;
            let remaining = self.total.saturating_sub(start_index);
            let size = remaining.min(count);
            Ok((0..size).map(|_| point_feature(0.0, 0.0, None)).collect())
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 1.0, 1.0)
    }

    #[test]
    fn short_last_page_terminates_pagination() {
        // pages of 5000, 5000, 3000
        let service = PagedService::new(13000);
        let collection = fetch_layer(&service, "layer", &bbox(), "EPSG:2154", 5000).unwrap();
        assert_eq!(*service.requests.borrow(), 3);
        assert_eq!(collection.len(), 13000);
    }

    #[test]
    fn exact_multiple_needs_one_empty_page() {
        let service = PagedService::new(10);
        let collection = fetch_layer(&service, "layer", &bbox(), "EPSG:2154", 5).unwrap();
        assert_eq!(*service.requests.borrow(), 3);
        assert_eq!(collection.len(), 10);
    }

    #[test]
    fn no_match_yields_empty_collection_with_crs() {
        let service = PagedService::new(0);
        let collection = fetch_layer(&service, "layer", &bbox(), "EPSG:3948", 5000).unwrap();
        assert_eq!(*service.requests.borrow(), 1);
        assert!(collection.is_empty());
        assert_eq!(collection.crs, "EPSG:3948");
    }
}
