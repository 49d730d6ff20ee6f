use crate::Error;
use log::info;
use serde::Deserialize;
use std::thread;
use std::time::{Duration, Instant};

/// Reserved elevation meaning "no measurement available"; the assembler
/// filters it, the sampler returns it untouched.
pub const NO_DATA_Z: f64 = -99999.0;
/// Maximum number of points per elevation service request.
pub const MAX_BATCH: usize = 4000;
/// Minimum interval between two chunk requests of one sampling call.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

const KM_PER_DEGREE: f64 = 111.32;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ElevationSample {
    pub lon: f64,
    pub lat: f64,
    pub z: f64,
}

/// One batched elevation request over parallel lon/lat arrays; results
/// come back parallel to the input, in input order.
pub trait ElevationService {
    fn elevations(&self, lons: &[f64], lats: &[f64]) -> Result<Vec<ElevationSample>, Error>;
}

/// Minimum-interval throttle, scoped to one sampling call.
struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last: None,
        }
    }

    fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Regular axis from `min` to `max` with the exact boundary as last value,
/// even when the range is not a whole multiple of `step`.
pub fn grid_axis(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut values = Vec::new();
    let mut x = min;
    while x < max {
        values.push(x);
        x += step;
    }
    values.push(max);
    values
}

/// Samples the elevation grid around a WGS84 center point out to
/// `radius_m`, one sample every `step_m`, using the production batch size
/// and request interval.
pub fn sample(
    service: &impl ElevationService,
    lon: f64,
    lat: f64,
    radius_m: f64,
    step_m: f64,
) -> Result<Vec<ElevationSample>, Error> {
    sample_with(service, lon, lat, radius_m, step_m, MAX_BATCH, MIN_INTERVAL)
}

fn sample_with(
    service: &impl ElevationService,
    lon: f64,
    lat: f64,
    radius_m: f64,
    step_m: f64,
    chunk_size: usize,
    min_interval: Duration,
) -> Result<Vec<ElevationSample>, Error> {
    let step_km = step_m / 1000.0;
    let radius_km = radius_m / 1000.0;

    // longitude spacing is latitude-corrected so grid cells are roughly
    // square on the ground
    let lat_correction = KM_PER_DEGREE * lat.to_radians().cos();
    let step_lat = step_km / KM_PER_DEGREE;
    let step_lon = step_km / lat_correction;
    let delta_lat = radius_km / KM_PER_DEGREE;
    let delta_lon = radius_km / lat_correction;

    let lats = grid_axis(lat - delta_lat, lat + delta_lat, step_lat);
    let lons = grid_axis(lon - delta_lon, lon + delta_lon, step_lon);

    let mut flat_lons = Vec::with_capacity(lons.len() * lats.len());
    let mut flat_lats = Vec::with_capacity(lons.len() * lats.len());
    for x in &lons {
        for y in &lats {
            flat_lons.push(*x);
            flat_lats.push(*y);
        }
    }

    let chunks = flat_lons.chunks(chunk_size).zip(flat_lats.chunks(chunk_size));
    let mut throttle = Throttle::new(min_interval);
    let mut merged = Vec::with_capacity(flat_lons.len());
    for (lon_chunk, lat_chunk) in chunks {
        throttle.wait();
        let samples = service.elevations(lon_chunk, lat_chunk)?;
        merged.extend(samples);
    }
    info!(
        "sampled {} elevation points ({} x {})",
        merged.len(),
        lons.len(),
        lats.len()
    );
    Ok(merged)
}

#[cfg(test)]
mod grid_axis {
    use super::grid_axis;
    use approx::assert_relative_eq;

    #[test]
    fn last_value_is_the_exact_boundary() {
        let axis = grid_axis(0.0, 1.0, 0.3);
        assert_eq!(axis.len(), 5);
        assert_relative_eq!(axis[0], 0.0);
        assert_relative_eq!(axis[1], 0.3);
        assert_relative_eq!(axis[2], 0.6);
        assert_relative_eq!(axis[3], 0.9);
        assert_eq!(axis[4], 1.0);
    }

    #[test]
    fn whole_multiple_still_ends_on_the_boundary() {
        let axis = grid_axis(-1.0, 1.0, 1.0);
        assert_eq!(*axis.last().unwrap(), 1.0);
        assert_eq!(axis.len(), 3);
    }
}

#[cfg(test)]
mod sample {
    use super::*;
    use std::cell::RefCell;

    struct EchoService {
        requests: RefCell<Vec<usize>>,
        fail_on_request: Option<usize>,
    }

    impl EchoService {
        fn new() -> Self {
            EchoService {
                requests: RefCell::new(Vec::new()),
                fail_on_request: None,
            }
        }
    }

    impl ElevationService for EchoService {
        fn elevations(&self, lons: &[f64], lats: &[f64]) -> Result<Vec<ElevationSample>, Error> {
            assert_eq!(lons.len(), lats.len());
            self.requests.borrow_mut().push(lons.len());
            if self.fail_on_request == Some(self.requests.borrow().len()) {
                return Err(Error::Payload("boom".to_string()));
            }
            Ok(lons
                .iter()
                .zip(lats)
                .map(|(&lon, &lat)| ElevationSample { lon, lat, z: 0.0 })
                .collect())
        }
    }

    // one degree of latitude in meters, so the grid axes are 3 values wide
    const DEGREE_M: f64 = 111_320.0;

    #[test]
    fn chunks_stay_aligned_and_merge_in_order() {
        let service = EchoService::new();
        let samples =
            sample_with(&service, 0.0, 0.0, DEGREE_M, DEGREE_M, 4, Duration::ZERO).unwrap();
        // 3 x 3 grid split into chunks of 4, 4 and 1
        assert_eq!(*service.requests.borrow(), vec![4, 4, 1]);
        assert_eq!(samples.len(), 9);
        // longitude-major cross product order survives the merge
        for window in samples.chunks(3) {
            assert!(window.iter().all(|s| s.lon == window[0].lon));
        }
        assert!(samples[0].lon < samples[8].lon);
    }

    #[test]
    fn requests_respect_the_minimum_interval() {
        let service = EchoService::new();
        let interval = Duration::from_millis(30);
        let started = Instant::now();
        sample_with(&service, 0.0, 0.0, DEGREE_M, DEGREE_M, 4, interval).unwrap();
        // 3 chunks, so at least 2 full intervals elapse
        assert!(started.elapsed() >= interval * 2);
    }

    #[test]
    fn a_failing_chunk_aborts_the_whole_call() {
        let mut service = EchoService::new();
        service.fail_on_request = Some(2);
        let result = sample_with(&service, 0.0, 0.0, DEGREE_M, DEGREE_M, 4, Duration::ZERO);
        assert!(result.is_err());
    }
}
