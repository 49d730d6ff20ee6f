use std::error::Error;
use std::path::PathBuf;
use structopt::StructOpt;
use wfs2dxf::client::HttpClient;
use wfs2dxf::geocode::{geocode, GEOCODE_LIMIT};
use wfs2dxf::{export, ExportOptions};

#[derive(StructOpt)]
#[structopt(
    name = "wfs2dxf",
    about = "Exports buildings, parcels and elevation points around an address into a 3D DXF drawing"
)]
struct Opt {
    /// Free-text address of the plot of land
    address: String,
    /// Output DXF file
    #[structopt(short, long, parse(from_os_str))]
    out: PathBuf,
    /// Search radius in meters
    #[structopt(long, default_value = "200")]
    radius: f64,
    /// Elevation grid step in meters
    #[structopt(long, default_value = "50")]
    step: f64,
    /// Skip the elevation point layer
    #[structopt(long)]
    no_elevation: bool,
    /// Leave building and parcel outlines open
    #[structopt(long)]
    open_polylines: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let opt = Opt::from_args();

    let client = HttpClient::new()?;
    let address = geocode(&client, &opt.address, GEOCODE_LIMIT)?
        .into_iter()
        .next()
        .ok_or_else(|| wfs2dxf::Error::AddressNotFound(opt.address.clone()))?;
    println!("exporting around: {}", address.label);

    let options = ExportOptions {
        radius_m: opt.radius,
        step_m: opt.step,
        elevation_points: !opt.no_elevation,
        close_polylines: !opt.open_polylines,
    };
    let summary = export(&client, &address, &opt.out, &options)?;
    println!(
        "done: {} buildings, {} parcels, {} elevation points (CRS {})",
        summary.buildings, summary.parcels, summary.elevation_points, summary.target_epsg
    );
    Ok(())
}
