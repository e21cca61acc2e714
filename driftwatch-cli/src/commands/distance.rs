//! `distance` command.

use clap::Args;
use driftwatch::geo::Coordinate;
use driftwatch::tracking::DEFAULT_IMMOBILITY_RADIUS_M;

use crate::error::CliError;

/// Arguments for the distance command.
#[derive(Debug, Args)]
pub struct DistanceArgs {
    /// Latitude of the first point
    #[arg(allow_negative_numbers = true)]
    pub lat1: f64,

    /// Longitude of the first point
    #[arg(allow_negative_numbers = true)]
    pub lon1: f64,

    /// Latitude of the second point
    #[arg(allow_negative_numbers = true)]
    pub lat2: f64,

    /// Longitude of the second point
    #[arg(allow_negative_numbers = true)]
    pub lon2: f64,

    /// Radius to compare against, in meters
    #[arg(long, default_value_t = DEFAULT_IMMOBILITY_RADIUS_M)]
    pub radius: f64,
}

/// Print the Haversine distance and whether it exceeds the radius.
pub fn run(args: DistanceArgs) -> Result<(), CliError> {
    let a = Coordinate::new(args.lat1, args.lon1)?;
    let b = Coordinate::new(args.lat2, args.lon2)?;
    let meters = a.distance_to(&b);

    println!("{:.1} m", meters);
    if meters > args.radius {
        println!("beyond the {} m radius", args.radius);
    } else {
        println!("within the {} m radius", args.radius);
    }
    Ok(())
}
