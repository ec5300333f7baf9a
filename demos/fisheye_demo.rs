//! Fisheye Distortion Round-Trip Demo
//!
//! Distorts a grid of normalized image points with a fisheye model, undistorts
//! them again and reports the round-trip error together with the Jacobians at the
//! grid corners.
//!
//! Usage:
//! ```bash
//! cargo run --example fisheye_demo -- --config samples/fisheye.yaml
//! cargo run --example fisheye_demo -- --w 1.2 --grid 15 --extent 1.5
//! ```

use clap::Parser;
use fisheye_distortion::{Distortion, FisheyeDistortion};
use log::{info, warn};
use nalgebra::{Matrix2xX, Vector2};
use serde::Serialize;

/// Command line arguments for the fisheye distortion demo
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML camera file with `distortion_model: fisheye`
    #[arg(short, long)]
    config: Option<String>,

    /// Field-of-view parameter used when no config is given
    #[arg(short, long, default_value_t = 0.8)]
    w: f64,

    /// Number of grid points along each axis
    #[arg(short, long, default_value_t = 11)]
    grid: usize,

    /// Half-width of the normalized grid
    #[arg(short, long, default_value_t = 1.0)]
    extent: f64,
}

#[derive(Debug, Serialize)]
struct CornerJacobian {
    point: [f64; 2],
    point_jacobian: [[f64; 2]; 2],
    parameter_jacobian: [f64; 2],
}

#[derive(Debug, Serialize)]
struct RoundTripReport {
    w: f64,
    num_points: usize,
    num_out_of_domain: usize,
    max_round_trip_error: f64,
    mean_round_trip_error: f64,
    max_radial_shift: f64,
    corners: Vec<CornerJacobian>,
}

fn grid_points(grid: usize, extent: f64) -> Matrix2xX<f64> {
    let steps = grid.max(2);
    let step = 2.0 * extent / (steps - 1) as f64;
    Matrix2xX::from_fn(steps * steps, |r, c| {
        let index = if r == 0 { c % steps } else { c / steps };
        -extent + index as f64 * step
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;
    let cli = Cli::parse();

    let model = match &cli.config {
        Some(path) => FisheyeDistortion::load_from_yaml(path)?,
        None => FisheyeDistortion::from_w(cli.w)?,
    };
    info!("using {:?}", model);

    let original = grid_points(cli.grid, cli.extent);
    let mut distorted = original.clone();
    model.distort_points(&mut distorted);
    let mut recovered = distorted.clone();
    model.undistort_points(&mut recovered);

    let mut errors = Vec::with_capacity(original.ncols());
    let mut num_out_of_domain = 0;
    let mut max_radial_shift: f64 = 0.0;
    for i in 0..original.ncols() {
        let restored = recovered.column(i);
        if !restored.iter().all(|v| v.is_finite()) {
            num_out_of_domain += 1;
            continue;
        }
        errors.push((restored.into_owned() - original.column(i)).norm());
        max_radial_shift =
            max_radial_shift.max((distorted.column(i).norm() - original.column(i).norm()).abs());
    }
    if num_out_of_domain > 0 {
        warn!("{num_out_of_domain} points fell outside the valid undistortion angle");
    }

    let corners = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
        .iter()
        .map(|&(sx, sy)| {
            let point = Vector2::new(sx * cli.extent, sy * cli.extent);
            let mut distorted_corner = point;
            let jacobian = model.distort_with_jacobian(&mut distorted_corner);
            let parameter_jacobian = model.parameter_jacobian(&point);
            CornerJacobian {
                point: [point.x, point.y],
                point_jacobian: [
                    [jacobian[(0, 0)], jacobian[(0, 1)]],
                    [jacobian[(1, 0)], jacobian[(1, 1)]],
                ],
                parameter_jacobian: [parameter_jacobian.x, parameter_jacobian.y],
            }
        })
        .collect();

    let report = RoundTripReport {
        w: model.w(),
        num_points: original.ncols(),
        num_out_of_domain,
        max_round_trip_error: errors.iter().cloned().fold(0.0, f64::max),
        mean_round_trip_error: if errors.is_empty() {
            0.0
        } else {
            errors.iter().sum::<f64>() / errors.len() as f64
        },
        max_radial_shift,
        corners,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
