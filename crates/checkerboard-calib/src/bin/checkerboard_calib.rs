use checkerboard_calib::{
    calibrate_with_config, load_calibration, undistort_image, CalibrationConfig, DebugMode,
};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

/// Checkerboard camera calibration.
#[derive(Debug, Parser)]
#[command(author, version, about = "Checkerboard camera calibration")]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate from a directory of board images; writes `mtx` and `dist`.
    Calibrate {
        /// Directory with the calibration images.
        #[arg(long)]
        images: PathBuf,
        /// Inner corners per board row.
        #[arg(long)]
        cols: u32,
        /// Inner corners per board column.
        #[arg(long)]
        rows: u32,
        /// Output directory for `mtx` and `dist`.
        #[arg(long)]
        out: PathBuf,
        /// JSON CalibrationConfig; defaults are used if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write corner overlays into this directory.
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Remove lens distortion from an image.
    Undistort {
        #[arg(long)]
        mtx: PathBuf,
        #[arg(long)]
        dist: PathBuf,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = checkerboard_calib::core::verbosity_level(cli.verbose);
    #[cfg(feature = "tracing")]
    checkerboard_calib::core::init_tracing(false, level);
    #[cfg(not(feature = "tracing"))]
    checkerboard_calib::core::init_with_level(level)?;

    match cli.command {
        Command::Calibrate {
            images,
            cols,
            rows,
            out,
            config,
            debug_dir,
        } => {
            let mut config = match config {
                Some(path) => CalibrationConfig::load_json(path)?,
                None => CalibrationConfig::default(),
            };
            if let Some(dir) = debug_dir {
                config.debug = DebugMode::Print { dir };
            }

            let calib = calibrate_with_config(&images, cols, rows, &out, &config)?;
            let k = calib.camera_matrix;
            println!(
                "used {} of {} image(s), RMS reprojection error {:.4} px",
                calib.used_images.len(),
                calib.used_images.len() + calib.skipped_images.len(),
                calib.rms_error
            );
            println!(
                "fx={:.4} fy={:.4} cx={:.4} cy={:.4}",
                k[(0, 0)],
                k[(1, 1)],
                k[(0, 2)],
                k[(1, 2)]
            );
            println!("dist={:?}", calib.distortion.to_array());
            println!("wrote {}", out.display());
        }
        Command::Undistort {
            mtx,
            dist,
            image,
            out,
        } => {
            let calib = load_calibration(&mtx, &dist)?;
            let img = image::open(&image)?;
            undistort_image(&img, &calib.camera_matrix, &calib.distortion).save(&out)?;
            println!("wrote {}", out.display());
        }
    }
    Ok(())
}
