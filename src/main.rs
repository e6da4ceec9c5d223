mod api;
mod demo;
mod error;
mod logger;
mod options;
mod render;

use std::path::{ Path, PathBuf };
use std::process::ExitCode;

use clap::{ Parser, Subcommand };
use log::{ error, info, warn };

use lumen_impl::film::Film;

use crate::api::{ Renderer, SceneSource };
use crate::error::CliError;
use crate::options::Options;

#[derive(Parser)]
#[command(name = "lumen", about = "Physically based offline ray tracer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a scene to an image
    Render {
        /// TOML options file; defaults apply when omitted
        #[arg(long, value_name = "FILE")]
        options_file: Option<PathBuf>,

        /// Scene description; "-" selects the built-in demo scene
        #[arg(long, default_value = "-")]
        scene: String,

        /// Output image path, overriding the options file
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    if logger::init().is_err() {
        eprintln!("failed to install logger");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Render { options_file, scene, output } => run_render(options_file, &scene, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_render(options_file: Option<PathBuf>, scene: &str, output: Option<PathBuf>) -> Result<(), CliError> {
    let mut options = match options_file {
        Some(path) => Options::load_from_file(&path)?,
        None => Options::default(),
    };
    if let Some(path) = output {
        options.output_path = path;
    }
    let output_path = options.output_path.clone();

    let source = if scene == "-" {
        SceneSource::Demo
    } else {
        SceneSource::File(PathBuf::from(scene))
    };

    let mut renderer = Renderer::new(options)?;
    renderer.describe_scene(&source)?;
    let report = renderer.render()?;

    if report.cancelled {
        warn!("render was cancelled; writing the partial film");
    }
    if report.degenerate_samples > 0 {
        warn!("{} degenerate samples contributed nothing", report.degenerate_samples);
    }

    write_image(&report.film, &output_path)?;
    info!("wrote {}", output_path.display());
    Ok(())
}

/// Encodes the linear film with sqrt gamma into an 8-bit PNG
fn write_image(film: &Film, path: &Path) -> Result<(), CliError> {
    let mut image = image::RgbImage::new(film.width() as u32, film.height() as u32);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let color = film.pixel(x as usize, y as usize);
        *pixel = image::Rgb([
            to_gamma_byte(color.0),
            to_gamma_byte(color.1),
            to_gamma_byte(color.2),
        ]);
    }
    image.save(path).map_err(|source| CliError::ImageWrite { path: path.to_path_buf(), source })
}

fn to_gamma_byte(value: f32) -> u8 {
    (255.0 * value.max(0.0).sqrt().min(1.0)) as u8
}
