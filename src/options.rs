use std::path::{ Path, PathBuf };

use lumen_impl::implementation::AcceleratorKind;
use lumen_impl::integrator::{ IntegratorKind, RenderSettings };

use crate::error::CliError;

/// The full enumerated option set. Loaded from a TOML options file; unknown
/// keys and unknown enum values are configuration errors, not warnings.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Options {
    pub output_width: usize,
    pub output_height: usize,
    pub samples_per_pixel: u32,
    pub max_bounces: u32,
    pub accelerator: AcceleratorOption,
    pub integrator: IntegratorOption,
    /// 0 selects one worker per available core
    pub worker_count: usize,
    pub tile_size: usize,
    pub output_path: PathBuf,
    pub rng_seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            output_width: 640,
            output_height: 360,
            samples_per_pixel: 16,
            max_bounces: 8,
            accelerator: AcceleratorOption::Bvh,
            integrator: IntegratorOption::Path,
            worker_count: 0,
            tile_size: 16,
            output_path: PathBuf::from("render.png"),
            rng_seed: 12345,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorOption {
    Bvh,
    Kdtree,
}

impl From<AcceleratorOption> for AcceleratorKind {
    fn from(option: AcceleratorOption) -> AcceleratorKind {
        match option {
            AcceleratorOption::Bvh => AcceleratorKind::Bvh,
            AcceleratorOption::Kdtree => AcceleratorKind::KdTree,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorOption {
    Whitted,
    Path,
}

impl From<IntegratorOption> for IntegratorKind {
    fn from(option: IntegratorOption) -> IntegratorKind {
        match option {
            IntegratorOption::Whitted => IntegratorKind::Whitted,
            IntegratorOption::Path => IntegratorKind::Path,
        }
    }
}

impl Options {
    pub fn load_from_file(path: &Path) -> Result<Options, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| CliError::OptionsIo { path: path.to_path_buf(), source })?;
        let options: Options = toml::from_str(&text)?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(CliError::InvalidOption("output dimensions must be non-zero".into()));
        }
        if self.samples_per_pixel == 0 {
            return Err(CliError::InvalidOption("samples_per_pixel must be non-zero".into()));
        }
        if self.max_bounces == 0 {
            return Err(CliError::InvalidOption("max_bounces must be non-zero".into()));
        }
        if self.tile_size == 0 {
            return Err(CliError::InvalidOption("tile_size must be non-zero".into()));
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            samples_per_pixel: self.samples_per_pixel,
            max_bounces: self.max_bounces,
            integrator: self.integrator.into(),
        }
    }

    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            n => n,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.output_width as f32 / self.output_height as f32
    }
}
