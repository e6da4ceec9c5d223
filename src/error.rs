use std::path::PathBuf;

use lumen_impl::implementation::SceneError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("failed to read options file {path}: {source}")]
    OptionsIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse options file: {0}")]
    OptionsParse(#[from] toml::de::Error),

    #[error("a scene has already been described for this renderer")]
    SceneAlreadyDescribed,

    #[error("no scene has been described; describe a scene before rendering")]
    SceneNotDescribed,

    #[error("scene file parsing is not implemented; pass \"-\" for the demo scene (got {0})")]
    SceneParsing(String),

    #[error("scene was mutated after accelerator construction; re-run init_accelerator")]
    StaleAccelerator,

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("render workers terminated before the frame completed")]
    WorkersDied,

    #[error("failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        source: image::ImageError,
    },
}
