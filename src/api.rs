use std::path::PathBuf;
use std::sync::Arc;

use cancellation::CancellationTokenSource;
use lumen_impl::implementation::Scene;

use crate::demo::create_demo_scene;
use crate::error::CliError;
use crate::options::Options;
use crate::render::{ run_render_job, RenderReport };

pub enum SceneSource {
    /// The built-in demo scene ("-")
    Demo,
    /// An external scene description; parsing is a collaborator this binary
    /// does not carry, so this currently always fails
    File(PathBuf),
}

/// The operator-facing lifecycle, carried by a value rather than process
/// globals. Construction validates options; describing a scene finalizes it
/// behind its accelerator; rendering consumes the renderer, so a completed
/// job cannot be reused by accident.
///
/// Lifecycle: new (options) -> describe_scene (scene) -> render (rendering).
pub struct Renderer {
    options: Options,
    scene: Option<Arc<Scene>>,
}

impl Renderer {
    pub fn new(options: Options) -> Result<Renderer, CliError> {
        options.validate()?;
        Ok(Renderer { options, scene: None })
    }

    pub fn describe_scene(&mut self, source: &SceneSource) -> Result<(), CliError> {
        if self.scene.is_some() {
            return Err(CliError::SceneAlreadyDescribed);
        }

        let mut scene = match source {
            SceneSource::Demo => create_demo_scene(&self.options)?,
            SceneSource::File(path) => {
                return Err(CliError::SceneParsing(path.display().to_string()));
            }
        };

        scene.init_accelerator(self.options.accelerator.into())?;
        self.scene = Some(Arc::new(scene));
        Ok(())
    }

    /// Runs the render job to completion (or cancellation) and consumes the
    /// renderer. The returned report carries the film and the degeneracy
    /// counts; encoding is the caller's concern.
    pub fn render(self) -> Result<RenderReport, CliError> {
        self.render_with_cancellation(&CancellationTokenSource::new())
    }

    /// As `render`, with an external cancellation source. Cancellation is
    /// checked between tiles; a cancelled render reports a partial film.
    pub fn render_with_cancellation(self, cts: &CancellationTokenSource) -> Result<RenderReport, CliError> {
        let scene = self.scene.ok_or(CliError::SceneNotDescribed)?;
        if scene.is_dirty() {
            return Err(CliError::StaleAccelerator);
        }
        run_render_job(scene, &self.options, cts)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::{ AcceleratorOption, IntegratorOption };

    fn small_options() -> Options {
        Options {
            output_width: 16,
            output_height: 16,
            samples_per_pixel: 1,
            max_bounces: 2,
            worker_count: 1,
            integrator: IntegratorOption::Whitted,
            ..Options::default()
        }
    }

    #[test]
    fn render_before_scene_description_is_an_error() {
        let renderer = Renderer::new(small_options()).unwrap();
        assert!(matches!(renderer.render(), Err(CliError::SceneNotDescribed)));
    }

    #[test]
    fn scene_cannot_be_described_twice() {
        let mut renderer = Renderer::new(small_options()).unwrap();
        renderer.describe_scene(&SceneSource::Demo).unwrap();
        let result = renderer.describe_scene(&SceneSource::Demo);
        assert!(matches!(result, Err(CliError::SceneAlreadyDescribed)));
    }

    #[test]
    fn scene_files_are_not_parsed() {
        let mut renderer = Renderer::new(small_options()).unwrap();
        let result = renderer.describe_scene(&SceneSource::File(PathBuf::from("scene.toml")));
        assert!(matches!(result, Err(CliError::SceneParsing(_))));
    }

    #[test]
    fn invalid_options_are_rejected_at_construction() {
        let options = Options { output_width: 0, ..small_options() };
        assert!(matches!(Renderer::new(options), Err(CliError::InvalidOption(_))));
    }

    #[test]
    fn kdtree_accelerator_fails_scene_description() {
        let options = Options { accelerator: AcceleratorOption::Kdtree, ..small_options() };
        let mut renderer = Renderer::new(options).unwrap();
        let result = renderer.describe_scene(&SceneSource::Demo);
        assert!(matches!(result, Err(CliError::Scene(_))));
    }

    #[test]
    fn demo_scene_renders_to_a_fully_sampled_film() {
        let mut renderer = Renderer::new(small_options()).unwrap();
        renderer.describe_scene(&SceneSource::Demo).unwrap();
        let report = renderer.render().unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.film.width(), 16);
        assert_eq!(report.film.height(), 16);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(report.film.sample_count(x, y), 1);
            }
        }
    }
}
