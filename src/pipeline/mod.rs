//! Whole-graph runs
//!
//! `Driver` resolves the dependency graph and walks it leaf-first, building
//! and deploying each project against its own cache. Named pipelines are flag
//! presets layered onto `RunOptions`; a project may redefine the built-in
//! `build`, `deploy` and `dev` presets under `[pipelines.<name>]`.

mod driver;
#[cfg(test)]
pub mod testing;

pub use driver::{Driver, NodeOutcome, NodeReport, RunOptions, RunReport};

use crate::config::{PipelineConfig, ProjectConfig};
use crate::error::{SkiffError, SkiffResult};

/// Pipelines every project has without declaring them
pub const BUILTIN_PIPELINES: [&str; 3] = ["build", "deploy", "dev"];

fn builtin(name: &str) -> Option<PipelineConfig> {
    match name {
        "build" => Some(PipelineConfig {
            deploy: false,
            ..Default::default()
        }),
        "deploy" | "dev" => Some(PipelineConfig::default()),
        _ => None,
    }
}

/// The pipeline `name` as the project defines it, else the built-in preset
pub fn pipeline_for(config: &ProjectConfig, name: &str) -> SkiffResult<PipelineConfig> {
    config
        .pipelines
        .get(name)
        .cloned()
        .or_else(|| builtin(name))
        .ok_or_else(|| SkiffError::PipelineNotFound(name.to_string()))
}

impl RunOptions {
    /// Layer a pipeline's flags over these options; flags only ever turn on
    pub fn apply_pipeline(&mut self, pipeline: &PipelineConfig) {
        self.skip_build |= !pipeline.build;
        self.skip_deploy |= !pipeline.deploy;
        self.build.force |= pipeline.force_build;
        self.deploy.force |= pipeline.force_deploy;
        self.force_dependencies |= pipeline.force_dependencies;
        self.allow_cyclic |= pipeline.allow_cyclic;
        self.skip_dependencies |= pipeline.skip_dependencies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_presets() {
        let config = ProjectConfig::default();
        assert!(!pipeline_for(&config, "build").unwrap().deploy);
        assert!(pipeline_for(&config, "deploy").unwrap().deploy);
        assert!(pipeline_for(&config, "dev").unwrap().build);
    }

    #[test]
    fn project_pipeline_overrides_builtin() {
        let config: ProjectConfig = toml::from_str(
            "[pipelines.deploy]\nbuild = false\n\n[pipelines.release]\nforce_build = true\n",
        )
        .unwrap();

        assert!(!pipeline_for(&config, "deploy").unwrap().build);
        assert!(pipeline_for(&config, "release").unwrap().force_build);
        assert!(matches!(
            pipeline_for(&config, "nightly"),
            Err(SkiffError::PipelineNotFound(ref name)) if name == "nightly"
        ));
    }

    #[test]
    fn pipeline_flags_layer_onto_options() {
        let mut options = RunOptions {
            skip_deploy: true,
            ..Default::default()
        };
        options.apply_pipeline(&PipelineConfig {
            force_build: true,
            allow_cyclic: true,
            ..Default::default()
        });

        assert!(options.skip_deploy);
        assert!(!options.skip_build);
        assert!(options.build.force);
        assert!(!options.deploy.force);
        assert!(options.allow_cyclic);
    }
}
