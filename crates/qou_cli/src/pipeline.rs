//! Shared pipeline helpers for CLI commands.
//!
//! Project root resolution, configuration loading, and the build stages
//! (cache guard, generation, packaging) that `build`, `generate` and
//! `package` compose.

use std::path::{Path, PathBuf};

use qou_cache::{CacheGuard, Staleness};
use qou_common::Artifact;
use qou_config::{ProjectConfig, CONFIG_FILE};
use qou_generate::{ArtifactGenerator, ProcessTransform};
use qou_index::SearchIndexClient;
use qou_resource::{PackagedResource, ResourcePackager};
use qou_service::{Lifecycle, SearchService, ServiceSettings, ServiceState};

use crate::GlobalArgs;

/// Version stamped into generation records and packaged resources.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Walks up from `start` looking for the nearest directory containing `qou.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `qou.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// A loaded project: its root directory and configuration.
pub struct Project {
    /// Directory containing `qou.toml`.
    pub root: PathBuf,
    /// Parsed configuration with environment overrides applied.
    pub config: ProjectConfig,
}

impl Project {
    /// Locates and loads the project selected by the global args.
    pub fn load(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let root = resolve_project_root(global)?;
        let config = qou_config::load_config(&root)?;
        Ok(Self { root, config })
    }

    /// Resolves a configured path against the project root.
    pub fn path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Declared generator inputs, in fingerprint order.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.config
            .generate
            .inputs
            .iter()
            .map(|p| self.path(p))
            .collect()
    }

    /// Declared generator output.
    pub fn output(&self) -> PathBuf {
        self.path(&self.config.generate.output)
    }

    /// Resource directory holding the packaged artifact.
    pub fn resource_dir(&self) -> PathBuf {
        self.path(&self.config.package.resource_dir)
    }

    /// The cache guard over this project's generation manifest.
    pub fn guard(&self) -> CacheGuard {
        CacheGuard::load_or_create(&self.path(&self.config.cache_dir), TOOL_VERSION)
    }

    /// The packager writing this project's resource.
    pub fn packager(&self) -> ResourcePackager {
        ResourcePackager::new(&self.resource_dir(), &self.config.package.name, TOOL_VERSION)
    }

    /// The generator running the configured command in the project root.
    pub fn generator(&self) -> ArtifactGenerator<ProcessTransform> {
        let generate = &self.config.generate;
        let transform = ProcessTransform::new(generate.command.clone(), &self.root)
            .with_setup(generate.setup.clone());
        ArtifactGenerator::new(transform, &generate.artifact, &self.output(), TOOL_VERSION)
    }

    /// Connects to the index and starts the service over the packaged artifact.
    pub fn service(&self) -> Result<SearchService, Box<dyn std::error::Error>> {
        let client = SearchIndexClient::connect(&self.config)?;
        Ok(SearchService::start(
            client,
            ServiceSettings::from_config(&self.config.index),
            &self.resource_dir(),
            &self.config.package.name,
        ))
    }
}

/// What the generation stage did.
#[derive(Debug)]
pub enum Generation {
    /// Inputs unchanged; the existing output is reused.
    Reused,
    /// The external tool ran and produced a new artifact.
    Generated {
        /// The new artifact.
        artifact: Artifact,
        /// Why regeneration was needed.
        reason: Staleness,
    },
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Whether the artifact was regenerated.
    pub generation: Generation,
    /// The packaged resource.
    pub packaged: PackagedResource,
    /// Lifecycle state reached.
    pub state: ServiceState,
}

/// Runs the generator if the guard reports stale inputs (or `force`).
///
/// Records nothing; callers record the artifact once their later stages
/// succeed, so a failure leaves it stale.
fn generate_stage(
    project: &Project,
    guard: &CacheGuard,
    lifecycle: &mut Lifecycle,
    force: bool,
) -> Result<Generation, Box<dyn std::error::Error>> {
    let name = &project.config.generate.artifact;
    let inputs = project.inputs();
    let staleness = guard.assess_output(name, &inputs, &project.output());
    if !force && !staleness.is_stale() {
        return Ok(Generation::Reused);
    }

    lifecycle.advance(ServiceState::Generating)?;
    let artifact = project.generator().generate(&inputs)?;
    Ok(Generation::Generated {
        artifact,
        reason: staleness,
    })
}

/// Regenerates the artifact if stale and records it, without packaging.
pub fn generate(project: &Project, force: bool) -> Result<Generation, Box<dyn std::error::Error>> {
    let mut guard = project.guard();
    let mut lifecycle = Lifecycle::new();
    let generation = generate_stage(project, &guard, &mut lifecycle, force)?;
    if let Generation::Generated { ref artifact, .. } = generation {
        guard.record(artifact);
        guard.save()?;
    }
    Ok(generation)
}

/// Packages the last recorded output without running the generator.
pub fn package(project: &Project) -> Result<PackagedResource, Box<dyn std::error::Error>> {
    let guard = project.guard();
    let name = &project.config.generate.artifact;
    let record = guard
        .previous_record(name)
        .ok_or_else(|| format!("no generation recorded for '{name}'; run `qou generate` first"))?;
    Ok(project.packager().package_output(
        &project.output(),
        name,
        record.fingerprint,
        record.output_checksum,
    )?)
}

/// Guard, generate if stale, package, then record the generation.
pub fn build(project: &Project, force: bool) -> Result<BuildOutcome, Box<dyn std::error::Error>> {
    let mut guard = project.guard();
    let mut lifecycle = Lifecycle::new();
    let generation = generate_stage(project, &guard, &mut lifecycle, force)?;

    let packaged = match generation {
        Generation::Generated { ref artifact, .. } => {
            let packaged = project.packager().package(artifact)?;
            guard.record(artifact);
            guard.save()?;
            packaged
        }
        Generation::Reused => {
            let name = &project.config.generate.artifact;
            let record = guard
                .previous_record(name)
                .ok_or_else(|| format!("no generation recorded for '{name}'"))?;
            project.packager().package_output(
                &project.output(),
                name,
                record.fingerprint,
                record.output_checksum,
            )?
        }
    };
    lifecycle.advance(ServiceState::Packaged)?;

    Ok(BuildOutcome {
        generation,
        packaged,
        state: lifecycle.state().clone(),
    })
}

/// One-line description of why an artifact is stale.
pub fn describe_staleness(staleness: &Staleness) -> String {
    match staleness {
        Staleness::Fresh => "forced".to_string(),
        Staleness::NoRecord => "no previous generation".to_string(),
        Staleness::MissingInput(path) => format!("input {} unreadable", path.display()),
        Staleness::FingerprintChanged { previous, current } => {
            format!("inputs changed ({} -> {})", previous.short(), current.short())
        }
        Staleness::OutputModified(path) => {
            format!("{} changed since last generation", path.display())
        }
    }
}
