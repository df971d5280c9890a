//! `qou build`, `qou generate` and `qou package`.

use crate::pipeline::{self, describe_staleness, Generation, Project};
use crate::{BuildArgs, GlobalArgs};

/// Runs `qou build`: regenerate if stale, then package.
pub fn run_build(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    if !global.quiet {
        eprintln!(
            "   Building {} v{}",
            project.config.project.name, project.config.project.version
        );
    }

    let outcome = pipeline::build(&project, args.force)?;
    if !global.quiet {
        report_generation(&project, &outcome.generation);
        eprintln!(
            "   Packaged {} ({} bytes, checksum {})",
            outcome.packaged.path.display(),
            outcome.packaged.size,
            outcome.packaged.checksum
        );
        eprintln!("   Finished {}", outcome.state);
    }
    Ok(0)
}

/// Runs `qou generate`: regenerate if stale, without packaging.
pub fn run_generate(
    args: &BuildArgs,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let generation = pipeline::generate(&project, args.force)?;
    if !global.quiet {
        report_generation(&project, &generation);
    }
    Ok(0)
}

/// Runs `qou package`: package the last generated output.
pub fn run_package(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let packaged = pipeline::package(&project)?;
    if !global.quiet {
        eprintln!(
            "   Packaged {} ({} bytes, checksum {})",
            packaged.path.display(),
            packaged.size,
            packaged.checksum
        );
    }
    Ok(0)
}

fn report_generation(project: &Project, generation: &Generation) {
    let name = &project.config.generate.artifact;
    match generation {
        Generation::Reused => eprintln!("      Fresh {name} (inputs unchanged)"),
        Generation::Generated { artifact, reason } => eprintln!(
            " Generated {name} [{}] ({})",
            artifact.fingerprint.short(),
            describe_staleness(reason)
        ),
    }
}
