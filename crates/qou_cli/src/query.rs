//! `qou lookup`, `qou suggest` and `qou explain`.

use qou_service::{FacetedMatches, LookupError, Match};

use crate::pipeline::Project;
use crate::{GlobalArgs, LookupArgs, ReportFormat, EXIT_DEGRADED};

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Maps a lookup failure to an exit code, printing it.
fn report_error(e: &LookupError) -> i32 {
    eprintln!("error[{}]: {e}", e.kind());
    match e {
        LookupError::ArtifactUnavailable { .. } => EXIT_DEGRADED,
        LookupError::Index(_) => 1,
    }
}

/// Runs `qou lookup`.
pub fn run_lookup(args: &LookupArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let rt = runtime()?;
    rt.block_on(async {
        let service = project.service()?;
        let output = if args.faceted {
            match service.lookup_faceted(&args.term).await {
                Ok(result) => render_faceted(&result, args.format)?,
                Err(e) => return Ok(report_error(&e)),
            }
        } else {
            match service.lookup(&args.term).await {
                Ok(matches) => render_matches(&matches, args.format)?,
                Err(e) => return Ok(report_error(&e)),
            }
        };
        print!("{output}");
        Ok::<i32, Box<dyn std::error::Error>>(0)
    })
}

/// Runs `qou suggest`.
pub fn run_suggest(prefix: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let rt = runtime()?;
    rt.block_on(async {
        let service = project.service()?;
        let code = match service.suggest(prefix).await {
            Ok(suggestions) => {
                for s in suggestions {
                    println!("{s}");
                }
                0
            }
            Err(e) => report_error(&e),
        };
        Ok::<i32, Box<dyn std::error::Error>>(code)
    })
}

/// Runs `qou explain`.
pub fn run_explain(term: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let service = project.service()?;
    match service.explain(term) {
        Ok(explanation) => {
            println!("{}", serde_json::to_string_pretty(&explanation)?);
            Ok(0)
        }
        Err(e) => Ok(report_error(&e)),
    }
}

fn render_matches(
    matches: &[Match],
    format: ReportFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ReportFormat::Json => format!("{}\n", serde_json::to_string_pretty(matches)?),
        ReportFormat::Text => matches
            .iter()
            .map(|m| format!("{:>8.3}  {:<20}  {}\n", m.score, m.id, m.name))
            .collect(),
    })
}

fn render_faceted(
    result: &FacetedMatches,
    format: ReportFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    if format == ReportFormat::Json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(result)?));
    }
    let mut out = String::new();
    if let Some(ref suggestion) = result.did_you_mean {
        out.push_str(&format!("Did you mean: {suggestion}\n"));
    }
    out.push_str(&render_matches(&result.matches, format)?);
    for facet in &result.facets {
        out.push_str(&format!("{}:\n", facet.name));
        for v in &facet.values {
            out.push_str(&format!("  {} ({})\n", v.value, v.count));
        }
    }
    Ok(out)
}
