//! qou CLI: builds the pattern artifact and runs query understanding against
//! the search index.
//!
//! `qou build` regenerates the artifact when its inputs changed and packages
//! it; `qou generate` and `qou package` run those stages alone. `qou lookup`,
//! `qou suggest` and `qou explain` query through the service, and `qou seed`
//! loads the catalog into the index.

#![warn(missing_docs)]

mod build;
mod pipeline;
mod query;
mod seed;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// qou: query understanding for grocery search.
#[derive(Parser, Debug)]
#[command(name = "qou", version, about = "Query understanding pipeline")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `qou.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Format of log records written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regenerate the artifact if stale, then package it.
    Build(BuildArgs),
    /// Regenerate the artifact if stale, without packaging.
    Generate(BuildArgs),
    /// Package the last generated output.
    Package,
    /// Search the products index for a term.
    Lookup(LookupArgs),
    /// Complete a prefix from the suggestions index.
    Suggest {
        /// The prefix to complete.
        prefix: String,
    },
    /// Show how a term is understood, without searching.
    Explain {
        /// The search term.
        term: String,
    },
    /// Load the products and aisles CSVs into the index.
    Seed,
}

/// Arguments for `qou build` and `qou generate`.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Regenerate even if the inputs are unchanged.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for `qou lookup`.
#[derive(Parser, Debug)]
pub struct LookupArgs {
    /// The search term.
    pub term: String,

    /// Include facets and a spelling suggestion.
    #[arg(long)]
    pub faceted: bool,

    /// Output format for results.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Log record format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per record.
    Json,
}

/// Result output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

/// Exit code when lookups fail because the artifact is unavailable.
pub const EXIT_DEGRADED: i32 = 2;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose, cli.log_format);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Build(ref args) => build::run_build(args, &global),
        Command::Generate(ref args) => build::run_generate(args, &global),
        Command::Package => build::run_package(&global),
        Command::Lookup(ref args) => query::run_lookup(args, &global),
        Command::Suggest { ref prefix } => query::run_suggest(prefix, &global),
        Command::Explain { ref term } => query::run_explain(term, &global),
        Command::Seed => seed::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Crates whose records pass the default filter.
const LOG_TARGETS: &[&str] = &[
    "qou_cache",
    "qou_generate",
    "qou_resource",
    "qou_index",
    "qou_service",
    "qou_cli",
];

/// Default filter when `RUST_LOG` is unset: qou crates at info (debug with
/// `--verbose`), everything else at warn. `--quiet` shows errors only.
fn default_filter(quiet: bool, verbose: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    let level = if verbose { "debug" } else { "info" };
    std::iter::once("warn".to_string())
        .chain(LOG_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_logging(quiet: bool, verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(quiet, verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(verbose).init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["qou", "build"]);
        match cli.command {
            Command::Build(ref args) => assert!(!args.force),
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_force() {
        let cli = Cli::parse_from(["qou", "build", "--force"]);
        match cli.command {
            Command::Build(ref args) => assert!(args.force),
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_generate_short_force() {
        let cli = Cli::parse_from(["qou", "generate", "-f"]);
        assert!(matches!(cli.command, Command::Generate(BuildArgs { force: true })));
    }

    #[test]
    fn parse_package() {
        let cli = Cli::parse_from(["qou", "package"]);
        assert!(matches!(cli.command, Command::Package));
    }

    #[test]
    fn parse_lookup_default() {
        let cli = Cli::parse_from(["qou", "lookup", "greek yogurt"]);
        match cli.command {
            Command::Lookup(ref args) => {
                assert_eq!(args.term, "greek yogurt");
                assert!(!args.faceted);
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Lookup command"),
        }
    }

    #[test]
    fn parse_lookup_with_args() {
        let cli = Cli::parse_from(["qou", "lookup", "fage", "--faceted", "--format", "json"]);
        match cli.command {
            Command::Lookup(ref args) => {
                assert!(args.faceted);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Lookup command"),
        }
    }

    #[test]
    fn parse_suggest_and_explain() {
        let cli = Cli::parse_from(["qou", "suggest", "gre"]);
        assert!(matches!(cli.command, Command::Suggest { ref prefix } if prefix == "gre"));
        let cli = Cli::parse_from(["qou", "explain", "organic milk"]);
        assert!(matches!(cli.command, Command::Explain { ref term } if term == "organic milk"));
    }

    #[test]
    fn parse_seed() {
        let cli = Cli::parse_from(["qou", "seed"]);
        assert!(matches!(cli.command, Command::Seed));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["qou", "--quiet", "--log-format", "json", "build"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["qou", "--config", "/srv/qou/qou.toml", "seed"]);
        assert_eq!(cli.config.as_deref(), Some("/srv/qou/qou.toml"));
    }

    #[test]
    fn parse_global_flag_after_subcommand() {
        let cli = Cli::parse_from(["qou", "lookup", "milk", "--verbose"]);
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn filter_follows_verbosity() {
        assert_eq!(default_filter(true, true), "error");
        assert!(default_filter(false, true).contains("qou_index=debug"));
        let normal = default_filter(false, false);
        assert!(normal.starts_with("warn,"));
        assert!(normal.contains("qou_service=info"));
        assert!(EnvFilter::try_new(normal).is_ok());
    }
}
