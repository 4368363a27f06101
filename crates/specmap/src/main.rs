//! specmap - Measure how much of a specification its work items cover
//!
//! specmap loads component snapshots (mappings of requirements, tests,
//! justifications, and documents onto sections of a specification) and
//! reports section coverage, waterfall coverage, and change histories.

use eyre::{Result, WrapErr};
use figue as args;
use owo_colors::OwoColorize;
use specmap::data;
use specmap::output::{OutputFormat, render_coverage, render_history, render_waterfall};
use specmap::{CONFIG_PATH, find_project_root, load_config};
use std::path::PathBuf;

/// CLI arguments
#[derive(Debug, facet::Facet)]
struct Args {
    /// Subcommand to run (default: coverage)
    #[facet(args::subcommand)]
    command: Option<Command>,

    /// Path to config file (default: .config/specmap/config.yaml)
    #[facet(args::named, args::short = 'c', default)]
    config: Option<PathBuf>,

    /// Only check, don't print detailed report (exit 1 if failing)
    #[facet(args::named, default)]
    check: bool,

    /// Minimum coverage percentage to pass (default: 0)
    #[facet(args::named, default)]
    threshold: Option<f64>,

    /// Show verbose output including uncovered sections
    #[facet(args::named, args::short = 'v', default)]
    verbose: bool,

    /// Output format: text, json, markdown
    #[facet(args::named, args::short = 'f', default)]
    format: Option<String>,
}

/// Subcommands
#[derive(Debug, facet::Facet)]
#[repr(u8)]
enum Command {
    /// Report section coverage of every configured component
    Coverage,

    /// Show a mapping's waterfall coverage and how it was derived
    Waterfall {
        /// Component name from the config
        #[facet(args::positional)]
        component: String,

        /// Mapping id
        #[facet(args::positional)]
        mapping: u64,
    },

    /// Show the reconciled change history of a mapping and its work item
    History {
        /// Component name from the config
        #[facet(args::positional)]
        component: String,

        /// Mapping id
        #[facet(args::positional)]
        mapping: u64,
    },
}

fn main() -> Result<()> {
    let args: Args = figue::from_std_args().into_result().map(|o| o.value).wrap_err("Failed to parse command line arguments")?;

    init_tracing(args.verbose)?;

    let format = match args.format.as_deref() {
        Some(f) => OutputFormat::from_str(f).ok_or_else(|| {
            eyre::eyre!("Unknown output format '{}' (expected text, json, markdown)", f)
        })?,
        None => OutputFormat::default(),
    };

    let project_root = find_project_root()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_root.join(CONFIG_PATH));
    let config = load_config(&config_path)?;

    // Relative paths in the config resolve against its directory
    let config_dir = config_path
        .parent()
        .ok_or_else(|| eyre::eyre!("Config path has no parent directory"))?;

    match args.command {
        Some(Command::Waterfall { component, mapping }) => {
            let loaded = data::load_component(config_dir, &config, &component)?;
            let waterfall = data::build_waterfall_data(&loaded, mapping)?;
            print!("{}", render_waterfall(&waterfall, format)?);
            Ok(())
        }
        Some(Command::History { component, mapping }) => {
            let loaded = data::load_component(config_dir, &config, &component)?;
            let options = config.history.reconcile_options();
            let history = data::build_history_data(&loaded, mapping, &options)?;
            print!("{}", render_history(&history, format)?);
            Ok(())
        }
        Some(Command::Coverage) | None => {
            let threshold = args.threshold.unwrap_or(0.0);
            let coverage = data::build_coverage_data(config_dir, &config, threshold);

            if !args.check {
                print!("{}", render_coverage(&coverage, format, args.verbose)?);
            }

            let failing: Vec<_> = coverage.components.iter().filter(|c| !c.passing).collect();
            for component in &failing {
                eprintln!(
                    "{} {} is below its threshold ({:.1}% < {:.1}%)",
                    "!".red().bold(),
                    component.name.cyan(),
                    component.coverage,
                    component.threshold
                );
            }

            if args.check && !failing.is_empty() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Log to stderr, filtered by `SPECMAP_LOG` (default: warn, or debug with --verbose)
fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("SPECMAP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {e}"))
}
