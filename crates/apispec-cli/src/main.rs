mod frameworks;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use apispec_core::{Analysis, Diagnostics, FrameworkConfig, TypeOverrides};
use apispec_extract::pipeline::extract_module;
use apispec_graph::{CallGraphIndex, GraphExport, TrackerBuilder};
use apispec_routes::{assemble, entry_points, RouteExtractor, SchemaSynthesizer};

use frameworks::Framework;

#[derive(Parser)]
#[command(name = "apispec")]
#[command(about = "Static OpenAPI route extraction for Go HTTP services", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and emit an OpenAPI 3.1 document.
    Analyze {
        /// Root directory of the Go module to analyze.
        module_root: PathBuf,

        /// Path to a framework configuration file (TOML/YAML/JSON). Skips
        /// framework detection when supplied.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Force a bundled framework configuration instead of detecting one
        /// from `go.mod`.
        #[arg(long, value_parser = ["net/http", "gin", "chi"])]
        framework: Option<String>,

        /// Output format for the document.
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Emit the call-graph node/edge visualization data set for one entry
    /// point, bypassing route extraction entirely.
    Graph {
        /// Root directory of the Go module to analyze.
        module_root: PathBuf,

        /// Fully qualified name of the root function to build the tree from
        /// (`package.Function` or `package.Type.Method`). Defaults to every
        /// detected entry point when omitted.
        #[arg(long)]
        root: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
    Pretty,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze {
            module_root,
            config,
            framework,
            format,
        } => run_analyze(module_root, config.as_deref(), framework.as_deref(), format),
        Commands::Graph { module_root, root } => run_graph(module_root, root.as_deref()),
    }
}

fn run_analyze(
    module_root: &std::path::Path,
    config_path: Option<&std::path::Path>,
    framework_name: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let config = load_config(module_root, config_path, framework_name)?;

    let outcome = extract_module(module_root, &config.analysis).context("extracting the module's call graph")?;
    if !outcome.diagnostics.is_empty() {
        eprintln!("{}", format!("{} diagnostics during extraction:", outcome.diagnostics.len()).yellow());
        for diagnostic in &outcome.diagnostics {
            eprintln!("  {:?}: {}", diagnostic.kind, diagnostic.message);
        }
    }

    let index = CallGraphIndex::build(&outcome.store);
    let roots = entry_points(&outcome.store);
    if roots.is_empty() {
        eprintln!("{}", "no entry point found; the document will have no routes".yellow());
    }

    let diagnostics = Diagnostics::new();
    let extractor = RouteExtractor::new(&outcome.store, &index, &config).context("building the route extractor")?;
    let routes = extractor.extract(&roots, &diagnostics);

    for diagnostic in diagnostics.into_vec() {
        eprintln!("  {:?}: {}", diagnostic.kind, diagnostic.message);
    }

    let overrides: TypeOverrides = config.type_overrides.clone();
    let synth = SchemaSynthesizer::new(&outcome.store, &overrides);
    let document = assemble(&config.info, &routes, synth);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&document)?),
        OutputFormat::Pretty => {
            println!("{} {} ({})", "OpenAPI".cyan().bold(), document.openapi, document.info.title.green());
            for (path, item) in &document.paths {
                for (method, op) in [
                    ("GET", &item.get),
                    ("POST", &item.post),
                    ("PUT", &item.put),
                    ("PATCH", &item.patch),
                    ("DELETE", &item.delete),
                    ("HEAD", &item.head),
                    ("OPTIONS", &item.options),
                    ("TRACE", &item.trace),
                ] {
                    if let Some(op) = op {
                        println!("  {:<7} {:<30} {}", method.yellow(), path, op.operation_id);
                    }
                }
            }
        }
    }

    Ok(())
}

fn run_graph(module_root: &std::path::Path, root: Option<&str>) -> Result<()> {
    let analysis = Analysis::default();
    let outcome = extract_module(module_root, &analysis).context("extracting the module's call graph")?;
    let index = CallGraphIndex::build(&outcome.store);

    let roots: Vec<_> = match root {
        Some(name) => outcome
            .store
            .functions()
            .filter(|(_, f)| f.qualified_name(&outcome.store.pool, &outcome.store.types) == name)
            .map(|(id, _)| id)
            .collect(),
        None => entry_points(&outcome.store),
    };

    if roots.is_empty() {
        anyhow::bail!("no matching root function found");
    }

    let limits = apispec_core::Limits::default();
    let export = roots
        .into_iter()
        .map(|root| {
            let tree = TrackerBuilder::new(&outcome.store, &index, limits).build(root);
            GraphExport::from_tree(&tree, &outcome.store)
        })
        .fold(GraphExport::default(), |mut acc, next| {
            acc.nodes.extend(next.nodes);
            acc.edges.extend(next.edges);
            acc
        });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

/// Resolves the effective `FrameworkConfig` for a run: an explicit
/// `--config` file wins, then an explicit `--framework` name, then
/// `go.mod`-based detection.
fn load_config(
    module_root: &std::path::Path,
    config_path: Option<&std::path::Path>,
    framework_name: Option<&str>,
) -> Result<FrameworkConfig> {
    if let Some(path) = config_path {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        return settings
            .try_deserialize()
            .with_context(|| format!("parsing configuration from {}", path.display()));
    }

    let framework = match framework_name {
        Some(name) => Framework::parse(name).with_context(|| format!("unknown framework '{name}'"))?,
        None => frameworks::detect(module_root),
    };
    Ok(framework.config())
}
