use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use query_graph::config::CliConfig;
use query_graph::{CompileConfig, Graph, SchemaCatalog, diagnostics, spec};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "query-graph")]
#[command(about = "Compile a node graph into one SQL statement", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct GraphArgs {
    /// Node document (JSON array, or an object with a "nodes" array).
    #[arg(long)]
    nodes: String,

    /// Schema catalog (JSON).
    #[arg(long)]
    catalog: String,

    /// Target database: mysql, postgresql or sqlserver.
    #[arg(long)]
    dialect: Option<String>,

    /// Id of the node whose output is requested.
    #[arg(long)]
    target: String,

    /// Override the dialect's statement strategy: inline or cte.
    #[arg(long)]
    strategy: Option<String>,

    /// Write to this file instead of stdout.
    #[arg(short = 'o', long)]
    out: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Statement returning the target's rows.
    Fetch {
        #[command(flatten)]
        graph: GraphArgs,

        /// Rows to skip (requires --limit).
        #[arg(long)]
        offset: Option<u64>,

        /// Rows per page.
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Statement returning the target's row count.
    Count {
        #[command(flatten)]
        graph: GraphArgs,
    },
    /// The target's output columns as JSON.
    Columns {
        #[command(flatten)]
        graph: GraphArgs,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Read both documents and build the graph the options describe.
fn load(
    args: &GraphArgs,
    offset: Option<u64>,
    limit: Option<u64>,
) -> Result<(Graph, CompileConfig)> {
    let config = CompileConfig::from_cli(CliConfig {
        dialect: args.dialect.clone(),
        strategy: args.strategy.clone(),
        offset,
        limit,
    })?;

    let text = std::fs::read_to_string(&args.nodes)
        .with_context(|| diagnostics::error_message(format!("reading {}", args.nodes)))?;
    let specs = spec::parse_graph_document(&text)
        .with_context(|| diagnostics::error_message(format!("parsing {}", args.nodes)))?;

    let text = std::fs::read_to_string(&args.catalog)
        .with_context(|| diagnostics::error_message(format!("reading {}", args.catalog)))?;
    let catalog: SchemaCatalog = serde_json::from_str(&text)
        .with_context(|| diagnostics::error_message(format!("parsing {}", args.catalog)))?;

    let graph = config.apply(Graph::build(specs, &catalog, config.dialect)?);
    Ok((graph, config))
}

fn emit(out: Option<&str>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, format!("{}\n", text))
                .with_context(|| diagnostics::error_message(format!("writing {}", path)))?;
            println!("Wrote {}", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (args, offset, limit) = match &cli.cmd {
        Commands::Fetch {
            graph,
            offset,
            limit,
        } => (graph, *offset, *limit),
        Commands::Count { graph } | Commands::Columns { graph } => (graph, None, None),
    };
    let (graph, config) = load(args, offset, limit)?;

    let target = graph.node(&args.target)?;
    if !target.is_configured() {
        bail!(diagnostics::error_message(format!(
            "node '{}' ({}) is not fully configured",
            target.id(),
            target.kind().type_name()
        )));
    }

    let text = match &cli.cmd {
        Commands::Fetch { .. } => graph.fetch_statement(&args.target, config.page)?,
        Commands::Count { .. } => graph.count_statement(&args.target)?,
        Commands::Columns { .. } => serde_json::to_string_pretty(&target.projection()?)?,
    };
    emit(args.out.as_deref(), &text)
}
