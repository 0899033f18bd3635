use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use refgraph::cli;

#[derive(Parser)]
#[command(name = "refgraph")]
#[command(author = "Refgraph Project Team")]
#[command(version = "0.1.0")]
#[command(about = "Incremental reference-graph index for source trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one indexing pass over a project
    Index {
        /// Project directory to index
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Reference mode override: structural, full
        #[arg(short, long)]
        mode: Option<String>,

        /// Recompute all references regardless of fingerprints
        #[arg(short, long)]
        force: bool,
    },

    /// Query the index
    Query {
        /// Query type: file, symbol, refs, refs-to, refs-from
        query_type: String,

        /// Target: a path, a symbol name, or <path>:<symbol>
        target: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Traverse the graph
    Graph {
        /// Graph type: deps, cycles, calls, hierarchy
        graph_type: String,

        /// Target: a path or <path>:<symbol> (unused for cycles)
        target: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Walk reverse edges (dependents, callers, subtypes)
        #[arg(short, long)]
        reverse: bool,

        /// Maximum traversal depth (defaults to config)
        #[arg(long)]
        depth: Option<usize>,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Attach a note to a file or symbol
    Annotate {
        /// File path within the project
        path: String,

        /// Annotation text
        content: String,

        /// Symbol name to annotate (file-scoped when omitted)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Symbol kind filter, e.g. function, class
        #[arg(short, long)]
        kind: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// List annotations
    Annotations {
        /// Restrict to one file
        path: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Tag an annotation with a key/value pair
    Tag {
        /// Annotation id
        id: i64,

        /// Tag key
        key: String,

        /// Tag value
        value: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Delete one annotation
    Unannotate {
        /// Annotation id
        id: i64,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Remove annotations whose target no longer exists
    Prune {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Show index statistics
    Stats {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Drop index data (annotations preserved by default)
    Clear {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Also delete annotations
        #[arg(long)]
        annotations: bool,
    },
}

fn init_logging(debug: bool, verbose: bool) {
    let level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.verbose);

    match cli.command {
        Commands::Index {
            project,
            mode,
            force,
        } => {
            cli::index::index_project(project, mode, force)?;
        }

        Commands::Query {
            query_type,
            target,
            project,
            format,
        } => {
            cli::query::query_index(query_type, target, project, format)?;
        }

        Commands::Graph {
            graph_type,
            target,
            project,
            reverse,
            depth,
            format,
        } => {
            cli::graph::graph_query(graph_type, target, project, reverse, depth, format)?;
        }

        Commands::Annotate {
            path,
            content,
            symbol,
            kind,
            project,
        } => {
            cli::annotate::add_annotation(project, path, symbol, kind, content)?;
        }

        Commands::Annotations {
            path,
            project,
            format,
        } => {
            cli::annotate::list_annotations(project, path, format)?;
        }

        Commands::Tag {
            id,
            key,
            value,
            project,
        } => {
            cli::annotate::tag_annotation(project, id, key, value)?;
        }

        Commands::Unannotate { id, project } => {
            cli::annotate::delete_annotation(project, id)?;
        }

        Commands::Prune { project } => {
            cli::annotate::prune_annotations(project)?;
        }

        Commands::Stats { project } => {
            cli::stats::show_stats(project, cli.verbose)?;
        }

        Commands::Clear {
            project,
            annotations,
        } => {
            cli::clear::clear_index(project, annotations)?;
        }
    }

    Ok(())
}
