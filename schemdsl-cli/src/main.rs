//! schemdsl CLI - render schematic exports as LLM-friendly DSL from the command line.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use schemdsl::{
    discover_schematic_sources, DynLibrarian, OpenOptions, SchematicCore, SchematicError,
    SchematicStats, SourceFormat,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "schemdsl")]
#[command(about = "Schematic navigation and DSL rendering for Altium and KiCad exports", long_about = None)]
#[command(version)]
struct Cli {
    /// Source format (auto picks by file extension)
    #[arg(long, global = true, value_enum, default_value = "auto")]
    source_format: SourceFormatArg,

    /// Page name for components on the KiCad root sheet
    #[arg(long, global = true, default_value = "Root")]
    root_page: String,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page list and inter-page signals
    Index {
        /// Schematic export (.json, .net) or KiCad project (directory or .kicad_pro)
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
    },

    /// DSL for one page
    Page {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Page name as listed by `index` or `pages`
        #[arg(value_name = "PAGE")]
        page: String,
    },

    /// Context bubble around components or a net
    Context {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Reference designators to center the bubble on
        #[arg(value_name = "REFDES", required_unless_present = "net")]
        refdes: Vec<String>,

        /// Center the bubble on every component of this net instead
        #[arg(long, conflicts_with = "refdes")]
        net: Option<String>,
    },

    /// List page names
    Pages {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
    },

    /// Print one component as JSON
    Component {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        #[arg(value_name = "REFDES")]
        refdes: String,
    },

    /// Print one net as JSON
    Net {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Component, net and page counts
    Stats {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,
    },

    /// List schematic sources found under a directory
    Sources {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceFormatArg {
    Auto,
    AltiumJson,
    KicadNetlist,
    KicadProject,
}

impl SourceFormatArg {
    fn resolve(self) -> Option<SourceFormat> {
        match self {
            SourceFormatArg::Auto => None,
            SourceFormatArg::AltiumJson => Some(SourceFormat::AltiumJson),
            SourceFormatArg::KicadNetlist => Some(SourceFormat::KicadNetlist),
            SourceFormatArg::KicadProject => Some(SourceFormat::KicadProject),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = OpenOptions {
        format: cli.source_format.resolve(),
        root_page: cli.root_page.clone(),
    };

    let exit_code = match run(cli.command, &options) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}

/// Logs go to stderr so stdout carries only the rendered output.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open(source: &Path, options: &OpenOptions) -> Result<DynLibrarian, SchematicError> {
    SchematicCore::open(source, options)
}

fn run(command: Commands, options: &OpenOptions) -> Result<(), SchematicError> {
    match command {
        Commands::Index { source } => {
            let text = open(&source, options)?.index()?;
            print_text(&text);
        }
        Commands::Page { source, page } => {
            let text = open(&source, options)?.page(&page)?;
            print_text(&text);
        }
        Commands::Context { source, refdes, net } => {
            let mut librarian = open(&source, options)?;
            let text = match net {
                Some(name) => librarian.net_context(&name)?,
                None => librarian.context(refdes.as_slice())?,
            };
            print_text(&text);
        }
        Commands::Pages { source } => {
            for page in open(&source, options)?.pages()? {
                println!("{}", page);
            }
        }
        Commands::Component { source, refdes } => {
            let mut librarian = open(&source, options)?;
            let component = librarian
                .component(&refdes)?
                .ok_or_else(|| SchematicError::Other(format!("Component {} not found", refdes)))?;
            print_json(component)?;
        }
        Commands::Net { source, name } => {
            let mut librarian = open(&source, options)?;
            let net = librarian
                .net(&name)?
                .ok_or_else(|| SchematicError::Other(format!("Net {} not found", name)))?;
            print_json(net)?;
        }
        Commands::Stats { source, output } => {
            let stats = open(&source, options)?.stats()?;
            match output {
                OutputFormat::Human => output_stats_human(&source, &stats),
                OutputFormat::Json => print_json(&stats)?,
            }
        }
        Commands::Sources { dir } => {
            for path in discover_schematic_sources(&dir)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

/// DSL text is printed exactly once with a single trailing newline.
fn print_text(text: &str) {
    println!("{}", text.trim_end_matches('\n'));
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), SchematicError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SchematicError::Other(format!("JSON encoding failed: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn output_stats_human(source: &Path, stats: &SchematicStats) {
    println!("File: {}", source.display());
    println!("{}", "─".repeat(60));
    println!("  Components:      {}", stats.total_components);
    println!("  Nets:            {}", stats.total_nets);
    println!("  Pages:           {}", stats.total_pages);
    println!("  Inter-page nets: {}", stats.inter_page_nets);
    println!("  Global nets:     {}", stats.global_nets);
}
