mod commands;
mod output;

use bomscan_core::error::BomscanError;
use bomscan_core::extraction::native::LopdfExtractor;
use bomscan_core::extraction::pdftotext::PdftotextExtractor;
use bomscan_core::extraction::PdfExtractor;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bomscan",
    version,
    about = "Extract part tags and quantities from technical-drawing PDFs"
)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Backend {
    /// Built-in content stream reader
    Lopdf,
    /// poppler's `pdftotext -bbox`
    Pdftotext,
}

impl Backend {
    pub fn extractor(self) -> Result<Box<dyn PdfExtractor>, BomscanError> {
        match self {
            Backend::Lopdf => Ok(Box::new(LopdfExtractor::new())),
            Backend::Pdftotext if !PdftotextExtractor::is_available() => {
                Err(BomscanError::PdftotextNotFound)
            }
            Backend::Pdftotext => Ok(Box::new(PdftotextExtractor::new())),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tag quantities from a drawing
    Extract {
        /// Path to the PDF
        input_file: PathBuf,

        /// Expected tags and quantities (JSON or XLSX)
        #[arg(short, long, value_name = "FILE")]
        reference: Option<PathBuf>,

        /// Extraction settings (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Text extraction backend
        #[arg(short, long, value_enum, default_value = "lopdf")]
        backend: Backend,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Also list every counted item
        #[arg(long)]
        items: bool,

        /// Write the extraction event log to a JSON file
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,
    },
    /// Print the grouped text lines of a drawing
    Lines {
        /// Path to the PDF
        input_file: PathBuf,

        /// Only this page (1-based)
        #[arg(short, long)]
        page: Option<usize>,

        /// Extraction settings (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Text extraction backend
        #[arg(short, long, value_enum, default_value = "lopdf")]
        backend: Backend,
    },
    /// Print the default extraction settings as JSON
    Config,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            input_file,
            reference,
            config,
            backend,
            output,
            items,
            events,
        } => commands::extract::run(commands::extract::ExtractArgs {
            input_file,
            reference,
            config,
            backend,
            output_format: output,
            show_items: items,
            events_file: events,
        }),
        Commands::Lines {
            input_file,
            page,
            config,
            backend,
        } => commands::lines::run(input_file, page, config, backend),
        Commands::Config => commands::config::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
