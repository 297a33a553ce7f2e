use bomscan_core::config::{load_config, ExtractionConfig};
use bomscan_core::error::BomscanError;
use bomscan_core::reference::load_reference;
use bomscan_core::trace::{CollectingSink, TeeSink, TracingSink};
use std::path::PathBuf;

use crate::output;
use crate::Backend;

pub struct ExtractArgs {
    pub input_file: PathBuf,
    pub reference: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub backend: Backend,
    pub output_format: String,
    pub show_items: bool,
    pub events_file: Option<PathBuf>,
}

pub fn run(args: ExtractArgs) -> Result<(), BomscanError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ExtractionConfig::default(),
    };
    let reference = args.reference.as_deref().map(load_reference).transpose()?;
    if let Some(reference) = &reference {
        tracing::info!(tags = reference.len(), "reference list loaded");
    }

    let extractor = args.backend.extractor()?;
    let mut tracing_sink = TracingSink;
    let mut collected = CollectingSink::new();

    let outcome = {
        let mut tee = TeeSink {
            first: &mut tracing_sink,
            second: &mut collected,
        };
        bomscan_core::extract_pdf(
            &args.input_file,
            extractor.as_ref(),
            reference.as_ref(),
            &config,
            &mut tee,
        )
    };

    match args.output_format.as_str() {
        "json" => output::json::print(&outcome, args.show_items)?,
        _ => output::table::print(&outcome, args.show_items),
    }

    if let Some(path) = args.events_file {
        let json = serde_json::to_string_pretty(&collected.into_log())?;
        std::fs::write(&path, json)?;
        eprintln!("Event log written to {}", path.display());
    }

    Ok(())
}
