use bomscan_core::config::ExtractionConfig;
use bomscan_core::error::BomscanError;

pub fn run() -> Result<(), BomscanError> {
    let json = serde_json::to_string_pretty(&ExtractionConfig::default())?;
    println!("{json}");
    Ok(())
}
