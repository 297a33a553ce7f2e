use bomscan_core::error::BomscanError;
use bomscan_core::model::ExtractionOutcome;

/// Print the tag map, or the whole outcome when items were asked for.
pub fn print(outcome: &ExtractionOutcome, with_items: bool) -> Result<(), BomscanError> {
    let json = if with_items {
        serde_json::to_string_pretty(outcome)?
    } else {
        serde_json::to_string_pretty(&outcome.result)?
    };
    println!("{json}");
    Ok(())
}
