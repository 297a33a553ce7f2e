use bomscan_core::model::ExtractionOutcome;

pub fn print(outcome: &ExtractionOutcome, show_items: bool) {
    if outcome.result.is_empty() {
        println!("No tags found ({} page(s) read)", outcome.page_count);
        return;
    }

    let width = outcome
        .result
        .keys()
        .map(|tag| tag.len())
        .max()
        .unwrap_or(10)
        .max(3);

    println!("  {:<width$}  {:>5}", "Tag", "Qty");
    for (tag, quantity) in &outcome.result {
        println!("  {:<width$}  {:>5}", tag, quantity);
    }
    println!();

    let guided = if outcome.guided_fallback {
        ", reference-guided"
    } else {
        ""
    };
    println!(
        "  {} tag(s), {} part(s), {} page(s), {}{}",
        outcome.result.len(),
        outcome.total_quantity(),
        outcome.page_count,
        outcome.composition,
        guided
    );

    if show_items {
        println!();
        println!("  Items:");
        for item in &outcome.items {
            let material = if item.material.is_empty() {
                String::new()
            } else {
                format!("  {}", item.material)
            };
            println!(
                "    p{:<3} l{:<4} {:<width$}  {:>5}  {:<9} {:.2}{}",
                item.page,
                item.line_number,
                item.tag,
                item.quantity,
                item.source_type.to_string(),
                item.confidence,
                material,
            );
        }
    }
}
