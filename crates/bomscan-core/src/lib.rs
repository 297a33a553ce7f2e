pub mod config;
pub mod consolidate;
pub mod error;
pub mod extraction;
pub mod layout;
pub mod model;
pub mod parsing;
pub mod proximity;
pub mod reference;
pub mod trace;

use std::collections::HashSet;
use std::path::Path;

use config::ExtractionConfig;
use extraction::{LoadedDocument, PdfExtractor};
use layout::{group_lines, Line};
use model::{Composition, ExtractionOutcome, Item};
use reference::ReferenceList;
use trace::{EventSink, ExtractionEvent};

/// Main API entry point: extract tag quantities from a drawing PDF.
///
/// Never fails. A document the backend cannot open produces an empty
/// outcome and a `DocumentUnreadable` event.
pub fn extract_pdf(
    path: &Path,
    extractor: &dyn PdfExtractor,
    reference: Option<&ReferenceList>,
    config: &ExtractionConfig,
    sink: &mut dyn EventSink,
) -> ExtractionOutcome {
    let backend = extractor.backend_name().to_string();
    let doc = match extractor.open(path) {
        Ok(doc) => doc,
        Err(e) => {
            sink.emit(ExtractionEvent::DocumentUnreadable {
                backend,
                reason: e.to_string(),
            });
            return ExtractionOutcome::empty();
        }
    };

    sink.emit(ExtractionEvent::DocumentOpened {
        backend,
        page_count: doc.page_count(),
    });

    extract_document(doc.as_ref(), reference, config, sink)
}

/// Run the full pipeline over an already opened document.
pub fn extract_document(
    doc: &dyn LoadedDocument,
    reference: Option<&ReferenceList>,
    config: &ExtractionConfig,
    sink: &mut dyn EventSink,
) -> ExtractionOutcome {
    let page_count = doc.page_count();
    let mut pages: Vec<Vec<Line>> = Vec::with_capacity(page_count);
    let mut page_candidates: Vec<PageCandidates> = Vec::with_capacity(page_count);
    let mut tables_before = 0;

    for page in 1..=page_count {
        let tokens = match doc.page_tokens(page) {
            Ok(tokens) => tokens,
            Err(e) => {
                sink.emit(ExtractionEvent::PageSkipped {
                    page,
                    reason: e.to_string(),
                });
                Vec::new()
            }
        };

        let lines = group_lines(&tokens, config.y_tolerance);
        sink.emit(ExtractionEvent::PageTokenized {
            page,
            tokens: tokens.len(),
            lines: lines.len(),
        });

        let pass = parsing::extract_page(&lines, tables_before, config);
        for (i, region) in pass.tables.iter().enumerate() {
            sink.emit(ExtractionEvent::TableFound {
                page,
                table_number: tables_before + i + 1,
                rows: region.row_count(),
            });
        }
        tables_before += pass.tables.len();

        let nearby = proximity::extract_page(&tokens, config);
        page_candidates.push(PageCandidates {
            primary: pass.items,
            proximity: nearby.items,
            three_column_lines: nearby.three_column_lines,
        });

        pages.push(lines);
    }

    let three_column_lines: usize = page_candidates.iter().map(|p| p.three_column_lines).sum();
    let primary_count: usize = page_candidates.iter().map(|p| p.primary.len()).sum();
    let proximity_count: usize = page_candidates.iter().map(|p| p.proximity.len()).sum();
    let (composition, candidates) = compose(page_candidates);
    sink.emit(ExtractionEvent::CompositionSelected {
        composition,
        three_column_lines,
        primary_items: primary_count,
        proximity_items: proximity_count,
    });

    let mut items = gate(candidates, config, sink);
    let mut totals = consolidate::sum_by_tag(&items);
    let mut guided_fallback = false;

    if let Some(reference) = reference.filter(|r| !r.is_empty()) {
        let match_ratio = reference.match_ratio(&totals);
        let triggered = match_ratio < config.match_ratio_threshold;
        sink.emit(ExtractionEvent::GuidedFallbackDecision {
            match_ratio,
            threshold: config.match_ratio_threshold,
            triggered,
        });

        if triggered {
            guided_fallback = true;
            let guided = gate(
                reference::guided::extract_guided(&pages, reference, config),
                config,
                sink,
            );
            // Guided totals replace primary totals for the tags they found
            totals.extend(consolidate::sum_by_tag(&guided));
            items.extend(guided);
        }

        totals = consolidate::reconcile_with_reference(totals, reference, &pages, config, sink);
    }

    let outcome = ExtractionOutcome {
        result: totals,
        page_count,
        items,
        composition,
        guided_fallback,
    };
    sink.emit(ExtractionEvent::Totals {
        tags: outcome.result.len(),
        total_quantity: outcome.total_quantity(),
        page_count,
    });
    outcome
}

/// What the primary and proximity passes produced for one page.
struct PageCandidates {
    primary: Vec<Item>,
    proximity: Vec<Item>,
    three_column_lines: usize,
}

impl PageCandidates {
    fn read_by_geometry(&self) -> bool {
        self.three_column_lines > 0 && !self.proximity.is_empty()
    }
}

/// Choose the candidate items, page by page.
///
/// A page with three-column rows is read by geometry alone. On every other
/// page the primary items stand, and proximity only adds tags the primary
/// passes of those pages never found.
fn compose(pages: Vec<PageCandidates>) -> (Composition, Vec<Item>) {
    let known: HashSet<String> = pages
        .iter()
        .filter(|page| !page.read_by_geometry())
        .flat_map(|page| &page.primary)
        .map(|item| item.tag.clone())
        .collect();

    let mut candidates = Vec::new();
    let mut geometry_pages = 0;
    let mut primary_used = false;
    let mut proximity_added = false;

    for page in pages {
        if page.read_by_geometry() {
            geometry_pages += 1;
            candidates.extend(page.proximity);
            continue;
        }
        primary_used |= !page.primary.is_empty();
        candidates.extend(page.primary);
        for item in page.proximity {
            if !known.contains(&item.tag) {
                proximity_added = true;
                candidates.push(item);
            }
        }
    }

    let composition = if geometry_pages > 0 && !primary_used && !proximity_added {
        Composition::Proximity
    } else if geometry_pages > 0 || proximity_added {
        Composition::PrimaryWithProximity
    } else {
        Composition::Primary
    };
    (composition, candidates)
}

/// Drop items below the confidence floor, reporting each decision.
fn gate(items: Vec<Item>, config: &ExtractionConfig, sink: &mut dyn EventSink) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| {
            if item.confidence < config.min_confidence {
                sink.emit(ExtractionEvent::ItemRejected {
                    tag: item.tag.clone(),
                    page: item.page,
                    confidence: item.confidence,
                    min_confidence: config.min_confidence,
                });
                return false;
            }
            sink.emit(ExtractionEvent::ItemExtracted {
                tag: item.tag.clone(),
                quantity: item.quantity,
                page: item.page,
                line_number: item.line_number,
                confidence: item.confidence,
                source_type: item.source_type,
            });
            true
        })
        .collect()
}
