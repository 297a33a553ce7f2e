use crate::model::{Composition, SourceType};
use serde::{Deserialize, Serialize};

pub const EVENT_SCHEMA_VERSION: &str = "1.0";

/// A significant step of one extraction run.
///
/// Events only describe what happened; nothing a sink does with them feeds
/// back into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExtractionEvent {
    DocumentOpened {
        backend: String,
        page_count: usize,
    },
    DocumentUnreadable {
        backend: String,
        reason: String,
    },
    PageTokenized {
        page: usize,
        tokens: usize,
        lines: usize,
    },
    PageSkipped {
        page: usize,
        reason: String,
    },
    TableFound {
        page: usize,
        table_number: usize,
        rows: usize,
    },
    ItemExtracted {
        tag: String,
        quantity: u32,
        page: usize,
        line_number: usize,
        confidence: f32,
        source_type: SourceType,
    },
    ItemRejected {
        tag: String,
        page: usize,
        confidence: f32,
        min_confidence: f32,
    },
    CompositionSelected {
        composition: Composition,
        three_column_lines: usize,
        primary_items: usize,
        proximity_items: usize,
    },
    GuidedFallbackDecision {
        match_ratio: f32,
        threshold: f32,
        triggered: bool,
    },
    QuantityCorrected {
        tag: String,
        from: u32,
        to: u32,
    },
    RecoveryDecision {
        missing: usize,
        limit: usize,
        triggered: bool,
    },
    TagRecovered {
        tag: String,
        page: usize,
        quantity: u32,
    },
    Totals {
        tags: usize,
        total_quantity: u64,
        page_count: usize,
    },
}

/// Receives the events of an extraction run.
pub trait EventSink {
    fn emit(&mut self, event: ExtractionEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: ExtractionEvent) {
        match event {
            ExtractionEvent::DocumentOpened {
                backend,
                page_count,
            } => tracing::info!(%backend, page_count, "document opened"),
            ExtractionEvent::DocumentUnreadable { backend, reason } => {
                tracing::warn!(%backend, %reason, "document unreadable, returning empty result")
            }
            ExtractionEvent::PageTokenized {
                page,
                tokens,
                lines,
            } => tracing::debug!(page, tokens, lines, "page tokenized"),
            ExtractionEvent::PageSkipped { page, reason } => {
                tracing::warn!(page, %reason, "page skipped")
            }
            ExtractionEvent::TableFound {
                page,
                table_number,
                rows,
            } => tracing::debug!(page, table_number, rows, "table found"),
            ExtractionEvent::ItemExtracted {
                tag,
                quantity,
                page,
                line_number,
                confidence,
                source_type,
            } => tracing::trace!(
                %tag,
                quantity,
                page,
                line_number,
                confidence,
                %source_type,
                "item extracted"
            ),
            ExtractionEvent::ItemRejected {
                tag,
                page,
                confidence,
                min_confidence,
            } => tracing::debug!(%tag, page, confidence, min_confidence, "item below confidence"),
            ExtractionEvent::CompositionSelected {
                composition,
                three_column_lines,
                primary_items,
                proximity_items,
            } => tracing::info!(
                %composition,
                three_column_lines,
                primary_items,
                proximity_items,
                "composition selected"
            ),
            ExtractionEvent::GuidedFallbackDecision {
                match_ratio,
                threshold,
                triggered,
            } => tracing::info!(match_ratio, threshold, triggered, "guided fallback decision"),
            ExtractionEvent::QuantityCorrected { tag, from, to } => {
                tracing::debug!(%tag, from, to, "quantity corrected from reference")
            }
            ExtractionEvent::RecoveryDecision {
                missing,
                limit,
                triggered,
            } => {
                if triggered {
                    tracing::info!(missing, limit, "recovering missing reference tags")
                } else {
                    tracing::warn!(
                        missing,
                        limit,
                        "too many missing reference tags, recovery skipped"
                    )
                }
            }
            ExtractionEvent::TagRecovered {
                tag,
                page,
                quantity,
            } => tracing::debug!(%tag, page, quantity, "tag recovered from page text"),
            ExtractionEvent::Totals {
                tags,
                total_quantity,
                page_count,
            } => tracing::info!(tags, total_quantity, page_count, "extraction finished"),
        }
    }
}

/// Keeps every event for later export.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    events: Vec<ExtractionEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ExtractionEvent] {
        &self.events
    }

    pub fn into_log(self) -> EventLog {
        EventLog {
            events: self.events,
            ..EventLog::default()
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: ExtractionEvent) {
        self.events.push(event);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: ExtractionEvent) {}
}

/// Sends each event to two sinks.
pub struct TeeSink<'a, A: EventSink, B: EventSink> {
    pub first: &'a mut A,
    pub second: &'a mut B,
}

impl<A: EventSink, B: EventSink> EventSink for TeeSink<'_, A, B> {
    fn emit(&mut self, event: ExtractionEvent) {
        self.first.emit(event.clone());
        self.second.emit(event);
    }
}

/// Serializable record of one run's events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    pub schema_version: String,
    pub events: Vec<ExtractionEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            events: Vec::new(),
        }
    }
}
