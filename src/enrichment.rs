// 🧺 Receipt Enrichment - Match every product line of a receipt
//
// Fans the product lines of one receipt out over the catalog matcher with
// bounded concurrency. Line order is preserved in the output, and one line's
// search trouble never blocks or fails the others (the resolver already
// degrades per line).

use crate::catalog::{CatalogSearch, ProductImage};
use crate::receipt::{Receipt, ReceiptLine};
use crate::resolver::{MatchOutcome, MatchResolver};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// ENRICHED LINE
// ============================================================================

/// One receipt line plus everything the matcher could attach to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedLine {
    pub line: ReceiptLine,

    /// Unit price derived from the line (line total / quantity)
    pub unit_price: Option<f64>,

    pub outcome: MatchOutcome,

    /// Selected product image when matched; the presentation layer shows a
    /// placeholder otherwise
    pub image: Option<ProductImage>,
}

// ============================================================================
// ENRICHER
// ============================================================================

pub struct ReceiptEnricher {
    pub resolver: MatchResolver,

    /// How many lines are matched against the catalog at once (default: 4)
    pub concurrency: usize,
}

impl ReceiptEnricher {
    pub fn new() -> Self {
        ReceiptEnricher {
            resolver: MatchResolver::new(),
            concurrency: 4,
        }
    }

    /// Enrich a batch of receipt lines, preserving their order
    pub async fn enrich_lines(
        &self,
        search: &dyn CatalogSearch,
        lines: Vec<ReceiptLine>,
    ) -> Vec<EnrichedLine> {
        let count = lines.len();
        let enriched: Vec<EnrichedLine> = futures::stream::iter(lines)
            .map(|line| async move {
                let unit_price = line.unit_price();
                let outcome = self.resolver.resolve(search, &line).await;
                let image = outcome
                    .product()
                    .and_then(|product| product.primary_image())
                    .cloned();

                EnrichedLine {
                    line,
                    unit_price,
                    outcome,
                    image,
                }
            })
            .buffered(self.concurrency.max(1))
            .collect()
            .await;

        let matched = enriched.iter().filter(|e| e.outcome.is_matched()).count();
        debug!(lines = count, matched, "receipt enrichment finished");

        enriched
    }

    /// Enrich all product lines of one receipt
    pub async fn enrich_receipt(
        &self,
        search: &dyn CatalogSearch,
        receipt: &Receipt,
    ) -> Vec<EnrichedLine> {
        self.enrich_lines(search, receipt.product_lines()).await
    }
}

impl Default for ReceiptEnricher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
