// ⚖️ Match Resolver - Search, score, broaden, tie-break, pick
//
// Orchestrates the whole matching of one receipt line:
//
//   normalize → initial catalog search → own-brand filter → score & rank
//   → synonym expansion (primary, then broader) when confidence is poor
//   → price tie-break among the leaders → own-brand re-fallback → result
//
// Failure semantics: every catalog search call is caught per round and
// treated as "zero additional candidates from this round". A line only ends
// in NoMatch when no round produced any candidate at all; nothing here ever
// aborts the matching of other lines.

use crate::catalog::{CatalogProduct, CatalogSearch};
use crate::normalizer::{normalize, NormalizedLine, SkipReason};
use crate::receipt::ReceiptLine;
use crate::scorer::{CandidateScorer, ScoredCandidate};
use crate::synonyms::SynonymTable;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// MATCH OUTCOME
// ============================================================================

/// Final verdict for one receipt line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Best catalog candidate, with the winning score for diagnostics
    Matched { product: CatalogProduct, score: i64 },

    /// Every search round came back empty: a valid terminal outcome, the
    /// caller degrades gracefully (placeholder image, no metadata)
    NoMatch,

    /// The line is not a product (payment row, deposit return); enrichment
    /// was skipped entirely
    NotAProduct(SkipReason),
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }

    pub fn product(&self) -> Option<&CatalogProduct> {
        match self {
            MatchOutcome::Matched { product, .. } => Some(product),
            _ => None,
        }
    }

    pub fn score(&self) -> Option<i64> {
        match self {
            MatchOutcome::Matched { score, .. } => Some(*score),
            _ => None,
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct MatchResolver {
    pub scorer: CandidateScorer,

    /// First-round category synonyms
    pub primary_synonyms: SynonymTable,

    /// Second-round, broader synonyms, consulted only when the top score is
    /// still negative after the first expansion
    pub broader_synonyms: SynonymTable,

    /// Price tie-break kicks in when rank 1 and rank 2 are closer than this
    /// (default: 5 points)
    pub tie_break_window: i64,

    /// How many leading candidates the price tie-break considers
    /// (default: 10)
    pub tie_break_depth: usize,

    /// Request-scoped timeout per catalog search call; a timed-out call is a
    /// failed round, not a fatal error (default: 5 s)
    pub search_timeout: Duration,
}

impl MatchResolver {
    pub fn new() -> Self {
        MatchResolver {
            scorer: CandidateScorer::new(),
            primary_synonyms: SynonymTable::primary(),
            broader_synonyms: SynonymTable::broader(),
            tie_break_window: 5,
            tie_break_depth: 10,
            search_timeout: Duration::from_secs(5),
        }
    }

    /// Resolve one receipt line against the catalog. Never returns an error:
    /// collaborator failures degrade to NoMatch at worst.
    pub async fn resolve(&self, search: &dyn CatalogSearch, line: &ReceiptLine) -> MatchOutcome {
        let norm = normalize(line);
        if let Some(reason) = norm.skip {
            debug!(
                description = %line.description,
                reason = reason.as_str(),
                "skipping non-product line"
            );
            return MatchOutcome::NotAProduct(reason);
        }

        // 1. Initial search + own-brand filter
        let unfiltered = self
            .search_round(search, &norm.search_query)
            .await
            .unwrap_or_default();
        let candidates =
            self.apply_brand_filter(&unfiltered, norm.brand_prefix_required, &norm.search_query);
        let filter_removed = candidates.len() != unfiltered.len();

        // 2. Score & rank. The pool stays insertion-ordered and deduplicated
        // across all rounds; the stable sort keeps catalog order for ties.
        let mut seen: IndexSet<String> = IndexSet::new();
        let mut pool: Vec<ScoredCandidate> = Vec::new();
        self.merge_candidates(line, &norm, &candidates, &mut pool, &mut seen);
        pool.sort_by(|a, b| b.score.cmp(&a.score));

        // 3. Primary expansion when confidence is poor
        if self.needs_expansion(&pool) {
            self.expansion_round(search, line, &norm, &self.primary_synonyms, &mut pool, &mut seen)
                .await;
            pool.sort_by(|a, b| b.score.cmp(&a.score));
        }

        // 4. Broader expansion when the top score is still negative
        if pool.first().map_or(true, |top| top.score < 0) {
            self.expansion_round(search, line, &norm, &self.broader_synonyms, &mut pool, &mut seen)
                .await;
            pool.sort_by(|a, b| b.score.cmp(&a.score));
        }

        if pool.is_empty() {
            debug!(query = %norm.search_query, "no candidates after all rounds");
            return MatchOutcome::NoMatch;
        }

        for (rank, candidate) in pool.iter().take(5).enumerate() {
            debug!(
                rank = rank + 1,
                score = candidate.score,
                title = %candidate.product.title,
                price = ?candidate.product.price(),
                sub_category = ?candidate.product.sub_category,
                "ranked candidate"
            );
        }

        // 5. Price tie-break when scores are weak or close
        let mut winner = self.pick_winner(&pool, &norm);

        // 6. Own-brand re-fallback: filtering must never leave us worse off
        // than the unfiltered result
        if winner.score < 0 && filter_removed {
            let mut rescored: Vec<ScoredCandidate> = Vec::new();
            let mut rescored_seen: IndexSet<String> = IndexSet::new();
            self.merge_candidates(line, &norm, &unfiltered, &mut rescored, &mut rescored_seen);
            rescored.sort_by(|a, b| b.score.cmp(&a.score));

            if let Some(best) = rescored.into_iter().next() {
                if best.score >= winner.score {
                    warn!(
                        query = %norm.search_query,
                        filtered_score = winner.score,
                        unfiltered_score = best.score,
                        title = %best.product.title,
                        "brand filter produced a worse match, falling back to unfiltered best"
                    );
                    winner = best;
                }
            }
        }

        debug!(
            query = %norm.search_query,
            score = winner.score,
            title = %winner.product.title,
            "chosen best match"
        );

        MatchOutcome::Matched {
            product: winner.product,
            score: winner.score,
        }
    }

    /// Expansion triggers on an empty pool, a negative top score, or any
    /// candidate whose price term asked for a broader search
    fn needs_expansion(&self, pool: &[ScoredCandidate]) -> bool {
        pool.first().map_or(true, |top| top.score < 0)
            || pool.iter().any(|c| c.expand_suggested)
    }

    /// One catalog search with the request-scoped timeout applied.
    /// `None` means the round failed; failed rounds contribute nothing.
    async fn search_round(
        &self,
        search: &dyn CatalogSearch,
        query: &str,
    ) -> Option<Vec<CatalogProduct>> {
        match tokio::time::timeout(self.search_timeout, search.search(query)).await {
            Ok(Ok(response)) => Some(response.products),
            Ok(Err(error)) => {
                warn!(query = %query, error = %error, "catalog search failed, round yields no candidates");
                None
            }
            Err(_) => {
                warn!(
                    query = %query,
                    timeout = ?self.search_timeout,
                    "catalog search timed out, round yields no candidates"
                );
                None
            }
        }
    }

    /// Own-brand filter, both directions: a line with the own-brand prefix
    /// prefers own-brand candidates, a line without it prefers the rest. An
    /// emptied set falls back to the full response — the filter must never
    /// silently return zero candidates when unfiltered results exist.
    fn apply_brand_filter(
        &self,
        products: &[CatalogProduct],
        own_brand_required: bool,
        query: &str,
    ) -> Vec<CatalogProduct> {
        let filtered: Vec<CatalogProduct> = products
            .iter()
            .filter(|p| is_own_brand(p) == own_brand_required)
            .cloned()
            .collect();

        if filtered.is_empty() && !products.is_empty() {
            warn!(
                query = %query,
                own_brand_required,
                "brand filter removed every candidate, falling back to full results"
            );
            return products.to_vec();
        }

        filtered
    }

    /// Score products not yet in the pool and append them in arrival order
    fn merge_candidates(
        &self,
        line: &ReceiptLine,
        norm: &NormalizedLine,
        products: &[CatalogProduct],
        pool: &mut Vec<ScoredCandidate>,
        seen: &mut IndexSet<String>,
    ) {
        for product in products {
            if seen.insert(product.dedup_key()) {
                pool.push(self.scorer.score_candidate(line, norm, product, false));
            }
        }
    }

    /// One synonym-expansion round: find the first matching table entry and
    /// issue one search per synonym, concurrently; failed searches are
    /// skipped, new candidates merged and scored.
    async fn expansion_round(
        &self,
        search: &dyn CatalogSearch,
        line: &ReceiptLine,
        norm: &NormalizedLine,
        table: &SynonymTable,
        pool: &mut Vec<ScoredCandidate>,
        seen: &mut IndexSet<String>,
    ) {
        let Some(entry) = table.lookup(&norm.search_query) else {
            return;
        };

        debug!(
            query = %norm.search_query,
            key = %entry.key,
            synonyms = entry.synonyms.len(),
            "broadening search with category synonyms"
        );

        let rounds = entry
            .synonyms
            .iter()
            .map(|synonym| self.search_round(search, synonym));
        let results = futures::future::join_all(rounds).await;

        for products in results.into_iter().flatten() {
            self.merge_candidates(line, norm, &products, pool, seen);
        }
    }

    /// Take the rank-1 candidate, unless the score is negative or the lead
    /// over rank 2 is inside the tie-break window; then the candidate
    /// closest in price among the leaders wins. Skipped entirely when the
    /// receipt price is unknown.
    fn pick_winner(&self, pool: &[ScoredCandidate], norm: &NormalizedLine) -> ScoredCandidate {
        let top = &pool[0];

        let weak = top.score < 0;
        let close = pool
            .get(1)
            .map_or(false, |second| top.score - second.score < self.tie_break_window);
        if !weak && !close {
            return top.clone();
        }

        let Some(receipt_price) = norm.compare_price() else {
            return top.clone();
        };

        let mut best_index = 0;
        let mut best_diff = f64::INFINITY;
        for (index, candidate) in pool.iter().take(self.tie_break_depth).enumerate() {
            if let Some(price) = candidate.product.price() {
                let diff = (price - receipt_price).abs();
                if diff < best_diff {
                    best_diff = diff;
                    best_index = index;
                }
            }
        }

        if best_index != 0 {
            debug!(
                from = %pool[0].product.title,
                to = %pool[best_index].product.title,
                "price tie-break re-selected the winner"
            );
        }

        pool[best_index].clone()
    }
}

impl Default for MatchResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_own_brand(product: &CatalogProduct) -> bool {
    let brand = product.brand.as_deref().unwrap_or_default().to_lowercase();
    let title = product.title.to_lowercase();
    brand.starts_with("ah") || title.starts_with("ah ")
}

// ============================================================================
// TESTS
// ============================================================================
