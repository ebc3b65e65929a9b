// 🎯 Candidate Scorer - Match confidence for one receipt line vs one product
//
// The two sides are only loosely related: the receipt prints "AH BIO MELK
// 1,09" while the catalog says "AH Biologisch Halfvolle Melk, € 1.09, brand
// 'AH Biologisch'". Confidence is a signed integer combining price
// proximity, brand alignment, token overlap and penalty terms; higher is
// better, negative means "probably wrong" and makes the resolver broaden its
// search. Scoring is a pure function: same line + same candidate always
// yields the same score.

use crate::catalog::CatalogProduct;
use crate::normalizer::{strip_bonus_marker, NormalizedLine};
use crate::receipt::ReceiptLine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// SCORE WEIGHTS
// ============================================================================

/// Exact-prefix bonus when an own-brand sub-line on the receipt matches the
/// candidate's brand field
const BRAND_PREFIX_BONUS: i64 = 60;

/// Per distinct search word (length > 2) found in the candidate title
const SEARCH_WORD_BONUS: i64 = 10;

/// Flat penalty when the title names a component product (dough, mix,
/// seasoning) instead of the finished product on the receipt
const EXCLUDED_WORD_PENALTY: i64 = 80;

/// Per distinct receipt-description word (length > 3) found in the title
const DESCRIPTION_WORD_BONUS: i64 = 5;

/// Per search word found inside the candidate's sub-category
const SUBCATEGORY_BONUS: i64 = 25;

/// When the query has exactly one significant word and the sub-category
/// matches none of it
const SUBCATEGORY_MISS_PENALTY: i64 = 15;

/// Per title word that appears neither on the receipt nor in the query —
/// penalizes verbose, irrelevant titles
const EXTRA_WORD_PENALTY: i64 = 8;

/// Receipt sub-line prefixes that map to an exact catalog brand
const BRAND_PREFIX_RULES: &[(&str, &str)] = &[
    ("AH BIOLOGISCH", "ah biologisch"),
    ("AH BIO", "ah biologisch"),
    ("AH TERRA", "ah terra"),
];

/// Titles containing any of these are raw ingredients, not finished products
const EXCLUDED_TITLE_WORDS: &[&str] = &[
    "deeg", "taartdeeg", "dough", "mix", "poeder", "powder", "kruid", "seasoning", "basis",
];

/// Filler words that never count as "extra" title words
const STOP_WORDS: &[&str] = &[
    "dr", "oetker", "de", "het", "een", "en", "met", "voor", "van", "verse", "vers", "original",
    "classic", "extra", "pure", "authentic", "style", "product",
];

// ============================================================================
// PRICE ASSESSMENT
// ============================================================================

/// Outcome of the price term: a score contribution plus a suggestion that
/// the caller broaden the search when no candidate sits near the price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAssessment {
    pub score: i64,
    pub expand: bool,
}

impl PriceAssessment {
    const NEUTRAL: PriceAssessment = PriceAssessment {
        score: 0,
        expand: false,
    };
}

// ============================================================================
// SCORED CANDIDATE
// ============================================================================

/// One catalog candidate with its computed confidence. Created fresh per
/// matching round, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub product: CatalogProduct,
    pub score: i64,
    pub expand_suggested: bool,
}

// ============================================================================
// SCORER
// ============================================================================

pub struct CandidateScorer {
    /// Non-bonus lines get the strong price reward only within this
    /// absolute difference (default: 0.02)
    pub exact_price_tolerance: f64,

    /// Tiered leniency for bonus-priced lines: (max difference, reward),
    /// evaluated in order
    pub bonus_price_tiers: [(f64, i64); 4],

    /// Partial credit for a bonus line far off in price, granted only when
    /// the caller already signalled willingness to expand
    pub bonus_expand_credit: i64,
}

impl CandidateScorer {
    pub fn new() -> Self {
        CandidateScorer {
            exact_price_tolerance: 0.02,
            bonus_price_tiers: [(0.10, 500), (0.20, 400), (0.30, 300), (0.50, 200)],
            bonus_expand_credit: 400,
        }
    }

    /// Score one catalog candidate against one receipt line.
    ///
    /// `allow_expand_credit` feeds the price term's conditional partial
    /// credit for far-off bonus prices; see [`CandidateScorer::price_term`].
    pub fn score_candidate(
        &self,
        line: &ReceiptLine,
        norm: &NormalizedLine,
        product: &CatalogProduct,
        allow_expand_credit: bool,
    ) -> ScoredCandidate {
        let price = self.price_term(
            product.price(),
            norm.compare_price(),
            line.is_bonus(),
            allow_expand_credit,
        );
        let text = self.text_term(&norm.search_query, &line.description, product);

        ScoredCandidate {
            product: product.clone(),
            score: price.score + text,
            expand_suggested: price.expand,
        }
    }

    /// Price proximity term.
    ///
    /// Bonus-flagged lines get tiered leniency because the receipt shows the
    /// promotional price while the catalog may show the regular one. Normal
    /// lines are strict: anything but a near-exact match contributes nothing
    /// and suggests broadening the search.
    ///
    /// When either price is unknown the term is neutral: zero contribution,
    /// no expansion suggestion.
    ///
    /// The `expand` parameter only matters for a bonus line beyond the last
    /// tier; no caller in this crate passes `true` today (see DESIGN.md on
    /// this latent branch).
    pub fn price_term(
        &self,
        product_price: Option<f64>,
        compare_price: Option<f64>,
        bonus: bool,
        expand: bool,
    ) -> PriceAssessment {
        let (Some(product_price), Some(compare_price)) = (product_price, compare_price) else {
            return PriceAssessment::NEUTRAL;
        };

        let diff = (product_price - compare_price).abs();

        if bonus {
            for &(max_diff, reward) in &self.bonus_price_tiers {
                if diff < max_diff {
                    return PriceAssessment {
                        score: reward,
                        expand: false,
                    };
                }
            }
            let score = if expand { self.bonus_expand_credit } else { 0 };
            return PriceAssessment {
                score,
                expand: true,
            };
        }

        if diff < self.exact_price_tolerance {
            PriceAssessment {
                score: 500,
                expand: false,
            }
        } else {
            PriceAssessment {
                score: 0,
                expand: true,
            }
        }
    }

    /// Token/text term: brand alignment, word overlap and penalties.
    fn text_term(&self, search_query: &str, description: &str, product: &CatalogProduct) -> i64 {
        let title = product.title.to_lowercase();
        let brand = product
            .brand
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        let search_words = significant_words(&search_query.to_lowercase(), 2);
        let desc_words =
            significant_words(&strip_bonus_marker(description).to_lowercase(), 3);

        let mut score = 0i64;

        // Own-brand sub-line alignment: first matching prefix rule only
        let upper_desc = description.to_uppercase();
        for &(prefix, required_brand) in BRAND_PREFIX_RULES {
            if upper_desc.starts_with(prefix) && brand == required_brand {
                score += BRAND_PREFIX_BONUS;
                break;
            }
        }

        // Search words found in the title
        let search_hits = search_words.iter().filter(|w| title.contains(*w)).count();
        score += search_hits as i64 * SEARCH_WORD_BONUS;

        // Component-product penalty
        if EXCLUDED_TITLE_WORDS.iter().any(|w| title.contains(w)) {
            score -= EXCLUDED_WORD_PENALTY;
        }

        // Receipt-description words found in the title
        let desc_hits = desc_words.iter().filter(|w| title.contains(*w)).count();
        score += desc_hits as i64 * DESCRIPTION_WORD_BONUS;

        // Sub-category alignment
        if let Some(sub_category) = &product.sub_category {
            let sub = sub_category.to_lowercase();
            let sub_hits = search_words.iter().filter(|w| sub.contains(*w)).count();
            score += sub_hits as i64 * SUBCATEGORY_BONUS;
            if sub_hits == 0 && search_words.len() == 1 {
                score -= SUBCATEGORY_MISS_PENALTY;
            }
        }

        // Extra words in the title: not stop words, not on the receipt.
        // Counted per occurrence, so a doubly verbose title pays twice.
        let extra = title_words(&title)
            .into_iter()
            .filter(|w| {
                w.chars().count() > 2
                    && !STOP_WORDS.contains(&w.as_str())
                    && !search_words.contains(w)
                    && !desc_words.contains(w)
            })
            .count();
        score -= extra as i64 * EXTRA_WORD_PENALTY;

        score
    }
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// WORD HELPERS
// ============================================================================

/// Distinct whitespace-separated words strictly longer than `min_len`
fn significant_words(text: &str, min_len: usize) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > min_len)
        .map(|w| w.to_string())
        .collect()
}

/// Title words normalized to lowercase alphanumerics, duplicates kept
fn title_words(title: &str) -> Vec<String> {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
