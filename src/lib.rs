// Receipt Match - Core Library
// Matches scanned-receipt lines against catalog product records

pub mod receipt;    // Receipt model: lines, product filtering, totals
pub mod catalog;    // Catalog collaborator: search trait, product records, images
pub mod normalizer; // Query Normalizer: receipt line → search query + hints
pub mod scorer;     // Candidate Scorer: confidence per line/product pair
pub mod synonyms;   // Category synonym tables for search broadening
pub mod resolver;   // Match Resolver: the multi-round matching state machine
pub mod enrichment; // Per-receipt concurrent enrichment

// Re-export commonly used types
pub use receipt::{parse_locale_amount, parse_quantity, Receipt, ReceiptLine, ReceiptUiItem};
pub use catalog::{
    select_image, CatalogProduct, CatalogSearch, NutrientRow, NutritionalInfo, ProductImage,
    SearchError, SearchResponse,
};
pub use normalizer::{clean_description, normalize, NormalizedLine, SkipReason};
pub use scorer::{CandidateScorer, PriceAssessment, ScoredCandidate};
pub use synonyms::{SynonymEntry, SynonymTable};
pub use resolver::{MatchOutcome, MatchResolver};
pub use enrichment::{EnrichedLine, ReceiptEnricher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
