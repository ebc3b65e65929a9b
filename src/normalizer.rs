// 🔤 Query Normalizer - Receipt line → search query + matching hints
//
// Receipt descriptions are abbreviated, uppercase and decorated with
// promotional markers ("BONUS AH MELK", "2 X PASTA SAUS"). Before the
// catalog can be searched the line has to be cleaned up, the own-brand
// prefix detected, and the locale-formatted numbers parsed.
//
// Guarantee: normalization never fails. Malformed numeric input becomes an
// absent price / default quantity, and clearly-non-product lines (payment
// surcharges, deposit returns) come back flagged to skip enrichment.

use crate::receipt::ReceiptLine;
use serde::{Deserialize, Serialize};

/// Retailer's own-brand token: receipt lines starting with it must prefer
/// own-brand catalog entries
const OWN_BRAND_TOKEN: &str = "AH";

// ============================================================================
// SKIP CLASSIFICATION
// ============================================================================

/// Why a line should not be enriched at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Card-payment surcharge row ("PINNEN")
    PaymentSurcharge,

    /// Deposit return row ("STATIEGELD")
    DepositReturn,

    /// Cleaned query too short to search meaningfully
    QueryTooShort,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::PaymentSurcharge => "payment surcharge",
            SkipReason::DepositReturn => "deposit return",
            SkipReason::QueryTooShort => "query too short",
        }
    }
}

// ============================================================================
// NORMALIZED LINE
// ============================================================================

/// Output of normalization: a clean search string plus the hints the scorer
/// and resolver need
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedLine {
    /// Description with the bonus marker and leading quantity multiplier
    /// stripped, trimmed
    pub search_query: String,

    /// True when the raw description starts with the own-brand token on a
    /// word boundary
    pub brand_prefix_required: bool,

    /// Line total divided by quantity (when quantity > 0), `None` when the
    /// printed amount is unparsable
    pub unit_price: Option<f64>,

    /// Line total as parsed, `None` when unparsable
    pub raw_price: Option<f64>,

    /// Quantity as parsed, defaulting to 1
    pub raw_quantity: f64,

    /// Set when the line is clearly not a product
    pub skip: Option<SkipReason>,
}

impl NormalizedLine {
    pub fn is_searchable(&self) -> bool {
        self.skip.is_none()
    }

    /// Price used for all candidate comparisons: unit price when known,
    /// otherwise the raw line total
    pub fn compare_price(&self) -> Option<f64> {
        self.unit_price.or(self.raw_price)
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize one receipt line. Never fails.
pub fn normalize(line: &ReceiptLine) -> NormalizedLine {
    let search_query = clean_description(&line.description);
    let brand_prefix_required = has_own_brand_prefix(&line.description);

    let raw_price = line.parsed_amount();
    let raw_quantity = line.parsed_quantity();
    let unit_price = line.unit_price();

    let skip = classify_skip(&search_query);

    NormalizedLine {
        search_query,
        brand_prefix_required,
        unit_price,
        raw_price,
        raw_quantity,
        skip,
    }
}

/// Strip the bonus marker and a leading `<digits> X` multiplier, then trim
pub fn clean_description(description: &str) -> String {
    let without_bonus = strip_bonus_marker(description);
    strip_quantity_multiplier(&without_bonus).trim().to_string()
}

/// Remove every case-insensitive "BONUS" occurrence from the text
pub fn strip_bonus_marker(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < text.len() {
        if lower[i..].starts_with("bonus") {
            i += "bonus".len();
        } else if let Some(ch) = text[i..].chars().next() {
            out.push(ch);
            i += ch.len_utf8();
        } else {
            break;
        }
    }

    out
}

/// Drop a leading quantity-multiplier token such as "2 X " — quantity is
/// handled separately via the line's quantity field
fn strip_quantity_multiplier(text: &str) -> &str {
    let trimmed = text.trim_start();

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return trimmed;
    }

    let after_digits = trimmed[digits..].trim_start();
    let mut chars = after_digits.chars();
    match (chars.next(), chars.next()) {
        (Some('x') | Some('X'), None) => "",
        (Some('x') | Some('X'), Some(next)) if next.is_whitespace() => {
            after_digits[1..].trim_start()
        }
        _ => trimmed,
    }
}

/// Case-insensitive word-boundary check for the own-brand token at the start
/// of the RAW (untrimmed) description
fn has_own_brand_prefix(description: &str) -> bool {
    let token_len = OWN_BRAND_TOKEN.len();
    if description.len() < token_len || !description.is_char_boundary(token_len) {
        return false;
    }
    if !description[..token_len].eq_ignore_ascii_case(OWN_BRAND_TOKEN) {
        return false;
    }
    // Word boundary: end of string or a non-alphanumeric follows
    description[token_len..]
        .chars()
        .next()
        .map(|c| !c.is_ascii_alphanumeric())
        .unwrap_or(true)
}

fn classify_skip(search_query: &str) -> Option<SkipReason> {
    let lower = search_query.to_lowercase();
    if lower.contains("pinnen") {
        return Some(SkipReason::PaymentSurcharge);
    }
    if lower.contains("statiegeld") {
        return Some(SkipReason::DepositReturn);
    }
    if search_query.chars().count() < 3 {
        return Some(SkipReason::QueryTooShort);
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_quantity_multiplier_prefix() {
        let line = ReceiptLine::new("2 X PASTA SAUS", "3,00").with_quantity("2");
        let norm = normalize(&line);

        assert_eq!(norm.search_query, "PASTA SAUS");
        assert_eq!(norm.unit_price, Some(1.5));
        assert_eq!(norm.raw_quantity, 2.0);
    }

    #[test]
    fn test_multiplier_needs_word_boundary() {
        // "2 XL" is a size, not a multiplier
        assert_eq!(clean_description("2 XL SHIRT"), "2 XL SHIRT");
        assert_eq!(clean_description("12X COLA"), "COLA");
        assert_eq!(clean_description("3 x APPELS"), "APPELS");
    }

    #[test]
    fn test_strips_bonus_marker_case_insensitive() {
        assert_eq!(clean_description("BONUS AH MELK"), "AH MELK");
        assert_eq!(clean_description("Bonus kaas"), "kaas");
        assert_eq!(strip_bonus_marker("AH BONUSMELK"), "AH MELK");
    }

    #[test]
    fn test_own_brand_prefix_word_boundary() {
        assert!(normalize(&ReceiptLine::new("AH MELK", "1,09")).brand_prefix_required);
        assert!(normalize(&ReceiptLine::new("ah terra noten", "2,49")).brand_prefix_required);
        assert!(!normalize(&ReceiptLine::new("AHORNSIROOP", "3,99")).brand_prefix_required);
        assert!(!normalize(&ReceiptLine::new("VERSE MELK", "1,09")).brand_prefix_required);
    }

    #[test]
    fn test_malformed_price_never_panics() {
        let line = ReceiptLine::new("AH MELK", "e1,09").with_quantity("twee");
        let norm = normalize(&line);

        assert_eq!(norm.raw_price, None);
        assert_eq!(norm.unit_price, None);
        assert_eq!(norm.raw_quantity, 1.0);
        assert!(norm.is_searchable());
    }

    #[test]
    fn test_skip_classification() {
        let pinnen = normalize(&ReceiptLine::new("PINNEN", "25,00"));
        assert_eq!(pinnen.skip, Some(SkipReason::PaymentSurcharge));
        assert!(!pinnen.is_searchable());

        let deposit = normalize(&ReceiptLine::new("STATIEGELD", "0,25"));
        assert_eq!(deposit.skip, Some(SkipReason::DepositReturn));

        // "2 X AH" cleans down to "AH": too short to search
        let short = normalize(&ReceiptLine::new("2 X AH", "1,00"));
        assert_eq!(short.skip, Some(SkipReason::QueryTooShort));

        let product = normalize(&ReceiptLine::new("AH MELK", "1,09"));
        assert_eq!(product.skip, None);
    }

    #[test]
    fn test_compare_price_prefers_unit_price() {
        let line = ReceiptLine::new("2 X COLA", "4,00").with_quantity("2");
        assert_eq!(normalize(&line).compare_price(), Some(2.0));
    }
}
