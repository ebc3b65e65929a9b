// 🧾 Receipt Model - Lines as they appear on a scanned receipt
//
// Receipts list LINE TOTALS with locale-formatted amounts ("1,09"), not unit
// prices, and they mix real products with payment rows, deposit returns and
// summary labels. This module keeps the raw strings intact and offers
// tolerant numeric accessors that never fail on malformed input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// LOCALE-TOLERANT NUMBER PARSING
// ============================================================================

/// Parse an amount string that may use a comma or a dot as decimal separator.
///
/// Returns `None` for anything that does not parse to a finite number. It is
/// deliberately impossible to get an error (or a zero stand-in) out of this:
/// an unknown price must propagate as absent.
pub fn parse_locale_amount(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => None,
    }
}

/// Parse a quantity string, defaulting to 1 when absent, unparsable or zero.
pub fn parse_quantity(raw: Option<&str>) -> f64 {
    match raw.and_then(parse_locale_amount) {
        Some(q) if q != 0.0 => q,
        _ => 1.0,
    }
}

// ============================================================================
// RECEIPT LINE
// ============================================================================

/// One product line of a receipt, exactly as supplied by the receipt source.
///
/// All fields stay strings: the upstream document uses comma decimals and
/// sometimes numeric quantities, and parsing is the normalizer's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// Raw description, usually uppercase and abbreviated ("AH BIO MELK")
    pub description: String,

    /// Line total as printed ("1,09" or "1.09")
    pub amount: String,

    /// Quantity as printed; may arrive as a JSON string or number
    #[serde(default, deserialize_with = "string_or_number")]
    pub quantity: Option<String>,

    /// Promotional flag as printed (e.g. "BONUS")
    #[serde(default)]
    pub indicator: Option<String>,
}

impl ReceiptLine {
    pub fn new(description: &str, amount: &str) -> Self {
        ReceiptLine {
            description: description.to_string(),
            amount: amount.to_string(),
            quantity: None,
            indicator: None,
        }
    }

    pub fn with_quantity(mut self, quantity: &str) -> Self {
        self.quantity = Some(quantity.to_string());
        self
    }

    pub fn with_indicator(mut self, indicator: &str) -> Self {
        self.indicator = Some(indicator.to_string());
        self
    }

    /// Line total as a number, `None` when unparsable
    pub fn parsed_amount(&self) -> Option<f64> {
        parse_locale_amount(&self.amount)
    }

    /// Quantity as a number, defaulting to 1
    pub fn parsed_quantity(&self) -> f64 {
        parse_quantity(self.quantity.as_deref())
    }

    /// Unit price: line total divided by quantity when quantity > 0,
    /// otherwise the line total itself. All price comparisons use this.
    pub fn unit_price(&self) -> Option<f64> {
        let amount = self.parsed_amount()?;
        let quantity = self.parsed_quantity();
        if quantity > 0.0 {
            Some(amount / quantity)
        } else {
            Some(amount)
        }
    }

    /// True when the line carries a promotional-price indicator
    pub fn is_bonus(&self) -> bool {
        self.indicator
            .as_deref()
            .map(|i| i.to_uppercase().contains("BONUS"))
            .unwrap_or(false)
    }
}

/// Accept `"2"`, `2` or `2.0` for quantity-like fields
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

// ============================================================================
// RECEIPT DOCUMENT
// ============================================================================

/// One row of the receipt as rendered by the retailer: either a product line
/// or a labelled summary row ("TOTAAL", "UW VOORDEEL").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptUiItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub description: Option<String>,
    pub amount: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub quantity: Option<String>,
    pub indicator: Option<String>,
    pub label: Option<String>,
    pub price: Option<String>,
}

/// A full receipt as supplied by the receipt source (already parsed from the
/// underlying document; this crate never touches the raw document).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_id: String,
    pub transaction_moment: DateTime<Utc>,
    #[serde(rename = "receiptUiItems", default)]
    pub ui_items: Vec<ReceiptUiItem>,
}

impl Receipt {
    /// Extract the lines that are actual purchased products.
    ///
    /// Dropped rows: anything that is not a `product` with description and
    /// amount, the loyalty-card row (`BONUSKAART`), `waarvan` tax sub-lines,
    /// and negative amounts (those are discount rows, not products).
    pub fn product_lines(&self) -> Vec<ReceiptLine> {
        self.ui_items
            .iter()
            .filter(|item| item.item_type == "product")
            .filter_map(|item| {
                let description = item.description.as_deref()?;
                let amount = item.amount.as_deref()?;

                if description.to_uppercase() == "BONUSKAART" {
                    return None;
                }
                if description.to_lowercase().contains("waarvan") {
                    return None;
                }
                if matches!(parse_locale_amount(amount), Some(a) if a < 0.0) {
                    return None;
                }

                Some(ReceiptLine {
                    description: description.to_string(),
                    amount: amount.to_string(),
                    quantity: item.quantity.clone(),
                    indicator: item.indicator.clone(),
                })
            })
            .collect()
    }

    /// Total paid, read from the `TOTAAL` summary row
    pub fn total(&self) -> Option<f64> {
        self.labelled_amount("TOTAAL")
    }

    /// Total savings, read from the `UW VOORDEEL` summary row
    pub fn discount(&self) -> Option<f64> {
        self.labelled_amount("UW VOORDEEL")
    }

    fn labelled_amount(&self, label: &str) -> Option<f64> {
        self.ui_items
            .iter()
            .find(|item| item.label.as_deref() == Some(label))
            .and_then(|item| item.price.as_deref())
            .and_then(parse_locale_amount)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locale_amount_comma_and_dot() {
        assert_eq!(parse_locale_amount("1,09"), Some(1.09));
        assert_eq!(parse_locale_amount("1.09"), Some(1.09));
        assert_eq!(parse_locale_amount(" 3,00 "), Some(3.0));
    }

    #[test]
    fn test_parse_locale_amount_malformed_is_none() {
        assert_eq!(parse_locale_amount(""), None);
        assert_eq!(parse_locale_amount("gratis"), None);
        assert_eq!(parse_locale_amount("1,0,9"), None);
        assert_eq!(parse_locale_amount("NaN"), None);
    }

    #[test]
    fn test_parse_quantity_defaults_to_one() {
        assert_eq!(parse_quantity(None), 1.0);
        assert_eq!(parse_quantity(Some("drie")), 1.0);
        assert_eq!(parse_quantity(Some("0")), 1.0);
        assert_eq!(parse_quantity(Some("2")), 2.0);
        assert_eq!(parse_quantity(Some("1,5")), 1.5);
    }

    #[test]
    fn test_unit_price_divides_line_total() {
        let line = ReceiptLine::new("2 X PASTA SAUS", "3,00").with_quantity("2");
        assert_eq!(line.unit_price(), Some(1.5));
    }

    #[test]
    fn test_unit_price_unknown_amount_stays_unknown() {
        let line = ReceiptLine::new("PASTA SAUS", "??").with_quantity("2");
        assert_eq!(line.unit_price(), None);
    }

    #[test]
    fn test_is_bonus() {
        let line = ReceiptLine::new("MELK", "1,09").with_indicator("BONUS");
        assert!(line.is_bonus());

        let line = ReceiptLine::new("MELK", "1,09");
        assert!(!line.is_bonus());
    }

    #[test]
    fn test_quantity_accepts_string_or_number() {
        let from_string: ReceiptLine =
            serde_json::from_str(r#"{"description":"MELK","amount":"1,09","quantity":"2"}"#)
                .unwrap();
        assert_eq!(from_string.parsed_quantity(), 2.0);

        let from_number: ReceiptLine =
            serde_json::from_str(r#"{"description":"MELK","amount":"1,09","quantity":2}"#)
                .unwrap();
        assert_eq!(from_number.parsed_quantity(), 2.0);
    }

    fn test_receipt() -> Receipt {
        serde_json::from_str(
            r#"{
                "transactionId": "tx-123",
                "transactionMoment": "2025-03-01T12:00:00Z",
                "receiptUiItems": [
                    {"type": "product", "description": "BONUSKAART", "amount": "0,00"},
                    {"type": "product", "description": "AH BIO MELK", "amount": "1,09", "quantity": 1},
                    {"type": "product", "description": "2 X PASTA SAUS", "amount": "3,00", "quantity": "2", "indicator": "BONUS"},
                    {"type": "product", "description": "waarvan 9% BTW", "amount": "0,25"},
                    {"type": "product", "description": "KORTING", "amount": "-0,50"},
                    {"type": "product", "description": "GEEN BEDRAG"},
                    {"type": "subtotal", "label": "UW VOORDEEL", "price": "0,50"},
                    {"type": "total", "label": "TOTAAL", "price": "3,59"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_product_lines_filters_non_products() {
        let receipt = test_receipt();
        let lines = receipt.product_lines();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].description, "AH BIO MELK");
        assert_eq!(lines[1].description, "2 X PASTA SAUS");
        assert!(lines[1].is_bonus());
    }

    #[test]
    fn test_receipt_summary_rows() {
        let receipt = test_receipt();
        assert_eq!(receipt.total(), Some(3.59));
        assert_eq!(receipt.discount(), Some(0.5));
    }
}
