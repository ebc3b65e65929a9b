// 🛒 Catalog Collaborator - Search capability and product records
//
// The catalog is owned by an external product-search service; everything here
// is read-only to the matcher. Search results are noisy (many irrelevant
// candidates per query) and the transport can fail per call, so failure is a
// recoverable, per-round event — never fatal for a receipt line.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// SEARCH CAPABILITY
// ============================================================================

/// Failure of a single catalog search call.
///
/// The resolver treats every variant the same way: log it and count the round
/// as "zero additional candidates". The variants exist so callers outside the
/// resolver can still tell transport trouble from service trouble.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("catalog search transport failed: {0}")]
    Transport(String),

    #[error("catalog search service returned status {status}")]
    Service { status: u16 },

    #[error("catalog search timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Text query → candidate product records.
///
/// The wire format and HTTP plumbing belong to the surrounding system; the
/// matcher only depends on this capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub products: Vec<CatalogProduct>,
}

// ============================================================================
// PRODUCT RECORD
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogProduct {
    /// Catalog id; absent for some ad-hoc entries, hence the title fallback
    /// in [`CatalogProduct::dedup_key`]
    pub webshop_id: Option<i64>,
    pub title: String,
    pub brand: Option<String>,
    pub sub_category: Option<String>,
    pub current_price: Option<f64>,
    pub price_before_bonus: Option<f64>,
    pub sales_unit_size: Option<String>,
    /// Present when the product is currently in a promotion
    pub discount_type: Option<String>,
    pub images: Vec<ProductImage>,
    pub nutritional_info: Option<NutritionalInfo>,
}

impl CatalogProduct {
    /// Price used for all comparisons: current price, falling back to the
    /// pre-bonus price when the current one is missing
    pub fn price(&self) -> Option<f64> {
        self.current_price.or(self.price_before_bonus)
    }

    /// Stable identity for deduplicating candidates across search rounds
    pub fn dedup_key(&self) -> String {
        match self.webshop_id {
            Some(id) => id.to_string(),
            None => self.title.clone(),
        }
    }

    /// Image handed to the presentation layer: prefer width 200, else
    /// width 400, else the first available one
    pub fn primary_image(&self) -> Option<&ProductImage> {
        select_image(&self.images)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Image selection policy: width 200 first, width 400 second, anything
/// third. The core never fetches the image.
pub fn select_image(images: &[ProductImage]) -> Option<&ProductImage> {
    images
        .iter()
        .find(|img| img.width == Some(200))
        .or_else(|| images.iter().find(|img| img.width == Some(400)))
        .or_else(|| images.first())
}

// ============================================================================
// NUTRITIONAL INFO (tagged variant instead of runtime shape-sniffing)
// ============================================================================

/// The upstream catalog serves nutrition data in three shapes: a free-text
/// blob, a list of nutrient rows, or a keyed map. Modelled as an explicit
/// tagged variant so downstream code never inspects JSON types at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NutritionalInfo {
    Table(Vec<NutrientRow>),
    Keyed(IndexMap<String, serde_json::Value>),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NutrientRow {
    #[serde(alias = "nutrient", alias = "label")]
    pub name: String,
    #[serde(alias = "amount", alias = "quantity")]
    pub value: serde_json::Value,
}

/// Map keys that are metadata, not nutrients
const NON_NUTRIENT_KEYS: &[&str] = &["table", "servingSize", "servingsPerContainer"];

impl NutritionalInfo {
    /// Normalize all three shapes to `(nutrient, value)` pairs; free text
    /// yields no rows (use [`NutritionalInfo::as_text`] for it)
    pub fn rows(&self) -> Vec<(String, String)> {
        match self {
            NutritionalInfo::Text(_) => Vec::new(),
            NutritionalInfo::Table(rows) => rows
                .iter()
                .filter(|row| !row.name.is_empty() && !row.value.is_null())
                .map(|row| (row.name.clone(), value_to_string(&row.value)))
                .collect(),
            NutritionalInfo::Keyed(map) => map
                .iter()
                .filter(|(key, value)| {
                    !NON_NUTRIENT_KEYS.contains(&key.as_str()) && !value.is_null()
                })
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NutritionalInfo::Text(text) => Some(text),
            _ => None,
        }
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str, width: Option<u32>) -> ProductImage {
        ProductImage {
            url: url.to_string(),
            width,
            height: width,
        }
    }

    #[test]
    fn test_select_image_prefers_200_then_400() {
        let images = vec![
            image("800.png", Some(800)),
            image("400.png", Some(400)),
            image("200.png", Some(200)),
        ];
        assert_eq!(select_image(&images).unwrap().url, "200.png");

        let images = vec![image("800.png", Some(800)), image("400.png", Some(400))];
        assert_eq!(select_image(&images).unwrap().url, "400.png");

        let images = vec![image("800.png", Some(800)), image("nosize.png", None)];
        assert_eq!(select_image(&images).unwrap().url, "800.png");

        assert!(select_image(&[]).is_none());
    }

    #[test]
    fn test_price_falls_back_to_pre_bonus() {
        let mut product = CatalogProduct {
            title: "AH Halfvolle Melk".to_string(),
            current_price: Some(1.09),
            price_before_bonus: Some(1.39),
            ..Default::default()
        };
        assert_eq!(product.price(), Some(1.09));

        product.current_price = None;
        assert_eq!(product.price(), Some(1.39));

        product.price_before_bonus = None;
        assert_eq!(product.price(), None);
    }

    #[test]
    fn test_dedup_key_id_then_title() {
        let with_id = CatalogProduct {
            webshop_id: Some(42),
            title: "AH Melk".to_string(),
            ..Default::default()
        };
        assert_eq!(with_id.dedup_key(), "42");

        let without_id = CatalogProduct {
            title: "AH Melk".to_string(),
            ..Default::default()
        };
        assert_eq!(without_id.dedup_key(), "AH Melk");
    }

    #[test]
    fn test_product_deserializes_catalog_wire_shape() {
        let product: CatalogProduct = serde_json::from_str(
            r#"{
                "webshopId": 12345,
                "title": "AH Biologisch Halfvolle Melk",
                "brand": "AH Biologisch",
                "subCategory": "Melk",
                "currentPrice": 1.09,
                "salesUnitSize": "1 l",
                "images": [{"url": "a.png", "width": 200, "height": 200}]
            }"#,
        )
        .unwrap();

        assert_eq!(product.webshop_id, Some(12345));
        assert_eq!(product.sub_category.as_deref(), Some("Melk"));
        assert_eq!(product.price(), Some(1.09));
        assert_eq!(product.primary_image().unwrap().url, "a.png");
    }

    #[test]
    fn test_nutritional_info_three_shapes() {
        let text: NutritionalInfo = serde_json::from_str(r#""Rijk aan calcium""#).unwrap();
        assert_eq!(text.as_text(), Some("Rijk aan calcium"));
        assert!(text.rows().is_empty());

        let table: NutritionalInfo = serde_json::from_str(
            r#"[{"name": "Energie", "value": "190 kJ"}, {"nutrient": "Vetten", "amount": 1.8}]"#,
        )
        .unwrap();
        let rows = table.rows();
        assert_eq!(rows[0], ("Energie".to_string(), "190 kJ".to_string()));
        assert_eq!(rows[1], ("Vetten".to_string(), "1.8".to_string()));

        let keyed: NutritionalInfo = serde_json::from_str(
            r#"{"energy": "190 kJ", "servingSize": "100 ml"}"#,
        )
        .unwrap();
        let rows = keyed.rows();
        assert_eq!(rows, vec![("energy".to_string(), "190 kJ".to_string())]);
    }
}
