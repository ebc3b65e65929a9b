// 📚 Category Synonyms - Fallback search terms as data
//
// When a receipt line scores poorly against the initial search, the resolver
// broadens the query using category synonyms ("pasta" → tortelloni, ravioli,
// ...). The lookup is an explicit ORDERED list evaluated top to bottom with
// the first matching key winning; the fallback behavior depends on that
// order, so it is part of the contract, not an implementation detail.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// SYNONYM ENTRY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymEntry {
    /// Generic category term matched as a case-insensitive substring of the
    /// search query
    pub key: String,

    /// Specific product-name variants to search for, one catalog query each
    pub synonyms: Vec<String>,
}

// ============================================================================
// SYNONYM TABLE
// ============================================================================

/// Ordered `(key, synonyms)` pairs; read-only static configuration, safe to
/// share across concurrent line matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymTable {
    entries: Vec<SynonymEntry>,
}

impl SynonymTable {
    pub fn new(entries: Vec<SynonymEntry>) -> Self {
        SynonymTable { entries }
    }

    pub fn from_pairs(pairs: &[(&str, &[&str])]) -> Self {
        SynonymTable {
            entries: pairs
                .iter()
                .map(|(key, synonyms)| SynonymEntry {
                    key: key.to_string(),
                    synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    /// Load a table from a JSON file: `[{"key": "...", "synonyms": [...]}]`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read synonym file: {:?}", path.as_ref()))?;

        let entries: Vec<SynonymEntry> =
            serde_json::from_str(&content).context("Failed to parse synonym JSON")?;

        Ok(SynonymTable::new(entries))
    }

    /// First entry whose key appears (case-insensitively) inside the query.
    /// First match wins; later entries are never consulted.
    pub fn lookup(&self, query: &str) -> Option<&SynonymEntry> {
        let query_lower = query.to_lowercase();
        self.entries
            .iter()
            .find(|entry| query_lower.contains(&entry.key.to_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empty table: never expands
    pub fn none() -> Self {
        SynonymTable::new(Vec::new())
    }

    /// First-round expansion: categories whose receipt wording rarely
    /// matches catalog titles directly
    pub fn primary() -> Self {
        SynonymTable::from_pairs(&[
            (
                "pasta",
                &[
                    "tortelloni",
                    "ravioli",
                    "lasagne",
                    "penne",
                    "spaghetti",
                    "tagliatelle",
                ],
            ),
            ("brood", &["baguette", "stokbrood", "broodje", "bolletje"]),
            ("kaas", &["geraspte kaas", "plakjes", "kaasblok"]),
        ])
    }

    /// Second-round, broader expansion used only when the first round still
    /// leaves a negative top score
    pub fn broader() -> Self {
        SynonymTable::from_pairs(&[
            (
                "spinazie",
                &[
                    "spinazie",
                    "bladspinazie",
                    "verse spinazie",
                    "diepvries spinazie",
                    "spinazie 250g",
                    "spinazie 450g",
                ],
            ),
            (
                "pasta",
                &[
                    "tortelloni",
                    "ravioli",
                    "lasagne",
                    "penne",
                    "spaghetti",
                    "tagliatelle",
                    "verse pasta",
                ],
            ),
            (
                "salade",
                &["sla", "voorgesneden sla", "kropsla", "ijsbergsla"],
            ),
        ])
    }
}

// ============================================================================
// TESTS
// ============================================================================
