//! Entity pattern tables produced by the pattern generator.
//!
//! The generated artifact is a JSON array of `{"label": ..., "pattern": ...}`
//! objects. Each rule says that a phrase (the pattern) denotes an entity of
//! the given label, e.g. `{"label": "BRAND", "pattern": "chobani"}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced when a pattern table cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// The payload is not a JSON array of pattern rules.
    #[error("invalid pattern table: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed but contains no rules.
    #[error("pattern table is empty")]
    Empty,

    /// A rule has a blank pattern string.
    #[error("rule {index} has an empty pattern")]
    BlankPattern {
        /// Zero-based position of the offending rule.
        index: usize,
    },
}

/// The entity type a pattern rule assigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityLabel {
    /// A product brand, e.g. "chobani".
    Brand,
    /// A store aisle, e.g. "yogurt".
    Aisle,
    /// A store department, e.g. "dairy eggs".
    Department,
    /// A dietary attribute such as "organic" or "vegan".
    DietaryAttribute,
    /// A grocery attribute (treated like a dietary attribute).
    GroceryAttribute,
    /// A product type, e.g. "greek yogurt".
    ProductType,
    /// Any label not known to the rewriter; kept verbatim.
    Other(String),
}

impl EntityLabel {
    /// Returns the wire name of the label (`BRAND`, `AISLE`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            EntityLabel::Brand => "BRAND",
            EntityLabel::Aisle => "AISLE",
            EntityLabel::Department => "DEPARTMENT",
            EntityLabel::DietaryAttribute => "DIETARY_ATTRIBUTE",
            EntityLabel::GroceryAttribute => "GROCERY_ATTRIBUTE",
            EntityLabel::ProductType => "PRODUCT_TYPE",
            EntityLabel::Other(s) => s,
        }
    }
}

impl From<String> for EntityLabel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "BRAND" => EntityLabel::Brand,
            "AISLE" => EntityLabel::Aisle,
            "DEPARTMENT" => EntityLabel::Department,
            "DIETARY_ATTRIBUTE" => EntityLabel::DietaryAttribute,
            "GROCERY_ATTRIBUTE" => EntityLabel::GroceryAttribute,
            "PRODUCT_TYPE" => EntityLabel::ProductType,
            _ => EntityLabel::Other(s),
        }
    }
}

impl From<EntityLabel> for String {
    fn from(label: EntityLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single phrase-to-entity rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// The entity label assigned to matches of `pattern`.
    pub label: EntityLabel,
    /// The phrase to match.
    pub pattern: String,
}

/// An ordered collection of pattern rules.
///
/// Order matters: when two rules match the same span, the earlier rule wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternTable {
    rules: Vec<PatternRule>,
}

impl PatternTable {
    /// Creates a table from an ordered list of rules.
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Parses and validates a pattern table from its JSON encoding.
    ///
    /// Fails if the JSON is malformed, the table is empty, or any rule has a
    /// blank pattern.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PatternError> {
        let rules: Vec<PatternRule> = serde_json::from_slice(bytes)?;
        if rules.is_empty() {
            return Err(PatternError::Empty);
        }
        if let Some(index) = rules.iter().position(|r| r.pattern.trim().is_empty()) {
            return Err(PatternError::BlankPattern { index });
        }
        Ok(Self { rules })
    }

    /// Serializes the table to pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, PatternError> {
        Ok(serde_json::to_vec_pretty(&self.rules)?)
    }

    /// Returns the rules in table order.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over the patterns carrying the given label.
    pub fn patterns_for<'a>(&'a self, label: &'a EntityLabel) -> impl Iterator<Item = &'a str> {
        self.rules
            .iter()
            .filter(move |r| &r.label == label)
            .map(|r| r.pattern.as_str())
    }
}
