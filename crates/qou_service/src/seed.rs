//! Seeding the products and suggestions indices from catalog CSVs.
//!
//! Products come from `products.csv` (`product_id,product_name,aisle_id,
//! department_id`), joined with `aisles.csv` (`aisle_id,aisle`). Each product
//! is indexed twice: as a searchable product document and as a completion
//! suggestion. Brands and dietary attributes are derived from the pattern
//! table, so seeding after a build keeps the catalog consistent with the
//! rules used to understand queries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use qou_common::{EntityLabel, PatternTable};
use qou_index::{IndexDocument, IndexError, SearchIndexClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::entities::PatternMatcher;
use crate::normalize::normalize;

/// Brand used when no `BRAND` rule matches a product name.
pub const FALLBACK_BRAND: &str = "Private Label";

/// Category used when a product's aisle is unknown.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Errors raised while seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// A CSV file could not be read or a row could not be decoded.
    #[error("failed to read {path}: {source}")]
    Csv {
        /// The CSV file.
        path: PathBuf,
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// An index request failed.
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    product_id: u64,
    product_name: String,
    aisle_id: u64,
    department_id: u64,
}

#[derive(Debug, Deserialize)]
struct AisleRow {
    aisle_id: u64,
    aisle: String,
}

/// A name/value attribute, indexed as a nested document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAttribute {
    /// Attribute name, such as `department_id`.
    pub name: String,
    /// Attribute value as shown to users.
    pub value: String,
}

/// Grocery-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroceryAttributes {
    /// Dietary attributes found in the product name.
    pub dietary: Vec<String>,
    /// Whether the name mentions "organic".
    pub is_organic: bool,
}

/// A product document in the products index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    /// Document id, `instacart-<row id>`.
    pub product_id: String,
    /// Product name from the catalog.
    pub name: String,
    /// Description; the catalog has none, so this repeats the name.
    pub description: String,
    /// Brand found in the name, or [`FALLBACK_BRAND`].
    pub brand: String,
    /// Aisle name, or [`UNKNOWN_CATEGORY`] when the aisle id is unknown.
    pub categories: Vec<String>,
    /// Nested name/value attributes.
    pub attributes: Vec<ProductAttribute>,
    /// Omitted from the document when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grocery_attributes: Option<GroceryAttributes>,
    /// Lowercased name and category, matched by the suggester.
    pub search_aid: String,
}

/// Counts of documents written by one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Product documents indexed.
    pub products: usize,
    /// Suggestion documents indexed.
    pub suggestions: usize,
    /// Indices created because they were absent.
    pub created_indices: usize,
}

/// Mappings of the products index.
pub fn products_mappings() -> Value {
    json!({
        "properties": {
            "product_id": { "type": "keyword" },
            "name": { "type": "text" },
            "description": { "type": "text" },
            "brand": { "type": "keyword" },
            "categories": { "type": "keyword" },
            "attributes": {
                "type": "nested",
                "properties": {
                    "name": { "type": "keyword" },
                    "value": { "type": "keyword" }
                }
            },
            "grocery_attributes": {
                "properties": {
                    "dietary": { "type": "keyword" },
                    "is_organic": { "type": "boolean" }
                }
            },
            "search_aid": { "type": "text" }
        }
    })
}

/// Mappings of the suggestions index.
pub fn suggestions_mappings() -> Value {
    json!({
        "properties": {
            "product_id": { "type": "keyword" },
            "product_name": { "type": "text" },
            "suggest": { "type": "completion" }
        }
    })
}

/// Builds catalog documents and writes them to the index.
pub struct Seeder {
    client: SearchIndexClient,
    products_index: String,
    suggestions_index: String,
    batch_size: usize,
    brands: PatternMatcher,
    dietary: PatternMatcher,
}

impl Seeder {
    /// Creates a seeder deriving brands and dietary attributes from `table`.
    pub fn new(
        client: SearchIndexClient,
        products_index: &str,
        suggestions_index: &str,
        batch_size: usize,
        table: &PatternTable,
    ) -> Self {
        Self {
            client,
            products_index: products_index.to_string(),
            suggestions_index: suggestions_index.to_string(),
            batch_size: batch_size.max(1),
            brands: PatternMatcher::for_label(table, &EntityLabel::Brand),
            dietary: PatternMatcher::for_label(table, &EntityLabel::DietaryAttribute),
        }
    }

    /// Reads the CSVs and builds one product per row.
    pub fn read_catalog(&self, products: &Path, aisles: &Path) -> Result<Vec<Product>, SeedError> {
        let aisles: HashMap<u64, String> = read_rows::<AisleRow>(aisles)?
            .into_iter()
            .map(|row| (row.aisle_id, row.aisle))
            .collect();
        let rows = read_rows::<ProductRow>(products)?;
        debug!(products = rows.len(), aisles = aisles.len(), "read catalog");
        Ok(rows
            .into_iter()
            .map(|row| {
                let aisle = aisles.get(&row.aisle_id).map(String::as_str);
                self.product(row, aisle)
            })
            .collect())
    }

    fn product(&self, row: ProductRow, aisle: Option<&str>) -> Product {
        let normalized = normalize(&row.product_name);
        let brand = self
            .brands
            .tag_text(&normalized)
            .into_iter()
            .next()
            .map_or_else(|| FALLBACK_BRAND.to_string(), |e| e.value);
        let dietary: Vec<String> = self
            .dietary
            .tag_text(&normalized)
            .into_iter()
            .map(|e| e.value)
            .collect();
        let is_organic = dietary.iter().any(|d| d == "organic");
        let category = aisle.unwrap_or(UNKNOWN_CATEGORY).to_string();

        Product {
            product_id: format!("instacart-{}", row.product_id),
            description: row.product_name.clone(),
            search_aid: format!("{} {}", row.product_name, category).to_lowercase(),
            name: row.product_name,
            brand,
            categories: vec![category],
            attributes: vec![ProductAttribute {
                name: "department_id".to_string(),
                value: row.department_id.to_string(),
            }],
            grocery_attributes: (!dietary.is_empty()).then_some(GroceryAttributes {
                dietary,
                is_organic,
            }),
        }
    }

    /// Creates missing indices, then bulk-indexes `products` in batches.
    pub async fn seed(
        &self,
        products: &[Product],
        cancel: &CancellationToken,
    ) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();
        for (index, mappings) in [
            (&self.products_index, products_mappings()),
            (&self.suggestions_index, suggestions_mappings()),
        ] {
            if self.client.index_exists(index, cancel).await? {
                debug!(index = %index, "index exists, keeping it");
            } else {
                self.client.create_index(index, mappings, cancel).await?;
                report.created_indices += 1;
            }
        }

        for batch in products.chunks(self.batch_size) {
            let (docs, suggestions) = documents(batch);
            report.products += self.client.index(&self.products_index, &docs, cancel).await?.indexed;
            report.suggestions += self
                .client
                .index(&self.suggestions_index, &suggestions, cancel)
                .await?
                .indexed;
            info!(
                products = report.products,
                total = products.len(),
                "indexed batch"
            );
        }
        Ok(report)
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, SeedError> {
    let csv_error = |source| SeedError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_error)
}

fn documents(batch: &[Product]) -> (Vec<IndexDocument>, Vec<IndexDocument>) {
    batch
        .iter()
        .map(|p| {
            let doc = IndexDocument {
                id: p.product_id.clone(),
                score: None,
                payload: json!(p),
            };
            let suggestion = IndexDocument {
                id: p.product_id.clone(),
                score: None,
                payload: json!({
                    "product_id": p.product_id,
                    "product_name": p.name,
                    "suggest": { "input": [p.name] }
                }),
            };
            (doc, suggestion)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bulk_ok, client_with, Recorder};
    use qou_common::PatternRule;
    use qou_index::{Method, WireBody, WireResponse};

    const PRODUCTS: &str = "\
product_id,product_name,aisle_id,department_id
1,Fage Total 2% Greek Yogurt,120,16
2,Organic Bananas,24,4
3,Chocolate Sandwich Cookies,999,19
";

    const AISLES: &str = "\
aisle_id,aisle
24,fresh fruits
120,yogurt
";

    fn table() -> PatternTable {
        PatternTable::new(vec![
            PatternRule {
                label: EntityLabel::Brand,
                pattern: "Fage".to_string(),
            },
            PatternRule {
                label: EntityLabel::DietaryAttribute,
                pattern: "organic".to_string(),
            },
            PatternRule {
                label: EntityLabel::Aisle,
                pattern: "yogurt".to_string(),
            },
        ])
    }

    fn write_csvs(dir: &Path) -> (PathBuf, PathBuf) {
        let products = dir.join("products.csv");
        let aisles = dir.join("aisles.csv");
        std::fs::write(&products, PRODUCTS).unwrap();
        std::fs::write(&aisles, AISLES).unwrap();
        (products, aisles)
    }

    fn responder(exists: bool) -> std::sync::Arc<Recorder> {
        Recorder::new(move |request| match (&request.method, &request.body) {
            (Method::Head, _) if exists => WireResponse::ok(Value::Null),
            (Method::Head, _) => WireResponse {
                status: 404,
                body: Value::Null,
            },
            (_, Some(WireBody::NdJson(body))) => WireResponse::ok(bulk_ok(body.lines().count() / 2)),
            _ => WireResponse::ok(json!({"acknowledged": true})),
        })
    }

    fn seeder(recorder: std::sync::Arc<Recorder>, batch_size: usize) -> Seeder {
        Seeder::new(
            client_with(recorder, 2, 1_000),
            "products_index",
            "suggestions_index",
            batch_size,
            &table(),
        )
    }

    #[test]
    fn catalog_rows_become_products() {
        let dir = tempfile::tempdir().unwrap();
        let (products, aisles) = write_csvs(dir.path());
        let catalog = seeder(responder(true), 10)
            .read_catalog(&products, &aisles)
            .unwrap();

        assert_eq!(catalog.len(), 3);
        let yogurt = &catalog[0];
        assert_eq!(yogurt.product_id, "instacart-1");
        assert_eq!(yogurt.brand, "fage");
        assert_eq!(yogurt.categories, vec!["yogurt"]);
        assert_eq!(yogurt.search_aid, "fage total 2% greek yogurt yogurt");
        assert!(yogurt.grocery_attributes.is_none());

        let bananas = &catalog[1];
        assert_eq!(bananas.brand, FALLBACK_BRAND);
        let grocery = bananas.grocery_attributes.as_ref().unwrap();
        assert!(grocery.is_organic);
        assert_eq!(grocery.dietary, vec!["organic"]);

        assert_eq!(catalog[2].categories, vec![UNKNOWN_CATEGORY]);
        assert_eq!(catalog[2].attributes[0].value, "19");
    }

    #[test]
    fn missing_csv_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("products.csv");
        let err = seeder(responder(true), 10)
            .read_catalog(&missing, &missing)
            .unwrap_err();
        match err {
            SeedError::Csv { path, .. } => assert_eq!(path, missing),
            other => panic!("expected Csv, got {other:?}"),
        }
    }

    #[test]
    fn malformed_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (products, aisles) = write_csvs(dir.path());
        std::fs::write(&products, "product_id,product_name,aisle_id,department_id\nx,Milk,1,1\n")
            .unwrap();
        assert!(matches!(
            seeder(responder(true), 10).read_catalog(&products, &aisles),
            Err(SeedError::Csv { .. })
        ));
    }

    #[tokio::test]
    async fn creates_absent_indices_and_indexes_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let (products, aisles) = write_csvs(dir.path());
        let recorder = responder(false);
        let seeder = seeder(recorder.clone(), 2);
        let catalog = seeder.read_catalog(&products, &aisles).unwrap();

        let report = seeder.seed(&catalog, &CancellationToken::new()).await.unwrap();
        assert_eq!(
            report,
            SeedReport {
                products: 3,
                suggestions: 3,
                created_indices: 2
            }
        );

        let requests = recorder.requests();
        let puts: Vec<_> = requests
            .iter()
            .filter(|r| r.method == Method::Put)
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(puts, vec!["products_index", "suggestions_index"]);

        let bulks: Vec<_> = requests
            .iter()
            .filter_map(|r| match &r.body {
                Some(WireBody::NdJson(body)) => Some(body.lines().count() / 2),
                _ => None,
            })
            .collect();
        assert_eq!(bulks, vec![2, 2, 1, 1]);
    }

    #[tokio::test]
    async fn existing_indices_are_kept() {
        let recorder = responder(true);
        let report = seeder(recorder.clone(), 10)
            .seed(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report, SeedReport::default());
        assert!(recorder.requests().iter().all(|r| r.method == Method::Head));
    }

    #[test]
    fn suggestion_documents_carry_completion_input() {
        let product = Product {
            product_id: "instacart-2".to_string(),
            name: "Organic Bananas".to_string(),
            description: "Organic Bananas".to_string(),
            brand: FALLBACK_BRAND.to_string(),
            categories: vec!["fresh fruits".to_string()],
            attributes: Vec::new(),
            grocery_attributes: None,
            search_aid: "organic bananas fresh fruits".to_string(),
        };
        let (docs, suggestions) = documents(&[product]);
        assert_eq!(docs[0].payload["brand"], FALLBACK_BRAND);
        assert!(docs[0].payload.get("grocery_attributes").is_none());
        assert_eq!(suggestions[0].payload["suggest"]["input"][0], "Organic Bananas");
        assert_eq!(suggestions[0].id, "instacart-2");
    }
}
