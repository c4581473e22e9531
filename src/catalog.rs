//! Product catalog and search-result formatting
//!
//! The catalog is immutable after construction and shared read-only
//! between all conversations.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

const NO_PRODUCTS_MESSAGE: &str =
    "I couldn't find any products in your query. Could you specify what you'd like to order?";

/// A catalog entry, or the sentinel record for an unknown mention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: f64,
    pub in_stock: bool,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, price: f64, in_stock: bool) -> Self {
        Self {
            name: name.into(),
            price,
            in_stock,
        }
    }

    /// Record returned for mentions the catalog does not carry
    pub fn unknown(mention: &str) -> Self {
        Self::new(mention, 0.0, false)
    }
}

/// Lookup results keyed by the mention text, in first-insertion order.
///
/// Serializes as a JSON object whose key order matches insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults(Vec<(String, ProductRecord)>);

impl SearchResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced entry keeps its original position
    pub fn insert(&mut self, mention: impl Into<String>, record: ProductRecord) {
        let mention = mention.into();
        if let Some(slot) = self.0.iter_mut().find(|(key, _)| *key == mention) {
            slot.1 = record;
        } else {
            self.0.push((mention, record));
        }
    }

    pub fn get(&self, mention: &str) -> Option<&ProductRecord> {
        self.0
            .iter()
            .find(|(key, _)| key == mention)
            .map(|(_, record)| record)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProductRecord)> {
        self.0.iter().map(|(key, record)| (key.as_str(), record))
    }

}

impl FromIterator<(String, ProductRecord)> for SearchResults {
    fn from_iter<I: IntoIterator<Item = (String, ProductRecord)>>(iter: I) -> Self {
        let mut results = SearchResults::new();
        for (mention, record) in iter {
            results.insert(mention, record);
        }
        results
    }
}

impl Serialize for SearchResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (mention, record) in &self.0 {
            map.serialize_entry(mention, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SearchResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = SearchResults;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of product mentions to product records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = SearchResults::new();
                while let Some((mention, record)) = access.next_entry::<String, ProductRecord>()? {
                    results.insert(mention, record);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultsVisitor)
    }
}

/// Static product table
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    entries: Vec<(String, ProductRecord)>,
    index: HashMap<String, usize>,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::from_entries([
            ("apple", ProductRecord::new("Apple", 1.50, true)),
            ("orange", ProductRecord::new("Orange", 2.00, true)),
            ("pineapple", ProductRecord::new("Pineapple", 5.00, false)),
            ("banana", ProductRecord::new("Banana", 1.00, true)),
            ("grape", ProductRecord::new("Grape", 3.00, true)),
            ("milk", ProductRecord::new("Milk", 2.50, true)),
            ("bread", ProductRecord::new("Bread", 3.00, true)),
        ])
    }
}

impl ProductCatalog {
    /// Build a catalog; keys are normalized the same way mentions are
    pub fn from_entries<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, ProductRecord)>) -> Self {
        let mut catalog = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for (key, record) in entries {
            let key = normalize(key.as_ref());
            if let Some(&pos) = catalog.index.get(&key) {
                catalog.entries[pos].1 = record;
            } else {
                catalog.index.insert(key.clone(), catalog.entries.len());
                catalog.entries.push((key, record));
            }
        }
        catalog
    }

    /// Resolve a mention. Total: unknown mentions yield the sentinel record.
    pub fn lookup(&self, mention: &str) -> ProductRecord {
        self.index
            .get(&normalize(mention))
            .map_or_else(|| ProductRecord::unknown(mention), |&pos| self.entries[pos].1.clone())
    }

    /// Look up every mention, keyed by the mention as written
    pub fn search<S: AsRef<str>>(&self, mentions: &[S]) -> SearchResults {
        mentions
            .iter()
            .map(|m| (m.as_ref().to_string(), self.lookup(m.as_ref())))
            .collect()
    }

    /// Catalog entries whose key or display name occurs in `query`, keyed by
    /// catalog key. Used to repair snapshots that lost their search results.
    pub fn reconstruct_from_query(&self, query: &str) -> SearchResults {
        let query = query.to_lowercase();
        self.entries
            .iter()
            .filter(|(key, record)| {
                query.contains(key.as_str()) || query.contains(&record.name.to_lowercase())
            })
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }
}

fn normalize(mention: &str) -> String {
    mention.trim().to_lowercase()
}

/// Human-readable summary split into available and unavailable products
pub fn format_results(results: &SearchResults) -> String {
    if results.is_empty() {
        return NO_PRODUCTS_MESSAGE.to_string();
    }

    let mut available = Vec::new();
    let mut unavailable = Vec::new();
    for (mention, record) in results.iter() {
        if record.in_stock {
            available.push(format!("{} (${:.2})", record.name, record.price));
        } else {
            unavailable.push(title_case(mention));
        }
    }

    if available.is_empty() {
        return format!(
            "❌ Sorry, none of these products are available: {}",
            unavailable.join(", ")
        );
    }

    let mut message = format!("✅ Available: {}", available.join(", "));
    if !unavailable.is_empty() {
        message.push_str(&format!("\n❌ Not available: {}", unavailable.join(", ")));
    }
    message.push_str("\n\nWould you like to order any of these? 😊");
    message
}

/// Message used when extraction found nothing to look up
pub fn no_products_message() -> &'static str {
    NO_PRODUCTS_MESSAGE
}

/// Only the in-stock entries, order preserved
pub fn available_subset(results: &SearchResults) -> SearchResults {
    results
        .iter()
        .filter(|(_, record)| record.in_stock)
        .map(|(mention, record)| (mention.to_string(), record.clone()))
        .collect()
}

/// Unrounded `price * quantity`
pub fn order_total(product: &ProductRecord, quantity: u32) -> f64 {
    product.price * f64::from(quantity)
}

pub fn format_order_confirmation(product: &ProductRecord, quantity: u32) -> String {
    format!(
        "Order confirmed: {quantity} {}(s) for ${:.2}\n\nThank you for your order! 🎉",
        product.name,
        order_total(product, quantity)
    )
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
