//! Per-category field selection
//!
//! Most event categories carry the product in `product_id`/`current_url`.
//! Some (the recommendation click events) describe the product being viewed
//! in `viewing_product_id` and the page it was viewed on in `referrer_url`.
//! The mapping from category to rule lives in configuration so new
//! categories need no code change.

use crate::config::FieldRule;
use crate::source::SourceDocument;
use std::collections::HashMap;

impl FieldRule {
    /// Picks `(product_id, url)` out of a document, if both are present
    pub fn select(&self, doc: &SourceDocument) -> Option<(String, String)> {
        let (id, url) = match self {
            FieldRule::ProductCurrent => (
                doc.product_id.as_ref().or(doc.viewing_product_id.as_ref()),
                doc.current_url.as_ref(),
            ),
            FieldRule::ViewingReferrer => {
                (doc.viewing_product_id.as_ref(), doc.referrer_url.as_ref())
            }
        };

        Some((id?.clone(), url?.clone()))
    }
}

/// Category → rule table with a fallback for unlisted categories
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: HashMap<String, FieldRule>,
    fallback: FieldRule,
}

impl RuleSet {
    pub fn new(rules: HashMap<String, FieldRule>) -> Self {
        Self {
            rules,
            fallback: FieldRule::ProductCurrent,
        }
    }

    /// Rule applying to documents of `category`
    pub fn rule_for(&self, category: &str) -> FieldRule {
        self.rules.get(category).copied().unwrap_or(self.fallback)
    }

    /// Picks `(product_id, url)` using the rule for the document's category
    pub fn select(&self, doc: &SourceDocument) -> Option<(String, String)> {
        self.rule_for(&doc.collection).select(doc)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(HashMap::from([(
            "product_view_all_recommend_clicked".to_string(),
            FieldRule::ViewingReferrer,
        )]))
    }
}
