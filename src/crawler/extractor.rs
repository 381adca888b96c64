//! Product page extraction
//!
//! Pulls the declared attributes out of a product page with CSS selectors.
//! A page only counts as usable when the primary attribute is present and
//! non-empty.

use crate::config::ExtractConfig;
use crate::ledger::RecordFields;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

struct CompiledField {
    name: String,
    selector: Selector,
    attribute: Option<String>,
}

/// Compiled set of attribute selectors
pub struct Extractor {
    fields: Vec<CompiledField>,
    primary: String,
}

impl Extractor {
    /// Compiles the configured selectors
    pub fn new(config: &ExtractConfig) -> Result<Self, ConfigError> {
        let fields = config
            .fields
            .iter()
            .map(|field| {
                let selector = Selector::parse(&field.selector).map_err(|e| {
                    ConfigError::InvalidSelector(format!("'{}': {}", field.selector, e))
                })?;
                Ok(CompiledField {
                    name: field.name.clone(),
                    selector,
                    attribute: field.attribute.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            fields,
            primary: config.primary.clone(),
        })
    }

    /// Name of the attribute that decides success
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Extracts declared attributes from a page
    ///
    /// Returns `None` when the primary attribute is missing or blank.
    /// Other attributes are included only when found.
    ///
    /// # Example
    ///
    /// ```
    /// use product_harvest::config::ExtractConfig;
    /// use product_harvest::crawler::Extractor;
    ///
    /// let extractor = Extractor::new(&ExtractConfig::default()).unwrap();
    /// let html = r#"<h1 class="page-title"><span class="base">Ring Aurora</span></h1>"#;
    /// let fields = extractor.extract(html).unwrap();
    /// assert_eq!(fields["product_name"], "Ring Aurora");
    /// ```
    pub fn extract(&self, html: &str) -> Option<RecordFields> {
        let document = Html::parse_document(html);
        let mut record = RecordFields::new();

        for field in &self.fields {
            if let Some(value) = document
                .select(&field.selector)
                .next()
                .and_then(|element| field_value(element, field.attribute.as_deref()))
            {
                record.insert(field.name.clone(), value);
            }
        }

        record.contains_key(&self.primary).then_some(record)
    }
}

/// Whitespace-collapsed text or attribute value; blank counts as absent
fn field_value(element: ElementRef<'_>, attribute: Option<&str>) -> Option<String> {
    let raw = match attribute {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<String>(),
    };
    let value = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!value.is_empty()).then_some(value)
}
