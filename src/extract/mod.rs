//! Field extraction from a loaded detail view.
//!
//! Each attribute is resolved through its own [`FieldChain`]. A field whose
//! strategies all miss falls back to its sentinel; only a detail view without
//! a primary heading fails the whole record.

pub mod lookup;
pub mod reviews;

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::address::parse_address;
use crate::error::ExtractionError;
use crate::models::{BusinessRecord, SearchTask, NOT_AVAILABLE};
use crate::scrapers::traits::DocumentView;

pub use lookup::{Field, FieldChain, Lookup};

/// Title suffix the map site appends to place pages.
const TITLE_SEPARATOR: &str = " - Google Maps";

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    heading: String,
    photos: String,
    name: FieldChain,
    address: FieldChain,
    phone: FieldChain,
    website: FieldChain,
    rating: FieldChain,
    review_count: FieldChain,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self {
            heading: "h1".to_string(),
            photos: "[data-photo-index]".to_string(),
            name: FieldChain::new(
                Field::Name,
                vec![
                    Lookup::text("h1 span"),
                    Lookup::text("h1"),
                    Lookup::text("[role=\"main\"] h1"),
                    Lookup::TitleBefore(TITLE_SEPARATOR.to_string()),
                ],
            ),
            address: FieldChain::new(
                Field::Address,
                vec![
                    Lookup::text("[data-item-id=\"address\"] .fontBodyMedium"),
                    Lookup::text("button[data-item-id=\"address\"] span[class*=\"fontBody\"]"),
                    Lookup::text("[data-value=\"Address\"]"),
                    Lookup::aria_label("button[data-item-id=\"address\"]", "Address: "),
                    Lookup::aria_label("button[aria-label*=\"Address\"]", "Address: "),
                ],
            ),
            phone: FieldChain::new(
                Field::Phone,
                vec![
                    Lookup::text("[data-item-id*=\"phone\"] .fontBodyMedium"),
                    Lookup::text("button[data-item-id*=\"phone\"] span[class*=\"fontBody\"]"),
                    Lookup::aria_label("button[data-item-id^=\"phone:tel:\"]", "Phone: "),
                    Lookup::aria_label("button[aria-label*=\"Phone\"]", "Phone: "),
                ],
            ),
            website: FieldChain::new(
                Field::Website,
                vec![
                    Lookup::attr("a[data-item-id=\"authority\"]", "href"),
                    Lookup::attr("[data-item-id=\"authority\"] a", "href"),
                    Lookup::attr("a[data-value*=\"website\"]", "href"),
                    Lookup::attr("a[aria-label*=\"Website\"]", "href"),
                    Lookup::aria_label("button[data-item-id=\"authority\"]", "Website: "),
                ],
            )
            .with_accept(accept_website),
            rating: FieldChain::new(
                Field::Rating,
                vec![
                    Lookup::text(".fontDisplayLarge"),
                    Lookup::aria_label("span[role=\"img\"][aria-label*=\"star\"]", ""),
                    Lookup::text(".F7nice span"),
                ],
            )
            .with_accept(reviews::accept_rating),
            review_count: FieldChain::new(
                Field::ReviewCount,
                vec![
                    Lookup::text(".F7nice .fontBodySmall"),
                    Lookup::aria_label("button[aria-label*=\"reviews\"]", ""),
                    Lookup::text("button[aria-label*=\"review\"] .fontBodySmall"),
                ],
            )
            .with_accept(reviews::accept_review_count),
        }
    }
}

fn accept_website(raw: &str) -> Option<String> {
    (!raw.contains("google.com")).then(|| raw.to_string())
}

impl FieldExtractor {
    /// Prepend user-supplied selectors (keyed by [`Field::key`]) to the built-in chains.
    pub fn with_custom_selectors(mut self, selectors: &BTreeMap<String, String>) -> Self {
        for (key, selector) in selectors {
            match Field::from_key(key) {
                Some(field) => self.chain_mut(field).prepend(field.custom_lookup(selector)),
                None => warn!("Ignoring custom selector for unknown field '{}'", key),
            }
        }
        self
    }

    pub fn chain(&self, field: Field) -> &FieldChain {
        match field {
            Field::Name => &self.name,
            Field::Address => &self.address,
            Field::Phone => &self.phone,
            Field::Website => &self.website,
            Field::Rating => &self.rating,
            Field::ReviewCount => &self.review_count,
        }
    }

    fn chain_mut(&mut self, field: Field) -> &mut FieldChain {
        match field {
            Field::Name => &mut self.name,
            Field::Address => &mut self.address,
            Field::Phone => &mut self.phone,
            Field::Website => &mut self.website,
            Field::Rating => &mut self.rating,
            Field::ReviewCount => &mut self.review_count,
        }
    }

    /// Build a record for `task` from the detail view `doc`.
    pub fn extract(
        &self,
        doc: &dyn DocumentView,
        task: &SearchTask,
    ) -> Result<BusinessRecord, ExtractionError> {
        if doc.count(&self.heading) == 0 {
            return Err(ExtractionError::MissingHeading);
        }

        let mut record = BusinessRecord::unknown(task);

        if let Some(name) = self.name.first_match(doc) {
            record.name = name;
        }

        if let Some(full_address) = self.address.first_match(doc) {
            let parsed = parse_address(&full_address);
            record.street = parsed.street;
            record.postal_code = parsed.postal_code;
            record.full_address = full_address;
        }

        if let Some(phone) = self.phone.first_match(doc) {
            record.phone = phone;
        }
        if let Some(website) = self.website.first_match(doc) {
            record.website = website;
        }

        let rating = self.rating.first_match(doc);
        let review_count = self.review_count.first_match(doc);
        record.reviews_summary = reviews::summarize(rating.as_deref(), review_count.as_deref());
        record.rating = rating.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        record.review_count = review_count.unwrap_or_else(|| NOT_AVAILABLE.to_string());

        record.photo_count = u32::try_from(doc.count(&self.photos)).unwrap_or(u32::MAX);

        let url = doc.url().trim();
        if !url.is_empty() {
            record.source_url = url.to_string();
        }

        debug!("Extracted '{}' ({})", record.name, record.full_address);
        Ok(record)
    }
}
