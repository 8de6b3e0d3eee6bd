//! Ordered lookup strategies: try A, else B, else C.

use tracing::debug;

use crate::scrapers::traits::DocumentView;

/// Attributes of a detail view that are resolved through a lookup chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Address,
    Phone,
    Website,
    Rating,
    ReviewCount,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Name,
        Field::Address,
        Field::Phone,
        Field::Website,
        Field::Rating,
        Field::ReviewCount,
    ];

    /// Key used for this field in configuration files.
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Address => "address",
            Field::Phone => "phone",
            Field::Website => "website",
            Field::Rating => "rating",
            Field::ReviewCount => "review_count",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Lookup used when a user supplies a single selector for this field.
    pub fn custom_lookup(self, selector: &str) -> Lookup {
        match self {
            Field::Website => Lookup::attr(selector, "href"),
            _ => Lookup::text(selector),
        }
    }
}

/// A single way of reading a value out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Text content of the first match.
    Text(String),
    /// Attribute value of the first match.
    Attr { selector: String, attr: String },
    /// `aria-label` of the first match, with `prefix` removed.
    /// A label lacking the prefix yields nothing; an empty prefix takes the whole label.
    AriaLabel { selector: String, prefix: String },
    /// Part of the document title before the given separator.
    TitleBefore(String),
}

impl Lookup {
    pub fn text(selector: &str) -> Self {
        Lookup::Text(selector.to_string())
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Lookup::Attr {
            selector: selector.to_string(),
            attr: attr.to_string(),
        }
    }

    pub fn aria_label(selector: &str, prefix: &str) -> Self {
        Lookup::AriaLabel {
            selector: selector.to_string(),
            prefix: prefix.to_string(),
        }
    }

    pub fn resolve(&self, doc: &dyn DocumentView) -> Option<String> {
        match self {
            Lookup::Text(selector) => doc.text(selector),
            Lookup::Attr { selector, attr } => doc.attr(selector, attr),
            Lookup::AriaLabel { selector, prefix } => {
                let label = doc.attr(selector, "aria-label")?;
                if prefix.is_empty() {
                    return Some(label);
                }
                let (_, rest) = label.split_once(prefix.as_str())?;
                let rest = rest.trim();
                (!rest.is_empty()).then(|| rest.to_string())
            }
            Lookup::TitleBefore(separator) => {
                let title = doc.title()?;
                let (head, _) = title.split_once(separator.as_str())?;
                let head = head.trim();
                (!head.is_empty()).then(|| head.to_string())
            }
        }
    }
}

/// Turns a raw lookup result into an accepted value, or rejects it.
pub type Accept = fn(&str) -> Option<String>;

fn accept_any(raw: &str) -> Option<String> {
    Some(raw.to_string())
}

/// Prioritized lookups for one field; the first accepted value wins.
#[derive(Debug, Clone)]
pub struct FieldChain {
    field: Field,
    lookups: Vec<Lookup>,
    accept: Accept,
}

impl FieldChain {
    pub fn new(field: Field, lookups: Vec<Lookup>) -> Self {
        Self {
            field,
            lookups,
            accept: accept_any,
        }
    }

    pub fn with_accept(mut self, accept: Accept) -> Self {
        self.accept = accept;
        self
    }

    /// Try `lookup` before every existing strategy.
    pub fn prepend(&mut self, lookup: Lookup) {
        self.lookups.insert(0, lookup);
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn lookups(&self) -> &[Lookup] {
        &self.lookups
    }

    pub fn first_match(&self, doc: &dyn DocumentView) -> Option<String> {
        for lookup in &self.lookups {
            let Some(raw) = lookup.resolve(doc) else {
                continue;
            };
            match (self.accept)(&raw) {
                Some(value) => return Some(value),
                None => debug!("{}: rejected '{}' from {:?}", self.field.key(), raw, lookup),
            }
        }
        debug!("{}: no strategy matched", self.field.key());
        None
    }
}
