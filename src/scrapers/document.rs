use scraper::{Html, Selector};
use tracing::debug;

use super::traits::{DocumentView, PageSnapshot};

/// [`DocumentView`] over a parsed HTML snapshot.
pub struct HtmlDocument {
    document: Html,
    url: String,
    title: Option<String>,
}

impl HtmlDocument {
    pub fn parse(html: &str, url: impl Into<String>) -> Self {
        Self {
            document: Html::parse_document(html),
            url: url.into(),
            title: None,
        }
    }

    pub fn from_snapshot(snapshot: &PageSnapshot) -> Self {
        Self {
            document: Html::parse_document(&snapshot.html),
            url: snapshot.url.clone(),
            title: snapshot.title.clone().filter(|t| !t.trim().is_empty()),
        }
    }

    fn selector(selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping unparsable selector '{}': {:?}", selector, e);
                None
            }
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl DocumentView for HtmlDocument {
    fn text(&self, selector: &str) -> Option<String> {
        let selector = Self::selector(selector)?;
        let element = self.document.select(&selector).next()?;
        non_empty(element.text().collect::<String>())
    }

    fn attr(&self, selector: &str, name: &str) -> Option<String> {
        let selector = Self::selector(selector)?;
        let element = self.document.select(&selector).next()?;
        element.value().attr(name).map(str::to_string).and_then(non_empty)
    }

    fn count(&self, selector: &str) -> usize {
        Self::selector(selector)
            .map(|s| self.document.select(&s).count())
            .unwrap_or(0)
    }

    fn title(&self) -> Option<String> {
        self.title.clone().or_else(|| self.text("title"))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Liberty Range - Google Maps</title></head>
        <body>
          <h1><span>  Liberty Range </span></h1>
          <button data-item-id="address" aria-label="Address: 1 Gun Rd">
            <div class="fontBodyMedium">1 Gun Rd</div>
          </button>
          <a data-item-id="authority" href="https://libertyrange.example/"> site </a>
          <p class="empty">   </p>
          <img data-photo-index="0"><img data-photo-index="1">
        </body></html>"#;

    #[test]
    fn text_is_trimmed_first_match() {
        let doc = HtmlDocument::parse(PAGE, "https://maps.example/place/1");
        assert_eq!(doc.text("h1 span").as_deref(), Some("Liberty Range"));
        assert_eq!(doc.text("p.empty"), None);
        assert_eq!(doc.text("h2"), None);
    }

    #[test]
    fn attributes_and_counts() {
        let doc = HtmlDocument::parse(PAGE, "https://maps.example/place/1");
        assert_eq!(
            doc.attr("a[data-item-id=\"authority\"]", "href").as_deref(),
            Some("https://libertyrange.example/")
        );
        assert_eq!(doc.attr("h1", "href"), None);
        assert_eq!(doc.count("[data-photo-index]"), 2);
    }

    #[test]
    fn invalid_selector_matches_nothing() {
        let doc = HtmlDocument::parse(PAGE, "");
        assert_eq!(doc.text("h1[["), None);
        assert_eq!(doc.count(":::"), 0);
    }

    #[test]
    fn title_prefers_snapshot_title() {
        let from_html = HtmlDocument::parse(PAGE, "u");
        assert_eq!(from_html.title().as_deref(), Some("Liberty Range - Google Maps"));

        let snapshot = PageSnapshot {
            html: PAGE.to_string(),
            url: "u".to_string(),
            title: Some("Live Title".to_string()),
        };
        assert_eq!(HtmlDocument::from_snapshot(&snapshot).title().as_deref(), Some("Live Title"));
    }
}
