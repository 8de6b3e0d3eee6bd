//! Locators and URLs for the map site's search UI.

use url::Url;

use crate::models::SearchTask;

const SEARCH_ENDPOINT: &str = "https://www.google.com/maps/search/";

/// Where things live on the map site. Every list is tried in order.
#[derive(Debug, Clone)]
pub struct MapsLayout {
    /// Base URL of the search endpoint
    pub search_endpoint: String,
    /// Locators for result entries in the results list
    pub entry_selectors: Vec<String>,
    /// Locators for the scrollable results container
    pub feed_selectors: Vec<String>,
    /// Present once a detail view has loaded
    pub detail_ready: String,
}

impl Default for MapsLayout {
    fn default() -> Self {
        Self {
            search_endpoint: SEARCH_ENDPOINT.to_string(),
            entry_selectors: vec![
                r#"div[role="feed"] div[aria-label][data-result-index]"#.to_string(),
                r#"div[role="feed"] a[aria-label]"#.to_string(),
                r#"div[role="feed"] a.hfpxzc"#.to_string(),
                r#"a[href*="/maps/place/"]"#.to_string(),
            ],
            feed_selectors: vec![
                r#"div[role="feed"]"#.to_string(),
                r#"div[aria-label*="Results"]"#.to_string(),
                r#"[role="main"]"#.to_string(),
                "body".to_string(),
            ],
            detail_ready: "h1".to_string(),
        }
    }
}

impl MapsLayout {
    /// Search URL for `task`, e.g. `...?api=1&hl=en&query=gun+clubs+in+Maryland`.
    pub fn search_url(&self, task: &SearchTask) -> anyhow::Result<Url> {
        let url = Url::parse_with_params(
            &self.search_endpoint,
            &[
                ("api", "1"),
                ("hl", "en"),
                ("query", task.search_text().as_str()),
            ],
        )?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query_and_area() {
        let layout = MapsLayout::default();
        let url = layout
            .search_url(&SearchTask::new("indoor shooting ranges", "Washington DC"))
            .unwrap();

        assert_eq!(url.host_str(), Some("www.google.com"));
        assert_eq!(url.path(), "/maps/search/");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("api".to_string(), "1".to_string())));
        assert!(query.contains(&(
            "query".to_string(),
            "indoor shooting ranges in Washington DC".to_string()
        )));
    }

    #[test]
    fn special_characters_survive_encoding() {
        let layout = MapsLayout::default();
        let url = layout.search_url(&SearchTask::new("guns & ammo", "St. Mary's, MD")).unwrap();
        let query = url.query_pairs().find(|(k, _)| k == "query").unwrap().1.into_owned();
        assert_eq!(query, "guns & ammo in St. Mary's, MD");
    }

    #[test]
    fn body_is_the_last_scroll_fallback() {
        let layout = MapsLayout::default();
        assert_eq!(layout.feed_selectors.last().map(String::as_str), Some("body"));
        assert!(!layout.entry_selectors.is_empty());
    }
}
