use serde::{Deserialize, Serialize};

/// Marker for a value that could not be found on the page.
pub const NOT_AVAILABLE: &str = "N/A";

/// Name used when no heading text or title could be resolved.
pub const UNKNOWN_NAME: &str = "Unknown";

/// One business listing extracted from a detail view.
///
/// Field order is the column order of the CSV export; every field is always
/// populated, unknown values carry [`NOT_AVAILABLE`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessRecord {
    pub name: String,
    pub website: String,
    pub phone: String,
    pub full_address: String,
    pub street: String,
    pub postal_code: String,
    #[serde(rename = "reviews")]
    pub reviews_summary: String,
    pub rating: String,
    pub review_count: String,
    pub photo_count: u32,
    #[serde(rename = "location_link")]
    pub source_url: String,
    pub search_query: String,
    pub search_area: String,
}

impl BusinessRecord {
    /// Column headers of the tabular export, in order.
    pub const COLUMNS: [&'static str; 13] = [
        "name",
        "website",
        "phone",
        "full_address",
        "street",
        "postal_code",
        "reviews",
        "rating",
        "review_count",
        "photo_count",
        "location_link",
        "search_query",
        "search_area",
    ];

    /// A record for `task` with every field set to its sentinel.
    pub fn unknown(task: &SearchTask) -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            name: UNKNOWN_NAME.to_string(),
            website: na(),
            phone: na(),
            full_address: na(),
            street: na(),
            postal_code: na(),
            reviews_summary: na(),
            rating: na(),
            review_count: na(),
            photo_count: 0,
            source_url: na(),
            search_query: task.query.clone(),
            search_area: task.area.clone(),
        }
    }

    pub fn identifier(&self) -> Identifier {
        Identifier {
            name: self.name.clone(),
            full_address: self.full_address.clone(),
        }
    }
}

/// Deduplication key: name and address exactly as extracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub full_address: String,
}

/// One (query, area) search unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTask {
    pub query: String,
    pub area: String,
}

impl SearchTask {
    pub fn new(query: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            area: area.into(),
        }
    }

    /// Every query paired with every area, query-major.
    pub fn cartesian(queries: &[String], areas: &[String]) -> Vec<SearchTask> {
        queries
            .iter()
            .flat_map(|q| areas.iter().map(move |a| SearchTask::new(q.clone(), a.clone())))
            .collect()
    }

    /// Free text typed into the map search box.
    pub fn search_text(&self) -> String {
        format!("{} in {}", self.query, self.area)
    }
}

impl std::fmt::Display for SearchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' in '{}'", self.query, self.area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_is_query_major() {
        let queries = vec!["ranges".to_string(), "clubs".to_string()];
        let areas = vec!["DC".to_string(), "VA".to_string(), "MD".to_string()];
        let tasks = SearchTask::cartesian(&queries, &areas);

        assert_eq!(tasks.len(), 6);
        assert_eq!(tasks[0], SearchTask::new("ranges", "DC"));
        assert_eq!(tasks[2], SearchTask::new("ranges", "MD"));
        assert_eq!(tasks[3], SearchTask::new("clubs", "DC"));
    }

    #[test]
    fn unknown_record_has_every_sentinel() {
        let record = BusinessRecord::unknown(&SearchTask::new("gun clubs", "Maryland"));
        assert_eq!(record.name, UNKNOWN_NAME);
        assert_eq!(record.website, NOT_AVAILABLE);
        assert_eq!(record.reviews_summary, NOT_AVAILABLE);
        assert_eq!(record.source_url, NOT_AVAILABLE);
        assert_eq!(record.photo_count, 0);
        assert_eq!(record.search_area, "Maryland");
    }

    #[test]
    fn serialized_keys_follow_export_columns() {
        let record = BusinessRecord::unknown(&SearchTask::new("q", "a"));
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), BusinessRecord::COLUMNS.len());
        for column in BusinessRecord::COLUMNS {
            assert!(object.contains_key(column), "missing column {column}");
        }
    }
}
