use lazy_static::lazy_static;
use regex::Regex;

use crate::models::NOT_AVAILABLE;

lazy_static! {
    /// Ratings run 0 to 5 with at most one decimal.
    static ref DECIMAL_RE: Regex = Regex::new(r"^[0-5](?:[.,]\d)?$").expect("decimal regex");
    static ref STARS_RE: Regex = Regex::new(r"(?i)(?:^|[^\d.,])([0-5](?:[.,]\d)?)\s*star").expect("stars regex");
    static ref COUNT_RE: Regex = Regex::new(r"\d{1,3}(?:,\d{3})+|\d+").expect("count regex");
}

/// Accept a rating written as a bare decimal ("4.7") or inside a star label
/// ("4.7 stars"). Anything else is text a loose selector picked up by mistake.
pub fn accept_rating(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if DECIMAL_RE.is_match(raw) {
        return Some(raw.to_string());
    }
    STARS_RE.captures(raw).map(|caps| caps[1].to_string())
}

/// First number in `raw`, thousands separators allowed ("(1,234)" -> "1,234").
pub fn accept_review_count(raw: &str) -> Option<String> {
    COUNT_RE.find(raw).map(|m| m.as_str().to_string())
}

/// Human-readable combination of rating and review count.
pub fn summarize(rating: Option<&str>, review_count: Option<&str>) -> String {
    match (rating, review_count) {
        (Some(rating), Some(count)) => format!("{rating} stars ({count} reviews)"),
        (Some(rating), None) => format!("{rating} stars"),
        (None, Some(count)) => format!("({count} reviews)"),
        (None, None) => NOT_AVAILABLE.to_string(),
    }
}
