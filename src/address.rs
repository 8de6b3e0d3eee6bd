//! Splits a free-text US-style address into street and postal code.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::NOT_AVAILABLE;

lazy_static! {
    /// 5-digit ZIP closing the string, optionally with a +4 suffix. Group 1 is the 5-digit part.
    static ref POSTAL_RE: Regex = Regex::new(r"\b(\d{5})(?:-\d{4})?\s*$").expect("postal regex");

    /// Trailing ", ST 12345" or ", ST 12345-6789".
    static ref STATE_ZIP_SUFFIX_RE: Regex =
        Regex::new(r",\s*[A-Z]{2}\s*\d{5}(?:-\d{4})?\s*$").expect("state/zip regex");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub street: String,
    pub postal_code: String,
}

/// Parse `raw` into street and postal code.
///
/// The postal code is the ZIP token that ends the string, truncated to its
/// 5-digit prefix. A 5-digit house number earlier in the address is not a
/// postal code. When no trailing token exists the street is `raw` unchanged
/// and the postal code is [`NOT_AVAILABLE`].
pub fn parse_address(raw: &str) -> ParsedAddress {
    let Some(caps) = POSTAL_RE.captures(raw) else {
        return ParsedAddress {
            street: raw.to_string(),
            postal_code: NOT_AVAILABLE.to_string(),
        };
    };

    ParsedAddress {
        street: STATE_ZIP_SUFFIX_RE.replace(raw, "").trim().to_string(),
        postal_code: caps[1].to_string(),
    }
}
