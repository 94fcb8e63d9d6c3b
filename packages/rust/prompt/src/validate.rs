//! Syntactic validation of sanitized content.
//!
//! Kept apart from `sanitize` so callers can opt into stricter
//! checks without changing how responses are cleaned.

use scraper::{Html, Selector};

use sitesmith_shared::{Result, SitesmithError};

use crate::sanitize::ContentKind;

/// Check that `content` is well-formed enough for `kind`.
///
/// JSON must parse. HTML must contain at least one element.
pub fn validate(content: &str, kind: ContentKind) -> Result<()> {
    if content.trim().is_empty() {
        return Err(SitesmithError::validation(format!("{kind} content is empty")));
    }

    match kind {
        ContentKind::Json => serde_json::from_str::<serde_json::Value>(content)
            .map(|_| ())
            .map_err(|e| SitesmithError::validation(format!("invalid JSON: {e}"))),
        ContentKind::Html => {
            // The fragment root is a synthetic <html>; anything beyond it is real markup.
            let doc = Html::parse_fragment(content);
            let any = Selector::parse("*").expect("valid selector");
            if doc.select(&any).count() > 1 {
                Ok(())
            } else {
                Err(SitesmithError::validation("no HTML elements found"))
            }
        }
    }
}

/// Check that `content` is a JSON array and return its length.
pub fn validate_records(content: &str) -> Result<usize> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| SitesmithError::validation(format!("invalid JSON: {e}")))?;

    value
        .as_array()
        .map(Vec::len)
        .ok_or_else(|| SitesmithError::validation("data is not a JSON array"))
}
