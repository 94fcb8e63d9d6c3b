//! Response sanitization.
//!
//! Models often wrap the payload in a fenced code block, sometimes with
//! chatter before or after it. Only the interior of the first fenced block
//! is kept. No grammar check happens here; see `validate`.

use std::sync::LazyLock;

use regex::Regex;

/// Opening fence with an optional info string, then the lazily matched body.
/// The closing fence must start its own line.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?sm)```[^\n`]*\r?\n(.*?)^[ \t]*```").expect("valid regex")
});

/// What a stage expects the model to have returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Html => "html",
            Self::Json => "json",
        })
    }
}

/// Interior of the first fenced block in `raw`, if any.
pub fn extract_fenced(raw: &str) -> Option<&str> {
    FENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Strip fence wrapping and surrounding whitespace from a model response.
///
/// Returns the trimmed fenced interior when a block is present, otherwise
/// the trimmed response. Malformed content passes through unchanged.
pub fn sanitize(raw: &str, kind: ContentKind) -> String {
    match extract_fenced(raw) {
        Some(inner) => {
            tracing::debug!(%kind, "stripped code fence from response");
            inner.trim().to_string()
        }
        None => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_with_tag() {
        let raw = "```json\n[{\"a\":1}]\n```";
        assert_eq!(sanitize(raw, ContentKind::Json), "[{\"a\":1}]");
    }

    #[test]
    fn fence_without_tag() {
        let raw = "```\n<html><body>hi</body></html>\n```";
        assert_eq!(sanitize(raw, ContentKind::Html), "<html><body>hi</body></html>");
    }

    #[test]
    fn explanatory_text_is_discarded() {
        let raw = "Sure! Here is your page:\n\n```html\n<!DOCTYPE html>\n<html></html>\n```\n\nLet me know if you need changes.";
        assert_eq!(
            sanitize(raw, ContentKind::Html),
            "<!DOCTYPE html>\n<html></html>"
        );
    }

    #[test]
    fn uppercase_tag_and_crlf() {
        let raw = "```HTML\r\n<p>x</p>\r\n```";
        assert_eq!(sanitize(raw, ContentKind::Html), "<p>x</p>");
    }

    #[test]
    fn first_block_wins() {
        let raw = "```json\n[1]\n```\nand also\n```json\n[2]\n```";
        assert_eq!(sanitize(raw, ContentKind::Json), "[1]");
    }

    #[test]
    fn backticks_inside_block_do_not_close_it() {
        let raw = "```html\n<p>Wrap code in ``` fences</p>\n<footer>end</footer>\n```";
        assert_eq!(
            sanitize(raw, ContentKind::Html),
            "<p>Wrap code in ``` fences</p>\n<footer>end</footer>"
        );
    }

    #[test]
    fn indented_closing_fence_and_empty_body() {
        assert_eq!(sanitize("```json\n[1]\n  ```", ContentKind::Json), "[1]");
        assert_eq!(extract_fenced("```\n```"), Some(""));
    }

    #[test]
    fn no_fence_returns_trimmed_input() {
        assert_eq!(
            sanitize("  \n<html></html>\n\n", ContentKind::Html),
            "<html></html>"
        );
        assert_eq!(sanitize("[1, 2, 3]", ContentKind::Json), "[1, 2, 3]");
    }

    #[test]
    fn malformed_payload_passes_through() {
        let raw = "```json\n[{\"a\":1,\n```";
        assert_eq!(sanitize(raw, ContentKind::Json), "[{\"a\":1,");
    }

    #[test]
    fn unterminated_fence_is_not_a_block() {
        let raw = "```html\n<html>";
        assert_eq!(extract_fenced(raw), None);
        assert_eq!(sanitize(raw, ContentKind::Html), raw);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "```json\n{\"k\": [1,2]}\n```",
            "plain text",
            "  <div>\n  </div>  ",
            "intro\n```\ncode\n```\noutro",
            "inline `tick` only",
        ];
        for raw in inputs {
            let once = sanitize(raw, ContentKind::Html);
            let twice = sanitize(&once, ContentKind::Html);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn output_never_starts_or_ends_with_fence() {
        for tag in ["", "json", "html", "javascript"] {
            let raw = format!("```{tag}\n  payload  \n```");
            let cleaned = sanitize(&raw, ContentKind::Json);
            assert_eq!(cleaned, "payload");
            assert!(!cleaned.starts_with("```"));
            assert!(!cleaned.ends_with("```"));
        }
    }
}
