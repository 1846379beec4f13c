//! Allow-list HTML sanitizer used by text and html fields.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("token pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/"'>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

/// Tags whose inner content is dropped along with the tag itself.
const NON_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "noscript"];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action"];

/// Tags accepted by html fields unless configured otherwise.
pub const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "p", "a", "ul", "ol", "nl", "li", "b", "i",
    "u", "strong", "em", "strike", "code", "hr", "br", "div", "span", "table", "thead", "caption",
    "tbody", "tr", "th", "td", "pre", "img", "video", "iframe",
];

/// Per-tag attributes accepted by html fields unless configured otherwise.
pub fn default_allowed_attributes() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 4] = [
        ("a", &["href", "name", "target"]),
        ("img", &["src", "style", "width", "height", "id", "class"]),
        ("iframe", &["src", "width", "height", "frameborder", "allowfullscreen"]),
        ("video", &["src", "width", "height", "controls"]),
    ];
    entries
        .into_iter()
        .map(|(tag, attrs)| {
            (
                tag.to_string(),
                attrs.iter().map(|attr| attr.to_string()).collect(),
            )
        })
        .collect()
}

/// Which markup survives sanitization.
#[derive(Debug, Clone, Default)]
pub struct SanitizePolicy {
    allowed_tags: BTreeSet<String>,
    allowed_attributes: BTreeMap<String, BTreeSet<String>>,
}

/// Output of a sanitizer pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub html: String,
    /// True when any tag, attribute, comment or non-text block was removed.
    pub stripped: bool,
}

impl SanitizePolicy {
    /// Policy that strips every tag, keeping only text.
    pub fn strip_all() -> Self {
        Self::default()
    }

    pub fn new<T, A>(tags: T, attributes: &BTreeMap<String, A>) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        A: AsRef<[String]>,
    {
        Self {
            allowed_tags: tags
                .into_iter()
                .map(|tag| tag.as_ref().to_ascii_lowercase())
                .collect(),
            allowed_attributes: attributes
                .iter()
                .map(|(tag, attrs)| {
                    (
                        tag.to_ascii_lowercase(),
                        attrs
                            .as_ref()
                            .iter()
                            .map(|attr| attr.to_ascii_lowercase())
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    fn allows_tag(&self, tag: &str) -> bool {
        self.allowed_tags.contains(tag)
    }

    fn allows_attribute(&self, tag: &str, attribute: &str) -> bool {
        ["*", tag].iter().any(|key| {
            self.allowed_attributes
                .get(*key)
                .is_some_and(|attrs| attrs.contains(attribute))
        })
    }

    /// Sanitize `input` against this policy.
    pub fn sanitize(&self, input: &str) -> Sanitized {
        let mut html = String::with_capacity(input.len());
        let mut stripped = false;
        let mut skipping: Option<String> = None;
        let mut cursor = 0;

        for token in TOKEN.captures_iter(input) {
            let whole = token.get(0).map_or(cursor..cursor, |m| m.range());
            if skipping.is_none() {
                html.push_str(&input[cursor..whole.start]);
            }
            cursor = whole.end;

            let Some(name) = token.get(2) else {
                // comment
                stripped = true;
                continue;
            };
            let tag = name.as_str().to_ascii_lowercase();
            let closing = token.get(1).is_some_and(|m| !m.as_str().is_empty());

            if let Some(open) = &skipping {
                if closing && *open == tag {
                    skipping = None;
                }
                continue;
            }

            if !self.allows_tag(&tag) {
                stripped = true;
                if !closing && NON_TEXT_TAGS.contains(&tag.as_str()) {
                    skipping = Some(tag);
                }
                continue;
            }

            if closing {
                html.push_str(&format!("</{tag}>"));
                continue;
            }

            let raw_attributes = token.get(3).map_or("", |m| m.as_str());
            let self_closing = raw_attributes.trim_end().ends_with('/');
            html.push('<');
            html.push_str(&tag);
            for attribute in ATTRIBUTE.captures_iter(raw_attributes) {
                let name = attribute[1].to_ascii_lowercase();
                let value = attribute
                    .get(2)
                    .or_else(|| attribute.get(3))
                    .or_else(|| attribute.get(4))
                    .map(|m| m.as_str());

                if !self.allows_attribute(&tag, &name) {
                    stripped = true;
                    continue;
                }
                if URL_ATTRIBUTES.contains(&name.as_str())
                    && value.is_some_and(|url| !is_allowed_url(url))
                {
                    stripped = true;
                    continue;
                }

                html.push(' ');
                html.push_str(&name);
                if let Some(value) = value {
                    html.push_str("=\"");
                    html.push_str(&value.replace('"', "&quot;"));
                    html.push('"');
                }
            }
            html.push_str(if self_closing { " />" } else { ">" });
        }

        if skipping.is_none() {
            html.push_str(&input[cursor..]);
        }

        Sanitized { html, stripped }
    }
}

/// Only `http`, `https`, `ftp`, `mailto` and relative urls are allowed.
fn is_allowed_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|ch| !ch.is_whitespace() && !ch.is_control())
        .collect();
    match compact.find(':') {
        None => true,
        Some(colon) => {
            if compact[..colon].contains(['/', '?', '#']) {
                return true;
            }
            let scheme = compact[..colon].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "ftp" | "mailto")
        }
    }
}

/// Strip every tag from `input`.
pub fn strip_tags(input: &str) -> String {
    SanitizePolicy::strip_all().sanitize(input).html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_policy() -> SanitizePolicy {
        SanitizePolicy::new(DEFAULT_ALLOWED_TAGS, &default_allowed_attributes())
    }

    #[test]
    fn strip_all_keeps_text() {
        assert_eq!(strip_tags("<b>bold</b> and <i>it</i>"), "bold and it");
        assert_eq!(strip_tags("plain"), "plain");
    }

    #[test]
    fn drops_script_content() {
        let out = default_policy().sanitize("<p>hi</p><script>alert(1)</script>!");
        assert_eq!(out.html, "<p>hi</p>!");
        assert!(out.stripped);
    }

    #[test]
    fn keeps_allowed_markup_untouched() {
        let out = default_policy().sanitize(r#"<p>see <a href="https://x.io" target="_blank">x</a></p>"#);
        assert_eq!(out.html, r#"<p>see <a href="https://x.io" target="_blank">x</a></p>"#);
        assert!(!out.stripped);
    }

    #[test]
    fn removes_disallowed_attributes_and_schemes() {
        let out = default_policy().sanitize(r#"<a href="javascript:alert(1)" onclick="x()">x</a>"#);
        assert_eq!(out.html, "<a>x</a>");
        assert!(out.stripped);
    }

    #[test]
    fn removes_comments() {
        let out = default_policy().sanitize("a<!-- hidden -->b");
        assert_eq!(out.html, "ab");
        assert!(out.stripped);
    }

    #[test]
    fn relative_urls_are_allowed() {
        assert!(is_allowed_url("/posts/1"));
        assert!(is_allowed_url("mailto:someone@example.com"));
        assert!(!is_allowed_url("java\tscript:alert(1)"));
    }
}
