use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::html::{self, SanitizePolicy};

fn default_max_characters() -> usize {
    10_000
}

/// Plain text: trimmed and stripped of all markup on validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Text {
    #[serde(default)]
    pub min_characters: usize,
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,
}

impl Text {
    pub fn new(min_characters: usize, max_characters: usize) -> Self {
        Self {
            min_characters,
            max_characters,
        }
    }

    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        let raw = text_input(name, value)?;
        let cleaned = html::strip_tags(raw.trim()).trim().to_string();
        check_length(name, &cleaned, self.min_characters, self.max_characters)?;
        *value = Value::String(cleaned);
        Ok(())
    }
}

impl Default for Text {
    fn default() -> Self {
        Self::new(0, default_max_characters())
    }
}

fn default_allowed_tags() -> Vec<String> {
    html::DEFAULT_ALLOWED_TAGS
        .iter()
        .map(|tag| tag.to_string())
        .collect()
}

/// Rich text with an allow-list of tags and per-tag attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Html {
    #[serde(default = "default_allowed_tags")]
    pub allowed_tags: Vec<String>,
    #[serde(default = "html::default_allowed_attributes")]
    pub allowed_attributes: BTreeMap<String, Vec<String>>,
    /// Reject disallowed markup instead of silently stripping it.
    #[serde(default = "default_error_bad_html")]
    pub error_bad_html: bool,
    #[serde(default)]
    pub min_characters: usize,
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,
}

fn default_error_bad_html() -> bool {
    true
}

impl Html {
    pub fn new(min_characters: usize, max_characters: usize) -> Self {
        Self {
            min_characters,
            max_characters,
            ..Self::default()
        }
    }

    pub fn with_error_bad_html(mut self, error_bad_html: bool) -> Self {
        self.error_bad_html = error_bad_html;
        self
    }

    pub fn with_allowed_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        let raw = text_input(name, value)?;
        let policy = SanitizePolicy::new(&self.allowed_tags, &self.allowed_attributes);
        let sanitized = policy.sanitize(raw.trim());
        if sanitized.stripped && self.error_bad_html {
            return Err(format!("'{name}' has html code that is not allowed"));
        }
        let cleaned = sanitized.html.trim().to_string();
        check_length(name, &cleaned, self.min_characters, self.max_characters)?;
        *value = Value::String(cleaned);
        Ok(())
    }
}

impl Default for Html {
    fn default() -> Self {
        Self {
            allowed_tags: default_allowed_tags(),
            allowed_attributes: html::default_allowed_attributes(),
            error_bad_html: default_error_bad_html(),
            min_characters: 0,
            max_characters: default_max_characters(),
        }
    }
}

fn text_input(name: &str, value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(format!("'{name}' must be text")),
    }
}

/// Shared length rules for text-like values.
pub(crate) fn check_length(name: &str, text: &str, min: usize, max: usize) -> Result<(), String> {
    let length = text.chars().count();
    if min == 1 && length == 0 {
        return Err(format!("'{name}' cannot be empty"));
    }
    if length > max {
        return Err(format!(
            "The character length of '{name}' is too long, please keep it below {max}"
        ));
    }
    if length < min {
        return Err(format!(
            "The character length of '{name}' is too short, please keep it above {min}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_trims_and_strips_markup() {
        let mut value = json!("  <b>Hello</b> world ");
        Text::default().validate("title", &mut value).unwrap();
        assert_eq!(value, json!("Hello world"));
    }

    #[test]
    fn empty_text_message_depends_on_minimum() {
        let mut value = json!("");
        let err = Text::new(1, 100).validate("title", &mut value).unwrap_err();
        assert_eq!(err, "'title' cannot be empty");

        let mut value = json!("");
        assert!(Text::new(0, 100).validate("title", &mut value).is_ok());

        let mut value = json!("ab");
        let err = Text::new(3, 100).validate("title", &mut value).unwrap_err();
        assert!(err.contains("too short, please keep it above 3"));

        let mut value = json!("abcdef");
        let err = Text::new(0, 5).validate("title", &mut value).unwrap_err();
        assert!(err.contains("too long, please keep it below 5"));
    }

    #[test]
    fn html_rejects_or_strips_bad_markup() {
        let mut value = json!("<p>ok</p><script>bad()</script>");
        let err = Html::default().validate("content", &mut value).unwrap_err();
        assert_eq!(err, "'content' has html code that is not allowed");
        assert_eq!(value, json!("<p>ok</p><script>bad()</script>"));

        let lenient = Html::default().with_error_bad_html(false);
        lenient.validate("content", &mut value).unwrap();
        assert_eq!(value, json!("<p>ok</p>"));
    }

    #[test]
    fn html_tag_list_can_be_narrowed() {
        let mut value = json!("<p>kept</p><h1>flattened</h1>");
        Html::default()
            .with_allowed_tags(["p"])
            .with_error_bad_html(false)
            .validate("content", &mut value)
            .unwrap();
        assert_eq!(value, json!("<p>kept</p>flattened"));
    }

    #[test]
    fn html_accepts_allowed_markup() {
        let mut value = json!("<h1>Title</h1><p><strong>body</strong></p>");
        Html::default().validate("content", &mut value).unwrap();
        assert_eq!(value, json!("<h1>Title</h1><p><strong>body</strong></p>"));
    }
}
