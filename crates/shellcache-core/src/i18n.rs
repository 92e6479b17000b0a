//! Key/value translation lookup.
//!
//! Translation files are JSON objects, optionally nested; nested keys are
//! addressed with dots (`{"install": {"done": "..."}}` -> `install.done`).
//! Placeholders use `{name}`. A missing key, or a translator that has not
//! loaded yet, yields the key in brackets so gaps are visible.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

/// English strings shipped with the crate
const EMBEDDED_EN: &str = include_str!("../locales/en.json");

const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct Translator {
    language: String,
    strings: Option<HashMap<String, String>>,
}

impl Translator {
    /// A translator whose strings are not loaded yet
    pub fn pending(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            strings: None,
        }
    }

    pub fn from_json(language: impl Into<String>, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Failed to parse translation file")?;
        let mut strings = HashMap::new();
        flatten("", &value, &mut strings);
        Ok(Self {
            language: language.into(),
            strings: Some(strings),
        })
    }

    pub fn english() -> Self {
        Self::from_json(DEFAULT_LANGUAGE, EMBEDDED_EN).unwrap_or_else(|_| Self::pending(DEFAULT_LANGUAGE))
    }

    /// Load `<dir>/<language>.json`, falling back to the embedded English
    /// strings when the file is missing or unreadable.
    pub fn load(dir: Option<&Path>, language: &str) -> Self {
        if let Some(dir) = dir {
            let path = dir.join(format!("{}.json", language));
            match std::fs::read_to_string(&path) {
                Ok(json) => match Self::from_json(language, &json) {
                    Ok(translator) => {
                        debug!(path = %path.display(), count = translator.len(), "Loaded translations");
                        return translator;
                    }
                    Err(e) => debug!(path = %path.display(), error = %e, "Unreadable translation file"),
                },
                Err(e) => debug!(path = %path.display(), error = %e, "Translation file not found"),
            }
        }
        Self::english()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_ready(&self) -> bool {
        self.strings.is_some()
    }

    pub fn len(&self) -> usize {
        self.strings.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn translate(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let Some(template) = self.strings.as_ref().and_then(|strings| strings.get(key)) else {
            return format!("[{}]", key);
        };
        vars.iter().fold(template.clone(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Null | Value::Array(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_returns_bracketed_key() {
        let t = Translator::pending("ar");
        assert!(!t.is_ready());
        assert_eq!(t.translate("install.done", &[]), "[install.done]");
    }

    #[test]
    fn test_missing_key_returns_bracketed_key() {
        let t = Translator::from_json("en", r#"{"a": "A"}"#).expect("parse");
        assert_eq!(t.translate("b", &[]), "[b]");
    }

    #[test]
    fn test_nested_keys_and_variables() {
        let t = Translator::from_json(
            "en",
            r#"{"install": {"done": "Stored {stored} of {total}"}}"#,
        )
        .expect("parse");
        assert_eq!(
            t.translate("install.done", &[("stored", "3"), ("total", "4")]),
            "Stored 3 of 4"
        );
    }

    #[test]
    fn test_unknown_placeholders_left_in_place() {
        let t = Translator::from_json("en", r#"{"k": "Hello {name}"}"#).expect("parse");
        assert_eq!(t.translate("k", &[]), "Hello {name}");
    }

    #[test]
    fn test_embedded_english_is_ready() {
        let t = Translator::english();
        assert!(t.is_ready());
        assert!(!t.is_empty());
        assert_eq!(t.language(), "en");
    }

    #[test]
    fn test_load_falls_back_to_english() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let t = Translator::load(Some(tmp.path()), "fr");
        assert_eq!(t.language(), "en");
        assert!(t.is_ready());
    }

    #[test]
    fn test_load_reads_language_file() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(tmp.path().join("ar.json"), r#"{"status": {"none": "لا يوجد"}}"#)
            .expect("write locale");
        let t = Translator::load(Some(tmp.path()), "ar");
        assert_eq!(t.language(), "ar");
        assert_eq!(t.translate("status.none", &[]), "لا يوجد");
    }
}
