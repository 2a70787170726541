//! Rewriting image references to freshly built tags

use crate::build::BuiltImage;
use serde_json::Value;
use std::collections::BTreeMap;

/// Repository name to the tag that should be deployed for it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSubstitutions {
    tags: BTreeMap<String, String>,
}

impl ImageSubstitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: impl Into<String>, tag: impl Into<String>) {
        self.tags.insert(image.into(), tag.into());
    }

    /// Add built images, replacing earlier entries for the same repository
    pub fn extend<'a>(&mut self, images: impl IntoIterator<Item = &'a BuiltImage>) {
        for built in images {
            self.insert(built.image.clone(), built.tag.clone());
        }
    }

    pub fn tag(&self, image: &str) -> Option<&str> {
        self.tags.get(image).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `web`, `web:old` or `web@sha256:...` become `web:<tag>` when `web` is known
    pub fn replace_reference(&self, reference: &str) -> Option<String> {
        let repository = repository_of(reference);
        self.tags
            .get(repository)
            .map(|tag| format!("{}:{}", repository, tag))
    }

    /// Replace every matching string inside a JSON value; returns the count
    pub fn apply_value(&self, value: &mut Value) -> usize {
        match value {
            Value::String(s) => match self.replace_reference(s) {
                Some(replaced) => {
                    *s = replaced;
                    1
                }
                None => 0,
            },
            Value::Array(items) => items.iter_mut().map(|v| self.apply_value(v)).sum(),
            Value::Object(map) => map.values_mut().map(|v| self.apply_value(v)).sum(),
            _ => 0,
        }
    }

    /// Replace matching `image:` fields in manifest text
    pub fn apply_manifest(&self, text: &str) -> String {
        let mut out: Vec<String> = text
            .lines()
            .map(|line| self.replace_image_line(line).unwrap_or_else(|| line.to_string()))
            .collect();
        if text.ends_with('\n') {
            out.push(String::new());
        }
        out.join("\n")
    }

    fn replace_image_line(&self, line: &str) -> Option<String> {
        let key_at = line.find("image:")?;
        let prefix = &line[..key_at];
        if !prefix.trim().is_empty() && prefix.trim() != "-" {
            return None;
        }

        let rest = &line[key_at + "image:".len()..];
        let value_end = comment_start(rest).map_or(rest.len(), |i| rest[..i].trim_end().len());
        let comment = &rest[value_end..];
        let raw = rest[..value_end].trim();
        let (quote, reference) = match raw.chars().next() {
            Some(q @ ('"' | '\'')) if raw.len() >= 2 && raw.ends_with(q) => {
                (Some(q), &raw[1..raw.len() - 1])
            }
            _ => (None, raw),
        };
        if reference.is_empty() {
            return None;
        }

        let replaced = self.replace_reference(reference)?;
        let value = match quote {
            Some(q) => format!("{q}{replaced}{q}"),
            None => replaced,
        };
        Some(format!("{}image: {}{}", prefix, value, comment))
    }
}

/// Byte offset of a trailing `# comment` outside quotes
fn comment_start(value: &str) -> Option<usize> {
    let mut quote = None;
    let mut previous = ' ';
    for (i, c) in value.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '#') if previous.is_whitespace() => return Some(i),
            _ => {}
        }
        previous = c;
    }
    None
}

/// Strip any tag or digest from an image reference
fn repository_of(reference: &str) -> &str {
    let without_digest = reference.split('@').next().unwrap_or(reference);
    match without_digest.rfind(':') {
        // A colon before the last '/' is a registry port, not a tag
        Some(colon) if !without_digest[colon..].contains('/') => &without_digest[..colon],
        _ => without_digest,
    }
}
