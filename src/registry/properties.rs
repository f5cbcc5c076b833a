//! `server.properties` text handling.
//!
//! The file is `key=value` per line with hyphenated keys (`max-players`).
//! Callers use underscored keys (`max_players`); the two forms translate by
//! swapping `-` and `_`. Comment and blank lines are kept in place when the
//! file is rewritten, and new keys are appended at the end.

use crate::error::{Error, Result};
use crate::registry::record::PropertyValue;
use std::collections::{BTreeMap, BTreeSet};

/// Converts a key to the underscored form used by callers.
pub fn to_internal_key(key: &str) -> String {
    key.replace('-', "_")
}

/// Converts a key to the hyphenated form written to disk.
pub fn to_disk_key(key: &str) -> String {
    key.replace('_', "-")
}

/// Checks that every override survives a write followed by a read.
///
/// [`PropertiesDocument::parse`] reads `#`/`!` lines as comments, trims keys
/// and splits on the first `=`, so keys that would be read back differently
/// are rejected. Values may hold anything but a line break.
pub fn validate_overrides(overrides: &BTreeMap<String, PropertyValue>) -> Result<()> {
    let mut seen = BTreeSet::new();

    for (key, value) in overrides {
        let invalid = |reason: &str| -> Result<()> {
            Err(Error::InvalidProperty(format!("{:?}: {}", key, reason)))
        };

        if key.is_empty() {
            return invalid("key is empty");
        }
        if key.starts_with('#') || key.starts_with('!') {
            return invalid("key would be read back as a comment");
        }
        if key.trim() != key {
            return invalid("key has surrounding whitespace");
        }
        if key.contains('=') {
            return invalid("key contains '='");
        }
        if key.contains(['\n', '\r']) {
            return invalid("key contains a line break");
        }
        if value.to_string().contains(['\n', '\r']) {
            return invalid("value contains a line break");
        }
        if !seen.insert(to_internal_key(key)) {
            return invalid("key duplicates another key in the same update");
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Entry { key: String, value: String },
    Verbatim(String),
}

/// A parsed properties file that can be merged and rendered back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertiesDocument {
    lines: Vec<Line>,
}

impl PropertiesDocument {
    /// Parses properties text. Lines without `=` and `#`/`!` comments are
    /// carried through untouched.
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|raw| {
                let line = raw.trim_end_matches('\r');
                let trimmed = line.trim_start();
                if trimmed.starts_with('#') || trimmed.starts_with('!') {
                    return Line::Verbatim(line.to_string());
                }
                match line.split_once('=') {
                    Some((key, value)) => Line::Entry {
                        key: key.trim().to_string(),
                        value: value.to_string(),
                    },
                    None => Line::Verbatim(line.to_string()),
                }
            })
            .collect();

        Self { lines }
    }

    /// Entries keyed by their underscored form. A key repeated in the file
    /// resolves to its last value.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry { key, value } => Some((to_internal_key(key), value.clone())),
                Line::Verbatim(_) => None,
            })
            .collect()
    }

    /// Merges overrides into the document. Existing keys are updated where
    /// they stand; unknown keys are appended in the overrides' order.
    pub fn merge<'a, I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (&'a String, &'a PropertyValue)>,
    {
        for (key, value) in overrides {
            let internal = to_internal_key(key);
            let rendered = value.to_string();
            let mut found = false;

            for line in &mut self.lines {
                if let Line::Entry { key, value } = line {
                    if to_internal_key(key) == internal {
                        *value = rendered.clone();
                        found = true;
                    }
                }
            }

            if !found {
                self.lines.push(Line::Entry {
                    key: to_disk_key(&internal),
                    value: rendered,
                });
            }
        }
    }

    /// Renders the document, one line per entry, newline terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Entry { key, value } => {
                    out.push_str(&to_disk_key(key));
                    out.push('=');
                    out.push_str(value);
                }
                Line::Verbatim(text) => out.push_str(text),
            }
            out.push('\n');
        }
        out
    }
}
