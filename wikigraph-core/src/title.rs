// Title canonicalization and link filtering policy

use crate::error::{GraphError, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// Qualifiers that mark non-topic pages. Never stripped by `normalize` so
/// that `is_valid_link` can still see them.
const NOISE_QUALIFIERS: &[&str] = &["(identifier)", "(disambiguation)", "(journal)", "(magazine)"];

const MEDIA_PREFIXES: &[&str] = &["File:", "Image:", "Media:"];
const CITATION_PREFIXES: &[&str] = &["Cite", "Citation"];
const LIST_PREFIXES: &[&str] = &[
    "Index of",
    "Outline of",
    "List of",
    "Timeline of",
    "Comparison of",
];
const META_PREFIXES: &[&str] = &["Wikipedia:", "Template:", "Help:", "Draft:", "Portal:"];

/// Single concepts too generic to be useful graph nodes.
const GENERIC_CONCEPTS: &[&str] = &[
    "Art",
    "Design",
    "Engineering",
    "Science",
    "Technology",
    "History",
    "Culture",
    "Society",
    "Philosophy",
    "Theory",
    "System",
    "Structure",
    "Planning",
    "Analysis",
    "Research",
    "Development",
    "Management",
    "Book",
    "Journal",
    "Magazine",
    "Publication",
    "Award",
];

const TOPIC_KEYWORDS: &[&str] = &[
    "architecture",
    "building",
    "construction",
    "design",
    "structure",
    "architectural",
    "architect",
    "built environment",
    "edifice",
    "engineering",
    "facade",
    "interior",
    "landscape",
    "planning",
    "renovation",
    "restoration",
    "style",
    "urban",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePolicy {
    /// Drop a trailing `(qualifier)` such as `Column (architecture)`.
    pub strip_qualifiers: bool,
}

impl Default for TitlePolicy {
    fn default() -> Self {
        Self {
            strip_qualifiers: true,
        }
    }
}

impl TitlePolicy {
    pub fn new(strip_qualifiers: bool) -> Self {
        Self { strip_qualifiers }
    }

    /// Map a raw link string to its canonical title.
    pub fn normalize(&self, raw: &str) -> String {
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        let mut title = decoded.replace('_', " ");
        if let Some(fragment) = title.find('#') {
            title.truncate(fragment);
        }

        let title = title.trim();
        if self.strip_qualifiers {
            strip_qualifier(title).to_string()
        } else {
            title.to_string()
        }
    }
}

/// Normalize with the default policy.
pub fn normalize(raw: &str) -> String {
    TitlePolicy::default().normalize(raw)
}

fn strip_qualifier(title: &str) -> &str {
    if !title.ends_with(')') {
        return title;
    }
    let Some(open) = title.rfind('(') else {
        return title;
    };

    let qualifier = &title[open..];
    if qualifier[1..qualifier.len() - 1].contains(')') || NOISE_QUALIFIERS.contains(&qualifier) {
        return title;
    }

    let stripped = title[..open].trim_end();
    if stripped.is_empty() { title } else { stripped }
}

/// Whether a normalized title should become a graph node.
///
/// Over-rejection is acceptable; this only trims noise.
pub fn is_valid_link(title: &str) -> bool {
    let title = title.trim();
    if title.is_empty() {
        return false;
    }

    // Namespaced pages, except categories
    if title.contains(':') && !title.starts_with("Category:") {
        return false;
    }

    let has_prefix = |prefixes: &[&str]| prefixes.iter().any(|p| title.starts_with(*p));
    if has_prefix(MEDIA_PREFIXES)
        || has_prefix(CITATION_PREFIXES)
        || has_prefix(LIST_PREFIXES)
        || has_prefix(META_PREFIXES)
    {
        return false;
    }

    if NOISE_QUALIFIERS.iter().any(|q| title.contains(*q)) {
        return false;
    }

    !GENERIC_CONCEPTS.contains(&title)
}

/// Whether a title is on-topic enough to expand. Edges are recorded
/// regardless.
pub fn is_topic_related(title: &str) -> bool {
    let lower = title.to_lowercase();
    TOPIC_KEYWORDS.iter().any(|keyword| lower.contains(*keyword))
}

pub(crate) fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(GraphError::InvalidTitle(title.to_string()));
    }
    Ok(())
}
