//! The file-name query language.
//!
//! ```text
//! report draft      every term must appear in the name
//! report|summary    at least one term must appear
//! !draft            the name must not contain "draft"
//! !.tmp             the name must not end with ".tmp"
//! .pdf .docx        the name must end with one of these
//! ```
//!
//! Matching is a case-insensitive, unanchored substring test. The parser
//! never rejects input; the worst case is an empty query, which matches
//! nothing.

use regex::Regex;
use std::sync::OnceLock;

fn exclusion_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"!\S+").expect("valid exclusion pattern"))
}

fn extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\.\w+$").expect("valid extension pattern"))
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+").expect("valid token pattern"))
}

/// Structured form of one query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// All must appear in the name (only used when `or_terms` is empty)
    pub and_terms: Vec<String>,
    /// At least one must appear in the name
    pub or_terms: Vec<String>,
    /// None may appear in the name
    pub not_terms: Vec<String>,
    /// The name must not end with any of these
    pub not_extensions: Vec<String>,
    /// The name must end with one of these, when non-empty
    pub required_extensions: Vec<String>,
}

impl ParsedQuery {
    /// Parse a raw query string
    pub fn parse(text: &str) -> Self {
        let mut query = Self::default();
        if text.trim().is_empty() {
            return query;
        }

        let text = text.replace('！', "!").replace('｜', "|");

        // Exclusions
        for m in exclusion_pattern().find_iter(&text) {
            let term = m.as_str()[1..].to_lowercase();
            if term.starts_with('.') {
                query.not_extensions.push(term);
            } else {
                query.not_terms.push(term);
            }
        }
        let text = exclusion_pattern().replace_all(&text, "");

        // Standalone extension tokens
        let mut remaining = String::with_capacity(text.len());
        let mut last_end = 0;
        for token in token_pattern().find_iter(&text) {
            if extension_pattern().is_match(token.as_str()) {
                query.required_extensions.push(token.as_str().to_lowercase());
                remaining.push_str(&text[last_end..token.start()]);
                last_end = token.end();
            }
        }
        remaining.push_str(&text[last_end..]);

        if remaining.contains('|') {
            query.or_terms = remaining
                .split('|')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(str::to_lowercase)
                .collect();
        } else {
            query.and_terms = remaining.split_whitespace().map(str::to_lowercase).collect();
        }

        query
    }

    /// True when the query carries no constraint at all
    pub fn is_empty(&self) -> bool {
        self.and_terms.is_empty()
            && self.or_terms.is_empty()
            && self.not_terms.is_empty()
            && self.not_extensions.is_empty()
            && self.required_extensions.is_empty()
    }

    /// Test a file name against the query
    pub fn matches(&self, name: &str) -> bool {
        if name.is_empty() || self.is_empty() {
            return false;
        }
        let name = name.to_lowercase();

        if self.not_terms.iter().any(|term| name.contains(term.as_str())) {
            return false;
        }
        if self.not_extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            return false;
        }
        if !self.required_extensions.is_empty()
            && !self.required_extensions.iter().any(|ext| name.ends_with(ext.as_str()))
        {
            return false;
        }

        let or_passed =
            self.or_terms.is_empty() || self.or_terms.iter().any(|term| name.contains(term.as_str()));
        let and_passed = self
            .and_terms
            .iter()
            .all(|term| name.contains(term.as_str()));

        or_passed && and_passed
    }
}
