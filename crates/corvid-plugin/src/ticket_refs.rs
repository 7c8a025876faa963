//! Ticket-reference extraction and kind classification for passive matching.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;

/// Entity kind for references whose prefix has no special mapping.
pub const DEFAULT_TICKET_KIND: &str = "Workitem";

#[derive(Debug, Clone, PartialEq, Eq)]
/// One `PREFIX-digits` token found in chat text.
pub struct TicketReference {
    /// The token exactly as typed, original casing preserved.
    pub token: String,
    /// Remote entity kind the token's prefix maps to.
    pub kind: String,
}

/// Scans free text for tracker-ID tokens against a configured prefix set.
pub struct TicketReferenceExtractor {
    pattern: Option<Regex>,
    special_kinds: BTreeMap<String, String>,
}

impl TicketReferenceExtractor {
    pub fn new(
        known_prefixes: &[String],
        special_kinds: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let alternation = known_prefixes
            .iter()
            .map(|prefix| prefix.trim())
            .filter(|prefix| !prefix.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let pattern = if alternation.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!(r"\b((?i:{alternation})-[0-9]+)\b"))
                    .context("failed to compile ticket reference pattern")?,
            )
        };
        Ok(Self {
            pattern,
            special_kinds: special_kinds
                .iter()
                .map(|(prefix, kind)| (prefix.to_ascii_uppercase(), kind.clone()))
                .collect(),
        })
    }

    /// Every reference in `text`, in order of appearance, duplicates kept.
    /// Never fails; no matches yields an empty sequence.
    pub fn extract(&self, text: &str) -> Vec<TicketReference> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .find_iter(text)
            .map(|found| {
                let token = found.as_str().to_string();
                let kind = self.classify(&token).to_string();
                TicketReference { token, kind }
            })
            .collect()
    }

    fn classify(&self, token: &str) -> &str {
        let prefix = token
            .split_once('-')
            .map(|(prefix, _)| prefix)
            .unwrap_or(token)
            .to_ascii_uppercase();
        self.special_kinds
            .get(&prefix)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TICKET_KIND)
    }
}
