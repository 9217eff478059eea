//! Turns free OCR text into a catalog card key.
//!
//! A card is identified by its collector number (`NNN/NNN`, the part before
//! the slash is the card id) and the last recognised set token, which the
//! set table maps to the catalog's set identifier.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::config::SetConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifier {
    /// Token as printed on the card, e.g. `SVI`
    pub set_code: String,
    /// Catalog set identifier, e.g. `sv01`
    pub resolved_set_id: String,
    /// Digits before the slash, leading zeros kept
    pub card_id: String,
    /// Full `NNN/NNN` string
    pub card_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoCardNumber,
    NoSetCode,
    UnknownSetCode(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCardNumber => write!(f, "no card number"),
            SkipReason::NoSetCode => write!(f, "no set code"),
            SkipReason::UnknownSetCode(code) => write!(f, "unknown set code {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedIdentifier),
    Skip(SkipReason),
}

pub struct IdentifierResolver {
    token_pattern: Regex,
    number_pattern: Regex,
    set_ids: BTreeMap<String, String>,
}

impl IdentifierResolver {
    pub fn new(config: &SetConfig) -> Result<Self, regex::Error> {
        let alternatives = config
            .tokens
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            token_pattern: Regex::new(&format!(r"\b(?:{})\b", alternatives))?,
            number_pattern: Regex::new(r"\b(\d{3})/\d{3}\b")?,
            set_ids: config.ids.clone(),
        })
    }

    /// Every set token in the text, in order of appearance.
    pub fn set_code_matches<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.token_pattern.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// First collector number, as (card_id, card_number).
    pub fn card_number<'t>(&self, text: &'t str) -> Option<(&'t str, &'t str)> {
        let caps = self.number_pattern.captures(text)?;
        let full = caps.get(0)?.as_str();
        let id = caps.get(1)?.as_str();
        Some((id, full))
    }

    pub fn resolve(&self, text: &str) -> Resolution {
        let Some((card_id, card_number)) = self.card_number(text) else {
            return Resolution::Skip(SkipReason::NoCardNumber);
        };

        let matches = self.set_code_matches(text);
        debug!(?matches, "set code matches");
        let Some(set_code) = matches.last() else {
            return Resolution::Skip(SkipReason::NoSetCode);
        };

        match self.set_ids.get(*set_code) {
            Some(set_id) => Resolution::Resolved(ResolvedIdentifier {
                set_code: set_code.to_string(),
                resolved_set_id: set_id.clone(),
                card_id: card_id.to_string(),
                card_number: card_number.to_string(),
            }),
            None => Resolution::Skip(SkipReason::UnknownSetCode(set_code.to_string())),
        }
    }
}
