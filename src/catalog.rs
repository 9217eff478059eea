//! Card catalog lookup against the TCGdex REST API.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::retry::{RetryPolicy, Transient};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("card {0} not found in catalog")]
    NotFound(String),
    #[error("catalog service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("catalog rate limit exceeded")]
    RateLimited,
    #[error("catalog request rejected (HTTP {0})")]
    Rejected(u16),
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn is_service_failure(&self) -> bool {
        matches!(self, LookupError::ServiceUnavailable(_) | LookupError::RateLimited)
    }
}

impl Transient for LookupError {
    fn is_transient(&self) -> bool {
        self.is_service_failure()
    }
}

/// The catalog fields the collection keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCard {
    pub id: String,
    pub name: String,
    pub category: String,
    pub image_url: Option<String>,
    /// First elemental type of a Pokemon, or the trainer subtype
    pub types_or_trainer_type: Option<String>,
}

pub trait CardCatalog {
    fn lookup(&self, set_id: &str, card_id: &str) -> Result<CatalogCard, LookupError>;
}

/// Key the catalog files a card under: `{set_id}-{card_id}`.
pub fn card_key(set_id: &str, card_id: &str) -> String {
    format!("{}-{}", set_id, card_id)
}

pub struct TcgdexClient {
    client: Client,
    base_url: String,
}

impl TcgdexClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cardscan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl CardCatalog for TcgdexClient {
    fn lookup(&self, set_id: &str, card_id: &str) -> Result<CatalogCard, LookupError> {
        let key = card_key(set_id, card_id);
        let url = format!("{}/{}", self.base_url, key);
        debug!(%url, "catalog lookup");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| LookupError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(key));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LookupError::ServiceUnavailable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(LookupError::Rejected(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| LookupError::ServiceUnavailable(e.to_string()))?;
        parse_card(&body)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardResponse {
    id: Option<String>,
    name: Option<String>,
    category: Option<String>,
    image: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    trainer_type: Option<String>,
}

fn parse_card(body: &str) -> Result<CatalogCard, LookupError> {
    let card: CardResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;

    let name = card
        .name
        .ok_or_else(|| LookupError::Malformed("card has no name".into()))?;
    let category = card
        .category
        .ok_or_else(|| LookupError::Malformed("card has no category".into()))?;

    let types_or_trainer_type = match category.as_str() {
        "Pokemon" => card.types.into_iter().next(),
        "Trainer" => card.trainer_type,
        _ => None,
    };

    Ok(CatalogCard {
        id: card.id.unwrap_or_default(),
        name,
        category,
        image_url: card.image,
        types_or_trainer_type,
    })
}

/// A catalog wrapped in the retry policy.
pub struct CatalogLookup {
    catalog: Box<dyn CardCatalog>,
    retry: RetryPolicy,
}

impl CatalogLookup {
    pub fn new(catalog: Box<dyn CardCatalog>, retry: RetryPolicy) -> Self {
        Self { catalog, retry }
    }

    pub fn lookup(&self, set_id: &str, card_id: &str) -> Result<CatalogCard, LookupError> {
        self.retry
            .run("catalog lookup", || self.catalog.lookup(set_id, card_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_key() {
        assert_eq!(card_key("sv01", "004"), "sv01-004");
        assert_eq!(card_key("sv03.5", "151"), "sv03.5-151");
    }

    #[test]
    fn test_parse_pokemon_takes_first_type() {
        let body = r#"{
            "id": "sv01-004",
            "localId": "004",
            "name": "Charmander",
            "category": "Pokemon",
            "image": "https://assets.tcgdex.net/en/sv/sv01/004",
            "types": ["Fire", "Dragon"],
            "hp": 70
        }"#;
        let card = parse_card(body).unwrap();
        assert_eq!(card.name, "Charmander");
        assert_eq!(card.category, "Pokemon");
        assert_eq!(card.types_or_trainer_type.as_deref(), Some("Fire"));
        assert_eq!(card.image_url.as_deref(), Some("https://assets.tcgdex.net/en/sv/sv01/004"));
    }

    #[test]
    fn test_parse_trainer_takes_trainer_type() {
        let body = r#"{"id": "sv02-185", "name": "Iono", "category": "Trainer", "trainerType": "Supporter"}"#;
        let card = parse_card(body).unwrap();
        assert_eq!(card.types_or_trainer_type.as_deref(), Some("Supporter"));
        assert_eq!(card.image_url, None);
    }

    #[test]
    fn test_parse_energy_has_no_type() {
        let body = r#"{"id": "sve-001", "name": "Basic Grass Energy", "category": "Energy", "types": ["Grass"]}"#;
        assert_eq!(parse_card(body).unwrap().types_or_trainer_type, None);
    }

    #[test]
    fn test_parse_without_name_is_malformed() {
        let body = r#"{"id": "sv01-004", "category": "Pokemon"}"#;
        assert!(matches!(parse_card(body), Err(LookupError::Malformed(_))));
        assert!(matches!(parse_card("not json"), Err(LookupError::Malformed(_))));
    }

    #[test]
    fn test_not_found_is_not_retried() {
        assert!(!LookupError::NotFound("x".into()).is_transient());
        assert!(LookupError::RateLimited.is_transient());
    }
}
