//! Google Places API (New) integration
//!
//! Place details by id and text search by restaurant name.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DETAILS_FIELD_MASK: &str = "id,displayName,formattedAddress,internationalPhoneNumber,websiteUri,googleMapsUri,rating,userRatingCount,priceLevel,photos,businessStatus";
const SEARCH_FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress";

#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn get_place_details(&self, place_id: &str) -> AppResult<PlaceDetails>;

    /// Text search; best match first.
    async fn search_text(&self, text: &str) -> AppResult<Vec<PlaceCandidate>>;
}

pub struct PlacesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PlacesClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config
            .places_api_key
            .as_deref()
            .map(|key| Self::new(key, &config.places_base_url, config.request_timeout()))
    }
}

#[async_trait]
impl PlacesApi for PlacesClient {
    async fn get_place_details(&self, place_id: &str) -> AppResult<PlaceDetails> {
        log::info!("Fetching place details for {}", place_id);
        let url = format!("{}/places/{}", self.base_url, place_id);
        let response = self
            .http
            .get(&url)
            .header("X-Goog-Api-Key", self.api_key.as_str())
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("Places details request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(AppError::NotFound(format!("place {}", place_id)));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Transient(format!("Places API returned {}: {}", status, body)));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Transient(format!("Failed to parse place details: {}", e)))
    }

    async fn search_text(&self, text: &str) -> AppResult<Vec<PlaceCandidate>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RequestBody<'a> {
            text_query: &'a str,
        }

        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Response {
            places: Vec<PlaceCandidate>,
        }

        log::info!("Searching places for '{}'", text);
        let response = self
            .http
            .post(format!("{}/places:searchText", self.base_url))
            .header("X-Goog-Api-Key", self.api_key.as_str())
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(&RequestBody { text_query: text })
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("Places search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transient(format!("Places API returned {}: {}", status, body)));
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| AppError::Transient(format!("Failed to parse places search: {}", e)))?;
        Ok(parsed.places)
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizedText {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacePhoto {
    /// Resource name, `places/{place}/photos/{photo}`.
    pub name: String,
    /// Maps page showing the photo, not a direct image URL.
    #[serde(alias = "googleUrl")]
    pub google_maps_uri: String,
}

/// Place details as returned by the API. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaceDetails {
    pub id: Option<String>,
    pub display_name: Option<LocalizedText>,
    pub formatted_address: Option<String>,
    pub international_phone_number: Option<String>,
    pub website_uri: Option<String>,
    pub google_maps_uri: Option<String>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<u64>,
    pub price_level: Option<String>,
    pub photos: Vec<PlacePhoto>,
    pub business_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaceCandidate {
    pub id: String,
    pub display_name: Option<LocalizedText>,
    pub formatted_address: Option<String>,
}

impl PlaceCandidate {
    pub fn name(&self) -> &str {
        self.display_name.as_ref().map(|d| d.text.as_str()).unwrap_or("")
    }
}
