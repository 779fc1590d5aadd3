//! Review enrichment from place details.

use crate::database::{Database, Restaurant, RestaurantInfo, Review};
use crate::error::{AppError, AppResult};
use crate::places::{PlaceCandidate, PlaceDetails, PlacesApi};
use std::sync::Arc;

/// Map place details onto restaurant fields.
///
/// Best effort: absent upstream values become empty strings. Fields the
/// places API does not know about (TripAdvisor link, description) are
/// kept, and so is an existing restaurant name.
pub fn apply_place_details(info: &RestaurantInfo, place_id: &str, details: &PlaceDetails) -> RestaurantInfo {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    let restaurant_name = if info.restaurant_name.trim().is_empty() {
        details
            .display_name
            .as_ref()
            .map(|name| name.text.clone())
            .unwrap_or_default()
    } else {
        info.restaurant_name.clone()
    };

    RestaurantInfo {
        restaurant_name,
        google_place_id: place_id.to_string(),
        address: text(&details.formatted_address),
        phone: text(&details.international_phone_number),
        website: text(&details.website_uri),
        google_maps_link: text(&details.google_maps_uri),
        google_maps_rating: details.rating.map(|r| r.to_string()).unwrap_or_default(),
        google_maps_reviews_count: details
            .user_rating_count
            .map(|c| c.to_string())
            .unwrap_or_default(),
        price_level: text(&details.price_level),
        restaurant_image: details
            .photos
            .first()
            .map(|photo| photo.google_maps_uri.clone())
            .unwrap_or_default(),
        restaurant_status: text(&details.business_status),
        trip_advisor_link: info.trip_advisor_link.clone(),
        restaurant_description: info.restaurant_description.clone(),
    }
}

pub struct EnrichmentLinker {
    places: Arc<dyn PlacesApi>,
}

impl EnrichmentLinker {
    pub fn new(places: Arc<dyn PlacesApi>) -> Self {
        Self { places }
    }

    pub async fn fetch_place_details(&self, place_id: &str) -> AppResult<PlaceDetails> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(AppError::Validation("place id is required to fetch details".to_string()));
        }
        self.places.get_place_details(place_id).await
    }

    /// First text-search candidate for a restaurant name.
    pub async fn find_place(&self, name: &str) -> AppResult<PlaceCandidate> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("restaurant name is required to search places".to_string()));
        }
        self.places
            .search_text(name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("no places found for '{}'", name)))
    }

    /// Enrich a draft review from `place_id`, or from its own place id when `None`.
    pub async fn enrich_review(&self, review: &Review, place_id: Option<&str>) -> AppResult<Review> {
        let place_id = place_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or_else(|| review.place_id())
            .unwrap_or_default()
            .to_string();
        let details = self.fetch_place_details(&place_id).await?;
        Ok(Review {
            info: apply_place_details(&review.info, &place_id, &details),
            second_of_review: review.second_of_review.clone(),
        })
    }

    /// Search by the review's restaurant name, then enrich from the first match.
    pub async fn enrich_by_name(&self, review: &Review) -> AppResult<Review> {
        let candidate = self.find_place(&review.info.restaurant_name).await?;
        log::info!(
            "Matched '{}' to place {} ({})",
            review.info.restaurant_name,
            candidate.id,
            candidate.name()
        );
        self.enrich_review(review, Some(&candidate.id)).await
    }

    /// Re-enrich a stored restaurant by searching its name.
    ///
    /// The record keeps its own id as `googlePlaceId` even if the search
    /// lands on a different place; only the enrichment fields are merged.
    pub async fn refresh_restaurant(&self, db: &Database, restaurant_id: &str) -> AppResult<Restaurant> {
        let restaurant = db
            .get_restaurant(restaurant_id)?
            .ok_or_else(|| AppError::NotFound(format!("restaurant {}", restaurant_id)))?;

        let candidate = self.find_place(&restaurant.info.restaurant_name).await?;
        if candidate.id != restaurant.id {
            log::warn!(
                "Search for '{}' matched place {}, not {}; keeping the record id",
                restaurant.info.restaurant_name,
                candidate.id,
                restaurant.id
            );
        }

        let details = self.fetch_place_details(&candidate.id).await?;
        let info = apply_place_details(&restaurant.info, &restaurant.id, &details);
        db.upsert_restaurant(&restaurant.id, &info, None)?;

        db.get_restaurant(&restaurant.id)?
            .ok_or_else(|| AppError::NotFound(format!("restaurant {}", restaurant.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::PlacePhoto;
    use crate::sync::fakes::{pizza_details, FakePlaces};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_apply_full_details() {
        let mut details = pizza_details();
        details.photos.push(PlacePhoto {
            name: "places/p1/photos/a".to_string(),
            google_maps_uri: "https://www.google.com/maps/place//data=!3m4!1e2!3m2!1sphotoA".to_string(),
        });
        let draft = RestaurantInfo {
            trip_advisor_link: "https://tripadvisor.example/p1".to_string(),
            ..Default::default()
        };

        let info = apply_place_details(&draft, "p1", &details);
        assert_eq!(info.restaurant_name, "Pizza X");
        assert_eq!(info.google_place_id, "p1");
        assert_eq!(info.address, "1 Main St");
        assert_eq!(info.google_maps_rating, "4.5");
        assert_eq!(info.google_maps_reviews_count, "120");
        assert_eq!(info.price_level, "PRICE_LEVEL_MODERATE");
        assert_eq!(
            info.restaurant_image,
            "https://www.google.com/maps/place//data=!3m4!1e2!3m2!1sphotoA"
        );
        assert!(!info.restaurant_image.contains("key="));
        assert_eq!(info.restaurant_status, "OPERATIONAL");
        assert_eq!(info.trip_advisor_link, "https://tripadvisor.example/p1");
        assert_eq!(info.website, "");
    }

    #[test]
    fn test_apply_empty_details_defaults_to_empty() {
        let draft = RestaurantInfo {
            restaurant_name: "My Name".to_string(),
            address: "stale".to_string(),
            ..Default::default()
        };
        let info = apply_place_details(&draft, "p2", &PlaceDetails::default());
        assert_eq!(info.restaurant_name, "My Name");
        assert_eq!(info.google_place_id, "p2");
        assert_eq!(info.address, "");
        assert_eq!(info.google_maps_rating, "");
        assert_eq!(info.restaurant_image, "");
    }

    #[tokio::test]
    async fn test_enrich_review_uses_own_place_id() {
        let linker = EnrichmentLinker::new(Arc::new(FakePlaces::with_place("p1", pizza_details())));
        let mut review = Review::named("Pizza X");
        review.info.google_place_id = "p1".to_string();
        review.second_of_review = "95".to_string();

        let enriched = linker.enrich_review(&review, None).await.unwrap();
        assert_eq!(enriched.info.phone, "+1 555-0100");
        assert_eq!(enriched.second_of_review, "95");
    }

    #[tokio::test]
    async fn test_enrich_without_place_id_is_validation_error() {
        let places = Arc::new(FakePlaces::default());
        let linker = EnrichmentLinker::new(places.clone());

        let err = linker.enrich_review(&Review::named("Pizza X"), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(places.calls().is_empty());
    }

    #[tokio::test]
    async fn test_enrich_by_name() {
        let places = Arc::new(FakePlaces::with_place("p1", pizza_details()));
        let linker = EnrichmentLinker::new(places.clone());

        let enriched = linker.enrich_by_name(&Review::named("pizza x")).await.unwrap();
        assert_eq!(enriched.info.google_place_id, "p1");
        assert_eq!(enriched.info.restaurant_name, "pizza x");
        assert_eq!(places.calls(), vec!["search:pizza x", "details:p1"]);
    }

    #[tokio::test]
    async fn test_find_place_errors() {
        let linker = EnrichmentLinker::new(Arc::new(FakePlaces::default()));
        assert!(matches!(
            linker.find_place(" ").await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            linker.find_place("Nowhere Diner").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_refresh_restaurant_merges_enrichment() {
        let (db, _temp_dir) = setup_test_db();
        let stored = RestaurantInfo {
            restaurant_name: "Pizza X".to_string(),
            website: "https://pizzax.example".to_string(),
            ..Default::default()
        };
        db.upsert_restaurant("p1", &stored, None).unwrap();
        let linker = EnrichmentLinker::new(Arc::new(FakePlaces::with_place("p1", pizza_details())));

        let refreshed = linker.refresh_restaurant(&db, "p1").await.unwrap();
        assert_eq!(refreshed.info.address, "1 Main St");
        assert_eq!(refreshed.info.google_maps_rating, "4.5");
        // Details had no website; the stored one survives the merge.
        assert_eq!(refreshed.info.website, "https://pizzax.example");
    }

    #[tokio::test]
    async fn test_refresh_missing_restaurant() {
        let (db, _temp_dir) = setup_test_db();
        let linker = EnrichmentLinker::new(Arc::new(FakePlaces::default()));
        let err = linker.refresh_restaurant(&db, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
