use super::AppState;
use crate::database::{Restaurant, ReviewField};
use crate::error::{AppError, AppResult};
use serde_json::{Map, Value};

/// Get restaurants, optionally filtered by name
pub async fn get_restaurants(state: &AppState, search: Option<String>) -> Result<Vec<Restaurant>, AppError> {
    let result = (|| -> AppResult<Vec<Restaurant>> {
        let mut restaurants = state.db.get_restaurants()?;
        if let Some(needle) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            restaurants.retain(|r| r.info.restaurant_name.to_lowercase().contains(&needle));
        }
        Ok(restaurants)
    })();
    state.track("get_restaurants", search.as_deref(), result)
}

/// Merge field updates into a restaurant.
///
/// Keys are stored field names (`address`, `priceLevel`, ...). An empty
/// value clears the field. The place id cannot be changed.
pub async fn update_restaurant(
    state: &AppState,
    id: &str,
    fields: Vec<(String, String)>,
) -> Result<Restaurant, AppError> {
    log::info!("Updating restaurant {}: {} field(s)", id, fields.len());
    let result = (|| -> AppResult<Restaurant> {
        let mut patch = Map::new();
        for (key, value) in fields {
            let field: ReviewField = key.parse().map_err(AppError::Validation)?;
            if matches!(field, ReviewField::GooglePlaceId | ReviewField::SecondOfReview) {
                return Err(AppError::Validation(format!("{} cannot be set on a restaurant", key)));
            }
            patch.insert(key, Value::String(value));
        }

        if state.db.get_restaurant(id)?.is_none() {
            return Err(AppError::NotFound(format!("restaurant {}", id)));
        }
        state.db.merge_restaurant(id, &patch)?;
        state
            .db
            .get_restaurant(id)?
            .ok_or_else(|| AppError::NotFound(format!("restaurant {}", id)))
    })();
    state.track("update_restaurant", Some(id), result)
}

/// Delete a restaurant
pub async fn delete_restaurant(state: &AppState, id: &str) -> Result<(), AppError> {
    log::info!("Deleting restaurant {}", id);
    let result = match state.db.delete_restaurant(id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::NotFound(format!("restaurant {}", id))),
        Err(e) => Err(e.into()),
    };
    state.track("delete_restaurant", Some(id), result)
}

/// Re-enrich a restaurant from the places API by its name
pub async fn refresh_restaurant_from_places(state: &AppState, id: &str) -> Result<Restaurant, AppError> {
    let result = match state.linker() {
        Ok(linker) => linker.refresh_restaurant(&state.db, id).await,
        Err(e) => Err(e),
    };
    state.track("refresh_restaurant_from_places", Some(id), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::state_with;
    use crate::database::RestaurantInfo;
    use crate::sync::fakes::{pizza_details, FakePlaces};

    fn seed(state: &AppState, place_id: &str, name: &str) {
        let info = RestaurantInfo {
            restaurant_name: name.to_string(),
            phone: "+1 555-0199".to_string(),
            ..Default::default()
        };
        state.db.upsert_restaurant(place_id, &info, None).unwrap();
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let (state, _temp_dir) = state_with(None, None);
        seed(&state, "p1", "Pizza X");
        seed(&state, "p2", "Taco Y");

        assert_eq!(get_restaurants(&state, None).await.unwrap().len(), 2);
        let tacos = get_restaurants(&state, Some("taco".to_string())).await.unwrap();
        assert_eq!(tacos.len(), 1);
        assert_eq!(tacos[0].id, "p2");
    }

    #[tokio::test]
    async fn test_update_sets_and_clears_fields() {
        let (state, _temp_dir) = state_with(None, None);
        seed(&state, "p1", "Pizza X");

        let updated = update_restaurant(
            &state,
            "p1",
            vec![
                ("priceLevel".to_string(), "PRICE_LEVEL_INEXPENSIVE".to_string()),
                ("phone".to_string(), String::new()),
            ],
        )
        .await
        .unwrap();
        assert_eq!(updated.info.price_level, "PRICE_LEVEL_INEXPENSIVE");
        assert_eq!(updated.info.phone, "");
        assert_eq!(updated.info.restaurant_name, "Pizza X");
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_and_identity_fields() {
        let (state, _temp_dir) = state_with(None, None);
        seed(&state, "p1", "Pizza X");

        let err = update_restaurant(&state, "p1", vec![("colour".to_string(), "red".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = update_restaurant(&state, "p1", vec![("googlePlaceId".to_string(), "p9".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_missing_restaurant_does_not_create() {
        let (state, _temp_dir) = state_with(None, None);
        let err = update_restaurant(&state, "p1", vec![("address".to_string(), "x".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(state.db.get_restaurant("p1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_and_delete() {
        let (state, _temp_dir) = state_with(None, Some(FakePlaces::with_place("p1", pizza_details())));
        seed(&state, "p1", "Pizza X");

        let refreshed = refresh_restaurant_from_places(&state, "p1").await.unwrap();
        assert_eq!(refreshed.info.phone, "+1 555-0100");
        assert_eq!(refreshed.info.restaurant_status, "OPERATIONAL");

        delete_restaurant(&state, "p1").await.unwrap();
        assert!(matches!(
            delete_restaurant(&state, "p1").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
