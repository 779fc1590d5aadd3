use super::AppState;
use crate::database::{Review, Video, VideoView};
use crate::error::{AppError, AppResult};
use crate::sync::{EditSession, RemoveReport, ReviewEdit, SaveReport};

/// Get videos joined with their reviewer, newest first
pub async fn get_videos(state: &AppState, search: Option<String>) -> Result<Vec<VideoView>, AppError> {
    let result = state.reconciler().load_video_views(
        search.as_deref(),
        &state.config.unknown_channel_name,
        &state.config.default_avatar_url,
    );
    state.track("get_videos", search.as_deref(), result)
}

/// Get a single video with its saved reviews
pub async fn get_video(state: &AppState, id: &str) -> Result<Video, AppError> {
    let result = match state.db.get_video(id) {
        Ok(Some(video)) => Ok(video),
        Ok(None) => Err(AppError::NotFound(format!("video {}", id))),
        Err(e) => Err(e.into()),
    };
    state.track("get_video", Some(id), result)
}

/// Append reviews to a video and publish them to restaurants.
///
/// A partial restaurant failure is returned as an error; the reviews and
/// the successful restaurant writes stay applied.
pub async fn save_video_reviews(state: &AppState, video_id: &str, reviews: Vec<Review>) -> Result<SaveReport, AppError> {
    log::info!("Saving {} review(s) to video {}", reviews.len(), video_id);
    let result = save_through_session(state, video_id, reviews).await;
    state.track("save_video_reviews", Some(video_id), result)
}

async fn save_through_session(state: &AppState, video_id: &str, reviews: Vec<Review>) -> AppResult<SaveReport> {
    if reviews.is_empty() {
        return Err(AppError::Validation("no reviews to save".to_string()));
    }

    let reconciler = state.reconciler();
    let mut session = EditSession::new();
    reconciler.load_into_session(&mut session, video_id)?;
    for review in reviews {
        session.edit(ReviewEdit::Add(review))?;
    }

    let report = reconciler.save_session(&mut session).await?;
    if !report.publish.is_complete() {
        let failed: Vec<String> = report
            .publish
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.place_id, f.error))
            .collect();
        return Err(AppError::Database(format!(
            "reviews saved, but {} restaurant update(s) failed: {}",
            failed.len(),
            failed.join("; ")
        )));
    }
    Ok(report)
}

/// Remove a video
pub async fn remove_video(state: &AppState, video_id: &str) -> Result<RemoveReport, AppError> {
    log::info!("Removing video {}", video_id);
    let result = state.reconciler().remove_video(video_id);
    state.track("remove_video", Some(video_id), result)
}

/// Fill a draft review from place details
pub async fn enrich_review(state: &AppState, review: Review, place_id: Option<String>) -> Result<Review, AppError> {
    let result = match state.linker() {
        Ok(linker) => linker.enrich_review(&review, place_id.as_deref()).await,
        Err(e) => Err(e),
    };
    state.track("enrich_review", Some(&review.info.restaurant_name), result)
}

/// Look up a draft review's restaurant by name, then enrich it
pub async fn find_place_for_review(state: &AppState, review: Review) -> Result<Review, AppError> {
    let result = match state.linker() {
        Ok(linker) => linker.enrich_by_name(&review).await,
        Err(e) => Err(e),
    };
    state.track("find_place_for_review", Some(&review.info.restaurant_name), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::state_with;
    use crate::sync::fakes::{pizza_details, FakePlaces};

    fn store_video(state: &AppState, video_id: &str, title: &str) {
        state
            .db
            .insert_video_if_absent(&Video {
                video_id: video_id.to_string(),
                channel_id: "UCchef".to_string(),
                title: title.to_string(),
                published_at: "2024-05-01T00:00:00Z".to_string(),
                ..Default::default()
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_enrich_then_save() {
        let (state, _temp_dir) = state_with(None, Some(FakePlaces::with_place("p1", pizza_details())));
        store_video(&state, "v1", "Best pizza");

        let draft = find_place_for_review(&state, Review::named("Pizza X")).await.unwrap();
        assert_eq!(draft.info.google_place_id, "p1");

        let report = save_video_reviews(&state, "v1", vec![draft, Review::named("Unknown stall")])
            .await
            .unwrap();
        assert_eq!(report.review_count, 2);
        assert_eq!(report.publish.upserted, 1);
        assert_eq!(report.publish.skipped, 1);

        let restaurant = state.db.get_restaurant("p1").unwrap().unwrap();
        assert_eq!(restaurant.info.address, "1 Main St");
        assert_eq!(restaurant.videos["v1"].title, "Best pizza");
    }

    #[tokio::test]
    async fn test_save_nothing_is_validation_error() {
        let (state, _temp_dir) = state_with(None, None);
        store_video(&state, "v1", "Best pizza");
        let err = save_video_reviews(&state, "v1", Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_video() {
        let (state, _temp_dir) = state_with(None, None);
        assert!(matches!(
            get_video(&state, "ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            save_video_reviews(&state, "ghost", vec![Review::named("A")]).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            remove_video(&state, "ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(state.error_log.get_errors().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_video_reports_stale_backlinks() {
        let (state, _temp_dir) = state_with(None, None);
        store_video(&state, "v1", "Best pizza");
        let mut review = Review::named("Pizza X");
        review.info.google_place_id = "p1".to_string();
        save_video_reviews(&state, "v1", vec![review]).await.unwrap();

        let report = remove_video(&state, "v1").await.unwrap();
        assert_eq!(report.stale_backlinks, vec!["p1"]);
        assert!(get_videos(&state, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enrich_without_places_key() {
        let (state, _temp_dir) = state_with(None, None);
        let err = enrich_review(&state, Review::named("Pizza X"), Some("p1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
