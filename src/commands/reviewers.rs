use super::AppState;
use crate::database::{NewReviewer, Reviewer};
use crate::error::{AppError, AppResult};
use crate::sync::FetchOutcome;
use crate::youtube::ChannelCandidate;
use serde::{Deserialize, Serialize};

/// Editable reviewer fields. `None` leaves a field unchanged.
///
/// The channel id is not editable here; it is set by channel resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Get all reviewers, optionally filtered by channel-name prefix
pub async fn get_reviewers(state: &AppState, search: Option<String>) -> Result<Vec<Reviewer>, AppError> {
    let result = (|| -> AppResult<Vec<Reviewer>> {
        let mut reviewers = state.db.get_reviewers()?;
        if let Some(prefix) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let prefix = prefix.to_lowercase();
            reviewers.retain(|r| r.channel_name.to_lowercase().starts_with(&prefix));
        }
        reviewers.sort_by_key(|r| r.channel_name.to_lowercase());
        Ok(reviewers)
    })();
    state.track("get_reviewers", search.as_deref(), result)
}

/// Create a new reviewer
pub async fn create_reviewer(state: &AppState, reviewer: NewReviewer) -> Result<Reviewer, AppError> {
    log::info!("Creating reviewer: {} ({})", reviewer.channel_name, reviewer.web_url);
    let result = (|| -> AppResult<Reviewer> {
        if reviewer.channel_name.trim().is_empty() {
            return Err(AppError::Validation("channel name is required".to_string()));
        }
        if reviewer.web_url.trim().is_empty() {
            return Err(AppError::Validation("channel URL is required".to_string()));
        }
        Ok(state.db.create_reviewer(&reviewer)?)
    })();
    state.track("create_reviewer", Some(&reviewer.channel_name), result)
}

/// Update a reviewer
pub async fn update_reviewer(state: &AppState, id: &str, update: ReviewerUpdate) -> Result<Reviewer, AppError> {
    log::info!("Updating reviewer {}: {:?}", id, update);
    let result = (|| -> AppResult<Reviewer> {
        if update.channel_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("channel name cannot be empty".to_string()));
        }
        if state.db.get_reviewer(id)?.is_none() {
            return Err(AppError::NotFound(format!("reviewer {}", id)));
        }
        let patch = crate::database::to_body(&update)?;
        state.db.merge_reviewer(id, &patch)?;
        state
            .db
            .get_reviewer(id)?
            .ok_or_else(|| AppError::NotFound(format!("reviewer {}", id)))
    })();
    state.track("update_reviewer", Some(id), result)
}

/// Delete a reviewer. Its videos stay.
pub async fn delete_reviewer(state: &AppState, id: &str) -> Result<(), AppError> {
    log::info!("Deleting reviewer {}", id);
    let result = match state.db.delete_reviewer(id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::NotFound(format!("reviewer {}", id))),
        Err(e) => Err(e.into()),
    };
    state.track("delete_reviewer", Some(id), result)
}

/// Resolve and store the reviewer's channel id from its URL
pub async fn extract_channel_id(state: &AppState, reviewer_id: &str) -> Result<Reviewer, AppError> {
    let result = match state.resolver() {
        Ok(resolver) => resolver.resolve_reviewer(&state.db, reviewer_id).await,
        Err(e) => Err(e),
    };
    state.track("extract_channel_id", Some(reviewer_id), result)
}

/// Resolve a channel from a URL before the reviewer exists
pub async fn resolve_channel_for_url(state: &AppState, web_url: &str) -> Result<ChannelCandidate, AppError> {
    let result = match state.resolver() {
        Ok(resolver) => resolver.resolve_url(web_url).await,
        Err(e) => Err(e),
    };
    state.track("resolve_channel_for_url", Some(web_url), result)
}

/// Fetch the reviewer's latest video
/// Resolve a channel URL and fetch its latest video before any reviewer
/// exists for it. The video is stored; no reviewer is written.
pub async fn fetch_videos_for_url(state: &AppState, web_url: &str) -> Result<Option<FetchOutcome>, AppError> {
    let result: Result<Option<FetchOutcome>, AppError> = async {
        let channel = state.resolver()?.resolve_url(web_url).await?;
        state.fetcher()?.fetch_latest_video(&state.db, &channel.channel_id).await
    }
    .await;
    state.track("fetch_videos_for_url", Some(web_url), result)
}

pub async fn fetch_videos(state: &AppState, reviewer_id: &str) -> Result<Option<FetchOutcome>, AppError> {
    let result = match state.fetcher() {
        Ok(fetcher) => fetcher.fetch_for_reviewer(&state.db, reviewer_id).await,
        Err(e) => Err(e),
    };
    state.track("fetch_videos", Some(reviewer_id), result)
}
