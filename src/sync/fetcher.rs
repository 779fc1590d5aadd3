//! Latest-video fetching for a resolved channel.

use crate::database::{Database, Video};
use crate::error::{AppError, AppResult};
use crate::youtube::VideoPlatform;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    /// The stored video; on a refetch this is the existing record.
    pub video: Video,
    pub created: bool,
    /// Whether the owner's `lastVideoChecked` changed.
    pub reviewer_updated: bool,
}

pub struct VideoFetcher {
    platform: Arc<dyn VideoPlatform>,
    search_limit: u32,
}

impl VideoFetcher {
    pub fn new(platform: Arc<dyn VideoPlatform>, search_limit: u32) -> Self {
        Self {
            platform,
            search_limit: search_limit.max(1),
        }
    }

    /// Fetch the newest video of a channel and persist it.
    ///
    /// Writes the video first, then the owner's `lastVideoChecked`. The two
    /// writes are independent: a refetch converges on the same state.
    /// Returns `None` when the channel has no videos; nothing is written then.
    pub async fn fetch_latest_video(&self, db: &Database, channel_id: &str) -> AppResult<Option<FetchOutcome>> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(AppError::Validation("channel id is empty".to_string()));
        }

        let latest = self
            .platform
            .list_channel_videos(channel_id, self.search_limit)
            .await?
            .into_iter()
            .next();

        let Some(latest) = latest else {
            log::info!("No videos found for channel {}", channel_id);
            return Ok(None);
        };

        let mut video = Video {
            id: String::new(),
            channel_id: channel_id.to_string(),
            video_id: latest.video_id,
            title: latest.title,
            description: latest.description,
            published_at: latest.published_at,
            thumbnails: latest.thumbnails,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            reviews: Vec::new(),
        };

        let (id, created) = db.insert_video_if_absent(&video)?;
        if created {
            log::info!("Stored new video {} '{}' for channel {}", id, video.title, channel_id);
            video.id = id;
        } else {
            log::info!("Video {} already stored, skipping", id);
            video = db
                .get_video(&id)?
                .ok_or_else(|| AppError::NotFound(format!("video {}", id)))?;
        }

        let reviewer_updated = match db.find_reviewer_by_channel_id(channel_id)? {
            Some(reviewer) if reviewer.last_video_checked != video.published_at => {
                db.set_last_video_checked(&reviewer.id, &video.published_at)?;
                true
            }
            Some(_) => false,
            None => {
                log::warn!("No reviewer owns channel {}; lastVideoChecked not updated", channel_id);
                false
            }
        };

        Ok(Some(FetchOutcome {
            video,
            created,
            reviewer_updated,
        }))
    }

    /// Fetch for a reviewer; the reviewer's channel must already be resolved.
    pub async fn fetch_for_reviewer(&self, db: &Database, reviewer_id: &str) -> AppResult<Option<FetchOutcome>> {
        let reviewer = db
            .get_reviewer(reviewer_id)?
            .ok_or_else(|| AppError::NotFound(format!("reviewer {}", reviewer_id)))?;

        let channel_id = reviewer.resolved_channel_id().ok_or_else(|| {
            AppError::Validation(format!(
                "reviewer '{}' has no channel id; resolve it first",
                reviewer.channel_name
            ))
        })?;

        self.fetch_latest_video(db, channel_id).await
    }
}
