//! Channel resolution: identifier or profile URL to canonical channel id.

use super::identifier::{extract_channel_identifier, is_canonical_channel_id};
use crate::database::{Database, Reviewer};
use crate::error::{AppError, AppResult};
use crate::youtube::{ChannelCandidate, VideoPlatform};
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct ChannelResolver {
    platform: Arc<dyn VideoPlatform>,
}

impl ChannelResolver {
    pub fn new(platform: Arc<dyn VideoPlatform>) -> Self {
        Self { platform }
    }

    /// Resolve a normalized identifier with a single API call.
    ///
    /// Canonical ids are looked up directly; handles and custom names go
    /// through search and the first result is taken.
    pub async fn resolve_channel(&self, identifier: &str) -> AppResult<ChannelCandidate> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::Validation("channel identifier is empty".to_string()));
        }

        let found = if is_canonical_channel_id(identifier) {
            self.platform.get_channel(identifier).await?
        } else {
            self.platform
                .search_channels(identifier)
                .await?
                .into_iter()
                .next()
        };

        let channel = found.ok_or_else(|| AppError::NotFound(format!("channel '{}'", identifier)))?;
        log::info!("Resolved '{}' to channel {}", identifier, channel.channel_id);
        Ok(channel)
    }

    /// Extract the identifier from a profile URL and resolve it.
    pub async fn resolve_url(&self, web_url: &str) -> AppResult<ChannelCandidate> {
        if web_url.trim().is_empty() {
            return Err(AppError::Validation("channel URL is empty".to_string()));
        }
        let identifier = extract_channel_identifier(web_url);
        if identifier.is_empty() {
            return Err(AppError::Validation(format!(
                "unrecognized channel URL: {}",
                web_url
            )));
        }
        self.resolve_channel(&identifier).await
    }

    /// Resolve and persist a reviewer's channel id.
    ///
    /// An already resolved channel id is kept and no API call is made.
    /// The avatar is filled from the channel only when the reviewer has none.
    pub async fn resolve_reviewer(&self, db: &Database, reviewer_id: &str) -> AppResult<Reviewer> {
        let mut reviewer = db
            .get_reviewer(reviewer_id)?
            .ok_or_else(|| AppError::NotFound(format!("reviewer {}", reviewer_id)))?;

        if let Some(channel_id) = reviewer.resolved_channel_id() {
            log::info!("Reviewer {} already has channel {}", reviewer_id, channel_id);
            return Ok(reviewer);
        }

        let channel = self.resolve_url(&reviewer.web_url).await?;

        let mut patch = Map::new();
        patch.insert("channelId".to_string(), Value::String(channel.channel_id.clone()));
        if reviewer.avatar_url.is_empty() && !channel.avatar_url.is_empty() {
            patch.insert("avatarUrl".to_string(), Value::String(channel.avatar_url.clone()));
            reviewer.avatar_url = channel.avatar_url;
        }
        db.merge_reviewer(reviewer_id, &patch)?;

        reviewer.channel_id = Some(channel.channel_id);
        Ok(reviewer)
    }
}
