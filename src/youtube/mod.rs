//! YouTube Data API integration
//!
//! Channel lookup (by id or by search) and "latest video" listing for a channel.

use crate::config::AppConfig;
use crate::database::Thumbnails;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video-platform operations used by the channel resolver and video fetcher.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Free-text channel search, best match first.
    async fn search_channels(&self, query: &str) -> AppResult<Vec<ChannelCandidate>>;

    /// Direct lookup by canonical channel id.
    async fn get_channel(&self, channel_id: &str) -> AppResult<Option<ChannelCandidate>>;

    /// Videos of a channel, newest first.
    async fn list_channel_videos(&self, channel_id: &str, limit: u32) -> AppResult<Vec<VideoCandidate>>;
}

/// YouTube client for making API calls
pub struct YouTubeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config
            .youtube_api_key
            .as_deref()
            .map(|key| Self::new(key, &config.youtube_base_url, config.request_timeout()))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("YouTube {} request failed: {}", endpoint, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transient(format!(
                "YouTube {} returned {}: {}",
                endpoint, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Transient(format!("Failed to parse YouTube {} response: {}", endpoint, e)))
    }
}

#[async_trait]
impl VideoPlatform for YouTubeClient {
    async fn search_channels(&self, query: &str) -> AppResult<Vec<ChannelCandidate>> {
        log::info!("Searching YouTube channels for '{}'", query);
        let response: SearchResponse = self
            .get_json(
                "search",
                &[("part", "snippet"), ("type", "channel"), ("q", query), ("maxResults", "5")],
            )
            .await?;
        Ok(channels_from_search(response))
    }

    async fn get_channel(&self, channel_id: &str) -> AppResult<Option<ChannelCandidate>> {
        log::info!("Looking up YouTube channel {}", channel_id);
        let response: ChannelsResponse = self
            .get_json("channels", &[("part", "snippet"), ("id", channel_id)])
            .await?;
        Ok(response.items.into_iter().next().map(|item| ChannelCandidate {
            avatar_url: best_thumbnail(&item.snippet.thumbnails),
            title: item.snippet.title,
            channel_id: item.id,
        }))
    }

    async fn list_channel_videos(&self, channel_id: &str, limit: u32) -> AppResult<Vec<VideoCandidate>> {
        log::info!("Listing latest videos for channel {} (limit {})", channel_id, limit);
        let max_results = limit.clamp(1, 50).to_string();
        let response: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", channel_id),
                    ("type", "video"),
                    ("order", "date"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;
        Ok(videos_from_search(response))
    }
}

/// Search results of `type=channel`; items without a channel id are dropped.
fn channels_from_search(response: SearchResponse) -> Vec<ChannelCandidate> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let channel_id = item.id.channel_id.filter(|id| !id.is_empty())?;
            Some(ChannelCandidate {
                channel_id,
                avatar_url: best_thumbnail(&item.snippet.thumbnails),
                title: item.snippet.title,
            })
        })
        .collect()
}

/// Search results of `type=video`, in API order (newest first with `order=date`).
fn videos_from_search(response: SearchResponse) -> Vec<VideoCandidate> {
    response
        .items
        .into_iter()
        .map(|item| VideoCandidate {
            video_id: item.id.video_id.unwrap_or_default(),
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: item.snippet.published_at,
            thumbnails: item.snippet.thumbnails,
        })
        .collect()
}

fn best_thumbnail(thumbnails: &Thumbnails) -> String {
    ["high", "medium", "default"]
        .iter()
        .find_map(|size| thumbnails.get(*size))
        .map(|t| t.url.clone())
        .unwrap_or_default()
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchItemId {
    channel_id: Option<String>,
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Snippet {
    title: String,
    description: String,
    published_at: String,
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelsResponse {
    items: Vec<ChannelItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelItem {
    id: String,
    snippet: Snippet,
}

// ============================================================================
// Public Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCandidate {
    pub channel_id: String,
    pub title: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub thumbnails: Thumbnails,
}
