//! Operations exposed to a front end (the CLI here).
//!
//! Every command records its failure in the persistent [`ErrorLog`] before
//! returning it, so a later `diagnostics` run still shows it.

mod diagnostics;
mod restaurants;
mod reviewers;
mod videos;

pub use diagnostics::*;
pub use restaurants::*;
pub use reviewers::*;
pub use videos::*;

use crate::config::AppConfig;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::places::{PlacesApi, PlacesClient};
use crate::sync::{ChannelResolver, EnrichmentLinker, Reconciler, VideoFetcher};
use crate::youtube::{VideoPlatform, YouTubeClient};
use std::sync::Arc;

/// Shared state handed to every command.
pub struct AppState {
    pub db: Arc<Database>,
    pub config: AppConfig,
    pub platform: Option<Arc<dyn VideoPlatform>>,
    pub places: Option<Arc<dyn PlacesApi>>,
    pub error_log: Arc<ErrorLog>,
}

impl AppState {
    /// Build API clients from the configured keys. A missing key leaves
    /// that client unset; commands needing it fail with a config error.
    pub fn new(db: Arc<Database>, config: AppConfig) -> Self {
        let platform = YouTubeClient::from_config(&config).map(|c| Arc::new(c) as Arc<dyn VideoPlatform>);
        let places = PlacesClient::from_config(&config).map(|c| Arc::new(c) as Arc<dyn PlacesApi>);
        Self::with_clients(db, config, platform, places)
    }

    pub fn with_clients(
        db: Arc<Database>,
        config: AppConfig,
        platform: Option<Arc<dyn VideoPlatform>>,
        places: Option<Arc<dyn PlacesApi>>,
    ) -> Self {
        let error_log = Arc::new(ErrorLog::new(db.clone(), 100)); // Keep last 100 errors
        Self {
            db,
            config,
            platform,
            places,
            error_log,
        }
    }

    fn platform(&self) -> AppResult<Arc<dyn VideoPlatform>> {
        self.platform.clone().ok_or_else(|| {
            AppError::Config(format!(
                "{} is not set",
                crate::config::YOUTUBE_API_KEY_VAR
            ))
        })
    }

    fn places(&self) -> AppResult<Arc<dyn PlacesApi>> {
        self.places.clone().ok_or_else(|| {
            AppError::Config(format!(
                "{} is not set",
                crate::config::PLACES_API_KEY_VAR
            ))
        })
    }

    pub(crate) fn resolver(&self) -> AppResult<ChannelResolver> {
        Ok(ChannelResolver::new(self.platform()?))
    }

    pub(crate) fn fetcher(&self) -> AppResult<VideoFetcher> {
        Ok(VideoFetcher::new(self.platform()?, self.config.video_search_limit))
    }

    pub(crate) fn linker(&self) -> AppResult<EnrichmentLinker> {
        Ok(EnrichmentLinker::new(self.places()?))
    }

    pub(crate) fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.db.clone(), self.config.backlink_policy)
    }

    /// Record a failed command in the error log; the result passes through.
    pub(crate) fn track<T>(&self, command: &str, context: Option<&str>, result: AppResult<T>) -> AppResult<T> {
        if let Err(e) = &result {
            self.error_log
                .log_error(command, &format!("[{}] {}", e.kind(), e), context);
        }
        result
    }
}
