use super::AppState;
use crate::database::{CollectionCounts, Database};
use crate::error::AppError;
use crate::sync::BacklinkPolicy;
use serde::Serialize;
use std::sync::Arc;

pub use crate::database::ErrorEntry;

/// Recent command errors, kept in the database so they outlive the
/// process that hit them. Oldest entries are dropped first.
pub struct ErrorLog {
    db: Arc<Database>,
    max_entries: usize,
}

impl ErrorLog {
    pub fn new(db: Arc<Database>, max_entries: usize) -> Self {
        Self { db, max_entries }
    }

    pub fn log_error(&self, command: &str, error: &str, context: Option<&str>) {
        let entry = ErrorEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: command.to_string(),
            error: error.to_string(),
            context: context.map(|s| s.to_string()),
        };

        match &entry.context {
            Some(context) => log::error!("{} ({}): {}", command, context, error),
            None => log::error!("{}: {}", command, error),
        }

        if let Err(e) = self.db.append_error_entry(&entry, self.max_entries) {
            log::warn!("Failed to record error for {}: {}", command, e);
        }
    }

    pub fn get_errors(&self) -> Result<Vec<ErrorEntry>, AppError> {
        Ok(self.db.get_error_entries()?)
    }

    pub fn clear(&self) -> Result<(), AppError> {
        let cleared = self.db.clear_error_entries()?;
        log::info!("Cleared {} logged error(s)", cleared);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsReport {
    pub app_version: String,
    pub database_status: String,
    pub database_path: String,
    pub counts: Option<CollectionCounts>,
    pub youtube_api_configured: bool,
    pub places_api_configured: bool,
    pub backlink_policy: BacklinkPolicy,
    pub recent_errors: Vec<ErrorEntry>,
}

/// Get diagnostics report including recent errors
pub async fn get_diagnostics(state: &AppState) -> Result<DiagnosticsReport, AppError> {
    let (database_status, counts) = match state.db.get_counts() {
        Ok(counts) => ("OK".to_string(), Some(counts)),
        Err(e) => (format!("ERROR: {}", e), None),
    };

    Ok(DiagnosticsReport {
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        database_status,
        database_path: state.db.path().to_string_lossy().to_string(),
        counts,
        youtube_api_configured: state.platform.is_some(),
        places_api_configured: state.places.is_some(),
        backlink_policy: state.config.backlink_policy,
        recent_errors: state.error_log.get_errors()?,
    })
}

/// Clear error log
pub async fn clear_errors(state: &AppState) -> Result<(), AppError> {
    state.error_log.clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::state_with;
    use crate::sync::fakes::FakePlatform;
    use tempfile::TempDir;

    #[test]
    fn test_error_log_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
        let log = ErrorLog::new(db, 2);
        log.log_error("a", "first", None);
        log.log_error("b", "second", Some("ctx"));
        log.log_error("c", "third", None);

        let errors = log.get_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].command, "b");
        assert_eq!(errors[0].context.as_deref(), Some("ctx"));
        assert_eq!(errors[1].error, "third");

        log.clear().unwrap();
        assert!(log.get_errors().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_counts_and_keys() {
        let (state, _temp_dir) = state_with(Some(FakePlatform::default()), None);
        state.error_log.log_error("fetch_videos", "boom", None);

        let report = get_diagnostics(&state).await.unwrap();
        assert_eq!(report.database_status, "OK");
        assert_eq!(report.counts.unwrap().videos, 0);
        assert!(report.youtube_api_configured);
        assert!(!report.places_api_configured);
        assert_eq!(report.recent_errors.len(), 1);

        clear_errors(&state).await.unwrap();
        assert!(get_diagnostics(&state).await.unwrap().recent_errors.is_empty());
    }

    #[tokio::test]
    async fn test_errors_survive_a_new_app_state() {
        let (state, _temp_dir) = state_with(None, None);
        let result: Result<(), AppError> = Err(AppError::NotFound("video v1".to_string()));
        assert!(state.track("remove_video", Some("v1"), result).is_err());

        let db = Arc::new(Database::new(state.db.path()).unwrap());
        let next = AppState::with_clients(db, state.config.clone(), None, None);

        let report = get_diagnostics(&next).await.unwrap();
        assert_eq!(report.recent_errors.len(), 1);
        assert_eq!(report.recent_errors[0].command, "remove_video");
        assert_eq!(report.recent_errors[0].context.as_deref(), Some("v1"));
        assert!(report.recent_errors[0].error.starts_with("[not_found]"));

        clear_errors(&next).await.unwrap();
        assert!(state.error_log.get_errors().unwrap().is_empty());
    }
}
