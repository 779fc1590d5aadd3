//! Keeps videos, their embedded reviews and restaurant records consistent.

use super::session::EditSession;
use super::BacklinkPolicy;
use crate::database::{Database, Review, Reviewer, VideoRef, VideoView};
use crate::error::{AppError, AppResult};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishFailure {
    pub place_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    /// Successful restaurant writes, one per published review.
    pub upserted: usize,
    /// How many of those created a new restaurant.
    pub created: usize,
    /// Reviews without a place id.
    pub skipped: usize,
    pub failed: Vec<PublishFailure>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub video_id: String,
    pub appended: usize,
    /// Length of the stored review list after the append.
    pub review_count: usize,
    pub publish: PublishReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReport {
    pub video_id: String,
    pub backlinks_removed: usize,
    /// Restaurants still pointing at the removed video.
    pub stale_backlinks: Vec<String>,
}

pub struct Reconciler {
    db: Arc<Database>,
    backlink_policy: BacklinkPolicy,
}

impl Reconciler {
    pub fn new(db: Arc<Database>, backlink_policy: BacklinkPolicy) -> Self {
        Self { db, backlink_policy }
    }

    /// Concatenate `reviews` onto the video's stored list. Saving the same
    /// review twice stores it twice.
    pub fn append_reviews(&self, video_id: &str, reviews: &[Review]) -> AppResult<Vec<Review>> {
        self.db
            .append_video_reviews(video_id, reviews)?
            .ok_or_else(|| AppError::NotFound(format!("video {}", video_id)))
    }

    /// Merge every review with a place id into its restaurant record and
    /// point the restaurant's `videos` map at `video`.
    ///
    /// Reviews without a place id are skipped. Distinct restaurants are
    /// written concurrently; reviews of the same restaurant are written in
    /// order. A failed write does not undo the others.
    #[tracing::instrument(skip_all, fields(video_id = %video.video_id, reviews = reviews.len()))]
    pub async fn publish_to_restaurants(&self, video: &VideoRef, reviews: &[Review]) -> PublishReport {
        let mut report = PublishReport::default();
        let mut groups: BTreeMap<String, Vec<Review>> = BTreeMap::new();

        for review in reviews {
            match review.place_id() {
                Some(place_id) => groups.entry(place_id.to_string()).or_default().push(review.clone()),
                None => {
                    log::warn!(
                        "Skipping review '{}' of video {}: no place id",
                        review.info.restaurant_name,
                        video.video_id
                    );
                    report.skipped += 1;
                }
            }
        }

        let place_ids: Vec<String> = groups.keys().cloned().collect();
        let tasks = groups.into_iter().map(|(place_id, group)| {
            let db = Arc::clone(&self.db);
            let video = video.clone();
            tokio::task::spawn_blocking(move || publish_group(&db, &place_id, &group, &video))
        });

        for (place_id, result) in place_ids.into_iter().zip(join_all(tasks).await) {
            match result {
                Ok(outcome) => {
                    report.upserted += outcome.upserted;
                    report.created += outcome.created;
                    report.failed.extend(outcome.failed);
                }
                Err(e) => report.failed.push(PublishFailure {
                    place_id,
                    error: format!("publish task failed: {}", e),
                }),
            }
        }

        log::info!(
            "Published video {}: {} upserted ({} new), {} skipped, {} failed",
            video.video_id,
            report.upserted,
            report.created,
            report.skipped,
            report.failed.len()
        );
        report
    }

    /// Append draft reviews to a video, then publish them to restaurants.
    pub async fn save_video_reviews(&self, video_id: &str, reviews: &[Review]) -> AppResult<SaveReport> {
        let video = self
            .db
            .get_video(video_id)?
            .ok_or_else(|| AppError::NotFound(format!("video {}", video_id)))?;

        let stored = self.append_reviews(&video.id, reviews)?;
        let video_ref = VideoRef {
            video_id: video.id.clone(),
            title: video.title.clone(),
        };
        let publish = self.publish_to_restaurants(&video_ref, reviews).await;

        Ok(SaveReport {
            video_id: video.id,
            appended: reviews.len(),
            review_count: stored.len(),
            publish,
        })
    }

    /// Delete a video. Restaurant backlinks are handled per the configured policy.
    pub fn remove_video(&self, video_id: &str) -> AppResult<RemoveReport> {
        if !self.db.delete_video(video_id)? {
            return Err(AppError::NotFound(format!("video {}", video_id)));
        }

        let linked = self.db.restaurants_linking_video(video_id)?;
        let mut report = RemoveReport {
            video_id: video_id.to_string(),
            ..Default::default()
        };

        match self.backlink_policy {
            BacklinkPolicy::Tolerate => {
                if !linked.is_empty() {
                    log::info!(
                        "Video {} removed; {} restaurant(s) keep a stale backlink",
                        video_id,
                        linked.len()
                    );
                }
                report.stale_backlinks = linked;
            }
            BacklinkPolicy::Cascade => {
                for restaurant_id in linked {
                    if self.db.remove_restaurant_backlink(&restaurant_id, video_id)? {
                        report.backlinks_removed += 1;
                    }
                }
                log::info!(
                    "Video {} removed with {} backlink(s)",
                    video_id,
                    report.backlinks_removed
                );
            }
        }
        Ok(report)
    }

    /// Videos joined with their reviewer, newest first.
    ///
    /// A video whose reviewer cannot be found gets the placeholder name and
    /// avatar. `search` filters on the title, case-insensitively.
    pub fn load_video_views(
        &self,
        search: Option<&str>,
        placeholder_name: &str,
        placeholder_avatar: &str,
    ) -> AppResult<Vec<VideoView>> {
        let reviewers = self.db.get_reviewers()?;
        let by_channel: HashMap<&str, &Reviewer> = reviewers
            .iter()
            .filter_map(|r| r.resolved_channel_id().map(|id| (id, r)))
            .collect();

        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut views: Vec<VideoView> = self
            .db
            .get_videos()?
            .into_iter()
            .filter(|v| match &needle {
                Some(needle) => v.title.to_lowercase().contains(needle),
                None => true,
            })
            .map(|video| {
                let reviewer = by_channel
                    .get(video.channel_id.as_str())
                    .copied()
                    .or_else(|| reviewers.iter().find(|r| r.id == video.channel_id));
                match reviewer {
                    Some(r) => VideoView {
                        channel_title: r.channel_name.clone(),
                        channel_avatar: if r.avatar_url.is_empty() {
                            placeholder_avatar.to_string()
                        } else {
                            r.avatar_url.clone()
                        },
                        reviewer_found: true,
                        video,
                    },
                    None => VideoView {
                        channel_title: placeholder_name.to_string(),
                        channel_avatar: placeholder_avatar.to_string(),
                        reviewer_found: false,
                        video,
                    },
                }
            })
            .collect();

        views.sort_by(|a, b| b.video.published_at.cmp(&a.video.published_at));
        Ok(views)
    }

    /// Load a stored video into an editing session.
    pub fn load_into_session(&self, session: &mut EditSession, video_id: &str) -> AppResult<()> {
        session.begin_load(video_id)?;
        match self.db.get_video(video_id) {
            Ok(Some(video)) => session.finish_load(video),
            Ok(None) => {
                session.fail_load();
                Err(AppError::NotFound(format!("video {}", video_id)))
            }
            Err(e) => {
                session.fail_load();
                Err(e.into())
            }
        }
    }

    /// Save the session's drafts. The session returns to `Idle` once the
    /// reviews are appended, even if some restaurant writes failed; those
    /// are in the report. Any earlier failure puts it back to `Editing`.
    pub async fn save_session(&self, session: &mut EditSession) -> AppResult<SaveReport> {
        let (video_id, drafts) = session.begin_save()?;
        match self.save_video_reviews(&video_id, &drafts).await {
            Ok(report) => {
                session.finish_save();
                Ok(report)
            }
            Err(e) => {
                session.fail_save();
                Err(e)
            }
        }
    }
}

#[derive(Default)]
struct GroupOutcome {
    upserted: usize,
    created: usize,
    failed: Vec<PublishFailure>,
}

fn publish_group(db: &Database, place_id: &str, reviews: &[Review], video: &VideoRef) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();
    for review in reviews {
        match db.upsert_restaurant(place_id, &review.info, Some(video)) {
            Ok(created) => {
                outcome.upserted += 1;
                if created {
                    outcome.created += 1;
                }
            }
            Err(e) => {
                log::error!("Failed to upsert restaurant {}: {}", place_id, e);
                outcome.failed.push(PublishFailure {
                    place_id: place_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewReviewer, RestaurantInfo, Video};
    use crate::sync::fakes::FakePlatform;
    use crate::sync::session::{ReviewEdit, SessionState};
    use crate::sync::VideoFetcher;
    use tempfile::TempDir;

    fn setup() -> (Reconciler, Arc<Database>, TempDir) {
        setup_with(BacklinkPolicy::Tolerate)
    }

    fn setup_with(policy: BacklinkPolicy) -> (Reconciler, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
        (Reconciler::new(db.clone(), policy), db, temp_dir)
    }

    fn store_video(db: &Database, video_id: &str, title: &str, published_at: &str) {
        db.insert_video_if_absent(&Video {
            video_id: video_id.to_string(),
            channel_id: "UCchef".to_string(),
            title: title.to_string(),
            published_at: published_at.to_string(),
            ..Default::default()
        })
        .unwrap();
    }

    fn review(name: &str, place_id: &str) -> Review {
        let mut review = Review::named(name);
        review.info.google_place_id = place_id.to_string();
        review
    }

    #[tokio::test]
    async fn test_save_creates_restaurant_with_backlink() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Best pizza", "2024-05-01T00:00:00Z");

        let report = reconciler
            .save_video_reviews("v1", &[review("Pizza X", "p1")])
            .await
            .unwrap();
        assert_eq!(report.review_count, 1);
        assert_eq!(report.publish.created, 1);

        let video = db.get_video("v1").unwrap().unwrap();
        assert_eq!(video.reviews.len(), 1);

        let restaurant = db.get_restaurant("p1").unwrap().unwrap();
        assert_eq!(restaurant.info.restaurant_name, "Pizza X");
        assert_eq!(restaurant.info.google_place_id, "p1");
        assert_eq!(
            restaurant.videos["v1"],
            VideoRef {
                video_id: "v1".to_string(),
                title: "Best pizza".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reviews_without_place_id_are_skipped() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Food crawl", "2024-05-01T00:00:00Z");

        let reviews = [review("A", "pa"), Review::named("No id yet"), review("B", "pb")];
        let report = reconciler.save_video_reviews("v1", &reviews).await.unwrap();

        assert_eq!(report.publish.upserted, 2);
        assert_eq!(report.publish.skipped, 1);
        assert!(report.publish.is_complete());
        assert_eq!(db.get_restaurants().unwrap().len(), 2);
        // Skipped reviews are still saved on the video.
        assert_eq!(db.get_video("v1").unwrap().unwrap().reviews.len(), 3);
    }

    #[tokio::test]
    async fn test_repeat_save_accumulates_duplicates() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Best pizza", "2024-05-01T00:00:00Z");
        let reviews = [review("Pizza X", "p1")];

        reconciler.save_video_reviews("v1", &reviews).await.unwrap();
        let second = reconciler.save_video_reviews("v1", &reviews).await.unwrap();

        assert_eq!(second.review_count, 2);
        assert_eq!(second.publish.created, 0);
        assert_eq!(db.get_restaurants().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_place_in_one_batch_merges_in_order() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Two visits", "2024-05-01T00:00:00Z");
        let mut first = review("Pizza X", "p1");
        first.info.phone = "+1 555-0100".to_string();
        let mut second = review("Pizza X (downtown)", "p1");
        second.info.website = "https://pizzax.example".to_string();

        let report = reconciler
            .save_video_reviews("v1", &[first, second])
            .await
            .unwrap();
        assert_eq!(report.publish.upserted, 2);
        assert_eq!(report.publish.created, 1);

        let restaurant = db.get_restaurant("p1").unwrap().unwrap();
        assert_eq!(restaurant.info.restaurant_name, "Pizza X (downtown)");
        assert_eq!(restaurant.info.phone, "+1 555-0100");
        assert_eq!(restaurant.info.website, "https://pizzax.example");
    }

    #[tokio::test]
    async fn test_backlinks_accumulate_across_videos() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "First", "2024-05-01T00:00:00Z");
        store_video(&db, "v2", "Second", "2024-06-01T00:00:00Z");

        reconciler.save_video_reviews("v1", &[review("Pizza X", "p1")]).await.unwrap();
        reconciler.save_video_reviews("v2", &[review("Pizza X", "p1")]).await.unwrap();

        let restaurant = db.get_restaurant("p1").unwrap().unwrap();
        assert_eq!(restaurant.videos.len(), 2);
        assert_eq!(restaurant.videos["v2"].title, "Second");
    }

    #[tokio::test]
    async fn test_save_to_missing_video() {
        let (reconciler, db, _temp_dir) = setup();
        let err = reconciler
            .save_video_reviews("ghost", &[review("Pizza X", "p1")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(db.get_restaurants().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_video_tolerates_stale_backlink() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Best pizza", "2024-05-01T00:00:00Z");
        reconciler.save_video_reviews("v1", &[review("Pizza X", "p1")]).await.unwrap();

        let report = reconciler.remove_video("v1").unwrap();
        assert_eq!(report.stale_backlinks, vec!["p1"]);
        assert_eq!(report.backlinks_removed, 0);
        assert!(db.get_video("v1").unwrap().is_none());

        let restaurant = db.get_restaurant("p1").unwrap().unwrap();
        assert!(restaurant.videos.contains_key("v1"));
    }

    #[tokio::test]
    async fn test_remove_video_cascades_when_configured() {
        let (reconciler, db, _temp_dir) = setup_with(BacklinkPolicy::Cascade);
        store_video(&db, "v1", "Best pizza", "2024-05-01T00:00:00Z");
        store_video(&db, "v2", "More pizza", "2024-06-01T00:00:00Z");
        reconciler.save_video_reviews("v1", &[review("Pizza X", "p1")]).await.unwrap();
        reconciler.save_video_reviews("v2", &[review("Pizza X", "p1")]).await.unwrap();

        let report = reconciler.remove_video("v1").unwrap();
        assert_eq!(report.backlinks_removed, 1);
        assert!(report.stale_backlinks.is_empty());

        let restaurant = db.get_restaurant("p1").unwrap().unwrap();
        assert!(!restaurant.videos.contains_key("v1"));
        assert!(restaurant.videos.contains_key("v2"));
        assert_eq!(restaurant.info.restaurant_name, "Pizza X");
    }

    #[test]
    fn test_remove_missing_video() {
        let (reconciler, _db, _temp_dir) = setup();
        assert!(matches!(
            reconciler.remove_video("ghost").unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_video_views_join_reviewer_with_placeholder() {
        let (reconciler, db, _temp_dir) = setup();
        db.create_reviewer(&NewReviewer {
            channel_name: "Chef ABC".to_string(),
            web_url: "https://youtube.com/@chefabc".to_string(),
            channel_id: Some("UCchef".to_string()),
            avatar_url: "https://img/chef.jpg".to_string(),
            ..Default::default()
        })
        .unwrap();
        store_video(&db, "v1", "Old pizza", "2024-01-01T00:00:00Z");
        store_video(&db, "v2", "New tacos", "2024-06-01T00:00:00Z");
        db.insert_video_if_absent(&Video {
            video_id: "v3".to_string(),
            channel_id: "UCgone".to_string(),
            title: "Orphan pizza".to_string(),
            published_at: "2024-03-01T00:00:00Z".to_string(),
            ..Default::default()
        })
        .unwrap();

        let views = reconciler.load_video_views(None, "Unknown", "https://ph/48").unwrap();
        let ids: Vec<&str> = views.iter().map(|v| v.video.id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v3", "v1"]);
        assert_eq!(views[0].channel_title, "Chef ABC");
        assert!(views[0].reviewer_found);
        assert_eq!(views[1].channel_title, "Unknown");
        assert_eq!(views[1].channel_avatar, "https://ph/48");
        assert!(!views[1].reviewer_found);

        let pizza = reconciler.load_video_views(Some("PIZZA"), "Unknown", "").unwrap();
        assert_eq!(pizza.len(), 2);
    }

    #[tokio::test]
    async fn test_session_load_edit_save() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Best pizza", "2024-05-01T00:00:00Z");
        let mut session = EditSession::new();

        reconciler.load_into_session(&mut session, "v1").unwrap();
        session.edit(ReviewEdit::Add(Review::named("Pizza X"))).unwrap();
        session
            .edit(ReviewEdit::Update {
                index: 0,
                field: crate::database::ReviewField::GooglePlaceId,
                value: "p1".to_string(),
            })
            .unwrap();

        let report = reconciler.save_session(&mut session).await.unwrap();
        assert_eq!(report.publish.upserted, 1);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(db.get_restaurant("p1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_session_save_failure_returns_to_editing() {
        let (reconciler, db, _temp_dir) = setup();
        store_video(&db, "v1", "Best pizza", "2024-05-01T00:00:00Z");
        let mut session = EditSession::new();
        reconciler.load_into_session(&mut session, "v1").unwrap();
        session.edit(ReviewEdit::Add(review("Pizza X", "p1"))).unwrap();
        db.delete_video("v1").unwrap();

        assert!(reconciler.save_session(&mut session).await.is_err());
        assert!(matches!(session.state(), SessionState::Editing { .. }));
        assert_eq!(session.drafts().len(), 1);
    }

    #[test]
    fn test_session_load_missing_video() {
        let (reconciler, _db, _temp_dir) = setup();
        let mut session = EditSession::new();
        assert!(reconciler.load_into_session(&mut session, "ghost").is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_fetch_then_save_then_refetch_keeps_reviews() {
        let (reconciler, db, _temp_dir) = setup();
        let platform = FakePlatform::default();
        platform.push_video("v1", "Pizza", "2024-05-02T10:00:00Z");
        let fetcher = VideoFetcher::new(Arc::new(platform), 5);

        fetcher.fetch_latest_video(&db, "UCchef").await.unwrap();
        reconciler.save_video_reviews("v1", &[review("Pizza X", "p1")]).await.unwrap();
        fetcher.fetch_latest_video(&db, "UCchef").await.unwrap();

        assert_eq!(db.get_videos().unwrap().len(), 1);
        assert_eq!(db.get_video("v1").unwrap().unwrap().reviews.len(), 1);
    }

    #[test]
    fn test_restaurant_merge_is_union() {
        let (_reconciler, db, _temp_dir) = setup();
        let phone = RestaurantInfo {
            phone: "+1 555-0100".to_string(),
            ..Default::default()
        };
        let site = RestaurantInfo {
            website: "https://pizzax.example".to_string(),
            ..Default::default()
        };
        db.upsert_restaurant("p1", &phone, None).unwrap();
        db.upsert_restaurant("p1", &site, None).unwrap();

        let restaurant = db.get_restaurant("p1").unwrap().unwrap();
        assert_eq!(restaurant.info.phone, "+1 555-0100");
        assert_eq!(restaurant.info.website, "https://pizzax.example");
    }
}
