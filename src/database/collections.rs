//! Typed accessors for the reviewers, videos and restaurants collections.

use super::{merge_json, Collection, Database, Document, NewReviewer, Restaurant, RestaurantInfo, Review, Reviewer, Video, VideoRef};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Serialize a record into a document body. The `id` lives in the key, not the body.
pub(crate) fn to_body<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => anyhow::bail!("Record did not serialize to an object: {}", other),
    }
}

pub(crate) fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    let mut data = doc.data;
    data.insert("id".to_string(), Value::String(doc.id));
    Ok(serde_json::from_value(Value::Object(data))?)
}

const LEGACY_CHANNEL_ID: &str = "youtubeChannelId";

/// Fold a legacy `youtubeChannelId` key into `channelId` and drop it. A
/// non-empty `channelId` takes precedence over the legacy value.
fn normalize_reviewer_body(body: &mut Map<String, Value>) {
    let Some(legacy) = body.remove(LEGACY_CHANNEL_ID) else {
        return;
    };
    let resolved = body
        .get("channelId")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !resolved && !legacy.is_null() {
        body.insert("channelId".to_string(), legacy);
    }
}

fn reviewer_from_document(mut doc: Document) -> Result<Reviewer> {
    normalize_reviewer_body(&mut doc.data);
    from_document(doc)
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Database {
    fn list_as<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.list_documents(collection)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    fn get_as<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        self.get_document(collection, id)?
            .map(from_document)
            .transpose()
    }

    // =========================================================================
    // Reviewers
    // =========================================================================

    pub fn get_reviewers(&self) -> Result<Vec<Reviewer>> {
        self.list_documents(Collection::Reviewers)?
            .into_iter()
            .map(reviewer_from_document)
            .collect()
    }

    pub fn get_reviewer(&self, id: &str) -> Result<Option<Reviewer>> {
        self.get_document(Collection::Reviewers, id)?
            .map(reviewer_from_document)
            .transpose()
    }

    /// Find the reviewer owning a channel. Reviewers created after their
    /// channel was resolved are keyed by the channel id; older ones are
    /// found by scanning.
    pub fn find_reviewer_by_channel_id(&self, channel_id: &str) -> Result<Option<Reviewer>> {
        if let Some(reviewer) = self.get_reviewer(channel_id)? {
            return Ok(Some(reviewer));
        }
        Ok(self
            .get_reviewers()?
            .into_iter()
            .find(|r| r.resolved_channel_id() == Some(channel_id)))
    }

    /// Create a reviewer keyed by its channel id when known, otherwise
    /// under a generated id. An existing document with the same id is replaced.
    pub fn create_reviewer(&self, new: &NewReviewer) -> Result<Reviewer> {
        let channel_id = new
            .channel_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let mut reviewer = Reviewer {
            id: String::new(),
            channel_name: new.channel_name.trim().to_string(),
            web_url: new.web_url.trim().to_string(),
            channel_id: channel_id.clone(),
            avatar_url: new.avatar_url.clone(),
            last_video_checked: new.last_video_checked.clone(),
        };
        let body = to_body(&reviewer)?;

        reviewer.id = match channel_id {
            Some(id) => {
                self.set_document(Collection::Reviewers, &id, &body)?;
                id
            }
            None => self.add_document(Collection::Reviewers, &body)?,
        };
        Ok(reviewer)
    }

    /// Merge `patch` into a reviewer. The stored body is rewritten without
    /// the legacy channel id key, so `channelId` is the only one left.
    pub fn merge_reviewer(&self, id: &str, patch: &Map<String, Value>) -> Result<bool> {
        let updated = self.update_document(Collection::Reviewers, id, |body| {
            merge_json(body, patch);
            normalize_reviewer_body(body);
        })?;
        if updated.is_some() {
            return Ok(false);
        }
        let mut body = patch.clone();
        normalize_reviewer_body(&mut body);
        self.merge_document(Collection::Reviewers, id, &body)
    }

    pub fn set_reviewer_channel_id(&self, id: &str, channel_id: &str) -> Result<()> {
        self.merge_reviewer(id, &as_object(json!({ "channelId": channel_id })))?;
        Ok(())
    }

    pub fn set_last_video_checked(&self, id: &str, published_at: &str) -> Result<()> {
        self.merge_reviewer(id, &as_object(json!({ "lastVideoChecked": published_at })))?;
        Ok(())
    }

    /// Videos of the reviewer are kept; they are soft references.
    pub fn delete_reviewer(&self, id: &str) -> Result<bool> {
        self.delete_document(Collection::Reviewers, id)
    }

    // =========================================================================
    // Videos
    // =========================================================================

    pub fn get_videos(&self) -> Result<Vec<Video>> {
        self.list_as(Collection::Videos)
    }

    pub fn get_video(&self, id: &str) -> Result<Option<Video>> {
        self.get_as(Collection::Videos, id)
    }

    /// Store a fetched video keyed by its platform video id. An existing
    /// record is left as is. Returns the document id and whether it was created.
    pub fn insert_video_if_absent(&self, video: &Video) -> Result<(String, bool)> {
        let body = to_body(video)?;
        let video_id = video.video_id.trim();
        if video_id.is_empty() {
            let id = self.add_document(Collection::Videos, &body)?;
            return Ok((id, true));
        }
        let created = self.create_document(Collection::Videos, video_id, &body)?;
        Ok((video_id.to_string(), created))
    }

    /// Concatenate `reviews` onto the stored list. Returns the resulting
    /// list, or `None` if the video does not exist.
    pub fn append_video_reviews(&self, id: &str, reviews: &[Review]) -> Result<Option<Vec<Review>>> {
        self.update_document(Collection::Videos, id, |body| -> Result<Vec<Review>> {
            let mut all: Vec<Review> = match body.get("reviews") {
                Some(existing) => serde_json::from_value(existing.clone())?,
                None => Vec::new(),
            };
            all.extend_from_slice(reviews);
            body.insert("reviews".to_string(), serde_json::to_value(&all)?);
            Ok(all)
        })?
        .transpose()
    }

    pub fn delete_video(&self, id: &str) -> Result<bool> {
        self.delete_document(Collection::Videos, id)
    }

    // =========================================================================
    // Restaurants
    // =========================================================================

    pub fn get_restaurants(&self) -> Result<Vec<Restaurant>> {
        self.list_as(Collection::Restaurants)
    }

    pub fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        self.get_as(Collection::Restaurants, id)
    }

    /// Merge restaurant fields into the record keyed by `place_id`, adding
    /// or overwriting the backlink for `video`. Returns true when created.
    pub fn upsert_restaurant(
        &self,
        place_id: &str,
        info: &RestaurantInfo,
        video: Option<&VideoRef>,
    ) -> Result<bool> {
        let mut patch = to_body(info)?;
        patch.insert("googlePlaceId".to_string(), Value::String(place_id.to_string()));
        if let Some(video) = video {
            let mut videos = Map::new();
            videos.insert(video.video_id.clone(), serde_json::to_value(video)?);
            patch.insert("videos".to_string(), Value::Object(videos));
        }
        self.merge_document(Collection::Restaurants, place_id, &patch)
    }

    pub fn merge_restaurant(&self, id: &str, patch: &Map<String, Value>) -> Result<bool> {
        self.merge_document(Collection::Restaurants, id, patch)
    }

    /// Ids of restaurants holding a backlink to `video_id`.
    pub fn restaurants_linking_video(&self, video_id: &str) -> Result<Vec<String>> {
        Ok(self
            .get_restaurants()?
            .into_iter()
            .filter(|r| r.videos.contains_key(video_id))
            .map(|r| r.id)
            .collect())
    }

    /// Returns true if a backlink was removed.
    pub fn remove_restaurant_backlink(&self, restaurant_id: &str, video_id: &str) -> Result<bool> {
        let removed = self.update_document(Collection::Restaurants, restaurant_id, |body| {
            body.get_mut("videos")
                .and_then(Value::as_object_mut)
                .map(|videos| videos.remove(video_id).is_some())
                .unwrap_or(false)
        })?;
        Ok(removed.unwrap_or(false))
    }

    pub fn delete_restaurant(&self, id: &str) -> Result<bool> {
        self.delete_document(Collection::Restaurants, id)
    }
}
