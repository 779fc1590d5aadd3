use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document collections. Names are the canonical, lower-case scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Reviewers,
    Videos,
    Restaurants,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Reviewers, Self::Videos, Self::Restaurants];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reviewers => "reviewers",
            Self::Videos => "videos",
            Self::Restaurants => "restaurants",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed command, as shown in diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub command: String,
    pub error: String,
    pub context: Option<String>,
}

/// A raw stored document: its id plus the JSON object body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Reviewers
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reviewer {
    pub id: String,
    pub channel_name: String,
    pub web_url: String,
    /// Older documents store this as `youtubeChannelId`; the store folds
    /// that key into `channelId` before a reviewer is deserialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub avatar_url: String,
    pub last_video_checked: String,
}

impl Reviewer {
    /// The channel id, if one has been resolved. Empty strings count as unresolved.
    pub fn resolved_channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Form input for a new reviewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewReviewer {
    pub channel_name: String,
    pub web_url: String,
    pub channel_id: Option<String>,
    pub avatar_url: String,
    pub last_video_checked: String,
}

// ============================================================================
// Videos and embedded reviews
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Thumbnails keyed by size name (`default`, `medium`, `high`, ...).
pub type Thumbnails = BTreeMap<String, Thumbnail>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Video {
    pub id: String,
    /// Soft reference to the owning reviewer's channel id.
    pub channel_id: String,
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub thumbnails: Thumbnails,
    pub fetched_at: String,
    /// Append-only; never reordered.
    pub reviews: Vec<Review>,
}

/// Restaurant fields shared by embedded reviews and restaurant records.
///
/// Empty fields are not serialized, so a merge write only touches the
/// fields that actually carry a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestaurantInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub restaurant_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub google_place_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub website: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trip_advisor_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub google_maps_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub google_maps_rating: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub google_maps_reviews_count: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub price_level: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    /// Maps page of the place's first photo. This is a link, not an image
    /// file; the photo media endpoint needs an API key on every request.
    pub restaurant_image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub restaurant_status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub restaurant_description: String,
}

/// One restaurant mention inside a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    #[serde(flatten)]
    pub info: RestaurantInfo,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub second_of_review: String,
}

impl Review {
    pub fn named(restaurant_name: &str) -> Self {
        Self {
            info: RestaurantInfo {
                restaurant_name: restaurant_name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// The place id this review links to, if any.
    pub fn place_id(&self) -> Option<&str> {
        let id = self.info.google_place_id.trim();
        (!id.is_empty()).then_some(id)
    }

    pub fn set_field(&mut self, field: ReviewField, value: String) {
        let info = &mut self.info;
        match field {
            ReviewField::RestaurantName => info.restaurant_name = value,
            ReviewField::GooglePlaceId => info.google_place_id = value,
            ReviewField::Address => info.address = value,
            ReviewField::Phone => info.phone = value,
            ReviewField::Website => info.website = value,
            ReviewField::TripAdvisorLink => info.trip_advisor_link = value,
            ReviewField::GoogleMapsLink => info.google_maps_link = value,
            ReviewField::GoogleMapsRating => info.google_maps_rating = value,
            ReviewField::GoogleMapsReviewsCount => info.google_maps_reviews_count = value,
            ReviewField::PriceLevel => info.price_level = value,
            ReviewField::RestaurantImage => info.restaurant_image = value,
            ReviewField::RestaurantStatus => info.restaurant_status = value,
            ReviewField::RestaurantDescription => info.restaurant_description = value,
            ReviewField::SecondOfReview => self.second_of_review = value,
        }
    }
}

/// Editable review fields, named as they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewField {
    RestaurantName,
    GooglePlaceId,
    Address,
    Phone,
    Website,
    TripAdvisorLink,
    GoogleMapsLink,
    GoogleMapsRating,
    GoogleMapsReviewsCount,
    PriceLevel,
    RestaurantImage,
    RestaurantStatus,
    RestaurantDescription,
    SecondOfReview,
}

impl std::str::FromStr for ReviewField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("Unknown review field: {}", s))
    }
}

// ============================================================================
// Restaurants
// ============================================================================

/// Backlink from a restaurant to a video that reviewed it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoRef {
    pub video_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Restaurant {
    /// Equal to the place id; the only deduplication key.
    pub id: String,
    #[serde(flatten)]
    pub info: RestaurantInfo,
    pub videos: BTreeMap<String, VideoRef>,
}

// ============================================================================
// Read models
// ============================================================================

/// A video joined with its reviewer for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    #[serde(flatten)]
    pub video: Video,
    pub channel_title: String,
    pub channel_avatar: String,
    /// False when the reviewer lookup fell back to placeholders.
    pub reviewer_found: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub reviewers: i64,
    pub videos: i64,
    pub restaurants: i64,
}
