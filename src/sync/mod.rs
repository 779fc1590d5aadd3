//! Cross-collection synchronization.
//!
//! Links reviewer channel identifiers, fetched video metadata and
//! restaurant enrichment records. The commands layer drives these
//! components; none of them run in the background.

pub mod fetcher;
pub mod identifier;
pub mod linker;
pub mod reconciler;
pub mod resolver;
pub mod session;

pub use fetcher::{FetchOutcome, VideoFetcher};
pub use identifier::{extract_channel_identifier, is_canonical_channel_id};
pub use linker::{apply_place_details, EnrichmentLinker};
pub use reconciler::{PublishFailure, PublishReport, Reconciler, RemoveReport, SaveReport};
pub use resolver::ChannelResolver;
pub use session::{apply_edit, EditSession, ReviewEdit, ReviewList, SessionState};

use serde::{Deserialize, Serialize};

/// What happens to restaurant backlinks when a video is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacklinkPolicy {
    /// Leave `videos` entries pointing at the removed video.
    #[default]
    Tolerate,
    /// Drop the removed video from every restaurant's `videos` map.
    Cascade,
}
