//! Per-session editing state for a video's draft reviews.
//!
//! `Idle -> Loading -> Editing -> Saving -> Idle`. Drafts live in an owned
//! [`ReviewList`]; every change goes through [`apply_edit`], which returns
//! a new list, so each step can be kept in the undo history.

use crate::database::{Review, ReviewField, Video};
use crate::error::{AppError, AppResult};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Loading {
        video_id: String,
    },
    Editing {
        video_id: String,
        review_index: Option<usize>,
    },
    Saving {
        video_id: String,
    },
}

/// Ordered draft reviews. Never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewList(Vec<Review>);

impl ReviewList {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self(reviews)
    }

    pub fn as_slice(&self) -> &[Review] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Review> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Review> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEdit {
    /// Append a review, usually an empty one to be filled in.
    Add(Review),
    Update {
        index: usize,
        field: ReviewField,
        value: String,
    },
    Replace {
        index: usize,
        review: Review,
    },
    Remove {
        index: usize,
    },
}

/// Apply one edit, returning the new list. The input is left untouched.
pub fn apply_edit(list: &ReviewList, edit: ReviewEdit) -> AppResult<ReviewList> {
    let check = |index: usize| -> AppResult<()> {
        if index < list.len() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "review index {} out of range ({} reviews)",
                index,
                list.len()
            )))
        }
    };

    let mut reviews = list.0.clone();
    match edit {
        ReviewEdit::Add(review) => reviews.push(review),
        ReviewEdit::Update { index, field, value } => {
            check(index)?;
            reviews[index].set_field(field, value);
        }
        ReviewEdit::Replace { index, review } => {
            check(index)?;
            reviews[index] = review;
        }
        ReviewEdit::Remove { index } => {
            check(index)?;
            reviews.remove(index);
        }
    }
    Ok(ReviewList(reviews))
}

/// One user's editing session over a single video at a time.
#[derive(Debug, Default)]
pub struct EditSession {
    state: SessionState,
    video: Option<Video>,
    drafts: ReviewList,
    history: Vec<ReviewList>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state.clone()
    }

    /// The loaded video as last read from storage.
    pub fn video(&self) -> Option<&Video> {
        self.video.as_ref()
    }

    pub fn drafts(&self) -> &ReviewList {
        &self.drafts
    }

    pub fn active_review(&self) -> Option<&Review> {
        match self.state() {
            SessionState::Editing {
                review_index: Some(index),
                ..
            } => self.drafts.get(index),
            _ => None,
        }
    }

    pub fn begin_load(&mut self, video_id: &str) -> AppResult<()> {
        match self.state() {
            SessionState::Idle | SessionState::Editing { .. } => {
                self.state = SessionState::Loading {
                    video_id: video_id.to_string(),
                };
                Ok(())
            }
            other => Err(busy(&other)),
        }
    }

    pub fn finish_load(&mut self, video: Video) -> AppResult<()> {
        match self.state() {
            SessionState::Loading { video_id } if video_id == video.id => {
                self.state = SessionState::Editing {
                    video_id,
                    review_index: None,
                };
                self.video = Some(video);
                self.drafts = ReviewList::default();
                self.history.clear();
                Ok(())
            }
            other => Err(unexpected("finish loading", &other)),
        }
    }

    pub fn fail_load(&mut self) {
        if matches!(self.state(), SessionState::Loading { .. }) {
            self.state = SessionState::Idle;
            self.video = None;
            self.drafts = ReviewList::default();
            self.history.clear();
        }
    }

    pub fn select_review(&mut self, index: Option<usize>) -> AppResult<()> {
        let SessionState::Editing { video_id, .. } = self.state() else {
            return Err(unexpected("select a review", &self.state()));
        };
        if let Some(i) = index {
            if i >= self.drafts.len() {
                return Err(AppError::Validation(format!("no draft review at index {}", i)));
            }
        }
        self.state = SessionState::Editing {
            video_id,
            review_index: index,
        };
        Ok(())
    }

    pub fn edit(&mut self, edit: ReviewEdit) -> AppResult<()> {
        let SessionState::Editing { video_id, review_index } = self.state() else {
            return Err(unexpected("edit reviews", &self.state()));
        };
        let added = matches!(edit, ReviewEdit::Add(_));
        let next = apply_edit(&self.drafts, edit)?;
        let previous = std::mem::replace(&mut self.drafts, next);
        self.history.push(previous);

        let review_index = if added {
            Some(self.drafts.len() - 1)
        } else {
            review_index.filter(|i| *i < self.drafts.len())
        };
        self.state = SessionState::Editing { video_id, review_index };
        Ok(())
    }

    /// Revert the last edit. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let SessionState::Editing { video_id, review_index } = self.state() else {
            return false;
        };
        let Some(previous) = self.history.pop() else {
            return false;
        };
        self.drafts = previous;
        self.state = SessionState::Editing {
            video_id,
            review_index: review_index.filter(|i| *i < self.drafts.len()),
        };
        true
    }

    /// Enter `Saving`; returns the video id and the drafts to persist.
    pub fn begin_save(&mut self) -> AppResult<(String, Vec<Review>)> {
        let SessionState::Editing { video_id, .. } = self.state() else {
            return Err(unexpected("save", &self.state()));
        };
        self.state = SessionState::Saving {
            video_id: video_id.clone(),
        };
        Ok((video_id, self.drafts.as_slice().to_vec()))
    }

    /// The drafts were appended; the session is done with this video.
    pub fn finish_save(&mut self) {
        if matches!(self.state(), SessionState::Saving { .. }) {
            self.state = SessionState::Idle;
            self.video = None;
            self.drafts = ReviewList::default();
            self.history.clear();
        }
    }

    /// Back to editing with the drafts intact, so the save can be retried.
    pub fn fail_save(&mut self) {
        if let SessionState::Saving { video_id } = self.state() {
            self.state = SessionState::Editing {
                video_id,
                review_index: None,
            };
        }
    }
}

fn busy(state: &SessionState) -> AppError {
    AppError::Validation(format!("session is busy ({:?})", state))
}

fn unexpected(action: &str, state: &SessionState) -> AppError {
    AppError::Validation(format!("cannot {} while {:?}", action, state))
}
