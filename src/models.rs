use serde::{Deserialize, Serialize};

/// One (title, artist) row of the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub title: String,
    pub artist: String,
}

impl TrackRequest {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// Rows split by whether search found them. Order follows the input.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub resolved: Vec<String>,
    pub unresolved: Vec<TrackRequest>,
}

/// Result of a cover upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOutcome {
    /// 200 or 202.
    Accepted,
    /// Some other 2xx; kept but logged.
    Unexpected(u16),
    /// Image unreadable or the request was rejected.
    Failed,
}

/// What a completed run did. Partial failures are recorded here rather than
/// returned as errors.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub playlist_id: String,
    pub resolved: Vec<String>,
    pub unresolved: Vec<TrackRequest>,
    pub batches_added: usize,
    pub batches_failed: usize,
    /// `None` when no image was given.
    pub cover: Option<CoverOutcome>,
}
