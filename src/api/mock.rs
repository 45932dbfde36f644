use super::Provider;
use crate::error::{Error, Result};
use crate::models::CoverOutcome;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::info;

/// One remote operation as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EnsureToken,
    CreatePlaylist { name: String, description: String, public: bool },
    Search { title: String, artist: String },
    AddTracks { playlist_id: String, uris: Vec<String> },
    UploadCover { playlist_id: String, jpeg_base64: String },
}

/// In-memory provider used in tests. It knows a fixed set of tracks, can be
/// told to fail specific steps, and records every call in order.
pub struct MockProvider {
    tracks: HashMap<(String, String), String>,
    token_fails: bool,
    create_fails_with: Option<u16>,
    failing_batches: HashSet<usize>,
    cover_status: u16,
    calls: Mutex<Vec<Call>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
            token_fails: false,
            create_fails_with: None,
            failing_batches: HashSet::new(),
            cover_status: 202,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_track(mut self, title: &str, artist: &str, uri: &str) -> Self {
        self.tracks
            .insert((title.to_string(), artist.to_string()), uri.to_string());
        self
    }

    pub fn with_token_failure(mut self) -> Self {
        self.token_fails = true;
        self
    }

    pub fn with_create_failure(mut self, status: u16) -> Self {
        self.create_fails_with = Some(status);
        self
    }

    /// Fail the n-th add-tracks call (0-based).
    pub fn with_failing_batch(mut self, n: usize) -> Self {
        self.failing_batches.insert(n);
        self
    }

    pub fn with_cover_status(mut self, status: u16) -> Self {
        self.cover_status = status;
        self
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// URIs of each add-tracks call, in order.
    pub fn added_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddTracks { uris, .. } => Some(uris),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ensure_token(&self) -> Result<()> {
        self.record(Call::EnsureToken);
        if self.token_fails {
            return Err(Error::Auth("mock token failure".into()));
        }
        Ok(())
    }

    async fn create_playlist(&self, name: &str, description: &str, public: bool) -> Result<String> {
        info!("MockProvider: create_playlist {}", name);
        self.record(Call::CreatePlaylist {
            name: name.to_string(),
            description: description.to_string(),
            public,
        });
        match self.create_fails_with {
            Some(status) => Err(Error::Api {
                status,
                body: "mock create failure".into(),
            }),
            None => Ok(format!("mock-playlist-{}", name)),
        }
    }

    async fn search_track_uri(&self, title: &str, artist: &str) -> Result<Option<String>> {
        info!("MockProvider: search {} - {}", title, artist);
        self.record(Call::Search {
            title: title.to_string(),
            artist: artist.to_string(),
        });
        Ok(self
            .tracks
            .get(&(title.to_string(), artist.to_string()))
            .cloned())
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        info!("MockProvider: add_tracks {} -> {} tracks", playlist_id, uris.len());
        let index = self.added_batches().len();
        self.record(Call::AddTracks {
            playlist_id: playlist_id.to_string(),
            uris: uris.to_vec(),
        });
        if self.failing_batches.contains(&index) {
            return Err(Error::Api {
                status: 500,
                body: format!("mock batch {} failure", index),
            });
        }
        Ok(())
    }

    async fn upload_cover(&self, playlist_id: &str, jpeg_base64: &str) -> Result<CoverOutcome> {
        info!("MockProvider: upload_cover {} ({} bytes)", playlist_id, jpeg_base64.len());
        self.record(Call::UploadCover {
            playlist_id: playlist_id.to_string(),
            jpeg_base64: jpeg_base64.to_string(),
        });
        match self.cover_status {
            200 | 202 => Ok(CoverOutcome::Accepted),
            s if (200..300).contains(&s) => Ok(CoverOutcome::Unexpected(s)),
            s => Err(Error::Api {
                status: s,
                body: "mock cover failure".into(),
            }),
        }
    }
}
