use crate::api::Provider;
use crate::config::MAX_BATCH_SIZE;
use crate::error::{Error, Result};
use crate::input;
use crate::models::{CoverOutcome, Resolution, RunSummary, TrackRequest};
use base64::{engine::general_purpose, Engine as _};
use std::path::Path;

/// Description attached to every playlist this tool creates.
pub const PLAYLIST_DESCRIPTION: &str = "Playlist generated from a CSV track list with csv-to-playlist";

/// Drives one CSV file through a provider: resolve, create, add, cover.
/// Every step is awaited before the next starts.
pub struct PlaylistUploader<P: Provider> {
    provider: P,
    batch_size: usize,
}

impl<P: Provider> PlaylistUploader<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Look up one row. Misses and lookup failures are logged and yield `None`.
    pub async fn resolve_track(&self, request: &TrackRequest) -> Option<String> {
        match self
            .provider
            .search_track_uri(&request.title, &request.artist)
            .await
        {
            Ok(Some(uri)) => Some(uri),
            Ok(None) => {
                log::info!("No tracks found for {} by {}", request.title, request.artist);
                None
            }
            Err(e) => {
                log::warn!(
                    "Search failed for {} by {}: {}",
                    request.title,
                    request.artist,
                    e
                );
                None
            }
        }
    }

    /// Resolve every row in order, one lookup at a time.
    pub async fn resolve_all(&self, requests: &[TrackRequest]) -> Resolution {
        let mut resolution = Resolution::default();
        for request in requests {
            match self.resolve_track(request).await {
                Some(uri) => resolution.resolved.push(uri),
                None => {
                    log::info!("Could not find URI for {} by {}", request.title, request.artist);
                    resolution.unresolved.push(request.clone());
                }
            }
        }
        resolution
    }

    /// Add `uris` in consecutive batches. A failed batch is logged and the
    /// rest still go out. Returns (added, failed) batch counts.
    pub async fn add_tracks_in_batches(&self, playlist_id: &str, uris: &[String]) -> (usize, usize) {
        let mut added = 0;
        let mut failed = 0;
        for (n, batch) in uris.chunks(self.batch_size).enumerate() {
            match self.provider.add_tracks(playlist_id, batch).await {
                Ok(()) => {
                    log::info!(
                        "Added batch {} ({} tracks) to playlist {}",
                        n + 1,
                        batch.len(),
                        playlist_id
                    );
                    added += 1;
                }
                Err(e) => {
                    log::error!("Error adding batch {} to playlist {}: {}", n + 1, playlist_id, e);
                    failed += 1;
                }
            }
        }
        (added, failed)
    }

    /// Read the image, base64 it and upload it as the playlist cover.
    /// Failures are logged and reported as `CoverOutcome::Failed`.
    pub async fn upload_cover_image(&self, playlist_id: &str, image_path: &Path) -> CoverOutcome {
        log::info!("Attempting to upload cover image from: {}", image_path.display());
        let bytes = match tokio::fs::read(image_path).await {
            Ok(b) => b,
            Err(e) => {
                let e = Error::Input(format!("{}: {}", image_path.display(), e));
                log::error!("Error uploading cover image: {}", e);
                return CoverOutcome::Failed;
            }
        };
        let encoded = general_purpose::STANDARD.encode(&bytes);
        match self.provider.upload_cover(playlist_id, &encoded).await {
            Ok(CoverOutcome::Accepted) => {
                log::info!("Cover image uploaded successfully.");
                CoverOutcome::Accepted
            }
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Error uploading cover image: {}", e);
                CoverOutcome::Failed
            }
        }
    }

    /// Full workflow for one input file.
    ///
    /// Returns early, before any further remote call, when the file cannot be
    /// read, no access token can be obtained, or playlist creation fails.
    /// Everything after that is best-effort and recorded in the summary.
    pub async fn run(&self, input_path: &Path, image_path: Option<&Path>) -> Result<RunSummary> {
        let requests = input::load_requests(input_path)?;
        let name = input::playlist_name(input_path)?;
        log::info!("Loaded {} rows from {}", requests.len(), input_path.display());

        let resolution = self.resolve_all(&requests).await;

        if let Err(e) = self.provider.ensure_token().await {
            log::error!("Unable to refresh access token: {}", e);
            return Err(e);
        }

        let playlist_id = match self
            .provider
            .create_playlist(&name, PLAYLIST_DESCRIPTION, true)
            .await
        {
            Ok(id) => {
                log::info!("Playlist created successfully: {}", id);
                id
            }
            Err(e) => {
                log::error!("Error creating playlist {}: {}", name, e);
                return Err(e);
            }
        };

        log::debug!("Collected URIs: {:?}", resolution.resolved);
        let (batches_added, batches_failed) = self
            .add_tracks_in_batches(&playlist_id, &resolution.resolved)
            .await;

        let cover = match image_path {
            Some(p) => Some(self.upload_cover_image(&playlist_id, p).await),
            None => None,
        };

        Ok(RunSummary {
            playlist_id,
            resolved: resolution.resolved,
            unresolved: resolution.unresolved,
            batches_added,
            batches_failed,
            cover,
        })
    }
}
