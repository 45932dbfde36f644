pub mod spotify;
pub mod mock;
pub mod spotify_auth;

use crate::error::Result;
use crate::models::CoverOutcome;

/// Provider trait: the remote operations the uploader needs.
/// Implementations: spotify::SpotifyProvider, mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Make sure an access token is held, refreshing once if not.
    async fn ensure_token(&self) -> Result<()>;

    /// Create a playlist for the configured user and return its id.
    async fn create_playlist(&self, name: &str, description: &str, public: bool) -> Result<String>;

    /// Search for a track by title and artist. `None` when nothing matched.
    async fn search_track_uri(&self, title: &str, artist: &str) -> Result<Option<String>>;

    /// Add one batch of track URIs (batching done by caller)
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Upload a base64-encoded JPEG as the playlist cover.
    async fn upload_cover(&self, playlist_id: &str, jpeg_base64: &str) -> Result<CoverOutcome>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
