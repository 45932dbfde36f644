use super::Provider;
use crate::config::{Credentials, Endpoints};
use crate::error::{Error, Result};
use crate::models::CoverOutcome;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Tokens that change while the provider runs.
struct TokenState {
    access_token: Option<String>,
    refresh_token: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    // Spotify sometimes rotates the refresh token.
    refresh_token: Option<String>,
}

/// Spotify provider backed by the Spotify Web API.
/// Holds the credential set for one run; the access token is replaced in
/// place when a refresh succeeds and cleared when it fails.
pub struct SpotifyProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    user_id: String,
    endpoints: Endpoints,
    token: tokio::sync::Mutex<TokenState>,
}

impl SpotifyProvider {
    pub fn new(credentials: Credentials, endpoints: Endpoints) -> Self {
        Self {
            client: Client::new(),
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            user_id: credentials.user_id,
            endpoints,
            token: tokio::sync::Mutex::new(TokenState {
                access_token: credentials.access_token,
                refresh_token: credentials.refresh_token,
            }),
        }
    }

    fn name(&self) -> &str {
        "spotify"
    }

    /// Access token currently held, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.token.lock().await.access_token.clone()
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// On any failure the held access token is cleared, so a later
    /// `ensure_token` tries again instead of reusing a dead token.
    pub async fn refresh_access_token(&self) -> Result<()> {
        let mut state = self.token.lock().await;
        let refresh_token = state.refresh_token.clone();
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let url = format!("{}/api/token", self.endpoints.auth_base);
        let resp = match self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                state.access_token = None;
                warn!("Error refreshing token: {}", e);
                return Err(e.into());
            }
        };

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            state.access_token = None;
            let description = token_error_description(&body);
            warn!("Error refreshing token: {} - {}", status, description);
            return Err(Error::Auth(format!("{} - {}", status, description)));
        }

        match serde_json::from_str::<RefreshResponse>(&body) {
            Ok(tr) => {
                state.access_token = Some(tr.access_token);
                if let Some(rotated) = tr.refresh_token {
                    debug!("Spotify returned a rotated refresh token");
                    state.refresh_token = rotated;
                }
                info!("Access token refreshed successfully.");
                Ok(())
            }
            Err(e) => {
                state.access_token = None;
                warn!("Error refreshing token: unreadable response: {}", e);
                Err(Error::Auth(format!("unreadable token response: {}", e)))
            }
        }
    }

    /// Send a request with the current bearer token.
    ///
    /// A 401 triggers exactly one refresh and one retry. If the refresh fails
    /// the auth error is returned and the request is not resent. Whatever the
    /// retry returns (including another 401) goes back to the caller.
    pub async fn authorized_request<F>(&self, method: Method, url: &str, decorate: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Sync,
    {
        let resp = self.send_with_token(method.clone(), url, &decorate).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        warn!("Got 401 for {} {}; attempting token refresh", method, url);
        self.refresh_access_token().await?;
        self.send_with_token(method, url, &decorate).await
    }

    async fn send_with_token<F>(&self, method: Method, url: &str, decorate: &F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Sync,
    {
        let access_token = self.access_token().await;
        let mut req = self.client.request(method, url);
        // Without a token the request goes out bare; the 401 it earns
        // drives the refresh path.
        if let Some(t) = access_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", t));
        }
        Ok(decorate(req).send().await?)
    }
}

/// `track:<title> artist:<artist>` with apostrophes dropped and both parts
/// percent-encoded, the way Spotify's search expects them.
pub fn search_query(title: &str, artist: &str) -> String {
    let title = title.replace('\'', "");
    let artist = artist.replace('\'', "");
    format!(
        "track:{} artist:{}",
        urlencoding::encode(&title),
        urlencoding::encode(&artist)
    )
}

/// Best human-readable message from a token endpoint error body.
fn token_error_description(body: &str) -> String {
    let j: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    j["error_description"]
        .as_str()
        .or_else(|| j["error"].as_str())
        .map(String::from)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        SpotifyProvider::name(self)
    }

    async fn ensure_token(&self) -> Result<()> {
        if self.access_token().await.is_some() {
            return Ok(());
        }
        debug!("No Spotify access token held, refreshing");
        self.refresh_access_token().await
    }

    async fn create_playlist(&self, name: &str, description: &str, public: bool) -> Result<String> {
        let url = format!(
            "{}/users/{}/playlists",
            self.endpoints.api_base,
            urlencoding::encode(&self.user_id)
        );
        let body = json!({
            "name": name,
            "description": description,
            "public": public
        });
        let resp = self
            .authorized_request(Method::POST, &url, |r| r.json(&body))
            .await?;
        if resp.status() != StatusCode::CREATED {
            return Err(Error::from_response(resp).await);
        }
        let j: serde_json::Value = resp.json().await?;
        let id = j["id"].as_str().ok_or_else(|| Error::Api {
            status: StatusCode::CREATED.as_u16(),
            body: "no id in create playlist response".into(),
        })?;
        Ok(id.to_string())
    }

    async fn search_track_uri(&self, title: &str, artist: &str) -> Result<Option<String>> {
        let query = search_query(title, artist);
        debug!("Searching for: {}", query);
        let url = format!(
            "{}/search?query={}&type=track&offset=0&limit=1",
            self.endpoints.api_base, query
        );
        let resp = self
            .authorized_request(Method::GET, &url, |r| r.header(ACCEPT, "application/json"))
            .await?;
        if !resp.status().is_success() {
            return Err(Error::from_response(resp).await);
        }
        let j: serde_json::Value = resp.json().await?;
        let uri = j["tracks"]["items"]
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| first["uri"].as_str())
            .map(String::from);
        Ok(uri)
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.endpoints.api_base, playlist_id);
        let body = json!({ "uris": uris });
        let resp = self
            .authorized_request(Method::POST, &url, |r| r.json(&body))
            .await?;
        if resp.status() != StatusCode::CREATED {
            return Err(Error::from_response(resp).await);
        }
        Ok(())
    }

    async fn upload_cover(&self, playlist_id: &str, jpeg_base64: &str) -> Result<CoverOutcome> {
        let url = format!("{}/playlists/{}/images", self.endpoints.api_base, playlist_id);
        let resp = self
            .authorized_request(Method::PUT, &url, |r| {
                r.header(CONTENT_TYPE, "image/jpeg").body(jpeg_base64.to_string())
            })
            .await?;
        let status = resp.status();
        debug!("Cover image upload response status code: {}", status);
        match status.as_u16() {
            200 | 202 => Ok(CoverOutcome::Accepted),
            code if status.is_success() => {
                warn!("Cover upload for {} returned unexpected status {}", playlist_id, code);
                Ok(CoverOutcome::Unexpected(code))
            }
            _ => Err(Error::from_response(resp).await),
        }
    }
}
