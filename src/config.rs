use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from an optional TOML file, then overlaid with `SPOTIFY_*`
/// environment variables. Credentials stay optional here so `auth` can run
/// before a refresh token exists; `credentials()` enforces them for uploads.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_max_batch_spotify")]
    pub max_batch_size: usize,

    // no file logging unless set
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_api_base() -> String { "https://api.spotify.com/v1".into() }
fn default_auth_base() -> String { "https://accounts.spotify.com".into() }
fn default_redirect_uri() -> String { "http://127.0.0.1:8888/".into() }
fn default_max_batch_spotify() -> usize { MAX_BATCH_SIZE }

/// Spotify rejects more than 100 URIs per add-tracks call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Opaque strings the provider needs to talk to Spotify on a user's behalf.
/// Only `access_token` (and a rotated `refresh_token`) change at runtime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: String,
}

/// Base URLs for the Web API (including `/v1`) and the accounts service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub auth_base: String,
}

impl Endpoints {
    /// Both bases pointed at one server, e.g. a mock in tests.
    pub fn single(base: &str) -> Self {
        Self {
            api_base: base.to_string(),
            auth_base: base.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_id: None,
            access_token: None,
            refresh_token: None,
            api_base: default_api_base(),
            auth_base: default_auth_base(),
            redirect_uri: default_redirect_uri(),
            max_batch_size: default_max_batch_spotify(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Overlay values from `lookup` (normally `std::env::var`). Empty values
    /// are ignored so a blank line in `.env` does not wipe a file setting.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SPOTIFY_CLIENT_ID") { self.client_id = Some(v); }
        if let Some(v) = get("SPOTIFY_CLIENT_SECRET") { self.client_secret = Some(v); }
        if let Some(v) = get("SPOTIFY_USER_ID") { self.user_id = Some(v); }
        if let Some(v) = get("SPOTIFY_ACCESS_TOKEN") { self.access_token = Some(v); }
        if let Some(v) = get("SPOTIFY_REFRESH_TOKEN") { self.refresh_token = Some(v); }
        if let Some(v) = get("SPOTIFY_API_BASE") { self.api_base = v; }
        if let Some(v) = get("SPOTIFY_AUTH_BASE") { self.auth_base = v; }
        if let Some(v) = get("SPOTIFY_REDIRECT_URI") { self.redirect_uri = v; }
        self
    }

    /// File (if any) plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::default(),
        };
        Ok(base.apply_env(|k| std::env::var(k).ok()))
    }

    /// `<config dir>/csv-to-playlist/config.toml`, when it exists.
    pub fn default_path() -> Option<PathBuf> {
        let p = dirs::config_dir()?.join("csv-to-playlist").join("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            api_base: self.api_base.trim_end_matches('/').to_string(),
            auth_base: self.auth_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.max_batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Validate that everything an upload needs is present.
    pub fn credentials(&self) -> Result<Credentials> {
        self.collect_credentials(true)
    }

    /// Like `credentials`, but without the user id: searching never touches
    /// the user's library, so a dry run can go without it.
    pub fn search_credentials(&self) -> Result<Credentials> {
        self.collect_credentials(false)
    }

    fn collect_credentials(&self, require_user: bool) -> Result<Credentials> {
        let mut missing = Vec::new();
        let mut take = |v: &Option<String>, name: &'static str, required: bool| -> String {
            match v.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => {
                    if required {
                        missing.push(name);
                    }
                    String::new()
                }
            }
        };
        let client_id = take(&self.client_id, "client_id (SPOTIFY_CLIENT_ID)", true);
        let client_secret = take(&self.client_secret, "client_secret (SPOTIFY_CLIENT_SECRET)", true);
        let user_id = take(&self.user_id, "user_id (SPOTIFY_USER_ID)", require_user);
        let refresh_token = take(&self.refresh_token, "refresh_token (SPOTIFY_REFRESH_TOKEN)", true);
        if !missing.is_empty() {
            return Err(anyhow!("missing credentials: {}", missing.join(", ")));
        }
        let access_token = self
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        Ok(Credentials {
            client_id,
            client_secret,
            user_id,
            access_token,
            refresh_token,
        })
    }
}

/// Load a dotenv file into the process environment.
///
/// An explicit `path` must exist and parse. Without one, `./.env` is read if
/// present; only its absence is tolerated, a malformed file is an error.
/// Returns whether a file was loaded.
pub fn load_dotenv(path: Option<&Path>) -> Result<bool> {
    match path {
        Some(p) => {
            dotenvy::from_path(p).with_context(|| format!("loading env file {}", p.display()))?;
            Ok(true)
        }
        None => load_optional_dotenv(Path::new(".env")),
    }
}

fn load_optional_dotenv(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(anyhow::Error::new(e).context(format!("loading env file {}", path.display()))),
    }
}
