//! This module implements a simple manual OAuth helper:
//! 1. Build the Spotify authorization URL and print it.
//! 2. User opens it in a browser, approves and gets redirected to the redirect URI (which may fail if it's a dummy).
//! 3. User copies the full redirect URL and pastes it into this CLI.
//! 4. The CLI extracts the `code` param and exchanges it for an access_token + refresh_token.
//! 5. The tokens and user id are printed as env lines; nothing is stored.

use crate::config::{Config, Endpoints};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Body of a successful authorization-code exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Scopes needed to create public playlists and set their cover.
pub const SCOPES: &[&str] = &[
    "playlist-modify-public",
    "playlist-modify-private",
    "ugc-image-upload",
    "user-read-private",
];

pub fn authorize_url(auth_base: &str, client_id: &str, redirect_uri: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/authorize", auth_base))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("show_dialog", "true");
    Ok(url)
}

/// Pull the authorization code out of the URL Spotify redirected to.
pub fn code_from_redirect(redirect: &str) -> Result<String> {
    let parsed = Url::parse(redirect.trim()).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    if let Some((_, err)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        return Err(anyhow!("authorization denied: {}", err));
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| anyhow!("no code in redirect URL"))
}

pub async fn exchange_code(
    client: &Client,
    endpoints: &Endpoints,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    let auth_header = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{}:{}", client_id, client_secret))
    );
    let resp = client
        .post(format!("{}/api/token", endpoints.auth_base))
        .header(AUTHORIZATION, auth_header)
        .form(&params)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed: {} => {}", status, txt));
    }
    Ok(resp.json().await?)
}

/// Id of the user that owns `access_token`.
pub async fn current_user_id(client: &Client, endpoints: &Endpoints, access_token: &str) -> Result<String> {
    let resp = client
        .get(format!("{}/me", endpoints.api_base))
        .header(AUTHORIZATION, format!("Bearer {}", access_token))
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(anyhow!("failed to fetch /me: {}", resp.status()));
    }
    let j: serde_json::Value = resp.json().await?;
    let id = j["id"].as_str().ok_or_else(|| anyhow!("no id"))?.to_string();
    Ok(id)
}

fn prompt(question: &str) -> Result<String> {
    println!("{}", question);
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn configured_or_prompt(value: &Option<String>, question: &str) -> Result<String> {
    if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        return Ok(v.trim().to_string());
    }
    let answer = prompt(question)?;
    if answer.is_empty() {
        return Err(anyhow!("no value provided"));
    }
    Ok(answer)
}

pub async fn run_spotify_auth(cfg: &Config) -> Result<()> {
    let client_id = configured_or_prompt(&cfg.client_id, "Enter your Spotify client_id:")
        .context("client_id")?;
    let client_secret = configured_or_prompt(&cfg.client_secret, "Enter your Spotify client_secret:")
        .context("client_secret")?;
    let endpoints = cfg.endpoints();

    let url = authorize_url(&endpoints.auth_base, &client_id, &cfg.redirect_uri)?;
    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    );
    println!("After authorizing, you'll be redirected to {}. Copy the full redirect URL and paste it here.", cfg.redirect_uri);
    let code = code_from_redirect(&prompt("Paste redirect URL:")?)?;

    let client = Client::new();
    let tr = exchange_code(&client, &endpoints, &client_id, &client_secret, &code, &cfg.redirect_uri).await?;
    let user_id = current_user_id(&client, &endpoints, &tr.access_token).await?;
    info!("Spotify authorization complete for user {}", user_id);

    println!("\nAdd these to your .env or config file:\n");
    println!("SPOTIFY_USER_ID={}", user_id);
    println!("SPOTIFY_ACCESS_TOKEN={}", tr.access_token);
    match tr.refresh_token {
        Some(r) => println!("SPOTIFY_REFRESH_TOKEN={}", r),
        None => println!("# Spotify did not return a refresh token; run auth again with show_dialog"),
    }
    Ok(())
}
