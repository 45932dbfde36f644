use thiserror::Error;

/// Failure kinds surfaced by the upload workflow.
///
/// A search that finds nothing is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// Input CSV or cover image missing or malformed.
    #[error("input error: {0}")]
    Input(String),

    /// Refresh-token exchange failed.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Remote API answered with a status the caller does not accept.
    #[error("api request failed: {status} => {body}")]
    Api { status: u16, body: String },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Error::Api { status, body }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
