//! REST calls for the notification backlog and read state.

use frames::{Id, Notification};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

const NOTIFICATIONS_PATH: &str = "/api/v1/notifications";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Bearer-authenticated client for one API host.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NotificationList {
    Bare(Vec<Notification>),
    Wrapped {
        #[serde(alias = "items")]
        notifications: Vec<Notification>,
    },
}

impl ApiClient {
    /// # Errors
    ///
    /// Fails if the token is not a valid header value or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_owned(), http })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the user's notification backlog, newest first as the server
    /// orders it.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx responses, or an unrecognized body shape.
    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let response = self.http.get(self.url(NOTIFICATIONS_PATH)).send().await?;
        let response = check(response).await?;
        Ok(match response.json::<NotificationList>().await? {
            NotificationList::Bare(items) | NotificationList::Wrapped { notifications: items } => items,
        })
    }

    /// # Errors
    ///
    /// Transport failures or non-2xx responses.
    pub async fn mark_notification_read(&self, id: &Id) -> Result<(), ApiError> {
        let path = format!("{NOTIFICATIONS_PATH}/{id}/read");
        let response = self.http.post(self.url(&path)).send().await?;
        check(response).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Transport failures or non-2xx responses.
    pub async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        let path = format!("{NOTIFICATIONS_PATH}/read-all");
        let response = self.http.post(self.url(&path)).send().await?;
        check(response).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .json::<Value>()
        .await
        .map_or_else(|_| String::new(), |v| v.to_string());
    Err(ApiError::Status { status: status.as_u16(), body })
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
