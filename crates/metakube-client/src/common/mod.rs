//! Common utilities for the MetaKube API client
//!
//! Provides the authenticated HTTP wrapper shared by all endpoints.

use crate::error::MetaKubeError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper with bearer authentication
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Turn a non-success response into the matching error
    async fn check(path: &str, response: Response) -> Result<Response, MetaKubeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MetaKubeError::from_status(status.as_u16(), path, &body))
    }

    /// Decode a JSON body, keeping the start of the body in the error
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, MetaKubeError> {
        let text = response.text().await?;
        decode_body(&text)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetaKubeError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::decode(Self::check(path, response).await?).await
    }

    /// Make a POST request
    pub async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, MetaKubeError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        Self::decode(Self::check(path, response).await?).await
    }

    /// Make a PATCH request with a JSON merge patch
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, MetaKubeError> {
        let url = self.build_url(path);
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .header("Content-Type", "application/merge-patch+json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        Self::decode(Self::check(path, response).await?).await
    }

    /// Make a PUT request without a body, ignoring the reply payload
    pub async fn put_empty(&self, path: &str) -> Result<(), MetaKubeError> {
        let url = self.build_url(path);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::check(path, response).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), MetaKubeError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::check(path, response).await?;
        Ok(())
    }
}

/// Percent-encode a single path segment
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Decode a successful reply body.
///
/// A mismatch is reported with the start of the body and without a status,
/// since the server did answer with success.
pub fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, MetaKubeError> {
    serde_json::from_str(text).map_err(|e| {
        MetaKubeError::InvalidResponse(format!(
            "error decoding response body: {} - Response (first 500 chars): {}",
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}
