//! Blocking JSON-over-HTTP plumbing shared by the remote collaborators.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One remote endpoint that accepts and returns JSON.
///
/// A failed call is returned as-is; nothing here retries.
#[derive(Clone)]
pub(crate) struct JsonEndpoint {
    client: Client,
    url: String,
    service: &'static str,
}

impl JsonEndpoint {
    /// `service` names the backend in error messages.
    pub(crate) fn new(
        service: &'static str,
        url: String,
        auth: Auth<'_>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let (name, value) = match auth {
            Auth::Bearer(key) => (AUTHORIZATION, format!("Bearer {}", key.trim())),
            Auth::ApiKeyHeader(key) => (HeaderName::from_static("api-key"), key.trim().to_string()),
        };
        let value = HeaderValue::from_str(&value)
            .with_context(|| format!("invalid {service} API key"))?;
        headers.insert(name, value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .with_context(|| format!("failed to build {service} HTTP client"))?;
        Ok(Self {
            client,
            url,
            service,
        })
    }

    /// Posts `body` and decodes a successful reply; non-2xx statuses become errors
    /// carrying the response body.
    pub(crate) fn post<B, R>(&self, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let service = self.service;
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .with_context(|| format!("failed to call {service}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("{service} request failed ({status}): {text}");
        }
        resp.json()
            .with_context(|| format!("failed to parse {service} response"))
    }
}

/// How the API key travels with each request.
pub(crate) enum Auth<'a> {
    /// `Authorization: Bearer <key>`.
    Bearer(&'a str),
    /// `api-key: <key>`.
    ApiKeyHeader(&'a str),
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(join_url("http://localhost:8080", "chat/completions"), "http://localhost:8080/chat/completions");
    }

    #[test]
    fn rejects_keys_that_are_not_header_safe() {
        let result = JsonEndpoint::new(
            "OpenAI",
            "https://example.invalid".to_string(),
            Auth::Bearer("bad\nkey"),
            None,
        );
        assert!(result.is_err());
    }
}
