//! HTTP plumbing shared by every provider.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use gitshift_types::SecretString;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::ProviderError;

/// Items requested per page.
pub const PAGE_SIZE: usize = 100;

/// Hard stop for pagination loops.
const MAX_PAGES: u32 = 1000;

/// Bytes of an error body kept in [`ProviderError::Api`].
const MAX_ERROR_BODY: usize = 512;

/// Tuning for provider HTTP clients.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Requests per second allowed against one provider.
    pub requests_per_second: NonZeroU32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("gitshift/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            requests_per_second: NonZeroU32::new(crate::config::DEFAULT_RATE_LIMIT)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl ClientOptions {
    /// Sets the request rate; zero is treated as one.
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How a token is presented to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: token <t>` (Gitea).
    Token,
    /// `Authorization: Bearer <t>` (GitHub, GitLab OAuth tokens).
    Bearer,
    /// `PRIVATE-TOKEN: <t>` (GitLab personal access tokens).
    PrivateToken,
}

/// How a listing endpoint signals further pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Keep requesting until a page comes back short, using the given
    /// page-size parameter name.
    UntilShort(&'static str),
    /// Follow the `X-Next-Page` header (GitLab).
    NextPageHeader,
}

/// A rate-limited JSON API client for one provider.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    provider: &'static str,
    base_url: String,
    token: SecretString,
    scheme: AuthScheme,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client. No request is sent.
    pub fn new(
        provider: &'static str,
        base_url: &str,
        token: SecretString,
        scheme: AuthScheme,
        options: &ClientOptions,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            scheme,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(
                options.requests_per_second,
            ))),
        })
    }

    /// Returns the base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.token.expose();
        match self.scheme {
            AuthScheme::Token => request.header("Authorization", format!("token {token}")),
            AuthScheme::Bearer => request.header("Authorization", format!("Bearer {token}")),
            AuthScheme::PrivateToken => request.header("PRIVATE-TOKEN", token),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        self.limiter.until_ready().await;
        self.authorize(request)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.without_url().to_string()))
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(provider = self.provider, %path, "GET");
        let response = self.send(self.client.get(&url)).await?;
        let response = check_status(response, path).await?;
        decode(response).await
    }

    /// Make a GET request, mapping 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ProviderError> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns whether a GET on `path` succeeds; 404 means `false`.
    pub async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(provider = self.provider, %path, "HEAD-style GET");
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response, path).await?;
        Ok(true)
    }

    /// Make a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(provider = self.provider, %path, "POST");
        let response = self.send(self.client.post(&url).json(body)).await?;
        let response = check_status(response, path).await?;
        decode(response).await
    }

    /// Fetches every page of a listing endpoint.
    ///
    /// `query` carries endpoint-specific parameters; page parameters are
    /// appended here.
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        pagination: Pagination,
    ) -> Result<Vec<T>, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let size_param = match pagination {
            Pagination::UntilShort(param) => param,
            Pagination::NextPageHeader => "per_page",
        };
        let page_size = PAGE_SIZE.to_string();

        let mut all_items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_str = page.to_string();
            let mut params: Vec<(&str, &str)> = query.to_vec();
            params.push(("page", &page_str));
            params.push((size_param, &page_size));

            debug!(provider = self.provider, %path, page, "GET page");
            let response = self.send(self.client.get(&url).query(&params)).await?;
            let response = check_status(response, path).await?;
            let next_page = next_page_header(response.headers());
            let items: Vec<T> = decode(response).await?;

            let count = items.len();
            all_items.extend(items);

            let next = match pagination {
                Pagination::UntilShort(_) => (count >= PAGE_SIZE).then_some(page + 1),
                Pagination::NextPageHeader => next_page.filter(|_| count > 0),
            };

            match next {
                Some(n) if n > page && n <= MAX_PAGES => page = n,
                _ => break,
            }
        }

        Ok(all_items)
    }
}

fn next_page_header(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

async fn check_status(response: Response, path: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ProviderError::AuthenticationFailed(
            "token was rejected".to_string(),
        )),
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound(path.to_string())),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            if let Some(wait) = retry_after(response.headers()) {
                return Err(ProviderError::RateLimitExceeded(wait));
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimitExceeded(0));
            }
            Err(ProviderError::Forbidden(
                "check your token permissions".to_string(),
            ))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            Err(ProviderError::Api {
                status: status.as_u16(),
                body: crate::redact::sanitize(&body),
            })
        }
    }
}

/// Seconds to wait according to `Retry-After` or an exhausted
/// `X-RateLimit-Reset`.
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return Some(secs);
    }
    if header("x-ratelimit-remaining") == Some(0) {
        let reset = header("x-ratelimit-reset")?;
        let now = chrono::Utc::now().timestamp().max(0).unsigned_abs();
        return Some(reset.saturating_sub(now));
    }
    None
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::Decode(e.without_url().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, scheme: AuthScheme) -> ApiClient {
        ApiClient::new(
            "test",
            &server.uri(),
            SecretString::new("secret-token"),
            scheme,
            &ClientOptions::default().with_requests_per_second(1000),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_auth_schemes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("Authorization", "token secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("PRIVATE-TOKEN", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let value: serde_json::Value = client(&server, AuthScheme::Token)
            .get("/token")
            .await
            .unwrap();
        assert_eq!(value["ok"], true);

        let value: serde_json::Value = client(&server, AuthScheme::PrivateToken)
            .get("/private")
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/unauthorized"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = client(&server, AuthScheme::Bearer);
        assert!(matches!(
            api.get::<serde_json::Value>("/unauthorized").await,
            Err(ProviderError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            api.get::<serde_json::Value>("/limited").await,
            Err(ProviderError::RateLimitExceeded(7))
        ));
        match api.get::<serde_json::Value>("/broken").await {
            Err(ProviderError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            api.get_optional::<serde_json::Value>("/missing").await.unwrap(),
            None
        );
        assert!(!api.exists("/missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_paginates_until_short_page() {
        let server = MockServer::start().await;
        let full: Vec<u32> = (0..100).collect();
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&full))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([100, 101])))
            .mount(&server)
            .await;

        let items: Vec<u32> = client(&server, AuthScheme::Token)
            .get_paginated("/items", &[], Pagination::UntilShort("limit"))
            .await
            .unwrap();
        assert_eq!(items.len(), 102);
        assert_eq!(items.last(), Some(&101));
    }

    #[tokio::test]
    async fn test_paginates_by_next_page_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(query_param("page", "1"))
            .and(query_param("membership", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Next-Page", "2")
                    .set_body_json(json!([1])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Next-Page", "")
                    .set_body_json(json!([2])),
            )
            .mount(&server)
            .await;

        let items: Vec<u32> = client(&server, AuthScheme::Bearer)
            .get_paginated(
                "/projects",
                &[("membership", "true")],
                Pagination::NextPageHeader,
            )
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_debug_hides_token() {
        let api = ApiClient::new(
            "test",
            "http://localhost",
            SecretString::new("ghp_hidden"),
            AuthScheme::Bearer,
            &ClientOptions::default(),
        )
        .unwrap();
        assert!(!format!("{api:?}").contains("ghp_hidden"));
    }
}
