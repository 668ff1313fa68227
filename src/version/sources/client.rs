//! Shared GitHub HTTP client
//!
//! Constructed once by the caller and shared (via `Arc`) by every channel, so
//! credentials and endpoints are explicit rather than read from the environment
//! on demand.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{GitHubConfig, USER_AGENT};
use crate::version::error::{QuotaExceeded, SourceError};
use crate::version::sources::rate_limit::{RateLimitStatus, looks_like_quota_message};
use crate::version::sources::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::version::types::Channel;

/// An API token together with where it was found
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    /// Label such as the environment variable name
    pub source: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Return the first non-empty candidate value, labelled with its name.
pub fn resolve_credential<'a, I, F>(candidates: I, lookup: F) -> Option<Credential>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> Option<String>,
{
    candidates.into_iter().find_map(|name| {
        let value = lookup(name)?;
        let value = value.trim();
        (!value.is_empty()).then(|| Credential {
            value: value.to_string(),
            source: name.to_string(),
        })
    })
}

/// Read the credential from the process environment.
pub fn credential_from_env(candidates: &[String]) -> Option<Credential> {
    resolve_credential(candidates.iter().map(String::as_str), |name| {
        std::env::var(name).ok()
    })
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    graphql_url: String,
    web_url: String,
    credential: Option<Credential>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, credential: Option<Credential>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            graphql_url: config.graphql_url.clone(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            credential,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Client pointing every endpoint at `base_url`; used against local mock servers.
    pub fn with_base_url(base_url: &str) -> Result<Self, SourceError> {
        let config = GitHubConfig {
            api_url: base_url.to_string(),
            graphql_url: format!("{}/graphql", base_url.trim_end_matches('/')),
            web_url: base_url.to_string(),
            ..GitHubConfig::default()
        };
        Self::new(&config, None)
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        self.retry = retry;
        self.sleeper = sleeper;
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    /// GET against the REST API with the versioned media type and credential.
    pub fn rest_get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        self.authorize(
            self.http
                .get(url)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28"),
        )
    }

    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(credential) => request.bearer_auth(&credential.value),
            None => request,
        }
    }

    /// Query the current quota without consuming it.
    pub async fn rate_limit_status(&self) -> Result<RateLimitStatus, SourceError> {
        #[derive(Deserialize)]
        struct RateLimitResponse {
            rate: RateBody,
        }

        #[derive(Deserialize)]
        struct RateBody {
            limit: u64,
            remaining: u64,
            reset: i64,
        }

        let response = self.rest_get("/rate_limit").send().await?;
        let response = check_response(Channel::Rest, response, "rate limit").await?;
        let body: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| SourceError::decode(Channel::Rest, e.to_string()))?;

        Ok(RateLimitStatus {
            remaining: body.rate.remaining,
            total: body.rate.limit,
            reset_at: chrono::DateTime::from_timestamp(body.rate.reset, 0),
        })
    }
}

/// Map a non-success response onto a [`SourceError`].
///
/// 403 and 429 become quota errors when the rate-limit headers show an exhausted
/// quota, or as a fallback when the body mentions a rate limit.
pub async fn check_response(
    channel: Channel,
    response: Response,
    query: &str,
) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        if let Some(rate) = RateLimitStatus::from_headers(response.headers()) {
            debug!("{} quota: {}/{} remaining", channel, rate.remaining, rate.total);
        }
        return Ok(response);
    }

    let url = response.url().to_string();

    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::not_found(query));
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let rate = RateLimitStatus::from_headers(response.headers());
        let body = response.text().await.unwrap_or_default();
        let exhausted = rate.as_ref().is_some_and(RateLimitStatus::is_exhausted);

        if exhausted || status == StatusCode::TOO_MANY_REQUESTS || looks_like_quota_message(&body)
        {
            warn!("{} quota exhausted while requesting {}", channel, url);
            return Err(SourceError::QuotaExceeded(match rate {
                Some(rate) => rate.into_quota_error(channel),
                None => QuotaExceeded {
                    channel,
                    remaining: None,
                    total: None,
                    reset_at: None,
                },
            }));
        }
    }

    warn!("{} returned status {}: {}", channel, status, url);
    Err(SourceError::Status {
        channel,
        status: status.as_u16(),
        url,
    })
}
