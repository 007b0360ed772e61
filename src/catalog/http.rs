//! Blocking HTTP plumbing shared by the catalog clients, including the 429 retry loop.

use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use log::{debug, warn};

use crate::catalog::Platform;
use crate::error::CatalogError;

pub const STATUS_OK: u16 = 200;
pub const STATUS_MULTI_STATUS: u16 = 207;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

const PACER_POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_LOGGED_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Transport-independent description of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn bearer(self, access_token: &str) -> Self {
        self.header("Authorization", format!("Bearer {access_token}"))
    }

    /// Sets a urlencoded form body.
    pub fn form_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(Vec::new)
            .push((key.to_string(), value.into()));
        self
    }

    #[cfg(test)]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[cfg(test)]
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    #[cfg(test)]
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form.as_ref().and_then(|form| {
            form.iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str())
        })
    }

    /// Full URL with the encoded query string, for logs and error reports.
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body shortened for log lines and error payloads.
    pub fn body_excerpt(&self) -> String {
        if self.body.chars().count() <= MAX_LOGGED_BODY_CHARS {
            return self.body.clone();
        }
        let mut excerpt: String = self.body.chars().take(MAX_LOGGED_BODY_CHARS).collect();
        excerpt.push_str("...");
        excerpt
    }
}

/// Executes one request and reports any HTTP status as a response.
pub trait HttpTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(request_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(request_timeout)
            .timeout_write(request_timeout)
            .build();
        Self { agent }
    }
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut call = self.agent.request(request.method.as_str(), &request.url);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        for (key, value) in &request.headers {
            call = call.set(key, value);
        }
        let result = match &request.form {
            Some(form) => {
                let pairs: Vec<(&str, &str)> = form
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str()))
                    .collect();
                call.send_form(&pairs)
            }
            None => call.call(),
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(format!("Request failed: {transport}"));
            }
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|error| format!("Failed to read response: {error}"))?;
        Ok(HttpResponse { status, body })
    }
}

/// Blocking pause used between retries.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Behavior on HTTP 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// Total attempts per request; `None` retries until the platform stops throttling.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(3),
            max_attempts: None,
        }
    }
}

/// Request executor shared by one platform client.
pub struct CatalogHttp {
    platform: Platform,
    transport: Rc<dyn HttpTransport>,
    sleeper: Rc<dyn Sleeper>,
    policy: RetryPolicy,
    pacer: Option<DefaultDirectRateLimiter>,
}

impl CatalogHttp {
    pub fn new(
        platform: Platform,
        transport: Rc<dyn HttpTransport>,
        sleeper: Rc<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            transport,
            sleeper,
            policy,
            pacer: None,
        }
    }

    /// Spaces requests to at most `requests_per_second`.
    pub fn with_pacing(mut self, requests_per_second: u32) -> Self {
        self.pacer = NonZeroU32::new(requests_per_second)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        self
    }

    /// Sends once, without the rate-limit loop. Used for token endpoints.
    pub fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, CatalogError> {
        self.wait_for_pacer_slot();
        debug!("{}: {:?} {}", self.platform, request.method, request.display_url());
        self.transport
            .execute(request)
            .map_err(|message| CatalogError::Transport {
                platform: self.platform,
                message,
            })
    }

    /// Sends `request`, sleeping the fixed backoff and resending on every 429.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, CatalogError> {
        let mut attempt = 1u32;
        loop {
            let response = self.send_once(request)?;
            if response.status != STATUS_TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if self
                .policy
                .max_attempts
                .is_some_and(|max_attempts| attempt >= max_attempts)
            {
                return Err(CatalogError::RateLimited {
                    platform: self.platform,
                    attempts: attempt,
                });
            }
            warn!(
                "{}: rate limited on attempt {}, retrying in {:?} url={}",
                self.platform,
                attempt,
                self.policy.backoff,
                request.display_url()
            );
            self.sleeper.sleep(self.policy.backoff);
            attempt = attempt.saturating_add(1);
        }
    }

    /// Builds the error for a status the caller does not handle.
    pub fn unexpected_status(&self, request: &HttpRequest, response: &HttpResponse) -> CatalogError {
        CatalogError::Platform {
            platform: self.platform,
            status: response.status,
            url: request.display_url(),
            body: response.body_excerpt(),
        }
    }

    pub fn decode<T: serde::de::DeserializeOwned>(
        &self,
        response: &HttpResponse,
    ) -> Result<T, CatalogError> {
        serde_json::from_str(&response.body).map_err(|source| CatalogError::Decode {
            platform: self.platform,
            source,
        })
    }

    fn wait_for_pacer_slot(&self) {
        let Some(pacer) = &self.pacer else {
            return;
        };
        while pacer.check().is_err() {
            self.sleeper.sleep(PACER_POLL_INTERVAL);
        }
    }
}
