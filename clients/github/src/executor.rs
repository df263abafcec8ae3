use crate::limiter::{RateLimit, Throttler};
use crate::paginator::{Links, Paginator, RequestSpec};
use derive_more::Constructor;
use futures::{stream, Stream};
use git_watcher::api::{Error, RateLimitFlag, Result};
use log::{debug, warn};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// How often and how patiently a single request is retried.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct RetryPolicy {
    /// Tries per request, rate limit waits included.
    pub attempts: u32,
    /// Pause after a failure which isn't a rate limit.
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(10, Duration::from_secs(60))
    }
}

enum Failure {
    RateLimited(RateLimit),
    Transient(reqwest::Error),
}

#[derive(Constructor)]
pub struct RequestExecutor {
    client: Client,
    base_url: String,
    auth: Option<SecretString>,
    throttler: Throttler,
    policy: RetryPolicy,
    rate_limit: RateLimitFlag,
}

impl RequestExecutor {
    /// Decoded bodies of all pages of `first`, in page order.
    ///
    /// The stream ends after the first page without a `next` relation, or with the first error.
    pub fn execute<'a, T>(&'a self, first: RequestSpec) -> impl Stream<Item = Result<T>> + Send + 'a
    where
        T: 'a + DeserializeOwned + Send,
    {
        stream::try_unfold(Paginator::new(first), move |paginator| self.fetch_page::<T>(paginator))
    }

    pub fn rate_limit(&self) -> RateLimitFlag {
        self.rate_limit.clone()
    }

    async fn fetch_page<T>(&self, mut paginator: Paginator) -> Result<Option<(T, Paginator)>>
    where
        T: DeserializeOwned + Send,
    {
        let request = match paginator.next_page() {
            Some(request) => request,
            None => return Ok(None),
        };
        let response = self.send(&request).await?;
        paginator.report(Links::from_headers(response.headers()));
        let page = response.json::<T>().await.map_err(anyhow::Error::from)?;
        Ok(Some((page, paginator)))
    }

    async fn send(&self, request: &RequestSpec) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        for attempt in 1..=self.policy.attempts {
            self.throttler.acquire().await;
            debug!("{} {} {:?} attempt {}", request.method, url, request.query, attempt);
            let wait = match self.try_send(&url, request).await {
                Ok(response) => {
                    self.rate_limit.clear();
                    return Ok(response);
                }
                Err(Failure::RateLimited(limit)) => {
                    self.rate_limit.raise();
                    let wait = limit.time_to_wait();
                    warn!(
                        "API rate limit exceeded ({} remaining), wait {}s",
                        limit.remaining,
                        wait.as_secs()
                    );
                    wait
                }
                Err(Failure::Transient(err)) => {
                    warn!("Error: {}", err);
                    self.policy.retry_interval
                }
            };
            if attempt < self.policy.attempts {
                tokio::time::sleep(wait).await;
            }
        }
        Err(Error::RetriesExhausted {
            attempts: self.policy.attempts,
            url,
        })
    }

    async fn try_send(&self, url: &str, request: &RequestSpec) -> std::result::Result<Response, Failure> {
        let mut builder = self.client.request(request.method.clone(), url).query(&request.query);
        if let Some(auth) = &self.auth {
            let auth = auth.expose_secret();
            builder = match auth.split_once(':') {
                Some((login, secret)) => builder.basic_auth(login, Some(secret)),
                None => builder.basic_auth(auth, None::<&str>),
            };
        }
        let response = builder.send().await.map_err(Failure::Transient)?;
        if !response.status().is_success() {
            if let Some(limit) = RateLimit::exceeded(response.headers()) {
                return Err(Failure::RateLimited(limit));
            }
        }
        response.error_for_status().map_err(Failure::Transient)
    }
}
