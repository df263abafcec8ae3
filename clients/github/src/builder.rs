use crate::executor::{RequestExecutor, RetryPolicy};
use crate::limiter::Throttler;
use crate::GithubProvider;
use git_watcher::api::{ProviderState, Result};
use git_watcher::config::DEFAULT_API_URL;
use git_watcher::Config;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::ClientBuilder;
use secrecy::SecretString;
use std::time::Duration;

pub struct GithubClientBuilder {
    client_builder: ClientBuilder,
    github_url: String,
    headers: HeaderMap,
    auth: Option<SecretString>,
    throttle_interval: Duration,
    retry_policy: RetryPolicy,
    stale_days: i64,
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("git_watcher"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        Self {
            client_builder: ClientBuilder::default(),
            github_url: DEFAULT_API_URL.to_string(),
            headers,
            auth: None,
            throttle_interval: Duration::from_millis(300),
            retry_policy: RetryPolicy::default(),
            stale_days: 30,
        }
    }
}

impl GithubClientBuilder {
    /// Builder with every setting taken from `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = GithubClientBuilder::default()
            .with_github_url(&config.api_url)
            .with_throttle_interval(config.throttle_interval)
            .with_retry_policy(RetryPolicy::new(config.attempts, config.retry_interval))
            .with_stale_days(config.stale_days);
        if let Some(auth) = &config.auth {
            builder = builder.with_auth(auth.clone());
        }
        builder
    }

    /// `login:secret` or `client_id:client_secret` pair for HTTP Basic authorization.
    pub fn with_auth(mut self, auth: SecretString) -> GithubClientBuilder {
        self.auth = Some(auth);
        self
    }

    pub fn with_github_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.github_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_throttle_interval(mut self, interval: Duration) -> GithubClientBuilder {
        self.throttle_interval = interval;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> GithubClientBuilder {
        self.retry_policy = policy;
        self
    }

    pub fn with_stale_days(mut self, days: i64) -> GithubClientBuilder {
        self.stale_days = days;
        self
    }

    pub fn build(self, state: ProviderState) -> Result<GithubProvider> {
        let client = self
            .client_builder
            .default_headers(self.headers)
            .build()
            .map_err(anyhow::Error::from)?;
        let executor = RequestExecutor::new(
            client,
            self.github_url,
            self.auth,
            Throttler::new(self.throttle_interval),
            self.retry_policy,
            state.rate_limit.clone(),
        );
        Ok(GithubProvider::new(executor, state, self.stale_days))
    }
}

#[test]
fn from_config_test() {
    let mut config = Config::new("https://github.com/o/r".parse().unwrap());
    config.api_url = "http://localhost:8080/".to_string();
    config.attempts = 3;
    config.auth = Some(SecretString::new("user:pass".to_string()));

    let builder = GithubClientBuilder::from_config(&config);
    assert_eq!(builder.github_url, "http://localhost:8080");
    assert_eq!(builder.retry_policy.attempts, 3);
    assert!(builder.auth.is_some());
    assert_eq!(builder.headers[header::ACCEPT], "application/vnd.github.v3+json");
}

