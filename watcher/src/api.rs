use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strum_macros::EnumString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Incorrect repository url: {0}")]
    InvalidDestination(String),
    #[error("Give up after {attempts} attempts on {url}")]
    RetriesExhausted { attempts: u32, url: String },
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Repository the watcher points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub owner: String,
    pub repo: String,
}

impl FromStr for Destination {
    type Err = Error;

    /// Accepts `scheme://host/owner/repo`, anything else is rejected.
    fn from_str(value: &str) -> Result<Self> {
        let url = url::Url::parse(value).map_err(|_| Error::InvalidDestination(value.to_string()))?;
        let segments: Vec<&str> = url.path().trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok(Destination {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(Error::InvalidDestination(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Contributor {
    pub login: String,
    pub email: String,
    pub count: u32,
}

/// Contributors keyed by login.
pub type Contributors = BTreeMap<String, Contributor>;

/// Half-open `[since, until)` time range, unset bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Constructor)]
pub struct Window {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Window {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| timestamp >= since) && self.until.map_or(true, |until| timestamp < until)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Constructor)]
pub struct StatusTally {
    pub opened: u32,
    pub closed: u32,
    pub stale_opened: u32,
}

impl AddAssign for StatusTally {
    fn add_assign(&mut self, other: Self) {
        self.opened += other.opened;
        self.closed += other.closed;
        self.stale_opened += other.stale_opened;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
}

/// A commit record as seen by the contributor fold.
pub trait Commit {
    /// Platform account, if the commit is linked to one.
    fn login(&self) -> Option<&str>;
    fn email(&self) -> &str;
    fn committed_at(&self) -> Option<DateTime<Utc>>;
}

/// A pull request or issue as seen by the status fold.
pub trait Tracked {
    fn state(&self) -> Option<ItemState>;
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

/// Set while the provider waits out an API rate limit.
#[derive(Debug, Clone, Default)]
pub struct RateLimitFlag(Arc<AtomicBool>);

impl RateLimitFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a provider knows about the watched repository.
#[derive(Debug, Clone)]
pub struct ProviderState {
    pub destination: Destination,
    pub window: Window,
    pub branch: String,
    pub contributors: Contributors,
    pub pulls: StatusTally,
    pub issues: StatusTally,
    pub rate_limit: RateLimitFlag,
}

impl ProviderState {
    pub fn new(destination: Destination, window: Window, branch: String) -> Self {
        ProviderState {
            destination,
            window,
            branch,
            contributors: Contributors::new(),
            pulls: StatusTally::default(),
            issues: StatusTally::default(),
            rate_limit: RateLimitFlag::default(),
        }
    }
}

/// Result of one completed refresh cycle, published to the renderer as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Constructor)]
pub struct Snapshot {
    pub contributors: Vec<Contributor>,
    pub pulls: StatusTally,
    pub issues: StatusTally,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Re-read pull request and issue listings.
    async fn refresh_status(&mut self) -> Result<()>;

    /// Re-read the commit listing, replacing the previous contributors.
    async fn refresh_contributors(&mut self) -> Result<()>;

    fn snapshot(&self, top: usize) -> Snapshot;

    fn rate_limit(&self) -> RateLimitFlag;
}

#[test]
fn destination_from_url_test() {
    let destination: Destination = "https://github.com/TestAuthor/testProject".parse().unwrap();
    assert_eq!(destination.owner, "TestAuthor");
    assert_eq!(destination.repo, "testProject");

    let destination: Destination = "https://github.com/TestAuthor/testProject/".parse().unwrap();
    assert_eq!(destination.repo, "testProject");
}

#[test]
fn destination_wrong_segments_test() {
    for url in [
        "https://github.com/TestAuthor",
        "https://github.com/TestAuthor/testProject/tree",
        "https://github.com/",
        "https://github.com//testProject",
        "github.com/TestAuthor/testProject",
    ] {
        assert!(
            matches!(url.parse::<Destination>(), Err(Error::InvalidDestination(_))),
            "{} should be rejected",
            url
        );
    }
}

#[test]
fn window_bounds_test() {
    let since = DateTime::parse_from_rfc3339("2020-02-02T01:00:00Z").unwrap().with_timezone(&Utc);
    let until = DateTime::parse_from_rfc3339("2020-02-02T02:00:00Z").unwrap().with_timezone(&Utc);
    let window = Window::new(Some(since), Some(until));
    assert!(window.contains(since));
    assert!(!window.contains(until));
    assert!(!window.contains(since - chrono::Duration::seconds(1)));
    assert!(Window::default().contains(until));
}

#[test]
fn item_state_test() {
    assert_eq!("open".parse::<ItemState>().ok(), Some(ItemState::Open));
    assert_eq!("closed".parse::<ItemState>().ok(), Some(ItemState::Closed));
    assert_eq!("merged".parse::<ItemState>().ok(), None);
}
