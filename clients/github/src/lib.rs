//! GitHub REST v3 provider.
//!
//! Every request goes through one [`limiter::Throttler`], follows `Link` pagination and is retried on failures,
//! waiting out the API rate limit when GitHub reports it.

mod builder;
pub mod executor;
pub mod limiter;
pub mod paginator;
pub mod payload;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use derive_more::Constructor;
use executor::RequestExecutor;
use futures::{pin_mut, TryStreamExt};
use git_watcher::aggregate::{fold_commits, fold_status, top_contributors};
use git_watcher::api::{Contributors, Provider, ProviderState, RateLimitFlag, Result, Snapshot, StatusTally, Tracked};
use log::{debug, info};
use paginator::RequestSpec;
use serde::de::DeserializeOwned;

pub use builder::GithubClientBuilder;

const PER_PAGE: &str = "100";

#[derive(Constructor)]
pub struct GithubProvider {
    executor: RequestExecutor,
    state: ProviderState,
    stale_days: i64,
}

impl GithubProvider {
    pub fn state(&self) -> &ProviderState {
        &self.state
    }

    fn repo_path(&self, listing: &str) -> String {
        let destination = &self.state.destination;
        format!("/repos/{}/{}/{}", destination.owner, destination.repo, listing)
    }

    fn pulls_request(&self) -> RequestSpec {
        RequestSpec::get(self.repo_path("pulls"))
            .with_query("state", "all")
            .with_query("per_page", PER_PAGE)
    }

    fn issues_request(&self) -> RequestSpec {
        let request = RequestSpec::get(self.repo_path("issues"))
            .with_query("state", "all")
            .with_query("per_page", PER_PAGE);
        match self.state.window.since {
            Some(since) => request.with_query("since", iso_date(since)),
            None => request,
        }
    }

    fn commits_request(&self) -> RequestSpec {
        let mut request = RequestSpec::get(self.repo_path("commits"))
            .with_query("sha", self.state.branch.as_str())
            .with_query("per_page", PER_PAGE);
        if let Some(since) = self.state.window.since {
            request = request.with_query("since", iso_date(since));
        }
        if let Some(until) = self.state.window.until {
            request = request.with_query("until", iso_date(until));
        }
        request
    }

    /// Sums the status of every item on every page of `request`.
    async fn tally<T, F>(&self, request: RequestSpec, exclude: F) -> Result<StatusTally>
    where
        T: DeserializeOwned + Tracked + Send,
        F: Fn(&T) -> bool + Send + Sync,
    {
        let now = Utc::now();
        let mut tally = StatusTally::default();
        let pages = self.executor.execute::<Vec<T>>(request);
        pin_mut!(pages);
        while let Some(page) = pages.try_next().await? {
            debug!("Got {} items", page.len());
            tally += fold_status(&page, now, &self.state.window, self.stale_days, &exclude);
        }
        Ok(tally)
    }
}

fn iso_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl Provider for GithubProvider {
    async fn refresh_status(&mut self) -> Result<()> {
        let pulls = self
            .tally(self.pulls_request(), |pull: &payload::PullRequest| pull.draft)
            .await?;
        let issues = self
            .tally(self.issues_request(), |issue: &payload::Issue| issue.pull_request.is_some())
            .await?;
        info!("Pull requests {:?}, issues {:?}", pulls, issues);
        self.state.pulls = pulls;
        self.state.issues = issues;
        Ok(())
    }

    async fn refresh_contributors(&mut self) -> Result<()> {
        let mut contributors = Contributors::new();
        {
            let pages = self.executor.execute::<Vec<payload::Commit>>(self.commits_request());
            pin_mut!(pages);
            while let Some(page) = pages.try_next().await? {
                debug!("Got {} commits", page.len());
                fold_commits(&page, &self.state.window, &mut contributors);
            }
        }
        info!("Found {} contributors on {}", contributors.len(), self.state.branch);
        self.state.contributors = contributors;
        Ok(())
    }

    fn snapshot(&self, top: usize) -> Snapshot {
        Snapshot::new(
            top_contributors(&self.state.contributors, top),
            self.state.pulls,
            self.state.issues,
        )
    }

    fn rate_limit(&self) -> RateLimitFlag {
        self.executor.rate_limit()
    }
}
