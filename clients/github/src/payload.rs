use chrono::{DateTime, Utc};
use git_watcher::api::{ItemState, Tracked};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Commit {
    pub commit: CommitDetails,
    /// Platform account linked to the commit author, if any.
    pub author: Option<Account>,
}

#[derive(Deserialize, Debug)]
pub struct CommitDetails {
    pub author: Signature,
    pub committer: Signature,
}

#[derive(Deserialize, Debug)]
pub struct Signature {
    pub email: String,
    pub date: String,
}

#[derive(Deserialize, Debug)]
pub struct Account {
    pub login: String,
}

impl git_watcher::api::Commit for Commit {
    fn login(&self) -> Option<&str> {
        self.author.as_ref().map(|account| account.login.as_str())
    }

    fn email(&self) -> &str {
        &self.commit.author.email
    }

    fn committed_at(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.commit.committer.date)
    }
}

#[derive(Deserialize, Debug)]
pub struct PullRequest {
    pub state: String,
    pub created_at: String,
    #[serde(default)]
    pub draft: bool,
}

impl Tracked for PullRequest {
    fn state(&self) -> Option<ItemState> {
        self.state.parse().ok()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.created_at)
    }
}

#[derive(Deserialize, Debug)]
pub struct Issue {
    pub state: String,
    pub created_at: String,
    /// Present when the issue is in fact a pull request.
    pub pull_request: Option<serde::de::IgnoredAny>,
}

impl Tracked for Issue {
    fn state(&self) -> Option<ItemState> {
        self.state.parse().ok()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.created_at)
    }
}

fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date).ok().map(|date| date.with_timezone(&Utc))
}
