use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use git_watcher::api::{Destination, Window};
use git_watcher::Config;
use secrecy::SecretString;
use std::time::Duration;
use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Repository URL, e.g. https://github.com/owner/repo
    #[clap(value_name = "URL")]
    pub destination: Destination,

    /// Branch name for analyze commits
    #[clap(long, env = "GIT_WATCHER_BRANCH", default_value = "master")]
    pub branch: String,

    /// Get result after this date. This is a timestamp or ISO format
    #[clap(long, env = "GIT_WATCHER_SINCE", parse(try_from_str = parse_date))]
    pub since: Option<DateTime<Utc>>,

    /// Get result before this date. This is a timestamp or ISO format
    #[clap(long, env = "GIT_WATCHER_UNTIL", parse(try_from_str = parse_date))]
    pub until: Option<DateTime<Utc>>,

    /// API credentials as login:secret or client_id:client_secret
    #[clap(long, env = "GIT_WATCHER_AUTH")]
    pub auth: Option<SecretString>,

    /// Repository API URL
    #[clap(long, env = "GIT_WATCHER_API_URL", default_value = git_watcher::config::DEFAULT_API_URL)]
    pub api_url: String,

    /// Seconds between data refreshes
    #[clap(long, env = "GIT_WATCHER_UPDATE_INTERVAL", default_value_t = 600, parse(try_from_str = at_least_one))]
    pub update_interval: u64,

    /// Milliseconds between screen redraws
    #[clap(long, env = "GIT_WATCHER_RENDER_INTERVAL", default_value_t = 300, parse(try_from_str = at_least_one))]
    pub render_interval: u64,

    /// Number of top contributors shown
    #[clap(long, env = "GIT_WATCHER_SIZE_TOP_TABLE", default_value_t = 30, parse(try_from_str = size_in_range))]
    pub size_top_table: usize,

    /// Open pull requests and issues older than this many days are old
    #[clap(long, env = "GIT_WATCHER_STALE_DAYS", default_value_t = 30)]
    pub stale_days: i64,

    /// Minimal milliseconds between two API requests
    #[clap(long, env = "GIT_WATCHER_THROTTLE_INTERVAL", default_value_t = 300)]
    pub throttle_interval: u64,

    /// Attempts per API request before giving up
    #[clap(long, env = "GIT_WATCHER_ATTEMPTS", default_value_t = 10, parse(try_from_str = attempts_in_range))]
    pub attempts: u32,

    /// Seconds to wait before retrying a failed API request
    #[clap(long, env = "GIT_WATCHER_RETRY_INTERVAL", default_value_t = 60)]
    pub retry_interval: u64,

    /// Do not write logs
    #[clap(long)]
    pub no_debug: bool,
}

impl Args {
    pub fn debug(&self) -> bool {
        !self.no_debug
    }

    pub fn config(&self) -> Config {
        let mut config = Config::new(self.destination.clone());
        config.branch = self.branch.clone();
        config.window = Window::new(self.since, self.until);
        config.auth = self.auth.clone();
        config.api_url = self.api_url.clone();
        config.update_interval = Duration::from_secs(self.update_interval);
        config.render_interval = Duration::from_millis(self.render_interval);
        config.size_top_table = self.size_top_table;
        config.stale_days = self.stale_days;
        config.throttle_interval = Duration::from_millis(self.throttle_interval);
        config.attempts = self.attempts;
        config.retry_interval = Duration::from_secs(self.retry_interval);
        config
    }
}

/// Unix timestamp, RFC 3339 date or naive date (read as UTC).
fn parse_date(value: &str) -> clap::Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = value.parse::<i64>() {
        return Utc
            .timestamp_opt(timestamp, 0)
            .single()
            .ok_or_else(|| format!("{} is not a valid timestamp.", value));
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|date| Utc.from_utc_datetime(&date))
        .ok_or_else(|| format!("{} is neither a timestamp nor an ISO date.", value))
}

fn at_least_one(value: &str) -> clap::Result<u64, String> {
    number_in_range(value, 1, u64::MAX, "interval".to_string())
}

fn size_in_range(value: &str) -> clap::Result<usize, String> {
    number_in_range(value, 1, usize::MAX, "size_top_table".to_string())
}

fn attempts_in_range(value: &str) -> clap::Result<u32, String> {
    number_in_range(value, 1, u32::MAX, "attempts".to_string())
}

fn number_in_range<T>(value: &str, min: T, max: T, name: String) -> clap::Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    <T as FromStr>::Err: Display,
{
    value.parse::<T>().map_err(|err| format!("{}", err)).and_then(|value| {
        if value < min || value > max {
            return Err(format!("{} is not in range {} .. {}.", name, min, max));
        }
        Ok(value)
    })
}

#[test]
fn parse_date_test() {
    let expected = Utc.with_ymd_and_hms(2020, 2, 2, 1, 0, 0).unwrap();
    assert_eq!(parse_date("1580605200"), Ok(expected));
    assert_eq!(parse_date("2020-02-02T01:00:00+00:00"), Ok(expected));
    assert_eq!(parse_date("2020-02-02T02:00:00+01:00"), Ok(expected));
    assert_eq!(parse_date("2020-02-02T01:00:00"), Ok(expected));
    assert_eq!(parse_date("2020-02-02 01:00:00"), Ok(expected));
    assert_eq!(
        parse_date("2020-02-02"),
        Ok(Utc.with_ymd_and_hms(2020, 2, 2, 0, 0, 0).unwrap())
    );
    assert!(parse_date("yesterday").is_err());
}

#[test]
fn args_defaults_test() {
    let args = Args::parse_from(["git_watcher", "https://github.com/TestAuthor/testProject"]);
    assert!(args.debug());
    let config = args.config();
    assert_eq!(config.destination.owner, "TestAuthor");
    assert_eq!(config.branch, "master");
    assert_eq!(config.window, Window::default());
    assert_eq!(config.update_interval, Duration::from_secs(600));
    assert_eq!(config.render_interval, Duration::from_millis(300));
    assert_eq!(config.size_top_table, 30);
    assert_eq!(config.attempts, 10);
    assert!(config.auth.is_none());
}

#[test]
fn args_rejects_bad_values_test() {
    assert!(Args::try_parse_from(["git_watcher", "https://github.com/TestAuthor"]).is_err());
    assert!(Args::try_parse_from(["git_watcher", "https://github.com/o/r", "--size-top-table", "0"]).is_err());
    assert!(Args::try_parse_from(["git_watcher", "https://github.com/o/r", "--since", "soon"]).is_err());
    let args = Args::try_parse_from(["git_watcher", "https://github.com/o/r", "--no-debug", "--since", "1580605200"]).unwrap();
    assert!(!args.debug());
    assert!(args.since.is_some());
}
