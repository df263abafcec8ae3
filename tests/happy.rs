use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use clap::Parser;
use git_watcher::api::{Contributor, Error, Provider, StatusTally};
use git_watcher_app::{github_provider, watch, Args};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use wiremock::http::HeaderValue;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: &str = "TestAuthor";
const REPO: &str = "testProject";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_from_paginated_listings() {
    let server = MockServer::start().await;
    let since = window_start();
    mock_listings(&server, since).await;

    let args = args(&server, since, &[]);
    let mut provider = github_provider(&args.config()).unwrap();
    provider.refresh_status().await.unwrap();
    provider.refresh_contributors().await.unwrap();

    let snapshot = provider.snapshot(2);
    assert_eq!(snapshot.pulls, StatusTally::new(2, 1, 1));
    assert_eq!(snapshot.issues, StatusTally::new(1, 1, 0));
    assert_eq!(
        snapshot.contributors,
        vec![
            Contributor::new("alice".to_string(), "alice@example.com".to_string(), 4),
            Contributor::new("bob".to_string(), "bob@example.com".to_string(), 3),
        ]
    );
    let everyone = provider.snapshot(30).contributors;
    assert_eq!(everyone.len(), 3, "Carol's commit is outside of the window");
    assert_eq!(everyone[2].login, "ghost@example.com");
    assert!(!provider.rate_limit().is_raised());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_renders_refreshed_data() {
    let server = MockServer::start().await;
    let since = window_start();
    mock_listings(&server, since).await;

    let out = SharedOutput::default();
    let args = args(&server, since, &["--render-interval", "50", "--size-top-table", "2"]);
    watch(args, out.clone(), tokio::time::sleep(std::time::Duration::from_millis(1500)))
        .await
        .unwrap();

    let frames = out.frames();
    assert!(frames.len() > 5, "Render loop should redraw every 50ms");
    let last = frames.last().unwrap();
    assert!(last.contains("PR opened - 2\nPR old opened - 1\nPR closed - 1"));
    assert!(last.contains("Issues opened - 1\nIssues old opened - 0\nIssues closed - 1"));
    assert!(last.contains("alice"));
    assert!(last.contains("bob"));
    assert!(!last.contains("ghost"), "Only two contributors fit the table");
    assert!(!last.contains("Loading"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_gives_up_on_failing_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let args = args(&server, window_start(), &["--attempts", "3"]);
    let result = watch(args, SharedOutput::default(), std::future::pending()).await;

    match result {
        Err(Error::RetriesExhausted { attempts, url }) => {
            assert_eq!(attempts, 3);
            assert!(url.ends_with("/repos/TestAuthor/testProject/pulls"), "{}", url);
        }
        other => panic!("Expected exhausted retries, got {:?}", other),
    }
}

fn window_start() -> DateTime<Utc> {
    let since = Utc::now() - Duration::days(90);
    Utc.timestamp_opt(since.timestamp(), 0).unwrap()
}

fn args(server: &MockServer, since: DateTime<Utc>, extra: &[&str]) -> Args {
    let url = format!("https://github.com/{}/{}", OWNER, REPO);
    let api_url = server.uri();
    let since = since.timestamp().to_string();
    let mut argv = vec![
        "git_watcher",
        url.as_str(),
        "--no-debug",
        "--branch",
        "main",
        "--since",
        since.as_str(),
        "--api-url",
        api_url.as_str(),
        "--throttle-interval",
        "0",
        "--retry-interval",
        "0",
    ];
    argv.extend_from_slice(extra);
    Args::parse_from(argv)
}

async fn mock_listings(server: &MockServer, since: DateTime<Utc>) {
    let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);

    mock_pages(
        server,
        "pulls",
        vec![
            vec![
                item("open", 40, json!({ "draft": false })),
                item("open", 5, json!({})),
                item("open", 5, json!({ "draft": true })),
            ],
            vec![item("closed", 60, json!({})), item("open", 200, json!({}))],
        ],
        &[("state", "all")],
    )
    .await;

    mock_pages(
        server,
        "issues",
        vec![vec![
            item("open", 3, json!({})),
            item("closed", 10, json!({})),
            item("open", 3, json!({ "pull_request": { "url": "https://api.github.com/pulls/1" } })),
        ]],
        &[("state", "all"), ("since", since.as_str())],
    )
    .await;

    mock_pages(
        server,
        "commits",
        vec![
            shuffled(vec![
                commit(Some("alice"), 10),
                commit(Some("alice"), 11),
                commit(Some("bob"), 12),
                commit(None, 13),
            ]),
            shuffled(vec![
                commit(Some("alice"), 20),
                commit(Some("alice"), 21),
                commit(Some("bob"), 22),
                commit(Some("bob"), 23),
                commit(Some("carol"), 100),
            ]),
        ],
        &[("sha", "main"), ("since", since.as_str())],
    )
    .await;
}

/// Serves `pages` of a listing, each linking to the next one.
async fn mock_pages(server: &MockServer, listing: &str, pages: Vec<Vec<Value>>, query: &[(&str, &str)]) {
    let listing_path = format!("/repos/{}/{}/{}", OWNER, REPO, listing);
    let last_page = pages.len();
    // Later pages first, the first page mock matches any page.
    for (index, body) in pages.into_iter().enumerate().rev() {
        let page = index + 1;
        let mut response = ResponseTemplate::new(200).set_body_json(Value::Array(body));
        if page < last_page {
            let link = format!(
                r#"<{uri}{path}?per_page=100&page={next}>; rel="next", <{uri}{path}?per_page=100&page={last}>; rel="last""#,
                uri = server.uri(),
                path = listing_path,
                next = page + 1,
                last = last_page
            );
            response = response.insert_header("Link", link.parse::<HeaderValue>().unwrap());
        }
        let mut mock = Mock::given(method("GET"))
            .and(path(listing_path.as_str()))
            .and(query_param("per_page", "100"))
            .and(header("Accept", "application/vnd.github.v3+json"));
        for (key, value) in query {
            mock = mock.and(query_param(*key, *value));
        }
        if page > 1 {
            mock = mock.and(query_param("page", page.to_string().as_str()));
        }
        mock.respond_with(response).mount(server).await;
    }
}

fn item(state: &str, age_days: i64, extra: Value) -> Value {
    let mut item = json!({
        "state": state,
        "created_at": days_ago(age_days),
    });
    if let (Some(item), Value::Object(extra)) = (item.as_object_mut(), extra) {
        item.extend(extra);
    }
    item
}

fn commit(login: Option<&str>, age_days: i64) -> Value {
    let email = format!("{}@example.com", login.unwrap_or("ghost"));
    let signature = json!({ "email": email, "date": days_ago(age_days) });
    json!({
        "commit": { "author": signature.clone(), "committer": signature },
        "author": login.map(|login| json!({ "login": login })),
    })
}

fn shuffled(mut values: Vec<Value>) -> Vec<Value> {
    values.shuffle(&mut rand::thread_rng());
    values
}

fn days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    fn frames(&self) -> Vec<String> {
        let out = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        out.split("\u{1b}[2J").filter(|frame| !frame.is_empty()).map(String::from).collect()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
