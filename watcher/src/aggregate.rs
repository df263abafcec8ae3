use crate::api::{Commit, Contributor, Contributors, ItemState, StatusTally, Tracked, Window};
use chrono::{DateTime, Utc};

/// Counts commits of `page` falling into `window` per contributor.
///
/// Identity is the platform login, or the commit author email for commits
/// without a linked account. Commits without a readable date are skipped.
pub fn fold_commits<C: Commit>(page: &[C], window: &Window, storage: &mut Contributors) {
    for commit in page {
        match commit.committed_at() {
            Some(date) if window.contains(date) => {}
            _ => continue,
        }
        let login = commit.login().unwrap_or_else(|| commit.email());
        storage
            .entry(login.to_string())
            .and_modify(|contributor| contributor.count += 1)
            .or_insert_with(|| Contributor::new(login.to_string(), commit.email().to_string(), 1));
    }
}

/// Tallies one page of pull requests or issues.
///
/// # Arguments
/// * `now` - reference point for the item age
/// * `window` - only items created inside are counted
/// * `stale_days` - open items older than this are also counted as stale
/// * `exclude` - items matching it are skipped entirely
pub fn fold_status<T, F>(page: &[T], now: DateTime<Utc>, window: &Window, stale_days: i64, exclude: F) -> StatusTally
where
    T: Tracked,
    F: Fn(&T) -> bool,
{
    let mut tally = StatusTally::default();
    for item in page.iter().filter(|item| !exclude(*item)) {
        let created_at = match item.created_at() {
            Some(created_at) if window.contains(created_at) => created_at,
            _ => continue,
        };
        match item.state() {
            Some(ItemState::Open) => {
                tally.opened += 1;
                if (now - created_at).num_days() > stale_days {
                    tally.stale_opened += 1;
                }
            }
            Some(ItemState::Closed) => tally.closed += 1,
            None => {}
        }
    }
    tally
}

/// Returns up to `n` contributors with the most commits, in descending order.
///
/// Sorting is stable, so equal counts keep the login order of `contributors`.
pub fn top_contributors(contributors: &Contributors, n: usize) -> Vec<Contributor> {
    let mut top: Vec<Contributor> = contributors.values().cloned().collect();
    top.sort_by(|a, b| b.count.cmp(&a.count));
    top.truncate(n);
    top
}

/// Tests

#[cfg(test)]
struct TestCommit {
    login: Option<&'static str>,
    email: &'static str,
    date: &'static str,
}

#[cfg(test)]
impl Commit for TestCommit {
    fn login(&self) -> Option<&str> {
        self.login
    }

    fn email(&self) -> &str {
        self.email
    }

    fn committed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.date).ok().map(|date| date.with_timezone(&Utc))
    }
}

#[cfg(test)]
struct TestItem {
    state: &'static str,
    created_at: DateTime<Utc>,
    draft: bool,
}

#[cfg(test)]
impl Tracked for TestItem {
    fn state(&self) -> Option<ItemState> {
        self.state.parse().ok()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

#[cfg(test)]
fn utc(date: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc)
}

#[test]
fn fold_same_login_test() {
    let page = vec![
        TestCommit { login: Some("alice"), email: "alice@home", date: "2020-02-02T01:00:00Z" },
        TestCommit { login: Some("alice"), email: "alice@work", date: "2020-02-02T01:30:00Z" },
    ];
    let mut contributors = Contributors::new();
    fold_commits(&page, &Window::default(), &mut contributors);
    assert_eq!(contributors.len(), 1);
    assert_eq!(contributors["alice"].count, 2);
    assert_eq!(contributors["alice"].email, "alice@home");
}

#[test]
fn fold_email_fallback_test() {
    let page = vec![
        TestCommit { login: None, email: "ghost@example.com", date: "2020-02-02T01:00:00Z" },
        TestCommit { login: Some("bob"), email: "bob@example.com", date: "2020-02-02T01:00:00Z" },
        TestCommit { login: None, email: "ghost@example.com", date: "not a date" },
    ];
    let mut contributors = Contributors::new();
    fold_commits(&page, &Window::default(), &mut contributors);
    assert_eq!(contributors.len(), 2);
    assert_eq!(contributors["ghost@example.com"].count, 1);
    assert_eq!(contributors["bob"].count, 1);
}

#[test]
fn fold_window_bounds_test() {
    let window = Window::new(Some(utc("2020-02-02T01:00:00Z")), Some(utc("2020-02-02T02:00:00Z")));
    let page = vec![
        TestCommit { login: Some("early"), email: "", date: "2020-02-02T00:59:59Z" },
        TestCommit { login: Some("since"), email: "", date: "2020-02-02T01:00:00Z" },
        TestCommit { login: Some("inside"), email: "", date: "2020-02-02T01:30:00Z" },
        TestCommit { login: Some("until"), email: "", date: "2020-02-02T02:00:00Z" },
        TestCommit { login: Some("late"), email: "", date: "2020-02-03T00:00:00Z" },
    ];
    let mut contributors = Contributors::new();
    fold_commits(&page, &window, &mut contributors);
    let logins: Vec<&str> = contributors.keys().map(String::as_str).collect();
    assert_eq!(logins, vec!["inside", "since"]);
}

#[test]
fn fold_status_stale_test() {
    let now = utc("2020-03-12T00:00:00Z");
    let page = vec![TestItem { state: "open", created_at: now - chrono::Duration::days(40), draft: false }];
    let tally = fold_status(&page, now, &Window::default(), 30, |_| false);
    assert_eq!(tally, StatusTally::new(1, 0, 1));
}

#[test]
fn fold_status_mixed_test() {
    let now = utc("2020-03-12T00:00:00Z");
    let page = vec![
        TestItem { state: "open", created_at: now - chrono::Duration::days(2), draft: false },
        TestItem { state: "open", created_at: now - chrono::Duration::days(30), draft: false },
        TestItem { state: "closed", created_at: now - chrono::Duration::days(90), draft: false },
        TestItem { state: "open", created_at: now - chrono::Duration::days(90), draft: true },
        TestItem { state: "locked", created_at: now, draft: false },
    ];
    let tally = fold_status(&page, now, &Window::default(), 30, |item| item.draft);
    assert_eq!(tally, StatusTally::new(2, 1, 0));

    let window = Window::new(Some(now - chrono::Duration::days(10)), None);
    let tally = fold_status(&page, now, &window, 30, |item| item.draft);
    assert_eq!(tally, StatusTally::new(1, 0, 0));
}

#[test]
fn top_contributors_test() {
    let contributors: Contributors = (0..33)
        .map(|i| (i.to_string(), Contributor::new(i.to_string(), String::new(), i)))
        .collect();
    let top = top_contributors(&contributors, 7);
    let counts: Vec<u32> = top.iter().map(|contributor| contributor.count).collect();
    assert_eq!(counts, vec![32, 31, 30, 29, 28, 27, 26]);

    assert!(top_contributors(&contributors, 0).is_empty());
    let all = top_contributors(&contributors, 100);
    assert_eq!(all.len(), 33);
    assert_eq!(all.last().map(|contributor| contributor.count), Some(0));
}

#[test]
fn top_contributors_ties_test() {
    let contributors: Contributors = ["carol", "alice", "bob"]
        .iter()
        .map(|login| (login.to_string(), Contributor::new(login.to_string(), String::new(), 3)))
        .collect();
    let logins: Vec<String> = top_contributors(&contributors, 2).into_iter().map(|c| c.login).collect();
    assert_eq!(logins, vec!["alice", "bob"]);
}
