use reqwest::header::{HeaderMap, LINK};
use reqwest::Method;
use std::collections::BTreeMap;
use url::Url;

const PAGE_PARAM: &str = "page";
const NEXT: &str = "next";

/// One logical request, relative to the API base url.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Relations reported by the response to this request.
    pub pagination: Links,
}

impl RequestSpec {
    pub fn get<STR: Into<String>>(path: STR) -> Self {
        RequestSpec {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            pagination: Links::default(),
        }
    }

    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Same request, asking for `page`.
    pub fn follow(&self, page: &str) -> RequestSpec {
        let mut query: Vec<(String, String)> = self.query.iter().filter(|(key, _)| key != PAGE_PARAM).cloned().collect();
        query.push((PAGE_PARAM.to_string(), page.to_string()));
        RequestSpec {
            method: self.method.clone(),
            path: self.path.clone(),
            query,
            pagination: Links::default(),
        }
    }
}

/// Page tokens by relation name (`next`, `last`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links(BTreeMap<String, String>);

impl Links {
    /// Reads `<url>; rel="name"` entries, taking the token from each url's `page` parameter.
    ///
    /// Entries which don't fit the format are skipped.
    pub fn parse(header: &str) -> Links {
        let links = header.split(',').filter_map(|entry| {
            let mut parts = entry.split(';').map(str::trim);
            let url = parts.next()?.strip_prefix('<')?.strip_suffix('>')?;
            let page = Url::parse(url)
                .ok()?
                .query_pairs()
                .find(|(key, _)| key == PAGE_PARAM)
                .map(|(_, page)| page.into_owned())?;
            let rel = parts.find_map(|part| part.strip_prefix("rel="))?.trim_matches('"');
            Some((rel.to_string(), page))
        });
        Links(links.collect())
    }

    pub fn from_headers(headers: &HeaderMap) -> Links {
        headers
            .get(LINK)
            .and_then(|link| link.to_str().ok())
            .map(Links::parse)
            .unwrap_or_default()
    }

    pub fn get(&self, rel: &str) -> Option<&str> {
        self.0.get(rel).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Yields the first request, then one more for every reported `next` relation.
#[derive(Debug)]
pub struct Paginator {
    pending: Option<RequestSpec>,
    issued: Option<RequestSpec>,
}

impl Paginator {
    pub fn new(first: RequestSpec) -> Self {
        Paginator {
            pending: Some(first),
            issued: None,
        }
    }

    pub fn next_page(&mut self) -> Option<RequestSpec> {
        let request = self.pending.take()?;
        self.issued = Some(request.clone());
        Some(request)
    }

    /// Records relations of the response to the last issued request.
    pub fn report(&mut self, links: Links) {
        if let Some(issued) = self.issued.as_mut() {
            issued.pagination = links;
            self.pending = issued.pagination.get(NEXT).map(|page| issued.follow(page));
        }
    }

    /// Last issued request, with the relations reported for it.
    pub fn issued(&self) -> Option<&RequestSpec> {
        self.issued.as_ref()
    }
}

#[test]
fn links_parse_test() {
    let links = Links::parse(
        r#"<https://api.github.com/repositories/1/commits?per_page=100&page=2>; rel="next", <https://api.github.com/repositories/1/commits?per_page=100&page=14>; rel="last""#,
    );
    assert_eq!(links.get("next"), Some("2"));
    assert_eq!(links.get("last"), Some("14"));
    assert_eq!(links.get("prev"), None);
}

#[test]
fn links_parse_malformed_test() {
    assert!(Links::parse("").is_empty());
    assert!(Links::parse("garbage").is_empty());
    let links = Links::parse(r#"<https://h/x?per_page=100>; rel="next", <https://h/x?page=3>; rel="prev", <https://h/x?page=4>"#);
    assert_eq!(links.get("next"), None, "No page parameter");
    assert_eq!(links.get("prev"), Some("3"));
}

#[test]
fn follow_overwrites_page_test() {
    let first = RequestSpec::get("/repos/o/r/commits")
        .with_query("per_page", "100")
        .with_query("page", "1");
    let next = first.follow("2");
    assert_eq!(next.method, Method::GET);
    assert_eq!(next.path, first.path);
    assert_eq!(
        next.query,
        vec![
            ("per_page".to_string(), "100".to_string()),
            ("page".to_string(), "2".to_string())
        ]
    );
}

#[test]
fn paginator_follows_next_test() {
    let mut paginator = Paginator::new(RequestSpec::get("/repos/o/r/pulls"));
    let mut issued = Vec::new();

    issued.push(paginator.next_page().unwrap());
    paginator.report(Links::parse(r#"<https://h/repos/o/r/pulls?page=2>; rel="next""#));
    issued.push(paginator.next_page().unwrap());
    paginator.report(Links::parse(r#"<https://h/repos/o/r/pulls?page=1>; rel="first""#));

    assert_eq!(paginator.issued().and_then(|last| last.pagination.get("first")), Some("1"));
    assert_eq!(paginator.next_page(), None);
    assert_eq!(issued.len(), 2);
    assert_eq!(issued[1].query, vec![("page".to_string(), "2".to_string())]);
}

#[test]
fn paginator_single_page_test() {
    let mut paginator = Paginator::new(RequestSpec::get("/repos/o/r/issues"));
    assert!(paginator.next_page().is_some());
    paginator.report(Links::default());
    assert_eq!(paginator.next_page(), None);
}
