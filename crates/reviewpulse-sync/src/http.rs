//! HTTP page sources: a page-numbered REST listing and a cursor-paginated
//! GraphQL listing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reviewpulse_core::{FetchConfig, RawRecord};
use serde::Deserialize;
use tracing::{debug, info};

use crate::source::{Page, PageSource};
use crate::FetchError;

const REVIEWS_QUERY: &str = "query GetReviews($first: Int, $after: String) {
  reviews(first: $first, after: $after) {
    edges { node { rid text rating date } }
    pageInfo { endCursor hasNextPage }
  }
}";

fn build_client(config: &FetchConfig) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()?)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Human title from a review slug: `"chocolate-candy-box-3"` becomes
/// `"Chocolate Candy Box Review"`. The trailing segment is the item number.
pub fn title_from_id(id: &str) -> String {
    let stem = id.rsplit_once('-').map_or(id, |(stem, _)| stem);
    let mut words: Vec<String> = stem
        .split('-')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    words.push("Review".to_string());
    words.join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Star rating on the 1-5 scale. Anything that does not round into it is dropped.
fn rating_from(value: Option<f64>) -> Option<u8> {
    value
        .map(f64::round)
        .filter(|v| (1.0..=5.0).contains(v))
        .map(|v| v as u8)
}

// ── REST ──

#[derive(Debug, Deserialize)]
struct RestReview {
    #[serde(default, alias = "name", alias = "heading")]
    title: Option<String>,
    #[serde(default, alias = "text", alias = "content")]
    body: String,
    #[serde(default, alias = "created_at", alias = "posted")]
    date: Option<String>,
    #[serde(default, alias = "rid")]
    id: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RestEnvelope {
    #[serde(alias = "reviews", alias = "data", alias = "items")]
    results: Vec<RestReview>,
    #[serde(default, alias = "hasMore", alias = "has_next")]
    has_more: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RestBody {
    List(Vec<RestReview>),
    Wrapped(RestEnvelope),
}

fn parse_rest_page(raw: &str, page: u32) -> Result<Page, FetchError> {
    let (items, has_more) = match serde_json::from_str::<RestBody>(raw)? {
        RestBody::List(items) => {
            let more = !items.is_empty();
            (items, more)
        }
        RestBody::Wrapped(env) => {
            let more = env.has_more.unwrap_or(!env.results.is_empty());
            (env.results, more)
        }
    };

    let records = items
        .into_iter()
        .map(|r| RawRecord {
            title: r
                .title
                .or_else(|| r.id.as_deref().map(title_from_id))
                .unwrap_or_default(),
            body: r.body,
            date: r.date,
            page,
            id: r.id,
            rating: rating_from(r.rating),
        })
        .collect();
    Ok(Page { records, has_more })
}

/// Page-numbered JSON listing: `GET {base_url}?page=N&limit=M`.
pub struct RestPageSource {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl RestPageSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl PageSource for RestPageSource {
    async fn fetch_page(&self, page: u32) -> Result<Page, FetchError> {
        debug!(url = %self.base_url, page, "GET review page");
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("page", page), ("limit", self.page_size)])
            .send()
            .await?;
        let raw = check_status(resp).await?.text().await?;
        parse_rest_page(&raw, page)
    }
}

// ── GraphQL ──

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    reviews: GqlConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlConnection {
    #[serde(default)]
    edges: Vec<GqlEdge>,
    page_info: GqlPageInfo,
}

#[derive(Debug, Deserialize)]
struct GqlEdge {
    node: GqlNode,
}

#[derive(Debug, Deserialize)]
struct GqlNode {
    rid: Option<String>,
    #[serde(default)]
    text: String,
    rating: Option<f64>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlPageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug)]
struct GqlPage {
    page: Page,
    end_cursor: Option<String>,
}

fn parse_graphql_page(raw: &str, page: u32) -> Result<GqlPage, FetchError> {
    let resp: GqlResponse = serde_json::from_str(raw)?;
    if !resp.errors.is_empty() {
        let messages: Vec<&str> = resp.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(FetchError::Source(messages.join("; ")));
    }
    let conn = resp
        .data
        .ok_or_else(|| FetchError::Source("response has no data".into()))?
        .reviews;

    let records = conn
        .edges
        .into_iter()
        .map(|edge| {
            let node = edge.node;
            RawRecord {
                title: node.rid.as_deref().map(title_from_id).unwrap_or_default(),
                body: node.text,
                date: node.date,
                page,
                id: node.rid,
                rating: rating_from(node.rating),
            }
        })
        .collect();

    Ok(GqlPage {
        page: Page {
            records,
            has_more: conn.page_info.has_next_page,
        },
        end_cursor: conn.page_info.end_cursor,
    })
}

#[derive(Debug, Default)]
struct CursorState {
    /// `after` cursor to send for a page, keyed by page index.
    after: HashMap<u32, String>,
    /// Page on which the server reported `hasNextPage: false`.
    last_page: Option<u32>,
}

#[derive(Debug, PartialEq, Eq)]
enum NextRequest {
    /// Past the last page; answer empty without a request.
    Skip,
    Send { after: Option<String> },
}

impl CursorState {
    /// Decide how to request `page`. Requesting the first page starts a new
    /// walk and forgets everything learned on the previous one.
    fn begin(&mut self, page: u32, first_page: u32) -> Result<NextRequest, FetchError> {
        if page == first_page {
            *self = Self::default();
            return Ok(NextRequest::Send { after: None });
        }
        if self.last_page.is_some_and(|last| page > last) {
            return Ok(NextRequest::Skip);
        }
        match self.after.get(&page) {
            Some(cursor) => Ok(NextRequest::Send {
                after: Some(cursor.clone()),
            }),
            None => Err(FetchError::Source(format!(
                "no cursor for page {page}; pages must be fetched in order"
            ))),
        }
    }

    /// Record what the server said about `page`.
    fn record(&mut self, page: u32, end_cursor: Option<&str>, has_next_page: bool) {
        match (end_cursor, has_next_page) {
            (Some(cursor), true) => {
                self.after.insert(page + 1, cursor.to_string());
                self.last_page = None;
            }
            _ => {
                info!(page, "server reports no further pages");
                self.last_page = Some(page);
            }
        }
    }
}

/// Cursor-paginated GraphQL listing exposed as numbered pages.
///
/// Page `start_page` is requested without a cursor; each later page uses the
/// `endCursor` of the page before it, so pages must be requested in order.
/// Once the server reports `hasNextPage: false`, later pages come back empty
/// without a request.
pub struct GraphqlPageSource {
    client: reqwest::Client,
    endpoint: String,
    page_size: u32,
    first_page: u32,
    cursors: Mutex<CursorState>,
}

impl GraphqlPageSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: config.base_url.clone(),
            page_size: config.page_size.max(1),
            first_page: config.start_page,
            cursors: Mutex::new(CursorState::default()),
        })
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, CursorState>, FetchError> {
        self.cursors
            .lock()
            .map_err(|e| FetchError::Source(format!("cursor state poisoned: {e}")))
    }
}

#[async_trait]
impl PageSource for GraphqlPageSource {
    async fn fetch_page(&self, page: u32) -> Result<Page, FetchError> {
        let after = match self.state()?.begin(page, self.first_page)? {
            NextRequest::Skip => return Ok(Page::empty()),
            NextRequest::Send { after } => after,
        };

        let body = serde_json::json!({
            "query": REVIEWS_QUERY,
            "variables": { "first": self.page_size, "after": after },
        });
        debug!(endpoint = %self.endpoint, page, "POST reviews query");
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let raw = check_status(resp).await?.text().await?;
        let parsed = parse_graphql_page(&raw, page)?;

        self.state()?
            .record(page, parsed.end_cursor.as_deref(), parsed.page.has_more);
        Ok(parsed.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn title_from_slug() {
        assert_eq!(
            title_from_id("chocolate-candy-box-3"),
            "Chocolate Candy Box Review"
        );
        assert_eq!(title_from_id("teal-POTION-12"), "Teal Potion Review");
        assert_eq!(title_from_id("widget"), "Widget Review");
    }

    #[test]
    fn rest_bare_array() {
        let raw = r#"[
            {"title": "Great", "text": "Loved it", "date": "2023-03-01", "rating": 5},
            {"rid": "red-energy-potion-7", "body": "Meh", "date": "Mar 2, 2023"}
        ]"#;
        let page = parse_rest_page(raw, 4).unwrap();
        assert!(page.has_more);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].title, "Great");
        assert_eq!(page.records[0].body, "Loved it");
        assert_eq!(page.records[0].rating, Some(5));
        assert_eq!(page.records[1].title, "Red Energy Potion Review");
        assert_eq!(page.records[1].id.as_deref(), Some("red-energy-potion-7"));
        assert!(page.records.iter().all(|r| r.page == 4));
    }

    #[test]
    fn rest_envelope() {
        let raw = r#"{"reviews": [{"content": "ok", "posted": "2023-01-01"}], "hasMore": false}"#;
        let page = parse_rest_page(raw, 1).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].date.as_deref(), Some("2023-01-01"));
        assert!(!page.has_more);
    }

    #[test]
    fn rest_empty_page() {
        let page = parse_rest_page("[]", 9).unwrap();
        assert!(page.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn rest_garbage_is_json_error() {
        assert!(matches!(
            parse_rest_page("<html>", 1),
            Err(FetchError::Json(_))
        ));
    }

    #[test]
    fn graphql_page() {
        let raw = r#"{"data": {"reviews": {
            "edges": [
                {"node": {"rid": "chocolate-candy-box-3", "text": "Tasty",
                          "rating": 5, "date": "2023-05-10"}, "cursor": "a"},
                {"node": {"rid": "dark-red-potion-1", "text": "Bitter",
                          "rating": 2, "date": "2023-05-11"}, "cursor": "b"}
            ],
            "pageInfo": {"endCursor": "b", "hasNextPage": true}
        }}}"#;
        let parsed = parse_graphql_page(raw, 1).unwrap();
        assert_eq!(parsed.end_cursor.as_deref(), Some("b"));
        assert!(parsed.page.has_more);
        let r = &parsed.page.records[0];
        assert_eq!(r.title, "Chocolate Candy Box Review");
        assert_eq!(r.body, "Tasty");
        assert_eq!(r.date.as_deref(), Some("2023-05-10"));
        assert_eq!(r.rating, Some(5));
    }

    #[test]
    fn graphql_errors_surface_as_source_error() {
        let raw = r#"{"data": null, "errors": [{"message": "rate limited"}]}"#;
        match parse_graphql_page(raw, 2) {
            Err(FetchError::Source(msg)) => assert_eq!(msg, "rate limited"),
            other => panic!("expected source error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn graphql_out_of_order_page_is_rejected() {
        let source = GraphqlPageSource::new(&FetchConfig::default()).unwrap();
        assert!(matches!(
            source.fetch_page(3).await,
            Err(FetchError::Source(_))
        ));
    }

    #[tokio::test]
    async fn graphql_past_last_page_is_empty_without_request() {
        let config = FetchConfig {
            base_url: "http://127.0.0.1:9/unreachable".into(),
            ..Default::default()
        };
        let source = GraphqlPageSource::new(&config).unwrap();
        source.state().unwrap().last_page = Some(2);
        assert!(source.fetch_page(3).await.unwrap().is_empty());
    }

    #[test]
    fn rating_outside_star_scale_is_dropped() {
        assert_eq!(rating_from(Some(4.6)), Some(5));
        assert_eq!(rating_from(Some(1.0)), Some(1));
        assert_eq!(rating_from(Some(0.0)), None);
        assert_eq!(rating_from(Some(7.0)), None);
        assert_eq!(rating_from(Some(-3.0)), None);
        assert_eq!(rating_from(Some(f64::NAN)), None);
        assert_eq!(rating_from(None), None);
    }

    #[test]
    fn first_page_starts_a_new_cursor_walk() {
        let mut state = CursorState::default();

        // First walk: the listing ends on page 1.
        assert_eq!(state.begin(1, 1).unwrap(), NextRequest::Send { after: None });
        state.record(1, Some("c1"), false);
        assert_eq!(state.begin(2, 1).unwrap(), NextRequest::Skip);

        // Second walk: the listing has grown.
        assert_eq!(state.begin(1, 1).unwrap(), NextRequest::Send { after: None });
        assert_eq!(state.last_page, None);
        state.record(1, Some("c1"), true);
        assert_eq!(
            state.begin(2, 1).unwrap(),
            NextRequest::Send {
                after: Some("c1".into())
            }
        );
        state.record(2, None, false);
        assert_eq!(state.begin(3, 1).unwrap(), NextRequest::Skip);
    }

    /// Local HTTP endpoint answering every POST with `respond(request_body)`.
    async fn serve<F>(respond: F) -> String
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let respond = Arc::new(respond);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let body = loop {
                        let n = socket.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        let text = String::from_utf8_lossy(&buf).into_owned();
                        let Some(end) = text.find("\r\n\r\n") else {
                            continue;
                        };
                        let len = text[..end]
                            .lines()
                            .filter_map(|line| line.split_once(':'))
                            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if text.len() >= end + 4 + len {
                            break text[end + 4..end + 4 + len].to_string();
                        }
                    };
                    let reply = respond(&body);
                    let resp = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{reply}",
                        reply.len()
                    );
                    let _ = socket.write_all(resp.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/graphql")
    }

    fn gql_page(rid: &str, end_cursor: &str, has_next_page: bool) -> String {
        serde_json::json!({"data": {"reviews": {
            "edges": [{"node": {"rid": rid, "text": "Nice", "rating": 4, "date": "2023-01-02"}}],
            "pageInfo": {"endCursor": end_cursor, "hasNextPage": has_next_page}
        }}})
        .to_string()
    }

    #[tokio::test]
    async fn graphql_source_can_be_walked_again() {
        let grown = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(AtomicUsize::new(0));
        let url = {
            let grown = Arc::clone(&grown);
            let requests = Arc::clone(&requests);
            serve(move |body| {
                requests.fetch_add(1, Ordering::SeqCst);
                let request: serde_json::Value = serde_json::from_str(body).unwrap();
                match request["variables"]["after"].as_str() {
                    None => gql_page("teal-potion-1", "c1", grown.load(Ordering::SeqCst)),
                    Some("c1") => gql_page("teal-potion-2", "c2", false),
                    Some(other) => panic!("unexpected cursor {other}"),
                }
            })
            .await
        };

        let config = FetchConfig {
            base_url: url,
            min_delay_ms: 0,
            backoff_ms: 0,
            ..Default::default()
        };
        let fetcher = crate::Fetcher::new(GraphqlPageSource::new(&config).unwrap(), &config);

        let first = fetcher.fetch_all().await;
        assert!(first.warning.is_none(), "{:?}", first.warning);
        assert_eq!(first.records.len(), 1);
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        grown.store(true, Ordering::SeqCst);
        let second = fetcher.fetch_all().await;
        assert!(second.warning.is_none(), "{:?}", second.warning);
        assert_eq!(second.records.len(), 2);
        assert_eq!(second.records[1].id.as_deref(), Some("teal-potion-2"));
        assert_eq!(requests.load(Ordering::SeqCst), 3);
    }
}
