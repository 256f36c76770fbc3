//! A user's session with the bookmarking service.
//!
//! # Design
//! `Account` owns a `DeliciousClient` (request building and parsing) and a
//! `Transport` (the round trip), and adds the little state a session needs:
//! the time of the previous request for pacing, the headers of the last
//! response, and the cached result of the last `bookmarks` call.
//!
//! Every operation is one `build_*`, one round trip, one `parse_*`. The
//! exception is `bookmarks`, which asks `posts/update` first and skips the
//! expensive `posts/all` when nothing changed since the cached fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::client::DeliciousClient;
use crate::config::AccountConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    Bookmark, BookmarkFilter, BookmarkRange, Bundle, DateCount, HashEntry, LastUpdate, NewBookmark,
    Suggestions, Tag,
};

/// Open a session with default settings over the blocking HTTP transport.
pub fn connect(username: &str, password: &str) -> Account<UreqTransport> {
    Account::new(username, password)
}

struct BookmarkCache {
    range: BookmarkRange,
    updated: DateTime<Utc>,
    bookmarks: Arc<Vec<Bookmark>>,
}

/// One user's session: credentials, transport and per-session state.
///
/// Methods take `&mut self` because every call updates pacing and the last
/// response headers.
pub struct Account<T: Transport = UreqTransport> {
    client: DeliciousClient,
    transport: T,
    request_interval: Duration,
    last_request: Option<Instant>,
    last_headers: Vec<(String, String)>,
    cache: Option<BookmarkCache>,
}

impl Account<UreqTransport> {
    pub fn new(username: &str, password: &str) -> Self {
        Self::with_config(username, password, AccountConfig::default())
    }

    pub fn with_config(username: &str, password: &str, config: AccountConfig) -> Self {
        Self::with_transport(username, password, config, UreqTransport::new())
    }
}

impl<T: Transport> Account<T> {
    pub fn with_transport(username: &str, password: &str, config: AccountConfig, transport: T) -> Self {
        Self {
            client: DeliciousClient::new(&config.base_url, username, password, &config.user_agent),
            transport,
            request_interval: config.request_interval,
            last_request: None,
            last_headers: Vec::new(),
            cache: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Headers of the most recent response, whatever its status.
    pub fn last_response_headers(&self) -> &[(String, String)] {
        &self.last_headers
    }

    /// Result of the last successful `bookmarks` call, if any.
    pub fn cached_bookmarks(&self) -> Option<Arc<Vec<Bookmark>>> {
        self.cache.as_ref().map(|c| Arc::clone(&c.bookmarks))
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    pub fn last_update(&mut self) -> Result<LastUpdate, ApiError> {
        let req = self.client.build_last_update();
        let resp = self.round_trip(req)?;
        self.client.parse_last_update(resp)
    }

    /// Most recent posts, newest first. The service applies its own default
    /// and maximum for `count`.
    pub fn recent_bookmarks(&mut self, count: Option<u32>, tag: Option<&str>) -> Result<Vec<Bookmark>, ApiError> {
        let req = self.client.build_recent_bookmarks(count, tag);
        let resp = self.round_trip(req)?;
        self.client.parse_bookmarks(resp)
    }

    pub fn bookmark(&mut self, filter: &BookmarkFilter) -> Result<Vec<Bookmark>, ApiError> {
        let req = self.client.build_bookmark(filter);
        let resp = self.round_trip(req)?;
        self.client.parse_bookmarks(resp)
    }

    /// All posts matching `range`.
    ///
    /// Checks `posts/update` first. When the previous call used the same
    /// range and the account has not changed since, the cached list is
    /// returned as is (the same `Arc`). Otherwise the list is fetched and
    /// replaces the cache.
    pub fn bookmarks(&mut self, range: &BookmarkRange) -> Result<Arc<Vec<Bookmark>>, ApiError> {
        let update = self.last_update()?;

        if let Some(cache) = &self.cache {
            if cache.range == *range && update.time <= cache.updated {
                debug!("account unchanged since {}, serving cached bookmarks", cache.updated);
                return Ok(Arc::clone(&cache.bookmarks));
            }
        }

        let req = self.client.build_bookmarks(range);
        let resp = self.round_trip(req)?;
        let bookmarks = Arc::new(self.client.parse_bookmarks(resp)?);
        debug!("cached {} bookmarks as of {}", bookmarks.len(), update.time);
        self.cache = Some(BookmarkCache {
            range: range.clone(),
            updated: update.time,
            bookmarks: Arc::clone(&bookmarks),
        });
        Ok(bookmarks)
    }

    /// The hash manifest: one raw attribute map per post.
    pub fn hashes(&mut self) -> Result<Vec<HashEntry>, ApiError> {
        let req = self.client.build_hashes();
        let resp = self.round_trip(req)?;
        self.client.parse_hashes(resp)
    }

    /// Save a post. Returns the service's status string, which is always
    /// `done` on success.
    pub fn add(&mut self, bookmark: &NewBookmark) -> Result<String, ApiError> {
        let req = self.client.build_add(bookmark)?;
        let resp = self.round_trip(req)?;
        self.client.parse_result(resp)
    }

    pub fn delete(&mut self, url: &str) -> Result<String, ApiError> {
        let req = self.client.build_delete(url)?;
        let resp = self.round_trip(req)?;
        self.client.parse_result(resp)
    }

    pub fn dates(&mut self, tag: Option<&str>) -> Result<Vec<DateCount>, ApiError> {
        let req = self.client.build_dates(tag);
        let resp = self.round_trip(req)?;
        self.client.parse_dates(resp)
    }

    pub fn suggest(&mut self, url: &str) -> Result<Suggestions, ApiError> {
        let req = self.client.build_suggest(url)?;
        let resp = self.round_trip(req)?;
        self.client.parse_suggest(resp)
    }

    // -----------------------------------------------------------------------
    // Tags and bundles
    // -----------------------------------------------------------------------

    pub fn tags(&mut self) -> Result<Vec<Tag>, ApiError> {
        let req = self.client.build_tags();
        let resp = self.round_trip(req)?;
        self.client.parse_tags(resp)
    }

    pub fn delete_tag(&mut self, tag: &str) -> Result<String, ApiError> {
        let req = self.client.build_delete_tag(tag)?;
        let resp = self.round_trip(req)?;
        self.client.parse_result(resp)
    }

    pub fn rename_tag(&mut self, old: &str, new: &str) -> Result<String, ApiError> {
        let req = self.client.build_rename_tag(old, new)?;
        let resp = self.round_trip(req)?;
        self.client.parse_result(resp)
    }

    pub fn bundles(&mut self, name: Option<&str>) -> Result<Vec<Bundle>, ApiError> {
        let req = self.client.build_bundles(name);
        let resp = self.round_trip(req)?;
        self.client.parse_bundles(resp)
    }

    pub fn set_bundle<I, S>(&mut self, name: &str, tags: I) -> Result<String, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        let req = self.client.build_set_bundle(name, &tags)?;
        let resp = self.round_trip(req)?;
        self.client.parse_result(resp)
    }

    pub fn delete_bundle(&mut self, name: &str) -> Result<String, ApiError> {
        let req = self.client.build_delete_bundle(name)?;
        let resp = self.round_trip(req)?;
        self.client.parse_result(resp)
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    fn round_trip(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.pace();
        debug!("GET {}", request.full_url());

        let response = self.transport.execute(&request)?;
        debug!("{} answered {}", request.url, response.status);
        if response.status == 503 {
            warn!("throttled by service on {}", request.url);
        }
        self.last_headers = response.headers.clone();
        Ok(response)
    }

    /// Sleep until `request_interval` has passed since the previous request.
    fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.request_interval {
                let wait = self.request_interval - elapsed;
                debug!("pacing requests, sleeping {wait:?}");
                std::thread::sleep(wait);
            }
        }
        self.last_request = Some(Instant::now());
    }
}
