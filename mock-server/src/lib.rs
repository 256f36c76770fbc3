//! In-memory stand-in for the del.icio.us v1 API.
//!
//! Serves the `/v1/posts/*`, `/v1/tags/*` and `/v1/tags/bundles/*` endpoints
//! over GET with XML bodies, checks HTTP Basic credentials, and can be
//! switched into a throttled mode where every call answers 503.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, TimeDelta, Utc};
use md5::{Digest, Md5};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";
const RECENT_DEFAULT: usize = 15;
const RECENT_MAX: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub url: String,
    pub description: String,
    pub extended: String,
    pub tags: Vec<String>,
    pub time: DateTime<Utc>,
    pub shared: bool,
}

impl Post {
    pub fn hash(&self) -> String {
        md5_hex(&self.url)
    }

    /// Changes whenever any user-editable field changes.
    pub fn meta(&self) -> String {
        md5_hex(&format!(
            "{}\n{}\n{}\n{}",
            self.description,
            self.extended,
            self.tags.join(" "),
            self.shared
        ))
    }

    fn has_tags(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|t| self.tags.contains(t))
    }
}

#[derive(Debug)]
pub struct Store {
    pub username: String,
    pub password: String,
    pub posts: Vec<Post>,
    pub bundles: BTreeMap<String, Vec<String>>,
    pub last_update: DateTime<Utc>,
    pub throttled: bool,
}

impl Store {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            posts: Vec::new(),
            bundles: BTreeMap::new(),
            last_update: now(),
            throttled: false,
        }
    }

    /// Record a change. The update time always moves forward, even for
    /// several changes within the same second.
    fn touch(&mut self) {
        self.last_update = now().max(self.last_update + TimeDelta::seconds(1));
    }

    fn newest_first(&self) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.posts.iter().collect();
        posts.sort_by(|a, b| b.time.cmp(&a.time));
        posts
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn new_db(username: &str, password: &str) -> Db {
    Arc::new(RwLock::new(Store::new(username, password)))
}

/// Router with a fresh store accepting `user` / `pass`.
pub fn app() -> Router {
    app_with(new_db("user", "pass"))
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/v1/posts/update", get(posts_update))
        .route("/v1/posts/recent", get(posts_recent))
        .route("/v1/posts/get", get(posts_get))
        .route("/v1/posts/all", get(posts_all))
        .route("/v1/posts/add", get(posts_add))
        .route("/v1/posts/delete", get(posts_delete))
        .route("/v1/posts/dates", get(posts_dates))
        .route("/v1/posts/suggest", get(posts_suggest))
        .route("/v1/tags/get", get(tags_get))
        .route("/v1/tags/delete", get(tags_delete))
        .route("/v1/tags/rename", get(tags_rename))
        .route("/v1/tags/bundles/all", get(bundles_all))
        .route("/v1/tags/bundles/set", get(bundles_set))
        .route("/v1/tags/bundles/delete", get(bundles_delete))
        .with_state(db)
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

// ---------------------------------------------------------------------------
// XML bodies
// ---------------------------------------------------------------------------

pub struct Xml(pub String);

impl IntoResponse for Xml {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "text/xml; charset=utf-8")], self.0).into_response()
    }
}

fn attrs(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!(r#" {k}="{}""#, quick_xml::escape::escape(*v)))
        .collect()
}

fn empty(name: &str, pairs: &[(&str, &str)]) -> String {
    format!("<{name}{}/>", attrs(pairs))
}

fn document(name: &str, pairs: &[(&str, &str)], children: &[String]) -> Xml {
    Xml(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>{}<{name}{}>{}</{name}>"#,
        "\n",
        attrs(pairs),
        children.concat()
    ))
}

fn code(code: &str) -> Xml {
    Xml(format!(r#"<?xml version="1.0" encoding="UTF-8"?>{}"#, empty("result", &[("code", code)])))
}

fn text_result(text: &str) -> Xml {
    Xml(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><result>{}</result>"#,
        quick_xml::escape::escape(text)
    ))
}

fn post_element(post: &Post, meta: bool) -> String {
    let time = post.time.format(TIME_FORMAT).to_string();
    let tags = post.tags.join(" ");
    let hash = post.hash();
    let signature = post.meta();
    let mut pairs = vec![
        ("href", post.url.as_str()),
        ("description", post.description.as_str()),
        ("extended", post.extended.as_str()),
        ("hash", hash.as_str()),
        ("tag", tags.as_str()),
        ("time", time.as_str()),
    ];
    if meta {
        pairs.push(("meta", signature.as_str()));
    }
    if !post.shared {
        pairs.push(("shared", "no"));
    }
    empty("post", &pairs)
}

// ---------------------------------------------------------------------------
// Request gate
// ---------------------------------------------------------------------------

/// Reject throttled and unauthenticated calls before any handler logic runs.
fn gate(store: &Store, headers: &HeaderMap) -> Result<(), StatusCode> {
    if store.throttled {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", store.username, store.password))
    );
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(given) if given == expected => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecentQuery {
    pub tag: Option<String>,
    pub count: Option<usize>,
}

#[derive(Deserialize)]
pub struct GetQuery {
    pub tag: Option<String>,
    pub dt: Option<String>,
    pub url: Option<String>,
    pub hashes: Option<String>,
    pub meta: Option<String>,
}

#[derive(Deserialize)]
pub struct AllQuery {
    pub tag: Option<String>,
    pub start: Option<usize>,
    pub results: Option<usize>,
    pub fromdt: Option<String>,
    pub todt: Option<String>,
    pub meta: Option<String>,
    pub hashes: Option<String>,
}

#[derive(Deserialize)]
pub struct AddQuery {
    pub url: Option<String>,
    pub description: Option<String>,
    pub extended: Option<String>,
    pub tags: Option<String>,
    pub dt: Option<String>,
    pub replace: Option<String>,
    pub shared: Option<String>,
}

#[derive(Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct TagQuery {
    pub tag: Option<String>,
}

async fn posts_update(State(db): State<Db>, headers: HeaderMap) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let time = store.last_update.format(TIME_FORMAT).to_string();
    Ok(Xml(empty("update", &[("time", time.as_str()), ("inboxnew", "0")])))
}

async fn posts_recent(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let wanted = split(query.tag.as_deref());
    let count = query.count.unwrap_or(RECENT_DEFAULT).min(RECENT_MAX);
    let children: Vec<String> = store
        .newest_first()
        .into_iter()
        .filter(|p| p.has_tags(&wanted))
        .take(count)
        .map(|p| post_element(p, false))
        .collect();
    let tag = wanted.join(" ");
    Ok(document(
        "posts",
        &[("tag", tag.as_str()), ("user", store.username.as_str())],
        &children,
    ))
}

async fn posts_get(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<GetQuery>,
) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let wanted = split(query.tag.as_deref());
    let meta = query.meta.as_deref() == Some("yes");

    let (dt, matched): (String, Vec<&Post>) = if let Some(url) = query.url.as_deref() {
        (String::new(), store.posts.iter().filter(|p| p.url == url).collect())
    } else if let Some(hashes) = query.hashes.as_deref().filter(|h| !h.is_empty()) {
        let hashes: BTreeSet<&str> = hashes.split_whitespace().collect();
        (
            String::new(),
            store.posts.iter().filter(|p| hashes.contains(p.hash().as_str())).collect(),
        )
    } else {
        let day = match query.dt.as_deref() {
            Some(dt) => Some(NaiveDate::parse_from_str(dt, DATE_FORMAT).map_err(|_| StatusCode::BAD_REQUEST)?),
            None => store.newest_first().first().map(|p| p.time.date_naive()),
        };
        let matched: Vec<&Post> = match day {
            Some(day) => store.newest_first().into_iter().filter(|p| p.time.date_naive() == day).collect(),
            None => Vec::new(),
        };
        (day.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(), matched)
    };

    let children: Vec<String> = matched
        .into_iter()
        .filter(|p| p.has_tags(&wanted))
        .map(|p| post_element(p, meta))
        .collect();
    let tag = wanted.join(" ");
    Ok(document(
        "posts",
        &[("dt", dt.as_str()), ("tag", tag.as_str()), ("user", store.username.as_str())],
        &children,
    ))
}

async fn posts_all(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<AllQuery>,
) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;

    if query.hashes.is_some() {
        let children: Vec<String> = store
            .newest_first()
            .into_iter()
            .map(|p| {
                let meta = p.meta();
                let hash = p.hash();
                empty("post", &[("meta", meta.as_str()), ("url", hash.as_str())])
            })
            .collect();
        return Ok(document("posts", &[], &children));
    }

    let wanted = split(query.tag.as_deref());
    let from = parse_time(query.fromdt.as_deref())?;
    let to = parse_time(query.todt.as_deref())?;
    let meta = query.meta.as_deref() == Some("yes");
    let children: Vec<String> = store
        .newest_first()
        .into_iter()
        .filter(|p| p.has_tags(&wanted))
        .filter(|p| from.map_or(true, |f| p.time >= f) && to.map_or(true, |t| p.time <= t))
        .skip(query.start.unwrap_or(0))
        .take(query.results.unwrap_or(usize::MAX))
        .map(|p| post_element(p, meta))
        .collect();
    let tag = wanted.join(" ");
    Ok(document(
        "posts",
        &[("tag", tag.as_str()), ("user", store.username.as_str())],
        &children,
    ))
}

async fn posts_add(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<AddQuery>,
) -> Result<Xml, StatusCode> {
    let mut store = db.write().await;
    gate(&store, &headers)?;

    let (Some(url), Some(description)) = (query.url, query.description) else {
        return Ok(code("missing url or description"));
    };
    if url.is_empty() || description.is_empty() {
        return Ok(code("missing url or description"));
    }
    let time = match query.dt.as_deref() {
        Some(dt) => match NaiveDateTime::parse_from_str(dt, TIME_FORMAT) {
            Ok(t) => t.and_utc(),
            Err(_) => return Ok(code("invalid date")),
        },
        None => now(),
    };
    let existing = store.posts.iter().position(|p| p.url == url);
    if existing.is_some() && query.replace.as_deref() == Some("no") {
        return Ok(code("item already exists"));
    }

    let post = Post {
        url,
        description,
        extended: query.extended.unwrap_or_default(),
        tags: split(query.tags.as_deref()),
        time,
        shared: query.shared.as_deref() != Some("no"),
    };
    match existing {
        Some(i) => store.posts[i] = post,
        None => store.posts.push(post),
    }
    store.touch();
    Ok(code("done"))
}

async fn posts_delete(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<UrlQuery>,
) -> Result<Xml, StatusCode> {
    let mut store = db.write().await;
    gate(&store, &headers)?;
    let url = query.url.unwrap_or_default();
    let before = store.posts.len();
    store.posts.retain(|p| p.url != url);
    if store.posts.len() == before {
        return Ok(code("item not found"));
    }
    store.touch();
    Ok(code("done"))
}

async fn posts_dates(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<TagQuery>,
) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let wanted = split(query.tag.as_deref());
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for post in store.posts.iter().filter(|p| p.has_tags(&wanted)) {
        *counts.entry(post.time.date_naive()).or_default() += 1;
    }
    let children: Vec<String> = counts
        .iter()
        .rev()
        .map(|(date, count)| {
            let date = date.format(DATE_FORMAT).to_string();
            let count = count.to_string();
            empty("date", &[("count", count.as_str()), ("date", date.as_str())])
        })
        .collect();
    let tag = wanted.join(" ");
    Ok(document(
        "dates",
        &[("tag", tag.as_str()), ("user", store.username.as_str())],
        &children,
    ))
}

async fn posts_suggest(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<UrlQuery>,
) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let url = query.url.unwrap_or_default();

    let popular: Vec<String> = store
        .posts
        .iter()
        .find(|p| p.url == url)
        .map(|p| p.tags.clone())
        .unwrap_or_default();
    let mut ranked: Vec<(String, usize)> = tag_counts(&store).into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut children = Vec::new();
    for tag in &popular {
        children.push(format!("<popular>{}</popular>", quick_xml::escape::escape(tag.as_str())));
    }
    for (tag, _) in ranked.iter().take(5) {
        children.push(format!("<recommended>{}</recommended>", quick_xml::escape::escape(tag.as_str())));
    }
    Ok(document("suggest", &[], &children))
}

// ---------------------------------------------------------------------------
// Tags and bundles
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RenameQuery {
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Deserialize)]
pub struct BundleQuery {
    pub bundle: Option<String>,
    pub tags: Option<String>,
}

async fn tags_get(State(db): State<Db>, headers: HeaderMap) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let children: Vec<String> = tag_counts(&store)
        .iter()
        .map(|(tag, count)| {
            let count = count.to_string();
            empty("tag", &[("count", count.as_str()), ("tag", tag.as_str())])
        })
        .collect();
    Ok(document("tags", &[], &children))
}

async fn tags_delete(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<TagQuery>,
) -> Result<Xml, StatusCode> {
    let mut store = db.write().await;
    gate(&store, &headers)?;
    let tag = query.tag.unwrap_or_default();
    for post in &mut store.posts {
        post.tags.retain(|t| *t != tag);
    }
    store.touch();
    Ok(text_result("done"))
}

async fn tags_rename(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<RenameQuery>,
) -> Result<Xml, StatusCode> {
    let mut store = db.write().await;
    gate(&store, &headers)?;
    let (Some(old), Some(new)) = (query.old, query.new) else {
        return Ok(text_result("missing old or new tag"));
    };
    for post in &mut store.posts {
        if let Some(i) = post.tags.iter().position(|t| *t == old) {
            if post.tags.contains(&new) {
                post.tags.remove(i);
            } else {
                post.tags[i] = new.clone();
            }
        }
    }
    store.touch();
    Ok(text_result("done"))
}

async fn bundles_all(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<BundleQuery>,
) -> Result<Xml, StatusCode> {
    let store = db.read().await;
    gate(&store, &headers)?;
    let children: Vec<String> = store
        .bundles
        .iter()
        .filter(|(name, _)| query.bundle.as_deref().map_or(true, |b| b == name.as_str()))
        .map(|(name, tags)| {
            let tags = tags.join(" ");
            empty("bundle", &[("name", name.as_str()), ("tags", tags.as_str())])
        })
        .collect();
    Ok(document("bundles", &[], &children))
}

async fn bundles_set(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<BundleQuery>,
) -> Result<Xml, StatusCode> {
    let mut store = db.write().await;
    gate(&store, &headers)?;
    let name = query.bundle.unwrap_or_default();
    let tags = split(query.tags.as_deref());
    if name.is_empty() || tags.is_empty() {
        return Ok(code("missing bundle or tags"));
    }
    store.bundles.insert(name, tags);
    store.touch();
    Ok(code("done"))
}

async fn bundles_delete(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<BundleQuery>,
) -> Result<Xml, StatusCode> {
    let mut store = db.write().await;
    gate(&store, &headers)?;
    let name = query.bundle.unwrap_or_default();
    if store.bundles.remove(&name).is_none() {
        return Ok(code("item not found"));
    }
    store.touch();
    Ok(code("done"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn split(tags: Option<&str>) -> Vec<String> {
    tags.unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn parse_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>, StatusCode> {
    value
        .map(|v| {
            NaiveDateTime::parse_from_str(v, TIME_FORMAT)
                .map(|t| t.and_utc())
                .map_err(|_| StatusCode::BAD_REQUEST)
        })
        .transpose()
}

fn tag_counts(store: &Store) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for post in &store.posts {
        for tag in &post.tags {
            *counts.entry(tag.clone()).or_default() += 1;
        }
    }
    counts
}
