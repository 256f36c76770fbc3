//! Stateless HTTP request builder and response parser for the bookmarking
//! API.
//!
//! # Design
//! `DeliciousClient` holds the base URL and the headers every call carries
//! (Basic credentials and the user agent). Each API operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`. `Account` drives the round trip between the
//! two; nothing in here performs I/O.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{
    Bookmark, BookmarkFilter, BookmarkRange, Bundle, DateCount, HashEntry, LastUpdate, NewBookmark, Suggestions,
    Tag, DATE_FORMAT,
};
use crate::xml::{self, BundlesXml, DatesXml, HashesXml, PostsXml, ResultXml, SuggestXml, TagsXml, UpdateXml};

/// Status string the service reports for a successful mutation.
pub const DONE: &str = "done";

/// Stateless builder/parser for the v1 API.
///
/// Holds the base URL (no trailing slash) plus the prebuilt `Authorization`
/// and `User-Agent` values attached to every request.
#[derive(Debug, Clone)]
pub struct DeliciousClient {
    base_url: String,
    authorization: String,
    user_agent: String,
}

impl DeliciousClient {
    pub fn new(base_url: &str, username: &str, password: &str, user_agent: &str) -> Self {
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {credentials}"),
            user_agent: user_agent.to_string(),
        }
    }

    fn get(&self, endpoint: &str) -> HttpRequest {
        HttpRequest::new(format!("{}/{endpoint}", self.base_url))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", self.user_agent.as_str())
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    pub fn build_last_update(&self) -> HttpRequest {
        self.get("posts/update")
    }

    pub fn build_recent_bookmarks(&self, count: Option<u32>, tag: Option<&str>) -> HttpRequest {
        self.get("posts/recent")
            .param_opt("tag", tag)
            .param_opt("count", count.map(|c| c.to_string()))
    }

    pub fn build_bookmark(&self, filter: &BookmarkFilter) -> HttpRequest {
        let mut req = self.get("posts/get");
        if !filter.tags.is_empty() {
            req = req.param("tag", filter.tags.join(" "));
        }
        req = req
            .param_opt("dt", filter.date.map(|d| d.format(DATE_FORMAT).to_string()))
            .param_opt("url", filter.url.as_deref());
        if !filter.hashes.is_empty() {
            req = req.param("hashes", filter.hashes.join(" "));
        }
        if filter.meta {
            req = req.param("meta", "yes");
        }
        req
    }

    pub fn build_bookmarks(&self, range: &BookmarkRange) -> HttpRequest {
        let mut req = self
            .get("posts/all")
            .param_opt("tag", range.tag.as_deref())
            .param_opt("start", range.offset.map(|o| o.to_string()))
            .param_opt("results", range.limit.map(|l| l.to_string()))
            .param_opt("fromdt", range.from.map(|t| t.to_wire()))
            .param_opt("todt", range.to.map(|t| t.to_wire()));
        if range.meta {
            req = req.param("meta", "yes");
        }
        req
    }

    pub fn build_hashes(&self) -> HttpRequest {
        self.get("posts/all").param("hashes", "")
    }

    pub fn build_add(&self, bookmark: &NewBookmark) -> Result<HttpRequest, ApiError> {
        require("url", &bookmark.url)?;
        require("description", &bookmark.description)?;

        let mut req = self
            .get("posts/add")
            .param("url", bookmark.url.as_str())
            .param("description", bookmark.description.as_str())
            .param_opt("extended", bookmark.extended.as_deref());
        if !bookmark.tags.is_empty() {
            req = req.param("tags", bookmark.tags.join(" "));
        }
        req = req.param_opt("dt", bookmark.time.map(|t| t.to_wire()));
        if bookmark.replace == Some(false) {
            req = req.param("replace", "no");
        }
        if bookmark.private {
            req = req.param("shared", "no");
        }
        Ok(req)
    }

    pub fn build_delete(&self, url: &str) -> Result<HttpRequest, ApiError> {
        require("url", url)?;
        Ok(self.get("posts/delete").param("url", url))
    }

    pub fn build_dates(&self, tag: Option<&str>) -> HttpRequest {
        self.get("posts/dates").param_opt("tag", tag)
    }

    pub fn build_suggest(&self, url: &str) -> Result<HttpRequest, ApiError> {
        require("url", url)?;
        Ok(self.get("posts/suggest").param("url", url))
    }

    pub fn parse_last_update(&self, response: HttpResponse) -> Result<LastUpdate, ApiError> {
        parse_body::<UpdateXml>(&response)?.try_into()
    }

    /// Shared by `posts/recent`, `posts/get` and `posts/all`.
    pub fn parse_bookmarks(&self, response: HttpResponse) -> Result<Vec<Bookmark>, ApiError> {
        parse_body::<PostsXml>(&response)?
            .posts
            .into_iter()
            .map(Bookmark::try_from)
            .collect()
    }

    pub fn parse_hashes(&self, response: HttpResponse) -> Result<Vec<HashEntry>, ApiError> {
        Ok(parse_body::<HashesXml>(&response)?.into())
    }

    pub fn parse_dates(&self, response: HttpResponse) -> Result<Vec<DateCount>, ApiError> {
        parse_body::<DatesXml>(&response)?.try_into()
    }

    pub fn parse_suggest(&self, response: HttpResponse) -> Result<Suggestions, ApiError> {
        Ok(parse_body::<SuggestXml>(&response)?.into())
    }

    // -----------------------------------------------------------------------
    // Tags and bundles
    // -----------------------------------------------------------------------

    pub fn build_tags(&self) -> HttpRequest {
        self.get("tags/get")
    }

    pub fn build_delete_tag(&self, tag: &str) -> Result<HttpRequest, ApiError> {
        require("tag", tag)?;
        Ok(self.get("tags/delete").param("tag", tag))
    }

    pub fn build_rename_tag(&self, old: &str, new: &str) -> Result<HttpRequest, ApiError> {
        require("old", old)?;
        require("new", new)?;
        Ok(self.get("tags/rename").param("old", old).param("new", new))
    }

    pub fn build_bundles(&self, name: Option<&str>) -> HttpRequest {
        self.get("tags/bundles/all").param_opt("bundle", name)
    }

    pub fn build_set_bundle(&self, name: &str, tags: &[String]) -> Result<HttpRequest, ApiError> {
        require("bundle", name)?;
        if tags.is_empty() {
            return Err(ApiError::InvalidArgument("a bundle needs at least one tag".to_string()));
        }
        Ok(self
            .get("tags/bundles/set")
            .param("bundle", name)
            .param("tags", tags.join(" ")))
    }

    pub fn build_delete_bundle(&self, name: &str) -> Result<HttpRequest, ApiError> {
        require("bundle", name)?;
        Ok(self.get("tags/bundles/delete").param("bundle", name))
    }

    pub fn parse_tags(&self, response: HttpResponse) -> Result<Vec<Tag>, ApiError> {
        Ok(parse_body::<TagsXml>(&response)?.into())
    }

    pub fn parse_bundles(&self, response: HttpResponse) -> Result<Vec<Bundle>, ApiError> {
        Ok(parse_body::<BundlesXml>(&response)?.into())
    }

    /// Status of a mutating call. The service reports it either as the root's
    /// `code` attribute (`<result code="done"/>`) or as its text
    /// (`<result>done</result>`). Anything but `done` is `Rejected`.
    pub fn parse_result(&self, response: HttpResponse) -> Result<String, ApiError> {
        let code = parse_body::<ResultXml>(&response)?.status();
        if code == DONE {
            Ok(code)
        } else {
            Err(ApiError::Rejected { code })
        }
    }
}

/// Map non-200 status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    match response.status {
        200 => Ok(()),
        401 => Err(ApiError::Unauthorized),
        503 => Err(ApiError::Throttled {
            url: response.url.clone(),
        }),
        status => Err(ApiError::HttpError {
            status,
            body: response.body.clone(),
        }),
    }
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    xml::decode(&response.body)
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidArgument(format!("`{field}` must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostTime;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn client() -> DeliciousClient {
        DeliciousClient::new("https://api.example/v1", "user", "pass", "delicious-test")
    }

    fn respond(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            url: "https://api.example/v1/test".to_string(),
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn every_request_carries_credentials_and_user_agent() {
        let req = client().build_tags();
        assert_eq!(req.url, "https://api.example/v1/tags/get");
        assert_eq!(
            req.headers,
            vec![
                ("Authorization".to_string(), "Basic dXNlcjpwYXNz".to_string()),
                ("User-Agent".to_string(), "delicious-test".to_string()),
            ]
        );
        assert!(req.query.is_empty());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = DeliciousClient::new("https://api.example/v1/", "u", "p", "ua");
        assert_eq!(client.build_last_update().url, "https://api.example/v1/posts/update");
    }

    #[test]
    fn build_bookmark_combines_tag_and_date() {
        let filter = BookmarkFilter::default()
            .tags(["rust", "xml"])
            .date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        let req = client().build_bookmark(&filter);
        assert_eq!(req.url, "https://api.example/v1/posts/get");
        assert_eq!(req.query_value("tag"), Some("rust xml"));
        assert_eq!(req.query_value("dt"), Some("2024-01-02"));
        assert_eq!(req.query.len(), 2);
    }

    #[test]
    fn build_bookmark_url_hashes_and_meta() {
        let filter = BookmarkFilter {
            url: Some("http://x".to_string()),
            hashes: vec!["aaa".to_string(), "bbb".to_string()],
            meta: true,
            ..BookmarkFilter::default()
        };
        let req = client().build_bookmark(&filter);
        assert_eq!(req.query_value("url"), Some("http://x"));
        assert_eq!(req.query_value("hashes"), Some("aaa bbb"));
        assert_eq!(req.query_value("meta"), Some("yes"));
        assert_eq!(req.query_value("dt"), None);
    }

    #[test]
    fn build_bookmarks_maps_range_to_query() {
        let range = BookmarkRange {
            tag: Some("rust".to_string()),
            offset: Some(10),
            limit: Some(5),
            from: Some(PostTime::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
            to: Some("2024-02-01T12:00:00Z".parse().unwrap()),
            meta: false,
        };
        let req = client().build_bookmarks(&range);
        assert_eq!(req.url, "https://api.example/v1/posts/all");
        assert_eq!(
            req.query,
            vec![
                ("tag".to_string(), "rust".to_string()),
                ("start".to_string(), "10".to_string()),
                ("results".to_string(), "5".to_string()),
                ("fromdt".to_string(), "2024-01-01T00:00:00Z".to_string()),
                ("todt".to_string(), "2024-02-01T12:00:00Z".to_string()),
            ]
        );
    }

    #[test]
    fn build_hashes_requests_the_manifest() {
        let req = client().build_hashes();
        assert_eq!(req.full_url(), "https://api.example/v1/posts/all?hashes");
    }

    #[test]
    fn build_add_omits_extended_when_absent() {
        let req = client().build_add(&NewBookmark::new("http://x", "d")).unwrap();
        assert_eq!(req.query_value("extended"), None);
        assert_eq!(req.query_value("replace"), None);
        assert_eq!(req.query_value("shared"), None);
        assert_eq!(req.query_value("tags"), None);
    }

    #[test]
    fn build_add_includes_extended_verbatim() {
        let bookmark = NewBookmark::new("http://x", "d").extended("notes & more  ");
        let req = client().build_add(&bookmark).unwrap();
        assert_eq!(req.query_value("extended"), Some("notes & more  "));
    }

    #[test]
    fn build_add_flags() {
        let bookmark = NewBookmark::new("http://x", "d")
            .tags(["a", "b"])
            .time(Utc.with_ymd_and_hms(2005, 3, 31, 20, 0, 0).unwrap())
            .replace(false)
            .private(true);
        let req = client().build_add(&bookmark).unwrap();
        assert_eq!(req.query_value("tags"), Some("a b"));
        assert_eq!(req.query_value("dt"), Some("2005-03-31T20:00:00Z"));
        assert_eq!(req.query_value("replace"), Some("no"));
        assert_eq!(req.query_value("shared"), Some("no"));

        let replace = NewBookmark::new("http://x", "d").replace(true);
        assert_eq!(client().build_add(&replace).unwrap().query_value("replace"), None);
    }

    #[test]
    fn build_add_requires_url_and_description() {
        let err = client().build_add(&NewBookmark::new("", "d")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        let err = client().build_add(&NewBookmark::new("http://x", " ")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn build_set_bundle_joins_tags() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let req = client().build_set_bundle("reading", &tags).unwrap();
        assert_eq!(req.url, "https://api.example/v1/tags/bundles/set");
        assert_eq!(req.query_value("bundle"), Some("reading"));
        assert_eq!(req.query_value("tags"), Some("a b"));
        assert!(client().build_set_bundle("reading", &[]).is_err());
    }

    #[test]
    fn build_rename_tag() {
        let req = client().build_rename_tag("old", "new").unwrap();
        assert_eq!(req.url, "https://api.example/v1/tags/rename");
        assert_eq!(
            req.query,
            vec![("old".to_string(), "old".to_string()), ("new".to_string(), "new".to_string())]
        );
    }

    #[test]
    fn parse_post_splits_tags_and_parses_time() {
        let body = r#"<posts><post url="http://x" description="d" time="2024-01-01T00:00:00Z" tag="a b"/></posts>"#;
        let posts = client().parse_bookmarks(respond(200, body)).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "http://x");
        assert_eq!(posts[0].tags, vec!["a", "b"]);
        assert_eq!(posts[0].time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(posts[0].shared);
        assert_eq!(posts[0].hash, None);
    }

    #[test]
    fn parse_post_reads_href_and_optional_fields() {
        let body = r#"<posts><post href="http://y" description="y" extended="more" hash="abc" meta="m1"
            others="4" shared="no" tag="" time="2024-05-06T07:08:09Z"/></posts>"#;
        let post = &client().parse_bookmarks(respond(200, body)).unwrap()[0];
        assert_eq!(post.url, "http://y");
        assert_eq!(post.extended, "more");
        assert!(post.tags.is_empty());
        assert_eq!(post.hash.as_deref(), Some("abc"));
        assert_eq!(post.meta.as_deref(), Some("m1"));
        assert_eq!(post.others, Some(4));
        assert!(!post.shared);
    }

    #[test]
    fn parse_post_with_bad_time_fails() {
        let body = r#"<posts><post href="http://y" time="yesterday"/></posts>"#;
        let err = client().parse_bookmarks(respond(200, body)).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_last_update() {
        let update = client()
            .parse_last_update(respond(200, r#"<update time="2024-03-04T05:06:07Z" inboxnew="1"/>"#))
            .unwrap();
        assert_eq!(update.time, Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap());
        assert_eq!(update.inbox_new, Some(1));
    }

    #[test]
    fn parse_dates_and_tags() {
        let dates = client()
            .parse_dates(respond(200, r#"<dates><date count="3" date="2024-01-02"/></dates>"#))
            .unwrap();
        assert_eq!(dates[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(dates[0].count, 3);

        let tags = client()
            .parse_tags(respond(200, r#"<tags><tag count="12" tag="rust"/><tag count="1" tag="xml"/></tags>"#))
            .unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], Tag { name: "rust".to_string(), count: 12 });
    }

    #[test]
    fn parse_tags_with_bad_count_fails() {
        let err = client()
            .parse_tags(respond(200, r#"<tags><tag count="many" tag="rust"/></tags>"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_suggest_groups_by_kind() {
        let body = "<suggest><popular>rust</popular><popular>lang</popular>\
                    <recommended>rust</recommended><network>systems</network></suggest>";
        let s = client().parse_suggest(respond(200, body)).unwrap();
        assert_eq!(s.popular, vec!["rust", "lang"]);
        assert_eq!(s.recommended, vec!["rust"]);
        assert_eq!(s.network, vec!["systems"]);
    }

    #[test]
    fn parse_bundles() {
        let body = r#"<bundles><bundle name="reading" tags="a b"/></bundles>"#;
        let bundles = client().parse_bundles(respond(200, body)).unwrap();
        assert_eq!(
            bundles,
            vec![Bundle { name: "reading".to_string(), tags: vec!["a".to_string(), "b".to_string()] }]
        );
    }

    #[test]
    fn parse_hashes_keeps_raw_attributes() {
        let body = r#"<posts><post meta="m" url="5d41402abc4b2a76b9719d911017c592"/></posts>"#;
        let hashes = client().parse_hashes(respond(200, body)).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0]["meta"], "m");
        assert_eq!(hashes[0]["url"], "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn parse_result_accepts_attribute_and_text_forms() {
        assert_eq!(client().parse_result(respond(200, r#"<result code="done"/>"#)).unwrap(), "done");
        assert_eq!(client().parse_result(respond(200, "<result>done</result>")).unwrap(), "done");
    }

    #[test]
    fn parse_result_surfaces_semantic_failure() {
        let err = client()
            .parse_result(respond(200, r#"<result code="item not found"/>"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { ref code } if code == "item not found"));
    }

    #[test]
    fn non_200_statuses_map_to_errors() {
        let err = client().parse_result(respond(500, "oops")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
        let err = client().parse_tags(respond(401, "")).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        let err = client().parse_tags(respond(503, "")).unwrap_err();
        assert!(matches!(err, ApiError::Throttled { ref url } if url == "https://api.example/v1/test"));
    }
}
