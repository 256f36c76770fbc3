//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, the expected request (endpoint path and
//! ordered query pairs), a simulated response, and either the expected parse
//! result or the name of the expected error variant. Results are compared as
//! typed records deserialized from the vector, not as raw strings.

use chrono::NaiveDate;
use delicious_core::{
    ApiError, Bookmark, BookmarkFilter, Bundle, DateCount, DeliciousClient, HttpRequest, HttpResponse,
    NewBookmark, PostTime, Tag,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

const BASE_URL: &str = "http://localhost:3000/v1";

fn client() -> DeliciousClient {
    DeliciousClient::new(BASE_URL, "user", "pass", "vectors")
}

fn load(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

/// Check endpoint, query pairs and the headers every request carries.
fn assert_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(
        req.url,
        format!("{BASE_URL}{}", expected["path"].as_str().unwrap()),
        "{name}: url"
    );
    let expected_query: Vec<(String, String)> = expected["query"]
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect();
    assert_eq!(req.query, expected_query, "{name}: query");
    assert!(
        req.headers
            .contains(&("Authorization".to_string(), "Basic dXNlcjpwYXNz".to_string())),
        "{name}: authorization header"
    );
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        url: String::new(),
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

fn variant(err: &ApiError) -> &'static str {
    match err {
        ApiError::Transport(_) => "Transport",
        ApiError::Unauthorized => "Unauthorized",
        ApiError::Throttled { .. } => "Throttled",
        ApiError::HttpError { .. } => "HttpError",
        ApiError::Rejected { .. } => "Rejected",
        ApiError::DeserializationError(_) => "DeserializationError",
        ApiError::InvalidArgument(_) => "InvalidArgument",
    }
}

/// Compare a parse outcome with the case's `expected_result` or `expected_error`.
fn assert_outcome<T>(name: &str, case: &Value, outcome: Result<T, ApiError>)
where
    T: DeserializeOwned + PartialEq + std::fmt::Debug,
{
    match case.get("expected_error") {
        Some(expected) => {
            let err = outcome.expect_err(name);
            assert_eq!(variant(&err), expected.as_str().unwrap(), "{name}: error {err}");
        }
        None => {
            let expected: T = serde_json::from_value(case["expected_result"].clone()).unwrap();
            assert_eq!(outcome.unwrap(), expected, "{name}: parsed result");
        }
    }
}

fn opt_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn str_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().map(|v| v.as_str().unwrap().to_string()).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[test]
fn recent_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/recent.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let count = input["count"].as_u64().map(|n| n as u32);

        let req = c.build_recent_bookmarks(count, opt_str(&input["tag"]));
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Vec<Bookmark>>(name, &case, c.parse_bookmarks(simulated(&case)));
    }
}

#[test]
fn get_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/get.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let filter = BookmarkFilter {
            tags: str_list(&input["tags"]),
            date: opt_str(&input["date"]).map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            url: opt_str(&input["url"]).map(str::to_string),
            hashes: str_list(&input["hashes"]),
            meta: input["meta"].as_bool().unwrap(),
        };

        let req = c.build_bookmark(&filter);
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Vec<Bookmark>>(name, &case, c.parse_bookmarks(simulated(&case)));
    }
}

#[test]
fn add_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/add.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let mut bookmark = NewBookmark::new(
            input["url"].as_str().unwrap(),
            input["description"].as_str().unwrap(),
        )
        .tags(str_list(&input["tags"]));
        if let Some(extended) = opt_str(&input["extended"]) {
            bookmark = bookmark.extended(extended);
        }
        if let Some(time) = opt_str(&input["time"]) {
            bookmark = bookmark.time(time.parse::<PostTime>().unwrap());
        }
        if let Some(replace) = input["replace"].as_bool() {
            bookmark = bookmark.replace(replace);
        }
        if let Some(private) = input["private"].as_bool() {
            bookmark = bookmark.private(private);
        }

        let req = c.build_add(&bookmark).unwrap();
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<String>(name, &case, c.parse_result(simulated(&case)));
    }
}

#[test]
fn dates_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/dates.json")) {
        let name = case["name"].as_str().unwrap();

        let req = c.build_dates(opt_str(&case["input"]["tag"]));
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Vec<DateCount>>(name, &case, c.parse_dates(simulated(&case)));
    }
}

// ---------------------------------------------------------------------------
// Tags and bundles
// ---------------------------------------------------------------------------

#[test]
fn tags_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/tags.json")) {
        let name = case["name"].as_str().unwrap();

        let req = c.build_tags();
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Vec<Tag>>(name, &case, c.parse_tags(simulated(&case)));
    }
}

#[test]
fn bundles_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/bundles.json")) {
        let name = case["name"].as_str().unwrap();

        let req = c.build_bundles(opt_str(&case["input"]["name"]));
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Vec<Bundle>>(name, &case, c.parse_bundles(simulated(&case)));
    }
}
