//! Records returned by the bookmarking API and the typed inputs its
//! operations accept.
//!
//! # Design
//! Wire values are strings; every field here is already coerced: counts are
//! integers, timestamps are `DateTime<Utc>`, bare dates are `NaiveDate`, tag
//! strings are split into lists. Inputs that the service accepts in several
//! shapes (dates, tag lists) are resolved into one type at this boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Wire format of every timestamp the service sends and accepts.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Wire format of bare dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A saved URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    pub url: String,
    pub description: String,
    #[serde(default)]
    pub extended: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub time: DateTime<Utc>,
    /// MD5 of the URL, as computed by the service.
    #[serde(default)]
    pub hash: Option<String>,
    /// Change-detection signature; only sent when requested with `meta`.
    #[serde(default)]
    pub meta: Option<String>,
    /// How many other users saved the same URL.
    #[serde(default)]
    pub others: Option<u32>,
    #[serde(default = "default_shared")]
    pub shared: bool,
}

fn default_shared() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub count: u32,
}

/// Number of posts saved on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// A named group of tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bundle {
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastUpdate {
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub inbox_new: Option<u32>,
}

/// Tag suggestions for a URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestions {
    pub popular: Vec<String>,
    pub recommended: Vec<String>,
    pub network: Vec<String>,
}

impl From<Suggestions> for (Vec<String>, Vec<String>, Vec<String>) {
    fn from(s: Suggestions) -> Self {
        (s.popular, s.recommended, s.network)
    }
}

/// One item of the hash manifest, attributes kept as sent
/// (`url` holds the URL's MD5, `meta` the change signature).
pub type HashEntry = BTreeMap<String, String>;

/// Filters for `posts/get`. With no date, url or hashes the service answers
/// for the most recent day that has posts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkFilter {
    pub tags: Vec<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
    pub hashes: Vec<String>,
    pub meta: bool,
}

impl BookmarkFilter {
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashes = hashes.into_iter().map(Into::into).collect();
        self
    }

    /// Ask for each post's change-detection signature.
    pub fn meta(mut self, meta: bool) -> Self {
        self.meta = meta;
        self
    }
}

/// Selection for `posts/all`. Also the key of the bookmark cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkRange {
    pub tag: Option<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub from: Option<PostTime>,
    pub to: Option<PostTime>,
    pub meta: bool,
}

/// Input for `posts/add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub url: String,
    pub description: String,
    pub extended: Option<String>,
    pub tags: Vec<String>,
    pub time: Option<PostTime>,
    /// `Some(false)` keeps an existing post for the same URL untouched.
    pub replace: Option<bool>,
    pub private: bool,
}

impl NewBookmark {
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
            extended: None,
            tags: Vec::new(),
            time: None,
            replace: None,
            private: false,
        }
    }

    pub fn extended(mut self, extended: impl Into<String>) -> Self {
        self.extended = Some(extended.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn time(mut self, time: impl Into<PostTime>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = Some(replace);
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

/// A UTC instant sent to the service as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Parsing from a string is lenient: any run of non-digits separates
/// fields, so `2005-3-31`, `2005/03/31 20:00` and the full wire format are
/// all accepted. Missing time fields default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostTime(pub DateTime<Utc>);

impl PostTime {
    pub fn to_wire(&self) -> String {
        self.0.format(TIME_FORMAT).to_string()
    }
}

impl fmt::Display for PostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<DateTime<Utc>> for PostTime {
    fn from(t: DateTime<Utc>) -> Self {
        PostTime(t)
    }
}

impl From<NaiveDateTime> for PostTime {
    fn from(t: NaiveDateTime) -> Self {
        PostTime(t.and_utc())
    }
}

impl From<NaiveDate> for PostTime {
    fn from(d: NaiveDate) -> Self {
        PostTime(d.and_time(NaiveTime::MIN).and_utc())
    }
}

impl FromStr for PostTime {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::InvalidArgument(format!("unrecognised date `{s}`"));

        let mut fields = Vec::with_capacity(6);
        for piece in s.split(|c: char| !c.is_ascii_digit()).filter(|p| !p.is_empty()) {
            fields.push(piece.parse::<u32>().map_err(|_| invalid())?);
        }
        if fields.len() < 3 || fields.len() > 6 {
            return Err(invalid());
        }
        fields.resize(6, 0);

        let year = i32::try_from(fields[0]).map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, fields[1], fields[2]).ok_or_else(invalid)?;
        let time = date.and_hms_opt(fields[3], fields[4], fields[5]).ok_or_else(invalid)?;
        Ok(PostTime(time.and_utc()))
    }
}

pub(crate) fn parse_time(value: &str) -> Result<DateTime<Utc>, ApiError> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| ApiError::DeserializationError(format!("bad timestamp `{value}`: {e}")))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ApiError::DeserializationError(format!("bad date `{value}`: {e}")))
}

/// Split a space-separated tag string, dropping empty pieces.
pub(crate) fn split_tags(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn post_time_parses_wire_format() {
        let t: PostTime = "2024-01-01T12:30:05Z".parse().unwrap();
        assert_eq!(t.0, Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 5).unwrap());
        assert_eq!(t.to_wire(), "2024-01-01T12:30:05Z");
    }

    #[test]
    fn post_time_pads_partial_dates() {
        let t: PostTime = "2005-3-31".parse().unwrap();
        assert_eq!(t.to_wire(), "2005-03-31T00:00:00Z");
        let t: PostTime = "2005-3-31T20:00".parse().unwrap();
        assert_eq!(t.to_wire(), "2005-03-31T20:00:00Z");
    }

    #[test]
    fn post_time_rejects_nonsense() {
        assert!(matches!("yesterday".parse::<PostTime>(), Err(ApiError::InvalidArgument(_))));
        assert!("2005-13-40".parse::<PostTime>().is_err());
        assert!("2005-3".parse::<PostTime>().is_err());
    }

    #[test]
    fn post_time_rejects_out_of_range_years() {
        assert!(matches!("4294967295-01-01".parse::<PostTime>(), Err(ApiError::InvalidArgument(_))));
        assert!("999999-01-01".parse::<PostTime>().is_err());
    }

    #[test]
    fn post_time_from_date_is_midnight() {
        let d = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(PostTime::from(d).to_wire(), "2020-02-29T00:00:00Z");
    }

    #[test]
    fn split_tags_drops_empty_pieces() {
        assert_eq!(split_tags("a  b "), vec!["a", "b"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn suggestions_convert_into_tuple() {
        let s = Suggestions {
            popular: vec!["a".to_string()],
            recommended: vec!["b".to_string()],
            network: Vec::new(),
        };
        let (popular, recommended, network): (Vec<String>, Vec<String>, Vec<String>) = s.into();
        assert_eq!(popular, vec!["a"]);
        assert_eq!(recommended, vec!["b"]);
        assert!(network.is_empty());
    }

    #[test]
    fn bookmark_filter_builders() {
        let filter = BookmarkFilter::default().url("http://x").hashes(["h1", "h2"]).meta(true);
        assert_eq!(filter.url.as_deref(), Some("http://x"));
        assert_eq!(filter.hashes, vec!["h1", "h2"]);
        assert!(filter.meta);
        assert!(filter.tags.is_empty());
    }

    #[test]
    fn new_bookmark_builder_defaults() {
        let b = NewBookmark::new("http://x", "d");
        assert_eq!(b.extended, None);
        assert_eq!(b.replace, None);
        assert!(!b.private);
        assert!(b.tags.is_empty());
    }
}
