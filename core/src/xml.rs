//! Wire shapes of the service's XML documents.
//!
//! Each response is a root element whose attributes carry scalars and whose
//! children enumerate collection items. The structs below mirror that layout
//! field for field (`@name` for an attribute, `$text` for element text) and
//! are read with `quick_xml::de`. The client converts them into the public
//! records in `types`, which is where timestamps and tag lists get parsed.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ApiError;
use crate::types::{
    parse_date, parse_time, split_tags, Bookmark, Bundle, DateCount, HashEntry, LastUpdate, Suggestions,
    Tag,
};

/// Deserialize a response body into one of the wire structs.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    quick_xml::de::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// `<update time=".." inboxnew=".."/>`
#[derive(Debug, Deserialize)]
pub(crate) struct UpdateXml {
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@inboxnew", default)]
    inbox_new: Option<u32>,
}

impl TryFrom<UpdateXml> for LastUpdate {
    type Error = ApiError;

    fn try_from(xml: UpdateXml) -> Result<Self, Self::Error> {
        Ok(LastUpdate {
            time: parse_time(&xml.time)?,
            inbox_new: xml.inbox_new,
        })
    }
}

/// `<posts>` as answered by `posts/recent`, `posts/get` and `posts/all`.
#[derive(Debug, Deserialize)]
pub(crate) struct PostsXml {
    #[serde(rename = "post", default)]
    pub(crate) posts: Vec<PostXml>,
}

/// One `<post>`. `posts/all` names the link `href`, older answers `url`.
#[derive(Debug, Deserialize)]
pub(crate) struct PostXml {
    #[serde(rename = "@href", default)]
    href: Option<String>,
    #[serde(rename = "@url", default)]
    url: Option<String>,
    #[serde(rename = "@description", default)]
    description: String,
    #[serde(rename = "@extended", default)]
    extended: String,
    #[serde(rename = "@tag", default)]
    tag: String,
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@hash", default)]
    hash: Option<String>,
    #[serde(rename = "@meta", default)]
    meta: Option<String>,
    #[serde(rename = "@others", default)]
    others: Option<u32>,
    #[serde(rename = "@shared", default)]
    shared: Option<String>,
}

impl TryFrom<PostXml> for Bookmark {
    type Error = ApiError;

    fn try_from(xml: PostXml) -> Result<Self, Self::Error> {
        let url = xml
            .href
            .or(xml.url)
            .ok_or_else(|| ApiError::DeserializationError("<post> has neither `href` nor `url`".to_string()))?;
        Ok(Bookmark {
            url,
            description: xml.description,
            extended: xml.extended,
            tags: split_tags(&xml.tag),
            time: parse_time(&xml.time)?,
            hash: xml.hash,
            meta: xml.meta,
            others: xml.others,
            shared: xml.shared.as_deref() != Some("no"),
        })
    }
}

/// `<posts>` as answered by `posts/all?hashes`: every attribute kept as is.
#[derive(Debug, Deserialize)]
pub(crate) struct HashesXml {
    #[serde(rename = "post", default)]
    posts: Vec<BTreeMap<String, String>>,
}

impl From<HashesXml> for Vec<HashEntry> {
    fn from(xml: HashesXml) -> Self {
        xml.posts
            .into_iter()
            .map(|post| {
                post.into_iter()
                    .map(|(k, v)| (k.strip_prefix('@').map(str::to_string).unwrap_or(k), v))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DatesXml {
    #[serde(rename = "date", default)]
    dates: Vec<DateXml>,
}

#[derive(Debug, Deserialize)]
struct DateXml {
    #[serde(rename = "@date")]
    date: String,
    #[serde(rename = "@count")]
    count: u32,
}

impl TryFrom<DatesXml> for Vec<DateCount> {
    type Error = ApiError;

    fn try_from(xml: DatesXml) -> Result<Self, Self::Error> {
        xml.dates
            .into_iter()
            .map(|d| {
                Ok(DateCount {
                    date: parse_date(&d.date)?,
                    count: d.count,
                })
            })
            .collect()
    }
}

/// `<suggest>` with one text element per suggested tag.
#[derive(Debug, Deserialize)]
pub(crate) struct SuggestXml {
    #[serde(default)]
    popular: Vec<String>,
    #[serde(default)]
    recommended: Vec<String>,
    #[serde(default)]
    network: Vec<String>,
}

impl From<SuggestXml> for Suggestions {
    fn from(xml: SuggestXml) -> Self {
        let clean = |tags: Vec<String>| -> Vec<String> {
            tags.into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Suggestions {
            popular: clean(xml.popular),
            recommended: clean(xml.recommended),
            network: clean(xml.network),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsXml {
    #[serde(rename = "tag", default)]
    tags: Vec<TagXml>,
}

#[derive(Debug, Deserialize)]
struct TagXml {
    #[serde(rename = "@tag")]
    name: String,
    #[serde(rename = "@count")]
    count: u32,
}

impl From<TagsXml> for Vec<Tag> {
    fn from(xml: TagsXml) -> Self {
        xml.tags
            .into_iter()
            .map(|t| Tag {
                name: t.name,
                count: t.count,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BundlesXml {
    #[serde(rename = "bundle", default)]
    bundles: Vec<BundleXml>,
}

#[derive(Debug, Deserialize)]
struct BundleXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@tags", default)]
    tags: String,
}

impl From<BundlesXml> for Vec<Bundle> {
    fn from(xml: BundlesXml) -> Self {
        xml.bundles
            .into_iter()
            .map(|b| Bundle {
                tags: split_tags(&b.tags),
                name: b.name,
            })
            .collect()
    }
}

/// Status of a mutating call, sent either as `<result code=".."/>` or as
/// `<result>..</result>`.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultXml {
    #[serde(rename = "@code", default)]
    code: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

impl ResultXml {
    pub(crate) fn status(self) -> String {
        self.code
            .or(self.text)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}
