//! Synchronous client for the del.icio.us v1 bookmarking API.
//!
//! # Overview
//! `Account` is the entry point: one method per API operation, each a single
//! authenticated GET whose XML answer is turned into typed records.
//!
//! # Design
//! - `DeliciousClient` is stateless and does no I/O: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`.
//! - `Transport` executes requests; `UreqTransport` is the blocking default.
//! - `Account` pairs the two with request pacing and an in-memory cache of
//!   the last `bookmarks` result.
//! - Every failure is an `ApiError`, including a 200 answer whose status
//!   string is not `done`.
//!
//! ```no_run
//! use delicious_core::{connect, NewBookmark};
//!
//! let mut account = connect("alice", "secret");
//! account.add(&NewBookmark::new("https://www.rust-lang.org/", "Rust").tags(["rust", "lang"]))?;
//! for post in account.recent_bookmarks(Some(5), None)? {
//!     println!("{} {:?}", post.url, post.tags);
//! }
//! # Ok::<(), delicious_core::ApiError>(())
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;
pub mod xml;

pub use account::{connect, Account};
pub use client::DeliciousClient;
pub use config::AccountConfig;
pub use error::ApiError;
pub use http::{HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{
    Bookmark, BookmarkFilter, BookmarkRange, Bundle, DateCount, HashEntry, LastUpdate, NewBookmark, PostTime,
    Suggestions, Tag,
};
