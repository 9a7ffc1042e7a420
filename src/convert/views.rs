//! Display-ready view records.
//!
//! Views are flat, owned and serializable. Optional scalars serialize as
//! `null` when absent so consumers can tell "absent" from "empty"; list
//! fields are always present.
use serde::Serialize;

/// Projection of a [`FeedDocument`](crate::opds::FeedDocument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedDocumentView {
    pub identifier: String,
    pub title: String,
    pub url: String,
}

/// A navigation entry with a single-line title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub title: String,
    pub url: String,
    /// `None` when the catalog gives no child collection; `Some(0)` when it
    /// gives an empty one.
    pub child_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverView {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationView {
    pub title: String,
    pub authors: Vec<String>,
    pub publishers: Vec<String>,
    pub work_identifier: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub languages: Vec<String>,
    /// ISO-8601 UTC, millisecond precision.
    pub published_at: Option<String>,
    pub cover: Option<CoverView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedKind {
    NavigationFeed,
    PublicationFeed,
}

/// A converted catalog page. Exactly one of `publications` and `navigation`
/// is `Some`, matching `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedResult {
    pub title: String,
    pub kind: FeedKind,
    pub publications: Option<Vec<PublicationView>>,
    pub navigation: Option<Vec<LinkView>>,
}
