//! OPDS catalog model, parsing and retrieval.
//!
//! - [`model`] - domain types shared by both OPDS versions
//! - [`parser`] - OPDS 2 JSON / OPDS 1 Atom parsing with href resolution
//! - [`fetcher`] - HTTP retrieval with timeouts, retries and size limits
//!
//! # Example
//!
//! ```ignore
//! use opdsview::opds::{fetch_feed, FetchOptions};
//!
//! let client = reqwest::Client::new();
//! let feed = fetch_feed(&client, "https://catalog.example.org/opds", &FetchOptions::default()).await?;
//! ```

pub mod fetcher;
pub mod model;
pub mod parser;

pub use fetcher::{fetch_catalog, fetch_feed, FetchError, FetchOptions, FetchedCatalog};
pub use model::{
    identifier_for_url, Contributor, Feed, FeedDocument, FeedMetadata, Link, MultiLangString,
    Publication, PublicationMetadata, StructuredContributor, Subject,
};
pub use parser::{detect_format, parse_catalog, CatalogFormat, ParseError};
