//! Feed-to-view conversion.
//!
//! [`FeedViewConverter`] maps OPDS domain objects onto the flat records in
//! [`views`]. Conversion is pure: no I/O, no caching and no shared mutable
//! state, so one converter can serve any number of threads.
//!
//! # Example
//!
//! ```
//! use opdsview::convert::{FeedKind, FeedViewConverter};
//! use opdsview::opds::parse_catalog;
//!
//! let json = br#"{"metadata": {"title": "Library"},
//!                 "navigation": [{"href": "/new", "title": "New\nUpdated daily"}]}"#;
//! let feed = parse_catalog(json, None).unwrap();
//!
//! let result = FeedViewConverter::default().convert_feed_to_view(&feed).unwrap();
//! assert_eq!(result.kind, FeedKind::NavigationFeed);
//! assert_eq!(result.navigation.unwrap()[0].title, "New");
//! ```

pub mod views;

use thiserror::Error;

use crate::opds::{Contributor, Feed, FeedDocument, Link, Publication};
use crate::util::{first_line, non_blank, normalize_date, strip_control_chars};

pub use views::{CoverView, FeedDocumentView, FeedKind, FeedResult, LinkView, PublicationView};

/// Errors that can occur while converting a feed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The feed has neither a publications nor a navigation collection.
    #[error("Malformed feed \"{title}\": no publications or navigation collection")]
    MalformedFeed { title: String },
}

/// Maps OPDS domain objects to display views.
///
/// The only configuration is the language preference list used to collapse
/// multi-language titles and contributor names.
#[derive(Debug, Clone)]
pub struct FeedViewConverter {
    preferred_languages: Vec<String>,
}

impl Default for FeedViewConverter {
    fn default() -> Self {
        Self::new(vec!["en".to_string()])
    }
}

impl FeedViewConverter {
    pub fn new(preferred_languages: Vec<String>) -> Self {
        Self {
            preferred_languages,
        }
    }

    pub fn preferred_languages(&self) -> &[String] {
        &self.preferred_languages
    }

    /// Projects a stored catalog reference; every field is copied verbatim.
    pub fn convert_document_to_view(&self, document: &FeedDocument) -> FeedDocumentView {
        FeedDocumentView {
            identifier: document.identifier.clone(),
            title: document.title.clone(),
            url: document.url.clone(),
        }
    }

    pub fn convert_documents_to_view(&self, documents: &[FeedDocument]) -> Vec<FeedDocumentView> {
        documents
            .iter()
            .map(|d| self.convert_document_to_view(d))
            .collect()
    }

    /// Converts a navigation link.
    ///
    /// Only the first line of the title is kept, without control characters.
    /// A link without a title displays its href. `child_count` is the number of children when the
    /// link carries a child collection, `None` otherwise.
    pub fn convert_link_to_view(&self, link: &Link) -> LinkView {
        let title = first_line(link.title.as_deref().unwrap_or(&link.href));

        LinkView {
            title: strip_control_chars(title),
            url: link.href.clone(),
            child_count: link.children.as_ref().map(Vec::len),
        }
    }

    /// Converts a publication entry.
    ///
    /// A publication date that cannot be parsed is logged and dropped; it
    /// never fails the conversion. Control characters are removed from every
    /// displayed string.
    pub fn convert_publication_to_view(&self, publication: &Publication) -> PublicationView {
        let metadata = &publication.metadata;

        let published_at = metadata.published.as_deref().and_then(|raw| {
            let normalized = normalize_date(raw);
            if normalized.is_none() {
                tracing::warn!(
                    value = %raw,
                    identifier = metadata.identifier.as_deref().unwrap_or("unknown"),
                    "Unparseable publication date, leaving it out"
                );
            }
            normalized
        });

        let cover = publication.images.first().map(|image| CoverView {
            url: image.href.clone(),
        });

        PublicationView {
            title: strip_control_chars(&metadata.title.collapse(&self.preferred_languages)),
            authors: self.contributor_names(&metadata.author),
            publishers: self.contributor_names(&metadata.publisher),
            work_identifier: non_blank(metadata.identifier.as_deref()),
            description: non_blank(
                metadata
                    .description
                    .as_deref()
                    .map(strip_control_chars)
                    .as_deref(),
            ),
            tags: metadata
                .subject
                .iter()
                .map(|s| strip_control_chars(&s.name.collapse(&self.preferred_languages)))
                .collect(),
            languages: metadata.language.clone(),
            published_at,
            cover,
        }
    }

    /// Converts a whole catalog page.
    ///
    /// A page with a publications collection is a publication feed, even if
    /// it also carries navigation. Otherwise the navigation collection is
    /// used.
    ///
    /// # Errors
    ///
    /// [`ConvertError::MalformedFeed`] when neither collection is present.
    pub fn convert_feed_to_view(&self, feed: &Feed) -> Result<FeedResult, ConvertError> {
        let title = strip_control_chars(&feed.metadata.title.collapse(&self.preferred_languages));

        if let Some(publications) = &feed.publications {
            let publications = publications
                .iter()
                .map(|p| self.convert_publication_to_view(p))
                .collect();
            return Ok(FeedResult {
                title,
                kind: FeedKind::PublicationFeed,
                publications: Some(publications),
                navigation: None,
            });
        }

        let Some(navigation) = &feed.navigation else {
            return Err(ConvertError::MalformedFeed { title });
        };

        let navigation = navigation
            .iter()
            .map(|l| self.convert_link_to_view(l))
            .collect();
        Ok(FeedResult {
            title,
            kind: FeedKind::NavigationFeed,
            publications: None,
            navigation: Some(navigation),
        })
    }

    fn contributor_names(&self, contributors: &[Contributor]) -> Vec<String> {
        contributors
            .iter()
            .map(|c| strip_control_chars(&c.display_name(&self.preferred_languages)))
            .collect()
    }
}
