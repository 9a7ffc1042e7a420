use feed_rs::model as atom;
use thiserror::Error;
use url::Url;

use crate::opds::model::{
    Contributor, Feed, FeedMetadata, Link, MultiLangString, Publication, PublicationMetadata,
    Subject,
};

const ACQUISITION_REL_PREFIX: &str = "http://opds-spec.org/acquisition";
const IMAGE_RELS: &[&str] = &[
    "http://opds-spec.org/image",
    "http://opds-spec.org/image/thumbnail",
    "http://opds-spec.org/cover",
    "http://opds-spec.org/thumbnail",
];

/// Errors that can occur while parsing a catalog document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document contained nothing but whitespace.
    #[error("Catalog document is empty")]
    Empty,
    /// The document is neither JSON nor XML.
    #[error("Unrecognized catalog format (expected OPDS 2 JSON or OPDS 1 Atom)")]
    UnknownFormat,
    /// OPDS 2 JSON did not match the expected shape.
    #[error("Invalid OPDS 2 document: {0}")]
    Json(#[from] serde_json::Error),
    /// OPDS 1 Atom could not be parsed.
    #[error("Invalid OPDS 1 document: {0}")]
    Atom(String),
}

/// Catalog encodings recognized by [`parse_catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// OPDS 2.0, JSON
    Json,
    /// OPDS 1.x, Atom XML
    Atom,
}

/// Sniffs the catalog encoding from the first significant byte.
pub fn detect_format(bytes: &[u8]) -> Result<CatalogFormat, ParseError> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        None => Err(ParseError::Empty),
        Some(b'{') => Ok(CatalogFormat::Json),
        Some(b'<') => Ok(CatalogFormat::Atom),
        Some(_) => Err(ParseError::UnknownFormat),
    }
}

/// Parses an OPDS catalog page into a [`Feed`].
///
/// Both OPDS 2.0 JSON and OPDS 1.x Atom are accepted; the format is sniffed
/// from the content rather than trusted from a Content-Type header, since
/// catalog servers frequently mislabel their responses.
///
/// When `base_url` is given, relative hrefs are resolved against it so that
/// the resulting links can be followed without knowing where the page came
/// from.
///
/// # Errors
///
/// - [`ParseError::Empty`] - blank input
/// - [`ParseError::UnknownFormat`] - neither JSON nor XML
/// - [`ParseError::Json`] / [`ParseError::Atom`] - malformed document
pub fn parse_catalog(bytes: &[u8], base_url: Option<&Url>) -> Result<Feed, ParseError> {
    let mut feed = match detect_format(bytes)? {
        CatalogFormat::Json => {
            let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            serde_json::from_slice::<Feed>(body)?
        }
        CatalogFormat::Atom => parse_atom(bytes)?,
    };

    if let Some(base) = base_url {
        resolve_hrefs(&mut feed, base);
    }

    tracing::debug!(
        publications = feed.publications.as_ref().map(Vec::len),
        navigation = feed.navigation.as_ref().map(Vec::len),
        "Parsed catalog page"
    );

    Ok(feed)
}

// ============================================================================
// OPDS 1 (Atom)
// ============================================================================

fn parse_atom(bytes: &[u8]) -> Result<Feed, ParseError> {
    let doc = feed_rs::parser::parse(bytes).map_err(|e| ParseError::Atom(e.to_string()))?;

    let language = doc.language.clone();
    let mut publications = Vec::new();
    let mut navigation = Vec::new();

    for entry in doc.entries {
        if is_acquisition_entry(&entry) {
            publications.push(atom_entry_to_publication(entry, language.as_deref()));
        } else if let Some(link) = atom_entry_to_navigation(entry) {
            navigation.push(link);
        }
    }

    let links: Vec<Link> = doc.links.into_iter().map(atom_link).collect();

    // An empty page still declares what it is through its own links
    let declared = declared_kind(&links);
    let publications = (!publications.is_empty() || declared == Some(AtomKind::Acquisition))
        .then_some(publications);
    let navigation = (!navigation.is_empty() || declared == Some(AtomKind::Navigation))
        .then_some(navigation);

    Ok(Feed {
        metadata: FeedMetadata {
            title: doc
                .title
                .map(|t| MultiLangString::Plain(t.content))
                .unwrap_or_default(),
        },
        links,
        publications,
        navigation,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomKind {
    Acquisition,
    Navigation,
}

/// Reads `kind=acquisition` / `kind=navigation` from the type of the feed's
/// `self` link. Other feed-level links describe other pages.
fn declared_kind(links: &[Link]) -> Option<AtomKind> {
    let media_type = links
        .iter()
        .find(|l| l.has_rel("self"))?
        .media_type
        .as_deref()?
        .to_ascii_lowercase();
    if !media_type.contains("profile=opds-catalog") {
        return None;
    }
    media_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("kind="))
        .find_map(|kind| match kind.trim_matches('"') {
            "acquisition" => Some(AtomKind::Acquisition),
            "navigation" => Some(AtomKind::Navigation),
            _ => None,
        })
}

fn is_acquisition_entry(entry: &atom::Entry) -> bool {
    entry.links.iter().any(|l| {
        l.rel
            .as_deref()
            .is_some_and(|rel| rel.starts_with(ACQUISITION_REL_PREFIX))
    })
}

fn atom_link(link: atom::Link) -> Link {
    Link {
        href: link.href,
        title: link.title,
        media_type: link.media_type,
        rel: link.rel.into_iter().collect(),
        children: None,
    }
}

fn atom_entry_to_navigation(entry: atom::Entry) -> Option<Link> {
    let title = entry.title.map(|t| t.content);
    let target = entry
        .links
        .iter()
        .position(|l| {
            l.media_type
                .as_deref()
                .is_some_and(|t| t.contains("opds-catalog"))
        })
        .unwrap_or(0);

    let Some(link) = entry.links.into_iter().nth(target) else {
        tracing::debug!(id = %entry.id, "Skipping navigation entry without links");
        return None;
    };

    Some(Link {
        title: title.or(link.title.clone()),
        ..atom_link(link)
    })
}

fn atom_entry_to_publication(entry: atom::Entry, feed_language: Option<&str>) -> Publication {
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body));

    // <updated> is the entry's modification time, not a publication date
    let published = entry.published.map(|dt| dt.to_rfc3339());

    let subject = entry
        .categories
        .into_iter()
        .map(|c| Subject {
            name: MultiLangString::Plain(c.label.unwrap_or(c.term)),
            scheme: c.scheme,
            ..Default::default()
        })
        .collect();

    let (images, links): (Vec<Link>, Vec<Link>) = entry
        .links
        .into_iter()
        .map(atom_link)
        .partition(|l| IMAGE_RELS.iter().any(|rel| l.has_rel(rel)));

    Publication {
        metadata: PublicationMetadata {
            title: entry
                .title
                .map(|t| MultiLangString::Plain(t.content))
                .unwrap_or_default(),
            identifier: (!entry.id.is_empty()).then_some(entry.id),
            description,
            author: entry
                .authors
                .into_iter()
                .map(|p| Contributor::PlainName(p.name))
                .collect(),
            publisher: Vec::new(),
            subject,
            language: feed_language.map(str::to_string).into_iter().collect(),
            published,
        },
        links,
        images,
    }
}

// ============================================================================
// Relative href resolution
// ============================================================================

fn resolve_hrefs(feed: &mut Feed, base: &Url) {
    feed.links.iter_mut().for_each(|l| resolve_link(l, base));

    if let Some(navigation) = feed.navigation.as_mut() {
        navigation.iter_mut().for_each(|l| resolve_link(l, base));
    }

    if let Some(publications) = feed.publications.as_mut() {
        for publication in publications {
            publication
                .links
                .iter_mut()
                .chain(publication.images.iter_mut())
                .for_each(|l| resolve_link(l, base));
        }
    }
}

fn resolve_link(link: &mut Link, base: &Url) {
    if let Some(resolved) = resolve_href(&link.href, base) {
        link.href = resolved;
    }
    if let Some(children) = link.children.as_mut() {
        children.iter_mut().for_each(|c| resolve_link(c, base));
    }
}

/// Returns the absolute form of a relative href. Absolute and empty hrefs
/// are left alone, as are hrefs that cannot be joined.
fn resolve_href(href: &str, base: &Url) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base.join(href) {
            Ok(joined) => Some(joined.to_string()),
            Err(e) => {
                tracing::debug!(href = %href, error = %e, "Could not resolve relative href");
                None
            }
        },
        Err(e) => {
            tracing::debug!(href = %href, error = %e, "Unparseable href left unchanged");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NAVIGATION_JSON: &str = r#"{
        "metadata": {"title": "Example Library"},
        "links": [{"rel": "self", "href": "/opds", "type": "application/opds+json"}],
        "navigation": [
            {"href": "/new", "title": "New Publications", "type": "application/opds+json"},
            {"href": "https://other.example.com/popular", "title": "Popular"}
        ]
    }"#;

    const ATOM_NAVIGATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:uuid:root</id>
  <title>Atom Library</title>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <id>urn:uuid:fiction</id>
    <title>Fiction
Browse novels</title>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="subsection" href="fiction.xml" type="application/atom+xml;profile=opds-catalog;kind=acquisition"/>
  </entry>
  <entry>
    <id>urn:uuid:empty</id>
    <title>No links here</title>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

    const ATOM_ACQUISITION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:uuid:books</id>
  <title>Atom Books</title>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <id>urn:isbn:9780141439518</id>
    <title>Pride and Prejudice</title>
    <author><name>Jane Austen</name></author>
    <published>1813-01-28T00:00:00Z</published>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>A novel of manners.</summary>
    <category term="FIC004000" label="Classics"/>
    <category term="Romance"/>
    <link rel="http://opds-spec.org/image" href="/covers/pp.jpg" type="image/jpeg"/>
    <link rel="http://opds-spec.org/image/thumbnail" href="/covers/pp-small.jpg" type="image/jpeg"/>
    <link rel="http://opds-spec.org/acquisition/open-access" href="/books/pp.epub" type="application/epub+zip"/>
  </entry>
</feed>"#;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"  {\"a\":1}").unwrap(), CatalogFormat::Json);
        assert_eq!(detect_format(b"\n<feed/>").unwrap(), CatalogFormat::Atom);
        assert_eq!(
            detect_format(b"\xEF\xBB\xBF{}").unwrap(),
            CatalogFormat::Json
        );
        assert!(matches!(detect_format(b"   "), Err(ParseError::Empty)));
        assert!(matches!(detect_format(b""), Err(ParseError::Empty)));
        assert!(matches!(
            detect_format(b"hello"),
            Err(ParseError::UnknownFormat)
        ));
    }

    #[test]
    fn test_parse_json_navigation_feed() {
        let feed = parse_catalog(NAVIGATION_JSON.as_bytes(), None).unwrap();
        assert_eq!(feed.metadata.title, MultiLangString::Plain("Example Library".into()));
        assert!(feed.publications.is_none());
        let navigation = feed.navigation.unwrap();
        assert_eq!(navigation.len(), 2);
        assert_eq!(navigation[0].href, "/new");
        assert_eq!(navigation[0].title.as_deref(), Some("New Publications"));
    }

    #[test]
    fn test_parse_json_resolves_relative_hrefs() {
        let base = Url::parse("https://library.example.com/opds/root.json").unwrap();
        let feed = parse_catalog(NAVIGATION_JSON.as_bytes(), Some(&base)).unwrap();
        let navigation = feed.navigation.unwrap();
        assert_eq!(navigation[0].href, "https://library.example.com/new");
        // Absolute hrefs are kept byte-for-byte
        assert_eq!(navigation[1].href, "https://other.example.com/popular");
        assert_eq!(feed.links[0].href, "https://library.example.com/opds");
    }

    #[test]
    fn test_parse_json_resolves_publication_images_and_children() {
        let json = r#"{
            "metadata": {"title": "Shelf"},
            "navigation": [{"href": "a/", "title": "A", "children": [{"href": "b", "title": "B"}]}],
            "publications": [{
                "metadata": {"title": "Book"},
                "links": [{"href": "book.epub", "rel": "http://opds-spec.org/acquisition"}],
                "images": [{"href": "cover.jpg"}]
            }]
        }"#;
        let base = Url::parse("https://example.com/catalog/").unwrap();
        let feed = parse_catalog(json.as_bytes(), Some(&base)).unwrap();

        let navigation = feed.navigation.unwrap();
        let child = &navigation[0].children.as_ref().unwrap()[0];
        assert_eq!(child.href, "https://example.com/catalog/b");

        let publication = &feed.publications.unwrap()[0];
        assert_eq!(publication.links[0].href, "https://example.com/catalog/book.epub");
        assert_eq!(publication.images[0].href, "https://example.com/catalog/cover.jpg");
    }

    #[test]
    fn test_parse_json_invalid_shape() {
        let result = parse_catalog(br#"{"metadata": {"title": 42}}"#, None);
        assert!(matches!(result, Err(ParseError::Json(_))));
    }

    #[test]
    fn test_parse_json_truncated() {
        let result = parse_catalog(br#"{"metadata": {"title": "x""#, None);
        assert!(matches!(result, Err(ParseError::Json(_))));
    }

    #[test]
    fn test_parse_atom_navigation_feed() {
        let base = Url::parse("https://atom.example.com/opds/root.xml").unwrap();
        let feed = parse_catalog(ATOM_NAVIGATION.as_bytes(), Some(&base)).unwrap();

        assert_eq!(feed.metadata.title, MultiLangString::Plain("Atom Library".into()));
        assert!(feed.publications.is_none());

        let navigation = feed.navigation.unwrap();
        // The entry without links is skipped
        assert_eq!(navigation.len(), 1);
        assert_eq!(navigation[0].href, "https://atom.example.com/opds/fiction.xml");
        assert!(navigation[0].title.as_deref().unwrap().starts_with("Fiction"));
        assert_eq!(navigation[0].children, None);
    }

    #[test]
    fn test_parse_atom_acquisition_feed() {
        let feed = parse_catalog(ATOM_ACQUISITION.as_bytes(), None).unwrap();
        assert!(feed.navigation.is_none());

        let publications = feed.publications.unwrap();
        assert_eq!(publications.len(), 1);
        let publication = &publications[0];
        let metadata = &publication.metadata;

        assert_eq!(metadata.title, MultiLangString::Plain("Pride and Prejudice".into()));
        assert_eq!(metadata.identifier.as_deref(), Some("urn:isbn:9780141439518"));
        assert_eq!(metadata.author, vec![Contributor::from("Jane Austen")]);
        assert_eq!(metadata.description.as_deref(), Some("A novel of manners."));
        assert_eq!(metadata.subject[0].name, MultiLangString::Plain("Classics".into()));
        assert_eq!(metadata.subject[1].name, MultiLangString::Plain("Romance".into()));
        assert!(metadata.published.as_deref().unwrap().starts_with("1813-01-28"));

        assert_eq!(publication.images.len(), 2);
        assert_eq!(publication.images[0].href, "/covers/pp.jpg");
        assert_eq!(publication.links.len(), 1);
        assert_eq!(publication.links[0].href, "/books/pp.epub");
    }

    #[test]
    fn test_parse_atom_updated_is_not_publication_date() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:uuid:books</id>
  <title>Recently Added</title>
  <updated>2024-03-05T10:00:00Z</updated>
  <entry>
    <id>urn:uuid:undated</id>
    <title>Undated Book</title>
    <updated>2024-03-05T10:00:00Z</updated>
    <link rel="http://opds-spec.org/acquisition" href="/books/undated.epub" type="application/epub+zip"/>
  </entry>
</feed>"#;
        let feed = parse_catalog(atom.as_bytes(), None).unwrap();
        let publication = &feed.publications.unwrap()[0];
        assert_eq!(publication.metadata.published, None);
    }

    fn empty_atom_page(title: &str, self_type: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:uuid:empty-page</id>
  <title>{title}</title>
  <updated>2024-01-01T00:00:00Z</updated>
  <link rel="self" href="/opds/page.xml" type="{self_type}"/>
  <link rel="start" href="/opds/root.xml" type="application/atom+xml;profile=opds-catalog;kind=navigation"/>
</feed>"#
        )
    }

    #[test]
    fn test_parse_atom_empty_acquisition_page() {
        let atom = empty_atom_page(
            "Search results",
            "application/atom+xml;profile=opds-catalog;kind=acquisition",
        );
        let feed = parse_catalog(atom.as_bytes(), None).unwrap();
        assert_eq!(feed.publications, Some(Vec::new()));
        assert_eq!(feed.navigation, None);
    }

    #[test]
    fn test_parse_atom_empty_navigation_page() {
        let atom = empty_atom_page(
            "Shelves",
            "application/atom+xml; profile=opds-catalog; kind=navigation",
        );
        let feed = parse_catalog(atom.as_bytes(), None).unwrap();
        assert_eq!(feed.publications, None);
        assert_eq!(feed.navigation, Some(Vec::new()));
    }

    #[test]
    fn test_parse_atom_empty_page_without_kind() {
        // Only the start link names a kind, and it describes another page
        let atom = empty_atom_page("Nothing", "application/atom+xml");
        let feed = parse_catalog(atom.as_bytes(), None).unwrap();
        assert_eq!(feed.publications, None);
        assert_eq!(feed.navigation, None);
    }

    #[test]
    fn test_parse_atom_malformed() {
        let result = parse_catalog(b"<html><body>Not a catalog</body></html>", None);
        assert!(matches!(result, Err(ParseError::Atom(_))));
    }
}
