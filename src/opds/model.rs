//! OPDS catalog domain types.
//!
//! The types mirror the OPDS 2.0 JSON shapes closely enough to be
//! deserialized directly with `serde_json`; OPDS 1.x Atom catalogs are mapped
//! onto the same types by the parser. Unknown wire fields are ignored.
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::util::select_language;

// ============================================================================
// Multi-language strings
// ============================================================================

/// A string that is either plain or keyed by BCP-47 language tag.
///
/// OPDS 2 allows `"title": "Moby Dick"` as well as
/// `"title": {"en": "Moby Dick", "fr": "Moby Dick ou le Cachalot"}`.
/// Localized entries keep their source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiLangString {
    Plain(String),
    Localized(Vec<(String, String)>),
}

impl MultiLangString {
    /// Collapses the value to one display string.
    ///
    /// Plain strings are returned as-is. Localized values go through
    /// [`select_language`]; an empty language map collapses to `""`.
    pub fn collapse(&self, preferred: &[String]) -> String {
        match self {
            MultiLangString::Plain(s) => s.clone(),
            MultiLangString::Localized(entries) => select_language(entries, preferred)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

impl Default for MultiLangString {
    fn default() -> Self {
        MultiLangString::Plain(String::new())
    }
}

impl From<&str> for MultiLangString {
    fn from(s: &str) -> Self {
        MultiLangString::Plain(s.to_string())
    }
}

impl From<String> for MultiLangString {
    fn from(s: String) -> Self {
        MultiLangString::Plain(s)
    }
}

impl<'de> Deserialize<'de> for MultiLangString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MultiLangVisitor;

        impl<'de> Visitor<'de> for MultiLangVisitor {
            type Value = MultiLangString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or a map of language tags to strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(MultiLangString::Plain(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(MultiLangString::Plain(v))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((lang, value)) = map.next_entry::<String, String>()? {
                    entries.push((lang, value));
                }
                Ok(MultiLangString::Localized(entries))
            }
        }

        deserializer.deserialize_any(MultiLangVisitor)
    }
}

// ============================================================================
// Wire helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    // Many first: a derived struct would otherwise accept a JSON array as a
    // positional field list.
    Many(Vec<T>),
    One(T),
}

/// Accepts a single value, an array, or `null` (empty).
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

// ============================================================================
// Contributors and subjects
// ============================================================================

/// An author, publisher or other credited party.
///
/// Catalogs use either a bare name or a structured object; both reduce to a
/// display name through [`Contributor::display_name`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Contributor {
    PlainName(String),
    Structured(StructuredContributor),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContributor {
    pub name: MultiLangString,
    #[serde(default)]
    pub sort_as: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default, rename = "role", deserialize_with = "one_or_many")]
    pub roles: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Contributor {
    pub fn display_name(&self, preferred: &[String]) -> String {
        match self {
            Contributor::PlainName(name) => name.clone(),
            Contributor::Structured(c) => c.name.collapse(preferred),
        }
    }
}

impl From<&str> for Contributor {
    fn from(name: &str) -> Self {
        Contributor::PlainName(name.to_string())
    }
}

/// A subject classification of a publication.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "SubjectRepr")]
pub struct Subject {
    pub name: MultiLangString,
    pub sort_as: Option<String>,
    pub code: Option<String>,
    pub scheme: Option<String>,
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        Subject {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubjectRepr {
    Full {
        name: MultiLangString,
        #[serde(default, rename = "sortAs")]
        sort_as: Option<String>,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        scheme: Option<String>,
    },
    Name(String),
}

impl From<SubjectRepr> for Subject {
    fn from(repr: SubjectRepr) -> Self {
        match repr {
            SubjectRepr::Full {
                name,
                sort_as,
                code,
                scheme,
            } => Subject {
                name,
                sort_as,
                code,
                scheme,
            },
            SubjectRepr::Name(name) => Subject {
                name: MultiLangString::Plain(name),
                ..Default::default()
            },
        }
    }
}

// ============================================================================
// Links, publications and feeds
// ============================================================================

/// A link object: navigation entry, image, acquisition link, etc.
///
/// `children` is `None` when the catalog says nothing about child entries,
/// which is different from `Some(vec![])`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub rel: Vec<String>,
    #[serde(default)]
    pub children: Option<Vec<Link>>,
}

impl Link {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rel.iter().any(|r| r == rel)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PublicationMetadata {
    #[serde(default)]
    pub title: MultiLangString,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub author: Vec<Contributor>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub publisher: Vec<Contributor>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub subject: Vec<Subject>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub language: Vec<String>,
    /// Publication date exactly as the catalog wrote it.
    #[serde(default)]
    pub published: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub metadata: PublicationMetadata,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Cover images in catalog order.
    #[serde(default)]
    pub images: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FeedMetadata {
    #[serde(default)]
    pub title: MultiLangString,
}

/// One catalog page.
///
/// A page lists publications, navigation links, or (rarely) both. `None`
/// means the collection is absent from the page, not that it is empty.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub metadata: FeedMetadata,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub publications: Option<Vec<Publication>>,
    #[serde(default)]
    pub navigation: Option<Vec<Link>>,
}

// ============================================================================
// Catalog documents
// ============================================================================

/// A catalog the user knows about: a stable identifier, a title and the
/// absolute URL of the catalog root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDocument {
    pub identifier: String,
    pub title: String,
    pub url: String,
}

impl FeedDocument {
    /// Builds a document whose identifier is derived from the URL.
    ///
    /// The identifier is the hex SHA-256 of the trimmed URL, so the same
    /// catalog always gets the same identifier.
    pub fn from_url(title: &str, url: &str) -> Self {
        FeedDocument {
            identifier: identifier_for_url(url),
            title: title.to_string(),
            url: url.to_string(),
        }
    }
}

pub fn identifier_for_url(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.trim().as_bytes()))
}
