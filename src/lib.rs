//! OPDS catalog conversion.
//!
//! Turns OPDS catalog feeds (OPDS 2.0 JSON or OPDS 1.x Atom) into flattened
//! view records that a presentation layer can render directly.
//!
//! - [`opds`] - domain model, parsing and HTTP retrieval of catalogs
//! - [`convert`] - the pure feed-to-view mapping layer
//! - [`util`] - text, language, date and URL helpers shared by both
//! - [`config`] - optional `config.toml` support

pub mod config;
pub mod convert;
pub mod opds;
pub mod util;
