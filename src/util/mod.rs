//! Utility functions shared by the parser, fetcher and converter.
//!
//! - **Text**: single-line titles, blank-string normalization and control
//!   character removal
//! - **Languages**: language-tag matching for multi-language strings
//! - **Dates**: normalization of catalog dates to ISO-8601 UTC
//! - **URL validation**: SSRF guard for catalog URLs
//!
//! # Examples
//!
//! ```
//! use opdsview::util::{first_line, normalize_date};
//!
//! assert_eq!(first_line("Popular\n(updated daily)"), "Popular");
//! assert_eq!(
//!     normalize_date("2020-01-15").as_deref(),
//!     Some("2020-01-15T00:00:00.000Z")
//! );
//! ```

mod date;
mod lang;
mod text;
mod url_validator;

pub use date::normalize_date;
pub use lang::{language_matches, select_language};
pub use text::{first_line, non_blank, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
