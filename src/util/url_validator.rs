use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur while validating a catalog URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private or link-local address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(IpAddr),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a catalog URL before it is fetched.
///
/// Only `http` and `https` are accepted. Unless `allow_private_hosts` is set,
/// localhost, loopback, private (RFC 1918), link-local, unspecified and IPv6
/// unique-local addresses are rejected so that a catalog cannot point the
/// fetcher at the local network. Self-hosted catalog servers on a LAN need
/// `allow_private_hosts = true` in the config file.
///
/// # Examples
///
/// ```
/// use opdsview::util::validate_url;
///
/// assert!(validate_url("https://catalog.example.org/opds", false).is_ok());
/// assert!(validate_url("http://192.168.1.20:8080/opds", false).is_err());
/// assert!(validate_url("http://192.168.1.20:8080/opds", true).is_ok());
/// assert!(validate_url("file:///etc/passwd", true).is_err());
/// ```
pub fn validate_url(url_str: &str, allow_private_hosts: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if allow_private_hosts {
        return Ok(url);
    }

    let ip = match url.host() {
        Some(Host::Domain(domain)) => {
            if domain.eq_ignore_ascii_case("localhost") {
                return Err(UrlValidationError::Localhost);
            }
            None
        }
        Some(Host::Ipv4(v4)) => Some(IpAddr::V4(v4)),
        // ::ffff:a.b.c.d reaches the IPv4 host, so judge it as one
        Some(Host::Ipv6(v6)) => Some(match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }),
        None => None,
    };

    if let Some(ip) = ip {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
