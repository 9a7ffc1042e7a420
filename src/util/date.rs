use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive date-time layouts seen in catalogs. Values without an offset are
/// taken as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Normalizes a catalog date to ISO-8601 UTC with millisecond precision.
///
/// Accepted inputs, tried in order:
/// - RFC 3339 with any offset (converted to UTC)
/// - RFC 2822 (some OPDS 1 servers emit it)
/// - naive date-times, treated as UTC
/// - `YYYY-MM-DD`, `YYYY-MM` and `YYYY`, at midnight UTC on the first day
///
/// Returns `None` for blank or unparseable input. Callers decide whether
/// that is worth reporting.
///
/// # Examples
///
/// ```
/// use opdsview::util::normalize_date;
///
/// assert_eq!(
///     normalize_date("2020-01-15T10:30:00+02:00").as_deref(),
///     Some("2020-01-15T08:30:00.000Z")
/// );
/// assert_eq!(normalize_date("1999").as_deref(), Some("1999-01-01T00:00:00.000Z"));
/// assert_eq!(normalize_date("sometime in spring"), None);
/// ```
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw.trim()).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    parse_partial_date(s)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }

    // Year-month: NaiveDate needs a day to parse
    if s.len() == 7 && s.as_bytes().get(4) == Some(&b'-') {
        return NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok();
    }

    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year: i32 = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_only() {
        assert_eq!(
            normalize_date("2020-01-15").as_deref(),
            Some("2020-01-15T00:00:00.000Z")
        );
    }

    #[test]
    fn test_rfc3339_utc() {
        assert_eq!(
            normalize_date("2018-09-02T14:05:00Z").as_deref(),
            Some("2018-09-02T14:05:00.000Z")
        );
    }

    #[test]
    fn test_rfc3339_offset_converted_to_utc() {
        assert_eq!(
            normalize_date("2020-01-01T01:00:00+03:00").as_deref(),
            Some("2019-12-31T22:00:00.000Z")
        );
    }

    #[test]
    fn test_fractional_seconds_truncated_to_millis() {
        assert_eq!(
            normalize_date("2021-06-30T12:00:00.123456Z").as_deref(),
            Some("2021-06-30T12:00:00.123Z")
        );
    }

    #[test]
    fn test_rfc2822() {
        assert_eq!(
            normalize_date("Tue, 1 Jul 2003 10:52:37 +0200").as_deref(),
            Some("2003-07-01T08:52:37.000Z")
        );
    }

    #[test]
    fn test_naive_datetime_taken_as_utc() {
        assert_eq!(
            normalize_date("2015-03-04T05:06:07").as_deref(),
            Some("2015-03-04T05:06:07.000Z")
        );
        assert_eq!(
            normalize_date("2015-03-04 05:06:07").as_deref(),
            Some("2015-03-04T05:06:07.000Z")
        );
    }

    #[test]
    fn test_partial_dates() {
        assert_eq!(
            normalize_date("2011-05").as_deref(),
            Some("2011-05-01T00:00:00.000Z")
        );
        assert_eq!(
            normalize_date("1884").as_deref(),
            Some("1884-01-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(
            normalize_date("  2020-01-15\n").as_deref(),
            Some("2020-01-15T00:00:00.000Z")
        );
    }

    #[test]
    fn test_unparseable_dates() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("   "), None);
        assert_eq!(normalize_date("not a date"), None);
        assert_eq!(normalize_date("2020-13-45"), None);
        assert_eq!(normalize_date("2011-5x"), None);
    }
}
