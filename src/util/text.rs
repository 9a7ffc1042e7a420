/// Returns the part of `s` before the first line break.
///
/// Catalog providers sometimes put a subtitle or a count on following lines
/// of a link title; only the first line is meant for single-line display.
/// `\n`, `\r\n` and a lone `\r` all count as line breaks.
///
/// # Examples
///
/// ```
/// use opdsview::util::first_line;
///
/// assert_eq!(first_line("New Releases\r\n42 books"), "New Releases");
/// assert_eq!(first_line("Single"), "Single");
/// assert_eq!(first_line("\nleading break"), "");
/// ```
pub fn first_line(s: &str) -> &str {
    match s.find(['\n', '\r']) {
        Some(idx) => &s[..idx],
        None => s,
    }
}

/// Maps blank strings to `None`, keeping everything else untouched.
///
/// Feeds occasionally carry `"description": ""` where they mean "no
/// description"; views must not pass an empty string off as a value.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(ToString::to_string)
}

/// Removes control characters other than tab, newline and carriage return.
///
/// Catalog text comes from remote servers and is shown verbatim; stray
/// escape sequences or NULs must not reach a terminal or a view.
///
/// # Examples
///
/// ```
/// use opdsview::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("Dune\u{1b}[2J"), "Dune[2J");
/// assert_eq!(strip_control_chars("Line one\nLine two"), "Line one\nLine two");
/// ```
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_without_break() {
        assert_eq!(first_line("All Books"), "All Books");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_first_line_unix_break() {
        assert_eq!(first_line("Fiction\nBrowse 120 titles"), "Fiction");
    }

    #[test]
    fn test_first_line_windows_break() {
        assert_eq!(first_line("Fiction\r\nBrowse"), "Fiction");
    }

    #[test]
    fn test_first_line_lone_carriage_return() {
        assert_eq!(first_line("Fiction\rBrowse"), "Fiction");
    }

    #[test]
    fn test_first_line_keeps_multibyte_text() {
        assert_eq!(first_line("Литература\nновинки"), "Литература");
        assert_eq!(first_line("小说\n新书"), "小说");
    }

    #[test]
    fn test_strip_control_chars_removes_escapes() {
        assert_eq!(strip_control_chars("\u{1b}[31mRed\u{1b}[0m"), "[31mRed[0m");
        assert_eq!(strip_control_chars("Nul\0byte"), "Nulbyte");
        assert_eq!(strip_control_chars("Bell\u{7}"), "Bell");
        // C1 controls as well as C0
        assert_eq!(strip_control_chars("a\u{85}b\u{9b}c"), "abc");
    }

    #[test]
    fn test_strip_control_chars_keeps_whitespace_and_text() {
        assert_eq!(strip_control_chars("Title\tSub\r\nMore"), "Title\tSub\r\nMore");
        assert_eq!(strip_control_chars("Литература"), "Литература");
        assert_eq!(strip_control_chars(""), "");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(Some("  \n ")), None);
        assert_eq!(non_blank(Some("A novel")), Some("A novel".to_string()));
        // Content is not trimmed, only tested for blankness
        assert_eq!(non_blank(Some(" padded ")), Some(" padded ".to_string()));
    }
}
