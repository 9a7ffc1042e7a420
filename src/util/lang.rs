/// Returns true when `tag` satisfies the `wanted` language preference.
///
/// Matching is case-insensitive and works on BCP-47 primary subtags in both
/// directions: `en` matches `en-GB`, and `en-US` matches `en`. Exact matches
/// are preferred by [`select_language`]; this function only answers the
/// looser question.
pub fn language_matches(tag: &str, wanted: &str) -> bool {
    primary_subtag(tag).eq_ignore_ascii_case(primary_subtag(wanted))
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag).trim()
}

/// Picks one value out of a language-keyed list.
///
/// Selection order:
/// 1. the first preferred language with an exact (case-insensitive) match
/// 2. the first preferred language with a primary-subtag match
/// 3. the first entry in source order
///
/// Returns `None` only when `entries` is empty.
pub fn select_language<'a, V>(entries: &'a [(String, V)], preferred: &[String]) -> Option<&'a V> {
    for wanted in preferred {
        if let Some((_, value)) = entries
            .iter()
            .find(|(tag, _)| tag.trim().eq_ignore_ascii_case(wanted.trim()))
        {
            return Some(value);
        }
    }

    for wanted in preferred {
        if let Some((_, value)) = entries
            .iter()
            .find(|(tag, _)| language_matches(tag, wanted))
        {
            return Some(value);
        }
    }

    entries.first().map(|(_, value)| value)
}
