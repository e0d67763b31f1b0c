//! Key-value splitting for report lines.
//!
//! Counter lines look like `BPS_IN: 0, BPS_OUT: 12, SSL_BPS_IN: 3`. Values
//! never contain a comma. A value may contain a colon, as with `UPTIME:
//! 02:13:45`, which is why pairs are split at the first colon only.

use rustc_hash::FxHashMap;

/// Split `fragment` into trimmed key and raw value pairs.
///
/// An empty fragment yields an empty map. A segment without a colon, or with
/// an empty key, is skipped and the remaining segments are still parsed. When
/// a key repeats the later value wins.
#[must_use]
pub fn parse_key_values(fragment: &str) -> FxHashMap<&str, &str> {
    let mut pairs = FxHashMap::default();
    for segment in fragment.split(',') {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.insert(key, value.trim());
    }
    pairs
}

/// Split `line` at the first `separator` into a trimmed key and value.
///
/// A line without the separator is all key, with an empty value.
#[must_use]
pub fn parse_key_value_pair<'a>(line: &'a str, separator: &str) -> (&'a str, &'a str) {
    match line.split_once(separator) {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    }
}
