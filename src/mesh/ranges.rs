//! Identifier range text such as `1-3,7`.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::{ScaffoldError, ScaffoldResult};

static RANGE_TOKEN: OnceCell<Regex> = OnceCell::new();

fn range_token() -> ScaffoldResult<&'static Regex> {
    RANGE_TOKEN.get_or_try_init(|| {
        Regex::new(r"^(\d+)\s*(?:-\s*(\d+))?\D*$")
            .map_err(|err| ScaffoldError::invalid_parameter("ranges", err.to_string()))
    })
}

/// Parses comma-separated identifiers and inclusive ranges into sorted,
/// disjoint `(first, last)` spans. Trailing non-digit characters in a token
/// are ignored and reversed ranges are swapped. Spans are never expanded, so
/// `1-4000000000` costs one entry.
pub fn parse_ranges(text: &str) -> ScaffoldResult<Vec<(u32, u32)>> {
    let re = range_token()?;
    let mut spans = Vec::new();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let caps = re.captures(token).ok_or_else(|| {
            ScaffoldError::invalid_parameter("ranges", format!("cannot read `{token}`"))
        })?;
        let parse = |s: &str| {
            s.parse::<u32>().map_err(|err| {
                ScaffoldError::invalid_parameter("ranges", format!("`{token}`: {err}"))
            })
        };
        let start = parse(&caps[1])?;
        let stop = caps.get(2).map(|m| parse(m.as_str())).transpose()?.unwrap_or(start);
        spans.push((start, stop));
    }
    Ok(merge_spans(spans))
}

/// Sorts spans, swapping reversed ones, and merges overlapping or adjacent
/// spans.
#[must_use]
pub fn merge_spans(spans: impl IntoIterator<Item = (u32, u32)>) -> Vec<(u32, u32)> {
    let mut spans: Vec<(u32, u32)> = spans
        .into_iter()
        .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
        .collect();
    spans.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(spans.len());
    for (start, stop) in spans {
        match merged.last_mut() {
            Some(last) if last.1.checked_add(1).is_none_or(|next| start <= next) => {
                last.1 = last.1.max(stop);
            }
            _ => merged.push((start, stop)),
        }
    }
    merged
}

/// Formats identifiers as merged ranges, e.g. `[1, 2, 3, 7]` as `1-3,7`.
#[must_use]
pub fn format_ranges(ids: &[u32]) -> String {
    format_spans(&merge_spans(ids.iter().map(|&id| (id, id))))
}

/// Formats sorted, disjoint spans as range text.
#[must_use]
pub fn format_spans(spans: &[(u32, u32)]) -> String {
    spans
        .iter()
        .map(|&(start, stop)| {
            if start == stop {
                start.to_string()
            } else {
                format!("{start}-{stop}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranges_and_singletons() {
        assert_eq!(parse_ranges("1-3,7").unwrap(), vec![(1, 3), (7, 7)]);
        assert_eq!(parse_ranges(" 9 , 4-5 ").unwrap(), vec![(4, 5), (9, 9)]);
        assert!(parse_ranges("").unwrap().is_empty());
    }

    #[test]
    fn tolerates_trailing_text_and_reversed_ranges() {
        assert_eq!(parse_ranges("5-3,8x").unwrap(), vec![(3, 5), (8, 8)]);
        assert_eq!(parse_ranges("2-").unwrap(), vec![(2, 2)]);
        assert_eq!(parse_ranges("4-6,1-3,5").unwrap(), vec![(1, 6)]);
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        let err = parse_ranges("1,abc").unwrap_err();
        assert!(matches!(err, ScaffoldError::InvalidParameter { .. }));
        assert!(parse_ranges("4294967296").is_err());
    }

    #[test]
    fn formats_merged_ranges() {
        assert_eq!(format_ranges(&[7, 1, 2, 3, 3]), "1-3,7");
        assert_eq!(format_ranges(&[]), "");
        assert_eq!(format_spans(&parse_ranges("10-12,4").unwrap()), "4,10-12");
    }

    #[test]
    fn largest_identifier_formats_without_overflow() {
        assert_eq!(format_ranges(&[u32::MAX]), "4294967295");
        assert_eq!(format_ranges(&[u32::MAX, u32::MAX - 1]), "4294967294-4294967295");
        let spans = parse_ranges("4294967294-4294967295,4294967295").unwrap();
        assert_eq!(format_spans(&spans), "4294967294-4294967295");
    }

    #[test]
    fn huge_ranges_stay_compact() {
        let spans = parse_ranges("1-4000000000,4000000001").unwrap();
        assert_eq!(spans, vec![(1, 4_000_000_001)]);
        assert_eq!(format_spans(&spans), "1-4000000001");
    }
}
