//! Gem-style version ordering, used to keep advisory fix lists ascending.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Num(u64),
    Str(&'a str),
}

impl Ord for Segment<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Str(a), Segment::Str(b)) => a.cmp(b),
            // Prerelease tags sort before any release number.
            (Segment::Str(_), Segment::Num(_)) => Ordering::Less,
            (Segment::Num(_), Segment::Str(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const ZERO: Segment<'static> = Segment::Num(0);

fn segments(version: &str) -> Vec<Segment<'_>> {
    version
        .trim()
        .split(['.', '-'])
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u64>() {
            Ok(n) => Segment::Num(n),
            Err(_) => Segment::Str(s),
        })
        .collect()
}

/// Compare two gem versions: `1.0 == 1.0.0`, `1.0.a < 1.0 < 1.0.1`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).unwrap_or(&ZERO);
        let r = right.get(i).unwrap_or(&ZERO);
        match l.cmp(r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_compare_numerically() {
        assert_eq!(compare_versions("1.18.9", "1.18.10"), Ordering::Less);
        assert_eq!(compare_versions("6.1.3.1", "6.1.3"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert_eq!(compare_versions("7.1.0.rc1", "7.1.0"), Ordering::Less);
        assert_eq!(compare_versions("7.1.0.beta", "7.1.0.rc1"), Ordering::Less);
    }

    #[test]
    fn sorts_fix_lists_ascending() {
        let mut fixes = vec!["3.0.4.2", "2.2.10", "2.2.6.3"];
        fixes.sort_by(|a, b| compare_versions(a, b));
        assert_eq!(fixes, vec!["2.2.6.3", "2.2.10", "3.0.4.2"]);
    }
}
