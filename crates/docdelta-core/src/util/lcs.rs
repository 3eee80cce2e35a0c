//! Longest common contiguous run.
//!
//! The aligner does not use classic (non-contiguous) LCS: it repeatedly finds
//! the single longest run of consecutive matching items and splits the
//! problem around it.

/// Items compared by hash only.
pub trait Hashable {
    fn hash(&self) -> &str;
}

impl Hashable for String {
    fn hash(&self) -> &str {
        self
    }
}

impl<T: Hashable + ?Sized> Hashable for &T {
    fn hash(&self) -> &str {
        (**self).hash()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Start index in the first sequence
    pub i1: usize,
    /// Start index in the second sequence
    pub i2: usize,
    pub length: usize,
}

impl MatchResult {
    /// Ordering used to pick between candidates: longer wins, then the one
    /// closest to both starts, then the leftmost in the first sequence.
    fn better_than(&self, other: &MatchResult) -> bool {
        if self.length != other.length {
            return self.length > other.length;
        }
        let (a, b) = (self.i1 + self.i2, other.i1 + other.i2);
        if a != b {
            return a < b;
        }
        self.i1 < other.i1
    }
}

/// Finds the longest run of consecutive items with equal hashes.
///
/// Every maximal run is offered to `accept`, which may reject it (`None`) or
/// narrow it. The best accepted candidate wins. Runs O(n·m) time and O(m)
/// space.
pub fn longest_common_run<T, F>(items1: &[T], items2: &[T], accept: F) -> Option<MatchResult>
where
    T: Hashable,
    F: Fn(MatchResult) -> Option<MatchResult>,
{
    let m = items2.len();
    if items1.is_empty() || m == 0 {
        return None;
    }

    let mut prev = vec![0usize; m + 1];
    let mut cur = vec![0usize; m + 1];
    let mut best: Option<MatchResult> = None;

    for i in 0..items1.len() {
        for j in 0..m {
            if items1[i].hash() != items2[j].hash() {
                cur[j + 1] = 0;
                continue;
            }
            let len = prev[j] + 1;
            cur[j + 1] = len;

            let extends = i + 1 < items1.len()
                && j + 1 < m
                && items1[i + 1].hash() == items2[j + 1].hash();
            if extends {
                continue;
            }

            let candidate = MatchResult {
                i1: i + 1 - len,
                i2: j + 1 - len,
                length: len,
            };
            if let Some(accepted) = accept(candidate).filter(|c| c.length > 0) {
                if best.map_or(true, |b| accepted.better_than(&b)) {
                    best = Some(accepted);
                }
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

pub fn common_prefix_len<T: Hashable>(items1: &[T], items2: &[T]) -> usize {
    items1
        .iter()
        .zip(items2)
        .take_while(|(a, b)| a.hash() == b.hash())
        .count()
}

pub fn common_suffix_len<T: Hashable>(items1: &[T], items2: &[T]) -> usize {
    items1
        .iter()
        .rev()
        .zip(items2.iter().rev())
        .take_while(|(a, b)| a.hash() == b.hash())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn any(m: MatchResult) -> Option<MatchResult> {
        Some(m)
    }

    #[test]
    fn finds_longest_run() {
        let a = seq("xxabcdyy");
        let b = seq("zabcdz");
        let m = longest_common_run(&a, &b, any).unwrap();
        assert_eq!(m, MatchResult { i1: 2, i2: 1, length: 4 });
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(longest_common_run(&seq("abc"), &seq("xyz"), any), None);
        assert_eq!(longest_common_run(&seq(""), &seq("xyz"), any), None);
    }

    #[test]
    fn ties_prefer_positions_nearest_the_start() {
        // "ab_" at (0, 0) beats the shorter "ab" at (3, 0).
        let a = seq("ab_ab");
        let b = seq("ab_");
        let m = longest_common_run(&a, &b, any).unwrap();
        assert_eq!((m.i1, m.i2, m.length), (0, 0, 3));

        let a = seq("xab");
        let b = seq("abx");
        let m = longest_common_run(&a, &b, any).unwrap();
        assert_eq!((m.i1, m.i2, m.length), (1, 0, 2));
    }

    #[test]
    fn rejected_candidates_are_skipped() {
        let a = seq("abcxyz");
        let b = seq("xyzabc");
        let m = longest_common_run(&a, &b, |m| (a[m.i1] != "a").then_some(m)).unwrap();
        assert_eq!((m.i1, m.i2, m.length), (3, 0, 3));
    }

    #[test]
    fn accept_may_narrow_a_run() {
        let a = seq("|abc");
        let b = seq("|abc");
        let m = longest_common_run(&a, &b, |m| {
            if a[m.i1] == "|" {
                Some(MatchResult { i1: m.i1 + 1, i2: m.i2 + 1, length: m.length - 1 })
            } else {
                Some(m)
            }
        })
        .unwrap();
        assert_eq!((m.i1, m.length), (1, 3));
    }

    #[test]
    fn prefix_and_suffix() {
        let a = seq("abXcd");
        let b = seq("abYYcd");
        assert_eq!(common_prefix_len(&a, &b), 2);
        assert_eq!(common_suffix_len(&a, &b), 2);
    }
}
