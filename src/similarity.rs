//! Character-level title similarity.
//!
//! Counts characters shared through recursive longest-common-substring
//! matching: find the longest common run, then recurse on the pieces left
//! and right of it. The percentage is `2 * common / (len(a) + len(b)) * 100`.
//! Comparison is byte-wise and case-sensitive.

/// Similarity of `a` and `b` in percent, `0.0..=100.0`.
pub fn similarity_percent(a: &str, b: &str) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    let common = common_chars(a.as_bytes(), b.as_bytes());
    (common * 2) as f64 * 100.0 / total as f64
}

fn common_chars(a: &[u8], b: &[u8]) -> usize {
    let (pos_a, pos_b, len) = longest_common_run(a, b);
    if len == 0 {
        return 0;
    }
    len + common_chars(&a[..pos_a], &b[..pos_b])
        + common_chars(&a[pos_a + len..], &b[pos_b + len..])
}

/// First longest common run as (start in a, start in b, length).
fn longest_common_run(a: &[u8], b: &[u8]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            if k > best.2 {
                best = (i, j, k);
            }
        }
    }
    best
}
