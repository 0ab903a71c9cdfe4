//! Normalized edit-distance metric over code snippets.
//!
//! Invoked on every edit against a bounded set of prior edits, so the
//! distance runs in O(n·m) time with a two-row rolling DP table
//! (O(min(n, m)) auxiliary space).

/// Trim, collapse internal whitespace runs to single spaces, and truncate
/// to `max_len` characters.
pub fn normalize_snippet(snippet: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(snippet.len().min(max_len));
    let mut pending_space = false;
    for ch in snippet.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
        if out.chars().count() >= max_len {
            break;
        }
    }
    out
}

/// Character-level edit distance (insert/delete/substitute, unit cost),
/// divided by the longer string's length. 0.0 for identical strings and
/// for two empty strings; 1.0 when nothing matches.
pub fn normalized_distance(a: &str, b: &str) -> f64 {
    if a == b {
        return 0.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    edit_distance(&a, &b) as f64 / longest as f64
}

/// Two-row DP; the shorter string drives the row width.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr: Vec<usize> = vec![0; short.len() + 1];

    for (i, &lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &sc) in short.iter().enumerate() {
            let substitute = prev[j] + usize::from(lc != sc);
            let delete = prev[j + 1] + 1;
            let insert = curr[j] + 1;
            curr[j + 1] = substitute.min(delete).min(insert);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}

// ─── Tests ────────────────────────────────────────────────────────
