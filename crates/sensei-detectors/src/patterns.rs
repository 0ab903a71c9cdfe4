//! Curated terminal failure patterns.
//!
//! One compiled pattern family per detected ecosystem convention. Compiled
//! once on first use and reused on every terminal output event.

use once_cell::sync::Lazy;
use regex::Regex;

pub struct FailureFamily {
    /// Stable family identifier, reported in signal metadata.
    pub name: &'static str,
    pub regex: Regex,
}

pub static FAILURE_FAMILIES: Lazy<Vec<FailureFamily>> = Lazy::new(|| {
    vec![
        FailureFamily {
            name: "test_fail_marker",
            regex: Regex::new(r"(?m)(?:^\s*FAIL(?:ED)?\b|\b\d+ (?:tests? )?failed\b|[✗✖])")
                .expect("valid regex"),
        },
        FailureFamily {
            name: "assertion_error",
            regex: Regex::new(r"(?:AssertionError\b|assertion(?:s)?(?: `[^`]+`)? failed)")
                .expect("valid regex"),
        },
        FailureFamily {
            name: "stack_frame",
            regex: Regex::new(r"(?m)^\s+at .+:\d+(?::\d+)?\)?\s*$").expect("valid regex"),
        },
        FailureFamily {
            name: "python_traceback",
            regex: Regex::new(r"Traceback \(most recent call last\)").expect("valid regex"),
        },
        FailureFamily {
            name: "rust_panic",
            regex: Regex::new(r"thread '[^']*' panicked at").expect("valid regex"),
        },
    ]
});

/// A pattern hit with a bounded context excerpt for payload purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMatch {
    pub family: &'static str,
    pub context: String,
}

/// Match the text against every family; the first hit wins. Families are
/// ordered roughly from most to least specific.
pub fn match_failure(text: &str, context_max_chars: usize) -> Option<FailureMatch> {
    for family in FAILURE_FAMILIES.iter() {
        if let Some(m) = family.regex.find(text) {
            return Some(FailureMatch {
                family: family.name,
                context: extract_context(text, m.start(), context_max_chars),
            });
        }
    }
    None
}

/// A few lines around the match, capped at `max_chars` characters.
fn extract_context(text: &str, match_start: usize, max_chars: usize) -> String {
    let mut line_starts = vec![0usize];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            line_starts.push(i + 1);
        }
    }
    let match_line = line_starts
        .iter()
        .rposition(|&s| s <= match_start)
        .unwrap_or(0);

    let lines: Vec<&str> = text.lines().collect();
    let from = match_line.saturating_sub(2);
    let to = (match_line + 3).min(lines.len());
    let excerpt = lines[from..to].join("\n");
    excerpt.chars().take(max_chars).collect()
}

// ─── Tests ────────────────────────────────────────────────────────
