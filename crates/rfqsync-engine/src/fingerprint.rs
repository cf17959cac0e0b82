// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content- and semantic-identity hashing for narrative status messages.
//!
//! Two layers of identity:
//! - [`content_hash`]: exact-content identity (SHA-256 over trimmed text).
//! - [`extract`]: semantic identity — a `(negotiation, category, count)`
//!   tuple recognized from natural-language status narration, so "3 of 5
//!   operators have responded" and "We've received 3 quotes so far" collapse
//!   to the same fingerprint despite different wording.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use rfqsync_core::types::{Fingerprint, StatusCategory};

/// Ordered narrative patterns; the first match wins. Each pattern captures
/// the count as its first group.
static PATTERNS: LazyLock<Vec<(StatusCategory, Regex)>> = LazyLock::new(|| {
    [
        (
            StatusCategory::OperatorDeclined,
            r"(?i)\b(\d+)\s+operators?\s+(?:have\s+|has\s+)?declined",
        ),
        (
            StatusCategory::QuoteProgress,
            r"(?i)\b(\d+)\s+(?:of\s+\d+\s+)?operators?\s+(?:have|has)\s+(?:responded|replied)",
        ),
        (
            StatusCategory::QuoteProgress,
            r"(?i)\breceived\s+(\d+)\s+(?:new\s+)?quotes?",
        ),
        (
            StatusCategory::QuoteProgress,
            r"(?i)\b(\d+)\s+quotes?\s+(?:so\s+far|(?:have\s+)?(?:arrived|come\s+in)|are\s+in|received)",
        ),
        (
            StatusCategory::RequestsSent,
            r"(?i)\bsent\s+(?:quote\s+)?requests?\s+to\s+(\d+)\s+operators?",
        ),
        (
            StatusCategory::RequestsSent,
            r"(?i)\brequest(?:ed|ing)\s+quotes?\s+from\s+(\d+)\s+operators?",
        ),
        (
            StatusCategory::RequestsSent,
            r"(?i)\bcontacted\s+(\d+)\s+operators?",
        ),
    ]
    .into_iter()
    .map(|(category, pattern)| {
        let regex = Regex::new(pattern).unwrap_or_else(|e| {
            unreachable!("invalid builtin fingerprint pattern {pattern:?}: {e}")
        });
        (category, regex)
    })
    .collect()
});

/// Exact-content identity: SHA-256 over trimmed content, hex-encoded.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Extracts the semantic fingerprint of a narrative status message.
///
/// Returns `None` for text that is not recognizable status narration.
pub fn extract(negotiation_id: &str, content: &str) -> Option<Fingerprint> {
    for (category, regex) in PATTERNS.iter() {
        if let Some(captures) = regex.captures(content)
            && let Some(count) = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return Some(Fingerprint {
                negotiation_id: negotiation_id.to_string(),
                category: *category,
                count,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_trims() {
        assert_eq!(content_hash("hello"), content_hash("  hello \n"));
        assert_ne!(content_hash("hello"), content_hash("hello!"));
    }

    #[test]
    fn differently_worded_progress_shares_a_fingerprint() {
        let a = extract("neg-1", "3 of 5 operators have responded").unwrap();
        let b = extract("neg-1", "We've received 3 quotes so far").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.category, StatusCategory::QuoteProgress);
        assert_eq!(a.count, 3);
    }

    #[test]
    fn more_progress_wordings_collapse() {
        for text in [
            "2 operators have replied to your request",
            "Good news: we received 2 new quotes.",
            "2 quotes have arrived",
            "2 quotes so far",
        ] {
            let fp = extract("neg-1", text).unwrap_or_else(|| panic!("no fingerprint for {text:?}"));
            assert_eq!(fp.category, StatusCategory::QuoteProgress, "{text:?}");
            assert_eq!(fp.count, 2, "{text:?}");
        }
    }

    #[test]
    fn requests_sent_category() {
        let fp = extract("neg-1", "I've sent quote requests to 5 operators.").unwrap();
        assert_eq!(fp.category, StatusCategory::RequestsSent);
        assert_eq!(fp.count, 5);

        let fp = extract("neg-1", "Requested quotes from 5 operators").unwrap();
        assert_eq!(fp.category, StatusCategory::RequestsSent);
    }

    #[test]
    fn declined_category_wins_over_generic_operator_wording() {
        let fp = extract("neg-1", "2 operators have declined your request").unwrap();
        assert_eq!(fp.category, StatusCategory::OperatorDeclined);
        assert_eq!(fp.count, 2);
    }

    #[test]
    fn different_counts_differ() {
        let a = extract("neg-1", "received 3 quotes").unwrap();
        let b = extract("neg-1", "received 4 quotes").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_negotiations_differ() {
        let a = extract("neg-1", "received 3 quotes").unwrap();
        let b = extract("neg-2", "received 3 quotes").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ordinary_prose_has_no_fingerprint() {
        assert!(extract("neg-1", "What time would you like to depart?").is_none());
        assert!(extract("neg-1", "The Citation XLS seats 9 passengers.").is_none());
    }
}
