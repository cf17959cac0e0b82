// SPDX-FileCopyrightText: 2026 Rfqsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message deduplication scoped to one session.
//!
//! Tracks two running sets: exact-content hashes already emitted and semantic
//! fingerprints already emitted. The suppression check and the mark-as-seen
//! step happen in one `&mut self` call; callers run it inside the store actor
//! so no two concurrent decisions can both conclude "not seen yet".
//!
//! The sets live inside the per-session state and die with it — nothing is
//! shared across sessions.

use std::collections::HashSet;

use rfqsync_core::types::Fingerprint;

use crate::fingerprint;

/// Outcome of a narrative admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; the message should be appended.
    Admitted,
    /// Identical content was already emitted.
    DuplicateContent,
    /// A message with the same semantic fingerprint was already emitted.
    DuplicateFingerprint,
    /// The session has structured offer data; free-text narration is
    /// redundant and blocked.
    Superseded,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Seen-sets for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDedup {
    seen_hashes: HashSet<String>,
    seen_fingerprints: HashSet<Fingerprint>,
}

impl SessionDedup {
    /// Decides whether a candidate narrative status message may be appended,
    /// marking it as seen when admitted.
    ///
    /// `message_fingerprints` are the fingerprints carried by messages already
    /// in the session, checked in addition to the running set. `superseded`
    /// is true once the session is past the point where narration adds
    /// anything (step >= 3 or structured offers exist).
    pub fn admit_narrative<'a>(
        &mut self,
        content: &str,
        fingerprint: Option<&Fingerprint>,
        message_fingerprints: impl IntoIterator<Item = &'a Fingerprint>,
        superseded: bool,
    ) -> Admission {
        let hash = fingerprint::content_hash(content);
        if self.seen_hashes.contains(&hash) {
            return Admission::DuplicateContent;
        }

        if let Some(fp) = fingerprint
            && (self.seen_fingerprints.contains(fp)
                || message_fingerprints.into_iter().any(|seen| seen == fp))
        {
            return Admission::DuplicateFingerprint;
        }

        if superseded {
            return Admission::Superseded;
        }

        self.seen_hashes.insert(hash);
        if let Some(fp) = fingerprint {
            self.seen_fingerprints.insert(fp.clone());
        }
        Admission::Admitted
    }

    /// Marks content as seen without an admission decision.
    ///
    /// Used for messages kept by identity (stable id), whose content must
    /// still suppress later narrative repeats.
    pub fn observe(&mut self, content: &str, fingerprint: Option<&Fingerprint>) {
        self.seen_hashes.insert(fingerprint::content_hash(content));
        if let Some(fp) = fingerprint {
            self.seen_fingerprints.insert(fp.clone());
        }
    }
}
