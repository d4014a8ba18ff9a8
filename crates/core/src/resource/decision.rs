//! Resync decision for a bundle category.

use crate::manifest::EMPTY_MARKER;

/// Why a category needs to be synced again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    /// The caller asked for it.
    Forced,
    /// The remote hash differs from the recorded one.
    HashChanged,
    /// The host version differs from the recorded one.
    VersionChanged,
}

impl SyncReason {
    /// Status line announcing the resync of `what`.
    pub fn describe(self, what: &str, old_hash: Option<&str>, new_hash: &str) -> String {
        let old_hash = old_hash.unwrap_or(EMPTY_MARKER);
        match self {
            SyncReason::Forced => format!(
                "Forcibly re-downloading {what}! Please wait... ({old_hash} -> {new_hash})"
            ),
            SyncReason::HashChanged => format!(
                "Hash changed! Re-downloading {what}! Please wait... ({old_hash} -> {new_hash})"
            ),
            SyncReason::VersionChanged => format!(
                "Host version changed! Re-downloading {what}! \
                 Please wait... ({old_hash} -> {new_hash})"
            ),
        }
    }
}

/// Decide whether a category must be synced.
///
/// A host version bump invalidates the bundle even when its hash is unchanged,
/// so the consumer never interprets a bundle synced for another version.
pub fn decide(
    force: bool,
    remote_hash: &str,
    host_version: &str,
    recorded_hash: Option<&str>,
    recorded_version: Option<&str>,
) -> Option<SyncReason> {
    if force {
        Some(SyncReason::Forced)
    } else if recorded_hash != Some(remote_hash) {
        Some(SyncReason::HashChanged)
    } else if recorded_version != Some(host_version) {
        Some(SyncReason::VersionChanged)
    } else {
        None
    }
}
