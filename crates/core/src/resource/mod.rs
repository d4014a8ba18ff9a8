//! Bundle synchronisation.

/// Download pipeline and library loader interfaces.
pub mod collaborators;
/// Resync decision rules.
pub mod decision;
/// Progress events and status observers.
pub mod events;
/// Supplementary blob store.
pub mod extras;
/// Local directory mirror implementing the collaborators.
pub mod mirror;
/// The synchronisation coordinator.
pub mod sync;

pub use collaborators::{LibraryDownloadManager, LibraryLoader, ResourceDownloadManager};
pub use decision::SyncReason;
pub use events::{Observers, ProgressEvent, Recipient, StatusLevel, StatusLine};
pub use extras::ExtrasStore;
pub use mirror::{ArtifactRegistry, DirectoryMirror};
pub use sync::{
    AssetLayout, AssetSyncReport, LibrarySyncReport, SyncCoordinator, SyncOptions, SyncState,
};
