#![warn(clippy::all, missing_docs)]

//! Core of packsync.
//!
//! This crate keeps the default asset bundle, the extras blobs and the native
//! support libraries in sync with their sources, records what was synced in a
//! small hash manifest, and serves lazily decoded textures from resource packs.

pub mod config;
pub mod manifest;
pub mod resource;
pub mod texture;

pub use config::AppConfig;
pub use manifest::{Category, Manifest};
pub use resource::{
    AssetLayout, DirectoryMirror, ExtrasStore, Observers, ProgressEvent, SyncCoordinator,
    SyncOptions,
};
pub use texture::{PackFile, TextureError, TextureManager, TextureMeta, TextureResource};
