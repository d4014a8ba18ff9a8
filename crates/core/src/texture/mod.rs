//! Lazily decoded textures from resource packs.

mod error;
mod manager;
/// Texture descriptors (`.mcmeta`).
pub mod meta;
mod pack;
mod resource;

pub use error::{TextureError, TextureResult};
pub use manager::TextureManager;
pub use meta::{meta_key, AnimationFrame, AnimationMeta, TextureMeta, TextureProperties};
pub use pack::PackFile;
pub use resource::TextureResource;
