use std::sync::{Arc, Weak};

use image::{imageops, imageops::FilterType, RgbaImage};
use parking_lot::Mutex;

use super::{
    error::{TextureError, TextureResult},
    manager::Shared,
    meta::{meta_key, TextureMeta},
    pack::PackFile,
};

#[derive(Debug)]
pub(crate) enum Kind {
    Texture,
    Meta(TextureMeta),
    Opaque,
}

/// A resource-pack entry addressed by a logical key.
///
/// Textures decode lazily. The decoded bitmap is referenced weakly here and
/// pinned by the owning manager's bounded cache; once the cache evicts it the
/// next access decodes again. Callers only ever receive copies.
#[derive(Debug)]
pub struct TextureResource {
    manager: Weak<Shared>,
    key: Option<String>,
    file: Option<PackFile>,
    kind: Kind,
    decoded: Mutex<Weak<RgbaImage>>,
}

impl TextureResource {
    pub(crate) fn new(
        manager: Weak<Shared>,
        key: Option<String>,
        file: Option<PackFile>,
        kind: Kind,
    ) -> Self {
        Self {
            manager,
            key,
            file,
            kind,
            decoded: Mutex::new(Weak::new()),
        }
    }

    /// A texture that belongs to no manager.
    ///
    /// Nothing pins its bitmap, so each access decodes again, and it never has
    /// metadata.
    pub fn standalone(key: Option<String>, file: Option<PackFile>) -> Self {
        Self::new(Weak::new(), key, file, Kind::Texture)
    }

    /// Logical key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether this entry is an image (or image descriptor) rather than an
    /// opaque or known-missing entry.
    pub fn is_texture(&self) -> bool {
        matches!(self.kind, Kind::Texture | Kind::Meta(_))
    }

    /// Whether this entry is a texture descriptor.
    pub fn is_texture_meta(&self) -> bool {
        matches!(self.kind, Kind::Meta(_))
    }

    /// Whether a backing file exists.
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// The backing file.
    pub fn file(&self) -> Option<&PackFile> {
        self.file.as_ref()
    }

    /// Parsed descriptor, for descriptor entries.
    pub fn meta(&self) -> Option<&TextureMeta> {
        match &self.kind {
            Kind::Meta(meta) => Some(meta),
            _ => None,
        }
    }

    /// Full-resolution copy of the decoded texture.
    pub fn texture(&self) -> TextureResult<RgbaImage> {
        Ok((*self.decode()?).clone())
    }

    /// Copy of the decoded texture resized to `width` x `height`.
    pub fn texture_sized(&self, width: u32, height: u32) -> TextureResult<RgbaImage> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidSize { width, height });
        }
        let source = self.decode()?;
        Ok(imageops::resize(&*source, width, height, FilterType::Nearest))
    }

    /// The descriptor entry belonging to this texture.
    pub fn texture_meta(&self) -> Option<Arc<TextureResource>> {
        let key = self.key.as_deref()?;
        let manager = self.manager.upgrade()?;
        manager
            .lookup(&meta_key(key))
            .filter(|resource| resource.is_texture_meta())
    }

    /// Whether a descriptor entry exists for this texture.
    pub fn has_texture_meta(&self) -> bool {
        self.texture_meta().is_some()
    }

    fn label(&self) -> String {
        match (&self.key, &self.file) {
            (Some(key), _) => key.clone(),
            (None, Some(file)) => file.name(),
            (None, None) => "<anonymous>".to_string(),
        }
    }

    fn decode(&self) -> TextureResult<Arc<RgbaImage>> {
        if !matches!(self.kind, Kind::Texture) {
            return Err(TextureError::NotATexture(self.label()));
        }

        if let Some(image) = self.decoded.lock().upgrade() {
            return Ok(image);
        }

        // racing callers may both decode; the last writer wins
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| TextureError::Missing(self.label()))?;
        let bytes = file.read().map_err(|source| TextureError::Io {
            key: self.label(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| TextureError::Decode {
                key: self.label(),
                source,
            })?
            .to_rgba8();
        let image = Arc::new(image);

        *self.decoded.lock() = Arc::downgrade(&image);
        if let (Some(manager), Some(key)) = (self.manager.upgrade(), self.key.as_deref()) {
            manager.pin(key, Arc::clone(&image));
        }
        Ok(image)
    }
}
