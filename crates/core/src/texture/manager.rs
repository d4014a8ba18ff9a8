use std::{
    collections::HashMap,
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use image::RgbaImage;
use moka::sync::Cache;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{
    error::{TextureError, TextureResult},
    meta::{TextureMeta, MCMETA_SUFFIX},
    pack::PackFile,
    resource::{Kind, TextureResource},
};
use crate::config::AppConfig;

// Namespaces may not contain `.`: descriptor lookup treats a dotted key as
// already carrying an extension.
static TEXTURE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^assets/([a-z0-9_\-]+)/textures/(.+)$").expect("invalid texture path regex")
});

pub(crate) struct Shared {
    resources: RwLock<HashMap<String, Arc<TextureResource>>>,
    decoded: Cache<String, Arc<RgbaImage>>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("resources", &self.resources.read().len())
            .field("decoded", &self.decoded.entry_count())
            .finish()
    }
}

impl Shared {
    pub(crate) fn lookup(&self, key: &str) -> Option<Arc<TextureResource>> {
        self.resources.read().get(key).cloned()
    }

    pub(crate) fn pin(&self, key: &str, image: Arc<RgbaImage>) {
        self.decoded.insert(key.to_string(), image);
    }
}

/// Owns the key to resource mapping and the decoded bitmap cache.
#[derive(Debug, Clone)]
pub struct TextureManager {
    shared: Arc<Shared>,
}

impl TextureManager {
    /// Create a manager whose decoded bitmaps may use up to `cache_bytes`.
    pub fn new(cache_bytes: u64) -> Self {
        let decoded = Cache::builder()
            .weigher(|_key: &String, image: &Arc<RgbaImage>| -> u32 {
                image.as_raw().len().min(u32::MAX as usize) as u32
            })
            .max_capacity(cache_bytes)
            .build();

        Self {
            shared: Arc::new(Shared {
                resources: RwLock::new(HashMap::new()),
                decoded,
            }),
        }
    }

    /// Create a manager sized from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.texture_cache_bytes)
    }

    /// Register `file` under `key`, replacing any previous entry.
    ///
    /// Keys ending in `.mcmeta` are descriptors and are parsed immediately;
    /// everything else is a texture.
    pub fn register(
        &self,
        key: impl Into<String>,
        file: PackFile,
    ) -> TextureResult<Arc<TextureResource>> {
        let key = key.into();
        let kind = if key.ends_with(MCMETA_SUFFIX) {
            let bytes = file.read().map_err(|source| TextureError::Io {
                key: key.clone(),
                source,
            })?;
            let meta = TextureMeta::parse(&bytes).map_err(|source| TextureError::Meta {
                key: key.clone(),
                source,
            })?;
            Kind::Meta(meta)
        } else {
            Kind::Texture
        };
        Ok(self.insert(key, Some(file), kind))
    }

    /// Register a non-image file under `key`.
    pub fn register_opaque(&self, key: impl Into<String>, file: PackFile) -> Arc<TextureResource> {
        self.insert(key.into(), Some(file), Kind::Opaque)
    }

    /// Record that `key` was looked up and has no file.
    pub fn mark_missing(&self, key: impl Into<String>) -> Arc<TextureResource> {
        self.insert(key.into(), None, Kind::Opaque)
    }

    fn insert(&self, key: String, file: Option<PackFile>, kind: Kind) -> Arc<TextureResource> {
        let resource = Arc::new(TextureResource::new(
            Arc::downgrade(&self.shared),
            Some(key.clone()),
            file,
            kind,
        ));
        self.shared.decoded.invalidate(&key);
        self.shared
            .resources
            .write()
            .insert(key, Arc::clone(&resource));
        resource
    }

    /// Entry registered under `key`; `None` if it was never registered.
    pub fn get(&self, key: &str) -> Option<Arc<TextureResource>> {
        self.shared.lookup(key)
    }

    /// Sorted registered keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.shared.resources.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.shared.resources.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.shared.resources.read().is_empty()
    }

    /// Drop every entry and every decoded bitmap.
    pub fn clear(&self) {
        self.shared.resources.write().clear();
        self.shared.decoded.invalidate_all();
        self.shared.decoded.run_pending_tasks();
    }

    /// Bytes of decoded pixels currently pinned.
    pub fn cached_bytes(&self) -> u64 {
        self.shared.decoded.run_pending_tasks();
        self.shared.decoded.weighted_size()
    }

    /// Register every file under `<root>/assets/<namespace>/textures/`.
    ///
    /// Namespaces containing `.` are not scanned.
    ///
    /// Keys take the form `<namespace>:<path>`; `.png` is stripped from images
    /// and kept on `.png.mcmeta` descriptors. Descriptors that fail to parse
    /// are skipped with a warning. Returns the number of registered entries.
    pub fn load_pack_dir(&self, root: impl AsRef<Path>) -> Result<usize> {
        let root = root.as_ref();
        let mut registered = 0;

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("failed to scan pack {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("{} escaped {}", entry.path().display(), root.display()))?
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let Some((key, is_image)) = pack_key(&relative) else {
                continue;
            };
            let file = PackFile::disk(entry.path());
            if is_image || key.ends_with(MCMETA_SUFFIX) {
                match self.register(key, file) {
                    Ok(_) => registered += 1,
                    Err(err) => warn!("Skipping {relative}: {err}"),
                }
            } else {
                self.register_opaque(key, file);
                registered += 1;
            }
        }

        debug!("registered {registered} entries from {}", root.display());
        Ok(registered)
    }

    #[cfg(test)]
    fn evict_decoded(&self, key: &str) {
        self.shared.decoded.invalidate(key);
        self.shared.decoded.run_pending_tasks();
    }
}

/// Resource key for a pack-relative path, and whether it is a PNG image.
fn pack_key(relative: &str) -> Option<(String, bool)> {
    let caps = TEXTURE_PATH_RE.captures(relative)?;
    let namespace = caps.get(1)?.as_str();
    let path = caps.get(2)?.as_str();
    match path.strip_suffix(".png") {
        Some(stem) => Some((format!("{namespace}:{stem}"), true)),
        None => Some((format!("{namespace}:{path}"), false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::meta::meta_key;
    use image::{ImageFormat, Rgba};
    use std::{fs, io::Cursor};
    use tempfile::tempdir;

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn black_pixel() -> PackFile {
        PackFile::memory("black.png", png(1, 1, [0, 0, 0, 255]))
    }

    fn meta_file(json: &[u8]) -> PackFile {
        PackFile::memory("texture.png.mcmeta", json.to_vec())
    }

    const ANIMATION: &[u8] = br#"{"animation": {"frametime": 2}}"#;

    #[test]
    fn texture_copies_are_independent() -> Result<()> {
        let manager = TextureManager::new(1 << 20);
        let file = PackFile::memory("stone.png", png(2, 2, [9, 9, 9, 255]));
        let resource = manager.register("block/stone", file)?;

        let mut first = resource.texture()?;
        let second = resource.texture()?;
        assert_eq!(first, second);

        first.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        assert_ne!(first, second);
        let third = resource.texture()?;
        assert_eq!(third, second);
        assert_eq!(third.get_pixel(0, 0), &Rgba([9, 9, 9, 255]));
        Ok(())
    }

    #[test]
    fn resized_copy_has_requested_dimensions() -> Result<()> {
        let manager = TextureManager::new(1 << 20);
        let file = PackFile::memory("apple.png", png(4, 4, [1, 2, 3, 255]));
        let resource = manager.register("item/apple", file)?;

        let resized = resource.texture_sized(16, 8)?;
        assert_eq!(resized.dimensions(), (16, 8));
        assert!(resized.pixels().all(|pixel| *pixel == Rgba([1, 2, 3, 255])));
        assert_eq!(resource.texture()?.dimensions(), (4, 4));

        assert!(matches!(
            resource.texture_sized(0, 8),
            Err(TextureError::InvalidSize { width: 0, height: 8 })
        ));
        Ok(())
    }

    #[test]
    fn evicted_bitmap_is_decoded_again() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("dirt.png");
        fs::write(&path, png(1, 1, [10, 10, 10, 255]))?;

        let manager = TextureManager::new(1 << 20);
        let resource = manager.register("block/dirt", PackFile::disk(&path))?;
        assert_eq!(resource.texture()?.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));
        assert_eq!(manager.cached_bytes(), 4);

        // still pinned: the file is not read again
        fs::write(&path, png(1, 1, [20, 20, 20, 255]))?;
        assert_eq!(resource.texture()?.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));

        manager.evict_decoded("block/dirt");
        assert_eq!(resource.texture()?.get_pixel(0, 0), &Rgba([20, 20, 20, 255]));
        Ok(())
    }

    #[test]
    fn non_textures_refuse_to_decode() -> Result<()> {
        let manager = TextureManager::new(1 << 20);
        let missing = manager.mark_missing("block/void");
        assert!(!missing.has_file());
        assert!(!missing.is_texture());
        assert!(
            matches!(missing.texture(), Err(TextureError::NotATexture(key)) if key == "block/void")
        );

        let meta = manager.register("block/void.png.mcmeta", meta_file(ANIMATION))?;
        assert!(meta.is_texture());
        assert!(meta.is_texture_meta());
        assert!(matches!(meta.texture(), Err(TextureError::NotATexture(_))));

        let opaque =
            manager.register_opaque("font/glyphs.bin", PackFile::memory("glyphs.bin", vec![1, 2]));
        assert!(opaque.has_file());
        assert!(matches!(
            opaque.texture_sized(1, 1),
            Err(TextureError::NotATexture(_))
        ));
        Ok(())
    }

    #[test]
    fn corrupt_image_surfaces_decode_error() -> Result<()> {
        let manager = TextureManager::new(1 << 20);
        let file = PackFile::memory("broken.png", b"not a png".to_vec());
        let resource = manager.register("block/broken", file)?;
        assert!(matches!(resource.texture(), Err(TextureError::Decode { .. })));

        let gone = manager.register("block/gone", PackFile::disk("/nonexistent/gone.png"))?;
        assert!(matches!(gone.texture(), Err(TextureError::Io { .. })));
        Ok(())
    }

    #[test]
    fn meta_lookup_uses_key_convention() -> Result<()> {
        let manager = TextureManager::new(1 << 20);
        let stone = manager.register("block/stone", black_pixel())?;
        let villager = manager.register("entity/villager.profession", black_pixel())?;
        let lonely = manager.register("block/sand", black_pixel())?;

        assert_eq!(meta_key("block/stone"), "block/stone.png.mcmeta");
        manager.register("block/stone.png.mcmeta", meta_file(ANIMATION))?;
        manager.register(
            "entity/villager.profession.mcmeta",
            meta_file(br#"{"texture": {"clamp": true}}"#),
        )?;
        manager.mark_missing("block/sand.png.mcmeta");

        let meta = stone.texture_meta().expect("stone meta");
        assert_eq!(meta.key(), Some("block/stone.png.mcmeta"));
        assert_eq!(
            meta.meta()
                .and_then(|m| m.animation.as_ref())
                .map(|a| a.frametime),
            Some(2)
        );

        let meta = villager.texture_meta().expect("villager meta");
        assert_eq!(meta.key(), Some("entity/villager.profession.mcmeta"));
        assert!(meta.meta().and_then(|m| m.texture).is_some_and(|t| t.clamp));

        assert!(!lonely.has_texture_meta());
        Ok(())
    }

    #[test]
    fn standalone_resources_have_no_meta() -> Result<()> {
        let file = PackFile::memory("x.png", png(1, 1, [5, 5, 5, 255]));
        let resource = TextureResource::standalone(None, Some(file));
        assert!(resource.texture_meta().is_none());
        assert_eq!(resource.texture()?.dimensions(), (1, 1));

        let dropped = {
            let manager = TextureManager::new(1 << 20);
            manager.register("block/stone", black_pixel())?;
            manager.register("block/stone.png.mcmeta", meta_file(ANIMATION))?;
            manager.get("block/stone").expect("registered")
        };
        assert!(dropped.texture_meta().is_none());

        let empty = TextureResource::standalone(Some("block/none".into()), None);
        assert!(matches!(empty.texture(), Err(TextureError::Missing(_))));
        Ok(())
    }

    #[test]
    fn loads_pack_directory() -> Result<()> {
        let dir = tempdir()?;
        let textures = dir.path().join("assets/minecraft/textures");
        fs::create_dir_all(textures.join("block"))?;
        fs::create_dir_all(dir.path().join("assets/minecraft/models"))?;
        fs::write(textures.join("block/stone.png"), png(1, 1, [0, 0, 0, 255]))?;
        fs::write(textures.join("block/stone.png.mcmeta"), ANIMATION)?;
        fs::write(textures.join("block/bad.png.mcmeta"), "{oops")?;
        fs::write(textures.join("block/notes.txt"), "hello")?;
        fs::write(dir.path().join("assets/minecraft/models/stone.json"), "{}")?;

        let manager = TextureManager::new(1 << 20);
        assert_eq!(manager.load_pack_dir(dir.path())?, 3);
        assert_eq!(
            manager.keys(),
            vec![
                "minecraft:block/notes.txt",
                "minecraft:block/stone",
                "minecraft:block/stone.png.mcmeta"
            ]
        );
        assert!(manager.get("minecraft:block/bad.png.mcmeta").is_none());

        let stone = manager.get("minecraft:block/stone").expect("stone");
        assert!(stone.has_texture_meta());
        assert!(!manager.get("minecraft:block/notes.txt").expect("notes").is_texture());

        manager.clear();
        assert!(manager.is_empty());
        assert_eq!(manager.cached_bytes(), 0);
        Ok(())
    }

    #[test]
    fn pack_keys_strip_png_only() {
        assert_eq!(
            pack_key("assets/minecraft/textures/block/stone.png"),
            Some(("minecraft:block/stone".to_string(), true))
        );
        assert_eq!(
            pack_key("assets/minecraft/textures/block/stone.png.mcmeta"),
            Some(("minecraft:block/stone.png.mcmeta".to_string(), false))
        );
        assert_eq!(pack_key("assets/minecraft/models/stone.json"), None);
        assert_eq!(pack_key("pack.mcmeta"), None);
    }

    #[test]
    fn dotted_namespaces_are_not_scanned() -> Result<()> {
        assert_eq!(pack_key("assets/my.pack/textures/block/stone.png"), None);

        let dir = tempdir()?;
        let textures = dir.path().join("assets/my.pack/textures/block");
        fs::create_dir_all(&textures)?;
        fs::write(textures.join("stone.png"), png(1, 1, [1, 2, 3, 255]))?;
        fs::write(textures.join("stone.png.mcmeta"), ANIMATION)?;

        let manager = TextureManager::new(1 << 20);
        assert_eq!(manager.load_pack_dir(dir.path())?, 0);
        assert!(manager.is_empty());
        Ok(())
    }
}
