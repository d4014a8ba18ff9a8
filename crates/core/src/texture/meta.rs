use serde::{Deserialize, Serialize};

/// Suffix appended to keys that already carry an extension.
pub const MCMETA_SUFFIX: &str = ".mcmeta";

/// Suffix appended to bare texture keys.
pub const PNG_MCMETA_SUFFIX: &str = ".png.mcmeta";

/// Key of the descriptor belonging to texture `key`.
///
/// `block/stone` maps to `block/stone.png.mcmeta`, while a key that already
/// contains a `.` only gets `.mcmeta` appended.
pub fn meta_key(key: &str) -> String {
    if key.contains('.') {
        format!("{key}{MCMETA_SUFFIX}")
    } else {
        format!("{key}{PNG_MCMETA_SUFFIX}")
    }
}

/// Parsed texture descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureMeta {
    /// Animation section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationMeta>,
    /// Sampling section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureProperties>,
}

impl TextureMeta {
    /// Parse a descriptor.
    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Whether the descriptor animates the texture.
    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}

/// Animation timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationMeta {
    /// Ticks each frame stays on screen unless overridden per frame.
    #[serde(default = "default_frametime")]
    pub frametime: u32,
    /// Blend between frames.
    #[serde(default)]
    pub interpolate: bool,
    /// Frame width, defaults to the texture width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Frame height, defaults to the frame width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Explicit frame order; empty means every frame top to bottom.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<AnimationFrame>,
}

impl AnimationMeta {
    /// `(frame index, ticks)` for each explicit frame.
    pub fn timeline(&self) -> Vec<(u32, u32)> {
        self.frames
            .iter()
            .map(|frame| (frame.index(), frame.time().unwrap_or(self.frametime)))
            .collect()
    }
}

fn default_frametime() -> u32 {
    1
}

/// One entry of an explicit frame list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimationFrame {
    /// Frame index with the default time.
    Index(u32),
    /// Frame index with its own time.
    Timed {
        /// Frame index.
        index: u32,
        /// Ticks for this frame.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<u32>,
    },
}

impl AnimationFrame {
    /// Frame index.
    pub fn index(&self) -> u32 {
        match self {
            AnimationFrame::Index(index) | AnimationFrame::Timed { index, .. } => *index,
        }
    }

    /// Frame-specific time, if any.
    pub fn time(&self) -> Option<u32> {
        match self {
            AnimationFrame::Index(_) => None,
            AnimationFrame::Timed { time, .. } => *time,
        }
    }
}

/// Sampling flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureProperties {
    /// Linear filtering.
    #[serde(default)]
    pub blur: bool,
    /// Clamp instead of wrap.
    #[serde(default)]
    pub clamp: bool,
}
