use thiserror::Error;

/// Errors raised when accessing texture resources.
#[derive(Debug, Error)]
pub enum TextureError {
    /// The resource is not a decodable texture.
    #[error("{0} is not a texture")]
    NotATexture(String),

    /// The texture has no backing file.
    #[error("{0} has no backing file")]
    Missing(String),

    /// The backing file could not be read.
    #[error("failed to read {key}: {source}")]
    Io {
        /// Resource key.
        key: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file is not a decodable image.
    #[error("failed to decode {key}: {source}")]
    Decode {
        /// Resource key.
        key: String,
        /// Underlying error.
        source: image::ImageError,
    },

    /// The texture descriptor could not be parsed.
    #[error("invalid texture metadata {key}: {source}")]
    Meta {
        /// Resource key.
        key: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A resize to an empty image was requested.
    #[error("invalid texture size {width}x{height}")]
    InvalidSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Convenience alias for texture operations.
pub type TextureResult<T> = Result<T, TextureError>;
