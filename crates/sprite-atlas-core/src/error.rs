use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Manifest encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to decode sheet {path}: {message}")]
    SheetDecode { path: String, message: String },
    #[error("No atlas image file found for atlas {id}")]
    MissingAtlasFile { id: usize },
    #[error("Atlas {id} does not belong to this atlas package")]
    ForeignAtlas { id: usize },
    #[error("Sprite {path} ({w}x{h}) exceeds atlas size {max}")]
    SpriteTooLarge {
        path: String,
        w: u32,
        h: u32,
        max: u32,
    },
    #[error("Nothing to pack")]
    Empty,
}

pub type Result<T> = std::result::Result<T, AtlasError>;
