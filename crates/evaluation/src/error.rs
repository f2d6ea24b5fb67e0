use std::path::PathBuf;
use thiserror::Error;

/// Failure to load one image's annotation. The image is left out of the
/// evaluation; the batch carries on.
#[derive(Error, Debug)]
pub enum GroundTruthError {
    #[error("Annotation not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read annotation {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed annotation: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{labels} labels given for a {size}x{size} matrix")]
    LabelMismatch { labels: usize, size: usize },

    #[error("Failed to read font {}: {source}", path.display())]
    FontIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid font data in {}", .0.display())]
    InvalidFont(PathBuf),

    #[error("Failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}
