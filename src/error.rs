use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline and lifecycle failures. Each stage surfaces at most one of
/// these; the engine carries it through cleanup before the run reports it.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("probe failed: {0}")]
    Probe(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("failed to decode frame {index} ({})", path.display())]
    Decode {
        index: usize,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to remove extraction directory")]
    Cleanup(#[source] io::Error),

    /// Internal marker for cooperatively cancelled stage work. Only produced
    /// while the engine is already shutting down, so it is never displayed.
    #[error("cancelled")]
    Cancelled,
}
