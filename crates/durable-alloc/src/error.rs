//! Allocator-specific error types.

use std::io;

use thiserror::Error;

/// Errors from saving or loading a heap image.
#[derive(Debug, Error)]
pub enum AllocError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The image does not start with the expected `b"DURA"` magic bytes.
    #[error("invalid magic bytes (expected b\"DURA\")")]
    InvalidMagic,
    /// The image format version is not supported by this build.
    #[error("unsupported image version {found}")]
    UnsupportedVersion {
        /// The version found in the image.
        found: u8,
    },
    /// The image is truncated or internally inconsistent.
    #[error("malformed image: {detail}")]
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}
