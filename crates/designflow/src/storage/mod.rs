pub mod filesystem;

pub use filesystem::FileAssetStorage;

use std::fmt;

use crate::error::StorageError;
use crate::job::JobId;

/// The two kinds of user-supplied images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Garment,
    StyleSwatch,
}

impl AssetKind {
    /// File stem used in storage keys.
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Garment => "garment",
            AssetKind::StyleSwatch => "style_swatch",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Garment => f.write_str("garment image"),
            AssetKind::StyleSwatch => f.write_str("style swatch image"),
        }
    }
}

/// Storage key of an uploaded asset: `{job_id}/{kind}.{extension}`.
pub fn asset_key(job_id: &JobId, kind: AssetKind, extension: &str) -> String {
    format!("{}/{}.{}", job_id, kind.as_str(), extension)
}

/// Blob storage for uploaded images and produced artifacts.
pub trait AssetStorage: Send + Sync {
    /// Writes `content` under `key`, replacing any previous value.
    fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError>;

    fn exists(&self, key: &str) -> bool;
}
