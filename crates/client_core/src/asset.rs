use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use mime_guess::Mime;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AssetError,
    prediction::ImageUpload,
    preview::{PreviewHandle, PreviewStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A file offered for classification, before any validation.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: None,
            bytes,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                AssetError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                AssetError::Unreadable {
                    path: PathBuf::from(path),
                    source,
                }
            }
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, bytes))
    }

    /// Checks that the file is a non-empty image without allocating a preview.
    pub fn validate(self) -> Result<ValidatedImage, AssetError> {
        if self.bytes.is_empty() {
            return Err(AssetError::Empty {
                file_name: self.file_name,
            });
        }

        let declared = self
            .media_type
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);
        let detected = declared
            .clone()
            .or_else(|| {
                mime_guess::from_path(&self.file_name)
                    .first_raw()
                    .map(str::to_string)
            })
            .or_else(|| {
                image::guess_format(&self.bytes)
                    .ok()
                    .map(|format| format.to_mime_type().to_string())
            });

        let media_type = detected
            .as_deref()
            .and_then(|raw| raw.parse::<Mime>().ok())
            .filter(|parsed| parsed.type_() == "image" && parsed.subtype() != "*")
            .map(|parsed| parsed.essence_str().to_ascii_lowercase());

        match media_type {
            Some(media_type) => Ok(ValidatedImage {
                file_name: self.file_name,
                media_type,
                bytes: Arc::from(self.bytes),
            }),
            None => Err(AssetError::NotAnImage {
                file_name: self.file_name,
                media_type: detected,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedImage {
    file_name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl ValidatedImage {
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

/// The image owned by the current session, plus its preview handle.
///
/// The handle is released by [`ImageAsset::dispose`] or, failing that, on
/// drop, so it is released exactly once on every path.
pub struct ImageAsset {
    id: AssetId,
    file_name: String,
    media_type: String,
    source: Arc<[u8]>,
    preview: PreviewHandle,
    previews: Arc<dyn PreviewStore>,
    disposed: bool,
}

impl ImageAsset {
    pub fn create(file: ImageFile, previews: Arc<dyn PreviewStore>) -> Result<Self, AssetError> {
        Ok(Self::stage(file.validate()?, previews))
    }

    pub fn stage(image: ValidatedImage, previews: Arc<dyn PreviewStore>) -> Self {
        let id = AssetId::new();
        let preview = previews.allocate(id, &image.media_type, Arc::clone(&image.bytes));
        debug!(asset_id = %id, %preview, bytes = image.bytes.len(), "asset: preview allocated");
        Self {
            id,
            file_name: image.file_name,
            media_type: image.media_type,
            source: image.bytes,
            preview,
            previews,
            disposed: false,
        }
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.previews.release(&self.preview);
        self.disposed = true;
        debug!(asset_id = %self.id, preview = %self.preview, "asset: preview released");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub(crate) fn upload(&self) -> ImageUpload {
        ImageUpload {
            asset_id: self.id,
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            bytes: Arc::clone(&self.source),
        }
    }
}

impl std::fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAsset")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("len", &self.source.len())
            .field("preview", &self.preview)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Drop for ImageAsset {
    fn drop(&mut self) {
        self.dispose();
    }
}
