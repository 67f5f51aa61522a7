use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;

use crate::asset::AssetId;

const PREVIEW_SCHEME: &str = "preview://";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn for_asset(asset_id: AssetId) -> Self {
        Self(format!("{PREVIEW_SCHEME}{asset_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PreviewData {
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

pub trait PreviewStore: Send + Sync {
    fn allocate(&self, asset_id: AssetId, media_type: &str, bytes: Arc<[u8]>) -> PreviewHandle;
    /// Releasing an unknown or already released handle is a no-op.
    fn release(&self, handle: &PreviewHandle);
    fn resolve(&self, handle: &PreviewHandle) -> Option<PreviewData>;
}

#[derive(Default)]
pub struct InMemoryPreviewStore {
    live: Mutex<HashMap<PreviewHandle, PreviewData>>,
}

impl InMemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PreviewStore for InMemoryPreviewStore {
    fn allocate(&self, asset_id: AssetId, media_type: &str, bytes: Arc<[u8]>) -> PreviewHandle {
        let handle = PreviewHandle::for_asset(asset_id);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle.clone(),
                PreviewData {
                    media_type: media_type.to_string(),
                    bytes,
                },
            );
        handle
    }

    fn release(&self, handle: &PreviewHandle) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
    }

    fn resolve(&self, handle: &PreviewHandle) -> Option<PreviewData> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }
}
