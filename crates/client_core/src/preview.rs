use std::sync::Arc;

use shared::domain::{ImageAsset, PreviewId};

/// Owner of whatever transient resource a UI creates to show the selected
/// image (an object URL, a texture, a temp file).
pub trait PreviewSink: Send + Sync {
    fn acquire(&self, image: &ImageAsset) -> PreviewId;
    fn release(&self, id: PreviewId);
}

/// Sink for collaborators that render no preview.
pub struct NoPreview;

impl PreviewSink for NoPreview {
    fn acquire(&self, _image: &ImageAsset) -> PreviewId {
        PreviewId(0)
    }

    fn release(&self, _id: PreviewId) {}
}

/// Holds one acquired preview and releases it when dropped.
pub struct PreviewGuard {
    id: PreviewId,
    sink: Arc<dyn PreviewSink>,
}

impl PreviewGuard {
    pub(crate) fn acquire(sink: &Arc<dyn PreviewSink>, image: &ImageAsset) -> Self {
        Self {
            id: sink.acquire(image),
            sink: Arc::clone(sink),
        }
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        self.sink.release(self.id);
    }
}
