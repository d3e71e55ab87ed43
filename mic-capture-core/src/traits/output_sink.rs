use std::sync::Weak;

use crate::models::metadata::{AudioBufferMetadata, SourceId};

/// Downstream consumer of captured audio buffers.
///
/// `push_buffer` is called from the real-time audio thread: it must not
/// block or allocate unboundedly. Copy the data out if it must outlive the
/// call.
pub trait OutputSink: Send + Sync {
    /// Accept one rendered buffer. `data.len()` is the payload size in bytes.
    fn push_buffer(&self, data: &[u8], metadata: &AudioBufferMetadata);

    /// Source-registration capability, for sinks that track their inputs
    /// (mixers). Sinks that don't care keep the default.
    fn as_source_registry(&self) -> Option<&dyn SourceRegistry> {
        None
    }
}

/// Optional sink capability: be told which sources feed it.
pub trait SourceRegistry: Send + Sync {
    fn register_source(&self, source: SourceHandle);
}

/// Non-owning handle to a capture source, handed to a [`SourceRegistry`].
#[derive(Clone)]
pub struct SourceHandle {
    id: SourceId,
    liveness: Weak<dyn Send + Sync>,
}

impl SourceHandle {
    pub(crate) fn new(id: SourceId, liveness: Weak<dyn Send + Sync>) -> Self {
        Self { id, liveness }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Whether the source still exists. A `true` result can go stale
    /// immediately; use it for bookkeeping, not for synchronization.
    pub fn is_alive(&self) -> bool {
        self.liveness.strong_count() > 0
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for SourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SourceHandle {}
