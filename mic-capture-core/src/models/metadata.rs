use std::fmt;

use uuid::Uuid;

use super::format::FormatFlags;

/// Identity of a capture source.
///
/// Minted once per session instance, so two sessions with the same
/// configuration still have distinct ids. Holding a `SourceId` never keeps
/// the session alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mic-{}", self.0)
    }
}

/// Format description attached to every buffer pushed downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioBufferMetadata {
    pub sample_rate: f64,
    pub bits_per_channel: u32,
    pub channel_count: u32,
    pub format_flags: FormatFlags,
    pub bytes_per_frame: u32,
    pub frame_count: u32,
    pub is_interleaved: bool,
    pub is_big_endian: bool,
    pub source: SourceId,
}

impl AudioBufferMetadata {
    /// Size in bytes of the payload this metadata describes.
    pub fn payload_len(&self) -> usize {
        self.bytes_per_frame as usize * self.frame_count as usize
    }
}
