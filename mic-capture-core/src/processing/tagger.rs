use crate::models::format::StreamFormatDescriptor;
use crate::models::metadata::{AudioBufferMetadata, SourceId};

/// Describe one rendered buffer.
///
/// Pure: called once per successful render on the real-time thread, so the
/// metadata always reflects the session's current format.
pub fn tag_buffer(
    format: &StreamFormatDescriptor,
    channel_count: u32,
    frame_count: u32,
    source: SourceId,
) -> AudioBufferMetadata {
    AudioBufferMetadata {
        sample_rate: format.sample_rate(),
        bits_per_channel: format.bits_per_channel(),
        channel_count,
        format_flags: format.format_flags(),
        bytes_per_frame: format.bits_per_channel() / 8 * channel_count,
        frame_count,
        is_interleaved: format.is_interleaved(),
        is_big_endian: format.is_big_endian(),
        source,
    }
}
