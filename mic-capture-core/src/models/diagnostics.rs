/// Counters for debugging a capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    /// Render callbacks delivered by the hardware on the input bus.
    pub render_callbacks: u64,
    /// Quanta dropped because rendering failed.
    pub failed_renders: u64,
    /// Buffers handed to the output sink.
    pub buffers_pushed: u64,
    /// Frames handed to the output sink.
    pub frames_delivered: u64,
    /// Rendered quanta with no live sink to receive them.
    pub unrouted_buffers: u64,
    /// Interruptions that stopped the unit.
    pub interruptions: u64,
}
