//! Real-time side of a capture session.
//!
//! The hardware layer owns the [`RenderCallbackBridge`] once it is registered
//! and drives it from its audio thread. Everything reachable from here is
//! lock-free: an atomic running flag, an `ArcSwapOption` sink slot, and
//! atomic counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;

use crate::models::diagnostics::SessionDiagnostics;
use crate::models::error::UnitStatus;
use crate::models::format::StreamFormatDescriptor;
use crate::models::metadata::{AudioBufferMetadata, SourceId};
use crate::processing::tagger::tag_buffer;
use crate::traits::audio_hardware::{RenderCallback, RenderCycle};
use crate::traits::output_sink::OutputSink;

/// Largest quantum the bridge accepts, in frames.
pub const MAX_FRAMES_PER_SLICE: u32 = 4096;

/// State shared between a session and its render callback.
pub(crate) struct RenderContext {
    source: SourceId,
    format: StreamFormatDescriptor,
    running: AtomicBool,
    sink: ArcSwapOption<Weak<dyn OutputSink>>,
    render_callbacks: AtomicU64,
    failed_renders: AtomicU64,
    buffers_pushed: AtomicU64,
    frames_delivered: AtomicU64,
    unrouted_buffers: AtomicU64,
}

impl RenderContext {
    pub(crate) fn new(source: SourceId, format: StreamFormatDescriptor) -> Self {
        Self {
            source,
            format,
            running: AtomicBool::new(false),
            sink: ArcSwapOption::empty(),
            render_callbacks: AtomicU64::new(0),
            failed_renders: AtomicU64::new(0),
            buffers_pushed: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            unrouted_buffers: AtomicU64::new(0),
        }
    }

    pub(crate) fn source(&self) -> SourceId {
        self.source
    }

    pub(crate) fn format(&self) -> &StreamFormatDescriptor {
        &self.format
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_sink(&self, sink: Weak<dyn OutputSink>) {
        self.sink.store(Some(Arc::new(sink)));
    }

    pub(crate) fn clear_sink(&self) {
        self.sink.store(None);
    }

    /// Hand a tagged buffer to the sink, if one is installed and alive.
    fn push(&self, data: &[u8], metadata: &AudioBufferMetadata) {
        if !self.is_running() {
            return;
        }

        let slot = self.sink.load();
        let Some(sink) = slot.as_ref().and_then(|weak| weak.upgrade()) else {
            self.unrouted_buffers.fetch_add(1, Ordering::Relaxed);
            return;
        };

        sink.push_buffer(data, metadata);
        self.buffers_pushed.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(u64::from(metadata.frame_count), Ordering::Relaxed);
    }

    pub(crate) fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            render_callbacks: self.render_callbacks.load(Ordering::Relaxed),
            failed_renders: self.failed_renders.load(Ordering::Relaxed),
            buffers_pushed: self.buffers_pushed.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            unrouted_buffers: self.unrouted_buffers.load(Ordering::Relaxed),
            interruptions: 0,
        }
    }
}

/// Input-bus render callback: pull the quantum, tag it, push it downstream.
pub struct RenderCallbackBridge {
    context: Arc<RenderContext>,
    scratch: Box<[u8]>,
}

impl RenderCallbackBridge {
    pub(crate) fn new(context: Arc<RenderContext>) -> Self {
        let capacity = MAX_FRAMES_PER_SLICE as usize * context.format().bytes_per_frame() as usize;
        Self {
            context,
            scratch: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Handle one render quantum. Failure statuses go back to the hardware,
    /// which drops the quantum; nothing is retried.
    pub fn render(&mut self, cycle: &mut RenderCycle<'_>) -> Result<(), UnitStatus> {
        let ctx = &self.context;
        ctx.render_callbacks.fetch_add(1, Ordering::Relaxed);

        if !ctx.is_running() {
            return Ok(());
        }

        let frame_count = cycle.frame_count();
        let needed = frame_count as usize * ctx.format().bytes_per_frame() as usize;
        if needed > self.scratch.len() {
            ctx.failed_renders.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "render quantum of {} frames exceeds slice maximum {}",
                frame_count,
                MAX_FRAMES_PER_SLICE
            );
            return Err(UnitStatus::TOO_MANY_FRAMES);
        }

        let written = match cycle.pull(&mut self.scratch[..needed]) {
            Ok(written) => written.min(needed),
            Err(status) => {
                ctx.failed_renders.fetch_add(1, Ordering::Relaxed);
                log::warn!("audio unit render failed: {}", status);
                return Err(status);
            }
        };

        // A short pull delivers whole frames only, and the metadata says so.
        let bytes_per_frame = ctx.format().bytes_per_frame() as usize;
        let frames = written / bytes_per_frame;
        if frames == 0 {
            return Ok(());
        }

        let format = ctx.format();
        let metadata = tag_buffer(format, format.channel_count(), frames as u32, ctx.source());
        ctx.push(&self.scratch[..frames * bytes_per_frame], &metadata);
        Ok(())
    }

    pub(crate) fn into_callback(mut self) -> RenderCallback {
        Box::new(move |cycle: &mut RenderCycle<'_>| self.render(cycle))
    }
}

/// Output-bus callback for echo-cancelling units. Produces nothing; the
/// voice processing unit only needs one registered to stay quiet.
pub(crate) fn silent_output_callback() -> RenderCallback {
    Box::new(|_: &mut RenderCycle<'_>| Ok(()))
}
