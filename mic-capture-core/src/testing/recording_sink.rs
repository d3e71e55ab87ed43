use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use super::journal::{CallJournal, HardwareCall};
use crate::models::metadata::AudioBufferMetadata;
use crate::traits::output_sink::{OutputSink, SourceHandle, SourceRegistry};

/// A buffer received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct PushedBuffer {
    pub data: Vec<u8>,
    pub metadata: AudioBufferMetadata,
}

/// Lets a test hold a `push_buffer` call in flight.
pub struct PushGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl PushGate {
    /// Block until a push has entered the sink.
    pub fn wait_entered(&self) {
        let _ = self.entered.recv();
    }

    /// Let the held push return.
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

struct GateSide {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Output sink that keeps everything it is given.
///
/// Copies each buffer, so it is only suitable for tests.
pub struct RecordingSink {
    journal: CallJournal,
    buffers: Mutex<Vec<PushedBuffer>>,
    sources: Mutex<Vec<SourceHandle>>,
    accepts_sources: bool,
    gate: Option<GateSide>,
}

impl RecordingSink {
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            buffers: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
            accepts_sources: false,
            gate: None,
        }
    }

    /// A sink that also exposes the source-registration capability.
    pub fn with_registry(journal: CallJournal) -> Self {
        Self {
            accepts_sources: true,
            ..Self::new(journal)
        }
    }

    /// A sink whose pushes block until released through the returned gate.
    pub fn gated(journal: CallJournal) -> (Self, PushGate) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let sink = Self {
            gate: Some(GateSide {
                entered: entered_tx,
                release: release_rx,
            }),
            ..Self::new(journal)
        };
        let gate = PushGate {
            entered: entered_rx,
            release: release_tx,
        };
        (sink, gate)
    }

    pub fn buffers(&self) -> Vec<PushedBuffer> {
        self.buffers.lock().clone()
    }

    pub fn push_count(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn sources(&self) -> Vec<SourceHandle> {
        self.sources.lock().clone()
    }
}

impl OutputSink for RecordingSink {
    fn push_buffer(&self, data: &[u8], metadata: &AudioBufferMetadata) {
        self.journal.record(HardwareCall::Push {
            frame_count: metadata.frame_count,
            bytes: data.len(),
        });

        if let Some(gate) = &self.gate {
            let _ = gate.entered.try_send(());
            let _ = gate.release.recv();
        }

        self.buffers.lock().push(PushedBuffer {
            data: data.to_vec(),
            metadata: *metadata,
        });
    }

    fn as_source_registry(&self) -> Option<&dyn SourceRegistry> {
        if self.accepts_sources {
            Some(self)
        } else {
            None
        }
    }
}

impl SourceRegistry for RecordingSink {
    fn register_source(&self, source: SourceHandle) {
        self.journal.record(HardwareCall::RegisterSource(source.id()));
        self.sources.lock().push(source);
    }
}
