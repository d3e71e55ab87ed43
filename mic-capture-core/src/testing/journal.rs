use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::metadata::SourceId;
use crate::traits::audio_hardware::{Bus, UnitHandle, UnitKind};

/// One observable call against the fake hardware or a recording sink.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    FindComponent(UnitKind),
    Instantiate(UnitHandle),
    EnableInput(UnitHandle),
    SetStreamFormat { unit: UnitHandle, sample_rate: f64 },
    SetRenderCallback { unit: UnitHandle, bus: Bus },
    Initialize(UnitHandle),
    Start(UnitHandle),
    Stop(UnitHandle),
    Dispose(UnitHandle),
    Push { frame_count: u32, bytes: usize },
    RegisterSource(SourceId),
}

/// Ordered, shareable record of calls, for asserting on interleavings
/// between the control thread and the render thread.
#[derive(Debug, Clone, Default)]
pub struct CallJournal(Arc<Mutex<Vec<HardwareCall>>>);

impl CallJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: HardwareCall) {
        self.0.lock().push(call);
    }

    pub fn entries(&self) -> Vec<HardwareCall> {
        self.0.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&HardwareCall) -> bool) -> usize {
        self.0.lock().iter().filter(|c| pred(c)).count()
    }

    /// Index of the first entry matching `pred`.
    pub fn position(&self, pred: impl Fn(&HardwareCall) -> bool) -> Option<usize> {
        self.0.lock().iter().position(pred)
    }

    /// Index of the last entry matching `pred`.
    pub fn last_position(&self, pred: impl Fn(&HardwareCall) -> bool) -> Option<usize> {
        self.0.lock().iter().rposition(pred)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}
