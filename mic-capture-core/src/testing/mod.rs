//! In-memory hardware and sinks for exercising sessions without a device.

mod fake_hardware;
mod journal;
mod recording_sink;

pub use fake_hardware::{FakeAudioHardware, Step, SIGNAL_BYTE};
pub use journal::{CallJournal, HardwareCall};
pub use recording_sink::{PushGate, PushedBuffer, RecordingSink};
