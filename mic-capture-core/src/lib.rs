//! # mic-capture-core
//!
//! Platform-agnostic microphone capture core.
//!
//! Configures a platform input unit, receives frames on the platform's
//! real-time render thread, tags them with format metadata and forwards them
//! to an [`OutputSink`]. Interruption and route-change notifications arrive on
//! an explicit channel and stop/restart the unit from a background thread.
//! Platform backends (Windows WASAPI, the in-memory fake) implement
//! [`AudioHardware`].
//!
//! ## Architecture
//!
//! ```text
//! mic-capture-core (this crate)
//! ├── traits/       ← AudioHardware, OutputSink, SourceRegistry
//! ├── models/       ← ConfigError, SessionState, SessionConfig, StreamFormatDescriptor, events
//! ├── processing/   ← RenderCallbackBridge, buffer tagging
//! ├── session/      ← AudioDeviceSession, InterruptionMonitor
//! └── testing/      ← FakeAudioHardware, RecordingSink (`testing` feature)
//! ```
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use mic_capture_core::{event_channel, AudioDeviceSession, SessionConfig};
//!
//! let (events_tx, events_rx) = event_channel();
//! let session = AudioDeviceSession::create(hardware, SessionConfig::default(), events_rx)?;
//! session.set_output(mixer);
//! ```

pub mod models;
pub mod processing;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::SessionConfig;
pub use models::diagnostics::SessionDiagnostics;
pub use models::error::{ConfigError, UnitStatus};
pub use models::events::{InterruptionKind, RouteChangeReason, SystemAudioEvent};
pub use models::format::{FormatFlags, StreamFormatDescriptor};
pub use models::metadata::{AudioBufferMetadata, SourceId};
pub use models::state::{InterruptionState, SessionState};
pub use processing::render_bridge::{RenderCallbackBridge, MAX_FRAMES_PER_SLICE};
pub use processing::tagger::tag_buffer;
pub use session::device_session::AudioDeviceSession;
pub use session::interruption::event_channel;
pub use traits::audio_hardware::{
    AudioHardware, Bus, ComponentId, RenderCallback, RenderCycle, UnitHandle, UnitKind,
};
pub use traits::output_sink::{OutputSink, SourceHandle, SourceRegistry};
