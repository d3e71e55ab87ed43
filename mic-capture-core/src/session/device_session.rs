use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::models::config::SessionConfig;
use crate::models::diagnostics::SessionDiagnostics;
use crate::models::error::ConfigError;
use crate::models::events::SystemAudioEvent;
use crate::models::format::StreamFormatDescriptor;
use crate::models::metadata::SourceId;
use crate::models::state::SessionState;
use crate::processing::render_bridge::{silent_output_callback, RenderCallbackBridge, RenderContext};
use crate::session::interruption::{InterruptionMonitor, MonitorHandle};
use crate::traits::audio_hardware::{AudioHardware, Bus, UnitHandle, UnitKind};
use crate::traits::output_sink::{OutputSink, SourceHandle};

/// Lifecycle fields, only touched under `SessionCore::lifecycle`.
struct Lifecycle {
    state: SessionState,
    unit: Option<UnitHandle>,
    monitor: Option<MonitorHandle>,
}

/// Outcome of `SessionCore::shutdown`.
enum Shutdown {
    AlreadyDisposed,
    /// The unit was released; carries the monitor subscription, if one was
    /// ever started.
    Released(Option<MonitorHandle>),
}

/// Session internals shared with the interruption monitor (weakly) and the
/// render callback (through `RenderContext`).
pub(crate) struct SessionCore {
    hardware: Arc<dyn AudioHardware>,
    render: Arc<RenderContext>,
    echo_cancellation: bool,
    lifecycle: Mutex<Lifecycle>,
    interruptions: AtomicU64,
}

impl SessionCore {
    pub(crate) fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    fn set_state(lifecycle: &mut Lifecycle, state: SessionState) {
        log::debug!("audio session {:?} -> {:?}", lifecycle.state, state);
        lifecycle.state = state;
    }

    /// Run the configuration sequence on a freshly instantiated unit.
    /// Leaves the session `Running` on success.
    fn configure(&self, unit: UnitHandle) -> Result<(), ConfigError> {
        self.hardware.enable_input(unit).map_err(|status| {
            log::debug!("can't enable input on audio unit: {}", status);
            ConfigError::InputEnableFailed(status)
        })?;

        self.hardware
            .set_stream_format(unit, self.render.format())
            .map_err(|status| {
                log::debug!("can't set input stream format on audio unit: {}", status);
                ConfigError::StreamFormatRejected(status)
            })?;

        let bridge = RenderCallbackBridge::new(Arc::clone(&self.render));
        let mut registered = self
            .hardware
            .set_render_callback(unit, Bus::Input, bridge.into_callback());
        if self.echo_cancellation && registered.is_ok() {
            registered = self
                .hardware
                .set_render_callback(unit, Bus::Output, silent_output_callback());
        }
        registered.map_err(|status| {
            log::debug!("can't set render callbacks on audio unit: {}", status);
            ConfigError::CallbackRegistrationFailed(status)
        })?;

        let mut lifecycle = self.lifecycle.lock();
        Self::set_state(&mut lifecycle, SessionState::Configured);

        self.hardware.initialize(unit).map_err(|status| {
            log::debug!("can't initialize audio unit: {}", status);
            ConfigError::StartFailed(status)
        })?;

        self.render.set_running(true);
        if let Err(status) = self.hardware.start(unit) {
            self.render.set_running(false);
            log::debug!("can't start audio unit: {}", status);
            return Err(ConfigError::StartFailed(status));
        }

        Self::set_state(&mut lifecycle, SessionState::Running);
        Ok(())
    }

    /// Stop the unit for an interruption. The unit stays allocated.
    pub(crate) fn suspend(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(unit) = lifecycle.unit.filter(|_| lifecycle.state.is_running()) else {
            log::debug!("ignoring suspend in state {:?}", lifecycle.state);
            return;
        };

        self.render.set_running(false);
        match self.hardware.stop(unit) {
            Ok(()) => {
                self.interruptions.fetch_add(1, Ordering::Relaxed);
                Self::set_state(&mut lifecycle, SessionState::Stopped);
            }
            Err(status) => {
                log::error!("failed to stop audio unit for interruption: {}", status);
                self.render.set_running(true);
            }
        }
    }

    /// Restart the unit after an interruption ended.
    pub(crate) fn resume(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(unit) = lifecycle.unit.filter(|_| lifecycle.state.is_stopped()) else {
            log::debug!("ignoring resume in state {:?}", lifecycle.state);
            return;
        };

        self.render.set_running(true);
        match self.hardware.start(unit) {
            Ok(()) => Self::set_state(&mut lifecycle, SessionState::Running),
            Err(status) => {
                self.render.set_running(false);
                log::error!("failed to restart audio unit after interruption: {}", status);
            }
        }
    }

    /// Stop, unsubscribe, release. Hands back the monitor so the caller can
    /// join it without holding the lifecycle lock.
    fn shutdown(&self) -> Shutdown {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state.is_disposed() {
            return Shutdown::AlreadyDisposed;
        }

        self.render.set_running(false);
        let unit = lifecycle.unit.take();

        if let Some(unit) = unit {
            // Stop first: once it returns no callback is in flight, so the
            // release below can't be observed from the audio thread.
            if let Err(status) = self.hardware.stop(unit) {
                log::warn!("failed to stop audio unit during dispose: {}", status);
            }
        }

        let mut monitor = lifecycle.monitor.take();
        if let Some(handle) = monitor.as_mut() {
            handle.unsubscribe();
        }

        if let Some(unit) = unit {
            if let Err(status) = self.hardware.dispose(unit) {
                log::warn!("failed to dispose audio unit: {}", status);
            }
        }

        self.render.clear_sink();
        Self::set_state(&mut lifecycle, SessionState::Disposed);
        Shutdown::Released(monitor)
    }
}

/// Microphone capture session over one hardware input unit.
///
/// Created running by [`AudioDeviceSession::create`]; interruptions stop and
/// restart it; [`AudioDeviceSession::dispose`] (or drop) releases the unit.
///
/// Equality and hashing are by instance: two sessions with the same
/// configuration are still two hardware claims.
pub struct AudioDeviceSession {
    pub(crate) core: Arc<SessionCore>,
}

impl AudioDeviceSession {
    /// Configure and start an input unit.
    ///
    /// Sequence: find component → instantiate → enable input → stream format
    /// → render callbacks → initialize → start. Fails on the first step that
    /// fails; a unit that was instantiated is disposed before returning.
    pub fn create(
        hardware: Arc<dyn AudioHardware>,
        config: SessionConfig,
        events: Receiver<SystemAudioEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let kind = if config.echo_cancellation {
            UnitKind::EchoCancelling
        } else {
            UnitKind::Passthrough
        };

        let component = hardware.find_component(kind).ok_or_else(|| {
            log::debug!("can't find audio component for {:?}", kind);
            ConfigError::ComponentNotFound
        })?;

        let unit = hardware.instantiate(component).map_err(|status| {
            log::debug!("can't create audio unit instance: {}", status);
            ConfigError::InstanceCreationFailed(status)
        })?;

        let render = Arc::new(RenderContext::new(SourceId::new(), config.stream_format()));
        let core = Arc::new(SessionCore {
            hardware: Arc::clone(&hardware),
            render,
            echo_cancellation: config.echo_cancellation,
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Created,
                unit: Some(unit),
                monitor: None,
            }),
            interruptions: AtomicU64::new(0),
        });

        if let Err(err) = core.configure(unit) {
            if let Err(status) = hardware.dispose(unit) {
                log::warn!("failed to dispose partially configured audio unit: {}", status);
            }
            return Err(err);
        }

        match InterruptionMonitor::spawn(Arc::downgrade(&core), events) {
            Ok(handle) => core.lifecycle.lock().monitor = Some(handle),
            Err(e) => log::error!("interruption monitor unavailable: {}", e),
        }

        log::info!(
            "audio session {} running at {} Hz (echo cancellation: {})",
            core.render.source(),
            config.sample_rate,
            config.echo_cancellation
        );
        Ok(Self { core })
    }

    /// Route rendered buffers to `sink`.
    ///
    /// Only a weak reference is kept. Sinks exposing a source registry get
    /// this session registered with them.
    pub fn set_output(&self, sink: Arc<dyn OutputSink>) {
        // Held across install and registration so a concurrent dispose
        // can't interleave with them.
        let lifecycle = self.core.lifecycle.lock();
        if lifecycle.state.is_disposed() {
            log::debug!("set_output on disposed audio session ignored");
            return;
        }

        self.core.render.set_sink(Arc::downgrade(&sink));

        if let Some(registry) = sink.as_source_registry() {
            let core = Arc::downgrade(&self.core);
            let liveness: Weak<dyn Send + Sync> = core;
            registry.register_source(SourceHandle::new(self.source_id(), liveness));
        }
        drop(lifecycle);
    }

    /// Stop and release the hardware unit. Safe to call more than once and
    /// while a render callback is in flight.
    pub fn dispose(&self) {
        match self.core.shutdown() {
            Shutdown::AlreadyDisposed => return,
            Shutdown::Released(Some(mut monitor)) => monitor.join(),
            Shutdown::Released(None) => {}
        }
        log::info!("audio session {} disposed", self.core.render.source());
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn source_id(&self) -> SourceId {
        self.core.render.source()
    }

    pub fn format(&self) -> StreamFormatDescriptor {
        *self.core.render.format()
    }

    pub fn echo_cancellation(&self) -> bool {
        self.core.echo_cancellation
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            interruptions: self.core.interruptions.load(Ordering::Relaxed),
            ..self.core.render.diagnostics()
        }
    }
}

impl Drop for AudioDeviceSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl PartialEq for AudioDeviceSession {
    fn eq(&self, other: &Self) -> bool {
        self.source_id() == other.source_id()
    }
}

impl Eq for AudioDeviceSession {}

impl Hash for AudioDeviceSession {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_id().hash(state);
    }
}

impl std::fmt::Debug for AudioDeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDeviceSession")
            .field("source", &self.source_id())
            .field("state", &self.state())
            .field("echo_cancellation", &self.core.echo_cancellation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::error::UnitStatus;
    use crate::session::interruption::event_channel;
    use crate::testing::{CallJournal, FakeAudioHardware, HardwareCall, RecordingSink, Step};
    use approx::assert_relative_eq;

    fn create_with(
        hw: &Arc<FakeAudioHardware>,
        config: SessionConfig,
    ) -> Result<AudioDeviceSession, ConfigError> {
        let (_events_tx, events_rx) = event_channel();
        AudioDeviceSession::create(hw.clone(), config, events_rx)
    }

    #[test]
    fn create_runs_configuration_sequence_in_order() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();

        assert_eq!(session.state(), SessionState::Running);
        let unit = hw.units()[0];
        assert_eq!(
            hw.journal().entries(),
            vec![
                HardwareCall::FindComponent(UnitKind::EchoCancelling),
                HardwareCall::Instantiate(unit),
                HardwareCall::EnableInput(unit),
                HardwareCall::SetStreamFormat {
                    unit,
                    sample_rate: 48000.0
                },
                HardwareCall::SetRenderCallback {
                    unit,
                    bus: Bus::Input
                },
                HardwareCall::SetRenderCallback {
                    unit,
                    bus: Bus::Output
                },
                HardwareCall::Initialize(unit),
                HardwareCall::Start(unit),
            ]
        );
        assert!(hw.is_running(unit));
    }

    #[test]
    fn passthrough_mode_skips_output_callback() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::new(44100.0, false)).unwrap();

        let unit = hw.units()[0];
        assert_eq!(hw.unit_kind(unit), Some(UnitKind::Passthrough));
        assert!(hw.has_callback(unit, Bus::Input));
        assert!(!hw.has_callback(unit, Bus::Output));
        assert!(!session.echo_cancellation());
        assert_relative_eq!(session.format().sample_rate(), 44100.0);
    }

    #[test]
    fn echo_cancelling_output_callback_is_silent() {
        let hw = Arc::new(FakeAudioHardware::new());
        let journal = hw.journal().clone();
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        let sink = Arc::new(RecordingSink::new(journal));
        session.set_output(sink.clone());

        assert_eq!(hw.render_output_quantum(512), Some(Ok(())));
        assert_eq!(sink.push_count(), 0);
    }

    #[test]
    fn capture_format_layout() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::new(48000.0, true)).unwrap();

        let format = session.format();
        assert_eq!(format.channel_count(), 1);
        assert_eq!(format.bits_per_channel(), 16);
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.bytes_per_packet(), 2);
    }

    #[test]
    fn missing_component_fails_without_instantiating() {
        let hw = Arc::new(FakeAudioHardware::new());
        hw.remove_component(UnitKind::EchoCancelling);

        let err = create_with(&hw, SessionConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::ComponentNotFound);
        assert_eq!(hw.journal().count(|c| matches!(c, HardwareCall::Instantiate(_))), 0);
        assert_eq!(hw.live_units(), 0);
    }

    #[test]
    fn each_step_failure_maps_to_its_error_and_releases_unit() {
        let status = UnitStatus(-66);
        let cases = [
            (Step::Instantiate, ConfigError::InstanceCreationFailed(status)),
            (Step::EnableInput, ConfigError::InputEnableFailed(status)),
            (Step::SetStreamFormat, ConfigError::StreamFormatRejected(status)),
            (Step::SetInputCallback, ConfigError::CallbackRegistrationFailed(status)),
            (Step::SetOutputCallback, ConfigError::CallbackRegistrationFailed(status)),
            (Step::Initialize, ConfigError::StartFailed(status)),
            (Step::Start, ConfigError::StartFailed(status)),
        ];

        for (step, expected) in cases {
            let hw = Arc::new(FakeAudioHardware::new());
            hw.fail_at(step, status);

            let err = create_with(&hw, SessionConfig::default()).unwrap_err();
            assert_eq!(err, expected, "step {:?}", step);
            assert_eq!(hw.live_units(), 0, "leaked unit after {:?}", step);
        }
    }

    #[test]
    fn unsupported_rate_rejected_by_hardware() {
        let hw = Arc::new(FakeAudioHardware::new());
        hw.reject_sample_rate(12345.0);

        let err = create_with(&hw, SessionConfig::new(12345.0, true)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::StreamFormatRejected(UnitStatus::FORMAT_NOT_SUPPORTED)
        );
        assert_eq!(hw.live_units(), 0);
        assert_eq!(hw.journal().count(|c| matches!(c, HardwareCall::Start(_))), 0);
    }

    #[test]
    fn invalid_rate_rejected_before_touching_hardware() {
        let hw = Arc::new(FakeAudioHardware::new());
        let err = create_with(&hw, SessionConfig::new(0.0, true)).unwrap_err();

        assert!(matches!(err, ConfigError::StreamFormatRejected(_)));
        assert!(hw.journal().entries().is_empty());
    }

    #[test]
    fn set_output_registers_with_capable_sink() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();

        let plain = Arc::new(RecordingSink::new(hw.journal().clone()));
        session.set_output(plain.clone());
        assert!(plain.sources().is_empty());

        let mixer = Arc::new(RecordingSink::with_registry(hw.journal().clone()));
        session.set_output(mixer.clone());
        let sources = mixer.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id(), session.source_id());
        assert!(sources[0].is_alive());

        drop(session);
        assert!(!sources[0].is_alive());
    }

    #[test]
    fn latest_output_wins() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        let first = Arc::new(RecordingSink::new(CallJournal::new()));
        let second = Arc::new(RecordingSink::new(CallJournal::new()));

        session.set_output(first.clone());
        session.set_output(second.clone());
        hw.render_quantum(256);

        assert_eq!(first.push_count(), 0);
        assert_eq!(second.push_count(), 1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();

        session.dispose();
        let after_first = hw.journal().entries();
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(hw.live_units(), 0);

        session.dispose();
        assert_eq!(hw.journal().entries(), after_first);
        assert_eq!(session.state(), SessionState::Disposed);
    }

    #[test]
    fn dispose_from_stopped_is_idempotent() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        session.core.suspend();
        assert_eq!(session.state(), SessionState::Stopped);

        session.dispose();
        let after_first = hw.journal().entries();
        assert_eq!(hw.live_units(), 0);
        assert_eq!(
            hw.journal().count(|c| matches!(c, HardwareCall::Dispose(_))),
            1
        );

        session.dispose();
        assert_eq!(hw.journal().entries(), after_first);
        assert_eq!(session.state(), SessionState::Disposed);
    }

    #[test]
    fn shutdown_without_monitor_still_releases() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        let monitor = session.core.lifecycle.lock().monitor.take();
        if let Some(mut monitor) = monitor {
            monitor.join();
        }

        assert!(matches!(session.core.shutdown(), Shutdown::Released(None)));
        assert_eq!(hw.live_units(), 0);
        assert!(matches!(session.core.shutdown(), Shutdown::AlreadyDisposed));
    }

    #[test]
    fn dispose_failures_are_swallowed() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        hw.fail_at(Step::Stop, UnitStatus(-1));
        hw.fail_at(Step::Dispose, UnitStatus(-1));

        session.dispose();
        assert_eq!(session.state(), SessionState::Disposed);
    }

    #[test]
    fn drop_disposes() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        assert_eq!(hw.live_units(), 1);

        drop(session);
        assert_eq!(hw.live_units(), 0);
    }

    #[test]
    fn operations_after_dispose_are_noops() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        session.dispose();

        let sink = Arc::new(RecordingSink::with_registry(CallJournal::new()));
        session.set_output(sink.clone());
        session.core.suspend();
        session.core.resume();

        assert!(sink.sources().is_empty());
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(hw.render_quantum(128), None);
    }

    #[test]
    fn identity_is_per_instance() {
        let hw = Arc::new(FakeAudioHardware::new());
        let a = create_with(&hw, SessionConfig::default()).unwrap();
        let b = create_with(&hw, SessionConfig::default()).unwrap();

        assert_ne!(a, b);
        assert_eq!(a, a);

        let mut set = HashSet::new();
        set.insert(a.source_id());
        set.insert(b.source_id());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn suspend_and_resume_cycle_the_unit() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();
        let unit = hw.units()[0];

        session.core.suspend();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!hw.is_running(unit));
        assert_eq!(hw.live_units(), 1);

        session.core.resume();
        assert_eq!(session.state(), SessionState::Running);
        assert!(hw.is_running(unit));
        assert_eq!(session.diagnostics().interruptions, 1);
    }

    #[test]
    fn failed_restart_stays_stopped() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();

        session.core.suspend();
        hw.fail_at(Step::Start, UnitStatus(-1));
        session.core.resume();
        assert_eq!(session.state(), SessionState::Stopped);

        hw.clear_failures();
        session.core.resume();
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn one_quantum_one_push() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::new(48000.0, true)).unwrap();
        let sink = Arc::new(RecordingSink::new(hw.journal().clone()));
        session.set_output(sink.clone());

        assert_eq!(hw.render_quantum(1024), Some(Ok(())));

        let buffers = sink.buffers();
        assert_eq!(buffers.len(), 1);
        let metadata = buffers[0].metadata;
        assert_eq!(metadata.frame_count, 1024);
        assert_relative_eq!(metadata.sample_rate, 48000.0);
        assert_eq!(metadata.channel_count, 1);
        assert_eq!(metadata.bytes_per_frame, 2);
        assert_eq!(metadata.source, session.source_id());
        assert_eq!(buffers[0].data.len(), 2048);
    }

    #[test]
    fn diagnostics_track_render_activity() {
        let hw = Arc::new(FakeAudioHardware::new());
        let session = create_with(&hw, SessionConfig::default()).unwrap();

        hw.render_quantum(256);
        let sink = Arc::new(RecordingSink::new(CallJournal::new()));
        session.set_output(sink.clone());
        hw.render_quantum(256);
        hw.render_quantum(128);
        hw.set_render_failure(Some(UnitStatus(-50)));
        assert_eq!(hw.render_quantum(128), Some(Err(UnitStatus(-50))));

        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.render_callbacks, 4);
        assert_eq!(diagnostics.unrouted_buffers, 1);
        assert_eq!(diagnostics.buffers_pushed, 2);
        assert_eq!(diagnostics.frames_delivered, 384);
        assert_eq!(diagnostics.failed_renders, 1);
        assert_eq!(diagnostics.interruptions, 0);
    }
}
